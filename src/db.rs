//! SQLite lead store
//!
//! One connection per operation; the CRM reads the same file, so the store
//! keeps SQLite in WAL mode and waits on locks instead of failing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{LeadEngineError, Result};
use crate::models::{Intent, LeadStatus, QuestionnaireStatus};
use crate::reminders::ReminderClock;
use crate::schema::{audit_log, leads, CREATE_TABLES};

/// Stored timestamp format (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Status written when a lead is closed by hand; outside the funnel enum
pub const CLOSED_STATUS: &str = "closed";

/// Status written once both follow-ups went out without an answer
pub const NURTURING_DONE_STATUS: &str = "nurturing_done";

/// Columns written by insert and update, in bind order
const LEAD_FIELDS: [&str; 15] = [
    leads::MESSAGE_ID,
    leads::CONVERSATION_ID,
    leads::FROM_ADDRESS,
    leads::SUBJECT,
    leads::STATUS,
    leads::VISA_COUNTRY,
    leads::QUESTIONNAIRE_STATUS,
    leads::QUESTIONNAIRE_FORM_ID,
    leads::QUESTIONNAIRE_RESPONSE_ID,
    leads::LAST_MESSAGE_ID,
    leads::LAST_CONTACTED,
    leads::NEXT_REMINDER_AT,
    leads::REMINDERS_SENT,
    leads::FORM_ACK_SENT,
    leads::SUMMARY,
];

/// Format a timestamp for storage
#[must_use]
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp.
///
/// Accepts the storage format, a `T` separator, fractional seconds and
/// RFC 3339 offsets (`Z`, `+05:00`); offsets are converted to UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    [
        TIMESTAMP_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// A stored lead
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Lead {
    /// Row id, `None` until saved
    pub id: Option<i64>,
    /// Message that created the lead
    pub message_id: Option<String>,
    /// Mail conversation id
    pub conversation_id: Option<String>,
    /// Client address
    pub from_address: String,
    /// Thread subject
    pub subject: String,
    /// Raw stored status; may hold values outside [`LeadStatus`] such as `closed`
    pub status: String,
    /// Destination code
    pub visa_country: Option<String>,
    /// Questionnaire progress
    pub questionnaire_status: QuestionnaireStatus,
    /// Form id of the questionnaire sent
    pub questionnaire_form_id: Option<String>,
    /// Response id of the filled questionnaire
    pub questionnaire_response_id: Option<String>,
    /// Last processed message
    pub last_message_id: Option<String>,
    /// Last contact (UTC)
    pub last_contacted: Option<NaiveDateTime>,
    /// Next follow-up (UTC)
    pub next_reminder_at: Option<NaiveDateTime>,
    /// Follow-ups already sent
    pub reminders_sent: i64,
    /// Questionnaire receipt acknowledged
    pub form_ack_sent: bool,
    /// Conversation summary
    pub summary: Option<String>,
    /// Creation time (UTC), set by the database
    pub created_at: Option<NaiveDateTime>,
}

impl Lead {
    /// New unsaved lead for a first message
    #[must_use]
    pub fn create(
        from_address: &str,
        conversation_id: Option<&str>,
        subject: Option<&str>,
        intent: Intent,
    ) -> Self {
        let now = Utc::now();
        let status = match intent {
            Intent::WantApply => LeadStatus::QuestionnaireSent,
            Intent::InfoRequest => LeadStatus::InfoProvided,
            _ => LeadStatus::New,
        };

        Self {
            message_id: Some(format!("gen_{}", now.timestamp())),
            conversation_id: conversation_id.map(ToString::to_string),
            from_address: from_address.to_string(),
            subject: subject
                .filter(|s| !s.trim().is_empty())
                .unwrap_or("No Subject")
                .to_string(),
            status: status.as_str().to_string(),
            last_contacted: Some(now.naive_utc()),
            ..Self::default()
        }
    }

    /// Funnel status; unknown stored values read as `New`
    #[must_use]
    pub fn status(&self) -> LeadStatus {
        LeadStatus::from_wire(Some(&self.status))
    }

    /// Set the funnel status
    pub fn set_status(&mut self, status: LeadStatus) {
        self.status = status.as_str().to_string();
    }

    /// Whether the lead was closed by hand
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status.eq_ignore_ascii_case(CLOSED_STATUS)
    }

    fn bind_values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.message_id.clone()),
            Box::new(self.conversation_id.clone()),
            Box::new(self.from_address.clone()),
            Box::new(self.subject.clone()),
            Box::new(self.status.clone()),
            Box::new(self.visa_country.clone()),
            Box::new(self.questionnaire_status.as_str()),
            Box::new(self.questionnaire_form_id.clone()),
            Box::new(self.questionnaire_response_id.clone()),
            Box::new(self.last_message_id.clone()),
            Box::new(self.last_contacted.map(format_timestamp)),
            Box::new(self.next_reminder_at.map(format_timestamp)),
            Box::new(self.reminders_sent),
            Box::new(self.form_ack_sent),
            Box::new(self.summary.clone()),
        ]
    }
}

/// One audit log row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Row id
    pub id: i64,
    /// Lead the event belongs to
    pub lead_id: i64,
    /// Event name
    pub event: String,
    /// Free-text details
    pub details: Option<String>,
    /// Creation time (UTC)
    pub created_at: Option<NaiveDateTime>,
}

fn map_lead(row: &Row) -> rusqlite::Result<Lead> {
    let timestamp = |column: &str| -> rusqlite::Result<Option<NaiveDateTime>> {
        Ok(row
            .get::<_, Option<String>>(column)?
            .as_deref()
            .and_then(parse_timestamp))
    };

    Ok(Lead {
        id: Some(row.get(leads::ID)?),
        message_id: row.get(leads::MESSAGE_ID)?,
        conversation_id: row.get(leads::CONVERSATION_ID)?,
        from_address: row
            .get::<_, Option<String>>(leads::FROM_ADDRESS)?
            .unwrap_or_default(),
        subject: row.get::<_, Option<String>>(leads::SUBJECT)?.unwrap_or_default(),
        status: row.get::<_, Option<String>>(leads::STATUS)?.unwrap_or_default(),
        visa_country: row.get(leads::VISA_COUNTRY)?,
        questionnaire_status: QuestionnaireStatus::from_wire(
            row.get::<_, Option<String>>(leads::QUESTIONNAIRE_STATUS)?
                .as_deref(),
        ),
        questionnaire_form_id: row.get(leads::QUESTIONNAIRE_FORM_ID)?,
        questionnaire_response_id: row.get(leads::QUESTIONNAIRE_RESPONSE_ID)?,
        last_message_id: row.get(leads::LAST_MESSAGE_ID)?,
        last_contacted: timestamp(leads::LAST_CONTACTED)?,
        next_reminder_at: timestamp(leads::NEXT_REMINDER_AT)?,
        reminders_sent: row.get::<_, Option<i64>>(leads::REMINDERS_SENT)?.unwrap_or(0),
        form_ack_sent: row.get::<_, Option<bool>>(leads::FORM_ACK_SENT)?.unwrap_or(false),
        summary: row.get(leads::SUMMARY)?,
        created_at: timestamp(leads::CREATED_AT)?,
    })
}

fn map_audit_entry(row: &Row) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(audit_log::ID)?,
        lead_id: row.get(audit_log::LEAD_ID)?,
        event: row.get(audit_log::EVENT)?,
        details: row.get(audit_log::DETAILS)?,
        created_at: row
            .get::<_, Option<String>>(audit_log::CREATED_AT)?
            .as_deref()
            .and_then(parse_timestamp),
    })
}

/// Lead and audit storage over a shared SQLite file
#[derive(Debug, Clone)]
pub struct LeadStore {
    path: PathBuf,
    busy_timeout: Duration,
    clock: ReminderClock,
}

impl LeadStore {
    /// Open the store, creating the parent directory and the schema
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration, clock: ReminderClock) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let store = Self {
            path,
            busy_timeout,
            clock,
        };
        store.connect()?.execute_batch(CREATE_TABLES)?;
        debug!(path = %store.path.display(), "Lead store opened");
        Ok(store)
    }

    /// Database file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clock used for reminder scheduling
    #[must_use]
    pub const fn clock(&self) -> &ReminderClock {
        &self.clock
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(conn)
    }

    /// Insert or update a lead and return its id.
    ///
    /// Without an id, a row with the same `message_id` is updated instead of
    /// inserting a duplicate.
    pub fn save(&self, lead: &mut Lead) -> Result<i64> {
        let conn = self.connect()?;

        let existing_id = match (lead.id, lead.message_id.as_deref()) {
            (Some(id), _) => Some(id),
            (None, Some(message_id)) => conn
                .query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE {} = ? ORDER BY {} DESC LIMIT 1",
                        leads::ID,
                        leads::TABLE,
                        leads::MESSAGE_ID,
                        leads::ID
                    ),
                    params![message_id],
                    |row| row.get(0),
                )
                .optional()?,
            (None, None) => None,
        };

        let mut values = lead.bind_values();
        let id = if let Some(id) = existing_id {
            let assignments = LEAD_FIELDS
                .iter()
                .enumerate()
                .map(|(i, column)| format!("{column} = ?{}", i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            values.push(Box::new(id));
            let updated = conn.execute(
                &format!(
                    "UPDATE {} SET {assignments} WHERE {} = ?{}",
                    leads::TABLE,
                    leads::ID,
                    LEAD_FIELDS.len() + 1
                ),
                params_from_iter(values.iter()),
            )?;
            if updated == 0 {
                return Err(LeadEngineError::LeadNotFound(id.to_string()));
            }
            id
        } else {
            let placeholders = vec!["?"; LEAD_FIELDS.len()].join(", ");
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({placeholders})",
                    leads::TABLE,
                    LEAD_FIELDS.join(", ")
                ),
                params_from_iter(values.iter()),
            )?;
            conn.last_insert_rowid()
        };

        lead.id = Some(id);
        Ok(id)
    }

    fn find_one(&self, column: &str, value: &dyn ToSql) -> Result<Option<Lead>> {
        let conn = self.connect()?;
        let lead = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE {column} = ? ORDER BY {} DESC LIMIT 1",
                    leads::TABLE,
                    leads::ID
                ),
                [value],
                map_lead,
            )
            .optional()?;
        Ok(lead)
    }

    /// Lead by row id
    pub fn get_by_id(&self, id: i64) -> Result<Option<Lead>> {
        self.find_one(leads::ID, &id)
    }

    /// Newest lead of a conversation
    pub fn get_by_conversation(&self, conversation_id: &str) -> Result<Option<Lead>> {
        self.find_one(leads::CONVERSATION_ID, &conversation_id)
    }

    /// Newest lead created or touched by a message
    pub fn get_by_message(&self, message_id: &str) -> Result<Option<Lead>> {
        self.find_one(leads::MESSAGE_ID, &message_id)
    }

    /// Newest lead for a client address (case-insensitive)
    pub fn get_by_email(&self, address: &str) -> Result<Option<Lead>> {
        let conn = self.connect()?;
        let lead = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE lower({}) = lower(?) ORDER BY {} DESC LIMIT 1",
                    leads::TABLE,
                    leads::FROM_ADDRESS,
                    leads::ID
                ),
                params![address.trim()],
                map_lead,
            )
            .optional()?;
        Ok(lead)
    }

    /// Open leads whose follow-up is due at `now`, oldest first
    pub fn get_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Lead>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {table} WHERE {next} IS NOT NULL AND {next} <= ? \
             AND COALESCE({status}, '') != ? ORDER BY {next}, {id}",
            table = leads::TABLE,
            next = leads::NEXT_REMINDER_AT,
            status = leads::STATUS,
            id = leads::ID,
        ))?;
        let due = stmt
            .query_map(
                params![format_timestamp(now.naive_utc()), CLOSED_STATUS],
                map_lead,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(due)
    }

    /// Leads with a filled questionnaire whose receipt was not acknowledged yet
    pub fn get_pending_form_acks(&self) -> Result<Vec<Lead>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {table} WHERE {qs} = ? AND COALESCE({ack}, 0) = 0 \
             AND {from} IS NOT NULL AND {from} != '' ORDER BY {id}",
            table = leads::TABLE,
            qs = leads::QUESTIONNAIRE_STATUS,
            ack = leads::FORM_ACK_SENT,
            from = leads::FROM_ADDRESS,
            id = leads::ID,
        ))?;
        let pending = stmt
            .query_map(params![QuestionnaireStatus::Filled.as_str()], map_lead)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pending)
    }

    /// Append an audit entry
    pub fn log_event(&self, lead_id: i64, event: &str, details: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?)",
                audit_log::TABLE,
                audit_log::LEAD_ID,
                audit_log::EVENT,
                audit_log::DETAILS
            ),
            params![lead_id, event, details],
        )?;
        Ok(())
    }

    /// Audit entries of a lead in insertion order
    pub fn audit_trail(&self, lead_id: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {}",
            audit_log::TABLE,
            audit_log::LEAD_ID,
            audit_log::ID
        ))?;
        let entries = stmt
            .query_map(params![lead_id], map_audit_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn save_and_log(&self, lead: &mut Lead, event: &str, details: &str) -> Result<i64> {
        let id = self.save(lead)?;
        self.log_event(id, event, details)?;
        info!(lead_id = id, event, details, "Lead updated");
        Ok(id)
    }

    /// Schedule the first follow-up at the local reminder hour, `days` ahead
    pub fn schedule_first_reminder(
        &self,
        lead: &mut Lead,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let at = self.clock.reminder_at(now, days);
        lead.next_reminder_at = Some(at);
        self.save_and_log(
            lead,
            "schedule_first_reminder",
            &format!("next_reminder_at={}", format_timestamp(at)),
        )?;
        Ok(())
    }

    /// Count a sent follow-up and schedule the next one
    pub fn schedule_next_reminder(
        &self,
        lead: &mut Lead,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let at = self.clock.reminder_at(now, days);
        lead.reminders_sent += 1;
        lead.next_reminder_at = Some(at);
        self.save_and_log(
            lead,
            "schedule_next_reminder",
            &format!(
                "reminders_sent={}, next_reminder_at={}",
                lead.reminders_sent,
                format_timestamp(at)
            ),
        )?;
        Ok(())
    }

    /// Clear the follow-up schedule
    pub fn stop_reminders(&self, lead: &mut Lead) -> Result<()> {
        lead.next_reminder_at = None;
        self.save_and_log(lead, "stop_reminders", "reminders stopped")?;
        Ok(())
    }

    /// Close the lead and clear its follow-ups
    pub fn mark_closed(&self, lead: &mut Lead) -> Result<()> {
        let previous = std::mem::replace(&mut lead.status, CLOSED_STATUS.to_string());
        lead.next_reminder_at = None;
        self.save_and_log(lead, "status_change", &format!("{previous} -> {CLOSED_STATUS}"))?;
        Ok(())
    }

    /// Record that the questionnaire receipt was acknowledged
    pub fn mark_form_ack_sent(&self, lead: &mut Lead) -> Result<()> {
        lead.form_ack_sent = true;
        self.save_and_log(lead, "form_ack_sent", "form acknowledgement sent")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn store() -> (TempDir, LeadStore) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = LeadStore::open(
            dir.path().join("data").join("leads.db"),
            Duration::from_secs(5),
            ReminderClock::default(),
        )
        .expect("Failed to open store");
        (dir, store)
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, 0, 0).single().expect("valid time")
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = parse_timestamp("2025-03-10 05:00:00").expect("plain");
        assert_eq!(parse_timestamp("2025-03-10T05:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-10T05:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-10T10:00:00+05:00"), Some(expected));
        assert!(parse_timestamp("2025-03-10 05:00:00.250").is_some());
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_create_sets_initial_status() {
        let lead = Lead::create("a@b.kz", Some("conv"), None, Intent::WantApply);
        assert_eq!(lead.status(), LeadStatus::QuestionnaireSent);
        assert_eq!(lead.subject, "No Subject");
        assert!(lead.message_id.as_deref().is_some_and(|m| m.starts_with("gen_")));

        let lead = Lead::create("a@b.kz", None, Some("Виза"), Intent::InfoRequest);
        assert_eq!(lead.status(), LeadStatus::InfoProvided);

        let lead = Lead::create("a@b.kz", None, None, Intent::Gratitude);
        assert_eq!(lead.status(), LeadStatus::New);
    }

    #[test]
    fn test_save_insert_then_update() {
        let (_dir, store) = store();
        let mut lead = Lead::create("client@mail.kz", Some("conv-1"), Some("Виза"), Intent::WantApply);
        let id = store.save(&mut lead).expect("insert");
        assert_eq!(lead.id, Some(id));

        lead.visa_country = Some("PL".to_string());
        lead.questionnaire_status = QuestionnaireStatus::Sent;
        assert_eq!(store.save(&mut lead).expect("update"), id);

        let loaded = store.get_by_id(id).expect("query").expect("lead exists");
        assert_eq!(loaded.visa_country.as_deref(), Some("PL"));
        assert_eq!(loaded.questionnaire_status, QuestionnaireStatus::Sent);
        assert!(loaded.created_at.is_some());
        assert_eq!(
            loaded.last_contacted.map(format_timestamp),
            lead.last_contacted.map(format_timestamp)
        );
    }

    #[test]
    fn test_save_without_id_reuses_message_row() {
        let (_dir, store) = store();
        let mut first = Lead {
            message_id: Some("m-1".to_string()),
            from_address: "a@b.kz".to_string(),
            ..Lead::default()
        };
        let id = store.save(&mut first).expect("insert");

        let mut again = Lead {
            message_id: Some("m-1".to_string()),
            from_address: "a@b.kz".to_string(),
            subject: "updated".to_string(),
            ..Lead::default()
        };
        assert_eq!(store.save(&mut again).expect("update"), id);
        let loaded = store.get_by_message("m-1").expect("query").expect("lead");
        assert_eq!(loaded.subject, "updated");
    }

    #[test]
    fn test_update_missing_id_fails() {
        let (_dir, store) = store();
        let mut ghost = Lead {
            id: Some(999),
            ..Lead::default()
        };
        assert!(matches!(
            store.save(&mut ghost),
            Err(LeadEngineError::LeadNotFound(_))
        ));
    }

    #[test]
    fn test_lookups() {
        let (_dir, store) = store();
        let mut older = Lead::create("Client@Mail.kz", Some("conv-1"), None, Intent::Other);
        older.message_id = Some("m-1".to_string());
        store.save(&mut older).expect("save");
        let mut newer = Lead::create("client@mail.kz", Some("conv-2"), None, Intent::Other);
        newer.message_id = Some("m-2".to_string());
        let newer_id = store.save(&mut newer).expect("save");

        assert_eq!(
            store.get_by_conversation("conv-1").expect("query").and_then(|l| l.id),
            older.id
        );
        assert_eq!(
            store.get_by_email("CLIENT@mail.kz").expect("query").and_then(|l| l.id),
            Some(newer_id)
        );
        assert!(store.get_by_conversation("missing").expect("query").is_none());
    }

    #[test]
    fn test_reminder_lifecycle_and_audit() {
        let (_dir, store) = store();
        let mut lead = Lead::create("client@mail.kz", Some("conv"), None, Intent::WantApply);

        store
            .schedule_first_reminder(&mut lead, 1, at(6))
            .expect("schedule");
        assert_eq!(
            lead.next_reminder_at.map(format_timestamp).as_deref(),
            Some("2025-03-11 05:00:00")
        );

        assert!(store.get_due_reminders(at(6)).expect("due").is_empty());
        let tomorrow = at(6) + chrono::TimeDelta::days(1);
        let due = store.get_due_reminders(tomorrow).expect("due");
        assert_eq!(due.len(), 1);

        store
            .schedule_next_reminder(&mut lead, 3, tomorrow)
            .expect("next");
        assert_eq!(lead.reminders_sent, 1);

        store.mark_closed(&mut lead).expect("close");
        assert!(lead.is_closed());
        assert!(store
            .get_due_reminders(tomorrow + chrono::TimeDelta::days(30))
            .expect("due")
            .is_empty());

        let id = lead.id.expect("saved");
        let events: Vec<String> = store
            .audit_trail(id)
            .expect("trail")
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(
            events,
            ["schedule_first_reminder", "schedule_next_reminder", "status_change"]
        );
        let trail = store.audit_trail(id).expect("trail");
        assert_eq!(trail[2].details.as_deref(), Some("questionnaire_sent -> closed"));
    }

    #[test]
    fn test_pending_form_acks() {
        let (_dir, store) = store();
        let mut filled = Lead::create("filled@mail.kz", None, None, Intent::SendDocs);
        filled.message_id = Some("m-filled".to_string());
        filled.questionnaire_status = QuestionnaireStatus::Filled;
        store.save(&mut filled).expect("save");

        let mut sent = Lead::create("sent@mail.kz", None, None, Intent::WantApply);
        sent.message_id = Some("m-sent".to_string());
        sent.questionnaire_status = QuestionnaireStatus::Sent;
        store.save(&mut sent).expect("save");

        let mut anonymous = Lead {
            message_id: Some("m-anon".to_string()),
            questionnaire_status: QuestionnaireStatus::Filled,
            ..Lead::default()
        };
        store.save(&mut anonymous).expect("save");

        let pending = store.get_pending_form_acks().expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, filled.id);

        store.mark_form_ack_sent(&mut filled).expect("ack");
        assert!(store.get_pending_form_acks().expect("pending").is_empty());
    }

    #[test]
    fn test_closed_lead_reads_as_new_status() {
        let lead = Lead {
            status: CLOSED_STATUS.to_string(),
            ..Lead::default()
        };
        assert_eq!(lead.status(), LeadStatus::New);
        assert!(lead.is_closed());
    }
}
