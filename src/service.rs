//! Lead service: the per-message pipeline
//!
//! Ties the analyzer, the reply generator and the lead store together:
//! one incoming Graph message in, one stored lead update and one reply (or a
//! forward to a specialist) out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::analyzer::ThreadAnalyzer;
use crate::db::{Lead, LeadStore, NURTURING_DONE_STATUS};
use crate::error::{LeadEngineError, Result};
use crate::forms::{form_block, ExistingForms, FormIds, FormLinks, FormType};
use crate::logging::OperationTimer;
use crate::models::{GraphMessage, Intent, LeadStatus, Message, QuestionnaireStatus};
use crate::nlp::TextNormalizer;
use crate::reply::ReplyGenerator;
use crate::utils::{tail_chars, text_to_html};

/// Reply sent when the completion backend returns nothing
pub const FALLBACK_REPLY: &str =
    "Спасибо за обращение! Мы получили ваше письмо и вернёмся к вам с ответом в ближайшее время.";

/// Follow-up sent when the completion backend returns nothing
pub const FOLLOW_UP_FALLBACK: &str = "Добрый день! Напоминаем о вашей заявке на визу. \
Если у вас остались вопросы, просто ответьте на это письмо, и мы с радостью поможем.";

/// Subject of a questionnaire acknowledgment sent outside a thread
pub const FORM_ACK_SUBJECT: &str = "Анкета получена";

const ASK_FORM_PHRASES: [&str; 12] = [
    "заполню вашу форму",
    "готов заполнить форму",
    "готов заполнить анкету",
    "заполню анкету",
    "можно вашу анкету",
    "можно вашу форму",
    "скиньте анкету",
    "скиньте форму",
    "пришлите анкету",
    "пришлите форму",
    "давайте я заполню вашу форму",
    "давайте я заполню анкету",
];

const FORM_WORDS: [&str; 3] = ["анкета", "форму", "формы"];

const DESTINATION_STEMS: [&str; 9] = [
    "польш", "poland", "italy", "итал", "france", "франц", "шенген", "usa", "сша",
];

/// Size limits applied when turning a Graph thread into messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadLimits {
    /// Messages kept from the end of the thread
    pub max_thread_messages: usize,
    /// Characters of raw body kept before stripping markup
    pub max_body_html_raw_chars: usize,
    /// Characters of clean body kept
    pub max_body_chars: usize,
}

impl Default for ThreadLimits {
    fn default() -> Self {
        Self {
            max_thread_messages: 6,
            max_body_html_raw_chars: 20_000,
            max_body_chars: 3_000,
        }
    }
}

/// Bounded conversion of Graph messages for the pipeline
#[derive(Debug, Clone)]
pub struct ThreadBuilder {
    limits: ThreadLimits,
    normalizer: Arc<TextNormalizer>,
}

impl ThreadBuilder {
    /// Create a builder
    #[must_use]
    pub const fn new(limits: ThreadLimits, normalizer: Arc<TextNormalizer>) -> Self {
        Self { limits, normalizer }
    }

    /// Clean body of one message: full body (or preview), raw tail, markup
    /// stripped, clean tail
    #[must_use]
    pub fn body_text(&self, message: &GraphMessage) -> String {
        let content = message.body_content();
        let raw = if content.is_empty() {
            message.body_preview.as_deref().unwrap_or_default()
        } else {
            content
        };
        let raw = tail_chars(raw, self.limits.max_body_html_raw_chars);
        let clean = self.normalizer.strip_markup(raw);
        tail_chars(&clean, self.limits.max_body_chars).to_string()
    }

    /// Last messages of the thread; an empty thread is just `fallback`
    #[must_use]
    pub fn build(&self, thread: &[GraphMessage], fallback: &GraphMessage) -> Vec<Message> {
        let source = if thread.is_empty() {
            std::slice::from_ref(fallback)
        } else {
            thread
        };
        let start = source.len().saturating_sub(self.limits.max_thread_messages);

        source[start..]
            .iter()
            .map(|graph| Message {
                from_address: graph.sender_address().to_string(),
                subject: graph.subject.clone().unwrap_or_default(),
                body: self.body_text(graph),
                received_at: graph.received_date_time.clone(),
                attachments: graph.attachments.iter().map(|a| a.name.clone()).collect(),
                message_id: graph.id.clone(),
            })
            .collect()
    }
}

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Our mailbox; its own messages are skipped
    pub mailbox_address: String,
    /// Questionnaire URLs
    pub form_links: FormLinks,
    /// Questionnaire ids
    pub form_ids: FormIds,
    /// Thread size limits
    pub limits: ThreadLimits,
    /// Days until the first follow-up
    pub first_reminder_days: u32,
    /// Days until the second follow-up
    pub second_reminder_days: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            mailbox_address: "RobotVisa@itplus.kz".to_string(),
            form_links: FormLinks::default(),
            form_ids: FormIds::default(),
            limits: ThreadLimits::default(),
            first_reminder_days: 1,
            second_reminder_days: 3,
        }
    }
}

/// What the pipeline decided for one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Nothing to do
    Skipped {
        /// Why
        reason: String,
    },
    /// Route the thread to a specialist instead of replying
    Forward {
        /// Known lead, if any
        lead_id: Option<i64>,
        /// Escalation address
        to: String,
        /// Why
        reason: String,
    },
    /// Send this reply
    Reply {
        /// Stored lead
        lead_id: i64,
        /// Detected intent
        intent: Intent,
        /// Plain-text reply
        text: String,
        /// HTML rendering of `text`
        html: String,
        /// Questionnaire appended to the reply
        form: Option<FormType>,
    },
}

/// A follow-up ready for the mail transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUp {
    /// Lead the follow-up belongs to
    pub lead_id: i64,
    /// 1 for the first follow-up, 2 for the last
    pub stage: u8,
    /// Client address
    pub to: String,
    /// Message to reply to; a new mail is sent when absent
    pub reply_to: Option<String>,
    /// Subject for a new mail
    pub subject: String,
    /// Plain-text body
    pub text: String,
    /// HTML rendering of `text`
    pub html: String,
}

/// A questionnaire receipt acknowledgment ready for the mail transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormAck {
    /// Lead the acknowledgment belongs to
    pub lead_id: i64,
    /// Client address
    pub to: String,
    /// Message to reply to; a new mail is sent when absent
    pub reply_to: Option<String>,
    /// Subject for a new mail
    pub subject: String,
    /// Plain-text body
    pub text: String,
    /// HTML rendering of `text`
    pub html: String,
}

/// Body of the questionnaire receipt acknowledgment
#[must_use]
pub fn form_ack_text(footer: Option<&str>) -> String {
    let footer = footer
        .filter(|f| !f.trim().is_empty())
        .map(|f| format!("\n\n{}", f.trim()))
        .unwrap_or_default();
    format!(
        "Добрый день!\nМы получили вашу анкету и передали её специалистам на проверку.\n\
         Скоро вернемся с обратной связью.{footer}"
    )
}

/// Forms already sent to a lead.
///
/// A form counts only while the questionnaire is sent or filled and the
/// lead's country or recorded form id points at it.
#[must_use]
pub fn existing_forms_for_lead(lead: Option<&Lead>, form_ids: &FormIds) -> ExistingForms {
    let Some(lead) = lead else {
        return ExistingForms::none();
    };
    if !lead.questionnaire_status.is_active() {
        return ExistingForms::none();
    }

    let country = lead
        .visa_country
        .as_deref()
        .map(|c| c.trim().to_uppercase())
        .unwrap_or_default();
    let recorded = lead
        .questionnaire_form_id
        .as_deref()
        .and_then(|id| form_ids.form_for_id(id));

    [FormType::Poland, FormType::Schengen, FormType::Usa, FormType::Generic]
        .into_iter()
        .filter(|form| {
            let by_country = *form != FormType::Generic
                && !country.is_empty()
                && FormType::for_country_code(&country) == *form;
            by_country || recorded == Some(*form)
        })
        .fold(ExistingForms::none(), ExistingForms::with)
}

/// Whether the reply to this message should carry a questionnaire
#[must_use]
pub fn should_send_questionnaire(
    intent: Intent,
    lead: Option<&Lead>,
    message_text: &str,
    base_needs_form: bool,
) -> bool {
    if lead.is_some_and(|l| l.questionnaire_status.is_active()) {
        return false;
    }

    let text = message_text.trim().to_lowercase();
    if ASK_FORM_PHRASES.iter().any(|p| text.contains(p)) {
        return true;
    }
    if base_needs_form || intent == Intent::WantApply {
        return true;
    }

    FORM_WORDS.iter().any(|w| text.contains(w)) && DESTINATION_STEMS.iter().any(|s| text.contains(s))
}

/// Extra prompt context for a follow-up
#[must_use]
pub fn reminder_context(lead: &Lead) -> serde_json::Value {
    json!({
        "task": "generate_followup",
        "stage": if lead.reminders_sent == 0 { 1 } else { 2 },
        "lead_id": lead.id,
    })
}

/// Processes incoming mail for leads
#[derive(Debug, Clone)]
pub struct LeadService {
    analyzer: ThreadAnalyzer,
    replies: ReplyGenerator,
    store: LeadStore,
    threads: ThreadBuilder,
    settings: ServiceSettings,
}

impl LeadService {
    /// Create a service
    #[must_use]
    pub const fn new(
        analyzer: ThreadAnalyzer,
        replies: ReplyGenerator,
        store: LeadStore,
        threads: ThreadBuilder,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            analyzer,
            replies,
            store,
            threads,
            settings,
        }
    }

    /// The lead store
    #[must_use]
    pub const fn store(&self) -> &LeadStore {
        &self.store
    }

    /// Pipeline settings
    #[must_use]
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Run the pipeline for one incoming message and its thread
    pub async fn process_incoming(
        &self,
        message: &GraphMessage,
        thread: &[GraphMessage],
    ) -> Result<ProcessOutcome> {
        let timer = OperationTimer::new("process_incoming");
        let sender = message.sender_address().trim().to_lowercase();

        if sender.is_empty() {
            return Ok(ProcessOutcome::Skipped {
                reason: "message has no sender".to_string(),
            });
        }
        if sender == self.settings.mailbox_address.to_lowercase() {
            return Ok(ProcessOutcome::Skipped {
                reason: "message sent by our mailbox".to_string(),
            });
        }

        let conversation_id = message.conversation_id.as_deref();
        let message_id = message.id.as_deref();
        info!(
            conversation = conversation_id.unwrap_or("-"),
            from = %sender,
            subject = message.subject.as_deref().unwrap_or(""),
            "Incoming message"
        );

        let messages = self.threads.build(thread, message);
        let body_text = self.threads.body_text(message);

        let mut lead = match conversation_id {
            Some(id) => self.store.get_by_conversation(id)?,
            None => None,
        };
        if lead.is_none() {
            if let Some(id) = message_id {
                lead = self.store.get_by_message(id)?;
            }
        }

        if let (Some(known), Some(id)) = (lead.as_ref(), message_id) {
            if known.last_message_id.as_deref() == Some(id) {
                debug!(lead_id = known.id, message = id, "Message already processed");
                return Ok(ProcessOutcome::Skipped {
                    reason: "message already processed".to_string(),
                });
            }
        }

        let existing = existing_forms_for_lead(lead.as_ref(), &self.settings.form_ids);
        let analysis = self.analyzer.analyze(
            &messages,
            &self.settings.mailbox_address,
            lead.as_ref().map(|l| l.status.as_str()),
            &existing,
        );

        if let (Some(to), Some(reason)) = (&analysis.forward_to_email, &analysis.forward_reason) {
            let lead_id = lead.as_ref().and_then(|l| l.id);
            if let Some(id) = lead_id {
                self.store.log_event(id, "forwarded", &format!("to={to}, reason={reason}"))?;
            }
            info!(lead_id, to = %to, reason = %reason, "Thread forwarded");
            timer.finish();
            return Ok(ProcessOutcome::Forward {
                lead_id,
                to: to.clone(),
                reason: reason.clone(),
            });
        }

        let now = Utc::now();
        let mut lead = match lead {
            Some(mut lead) => {
                if let Some(id) = message_id {
                    lead.message_id = Some(id.to_string());
                }
                if conversation_id.is_some() {
                    lead.conversation_id = conversation_id.map(ToString::to_string);
                }
                lead.from_address.clone_from(&sender);
                if let Some(subject) = message.subject.as_deref() {
                    lead.subject = subject.to_string();
                }
                lead.last_contacted = Some(now.naive_utc());
                lead
            }
            None => {
                let mut lead = Lead::create(
                    &sender,
                    conversation_id,
                    message.subject.as_deref(),
                    analysis.intent,
                );
                if let Some(id) = message_id {
                    lead.message_id = Some(id.to_string());
                }
                lead
            }
        };
        lead.set_status(analysis.new_status);
        if let Some(code) = analysis.country_code() {
            lead.visa_country = Some(code.to_string());
        }
        let country_code = lead.visa_country.clone();

        let base_needs_form = analysis.needs_form();
        let needs_form =
            should_send_questionnaire(analysis.intent, Some(&lead), &body_text, base_needs_form);
        let form = if needs_form {
            analysis
                .selected_form
                .or_else(|| country_code.as_deref().map(FormType::for_country_code))
        } else {
            None
        };

        if let Some(form) = form {
            if lead.questionnaire_status != QuestionnaireStatus::Filled {
                lead.questionnaire_status = QuestionnaireStatus::Sent;
            }
            if let Some(id) = self.settings.form_ids.get(form) {
                lead.questionnaire_form_id = Some(id.to_string());
            }
        }
        lead.last_message_id = message_id.map(ToString::to_string);

        let lead_id = self.store.save(&mut lead)?;

        let wants_follow_up = matches!(analysis.intent, Intent::WantApply | Intent::InfoRequest);
        if wants_follow_up
            && analysis.new_status != LeadStatus::Cancelled
            && lead.next_reminder_at.is_none()
        {
            self.store
                .schedule_first_reminder(&mut lead, self.settings.first_reminder_days, now)?;
        }

        self.store.log_event(
            lead_id,
            "user_message",
            &format!(
                "intent={}, country={}, needs_form={needs_form}, base_needs_form={base_needs_form}, form_code={}",
                analysis.intent,
                country_code.as_deref().unwrap_or("None"),
                form.map_or("None", FormType::as_str),
            ),
        )?;

        let mut text = self
            .replies
            .generate(&messages, &analysis, &self.settings.form_links, None, None)
            .await;
        if text.trim().is_empty() {
            text = FALLBACK_REPLY.to_string();
        }

        if let Some(form) = form {
            let block = form_block(form, &self.settings.form_links);
            if !block.is_empty() {
                text = format!("{}\n\n{block}", text.trim_end());
            }
        }

        self.store
            .log_event(lead_id, "bot_reply", &format!("Intent: {}", analysis.intent))?;
        info!(
            lead_id,
            intent = %analysis.intent,
            status = %lead.status,
            form = form.map_or("none", FormType::as_str),
            elapsed_ms = timer.elapsed().as_millis(),
            "Reply prepared"
        );

        Ok(ProcessOutcome::Reply {
            lead_id,
            intent: analysis.intent,
            html: text_to_html(&text),
            text,
            form,
        })
    }

    /// Reschedule follow-ups after one was sent; after the second one the
    /// lead is marked as nurtured and reminders stop
    pub fn complete_reminder(&self, lead: &mut Lead, now: DateTime<Utc>) -> Result<()> {
        if lead.reminders_sent == 0 {
            self.store
                .schedule_next_reminder(lead, self.settings.second_reminder_days, now)
        } else {
            lead.status = NURTURING_DONE_STATUS.to_string();
            self.store.stop_reminders(lead)
        }
    }

    /// Generate the due follow-up for a lead and advance its schedule.
    ///
    /// Returns `None` outside local working hours; nothing is changed then.
    pub async fn follow_up(
        &self,
        lead: &mut Lead,
        thread: &[GraphMessage],
        now: DateTime<Utc>,
    ) -> Result<Option<FollowUp>> {
        if !self.store.clock().is_working_hours(now) {
            debug!(lead_id = lead.id, "Outside working hours, follow-up postponed");
            return Ok(None);
        }
        let lead_id = lead
            .id
            .ok_or_else(|| LeadEngineError::LeadNotFound(lead.from_address.clone()))?;

        let messages = thread
            .last()
            .map(|last| self.threads.build(thread, last))
            .unwrap_or_default();
        let existing = existing_forms_for_lead(Some(&*lead), &self.settings.form_ids);
        let analysis = self.analyzer.analyze(
            &messages,
            &self.settings.mailbox_address,
            Some(lead.status.as_str()),
            &existing,
        );

        let context = reminder_context(lead);
        let stage = if lead.reminders_sent == 0 { 1 } else { 2 };
        let mut text = self
            .replies
            .generate(&messages, &analysis, &self.settings.form_links, Some(&context), None)
            .await;
        if text.trim().is_empty() {
            text = FOLLOW_UP_FALLBACK.to_string();
        }

        self.store
            .log_event(lead_id, "follow_up", &format!("stage={stage}"))?;
        self.complete_reminder(lead, now)?;
        info!(lead_id, stage, status = %lead.status, "Follow-up prepared");

        Ok(Some(FollowUp {
            lead_id,
            stage,
            to: lead.from_address.clone(),
            reply_to: thread.first().and_then(|m| m.id.clone()),
            subject: format!("Re: {}", lead.subject),
            html: text_to_html(&text),
            text,
        }))
    }

    /// Acknowledge every filled questionnaire that was not acknowledged yet.
    ///
    /// Each returned lead is marked as acknowledged, so a second call returns
    /// nothing new.
    pub fn acknowledge_forms(&self, footer: Option<&str>) -> Result<Vec<FormAck>> {
        let text = form_ack_text(footer);
        let mut acks = Vec::new();

        for mut lead in self.store.get_pending_form_acks()? {
            self.store.mark_form_ack_sent(&mut lead)?;
            let lead_id = lead.id.unwrap_or_default();
            info!(lead_id, to = %lead.from_address, "Form acknowledgment prepared");
            acks.push(FormAck {
                lead_id,
                to: lead.from_address.clone(),
                reply_to: lead.last_message_id.clone(),
                subject: FORM_ACK_SUBJECT.to_string(),
                text: text.clone(),
                html: text_to_html(&text),
            });
        }

        Ok(acks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GraphBody, GraphEmailAddress, GraphRecipient};

    fn graph(from: &str, body: &str) -> GraphMessage {
        GraphMessage {
            id: Some("m-1".to_string()),
            conversation_id: Some("c-1".to_string()),
            subject: Some("Виза".to_string()),
            body_preview: Some("preview".to_string()),
            body: Some(GraphBody::Content {
                content: body.to_string(),
            }),
            from: Some(GraphRecipient {
                email_address: GraphEmailAddress {
                    address: from.to_string(),
                    name: None,
                },
            }),
            ..GraphMessage::default()
        }
    }

    fn builder(limits: ThreadLimits) -> ThreadBuilder {
        ThreadBuilder::new(
            limits,
            Arc::new(TextNormalizer::new(8000).expect("Failed to create normalizer")),
        )
    }

    #[test]
    fn test_body_text_strips_and_truncates() {
        let threads = builder(ThreadLimits {
            max_thread_messages: 6,
            max_body_html_raw_chars: 30,
            max_body_chars: 8,
        });
        let message = graph("a@b.kz", "<p>ignored head</p>\r\n<div>Хочу   визу в Польшу</div>");
        assert_eq!(threads.body_text(&message), "в Польшу");

        let mut preview_only = graph("a@b.kz", "");
        preview_only.body = None;
        assert_eq!(threads.body_text(&preview_only), "preview");
    }

    #[test]
    fn test_build_keeps_last_messages() {
        let threads = builder(ThreadLimits {
            max_thread_messages: 2,
            ..ThreadLimits::default()
        });
        let thread: Vec<GraphMessage> = (0..4).map(|i| graph("a@b.kz", &format!("msg {i}"))).collect();
        let built = threads.build(&thread, &graph("a@b.kz", "fallback"));
        let bodies: Vec<&str> = built.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["msg 2", "msg 3"]);

        let built = threads.build(&[], &graph("a@b.kz", "fallback"));
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].body, "fallback");
    }

    #[test]
    fn test_should_send_questionnaire() {
        assert!(should_send_questionnaire(Intent::WantApply, None, "", false));
        assert!(should_send_questionnaire(Intent::Other, None, "", true));
        assert!(should_send_questionnaire(Intent::Other, None, "Пришлите анкету, пожалуйста", false));
        assert!(should_send_questionnaire(Intent::Other, None, "Где анкета на Польшу?", false));
        assert!(!should_send_questionnaire(Intent::Other, None, "Где анкета?", false));

        let sent = Lead {
            questionnaire_status: QuestionnaireStatus::Sent,
            ..Lead::default()
        };
        assert!(!should_send_questionnaire(Intent::WantApply, Some(&sent), "скиньте анкету", true));
    }

    #[test]
    fn test_existing_forms_need_active_questionnaire() {
        let ids = FormIds {
            usa: Some("usa-form".to_string()),
            ..FormIds::default()
        };
        let mut lead = Lead {
            visa_country: Some("it".to_string()),
            ..Lead::default()
        };
        assert_eq!(existing_forms_for_lead(Some(&lead), &ids), ExistingForms::none());

        lead.questionnaire_status = QuestionnaireStatus::Filled;
        lead.questionnaire_form_id = Some("usa-form".to_string());
        let existing = existing_forms_for_lead(Some(&lead), &ids);
        assert!(existing.schengen);
        assert!(existing.usa);
        assert!(!existing.poland);
        assert!(!existing.generic);

        assert_eq!(existing_forms_for_lead(None, &ids), ExistingForms::none());
    }

    #[test]
    fn test_form_ack_text() {
        let plain = form_ack_text(None);
        assert!(plain.starts_with("Добрый день!\nМы получили вашу анкету"));
        assert!(plain.ends_with("Скоро вернемся с обратной связью."));
        assert_eq!(form_ack_text(Some("  ")), plain);
        assert!(form_ack_text(Some("BCD Travel")).ends_with("связью.\n\nBCD Travel"));
    }

    #[test]
    fn test_reminder_context_stage() {
        let mut lead = Lead {
            id: Some(7),
            ..Lead::default()
        };
        assert_eq!(
            reminder_context(&lead),
            json!({"task": "generate_followup", "stage": 1, "lead_id": 7})
        );
        lead.reminders_sent = 1;
        assert_eq!(reminder_context(&lead)["stage"], 2);
    }
}
