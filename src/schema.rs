//! Database schema definitions
//!
//! Table and column names for the shared lead store, plus the DDL that
//! creates it. The CRM reads the same file, so names and the plain-text
//! status column must not change.

/// Leads table schema
pub mod leads {
    /// Table name
    pub const TABLE: &str = "leads";
    /// Primary key column
    pub const ID: &str = "id";
    /// Graph id of the message that created or last touched the lead
    pub const MESSAGE_ID: &str = "message_id";
    /// Graph conversation id
    pub const CONVERSATION_ID: &str = "conversation_id";
    /// Client address column
    pub const FROM_ADDRESS: &str = "from_address";
    /// Subject column
    pub const SUBJECT: &str = "subject";
    /// Funnel status, stored as its wire string
    pub const STATUS: &str = "status";
    /// Destination code column
    pub const VISA_COUNTRY: &str = "visa_country";
    /// none / sent / filled
    pub const QUESTIONNAIRE_STATUS: &str = "questionnaire_status";
    /// Form id of the questionnaire sent
    pub const QUESTIONNAIRE_FORM_ID: &str = "questionnaire_form_id";
    /// Response id once the questionnaire is filled
    pub const QUESTIONNAIRE_RESPONSE_ID: &str = "questionnaire_response_id";
    /// Last processed message column
    pub const LAST_MESSAGE_ID: &str = "last_message_id";
    /// Last contact timestamp (UTC)
    pub const LAST_CONTACTED: &str = "last_contacted";
    /// Next follow-up timestamp (UTC)
    pub const NEXT_REMINDER_AT: &str = "next_reminder_at";
    /// Follow-ups already sent
    pub const REMINDERS_SENT: &str = "reminders_sent";
    /// Questionnaire receipt acknowledged
    pub const FORM_ACK_SENT: &str = "form_ack_sent";
    /// Conversation summary column
    pub const SUMMARY: &str = "summary";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
}

/// Audit log table schema
pub mod audit_log {
    /// Table name
    pub const TABLE: &str = "audit_log";
    /// Primary key column
    pub const ID: &str = "id";
    /// Lead the event belongs to
    pub const LEAD_ID: &str = "lead_id";
    /// Event name column
    pub const EVENT: &str = "event";
    /// Free-text details column
    pub const DETAILS: &str = "details";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
}

/// DDL for both tables; safe to run on every open
pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY,
    message_id TEXT,
    conversation_id TEXT,
    from_address TEXT,
    subject TEXT,
    status TEXT,
    visa_country TEXT,
    questionnaire_status TEXT DEFAULT 'none',
    questionnaire_form_id TEXT,
    questionnaire_response_id TEXT,
    last_message_id TEXT,
    last_contacted TEXT,
    next_reminder_at TEXT,
    reminders_sent INTEGER DEFAULT 0,
    form_ack_sent INTEGER DEFAULT 0,
    summary TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY,
    lead_id INTEGER,
    event TEXT,
    details TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_leads_conversation ON leads(conversation_id);
CREATE INDEX IF NOT EXISTS idx_leads_message ON leads(message_id);
CREATE INDEX IF NOT EXISTS idx_audit_lead ON audit_log(lead_id);
";
