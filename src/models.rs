//! Data models shared by the classifier, the reply generator and the lead store
//!
//! Every enumeration here crosses a serialization boundary (the shared SQLite
//! store, the classification report, the CRM label table), so each one has a
//! fixed wire string and a lossless `as_str` / `FromStr` pair.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::country::Country;
use crate::forms::{FormType, SelectedForm};

/// Languages the classifier distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// Russian, also the fallback for weak or mixed signal
    #[default]
    #[serde(rename = "ru")]
    Russian,
    /// English
    #[serde(rename = "en")]
    English,
    /// Kazakh
    #[serde(rename = "kk")]
    Kazakh,
}

impl Language {
    /// All languages in scoring order
    pub const ALL: [Self; 3] = [Self::Russian, Self::English, Self::Kazakh];

    /// Wire code of the language
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Russian => "ru",
            Self::English => "en",
            Self::Kazakh => "kk",
        }
    }

    /// Replies are written in English only for English threads
    #[must_use]
    pub const fn is_english(self) -> bool {
        matches!(self, Self::English)
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ru" => Ok(Self::Russian),
            "en" => Ok(Self::English),
            "kk" => Ok(Self::Kazakh),
            other => Err(format!("Unknown language code: {other}")),
        }
    }
}

/// Purpose of a client's message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Wants to apply for a visa
    WantApply,
    /// Sends documents
    SendDocs,
    /// Asks for information
    InfoRequest,
    /// Asks about progress
    Followup,
    /// Complains
    Complaint,
    /// Thanks
    Gratitude,
    /// Cancels the application
    Cancellation,
    /// Moves an appointment
    Reschedule,
    /// Payment questions
    Payment,
    /// Nothing recognisable
    #[default]
    Other,
}

impl Intent {
    /// All intents in declaration order; score ties resolve to the earliest
    pub const ALL: [Self; 10] = [
        Self::WantApply,
        Self::SendDocs,
        Self::InfoRequest,
        Self::Followup,
        Self::Complaint,
        Self::Gratitude,
        Self::Cancellation,
        Self::Reschedule,
        Self::Payment,
        Self::Other,
    ];

    /// Wire string of the intent
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WantApply => "want_apply",
            Self::SendDocs => "send_docs",
            Self::InfoRequest => "info_request",
            Self::Followup => "followup",
            Self::Complaint => "complaint",
            Self::Gratitude => "gratitude",
            Self::Cancellation => "cancellation",
            Self::Reschedule => "reschedule",
            Self::Payment => "payment",
            Self::Other => "other",
        }
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == wanted)
            .ok_or_else(|| format!("Unknown intent: {s}"))
    }
}

/// Position of a lead in the application funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// First contact
    #[default]
    New,
    /// General information was sent
    InfoProvided,
    /// Questionnaire link was sent
    QuestionnaireSent,
    /// Questionnaire came back
    QuestionnaireFilled,
    /// Documents are being collected
    DocsInProgress,
    /// All documents are in
    DocsCollected,
    /// Package is ready for the consulate
    ReadyForSubmission,
    /// Package was submitted
    Submitted,
    /// Consulate interview is booked
    InterviewScheduled,
    /// Visa approved
    Approved,
    /// Visa refused
    Rejected,
    /// Case closed successfully
    Completed,
    /// Client cancelled
    Cancelled,
}

impl LeadStatus {
    /// Every status in funnel order
    pub const ALL: [Self; 13] = [
        Self::New,
        Self::InfoProvided,
        Self::QuestionnaireSent,
        Self::QuestionnaireFilled,
        Self::DocsInProgress,
        Self::DocsCollected,
        Self::ReadyForSubmission,
        Self::Submitted,
        Self::InterviewScheduled,
        Self::Approved,
        Self::Rejected,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Wire string shared with the CRM
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InfoProvided => "info_provided",
            Self::QuestionnaireSent => "questionnaire_sent",
            Self::QuestionnaireFilled => "questionnaire_filled",
            Self::DocsInProgress => "docs_in_progress",
            Self::DocsCollected => "docs_collected",
            Self::ReadyForSubmission => "ready_for_submission",
            Self::Submitted => "submitted",
            Self::InterviewScheduled => "interview_scheduled",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Resolve a stored status string. Missing, empty or unknown values are `New`.
    #[must_use]
    pub fn from_wire(value: Option<&str>) -> Self {
        value
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("Unknown lead status: {s}"))
    }
}

/// How soon the client needs an answer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    /// No rush at all
    Low = 0,
    /// Ordinary priority
    #[default]
    Normal = 1,
    /// Wants it this week
    Medium = 2,
    /// ASAP
    High = 3,
    /// Flight today or tomorrow
    Critical = 4,
}

impl UrgencyLevel {
    /// Upper-case name used in reports
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Numeric rank, 0 (low) to 4 (critical)
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Anything above normal counts as urgent in the classification report
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::Critical | Self::High | Self::Medium)
    }

    /// Critical and high urgency must be acknowledged in the reply
    #[must_use]
    pub const fn needs_acknowledgement(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl FromStr for UrgencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "NORMAL" => Ok(Self::Normal),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("Unknown urgency level: {other}")),
        }
    }
}

/// Visa processing category of a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaCategory {
    /// Self-serve questionnaire flow
    Standard,
    /// Routed to a specialist
    NonStandard,
    /// Visa-free or electronic visa
    Simple,
}

impl VisaCategory {
    /// Wire string of the category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::NonStandard => "non_standard",
            Self::Simple => "simple",
        }
    }
}

/// Tone of the client's messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// More positive than negative markers
    Positive,
    /// Balanced or no markers
    #[default]
    Neutral,
    /// More negative than positive markers
    Negative,
}

impl Sentiment {
    /// Wire string of the sentiment
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of the questionnaire attached to a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionnaireStatus {
    /// Nothing sent yet
    #[default]
    None,
    /// Link was sent
    Sent,
    /// Answers received
    Filled,
}

impl QuestionnaireStatus {
    /// Wire string stored in the `leads` table
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sent => "sent",
            Self::Filled => "filled",
        }
    }

    /// Sent or filled questionnaires must not be offered again
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Sent | Self::Filled)
    }

    /// Unknown stored values read as `None`
    #[must_use]
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("sent") => Self::Sent,
            Some("filled") => Self::Filled,
            _ => Self::None,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(Language, Intent, LeadStatus, VisaCategory, QuestionnaireStatus);

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One email in a thread
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Sender address
    pub from_address: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// Received timestamp as delivered by the mail transport
    pub received_at: Option<String>,
    /// Attachment file names
    pub attachments: Vec<String>,
    /// Transport message id
    pub message_id: Option<String>,
}

impl Message {
    /// Create a message without timestamp or attachments
    #[must_use]
    pub fn new(from_address: &str, subject: &str, body: &str) -> Self {
        Self {
            from_address: from_address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            ..Self::default()
        }
    }

    /// A bare text with no sender or subject
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::new("", "", text)
    }

    /// Attach file names
    #[must_use]
    pub fn with_attachments<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attachments = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the received timestamp
    #[must_use]
    pub fn received(mut self, at: &str) -> Self {
        self.received_at = Some(at.to_string());
        self
    }

    /// Subject and body joined by a newline, skipping empty parts
    #[must_use]
    pub fn full_text(&self) -> String {
        match (self.subject.is_empty(), self.body.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.subject.clone(),
            (true, false) => self.body.clone(),
            (false, false) => format!("{}\n{}", self.subject, self.body),
        }
    }

    /// Whether this message carries any attachments
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Whether the message was sent by the given mailbox (case-insensitive)
    #[must_use]
    pub fn is_from(&self, address: &str) -> bool {
        self.from_address.to_lowercase() == address.to_lowercase()
    }

    /// Convert a Graph message, preferring the preview over the full body
    #[must_use]
    pub fn from_graph(graph: &GraphMessage) -> Self {
        let preview = graph.body_preview.clone().unwrap_or_default();
        let body = if preview.is_empty() {
            graph.body_content().to_string()
        } else {
            preview
        };

        Self {
            from_address: graph.sender_address().to_string(),
            subject: graph.subject.clone().unwrap_or_default(),
            body,
            received_at: graph.received_date_time.clone(),
            attachments: graph.attachments.iter().map(|a| a.name.clone()).collect(),
            message_id: graph.id.clone(),
        }
    }
}

/// Graph sends `null` for absent values; read those like missing fields
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Email address block of a Graph sender
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEmailAddress {
    /// Address
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Sender block of a Graph message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRecipient {
    /// Address block
    #[serde(rename = "emailAddress", default, deserialize_with = "null_as_default")]
    pub email_address: GraphEmailAddress,
}

/// Body of a Graph message, either an object with content or a bare string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphBody {
    /// `{"contentType": "html", "content": "..."}`
    Content {
        /// Raw HTML or text
        #[serde(default, deserialize_with = "null_as_default")]
        content: String,
    },
    /// Plain string body
    Text(String),
}

/// Attachment entry of a Graph message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphAttachment {
    /// File name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Attachment id
    #[serde(default)]
    pub id: Option<String>,
}

/// Microsoft Graph mail message as delivered by the mail transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMessage {
    /// Message id
    #[serde(default)]
    pub id: Option<String>,
    /// Conversation (thread) id
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Subject line
    #[serde(default)]
    pub subject: Option<String>,
    /// Plain-text preview
    #[serde(default)]
    pub body_preview: Option<String>,
    /// Full body
    #[serde(default)]
    pub body: Option<GraphBody>,
    /// Sender
    #[serde(default)]
    pub from: Option<GraphRecipient>,
    /// Received timestamp
    #[serde(default)]
    pub received_date_time: Option<String>,
    /// Attachments
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<GraphAttachment>,
}

impl GraphMessage {
    /// Sender address, empty when absent
    #[must_use]
    pub fn sender_address(&self) -> &str {
        self.from
            .as_ref()
            .map_or("", |f| f.email_address.address.as_str())
    }

    /// Full body content, empty when absent
    #[must_use]
    pub fn body_content(&self) -> &str {
        match &self.body {
            Some(GraphBody::Content { content }) => content,
            Some(GraphBody::Text(text)) => text,
            None => "",
        }
    }
}

/// Result of classifying one thread
///
/// Created fresh per call and never persisted as a whole; the lead service
/// projects its fields onto the stored lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadAnalysis {
    /// Detected language
    pub language: Language,
    /// Detected destination
    pub detected_country: Option<Country>,
    /// Detected intent
    pub intent: Intent,
    /// Detected urgency
    pub urgency: UrgencyLevel,
    /// Status the lead had before this thread
    pub previous_status: LeadStatus,
    /// Status proposed for the lead
    pub new_status: LeadStatus,
    /// Questionnaire to offer, at most one
    pub selected_form: SelectedForm,
    /// Destination needs a specialist
    pub is_non_standard_destination: bool,
    /// Any message in the thread carries attachments
    pub has_attachments: bool,
    /// Detected tone
    pub sentiment: Sentiment,
    /// Escalation address, set only for non-standard destinations
    pub forward_to_email: Option<String>,
    /// Why the thread is forwarded
    pub forward_reason: Option<String>,
    /// Intent confidence in [0, 1]
    pub confidence_score: f64,
    /// Free-text notes about how the result was reached
    pub analysis_notes: Vec<String>,
}

impl ThreadAnalysis {
    /// Analysis of an empty thread: defaults everywhere, status unchanged
    #[must_use]
    pub fn empty(previous_status: LeadStatus) -> Self {
        Self {
            language: Language::default(),
            detected_country: None,
            intent: Intent::Other,
            urgency: UrgencyLevel::Normal,
            previous_status,
            new_status: previous_status,
            selected_form: None,
            is_non_standard_destination: false,
            has_attachments: false,
            sentiment: Sentiment::Neutral,
            forward_to_email: None,
            forward_reason: None,
            confidence_score: 0.0,
            analysis_notes: Vec::new(),
        }
    }

    /// Code of the detected country
    #[must_use]
    pub fn country_code(&self) -> Option<&str> {
        self.detected_country.as_ref().map(|c| c.code.as_str())
    }

    /// Whether a questionnaire should be offered
    #[must_use]
    pub const fn needs_form(&self) -> bool {
        self.selected_form.is_some()
    }

    /// The questionnaire to offer
    #[must_use]
    pub const fn form_type(&self) -> Option<FormType> {
        self.selected_form
    }

    /// Whether the given questionnaire is offered
    #[must_use]
    pub fn offers(&self, form: FormType) -> bool {
        self.selected_form == Some(form)
    }

    /// Poland questionnaire offered
    #[must_use]
    pub fn offer_poland_form(&self) -> bool {
        self.offers(FormType::Poland)
    }

    /// Schengen questionnaire offered
    #[must_use]
    pub fn offer_schengen_form(&self) -> bool {
        self.offers(FormType::Schengen)
    }

    /// USA questionnaire offered
    #[must_use]
    pub fn offer_usa_form(&self) -> bool {
        self.offers(FormType::Usa)
    }

    /// Generic questionnaire offered
    #[must_use]
    pub fn offer_generic_form(&self) -> bool {
        self.offers(FormType::Generic)
    }
}

/// Flat report of an analysis, the shape exposed to API and CLI callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Language code
    pub language: Language,
    /// Country code
    pub country: Option<String>,
    /// Intent
    pub intent: Intent,
    /// Status before the thread
    pub previous_status: LeadStatus,
    /// Proposed status
    pub new_status: LeadStatus,
    /// Poland questionnaire offered
    pub offer_poland_form: bool,
    /// Schengen questionnaire offered
    pub offer_schengen_form: bool,
    /// USA questionnaire offered
    pub offer_usa_form: bool,
    /// Generic questionnaire offered
    pub offer_generic_form: bool,
    /// Critical, high or medium urgency
    pub is_urgent: bool,
    /// Urgency name
    pub urgency_level: UrgencyLevel,
    /// Destination needs a specialist
    pub is_non_standard_destination: bool,
    /// Escalation address
    pub forward_to_email: Option<String>,
    /// Escalation reason
    pub forward_reason: Option<String>,
    /// Offered questionnaire
    pub form_code: Option<FormType>,
    /// Any questionnaire offered
    pub needs_form: bool,
    /// Tone
    pub sentiment: Sentiment,
    /// Intent confidence
    pub confidence_score: f64,
    /// Attachments present
    pub has_attachments: bool,
}

impl From<&ThreadAnalysis> for ClassificationReport {
    fn from(analysis: &ThreadAnalysis) -> Self {
        Self {
            language: analysis.language,
            country: analysis.country_code().map(ToString::to_string),
            intent: analysis.intent,
            previous_status: analysis.previous_status,
            new_status: analysis.new_status,
            offer_poland_form: analysis.offer_poland_form(),
            offer_schengen_form: analysis.offer_schengen_form(),
            offer_usa_form: analysis.offer_usa_form(),
            offer_generic_form: analysis.offer_generic_form(),
            is_urgent: analysis.urgency.is_urgent(),
            urgency_level: analysis.urgency,
            is_non_standard_destination: analysis.is_non_standard_destination,
            forward_to_email: analysis.forward_to_email.clone(),
            forward_reason: analysis.forward_reason.clone(),
            form_code: analysis.selected_form,
            needs_form: analysis.needs_form(),
            sentiment: analysis.sentiment,
            confidence_score: analysis.confidence_score,
            has_attachments: analysis.has_attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_status_from_wire() {
        assert_eq!(LeadStatus::from_wire(None), LeadStatus::New);
        assert_eq!(LeadStatus::from_wire(Some("")), LeadStatus::New);
        assert_eq!(LeadStatus::from_wire(Some("closed")), LeadStatus::New);
        assert_eq!(
            LeadStatus::from_wire(Some("QUESTIONNAIRE_SENT")),
            LeadStatus::QuestionnaireSent
        );
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::from_wire(Some(status.as_str())), status);
        }
    }

    #[test]
    fn test_enum_serde_uses_wire_strings() {
        assert_eq!(serde_json::to_string(&Intent::WantApply).unwrap(), "\"want_apply\"");
        assert_eq!(serde_json::to_string(&Language::Kazakh).unwrap(), "\"kk\"");
        assert_eq!(serde_json::to_string(&UrgencyLevel::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(
            serde_json::to_string(&LeadStatus::ReadyForSubmission).unwrap(),
            "\"ready_for_submission\""
        );
        assert_eq!(serde_json::to_string(&Sentiment::Negative).unwrap(), "\"negative\"");
    }

    #[test]
    fn test_urgency_ordering() {
        assert!(UrgencyLevel::Critical > UrgencyLevel::High);
        assert!(UrgencyLevel::Normal > UrgencyLevel::Low);
        assert_eq!(UrgencyLevel::Critical.value(), 4);
        assert!(UrgencyLevel::Medium.is_urgent());
        assert!(!UrgencyLevel::Medium.needs_acknowledgement());
        assert!(!UrgencyLevel::Normal.is_urgent());
    }

    #[test]
    fn test_full_text_skips_empty_parts() {
        assert_eq!(Message::new("a@b.kz", "Виза", "").full_text(), "Виза");
        assert_eq!(Message::new("a@b.kz", "", "Текст").full_text(), "Текст");
        assert_eq!(Message::new("a@b.kz", "Виза", "Текст").full_text(), "Виза\nТекст");
        assert_eq!(Message::from_text("").full_text(), "");
    }

    #[test]
    fn test_from_graph_prefers_preview() {
        let json = r#"{
            "id": "AAMk1",
            "conversationId": "conv-1",
            "subject": "Visa",
            "bodyPreview": "short preview",
            "body": {"contentType": "html", "content": "<p>full body</p>"},
            "from": {"emailAddress": {"address": "client@mail.kz", "name": "Client"}},
            "receivedDateTime": "2025-01-10T08:00:00Z",
            "attachments": [{"name": "passport.pdf", "id": "att-1"}]
        }"#;
        let graph: GraphMessage = serde_json::from_str(json).unwrap();
        let message = Message::from_graph(&graph);

        assert_eq!(message.from_address, "client@mail.kz");
        assert_eq!(message.body, "short preview");
        assert_eq!(message.attachments, vec!["passport.pdf"]);
        assert_eq!(message.message_id.as_deref(), Some("AAMk1"));
        assert_eq!(graph.conversation_id.as_deref(), Some("conv-1"));
    }

    #[test]
    fn test_from_graph_handles_missing_fields() {
        let graph: GraphMessage = serde_json::from_str(r#"{"body": "plain text body"}"#).unwrap();
        let message = Message::from_graph(&graph);
        assert_eq!(message.from_address, "");
        assert_eq!(message.subject, "");
        assert_eq!(message.body, "plain text body");
        assert!(!message.has_attachments());
    }

    #[test]
    fn test_from_graph_reads_nulls_as_missing() {
        let json = r#"{
            "id": "AAMk2",
            "subject": null,
            "bodyPreview": null,
            "body": {"contentType": "text", "content": null},
            "from": {"emailAddress": {"address": null, "name": null}},
            "attachments": null
        }"#;
        let graph: GraphMessage = serde_json::from_str(json).unwrap();
        assert_eq!(graph.sender_address(), "");
        assert_eq!(graph.body_content(), "");
        assert!(graph.attachments.is_empty());

        let graph: GraphMessage =
            serde_json::from_str(r#"{"from": {"emailAddress": null}, "attachments": [{"name": null}]}"#)
                .unwrap();
        assert_eq!(graph.sender_address(), "");
        assert_eq!(graph.attachments[0].name, "");
    }

    #[test]
    fn test_questionnaire_status_from_wire() {
        assert_eq!(QuestionnaireStatus::from_wire(Some("SENT")), QuestionnaireStatus::Sent);
        assert_eq!(QuestionnaireStatus::from_wire(Some("whatever")), QuestionnaireStatus::None);
        assert!(QuestionnaireStatus::Filled.is_active());
        assert!(!QuestionnaireStatus::None.is_active());
    }
}
