//! Thread analysis
//!
//! Composes the country lookup, the four detectors, the status state machine
//! and the form selector into one [`ThreadAnalysis`] per thread. Nothing in
//! here fails: absent signal degrades to the documented defaults.

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::country::CountryDatabase;
use crate::error::Result;
use crate::forms::{ExistingForms, FormSelector};
use crate::intent::IntentDetector;
use crate::metrics::AnalysisMetrics;
use crate::models::{ClassificationReport, LeadStatus, Message, ThreadAnalysis, VisaCategory};
use crate::nlp::{
    LanguageDetector, PhraseScorer, SentimentDetector, TextNormalizer, UrgencyDetector,
    DEFAULT_MAX_LENGTH,
};
use crate::transitions::StatusTransitionEngine;

/// Reason recorded when a thread is routed to a specialist
pub const NON_STANDARD_FORWARD_REASON: &str = "non_standard_country";

/// Classifies a thread and proposes the lead's next status and questionnaire
#[derive(Debug, Clone)]
pub struct ThreadAnalyzer {
    countries: Arc<CountryDatabase>,
    language_detector: LanguageDetector,
    intent_detector: IntentDetector,
    urgency_detector: UrgencyDetector,
    sentiment_detector: SentimentDetector,
    forward_email: String,
    metrics: AnalysisMetrics,
}

impl ThreadAnalyzer {
    /// Create an analyzer over an injected country table and shared normalizer
    #[must_use]
    pub fn new(
        countries: Arc<CountryDatabase>,
        normalizer: Arc<TextNormalizer>,
        forward_email: impl Into<String>,
    ) -> Self {
        Self {
            countries,
            language_detector: LanguageDetector::new(Arc::clone(&normalizer)),
            intent_detector: IntentDetector::new(Arc::clone(&normalizer)),
            urgency_detector: UrgencyDetector::new(Arc::clone(&normalizer)),
            sentiment_detector: SentimentDetector::new(normalizer),
            forward_email: forward_email.into(),
            metrics: AnalysisMetrics::default(),
        }
    }

    /// Analyzer with the built-in country table and the default corpus budget
    pub fn with_defaults(forward_email: impl Into<String>) -> Result<Self> {
        let normalizer = Arc::new(TextNormalizer::new(DEFAULT_MAX_LENGTH)?);
        Ok(Self::new(
            Arc::new(CountryDatabase::builtin()),
            normalizer,
            forward_email,
        ))
    }

    /// Replace the phrase scorer of every detector
    #[must_use]
    pub fn with_scorer(self, normalizer: Arc<TextNormalizer>, scorer: Arc<dyn PhraseScorer>) -> Self {
        Self {
            language_detector: LanguageDetector::with_scorer(
                Arc::clone(&normalizer),
                Arc::clone(&scorer),
            ),
            intent_detector: IntentDetector::with_scorer(
                Arc::clone(&normalizer),
                Arc::clone(&scorer),
            ),
            urgency_detector: UrgencyDetector::with_scorer(
                Arc::clone(&normalizer),
                Arc::clone(&scorer),
            ),
            sentiment_detector: SentimentDetector::with_scorer(normalizer, scorer),
            ..self
        }
    }

    /// The country table in use
    #[must_use]
    pub fn countries(&self) -> &CountryDatabase {
        &self.countries
    }

    /// Escalation address for non-standard destinations
    #[must_use]
    pub fn forward_email(&self) -> &str {
        &self.forward_email
    }

    /// Analyze a thread.
    ///
    /// Detectors read only the client's messages (sender differs from
    /// `our_address`), or the whole thread when the client never wrote.
    /// Attachments are checked across the whole thread.
    pub fn analyze(
        &self,
        messages: &[Message],
        our_address: &str,
        previous_status: Option<&str>,
        existing_forms: &ExistingForms,
    ) -> ThreadAnalysis {
        let previous = LeadStatus::from_wire(previous_status);
        if messages.is_empty() {
            return ThreadAnalysis::empty(previous);
        }

        let started = Instant::now();
        let mut notes = Vec::new();

        let client_messages: Vec<Message> = messages
            .iter()
            .filter(|m| !m.is_from(our_address))
            .cloned()
            .collect();
        let source: &[Message] = if client_messages.is_empty() {
            notes.push("no client messages, analysed the whole thread".to_string());
            messages
        } else {
            &client_messages
        };

        let language = self.language_detector.detect(source);

        let raw_text = source
            .iter()
            .map(Message::full_text)
            .collect::<Vec<_>>()
            .join(" ");
        let country_match = self.countries.find_match(&raw_text);
        if let Some(found) = &country_match {
            notes.push(format!(
                "country {} matched by \"{}\"{}",
                found.country.code,
                found.keyword,
                if found.whole_word { "" } else { " inside a word" }
            ));
        }
        let country = country_match.map(|m| m.country);

        let (intent, confidence) = self.intent_detector.detect(source);
        let urgency = self.urgency_detector.detect(source);
        let sentiment = self.sentiment_detector.detect(source);

        let new_status = StatusTransitionEngine::get_new_status(previous, intent);
        let selected_form = FormSelector::select(country, intent, existing_forms);

        let has_attachments = messages.iter().any(Message::has_attachments);

        let is_non_standard = country.is_some_and(|c| c.category == VisaCategory::NonStandard);
        let (forward_to_email, forward_reason) = if is_non_standard {
            notes.push("non-standard destination, routed to a specialist".to_string());
            (
                Some(self.forward_email.clone()),
                Some(NON_STANDARD_FORWARD_REASON.to_string()),
            )
        } else {
            (None, None)
        };

        let analysis = ThreadAnalysis {
            language,
            detected_country: country.cloned(),
            intent,
            urgency,
            previous_status: previous,
            new_status,
            selected_form,
            is_non_standard_destination: is_non_standard,
            has_attachments,
            sentiment,
            forward_to_email,
            forward_reason,
            confidence_score: confidence,
            analysis_notes: notes,
        };

        debug!(
            language = %analysis.language,
            country = analysis.country_code().unwrap_or("unknown"),
            intent = %analysis.intent,
            confidence = analysis.confidence_score,
            urgency = %analysis.urgency,
            previous_status = %analysis.previous_status,
            new_status = %analysis.new_status,
            form = ?analysis.selected_form,
            "Thread analysis completed"
        );
        self.metrics.record_analysis(&analysis, started.elapsed());

        analysis
    }

    /// Analyze a thread and flatten the result into the report shape
    pub fn classify(
        &self,
        messages: &[Message],
        our_address: &str,
        previous_status: Option<&str>,
        existing_forms: &ExistingForms,
    ) -> ClassificationReport {
        let analysis = self.analyze(messages, our_address, previous_status, existing_forms);
        ClassificationReport::from(&analysis)
    }

    /// Classify a single free-text message from an unknown sender
    pub fn classify_text(&self, text: &str, our_address: &str) -> ClassificationReport {
        self.classify(
            &[Message::from_text(text)],
            our_address,
            None,
            &ExistingForms::none(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FormType;
    use crate::models::{Intent, Language, Sentiment, UrgencyLevel};

    const OUR: &str = "robotvisa@itplus.kz";
    const FORWARD: &str = "specialist@example.com";

    fn analyzer() -> ThreadAnalyzer {
        ThreadAnalyzer::with_defaults(FORWARD).expect("Failed to create analyzer")
    }

    #[test]
    fn test_empty_thread_short_circuits() {
        let analysis = analyzer().analyze(&[], OUR, Some("docs_in_progress"), &ExistingForms::none());
        assert_eq!(analysis.previous_status, LeadStatus::DocsInProgress);
        assert_eq!(analysis.new_status, LeadStatus::DocsInProgress);
        assert_eq!(analysis.intent, Intent::Other);
        assert_eq!(analysis.urgency, UrgencyLevel::Normal);
        assert!(analysis.detected_country.is_none());
        assert!(analysis.analysis_notes.is_empty());
    }

    #[test]
    fn test_poland_want_apply() {
        let messages = [Message::new(
            "client@mail.kz",
            "",
            "Хочу оформить визу в Польшу, вылет завтра",
        )];
        let analysis = analyzer().analyze(&messages, OUR, None, &ExistingForms::none());

        assert_eq!(analysis.language, Language::Russian);
        assert_eq!(analysis.country_code(), Some("PL"));
        assert_eq!(analysis.intent, Intent::WantApply);
        assert_eq!(analysis.urgency, UrgencyLevel::Critical);
        assert_eq!(analysis.new_status, LeadStatus::QuestionnaireSent);
        assert!(analysis.offer_poland_form());
        assert_eq!(analysis.forward_to_email, None);
    }

    #[test]
    fn test_own_messages_are_ignored_when_client_wrote() {
        let messages = [
            Message::new("client@mail.kz", "Вопрос", "Добрый день"),
            Message::new("RobotVisa@itplus.kz", "Re: Вопрос", "Хочу оформить визу в Польшу"),
        ];
        let analysis = analyzer().analyze(&messages, OUR, None, &ExistingForms::none());
        assert_eq!(analysis.intent, Intent::Other);
        assert!(analysis.detected_country.is_none());
    }

    #[test]
    fn test_falls_back_to_whole_thread() {
        let messages = [Message::new(OUR, "", "Хочу оформить визу в Польшу")];
        let analysis = analyzer().analyze(&messages, OUR, None, &ExistingForms::none());
        assert_eq!(analysis.intent, Intent::WantApply);
        assert!(analysis
            .analysis_notes
            .iter()
            .any(|n| n.starts_with("no client messages")));
    }

    #[test]
    fn test_attachments_counted_across_thread() {
        let messages = [
            Message::new("client@mail.kz", "", "Добрый день"),
            Message::new(OUR, "", "Ответ").with_attachments(["checklist.pdf"]),
        ];
        let analysis = analyzer().analyze(&messages, OUR, None, &ExistingForms::none());
        assert!(analysis.has_attachments);
    }

    #[test]
    fn test_existing_form_not_offered_again() {
        let messages = [Message::new("client@mail.kz", "", "Хочу оформить визу в Польшу")];
        let existing = ExistingForms::none().with(FormType::Poland);
        let analysis = analyzer().analyze(&messages, OUR, Some("new"), &existing);
        assert_eq!(analysis.selected_form, None);
        assert_eq!(analysis.new_status, LeadStatus::QuestionnaireSent);
    }

    #[test]
    fn test_classify_text_report() {
        let report = analyzer().classify_text("Хочу оформить визу в Польшу", OUR);
        assert_eq!(report.country.as_deref(), Some("PL"));
        assert_eq!(report.form_code, Some(FormType::Poland));
        assert!(report.needs_form);
        assert!(!report.is_urgent);
        assert_eq!(report.sentiment, Sentiment::Neutral);
    }
}
