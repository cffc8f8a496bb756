//! Intent detection with a confidence score
//!
//! Each intent has exact phrases worth a fixed amount and keyword groups
//! that only score when every keyword of the group is present somewhere in
//! the text. The best total wins; a weak winner is reported as `Other`.

use std::sync::Arc;

use crate::models::{Intent, Message};
use crate::nlp::{PhraseScorer, SubstringScorer, TextNormalizer};

/// Points for each exact phrase found
pub const EXACT_PHRASE_WEIGHT: f64 = 3.0;

/// Score that maps to full confidence (two exact phrases)
pub const CONFIDENCE_SCALE: f64 = 6.0;

/// Confidence below this is reported as `Other` with zero confidence
pub const CONFIDENCE_THRESHOLD: f64 = 0.3;

struct IntentPatterns {
    intent: Intent,
    exact: &'static [&'static str],
    combined: &'static [(&'static [&'static str], f64)],
}

const INTENT_PATTERNS: [IntentPatterns; 9] = [
    IntentPatterns {
        intent: Intent::WantApply,
        exact: &[
            "хочу подать на визу",
            "хочу оформить визу",
            "нужно оформить визу",
            "хочу получить визу",
            "планирую получить визу",
            "готов подать документы",
            "готов заполнить анкету",
            "заполню вашу форму",
            "оформление визы",
            "i want to apply",
            "i would like to apply",
            "need to apply",
            "apply for a visa",
            "visa application",
            "ready to apply",
        ],
        combined: &[
            (&["виз", "нужн"], 2.0),
            (&["виз", "оформ"], 2.0),
            (&["виз", "получ"], 2.0),
            (&["виз", "подать"], 2.0),
            (&["visa", "apply"], 2.0),
            (&["visa", "need"], 2.0),
            (&["visa", "get"], 1.5),
        ],
    },
    IntentPatterns {
        intent: Intent::SendDocs,
        exact: &[
            "направляю документы",
            "высылаю документы",
            "во вложении документы",
            "документы во вложении",
            "прилагаю документы",
            "attached documents",
            "please find attached",
            "documents attached",
            "sending documents",
        ],
        combined: &[
            (&["документ", "вложен"], 2.0),
            (&["документ", "прилаг"], 2.0),
            (&["attach", "document"], 2.0),
        ],
    },
    IntentPatterns {
        intent: Intent::InfoRequest,
        exact: &[
            "прошу проинформировать",
            "расскажите подробнее",
            "информация по визе",
            "какие документы нужны",
            "что требуется для визы",
            "сколько стоит",
            "please advise",
            "could you provide information",
            "what documents",
            "what are the requirements",
            "how much does it cost",
        ],
        combined: &[
            (&["информаци", "виз"], 1.5),
            (&["подскажите", "виз"], 1.5),
            (&["information", "visa"], 1.5),
        ],
    },
    IntentPatterns {
        intent: Intent::Followup,
        exact: &[
            "какой статус",
            "есть новости",
            "как продвигается",
            "когда будет готово",
            "есть ли обновления",
            "any update",
            "any news",
            "status of my",
            "what is the status",
            "could you please update",
        ],
        combined: &[
            (&["статус", "виз"], 2.0),
            (&["статус", "заявк"], 2.0),
            (&["status", "visa"], 2.0),
            (&["update", "application"], 1.5),
        ],
    },
    IntentPatterns {
        intent: Intent::Complaint,
        exact: &[
            "недоволен",
            "жалоба",
            "претензия",
            "возмущён",
            "неприемлемо",
            "complaint",
            "dissatisfied",
            "unacceptable",
            "not happy with",
        ],
        combined: &[(&["недовол", "обслуживан"], 2.0), (&["плох", "сервис"], 1.5)],
    },
    IntentPatterns {
        intent: Intent::Gratitude,
        exact: &[
            "спасибо большое",
            "благодарю вас",
            "очень благодарен",
            "огромное спасибо",
            "thank you so much",
            "many thanks",
            "greatly appreciate",
            "thanks a lot",
        ],
        combined: &[],
    },
    IntentPatterns {
        intent: Intent::Cancellation,
        exact: &[
            "отменить заявку",
            "отказываюсь",
            "не нужна виза",
            "отмена",
            "cancel application",
            "cancel my visa",
            "no longer need",
        ],
        combined: &[(&["отмен", "заявк"], 2.0), (&["cancel", "visa"], 2.0)],
    },
    IntentPatterns {
        intent: Intent::Reschedule,
        exact: &[
            "перенести дату",
            "изменить дату",
            "перенос встречи",
            "reschedule",
            "change the date",
            "postpone",
        ],
        combined: &[(&["перенес", "дат"], 2.0), (&["измен", "дат"], 1.5)],
    },
    IntentPatterns {
        intent: Intent::Payment,
        exact: &[
            "оплата",
            "счёт",
            "инвойс",
            "квитанция",
            "реквизиты",
            "payment",
            "invoice",
            "receipt",
            "bank details",
        ],
        combined: &[(&["оплат", "виз"], 1.5), (&["payment", "visa"], 1.5)],
    },
];

/// Scores every intent and reports the strongest one with a confidence
#[derive(Debug, Clone)]
pub struct IntentDetector {
    normalizer: Arc<TextNormalizer>,
    scorer: Arc<dyn PhraseScorer>,
}

impl IntentDetector {
    /// Create a detector using substring matching
    #[must_use]
    pub fn new(normalizer: Arc<TextNormalizer>) -> Self {
        Self::with_scorer(normalizer, Arc::new(SubstringScorer))
    }

    /// Create a detector with a custom scorer
    #[must_use]
    pub fn with_scorer(normalizer: Arc<TextNormalizer>, scorer: Arc<dyn PhraseScorer>) -> Self {
        Self { normalizer, scorer }
    }

    /// Intent and confidence of a thread
    #[must_use]
    pub fn detect(&self, messages: &[Message]) -> (Intent, f64) {
        self.detect_text(&self.normalizer.corpus(messages))
    }

    /// Raw score of every intent over an already normalized text, in `Intent::ALL` order.
    ///
    /// `Other` has no patterns and always scores zero.
    #[must_use]
    pub fn scores(&self, text: &str) -> [(Intent, f64); 10] {
        Intent::ALL.map(|intent| {
            let score = INTENT_PATTERNS
                .iter()
                .filter(|patterns| patterns.intent == intent)
                .map(|patterns| self.score_patterns(text, patterns))
                .sum();
            (intent, score)
        })
    }

    fn score_patterns(&self, text: &str, patterns: &IntentPatterns) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let exact_hits = patterns
            .exact
            .iter()
            .filter(|phrase| self.scorer.contains(text, phrase))
            .count() as f64;

        let combined: f64 = patterns
            .combined
            .iter()
            .filter(|(keywords, _)| keywords.iter().all(|kw| self.scorer.contains(text, kw)))
            .map(|(_, weight)| weight)
            .sum();

        exact_hits * EXACT_PHRASE_WEIGHT + combined
    }

    /// Intent and confidence of an already normalized text.
    ///
    /// Ties go to the intent declared first.
    #[must_use]
    pub fn detect_text(&self, text: &str) -> (Intent, f64) {
        let (best, best_score) = self
            .scores(text)
            .into_iter()
            .fold((Intent::Other, f64::MIN), |acc, item| {
                if item.1 > acc.1 {
                    item
                } else {
                    acc
                }
            });

        let confidence = (best_score / CONFIDENCE_SCALE).min(1.0);
        if confidence < CONFIDENCE_THRESHOLD {
            return (Intent::Other, 0.0);
        }

        (best, confidence)
    }
}
