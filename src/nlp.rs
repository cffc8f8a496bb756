//! Text normalization and the marker-based signal detectors
//!
//! All detectors work on raw substring counts over a normalized, lowercased
//! corpus. A short marker may count inside a longer word; that is accepted.
//! Counting goes through [`PhraseScorer`] so a tokenizing scorer can replace
//! it without touching the detectors.

use regex::Regex;
use std::fmt;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::models::{Language, Message, Sentiment, UrgencyLevel};

/// Default corpus budget in characters
pub const DEFAULT_MAX_LENGTH: usize = 8000;

/// Strategy for counting marker phrases in a normalized text
pub trait PhraseScorer: Send + Sync + fmt::Debug {
    /// Number of non-overlapping occurrences of `phrase` in `text`
    fn occurrences(&self, text: &str, phrase: &str) -> usize;

    /// Whether `phrase` occurs at least once
    fn contains(&self, text: &str, phrase: &str) -> bool {
        self.occurrences(text, phrase) > 0
    }
}

/// Plain substring counting
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringScorer;

impl PhraseScorer for SubstringScorer {
    fn occurrences(&self, text: &str, phrase: &str) -> usize {
        if phrase.is_empty() {
            return 0;
        }
        text.matches(phrase).count()
    }

    fn contains(&self, text: &str, phrase: &str) -> bool {
        !phrase.is_empty() && text.contains(phrase)
    }
}

/// Turns raw mail text into the corpus every detector reads
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    max_length: usize,
    tag_regex: Regex,
    spaces_regex: Regex,
    email_regex: Regex,
    date_regexes: Vec<Regex>,
}

impl TextNormalizer {
    /// Create a normalizer that keeps at most `max_length` trailing characters
    pub fn new(max_length: usize) -> Result<Self> {
        let date_regexes = vec![
            Regex::new(r"\d{1,2}[./]\d{1,2}[./]\d{2,4}")?,
            Regex::new(
                r"\d{1,2}\s+(?:января|февраля|марта|апреля|мая|июня|июля|августа|сентября|октября|ноября|декабря)",
            )?,
            Regex::new(
                r"(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2}",
            )?,
        ];

        Ok(Self {
            max_length,
            tag_regex: Regex::new(r"<[^>]+>")?,
            spaces_regex: Regex::new(r"\s+")?,
            email_regex: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")?,
            date_regexes,
        })
    }

    /// Character budget of the corpus
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }

    /// Replace tags with spaces, collapse whitespace (line breaks included), trim
    #[must_use]
    pub fn strip_markup(&self, text: &str) -> String {
        let without_tags = self.tag_regex.replace_all(text, " ");
        self.spaces_regex
            .replace_all(&without_tags, " ")
            .trim()
            .to_string()
    }

    /// Strip tags, collapse whitespace, keep the tail, lowercase.
    ///
    /// The tail is kept because the latest replies sit at the end of a thread.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let composed: String = text.nfc().collect();
        let stripped = self.strip_markup(&composed);
        crate::utils::tail_chars(&stripped, self.max_length)
            .trim()
            .to_lowercase()
    }

    /// Normalized corpus of a set of messages
    #[must_use]
    pub fn corpus(&self, messages: &[Message]) -> String {
        let joined = messages
            .iter()
            .map(Message::full_text)
            .collect::<Vec<_>>()
            .join(" ");
        self.normalize(&joined)
    }

    /// Email addresses mentioned in a text
    #[must_use]
    pub fn extract_emails(&self, text: &str) -> Vec<String> {
        self.email_regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Dates mentioned in a text, numeric or with a Russian or English month name
    #[must_use]
    pub fn extract_dates(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.date_regexes
            .iter()
            .flat_map(|re| re.find_iter(&lowered).map(|m| m.as_str().to_string()))
            .collect()
    }
}

/// Marker strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTier {
    /// Greetings, sign-offs and other near-certain markers
    Strong,
    /// Common content words
    Medium,
    /// Function words
    Weak,
}

impl MarkerTier {
    /// Weight of one occurrence
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Strong => 3.0,
            Self::Medium => 1.5,
            Self::Weak => 0.5,
        }
    }
}

struct LanguageMarkers {
    language: Language,
    tiers: [(MarkerTier, &'static [&'static str]); 3],
}

const LANGUAGE_MARKERS: [LanguageMarkers; 3] = [
    LanguageMarkers {
        language: Language::English,
        tiers: [
            (
                MarkerTier::Strong,
                &[
                    "dear ", "hello", "good afternoon", "good morning", "good evening", "please",
                    "thank you", "regards", "sincerely", "best wishes",
                ],
            ),
            (
                MarkerTier::Medium,
                &[
                    "the ", "and ", "for ", "with", "from", "have", "will", "would", "could",
                    "should", "about", "your", "our ", "this", "that",
                ],
            ),
            (MarkerTier::Weak, &["is ", "are ", "was ", "were", "be ", "been"]),
        ],
    },
    LanguageMarkers {
        language: Language::Russian,
        tiers: [
            (
                MarkerTier::Strong,
                &[
                    "уважаемый", "уважаемая", "здравствуйте", "добрый день", "добрый вечер",
                    "с уважением", "пожалуйста", "спасибо", "благодарю",
                ],
            ),
            (
                MarkerTier::Medium,
                &[
                    "прошу", "необходимо", "требуется", "хотел бы", "хотела бы", "подскажите",
                    "сообщите", "направляю", "высылаю",
                ],
            ),
            (
                MarkerTier::Weak,
                &["это", "что", "как", "для", "при", "или", "и ", "в ", "на "],
            ),
        ],
    },
    LanguageMarkers {
        language: Language::Kazakh,
        tiers: [
            (MarkerTier::Strong, &["сәлем", "салем", "сәлеметсіз", "қайырлы", "рахмет"]),
            (MarkerTier::Medium, &["керек", "болады", "мүмкін"]),
            (MarkerTier::Weak, &["бұл", "мен", "сіз"]),
        ],
    },
];

/// Minimum winning score before a language is trusted
pub const LANGUAGE_SCORE_FLOOR: f64 = 1.0;

/// Weighted marker scoring over English, Russian and Kazakh
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    normalizer: Arc<TextNormalizer>,
    scorer: Arc<dyn PhraseScorer>,
}

impl LanguageDetector {
    /// Create a detector using substring counting
    #[must_use]
    pub fn new(normalizer: Arc<TextNormalizer>) -> Self {
        Self::with_scorer(normalizer, Arc::new(SubstringScorer))
    }

    /// Create a detector with a custom scorer
    #[must_use]
    pub fn with_scorer(normalizer: Arc<TextNormalizer>, scorer: Arc<dyn PhraseScorer>) -> Self {
        Self { normalizer, scorer }
    }

    /// Language of a thread
    #[must_use]
    pub fn detect(&self, messages: &[Message]) -> Language {
        self.detect_text(&self.normalizer.corpus(messages))
    }

    /// Per-language scores of an already normalized text, in `Language::ALL` order
    #[must_use]
    pub fn scores(&self, text: &str) -> [(Language, f64); 3] {
        Language::ALL.map(|language| {
            let score = LANGUAGE_MARKERS
                .iter()
                .filter(|markers| markers.language == language)
                .flat_map(|markers| markers.tiers.iter())
                .map(|(tier, phrases)| {
                    phrases
                        .iter()
                        .map(|phrase| {
                            #[allow(clippy::cast_precision_loss)]
                            let count = self.scorer.occurrences(text, phrase) as f64;
                            count * tier.weight()
                        })
                        .sum::<f64>()
                })
                .sum();
            (language, score)
        })
    }

    /// Language of an already normalized text.
    ///
    /// Kazakh only wins when Russian scores at most half of it, and a winner
    /// below the floor falls back to Russian.
    #[must_use]
    pub fn detect_text(&self, text: &str) -> Language {
        let scores = self.scores(text);
        let score_of = |language: Language| {
            scores
                .iter()
                .find(|(l, _)| *l == language)
                .map_or(0.0, |(_, s)| *s)
        };

        let (best, best_score) = scores
            .iter()
            .copied()
            .fold((Language::Russian, f64::MIN), |acc, item| {
                if item.1 > acc.1 {
                    item
                } else {
                    acc
                }
            });

        if best == Language::Kazakh && score_of(Language::Russian) > best_score * 0.5 {
            return Language::Russian;
        }

        if best_score < LANGUAGE_SCORE_FLOOR {
            return Language::default();
        }

        best
    }
}

const CRITICAL_MARKERS: &[&str] = &[
    "вылет сегодня",
    "вылет завтра",
    "сегодня вечером",
    "завтра утром",
    "через несколько часов",
    "flight today",
    "flight tomorrow",
    "departing today",
    "departing tomorrow",
    "leaving today",
];

const HIGH_MARKERS: &[&str] = &[
    "очень срочно",
    "крайне срочно",
    "максимально быстро",
    "asap",
    "as soon as possible",
    "urgent",
    "urgently",
    "immediately",
    "критически важно",
    "extremely urgent",
];

const MEDIUM_MARKERS: &[&str] = &[
    "срочно",
    "как можно скорее",
    "как можно быстрее",
    "горит",
    "на этой неделе",
    "в ближайшие дни",
    "promptly",
    "soon",
    "this week",
    "in the coming days",
];

/// First-tier-wins urgency detection
#[derive(Debug, Clone)]
pub struct UrgencyDetector {
    normalizer: Arc<TextNormalizer>,
    scorer: Arc<dyn PhraseScorer>,
}

impl UrgencyDetector {
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

    /// Urgency of a thread
    #[must_use]
    pub fn detect(&self, messages: &[Message]) -> UrgencyLevel {
        self.detect_text(&self.normalizer.corpus(messages))
    }

    /// Urgency of an already normalized text. Only the highest matching tier is reported.
    #[must_use]
    pub fn detect_text(&self, text: &str) -> UrgencyLevel {
        let tiers = [
            (UrgencyLevel::Critical, CRITICAL_MARKERS),
            (UrgencyLevel::High, HIGH_MARKERS),
            (UrgencyLevel::Medium, MEDIUM_MARKERS),
        ];

        tiers
            .into_iter()
            .find(|(_, markers)| markers.iter().any(|m| self.scorer.contains(text, m)))
            .map_or(UrgencyLevel::Normal, |(level, _)| level)
    }
}

const POSITIVE_MARKERS: &[&str] = &[
    "спасибо",
    "благодарю",
    "отлично",
    "замечательно",
    "прекрасно",
    "thank you",
    "thanks",
    "great",
    "excellent",
    "wonderful",
    "appreciate",
    "доволен",
    "довольна",
    "рад",
    "рада",
    "satisfied",
    "happy",
];

const NEGATIVE_MARKERS: &[&str] = &[
    "недоволен",
    "недовольна",
    "разочарован",
    "ужасно",
    "плохо",
    "unhappy",
    "disappointed",
    "terrible",
    "awful",
    "bad",
    "возмущён",
    "возмущена",
    "жалоба",
    "претензия",
    "complaint",
];

/// Counts distinct positive and negative markers
#[derive(Debug, Clone)]
pub struct SentimentDetector {
    normalizer: Arc<TextNormalizer>,
    scorer: Arc<dyn PhraseScorer>,
}

impl SentimentDetector {
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

    /// Sentiment of a thread
    #[must_use]
    pub fn detect(&self, messages: &[Message]) -> Sentiment {
        self.detect_text(&self.normalizer.corpus(messages))
    }

    /// Sentiment of an already normalized text
    #[must_use]
    pub fn detect_text(&self, text: &str) -> Sentiment {
        let present = |markers: &[&str]| markers.iter().filter(|m| self.scorer.contains(text, m)).count();
        let positive = present(POSITIVE_MARKERS);
        let negative = present(NEGATIVE_MARKERS);

        if negative > positive {
            Sentiment::Negative
        } else if positive > negative {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }
}
