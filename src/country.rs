//! Country knowledge base
//!
//! Maps free-text aliases in any supported language to a destination code and
//! its visa processing category. The table is built once and never mutated;
//! callers share it behind an `Arc` and can inject their own table for tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::forms::FormType;
use crate::models::VisaCategory;

/// Schengen member codes
pub const SCHENGEN_CODES: [&str; 26] = [
    "AT", "BE", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IS", "IT", "LV", "LI", "LT", "LU",
    "MT", "NL", "NO", "PL", "PT", "SK", "SI", "ES", "SE", "CH",
];

/// Codes that always need a specialist
pub const NON_STANDARD_CODES: [&str; 30] = [
    "GB", "CA", "AU", "NZ", "JP", "CN", "KR", "IN", "BR", "AR", "MX", "TR", "AE", "SA", "ZA", "EG",
    "MA", "TH", "VN", "SG", "IL", "MY", "ID", "PH", "PK", "BD", "LK", "NP", "IR", "IQ",
];

/// A destination and the aliases that identify it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Two-letter code, or a synthetic region code such as `SCHENGEN`
    pub code: String,
    /// Aliases in any language
    pub names: Vec<String>,
    /// Processing category
    pub category: VisaCategory,
    /// Questionnaire for this destination
    #[serde(default)]
    pub form_type: Option<FormType>,
    /// Notes for the specialist
    #[serde(default)]
    pub processing_notes: Option<String>,
}

/// Which alias matched and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryMatch<'a> {
    /// Matched country
    pub country: &'a Country,
    /// Alias that matched
    pub keyword: &'a str,
    /// Whether the alias stood as a whole word
    pub whole_word: bool,
}

#[derive(Debug, Clone)]
struct Keyword {
    text: String,
    chars: usize,
    country: usize,
}

/// Immutable lookup table from aliases to countries
#[derive(Debug, Clone)]
pub struct CountryDatabase {
    countries: Vec<Country>,
    by_code: HashMap<String, usize>,
    keywords: Vec<Keyword>,
}

#[derive(Deserialize)]
struct CountryTable {
    countries: Vec<Country>,
}

impl CountryDatabase {
    /// Build a database from a list of countries.
    ///
    /// An alias listed by two countries belongs to the first one.
    #[must_use]
    pub fn from_countries(countries: Vec<Country>) -> Self {
        let mut by_code = HashMap::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, country) in countries.iter().enumerate() {
            by_code.insert(country.code.to_uppercase(), index);
            for name in &country.names {
                let text = fold(name);
                if text.is_empty() {
                    continue;
                }
                if let Some(owner) = seen.get(&text) {
                    debug!(
                        keyword = %text,
                        owner = %countries[*owner].code,
                        ignored = %country.code,
                        "Duplicate country alias"
                    );
                    continue;
                }
                seen.insert(text.clone(), index);
                keywords.push(Keyword {
                    chars: text.chars().count(),
                    text,
                    country: index,
                });
            }
        }

        Self {
            countries,
            by_code,
            keywords,
        }
    }

    /// Load a table from YAML of the form `countries: [{code, names, category, form_type}]`
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: CountryTable = serde_yaml::from_str(yaml)?;
        Ok(Self::from_countries(table.countries))
    }

    /// The table shipped with the engine
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_countries(builtin_countries())
    }

    /// All countries in table order
    #[must_use]
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    /// Number of indexed aliases
    #[must_use]
    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    /// Find the destination mentioned in a text
    #[must_use]
    pub fn find_country(&self, text: &str) -> Option<&Country> {
        self.find_match(text).map(|m| m.country)
    }

    /// Find the destination mentioned in a text, with the alias that won.
    ///
    /// Every alias contained in the text is a candidate, whole word or not.
    /// The longest alias wins; among equal lengths a whole-word match beats
    /// a substring match, then table order decides.
    #[must_use]
    pub fn find_match(&self, text: &str) -> Option<CountryMatch<'_>> {
        let haystack = fold(text);
        if haystack.is_empty() {
            return None;
        }

        self.keywords
            .iter()
            .enumerate()
            .filter(|(_, kw)| haystack.contains(kw.text.as_str()))
            .map(|(order, kw)| (order, kw, is_whole_word(&haystack, &kw.text)))
            .max_by(|(order_a, a, whole_a), (order_b, b, whole_b)| {
                a.chars
                    .cmp(&b.chars)
                    .then(whole_a.cmp(whole_b))
                    .then(order_b.cmp(order_a))
            })
            .map(|(_, kw, whole_word)| CountryMatch {
                country: &self.countries[kw.country],
                keyword: &kw.text,
                whole_word,
            })
    }

    /// Look up a country by code (case-insensitive)
    #[must_use]
    pub fn get_country(&self, code: &str) -> Option<&Country> {
        self.by_code
            .get(&code.trim().to_uppercase())
            .map(|&index| &self.countries[index])
    }

    /// Whether a code belongs to the Schengen area
    #[must_use]
    pub fn is_schengen(code: &str) -> bool {
        SCHENGEN_CODES.contains(&code.trim().to_uppercase().as_str())
    }

    /// Whether a code always needs a specialist
    #[must_use]
    pub fn is_non_standard(code: &str) -> bool {
        NON_STANDARD_CODES.contains(&code.trim().to_uppercase().as_str())
    }
}

impl Default for CountryDatabase {
    fn default() -> Self {
        Self::builtin()
    }
}

fn fold(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when some occurrence of `needle` has no word character on either side
fn is_whole_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn country(
    code: &str,
    category: VisaCategory,
    form_type: Option<FormType>,
    notes: Option<&str>,
    names: &[&str],
) -> Country {
    Country {
        code: code.to_string(),
        names: names.iter().map(ToString::to_string).collect(),
        category,
        form_type,
        processing_notes: notes.map(ToString::to_string),
    }
}

fn schengen_member(code: &str, names: &[&str]) -> Country {
    country(code, VisaCategory::Standard, Some(FormType::Schengen), None, names)
}

fn specialist(code: &str, notes: Option<&str>, names: &[&str]) -> Country {
    country(code, VisaCategory::NonStandard, None, notes, names)
}

#[allow(clippy::too_many_lines)]
fn builtin_countries() -> Vec<Country> {
    vec![
        country(
            "PL",
            VisaCategory::Standard,
            Some(FormType::Poland),
            None,
            &[
                "poland", "польша", "польшу", "польши", "warsaw", "варшава", "варшаву", "krakow",
                "краков", "gdansk", "гданьск", "wroclaw", "вроцлав",
            ],
        ),
        country(
            "US",
            VisaCategory::Standard,
            Some(FormType::Usa),
            None,
            &[
                "usa", "u.s.", "u.s.a.", "united states", "america", "америка", "сша", "штаты",
                "соединённые штаты", "new york", "нью-йорк", "los angeles", "лос-анджелес",
                "washington", "вашингтон", "california", "калифорния", "florida", "флорида",
                "texas", "техас",
            ],
        ),
        schengen_member(
            "FR",
            &[
                "france", "франция", "францию", "франции", "paris", "париж", "nice", "ницца",
                "lyon", "лион", "marseille", "марсель",
            ],
        ),
        schengen_member(
            "DE",
            &[
                "germany", "германия", "германию", "германии", "berlin", "берлин", "munich",
                "мюнхен", "frankfurt", "франкфурт", "hamburg", "гамбург",
            ],
        ),
        schengen_member(
            "IT",
            &[
                "italy", "италия", "италию", "италии", "rome", "рим", "roma", "milan", "милан",
                "venice", "венеция", "florence", "флоренция",
            ],
        ),
        schengen_member(
            "ES",
            &[
                "spain", "испания", "испанию", "испании", "barcelona", "барселона", "madrid",
                "мадрид", "valencia", "валенсия", "seville", "севилья",
            ],
        ),
        schengen_member(
            "NL",
            &[
                "netherlands", "нидерланды", "голландия", "holland", "amsterdam", "амстердам",
                "rotterdam", "роттердам", "hague", "гаага",
            ],
        ),
        schengen_member(
            "AT",
            &[
                "austria", "австрия", "австрию", "вена", "vienna", "wien", "salzburg",
                "зальцбург", "innsbruck", "инсбрук",
            ],
        ),
        schengen_member(
            "BE",
            &[
                "belgium", "бельгия", "бельгию", "brussels", "брюссель", "bruges", "брюгге",
                "antwerp", "антверпен",
            ],
        ),
        schengen_member("CZ", &["czech", "чехия", "чехию", "prague", "прага", "brno", "брно"]),
        schengen_member(
            "PT",
            &["portugal", "португалия", "португалию", "lisbon", "лиссабон", "porto", "порту"],
        ),
        schengen_member(
            "GR",
            &[
                "greece", "греция", "грецию", "athens", "афины", "santorini", "санторини",
                "crete", "крит", "rhodes", "родос",
            ],
        ),
        schengen_member("HU", &["hungary", "венгрия", "венгрию", "budapest", "будапешт"]),
        schengen_member(
            "CH",
            &[
                "switzerland", "швейцария", "швейцарию", "zurich", "цюрих", "geneva", "женева",
                "bern", "берн",
            ],
        ),
        schengen_member("SE", &["sweden", "швеция", "швецию", "stockholm", "стокгольм"]),
        schengen_member("NO", &["norway", "норвегия", "норвегию", "oslo", "осло"]),
        schengen_member("FI", &["finland", "финляндия", "финляндию", "helsinki", "хельсинки"]),
        schengen_member("DK", &["denmark", "дания", "данию", "copenhagen", "копенгаген"]),
        specialist(
            "GB",
            Some("Требуется отдельная британская виза"),
            &[
                "uk", "united kingdom", "great britain", "england", "британия", "великобритания",
                "англия", "london", "лондон", "manchester", "манчестер", "liverpool", "ливерпуль",
                "scotland", "шотландия",
            ],
        ),
        specialist(
            "CA",
            Some("Требуется eTA или виза"),
            &[
                "canada", "канада", "канаду", "toronto", "торонто", "vancouver", "ванкувер",
                "montreal", "монреаль", "ottawa", "оттава",
            ],
        ),
        specialist(
            "AU",
            Some("Требуется ETA или виза"),
            &[
                "australia", "австралия", "австралию", "sydney", "сидней", "melbourne",
                "мельбурн", "brisbane", "брисбен",
            ],
        ),
        specialist(
            "NZ",
            None,
            &["new zealand", "новая зеландия", "wellington", "веллингтон", "auckland", "окленд"],
        ),
        specialist(
            "JP",
            None,
            &["japan", "япония", "японию", "tokyo", "токио", "osaka", "осака", "kyoto", "киото"],
        ),
        specialist(
            "CN",
            None,
            &[
                "china", "китай", "beijing", "пекин", "shanghai", "шанхай", "guangzhou",
                "гуанчжоу", "shenzhen", "шэньчжэнь",
            ],
        ),
        specialist(
            "KR",
            None,
            &["south korea", "korea", "корея", "южная корея", "seoul", "сеул", "busan", "пусан"],
        ),
        specialist(
            "IN",
            None,
            &[
                "india", "индия", "индию", "delhi", "дели", "mumbai", "мумбаи", "bangalore",
                "бангалор",
            ],
        ),
        specialist(
            "BR",
            None,
            &["brazil", "бразилия", "бразилию", "rio", "рио", "sao paulo", "сан-паулу"],
        ),
        specialist(
            "AR",
            None,
            &["argentina", "аргентина", "аргентину", "buenos aires", "буэнос-айрес"],
        ),
        specialist(
            "MX",
            None,
            &["mexico", "мексика", "мексику", "cancun", "канкун", "mexico city", "мехико"],
        ),
        specialist(
            "TR",
            None,
            &[
                "turkey", "турция", "турцию", "istanbul", "стамбул", "истанбул", "antalya",
                "анталия", "ankara", "анкара",
            ],
        ),
        specialist(
            "AE",
            None,
            &["uae", "emirates", "эмираты", "оаэ", "dubai", "дубай", "abu dhabi", "абу-даби"],
        ),
        specialist(
            "SA",
            None,
            &[
                "saudi arabia", "саудовская аравия", "riyadh", "эр-рияд", "jeddah", "джидда",
                "mecca", "мекка",
            ],
        ),
        specialist(
            "ZA",
            None,
            &[
                "south africa", "юар", "южная африка", "johannesburg", "йоханнесбург",
                "cape town", "кейптаун",
            ],
        ),
        specialist(
            "EG",
            None,
            &["egypt", "египет", "sharm", "шарм", "hurghada", "хургада", "cairo", "каир"],
        ),
        specialist(
            "TH",
            None,
            &[
                "thailand", "tailand", "таиланд", "тайланд", "phuket", "пхукет", "bangkok",
                "бангкок", "pattaya", "паттайя",
            ],
        ),
        specialist(
            "VN",
            None,
            &[
                "vietnam", "вьетнам", "hanoi", "ханой", "ho chi minh", "хошимин", "saigon",
                "сайгон",
            ],
        ),
        specialist("SG", None, &["singapore", "сингапур"]),
        specialist("MY", None, &["malaysia", "малайзия", "kuala lumpur", "куала-лумпур"]),
        specialist(
            "ID",
            None,
            &["indonesia", "индонезия", "bali", "бали", "jakarta", "джакарта"],
        ),
        specialist(
            "IL",
            None,
            &["israel", "израиль", "tel aviv", "тель-авив", "jerusalem", "иерусалим"],
        ),
        country(
            "SCHENGEN",
            VisaCategory::Standard,
            Some(FormType::Schengen),
            None,
            &[
                "schengen", "шенген", "шенгенскую", "шенгенская", "шенгенской",
                "шенгенскую визу", "schengen visa", "europe", "европа", "европу", "евросоюз",
                "eu",
            ],
        ),
    ]
}
