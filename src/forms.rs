//! Questionnaire selection
//!
//! A thread gets at most one questionnaire. The selector returns a single
//! `Option<FormType>`, so two offers at once cannot be represented.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::country::Country;
use crate::models::{Intent, VisaCategory};

/// Questionnaire kinds, in the priority order used when picking a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    /// Poland national visa questionnaire
    Poland,
    /// Schengen visa questionnaire
    Schengen,
    /// USA (DS-160) questionnaire
    Usa,
    /// Universal questionnaire for any other destination
    Generic,
}

impl FormType {
    /// All form types in link priority order
    pub const ALL: [Self; 4] = [Self::Poland, Self::Schengen, Self::Usa, Self::Generic];

    /// Wire string of the form type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poland => "poland",
            Self::Schengen => "schengen",
            Self::Usa => "usa",
            Self::Generic => "generic",
        }
    }

    /// Form used for a stored visa country code
    #[must_use]
    pub fn for_country_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "PL" => Self::Poland,
            "FR" | "IT" | "ES" | "SCHENGEN" => Self::Schengen,
            "US" => Self::Usa,
            _ => Self::Generic,
        }
    }

    /// Visa country recorded on a lead once this form is sent
    #[must_use]
    pub const fn visa_country(self) -> Option<&'static str> {
        match self {
            Self::Poland => Some("PL"),
            Self::Schengen => Some("SCHENGEN"),
            Self::Usa => Some("US"),
            Self::Generic => None,
        }
    }

    /// Label shown next to the link in the prompt
    #[must_use]
    pub const fn label(self, english: bool) -> &'static str {
        match (self, english) {
            (Self::Poland, true) => "Poland visa questionnaire",
            (Self::Poland, false) => "Анкета на визу в Польшу",
            (Self::Schengen, true) => "Schengen visa questionnaire",
            (Self::Schengen, false) => "Анкета на шенгенскую визу",
            (Self::Usa, true) => "USA visa questionnaire (DS-160)",
            (Self::Usa, false) => "Анкета на визу США",
            (Self::Generic, true) => "General visa questionnaire",
            (Self::Generic, false) => "Универсальная визовая анкета",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poland" => Ok(Self::Poland),
            "schengen" => Ok(Self::Schengen),
            "usa" => Ok(Self::Usa),
            "generic" => Ok(Self::Generic),
            other => Err(format!("Unknown form type: {other}")),
        }
    }
}

/// Configured questionnaire URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormLinks {
    /// Poland questionnaire URL
    pub poland: Option<String>,
    /// Schengen questionnaire URL
    pub schengen: Option<String>,
    /// USA questionnaire URL
    pub usa: Option<String>,
    /// Generic questionnaire URL
    pub generic: Option<String>,
}

impl FormLinks {
    /// URL for a form type, ignoring blank values
    #[must_use]
    pub fn get(&self, form: FormType) -> Option<&str> {
        let url = match form {
            FormType::Poland => self.poland.as_deref(),
            FormType::Schengen => self.schengen.as_deref(),
            FormType::Usa => self.usa.as_deref(),
            FormType::Generic => self.generic.as_deref(),
        };
        url.filter(|u| !u.trim().is_empty())
    }
}

/// Questionnaires already sent to the lead
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExistingForms {
    /// Poland questionnaire already sent
    pub poland: bool,
    /// Schengen questionnaire already sent
    pub schengen: bool,
    /// USA questionnaire already sent
    pub usa: bool,
    /// Generic questionnaire already sent
    pub generic: bool,
}

impl ExistingForms {
    /// Nothing sent yet
    #[must_use]
    pub const fn none() -> Self {
        Self {
            poland: false,
            schengen: false,
            usa: false,
            generic: false,
        }
    }

    /// Whether the given form was already sent
    #[must_use]
    pub const fn contains(&self, form: FormType) -> bool {
        match form {
            FormType::Poland => self.poland,
            FormType::Schengen => self.schengen,
            FormType::Usa => self.usa,
            FormType::Generic => self.generic,
        }
    }

    /// Mark a form as sent
    #[must_use]
    pub const fn with(mut self, form: FormType) -> Self {
        match form {
            FormType::Poland => self.poland = true,
            FormType::Schengen => self.schengen = true,
            FormType::Usa => self.usa = true,
            FormType::Generic => self.generic = true,
        }
        self
    }
}

/// Configured questionnaire ids, recorded on the lead when a form is sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormIds {
    /// Poland questionnaire id
    pub poland: Option<String>,
    /// Schengen questionnaire id
    pub schengen: Option<String>,
    /// USA questionnaire id
    pub usa: Option<String>,
    /// Generic questionnaire id
    pub generic: Option<String>,
}

impl FormIds {
    /// Id for a form type, ignoring blank values
    #[must_use]
    pub fn get(&self, form: FormType) -> Option<&str> {
        let id = match form {
            FormType::Poland => self.poland.as_deref(),
            FormType::Schengen => self.schengen.as_deref(),
            FormType::Usa => self.usa.as_deref(),
            FormType::Generic => self.generic.as_deref(),
        };
        id.filter(|i| !i.trim().is_empty())
    }

    /// Form whose configured id equals `form_id`
    #[must_use]
    pub fn form_for_id(&self, form_id: &str) -> Option<FormType> {
        if form_id.trim().is_empty() {
            return None;
        }
        FormType::ALL
            .into_iter()
            .find(|form| self.get(*form) == Some(form_id))
    }
}

/// Outcome of form selection; at most one questionnaire per thread
pub type SelectedForm = Option<FormType>;

/// Decides which questionnaire, if any, to offer
#[derive(Debug, Clone, Copy, Default)]
pub struct FormSelector;

impl FormSelector {
    /// Pick the questionnaire for a thread.
    ///
    /// Non-standard destinations and any intent other than `want_apply` get
    /// nothing. A known country gets its own form unless already sent; an
    /// unknown country gets the generic form unless already sent.
    #[must_use]
    pub fn select(
        country: Option<&Country>,
        intent: Intent,
        existing: &ExistingForms,
    ) -> SelectedForm {
        if country.is_some_and(|c| c.category == VisaCategory::NonStandard) {
            return None;
        }

        if intent != Intent::WantApply {
            return None;
        }

        match country {
            Some(country) => country.form_type.filter(|form| !existing.contains(*form)),
            None => Some(FormType::Generic).filter(|form| !existing.contains(*form)),
        }
    }

    /// First form that is both offered and has a configured link
    #[must_use]
    pub fn primary_link<'a>(selected: Option<FormType>, links: &'a FormLinks) -> Option<&'a str> {
        selected.and_then(|form| links.get(form))
    }
}

/// Fixed paragraph appended to a reply when a questionnaire is due.
///
/// Returns an empty string when no URL is configured for the form.
#[must_use]
pub fn form_block(form: FormType, links: &FormLinks) -> String {
    let Some(url) = links.get(form) else {
        return String::new();
    };

    match form {
        FormType::Poland => format!(
            "Для продолжения оформления визы в Польшу, пожалуйста, заполните анкету по ссылке:\n\
             {url}\n\n\
             После получения анкеты мы сможем подсказать точный перечень документов и следующий шаг."
        ),
        FormType::Schengen => format!(
            "Для оформления шенгенской визы (Франция / Италия / Испания и др.) \
             пожалуйста, заполните анкету по ссылке:\n\
             {url}\n\n\
             Это поможет нам собрать корректный пакет документов и подобрать оптимальный вариант подачи."
        ),
        FormType::Usa => format!(
            "Для оформления визы США, пожалуйста, заполните анкету (опросник для DS-160) по ссылке:\n\
             {url}\n\n\
             После её получения мы сможем подготовить ваши данные для заполнения официальной анкеты."
        ),
        FormType::Generic => format!(
            "Для оформления визы в выбранную страну, пожалуйста, заполните универсальную анкету по ссылке:\n\
             {url}\n\n\
             После получения анкеты мы проверим данные и отправим вам индивидуальные рекомендации по документам и дальнейшим шагам."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::CountryDatabase;

    fn links() -> FormLinks {
        FormLinks {
            poland: Some("https://forms.example/poland".into()),
            schengen: Some("https://forms.example/schengen".into()),
            usa: None,
            generic: Some("  ".into()),
        }
    }

    #[test]
    fn test_select_country_form() {
        let db = CountryDatabase::builtin();
        let poland = db.get_country("pl");
        assert_eq!(
            FormSelector::select(poland, Intent::WantApply, &ExistingForms::none()),
            Some(FormType::Poland)
        );
    }

    #[test]
    fn test_select_skips_existing_form() {
        let db = CountryDatabase::builtin();
        let france = db.get_country("FR");
        let existing = ExistingForms::none().with(FormType::Schengen);
        assert_eq!(FormSelector::select(france, Intent::WantApply, &existing), None);
    }

    #[test]
    fn test_select_generic_for_unknown_country() {
        assert_eq!(
            FormSelector::select(None, Intent::WantApply, &ExistingForms::none()),
            Some(FormType::Generic)
        );
        let existing = ExistingForms::none().with(FormType::Generic);
        assert_eq!(FormSelector::select(None, Intent::WantApply, &existing), None);
    }

    #[test]
    fn test_select_requires_want_apply() {
        let db = CountryDatabase::builtin();
        assert_eq!(
            FormSelector::select(db.get_country("PL"), Intent::InfoRequest, &ExistingForms::none()),
            None
        );
    }

    #[test]
    fn test_select_non_standard_is_empty() {
        let db = CountryDatabase::builtin();
        assert_eq!(
            FormSelector::select(db.get_country("GB"), Intent::WantApply, &ExistingForms::none()),
            None
        );
    }

    #[test]
    fn test_links_ignore_blank_urls() {
        let links = links();
        assert_eq!(links.get(FormType::Poland), Some("https://forms.example/poland"));
        assert_eq!(links.get(FormType::Usa), None);
        assert_eq!(links.get(FormType::Generic), None);
        assert_eq!(FormSelector::primary_link(Some(FormType::Generic), &links), None);
    }

    #[test]
    fn test_form_block() {
        let links = links();
        let block = form_block(FormType::Poland, &links);
        assert!(block.starts_with("Для продолжения оформления визы в Польшу"));
        assert!(block.contains("https://forms.example/poland"));
        assert!(form_block(FormType::Usa, &links).is_empty());
    }

    #[test]
    fn test_for_country_code() {
        assert_eq!(FormType::for_country_code("pl"), FormType::Poland);
        assert_eq!(FormType::for_country_code("IT"), FormType::Schengen);
        assert_eq!(FormType::for_country_code("SCHENGEN"), FormType::Schengen);
        assert_eq!(FormType::for_country_code("US"), FormType::Usa);
        assert_eq!(FormType::for_country_code("DE"), FormType::Generic);
    }
}
