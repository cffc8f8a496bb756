use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::forms::{FormIds, FormLinks};
use crate::llm::OpenAiSettings;
use crate::logging::LogFormat;
use crate::reminders::ReminderClock;
use crate::reply::ReplySettings;
use crate::service::{ServiceSettings, ThreadLimits};
use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mailbox: MailboxConfig,
    pub routing: RoutingConfig,
    pub llm: LlmConfig,
    pub forms: FormsConfig,
    pub limits: LimitsConfig,
    pub reminders: RemindersConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub non_standard_forward_email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    pub poland_url: Option<String>,
    pub schengen_url: Option<String>,
    pub usa_url: Option<String>,
    pub generic_url: Option<String>,
    pub poland_id: Option<String>,
    pub schengen_id: Option<String>,
    pub usa_id: Option<String>,
    pub generic_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_thread_length: usize,
    pub max_thread_messages: usize,
    pub max_body_html_raw_chars: usize,
    pub max_body_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemindersConfig {
    pub first_reminder_days: u32,
    pub second_reminder_days: u32,
    pub local_utc_offset_hours: i32,
    pub hour: u32,
    pub working_hours_start: u32,
    pub working_hours_end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            address: "RobotVisa@itplus.kz".to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            non_standard_forward_email: "azamat@example.com".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            max_tokens: 800,
            temperature: 0.2,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_thread_length: 8000,
            max_thread_messages: 6,
            max_body_html_raw_chars: 20_000,
            max_body_chars: 3000,
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            first_reminder_days: 1,
            second_reminder_days: 3,
            local_utc_offset_hours: 5,
            hour: 10,
            working_hours_start: 9,
            working_hours_end: 22,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "leads.db".to_string(),
            busy_timeout_secs: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            format: "text".to_string(),
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value for {name}: {e}"))
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding `path` as a required file on top of the
    /// optional `config/*` files
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(
                Config::try_from(&Self::default())
                    .context("Failed to serialize default configuration")?,
            )
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix("LEAD_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        let mut app_config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.apply_env_overrides(|name| std::env::var(name).ok())?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Apply the single-variable overrides used by existing deployments
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&'static str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()).map(|v| (*name, v)))
        };

        if let Some((_, v)) = first(&["MAILBOX_UPN"]) {
            self.mailbox.address = v;
        }
        if let Some((_, v)) = first(&["OPENAI_MODEL"]) {
            self.llm.model = v;
        }
        if let Some((_, v)) = first(&["OPENAI_API_KEY"]) {
            self.llm.api_key = Some(v);
        }
        if let Some((_, v)) = first(&["NON_STANDARD_FORWARD_EMAIL"]) {
            self.routing.non_standard_forward_email = v;
        }

        let forms = &mut self.forms;
        let string_overrides: [(&[&'static str], &mut Option<String>); 8] = [
            (&["FORM_POLAND_URL", "POLAND_FORM_URL"], &mut forms.poland_url),
            (&["FORM_SCHENGEN_URL", "SCHENGEN_FORM_URL"], &mut forms.schengen_url),
            (&["FORM_USA_URL", "USA_FORM_URL"], &mut forms.usa_url),
            (&["FORM_GENERIC_URL", "GENERIC_FORM_URL"], &mut forms.generic_url),
            (&["POLAND_FORM_ID"], &mut forms.poland_id),
            (&["SCHENGEN_FORM_ID"], &mut forms.schengen_id),
            (&["USA_FORM_ID"], &mut forms.usa_id),
            (&["FORM_GENERIC_ID", "GENERIC_FORM_ID"], &mut forms.generic_id),
        ];
        for (names, slot) in string_overrides {
            if let Some((_, v)) = first(names) {
                *slot = Some(v);
            }
        }

        if let Some((_, v)) = first(&["LEADS_DB_PATH"]) {
            self.database.path = v;
        }
        if let Some((name, v)) = first(&["MAX_THREAD_MESSAGES"]) {
            self.limits.max_thread_messages = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first(&["MAX_BODY_HTML_RAW_CHARS"]) {
            self.limits.max_body_html_raw_chars = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first(&["MAX_BODY_CHARS"]) {
            self.limits.max_body_chars = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first(&["FIRST_REMINDER_DAYS"]) {
            self.reminders.first_reminder_days = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first(&["SECOND_REMINDER_DAYS"]) {
            self.reminders.second_reminder_days = parse_env(name, &v)?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        InputValidator::validate_email(&self.mailbox.address)
            .context("mailbox.address is invalid")?;
        InputValidator::validate_email(&self.routing.non_standard_forward_email)
            .context("routing.non_standard_forward_email is invalid")?;

        // Validate completion config
        InputValidator::validate_model_name(&self.llm.model).context("llm.model is invalid")?;
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be greater than 0"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("llm.timeout_secs must be greater than 0"));
        }
        if self.llm.max_retries == 0 {
            return Err(anyhow!("llm.max_retries must be greater than 0"));
        }

        // Validate form links
        for (key, url) in [
            ("forms.poland_url", &self.forms.poland_url),
            ("forms.schengen_url", &self.forms.schengen_url),
            ("forms.usa_url", &self.forms.usa_url),
            ("forms.generic_url", &self.forms.generic_url),
        ] {
            if let Some(url) = url.as_deref().filter(|u| !u.trim().is_empty()) {
                InputValidator::validate_form_url(url).with_context(|| format!("{key} is invalid"))?;
            }
        }

        // Validate limits
        for (key, value) in [
            ("limits.max_thread_length", self.limits.max_thread_length),
            ("limits.max_thread_messages", self.limits.max_thread_messages),
            ("limits.max_body_html_raw_chars", self.limits.max_body_html_raw_chars),
            ("limits.max_body_chars", self.limits.max_body_chars),
        ] {
            if value == 0 {
                return Err(anyhow!("{key} must be greater than 0"));
            }
        }

        // Validate reminder config
        if self.reminders.hour >= 24 {
            return Err(anyhow!("reminders.hour must be below 24"));
        }
        if self.reminders.working_hours_start >= self.reminders.working_hours_end
            || self.reminders.working_hours_end > 24
        {
            return Err(anyhow!(
                "reminders.working_hours_start must be before working_hours_end (max 24)"
            ));
        }
        self.reminder_clock()?;

        // Validate database config
        if self.database.path.trim().is_empty() {
            return Err(anyhow!("database.path cannot be empty"));
        }
        if self.database.busy_timeout_secs == 0 {
            return Err(anyhow!("database.busy_timeout_secs must be greater than 0"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        self.log_format().context("logging.format is invalid")?;

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Console log rendering
    pub fn log_format(&self) -> Result<LogFormat> {
        self.logging.format.parse()
    }

    /// Configured questionnaire URLs
    pub fn form_links(&self) -> FormLinks {
        FormLinks {
            poland: self.forms.poland_url.clone(),
            schengen: self.forms.schengen_url.clone(),
            usa: self.forms.usa_url.clone(),
            generic: self.forms.generic_url.clone(),
        }
    }

    /// Configured questionnaire ids
    pub fn form_ids(&self) -> FormIds {
        FormIds {
            poland: self.forms.poland_id.clone(),
            schengen: self.forms.schengen_id.clone(),
            usa: self.forms.usa_id.clone(),
            generic: self.forms.generic_id.clone(),
        }
    }

    /// Reply generation parameters
    pub fn reply_settings(&self) -> ReplySettings {
        ReplySettings {
            mailbox_address: self.mailbox.address.clone(),
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
        }
    }

    /// Completion endpoint settings
    pub fn openai_settings(&self) -> OpenAiSettings {
        OpenAiSettings {
            endpoint: self.llm.endpoint.clone(),
            api_key: self.llm.api_key.clone(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
            max_retries: self.llm.max_retries,
            ..OpenAiSettings::default()
        }
    }

    /// Thread size limits for the pipeline
    pub const fn thread_limits(&self) -> ThreadLimits {
        ThreadLimits {
            max_thread_messages: self.limits.max_thread_messages,
            max_body_html_raw_chars: self.limits.max_body_html_raw_chars,
            max_body_chars: self.limits.max_body_chars,
        }
    }

    /// Lead pipeline settings
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            mailbox_address: self.mailbox.address.clone(),
            form_links: self.form_links(),
            form_ids: self.form_ids(),
            limits: self.thread_limits(),
            first_reminder_days: self.reminders.first_reminder_days,
            second_reminder_days: self.reminders.second_reminder_days,
        }
    }

    /// Local clock for reminder scheduling
    pub fn reminder_clock(&self) -> Result<ReminderClock> {
        Ok(ReminderClock::new(
            self.reminders.local_utc_offset_hours,
            self.reminders.hour,
            self.reminders.working_hours_start,
            self.reminders.working_hours_end,
        )?)
    }

    /// Lead store file
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.database.path)
    }

    /// Lock wait for the lead store
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.database.busy_timeout_secs)
    }
}
