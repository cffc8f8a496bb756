//! Integration tests for configuration loading and the settings it derives

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use visa_lead_engine::config::AppConfig;
use visa_lead_engine::forms::FormType;

fn config_file(extension: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(extension)
        .tempfile()
        .expect("Failed to create config file");
    file.write_all(body.as_bytes()).expect("Failed to write config file");
    file
}

#[test]
fn test_default_config_values() {
    let config = AppConfig::default();

    assert_eq!(config.mailbox.address, "RobotVisa@itplus.kz");
    assert_eq!(config.llm.endpoint, "https://api.openai.com/v1");
    assert_eq!(config.llm.max_tokens, 800);
    assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.limits.max_thread_length, 8000);
    assert_eq!(config.limits.max_body_html_raw_chars, 20_000);
    assert_eq!(config.limits.max_body_chars, 3000);
}

#[test]
fn test_default_reminder_and_storage_values() {
    let config = AppConfig::default();

    assert_eq!(config.reminders.first_reminder_days, 1);
    assert_eq!(config.reminders.second_reminder_days, 3);
    assert_eq!(config.reminders.hour, 10);
    assert_eq!(config.database.path, "leads.db");
    assert_eq!(config.busy_timeout(), Duration::from_secs(20));
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_config_validation_success() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn test_config_validation_invalid_mailbox() {
    let mut config = AppConfig::default();
    config.mailbox.address = "robot-at-itplus".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_invalid_forward_address() {
    let mut config = AppConfig::default();
    config.routing.non_standard_forward_email = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_invalid_form_url() {
    let mut config = AppConfig::default();
    config.forms.usa_url = Some("forms.example.com/usa".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_blank_form_url_is_ignored() {
    let mut config = AppConfig::default();
    config.forms.usa_url = Some("  ".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_temperature_range() {
    let mut config = AppConfig::default();
    config.llm.temperature = 2.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_zero_limits() {
    let mut config = AppConfig::default();
    config.limits.max_thread_messages = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_bad_working_hours() {
    let mut config = AppConfig::default();
    config.reminders.working_hours_start = 22;
    config.reminders.working_hours_end = 9;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_bad_utc_offset() {
    let mut config = AppConfig::default();
    config.reminders.local_utc_offset_hours = 20;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_invalid_log_level() {
    let mut config = AppConfig::default();
    config.logging.level = "verbose".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_valid_log_formats() {
    for format in ["text", "json"] {
        let mut config = AppConfig::default();
        config.logging.format = format.to_string();
        assert!(config.validate().is_ok(), "Failed for format: {format}");
    }
}

#[test]
fn test_load_from_toml_file() {
    let file = config_file(
        ".toml",
        r#"
[mailbox]
address = "visa@agency.kz"

[forms]
poland_url = "https://forms.example.com/pl"
poland_id = "pl-1"

[reminders]
first_reminder_days = 2
"#,
    );

    let config = AppConfig::load_from(Some(file.path())).expect("config loads");
    assert_eq!(config.mailbox.address, "visa@agency.kz");
    assert_eq!(config.reminders.first_reminder_days, 2);
    assert_eq!(config.llm.model, "gpt-4o");

    let settings = config.service_settings();
    assert_eq!(settings.mailbox_address, "visa@agency.kz");
    assert_eq!(settings.form_links.get(FormType::Poland), Some("https://forms.example.com/pl"));
    assert_eq!(settings.form_ids.get(FormType::Poland), Some("pl-1"));
}

#[test]
fn test_load_from_yaml_file() {
    let file = config_file(
        ".yaml",
        "limits:\n  max_thread_messages: 4\nlogging:\n  format: json\n",
    );

    let config = AppConfig::load_from(Some(file.path())).expect("config loads");
    assert_eq!(config.thread_limits().max_thread_messages, 4);
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_load_rejects_invalid_file_values() {
    let file = config_file(".toml", "[llm]\nmax_retries = 0\n");
    assert!(AppConfig::load_from(Some(file.path())).is_err());
}

#[test]
fn test_load_requires_explicit_file() {
    let missing = std::env::temp_dir().join("lead-engine-missing-config.toml");
    assert!(AppConfig::load_from(Some(&missing)).is_err());
}

#[test]
fn test_legacy_overrides_prefer_first_name() {
    let env: HashMap<&str, &str> = [
        ("FORM_SCHENGEN_URL", "https://forms.example.com/schengen-new"),
        ("SCHENGEN_FORM_URL", "https://forms.example.com/schengen-old"),
        ("MAILBOX_UPN", "visa@agency.kz"),
        ("OPENAI_API_KEY", "sk-test"),
        ("LEADS_DB_PATH", "/var/lib/leads/leads.db"),
    ]
    .into_iter()
    .collect();

    let mut config = AppConfig::default();
    config
        .apply_env_overrides(|name| env.get(name).map(ToString::to_string))
        .expect("overrides apply");

    assert_eq!(
        config.forms.schengen_url.as_deref(),
        Some("https://forms.example.com/schengen-new")
    );
    assert_eq!(config.mailbox.address, "visa@agency.kz");
    assert_eq!(config.openai_settings().api_key.as_deref(), Some("sk-test"));
    assert_eq!(
        config.database_path(),
        std::path::PathBuf::from("/var/lib/leads/leads.db")
    );
}

#[test]
fn test_reply_and_client_settings_follow_config() {
    let mut config = AppConfig::default();
    config.llm.model = "gpt-4o-mini".to_string();
    config.llm.timeout_secs = 15;
    config.llm.max_retries = 5;

    let reply = config.reply_settings();
    assert_eq!(reply.model, "gpt-4o-mini");
    assert_eq!(reply.mailbox_address, config.mailbox.address);

    let client = config.openai_settings();
    assert_eq!(client.timeout, Duration::from_secs(15));
    assert_eq!(client.max_retries, 5);
}

#[test]
fn test_reminder_clock_from_config() {
    let config = AppConfig::default();
    let clock = config.reminder_clock().expect("valid clock");
    let evening = Utc
        .with_ymd_and_hms(2025, 1, 11, 20, 30, 0)
        .single()
        .expect("valid time");
    assert_eq!(
        clock.reminder_at(evening, 1).format("%Y-%m-%d %H:%M:%S").to_string(),
        "2025-01-12 05:00:00"
    );
}
