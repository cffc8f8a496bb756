use anyhow::{anyhow, Result};
use reqwest::Url;

/// Largest thread text accepted from callers, in characters
pub const MAX_THREAD_TEXT_CHARS: usize = 200_000;

/// Validation utilities for configuration values and caller input
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate email format
    pub fn validate_email(email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(anyhow!("Email cannot be empty"));
        }

        if email.len() > 254 {
            return Err(anyhow!("Email too long (max 254 characters)"));
        }

        if email.chars().any(char::is_whitespace) {
            return Err(anyhow!("Email cannot contain whitespace"));
        }

        let Some((local_part, domain_part)) = email.split_once('@') else {
            return Err(anyhow!("Email must contain @ symbol"));
        };

        if domain_part.contains('@') {
            return Err(anyhow!("Email must have exactly one @ symbol"));
        }

        if local_part.is_empty() || local_part.len() > 64 {
            return Err(anyhow!("Email local part invalid"));
        }

        if domain_part.is_empty()
            || !domain_part.contains('.')
            || domain_part.starts_with('.')
            || domain_part.ends_with('.')
        {
            return Err(anyhow!("Email domain invalid"));
        }

        Ok(())
    }

    /// Validate a questionnaire link: absolute http(s) URL with a host
    pub fn validate_form_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Form URL cannot be empty"));
        }

        if url.chars().any(char::is_whitespace) {
            return Err(anyhow!("Form URL cannot contain whitespace"));
        }

        let parsed = Url::parse(url).map_err(|e| anyhow!("Invalid form URL {url}: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("Form URL must use http or https: {url}"));
        }

        if parsed.host_str().unwrap_or_default().is_empty() {
            return Err(anyhow!("Form URL has no host: {url}"));
        }

        Ok(())
    }

    /// Validate a completion model name
    pub fn validate_model_name(model: &str) -> Result<()> {
        if model.trim().is_empty() {
            return Err(anyhow!("Model name cannot be empty"));
        }

        if model.len() > 100 {
            return Err(anyhow!("Model name too long (max 100 characters)"));
        }

        if !model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '/'))
        {
            return Err(anyhow!("Model name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate thread text handed to the classifier
    pub fn validate_thread_text(text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(anyhow!("Thread text cannot be empty"));
        }

        if text.contains('\0') {
            return Err(anyhow!("Thread text contains NUL characters"));
        }

        let chars = text.chars().count();
        if chars > MAX_THREAD_TEXT_CHARS {
            return Err(anyhow!(
                "Thread text too long ({chars} characters, max {MAX_THREAD_TEXT_CHARS})"
            ));
        }

        Ok(())
    }

    /// Drop control characters other than line breaks and tabs, then trim
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }
}
