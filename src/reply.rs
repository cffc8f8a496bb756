//! Reply generation
//!
//! Builds the two-message prompt from a [`ThreadAnalysis`] and the raw
//! thread, sends it to a [`CompletionClient`] and repairs the answer: form
//! placeholders the model left behind are replaced with the real link.

use async_trait::async_trait;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::forms::{FormLinks, FormSelector, FormType};
use crate::models::{Language, Message, Sentiment, ThreadAnalysis, UrgencyLevel};

/// One chat message sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System instruction
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// User turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Everything the completion backend needs for one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model name
    pub model: String,
    /// Prompt messages
    pub messages: Vec<ChatMessage>,
    /// Answer budget in tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Text completion backend.
///
/// Fails soft: any transport or API problem yields an empty string.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete the request, or return `""` on failure
    async fn complete(&self, request: &CompletionRequest) -> String;
}

/// Fixed generation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ReplySettings {
    /// Our mailbox; its messages are tagged as ours in the prompt
    pub mailbox_address: String,
    /// Default model
    pub model: String,
    /// Answer budget in tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            mailbox_address: "RobotVisa@itplus.kz".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 800,
            temperature: 0.2,
        }
    }
}

const SYSTEM_PROMPT_EN: &str = "You are a professional visa consultant at TRAVEL PLUS VISA Kazakhstan.

COMMUNICATION STYLE:
- Write clear, structured, and polite business emails
- Be helpful and proactive
- Use short paragraphs and bullet points when appropriate

RULES:
1. Answer the client's questions directly and completely
2. If information is missing, politely ask for clarification
3. NEVER invent facts about consulates, prices, or processing times
4. When providing questionnaire links, use the EXACT URLs provided - no placeholders
5. If the request is urgent, acknowledge it and commit to priority processing
6. If the country is already identified, don't ask about it again

SIGNATURE:
Always end with:
Best regards,
TRAVEL PLUS VISA Kazakhstan
visa@bcdtravel.kz";

const SYSTEM_PROMPT_RU: &str = "Вы — профессиональный визовый консультант компании BCD TRAVEL Казахстан.

СТИЛЬ ОБЩЕНИЯ:
- Пишите чёткие, структурированные и вежливые деловые письма
- Будьте полезным и проактивным
- Используйте короткие абзацы и списки там, где это уместно

ПРАВИЛА:
1. Отвечайте на вопросы клиента прямо и полностью
2. Если информации недостаточно, вежливо запросите уточнения
3. НИКОГДА не выдумывайте факты о консульствах, ценах или сроках
4. При упоминании анкет используйте ТОЧНЫЕ URL из предоставленных ссылок — без плейсхолдеров
5. Если запрос срочный, подтвердите это и обещайте приоритетную обработку
6. Если страна уже определена, не спрашивайте о ней повторно

ПОДПИСЬ:
Всегда завершайте письмо:
С уважением,
BCD TRAVEL Казахстан
visa@bcdtravel.kz";

const PLACEHOLDER_PATTERNS: [&str; 7] = [
    r"(?i)\[ссылка\s*на\s*анкету\]",
    r"(?i)\[ссылка\]",
    r"(?i)\[заполнить\s*анкету\]",
    r"(?i)по\s+ссылке\s+ниже\.?\s*$",
    r"(?i)\[link\s*to\s*(the\s*)?questionnaire\]",
    r"(?i)\[link\]",
    r"(?i)\[fill\s*out\s*(the\s*)?form\]",
];

/// Turns an analysis and its thread into a client-facing reply
#[derive(Clone)]
pub struct ReplyGenerator {
    client: Arc<dyn CompletionClient>,
    settings: ReplySettings,
    placeholders: Vec<Regex>,
}

impl std::fmt::Debug for ReplyGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyGenerator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ReplyGenerator {
    /// Create a generator around a completion backend
    pub fn new(client: Arc<dyn CompletionClient>, settings: ReplySettings) -> Result<Self> {
        let placeholders = PLACEHOLDER_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            client,
            settings,
            placeholders,
        })
    }

    /// Generation parameters in use
    #[must_use]
    pub fn settings(&self) -> &ReplySettings {
        &self.settings
    }

    /// Generate a reply. An empty string means the backend failed and the
    /// caller has to send its own acknowledgment.
    pub async fn generate(
        &self,
        messages: &[Message],
        analysis: &ThreadAnalysis,
        form_links: &FormLinks,
        extra_context: Option<&serde_json::Value>,
        model: Option<&str>,
    ) -> String {
        let request = CompletionRequest {
            model: model.unwrap_or(&self.settings.model).to_string(),
            messages: self.build_messages(messages, analysis, form_links, extra_context),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        debug!(model = %request.model, intent = %analysis.intent, "Requesting reply");
        let reply = self.client.complete(&request).await;
        if reply.trim().is_empty() {
            warn!(intent = %analysis.intent, "Completion backend returned no text");
        }

        self.postprocess(&reply, analysis, form_links)
    }

    /// System and user prompt for a thread
    #[must_use]
    pub fn build_messages(
        &self,
        messages: &[Message],
        analysis: &ThreadAnalysis,
        form_links: &FormLinks,
        extra_context: Option<&serde_json::Value>,
    ) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(Self::build_system_prompt(analysis.language)),
            ChatMessage::user(self.build_user_prompt(messages, analysis, form_links, extra_context)),
        ]
    }

    /// Consultant instructions; Kazakh threads get the Russian prompt
    #[must_use]
    pub fn build_system_prompt(language: Language) -> &'static str {
        if language.is_english() {
            SYSTEM_PROMPT_EN
        } else {
            SYSTEM_PROMPT_RU
        }
    }

    /// Analysis, links, extra context, the thread and the task, separated by blank lines
    #[must_use]
    pub fn build_user_prompt(
        &self,
        messages: &[Message],
        analysis: &ThreadAnalysis,
        form_links: &FormLinks,
        extra_context: Option<&serde_json::Value>,
    ) -> String {
        let english = analysis.language.is_english();
        let mut parts = vec![meta_block(analysis, english)];

        if let Some(forms) = forms_block(analysis, form_links, english) {
            parts.push(forms);
        }

        if let Some(context) = extra_context.filter(|c| !is_blank_context(c)) {
            let header = if english {
                "Additional context:"
            } else {
                "Дополнительный контекст:"
            };
            let rendered = serde_json::to_string_pretty(context).unwrap_or_default();
            parts.push(format!("\n{header}\n{rendered}"));
        }

        parts.push(self.conversation_block(messages, english));
        parts.push(instruction_block(analysis, english));

        parts.join("\n\n")
    }

    fn conversation_block(&self, messages: &[Message], english: bool) -> String {
        let header = if english {
            "=== EMAIL THREAD ==="
        } else {
            "=== ПЕРЕПИСКА ==="
        };

        let blocks = messages
            .iter()
            .map(|message| {
                let who = if message.is_from(&self.settings.mailbox_address) {
                    "BCD TRAVEL"
                } else {
                    "Client"
                };
                let date = message
                    .received_at
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default();
                format!(
                    "From: {who} <{}>{date}\nSubject: {}\n\n{}",
                    message.from_address, message.subject, message.body
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        format!("{header}\n\n{blocks}")
    }

    /// Replace link placeholders with the offered form's URL, append the URL
    /// when the text promises a link below but has none, and trim.
    #[must_use]
    pub fn postprocess(&self, reply: &str, analysis: &ThreadAnalysis, form_links: &FormLinks) -> String {
        let Some(url) = primary_form_url(analysis, form_links) else {
            return reply.trim().to_string();
        };

        let mut text = reply.to_string();
        for pattern in &self.placeholders {
            text = pattern.replace_all(&text, NoExpand(url)).into_owned();
        }

        let lowered = text.to_lowercase();
        let promises_link = lowered.contains("ссылка ниже") || lowered.contains("link below");
        if promises_link && !text.contains(url) {
            if analysis.language.is_english() {
                text.push_str(&format!("\n\nQuestionnaire link: {url}"));
            } else {
                text.push_str(&format!("\n\nСсылка на анкету: {url}"));
            }
        }

        text.trim().to_string()
    }
}

/// Link of the offered form, if any. Non-standard destinations never get one.
#[must_use]
pub fn primary_form_url<'a>(analysis: &ThreadAnalysis, form_links: &'a FormLinks) -> Option<&'a str> {
    if analysis.is_non_standard_destination {
        return None;
    }
    FormSelector::primary_link(analysis.selected_form, form_links)
}

fn is_blank_context(context: &serde_json::Value) -> bool {
    match context {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn urgency_label(urgency: UrgencyLevel, english: bool) -> &'static str {
    match (urgency, english) {
        (UrgencyLevel::Critical, true) => "CRITICAL (flight today/tomorrow)",
        (UrgencyLevel::High, true) => "HIGH (ASAP)",
        (UrgencyLevel::Medium, true) => "MEDIUM (this week)",
        (UrgencyLevel::Normal, true) => "NORMAL",
        (UrgencyLevel::Low, true) => "LOW",
        (UrgencyLevel::Critical, false) => "КРИТИЧНО (вылет сегодня/завтра)",
        (UrgencyLevel::High, false) => "ВЫСОКАЯ (срочно)",
        (UrgencyLevel::Medium, false) => "СРЕДНЯЯ (на этой неделе)",
        (UrgencyLevel::Normal, false) => "ОБЫЧНАЯ",
        (UrgencyLevel::Low, false) => "НИЗКАЯ",
    }
}

fn meta_block(analysis: &ThreadAnalysis, english: bool) -> String {
    let country = analysis.country_code().unwrap_or("unknown");
    let urgency = urgency_label(analysis.urgency, english);
    let confidence = format!("{:.0}%", analysis.confidence_score * 100.0);
    let yes_no = |flag: bool| match (flag, english) {
        (true, true) => "YES",
        (false, true) => "NO",
        (true, false) => "ДА",
        (false, false) => "НЕТ",
    };

    if english {
        format!(
            "=== INTERNAL ANALYSIS (do not output to client) ===\n\
             Intent: {}\n\
             Country: {country}\n\
             Previous status: {}\n\
             New status: {}\n\
             Urgency: {urgency}\n\
             Sentiment: {}\n\
             Non-standard destination: {}\n\
             Has attachments: {}\n\
             Confidence: {confidence}",
            analysis.intent,
            analysis.previous_status,
            analysis.new_status,
            analysis.sentiment,
            yes_no(analysis.is_non_standard_destination),
            yes_no(analysis.has_attachments),
        )
    } else {
        format!(
            "=== ВНУТРЕННИЙ АНАЛИЗ (не выводить клиенту) ===\n\
             Намерение: {}\n\
             Страна: {country}\n\
             Предыдущий статус: {}\n\
             Новый статус: {}\n\
             Срочность: {urgency}\n\
             Тональность: {}\n\
             Нестандартное направление: {}\n\
             Есть вложения: {}\n\
             Уверенность: {confidence}",
            analysis.intent,
            analysis.previous_status,
            analysis.new_status,
            analysis.sentiment,
            yes_no(analysis.is_non_standard_destination),
            yes_no(analysis.has_attachments),
        )
    }
}

fn forms_block(analysis: &ThreadAnalysis, form_links: &FormLinks, english: bool) -> Option<String> {
    if analysis.is_non_standard_destination {
        return None;
    }

    let lines: Vec<String> = FormType::ALL
        .into_iter()
        .filter(|form| analysis.offers(*form))
        .filter_map(|form| {
            form_links
                .get(form)
                .map(|url| format!("- {}: {url}", form.label(english)))
        })
        .collect();

    if lines.is_empty() {
        return None;
    }

    let header = if english {
        "=== QUESTIONNAIRE LINKS (use these exact URLs in your reply) ==="
    } else {
        "=== ССЫЛКИ НА АНКЕТЫ (используйте эти URL в ответе) ==="
    };
    Some(format!("{header}\n{}", lines.join("\n")))
}

fn instruction_block(analysis: &ThreadAnalysis, english: bool) -> String {
    let mut hints: Vec<String> = Vec::new();

    if analysis.urgency.needs_acknowledgement() {
        hints.push(if english {
            "- URGENT: Acknowledge urgency in the opening paragraph".to_string()
        } else {
            "- СРОЧНО: Подтвердите срочность в начале письма".to_string()
        });
    }

    if let Some(code) = analysis.country_code() {
        if !analysis.is_non_standard_destination {
            hints.push(if english {
                format!("- Country detected: {code}. Don't ask about destination again.")
            } else {
                format!("- Страна определена: {code}. Не спрашивайте о направлении повторно.")
            });
        }
    }

    if analysis.is_non_standard_destination {
        hints.push(if english {
            "- Non-standard destination: Inform that this requires individual processing".to_string()
        } else {
            "- Нестандартное направление: Сообщите, что требуется индивидуальная обработка".to_string()
        });
    }

    if analysis.needs_form() {
        hints.push(if english {
            "- Include the questionnaire link naturally in your response".to_string()
        } else {
            "- Включите ссылку на анкету естественно в текст ответа".to_string()
        });
    }

    if analysis.sentiment == Sentiment::Negative {
        hints.push(if english {
            "- Client seems upset: Be extra empathetic and professional".to_string()
        } else {
            "- Клиент недоволен: Будьте особенно эмпатичны и профессиональны".to_string()
        });
    }

    let hints = hints.join("\n");
    if english {
        format!(
            "=== TASK ===\nWrite a professional reply to the client based on the thread above.\n{hints}\n\nWrite your response now:"
        )
    } else {
        format!(
            "=== ЗАДАЧА ===\nНапишите профессиональный ответ клиенту на основе переписки выше.\n{hints}\n\nНапишите ответ:"
        )
    }
}
