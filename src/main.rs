use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use visa_lead_engine::config::AppConfig;
use visa_lead_engine::country::CountryDatabase;
use visa_lead_engine::db::LeadStore;
use visa_lead_engine::forms::{ExistingForms, FormType};
use visa_lead_engine::llm::OpenAiClient;
use visa_lead_engine::logging::{init_logging, OperationTimer};
use visa_lead_engine::models::{GraphMessage, Message};
use visa_lead_engine::nlp::TextNormalizer;
use visa_lead_engine::reply::ReplyGenerator;
use visa_lead_engine::service::{reminder_context, LeadService, ThreadBuilder};
use visa_lead_engine::validation::InputValidator;
use visa_lead_engine::ThreadAnalyzer;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered over config/*
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a message or thread and print the report
    Classify {
        #[command(flatten)]
        input: ThreadInput,
    },
    /// Print the prompts a reply would be generated from
    Prompt {
        #[command(flatten)]
        input: ThreadInput,
    },
    /// Generate a reply through the completion API
    Reply {
        #[command(flatten)]
        input: ThreadInput,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },
    /// Run the lead pipeline for one Graph message
    Process {
        /// Graph message JSON file
        #[arg(long)]
        message: PathBuf,

        /// Graph thread JSON file (array or {"value": [...]})
        #[arg(long)]
        thread: Option<PathBuf>,
    },
    /// List leads whose follow-up is due
    DueReminders {
        /// Generate the follow-ups and advance each lead's schedule
        #[arg(long)]
        generate: bool,

        /// Directory of Graph thread files named `<conversation id>.json`
        #[arg(long, requires = "generate")]
        threads: Option<PathBuf>,
    },
    /// Acknowledge filled questionnaires and mark the leads
    FormAcks {
        /// Signature appended to the acknowledgment
        #[arg(long)]
        footer: Option<String>,
    },
}

#[derive(Args)]
struct ThreadInput {
    /// Message text
    #[arg(long, conflicts_with_all = ["file", "thread"])]
    text: Option<String>,

    /// File holding the message text
    #[arg(long, conflicts_with = "thread")]
    file: Option<PathBuf>,

    /// Graph thread JSON file
    #[arg(long)]
    thread: Option<PathBuf>,

    /// Stored status of the lead
    #[arg(long)]
    previous_status: Option<String>,

    /// Questionnaires already sent (poland, schengen, usa, generic)
    #[arg(long, value_delimiter = ',')]
    existing: Vec<String>,
}

impl ThreadInput {
    fn messages(&self) -> Result<Vec<Message>> {
        if let Some(path) = &self.thread {
            let thread = read_graph_thread(path)?;
            if thread.is_empty() {
                return Err(anyhow!("Thread {} has no messages", path.display()));
            }
            return Ok(thread.iter().map(Message::from_graph).collect());
        }

        let text = match (&self.text, &self.file) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            (None, None) => return Err(anyhow!("One of --text, --file or --thread is required")),
        };
        InputValidator::validate_thread_text(&text)?;
        Ok(vec![Message::from_text(&InputValidator::sanitize_text(&text))])
    }

    fn existing_forms(&self) -> Result<ExistingForms> {
        self.existing.iter().try_fold(ExistingForms::none(), |acc, name| {
            let form: FormType = name.parse().map_err(|e: String| anyhow!(e))?;
            Ok(acc.with(form))
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_graph_thread(path: &Path) -> Result<Vec<GraphMessage>> {
    let value: serde_json::Value = read_json(path)?;
    let list = match value {
        serde_json::Value::Object(mut map) if map.contains_key("value") => {
            map.remove("value").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(list).with_context(|| format!("Unexpected thread shape in {}", path.display()))
}

#[allow(clippy::print_stdout)]
fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_analyzer(config: &AppConfig) -> Result<(ThreadAnalyzer, Arc<TextNormalizer>)> {
    let normalizer = Arc::new(TextNormalizer::new(config.limits.max_thread_length)?);
    let analyzer = ThreadAnalyzer::new(
        Arc::new(CountryDatabase::builtin()),
        Arc::clone(&normalizer),
        config.routing.non_standard_forward_email.clone(),
    );
    Ok((analyzer, normalizer))
}

fn build_replies(config: &AppConfig) -> Result<ReplyGenerator> {
    let client = OpenAiClient::new(config.openai_settings())?;
    Ok(ReplyGenerator::new(Arc::new(client), config.reply_settings())?)
}

fn open_store(config: &AppConfig) -> Result<LeadStore> {
    let store = LeadStore::open(
        config.database_path(),
        config.busy_timeout(),
        config.reminder_clock()?,
    )
    .with_context(|| format!("Failed to open lead store {}", config.database.path))?;
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Initialize logging
    let level = cli.log_level.clone().unwrap_or_else(|| config.get_log_level());
    let _log_guard = init_logging(
        Some(&level),
        config.log_format()?,
        config.logging.file_path.as_deref().map(Path::new),
    )?;

    info!("Starting lead-engine");

    match &cli.command {
        Commands::Classify { input } => classify(&config, input),
        Commands::Prompt { input } => prompt(&config, input),
        Commands::Reply { input, model } => reply(&config, input, model.as_deref()).await,
        Commands::Process { message, thread } => process(&config, message, thread.as_deref()).await,
        Commands::DueReminders { generate: false, .. } => due_reminders(&config),
        Commands::DueReminders {
            generate: true,
            threads,
        } => send_follow_ups(&config, threads.as_deref()).await,
        Commands::FormAcks { footer } => form_acks(&config, footer.as_deref()),
    }
}

fn classify(config: &AppConfig, input: &ThreadInput) -> Result<()> {
    let (analyzer, _) = build_analyzer(config)?;
    let report = analyzer.classify(
        &input.messages()?,
        &config.mailbox.address,
        input.previous_status.as_deref(),
        &input.existing_forms()?,
    );
    emit(&report)
}

fn prompt(config: &AppConfig, input: &ThreadInput) -> Result<()> {
    let (analyzer, _) = build_analyzer(config)?;
    let messages = input.messages()?;
    let analysis = analyzer.analyze(
        &messages,
        &config.mailbox.address,
        input.previous_status.as_deref(),
        &input.existing_forms()?,
    );
    let replies = build_replies(config)?;
    let prompts = replies.build_messages(&messages, &analysis, &config.form_links(), None);
    emit(&prompts)
}

async fn reply(config: &AppConfig, input: &ThreadInput, model: Option<&str>) -> Result<()> {
    if let Some(model) = model {
        InputValidator::validate_model_name(model)?;
    }
    let (analyzer, _) = build_analyzer(config)?;
    let messages = input.messages()?;
    let analysis = analyzer.analyze(
        &messages,
        &config.mailbox.address,
        input.previous_status.as_deref(),
        &input.existing_forms()?,
    );

    let timer = OperationTimer::new("generate_reply");
    let text = build_replies(config)?
        .generate(&messages, &analysis, &config.form_links(), None, model)
        .await;
    timer.finish();

    emit(&json!({
        "analysis": visa_lead_engine::ClassificationReport::from(&analysis),
        "reply": text,
    }))
}

fn build_service(config: &AppConfig) -> Result<LeadService> {
    let (analyzer, normalizer) = build_analyzer(config)?;
    Ok(LeadService::new(
        analyzer,
        build_replies(config)?,
        open_store(config)?,
        ThreadBuilder::new(config.thread_limits(), normalizer),
        config.service_settings(),
    ))
}

async fn process(config: &AppConfig, message: &Path, thread: Option<&Path>) -> Result<()> {
    let message: GraphMessage = read_json(message)?;
    let thread = thread.map(read_graph_thread).transpose()?.unwrap_or_default();

    let service = build_service(config)?;
    let outcome = service.process_incoming(&message, &thread).await?;
    emit(&outcome)
}

fn due_reminders(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let now = Utc::now();
    let due: Vec<_> = store
        .get_due_reminders(now)?
        .into_iter()
        .map(|lead| {
            json!({
                "context": reminder_context(&lead),
                "within_working_hours": store.clock().is_working_hours(now),
                "lead": lead,
            })
        })
        .collect();
    info!(count = due.len(), "Due reminders listed");
    emit(&due)
}

fn stored_thread(dir: Option<&Path>, conversation_id: Option<&str>) -> Result<Vec<GraphMessage>> {
    let path = match (dir, conversation_id) {
        (Some(dir), Some(id)) => dir.join(format!("{id}.json")),
        _ => return Ok(Vec::new()),
    };
    if path.is_file() {
        read_graph_thread(&path)
    } else {
        Ok(Vec::new())
    }
}

async fn send_follow_ups(config: &AppConfig, threads: Option<&Path>) -> Result<()> {
    let service = build_service(config)?;
    let now = Utc::now();
    let mut follow_ups = Vec::new();

    for mut lead in service.store().get_due_reminders(now)? {
        let thread = stored_thread(threads, lead.conversation_id.as_deref())?;
        match service.follow_up(&mut lead, &thread, now).await? {
            Some(follow_up) => follow_ups.push(follow_up),
            None => break,
        }
    }
    info!(count = follow_ups.len(), "Follow-ups generated");
    emit(&follow_ups)
}

fn form_acks(config: &AppConfig, footer: Option<&str>) -> Result<()> {
    let acks = build_service(config)?.acknowledge_forms(footer)?;
    info!(count = acks.len(), "Form acknowledgments prepared");
    emit(&acks)
}
