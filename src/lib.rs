//! Visa Lead Engine - Email Classification and Lead Funnel
//!
//! A Rust library that reads visa-application email threads, classifies
//! them, and moves the matching lead through the application funnel.
//!
//! # Features
//!
//! - Language, destination, intent, urgency and sentiment detection
//! - Lead status transitions and questionnaire selection
//! - Reply prompting over an OpenAI-compatible completion API
//! - SQLite lead store with audit log and follow-up reminders
//! - Layered configuration, structured logging and metrics

/// Thread analysis orchestration
pub mod analyzer;
/// Configuration management
pub mod config;
/// Destination knowledge base
pub mod country;
/// Lead store on SQLite
pub mod db;
/// Error types
pub mod error;
/// Questionnaire types and selection
pub mod forms;
/// Intent detection
pub mod intent;
/// Completion API client
pub mod llm;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Text normalization and signal detectors
pub mod nlp;
/// Reminder timing
pub mod reminders;
/// Reply prompting and post-processing
pub mod reply;
/// Database schema definitions
pub mod schema;
/// Per-message lead pipeline
pub mod service;
/// Lead status state machine
pub mod transitions;
/// Text helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use analyzer::ThreadAnalyzer;
pub use db::{Lead, LeadStore};
pub use error::{LeadEngineError, Result};
pub use forms::{FormLinks, FormType};
pub use models::{
    ClassificationReport, GraphMessage, Intent, Language, LeadStatus, Message, ThreadAnalysis,
    UrgencyLevel,
};
pub use reply::{CompletionClient, ReplyGenerator};
pub use service::{LeadService, ProcessOutcome};
pub use transitions::StatusTransitionEngine;
