//! Lead status state machine
//!
//! A pure lookup: (current status, intent) to the next status. Any pair
//! without a rule keeps the current status. `Approved` and `Completed` have
//! no rules at all.

use crate::models::{Intent, LeadStatus};

/// Explicit transitions as (from, intent, to)
pub const TRANSITIONS: [(LeadStatus, Intent, LeadStatus); 20] = [
    (LeadStatus::New, Intent::WantApply, LeadStatus::QuestionnaireSent),
    (LeadStatus::New, Intent::InfoRequest, LeadStatus::InfoProvided),
    (LeadStatus::New, Intent::SendDocs, LeadStatus::DocsInProgress),
    (LeadStatus::New, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::InfoProvided, Intent::WantApply, LeadStatus::QuestionnaireSent),
    (LeadStatus::InfoProvided, Intent::SendDocs, LeadStatus::DocsInProgress),
    (LeadStatus::InfoProvided, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::QuestionnaireSent, Intent::SendDocs, LeadStatus::QuestionnaireFilled),
    (LeadStatus::QuestionnaireSent, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::QuestionnaireFilled, Intent::SendDocs, LeadStatus::DocsInProgress),
    (LeadStatus::QuestionnaireFilled, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::DocsInProgress, Intent::SendDocs, LeadStatus::DocsCollected),
    (LeadStatus::DocsInProgress, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::DocsCollected, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::ReadyForSubmission, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::Submitted, Intent::Cancellation, LeadStatus::Cancelled),
    (LeadStatus::InterviewScheduled, Intent::Reschedule, LeadStatus::InterviewScheduled),
    (LeadStatus::InterviewScheduled, Intent::Cancellation, LeadStatus::Cancelled),
    // reapplication after a refusal or a cancellation
    (LeadStatus::Rejected, Intent::WantApply, LeadStatus::QuestionnaireSent),
    (LeadStatus::Cancelled, Intent::WantApply, LeadStatus::QuestionnaireSent),
];

/// Deterministic status transitions driven by the detected intent
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusTransitionEngine;

impl StatusTransitionEngine {
    /// Next status for a lead in `current` that showed `intent`
    #[must_use]
    pub fn get_new_status(current: LeadStatus, intent: Intent) -> LeadStatus {
        Self::rule(current, intent).unwrap_or(current)
    }

    /// Target of the explicit rule for the pair, if there is one
    #[must_use]
    pub fn rule(current: LeadStatus, intent: Intent) -> Option<LeadStatus> {
        TRANSITIONS
            .iter()
            .find(|(from, on, _)| *from == current && *on == intent)
            .map(|(_, _, to)| *to)
    }
}
