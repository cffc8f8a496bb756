use metrics::{counter, histogram};
use std::time::Duration;

use crate::forms::FormType;
use crate::models::{LeadStatus, ThreadAnalysis};

/// Metric names recorded by the classifier, the lead service and the LLM client
#[derive(Debug, Clone)]
pub struct AnalysisMetrics {
    // Classification metrics
    pub analyses_total: &'static str,
    pub analysis_duration: &'static str,
    pub status_transitions_total: &'static str,
    pub forms_offered_total: &'static str,
    pub forwards_total: &'static str,

    // Completion metrics
    pub llm_requests_total: &'static str,
    pub llm_request_duration: &'static str,
}

impl Default for AnalysisMetrics {
    fn default() -> Self {
        Self {
            analyses_total: "lead_engine_analyses_total",
            analysis_duration: "lead_engine_analysis_duration_seconds",
            status_transitions_total: "lead_engine_status_transitions_total",
            forms_offered_total: "lead_engine_forms_offered_total",
            forwards_total: "lead_engine_forwards_total",

            llm_requests_total: "lead_engine_llm_requests_total",
            llm_request_duration: "lead_engine_llm_request_duration_seconds",
        }
    }
}

impl AnalysisMetrics {
    /// Record one finished thread analysis and everything it decided
    pub fn record_analysis(&self, analysis: &ThreadAnalysis, duration: Duration) {
        counter!(
            self.analyses_total,
            "intent" => analysis.intent.as_str(),
            "language" => analysis.language.as_str()
        )
        .increment(1);
        histogram!(self.analysis_duration).record(duration.as_secs_f64());

        if analysis.new_status != analysis.previous_status {
            self.record_transition(analysis.previous_status, analysis.new_status);
        }

        if let Some(form) = analysis.selected_form {
            self.record_form_offer(form);
        }

        if analysis.forward_to_email.is_some() {
            counter!(self.forwards_total).increment(1);
        }
    }

    /// Record a status change
    pub fn record_transition(&self, from: LeadStatus, to: LeadStatus) {
        counter!(
            self.status_transitions_total,
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
    }

    /// Record a questionnaire offer
    pub fn record_form_offer(&self, form: FormType) {
        counter!(self.forms_offered_total, "form" => form.as_str()).increment(1);
    }

    /// Record one completion request. `outcome` is `success`, `empty`, `retry_exhausted` or `fatal`.
    pub fn record_llm_request(&self, outcome: &'static str, duration: Duration) {
        counter!(self.llm_requests_total, "outcome" => outcome).increment(1);
        histogram!(self.llm_request_duration).record(duration.as_secs_f64());
    }
}
