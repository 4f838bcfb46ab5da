//! Response payloads for `/api/feed`

use homebase_common::time::unix_now;
use homebase_common::StateVector;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CandidateDiagnostic, FeedError};
use crate::selector::{CandidateReport, Selection};

/// Success payload
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub time: i64,
    pub source: String,
    pub states: Vec<StateVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Optional diagnostics attached when the caller sets `debug`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub source: String,
    pub target: String,
    pub raw_count: usize,
    pub normalized_count: usize,
    pub sample_raw: Option<Value>,
    pub sample_state: Option<StateVector>,
    pub candidates: Vec<CandidateReport>,
}

/// Error payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub per_candidate_diagnostics: Vec<CandidateDiagnostic>,
}

/// Build the success payload from a selection
pub fn build_success(selection: Selection, debug: bool) -> FeedResponse {
    let debug = debug.then(|| DebugInfo {
        source: selection.candidate.tag.to_string(),
        target: selection.candidate.target.clone(),
        raw_count: selection.raw_count,
        normalized_count: selection.states.len(),
        sample_raw: selection.sample_raw.clone(),
        sample_state: selection.states.first().cloned(),
        candidates: selection.reports.clone(),
    });

    FeedResponse {
        time: unix_now(),
        source: selection.candidate.tag.to_string(),
        states: selection.states,
        debug,
    }
}

/// Build the error payload for a request-level failure
pub fn error_body(error: &FeedError) -> ErrorBody {
    match error {
        FeedError::InvalidParameter(detail) => ErrorBody {
            error: "InvalidParameter",
            detail: detail.clone(),
            per_candidate_diagnostics: Vec::new(),
        },
        FeedError::AllSourcesExhausted(diagnostics) => ErrorBody {
            error: "AllSourcesExhausted",
            detail: format!(
                "{} upstream candidate(s) failed to produce aircraft positions",
                diagnostics.len()
            ),
            per_candidate_diagnostics: diagnostics.clone(),
        },
    }
}
