//! Error types for homebase-feed
//!
//! Two levels:
//! - [`SourceError`]: why one upstream candidate failed. Recovered locally by
//!   the selector and only surfaced as a [`CandidateDiagnostic`].
//! - [`FeedError`]: request-level failure visible to the caller
//!   (400 for parameter validation, 502 once every candidate failed).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::response;

/// Failure of a single upstream candidate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// Connection failure, timeout, or non-success HTTP status
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    /// Body is not JSON or cannot be decoded
    #[error("Upstream returned malformed body: {0}")]
    Malformed(String),

    /// JSON decoded but matches none of the declared schema shapes
    #[error("Upstream response did not contain an aircraft list (top-level keys: {})", .keys.join(", "))]
    UnrecognizedSchema { keys: Vec<String> },

    /// Schema recognized but no usable positions
    #[error("No position data: {0}")]
    NoPositionData(String),
}

impl SourceError {
    /// Stable taxonomy name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Unreachable(_) => "UpstreamUnreachable",
            SourceError::Malformed(_) => "UpstreamMalformed",
            SourceError::UnrecognizedSchema { .. } => "UnrecognizedSchema",
            SourceError::NoPositionData(_) => "NoPositionData",
        }
    }
}

/// Per-candidate diagnostic carried by [`FeedError::AllSourcesExhausted`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDiagnostic {
    /// Source tag (e.g. `local_dump1090`)
    pub source: String,
    /// Exact URL queried
    pub target: String,
    /// Taxonomy name of the failure
    pub kind: String,
    pub detail: String,
    /// Top-level keys of an unrecognized payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys_seen: Option<Vec<String>>,
}

impl CandidateDiagnostic {
    pub fn new(source: &str, target: &str, error: &SourceError) -> Self {
        let keys_seen = match error {
            SourceError::UnrecognizedSchema { keys } => Some(keys.clone()),
            _ => None,
        };
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind: error.kind().to_string(),
            detail: error.to_string(),
            keys_seen,
        }
    }
}

/// Request-level feed error
#[derive(Debug, Error)]
pub enum FeedError {
    /// Out-of-range or unparseable request parameter (400)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Every configured candidate failed (502)
    #[error("All upstream sources exhausted")]
    AllSourcesExhausted(Vec<CandidateDiagnostic>),
}

impl FeedError {
    pub fn status(&self) -> StatusCode {
        match self {
            FeedError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            FeedError::AllSourcesExhausted(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(response::error_body(&self))).into_response()
    }
}

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(SourceError::Unreachable("x".into()).kind(), "UpstreamUnreachable");
        assert_eq!(SourceError::Malformed("x".into()).kind(), "UpstreamMalformed");
        assert_eq!(
            SourceError::UnrecognizedSchema { keys: vec![] }.kind(),
            "UnrecognizedSchema"
        );
        assert_eq!(SourceError::NoPositionData("x".into()).kind(), "NoPositionData");
    }

    #[test]
    fn test_diagnostic_carries_keys_seen() {
        let err = SourceError::UnrecognizedSchema {
            keys: vec!["msg".to_string(), "now".to_string()],
        };
        let diag = CandidateDiagnostic::new("adsblol_point", "https://x/1/2/3", &err);
        assert_eq!(diag.keys_seen, Some(vec!["msg".to_string(), "now".to_string()]));
        assert!(diag.detail.contains("msg, now"));

        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["keysSeen"][0], "msg");
        assert_eq!(json["kind"], "UnrecognizedSchema");
    }

    #[test]
    fn test_diagnostic_omits_keys_for_other_errors() {
        let diag = CandidateDiagnostic::new(
            "local_dump1090",
            "http://127.0.0.1:8080/data/aircraft.json",
            &SourceError::Unreachable("HTTP 404".into()),
        );
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json.get("keysSeen").is_none());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FeedError::InvalidParameter("lat".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FeedError::AllSourcesExhausted(vec![]).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
