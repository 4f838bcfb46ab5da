//! Source selection with fallback
//!
//! Candidates are attempted strictly in priority order, one at a time. A
//! candidate succeeds only when the fetch is OK, the payload parses under
//! its declared schema, and normalization leaves at least one aircraft.
//! Every failure is recorded as a diagnostic and the next candidate is
//! tried; only exhausting the plan fails the request.

use homebase_common::geo::{valid_lat, valid_lon};
use homebase_common::time::unix_now;
use homebase_common::StateVector;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{SourcePriority, SourcesConfig};
use crate::error::{CandidateDiagnostic, FeedError, FeedResult, SourceError};
use crate::fetcher::SourceFetcher;
use crate::normalize::normalize;
use crate::schema::SourceSchema;

/// Source tag for local receiver candidates
pub const SOURCE_LOCAL: &str = "local_dump1090";

/// Source tag for the remote aggregator candidate
pub const SOURCE_REMOTE: &str = "adsblol_point";

pub const MIN_RADIUS_NM: i64 = 1;
pub const MAX_RADIUS_NM: i64 = 250;

/// Clamp a requested radius to the range the remote accepts
pub fn clamp_radius(radius_nm: i64) -> i64 {
    radius_nm.clamp(MIN_RADIUS_NM, MAX_RADIUS_NM)
}

/// Validated request parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedQuery {
    pub lat: f64,
    pub lon: f64,
    /// Already clamped to 1..=250
    pub radius_nm: i64,
    /// Skip local candidates for this request
    pub remote_only: bool,
}

impl FeedQuery {
    /// Validate coordinates and clamp the radius
    ///
    /// Runs before any network call.
    pub fn new(lat: f64, lon: f64, radius_nm: i64, remote_only: bool) -> FeedResult<Self> {
        if !valid_lat(lat) {
            return Err(FeedError::InvalidParameter(format!(
                "lat must be within [-90, 90], got {}",
                lat
            )));
        }
        if !valid_lon(lon) {
            return Err(FeedError::InvalidParameter(format!(
                "lon must be within [-180, 180], got {}",
                lon
            )));
        }
        Ok(Self {
            lat,
            lon,
            radius_nm: clamp_radius(radius_nm),
            remote_only,
        })
    }
}

/// One upstream attempt in the plan
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub tag: &'static str,
    pub schema: SourceSchema,
    /// Exact URL queried
    pub target: String,
    pub timeout: Duration,
}

/// `{base}/{lat}/{lon}/{radius}`
pub fn remote_url(base: &str, query: &FeedQuery) -> String {
    format!(
        "{}/{}/{}/{}",
        base.trim_end_matches('/'),
        query.lat,
        query.lon,
        query.radius_nm
    )
}

/// Build the ordered candidate plan for one request
pub fn plan(sources: &SourcesConfig, query: &FeedQuery) -> Vec<Candidate> {
    let priority = if query.remote_only {
        SourcePriority::RemoteOnly
    } else {
        sources.priority
    };

    let local = sources.local_urls.iter().map(|url| Candidate {
        tag: SOURCE_LOCAL,
        schema: SourceSchema::LocalReceiver,
        target: url.clone(),
        timeout: sources.local_timeout(),
    });

    let remote = Candidate {
        tag: SOURCE_REMOTE,
        schema: SourceSchema::RemoteAggregator,
        target: remote_url(&sources.remote_base, query),
        timeout: sources.remote_timeout(),
    };

    match priority {
        SourcePriority::LocalOnly => local.collect(),
        SourcePriority::RemoteOnly => vec![remote],
        SourcePriority::LocalThenRemote => {
            let mut candidates: Vec<Candidate> = local.collect();
            if sources.remote_enabled {
                candidates.push(remote);
            }
            candidates
        }
    }
}

/// What happened to one candidate (debug output)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    pub source: String,
    pub target: String,
    /// `ok` or the failure taxonomy name
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Successful selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub candidate: Candidate,
    pub states: Vec<StateVector>,
    /// Entries in the upstream aircraft list before normalization
    pub raw_count: usize,
    /// First raw list entry, for debug output
    pub sample_raw: Option<Value>,
    /// Every attempted candidate in order, including the winner
    pub reports: Vec<CandidateReport>,
}

struct Attempt {
    states: Vec<StateVector>,
    raw_count: usize,
    sample_raw: Option<Value>,
}

/// Orchestrates fetch → parse → normalize across the candidate plan
pub struct SourceSelector<'a, F: SourceFetcher + ?Sized> {
    fetcher: &'a F,
    sources: &'a SourcesConfig,
}

impl<'a, F: SourceFetcher + ?Sized> SourceSelector<'a, F> {
    pub fn new(fetcher: &'a F, sources: &'a SourcesConfig) -> Self {
        Self { fetcher, sources }
    }

    /// Try each candidate in order until one yields aircraft
    pub async fn select(&self, query: &FeedQuery) -> FeedResult<Selection> {
        let candidates = plan(self.sources, query);
        let mut diagnostics = Vec::with_capacity(candidates.len());
        let mut reports = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match self.attempt(&candidate).await {
                Ok(attempt) => {
                    info!(
                        source = candidate.tag,
                        target = %candidate.target,
                        raw = attempt.raw_count,
                        states = attempt.states.len(),
                        "Selected upstream source"
                    );
                    reports.push(CandidateReport {
                        source: candidate.tag.to_string(),
                        target: candidate.target.clone(),
                        outcome: "ok".to_string(),
                        raw_count: Some(attempt.raw_count),
                        normalized_count: Some(attempt.states.len()),
                        detail: None,
                    });
                    return Ok(Selection {
                        candidate,
                        states: attempt.states,
                        raw_count: attempt.raw_count,
                        sample_raw: attempt.sample_raw,
                        reports,
                    });
                }
                Err((error, raw_count)) => {
                    warn!(
                        source = candidate.tag,
                        target = %candidate.target,
                        error = %error,
                        "Upstream candidate failed, trying next"
                    );
                    reports.push(CandidateReport {
                        source: candidate.tag.to_string(),
                        target: candidate.target.clone(),
                        outcome: error.kind().to_string(),
                        raw_count,
                        normalized_count: raw_count.map(|_| 0),
                        detail: Some(error.to_string()),
                    });
                    diagnostics.push(CandidateDiagnostic::new(
                        candidate.tag,
                        &candidate.target,
                        &error,
                    ));
                }
            }
        }

        warn!(attempted = diagnostics.len(), "All upstream sources exhausted");
        Err(FeedError::AllSourcesExhausted(diagnostics))
    }

    /// One candidate; on failure also returns the raw count when parsing got that far
    async fn attempt(&self, candidate: &Candidate) -> Result<Attempt, (SourceError, Option<usize>)> {
        let payload = self
            .fetcher
            .fetch(&candidate.target, candidate.timeout)
            .await
            .into_json()
            .map_err(|e| (e, None))?;
        let retrieved_at = unix_now();

        let records = candidate.schema.extract(payload).map_err(|e| (e, None))?;
        let raw_count = records.len();
        if records.is_empty() {
            return Err((
                SourceError::NoPositionData("aircraft list is empty".to_string()),
                Some(0),
            ));
        }

        let states = normalize(candidate.schema, &records, retrieved_at);
        debug!(
            source = candidate.tag,
            raw = raw_count,
            states = states.len(),
            "Normalized upstream payload"
        );
        if states.is_empty() {
            return Err((
                SourceError::NoPositionData(format!(
                    "none of {} aircraft reported a position",
                    raw_count
                )),
                Some(raw_count),
            ));
        }

        Ok(Attempt {
            states,
            raw_count,
            sample_raw: records.into_iter().next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchOutcome;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned responses keyed by URL; records every call in order
    struct CannedFetcher {
        responses: HashMap<String, FetchOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedFetcher {
        fn new(responses: Vec<(&str, FetchOutcome)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceFetcher for CannedFetcher {
        async fn fetch(&self, target: &str, _timeout: Duration) -> FetchOutcome {
            self.calls.lock().unwrap().push(target.to_string());
            self.responses
                .get(target)
                .cloned()
                .unwrap_or_else(|| FetchOutcome::Unreachable("connection refused".to_string()))
        }
    }

    const LOCAL: &str = "http://local/data/aircraft.json";
    const REMOTE_BASE: &str = "https://remote/v2/point";

    fn sources(priority: SourcePriority) -> SourcesConfig {
        SourcesConfig {
            priority,
            local_urls: vec![LOCAL.to_string()],
            remote_base: REMOTE_BASE.to_string(),
            ..SourcesConfig::default()
        }
    }

    fn query() -> FeedQuery {
        FeedQuery::new(42.8808, -85.5228, 80, false).unwrap()
    }

    fn remote_target() -> String {
        remote_url(REMOTE_BASE, &query())
    }

    #[test]
    fn test_radius_clamped() {
        assert_eq!(clamp_radius(0), 1);
        assert_eq!(clamp_radius(-40), 1);
        assert_eq!(clamp_radius(80), 80);
        assert_eq!(clamp_radius(250), 250);
        assert_eq!(clamp_radius(900), 250);
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        assert!(matches!(
            FeedQuery::new(91.0, 0.0, 10, false),
            Err(FeedError::InvalidParameter(_))
        ));
        assert!(matches!(
            FeedQuery::new(0.0, -180.5, 10, false),
            Err(FeedError::InvalidParameter(_))
        ));
        assert!(FeedQuery::new(f64::NAN, 0.0, 10, false).is_err());
        assert_eq!(FeedQuery::new(-90.0, 180.0, 300, false).unwrap().radius_nm, 250);
    }

    #[test]
    fn test_remote_url_format() {
        assert_eq!(
            remote_url("https://api.adsb.lol/v2/point/", &query()),
            "https://api.adsb.lol/v2/point/42.8808/-85.5228/80"
        );
    }

    #[test]
    fn test_plan_orders() {
        let both = plan(&sources(SourcePriority::LocalThenRemote), &query());
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].tag, SOURCE_LOCAL);
        assert_eq!(both[1].tag, SOURCE_REMOTE);

        let remote_only = plan(&sources(SourcePriority::RemoteOnly), &query());
        assert_eq!(remote_only.len(), 1);
        assert_eq!(remote_only[0].schema, SourceSchema::RemoteAggregator);

        let local_only = plan(&sources(SourcePriority::LocalOnly), &query());
        assert_eq!(local_only.len(), 1);
        assert_eq!(local_only[0].schema, SourceSchema::LocalReceiver);

        let overridden = FeedQuery { remote_only: true, ..query() };
        assert_eq!(plan(&sources(SourcePriority::LocalThenRemote), &overridden).len(), 1);

        let mut disabled = sources(SourcePriority::LocalThenRemote);
        disabled.remote_enabled = false;
        assert_eq!(plan(&disabled, &query()).len(), 1);
    }

    #[tokio::test]
    async fn test_local_success_skips_remote() {
        let fetcher = CannedFetcher::new(vec![(
            LOCAL,
            FetchOutcome::Success(json!({"aircraft": [{"hex": "a1", "lat": 1.0, "lon": 2.0}]})),
        )]);
        let cfg = sources(SourcePriority::LocalThenRemote);

        let selection = SourceSelector::new(&fetcher, &cfg).select(&query()).await.unwrap();
        assert_eq!(selection.candidate.tag, SOURCE_LOCAL);
        assert_eq!(selection.states.len(), 1);
        assert_eq!(fetcher.calls(), vec![LOCAL.to_string()]);
    }

    #[tokio::test]
    async fn test_empty_local_falls_back_to_remote() {
        let remote = remote_target();
        let fetcher = CannedFetcher::new(vec![
            (LOCAL, FetchOutcome::Success(json!({"aircraft": []}))),
            (
                remote.as_str(),
                FetchOutcome::Success(json!({"ac": [{"hex": "b2", "lat": 3.0, "lon": 4.0}]})),
            ),
        ]);
        let cfg = sources(SourcePriority::LocalThenRemote);

        let selection = SourceSelector::new(&fetcher, &cfg).select(&query()).await.unwrap();
        assert_eq!(selection.candidate.tag, SOURCE_REMOTE);
        assert_eq!(selection.states[0].id, "b2");
        assert_eq!(selection.reports.len(), 2);
        assert_eq!(selection.reports[0].outcome, "NoPositionData");
        assert_eq!(selection.reports[1].outcome, "ok");
        assert_eq!(fetcher.calls(), vec![LOCAL.to_string(), remote]);
    }

    #[tokio::test]
    async fn test_positionless_local_falls_back() {
        let remote = remote_target();
        let fetcher = CannedFetcher::new(vec![
            (LOCAL, FetchOutcome::Success(json!({"aircraft": [{"hex": "a1"}]}))),
            (
                remote.as_str(),
                FetchOutcome::Success(json!({"ac": [{"hex": "b2", "lat": 3.0, "lon": 4.0}]})),
            ),
        ]);
        let cfg = sources(SourcePriority::LocalThenRemote);

        let selection = SourceSelector::new(&fetcher, &cfg).select(&query()).await.unwrap();
        assert_eq!(selection.candidate.tag, SOURCE_REMOTE);
        assert_eq!(selection.reports[0].raw_count, Some(1));
        assert_eq!(selection.reports[0].normalized_count, Some(0));
    }

    #[tokio::test]
    async fn test_all_exhausted_keeps_ordered_diagnostics() {
        let remote = remote_target();
        let fetcher = CannedFetcher::new(vec![
            (LOCAL, FetchOutcome::Malformed("invalid JSON".into())),
            (remote.as_str(), FetchOutcome::Success(json!({"msg": "No error", "now": 1}))),
        ]);
        let cfg = sources(SourcePriority::LocalThenRemote);

        let err = SourceSelector::new(&fetcher, &cfg).select(&query()).await.unwrap_err();
        match err {
            FeedError::AllSourcesExhausted(diags) => {
                assert_eq!(diags.len(), 2);
                assert_eq!(diags[0].kind, "UpstreamMalformed");
                assert_eq!(diags[0].target, LOCAL);
                assert_eq!(diags[1].kind, "UnrecognizedSchema");
                assert_eq!(
                    diags[1].keys_seen,
                    Some(vec!["msg".to_string(), "now".to_string()])
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_only_never_touches_local() {
        let remote = remote_target();
        let fetcher = CannedFetcher::new(vec![(
            remote.as_str(),
            FetchOutcome::Success(json!({"ac": [{"hex": "b2", "lat": 3.0, "lon": 4.0}]})),
        )]);
        let cfg = sources(SourcePriority::RemoteOnly);

        SourceSelector::new(&fetcher, &cfg).select(&query()).await.unwrap();
        assert_eq!(fetcher.calls(), vec![remote]);
    }

    #[tokio::test]
    async fn test_local_mirrors_tried_in_order() {
        let mirror = "http://local/skyaware/data/aircraft.json";
        let fetcher = CannedFetcher::new(vec![(
            mirror,
            FetchOutcome::Success(json!({"aircraft": [{"hex": "c3", "lat": 1.0, "lon": 1.0}]})),
        )]);
        let mut cfg = sources(SourcePriority::LocalOnly);
        cfg.local_urls.push(mirror.to_string());

        let selection = SourceSelector::new(&fetcher, &cfg).select(&query()).await.unwrap();
        assert_eq!(selection.candidate.target, mirror);
        assert_eq!(selection.reports[0].outcome, "UpstreamUnreachable");
    }

    #[tokio::test]
    async fn test_empty_plan_exhausts_immediately() {
        let fetcher = CannedFetcher::new(vec![]);
        let mut cfg = sources(SourcePriority::LocalOnly);
        cfg.local_urls.clear();

        let err = SourceSelector::new(&fetcher, &cfg).select(&query()).await.unwrap_err();
        assert!(matches!(err, FeedError::AllSourcesExhausted(ref d) if d.is_empty()));
        assert!(fetcher.calls().is_empty());
    }
}
