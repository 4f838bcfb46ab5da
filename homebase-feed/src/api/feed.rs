//! Aircraft feed endpoint
//!
//! GET /api/feed?lat=&lon=&radius=&debug=&use_remote=
//!
//! Omitted `lat`/`lon`/`radius` fall back to the configured location.
//! Only `lat`/`lon` can be rejected; any `radius` text is coerced to an
//! integer and clamped.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::response::{build_success, FeedResponse};
use crate::selector::{FeedQuery, SourceSelector};
use crate::AppState;

/// Raw query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Nautical miles, coerced by [`parse_radius`]
    pub radius: Option<String>,
    pub debug: Option<String>,
    pub use_remote: Option<String>,
}

/// Flag semantics: present and not `0`/`false`
pub fn flag_set(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) => {
            let v = v.trim();
            !(v == "0" || v.eq_ignore_ascii_case("false"))
        }
    }
}

/// Integer-cast semantics for the radius parameter
///
/// Fractions truncate toward zero and out-of-range values saturate. Text
/// without a leading number is 0 (clamped to 1 downstream).
pub fn parse_radius(text: &str) -> i64 {
    let text = text.trim();
    if let Ok(value) = text.parse::<f64>() {
        // `as` saturates and maps NaN to 0
        return value.trunc() as i64;
    }

    let digits_end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    text[..digits_end].parse::<f64>().map_or(0, |v| v as i64)
}

/// GET /api/feed
pub async fn get_feed(
    State(state): State<AppState>,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> FeedResult<Json<FeedResponse>> {
    let Query(params) = params.map_err(|e| FeedError::InvalidParameter(e.body_text()))?;

    let location = &state.config.location;
    let query = FeedQuery::new(
        params.lat.unwrap_or(location.lat),
        params.lon.unwrap_or(location.lon),
        params
            .radius
            .as_deref()
            .map_or(location.radius_nm, parse_radius),
        flag_set(params.use_remote.as_deref()),
    )?;
    let debug = flag_set(params.debug.as_deref());

    debug!(
        lat = query.lat,
        lon = query.lon,
        radius_nm = query.radius_nm,
        remote_only = query.remote_only,
        "Feed request"
    );

    let selection = SourceSelector::new(state.fetcher.as_ref(), &state.config.sources)
        .select(&query)
        .await?;

    Ok(Json(build_success(selection, debug)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_coercion() {
        assert_eq!(parse_radius("80"), 80);
        assert_eq!(parse_radius(" 80.5 "), 80);
        assert_eq!(parse_radius("-3.9"), -3);
        assert_eq!(parse_radius("99999999999999999999"), i64::MAX);
        assert_eq!(parse_radius("-99999999999999999999"), i64::MIN);
        assert_eq!(parse_radius("120nm"), 120);
        assert_eq!(parse_radius("abc"), 0);
        assert_eq!(parse_radius(""), 0);
        assert_eq!(parse_radius("NaN"), 0);
    }

    #[test]
    fn test_flag_semantics() {
        assert!(!flag_set(None));
        assert!(flag_set(Some("")));
        assert!(flag_set(Some("1")));
        assert!(flag_set(Some("true")));
        assert!(flag_set(Some("yes")));
        assert!(!flag_set(Some("0")));
        assert!(!flag_set(Some("false")));
        assert!(!flag_set(Some("FALSE")));
    }
}
