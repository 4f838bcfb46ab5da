//! Timestamp utilities

use chrono::Utc;

/// Current instant as integer unix seconds (snapshot `time` field)
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
