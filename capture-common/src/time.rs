//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC timestamp as RFC 3339 text, the format stored in report tables
pub fn now_rfc3339() -> String {
    now().to_rfc3339()
}
