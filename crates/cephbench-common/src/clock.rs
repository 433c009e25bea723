//! Epoch timestamp helpers.
//!
//! All persisted timing records use whole-second or millisecond Unix epochs
//! for comparability with historical benchmark data.

use chrono::Utc;

/// Current Unix time in whole seconds.
pub fn epoch_secs() -> i64 {
    Utc::now().timestamp()
}

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}
