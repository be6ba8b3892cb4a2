//! Flows shared by several handlers: the scan endpoint and the explicit
//! clock/visit endpoints go through the same code.

pub mod activity;
pub mod attendance;
pub mod checklist;
pub mod geo;
pub mod qr_lookup;

use chrono::{NaiveDateTime, Utc};

/// Timestamps are stored as UTC `DATETIME`.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
