//! Lookup metrics
//!
//! Emitted through the `metrics` facade; the embedding application decides
//! whether and how to export them.

use dirlookup_core::types::UserProfile;
use dirlookup_core::Result;
use metrics::{counter, histogram};
use std::time::Duration;

/// Metric names
pub mod names {
    pub const LOOKUPS_TOTAL: &str = "dirlookup_lookups_total";
    pub const LOOKUP_DURATION_SECONDS: &str = "dirlookup_lookup_duration_seconds";
    pub const SEARCHES_TOTAL: &str = "dirlookup_searches_total";
    pub const GROUP_CLOSURE_SIZE: &str = "dirlookup_group_closure_size";
}

/// Kind of directory search issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    User,
    Group,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::User => "user",
            SearchKind::Group => "group",
        }
    }
}

pub fn record_search(kind: SearchKind, success: bool) {
    counter!(
        names::SEARCHES_TOTAL,
        "kind" => kind.as_str(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

pub fn record_lookup(outcome: &Result<UserProfile>, elapsed: Duration) {
    let outcome_label = match outcome {
        Ok(_) => "success",
        Err(e) => e.code(),
    };

    counter!(names::LOOKUPS_TOTAL, "outcome" => outcome_label).increment(1);
    histogram!(names::LOOKUP_DURATION_SECONDS).record(elapsed.as_secs_f64());

    if let Ok(profile) = outcome {
        histogram!(names::GROUP_CLOSURE_SIZE).record(profile.group_names.len() as f64);
    }
}
