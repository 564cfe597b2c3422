use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use triplock_core::models::{ItemType, Lock};

/// Outcome of a batch lock creation; partial success is a normal outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedLockBatch {
    pub locks: Vec<Lock>,
    pub errors: Option<Vec<LockItemError>>,
    /// Earliest deadline across the created locks; the batch as a whole
    /// should be treated as expiring at this instant
    pub expires_at: Option<DateTime<Utc>>,
}

/// Why one item in a batch could not be locked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockFailureReason {
    AlreadyLocked,
    SupplierHoldFailed,
    PersistFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockItemError {
    pub item_type: ItemType,
    pub item_id: String,
    pub reason: LockFailureReason,
    pub message: String,
}

/// Outcome of a status check over one (itinerary, inquiry) session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStatusSummary {
    pub all_locks_valid: bool,
    pub expired_items: Option<Vec<ExpiredItemReport>>,
    /// How many active locks the check started from
    pub locks_count: usize,
    /// Earliest deadline across locks still standing after the check
    pub expires_at: Option<DateTime<Utc>>,
}

/// Display-oriented report of one lock found expired during a status check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredItemReport {
    pub item_type: ItemType,
    pub item_id: String,
    pub city_name: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendOutcome {
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearOutcome {
    pub cleared: usize,
}
