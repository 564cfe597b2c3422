use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ItemType, Lock, LockStatus, LockUpdate};

/// Durable keyed storage for lock records.
///
/// Status transitions go through `update`, which is conditioned on the
/// record's current status so that concurrent writers cannot revive a
/// terminal lock.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Persist a new lock. Rejects a second active lock for the same
    /// (itinerary_token, item_type, item_id) tuple.
    async fn insert(&self, lock: &Lock) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Lock>, StoreError>;

    /// All active locks held by one (itinerary, inquiry) session
    async fn active_for_inquiry(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
    ) -> Result<Vec<Lock>, StoreError>;

    /// The unique active lock for one item, if any
    async fn find_active_item(
        &self,
        itinerary_token: &str,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<Option<Lock>, StoreError>;

    /// Active locks whose deadline has already passed
    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<Lock>, StoreError>;

    /// Conditional update: applies `changes` only while the record's status
    /// still equals `expected`. Returns the updated lock, or None when the
    /// precondition no longer holds.
    async fn update(
        &self,
        id: Uuid,
        expected: LockStatus,
        changes: LockUpdate,
    ) -> Result<Option<Lock>, StoreError>;

    /// Drop terminal records last touched before `cutoff`; returns how many
    /// were removed
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("An active lock already exists for {item_type} {item_id}")]
    DuplicateActive { item_type: ItemType, item_id: String },

    #[error("Lock store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}
