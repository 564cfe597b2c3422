use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use triplock_core::models::{ItemType, Lock, LockStatus, LockUpdate};
use triplock_core::store::{LockStore, StoreError};

/// In-memory lock store for tests and single-process embedding
pub struct MemoryLockStore {
    locks: RwLock<HashMap<Uuid, Lock>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn insert(&self, lock: &Lock) -> Result<(), StoreError> {
        let mut locks = self.locks.write().await;
        let duplicate = locks.values().any(|existing| {
            existing.status == LockStatus::Active
                && existing.itinerary_token == lock.itinerary_token
                && existing.item_type == lock.item_type
                && existing.item_id == lock.item_id
        });
        if duplicate {
            return Err(StoreError::DuplicateActive {
                item_type: lock.item_type,
                item_id: lock.item_id.clone(),
            });
        }
        locks.insert(lock.id, lock.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Lock>, StoreError> {
        Ok(self.locks.read().await.get(&id).cloned())
    }

    async fn active_for_inquiry(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
    ) -> Result<Vec<Lock>, StoreError> {
        let locks = self.locks.read().await;
        let mut found: Vec<Lock> = locks
            .values()
            .filter(|l| {
                l.status == LockStatus::Active
                    && l.itinerary_token == itinerary_token
                    && l.inquiry_token == inquiry_token
            })
            .cloned()
            .collect();
        found.sort_by_key(|l| l.created_at);
        Ok(found)
    }

    async fn find_active_item(
        &self,
        itinerary_token: &str,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<Option<Lock>, StoreError> {
        let locks = self.locks.read().await;
        Ok(locks
            .values()
            .find(|l| {
                l.status == LockStatus::Active
                    && l.itinerary_token == itinerary_token
                    && l.item_type == item_type
                    && l.item_id == item_id
            })
            .cloned())
    }

    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<Lock>, StoreError> {
        let locks = self.locks.read().await;
        let mut found: Vec<Lock> = locks
            .values()
            .filter(|l| l.status == LockStatus::Active && l.expires_at < now)
            .cloned()
            .collect();
        found.sort_by_key(|l| l.expires_at);
        Ok(found)
    }

    async fn update(
        &self,
        id: Uuid,
        expected: LockStatus,
        changes: LockUpdate,
    ) -> Result<Option<Lock>, StoreError> {
        let mut locks = self.locks.write().await;
        let Some(lock) = locks.get_mut(&id) else {
            return Ok(None);
        };
        if lock.status != expected {
            return Ok(None);
        }
        if let Some(status) = changes.status {
            lock.status = status;
        }
        if let Some(expires_at) = changes.expires_at {
            lock.expires_at = expires_at;
        }
        lock.updated_at = changes.updated_at;
        Ok(Some(lock.clone()))
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|_, l| !(l.status.is_terminal() && l.updated_at < cutoff));
        Ok((before - locks.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use triplock_core::models::LockRequestItem;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample_lock(itinerary: &str, inquiry: &str, item_type: ItemType, item_id: &str) -> Lock {
        let now = base_time();
        Lock::new(
            itinerary.to_string(),
            inquiry.to_string(),
            LockRequestItem {
                item_type,
                item_id: item_id.to_string(),
                reference_id: format!("ref-{item_id}"),
            },
            format!("SUP-{item_id}"),
            now + Duration::minutes(15),
            now,
        )
    }

    #[tokio::test]
    async fn insert_rejects_a_second_active_lock_for_the_same_item() {
        let store = MemoryLockStore::new();
        let first = sample_lock("itin-1", "inq-1", ItemType::Flight, "UA100");
        store.insert(&first).await.unwrap();

        // Same item from another session is still a conflict
        let second = sample_lock("itin-1", "inq-2", ItemType::Flight, "UA100");
        let result = store.insert(&second).await;
        assert!(matches!(result, Err(StoreError::DuplicateActive { .. })));

        // A released lock no longer blocks the item
        store
            .update(
                first.id,
                LockStatus::Active,
                LockUpdate::transition_to(LockStatus::Released, base_time()),
            )
            .await
            .unwrap();
        store.insert(&second).await.unwrap();
    }

    #[tokio::test]
    async fn update_applies_only_while_the_expected_status_holds() {
        let store = MemoryLockStore::new();
        let lock = sample_lock("itin-1", "inq-1", ItemType::Hotel, "GRAND-01");
        store.insert(&lock).await.unwrap();

        let later = base_time() + Duration::minutes(1);
        let updated = store
            .update(
                lock.id,
                LockStatus::Active,
                LockUpdate::transition_to(LockStatus::Expired, later),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, LockStatus::Expired);
        assert_eq!(updated.updated_at, later);

        // The record is terminal now; a conditioned write is a no-op
        let second = store
            .update(
                lock.id,
                LockStatus::Active,
                LockUpdate::transition_to(LockStatus::Released, later),
            )
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(
            store.get(lock.id).await.unwrap().unwrap().status,
            LockStatus::Expired
        );
    }

    #[tokio::test]
    async fn expired_active_returns_only_overdue_active_locks() {
        let store = MemoryLockStore::new();
        let mut overdue = sample_lock("itin-1", "inq-1", ItemType::Flight, "UA100");
        overdue.expires_at = base_time() + Duration::minutes(5);
        let healthy = sample_lock("itin-1", "inq-1", ItemType::Hotel, "GRAND-01");
        store.insert(&overdue).await.unwrap();
        store.insert(&healthy).await.unwrap();

        let now = base_time() + Duration::minutes(10);
        let due = store.expired_active(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, overdue.id);

        // Terminal locks never show up in the sweep query
        store
            .update(
                overdue.id,
                LockStatus::Active,
                LockUpdate::transition_to(LockStatus::Expired, now),
            )
            .await
            .unwrap();
        assert!(store.expired_active(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_drops_only_aged_terminal_records() {
        let store = MemoryLockStore::new();
        let old_terminal = sample_lock("itin-1", "inq-1", ItemType::Flight, "UA100");
        let fresh_terminal = sample_lock("itin-1", "inq-1", ItemType::Flight, "UA200");
        let active = sample_lock("itin-1", "inq-1", ItemType::Hotel, "GRAND-01");
        store.insert(&old_terminal).await.unwrap();
        store.insert(&fresh_terminal).await.unwrap();
        store.insert(&active).await.unwrap();

        store
            .update(
                old_terminal.id,
                LockStatus::Active,
                LockUpdate::transition_to(LockStatus::Released, base_time()),
            )
            .await
            .unwrap();
        store
            .update(
                fresh_terminal.id,
                LockStatus::Active,
                LockUpdate::transition_to(LockStatus::Released, base_time() + Duration::hours(30)),
            )
            .await
            .unwrap();

        let cutoff = base_time() + Duration::hours(24);
        let purged = store.purge_terminal_before(cutoff).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(old_terminal.id).await.unwrap().is_none());
        assert!(store.get(fresh_terminal.id).await.unwrap().is_some());
        assert!(store.get(active.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lookups_scope_to_session_and_item() {
        let store = MemoryLockStore::new();
        let first = sample_lock("itin-1", "inq-1", ItemType::Flight, "UA100");
        let second = sample_lock("itin-1", "inq-1", ItemType::Hotel, "GRAND-01");
        let other_inquiry = sample_lock("itin-1", "inq-2", ItemType::Flight, "UA200");
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();
        store.insert(&other_inquiry).await.unwrap();

        let session = store.active_for_inquiry("itin-1", "inq-1").await.unwrap();
        assert_eq!(session.len(), 2);

        let found = store
            .find_active_item("itin-1", ItemType::Flight, "UA100")
            .await
            .unwrap();
        assert_eq!(found.map(|l| l.id), Some(first.id));

        let missing = store
            .find_active_item("itin-9", ItemType::Flight, "UA100")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
