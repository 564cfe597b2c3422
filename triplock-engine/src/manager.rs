use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use triplock_core::clock::Clock;
use triplock_core::itinerary::{ItineraryDocument, ItineraryReader};
use triplock_core::models::{ItemType, Lock, LockRequestItem, LockStatus, LockUpdate};
use triplock_core::store::{LockStore, StoreError};
use triplock_core::supplier::SupplierRegistry;

use crate::error::LockError;
use crate::results::{
    ClearOutcome, CreatedLockBatch, ExpiredItemReport, ExtendOutcome, LockFailureReason,
    LockItemError, LockStatusSummary, ReleaseOutcome,
};

/// Coordinates supplier holds, lock records and deadlines for one deployment.
/// All status transitions go through here or the sweeper, via conditional
/// store updates, so a terminal lock can never come back.
pub struct LockManager {
    store: Arc<dyn LockStore>,
    suppliers: SupplierRegistry,
    itineraries: Arc<dyn ItineraryReader>,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    pub fn new(
        store: Arc<dyn LockStore>,
        suppliers: SupplierRegistry,
        itineraries: Arc<dyn ItineraryReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            suppliers,
            itineraries,
            clock,
        }
    }

    /// Create one lock per requested item. Items succeed or fail
    /// independently; per-item failures never abort the batch.
    pub async fn create_locks(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
        items: Vec<LockRequestItem>,
    ) -> Result<CreatedLockBatch, LockError> {
        // One itinerary fetch serves the whole batch; losing it only costs
        // display enrichment
        let itinerary = match self
            .itineraries
            .get_itinerary(itinerary_token, inquiry_token)
            .await
        {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!(itinerary = itinerary_token, "Itinerary enrichment unavailable: {}", e);
                None
            }
        };

        let mut locks = Vec::new();
        let mut errors = Vec::new();

        for item in items {
            match self
                .lock_one_item(itinerary_token, inquiry_token, &item, itinerary.as_ref())
                .await?
            {
                Ok(lock) => locks.push(lock),
                Err(item_error) => errors.push(item_error),
            }
        }

        let expires_at = locks.iter().map(|l| l.expires_at).min();

        info!(
            itinerary = itinerary_token,
            created = locks.len(),
            failed = errors.len(),
            "Lock batch processed"
        );

        Ok(CreatedLockBatch {
            locks,
            errors: if errors.is_empty() { None } else { Some(errors) },
            expires_at,
        })
    }

    /// Lock one item end to end. The outer error is a store-infrastructure
    /// failure that aborts the whole batch; the inner result is this item's
    /// outcome.
    async fn lock_one_item(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
        item: &LockRequestItem,
        itinerary: Option<&ItineraryDocument>,
    ) -> Result<Result<Lock, LockItemError>, StoreError> {
        // 1. Refuse a second active lock for the same item before spending a
        //    supplier call on it
        if self
            .store
            .find_active_item(itinerary_token, item.item_type, &item.item_id)
            .await?
            .is_some()
        {
            return Ok(Err(item_error(
                item,
                LockFailureReason::AlreadyLocked,
                "an active lock already exists for this item; release it first".to_string(),
            )));
        }

        // 2. Ask the matching supplier for a hold
        let supplier = self.suppliers.client_for(item.item_type);
        let hold = match supplier.create_hold(&item.reference_id).await {
            Ok(hold) => hold,
            Err(e) => {
                warn!(item = %item.item_id, "Supplier refused hold: {}", e);
                return Ok(Err(item_error(
                    item,
                    LockFailureReason::SupplierHoldFailed,
                    e.to_string(),
                )));
            }
        };

        // 3. Build the record, enriched from the itinerary when available
        let now = self.clock.now();
        let mut lock = Lock::new(
            itinerary_token.to_string(),
            inquiry_token.to_string(),
            item.clone(),
            hold.reference.clone(),
            hold.expires_at,
            now,
        );
        if let Some(doc) = itinerary {
            if let Some(found) = doc.find_item(item.item_type, &item.item_id) {
                lock.city_name = Some(found.city_name.to_string());
                lock.date = Some(found.date);
                lock.metadata = found.item.metadata.clone();
            }
        }

        // 4. Persist; a failed persist must not leak the supplier hold
        match self.store.insert(&lock).await {
            Ok(()) => Ok(Ok(lock)),
            Err(StoreError::DuplicateActive { .. }) => {
                self.release_hold_quietly(item.item_type, &hold.reference)
                    .await;
                Ok(Err(item_error(
                    item,
                    LockFailureReason::AlreadyLocked,
                    "an active lock already exists for this item".to_string(),
                )))
            }
            Err(e) => {
                self.release_hold_quietly(item.item_type, &hold.reference)
                    .await;
                Ok(Err(item_error(
                    item,
                    LockFailureReason::PersistFailed,
                    e.to_string(),
                )))
            }
        }
    }

    /// Re-evaluate every active lock in the session against the clock and
    /// supplier truth, flipping invalid ones to expired
    pub async fn check_status(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
    ) -> Result<LockStatusSummary, LockError> {
        let active = self
            .store
            .active_for_inquiry(itinerary_token, inquiry_token)
            .await?;
        let locks_count = active.len();
        let now = self.clock.now();

        let mut all_locks_valid = true;
        let mut expired_items = Vec::new();
        let mut next_expiry: Option<DateTime<Utc>> = None;

        for lock in active {
            if lock.has_expired(now) {
                // The clock already decided; no supplier round-trip needed
                self.mark_expired(&lock, now).await?;
                all_locks_valid = false;
                expired_items.push(report_for(&lock));
                continue;
            }

            let supplier = self.suppliers.client_for(lock.item_type);
            match supplier.verify_hold(&lock.supplier_reference).await {
                Ok(true) => {
                    next_expiry = min_expiry(next_expiry, lock.expires_at);
                }
                Ok(false) => {
                    self.mark_expired(&lock, now).await?;
                    all_locks_valid = false;
                    expired_items.push(report_for(&lock));
                }
                Err(e) => {
                    // A transient supplier error is not evidence of expiry;
                    // the lock stays active but the batch cannot be called
                    // verified
                    warn!(item = %lock.item_id, "Hold verification failed: {}", e);
                    all_locks_valid = false;
                    next_expiry = min_expiry(next_expiry, lock.expires_at);
                }
            }
        }

        Ok(LockStatusSummary {
            all_locks_valid,
            expired_items: if expired_items.is_empty() {
                None
            } else {
                Some(expired_items)
            },
            locks_count,
            expires_at: next_expiry,
        })
    }

    /// Release the unique active lock for one item. The local record always
    /// converges to released; a supplier failure is still reported so the
    /// caller knows upstream reconciliation may lag.
    pub async fn release_lock(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<ReleaseOutcome, LockError> {
        let lock = self
            .find_session_lock(itinerary_token, inquiry_token, item_type, item_id)
            .await?;

        let release_result = self
            .suppliers
            .client_for(item_type)
            .release_hold(&lock.supplier_reference)
            .await;
        if let Err(ref e) = release_result {
            warn!(item = item_id, "Supplier release failed: {}", e);
        }

        let update = LockUpdate::transition_to(LockStatus::Released, self.clock.now());
        self.store.update(lock.id, LockStatus::Active, update).await?;

        match release_result {
            Ok(()) => {
                info!(item = item_id, "Lock released");
                Ok(ReleaseOutcome {
                    message: format!("Lock released for {} {}", item_type, item_id),
                })
            }
            Err(e) => Err(LockError::ReleaseFailed(e.to_string())),
        }
    }

    /// Push a lock's deadline out by `additional`. All-or-nothing: the local
    /// deadline only moves once the supplier has confirmed.
    pub async fn extend_lock(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
        item_type: ItemType,
        item_id: &str,
        additional: Duration,
    ) -> Result<ExtendOutcome, LockError> {
        if additional <= Duration::zero() {
            return Err(LockError::Validation(
                "extension must be a positive duration".to_string(),
            ));
        }

        let lock = self
            .find_session_lock(itinerary_token, inquiry_token, item_type, item_id)
            .await?;

        let now = self.clock.now();
        if lock.has_expired(now) {
            // Only a status check or the sweeper flips it; extension just
            // refuses
            return Err(LockError::LockExpired {
                item_type,
                item_id: item_id.to_string(),
            });
        }

        self.suppliers
            .client_for(item_type)
            .extend_hold(&lock.supplier_reference, additional)
            .await
            .map_err(|e| LockError::ExtendFailed(e.to_string()))?;

        let new_expiry = lock.expires_at + additional;
        let update = LockUpdate::extend_to(new_expiry, now);
        match self.store.update(lock.id, LockStatus::Active, update).await? {
            Some(updated) => {
                info!(item = item_id, expires_at = %updated.expires_at, "Lock extended");
                Ok(ExtendOutcome {
                    expires_at: updated.expires_at,
                })
            }
            None => {
                // A concurrent transition won after the supplier confirmed;
                // the hold upstream now outlives the local record
                warn!(item = item_id, "Lock left active state during extension");
                Err(LockError::LockNotFound {
                    item_type,
                    item_id: item_id.to_string(),
                })
            }
        }
    }

    /// Release every active lock in the session, best-effort. Per-lock
    /// failures are logged and never stop the loop.
    pub async fn clear_all_locks(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
    ) -> Result<ClearOutcome, LockError> {
        let active = self
            .store
            .active_for_inquiry(itinerary_token, inquiry_token)
            .await?;
        let mut cleared = 0usize;

        for lock in active {
            self.release_hold_quietly(lock.item_type, &lock.supplier_reference)
                .await;

            let update = LockUpdate::transition_to(LockStatus::Released, self.clock.now());
            match self.store.update(lock.id, LockStatus::Active, update).await {
                Ok(Some(_)) => cleared += 1,
                Ok(None) => {
                    debug!(lock_id = %lock.id, "Lock already left active state during clear");
                }
                Err(e) => {
                    warn!(lock_id = %lock.id, "Failed to persist release during clear: {}", e);
                }
            }
        }

        info!(itinerary = itinerary_token, cleared, "Cleared session locks");
        Ok(ClearOutcome { cleared })
    }

    /// The unique active lock for this session's item
    async fn find_session_lock(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<Lock, LockError> {
        let found = self
            .store
            .find_active_item(itinerary_token, item_type, item_id)
            .await?;
        match found {
            Some(lock) if lock.inquiry_token == inquiry_token => Ok(lock),
            _ => Err(LockError::LockNotFound {
                item_type,
                item_id: item_id.to_string(),
            }),
        }
    }

    /// Flip one lock to expired; losing the race to another writer is fine
    async fn mark_expired(&self, lock: &Lock, now: DateTime<Utc>) -> Result<(), StoreError> {
        let update = LockUpdate::transition_to(LockStatus::Expired, now);
        if self
            .store
            .update(lock.id, LockStatus::Active, update)
            .await?
            .is_none()
        {
            debug!(lock_id = %lock.id, "Lock already left active state");
        }
        Ok(())
    }

    /// Best-effort supplier release; failures are logged and swallowed
    async fn release_hold_quietly(&self, item_type: ItemType, supplier_reference: &str) {
        if let Err(e) = self
            .suppliers
            .client_for(item_type)
            .release_hold(supplier_reference)
            .await
        {
            warn!(reference = supplier_reference, "Supplier release failed: {}", e);
        }
    }
}

fn item_error(item: &LockRequestItem, reason: LockFailureReason, message: String) -> LockItemError {
    LockItemError {
        item_type: item.item_type,
        item_id: item.item_id.clone(),
        reason,
        message,
    }
}

fn report_for(lock: &Lock) -> ExpiredItemReport {
    ExpiredItemReport {
        item_type: lock.item_type,
        item_id: lock.item_id.clone(),
        city_name: lock.city_name.clone(),
        date: lock.date,
    }
}

fn min_expiry(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match current {
        Some(existing) if existing <= candidate => Some(existing),
        _ => Some(candidate),
    }
}
