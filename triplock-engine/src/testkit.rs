use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use triplock_core::clock::Clock;
use triplock_core::itinerary::{
    CityPlan, DayPlan, ItineraryDocument, ItineraryError, ItineraryReader, PlannedItem,
};
use triplock_core::models::ItemType;
use triplock_core::supplier::{SupplierClient, SupplierError, SupplierHold};

// ============================================================================
// Supplier double
// ============================================================================

/// Scriptable supplier: holds succeed by default, and individual references
/// can be made to fail, verify invalid, or error
pub struct MockSupplier {
    prefix: String,
    hold_ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    counter: u64,
    rejected_references: HashSet<String>,
    invalid_holds: HashSet<String>,
    erroring_verifications: HashSet<String>,
    extensions_fail: bool,
    releases_fail: bool,
    released: Vec<String>,
    extended: Vec<(String, Duration)>,
}

impl MockSupplier {
    pub fn new(prefix: &str, hold_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: prefix.to_string(),
            hold_ttl,
            clock,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Make `create_hold` fail for this reference id
    pub fn reject_holds_for(&self, reference_id: &str) {
        self.locked()
            .rejected_references
            .insert(reference_id.to_string());
    }

    /// Make `verify_hold` report this supplier reference invalid
    pub fn invalidate_hold(&self, supplier_reference: &str) {
        self.locked()
            .invalid_holds
            .insert(supplier_reference.to_string());
    }

    /// Make `verify_hold` error for this supplier reference
    pub fn fail_verification_for(&self, supplier_reference: &str) {
        self.locked()
            .erroring_verifications
            .insert(supplier_reference.to_string());
    }

    /// Make every `extend_hold` call fail
    pub fn fail_extensions(&self) {
        self.locked().extensions_fail = true;
    }

    /// Make every `release_hold` call fail
    pub fn fail_releases(&self) {
        self.locked().releases_fail = true;
    }

    /// Supplier references released so far, in call order
    pub fn released_references(&self) -> Vec<String> {
        self.locked().released.clone()
    }

    /// Extensions granted so far, in call order
    pub fn extended_holds(&self) -> Vec<(String, Duration)> {
        self.locked().extended.clone()
    }

    /// How many holds this supplier has created
    pub fn holds_created(&self) -> u64 {
        self.locked().counter
    }

    fn locked(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SupplierClient for MockSupplier {
    async fn create_hold(&self, reference_id: &str) -> Result<SupplierHold, SupplierError> {
        let mut state = self.locked();
        if state.rejected_references.contains(reference_id) {
            return Err(SupplierError::HoldRejected(reference_id.to_string()));
        }
        state.counter += 1;
        Ok(SupplierHold {
            reference: format!("{}-{:04}", self.prefix, state.counter),
            expires_at: self.clock.now() + self.hold_ttl,
        })
    }

    async fn verify_hold(&self, supplier_reference: &str) -> Result<bool, SupplierError> {
        let state = self.locked();
        if state.erroring_verifications.contains(supplier_reference) {
            return Err(SupplierError::Transient(format!(
                "verification unavailable for {supplier_reference}"
            )));
        }
        Ok(!state.invalid_holds.contains(supplier_reference))
    }

    async fn extend_hold(
        &self,
        supplier_reference: &str,
        additional: Duration,
    ) -> Result<(), SupplierError> {
        let mut state = self.locked();
        if state.extensions_fail {
            return Err(SupplierError::ExtensionRejected(
                supplier_reference.to_string(),
            ));
        }
        state
            .extended
            .push((supplier_reference.to_string(), additional));
        Ok(())
    }

    async fn release_hold(&self, supplier_reference: &str) -> Result<(), SupplierError> {
        let mut state = self.locked();
        if state.releases_fail {
            return Err(SupplierError::Transient(format!(
                "release unavailable for {supplier_reference}"
            )));
        }
        state.released.push(supplier_reference.to_string());
        Ok(())
    }
}

// ============================================================================
// Itinerary double
// ============================================================================

/// Itinerary reader returning one fixed document, or failing every lookup
pub struct StaticItineraryReader {
    document: Option<ItineraryDocument>,
}

impl StaticItineraryReader {
    pub fn new(document: ItineraryDocument) -> Self {
        Self {
            document: Some(document),
        }
    }

    /// Reader whose lookups always fail, for enrichment-degradation tests
    pub fn unavailable() -> Self {
        Self { document: None }
    }
}

#[async_trait]
impl ItineraryReader for StaticItineraryReader {
    async fn get_itinerary(
        &self,
        itinerary_token: &str,
        _inquiry_token: &str,
    ) -> Result<ItineraryDocument, ItineraryError> {
        match &self.document {
            Some(doc) => Ok(doc.clone()),
            None => Err(ItineraryError::LookupFailed(format!(
                "no itinerary for {itinerary_token}"
            ))),
        }
    }
}

/// Two-city itinerary covering one flight and one hotel
pub fn sample_itinerary(itinerary_token: &str, flight_id: &str, hotel_id: &str) -> ItineraryDocument {
    ItineraryDocument {
        itinerary_token: itinerary_token.to_string(),
        cities: vec![
            CityPlan {
                name: "San Francisco".to_string(),
                days: vec![DayPlan {
                    date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap_or_default(),
                    items: vec![PlannedItem {
                        item_type: ItemType::Flight,
                        item_id: flight_id.to_string(),
                        metadata: serde_json::json!({ "price": 412.50, "currency": "USD" }),
                    }],
                }],
            },
            CityPlan {
                name: "Chicago".to_string(),
                days: vec![DayPlan {
                    date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap_or_default(),
                    items: vec![PlannedItem {
                        item_type: ItemType::Hotel,
                        item_id: hotel_id.to_string(),
                        metadata: serde_json::json!({ "price": 189.00, "currency": "USD" }),
                    }],
                }],
            },
        ],
    }
}
