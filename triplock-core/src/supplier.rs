use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::ItemType;

/// A hold confirmed on the supplier side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierHold {
    pub reference: String,
    pub expires_at: DateTime<Utc>,
}

/// Capability interface for one inventory supplier
#[async_trait]
pub trait SupplierClient: Send + Sync {
    /// Place a temporary hold on the item behind `reference_id`
    async fn create_hold(&self, reference_id: &str) -> Result<SupplierHold, SupplierError>;

    /// Ask the supplier whether the hold is still honored
    async fn verify_hold(&self, supplier_reference: &str) -> Result<bool, SupplierError>;

    /// Push the hold's deadline further out by `additional`
    async fn extend_hold(
        &self,
        supplier_reference: &str,
        additional: Duration,
    ) -> Result<(), SupplierError>;

    /// Hand the hold back to the supplier
    async fn release_hold(&self, supplier_reference: &str) -> Result<(), SupplierError>;
}

/// One supplier client per inventory type
#[derive(Clone)]
pub struct SupplierRegistry {
    flight: Arc<dyn SupplierClient>,
    hotel: Arc<dyn SupplierClient>,
}

impl SupplierRegistry {
    pub fn new(flight: Arc<dyn SupplierClient>, hotel: Arc<dyn SupplierClient>) -> Self {
        Self { flight, hotel }
    }

    pub fn client_for(&self, item_type: ItemType) -> &dyn SupplierClient {
        match item_type {
            ItemType::Flight => self.flight.as_ref(),
            ItemType::Hotel => self.hotel.as_ref(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupplierError {
    #[error("Supplier rejected hold for {0}")]
    HoldRejected(String),

    #[error("Supplier rejected extension for {0}")]
    ExtensionRejected(String),

    #[error("Supplier call failed: {0}")]
    Transient(String),
}
