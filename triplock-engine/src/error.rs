use triplock_core::models::ItemType;
use triplock_core::store::StoreError;

/// Caller-facing failures of lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("No active lock found for {item_type} {item_id}")]
    LockNotFound { item_type: ItemType, item_id: String },

    #[error("Lock for {item_type} {item_id} has already expired")]
    LockExpired { item_type: ItemType, item_id: String },

    #[error("Supplier release failed: {0}")]
    ReleaseFailed(String),

    #[error("Supplier extension failed: {0}")]
    ExtendFailed(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Lock store failure: {0}")]
    Store(#[from] StoreError),
}

impl LockError {
    /// Stable reason code for transport-layer mapping
    pub fn code(&self) -> &'static str {
        match self {
            LockError::LockNotFound { .. } => "LOCK_NOT_FOUND",
            LockError::LockExpired { .. } => "LOCK_EXPIRED",
            LockError::ReleaseFailed(_) => "RELEASE_FAILED",
            LockError::ExtendFailed(_) => "EXTEND_FAILED",
            LockError::Validation(_) => "VALIDATION_FAILED",
            LockError::Store(_) => "STORE_ERROR",
        }
    }
}
