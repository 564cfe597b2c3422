pub mod error;
pub mod manager;
pub mod results;
pub mod sweeper;
pub mod testkit;

pub use error::LockError;
pub use manager::LockManager;
pub use results::{
    ClearOutcome, CreatedLockBatch, ExpiredItemReport, ExtendOutcome, LockFailureReason,
    LockItemError, LockStatusSummary, ReleaseOutcome,
};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperHandle};
