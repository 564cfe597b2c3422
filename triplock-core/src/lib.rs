pub mod clock;
pub mod itinerary;
pub mod models;
pub mod store;
pub mod supplier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use itinerary::{ItineraryDocument, ItineraryError, ItineraryReader};
pub use models::{ItemType, Lock, LockRequestItem, LockStatus, LockUpdate};
pub use store::{LockStore, StoreError};
pub use supplier::{SupplierClient, SupplierError, SupplierHold, SupplierRegistry};
