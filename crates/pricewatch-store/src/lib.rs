pub mod error;
pub mod persistence;
pub mod store;

pub use error::StoreError;
pub use persistence::{JsonFilePersistence, MemoryPersistence, StatePersistence, SubscriberState};
pub use store::{SubscriberGuard, TrackingStore};
