//! TripStore - file-backed JSON record store
//!
//! Persists whole records as one JSON document per id, grouped by collection.
//! Writes go to a temporary file first and are renamed into place, so a reader
//! never observes a half-written record.
//!
//! # Layout
//!
//! ```text
//! .tripstore/
//! └── {collection}/
//!     ├── {id}.json
//!     └── ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tripstore::Store;
//!
//! let store = Store::open(".tripstore")?;
//! store.put(&plan)?;
//! let loaded: Option<TripPlan> = store.get(&plan.trip_id)?;
//! ```

mod error;
mod store;

pub use error::StoreError;
pub use store::{Record, Store, now_ms};
