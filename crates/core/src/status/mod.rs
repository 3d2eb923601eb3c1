//! Status catalog: the open set of pipeline status labels.
//!
//! Labels are discovered at runtime from the enrichment service, so the set is
//! store-backed rather than a closed enum. The [`StatusCatalog`] keeps a full
//! in-memory mirror of the persisted table.

mod catalog;
mod sqlite_store;
mod store;
mod types;

pub use catalog::StatusCatalog;
pub use sqlite_store::SqliteStatusStore;
pub use store::{StatusError, StatusStore};
pub use types::{StatusCode, StatusId};
