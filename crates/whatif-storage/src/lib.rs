//! Storage for the entity property bags computation graphs run against.
//!
//! Provides the [`PropertyStore`] trait plus the [`InMemoryStore`] and
//! [`SqliteStore`] backends. Engines never call a store: callers load an
//! [`ExecutionState`](whatif_core::ExecutionState) up front and persist
//! results explicitly with [`persist_outputs`].
//!
//! # Modules
//!
//! - [`error`]: StorageError
//! - [`types`]: ExternalId, EntitySpec, EntitySummary
//! - [`traits`]: PropertyStore
//! - [`memory`]: InMemoryStore
//! - [`schema`]: migrations and connection setup
//! - [`sqlite`]: SqliteStore
//! - [`persist`]: persist_outputs

pub mod error;
pub mod memory;
pub mod persist;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use memory::InMemoryStore;
pub use persist::persist_outputs;
pub use sqlite::SqliteStore;
pub use traits::PropertyStore;
pub use types::{EntitySpec, EntitySummary, ExternalId};
