//! Service layer: generic record CRUD over a pluggable document collection.
//! - `RecordStore` owns query construction, pagination and soft-delete rules.
//! - `storage` defines the collection capability set and a bundled backend.
//! - Errors are a tagged `ServiceError`, not detected by key presence.

pub mod errors;
pub mod pagination;
pub mod query;
pub mod record_store;
pub mod storage;
#[cfg(test)]
pub mod test_support;

pub use errors::ServiceError;
pub use pagination::{PaginatedResult, Pagination};
pub use query::QueryParameters;
pub use record_store::{RecordStore, CREATED_ON_FIELD};
