//! Storage abstractions for the service layer
//!
//! `Collection` is the capability set a record store needs from a document
//! store. `DocumentStore` / `MemoryCollection` are the bundled backend: an
//! in-memory document map, optionally persisted to a JSON file.

pub mod collation;
pub mod document_store;
pub mod filter;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use collation::{CaseFirst, Collation};
pub use document_store::DocumentStore;
pub use filter::Filter;
pub use memory::MemoryCollection;

/// A stored record: a JSON object.
pub type Document = Map<String, Value>;

/// Field holding the record identifier.
pub const ID_FIELD: &str = "_id";
/// Soft-delete flag.
pub const DELETED_FIELD: &str = "deleted";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("duplicate key: _id {0} already exists")]
    Duplicate(String),
    #[error("cannot populate path `{0}` because it is not a declared relation")]
    UnknownRelation(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// Introspection data for one entity type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Entity name used in messages, e.g. `Member`.
    pub name: String,
    /// Collection the records live in, e.g. `members`.
    pub collection: String,
    /// Whether the schema declares a `deleted` field.
    pub soft_delete: bool,
    pub required: Vec<String>,
    /// Relation field -> target collection.
    pub relations: BTreeMap<String, String>,
}

impl Schema {
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { name: name.into(), collection: collection.into(), ..Default::default() }
    }

    pub fn soft_delete(mut self, enabled: bool) -> Self {
        self.soft_delete = enabled;
        self
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn relation(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.insert(field.into(), target.into());
        self
    }

    pub fn declares(&self, field: &str) -> bool {
        match field {
            ID_FIELD => true,
            DELETED_FIELD => self.soft_delete,
            other => self.required.iter().any(|f| f == other) || self.relations.contains_key(other),
        }
    }

    /// Checks required fields; the message names the entity and the first
    /// offending path.
    pub fn validate(&self, doc: &Document) -> Result<(), StorageError> {
        for field in &self.required {
            if doc.get(field).map_or(true, Value::is_null) {
                return Err(StorageError::Validation(format!(
                    "{} validation failed: {field}: Path `{field}` is required.",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Single-field sort. A `None` direction is passed through and treated as
/// ascending by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: Option<SortDirection>,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: Option<SortDirection>) -> Self {
        Self { field: field.into(), direction }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(field, Some(SortDirection::Ascending))
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(field, Some(SortDirection::Descending))
    }
}

/// A find request, built up the way a cursor is chained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Vec<SortSpec>,
    pub collation: Option<Collation>,
    pub populate: Vec<String>,
    pub select: Option<Vec<String>>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self { filter, ..Default::default() }
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    pub fn collation(mut self, collation: Collation) -> Self {
        self.collation = Some(collation);
        self
    }

    pub fn populate(mut self, relation: impl Into<String>) -> Self {
        self.populate.push(relation.into());
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub upserted: Option<String>,
}

#[async_trait]
pub trait Collection: Send + Sync {
    fn schema(&self) -> &Schema;
    /// Persist a new record, assigning an identifier when absent.
    async fn insert(&self, doc: Document) -> Result<Document, StorageError>;
    async fn find(&self, query: FindQuery) -> Result<Vec<Document>, StorageError>;
    async fn count(&self, filter: &Filter) -> Result<u64, StorageError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, StorageError>;
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StorageError>;
    /// Shallow-set `patch` onto the first match; insert when nothing matches
    /// and `upsert` is set.
    async fn update(&self, filter: &Filter, patch: Document, upsert: bool) -> Result<UpdateOutcome, StorageError>;
    async fn find_one_and_remove(&self, filter: &Filter) -> Result<Option<Document>, StorageError>;
}
