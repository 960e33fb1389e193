#![cfg(test)]
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::utils::logging::RecordingLogger;
use serde_json::Value;

use crate::record_store::RecordStore;
use crate::storage::{
    Collection, Document, DocumentStore, Filter, FindQuery, MemoryCollection, Schema, StorageError, UpdateOutcome,
};

/// Soft-deletable members with a `team` relation, and hard-deleted teams,
/// sharing one in-memory store and one recording logger.
pub struct Fixture {
    pub store: DocumentStore,
    pub logger: Arc<RecordingLogger>,
    pub members: RecordStore<MemoryCollection>,
    pub teams: RecordStore<MemoryCollection>,
}

pub fn member_schema() -> Schema {
    Schema::new("Member", "members").soft_delete(true).require("name").relation("team", "teams")
}

pub fn team_schema() -> Schema {
    Schema::new("Team", "teams").require("name")
}

pub fn fixture() -> Fixture {
    let store = DocumentStore::in_memory();
    let logger = Arc::new(RecordingLogger::new());
    let members = RecordStore::new(Arc::new(store.collection(member_schema())), logger.clone());
    let teams = RecordStore::new(Arc::new(store.collection(team_schema())), logger.clone());
    Fixture { store, logger, members, teams }
}

pub fn doc(v: Value) -> Document {
    v.as_object().cloned().unwrap_or_default()
}

pub fn names(docs: &[Document]) -> Vec<String> {
    docs.iter().filter_map(|d| d.get("name").and_then(Value::as_str).map(String::from)).collect()
}

/// Delegates to a `MemoryCollection` and keeps every `FindQuery` it was
/// handed, so tests can see exactly what the store asked for.
pub struct CapturingCollection {
    inner: MemoryCollection,
    queries: Mutex<Vec<FindQuery>>,
}

impl CapturingCollection {
    pub fn new(inner: MemoryCollection) -> Self {
        Self { inner, queries: Mutex::new(Vec::new()) }
    }

    pub fn queries(&self) -> Vec<FindQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Collection for CapturingCollection {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    async fn insert(&self, doc: Document) -> Result<Document, StorageError> {
        self.inner.insert(doc).await
    }

    async fn find(&self, query: FindQuery) -> Result<Vec<Document>, StorageError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        self.inner.find(query).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        self.inner.count(filter).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, StorageError> {
        self.inner.find_by_id(id).await
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StorageError> {
        self.inner.find_one(filter).await
    }

    async fn update(&self, filter: &Filter, patch: Document, upsert: bool) -> Result<UpdateOutcome, StorageError> {
        self.inner.update(filter, patch, upsert).await
    }

    async fn find_one_and_remove(&self, filter: &Filter) -> Result<Option<Document>, StorageError> {
        self.inner.find_one_and_remove(filter).await
    }
}
