use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{fs, sync::RwLock};
use tracing::debug;

use super::{Document, MemoryCollection, Schema, StorageError, ID_FIELD};

type Tables = HashMap<String, Vec<Document>>;

/// Shared document map: collection name -> records in insertion order.
///
/// With a file path every mutation rewrites the JSON file; without one the
/// store lives only in memory. Clones share the same data.
#[derive(Clone, Default)]
pub struct DocumentStore {
    inner: Arc<RwLock<Tables>>,
    file_path: Option<PathBuf>,
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store. Creates the file with an empty map if it
    /// does not exist; the parent directory must already exist.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StorageError> {
        let file_path = path.into();
        let tables: Tables = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::Serde(e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let empty = Tables::new();
                persist(&file_path, &empty).await?;
                empty
            }
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };
        debug!(path = %file_path.display(), collections = tables.len(), "document store opened");

        Ok(Self { inner: Arc::new(RwLock::new(tables)), file_path: Some(file_path) })
    }

    /// Handle onto one collection of this store.
    pub fn collection(&self, schema: Schema) -> MemoryCollection {
        MemoryCollection::new(self.clone(), schema)
    }

    /// Run `f` over a snapshot-consistent view of one collection.
    pub(crate) async fn read<R>(&self, collection: &str, f: impl FnOnce(&[Document]) -> R) -> R {
        let tables = self.inner.read().await;
        f(tables.get(collection).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Mutate a copy of one collection, persist, then commit. A failed
    /// closure or file write leaves the store unchanged.
    pub(crate) async fn write<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut Vec<Document>) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut tables = self.inner.write().await;
        let mut rows = tables.get(collection).cloned().unwrap_or_default();
        let out = f(&mut rows)?;

        let previous = tables.insert(collection.to_string(), rows);
        if let Some(path) = &self.file_path {
            if let Err(e) = persist(path, &tables).await {
                match previous {
                    Some(rows) => tables.insert(collection.to_string(), rows),
                    None => tables.remove(collection),
                };
                return Err(e);
            }
        }
        Ok(out)
    }

    /// Direct inspection by id, ignoring soft-delete flags.
    pub async fn raw(&self, collection: &str, id: &str) -> Option<Document> {
        self.read(collection, |docs| {
            docs.iter().find(|d| d.get(ID_FIELD).and_then(|v| v.as_str()) == Some(id)).cloned()
        })
        .await
    }

    /// Number of stored records in a collection, deleted or not.
    pub async fn len(&self, collection: &str) -> usize {
        self.read(collection, |docs| docs.len()).await
    }
}

async fn persist(path: &Path, tables: &Tables) -> Result<(), StorageError> {
    let data = serde_json::to_vec(tables).map_err(|e| StorageError::Serde(e.to_string()))?;
    fs::write(path, data).await.map_err(|e| StorageError::Io(e.to_string()))
}
