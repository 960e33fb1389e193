use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use common::types::Actor;
use common::utils::logging::Logger;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::pagination::{PaginatedResult, Pagination};
use crate::query::{parse_sort, QueryParameters};
use crate::storage::{Collation, Collection, Document, Filter, FindQuery, StorageError, DELETED_FIELD, ID_FIELD};

/// Creation timestamp, epoch milliseconds.
pub const CREATED_ON_FIELD: &str = "createdOn";

/// Uniform CRUD and pagination over one entity's collection.
pub struct RecordStore<C: Collection> {
    collection: Arc<C>,
    logger: Arc<dyn Logger>,
}

impl<C: Collection> Clone for RecordStore<C> {
    fn clone(&self) -> Self {
        Self { collection: Arc::clone(&self.collection), logger: Arc::clone(&self.logger) }
    }
}

impl<C: Collection> RecordStore<C> {
    pub fn new(collection: Arc<C>, logger: Arc<dyn Logger>) -> Self {
        Self { collection, logger }
    }

    /// Entity name from the schema, e.g. `Member`.
    pub fn entity(&self) -> &str {
        &self.collection.schema().name
    }

    /// Stamp `createdOn` and persist. Storage rejections pass through.
    #[instrument(skip(self, data, actor), fields(entity = %self.entity(), actor = ?actor.map(|a| &a.id)))]
    pub async fn create(&self, data: Document, actor: Option<&Actor>) -> Result<Document, ServiceError> {
        self.logger.msg(&format!("Creating {}.", self.entity()));
        let mut doc = data;
        doc.insert(CREATED_ON_FIELD.into(), Value::from(Utc::now().timestamp_millis()));
        if self.collection.schema().soft_delete {
            doc.entry(DELETED_FIELD).or_insert(Value::Bool(false));
        }
        let created = self.collection.insert(doc).await?;
        debug!(id = ?created.get(ID_FIELD), "record created");
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(entity = %self.entity(), actor = ?actor.map(|a| &a.id)))]
    pub async fn get_by_id(&self, id: &str, actor: Option<&Actor>) -> Result<Document, ServiceError> {
        self.logger.msg(&format!("Getting {} with id {id}.", self.entity()));
        self.find_live(id).await
    }

    /// List with the typed parameter bundle.
    #[instrument(skip_all, fields(entity = %self.entity(), actor = ?actor.map(|a| &a.id)))]
    pub async fn get_all(&self, params: QueryParameters, actor: Option<&Actor>) -> Result<PaginatedResult, ServiceError> {
        self.logger.msg(&format!("Getting all {}.", self.entity()));
        self.resolve_list(params).await
    }

    /// List with raw arguments in either the bundle or the positional shape.
    #[instrument(skip_all, fields(entity = %self.entity(), actor = ?actor.map(|a| &a.id)))]
    pub async fn get_all_legacy(&self, args: &[Value], actor: Option<&Actor>) -> Result<PaginatedResult, ServiceError> {
        self.logger.msg(&format!("Getting all {}.", self.entity()));
        let params = QueryParameters::from_legacy_args(args)?;
        self.resolve_list(params).await
    }

    /// Merge `data` over the current record and return the fresh copy. The
    /// incoming `_id` is ignored.
    #[instrument(skip(self, data, actor), fields(entity = %self.entity(), actor = ?actor.map(|a| &a.id)))]
    pub async fn update(&self, id: &str, data: Document, actor: Option<&Actor>) -> Result<Document, ServiceError> {
        self.logger.msg(&format!("Updating {} with id {id}.", self.entity()));
        let mut merged = self.find_live(id).await?;
        merged.extend(data.into_iter().filter(|(field, _)| field != ID_FIELD));
        self.collection.update(&Filter::by_id(id), merged, true).await?;
        self.find_live(id).await
    }

    /// Soft delete when the schema declares `deleted`, physical removal
    /// otherwise. Returns the record as it was before deletion.
    #[instrument(skip(self, actor), fields(entity = %self.entity(), actor = ?actor.map(|a| &a.id)))]
    pub async fn delete(&self, id: &str, actor: Option<&Actor>) -> Result<Document, ServiceError> {
        self.logger.msg(&format!("Deleting {} with id {id}.", self.entity()));
        let Some(existing) = self.collection.find_by_id(id).await?.filter(|doc| !is_deleted(doc)) else {
            return Err(ServiceError::not_found(self.entity(), id));
        };

        if self.collection.schema().soft_delete {
            let mut patch = Document::new();
            patch.insert(DELETED_FIELD.into(), Value::Bool(true));
            self.collection.update(&Filter::by_id(id), patch, true).await?;
            return Ok(existing);
        }

        self.collection
            .find_one_and_remove(&Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::not_found(self.entity(), id))
    }

    async fn find_live(&self, id: &str) -> Result<Document, ServiceError> {
        self.collection
            .find_one(&Filter::by_id(id).not_deleted())
            .await?
            .ok_or_else(|| ServiceError::not_found(self.entity(), id))
    }

    async fn resolve_list(&self, params: QueryParameters) -> Result<PaginatedResult, ServiceError> {
        let filter = Filter::parse(params.criteria.as_ref())
            .map_err(|e| match e {
                StorageError::InvalidFilter(msg) => ServiceError::type_error(msg),
                other => other.into(),
            })?
            .not_deleted();

        let mut query = FindQuery::new(filter.clone()).collation(Collation::english_lower_first());
        if let Some(spec) = params.sort.as_deref().map(parse_sort).transpose()?.flatten() {
            query = query.sort(spec);
        }

        let mut expanded = HashSet::new();
        for relation in &params.populate {
            if expanded.insert(relation.as_str()) {
                query = query.populate(relation.as_str());
            }
        }

        if let Some(fields) = params.select.filter(|f| !f.is_empty()) {
            query = query.select(fields);
        }

        if !params.pagination {
            if let Some(skip) = params.skip {
                query = query.skip(skip);
            }
            if let Some(limit) = params.limit {
                query = query.limit(limit);
            }
            return Ok(PaginatedResult::unpaged(self.collection.find(query).await?));
        }

        let window = Pagination::resolve(params.skip, params.limit)
            .ok_or_else(|| ServiceError::type_error("limit must be greater than zero when paginating"))?;
        let total = self.collection.count(&filter).await?;
        let results = self.collection.find(query.skip(window.skip).limit(window.limit)).await?;
        Ok(PaginatedResult::paged(results, window, total))
    }
}

fn is_deleted(doc: &Document) -> bool {
    matches!(doc.get(DELETED_FIELD), Some(Value::Bool(true)))
}
