//! Binds the five CRUD verbs of one entity to its `RecordStore`.
//!
//! Every handler logs the inbound request, calls the store, and answers 200
//! with the JSON result or 500 with the formatter's body. Bodies and query
//! strings are decoded here, so malformed input becomes a `TYPE_ERROR`
//! instead of an extractor rejection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put, MethodRouter};
use axum::{Extension, Json, Router};
use common::types::Actor;
use common::utils::logging::{Logger, RouteTrace};
use serde::Serialize;
use serde_json::{json, Map, Value};
use service::query::split_names;
use service::storage::{Collection, Document};
use service::{QueryParameters, RecordStore, ServiceError};

use crate::errors::{CrudError, EnvelopeFormatter, ErrorFormatter};
use crate::observability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    List,
    Read,
    Update,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::List => "list",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Verb::Create),
            "list" => Some(Verb::List),
            "read" => Some(Verb::Read),
            "update" => Some(Verb::Update),
            "delete" => Some(Verb::Delete),
            _ => None,
        }
    }
}

pub struct RouteBinder<C: Collection> {
    store: RecordStore<C>,
    logger: Arc<dyn Logger>,
    formatter: Arc<dyn ErrorFormatter>,
    sensitive: Vec<String>,
    disabled: HashSet<Verb>,
}

impl<C: Collection + 'static> RouteBinder<C> {
    pub fn new(store: RecordStore<C>, logger: Arc<dyn Logger>) -> Self {
        Self {
            store,
            formatter: Arc::new(EnvelopeFormatter::new(Arc::clone(&logger))),
            logger,
            sensitive: configs::default_sensitive(),
            disabled: HashSet::new(),
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn ErrorFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Path fragments whose request bodies are blanked in the request log.
    pub fn sensitive_routes(mut self, patterns: Vec<String>) -> Self {
        self.sensitive = patterns;
        self
    }

    /// Answer `verb` with the not-allowed handler.
    pub fn disable(mut self, verb: Verb) -> Self {
        self.disabled.insert(verb);
        self
    }

    /// `POST /`, `GET /`, `GET /:id`, `PUT /:id`, `DELETE /:id`.
    pub fn into_router(self) -> Router {
        let root = self
            .gate(Verb::Create, post(create::<C>), post(not_allowed::<C>))
            .merge(self.gate(Verb::List, get(list::<C>), get(not_allowed::<C>)));
        let by_id = self
            .gate(Verb::Read, get(read::<C>), get(not_allowed::<C>))
            .merge(self.gate(Verb::Update, put(update::<C>), put(not_allowed::<C>)))
            .merge(self.gate(Verb::Delete, delete(remove::<C>), delete(not_allowed::<C>)));

        Router::new()
            .route("/", root)
            .route("/:id", by_id)
            .with_state(Arc::new(self))
    }

    fn gate(
        &self,
        verb: Verb,
        enabled: MethodRouter<Arc<Self>>,
        disabled: MethodRouter<Arc<Self>>,
    ) -> MethodRouter<Arc<Self>> {
        if self.disabled.contains(&verb) {
            disabled
        } else {
            enabled
        }
    }

    fn is_sensitive(&self, path: &str) -> bool {
        self.sensitive.iter().any(|pattern| !pattern.is_empty() && path.contains(pattern.as_str()))
    }

    fn trace(&self, method: &Method, uri: &Uri, params: Value, query: &HashMap<String, String>, body: &Bytes) {
        let path = uri.path();
        let body = if self.is_sensitive(path) { json!({}) } else { body_for_log(body) };
        let query = Value::Object(query.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect());
        self.logger.route(path, &RouteTrace { method: method.to_string(), params, query, body });
    }

    fn respond<T: Serialize>(&self, verb: &str, started: Instant, result: Result<T, ServiceError>) -> Response {
        observability::observe(self.store.entity(), verb, result.is_ok(), started);
        match result {
            Ok(value) => (StatusCode::OK, Json(value)).into_response(),
            Err(e) => CrudError(self.formatter.format(&e)).into_response(),
        }
    }
}

fn actor_of(actor: &Option<Extension<Actor>>) -> Option<&Actor> {
    actor.as_ref().map(|Extension(a)| a)
}

fn query_of(uri: &Uri) -> Result<HashMap<String, String>, ServiceError> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(q)| q)
        .map_err(|e| ServiceError::type_error(format!("invalid query string: {e}")))
}

/// A path id that fails to decode (e.g. invalid UTF-8) is a `TYPE_ERROR`.
fn id_of(path: Result<Path<String>, PathRejection>) -> Result<String, ServiceError> {
    path.map(|Path(id)| id).map_err(|e| ServiceError::type_error(format!("invalid id: {e}")))
}

fn id_params(id: &Result<String, ServiceError>) -> Value {
    match id {
        Ok(id) => json!({ "id": id }),
        Err(_) => json!({}),
    }
}

fn body_for_log(body: &Bytes) -> Value {
    if body.is_empty() {
        return json!({});
    }
    serde_json::from_slice(body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// An empty body is an empty document; anything else must be a JSON object.
fn document_from(body: &Bytes) -> Result<Document, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(other) => Err(ServiceError::type_error(format!("request body must be a JSON object, got {other}"))),
        Err(e) => Err(ServiceError::type_error(format!("request body is not valid JSON: {e}"))),
    }
}

fn count_param(query: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ServiceError> {
    match query.get(name).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ServiceError::type_error(format!("{name} must be a non-negative integer"))),
    }
}

/// Query-string list parameters. `pagination` defaults to true here.
pub fn list_params(query: &HashMap<String, String>) -> Result<QueryParameters, ServiceError> {
    let criteria = match query.get("criteria").map(|c| c.trim()) {
        None | Some("") => None,
        Some(raw) => Some(
            serde_json::from_str::<Value>(raw)
                .map_err(|e| ServiceError::type_error(format!("criteria is not valid JSON: {e}")))?,
        ),
    };
    let pagination = match query.get("pagination").map(String::as_str) {
        None | Some("") | Some("true") => true,
        Some("false") => false,
        Some(other) => {
            return Err(ServiceError::type_error(format!("pagination must be true or false, got {other}")))
        }
    };
    Ok(QueryParameters {
        criteria,
        skip: count_param(query, "skip")?,
        limit: count_param(query, "limit")?,
        pagination,
        sort: query.get("sort").filter(|s| !s.is_empty()).cloned(),
        populate: query.get("populate").map(|p| split_names(p)).unwrap_or_default(),
        select: query.get("select").map(|s| split_names(s)).filter(|fields| !fields.is_empty()),
    })
}

async fn create<C: Collection + 'static>(
    State(binder): State<Arc<RouteBinder<C>>>,
    actor: Option<Extension<Actor>>,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let query = query_of(&uri).unwrap_or_default();
    binder.trace(&Method::POST, &uri, json!({}), &query, &body);
    let result = match document_from(&body) {
        Ok(doc) => binder.store.create(doc, actor_of(&actor)).await,
        Err(e) => Err(e),
    };
    binder.respond(Verb::Create.as_str(), started, result)
}

async fn list<C: Collection + 'static>(
    State(binder): State<Arc<RouteBinder<C>>>,
    actor: Option<Extension<Actor>>,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let query = query_of(&uri);
    binder.trace(&Method::GET, &uri, json!({}), query.as_ref().unwrap_or(&HashMap::new()), &body);
    let result = match query.and_then(|q| list_params(&q)) {
        Ok(params) => binder.store.get_all(params, actor_of(&actor)).await,
        Err(e) => Err(e),
    };
    binder.respond(Verb::List.as_str(), started, result)
}

async fn read<C: Collection + 'static>(
    State(binder): State<Arc<RouteBinder<C>>>,
    actor: Option<Extension<Actor>>,
    OriginalUri(uri): OriginalUri,
    id: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let query = query_of(&uri).unwrap_or_default();
    let id = id_of(id);
    binder.trace(&Method::GET, &uri, id_params(&id), &query, &body);
    let result = match id {
        Ok(id) => binder.store.get_by_id(&id, actor_of(&actor)).await,
        Err(e) => Err(e),
    };
    binder.respond(Verb::Read.as_str(), started, result)
}

async fn update<C: Collection + 'static>(
    State(binder): State<Arc<RouteBinder<C>>>,
    actor: Option<Extension<Actor>>,
    OriginalUri(uri): OriginalUri,
    id: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let query = query_of(&uri).unwrap_or_default();
    let id = id_of(id);
    binder.trace(&Method::PUT, &uri, id_params(&id), &query, &body);
    let result = match id.and_then(|id| document_from(&body).map(|doc| (id, doc))) {
        Ok((id, doc)) => binder.store.update(&id, doc, actor_of(&actor)).await,
        Err(e) => Err(e),
    };
    binder.respond(Verb::Update.as_str(), started, result)
}

async fn remove<C: Collection + 'static>(
    State(binder): State<Arc<RouteBinder<C>>>,
    actor: Option<Extension<Actor>>,
    OriginalUri(uri): OriginalUri,
    id: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let query = query_of(&uri).unwrap_or_default();
    let id = id_of(id);
    binder.trace(&Method::DELETE, &uri, id_params(&id), &query, &body);
    let result = match id {
        Ok(id) => binder.store.delete(&id, actor_of(&actor)).await,
        Err(e) => Err(e),
    };
    binder.respond(Verb::Delete.as_str(), started, result)
}

/// Fails every request; mounted in place of a disabled verb.
async fn not_allowed<C: Collection + 'static>(
    State(binder): State<Arc<RouteBinder<C>>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let started = Instant::now();
    binder.trace(&method, &uri, json!({}), &HashMap::new(), &Bytes::new());
    binder.respond::<Value>("not_allowed", started, Err(ServiceError::NotAllowed))
}
