use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::collation::compare_values;
use super::filter::lookup;
use super::{
    Collection, Document, DocumentStore, Filter, FindQuery, Schema, SortDirection, SortSpec, StorageError,
    UpdateOutcome, ID_FIELD,
};

/// `Collection` over one named collection of a [`DocumentStore`].
#[derive(Clone)]
pub struct MemoryCollection {
    store: DocumentStore,
    schema: Schema,
}

impl MemoryCollection {
    pub fn new(store: DocumentStore, schema: Schema) -> Self {
        Self { store, schema }
    }

    async fn expand(&self, docs: &mut [Document], relation: &str) -> Result<(), StorageError> {
        let target = self
            .schema
            .relations
            .get(relation)
            .ok_or_else(|| StorageError::UnknownRelation(relation.to_string()))?;
        let referenced: HashMap<String, Document> = self
            .store
            .read(target, |rows| {
                rows.iter()
                    .filter_map(|d| Some((id_of(d)?.to_string(), d.clone())))
                    .collect()
            })
            .await;

        for doc in docs.iter_mut() {
            if let Some(slot) = doc.get_mut(relation) {
                if let Some(replacement) = resolve_reference(slot, &referenced) {
                    *slot = replacement;
                }
            }
        }
        Ok(())
    }
}

fn id_of(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

fn resolve_reference(slot: &Value, referenced: &HashMap<String, Document>) -> Option<Value> {
    let fetch = |id: &str| referenced.get(id).cloned().map(Value::Object);
    match slot {
        Value::String(id) => Some(fetch(id.as_str()).unwrap_or(Value::Null)),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(id) => fetch(id.as_str()),
                    other => Some(other.clone()),
                })
                .collect(),
        )),
        _ => None,
    }
}

fn sort_docs(docs: &mut [Document], specs: &[SortSpec], collation: Option<&super::Collation>) {
    docs.sort_by(|a, b| {
        for spec in specs {
            let ord = compare_values(lookup(a, &spec.field), lookup(b, &spec.field), collation);
            let ord = match spec.direction {
                Some(SortDirection::Descending) => ord.reverse(),
                _ => ord,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn project(mut doc: Document, fields: &[String]) -> Document {
    if fields.is_empty() {
        return doc;
    }
    if fields.iter().all(|f| f.starts_with('-')) {
        for f in fields {
            doc.remove(&f[1..]);
        }
        return doc;
    }
    doc.into_iter()
        .filter(|(k, _)| k == ID_FIELD || fields.iter().any(|f| f == k))
        .collect()
}

fn assign_id(doc: &mut Document) -> Result<String, StorageError> {
    let id = match doc.get(ID_FIELD) {
        None | Some(Value::Null) => Uuid::new_v4().to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(StorageError::Validation(format!("Cast to id failed for value {other} at path {ID_FIELD}")))
        }
    };
    doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    Ok(id)
}

#[async_trait]
impl Collection for MemoryCollection {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn insert(&self, mut doc: Document) -> Result<Document, StorageError> {
        self.schema.validate(&doc)?;
        let id = assign_id(&mut doc)?;
        self.store
            .write(&self.schema.collection, |docs| {
                if docs.iter().any(|d| id_of(d) == Some(id.as_str())) {
                    return Err(StorageError::Duplicate(id.clone()));
                }
                docs.push(doc.clone());
                Ok(doc)
            })
            .await
    }

    async fn find(&self, query: FindQuery) -> Result<Vec<Document>, StorageError> {
        if let Some(unknown) = query.populate.iter().find(|r| !self.schema.relations.contains_key(*r)) {
            return Err(StorageError::UnknownRelation(unknown.clone()));
        }

        let mut docs: Vec<Document> = self
            .store
            .read(&self.schema.collection, |rows| {
                rows.iter().filter(|d| query.filter.matches(d)).cloned().collect()
            })
            .await;

        if !query.sort.is_empty() {
            sort_docs(&mut docs, &query.sort, query.collation.as_ref());
        }

        let window = docs.into_iter().skip(usize::try_from(query.skip.unwrap_or(0)).unwrap_or(usize::MAX));
        let mut docs: Vec<Document> = match query.limit {
            None | Some(0) => window.collect(),
            Some(n) => window.take(usize::try_from(n).unwrap_or(usize::MAX)).collect(),
        };

        for relation in &query.populate {
            self.expand(&mut docs, relation).await?;
        }

        Ok(match &query.select {
            Some(fields) => docs.into_iter().map(|d| project(d, fields)).collect(),
            None => docs,
        })
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        Ok(self
            .store
            .read(&self.schema.collection, |rows| rows.iter().filter(|d| filter.matches(d)).count())
            .await as u64)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, StorageError> {
        Ok(self.store.raw(&self.schema.collection, id).await)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StorageError> {
        Ok(self
            .store
            .read(&self.schema.collection, |rows| rows.iter().find(|d| filter.matches(d)).cloned())
            .await)
    }

    async fn update(&self, filter: &Filter, mut patch: Document, upsert: bool) -> Result<UpdateOutcome, StorageError> {
        patch.remove(ID_FIELD);
        let schema = &self.schema;
        self.store
            .write(&schema.collection, |docs| {
                if let Some(existing) = docs.iter_mut().find(|d| filter.matches(d)) {
                    let mut merged = existing.clone();
                    merged.extend(patch);
                    schema.validate(&merged)?;
                    *existing = merged;
                    return Ok(UpdateOutcome { matched: 1, upserted: None });
                }
                if !upsert {
                    return Ok(UpdateOutcome::default());
                }
                let mut created = filter.equalities();
                created.extend(patch);
                schema.validate(&created)?;
                let id = assign_id(&mut created)?;
                docs.push(created);
                Ok(UpdateOutcome { matched: 0, upserted: Some(id) })
            })
            .await
    }

    async fn find_one_and_remove(&self, filter: &Filter) -> Result<Option<Document>, StorageError> {
        self.store
            .write(&self.schema.collection, |docs| {
                Ok(docs.iter().position(|d| filter.matches(d)).map(|idx| docs.remove(idx)))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Collation;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap_or_default()
    }

    fn members(store: &DocumentStore) -> MemoryCollection {
        store.collection(
            Schema::new("Member", "members")
                .soft_delete(true)
                .require("name")
                .relation("team", "teams")
                .relation("mentors", "members"),
        )
    }

    #[tokio::test]
    async fn insert_assigns_id_and_rejects_duplicates() -> Result<(), anyhow::Error> {
        let store = DocumentStore::in_memory();
        let coll = members(&store);
        let saved = coll.insert(doc(json!({"name": "Bob"}))).await?;
        let id = saved[ID_FIELD].as_str().unwrap().to_string();
        assert!(!id.is_empty());

        let dup = coll.insert(doc(json!({"_id": id, "name": "Other"}))).await.unwrap_err();
        assert!(matches!(dup, StorageError::Duplicate(_)));

        let invalid = coll.insert(doc(json!({"age": 3}))).await.unwrap_err();
        assert!(invalid.to_string().contains("Path `name` is required"));
        assert_eq!(store.len("members").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn find_sorts_with_collation_then_windows() -> Result<(), anyhow::Error> {
        let store = DocumentStore::in_memory();
        let coll = members(&store);
        for name in ["Bob", "alice", "Carol", "dave"] {
            coll.insert(doc(json!({ "name": name }))).await?;
        }
        let names = |docs: Vec<Document>| docs.iter().map(|d| d["name"].as_str().unwrap().to_string()).collect::<Vec<_>>();

        let sorted = coll
            .find(FindQuery::new(Filter::default()).sort(SortSpec::ascending("name")).collation(Collation::default()))
            .await?;
        assert_eq!(names(sorted), vec!["alice", "Bob", "Carol", "dave"]);

        let binary = coll.find(FindQuery::new(Filter::default()).sort(SortSpec::ascending("name"))).await?;
        assert_eq!(names(binary), vec!["Bob", "Carol", "alice", "dave"]);

        let page = coll
            .find(
                FindQuery::new(Filter::default())
                    .sort(SortSpec::descending("name"))
                    .collation(Collation::default())
                    .skip(1)
                    .limit(2),
            )
            .await?;
        assert_eq!(names(page), vec!["Carol", "Bob"]);

        let natural = coll.find(FindQuery::new(Filter::default())).await?;
        assert_eq!(names(natural), vec!["Bob", "alice", "Carol", "dave"]);
        Ok(())
    }

    #[tokio::test]
    async fn populate_replaces_references() -> Result<(), anyhow::Error> {
        let store = DocumentStore::in_memory();
        let teams = store.collection(Schema::new("Team", "teams"));
        let team = teams.insert(doc(json!({"_id": "t1", "title": "core"}))).await?;
        let coll = members(&store);
        let mentor = coll.insert(doc(json!({"_id": "m1", "name": "Mia"}))).await?;
        coll.insert(doc(json!({"name": "Bob", "team": "t1", "mentors": ["m1", "gone"]}))).await?;
        coll.insert(doc(json!({"name": "Ann", "team": "missing"}))).await?;

        let found = coll
            .find(FindQuery::new(Filter::default().eq("name", "Bob")).populate("team").populate("mentors"))
            .await?;
        assert_eq!(found[0]["team"], Value::Object(team));
        assert_eq!(found[0]["mentors"], json!([Value::Object(mentor)]));

        let dangling = coll.find(FindQuery::new(Filter::default().eq("name", "Ann")).populate("team")).await?;
        assert_eq!(dangling[0]["team"], Value::Null);

        let err = coll.find(FindQuery::new(Filter::default()).populate("owner")).await.unwrap_err();
        assert_eq!(err, StorageError::UnknownRelation("owner".into()));
        Ok(())
    }

    #[tokio::test]
    async fn select_includes_or_excludes() -> Result<(), anyhow::Error> {
        let store = DocumentStore::in_memory();
        let coll = members(&store);
        coll.insert(doc(json!({"name": "Bob", "age": 40, "email": "b@x"}))).await?;

        let only = coll.find(FindQuery::new(Filter::default()).select(["name"])).await?;
        let keys: Vec<&String> = only[0].keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(only[0].contains_key(ID_FIELD) && only[0].contains_key("name"));

        let without = coll.find(FindQuery::new(Filter::default()).select(["-email"])).await?;
        assert!(without[0].contains_key("age"));
        assert!(!without[0].contains_key("email"));
        Ok(())
    }

    #[tokio::test]
    async fn update_sets_fields_and_upserts() -> Result<(), anyhow::Error> {
        let store = DocumentStore::in_memory();
        let coll = members(&store);
        let saved = coll.insert(doc(json!({"_id": "1", "name": "Bob", "age": 40}))).await?;
        assert_eq!(saved[ID_FIELD], "1");

        let out = coll.update(&Filter::by_id("1"), doc(json!({"_id": "zzz", "age": 41})), true).await?;
        assert_eq!(out, UpdateOutcome { matched: 1, upserted: None });
        let after = coll.find_by_id("1").await?.unwrap();
        assert_eq!(after["age"], 41);
        assert_eq!(after["name"], "Bob");

        let none = coll.update(&Filter::by_id("2"), doc(json!({"name": "Ann"})), false).await?;
        assert_eq!(none, UpdateOutcome::default());
        assert!(coll.find_by_id("2").await?.is_none());

        let up = coll.update(&Filter::by_id("2"), doc(json!({"name": "Ann"})), true).await?;
        assert_eq!(up.upserted.as_deref(), Some("2"));
        assert_eq!(coll.find_by_id("2").await?.unwrap()["name"], "Ann");

        let invalid = coll.update(&Filter::by_id("1"), doc(json!({"name": null})), true).await;
        assert!(matches!(invalid, Err(StorageError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn count_find_one_and_remove() -> Result<(), anyhow::Error> {
        let store = DocumentStore::in_memory();
        let coll = members(&store);
        coll.insert(doc(json!({"_id": "1", "name": "Bob"}))).await?;
        coll.insert(doc(json!({"_id": "2", "name": "Ann", "deleted": true}))).await?;

        assert_eq!(coll.count(&Filter::default()).await?, 2);
        assert_eq!(coll.count(&Filter::default().not_deleted()).await?, 1);
        assert!(coll.find_one(&Filter::by_id("2").not_deleted()).await?.is_none());
        assert!(coll.find_by_id("2").await?.is_some());

        let removed = coll.find_one_and_remove(&Filter::by_id("1")).await?;
        assert_eq!(removed.unwrap()["name"], "Bob");
        assert!(coll.find_one_and_remove(&Filter::by_id("1")).await?.is_none());
        assert_eq!(store.len("members").await, 1);
        Ok(())
    }
}
