use std::cmp::Ordering;

use serde_json::{json, Map, Value};

use super::collation::compare_values;
use super::{Document, StorageError, DELETED_FIELD, ID_FIELD};

const OPERATORS: [&str; 9] = ["$eq", "$ne", "$in", "$nin", "$gt", "$gte", "$lt", "$lte", "$exists"];

/// Field-path conditions ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    /// Parse caller criteria. `null` is the empty filter; anything other than
    /// an object, or an unknown `$` operator, is rejected.
    pub fn parse(criteria: Option<&Value>) -> Result<Self, StorageError> {
        let map = match criteria {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(StorageError::InvalidFilter(format!("criteria must be an object, got {other}")))
            }
        };
        for (field, cond) in &map {
            if field.starts_with('$') {
                return Err(StorageError::InvalidFilter(format!("unsupported top-level operator {field}")));
            }
            if let Some(ops) = operator_set(cond) {
                for (op, arg) in ops {
                    if !OPERATORS.contains(&op.as_str()) {
                        return Err(StorageError::InvalidFilter(format!("unknown operator {op} on {field}")));
                    }
                    if matches!(op.as_str(), "$in" | "$nin") && !arg.is_array() {
                        return Err(StorageError::InvalidFilter(format!("{op} on {field} needs an array")));
                    }
                }
            }
        }
        Ok(Self(map))
    }

    pub fn by_id(id: &str) -> Self {
        Self::default().eq(ID_FIELD, id)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Exclude soft-deleted records: `deleted` false or absent. Replaces any
    /// caller condition on `deleted`.
    pub fn not_deleted(mut self) -> Self {
        self.0.insert(DELETED_FIELD.into(), json!({ "$ne": true }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.0.iter().all(|(path, cond)| {
            let actual = lookup(doc, path);
            match operator_set(cond) {
                Some(ops) => ops.iter().all(|(op, arg)| apply(op, actual, arg)),
                None => equals(actual, cond),
            }
        })
    }

    /// Plain equality conditions on top-level fields, used to seed an upsert.
    pub fn equalities(&self) -> Document {
        self.0
            .iter()
            .filter(|(path, cond)| !path.contains('.') && operator_set(cond).is_none())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn operator_set(cond: &Value) -> Option<&Map<String, Value>> {
    match cond {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => Some(map),
        _ => None,
    }
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), v) if !v.is_array() => items.contains(v),
        (Some(a), e) => a == e,
    }
}

fn compare(actual: Option<&Value>, arg: &Value, accept: fn(Ordering) -> bool) -> bool {
    let Some(actual) = actual else { return false };
    let same_kind = matches!(
        (actual, arg),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) | (Value::Bool(_), Value::Bool(_))
    );
    same_kind && accept(compare_values(Some(actual), Some(arg), None))
}

fn apply(op: &str, actual: Option<&Value>, arg: &Value) -> bool {
    match op {
        "$eq" => equals(actual, arg),
        "$ne" => !equals(actual, arg),
        "$in" => arg.as_array().map_or(false, |opts| opts.iter().any(|o| equals(actual, o))),
        "$nin" => arg.as_array().map_or(true, |opts| !opts.iter().any(|o| equals(actual, o))),
        "$gt" => compare(actual, arg, |o| o == Ordering::Greater),
        "$gte" => compare(actual, arg, |o| o != Ordering::Less),
        "$lt" => compare(actual, arg, |o| o == Ordering::Less),
        "$lte" => compare(actual, arg, |o| o != Ordering::Greater),
        "$exists" => actual.is_some() == arg.as_bool().unwrap_or(true),
        _ => false,
    }
}
