//! List query parameters and their two accepted calling shapes.
//!
//! The typed [`QueryParameters`] is the primary shape. Older callers hand over
//! raw JSON arguments, either one parameter bundle (an object with a numeric
//! `limit`, optionally followed by populate and select) or the positional list
//! `criteria, skip, limit, pagination, sort, populate, select`.
//! [`QueryParameters::from_legacy_args`] turns either into the typed form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ServiceError;
use crate::storage::{SortDirection, SortSpec};

const MAX_POSITIONAL_ARGS: usize = 7;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParameters {
    /// Filter ANDed with the implicit non-deleted condition.
    pub criteria: Option<Value>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Count and return page metadata.
    pub pagination: bool,
    /// `"field,direction"`
    pub sort: Option<String>,
    /// Relations to expand, each at most once.
    pub populate: Vec<String>,
    pub select: Option<Vec<String>>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn criteria(mut self, criteria: Value) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn paginate(mut self, enabled: bool) -> Self {
        self.pagination = enabled;
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
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

    /// Detect the bundle or positional shape; anything else is a type error.
    pub fn from_legacy_args(args: &[Value]) -> Result<Self, ServiceError> {
        match args.first() {
            Some(Value::Object(bundle)) if bundle.get("limit").is_some_and(Value::is_number) => {
                if args.len() > 3 {
                    return Err(ServiceError::type_error("a parameter bundle takes at most populate and select after it"));
                }
                Self::from_bundle(bundle, args.get(1), args.get(2))
            }
            _ => Self::from_positional(args),
        }
    }

    fn from_bundle(bundle: &Map<String, Value>, populate: Option<&Value>, select: Option<&Value>) -> Result<Self, ServiceError> {
        let mut params = Self {
            criteria: criteria_arg(bundle.get("criteria"))?,
            skip: count_arg(bundle.get("skip"), "skip")?,
            limit: count_arg(bundle.get("limit"), "limit")?,
            pagination: flag_arg(bundle.get("pagination"))?,
            sort: text_arg(bundle.get("sort"), "sort")?,
            populate: names_arg(bundle.get("populate"), "populate")?.unwrap_or_default(),
            select: names_arg(bundle.get("select"), "select")?,
        };
        if let Some(names) = names_arg(populate, "populate")? {
            params.populate = names;
        }
        if let Some(fields) = names_arg(select, "select")? {
            params.select = Some(fields);
        }
        Ok(params)
    }

    fn from_positional(args: &[Value]) -> Result<Self, ServiceError> {
        if args.len() > MAX_POSITIONAL_ARGS {
            return Err(ServiceError::type_error(format!(
                "getAll accepts at most {MAX_POSITIONAL_ARGS} positional arguments, got {}",
                args.len()
            )));
        }
        Ok(Self {
            criteria: criteria_arg(args.first())?,
            skip: count_arg(args.get(1), "skip")?,
            limit: count_arg(args.get(2), "limit")?,
            pagination: flag_arg(args.get(3))?,
            sort: text_arg(args.get(4), "sort")?,
            populate: names_arg(args.get(5), "populate")?.unwrap_or_default(),
            select: names_arg(args.get(6), "select")?,
        })
    }
}

fn criteria_arg(value: Option<&Value>) -> Result<Option<Value>, ServiceError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v.clone())),
        Some(other) => Err(ServiceError::type_error(format!(
            "criteria must be an object or a parameter bundle, got {other}"
        ))),
    }
}

/// Non-negative integer given as a number or an integer string.
fn count_arg(value: Option<&Value>, name: &str) -> Result<Option<u64>, ServiceError> {
    let invalid = || ServiceError::type_error(format!("{name} must be a non-negative integer"));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(v), _) => Ok(Some(v)),
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as u64)),
            _ => Err(invalid()),
        },
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

fn flag_arg(value: Option<&Value>) -> Result<bool, ServiceError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s == "true" => Ok(true),
        Some(Value::String(s)) if s == "false" => Ok(false),
        Some(other) => Err(ServiceError::type_error(format!("pagination must be a boolean, got {other}"))),
    }
}

fn text_arg(value: Option<&Value>, name: &str) -> Result<Option<String>, ServiceError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ServiceError::type_error(format!("{name} must be a string, got {other}"))),
    }
}

/// A list of names: a JSON array of strings, or one string separated by
/// commas or whitespace.
fn names_arg(value: Option<&Value>, name: &str) -> Result<Option<Vec<String>>, ServiceError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(split_names(s))),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| ServiceError::type_error(format!("{name} entries must be strings")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(ServiceError::type_error(format!("{name} must be a list of names, got {other}"))),
    }
}

pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `"field,direction"`, splitting on the first comma. A missing
/// direction is passed through as `None`.
pub fn parse_sort(raw: &str) -> Result<Option<SortSpec>, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let (field, direction) = match raw.split_once(',') {
        Some((field, direction)) => (field.trim(), parse_direction(direction.trim())?),
        None => (raw, None),
    };
    if field.is_empty() {
        return Err(ServiceError::type_error("sort field must not be empty"));
    }
    Ok(Some(SortSpec::new(field, direction)))
}

fn parse_direction(token: &str) -> Result<Option<SortDirection>, ServiceError> {
    match token.to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "asc" | "ascending" => Ok(Some(SortDirection::Ascending)),
        "-1" | "desc" | "descending" => Ok(Some(SortDirection::Descending)),
        other => Err(ServiceError::type_error(format!("invalid sort direction {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_splits_on_first_comma() {
        assert_eq!(parse_sort("name,1").unwrap(), Some(SortSpec::ascending("name")));
        assert_eq!(parse_sort("createdOn,-1").unwrap(), Some(SortSpec::descending("createdOn")));
        assert_eq!(parse_sort("name,desc").unwrap(), Some(SortSpec::descending("name")));
        assert_eq!(parse_sort("name").unwrap(), Some(SortSpec::new("name", None)));
        assert_eq!(parse_sort("").unwrap(), None);
        assert!(matches!(parse_sort("name,up"), Err(ServiceError::TypeError(_))));
        assert!(matches!(parse_sort(",1"), Err(ServiceError::TypeError(_))));
    }

    #[test]
    fn bundle_shape_is_detected_by_numeric_limit() {
        let args = [
            json!({"criteria": {"name": "Bob"}, "skip": 10, "limit": 5, "pagination": true, "sort": "name,1", "user": {"id": "u"}}),
            json!(["team"]),
            json!("name email"),
        ];
        let p = QueryParameters::from_legacy_args(&args).unwrap();
        assert_eq!(p.criteria, Some(json!({"name": "Bob"})));
        assert_eq!((p.skip, p.limit), (Some(10), Some(5)));
        assert!(p.pagination);
        assert_eq!(p.sort.as_deref(), Some("name,1"));
        assert_eq!(p.populate, vec!["team"]);
        assert_eq!(p.select, Some(vec!["name".to_string(), "email".to_string()]));
    }

    #[test]
    fn positional_shape_accepts_integer_strings() {
        let args = [json!({"name": "Bob"}), json!("0"), json!("5"), json!(true), json!("name,-1")];
        let p = QueryParameters::from_legacy_args(&args).unwrap();
        assert_eq!(p.criteria, Some(json!({"name": "Bob"})));
        assert_eq!((p.skip, p.limit), (Some(0), Some(5)));
        assert!(p.pagination);
        assert_eq!(p.sort.as_deref(), Some("name,-1"));
        assert!(p.populate.is_empty());

        let empty = QueryParameters::from_legacy_args(&[]).unwrap();
        assert_eq!(empty, QueryParameters::default());
    }

    #[test]
    fn unrecognized_shapes_are_type_errors() {
        let non_numeric = [json!({"name": "Bob"}), json!("abc"), json!("ten")];
        assert!(matches!(QueryParameters::from_legacy_args(&non_numeric), Err(ServiceError::TypeError(_))));

        let bundle_with_text_limit = [json!({"criteria": {}, "limit": "x"})];
        assert!(QueryParameters::from_legacy_args(&bundle_with_text_limit).is_err());

        let scalar_criteria = [json!("name=Bob")];
        assert!(matches!(QueryParameters::from_legacy_args(&scalar_criteria), Err(ServiceError::TypeError(_))));

        let negative = [Value::Null, json!(-1)];
        assert!(QueryParameters::from_legacy_args(&negative).is_err());

        let too_many: Vec<Value> = (0..8).map(|_| Value::Null).collect();
        assert!(QueryParameters::from_legacy_args(&too_many).is_err());
    }

    #[test]
    fn builder_and_serde_defaults_agree() {
        let built = QueryParameters::new().limit(10).paginate(true).populate("team");
        let parsed: QueryParameters = serde_json::from_value(json!({"limit": 10, "pagination": true, "populate": ["team"]})).unwrap();
        assert_eq!(built, parsed);
    }
}
