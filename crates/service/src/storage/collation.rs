//! Value ordering used by sorts and range operators.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseFirst {
    #[default]
    Lower,
    Upper,
    Off,
}

/// String comparison rule. With a collation, strings compare
/// case-insensitively and `case_first` only breaks case-only ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collation {
    pub locale: String,
    pub case_first: CaseFirst,
}

impl Collation {
    /// `{ locale: "en", caseFirst: "lower" }`
    pub fn english_lower_first() -> Self {
        Self { locale: "en".into(), case_first: CaseFirst::Lower }
    }

    pub fn compare_str(&self, a: &str, b: &str) -> Ordering {
        let folded = a.to_lowercase().cmp(&b.to_lowercase());
        if folded != Ordering::Equal {
            return folded;
        }
        match self.case_first {
            CaseFirst::Off => a.cmp(b),
            CaseFirst::Lower => case_tiebreak(a, b),
            CaseFirst::Upper => case_tiebreak(a, b).reverse(),
        }
    }
}

impl Default for Collation {
    fn default() -> Self {
        Self::english_lower_first()
    }
}

// first position where the case differs decides; lowercase wins
fn case_tiebreak(a: &str, b: &str) -> Ordering {
    for (x, y) in a.chars().zip(b.chars()) {
        if x == y {
            continue;
        }
        match (x.is_lowercase(), y.is_lowercase()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => return x.cmp(&y),
        }
    }
    a.len().cmp(&b.len())
}

fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over (possibly missing) JSON values.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>, collation: Option<&Collation>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => match collation {
            Some(c) => c.compare_str(x, y),
            None => x.cmp(y),
        },
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(Some(l), Some(r), collation);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Some(Value::Object(x)), Some(Value::Object(y))) => {
            for ((kl, vl), (kr, vr)) in x.iter().zip(y.iter()) {
                let ord = kl.cmp(kr).then_with(|| compare_values(Some(vl), Some(vr), collation));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn english_collation_ignores_case_first() {
        let c = Collation::english_lower_first();
        let mut names = vec!["Bob", "alice", "Carol"];
        names.sort_by(|a, b| c.compare_str(a, b));
        assert_eq!(names, vec!["alice", "Bob", "Carol"]);
    }

    #[test]
    fn case_only_ties_put_lowercase_first() {
        let c = Collation::english_lower_first();
        assert_eq!(c.compare_str("bob", "Bob"), Ordering::Less);
        let upper = Collation { case_first: CaseFirst::Upper, ..c };
        assert_eq!(upper.compare_str("bob", "Bob"), Ordering::Greater);
    }

    #[test]
    fn binary_order_without_collation() {
        assert_eq!(
            compare_values(Some(&json!("Bob")), Some(&json!("alice")), None),
            Ordering::Less
        );
    }

    #[test]
    fn missing_sorts_before_numbers_before_strings() {
        assert_eq!(compare_values(None, Some(&json!(1)), None), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(10)), Some(&json!("a")), None), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2.5)), Some(&json!(10)), None), Ordering::Less);
        assert_eq!(compare_values(Some(&Value::Null), None, None), Ordering::Equal);
    }
}
