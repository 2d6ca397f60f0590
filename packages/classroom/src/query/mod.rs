//! Composable query descriptions for sub-repositories.
//!
//! A [`Query`] is an immutable value: a predicate tree, an ordering list, a
//! limit and an opaque continuation cursor. Building one performs no I/O;
//! the sub-repository that receives it is responsible for evaluating it.
//! Building the same inputs twice yields structurally equal descriptions.

use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;

use crate::common::EntityId;
use crate::entity::EntityTag;

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gte,
    In,
}

/// Predicate tree over the JSON projection of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Where {
        field: String,
        op: Operator,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One ordering criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

/// An immutable query description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub predicate: Option<Predicate>,
    pub order_by: Vec<Ordering>,
    pub limit: Option<usize>,
    /// Opaque continuation token, decoded by the sub-repository.
    pub cursor: Option<String>,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }
}

/// Builder for [`Query`]. Pure value construction, no I/O.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    predicate: Option<Predicate>,
    order_by: Vec<Ordering>,
    limit: Option<usize>,
    cursor: Option<String>,
}

impl QueryBuilder {
    /// Set the predicate tree. Combine leaves with [`and`] / [`or`].
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(Ordering {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn build(self) -> Query {
        Query {
            predicate: self.predicate,
            order_by: self.order_by,
            limit: self.limit,
            cursor: self.cursor,
        }
    }
}

// ============================================================================
// Predicate constructors
// ============================================================================

/// Values accepted by predicate constructors.
///
/// Everything the domain filters on (ids, tags, strings, numbers) converts
/// infallibly; no fallible serialization at query-build time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryValue(Value);

impl From<EntityId> for QueryValue {
    fn from(id: EntityId) -> Self {
        QueryValue(Value::String(id.to_string()))
    }
}

impl From<EntityTag> for QueryValue {
    fn from(tag: EntityTag) -> Self {
        // Tags are plain enums; their serde form is a string.
        QueryValue(serde_json::to_value(tag).unwrap_or(Value::Null))
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue(Value::String(s.to_string()))
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue(Value::String(s))
    }
}

impl From<f64> for QueryValue {
    fn from(n: f64) -> Self {
        QueryValue(serde_json::json!(n))
    }
}

impl From<i64> for QueryValue {
    fn from(n: i64) -> Self {
        QueryValue(serde_json::json!(n))
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue(Value::Bool(b))
    }
}

impl From<chrono::DateTime<chrono::Utc>> for QueryValue {
    fn from(ts: chrono::DateTime<chrono::Utc>) -> Self {
        QueryValue(serde_json::to_value(ts).unwrap_or(Value::Null))
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(items: Vec<T>) -> Self {
        QueryValue(Value::Array(
            items.into_iter().map(|i| i.into().0).collect(),
        ))
    }
}

/// `field == value`
pub fn where_eq(field: impl Into<String>, value: impl Into<QueryValue>) -> Predicate {
    Predicate::Where {
        field: field.into(),
        op: Operator::Eq,
        value: value.into().0,
    }
}

/// `field >= value`
pub fn where_gte(field: impl Into<String>, value: impl Into<QueryValue>) -> Predicate {
    Predicate::Where {
        field: field.into(),
        op: Operator::Gte,
        value: value.into().0,
    }
}

/// `field in values`
pub fn where_in(field: impl Into<String>, values: impl Into<QueryValue>) -> Predicate {
    Predicate::Where {
        field: field.into(),
        op: Operator::In,
        value: values.into().0,
    }
}

pub fn and(predicates: Vec<Predicate>) -> Predicate {
    Predicate::And(predicates)
}

pub fn or(predicates: Vec<Predicate>) -> Predicate {
    Predicate::Or(predicates)
}

// ============================================================================
// Evaluation
// ============================================================================

/// Resolve a dotted field path (`props.source_id`) inside a JSON projection.
pub fn field_at<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Loose scalar equality: numbers compare numerically (`120 == 120.0`),
/// everything else compares structurally.
fn values_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Whether two values are of the same comparable scalar kind.
fn comparable(a: &Value, b: &Value) -> bool {
    (a.is_number() && b.is_number())
        || (a.is_string() && b.is_string())
        || (a.is_boolean() && b.is_boolean())
}

/// Total-enough ordering over the scalar values the graph filters on.
/// Incomparable values sort as equal.
pub fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let x = a.as_f64().unwrap_or(0.0);
            let y = b.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => CmpOrdering::Equal,
    }
}

impl Predicate {
    /// Evaluate this predicate against the JSON projection of an entity.
    pub fn matches(&self, entity: &Value) -> bool {
        match self {
            Predicate::Where { field, op, value } => {
                let Some(actual) = field_at(entity, field) else {
                    return false;
                };
                match op {
                    Operator::Eq => values_eq(actual, value),
                    Operator::Gte => {
                        comparable(actual, value)
                            && compare_values(actual, value) != CmpOrdering::Less
                    }
                    Operator::In => value
                        .as_array()
                        .map(|candidates| candidates.iter().any(|c| values_eq(actual, c)))
                        .unwrap_or(false),
                }
            }
            Predicate::And(children) => children.iter().all(|p| p.matches(entity)),
            Predicate::Or(children) => children.iter().any(|p| p.matches(entity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "tag": "ownership",
            "meta": { "created_at": "2026-03-01T10:00:00Z" },
            "props": {
                "source_id": "u1",
                "target_id": "a1",
                "target_type": "audio",
                "priority": 5,
            }
        })
    }

    #[test]
    fn test_same_inputs_build_equal_queries() {
        let build = || {
            Query::builder()
                .filter(and(vec![
                    where_eq("props.source_id", "u1"),
                    where_gte("props.priority", 3i64),
                ]))
                .order_by("meta.created_at", Direction::Desc)
                .limit(10)
                .build()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_where_eq_matches() {
        assert!(where_eq("props.source_id", "u1").matches(&sample()));
        assert!(!where_eq("props.source_id", "u2").matches(&sample()));
    }

    #[test]
    fn test_missing_field_never_matches() {
        assert!(!where_eq("props.nonexistent", "x").matches(&sample()));
    }

    #[test]
    fn test_numeric_eq_is_loose() {
        assert!(where_eq("props.priority", 5.0).matches(&sample()));
    }

    #[test]
    fn test_gte() {
        assert!(where_gte("props.priority", 5i64).matches(&sample()));
        assert!(where_gte("props.priority", 4i64).matches(&sample()));
        assert!(!where_gte("props.priority", 6i64).matches(&sample()));
    }

    #[test]
    fn test_gte_on_timestamps_compares_rfc3339_strings() {
        assert!(where_gte("meta.created_at", "2026-03-01T00:00:00Z").matches(&sample()));
        assert!(!where_gte("meta.created_at", "2026-03-02T00:00:00Z").matches(&sample()));
    }

    #[test]
    fn test_in() {
        assert!(where_in("props.target_type", vec!["audio", "message"]).matches(&sample()));
        assert!(!where_in("props.target_type", vec!["classroom"]).matches(&sample()));
    }

    #[test]
    fn test_and_or_composition() {
        let p = and(vec![
            where_eq("props.source_id", "u1"),
            or(vec![
                where_eq("props.target_type", "classroom"),
                where_eq("props.target_type", "audio"),
            ]),
        ]);
        assert!(p.matches(&sample()));

        let p = and(vec![
            where_eq("props.source_id", "u1"),
            where_eq("props.target_type", "classroom"),
        ]);
        assert!(!p.matches(&sample()));
    }
}
