//! Where-filter expressions.
//!
//! A filter is either a leaf predicate `{path, operator, value}` or a
//! compound `And`/`Or` node over other filters. Evaluation happens on the
//! server; this module only validates and renders the tree.

use crate::error::{QueryError, QueryResult};
use crate::graphql;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Filter operator vocabulary understood by the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    /// Wildcard match (`*` and `?`)
    Like,
    IsNull,
    ContainsAny,
    ContainsAll,
    And,
    Or,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "Equal",
            FilterOperator::NotEqual => "NotEqual",
            FilterOperator::GreaterThan => "GreaterThan",
            FilterOperator::GreaterThanEqual => "GreaterThanEqual",
            FilterOperator::LessThan => "LessThan",
            FilterOperator::LessThanEqual => "LessThanEqual",
            FilterOperator::Like => "Like",
            FilterOperator::IsNull => "IsNull",
            FilterOperator::ContainsAny => "ContainsAny",
            FilterOperator::ContainsAll => "ContainsAll",
            FilterOperator::And => "And",
            FilterOperator::Or => "Or",
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, FilterOperator::And | FilterOperator::Or)
    }

    fn is_contains(&self) -> bool {
        matches!(self, FilterOperator::ContainsAny | FilterOperator::ContainsAll)
    }
}

/// Typed comparison value. The variant picks the `value*` argument name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Text(String),
    String(String),
    Int(i64),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    TextArray(Vec<String>),
    IntArray(Vec<i64>),
    NumberArray(Vec<f64>),
    BooleanArray(Vec<bool>),
}

impl FilterValue {
    fn arg_name(&self) -> &'static str {
        match self {
            FilterValue::Text(_) | FilterValue::TextArray(_) => "valueText",
            FilterValue::String(_) => "valueString",
            FilterValue::Int(_) | FilterValue::IntArray(_) => "valueInt",
            FilterValue::Number(_) | FilterValue::NumberArray(_) => "valueNumber",
            FilterValue::Boolean(_) | FilterValue::BooleanArray(_) => "valueBoolean",
            FilterValue::Date(_) => "valueDate",
        }
    }

    fn is_array(&self) -> bool {
        matches!(
            self,
            FilterValue::TextArray(_)
                | FilterValue::IntArray(_)
                | FilterValue::NumberArray(_)
                | FilterValue::BooleanArray(_)
        )
    }

    fn render(&self) -> String {
        fn list<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
            format!("[{}]", items.iter().map(f).collect::<Vec<_>>().join(","))
        }
        match self {
            FilterValue::Text(s) | FilterValue::String(s) => graphql::quote(s),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Number(n) => graphql::float(*n),
            FilterValue::Boolean(b) => b.to_string(),
            FilterValue::Date(d) => graphql::quote(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            FilterValue::TextArray(v) => graphql::quote_list(v),
            FilterValue::IntArray(v) => list(v, |i| i.to_string()),
            FilterValue::NumberArray(v) => list(v, |n| graphql::float(*n)),
            FilterValue::BooleanArray(v) => list(v, |b| b.to_string()),
        }
    }

    fn has_non_finite(&self) -> bool {
        match self {
            FilterValue::Number(n) => !n.is_finite(),
            FilterValue::NumberArray(v) => v.iter().any(|n| !n.is_finite()),
            _ => false,
        }
    }
}

/// Where-filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereFilter {
    Predicate {
        path: Vec<String>,
        operator: FilterOperator,
        value: FilterValue,
    },
    Compound {
        operator: FilterOperator,
        operands: Vec<WhereFilter>,
    },
}

impl WhereFilter {
    /// Start a leaf predicate on `path`.
    pub fn path<I, S>(path: I) -> PredicateBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PredicateBuilder {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and<I: IntoIterator<Item = WhereFilter>>(operands: I) -> Self {
        WhereFilter::Compound {
            operator: FilterOperator::And,
            operands: operands.into_iter().collect(),
        }
    }

    pub fn or<I: IntoIterator<Item = WhereFilter>>(operands: I) -> Self {
        WhereFilter::Compound {
            operator: FilterOperator::Or,
            operands: operands.into_iter().collect(),
        }
    }

    pub fn operator(&self) -> FilterOperator {
        match self {
            WhereFilter::Predicate { operator, .. } | WhereFilter::Compound { operator, .. } => {
                *operator
            }
        }
    }

    pub fn validate(&self) -> QueryResult<()> {
        match self {
            WhereFilter::Predicate {
                path,
                operator,
                value,
            } => {
                if path.is_empty() || path.iter().any(|p| p.trim().is_empty()) {
                    return Err(QueryError::invalid("where.path", "path must not be empty"));
                }
                if operator.is_logical() {
                    return Err(QueryError::invalid(
                        "where.operator",
                        format!("{} needs operands, not a value", operator.as_str()),
                    ));
                }
                if operator.is_contains() && !value.is_array() {
                    return Err(QueryError::invalid(
                        "where.value",
                        format!("{} requires an array value", operator.as_str()),
                    ));
                }
                if !operator.is_contains() && value.is_array() {
                    return Err(QueryError::invalid(
                        "where.value",
                        format!("{} does not accept an array value", operator.as_str()),
                    ));
                }
                if *operator == FilterOperator::IsNull && !matches!(value, FilterValue::Boolean(_)) {
                    return Err(QueryError::invalid(
                        "where.value",
                        "IsNull requires a boolean value",
                    ));
                }
                if value.has_non_finite() {
                    return Err(QueryError::invalid("where.value", "number must be finite"));
                }
                Ok(())
            }
            WhereFilter::Compound { operator, operands } => {
                if !operator.is_logical() {
                    return Err(QueryError::invalid(
                        "where.operator",
                        format!("{} cannot combine operands", operator.as_str()),
                    ));
                }
                if operands.is_empty() {
                    return Err(QueryError::invalid(
                        "where.operands",
                        format!("{} needs at least one operand", operator.as_str()),
                    ));
                }
                operands.iter().try_for_each(WhereFilter::validate)
            }
        }
    }

    /// Render the filter object body, e.g.
    /// `{operator:Equal path:["round"] valueText:"Double Jeopardy!"}`.
    pub fn render(&self) -> String {
        match self {
            WhereFilter::Predicate {
                path,
                operator,
                value,
            } => format!(
                "{{operator:{} path:{} {}:{}}}",
                operator.as_str(),
                graphql::quote_list(path),
                value.arg_name(),
                value.render()
            ),
            WhereFilter::Compound { operator, operands } => format!(
                "{{operator:{} operands:[{}]}}",
                operator.as_str(),
                operands
                    .iter()
                    .map(WhereFilter::render)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

/// Intermediate step of [`WhereFilter::path`].
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    path: Vec<String>,
}

impl PredicateBuilder {
    pub fn op(self, operator: FilterOperator, value: FilterValue) -> WhereFilter {
        WhereFilter::Predicate {
            path: self.path,
            operator,
            value,
        }
    }

    pub fn equal(self, value: FilterValue) -> WhereFilter {
        self.op(FilterOperator::Equal, value)
    }

    pub fn not_equal(self, value: FilterValue) -> WhereFilter {
        self.op(FilterOperator::NotEqual, value)
    }

    pub fn greater_than(self, value: FilterValue) -> WhereFilter {
        self.op(FilterOperator::GreaterThan, value)
    }

    pub fn less_than(self, value: FilterValue) -> WhereFilter {
        self.op(FilterOperator::LessThan, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> WhereFilter {
        self.op(FilterOperator::Like, FilterValue::Text(pattern.into()))
    }

    pub fn is_null(self, is_null: bool) -> WhereFilter {
        self.op(FilterOperator::IsNull, FilterValue::Boolean(is_null))
    }
}
