//! Query Types - Where conditions and ordering directions

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use crate::model::Element;
use crate::relationships::DictionaryKey;

use super::ordering::compare_values;

/// Comparison operators for single-value conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl QueryOperator {
    /// Evaluate the operator against the outcome of a comparison
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            QueryOperator::Equal => ordering == Ordering::Equal,
            QueryOperator::NotEqual => ordering != Ordering::Equal,
            QueryOperator::GreaterThan => ordering == Ordering::Greater,
            QueryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            QueryOperator::LessThan => ordering == Ordering::Less,
            QueryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One filter applied to candidate records.
///
/// Set membership is tested on encoded keys, so values only match when
/// both type and content agree: the number `1` does not match the string
/// `"1"`.
#[derive(Debug, Clone)]
pub enum WhereCondition {
    /// Compare a field with a single value
    Compare {
        column: String,
        operator: QueryOperator,
        value: Value,
    },
    /// Field equals one of a set of values
    In {
        column: String,
        keys: HashSet<DictionaryKey>,
    },
    /// Field equals none of a set of values
    NotIn {
        column: String,
        keys: HashSet<DictionaryKey>,
    },
    /// The tuple of fields equals one of a set of tuples
    TupleIn {
        columns: Vec<String>,
        keys: HashSet<DictionaryKey>,
    },
    /// Array field holds at least one of a set of values
    ContainsAny {
        column: String,
        keys: HashSet<DictionaryKey>,
    },
    /// Field is missing or null
    Null { column: String },
    /// Field is present and not null
    NotNull { column: String },
}

impl WhereCondition {
    /// Test a record against the condition
    pub fn matches(&self, record: &Element) -> bool {
        match self {
            WhereCondition::Compare {
                column,
                operator,
                value,
            } => {
                let field = record.get(column).unwrap_or(&Value::Null);
                match (field, value) {
                    // Only equality tests are meaningful against null.
                    (Value::Null, _) | (_, Value::Null)
                        if !matches!(operator, QueryOperator::Equal | QueryOperator::NotEqual) =>
                    {
                        false
                    }
                    _ => operator.accepts(compare_values(field, value)),
                }
            }
            WhereCondition::In { column, keys } => record
                .get(column)
                .filter(|value| !value.is_null())
                .map_or(false, |value| keys.contains(&DictionaryKey::from_value(value))),
            WhereCondition::NotIn { column, keys } => !record
                .get(column)
                .filter(|value| !value.is_null())
                .map_or(false, |value| keys.contains(&DictionaryKey::from_value(value))),
            WhereCondition::TupleIn { columns, keys } => {
                let mut parts = Vec::with_capacity(columns.len());
                for column in columns {
                    match record.get(column) {
                        None | Some(Value::Null) => return false,
                        Some(value) => parts.push(value.clone()),
                    }
                }
                keys.contains(&DictionaryKey::encode(&parts))
            }
            WhereCondition::ContainsAny { column, keys } => match record.get(column) {
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| keys.contains(&DictionaryKey::from_value(item))),
                _ => false,
            },
            WhereCondition::Null { column } => {
                record.get(column).map_or(true, Value::is_null)
            }
            WhereCondition::NotNull { column } => {
                record.get(column).map_or(false, |value| !value.is_null())
            }
        }
    }
}
