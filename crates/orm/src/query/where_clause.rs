//! Query WHERE clause operations

use serde_json::Value;

use crate::relationships::DictionaryKey;

use super::builder::Query;
use super::types::{QueryOperator, WhereCondition};

impl Query {
    fn compare<T: Into<Value>>(mut self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.where_conditions.push(WhereCondition::Compare {
            column: column.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::Equal, value)
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::NotEqual, value)
    }

    /// Add WHERE condition with greater than
    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::GreaterThan, value)
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::GreaterThanOrEqual, value)
    }

    /// Add WHERE condition with less than
    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::LessThan, value)
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::LessThanOrEqual, value)
    }

    /// Add WHERE IN condition
    pub fn where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_conditions.push(WhereCondition::In {
            column: column.to_string(),
            keys: values
                .into_iter()
                .map(|value| DictionaryKey::from_value(&value.into()))
                .collect(),
        });
        self
    }

    /// Add WHERE NOT IN condition
    pub fn where_not_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_conditions.push(WhereCondition::NotIn {
            column: column.to_string(),
            keys: values
                .into_iter()
                .map(|value| DictionaryKey::from_value(&value.into()))
                .collect(),
        });
        self
    }

    /// Add a tuple WHERE IN condition: a record matches when its `columns`,
    /// read together, equal one of `tuples`
    pub fn where_tuple_in<S: AsRef<str>>(mut self, columns: &[S], tuples: Vec<Vec<Value>>) -> Self {
        self.where_conditions.push(WhereCondition::TupleIn {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            keys: tuples.iter().map(|tuple| DictionaryKey::encode(tuple)).collect(),
        });
        self
    }

    /// Add a condition on an array column holding at least one of `values`
    pub fn where_contains_any<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_conditions.push(WhereCondition::ContainsAny {
            column: column.to_string(),
            keys: values
                .into_iter()
                .map(|value| DictionaryKey::from_value(&value.into()))
                .collect(),
        });
        self
    }

    /// Add WHERE IS NULL condition
    pub fn where_null(mut self, column: &str) -> Self {
        self.where_conditions.push(WhereCondition::Null {
            column: column.to_string(),
        });
        self
    }

    /// Add WHERE IS NOT NULL condition
    pub fn where_not_null(mut self, column: &str) -> Self {
        self.where_conditions.push(WhereCondition::NotNull {
            column: column.to_string(),
        });
        self
    }
}
