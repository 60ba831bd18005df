//! Query ORDER BY, LIMIT and OFFSET operations

use serde_json::Value;
use std::cmp::Ordering;

use crate::model::Element;

use super::builder::Query;
use super::types::OrderDirection;

impl Query {
    /// Add ORDER BY clause (ascending)
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Desc));
        self
    }

    /// Keep at most `count` records
    pub fn limit(mut self, count: usize) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Skip the first `count` records
    pub fn offset(mut self, count: usize) -> Self {
        self.offset_value = Some(count);
        self
    }

    /// Compare two records by the ORDER BY clauses, in declaration order
    pub(crate) fn compare_records(&self, left: &Element, right: &Element) -> Ordering {
        for (column, direction) in &self.order_by {
            let left = left.get(column).unwrap_or(&Value::Null);
            let right = right.get(column).unwrap_or(&Value::Null);
            let ordering = match direction {
                OrderDirection::Asc => compare_values(left, right),
                OrderDirection::Desc => compare_values(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Total order over JSON values: null, booleans, numbers, strings, arrays,
/// objects. Values of the same kind compare by content.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(_), Value::Object(_)) => left.to_string().cmp(&right.to_string()),
        _ => rank(left).cmp(&rank(right)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_values_across_kinds() {
        assert_eq!(compare_values(&json!(null), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(1), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 2, 0])), Ordering::Less);
    }
}
