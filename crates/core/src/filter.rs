//! Metadata filter expressions for retrieval calls
//!
//! Filters restrict retrieval to passages whose metadata satisfies an
//! equality, range, set or prefix condition, combined with `and_all` /
//! `or_all`. They serialize to the knowledge-base backend's native shape:
//!
//! ```json
//! {"andAll": [
//!   {"equals": {"key": "marketplace", "value": "US"}},
//!   {"greaterThanOrEquals": {"key": "year", "value": 2024}}
//! ]}
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A metadata key and the value it is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterAttribute {
    pub key: String,
    pub value: Value,
}

/// Metadata filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RetrievalFilter {
    Equals(FilterAttribute),
    NotEquals(FilterAttribute),
    GreaterThan(FilterAttribute),
    GreaterThanOrEquals(FilterAttribute),
    LessThan(FilterAttribute),
    LessThanOrEquals(FilterAttribute),
    /// `value` must be an array
    In(FilterAttribute),
    /// `value` must be an array
    NotIn(FilterAttribute),
    StartsWith(FilterAttribute),
    AndAll(Vec<RetrievalFilter>),
    OrAll(Vec<RetrievalFilter>),
}

fn attribute(key: impl Into<String>, value: impl Into<Value>) -> FilterAttribute {
    FilterAttribute {
        key: key.into(),
        value: value.into(),
    }
}

impl RetrievalFilter {
    pub fn equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals(attribute(key, value))
    }

    pub fn not_equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::NotEquals(attribute(key, value))
    }

    pub fn greater_than(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::GreaterThan(attribute(key, value))
    }

    pub fn greater_than_or_equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::GreaterThanOrEquals(attribute(key, value))
    }

    pub fn less_than(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LessThan(attribute(key, value))
    }

    pub fn less_than_or_equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LessThanOrEquals(attribute(key, value))
    }

    pub fn in_set<V: Into<Value>>(key: impl Into<String>, values: Vec<V>) -> Self {
        Self::In(attribute(
            key,
            Value::Array(values.into_iter().map(Into::into).collect()),
        ))
    }

    pub fn not_in_set<V: Into<Value>>(key: impl Into<String>, values: Vec<V>) -> Self {
        Self::NotIn(attribute(
            key,
            Value::Array(values.into_iter().map(Into::into).collect()),
        ))
    }

    pub fn starts_with(key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::StartsWith(attribute(key, prefix.into()))
    }

    pub fn and_all(filters: Vec<RetrievalFilter>) -> Self {
        Self::AndAll(filters)
    }

    pub fn or_all(filters: Vec<RetrievalFilter>) -> Self {
        Self::OrAll(filters)
    }

    /// Check the expression is one the backend will accept.
    ///
    /// Set operators need an array value, range operators a number, and
    /// `and_all` / `or_all` at least two members.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Equals(attr) | Self::NotEquals(attr) => check_key(attr),
            Self::GreaterThan(attr)
            | Self::GreaterThanOrEquals(attr)
            | Self::LessThan(attr)
            | Self::LessThanOrEquals(attr) => {
                check_key(attr)?;
                if !attr.value.is_number() {
                    return Err(Error::invalid_input(format!(
                        "Range filter on '{}' requires a numeric value",
                        attr.key
                    )));
                }
                Ok(())
            }
            Self::In(attr) | Self::NotIn(attr) => {
                check_key(attr)?;
                match &attr.value {
                    Value::Array(values) if !values.is_empty() => Ok(()),
                    _ => Err(Error::invalid_input(format!(
                        "Set filter on '{}' requires a non-empty array value",
                        attr.key
                    ))),
                }
            }
            Self::StartsWith(attr) => {
                check_key(attr)?;
                if !attr.value.is_string() {
                    return Err(Error::invalid_input(format!(
                        "startsWith filter on '{}' requires a string value",
                        attr.key
                    )));
                }
                Ok(())
            }
            Self::AndAll(members) | Self::OrAll(members) => {
                if members.len() < 2 {
                    return Err(Error::invalid_input(
                        "andAll/orAll filters require at least two members",
                    ));
                }
                members.iter().try_for_each(RetrievalFilter::validate)
            }
        }
    }
}

fn check_key(attr: &FilterAttribute) -> Result<()> {
    if attr.key.trim().is_empty() {
        return Err(Error::invalid_input("Filter key cannot be empty"));
    }
    Ok(())
}
