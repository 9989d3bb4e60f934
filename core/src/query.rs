//! Absolute request URL construction.
//!
//! `build_url` merges query parameters into a base address. A parameter whose
//! name already appears in the base replaces it, so the result never carries
//! the same key twice.

use std::fmt;

use url::Url;

use crate::error::Result;

/// Scalar value accepted as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::Int(n) => write!(f, "{n}"),
            QueryValue::Float(x) => write!(f, "{x}"),
            QueryValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Str(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

/// Ordered list of query parameters for one request.
pub type Query = Vec<(&'static str, QueryValue)>;

/// Merge `params` into the query string of `base`. Last write wins.
pub fn build_url(base: &str, params: &[(&str, QueryValue)]) -> Result<String> {
    let mut url = Url::parse(base)?;
    if params.is_empty() {
        return Ok(url.into());
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (name, value) in params {
        let value = value.to_string();
        match pairs.iter().position(|(key, _)| key == name) {
            Some(first) => {
                pairs[first].1 = value;
                let mut index = 0;
                pairs.retain(|(key, _)| {
                    let keep = index <= first || key != name;
                    index += 1;
                    keep
                });
            }
            None => pairs.push((name.to_string(), value)),
        }
    }

    url.query_pairs_mut().clear().extend_pairs(&pairs);
    Ok(url.into())
}

/// Add each of `defaults` to `base` only if its name is not already present.
pub fn fill_missing(base: &str, defaults: &[(&str, QueryValue)]) -> Result<String> {
    let url = Url::parse(base)?;
    let missing: Vec<(&str, QueryValue)> = defaults
        .iter()
        .filter(|(name, _)| !url.query_pairs().any(|(key, _)| key == *name))
        .cloned()
        .collect();
    build_url(url.as_str(), &missing)
}
