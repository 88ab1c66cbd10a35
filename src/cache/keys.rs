//! Cache key derivation.
//!
//! A key is `"{namespace}:{kind}:{params}"` where `params` is a JSON object whose members are
//! emitted in name order. Parameter insertion order, alias spelling, and map iteration order
//! therefore never reach the key.

use std::fmt;

use serde_json::Value;

use crate::domain::{ParamValue, QueryKind, QueryParams, QueryRequest, ValidationError};

pub const DEFAULT_NAMESPACE: &str = "qcache";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: String,
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl CacheKeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix shared by every key this builder produces.
    pub fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    pub fn key_for(&self, request: &QueryRequest) -> CacheKey {
        CacheKey(format!(
            "{}:{}:{}",
            self.namespace,
            request.kind().as_str(),
            canonical_params(&request.params())
        ))
    }

    /// Validate `params` against `kind` and derive its key.
    pub fn build(&self, kind: QueryKind, params: &QueryParams) -> Result<CacheKey, ValidationError> {
        let request = QueryRequest::from_params(kind, params)?;
        Ok(self.key_for(&request))
    }
}

fn canonical_params(params: &QueryParams) -> String {
    let object: serde_json::Map<String, Value> = params
        .iter()
        .map(|(name, value)| (name.to_string(), param_json(value)))
        .collect();
    Value::Object(object).to_string()
}

fn param_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Integer(value) => Value::from(*value),
        ParamValue::Float(value) => Value::from(*value),
        ParamValue::Text(value) => Value::from(value.as_str()),
    }
}
