//! Query kinds, their parameter schemas, and validated query requests.
//!
//! Callers hand in a loosely-typed parameter mapping; [`QueryRequest::from_params`] checks it
//! against the kind's schema and produces a tagged variant. Nothing past this boundary coerces
//! types again.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Upper bound for `StartNetCount::count`.
pub const MAX_RESULT_COUNT: u32 = 10_000;
/// Upper bound for the length of a network code.
pub const MAX_NET_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    TimeRange,
    StartNetCount,
}

impl QueryKind {
    pub const ALL: [QueryKind; 2] = [QueryKind::TimeRange, QueryKind::StartNetCount];

    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::TimeRange => "time_range",
            QueryKind::StartNetCount => "start_net_count",
        }
    }

    /// Dense index used by per-kind counter arrays.
    pub fn index(self) -> usize {
        match self {
            QueryKind::TimeRange => 0,
            QueryKind::StartNetCount => 1,
        }
    }

    fn schema(self) -> &'static [ParamSpec] {
        match self {
            QueryKind::TimeRange => TIME_RANGE_SCHEMA,
            QueryKind::StartNetCount => START_NET_COUNT_SCHEMA,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "time_range" => Ok(QueryKind::TimeRange),
            "start_net_count" => Ok(QueryKind::StartNetCount),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Float,
    Text,
}

impl ParamType {
    fn describe(self) -> &'static str {
        match self {
            ParamType::Integer => "an integer",
            ParamType::Float => "a number",
            ParamType::Text => "a string",
        }
    }
}

struct ParamSpec {
    name: &'static str,
    ty: ParamType,
    aliases: &'static [&'static str],
}

const TIME_RANGE_SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "min_time",
        ty: ParamType::Integer,
        aliases: &["min"],
    },
    ParamSpec {
        name: "max_time",
        ty: ParamType::Integer,
        aliases: &["max"],
    },
];

const START_NET_COUNT_SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "start_time",
        ty: ParamType::Integer,
        aliases: &["start"],
    },
    ParamSpec {
        name: "net",
        ty: ParamType::Text,
        aliases: &["filter"],
    },
    ParamSpec {
        name: "count",
        ty: ParamType::Integer,
        aliases: &["limit"],
    },
];

/// A single named parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Text(_) => ParamType::Text,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Parameter mapping with unique names. Iteration is always sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, rejecting repeated names.
    pub fn try_from_pairs<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut params = Self::new();
        for (name, value) in pairs {
            params.insert(name, value)?;
        }
        Ok(params)
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<(), ValidationError> {
        let name = name.into();
        if self.0.contains_key(&name) {
            return Err(ValidationError::DuplicateParameter { name });
        }
        self.0.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Coerce a JSON object into the schema of `kind`.
    ///
    /// Aliases resolve to canonical names; integers may arrive as numeric strings. Keys that
    /// match nothing in the schema are rejected.
    pub fn from_json(kind: QueryKind, object: &JsonObject) -> Result<Self, ValidationError> {
        let mut params = Self::new();
        for (key, value) in object {
            let spec = kind
                .schema()
                .iter()
                .find(|spec| spec.name == key || spec.aliases.contains(&key.as_str()))
                .ok_or_else(|| ValidationError::UnknownParameter {
                    kind,
                    name: key.clone(),
                })?;
            let coerced = coerce_json(spec, value)?;
            params.insert(spec.name, coerced)?;
        }
        Ok(params)
    }
}

fn coerce_json(spec: &ParamSpec, value: &serde_json::Value) -> Result<ParamValue, ValidationError> {
    use serde_json::Value;

    let mismatch = || ValidationError::wrong_type(spec.name, spec.ty.describe());
    match (spec.ty, value) {
        (ParamType::Integer, Value::Number(number)) => {
            number.as_i64().map(ParamValue::Integer).ok_or_else(mismatch)
        }
        (ParamType::Integer, Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map(ParamValue::Integer)
            .map_err(|_| mismatch()),
        (ParamType::Float, Value::Number(number)) => {
            number.as_f64().map(ParamValue::Float).ok_or_else(mismatch)
        }
        (ParamType::Float, Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(ParamValue::Float)
            .ok_or_else(mismatch),
        (ParamType::Text, Value::String(text)) => Ok(ParamValue::Text(text.trim().to_string())),
        _ => Err(mismatch()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    min_time: i64,
    max_time: i64,
}

impl TimeRange {
    pub fn min_time(&self) -> i64 {
        self.min_time
    }

    pub fn max_time(&self) -> i64 {
        self.max_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartNetCount {
    start_time: i64,
    net: String,
    count: u32,
}

impl StartNetCount {
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn net(&self) -> &str {
        &self.net
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// A validated query. Construct through [`QueryRequest::from_params`] or the typed helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    TimeRange(TimeRange),
    StartNetCount(StartNetCount),
}

impl QueryRequest {
    pub fn time_range(min_time: i64, max_time: i64) -> Result<Self, ValidationError> {
        if min_time > max_time {
            return Err(ValidationError::out_of_range(
                "min_time",
                format!("min_time ({min_time}) exceeds max_time ({max_time})"),
            ));
        }
        Ok(QueryRequest::TimeRange(TimeRange { min_time, max_time }))
    }

    pub fn start_net_count(
        start_time: i64,
        net: impl Into<String>,
        count: i64,
    ) -> Result<Self, ValidationError> {
        let net = net.into().trim().to_string();
        if net.is_empty() {
            return Err(ValidationError::out_of_range("net", "must not be empty"));
        }
        if net.chars().count() > MAX_NET_LEN {
            return Err(ValidationError::out_of_range(
                "net",
                format!("must be at most {MAX_NET_LEN} characters"),
            ));
        }
        let count = u32::try_from(count)
            .ok()
            .filter(|count| (1..=MAX_RESULT_COUNT).contains(count))
            .ok_or_else(|| {
                ValidationError::out_of_range(
                    "count",
                    format!("must be between 1 and {MAX_RESULT_COUNT}"),
                )
            })?;
        Ok(QueryRequest::StartNetCount(StartNetCount {
            start_time,
            net,
            count,
        }))
    }

    /// Validate a parameter mapping against the schema of `kind`.
    pub fn from_params(kind: QueryKind, params: &QueryParams) -> Result<Self, ValidationError> {
        for (name, _) in params.iter() {
            if !kind.schema().iter().any(|spec| spec.name == name) {
                return Err(ValidationError::UnknownParameter {
                    kind,
                    name: name.to_string(),
                });
            }
        }

        match kind {
            QueryKind::TimeRange => {
                let min_time = required_integer(kind, params, "min_time")?;
                let max_time = required_integer(kind, params, "max_time")?;
                Self::time_range(min_time, max_time)
            }
            QueryKind::StartNetCount => {
                let start_time = required_integer(kind, params, "start_time")?;
                let net = required_text(kind, params, "net")?;
                let count = required_integer(kind, params, "count")?;
                Self::start_net_count(start_time, net, count)
            }
        }
    }

    pub fn from_json(kind: QueryKind, object: &JsonObject) -> Result<Self, ValidationError> {
        Self::from_params(kind, &QueryParams::from_json(kind, object)?)
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            QueryRequest::TimeRange(_) => QueryKind::TimeRange,
            QueryRequest::StartNetCount(_) => QueryKind::StartNetCount,
        }
    }

    /// Canonical parameter mapping for this request.
    pub fn params(&self) -> QueryParams {
        let mut params = BTreeMap::new();
        match self {
            QueryRequest::TimeRange(range) => {
                params.insert("min_time".to_string(), range.min_time.into());
                params.insert("max_time".to_string(), range.max_time.into());
            }
            QueryRequest::StartNetCount(query) => {
                params.insert("start_time".to_string(), query.start_time.into());
                params.insert("net".to_string(), query.net.clone().into());
                params.insert("count".to_string(), i64::from(query.count).into());
            }
        }
        QueryParams(params)
    }
}

fn lookup<'a>(
    kind: QueryKind,
    params: &'a QueryParams,
    name: &'static str,
    expected: ParamType,
) -> Result<&'a ParamValue, ValidationError> {
    let value = params
        .get(name)
        .ok_or(ValidationError::MissingParameter { kind, name })?;
    if value.param_type() != expected {
        return Err(ValidationError::wrong_type(name, expected.describe()));
    }
    Ok(value)
}

fn required_integer(
    kind: QueryKind,
    params: &QueryParams,
    name: &'static str,
) -> Result<i64, ValidationError> {
    match lookup(kind, params, name, ParamType::Integer)? {
        ParamValue::Integer(value) => Ok(*value),
        _ => Err(ValidationError::wrong_type(name, ParamType::Integer.describe())),
    }
}

fn required_text(
    kind: QueryKind,
    params: &QueryParams,
    name: &'static str,
) -> Result<String, ValidationError> {
    match lookup(kind, params, name, ParamType::Text)? {
        ParamValue::Text(value) => Ok(value.clone()),
        _ => Err(ValidationError::wrong_type(name, ParamType::Text.describe())),
    }
}
