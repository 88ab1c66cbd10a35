use thiserror::Error;

use super::query::QueryKind;

/// Rejection of caller-supplied input. Never retried; maps to a 4xx at the HTTP edge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown query kind `{0}`")]
    UnknownKind(String),
    #[error("missing parameter `{name}` for `{kind}` query")]
    MissingParameter { kind: QueryKind, name: &'static str },
    #[error("unknown parameter `{name}` for `{kind}` query")]
    UnknownParameter { kind: QueryKind, name: String },
    #[error("parameter `{name}` supplied more than once")]
    DuplicateParameter { name: String },
    #[error("parameter `{name}` must be {expected}")]
    WrongType { name: String, expected: &'static str },
    #[error("parameter `{name}` is out of range: {reason}")]
    OutOfRange { name: String, reason: String },
    #[error("{0}")]
    Invalid(String),
}

impl ValidationError {
    pub fn wrong_type(name: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            name: name.into(),
            expected,
        }
    }

    pub fn out_of_range(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
