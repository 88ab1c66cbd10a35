//! Field updates applied to rows matched by their event time.

use serde_json::Value;

use super::error::ValidationError;
use super::query::{JsonObject, MAX_NET_LEN};

/// Columns a mutation may assign. The set is closed so column identifiers never come from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuakeField {
    Time,
    Latitude,
    Longitude,
    Depth,
    Mag,
    Net,
    Id,
}

impl QuakeField {
    pub const ALL: [QuakeField; 7] = [
        QuakeField::Time,
        QuakeField::Latitude,
        QuakeField::Longitude,
        QuakeField::Depth,
        QuakeField::Mag,
        QuakeField::Net,
        QuakeField::Id,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QuakeField::Time => "time",
            QuakeField::Latitude => "latitude",
            QuakeField::Longitude => "longitude",
            QuakeField::Depth => "depth",
            QuakeField::Mag => "mag",
            QuakeField::Net => "net",
            QuakeField::Id => "id",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    fn nullable(self) -> bool {
        !matches!(self, QuakeField::Time | QuakeField::Id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

/// A validated `UPDATE ... WHERE time = match_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuakeUpdate {
    match_time: i64,
    assignments: Vec<(QuakeField, FieldValue)>,
}

impl QuakeUpdate {
    /// Validate a match key and a `field -> value` object.
    ///
    /// Unknown field names are skipped; an update with no recognised field is rejected.
    pub fn from_json(match_time: &Value, updates: &JsonObject) -> Result<Self, ValidationError> {
        let match_time = integer_value(match_time)
            .ok_or_else(|| ValidationError::wrong_type("time", "an integer"))?;

        if updates.is_empty() {
            return Err(ValidationError::invalid("no updates provided"));
        }

        let mut assignments = Vec::new();
        for (name, value) in updates {
            let Some(field) = QuakeField::from_name(name) else {
                continue;
            };
            assignments.push((field, coerce_field(field, value)?));
        }

        if assignments.is_empty() {
            return Err(ValidationError::invalid("no valid fields to update"));
        }
        assignments.sort_by_key(|(field, _)| *field);

        Ok(Self {
            match_time,
            assignments,
        })
    }

    pub fn match_time(&self) -> i64 {
        self.match_time
    }

    pub fn assignments(&self) -> &[(QuakeField, FieldValue)] {
        &self.assignments
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn float_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn coerce_field(field: QuakeField, value: &Value) -> Result<FieldValue, ValidationError> {
    if is_blank(value) {
        return if field.nullable() {
            Ok(FieldValue::Null)
        } else {
            Err(ValidationError::out_of_range(field.name(), "must not be empty"))
        };
    }

    match field {
        QuakeField::Time => integer_value(value)
            .map(FieldValue::Integer)
            .ok_or_else(|| ValidationError::wrong_type("time", "an integer")),
        QuakeField::Latitude | QuakeField::Longitude | QuakeField::Depth | QuakeField::Mag => {
            float_value(value)
                .map(FieldValue::Float)
                .ok_or_else(|| ValidationError::wrong_type(field.name(), "numeric"))
        }
        QuakeField::Net | QuakeField::Id => {
            let Value::String(text) = value else {
                return Err(ValidationError::wrong_type(field.name(), "a string"));
            };
            let text = text.trim();
            if field == QuakeField::Net && text.chars().count() > MAX_NET_LEN {
                return Err(ValidationError::out_of_range(
                    "net",
                    format!("must be at most {MAX_NET_LEN} characters"),
                ));
            }
            Ok(FieldValue::Text(text.to_string()))
        }
    }
}
