use serde::{Deserialize, Serialize};

/// A single cell of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<Option<i64>> for Scalar {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Scalar::Null, Scalar::Integer)
    }
}

/// NaN and the infinities have no JSON form, so they read as `Null` from the start and a cached
/// copy stays identical to the stored one.
impl From<Option<f64>> for Scalar {
    fn from(value: Option<f64>) -> Self {
        value
            .filter(|value| value.is_finite())
            .map_or(Scalar::Null, Scalar::Float)
    }
}

impl From<Option<String>> for Scalar {
    fn from(value: Option<String>) -> Self {
        value.map_or(Scalar::Null, Scalar::Text)
    }
}

/// Column names plus row tuples, produced by one execution of a query template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_result_decodes_to_an_equal_value() {
        let result = QueryResult::new(
            vec!["id".into(), "time".into(), "latitude".into(), "net".into()],
            vec![
                vec![
                    Scalar::Text("us7000".into()),
                    Scalar::Integer(1_700_000_000),
                    Scalar::Float(35.1234567891234),
                    Scalar::Null,
                ],
                vec![
                    Scalar::Text("ak0001".into()),
                    Scalar::Integer(-5),
                    Scalar::Float(1.0),
                    Scalar::Text("ak".into()),
                ],
            ],
        );

        let encoded = serde_json::to_string(&result).expect("serializable");
        let decoded: QueryResult = serde_json::from_str(&encoded).expect("decodable");
        assert_eq!(decoded, result);
        assert_eq!(serde_json::to_string(&decoded).expect("serializable"), encoded);
    }

    #[test]
    fn whole_float_stays_a_float() {
        let decoded: Scalar = serde_json::from_str("2.0").expect("decodable");
        assert_eq!(decoded, Scalar::Float(2.0));
        let decoded: Scalar = serde_json::from_str("2").expect("decodable");
        assert_eq!(decoded, Scalar::Integer(2));
    }

    #[test]
    fn non_finite_floats_read_as_null() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(Scalar::from(Some(value)), Scalar::Null);
        }
        assert_eq!(Scalar::from(Some(-0.5)), Scalar::Float(-0.5));
        assert_eq!(Scalar::from(None::<f64>), Scalar::Null);
    }
}
