//! Fixed SQL for every query kind and for field updates.
//!
//! Values are always bound. Column identifiers only ever come from the closed [`QuakeField`] set.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, QueryBuilder, Row};

use crate::application::repos::ReadIsolation;
use crate::domain::{FieldValue, QuakeField, QuakeUpdate, QueryKind, QueryRequest, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    Text,
    BigInt,
    Double,
}

#[derive(Debug)]
pub(crate) struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

#[derive(Debug)]
pub(crate) struct Template {
    pub sql: &'static str,
    pub columns: &'static [Column],
}

const EVENT_COLUMNS: &[Column] = &[
    Column {
        name: "id",
        ty: ColumnType::Text,
    },
    Column {
        name: "net",
        ty: ColumnType::Text,
    },
    Column {
        name: "time",
        ty: ColumnType::BigInt,
    },
    Column {
        name: "latitude",
        ty: ColumnType::Double,
    },
    Column {
        name: "longitude",
        ty: ColumnType::Double,
    },
];

static TIME_RANGE: Template = Template {
    sql: r#"SELECT id, net, "time", latitude, longitude FROM quakes WHERE "time" BETWEEN $1 AND $2 ORDER BY "time", id"#,
    columns: EVENT_COLUMNS,
};

static START_NET_COUNT: Template = Template {
    sql: r#"SELECT id, net, "time", latitude, longitude FROM quakes WHERE "time" >= $1 AND net = $2 ORDER BY "time", id LIMIT $3"#,
    columns: EVENT_COLUMNS,
};

pub(crate) const PING_SQL: &str = "SELECT 1";
pub(crate) const STATEMENT_TIMEOUT_SQL: &str = "SELECT set_config('statement_timeout', $1, true)";

pub(crate) fn template(kind: QueryKind) -> &'static Template {
    match kind {
        QueryKind::TimeRange => &TIME_RANGE,
        QueryKind::StartNetCount => &START_NET_COUNT,
    }
}

/// Must be the first statement of its transaction.
pub(crate) fn set_isolation_sql(isolation: ReadIsolation) -> &'static str {
    match isolation {
        ReadIsolation::ReadUncommitted => "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
        ReadIsolation::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
        ReadIsolation::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
        ReadIsolation::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
    }
}

pub(crate) fn bind(request: &QueryRequest) -> Query<'static, Postgres, PgArguments> {
    let template = template(request.kind());
    match request {
        QueryRequest::TimeRange(range) => sqlx::query(template.sql)
            .bind(range.min_time())
            .bind(range.max_time()),
        QueryRequest::StartNetCount(query) => sqlx::query(template.sql)
            .bind(query.start_time())
            .bind(query.net().to_string())
            .bind(i64::from(query.count())),
    }
}

pub(crate) fn decode_row(template: &Template, row: &PgRow) -> Result<Vec<Scalar>, sqlx::Error> {
    template
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            Ok(match column.ty {
                ColumnType::Text => Scalar::from(row.try_get::<Option<String>, _>(idx)?),
                ColumnType::BigInt => Scalar::from(row.try_get::<Option<i64>, _>(idx)?),
                ColumnType::Double => Scalar::from(row.try_get::<Option<f64>, _>(idx)?),
            })
        })
        .collect()
}

pub(crate) fn column_names(template: &Template) -> Vec<String> {
    template
        .columns
        .iter()
        .map(|column| column.name.to_string())
        .collect()
}

fn column_sql(field: QuakeField) -> &'static str {
    match field {
        QuakeField::Time => r#""time""#,
        QuakeField::Latitude => "latitude",
        QuakeField::Longitude => "longitude",
        QuakeField::Depth => "depth",
        QuakeField::Mag => "mag",
        QuakeField::Net => "net",
        QuakeField::Id => "id",
    }
}

pub(crate) fn build_update(update: &QuakeUpdate) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE quakes SET ");
    {
        let mut assignments = qb.separated(", ");
        for (field, value) in update.assignments() {
            assignments.push(column_sql(*field));
            assignments.push_unseparated(" = ");
            match value {
                FieldValue::Null => {
                    assignments.push_unseparated("NULL");
                }
                FieldValue::Integer(value) => {
                    assignments.push_bind_unseparated(*value);
                }
                FieldValue::Float(value) => {
                    assignments.push_bind_unseparated(*value);
                }
                FieldValue::Text(value) => {
                    assignments.push_bind_unseparated(value.clone());
                }
            }
        }
    }
    qb.push(r#" WHERE "time" = "#);
    qb.push_bind(update.match_time());
    qb
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn templates_only_contain_placeholders() {
        for kind in QueryKind::ALL {
            let sql = template(kind).sql;
            assert!(sql.contains("$1"));
            assert!(!sql.contains('\''));
        }
    }

    #[test]
    fn update_uses_fixed_identifiers_and_bound_values() {
        let updates = json!({
            "net": "x';DROP--",
            "id": "x'; DROP TABLE quakes; --",
            "mag": 5.1,
            "depth": null
        });
        let update = QuakeUpdate::from_json(
            &json!(42),
            updates.as_object().expect("object literal"),
        )
        .expect("valid update");

        let qb = build_update(&update);
        assert_eq!(
            qb.sql(),
            r#"UPDATE quakes SET depth = NULL, mag = $1, net = $2, id = $3 WHERE "time" = $4"#
        );
        assert!(!qb.sql().contains("DROP"));
    }

    #[test]
    fn isolation_statement_names_the_level() {
        assert!(set_isolation_sql(ReadIsolation::ReadUncommitted).ends_with("READ UNCOMMITTED"));
        assert!(set_isolation_sql(ReadIsolation::Serializable).ends_with("SERIALIZABLE"));
    }
}
