use crate::application::repos::StoreError;

pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::transient("timed out waiting for a connection"),
        sqlx::Error::Io(io) => StoreError::transient(format!("connection failure: {io}")),
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            if is_transient_sqlstate(&code) {
                StoreError::transient(db.message().to_string())
            } else if code.starts_with("23") {
                StoreError::Constraint {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                    message: db.message().to_string(),
                }
            } else {
                StoreError::fatal(db.message().to_string())
            }
        }
        other => StoreError::fatal(other.to_string()),
    }
}

/// Statement cancelled, connection exceptions, serialization and deadlock failures, shutdown,
/// and connection exhaustion.
fn is_transient_sqlstate(code: &str) -> bool {
    matches!(code, "57014" | "40001" | "40P01" | "57P01" | "57P02" | "57P03" | "53300")
        || code.starts_with("08")
}
