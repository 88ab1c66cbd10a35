//! Domain layer: validated query requests, results, and mutations.

pub mod error;
pub mod mutation;
pub mod query;
pub mod result;

pub use error::ValidationError;
pub use mutation::{FieldValue, QuakeField, QuakeUpdate};
pub use query::{ParamValue, QueryKind, QueryParams, QueryRequest};
pub use result::{QueryResult, Scalar};
