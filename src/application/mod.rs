pub mod benchmark;
pub mod error;
pub mod executor;
pub mod query;
pub mod repos;

pub use benchmark::{BenchmarkRun, BenchmarkRunner};
pub use executor::QueryExecutor;
pub use query::{MutationOutcome, QueryError, QueryOutcome, QueryService};
pub use repos::{QuakeStore, ReadIsolation, StoreError, StoreSession};
