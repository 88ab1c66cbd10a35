use std::sync::Arc;

use crate::application::benchmark::BenchmarkRunner;
use crate::application::query::QueryService;

/// Dependencies shared by every API handler, built once at startup.
#[derive(Clone)]
pub struct ApiState {
    pub queries: QueryService,
    pub benchmark: Arc<BenchmarkRunner>,
}

impl ApiState {
    pub fn new(queries: QueryService, benchmark: Arc<BenchmarkRunner>) -> Self {
        Self { queries, benchmark }
    }
}
