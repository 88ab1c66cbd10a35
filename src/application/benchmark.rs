//! Replays a query pair over one connection and records per-iteration latency.
//!
//! A connection that fails transiently is replaced by the retry and the run continues on the
//! replacement.

use std::time::{Duration, Instant};

use tracing::info;

use crate::application::query::{QueryError, QueryService};
use crate::domain::{QueryRequest, QueryResult, ValidationError};

pub const DEFAULT_MAX_REPETITIONS: u32 = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRun {
    pub repetitions: u32,
    pub latencies_a: Vec<Duration>,
    pub latencies_b: Vec<Duration>,
    pub total: Duration,
    pub last_result_a: Option<QueryResult>,
    pub last_result_b: Option<QueryResult>,
}

pub struct BenchmarkRunner {
    queries: QueryService,
    max_repetitions: u32,
}

impl BenchmarkRunner {
    pub fn new(queries: QueryService, max_repetitions: u32) -> Self {
        Self {
            queries,
            max_repetitions,
        }
    }

    pub fn max_repetitions(&self) -> u32 {
        self.max_repetitions
    }

    /// Run `a` then `b`, `repetitions` times each, through the normal cache-or-store path.
    ///
    /// `repetitions` is checked before any store is touched. Each latency covers one full
    /// read, hit or miss.
    pub async fn run(
        &self,
        repetitions: i64,
        a: &QueryRequest,
        b: &QueryRequest,
    ) -> Result<BenchmarkRun, QueryError> {
        let repetitions = self.validate_repetitions(repetitions)?;

        let started = Instant::now();
        let mut session = self.queries.executor().acquire().await?;
        session.ping().await?;

        let mut latencies_a = Vec::with_capacity(repetitions as usize);
        let mut latencies_b = Vec::with_capacity(repetitions as usize);
        let mut last_result_a = None;
        let mut last_result_b = None;

        for _ in 0..repetitions {
            let iteration = Instant::now();
            let outcome = self.queries.run(a, Some(&mut session)).await?;
            latencies_a.push(iteration.elapsed());
            last_result_a = Some(outcome.result);

            let iteration = Instant::now();
            let outcome = self.queries.run(b, Some(&mut session)).await?;
            latencies_b.push(iteration.elapsed());
            last_result_b = Some(outcome.result);
        }

        let total = started.elapsed();
        info!(
            target = "qcache::application::benchmark",
            repetitions,
            total_ms = total.as_secs_f64() * 1000.0,
            "Benchmark run complete"
        );

        Ok(BenchmarkRun {
            repetitions,
            latencies_a,
            latencies_b,
            total,
            last_result_a,
            last_result_b,
        })
    }

    fn validate_repetitions(&self, repetitions: i64) -> Result<u32, ValidationError> {
        u32::try_from(repetitions)
            .ok()
            .filter(|value| (1..=self.max_repetitions).contains(value))
            .ok_or_else(|| {
                ValidationError::out_of_range(
                    "repetitions",
                    format!("must be between 1 and {}", self.max_repetitions),
                )
            })
    }
}
