use std::future::IntoFuture;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use qcache::{
    application::{
        benchmark::BenchmarkRunner, error::AppError, executor::QueryExecutor,
        query::QueryService,
    },
    cache::{CacheConfig, ResultCache, build_backend},
    config,
    domain::QueryRequest,
    infra::{
        db::PgQuakeStore,
        error::InfraError,
        http::{self, ApiState, api::handlers::benchmark_report},
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Bench(args) => run_bench(settings, *args).await,
    }
}

struct Services {
    queries: QueryService,
    benchmark: Arc<BenchmarkRunner>,
}

async fn build_services(settings: &config::Settings) -> Result<Services, AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database.url is required (set QCACHE__DATABASE__URL or --database-url)",
        ))
    })?;

    let pool = PgQuakeStore::connect(url, &settings.database)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PgQuakeStore::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
    let store = Arc::new(PgQuakeStore::new(pool, settings.database.query_timeout));

    let cache_config = CacheConfig::from(&settings.cache);
    let backend = build_backend(&cache_config).map_err(InfraError::from)?;
    info!(
        target = "qcache::bootstrap",
        backend = backend.name(),
        namespace = %cache_config.namespace,
        ttl_seconds = cache_config.ttl_seconds(),
        isolation = settings.database.read_isolation.as_sql(),
        "Stores configured"
    );
    let cache = Arc::new(ResultCache::new(backend, &cache_config));

    let executor = Arc::new(QueryExecutor::new(
        store,
        settings.database.read_isolation,
        settings.retry.backoff,
    ));
    let queries = QueryService::new(cache, executor);
    let benchmark = Arc::new(BenchmarkRunner::new(
        queries.clone(),
        settings.benchmark.max_repetitions.get(),
    ));

    Ok(Services { queries, benchmark })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let services = build_services(&settings).await?;
    let router = http::build_router(ApiState::new(services.queries, services.benchmark));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "qcache::bootstrap",
        addr = %settings.server.addr,
        "Listening"
    );

    let draining = Arc::new(Notify::new());
    let signal = draining.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            signal.notify_one();
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(draining, settings.server.graceful_shutdown) => {
            warn!(
                target = "qcache::bootstrap",
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "In-flight requests did not drain in time; exiting"
            );
        }
    }

    Ok(())
}

async fn drain_deadline(draining: Arc<Notify>, grace: Duration) {
    draining.notified().await;
    tokio::time::sleep(grace).await;
}

async fn wait_for_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "qcache::bootstrap",
            error = %err,
            "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "qcache::bootstrap", "Shutdown requested");
}

async fn run_bench(settings: config::Settings, args: config::BenchArgs) -> Result<(), AppError> {
    let time_range = QueryRequest::time_range(args.min_time, args.max_time)?;
    let start_net_count = QueryRequest::start_net_count(args.start_time, args.net, args.count)?;

    let services = build_services(&settings).await?;
    let run = services
        .benchmark
        .run(args.repetitions, &time_range, &start_net_count)
        .await?;

    let report = serde_json::to_string_pretty(&benchmark_report(run))
        .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;
    println!("{report}");
    Ok(())
}
