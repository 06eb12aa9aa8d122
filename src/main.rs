use std::{process, sync::Arc, time::Duration as StdDuration};

use scaffold::{
    application::{
        demo::DemoService,
        error::AppError,
        identity::IdentityService,
        repos::{DemoReader, DemoWriter},
    },
    cache::{CacheConfig, EntityCache},
    config,
    domain::clock::{Clock, SystemClock},
    infra::{
        db::{self, PostgresRepositories},
        error::InfraError,
        http::{self, ApiState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use tokio::sync::watch;
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

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (reader, writer) = init_repositories(&settings).await?;
    let state = build_api_state(&settings, reader, writer, clock);
    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::validation("migrate requires a database url"))?;

    let pool = connect_pool(database_url, &settings.database).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    info!(target = "scaffold::migrate", "migrations applied");
    Ok(())
}

async fn connect_pool(
    url: &str,
    database: &config::DatabaseSettings,
) -> Result<sqlx::PgPool, AppError> {
    PostgresRepositories::connect(
        url,
        database.max_connections.get(),
        database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<dyn DemoReader>, Arc<dyn DemoWriter>), AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            target = "scaffold::startup",
            "no database url configured; using the in-process store"
        );
        let repositories = Arc::new(MemoryRepositories::new());
        let reader: Arc<dyn DemoReader> = repositories.clone();
        let writer: Arc<dyn DemoWriter> = repositories;
        return Ok((reader, writer));
    };

    let pool = connect_pool(database_url, &settings.database).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
    db::verify_schema(&pool, db::REGISTERED_TABLES).await?;

    info!(
        target = "scaffold::startup",
        max_connections = settings.database.max_connections.get(),
        "postgres store ready"
    );
    let repositories = Arc::new(PostgresRepositories::new(pool));
    let reader: Arc<dyn DemoReader> = repositories.clone();
    let writer: Arc<dyn DemoWriter> = repositories;
    Ok((reader, writer))
}

fn build_api_state(
    settings: &config::Settings,
    reader: Arc<dyn DemoReader>,
    writer: Arc<dyn DemoWriter>,
    clock: Arc<dyn Clock>,
) -> ApiState {
    let cache = Arc::new(EntityCache::new(
        &CacheConfig::from(&settings.cache),
        clock.clone(),
    ));
    let demo = DemoService::new(
        reader,
        writer,
        clock.clone(),
        cache,
        settings.query.max_page_size.get(),
    );
    let identity = IdentityService::new(
        settings.auth.mock_subject.clone(),
        time::Duration::days(i64::from(settings.auth.cookie_max_age_days.get())),
        clock,
    );

    if settings.auth.cookie_secret.is_none() {
        warn!(
            target = "scaffold::startup",
            "no cookie secret configured; identity cookies will not survive a restart"
        );
    }

    ApiState {
        demo: Arc::new(demo),
        identity: Arc::new(identity),
        cookie_key: http::signing_key(settings.auth.cookie_secret.as_deref()),
        production: settings.app.is_production(),
    }
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "scaffold::startup",
        addr = %settings.server.addr,
        environment = %settings.app.environment,
        "listening"
    );

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = stopping_tx.send(true);
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        joined = &mut server => {
            joined
                .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
                .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(&mut stopping_rx, grace) => {
            warn!(
                target = "scaffold::shutdown",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            server.abort();
        }
    }

    info!(target = "scaffold::shutdown", "server stopped");
    Ok(())
}

async fn drain_deadline(stopping: &mut watch::Receiver<bool>, grace: StdDuration) {
    if stopping.wait_for(|stopping| *stopping).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(
                target = "scaffold::shutdown",
                error = %err,
                "failed to listen for ctrl-c"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(
                    target = "scaffold::shutdown",
                    error = %err,
                    "failed to listen for SIGTERM"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!(target = "scaffold::shutdown", "shutdown signal received");
}
