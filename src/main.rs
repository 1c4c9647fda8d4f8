//! Job host: loads configuration, starts every configured job, serves the
//! health endpoints and drains the jobs on Ctrl-C.

use std::process::ExitCode;
use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use background_jobs::adapters::bus::{connect, RedisStreamPublisher, RedisStreamsBus};
use background_jobs::adapters::{
    build_client, health_router, CachedSecretProvider, EnvSecretProvider, HealthState,
    IntervalScheduler, LoggingEventPublisher,
};
use background_jobs::application::jobs::{forwarding_registry, secret_invalidation_registry, MetricsJob};
use background_jobs::application::{BackgroundJob, RunningJob};
use background_jobs::config::{validate_redis_url, AppConfig, BusCredentials, ConfigError, ValidationError};
use background_jobs::domain::foundation::JobError;
use background_jobs::ports::{BusError, SecretProvider};

#[derive(Debug, Error)]
enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("health endpoint failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize tracing; `RUST_LOG` wins over the configured level.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.server.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "job host stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), HostError> {
    config.validate()?;

    let secrets = Arc::new(CachedSecretProvider::new(Arc::new(EnvSecretProvider::new(
        config.secrets.env_prefix.clone(),
    ))));
    let bus = connect_bus(&config, secrets.as_ref()).await?;
    let bus = Arc::new(bus);

    let health = HealthState::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = spawn_health_server(&config, health.clone(), shutdown_rx.clone()).await?;

    let mut jobs = Vec::new();
    let mut schedulers = Vec::new();
    if let Err(e) = start_jobs(&config, &bus, &secrets, &shutdown_rx, &mut jobs, &mut schedulers).await {
        let _ = shutdown_tx.send(true);
        drain(jobs, schedulers).await;
        let _ = server.await;
        return Err(e);
    }

    for job in &jobs {
        health.register_job(job.name(), job.stats_handle());
    }
    health.set_ready(true);
    tracing::info!(jobs = jobs.len(), scheduled = schedulers.len(), "job host ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
    health.set_ready(false);
    let _ = shutdown_tx.send(true);

    drain(jobs, schedulers).await;
    let _ = server.await;
    Ok(())
}

async fn connect_bus(config: &AppConfig, secrets: &dyn SecretProvider) -> Result<RedisStreamsBus, HostError> {
    let url: Secret<String> = match config.bus.credentials()? {
        BusCredentials::Direct(url) => url,
        BusCredentials::SecretKey(key) => secrets.get_secret(&key).await.map_err(|e| {
            JobError::configuration(format!("bus connection secret '{}' could not be resolved: {}", key, e))
        })?,
    };
    validate_redis_url(url.expose_secret())?;

    let (client, conn) = connect(url.expose_secret()).await?;
    let mut bus = RedisStreamsBus::new(client, conn).with_claim_idle(config.bus.claim_idle());
    if let Some(consumer) = &config.bus.consumer_name {
        bus = bus.with_consumer_name(consumer.clone());
    }
    tracing::info!(consumer = bus.consumer_name(), "connected to bus");
    Ok(bus)
}

async fn start_jobs(
    config: &AppConfig,
    bus: &Arc<RedisStreamsBus>,
    secrets: &Arc<CachedSecretProvider>,
    shutdown: &watch::Receiver<bool>,
    jobs: &mut Vec<RunningJob>,
    schedulers: &mut Vec<JoinHandle<Result<(), JobError>>>,
) -> Result<(), HostError> {
    let options = config.pump.options()?;
    let members = config.pump.additional_members;

    let invalidation = BackgroundJob::new(
        "secret-invalidation",
        config.subscription.descriptor(&config.bus.topic)?,
        secret_invalidation_registry(secrets.clone(), members),
        options.clone(),
    )?;
    jobs.push(invalidation.start(bus.clone(), bus.clone(), shutdown.clone()).await?);

    if let Some(forwarding) = &config.forwarding {
        let mut publisher = RedisStreamPublisher::new(bus.as_ref().clone(), forwarding.destination.clone());
        if forwarding.binary {
            publisher = publisher.binary_mode();
        }
        let job = BackgroundJob::new(
            "cloud-event-forwarding",
            forwarding.descriptor()?,
            forwarding_registry(Arc::new(publisher), members),
            options.clone(),
        )?;
        jobs.push(job.start(bus.clone(), bus.clone(), shutdown.clone()).await?);
    }

    if let Some(metrics) = &config.metrics {
        let metrics_options = metrics.options()?;
        let client = build_client(&metrics_options, secrets.as_ref()).await?;
        let job = MetricsJob::new(Arc::new(client), Arc::new(LoggingEventPublisher::new()), metrics_options);
        let scheduler = IntervalScheduler::new(Arc::new(job));
        let rx = shutdown.clone();
        schedulers.push(tokio::spawn(async move { scheduler.run(rx).await }));
    }

    Ok(())
}

async fn spawn_health_server(
    config: &AppConfig,
    health: HealthState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, HostError> {
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "health endpoint listening");

    Ok(tokio::spawn(async move {
        let stop = async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        };
        if let Err(e) = axum::serve(listener, health_router(health))
            .with_graceful_shutdown(stop)
            .await
        {
            tracing::error!(error = %e, "health endpoint failed");
        }
    }))
}

async fn drain(jobs: Vec<RunningJob>, schedulers: Vec<JoinHandle<Result<(), JobError>>>) {
    for job in jobs {
        let name = job.name().to_string();
        match job.join().await {
            Ok(stats) => tracing::info!(job = %name, ?stats, "job stopped"),
            Err(e) => tracing::error!(job = %name, error = %e, "job stopped abnormally"),
        }
    }
    for scheduler in schedulers {
        match scheduler.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "scheduled job stopped abnormally"),
            Err(e) => tracing::error!(error = %e, "scheduled job panicked"),
        }
    }
}
