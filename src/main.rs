// src/main.rs
// Process bootstrap: config, migrations, job runtime, periodic schedules,
// admin HTTP surface, graceful shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ratchet::chat::slack::SlackGateway;
use ratchet::chat::ChatGateway;
use ratchet::config::Config;
use ratchet::jobs::{runtime::QueueCaps, JobRegistry, Runtime};
use ratchet::llm::openai::OpenAIClient;

#[derive(Parser, Debug)]
#[command(name = "ratchet")]
struct Args {
    /// Path to the YAML documentation-sources config file.
    #[arg(long, env = "RATCHET_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!(error = %err, "bootstrap failed");
        std::process::exit(1);
    }
    info!("clean shutdown");
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    info!(http_addr = %config.server.http_addr, dev_mode = config.server.dev_mode, "starting ratchet");

    let pool = ratchet::db::connect(&config.database).await?;
    ratchet::metrics::install_recorder("0.0.0.0:9090".parse()?)?;

    let gateway: Arc<dyn ChatGateway> = Arc::new(SlackGateway::connect(&config.slack).await?);
    let embedder = Arc::new(OpenAIClient::new(config.openai.clone(), pool.clone()));
    let completion = embedder.clone();

    // Fail fast on a misconfigured documentation source rather than
    // discovering it on the first refresh job.
    let _validated_sources: Vec<_> = config
        .documentation
        .sources
        .iter()
        .map(ratchet::docs::build_source)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let registry = build_job_registry(pool.clone(), gateway.clone(), embedder.clone(), completion.clone(), config.clone());
    let job_runtime = Runtime::new(pool.clone(), registry);

    let shutdown = CancellationToken::new();

    let queues = vec![
        "default".to_string(),
        "ingestion".to_string(),
        "update_runbook".to_string(),
        "documentation".to_string(),
    ];
    let caps = QueueCaps::default();

    let runtime_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { job_runtime.run(&queues, caps, shutdown).await })
    };

    let doc_source_names: Vec<String> = config.documentation.sources.iter().map(|s| s.name.clone()).collect();
    let periodic_sources = vec![
        ratchet::periodic::report::periodic_source(pool.clone())?,
        ratchet::docs::pipeline::periodic_source(doc_source_names)?,
    ];
    let periodic_handle = {
        let pool = pool.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { ratchet::jobs::periodic::run_all(pool, periodic_sources, shutdown).await })
    };

    seed_channel_ingestion(&pool).await?;
    seed_retention_purge(&pool, &config).await?;
    seed_documentation_refresh(&pool, &config).await?;

    let http_router = ratchet::http::router(pool.clone());
    let listener = tokio::net::TcpListener::bind(&config.server.http_addr).await?;
    let http_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, http_router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    wait_for_signal().await;
    info!("shutdown signal received");
    shutdown.cancel();

    let _ = runtime_handle.await;
    let _ = periodic_handle.await;
    let _ = http_handle.await;

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Every channel already in the store gets its ingestion job re-primed on
/// startup (unique-by-args means this is a no-op if one is already pending).
async fn seed_channel_ingestion(pool: &ratchet::db::Pool) -> anyhow::Result<()> {
    let channels = ratchet::data::channels::list_all(pool).await?;
    let mut tx = pool.begin().await?;
    for channel in channels {
        let job = ratchet::ingestion::unique_job(&channel.channel_id).await?;
        ratchet::jobs::enqueue(&mut *tx, job).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn seed_retention_purge(pool: &ratchet::db::Pool, config: &Config) -> anyhow::Result<()> {
    let job = ratchet::periodic::retention::initial_job(&config.llm_usage_cleanup)?;
    ratchet::jobs::enqueue(pool, job).await?;
    Ok(())
}

/// Primes every configured source on startup so a freshly deployed process
/// doesn't wait for the next hourly fire before its first refresh;
/// `unique_by_args` means this is a no-op if the periodic source already
/// enqueued one first.
async fn seed_documentation_refresh(pool: &ratchet::db::Pool, config: &Config) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for source in &config.documentation.sources {
        let job = ratchet::jobs::NewJob::new(ratchet::docs::pipeline::KIND, ratchet::docs::pipeline::Args { source: source.name.clone() })?
            .with_opts(ratchet::jobs::EnqueueOptions::default().unique_by_args(source.name.clone()));
        ratchet::jobs::enqueue(&mut *tx, job).await?;
    }
    tx.commit().await?;
    Ok(())
}

fn build_job_registry(
    pool: ratchet::db::Pool,
    gateway: Arc<dyn ChatGateway>,
    embedder: Arc<OpenAIClient>,
    completion: Arc<OpenAIClient>,
    config: Config,
) -> JobRegistry {
    let mut registry = JobRegistry::new();
    let module_registry = Arc::new(ratchet::modules::Registry::new(Vec::new()));

    registry.register(ratchet::ingestion::KIND, "ingestion", None, {
        let gateway = gateway.clone();
        move |pool, job| {
            let gateway = gateway.clone();
            async move {
                let args = job.args_as::<ratchet::ingestion::Args>().map_err(ratchet::error::CoreError::from)?;
                ratchet::ingestion::run(pool, gateway, job.id, args).await
            }
        }
    });

    registry.register(
        ratchet::onboarding::CHANNEL_ONBOARD_KIND,
        "default",
        Some(std::time::Duration::from_secs(5 * 60)),
        {
            let gateway = gateway.clone();
            move |pool, job| {
                let gateway = gateway.clone();
                async move {
                    let args = job.args_as::<ratchet::onboarding::OnboardArgs>().map_err(ratchet::error::CoreError::from)?;
                    ratchet::onboarding::run_channel_onboard(pool, gateway, job.id, args).await
                }
            }
        },
    );

    registry.register(ratchet::onboarding::BACKFILL_THREAD_KIND, "default", None, {
        let gateway = gateway.clone();
        move |pool, job| {
            let gateway = gateway.clone();
            async move {
                let args = job.args_as::<ratchet::onboarding::BackfillThreadArgs>().map_err(ratchet::error::CoreError::from)?;
                ratchet::onboarding::run_backfill_thread(pool, gateway, job.id, args).await
            }
        }
    });

    registry.register(
        ratchet::modules::KIND,
        "default",
        Some(std::time::Duration::from_secs(5 * 60)),
        move |pool, job| {
            let module_registry = module_registry.clone();
            async move {
                let args = job.args_as::<ratchet::modules::Args>().map_err(ratchet::error::CoreError::from)?;
                ratchet::modules::run(pool, module_registry, args).await
            }
        },
    );

    registry.register(ratchet::incidents::KIND, "default", None, {
        let classifier_config = config.classifier.clone();
        move |pool, job| {
            let classifier_config = classifier_config.clone();
            async move {
                let args = job.args_as::<ratchet::incidents::Args>().map_err(ratchet::error::CoreError::from)?;
                ratchet::incidents::run(pool, classifier_config, job.id, args).await
            }
        }
    });

    registry.register(ratchet::docs::pipeline::KIND, "documentation", None, {
        let embedder = embedder.clone();
        let sources = config.documentation.sources.clone();
        move |pool, job| {
            let embedder: Arc<dyn ratchet::llm::Embedder> = embedder.clone();
            let sources = sources.clone();
            async move {
                let args: ratchet::docs::pipeline::Args = job.args_as().map_err(ratchet::error::CoreError::from)?;
                let source_config = sources
                    .iter()
                    .find(|s| s.name == args.source)
                    .ok_or_else(|| ratchet::error::CoreError::permanent(format!("unknown source {}", args.source)))?;
                let source: Arc<dyn ratchet::docs::DocumentationSource> =
                    Arc::from(ratchet::docs::build_source(source_config).map_err(|e| ratchet::error::CoreError::permanent(e.to_string()))?);
                ratchet::docs::pipeline::run(pool, source, embedder).await
            }
        }
    });

    registry.register(ratchet::periodic::report::KIND, "default", None, {
        let gateway = gateway.clone();
        let completion: Arc<dyn ratchet::llm::Completion> = completion;
        move |pool, job| {
            let gateway = gateway.clone();
            let completion = completion.clone();
            async move {
                let args = job.args_as::<ratchet::periodic::report::Args>().map_err(ratchet::error::CoreError::from)?;
                ratchet::periodic::report::run(pool, gateway, completion, args).await
            }
        }
    });

    registry.register(ratchet::periodic::retention::KIND, "default", None, move |pool, job| async move {
        let args = job.args_as::<ratchet::periodic::retention::Args>().map_err(ratchet::error::CoreError::from)?;
        ratchet::periodic::retention::run(pool, job.id, args).await
    });

    registry
}
