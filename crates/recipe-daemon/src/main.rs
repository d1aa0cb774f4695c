// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use recipe_config::AppConfig;
use recipe_core::QueueName;
use recipe_daemon::{build_app, AppState};
use recipe_persistence::{InMemoryNoteStore, PgNoteStore};
use recipe_queue::{InMemoryBroker, RedisBroker};
use recipe_retry::ErrorHandler;
use recipe_runtime::{AppContext, BaseWorker, CompletionTracker, NoopValidator, StatusBroadcaster};
use recipe_workers as workers;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recipe-daemon", version, about = "Recipe ingestion queue daemon")]
struct Args {
    /// Bind address for the HTTP intake surface. `PORT` overrides this
    /// when set, matching the ambient environment-driven config.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Enable debug-level logging for this workspace's crates.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug { EnvFilter::new("recipe=debug") } else { EnvFilter::new("recipe=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (config, warnings) = recipe_config::load_config().context("load configuration")?;
    for warning in &warnings {
        tracing::warn!(target: "recipe.daemon", "{warning}");
    }
    let config = Arc::new(config);

    let bind = if args.bind == "0.0.0.0:8080" { format!("0.0.0.0:{}", config.port) } else { args.bind.clone() };

    // Dependency container, built bottom-up: broker -> persistence ->
    // factory+registry -> workers -> broadcaster -> HTTP intake.
    let broker = build_broker(&config).await?;
    let notes = build_notes(&config).await?;
    let broadcaster = Arc::new(StatusBroadcaster::new());
    let tracker = Arc::new(CompletionTracker::new());
    let error_handler = Arc::new(ErrorHandler::new());
    let ctx = AppContext::new(broker, notes, broadcaster, tracker, error_handler);

    let shutdown = watch::channel(false);
    spawn_workers(ctx.clone(), shutdown.1.clone())?;

    let state = Arc::new(AppState::new(ctx, config));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("bind {bind}"))?;
    info!(target: "recipe.daemon", %bind, "recipe-daemon listening");

    let result = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal()).await.context("serve");
    let _ = shutdown.0.send(true);
    result
}

async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn build_broker(config: &AppConfig) -> Result<Arc<dyn recipe_queue::QueueBroker>> {
    if config.redis_host.is_empty() || config.redis_host == "memory" {
        return Ok(Arc::new(InMemoryBroker::new()));
    }
    let password_part = config.redis_password.as_deref().map(|p| format!(":{p}@")).unwrap_or_default();
    let url = format!("redis://{password_part}{}:{}", config.redis_host, config.redis_port);
    let broker = RedisBroker::connect(&url).await.context("connect to redis")?;
    Ok(Arc::new(broker))
}

async fn build_notes(config: &AppConfig) -> Result<Arc<dyn recipe_persistence::NoteStore>> {
    if config.database_url == "memory://" {
        return Ok(Arc::new(InMemoryNoteStore::new()));
    }
    let store = PgNoteStore::connect(&config.database_url).await.context("connect to postgres")?;
    Ok(Arc::new(store))
}

/// Build one `ActionFactory` + `BaseWorker` per queue and run each loop
/// to completion of `shutdown`. Each worker owns its own
/// factory and pipeline builder; all seven share the same `AppContext`.
fn spawn_workers(ctx: AppContext, shutdown: watch::Receiver<bool>) -> Result<()> {
    macro_rules! spawn_worker {
        ($queue:expr, $register:path, $build:path) => {{
            let mut factory = recipe_runtime::ActionFactory::new();
            $register(&mut factory).context(concat!("register ", stringify!($register)))?;
            let worker = Arc::new(
                BaseWorker::new($queue, ctx.clone(), factory, $build, Box::new(NoopValidator))
                    .with_concurrency(recipe_runtime::DEFAULT_WORKER_CONCURRENCY),
            );
            tokio::spawn(worker.run(shutdown.clone()));
        }};
    }

    spawn_worker!(QueueName::Note, workers::register_note, workers::build_note_pipeline);
    spawn_worker!(QueueName::Ingredient, workers::register_ingredient, workers::build_ingredient_pipeline);
    spawn_worker!(QueueName::Instruction, workers::register_instruction, workers::build_instruction_pipeline);
    spawn_worker!(QueueName::Image, workers::register_image, workers::build_image_pipeline);
    spawn_worker!(QueueName::Source, workers::register_source, workers::build_source_pipeline);
    spawn_worker!(QueueName::PatternTracking, workers::register_pattern, workers::build_pattern_pipeline);
    spawn_worker!(QueueName::Categorization, workers::register_categorization, workers::build_categorization_pipeline);

    Ok(())
}
