use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use echo_server::config::{Settings, SourceMode};
use echo_server::db::Database;
use echo_server::rate_limit::RateLimiter;
use echo_server::seeding::{
    scheduler, HttpSampleSource, SampleSource, SeedWorker, StaticSampleSource,
};
use echo_server::state::AppState;
use echo_server::api;
use echo_types::{EntityKind, JobKind};

/// Echo backend: read API plus the cascading seed pipeline
#[derive(Parser, Debug)]
#[command(name = "echo-server", version)]
#[command(about = "Serve the Echo API and run the seed workers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server and the three seed workers (default)
    Serve,

    /// Enqueue a seed job into the durable queue and exit
    Seed {
        /// users, posts or comments
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,

        /// Number of records to create
        #[arg(short, long, default_value_t = 500)]
        count: i64,

        /// Parent user (posts) or post (comments)
        #[arg(short, long)]
        parent_id: Option<Uuid>,
    },

    /// Print job counts per queue
    Stats,
}

fn parse_entity(s: &str) -> Result<EntityKind, String> {
    EntityKind::parse(s).ok_or_else(|| format!("unknown entity '{}', expected users, posts or comments", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echo_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::new().context("Failed to load settings")?;

    let db = Database::new(&settings.database.path).context("Failed to create database")?;
    db.initialize().context("Failed to initialize database schema")?;
    tracing::info!("Database initialized at {}", settings.database.path);

    let state = AppState::new(
        db,
        settings.seeding.max_attempts,
        settings.seeding.poll_interval(),
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings, state).await,
        Command::Seed {
            entity,
            count,
            parent_id,
        } => {
            let job_id = state.dispatcher.trigger_seed(entity, count, parent_id).await?;
            println!(
                "Queued job {} on {} ({} {})",
                job_id,
                entity.job_kind().queue_name(),
                count,
                entity.resource()
            );
            Ok(())
        }
        Command::Stats => {
            for stats in state.queue.stats()? {
                println!(
                    "{:<14} pending={:<6} running={:<4} completed={:<8} failed={}",
                    stats.queue, stats.pending, stats.running, stats.completed, stats.failed
                );
            }
            Ok(())
        }
    }
}

fn sample_source(settings: &Settings) -> Result<Arc<dyn SampleSource>> {
    let source: Arc<dyn SampleSource> = match settings.sample_source.mode {
        SourceMode::Http => Arc::new(HttpSampleSource::new(
            settings.sample_source.base_url.clone(),
            settings.sample_source.timeout(),
        )?),
        SourceMode::Static => Arc::new(StaticSampleSource::builtin()?),
    };
    Ok(source)
}

async fn serve(settings: Settings, state: AppState) -> Result<()> {
    // Jobs a previous process was running when it died go back in line
    state.queue.requeue_stalled()?;

    let source = sample_source(&settings)?;
    tracing::info!(mode = ?settings.sample_source.mode, "Sample source ready");

    let shutdown = CancellationToken::new();
    let ctx = state.worker_context(source, settings.seeding.job_timeout());

    let mut background = Vec::new();
    for kind in JobKind::ALL {
        let worker = SeedWorker::new(kind, ctx.clone());
        background.push(tokio::spawn(worker.run(shutdown.clone())));
    }

    if let Some(every) = settings.seeding.schedule_interval() {
        background.push(tokio::spawn(scheduler::run_schedule(
            state.dispatcher.clone(),
            every,
            settings.seeding.scheduled_count,
            shutdown.clone(),
        )));
    }

    // 10 seed triggers per minute per client
    let app = api::router(state.clone(), RateLimiter::new(10, 60));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| anyhow!("Failed to parse server address: {}", e))?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let server_shutdown = shutdown.clone();
    let hub = state.hub.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutting down...");
        server_shutdown.cancel();
        // Ends open progress streams so the server can drain
        hub.shutdown().await;
    })
    .await
    .context("Server error")?;

    for task in background {
        if let Err(e) = task.await {
            tracing::error!("Background task panicked: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
