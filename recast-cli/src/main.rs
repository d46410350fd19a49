use recast::{
    acquire,
    cli::Args,
    config::AppConfig,
    error::Result,
    supervisor::{FfmpegEngine, StreamJob, Supervisor, SupervisorConfig, SupervisorState},
};
use clap::Parser;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!(state = %SupervisorState::Aborted, "{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::from_args(&args)?;
    info!(?config, "starting recast");

    // Acquisition happens-before the first loop iteration and is fatal on
    // failure; the supervisor never starts without a confirmed local file.
    let local_path = acquire::fetch(&config).await?;

    let cancel = CancellationToken::new();
    spawn_interrupt_watcher(cancel.clone());

    let engine = FfmpegEngine::new(&config.ffmpeg_path);
    match engine.version() {
        Some(version) => info!(version, "encoder found"),
        None => warn!(
            binary = %config.ffmpeg_path,
            "encoder binary not found; the supervisor will keep retrying"
        ),
    }

    let job = StreamJob::new(local_path, config.ingest_url());
    let supervisor = Supervisor::with_config(
        Arc::new(engine),
        SupervisorConfig {
            restart_delay: config.restart_delay,
        },
    );

    let state = supervisor.run(&job, cancel).await;
    info!(%state, "supervisor finished");
    Ok(())
}

/// Cancel the token on the first Ctrl-C so both the encoder wait and the
/// backoff sleep observe the stop request.
fn spawn_interrupt_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for interrupt signal");
            return;
        }
        info!("interrupt received; stopping stream");
        cancel.cancel();
    });
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
