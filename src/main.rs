//! herakles-dht-exporter - version 0.1.0
//!
//! Prometheus exporter for DHT temperature and humidity sensors.
//! This is the main entry point that initializes the server and handles subcommands.

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tokio::time::Instant;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

use herakles_dht_exporter::cli::{Args, Commands, LogLevel};
use herakles_dht_exporter::commands::{command_config, command_read};
use herakles_dht_exporter::config::{
    resolve_config, show_config, validate_effective_config, Config,
};
use herakles_dht_exporter::sampler::{Sampler, SamplerSettings};
use herakles_dht_exporter::sensor::open_sensor;
use herakles_dht_exporter::server::{bind, build_router, serve};
use herakles_dht_exporter::shutdown::{spawn_signal_handler, Shutdown};
use herakles_dht_exporter::state::AppState;

/// How long to wait for the sampler task after the server stopped.
const SAMPLER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let log_level = match config.log_level() {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("⚠️  Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", log_level);
}

/// Helper function to load and validate configuration.
fn load_validated_config(args: &Args) -> anyhow::Result<Config> {
    let config = resolve_config(args)?;
    validate_effective_config(&config)?;
    Ok(config)
}

/// Runs the exporter until SIGINT/SIGTERM.
async fn run_server(config: Config) -> anyhow::Result<()> {
    setup_logging(&config);
    info!("Starting herakles-dht-exporter {}", env!("CARGO_PKG_VERSION"));

    let addr = config.listen_addr()?;
    let grace = config.shutdown_grace();
    let settings = SamplerSettings::from_config(&config);
    let sensor = open_sensor(&config)?;

    let start_time = Instant::now();
    let state = AppState::new(config, start_time)?;

    // Bind before sampling so a taken port fails fast
    let listener = bind(addr).await?;
    info!("herakles-dht-exporter listening on http://{}", addr);

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone())?;

    let sampler = Sampler::new(
        sensor,
        settings,
        state.metrics.clone(),
        state.health_stats.clone(),
    );
    let sampler_handle = tokio::spawn(sampler.run(shutdown.listener()));

    let router = build_router(state.clone());
    let result = serve(
        listener,
        router,
        state.lifecycle.clone(),
        shutdown.listener(),
        grace,
    )
    .await;

    // The server may also stop on its own error
    shutdown.trigger();
    if tokio::time::timeout(SAMPLER_STOP_TIMEOUT, sampler_handle)
        .await
        .is_err()
    {
        warn!("Sampler did not stop within {:?}", SAMPLER_STOP_TIMEOUT);
    }

    result?;
    info!("herakles-dht-exporter stopped gracefully");
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            validate_effective_config(&config)?;
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, &args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::Read { iterations, format } => {
                let config = load_validated_config(&args)?;
                setup_logging(&config);
                let iterations = *iterations;
                let format = format.clone();
                tokio::task::spawn_blocking(move || command_read(iterations, format, &config))
                    .await?
            }
        };
    }

    let config = load_validated_config(&args)?;
    run_server(config).await
}

/// Main application entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
