// herakles-proc-cpu-exporter - version 0.1.0
// Per-thread CPU exporter for the running process
mod cli;
mod commands;
mod config;
mod handlers;
mod health_stats;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use prometheus::{Gauge, Registry};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info, Level};

use herakles_proc_cpu_exporter::collector::CpuSamplerCollector;

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_test};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use handlers::{doc_handler, health_handler, metrics_handler};
use health_stats::HealthStats;
use state::AppState;

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(_config: &Config, args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR, // Off not fully supported, use ERROR as minimal
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        if args.show_config {
            return show_config(&config, &args.config_format);
        }
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        let config = resolve_config(&args)?;
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }

        return match command {
            Commands::Check {
                threads,
                instruments,
                all,
            } => command_check(*threads, *instruments, *all, &config),
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),
            Commands::Test {
                iterations,
                verbose,
            } => command_test(*iterations, *verbose),
        };
    }

    // Load configuration for main server mode
    let config = resolve_config(&args)?;

    // Validate config before starting exporter
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    // Setup logging subsystem first to enable proper logging
    setup_logging(&config, &args);

    info!("Starting herakles-proc-cpu-exporter");

    // Determine bind ip and port from effective config
    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).to_string();
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    debug!("Prometheus registry initialized");

    // The collector owns both CPU instruments for the process lifetime;
    // every gather() against the registry drives one sampling cycle.
    CpuSamplerCollector::for_current_process()?.register(&registry)?;

    let scrape_duration = Gauge::new(
        "herakles_proc_cpu_scrape_duration_seconds",
        "Time spent serving the previous /metrics request",
    )?;
    if config.enable_telemetry.unwrap_or(true) {
        registry.register(Box::new(scrape_duration.clone()))?;
    }

    debug!("All metrics registered successfully");

    // Create shared application state
    let health_stats = Arc::new(HealthStats::new());
    let state = Arc::new(AppState {
        registry,
        scrape_duration,
        config: Arc::new(config.clone()),
        health_stats,
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes and start listening
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new().route("/metrics", get(metrics_handler));

    // Conditionally add human-readable endpoints
    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }
    if config.enable_doc.unwrap_or(true) {
        app = app.route("/doc", get(doc_handler));
    }

    let app = app.with_state(state);

    let tls = match (&config.tls_cert_file, &config.tls_key_file) {
        (Some(cert), Some(key)) => Some(RustlsConfig::from_pem_file(cert, key).await?),
        _ => None,
    };

    let scheme = if tls.is_some() { "https" } else { "http" };
    info!(
        "herakles-proc-cpu-exporter listening on {}://{}:{}",
        scheme, bind_ip_str, port
    );

    // Start HTTP server with graceful shutdown capability
    tokio::select! {
        result = serve(addr, app, tls) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    info!("herakles-proc-cpu-exporter stopped gracefully");
    Ok(())
}

/// Serves the router over plain HTTP or, when a rustls config is given, TLS.
async fn serve(addr: SocketAddr, app: Router, tls: Option<RustlsConfig>) -> std::io::Result<()> {
    match tls {
        Some(tls) => {
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            axum::serve(listener, app).await
        }
    }
}
