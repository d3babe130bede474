//! bookmarks-alive-exporter
//!
//! Prometheus exporter reporting the HTTP status of bookmarked URLs.
//! This is the main entry point that initializes the server and handles subcommands.

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use bookmarks_alive_exporter::cli::{Args, Commands, LogLevel};
use bookmarks_alive_exporter::commands::{command_check, command_config, command_test};
use bookmarks_alive_exporter::config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use bookmarks_alive_exporter::prober::{install_rustls_provider, HttpProber};
use bookmarks_alive_exporter::server;
use bookmarks_alive_exporter::source::SqliteSource;
use bookmarks_alive_exporter::state::AppState;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
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
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves once SIGINT or SIGTERM has been received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = match resolve_config(&args) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
        };

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        setup_logging(&args);
        let config = load_validated_config(&args)?;

        let result = match command {
            Commands::Check { verbose } => command_check(*verbose, &config).await,
            Commands::Test {
                iterations,
                verbose,
            } => command_test(*iterations, *verbose, &config).await,
            Commands::Config { .. } => Ok(()),
        };

        if let Err(e) = result {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    setup_logging(&args);
    let config = load_validated_config(&args)?;

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).to_string();
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let grace = config.shutdown_grace();

    // The bookmarks store must be reachable before we start serving
    let source = match SqliteSource::connect(config.db(), config.query()).await {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("Cannot open bookmarks store {}: {}", config.db(), e);
            std::process::exit(1);
        }
    };
    if let Err(e) = source.ping().await {
        error!("Bookmarks store {} is not usable: {}", config.db(), e);
        std::process::exit(1);
    }
    info!("Using bookmarks store: {}", config.db());

    let prober = Arc::new(HttpProber::new(config.user_agent(), config.probe_timeout())?);
    info!(
        user_agent = prober.user_agent(),
        timeout_secs = prober.timeout().as_secs(),
        "HTTP prober ready"
    );

    let enable_tls = config.enable_tls.unwrap_or(false);
    let tls_paths = (config.tls_cert_path.clone(), config.tls_key_path.clone());

    // Root of every collection run's cancellation; fired after the grace period
    let root = CancellationToken::new();
    let state = AppState::new(config, source.clone(), prober, root)?;

    let settings = state.orchestrator.settings();
    info!(
        workers = settings.workers,
        scrape_timeout_secs = settings.deadline.as_secs(),
        serialize_scrapes = settings.serialize_runs,
        "Collection settings"
    );

    let served = if enable_tls {
        let (Some(cert_path), Some(key_path)) = tls_paths else {
            return Err("TLS is enabled but certificate or key path is missing".into());
        };

        install_rustls_provider();
        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "bookmarks-alive-exporter listening on https://{}:{}",
            bind_ip_str, port
        );
        server::serve_tls(addr, tls_config, state, shutdown_signal(), grace).await
    } else {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind {}: {}", addr, e);
            e
        })?;
        info!(
            "bookmarks-alive-exporter listening on http://{}:{}",
            bind_ip_str, port
        );
        server::serve(listener, state, shutdown_signal(), grace).await
    };

    source.close().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("bookmarks-alive-exporter stopped gracefully");
    Ok(())
}
