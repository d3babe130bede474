//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("bookmarks-alive-exporter.yaml"),
    };

    let yaml = matches!(format, ConfigFormat::Yaml);
    let mut content = render_config(&config, format)?;
    if yaml && commented {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Bookmarks Alive Exporter Configuration
# ======================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 8000                   # HTTP port
#
# Bookmarks Store
# ---------------
# db: "./bookmarks.db"         # SQLite file path or sqlite: URL (opened read-only)
# query: "SELECT url FROM bookmarks"  # Must return one URL per row
#
# Probing
# -------
# user_agent: "bookmarks-alive-exporter/x.y.z"  # User-Agent for outbound probes
# workers: 20                  # Concurrent probes per scrape
# probe_timeout_secs: 5        # Timeout of a single probe
# scrape_timeout_secs: 30      # Deadline of a whole scrape-triggered run
#
# Performance Tuning
# ------------------
# url_queue_capacity: 100      # Bounded queue between store reader and workers
# result_queue_capacity: 1000  # Bounded channel between workers and gauge store
# serialize_scrapes: false     # true = overlapping scrapes wait for each other
# shutdown_grace_secs: 5       # Time in-flight scrapes get on SIGTERM
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_telemetry: true       # Export bookmarks_alive_exporter_* metrics
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
