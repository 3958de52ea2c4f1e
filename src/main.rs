//! document-mcp: MCP server exposing a document store to AI assistants
//!
//! Serves a single session over stdio (default) or one TCP connection.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use document_mcp::config::{self, Config, TransportConfig};
use document_mcp::documents::{document_registry, MemoryStore};
use document_mcp::error::ServerError;
use document_mcp::mcp::{Dispatcher, Session, StdioTransport, TcpTransport};

/// MCP server exposing a document store to AI assistants.
///
/// Offers tools to read and edit documents, resources listing and fetching
/// them, and prompts for reformatting and summarising.
#[derive(Parser, Debug)]
#[command(name = "document-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr; stdout is reserved for protocol frames.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the dispatcher from the configuration.
fn build_dispatcher(cfg: &Config) -> Result<Dispatcher, String> {
    let registry = document_registry().map_err(|e| e.to_string())?;

    let store = cfg
        .documents
        .clone()
        .map_or_else(MemoryStore::seeded, MemoryStore::from);
    info!(documents = store.len(), "Document store ready");

    Ok(Dispatcher::new(
        registry,
        Box::new(store),
        cfg.server.server_info(),
    ))
}

/// Serves one session on the configured transport.
async fn serve(transport: TransportConfig, dispatcher: Dispatcher) -> Result<(), ServerError> {
    match transport {
        TransportConfig::Stdio => {
            info!("MCP server ready on stdio, waiting for client messages...");
            Session::new(StdioTransport::stdio(), dispatcher)
                .run_with_shutdown()
                .await
        }
        TransportConfig::Tcp { address } => {
            let addr: SocketAddr = address.parse().map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{address}: {e}"))
            })?;
            let transport = TcpTransport::accept_one(addr).await?;
            Session::new(transport, dispatcher).run_with_shutdown().await
        }
    }
}

/// Entry point for the document-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // GPLv3 Section 5d notice
    eprintln!(
        "document-mcp {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        name = %cfg.server.name,
        "Starting document-mcp server"
    );

    let dispatcher = match build_dispatcher(&cfg) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!(error = %e, "Failed to build capability registry");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg.transport, dispatcher)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_mcp::documents::DocumentStore;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(3, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "INFO"), Level::INFO);
        assert_eq!(get_log_level(0, false, "nonsense"), Level::WARN);
    }

    #[test]
    fn configured_documents_replace_seed_set() {
        let cfg: Config = serde_json::from_str(r#"{"documents": {"only.md": "one"}}"#).unwrap();
        let dispatcher = build_dispatcher(&cfg).unwrap();
        assert_eq!(dispatcher.store().keys(), vec!["only.md"]);
    }
}
