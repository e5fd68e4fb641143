//! TLS terminator (v1)
//!
//! Terminates TLS in front of a minimal HTTP responder, with a choice of two
//! rustls-based backends.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 TLS TERMINATOR               │
//!                        │                                              │
//!     Client ────────────┼─▶ listener ─▶ Connection ─▶ StreamHandler    │
//!                        │       ▲        (session)                     │
//!                        │       │            ▲                         │
//!                        │  SecureServer ─────┘                         │
//!                        │  (context, slots)                            │
//!                        │                                              │
//!                        │  config · lifecycle · observability          │
//!                        └──────────────────────────────────────────────┘
//! ```
//!
//! The serve loop is synchronous and runs on a blocking thread; the async
//! side only waits for a shutdown signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use tls_terminator::config::{load_config, BackendKind, TerminatorConfig};
use tls_terminator::lifecycle::{signals, Shutdown};
use tls_terminator::net::DefaultHeaders;
use tls_terminator::observability::{logging, metrics};
use tls_terminator::server::{SecureServer, ServeLoop, StaticResponder};
use tls_terminator::tls::{Certificate, RecordBackend, SessionBackend, TlsSettings, TransportBackend};

#[derive(Parser)]
#[command(name = "tls-terminator")]
#[command(about = "Terminate TLS in front of an embedded HTTP responder", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "terminator.toml")]
    config: PathBuf,

    /// Override the configured TLS backend
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(backend) = cli.backend {
        config.tls.backend = backend;
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    logging::init(&config.observability);
    tracing::info!("tls-terminator v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        max_connections = config.listener.max_connections,
        backend = config.tls.backend.as_str(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let certificate = Arc::new(Certificate::from_pem_files(
        Path::new(&config.tls.cert_path),
        Path::new(&config.tls.key_path),
    )?);

    let shutdown = Shutdown::new();
    match config.tls.backend {
        BackendKind::Session => serve(SessionBackend, certificate, &config, &shutdown).await?,
        BackendKind::Record => serve(RecordBackend, certificate, &config, &shutdown).await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn serve<B>(
    backend: B,
    certificate: Arc<Certificate>,
    config: &TerminatorConfig,
    shutdown: &Shutdown,
) -> Result<(), Box<dyn std::error::Error>>
where
    B: TransportBackend + Send + 'static,
    B::Context: Send,
    B::Session: Send,
{
    let server = SecureServer::new(
        backend,
        certificate,
        config.listener.clone(),
        TlsSettings::from(&config.tls),
    )
    .with_default_headers(DefaultHeaders::from(&config.server.default_headers));

    let mut serve_loop = ServeLoop::new(server, StaticResponder::new("ok\n"), &config.server);
    let stop = shutdown.subscribe();
    let mut worker = tokio::task::spawn_blocking(move || serve_loop.run(stop));

    tokio::select! {
        finished = &mut worker => return Ok(finished??),
        _ = signals::shutdown_on_signal(shutdown) => {}
    }

    worker.await??;
    Ok(())
}
