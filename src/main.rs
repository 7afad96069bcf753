//! handoff: HTTP/1.1 echo and static file server with WebSocket echo.
//!
//! # Usage
//!
//! ```text
//! handoff --port 1234 --public-dir public
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use handoff::service::EchoRouter;
use handoff::{Config, Server};

#[derive(Parser)]
#[command(name = "handoff", about = "HTTP/1.1 server with in-band WebSocket upgrade")]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value = "1234")]
    port: u16,

    /// Directory served for GET requests.
    #[arg(long, default_value = "public")]
    public_dir: PathBuf,

    /// Close connections that send nothing for this many seconds.
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Reject request bodies larger than this many bytes.
    #[arg(long)]
    max_body_size: Option<usize>,
}

#[tokio::main]
async fn main() -> handoff::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::new().with_bind_addr(SocketAddr::new(cli.host, cli.port));
    if let Some(secs) = cli.idle_timeout_secs {
        config = config.with_idle_timeout(Duration::from_secs(secs));
    }
    if let Some(max) = cli.max_body_size {
        config = config.with_max_body_size(max);
    }

    info!(public_dir = %cli.public_dir.display(), "serving static files");
    let server = Server::bind(config, EchoRouter::new(cli.public_dir)).await?;
    info!(addr = %server.local_addr()?, "handoff listening");

    server.run_until(shutdown_signal()).await
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}
