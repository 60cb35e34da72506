//! hostforge serve - Expose host creation over HTTP

use std::net::SocketAddr;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use console::style;
use hostforge_core::config::validate_bind_address;
use hostforge_core::{Config, Provisioner};
use tokio_util::sync::CancellationToken;

use crate::server::{AppState, create_router};

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (default: from config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (default: from config)
    #[arg(long)]
    pub bind: Option<String>,
}

impl ServeArgs {
    fn socket_addr(&self, config: &Config) -> Result<SocketAddr> {
        let bind = self.bind.as_deref().unwrap_or(&config.bind_address);
        let ip = validate_bind_address(bind).map_err(|e| anyhow!(e))?;
        Ok(SocketAddr::new(ip, self.port.unwrap_or(config.port)))
    }
}

/// Serve `POST /create` until Ctrl-C
///
/// In-flight requests are cancelled on shutdown.
pub async fn cmd_serve(args: &ServeArgs, config: &Config) -> Result<()> {
    let addr = args.socket_addr(config)?;
    let provisioner = Provisioner::from_config(config)?;
    tracing::info!(
        drivers = ?provisioner.registry().names(),
        machines_dir = %provisioner.store().machines_dir().display(),
        "Starting create service"
    );

    let shutdown = CancellationToken::new();
    let app = create_router(AppState::new(provisioner, shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    eprintln!(
        "{} Listening on {}",
        style("hostforge").cyan().bold(),
        style(format!("http://{}", addr)).green()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down, cancelling in-flight requests");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}
