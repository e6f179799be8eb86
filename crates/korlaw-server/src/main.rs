mod logging;
mod mcp;

use std::sync::Arc;

use anyhow::Context;
use korlaw_core::{config::Config, transport::ReqwestTransport};
use korlaw_domains::LawTools;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::logging::{LogThreshold, NotificationLayer};
use crate::mcp::McpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol; every outbound line goes through this channel.
    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
    let log_threshold = LogThreshold::default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "korlaw_server=info,korlaw_core=info,korlaw_domains=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(NotificationLayer::new(out_tx.downgrade(), log_threshold.clone()))
        .init();

    let config = Arc::new(Config::from_env().context("failed to load configuration")?);
    let transport = Arc::new(ReqwestTransport::new(&config)?);
    info!(
        search_url = %config.search_url,
        service_url = %config.service_url,
        timeout_s = config.http_timeout_s,
        "korea-law MCP server starting on stdio"
    );

    let server = Arc::new(McpServer::new(LawTools::new(config, transport), log_threshold));
    mcp::serve(server, tokio::io::stdin(), tokio::io::stdout(), out_tx, out_rx).await?;

    info!("stdin closed, shutting down");
    Ok(())
}
