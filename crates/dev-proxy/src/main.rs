#![forbid(unsafe_code)]

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use log::info;
use portal_dev_proxy::{router, ProxyConfig, DEFAULT_PREFIX, DEFAULT_TARGET};
use url::Url;

/// Forward `/api` requests to the backend during local development.
#[derive(Parser)]
#[command(name = "dev-proxy")]
struct Cli {
    /// Address to listen on.
    #[clap(long, env = "DEV_PROXY_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Where forwarded requests go.
    #[clap(long, env = "DEV_PROXY_TARGET", default_value = DEFAULT_TARGET)]
    target: Url,
    /// Path prefix to forward and strip.
    #[clap(long, default_value = DEFAULT_PREFIX)]
    prefix: String,
    /// Verify the upstream's certificate.
    #[clap(long)]
    secure: bool,
}

impl Cli {
    async fn exec(self) -> anyhow::Result<()> {
        let Self {
            listen,
            target,
            prefix,
            secure,
        } = self;
        let app = router(ProxyConfig {
            prefix: prefix.clone(),
            target: target.clone(),
            accept_invalid_certs: !secure,
        })?;
        let listener = tokio::net::TcpListener::bind(listen)
            .await
            .with_context(|| format!("Failed to listen on {listen}"))?;
        info!("Forwarding http://{listen}{prefix} to {target}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut guard = portal_bin_utils::logger::init("dev-proxy");
    Cli::parse().exec().await?;
    guard.disarm();
    Ok(())
}
