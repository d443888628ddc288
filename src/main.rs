//! Portcullis - session-gated reverse proxy

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portcullis::{config::Args, server, AppState, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("portcullis={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = match GatewayConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("======================================");
    info!("  Portcullis - Auth Proxy");
    info!(
        "  build {} ({})",
        env!("GIT_COMMIT_SHORT"),
        env!("BUILD_TIMESTAMP")
    );
    info!("======================================");
    info!("Listen: {}", config.listen);
    info!("Target: {}", config.target);
    info!("User: {} ({})", config.username, config.credential.mode());
    info!("Session lifetime: {}s", config.session_max_age.as_secs());
    info!("Secure cookies: {}", config.cookie_secure);
    match &config.static_dir {
        Some(dir) => info!("Static assets: {}", dir.display()),
        None => info!("Static assets: disabled"),
    }
    info!("======================================");

    if config.session_secret.is_generated() {
        warn!("No cookie secret configured; generated one for this run. Sessions will not survive a restart.");
    }

    let state = Arc::new(AppState::new(config)?);
    server::run(state).await?;

    Ok(())
}
