use anyhow::Result;
use clap::Parser;
use medai_client::{ApiClient, AuthSession, Config, CredentialStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "medai-client", about = "Client core for the MedAI clinical backend")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/medai-client")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("API base: {}", cfg.api.base_url);
    info!("Transcription channel base: {}", cfg.channel.base_url);

    let credentials = Arc::new(CredentialStore::open(&cfg.storage.path)?);
    let api = Arc::new(ApiClient::new(&cfg.api, Arc::clone(&credentials))?);

    let auth = AuthSession::new(Arc::clone(&api), credentials);
    auth.restore();

    match auth.current_user() {
        Some(profile) => info!("Signed in as {} ({})", profile.username, profile.role),
        None => info!("No stored session, sign-in required"),
    }

    match api.health().await {
        Ok(health) => info!("Backend health: {}", health),
        Err(e) => warn!("Backend unreachable: {}", e),
    }

    Ok(())
}
