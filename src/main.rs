use clap::Parser;
use std::sync::Arc;

use passgate::auth::{
    build_notifier, AuthDeps, AuthService, InMemoryUserStore, RandomOtp, SqliteUserStore,
    TokenIssuer, UserStore,
};
use passgate::logging::setup_logging;
use passgate::{Settings, WebServer};

fn open_store(settings: &Settings) -> Result<Arc<dyn UserStore>, Box<dyn std::error::Error>> {
    if settings.uses_in_memory_store() {
        log::warn!("Using the in-memory user store; accounts are lost on restart");
        return Ok(Arc::new(InMemoryUserStore::new()));
    }

    if let Some(parent) = std::path::Path::new(&settings.database).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteUserStore::open(&settings.database)?;
    log::info!("User store: {}", settings.database);
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::parse();
    let _logger = setup_logging(&settings.log_level, settings.log_dir.as_deref())?;

    log::info!("Starting {} v{}", passgate::NAME, passgate::VERSION);

    let store = open_store(&settings)?;
    let tokens = Arc::new(TokenIssuer::new(settings.jwt_config()?));
    let deps = AuthDeps::new(store, tokens)
        .with_hasher(Arc::new(settings.hasher()?))
        .with_otp(Arc::new(RandomOtp))
        .with_notifier(build_notifier(settings.email_config()));
    let auth = Arc::new(AuthService::new(deps));

    WebServer::new(settings.web_config(), auth).start().await?;
    Ok(())
}
