use courier_lead_bot::{
    api::start_server,
    cache::{FileReferenceSource, HttpReferenceSource, IncomeCache, ReferenceSource},
    config::BotConfig,
    dialogue::DialogueEngine,
    leads::build_lead_sink,
    router::EventRouter,
    session::InMemorySessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    let config = BotConfig::from_env()?;
    let bot_token = config.require_bot_token()?.to_string();

    info!("🚀 Courier Lead Bot - webhook server");
    info!("📍 Port: {}", config.port);

    let source: Arc<dyn ReferenceSource> = match (&config.income_source_url, &config.income_source_file) {
        (Some(url), _) => Arc::new(HttpReferenceSource::new(
            url.clone(),
            config.income_source_token.clone(),
        )?),
        (None, Some(path)) => Arc::new(FileReferenceSource::new(path.clone())),
        (None, None) => {
            return Err("set INCOME_SOURCE_URL or INCOME_SOURCE_FILE".into());
        }
    };
    info!("📊 Income source: {}", source.name());

    // No external lead sink means no start
    let sink = build_lead_sink(&config)?;

    // Create components
    let cache = Arc::new(IncomeCache::new(source, config.income_refresh_interval));
    cache.start_background_refresh().await;
    if !cache.is_loaded() {
        warn!("Income table is not loaded yet; income questions will fail until it is");
    }

    let store = Arc::new(InMemorySessionStore::new());
    let sweep_every = (config.session_idle_timeout / 4).min(Duration::from_secs(600));
    let _sweeper = store.spawn_idle_sweeper(sweep_every, config.session_idle_timeout);
    let engine = DialogueEngine::new(cache, config.priority_cities.clone());
    let router = Arc::new(EventRouter::new(store, engine, sink));

    info!("✅ Router initialized");

    info!("📡 Starting webhook server...");
    start_server(router, &bot_token, config.port).await?;

    Ok(())
}
