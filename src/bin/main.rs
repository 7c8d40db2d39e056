use courier_lead_bot::{
    cache::{FileReferenceSource, IncomeCache},
    config::BotConfig,
    dialogue::{catalog::default_priority_cities, DialogueEngine, Event},
    leads::{lead_row, InMemoryLeadSink},
    models::UserRef,
    router::{EventRouter, InboundEvent},
    session::InMemorySessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SCRIPT: &[&str] = &[
    "/start",
    "calc_income",
    "age_yes",
    "citizenship_by",
    "cities_page_0",
    "city_Казань",
    "delivery_car",
    "calc_income",
    "age_yes",
    "citizenship_by",
    "city_Казань",
    "delivery_bike",
    "income_bonus",
    "send_lead",
    "send_lead",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/income.json".to_string());

    info!("Courier Lead Bot simulation, income table: {}", path);

    // Create components
    let source = Arc::new(FileReferenceSource::new(path));
    let cache = Arc::new(IncomeCache::new(source, Duration::from_secs(3600)));
    cache.refresh().await?;

    let sink = Arc::new(InMemoryLeadSink::new());
    let router = EventRouter::new(
        Arc::new(InMemorySessionStore::new()),
        DialogueEngine::new(cache, default_priority_cities()),
        sink.clone(),
    );

    let user = UserRef {
        id: 42,
        username: Some("demo_rider".to_string()),
    };

    for step in SCRIPT {
        let event = if step.starts_with('/') {
            Event::from_text(step)
        } else {
            Event::from_callback(step)
        };

        let routed = router
            .route(InboundEvent {
                user: user.clone(),
                event,
            })
            .await?;

        println!("\n>>> {}", step);
        println!("{}", serde_json::to_string_pretty(&routed)?);
    }

    println!("\n=== LEADS ===");
    let offset = BotConfig::default().lead_timestamp_offset;
    for lead in sink.leads().await {
        println!("{}", serde_json::to_string(&lead_row(&lead, offset))?);
    }

    Ok(())
}
