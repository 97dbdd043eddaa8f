//! WhatsApp commerce bot and workshop appointments API server

use commerce_bot_api::api;
use commerce_bot_api::core::appointments::SchedulingService;
use commerce_bot_api::core::assistant::OpenAiAssistant;
use commerce_bot_api::core::inventory::{StockLedger, SupplierDirectory};
use commerce_bot_api::core::router::{ProcessingRegistry, WhatsAppRouter};
use commerce_bot_api::core::services::{ChatHistoryService, WorkshopCatalog};
use commerce_bot_api::infrastructure::config::AppConfig;
use commerce_bot_api::infrastructure::database::DatabaseConnection;
use commerce_bot_api::infrastructure::messaging::TwilioMessenger;
use commerce_bot_api::infrastructure::orders::HttpOrderStatusApi;
use commerce_bot_api::infrastructure::repositories::{
    DbAppointmentRepository, DbChatRepository, DbInventoryRepository, DbSupplierRepository,
    DbWorkshopRepository,
};

use anyhow::anyhow;
use axum::http::{HeaderValue, Method};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::{info, warn};
use tokio::runtime::{Builder, Runtime};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    AppConfig::install(config.clone());

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(web_server_task(config))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin `{origin}`");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(origins)
}

async fn web_server_task(config: AppConfig) -> anyhow::Result<()> {
    let pool = DatabaseConnection::connect_and_migrate(&config.database_url).await?;
    DatabaseConnection::install_pool(pool);

    let provider = ServiceCollection::new()
        .add(AppConfig::singleton())
        .add(DatabaseConnection::singleton())
        .add(ProcessingRegistry::singleton())
        .add(TwilioMessenger::singleton())
        .add(HttpOrderStatusApi::singleton())
        .add(OpenAiAssistant::singleton())
        .add(DbWorkshopRepository::scoped())
        .add(DbAppointmentRepository::scoped())
        .add(DbChatRepository::scoped())
        .add(DbSupplierRepository::scoped())
        .add(DbInventoryRepository::scoped())
        .add(ChatHistoryService::scoped())
        .add(WorkshopCatalog::scoped())
        .add(SchedulingService::scoped())
        .add(SupplierDirectory::scoped())
        .add(StockLedger::scoped())
        .add(WhatsAppRouter::scoped())
        .build_provider()
        .map_err(|e| anyhow!("failed to build service provider: {e:?}"))?;

    let app = api::router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config)),
        )
        .with_provider(provider);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    info!("Shutting down...");

    Ok(())
}
