use axum::Router;
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use leadserver::config::AppConfig;
use leadserver::kb::configure_kb_api_routes;
use leadserver::kb::webhook::WebhookClient;
use leadserver::leads::configure_lead_api_routes;
use leadserver::profile::avatar::{AvatarStorage, FsAvatarStorage};
use leadserver::profile::configure_profile_api_routes;
use leadserver::realtime::{configure_realtime_routes, CHANGE_FEED_CAPACITY};
use leadserver::shared::state::{AppState, SessionRegistry};
use leadserver::shared::utils::create_conn;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database.url)?;

    let (change_feed, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
    let avatars: Arc<dyn AvatarStorage> = Arc::new(FsAvatarStorage::new(
        config.avatars.root.clone(),
        config.avatars.public_base_url.clone(),
    ));
    let webhook = WebhookClient::new(config.webhook.kb_processing_url.clone());
    let sessions = SessionRegistry::new(pool, change_feed.clone(), avatars);

    let state = Arc::new(AppState {
        change_feed,
        webhook,
        sessions,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(configure_lead_api_routes())
        .merge(configure_kb_api_routes())
        .merge(configure_profile_api_routes())
        .merge(configure_realtime_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting lead server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
