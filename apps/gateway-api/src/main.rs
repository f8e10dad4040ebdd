use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_api::auth::cache::IdentityCache;
use gateway_api::auth::verifier::JwtVerifier;
use gateway_api::config::Config;
use gateway_api::gateway::fanout::GatewayBroadcast;
use gateway_api::gateway::presence::PresenceRegistry;
use gateway_api::gateway::rooms::RoomRegistry;
use gateway_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // The verified-identity cache lives for the whole process and is owned
    // by the verifier.
    let cache = IdentityCache::new(Duration::from_secs(config.identity_cache_ttl_secs));
    let verifier = Arc::new(JwtVerifier::new(&config.jwt_secret, cache));

    let state = AppState {
        config: Arc::new(config),
        verifier,
        presence: Arc::new(PresenceRegistry::new()),
        rooms: Arc::new(RoomRegistry::new()),
        broadcast: Arc::new(GatewayBroadcast::new()),
        snowflake: Arc::new(gateway_common::SnowflakeGenerator::new(0)),
    };

    // Permissive by default; tighten in production deployments.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(gateway_api::gateway::server::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "gateway-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
