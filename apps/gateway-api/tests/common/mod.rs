use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use gateway_api::auth::cache::IdentityCache;
use gateway_api::auth::verifier::JwtVerifier;
use gateway_api::config::Config;
use gateway_api::gateway::fanout::GatewayBroadcast;
use gateway_api::gateway::presence::PresenceRegistry;
use gateway_api::gateway::rooms::RoomRegistry;
use gateway_api::AppState;

/// Shared secret used by every test token.
pub const TEST_SECRET: &str = "gateway-test-secret";

/// Build an AppState wired for tests: HS256 verifier over the test secret,
/// fresh registries, default cache TTL.
pub fn test_state() -> AppState {
    let config = Config {
        jwt_secret: TEST_SECRET.to_string(),
        port: 0,
        identity_cache_ttl_secs: 300,
    };
    let cache = IdentityCache::new(Duration::from_secs(config.identity_cache_ttl_secs));
    AppState {
        verifier: Arc::new(JwtVerifier::new(&config.jwt_secret, cache)),
        config: Arc::new(config),
        presence: Arc::new(PresenceRegistry::new()),
        rooms: Arc::new(RoomRegistry::new()),
        broadcast: Arc::new(GatewayBroadcast::new()),
        snowflake: Arc::new(gateway_common::SnowflakeGenerator::new(0)),
    }
}

/// Claims shape minted by the credential issuer (mirrored here for tests).
#[derive(Debug, Serialize)]
struct TestClaims {
    id: i64,
    username: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// Mint a valid HS256 bearer token for the given identity.
pub fn mint_token(user_id: i64, username: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TestClaims {
        id: user_id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("encode test token")
}
