pub mod auth;
pub mod config;
pub mod gateway;

use std::sync::Arc;

use auth::verifier::CredentialVerifier;
use config::Config;
use gateway::fanout::GatewayBroadcast;
use gateway::presence::PresenceRegistry;
use gateway::rooms::RoomRegistry;
use gateway_common::SnowflakeGenerator;

/// Shared application state available to the gateway route and sessions.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub presence: Arc<PresenceRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub broadcast: Arc<GatewayBroadcast>,
    pub snowflake: Arc<SnowflakeGenerator>,
}
