//! The presence-aware broadcast gateway.

pub mod events;
pub mod fanout;
pub mod handler;
pub mod presence;
pub mod rooms;
pub mod server;
pub mod session;
