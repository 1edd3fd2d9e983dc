//! Broadcast hub: per-channel fan-out with replay, exposed over HTTP.

mod channel;
mod config;
mod handler;
mod hub;
mod subscription;

pub use config::ServerConfig;
pub use hub::Server;
pub use subscription::Subscription;
