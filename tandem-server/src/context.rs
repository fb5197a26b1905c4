use std::sync::Arc;

use axum::extract::FromRef;
use tandem_relay::Relay;

use crate::ServerConfig;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub relay: Arc<Relay>,
    pub config: Arc<ServerConfig>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            relay: Relay::new(),
            config: Arc::new(config),
        }
    }
}
