use crate::config::{Config, JoinPolicy};
use crate::groups::GroupStore;
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub connections: ConnectionRegistry,
    pub groups: GroupStore,
    pub router: MessageRouter,
    pub join_policy: JoinPolicy,
    pub key_length: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let connections = ConnectionRegistry::with_write_timeout(config.write_timeout());
        let groups = GroupStore::new();
        let router = MessageRouter::new(connections.clone(), groups.clone());
        Self {
            connections,
            groups,
            router,
            join_policy: config.join_policy,
            key_length: config.key_length,
        }
    }
}
