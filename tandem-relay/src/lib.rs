mod error;
mod id;
mod lifecycle;
mod member;
mod protocol;
mod registry;
mod router;
mod transport;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use error::*;
pub use id::*;
pub use lifecycle::*;
pub use member::*;
pub use protocol::*;
pub use registry::*;
pub use router::*;
pub use transport::*;

/// The tandem relay, keeping the clients of each room in sync with one another.
///
/// The relay only knows who is connected to which room. Queue, vote and playback
/// state belong to the clients and are passed along without being inspected.
pub struct Relay {
    registry: Arc<Registry>,
    lifecycle: Arc<Lifecycle>,
}

impl Relay {
    pub fn new() -> Arc<Self> {
        let registry = Arc::new(Registry::new());

        Arc::new(Self {
            lifecycle: Lifecycle::new(registry.clone()),
            registry,
        })
    }

    /// Accepts a new connection. Dropping the returned handle disconnects it.
    pub fn connect(&self, outbox: SharedOutbox) -> SessionHandle {
        self.lifecycle.accept(outbox)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.lifecycle.connection_count()
    }
}
