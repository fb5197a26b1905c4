use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Weak},
};

use dashmap::DashMap;
use log::{debug, error, info, warn};

use crate::{
    ClientMessage, ConnectionId, Registry, RelayError, RelayResult, Router, Session, SharedOutbox,
};

/// Owns every open session and cleans up after the ones that go away.
pub struct Lifecycle {
    me: Weak<Self>,
    sessions: DashMap<ConnectionId, Session>,
    registry: Arc<Registry>,
    router: Router,
}

/// A handle to an accepted connection.
/// When this is dropped, the connection is removed from its room and the room is told.
pub struct SessionHandle {
    session: Session,
    lifecycle: Weak<Lifecycle>,
}

impl Lifecycle {
    pub fn new(registry: Arc<Registry>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            sessions: Default::default(),
            router: Router::new(registry.clone()),
            registry,
        })
    }

    /// Registers a freshly opened connection.
    pub fn accept(&self, outbox: SharedOutbox) -> SessionHandle {
        let session = Session::new(outbox);
        self.sessions.insert(session.id, session.clone());

        debug!("Accepted connection {}", session.id);

        SessionHandle {
            session,
            lifecycle: self.me.clone(),
        }
    }

    /// The number of connections currently open.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Forgets a connection, announcing its departure if it had joined a room.
    ///
    /// Closing the same connection twice does nothing the second time.
    pub fn close(&self, id: ConnectionId) {
        if self.sessions.remove(&id).is_none() {
            return;
        }

        let Some(member) = self.registry.leave(id) else {
            debug!("Connection {} closed without joining a room", id);
            return;
        };

        info!(
            "{} ({}) left room {}",
            member.display_name, member.user_id, member.room
        );

        if let Err(err) = self.router.announce_departure(&member) {
            error!(
                "Could not announce departure of {} from room {}: {}",
                member.display_name, member.room, err
            );
        }
    }

    fn handle(&self, session: &Session, text: &str) -> RelayResult<()> {
        let message = ClientMessage::decode(text)?;
        let kind = message.kind();

        catch_unwind(AssertUnwindSafe(|| self.router.dispatch(session, message)))
            .unwrap_or(Err(RelayError::Panicked { kind }))
    }
}

impl SessionHandle {
    pub fn id(&self) -> ConnectionId {
        self.session.id
    }

    /// Handles a text frame received on this connection.
    ///
    /// Errors are logged here. A returned error that [RelayError::is_fatal]
    /// means the connection must be closed.
    pub fn receive(&self, text: &str) -> RelayResult<()> {
        let Some(lifecycle) = self.lifecycle.upgrade() else {
            return Ok(());
        };

        let result = lifecycle.handle(&self.session, text);

        match &result {
            Ok(()) => {}
            Err(err) if err.is_fatal() => {
                error!("Closing connection {}: {}", self.session.id, err)
            }
            Err(err) => warn!("Dropped message from {}: {}", self.session.id, err),
        }

        result
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.lifecycle.upgrade() {
            lifecycle.close(self.session.id)
        }
    }
}
