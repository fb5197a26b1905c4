use std::fmt::Debug;

use crate::{ConnectionId, SharedOutbox};

/// The opaque key clients use to name a room.
pub type RoomKey = String;
/// The opaque user identifier supplied by the identity provider.
pub type UserId = String;

/// An accepted connection that may or may not have joined a room yet.
///
/// A session on its own is inert. It only becomes visible to other clients
/// once it is turned into a [Member] and inserted into the registry.
#[derive(Clone)]
pub struct Session {
    pub id: ConnectionId,
    outbox: SharedOutbox,
}

/// A connection's identity and role within a room.
///
/// Fields are fixed at join time. A reconnect produces a new record with a new
/// [ConnectionId] rather than mutating this one.
#[derive(Clone)]
pub struct Member {
    /// The connection this member record belongs to
    pub connection: ConnectionId,
    pub room: RoomKey,
    pub user_id: UserId,
    /// The name shown in presence lists
    pub display_name: String,
    /// Whether the client claimed to be the playback host when joining
    pub host: bool,
    outbox: SharedOutbox,
}

impl Session {
    pub fn new(outbox: SharedOutbox) -> Self {
        Self {
            id: ConnectionId::next(),
            outbox,
        }
    }

    /// Creates the member record this session would occupy in a room.
    pub fn member(
        &self,
        room: RoomKey,
        user_id: UserId,
        display_name: String,
        host: bool,
    ) -> Member {
        Member {
            connection: self.id,
            outbox: self.outbox.clone(),
            room,
            user_id,
            display_name,
            host,
        }
    }
}

impl Member {
    /// The transport handle of this member's connection.
    pub fn outbox(&self) -> &SharedOutbox {
        &self.outbox
    }

    pub fn role(&self) -> &'static str {
        if self.host {
            "host"
        } else {
            "guest"
        }
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("open", &self.outbox.is_open())
            .finish()
    }
}

impl Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("connection", &self.connection)
            .field("room", &self.room)
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field("host", &self.host)
            .finish()
    }
}
