use std::collections::HashMap;

use log::warn;
use parking_lot::RwLock;

use crate::{ConnectionId, Member, RoomKey};

/// Tracks which members are connected to which room.
///
/// A room only exists while it has at least one member. Every mutation takes the
/// write lock, lookups take the read lock, and no lock is held past the call.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: RwLock<HashMap<RoomKey, Vec<Member>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The member was inserted
    Joined,
    /// The room already has a member with this user id
    Duplicate,
    /// The connection is already a member of the given room
    AlreadyJoined(RoomKey),
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a member into its room, creating the room if needed.
    pub fn join(&self, member: Member) -> JoinOutcome {
        let mut rooms = self.rooms.write();

        let existing_room = rooms.iter().find_map(|(key, members)| {
            members
                .iter()
                .any(|m| m.connection == member.connection)
                .then(|| key.clone())
        });

        if let Some(room) = existing_room {
            return JoinOutcome::AlreadyJoined(room);
        }

        let members = rooms.entry(member.room.clone()).or_default();

        if members.iter().any(|m| m.user_id == member.user_id) {
            return JoinOutcome::Duplicate;
        }

        // The earliest host keeps authority, later claims are only recorded
        if member.host {
            if let Some(host) = members.iter().find(|m| m.host) {
                warn!(
                    "{} claims host of room {}, but {} is already host there",
                    member.display_name, member.room, host.display_name
                );
            }
        }

        members.push(member);
        JoinOutcome::Joined
    }

    /// Removes the member owned by a connection, dropping the room if it becomes empty.
    pub fn leave(&self, connection: ConnectionId) -> Option<Member> {
        let mut rooms = self.rooms.write();

        let (room, index) = rooms.iter().find_map(|(key, members)| {
            members
                .iter()
                .position(|m| m.connection == connection)
                .map(|i| (key.clone(), i))
        })?;

        let members = rooms.get_mut(&room)?;
        let member = members.remove(index);

        if members.is_empty() {
            rooms.remove(&room);
        }

        Some(member)
    }

    /// Returns the members of a room in the order they joined.
    pub fn members(&self, room: &str) -> Vec<Member> {
        self.rooms.read().get(room).cloned().unwrap_or_default()
    }

    /// Returns the display names of a room's members in the order they joined.
    pub fn display_names(&self, room: &str) -> Vec<String> {
        self.rooms
            .read()
            .get(room)
            .map(|members| members.iter().map(|m| m.display_name.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the first member of a room that joined as host.
    pub fn find_host(&self, room: &str) -> Option<Member> {
        self.find(room, |m| m.host)
    }

    pub fn find_by_user_id(&self, room: &str, user_id: &str) -> Option<Member> {
        self.find(room, |m| m.user_id == user_id)
    }

    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<Member> {
        self.rooms
            .read()
            .values()
            .flatten()
            .find(|m| m.connection == connection)
            .cloned()
    }

    /// Returns the keys of every room that currently has members.
    pub fn rooms(&self) -> Vec<RoomKey> {
        self.rooms.read().keys().cloned().collect()
    }

    /// The number of rooms with at least one member.
    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }

    fn find<F>(&self, room: &str, predicate: F) -> Option<Member>
    where
        F: Fn(&Member) -> bool,
    {
        self.rooms
            .read()
            .get(room)
            .and_then(|members| members.iter().find(|m| predicate(m)).cloned())
    }
}
