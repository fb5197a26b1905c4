use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::{Member, Registry, RelayError, RelayResult, ServerMessage};

/// A serialized envelope, shared between every recipient of a fan-out.
pub type Frame = Arc<str>;
pub type SharedOutbox = Arc<dyn Outbox>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection is closed")]
    Closed,
    #[error("outbound queue is full")]
    Full,
}

/// The sending side of a connection.
///
/// Implementations must never block: a peer that cannot keep up has to reject
/// the frame with [DeliveryError::Full] instead of stalling the caller.
pub trait Outbox: Send + Sync {
    /// Whether the connection can still accept frames.
    fn is_open(&self) -> bool;
    /// Queues a frame for the connection.
    fn deliver(&self, frame: Frame) -> Result<(), DeliveryError>;
}

/// Delivers envelopes to members of a room.
///
/// Transport only ever reads the registry. Members whose connection is gone are
/// skipped here and left for the lifecycle manager to remove.
#[derive(Clone)]
pub struct Transport {
    registry: Arc<Registry>,
}

impl Transport {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Sends a message to every member of a room, returning how many members it was delivered to.
    pub fn broadcast(&self, room: &str, message: &ServerMessage) -> RelayResult<usize> {
        let members = self.registry.members(room);

        if members.is_empty() {
            debug!(
                "Not broadcasting {} to room {}: no members",
                message.kind(),
                room
            );
            return Ok(0);
        }

        let frame = encode(message)?;
        let delivered = members
            .iter()
            .filter(|m| deliver(m, &frame, message.kind()))
            .count();

        Ok(delivered)
    }

    /// Sends a message to the member of a room with the given user id, if present.
    pub fn unicast(&self, room: &str, user_id: &str, message: &ServerMessage) -> RelayResult<bool> {
        match self.registry.find_by_user_id(room, user_id) {
            Some(member) => self.send_to(&member, message),
            None => {
                debug!(
                    "Not sending {} to {} in room {}: no such member",
                    message.kind(),
                    user_id,
                    room
                );
                Ok(false)
            }
        }
    }

    /// Sends a message to a member that was already looked up.
    pub fn send_to(&self, member: &Member, message: &ServerMessage) -> RelayResult<bool> {
        let frame = encode(message)?;
        Ok(deliver(member, &frame, message.kind()))
    }
}

fn encode(message: &ServerMessage) -> RelayResult<Frame> {
    message.encode().map_err(|source| RelayError::Encode {
        kind: message.kind(),
        source,
    })
}

fn deliver(member: &Member, frame: &Frame, kind: &str) -> bool {
    let outbox = member.outbox();

    if !outbox.is_open() {
        debug!(
            "Skipping {} for closed connection {} ({})",
            kind, member.connection, member.display_name
        );
        return false;
    }

    match outbox.deliver(frame.clone()) {
        Ok(()) => true,
        Err(DeliveryError::Full) => {
            warn!(
                "Dropped {} for {} in room {}: connection {} is not keeping up",
                kind, member.display_name, member.room, member.connection
            );
            false
        }
        Err(DeliveryError::Closed) => {
            debug!(
                "Connection {} closed before {} could be delivered",
                member.connection, kind
            );
            false
        }
    }
}
