//! The `{ "type": ..., "payload": ... }` envelopes exchanged with clients.
//!
//! Inbound envelopes are validated per message type when decoded. Song and queue
//! objects produced by the room API are carried as opaque JSON values.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{Frame, RoomKey, UserId};

/// The player action that marks the end of the current song.
pub const ENDED_ACTION: &str = "ended";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// An envelope sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinRoom(JoinRoom),
    SongAdded(SongAdded),
    VoteChanged(VoteChanged),
    SongChanged(SongChanged),
    PlayerEvent(PlayerEvent),
    RequestPlayerState(RequestPlayerState),
    PlayerStateResponse(PlayerStateResponse),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: RoomKey,
    pub user_id: UserId,
    pub user_name: String,
    /// Clients that leave this out join as guests
    #[serde(default)]
    pub is_host: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongAdded {
    pub room_id: RoomKey,
    pub song: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteChanged {
    pub room_id: RoomKey,
    pub song_id: String,
    pub is_voted: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongChanged {
    pub room_id: RoomKey,
    pub song_id: String,
    pub video_id: String,
    pub next_song: Value,
    pub rest: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEvent {
    pub room_id: RoomKey,
    pub user_id: UserId,
    pub action: String,
    /// Playback position in seconds
    pub current_time: f64,
    pub video_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPlayerState {
    pub room_id: RoomKey,
    pub requester_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateResponse {
    pub room_id: RoomKey,
    pub to_user_id: UserId,
    pub action: String,
    pub current_time: f64,
    pub video_id: String,
}

/// The envelope before its payload is checked against the message type.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl ClientMessage {
    /// Decodes a text frame into a message, validating the payload for its type.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;

        let message = match raw.kind.as_str() {
            "JOIN_ROOM" => Self::JoinRoom(payload("JOIN_ROOM", raw.payload)?),
            "SONG_ADDED" => Self::SongAdded(payload("SONG_ADDED", raw.payload)?),
            "VOTE_CHANGED" => Self::VoteChanged(payload("VOTE_CHANGED", raw.payload)?),
            "SONG_CHANGED" => Self::SongChanged(payload("SONG_CHANGED", raw.payload)?),
            "PLAYER_EVENT" => Self::PlayerEvent(payload("PLAYER_EVENT", raw.payload)?),
            "REQUEST_PLAYER_STATE" => {
                Self::RequestPlayerState(payload("REQUEST_PLAYER_STATE", raw.payload)?)
            }
            "PLAYER_STATE_RESPONSE" => {
                Self::PlayerStateResponse(payload("PLAYER_STATE_RESPONSE", raw.payload)?)
            }
            _ => return Err(DecodeError::UnknownType(raw.kind)),
        };

        Ok(message)
    }

    /// The room the message is addressed to.
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom(p) => &p.room_id,
            Self::SongAdded(p) => &p.room_id,
            Self::VoteChanged(p) => &p.room_id,
            Self::SongChanged(p) => &p.room_id,
            Self::PlayerEvent(p) => &p.room_id,
            Self::RequestPlayerState(p) => &p.room_id,
            Self::PlayerStateResponse(p) => &p.room_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "JOIN_ROOM",
            Self::SongAdded(_) => "SONG_ADDED",
            Self::VoteChanged(_) => "VOTE_CHANGED",
            Self::SongChanged(_) => "SONG_CHANGED",
            Self::PlayerEvent(_) => "PLAYER_EVENT",
            Self::RequestPlayerState(_) => "REQUEST_PLAYER_STATE",
            Self::PlayerStateResponse(_) => "PLAYER_STATE_RESPONSE",
        }
    }
}

fn payload<T>(kind: &'static str, value: Value) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Joined,
    Left,
}

/// An envelope sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Display names of everyone in the room, in join order
    UserList(Vec<String>),
    UserEvent {
        user_name: String,
        action: PresenceAction,
        /// Unix time in milliseconds
        timestamp: i64,
    },
    /// Sent to the host alone when a guest joins
    UserJoined { room_id: RoomKey, user_id: UserId },
    SongAdded { song: Value },
    VoteChanged {
        room_id: RoomKey,
        song_id: String,
        is_voted: bool,
    },
    SongChanged {
        room_id: RoomKey,
        song_id: String,
        video_id: String,
        rest: Value,
        next_song: Value,
    },
    PlayerEvent {
        user_id: UserId,
        action: String,
        current_time: f64,
        video_id: String,
    },
    SongEnded {
        user_id: UserId,
        video_id: String,
        room_id: RoomKey,
    },
    /// Asks the host to report its player state to a member
    SendPlayerState { to_user_id: UserId },
    PlayerStateResponse {
        to_user_id: UserId,
        action: String,
        current_time: f64,
        video_id: String,
    },
}

impl ServerMessage {
    /// Builds a presence event stamped with the current time.
    pub fn user_event(user_name: String, action: PresenceAction) -> Self {
        Self::UserEvent {
            user_name,
            action,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserList(_) => "USER_LIST",
            Self::UserEvent { .. } => "USER_EVENT",
            Self::UserJoined { .. } => "USER_JOINED",
            Self::SongAdded { .. } => "SONG_ADDED",
            Self::VoteChanged { .. } => "VOTE_CHANGED",
            Self::SongChanged { .. } => "SONG_CHANGED",
            Self::PlayerEvent { .. } => "PLAYER_EVENT",
            Self::SongEnded { .. } => "SONG_ENDED",
            Self::SendPlayerState { .. } => "SEND_PLAYER_STATE",
            Self::PlayerStateResponse { .. } => "PLAYER_STATE_RESPONSE",
        }
    }
}
