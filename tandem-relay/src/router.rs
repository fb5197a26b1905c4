use std::sync::Arc;

use log::{debug, info, warn};

use crate::{
    protocol::{
        JoinRoom, PlayerEvent, PlayerStateResponse, RequestPlayerState, SongAdded, SongChanged,
        VoteChanged, ENDED_ACTION,
    },
    ClientMessage, JoinOutcome, Member, PresenceAction, Registry, RelayResult, ServerMessage,
    Session, Transport,
};

/// Interprets client messages and decides who gets told what.
///
/// The router keeps no state of its own. Room membership lives in the
/// [Registry], everything else (queue, votes, playback) lives with the clients
/// and the room API, and is only passed through.
#[derive(Clone)]
pub struct Router {
    registry: Arc<Registry>,
    transport: Transport,
}

impl Router {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            transport: Transport::new(registry.clone()),
            registry,
        }
    }

    /// Handles a message sent by a session.
    ///
    /// Anything but a join is only accepted from a member of the room it is addressed to.
    pub fn dispatch(&self, session: &Session, message: ClientMessage) -> RelayResult<()> {
        if let ClientMessage::JoinRoom(payload) = message {
            return self.join_room(session, payload);
        }

        let sender = self
            .registry
            .find_by_connection(session.id)
            .filter(|m| m.room == message.room_id());

        let Some(sender) = sender else {
            warn!(
                "Dropped {} for room {} from connection {}: not a member of that room",
                message.kind(),
                message.room_id(),
                session.id
            );
            return Ok(());
        };

        match message {
            // Handled above
            ClientMessage::JoinRoom(_) => Ok(()),
            ClientMessage::SongAdded(payload) => self.song_added(payload),
            ClientMessage::VoteChanged(payload) => self.vote_changed(payload),
            ClientMessage::SongChanged(payload) => self.song_changed(payload),
            ClientMessage::PlayerEvent(payload) => self.player_event(&sender, payload),
            ClientMessage::RequestPlayerState(payload) => self.request_player_state(payload),
            ClientMessage::PlayerStateResponse(payload) => self.player_state_response(payload),
        }
    }

    /// Tells the rest of a room that a member is gone.
    pub fn announce_departure(&self, member: &Member) -> RelayResult<()> {
        self.announce_presence(&member.room, &member.display_name, PresenceAction::Left)
    }

    fn join_room(&self, session: &Session, payload: JoinRoom) -> RelayResult<()> {
        let member = session.member(
            payload.room_id,
            payload.user_id,
            payload.user_name,
            payload.is_host,
        );

        match self.registry.join(member.clone()) {
            JoinOutcome::Joined => {}
            JoinOutcome::Duplicate => {
                warn!(
                    "User {} ({}) is already in room {}, ignoring join",
                    member.display_name, member.user_id, member.room
                );
                return Ok(());
            }
            JoinOutcome::AlreadyJoined(room) => {
                warn!(
                    "Connection {} already joined room {}, ignoring join to {}",
                    session.id, room, member.room
                );
                return Ok(());
            }
        }

        info!(
            "{} ({}) joined room {} as {}",
            member.display_name,
            member.user_id,
            member.room,
            member.role()
        );

        if let Some(host) = self.registry.find_host(&member.room) {
            if host.user_id != member.user_id {
                self.transport.send_to(
                    &host,
                    &ServerMessage::UserJoined {
                        room_id: member.room.clone(),
                        user_id: member.user_id.clone(),
                    },
                )?;
            }
        }

        self.announce_presence(&member.room, &member.display_name, PresenceAction::Joined)
    }

    fn song_added(&self, payload: SongAdded) -> RelayResult<()> {
        let message = ServerMessage::SongAdded { song: payload.song };

        self.transport.broadcast(&payload.room_id, &message)?;
        Ok(())
    }

    fn vote_changed(&self, payload: VoteChanged) -> RelayResult<()> {
        let message = ServerMessage::VoteChanged {
            room_id: payload.room_id.clone(),
            song_id: payload.song_id,
            is_voted: payload.is_voted,
        };

        self.transport.broadcast(&payload.room_id, &message)?;
        Ok(())
    }

    fn song_changed(&self, payload: SongChanged) -> RelayResult<()> {
        let message = ServerMessage::SongChanged {
            room_id: payload.room_id.clone(),
            song_id: payload.song_id,
            video_id: payload.video_id,
            rest: payload.rest,
            next_song: payload.next_song,
        };

        self.transport.broadcast(&payload.room_id, &message)?;
        Ok(())
    }

    fn player_event(&self, sender: &Member, payload: PlayerEvent) -> RelayResult<()> {
        // The host record has to belong to the connection that sent the event
        if !sender.host || sender.user_id != payload.user_id {
            warn!(
                "Unauthorized PLAYER_EVENT from {} as {} on connection {} in room {} (not host)",
                sender.user_id, payload.user_id, sender.connection, payload.room_id
            );
            return Ok(());
        }

        if payload.action == ENDED_ACTION {
            info!("Song {} ended in room {}", payload.video_id, payload.room_id);

            self.transport.broadcast(
                &payload.room_id,
                &ServerMessage::SongEnded {
                    user_id: payload.user_id.clone(),
                    video_id: payload.video_id.clone(),
                    room_id: payload.room_id.clone(),
                },
            )?;
        }

        self.transport.broadcast(
            &payload.room_id,
            &ServerMessage::PlayerEvent {
                user_id: payload.user_id,
                action: payload.action,
                current_time: payload.current_time,
                video_id: payload.video_id,
            },
        )?;

        Ok(())
    }

    fn request_player_state(&self, payload: RequestPlayerState) -> RelayResult<()> {
        let Some(host) = self.registry.find_host(&payload.room_id) else {
            debug!(
                "{} asked for player state, but room {} has no host",
                payload.requester_id, payload.room_id
            );
            return Ok(());
        };

        if host.user_id == payload.requester_id {
            debug!(
                "Host {} asked itself for player state in room {}, ignoring",
                host.user_id, payload.room_id
            );
            return Ok(());
        }

        self.transport.send_to(
            &host,
            &ServerMessage::SendPlayerState {
                to_user_id: payload.requester_id,
            },
        )?;

        Ok(())
    }

    fn player_state_response(&self, payload: PlayerStateResponse) -> RelayResult<()> {
        let message = ServerMessage::PlayerStateResponse {
            to_user_id: payload.to_user_id.clone(),
            action: payload.action,
            current_time: payload.current_time,
            video_id: payload.video_id,
        };

        self.transport
            .unicast(&payload.room_id, &payload.to_user_id, &message)?;

        Ok(())
    }

    fn announce_presence(
        &self,
        room: &str,
        display_name: &str,
        action: PresenceAction,
    ) -> RelayResult<()> {
        let names = self.registry.display_names(room);

        self.transport
            .broadcast(room, &ServerMessage::UserList(names))?;
        self.transport.broadcast(
            room,
            &ServerMessage::user_event(display_name.to_string(), action),
        )?;

        Ok(())
    }
}
