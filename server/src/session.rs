//! Session routing between connections and the room.
//!
//! The router binds every connection to an [`Identity`](crate::client_manager::Identity),
//! interprets inbound protocol messages, and keeps each identity's cached role
//! in step with the room. Every handler mutates the room and the role cache
//! together, then emits the broadcasts that describe the change before it
//! returns, so clients observe transitions in server order.
//!
//! Deferred work (offering a vacated slot to spectators, returning to the
//! lobby after a game) is kept as deadlines keyed by [`TimerKey`]. Scheduling
//! a key that is already pending replaces it. Timers re-check the room when
//! they fire because anything may have happened in between.

use crate::broadcast::{Broadcaster, Outbound};
use crate::client_manager::{ClientId, ClientManager};
use crate::error::SessionError;
use crate::room::{Room, RoomEvent};
use log::{debug, info, warn};
use serde::Serialize;
use shared::{
    ClientMessage, GameStatus, PaddleInput, Role, ServerMessage, Slot, RECLAIM_DELAY_MS,
    RESET_DELAY_MS,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Announce that a vacated slot may be claimed by a spectator.
    SlotReclaim(Slot),
    /// Return the room to the lobby after a finished game.
    GameReset,
}

/// Liveness report served on the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub players: Vec<String>,
    pub spectators: usize,
    pub game_status: GameStatus,
}

pub struct SessionRouter {
    room: Room,
    clients: ClientManager,
    broadcaster: Broadcaster,
    timers: HashMap<TimerKey, Instant>,
}

impl SessionRouter {
    pub fn new(room: Room, max_clients: usize) -> Self {
        Self {
            room,
            clients: ClientManager::new(max_clients),
            broadcaster: Broadcaster::new(),
            timers: HashMap::new(),
        }
    }

    /// Read-only view of the room, for health reporting and tests.
    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Connected identities and their cached roles.
    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Registers a new connection and greets it.
    ///
    /// While a game is in progress the newcomer is made a spectator right away
    /// and also receives the current game state.
    pub fn connect(&mut self, outbound: Outbound) -> Result<ClientId, SessionError> {
        let client_id = self.clients.add_client().ok_or(SessionError::ServerFull)?;
        self.broadcaster.register(client_id.clone(), outbound);

        if self.room.game_in_progress() {
            self.room.add_spectator(&client_id);
            self.clients.set_role(&client_id, Some(Role::Spectator));
            self.send(
                &client_id,
                ServerMessage::RoleAssigned {
                    role: Role::Spectator,
                },
            );
            self.send(&client_id, ServerMessage::LobbyUpdate(self.room.lobby_snapshot()));
            self.send(&client_id, ServerMessage::GameState(self.room.game_snapshot()));
        } else {
            self.send(&client_id, ServerMessage::LobbyUpdate(self.room.lobby_snapshot()));
        }

        Ok(client_id)
    }

    /// Decodes and handles one inbound text frame.
    ///
    /// Undecodable frames and frames from unknown identities are dropped
    /// without touching any state.
    pub fn handle_frame(&mut self, client_id: &str, text: &str) {
        let result = ClientMessage::from_json(text)
            .map_err(SessionError::from)
            .and_then(|message| self.handle_message(client_id, message));

        match result {
            Ok(()) => {}
            Err(SessionError::MalformedMessage(e)) => {
                warn!("Dropping malformed message from {}: {}", client_id, e)
            }
            Err(e) => debug!("Ignoring message from {}: {}", client_id, e),
        }
    }

    pub fn handle_message(
        &mut self,
        client_id: &str,
        message: ClientMessage,
    ) -> Result<(), SessionError> {
        if !self.clients.contains(client_id) {
            return Err(SessionError::UnknownIdentity(client_id.to_string()));
        }

        match message {
            ClientMessage::JoinLobby { role } => self.join_lobby(client_id, role),
            ClientMessage::TakePlayerSlot { slot } => self.take_player_slot(client_id, slot),
            ClientMessage::PaddleMove { direction } => self.paddle_move(client_id, direction),
        }
        Ok(())
    }

    fn join_lobby(&mut self, client_id: &str, requested: Role) {
        let name = self.clients.name(client_id).unwrap_or_default().to_string();

        self.room.remove_player(client_id);
        self.clients.set_role(client_id, None);

        let forced = self.room.game_in_progress();
        let role = match requested.slot() {
            Some(slot) if !forced => match self.room.add_player(client_id, slot, &name) {
                Ok(_) => slot.role(),
                Err(e) => {
                    warn!("{} could not join as {}: {}", client_id, slot, e);
                    self.send(
                        client_id,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    );
                    Role::Spectator
                }
            },
            _ => Role::Spectator,
        };
        if role == Role::Spectator {
            self.room.add_spectator(client_id);
        }
        self.clients.set_role(client_id, Some(role));
        info!("{} joined the lobby as {} (requested {})", client_id, role, requested);

        self.send(client_id, ServerMessage::RoleAssigned { role });
        if forced {
            self.send(client_id, ServerMessage::GameState(self.room.game_snapshot()));
        }
        self.broadcast_lobby();
        self.process_room_events();
    }

    fn take_player_slot(&mut self, client_id: &str, slot: Slot) {
        if self.clients.role(client_id) != Some(Role::Spectator) {
            self.send(
                client_id,
                ServerMessage::Error {
                    message: "Only spectators can take a player slot".to_string(),
                },
            );
            return;
        }

        let name = self.clients.name(client_id).unwrap_or_default().to_string();
        if let Err(e) = self.room.add_player(client_id, slot, &name) {
            self.send(
                client_id,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            );
            return;
        }
        self.clients.set_role(client_id, Some(slot.role()));
        info!("Spectator {} took {}", client_id, slot);

        self.send(client_id, ServerMessage::RoleAssigned { role: slot.role() });
        self.broadcast_lobby();
        self.process_room_events();
    }

    fn paddle_move(&mut self, client_id: &str, direction: PaddleInput) {
        match self.clients.role(client_id).and_then(Role::slot) {
            Some(slot) => self.room.handle_paddle_move(slot, direction),
            None => debug!("Ignoring paddle move from non-player {}", client_id),
        }
    }

    /// Tears down a connection's identity and frees whatever it occupied.
    pub fn disconnect(&mut self, client_id: &str) {
        if !self.clients.contains(client_id) {
            return;
        }

        let vacated = self.room.slot_of(client_id);
        self.room.remove_player(client_id);
        self.clients.remove_client(client_id);
        self.broadcaster.unregister(client_id);

        if let Some(slot) = vacated {
            self.broadcaster.broadcast_to_all(&ServerMessage::PlayerDisconnected { slot });
            self.schedule(
                TimerKey::SlotReclaim(slot),
                Duration::from_millis(RECLAIM_DELAY_MS),
            );
        }
        self.broadcast_lobby();
        self.process_room_events();
    }

    /// Runs one simulation step and streams the resulting state.
    pub fn tick(&mut self) {
        if self.room.status != GameStatus::Playing {
            return;
        }

        self.room.tick();
        self.broadcaster
            .broadcast_to_all(&ServerMessage::GameState(self.room.game_snapshot()));
        self.process_room_events();

        if self.room.tick % 60 == 0 {
            debug!(
                "Tick {}: {} clients, score {} - {}",
                self.room.tick,
                self.clients.len(),
                self.room.score.player1,
                self.room.score.player2
            );
        }
    }

    fn process_room_events(&mut self) {
        for event in self.room.drain_events() {
            match event {
                RoomEvent::GameStarted => {
                    self.reconcile_roles_on_start();
                    self.broadcast_lobby();
                    self.broadcast_game_state();
                }
                RoomEvent::GamePaused { .. } | RoomEvent::GameResumed => {
                    self.broadcast_game_state();
                }
                RoomEvent::PointScored { .. } => {}
                RoomEvent::GameOver {
                    winner,
                    final_score,
                } => {
                    let winner_name = self
                        .room
                        .participant(winner)
                        .map(|participant| participant.name.clone());
                    self.broadcaster.broadcast_to_all(&ServerMessage::GameOver {
                        winner,
                        final_score,
                        winner_name,
                    });
                    self.schedule(TimerKey::GameReset, Duration::from_millis(RESET_DELAY_MS));
                    self.broadcast_lobby();
                }
            }
        }
    }

    /// Forces everyone but the two seated players into the spectators.
    fn reconcile_roles_on_start(&mut self) {
        let seated: Vec<ClientId> = Slot::ALL
            .into_iter()
            .filter_map(|slot| self.room.participant(slot).map(|p| p.id.clone()))
            .collect();

        for client_id in self.clients.ids() {
            if seated.contains(&client_id) {
                continue;
            }
            self.room.add_spectator(&client_id);
            self.clients.set_role(&client_id, Some(Role::Spectator));
            self.send(
                &client_id,
                ServerMessage::RoleAssigned {
                    role: Role::Spectator,
                },
            );
        }
    }

    fn schedule(&mut self, key: TimerKey, delay: Duration) {
        self.timers.insert(key, Instant::now() + delay);
    }

    /// True while a timer for `key` is pending.
    ///
    /// Fired and replaced timers are no longer pending under their old deadline.
    pub fn is_scheduled(&self, key: TimerKey) -> bool {
        self.timers.contains_key(&key)
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    /// Fires every timer whose deadline is at or before `now`.
    pub fn fire_due_timers(&mut self, now: Instant) {
        let mut due: Vec<(Instant, TimerKey)> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, *key))
            .collect();
        due.sort_by_key(|(deadline, _)| *deadline);

        for (_, key) in due {
            self.timers.remove(&key);
            match key {
                TimerKey::SlotReclaim(slot) => self.reclaim_slot(slot),
                TimerKey::GameReset => self.reset_game(),
            }
        }
    }

    fn reclaim_slot(&mut self, slot: Slot) {
        if self.room.is_occupied(slot) {
            debug!("{} was refilled before the reclaim delay ran out", slot);
            return;
        }
        info!("{} is available to spectators", slot);
        self.broadcaster.broadcast_to_all(&ServerMessage::SlotAvailable { slot });
    }

    fn reset_game(&mut self) {
        if self.room.status != GameStatus::Ended {
            debug!("Skipping reset, a new game already started");
            return;
        }
        self.room.reset_game();

        let mut former_players = self.clients.player_ids();
        for slot in Slot::ALL {
            if let Some(participant) = self.room.participant(slot) {
                if !former_players.contains(&participant.id) {
                    former_players.push(participant.id.clone());
                }
            }
        }

        for client_id in former_players {
            self.room.add_spectator(&client_id);
            if self.clients.set_role(&client_id, Some(Role::Spectator)) {
                self.send(
                    &client_id,
                    ServerMessage::RoleAssigned {
                        role: Role::Spectator,
                    },
                );
            } else {
                self.room.remove_player(&client_id);
            }
        }
        self.broadcast_lobby();
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            players: Slot::ALL
                .into_iter()
                .filter_map(|slot| self.room.participant(slot).map(|p| p.name.clone()))
                .collect(),
            spectators: self.room.spectators.len(),
            game_status: self.room.status,
        }
    }

    fn send(&self, client_id: &str, message: ServerMessage) {
        if let Err(e) = self.broadcaster.send_to_one(client_id, &message) {
            debug!("Skipped {} for {}: {}", message.kind(), client_id, e);
        }
    }

    fn broadcast_lobby(&self) {
        self.broadcaster
            .broadcast_to_all(&ServerMessage::LobbyUpdate(self.room.lobby_snapshot()));
    }

    fn broadcast_game_state(&self) {
        self.broadcaster
            .broadcast_to_all(&ServerMessage::GameState(self.room.game_snapshot()));
    }
}
