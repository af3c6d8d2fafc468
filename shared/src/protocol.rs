//! Wire protocol between arena clients and the server.
//!
//! Every message is a single JSON object of the form
//! `{"type": "JOIN_LOBBY", "payload": {...}}`.

use crate::physics::{Ball, Paddle};
use serde::{Deserialize, Serialize};

/// One of the two player positions in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Player1,
    Player2,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Player1, Slot::Player2];

    pub fn role(self) -> Role {
        match self {
            Slot::Player1 => Role::Player1,
            Slot::Player2 => Role::Player2,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Player1 => write!(f, "player1"),
            Slot::Player2 => write!(f, "player2"),
        }
    }
}

/// Capacity a connection participates in. Unassigned connections carry no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player1,
    Player2,
    Spectator,
}

impl Role {
    pub fn slot(self) -> Option<Slot> {
        match self {
            Role::Player1 => Some(Slot::Player1),
            Role::Player2 => Some(Slot::Player2),
            Role::Spectator => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Player1 => write!(f, "player1"),
            Role::Player2 => write!(f, "player2"),
            Role::Spectator => write!(f, "spectator"),
        }
    }
}

/// Direction a paddle is currently travelling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Paddle command sent by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddleInput {
    Up,
    Down,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Paused,
    Ended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub player1: u32,
    pub player2: u32,
}

impl Score {
    pub fn increment(&mut self, slot: Slot) {
        match slot {
            Slot::Player1 => self.player1 += 1,
            Slot::Player2 => self.player2 += 1,
        }
    }
}

/// Public view of a seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySnapshot {
    pub player1: Option<PlayerInfo>,
    pub player2: Option<PlayerInfo>,
    pub spectators: usize,
    pub game_in_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub ball: Ball,
    pub paddle1: Paddle,
    pub paddle2: Paddle,
    pub score: Score,
    pub game_status: GameStatus,
    pub lobby_data: LobbySnapshot,
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    JoinLobby { role: Role },
    PaddleMove { direction: PaddleInput },
    TakePlayerSlot { slot: Slot },
}

impl ClientMessage {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    LobbyUpdate(LobbySnapshot),
    GameState(GameSnapshot),
    RoleAssigned {
        role: Role,
    },
    #[serde(rename_all = "camelCase")]
    GameOver {
        winner: Slot,
        final_score: Score,
        winner_name: Option<String>,
    },
    PlayerDisconnected {
        slot: Slot,
    },
    SlotAvailable {
        slot: Slot,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Wire name of the message, as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::LobbyUpdate(_) => "LOBBY_UPDATE",
            ServerMessage::GameState(_) => "GAME_STATE",
            ServerMessage::RoleAssigned { .. } => "ROLE_ASSIGNED",
            ServerMessage::GameOver { .. } => "GAME_OVER",
            ServerMessage::PlayerDisconnected { .. } => "PLAYER_DISCONNECTED",
            ServerMessage::SlotAvailable { .. } => "SLOT_AVAILABLE",
            ServerMessage::Error { .. } => "ERROR",
        }
    }
}
