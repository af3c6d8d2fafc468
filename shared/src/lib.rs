//! Types and rules shared between the arena server and its clients.
//!
//! The constants in this crate are part of the wire contract: clients render
//! with the same arena and paddle dimensions the server simulates with, so
//! they are fixed at compile time rather than configured at runtime.

pub mod physics;
pub mod protocol;

pub use physics::{Ball, Paddle};
pub use protocol::{
    ClientMessage, Direction, GameSnapshot, GameStatus, LobbySnapshot, PaddleInput, PlayerInfo,
    Role, Score, ServerMessage, Slot,
};

pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 450.0;

pub const PADDLE_WIDTH: f32 = ARENA_WIDTH * 0.02;
pub const PADDLE_HEIGHT: f32 = ARENA_HEIGHT * 0.15;
/// Horizontal gap between an arena edge and the outer face of its paddle.
pub const PADDLE_OFFSET: f32 = ARENA_WIDTH * 0.05;
/// Units per second.
pub const PADDLE_SPEED: f32 = 300.0;

/// Units per second.
pub const BALL_SPEED: f32 = 200.0;
pub const BALL_SIZE: f32 = 10.0;

pub const WINNING_SCORE: u32 = 5;
pub const WIN_BY_MARGIN: u32 = 2;

pub const TICK_RATE: u32 = 60;
pub const PADDLE_SPEED_PER_FRAME: f32 = PADDLE_SPEED / TICK_RATE as f32;
pub const BALL_SPEED_PER_FRAME: f32 = BALL_SPEED / TICK_RATE as f32;

/// Grace period before a vacated player slot is offered to spectators.
pub const RECLAIM_DELAY_MS: u64 = 3000;
/// Delay between `GAME_OVER` and the room returning to the lobby.
pub const RESET_DELAY_MS: u64 = 3000;

/// Left edge of the player 1 paddle.
pub const PADDLE1_X: f32 = PADDLE_OFFSET;
/// Left edge of the player 2 paddle.
pub const PADDLE2_X: f32 = ARENA_WIDTH - PADDLE_OFFSET - PADDLE_WIDTH;
