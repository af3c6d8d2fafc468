//! Authoritative state of the single arena room.
//!
//! The room owns slot occupancy, spectators, the ball, both paddles, the score
//! and the match status. Every status transition happens inside one of the
//! mutating operations below and is recorded as a [`RoomEvent`] so the session
//! router can react to it (reconcile roles, notify clients, schedule timers)
//! without inspecting the room before and after each call.

use crate::client_manager::ClientId;
use crate::error::RoomError;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::physics::{self, Ball, Paddle};
use shared::{
    GameSnapshot, GameStatus, LobbySnapshot, PaddleInput, PlayerInfo, Score, Slot,
    BALL_SPEED_PER_FRAME, PADDLE_SPEED_PER_FRAME,
};
use std::collections::HashSet;
use std::time::Instant;

/// Occupant of a player slot.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ClientId,
    pub name: String,
    pub connected_at: Instant,
}

/// State transitions and gameplay moments produced by room operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    GameStarted,
    GamePaused { vacated: Slot },
    GameResumed,
    PointScored { scorer: Slot, score: Score },
    GameOver { winner: Slot, final_score: Score },
}

pub struct Room {
    pub player1: Option<Participant>,
    pub player2: Option<Participant>,
    pub spectators: HashSet<ClientId>,
    pub ball: Ball,
    pub paddle1: Paddle,
    pub paddle2: Paddle,
    pub score: Score,
    pub status: GameStatus,
    /// Ticks simulated while playing, across all games.
    pub tick: u64,
    rng: StdRng,
    events: Vec<RoomEvent>,
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl Room {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a room whose ball launches follow a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            player1: None,
            player2: None,
            spectators: HashSet::new(),
            ball: Ball::centered(),
            paddle1: Paddle::centered(),
            paddle2: Paddle::centered(),
            score: Score::default(),
            status: GameStatus::Waiting,
            tick: 0,
            rng,
            events: Vec::new(),
        }
    }

    /// Current occupant of `slot`.
    ///
    /// Returns None while the slot is empty.
    pub fn participant(&self, slot: Slot) -> Option<&Participant> {
        match slot {
            Slot::Player1 => self.player1.as_ref(),
            Slot::Player2 => self.player2.as_ref(),
        }
    }

    fn participant_mut(&mut self, slot: Slot) -> &mut Option<Participant> {
        match slot {
            Slot::Player1 => &mut self.player1,
            Slot::Player2 => &mut self.player2,
        }
    }

    fn paddle_mut(&mut self, slot: Slot) -> &mut Paddle {
        match slot {
            Slot::Player1 => &mut self.paddle1,
            Slot::Player2 => &mut self.paddle2,
        }
    }

    /// True if someone holds `slot`.
    pub fn is_occupied(&self, slot: Slot) -> bool {
        self.participant(slot).is_some()
    }

    /// True when both player slots are held.
    ///
    /// A game can only run in this state.
    pub fn both_seated(&self) -> bool {
        self.player1.is_some() && self.player2.is_some()
    }

    /// Slot currently held by `client_id`, if any.
    pub fn slot_of(&self, client_id: &str) -> Option<Slot> {
        Slot::ALL.into_iter().find(|slot| {
            self.participant(*slot)
                .is_some_and(|participant| participant.id == client_id)
        })
    }

    pub fn is_spectator(&self, client_id: &str) -> bool {
        self.spectators.contains(client_id)
    }

    /// True from game start until the game ends; a paused game is still in progress.
    pub fn game_in_progress(&self) -> bool {
        matches!(self.status, GameStatus::Playing | GameStatus::Paused)
    }

    /// Seats `client_id` in `slot`.
    ///
    /// Fails if the slot is taken. Filling the second slot starts a new game,
    /// or resumes a paused one.
    pub fn add_player(
        &mut self,
        client_id: &str,
        slot: Slot,
        name: &str,
    ) -> Result<LobbySnapshot, RoomError> {
        if self.is_occupied(slot) {
            return Err(RoomError::SlotOccupied(slot));
        }

        self.vacate(client_id);
        self.spectators.remove(client_id);
        *self.participant_mut(slot) = Some(Participant {
            id: client_id.to_string(),
            name: name.to_string(),
            connected_at: Instant::now(),
        });
        info!("{} joined as {}", name, slot);

        if self.both_seated() {
            match self.status {
                GameStatus::Paused => {
                    self.resume_game();
                }
                GameStatus::Waiting | GameStatus::Ended => self.start_game(),
                GameStatus::Playing => {}
            }
        }

        Ok(self.lobby_snapshot())
    }

    /// Moves `client_id` to the spectators, freeing any slot it held.
    pub fn add_spectator(&mut self, client_id: &str) -> LobbySnapshot {
        self.vacate(client_id);
        if self.spectators.insert(client_id.to_string()) {
            info!("Client {} joined as spectator", client_id);
        }
        self.lobby_snapshot()
    }

    /// Removes `client_id` from the room entirely.
    ///
    /// Returns true if it was holding a player slot.
    pub fn remove_player(&mut self, client_id: &str) -> bool {
        let removed = self.vacate(client_id).is_some();
        self.spectators.remove(client_id);
        removed
    }

    /// Clears the slot held by `client_id`, pausing a running game.
    fn vacate(&mut self, client_id: &str) -> Option<Slot> {
        let slot = self.slot_of(client_id)?;
        if let Some(participant) = self.participant_mut(slot).take() {
            info!("{} ({}) left the slot", participant.name, slot);
        }
        // The next occupant starts with a still paddle.
        self.paddle_mut(slot).apply_input(PaddleInput::Stop);

        if self.status == GameStatus::Playing {
            self.status = GameStatus::Paused;
            self.events.push(RoomEvent::GamePaused { vacated: slot });
            info!("Game paused, {} is empty", slot);
        }
        Some(slot)
    }

    /// Records a paddle command. Movement itself happens on the next tick.
    pub fn handle_paddle_move(&mut self, slot: Slot, input: PaddleInput) {
        if self.status != GameStatus::Playing || !self.is_occupied(slot) {
            return;
        }
        self.paddle_mut(slot).apply_input(input);
    }

    /// Advances the simulation by one frame. Does nothing unless playing.
    pub fn tick(&mut self) {
        if self.status != GameStatus::Playing {
            return;
        }
        self.tick += 1;

        self.paddle1.step(PADDLE_SPEED_PER_FRAME);
        self.paddle2.step(PADDLE_SPEED_PER_FRAME);

        self.ball.advance();
        physics::bounce_off_walls(&mut self.ball);

        if !physics::deflect_off_paddle(
            &mut self.ball,
            Slot::Player1,
            &self.paddle1,
            BALL_SPEED_PER_FRAME,
        ) {
            physics::deflect_off_paddle(
                &mut self.ball,
                Slot::Player2,
                &self.paddle2,
                BALL_SPEED_PER_FRAME,
            );
        }

        if let Some(scorer) = physics::goal_scorer(&self.ball) {
            self.score.increment(scorer);
            info!(
                "{} scores! Score: {} - {}",
                scorer, self.score.player1, self.score.player2
            );
            self.events.push(RoomEvent::PointScored {
                scorer,
                score: self.score,
            });
            self.reset_ball_position();

            if let Some(winner) = physics::winner(&self.score) {
                self.end_game(winner);
            }
        }
    }

    /// Re-centers the ball and relaunches it on a random diagonal.
    pub fn reset_ball_position(&mut self) {
        let toward_right = self.rng.gen_bool(0.5);
        let downward = self.rng.gen_bool(0.5);
        self.ball.launch(toward_right, downward, BALL_SPEED_PER_FRAME);
    }

    /// Starts a fresh game: zero score, centered paddles, ball launched to the left.
    pub fn start_game(&mut self) {
        self.status = GameStatus::Playing;
        self.score = Score::default();
        self.paddle1 = Paddle::centered();
        self.paddle2 = Paddle::centered();
        self.ball.launch(false, true, BALL_SPEED_PER_FRAME);
        self.events.push(RoomEvent::GameStarted);
        info!("Game started");
    }

    /// Resumes a paused game once both slots are filled again.
    pub fn resume_game(&mut self) -> bool {
        if self.status != GameStatus::Paused || !self.both_seated() {
            return false;
        }
        self.status = GameStatus::Playing;
        self.events.push(RoomEvent::GameResumed);
        info!("Game resumed");
        true
    }

    /// Freezes the game with `winner` recorded.
    ///
    /// The ball and paddles keep their last positions until the room is reset.
    pub fn end_game(&mut self, winner: Slot) {
        self.status = GameStatus::Ended;
        self.events.push(RoomEvent::GameOver {
            winner,
            final_score: self.score,
        });
        info!(
            "Game ended! Winner: {} ({} - {})",
            winner, self.score.player1, self.score.player2
        );
    }

    /// Returns the room to the lobby. Slot occupancy is left to the caller.
    pub fn reset_game(&mut self) {
        self.score = Score::default();
        self.ball = Ball::centered();
        self.paddle1 = Paddle::centered();
        self.paddle2 = Paddle::centered();
        self.status = GameStatus::Waiting;
        info!("Game reset");
    }

    /// Takes the events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    fn player_info(&self, slot: Slot) -> Option<PlayerInfo> {
        self.participant(slot).map(|participant| PlayerInfo {
            id: participant.id.clone(),
            name: participant.name.clone(),
        })
    }

    /// Slot occupants, spectator count and whether a game is in progress.
    pub fn lobby_snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            player1: self.player_info(Slot::Player1),
            player2: self.player_info(Slot::Player2),
            spectators: self.spectators.len(),
            game_in_progress: self.game_in_progress(),
        }
    }

    /// Full simulation state as sent in `GAME_STATE`.
    ///
    /// Includes the lobby snapshot so clients can render names next to the score.
    pub fn game_snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            ball: self.ball,
            paddle1: self.paddle1,
            paddle2: self.paddle2,
            score: self.score,
            game_status: self.status,
            lobby_data: self.lobby_snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Direction, ARENA_HEIGHT, ARENA_WIDTH, PADDLE_HEIGHT};
    use tokio_test::{assert_err, assert_ok};

    fn seated_room() -> Room {
        let mut room = Room::with_seed(7);
        assert_ok!(room.add_player("a", Slot::Player1, "Alice"));
        assert_ok!(room.add_player("b", Slot::Player2, "Bob"));
        room.drain_events();
        room
    }

    fn membership_count(room: &Room, id: &str) -> usize {
        let seated = Slot::ALL
            .into_iter()
            .filter(|slot| room.participant(*slot).is_some_and(|p| p.id == id))
            .count();
        seated + usize::from(room.is_spectator(id))
    }

    /// Puts the ball one frame away from leaving the arena on `scorer`'s side.
    fn ball_about_to_score(room: &mut Room, scorer: Slot) {
        let speed = BALL_SPEED_PER_FRAME;
        room.ball = match scorer {
            Slot::Player1 => Ball {
                x: ARENA_WIDTH - 1.0,
                y: 20.0,
                velocity_x: speed,
                velocity_y: 0.0,
            },
            Slot::Player2 => Ball {
                x: 1.0,
                y: 20.0,
                velocity_x: -speed,
                velocity_y: 0.0,
            },
        };
    }

    #[test]
    fn test_new_room_is_waiting() {
        let room = Room::new();
        assert_eq!(room.status, GameStatus::Waiting);
        assert!(!room.game_in_progress());
        assert_eq!(room.score, Score::default());
        assert!(room.player1.is_none() && room.player2.is_none());
    }

    #[test]
    fn test_add_player_rejects_occupied_slot() {
        let mut room = Room::with_seed(1);
        assert_ok!(room.add_player("a", Slot::Player1, "Alice"));

        let err = assert_err!(room.add_player("b", Slot::Player1, "Bob"));
        assert_eq!(err, RoomError::SlotOccupied(Slot::Player1));
        assert_eq!(room.participant(Slot::Player1).unwrap().id, "a");
    }

    #[test]
    fn test_add_player_leaves_spectators() {
        let mut room = Room::with_seed(1);
        room.add_spectator("a");
        let lobby = assert_ok!(room.add_player("a", Slot::Player2, "Alice"));

        assert_eq!(lobby.spectators, 0);
        assert_eq!(lobby.player2.unwrap().name, "Alice");
        assert!(!room.is_spectator("a"));
    }

    #[test]
    fn test_second_player_starts_game_automatically() {
        let mut room = Room::with_seed(1);
        assert_ok!(room.add_player("a", Slot::Player1, "Alice"));
        assert_eq!(room.status, GameStatus::Waiting);

        let lobby = assert_ok!(room.add_player("b", Slot::Player2, "Bob"));
        assert_eq!(room.status, GameStatus::Playing);
        assert!(lobby.game_in_progress);
        assert_eq!(room.drain_events(), vec![RoomEvent::GameStarted]);
    }

    #[test]
    fn test_start_game_resets_state() {
        let mut room = seated_room();
        room.score = Score {
            player1: 3,
            player2: 2,
        };
        room.paddle1.y = 0.0;
        room.ball.x = 10.0;

        room.start_game();

        assert_eq!(room.status, GameStatus::Playing);
        assert_eq!(room.score, Score::default());
        assert_eq!(room.paddle1, Paddle::centered());
        assert_eq!(room.ball.x, ARENA_WIDTH / 2.0);
        assert_eq!(room.ball.y, ARENA_HEIGHT / 2.0);
        assert_approx_eq!(room.ball.speed(), BALL_SPEED_PER_FRAME, 1e-5);
        assert_approx_eq!(room.ball.velocity_x.abs(), room.ball.velocity_y.abs(), 1e-6);
        assert!(room.ball.velocity_x < 0.0);
    }

    #[test]
    fn test_add_spectator_is_idempotent() {
        let mut room = seated_room();
        let once = room.add_spectator("c");
        let twice = room.add_spectator("c");

        assert_eq!(once, twice);
        assert_eq!(room.spectators.len(), 1);
        assert_eq!(room.status, GameStatus::Playing);
    }

    #[test]
    fn test_player_becoming_spectator_pauses_game() {
        let mut room = seated_room();
        let lobby = room.add_spectator("a");

        assert!(lobby.player1.is_none());
        assert_eq!(lobby.spectators, 1);
        assert_eq!(room.status, GameStatus::Paused);
        assert!(room.game_in_progress());
        assert_eq!(
            room.drain_events(),
            vec![RoomEvent::GamePaused {
                vacated: Slot::Player1
            }]
        );
    }

    #[test]
    fn test_remove_player_reports_slot_holders_only() {
        let mut room = seated_room();
        room.add_spectator("c");

        assert!(!room.remove_player("c"));
        assert!(!room.is_spectator("c"));
        assert_eq!(room.status, GameStatus::Playing);

        assert!(room.remove_player("b"));
        assert!(room.player2.is_none());
        assert_eq!(room.status, GameStatus::Paused);

        assert!(!room.remove_player("b"));
    }

    #[test]
    fn test_vacated_paddle_stops() {
        let mut room = seated_room();
        room.handle_paddle_move(Slot::Player1, PaddleInput::Up);
        assert!(room.paddle1.moving);

        room.remove_player("a");
        assert!(!room.paddle1.moving);
        assert_eq!(room.paddle1.direction, None);

        assert_ok!(room.add_player("c", Slot::Player1, "Carol"));
        let before = room.paddle1.y;
        room.tick();
        assert_eq!(room.paddle1.y, before);
    }

    #[test]
    fn test_refilling_slot_resumes_paused_game() {
        let mut room = seated_room();
        room.score = Score {
            player1: 2,
            player2: 1,
        };
        room.remove_player("a");
        room.add_spectator("c");
        room.drain_events();

        assert_ok!(room.add_player("c", Slot::Player1, "Carol"));

        assert_eq!(room.status, GameStatus::Playing);
        assert_eq!(
            room.score,
            Score {
                player1: 2,
                player2: 1
            }
        );
        assert_eq!(room.drain_events(), vec![RoomEvent::GameResumed]);
    }

    #[test]
    fn test_membership_stays_exclusive() {
        let mut room = Room::with_seed(99);
        let mut rng = StdRng::seed_from_u64(1234);
        let ids = ["a", "b", "c", "d"];

        for _ in 0..2000 {
            let id = ids[rng.gen_range(0..ids.len())];
            match rng.gen_range(0..4) {
                0 => {
                    let _ = room.add_player(id, Slot::Player1, id);
                }
                1 => {
                    let _ = room.add_player(id, Slot::Player2, id);
                }
                2 => {
                    room.add_spectator(id);
                }
                _ => {
                    room.remove_player(id);
                }
            }
            for id in ids {
                assert!(membership_count(&room, id) <= 1, "{} in several places", id);
            }
        }
    }

    #[test]
    fn test_paddle_move_requires_playing_and_seated() {
        let mut room = Room::with_seed(1);
        assert_ok!(room.add_player("a", Slot::Player1, "Alice"));
        room.handle_paddle_move(Slot::Player1, PaddleInput::Up);
        assert!(!room.paddle1.moving);

        let mut room = seated_room();
        room.handle_paddle_move(Slot::Player2, PaddleInput::Down);
        assert!(room.paddle2.moving);
        assert_eq!(room.paddle2.direction, Some(Direction::Down));
        assert_eq!(room.paddle2.y, ARENA_HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0);

        room.tick();
        assert_approx_eq!(
            room.paddle2.y,
            ARENA_HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0 + PADDLE_SPEED_PER_FRAME,
            1e-4
        );
    }

    #[test]
    fn test_tick_does_nothing_unless_playing() {
        let mut room = seated_room();
        room.remove_player("a");
        let before = room.game_snapshot();

        room.tick();

        assert_eq!(room.game_snapshot(), before);
        assert_eq!(room.tick, 0);
    }

    #[test]
    fn test_ball_leaving_left_edge_scores_for_player2() {
        let mut room = seated_room();
        room.ball = Ball {
            x: 0.0,
            y: 225.0,
            velocity_x: -BALL_SPEED_PER_FRAME * std::f32::consts::FRAC_1_SQRT_2,
            velocity_y: BALL_SPEED_PER_FRAME * std::f32::consts::FRAC_1_SQRT_2,
        };

        room.tick();

        assert_eq!(room.score.player2, 1);
        assert_eq!(room.score.player1, 0);
        assert_eq!(room.ball.x, 400.0);
        assert_eq!(room.ball.y, 225.0);
        let speed_sq = room.ball.velocity_x.powi(2) + room.ball.velocity_y.powi(2);
        assert_approx_eq!(speed_sq, BALL_SPEED_PER_FRAME.powi(2), 1e-4);
        assert_eq!(
            room.drain_events(),
            vec![RoomEvent::PointScored {
                scorer: Slot::Player2,
                score: Score {
                    player1: 0,
                    player2: 1
                }
            }]
        );
    }

    #[test]
    fn test_paddle_returns_ball() {
        let mut room = seated_room();
        let paddle_center = room.paddle1.center_y();
        room.ball = Ball {
            x: shared::PADDLE1_X + shared::PADDLE_WIDTH + 6.0,
            y: paddle_center,
            velocity_x: -3.0,
            velocity_y: 0.0,
        };

        room.tick();

        assert!(room.ball.velocity_x > 0.0);
        assert_eq!(room.score, Score::default());
    }

    #[test]
    fn test_narrow_lead_does_not_end_game() {
        let mut room = seated_room();
        room.score = Score {
            player1: 4,
            player2: 4,
        };
        ball_about_to_score(&mut room, Slot::Player1);

        room.tick();

        assert_eq!(
            room.score,
            Score {
                player1: 5,
                player2: 4
            }
        );
        assert_eq!(room.status, GameStatus::Playing);
    }

    #[test]
    fn test_win_by_margin_ends_game() {
        let mut room = seated_room();
        room.score = Score {
            player1: 5,
            player2: 4,
        };
        ball_about_to_score(&mut room, Slot::Player1);

        room.tick();

        let final_score = Score {
            player1: 6,
            player2: 4,
        };
        assert_eq!(room.status, GameStatus::Ended);
        assert!(!room.game_in_progress());
        assert_eq!(
            room.drain_events(),
            vec![
                RoomEvent::PointScored {
                    scorer: Slot::Player1,
                    score: final_score
                },
                RoomEvent::GameOver {
                    winner: Slot::Player1,
                    final_score
                },
            ]
        );
    }

    #[test]
    fn test_first_to_five_with_two_point_lead_wins() {
        let mut room = seated_room();
        room.score = Score {
            player1: 3,
            player2: 4,
        };
        ball_about_to_score(&mut room, Slot::Player2);

        room.tick();

        assert_eq!(room.status, GameStatus::Ended);
        assert_eq!(
            room.score,
            Score {
                player1: 3,
                player2: 5
            }
        );
    }

    #[test]
    fn test_ended_game_is_frozen() {
        let mut room = seated_room();
        room.score = Score {
            player1: 5,
            player2: 4,
        };
        ball_about_to_score(&mut room, Slot::Player1);
        room.tick();
        room.handle_paddle_move(Slot::Player1, PaddleInput::Up);
        let frozen = room.game_snapshot();

        room.tick();
        room.tick();

        assert_eq!(room.game_snapshot(), frozen);
    }

    #[test]
    fn test_reset_game_returns_to_waiting() {
        let mut room = seated_room();
        room.score = Score {
            player1: 6,
            player2: 4,
        };
        room.end_game(Slot::Player1);

        room.reset_game();

        assert_eq!(room.status, GameStatus::Waiting);
        assert_eq!(room.score, Score::default());
        assert_eq!(room.ball, Ball::centered());
        assert_eq!(room.paddle2, Paddle::centered());
        assert!(room.both_seated());
    }

    #[test]
    fn test_seeded_launches_are_deterministic() {
        let mut first = Room::with_seed(42);
        let mut second = Room::with_seed(42);
        for _ in 0..10 {
            first.reset_ball_position();
            second.reset_ball_position();
            assert_eq!(first.ball, second.ball);
        }
    }
}
