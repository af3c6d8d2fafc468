//! Geometry and motion rules for the arena.
//!
//! Positions are in arena units with the origin in the top-left corner and
//! `y` growing downward. The ball is tracked by its center, paddles by their
//! top edge. Velocities are expressed per frame, not per second.

use crate::protocol::{Direction, PaddleInput, Score, Slot};
use crate::{
    ARENA_HEIGHT, ARENA_WIDTH, BALL_SIZE, PADDLE1_X, PADDLE2_X, PADDLE_HEIGHT, PADDLE_WIDTH,
    WINNING_SCORE, WIN_BY_MARGIN,
};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_1_SQRT_2;

/// Fraction of the ball speed added as vertical spin on an edge hit.
pub const SPIN_FACTOR: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
}

impl Default for Ball {
    fn default() -> Self {
        Ball::centered()
    }
}

impl Ball {
    /// A motionless ball in the middle of the arena.
    pub fn centered() -> Self {
        Ball {
            x: ARENA_WIDTH / 2.0,
            y: ARENA_HEIGHT / 2.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
        }
    }

    /// Re-centers the ball and sends it along a 45 degree diagonal.
    ///
    /// `toward_right` and `downward` pick the quadrant; the resulting speed is
    /// exactly `speed`.
    pub fn launch(&mut self, toward_right: bool, downward: bool, speed: f32) {
        let component = speed * FRAC_1_SQRT_2;
        self.x = ARENA_WIDTH / 2.0;
        self.y = ARENA_HEIGHT / 2.0;
        self.velocity_x = if toward_right { component } else { -component };
        self.velocity_y = if downward { component } else { -component };
    }

    pub fn speed(&self) -> f32 {
        (self.velocity_x * self.velocity_x + self.velocity_y * self.velocity_y).sqrt()
    }

    pub fn advance(&mut self) {
        self.x += self.velocity_x;
        self.y += self.velocity_y;
    }

    /// Returns (left, top, right, bottom).
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        let half = BALL_SIZE / 2.0;
        (self.x - half, self.y - half, self.x + half, self.y + half)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub y: f32,
    pub moving: bool,
    pub direction: Option<Direction>,
}

impl Default for Paddle {
    fn default() -> Self {
        Paddle::centered()
    }
}

impl Paddle {
    pub fn centered() -> Self {
        Paddle {
            y: ARENA_HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0,
            moving: false,
            direction: None,
        }
    }

    /// Records a movement command. The paddle only moves when stepped.
    pub fn apply_input(&mut self, input: PaddleInput) {
        match input {
            PaddleInput::Up => {
                self.moving = true;
                self.direction = Some(Direction::Up);
            }
            PaddleInput::Down => {
                self.moving = true;
                self.direction = Some(Direction::Down);
            }
            PaddleInput::Stop => {
                self.moving = false;
                self.direction = None;
            }
        }
    }

    /// Moves the paddle by `distance` in its current direction, kept inside the arena.
    pub fn step(&mut self, distance: f32) {
        if !self.moving {
            return;
        }
        let max_y = ARENA_HEIGHT - PADDLE_HEIGHT;
        match self.direction {
            Some(Direction::Up) => self.y = (self.y - distance).max(0.0),
            Some(Direction::Down) => self.y = (self.y + distance).min(max_y),
            None => {}
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + PADDLE_HEIGHT / 2.0
    }
}

/// Left edge of the paddle guarding `slot`'s goal.
pub fn paddle_x(slot: Slot) -> f32 {
    match slot {
        Slot::Player1 => PADDLE1_X,
        Slot::Player2 => PADDLE2_X,
    }
}

/// Reflects the ball off the top and bottom walls. Returns true on contact.
pub fn bounce_off_walls(ball: &mut Ball) -> bool {
    if ball.y <= 0.0 {
        ball.y = 0.0;
        ball.velocity_y = ball.velocity_y.abs();
        true
    } else if ball.y >= ARENA_HEIGHT {
        ball.y = ARENA_HEIGHT;
        ball.velocity_y = -ball.velocity_y.abs();
        true
    } else {
        false
    }
}

/// Axis-aligned overlap test between the ball and the paddle owned by `slot`.
pub fn overlaps_paddle(ball: &Ball, slot: Slot, paddle: &Paddle) -> bool {
    let (ball_left, ball_top, ball_right, ball_bottom) = ball.bounds();
    let paddle_left = paddle_x(slot);
    let paddle_right = paddle_left + PADDLE_WIDTH;
    let paddle_top = paddle.y;
    let paddle_bottom = paddle.y + PADDLE_HEIGHT;

    !(ball_right <= paddle_left
        || ball_left >= paddle_right
        || ball_bottom <= paddle_top
        || ball_top >= paddle_bottom)
}

/// Bounces the ball off `slot`'s paddle if they overlap and the ball is
/// heading toward that paddle. Returns true when the ball was deflected.
///
/// The vertical velocity picks up spin proportional to how far from the
/// paddle center the ball struck, and the ball is moved flush against the
/// paddle face so it cannot register a second hit on the next frame.
pub fn deflect_off_paddle(ball: &mut Ball, slot: Slot, paddle: &Paddle, base_speed: f32) -> bool {
    let approaching = match slot {
        Slot::Player1 => ball.velocity_x < 0.0,
        Slot::Player2 => ball.velocity_x > 0.0,
    };
    if !approaching || !overlaps_paddle(ball, slot, paddle) {
        return false;
    }

    let half_height = PADDLE_HEIGHT / 2.0;
    let hit_offset = ball.y - paddle.center_y();
    ball.velocity_x = -ball.velocity_x;
    ball.velocity_y += hit_offset / half_height * base_speed * SPIN_FACTOR;

    ball.x = match slot {
        Slot::Player1 => paddle_x(slot) + PADDLE_WIDTH + BALL_SIZE / 2.0,
        Slot::Player2 => paddle_x(slot) - BALL_SIZE / 2.0,
    };
    true
}

/// Slot that earns a point if the ball has left the arena sideways.
pub fn goal_scorer(ball: &Ball) -> Option<Slot> {
    if ball.x <= 0.0 {
        Some(Slot::Player2)
    } else if ball.x >= ARENA_WIDTH {
        Some(Slot::Player1)
    } else {
        None
    }
}

/// Winner of the game, if the score satisfies the win condition.
pub fn winner(score: &Score) -> Option<Slot> {
    let leader = score.player1.max(score.player2);
    let margin = score.player1.abs_diff(score.player2);
    if leader >= WINNING_SCORE && margin >= WIN_BY_MARGIN {
        if score.player1 > score.player2 {
            Some(Slot::Player1)
        } else {
            Some(Slot::Player2)
        }
    } else {
        None
    }
}
