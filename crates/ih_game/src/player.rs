//! Player state and movement.
//!
//! Vertical motion (gravity, jumping) belongs to the fixed-tick kinematic
//! body. Horizontal motion is input-driven and applied per rendered frame,
//! scaled by the frame delta and filtered through the body's side
//! collision slots. In the hub there is no physics at all: movement is
//! free 2D across the island, with the X axis wrapping at the seam.

use crate::physics::{KinematicBody, PhysicsConfig, Slot};
use crate::projection::ProjectionCache;
use glam::Vec2;

/// Overworld island traversal limits. The X axis wraps modulo the seam
/// width; Y is clamped to the walkable band.
pub const HUB_WRAP_WIDTH: f32 = 24.0;
pub const HUB_MIN_Y: f32 = -2.0;
pub const HUB_MAX_Y: f32 = 18.0;

/// Sprite sheet geometry: 26x36 frames, three walk frames per row,
/// starting at column 3; the row picks the facing direction.
pub const FRAME_WIDTH: u32 = 26;
pub const FRAME_HEIGHT: u32 = 36;
const WALK_FRAMES: u64 = 3;
const WALK_FRAME_COLUMN0: u64 = 3;
const WALK_FRAME_MS: u64 = 350;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    #[default]
    Down,
    Left,
    Right,
    Up,
}

impl Facing {
    fn sheet_row(self) -> u32 {
        match self {
            Facing::Down => 0,
            Facing::Left => 1,
            Facing::Right => 2,
            Facing::Up => 3,
        }
    }
}

#[derive(Debug, Default)]
pub struct Player {
    pub body: KinematicBody,
    pub facing: Facing,
    pub cache: ProjectionCache,
}

/// What a hub movement step did to the world seam, so the camera can be
/// dragged along instead of panning across the whole island.
pub struct HubMove {
    pub wrap_delta: Vec2,
}

impl Player {
    /// In-level frame movement: horizontal walk plus the jump impulse.
    /// Side blocking reads the body's neighbor cache from the last fixed
    /// tick. The vertical input component never translates the body
    /// directly; only gravity and the jump impulse move it.
    pub fn move_in_level(
        &mut self,
        movement: Vec2,
        jump_held: bool,
        frame_dt: f32,
        config: &PhysicsConfig,
    ) {
        let direction = movement.normalize_or_zero();

        if jump_held && self.body.grounded {
            self.body.vertical_velocity = if direction.x != 0.0 {
                config.jump_speed_moving
            } else {
                config.jump_speed
            };
        }

        // Ground friction scales walking; airborne movement is unscaled.
        let friction = self
            .body
            .neighbor(Slot::Below)
            .map(|tile| tile.kind.friction())
            .unwrap_or(1.0);
        let dx = self
            .body
            .blocked_horizontal(direction.x * config.walk_speed * friction * frame_dt);
        self.body.position.x += dx;

        if direction.x < 0.0 {
            self.facing = Facing::Left;
        } else if direction.x > 0.0 {
            self.facing = Facing::Right;
        }
    }

    /// Hub frame movement: free 2D walk with the X wrap and Y clamp.
    /// Returns the wrap displacement (zero when no seam was crossed).
    pub fn move_in_hub(&mut self, movement: Vec2, frame_dt: f32, config: &PhysicsConfig) -> HubMove {
        let direction = movement.normalize_or_zero();
        if direction == Vec2::ZERO {
            return HubMove { wrap_delta: Vec2::ZERO };
        }

        let before = self.body.position;
        let mut next = before + direction * config.walk_speed * frame_dt;
        next.x = -((-next.x).rem_euclid(HUB_WRAP_WIDTH));
        next.y = next.y.clamp(HUB_MIN_Y, HUB_MAX_Y);
        self.body.position = next;

        self.facing = if direction.x < 0.0 {
            Facing::Left
        } else if direction.x > 0.0 {
            Facing::Right
        } else if direction.y > 0.0 {
            Facing::Up
        } else {
            Facing::Down
        };

        // A seam crossing shows up as a jump much larger than one frame of
        // walking could produce. Report the full displacement so the camera
        // keeps its follow offset across the wrap.
        let dx = next.x - before.x;
        if dx.abs() > HUB_WRAP_WIDTH / 2.0 {
            HubMove { wrap_delta: Vec2::new(dx, 0.0) }
        } else {
            HubMove { wrap_delta: Vec2::ZERO }
        }
    }

    /// Place the player at a spawn point with a clean physics state.
    pub fn spawn_at(&mut self, position: Vec2) {
        self.body.position = position;
        self.body.vertical_velocity = 0.0;
        self.body.grounded = false;
        self.body.invalidate_neighbors();
    }

    /// UV sub-rectangle of the current walk frame within the sprite sheet.
    pub fn animation_uv(&self, total_millis: u64, sheet_size: (u32, u32)) -> [f32; 4] {
        let column = (total_millis / WALK_FRAME_MS) % WALK_FRAMES + WALK_FRAME_COLUMN0;
        let row = self.facing.sheet_row();
        let (sheet_w, sheet_h) = (sheet_size.0 as f32, sheet_size.1 as f32);
        let u0 = column as f32 * FRAME_WIDTH as f32 / sheet_w;
        let v0 = row as f32 * FRAME_HEIGHT as f32 / sheet_h;
        [
            u0,
            v0,
            u0 + FRAME_WIDTH as f32 / sheet_w,
            v0 + FRAME_HEIGHT as f32 / sheet_h,
        ]
    }
}
