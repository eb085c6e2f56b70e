//! Kinematic vertical physics against the tile grid.
//!
//! A body samples the five grid cells around its rounded position (its own
//! cell plus the four orthogonal neighbors) into a per-tick collision
//! cache. Everything else reads that cache: grounding, the gravity step,
//! ceiling/floor velocity clamps, and the horizontal side-blocking done by
//! the player and enemy controllers. The cache is refreshed at most once
//! per fixed tick; the tick stamp guard makes repeat refreshes free.
//!
//! Gravity and jump speeds are per-tick deltas, not per-second rates. The
//! fixed tick rate (`ih_core::time::FIXED_FPS`) is therefore part of the
//! tuning: retune these constants if it ever changes.

use crate::level::{LevelData, Tile};
use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Center,
    Above,
    Below,
    Left,
    Right,
}

const SLOT_OFFSETS: [(Slot, Vec2); 5] = [
    (Slot::Center, Vec2::new(0.0, 0.0)),
    (Slot::Above, Vec2::new(0.0, 1.0)),
    (Slot::Below, Vec2::new(0.0, -1.0)),
    (Slot::Left, Vec2::new(-1.0, 0.0)),
    (Slot::Right, Vec2::new(1.0, 0.0)),
];

#[derive(Debug, Clone, Default)]
struct NeighborCache {
    slots: [Option<Tile>; 5],
    refreshed_tick: Option<u64>,
}

/// Tunable physics constants, per fixed tick.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub jump_speed: f32,
    /// A running jump is stronger than a standing one.
    pub jump_speed_moving: f32,
    /// Horizontal walk speed in tiles per second (applied per frame).
    pub walk_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -0.015,
            jump_speed: 0.25,
            jump_speed_moving: 0.30,
            walk_speed: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KinematicBody {
    pub position: Vec2,
    pub vertical_velocity: f32,
    pub grounded: bool,
    /// Visual only; never feeds back into collision.
    pub rotation: f32,
    neighbors: NeighborCache,
}

impl KinematicBody {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Sample the five neighbor cells at the current (rounded) position.
    /// Only collidable tiles are recorded. Guarded: a second call with the
    /// same tick number reuses the existing samples.
    pub fn refresh_neighbors(&mut self, level: &LevelData, tick: u64) {
        if self.neighbors.refreshed_tick == Some(tick) {
            return;
        }
        for (index, (_, offset)) in SLOT_OFFSETS.iter().enumerate() {
            let cell = (self.position + *offset).round();
            self.neighbors.slots[index] = level
                .tile_at(cell.x as i32, cell.y as i32)
                .filter(|tile| tile.kind.collidable())
                .copied();
        }
        self.neighbors.refreshed_tick = Some(tick);
    }

    pub fn neighbor(&self, slot: Slot) -> Option<&Tile> {
        self.neighbors.slots[slot as usize].as_ref()
    }

    /// One fixed tick of vertical physics.
    pub fn tick(&mut self, level: &LevelData, tick: u64, config: &PhysicsConfig) {
        self.refresh_neighbors(level, tick);

        self.grounded = self.neighbor(Slot::Below).is_some();
        if !self.grounded {
            self.vertical_velocity += config.gravity;
        }
        if self.grounded {
            // Standing on ground never pulls the body downward.
            self.vertical_velocity = self.vertical_velocity.max(0.0);
        }
        if self.neighbor(Slot::Above).is_some() {
            // A ceiling stops upward motion without bouncing.
            self.vertical_velocity = self.vertical_velocity.min(0.0);
        }
        self.position.y += self.vertical_velocity;
    }

    /// Horizontal displacement filtered through the side collision slots:
    /// motion into an occupied side is blocked, motion away from it is
    /// free, and an occupied center cell blocks both directions.
    pub fn blocked_horizontal(&self, dx: f32) -> f32 {
        if self.neighbor(Slot::Center).is_some() {
            return 0.0;
        }
        if dx < 0.0 && self.neighbor(Slot::Left).is_some() {
            return 0.0;
        }
        if dx > 0.0 && self.neighbor(Slot::Right).is_some() {
            return 0.0;
        }
        dx
    }

    /// Drop the tick guard so the next refresh resamples (used when the
    /// body teleports: respawn, level entry).
    pub fn invalidate_neighbors(&mut self) {
        self.neighbors = NeighborCache::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::decode_map;
    use image::{Rgba, RgbaImage};

    const AIR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
    const GROUND: Rgba<u8> = Rgba([0x00, 0x80, 0x00, 0xff]);
    const WALL: Rgba<u8> = Rgba([0x00, 0x60, 0x80, 0xff]);
    const SPAWN: Rgba<u8> = Rgba([0x00, 0xff, 0x00, 0xff]);
    const GOAL: Rgba<u8> = Rgba([0xff, 0x00, 0xff, 0xff]);

    /// 10x10 level: solid floor on world row 1, wall column at x=6 (world
    /// rows 2..=4), ceiling strip at world row 6 over x 0..=3.
    fn test_level() -> LevelData {
        let mut img = RgbaImage::from_pixel(10, 10, AIR);
        for x in 0..10 {
            img.put_pixel(x, 9, GROUND);
        }
        for world_y in 2..=4u32 {
            img.put_pixel(6, 10 - world_y, WALL);
        }
        for x in 0..=3 {
            img.put_pixel(x, 10 - 6, WALL);
        }
        img.put_pixel(1, 8, SPAWN);
        img.put_pixel(8, 8, GOAL);
        decode_map(&img, 0).expect("test level decodes")
    }

    #[test]
    fn ungrounded_velocity_strictly_decreases() {
        let level = test_level();
        let config = PhysicsConfig::default();
        let mut body = KinematicBody::at(Vec2::new(8.0, 8.0));

        let mut last = body.vertical_velocity;
        for tick in 0..6 {
            body.tick(&level, tick, &config);
            assert!(
                body.vertical_velocity < last,
                "gravity must accelerate the fall every tick"
            );
            last = body.vertical_velocity;
        }
    }

    #[test]
    fn falling_body_lands_and_stays_grounded() {
        let level = test_level();
        let config = PhysicsConfig::default();
        let mut body = KinematicBody::at(Vec2::new(8.0, 8.0));

        for tick in 0..2000 {
            body.tick(&level, tick, &config);
            if body.grounded {
                break;
            }
        }
        assert!(body.grounded, "body must reach the floor");
        assert!(
            body.vertical_velocity >= 0.0,
            "grounded clamp forbids negative velocity after the tick"
        );
        // Resting one cell above the floor row.
        assert!((body.position.y - 2.0).abs() < 0.6);
    }

    #[test]
    fn ceiling_clamps_upward_velocity() {
        let level = test_level();
        let config = PhysicsConfig::default();
        // Directly under the ceiling strip at world row 6.
        let mut body = KinematicBody::at(Vec2::new(2.0, 5.0));
        body.vertical_velocity = 0.5;

        body.tick(&level, 0, &config);
        assert!(
            body.vertical_velocity <= 0.0,
            "upward velocity must not survive a ceiling contact"
        );
        assert!(body.position.y <= 5.0 + f32::EPSILON);
    }

    #[test]
    fn neighbor_refresh_runs_once_per_tick() {
        let level = test_level();
        let mut body = KinematicBody::at(Vec2::new(5.0, 2.0));

        body.refresh_neighbors(&level, 42);
        assert!(body.neighbor(Slot::Below).is_some());

        // Teleport without invalidating: the same tick number must serve
        // the cached samples even though the position changed.
        body.position = Vec2::new(5.0, 8.0);
        body.refresh_neighbors(&level, 42);
        assert!(
            body.neighbor(Slot::Below).is_some(),
            "second refresh in one tick reuses the cache"
        );

        // The next tick resamples at the new position.
        body.refresh_neighbors(&level, 43);
        assert!(body.neighbor(Slot::Below).is_none());
    }

    #[test]
    fn side_slots_block_only_motion_into_them() {
        let level = test_level();
        let mut body = KinematicBody::at(Vec2::new(5.0, 3.0));
        body.refresh_neighbors(&level, 0);

        assert!(body.neighbor(Slot::Right).is_some(), "wall at x=6");
        assert_eq!(body.blocked_horizontal(0.1), 0.0, "into the wall: blocked");
        assert_eq!(body.blocked_horizontal(-0.1), -0.1, "away from it: free");
    }

    #[test]
    fn occupied_center_blocks_both_directions() {
        let level = test_level();
        // Inside the wall column itself.
        let mut body = KinematicBody::at(Vec2::new(6.0, 3.0));
        body.refresh_neighbors(&level, 0);

        assert!(body.neighbor(Slot::Center).is_some());
        assert_eq!(body.blocked_horizontal(0.1), 0.0);
        assert_eq!(body.blocked_horizontal(-0.1), 0.0);
    }

    #[test]
    fn out_of_bounds_neighbors_are_empty() {
        let level = test_level();
        let mut body = KinematicBody::at(Vec2::new(4.0, -30.0));
        // Falling far below the level must not panic and must see nothing.
        body.refresh_neighbors(&level, 0);
        for slot in [Slot::Center, Slot::Above, Slot::Below, Slot::Left, Slot::Right] {
            assert!(body.neighbor(slot).is_none());
        }
    }

    #[test]
    fn grounded_body_does_not_sink() {
        let level = test_level();
        let config = PhysicsConfig::default();
        let mut body = KinematicBody::at(Vec2::new(4.0, 2.0));

        for tick in 0..120 {
            body.tick(&level, tick, &config);
            assert!(body.grounded);
            assert!(body.position.y >= 2.0 - f32::EPSILON);
        }
    }
}
