//! Patrolling enemies.
//!
//! Enemies share the kinematic body with the player and read the same
//! five-slot collision cache. The patrol rule is: walk in the current
//! direction each fixed tick, turning around when the side slot in that
//! direction is occupied or when the next cell ahead has no ground under
//! it (so patrols stay on their platform).

use crate::level::{EnemyPlaceholder, LevelData};
use crate::physics::{KinematicBody, PhysicsConfig, Slot};
use crate::projection::ProjectionCache;
use glam::Vec2;

/// Patrol speed in tiles per fixed tick.
const PATROL_SPEED: f32 = 0.04;

#[derive(Debug)]
pub struct Enemy {
    pub body: KinematicBody,
    /// -1.0 or +1.0.
    pub direction: f32,
    pub cache: ProjectionCache,
}

impl Enemy {
    pub fn from_placeholder(placeholder: &EnemyPlaceholder) -> Self {
        Self {
            body: KinematicBody::at(placeholder.position),
            direction: placeholder.direction,
            cache: ProjectionCache::default(),
        }
    }

    pub fn tick(&mut self, level: &LevelData, tick: u64, config: &PhysicsConfig) {
        self.body.refresh_neighbors(level, tick);

        let side = if self.direction < 0.0 {
            Slot::Left
        } else {
            Slot::Right
        };
        let wall_ahead = self.body.neighbor(side).is_some();
        let ledge_ahead = self.body.grounded && !self.ground_ahead(level);

        if wall_ahead || ledge_ahead {
            self.direction = -self.direction;
        } else {
            let dx = self.body.blocked_horizontal(self.direction * PATROL_SPEED);
            self.body.position.x += dx;
        }

        self.body.tick(level, tick, config);
    }

    fn ground_ahead(&self, level: &LevelData) -> bool {
        let ahead = (self.body.position + Vec2::new(self.direction, 0.0)).round();
        level
            .tile_at(ahead.x as i32, ahead.y as i32 - 1)
            .is_some_and(|tile| tile.kind.collidable())
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
    const ENEMY_R: Rgba<u8> = Rgba([0x80, 0x80, 0x00, 0xff]);

    /// Platform spanning world x 2..=7 at row 1. A wall block sits on the
    /// platform at world (7, 2), bounding the right side of the patrol;
    /// the platform edge at x=2 bounds the left side as a ledge.
    fn patrol_level() -> LevelData {
        let mut img = RgbaImage::from_pixel(12, 8, AIR);
        for x in 2..=7 {
            img.put_pixel(x, 7, GROUND);
        }
        img.put_pixel(7, 6, WALL); // world (7, 2)
        img.put_pixel(3, 6, SPAWN);
        img.put_pixel(9, 5, GOAL);
        img.put_pixel(5, 6, ENEMY_R); // world (5, 2)
        decode_map(&img, 0).expect("patrol level decodes")
    }

    fn settled_enemy(level: &LevelData) -> Enemy {
        let mut enemy = Enemy::from_placeholder(&level.enemies[0]);
        // One tick to ground the body before the patrol assertions.
        enemy.tick(level, 0, &PhysicsConfig::default());
        enemy
    }

    #[test]
    fn placeholder_materializes_with_its_direction() {
        let level = patrol_level();
        let enemy = Enemy::from_placeholder(&level.enemies[0]);
        assert_eq!(enemy.body.position, Vec2::new(5.0, 2.0));
        assert_eq!(enemy.direction, 1.0);
    }

    #[test]
    fn enemy_turns_at_walls() {
        let level = patrol_level();
        let config = PhysicsConfig::default();
        let mut enemy = settled_enemy(&level);
        assert_eq!(enemy.direction, 1.0);

        // Walk right until the wall at x=8 turns the patrol around.
        let mut turned = false;
        for tick in 1..2000 {
            enemy.tick(&level, tick, &config);
            if enemy.direction < 0.0 {
                turned = true;
                break;
            }
        }
        assert!(turned, "patrol must turn at the wall");
        assert!(enemy.body.position.x < 8.0);
    }

    #[test]
    fn enemy_turns_at_ledges() {
        let level = patrol_level();
        let config = PhysicsConfig::default();
        let mut enemy = settled_enemy(&level);
        enemy.direction = -1.0;

        // Walk left toward the platform edge at x=2.
        let mut min_x = enemy.body.position.x;
        for tick in 1..2000 {
            enemy.tick(&level, tick, &config);
            min_x = min_x.min(enemy.body.position.x);
            if enemy.direction > 0.0 {
                break;
            }
        }
        assert!(enemy.direction > 0.0, "patrol must turn at the ledge");
        assert!(min_x >= 1.4, "enemy never walks off the platform");
    }

    #[test]
    fn patrol_stays_grounded_forever() {
        let level = patrol_level();
        let config = PhysicsConfig::default();
        let mut enemy = settled_enemy(&level);

        for tick in 1..5000 {
            enemy.tick(&level, tick, &config);
            assert!(
                enemy.body.position.y > 1.0,
                "patrolling enemy must never fall through or off the platform"
            );
        }
    }
}
