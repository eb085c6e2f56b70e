//! Hub / in-level session state machine.
//!
//! The session owns the mode, the save state and the live enemy set, and
//! applies the gameplay rules each fixed tick while a level is active:
//! goal detection, immediate checkpoint bits, and death handling. Entering
//! a level materializes enemies from their placeholders and places the
//! player at the checkpoint-aware spawn; leaving (by goal or by the exit
//! button) tears the enemies down, returns the player to the hub origin
//! and flushes the save, so a level can be replayed from a clean state.

use crate::enemy::Enemy;
use crate::level::LevelData;
use crate::physics::PhysicsConfig;
use crate::player::Player;
use glam::Vec2;
use ih_core::save::SaveState;

/// Falling below this world Y while in a level kills the player.
pub const DEATH_Y: f32 = 0.5;
/// Squared contact radius for enemy hits.
const ENEMY_CONTACT_SQ: f32 = 0.36;
/// Squared arrival radius for the goal.
const GOAL_RADIUS_SQ: f32 = 1.0;

pub const HUB_ORIGIN: Vec2 = Vec2::ZERO;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Hub,
    InLevel(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    None,
    /// The player died and was respawned inside the level.
    Died,
    /// The goal was reached; the caller finishes with `exit_level`.
    Completed,
}

pub struct Session {
    pub mode: Mode,
    pub save: SaveState,
    pub enemies: Vec<Enemy>,
    /// Fixed tick counter; also the stamp for the collision caches.
    pub tick: u64,
}

impl Session {
    pub fn new(save: SaveState) -> Self {
        Self {
            mode: Mode::Hub,
            save,
            enemies: Vec::new(),
            tick: 0,
        }
    }

    /// Where the player respawns in a level right now: the checkpoint once
    /// its bit is earned, the start otherwise.
    pub fn spawn_point(&self, level: &LevelData) -> Vec2 {
        if self.save.has_checkpoint(level.number) {
            level.checkpoint
        } else {
            level.startpoint
        }
    }

    /// Hub -> InLevel. Refuses while already in a level or when the level
    /// is still locked.
    pub fn enter_level(&mut self, level: &LevelData, player: &mut Player) -> bool {
        if self.mode != Mode::Hub || !self.save.is_unlocked(level.number) {
            return false;
        }
        player.spawn_at(self.spawn_point(level));
        self.enemies = level
            .enemies
            .iter()
            .map(Enemy::from_placeholder)
            .collect();
        self.mode = Mode::InLevel(level.number);
        log::info!(
            "Entered level {} ({} enemies active)",
            level.number,
            self.enemies.len()
        );
        true
    }

    /// One fixed tick of in-level gameplay. Must only be called while
    /// `mode` is `InLevel` with that level's data.
    pub fn fixed_tick(
        &mut self,
        level: &LevelData,
        player: &mut Player,
        config: &PhysicsConfig,
    ) -> TickOutcome {
        self.tick += 1;

        // Goal first, on the position the player actually stands at.
        if player.body.position.distance_squared(level.endpoint) <= GOAL_RADIUS_SQ {
            return TickOutcome::Completed;
        }

        player.body.tick(level, self.tick, config);
        for enemy in &mut self.enemies {
            enemy.tick(level, self.tick, config);
        }

        // Checkpoint bits are earned the moment the rounded position
        // matches a trigger cell, not deferred to level exit.
        let cell = player.body.position.round();
        if level
            .checkpoint_positions
            .contains(&(cell.x as i32, cell.y as i32))
        {
            self.save.mark_checkpoint(level.number);
        }

        let fell = player.body.position.y < DEATH_Y;
        let hit_enemy = self.enemies.iter().any(|enemy| {
            enemy
                .body
                .position
                .distance_squared(player.body.position)
                < ENEMY_CONTACT_SQ
        });
        if fell || hit_enemy {
            self.save.record_death();
            player.spawn_at(self.spawn_point(level));
            log::info!(
                "Death #{} in level {}, respawning",
                self.save.death_count(),
                level.number
            );
            return TickOutcome::Died;
        }

        TickOutcome::None
    }

    /// InLevel -> Hub, by completion or by the exit button. Always tears
    /// down enemies, returns the player to the hub origin and flushes the
    /// save state.
    pub fn exit_level(&mut self, player: &mut Player, completed: bool) {
        if let Mode::InLevel(number) = self.mode {
            if completed {
                self.save.mark_completed(number);
                log::info!("Level {number} completed");
            }
            self.enemies.clear();
            player.spawn_at(HUB_ORIGIN);
            self.save.flush();
            self.mode = Mode::Hub;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::decode_map;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    const AIR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
    const GROUND: Rgba<u8> = Rgba([0x00, 0x80, 0x00, 0xff]);
    const SPAWN: Rgba<u8> = Rgba([0x00, 0xff, 0x00, 0xff]);
    const GOAL: Rgba<u8> = Rgba([0xff, 0x00, 0xff, 0xff]);
    const CHECKPOINT: Rgba<u8> = Rgba([0xff, 0xff, 0x00, 0xff]);
    const ENEMY_R: Rgba<u8> = Rgba([0x80, 0x80, 0x00, 0xff]);

    fn temp_save_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "ih_session_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn fresh_session(name_hint: &str) -> (Session, PathBuf) {
        let path = temp_save_path(name_hint);
        (Session::new(SaveState::load(path.clone())), path)
    }

    /// Minimal 3x3 grid: spawn at world (1,1), goal one tile above at
    /// world (1,2).
    fn tiny_goal_level() -> LevelData {
        let mut img = RgbaImage::from_pixel(3, 3, AIR);
        img.put_pixel(1, 2, SPAWN); // world (1, 1)
        img.put_pixel(1, 1, GOAL); // world (1, 2)
        decode_map(&img, 0).expect("tiny level decodes")
    }

    /// 12x8 level with a floor, a checkpoint trigger at world (6, 2) and an
    /// enemy placeholder at world (9, 2).
    fn full_level(number: usize) -> LevelData {
        let mut img = RgbaImage::from_pixel(12, 8, AIR);
        for x in 0..12 {
            img.put_pixel(x, 7, GROUND);
        }
        img.put_pixel(1, 6, SPAWN); // world (1, 2)
        img.put_pixel(11, 4, GOAL); // world (11, 4)
        img.put_pixel(6, 6, CHECKPOINT); // world (6, 2)
        img.put_pixel(9, 6, ENEMY_R); // world (9, 2)
        let mut data = decode_map(&img, 0).expect("full level decodes");
        data.number = number;
        data
    }

    #[test]
    fn entering_goal_radius_completes_the_level() {
        let (mut session, path) = fresh_session("scenario_a");
        let level = tiny_goal_level();
        let mut player = Player::default();
        let config = PhysicsConfig::default();

        assert!(session.enter_level(&level, &mut player));
        assert_eq!(session.mode, Mode::InLevel(0));
        // Spawn (1,1) is exactly distance^2 = 1 from the goal (1,2).
        let outcome = session.fixed_tick(&level, &mut player, &config);
        assert_eq!(outcome, TickOutcome::Completed);

        session.exit_level(&mut player, true);
        assert_eq!(session.mode, Mode::Hub);
        assert!(session.save.is_completed(0));
        assert!(session.save.has_checkpoint(0), "completion implies checkpoint");
        assert_eq!(player.body.position, HUB_ORIGIN);
        assert!(path.exists(), "exit flushes the save file");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn falling_below_threshold_kills_and_respawns() {
        let (mut session, path) = fresh_session("scenario_b");
        let level = full_level(0);
        let mut player = Player::default();
        let config = PhysicsConfig::default();

        assert!(session.enter_level(&level, &mut player));
        player.body.position = Vec2::new(3.0, 0.3);
        let outcome = session.fixed_tick(&level, &mut player, &config);

        assert_eq!(outcome, TickOutcome::Died);
        assert_eq!(session.save.death_count(), 1, "exactly one death recorded");
        assert_eq!(player.body.position, level.startpoint, "no checkpoint yet");
        assert_eq!(player.body.vertical_velocity, 0.0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn death_respawn_honors_the_checkpoint_bit() {
        let (mut session, path) = fresh_session("checkpoint_respawn");
        let level = full_level(0);
        let mut player = Player::default();
        let config = PhysicsConfig::default();

        session.enter_level(&level, &mut player);
        session.save.mark_checkpoint(0);
        player.body.position = Vec2::new(3.0, 0.1);
        let outcome = session.fixed_tick(&level, &mut player, &config);

        assert_eq!(outcome, TickOutcome::Died);
        assert_eq!(player.body.position, level.checkpoint);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn checkpoint_bit_is_set_the_moment_the_cell_is_touched() {
        let (mut session, path) = fresh_session("checkpoint_touch");
        let level = full_level(2);
        // Unlock level 2 by giving level 1 its checkpoint.
        session.save.mark_checkpoint(1);
        let mut player = Player::default();
        let config = PhysicsConfig::default();

        assert!(session.enter_level(&level, &mut player));
        assert!(!session.save.has_checkpoint(2));
        // Stand on the trigger cell; rounding catches nearby positions too.
        player.body.position = Vec2::new(6.2, 2.4);
        session.fixed_tick(&level, &mut player, &config);
        assert!(session.save.has_checkpoint(2), "bit set mid-level, not at exit");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn locked_levels_refuse_entry() {
        let (mut session, path) = fresh_session("locked");
        let level = full_level(3);
        let mut player = Player::default();

        assert!(!session.enter_level(&level, &mut player));
        assert_eq!(session.mode, Mode::Hub);
        assert!(session.enemies.is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn enemies_materialize_on_entry_and_clear_on_exit() {
        let (mut session, path) = fresh_session("enemy_lifecycle");
        let level = full_level(0);
        let mut player = Player::default();

        session.enter_level(&level, &mut player);
        assert_eq!(session.enemies.len(), 1);
        assert_eq!(session.enemies[0].body.position, Vec2::new(9.0, 2.0));

        session.exit_level(&mut player, false);
        assert!(session.enemies.is_empty());
        assert!(!session.save.is_completed(0), "plain exit completes nothing");

        // Re-entry rebuilds the same initial enemy state.
        session.enter_level(&level, &mut player);
        assert_eq!(session.enemies.len(), 1);
        assert_eq!(session.enemies[0].body.position, Vec2::new(9.0, 2.0));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn touching_an_enemy_counts_as_a_death() {
        let (mut session, path) = fresh_session("enemy_contact");
        let level = full_level(0);
        let mut player = Player::default();
        let config = PhysicsConfig::default();

        session.enter_level(&level, &mut player);
        player.body.position = session.enemies[0].body.position;
        let outcome = session.fixed_tick(&level, &mut player, &config);

        assert_eq!(outcome, TickOutcome::Died);
        assert_eq!(session.save.death_count(), 1);
        assert_eq!(player.body.position, level.startpoint);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn exit_in_hub_mode_is_inert() {
        let (mut session, path) = fresh_session("inert_exit");
        let mut player = Player::default();
        player.body.position = Vec2::new(-5.0, 3.0);

        session.exit_level(&mut player, true);
        assert_eq!(session.mode, Mode::Hub);
        assert_eq!(player.body.position, Vec2::new(-5.0, 3.0));
        assert_eq!(session.save.levels_mask(), 0);
        let _ = std::fs::remove_file(path);
    }
}
