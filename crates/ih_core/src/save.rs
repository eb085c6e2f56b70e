//! Persistent save state: completion/checkpoint bitmasks and the death
//! counter.
//!
//! The on-disk format is a flat JSON document with three keys:
//! `levels` (bitmask, bit n = level n completed), `checkpoints` (bitmask,
//! bit n = a checkpoint or completion was reached in level n) and
//! `death_count`. The checkpoint bit for level n-1 is what unlocks level n.
//!
//! Writes are coalesced: mutations mark the state dirty and only every
//! `FLUSH_EVERY`-th mutation actually hits the disk. `flush()` forces a
//! write and is called at level exit, so at most a handful of recent
//! mid-level mutations can ever be lost to a crash.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Mutation count between automatic disk writes.
const FLUSH_EVERY: u32 = 8;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
struct SaveDoc {
    #[serde(default)]
    levels: u64,
    #[serde(default)]
    checkpoints: u64,
    #[serde(default)]
    death_count: u32,
}

pub struct SaveState {
    doc: SaveDoc,
    path: PathBuf,
    pending_mutations: u32,
}

impl SaveState {
    /// Load the save file, or start fresh if it does not exist. A missing
    /// file is the normal first-run case, not an error.
    pub fn load(path: PathBuf) -> Self {
        let doc = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(err) => {
                    log::error!("Save file {} is unreadable: {err}", path.display());
                    SaveDoc::default()
                }
            },
            Err(_) => {
                log::info!("No save file at {}, starting fresh", path.display());
                SaveDoc::default()
            }
        };
        Self {
            doc,
            path,
            pending_mutations: 0,
        }
    }

    pub fn death_count(&self) -> u32 {
        self.doc.death_count
    }

    pub fn levels_mask(&self) -> u64 {
        self.doc.levels
    }

    pub fn checkpoints_mask(&self) -> u64 {
        self.doc.checkpoints
    }

    pub fn is_completed(&self, level: usize) -> bool {
        level < u64::BITS as usize && self.doc.levels & (1 << level) != 0
    }

    pub fn has_checkpoint(&self, level: usize) -> bool {
        level < u64::BITS as usize && self.doc.checkpoints & (1 << level) != 0
    }

    /// Level 0 is always playable; every later level requires the previous
    /// level's checkpoint bit.
    pub fn is_unlocked(&self, level: usize) -> bool {
        level == 0 || self.has_checkpoint(level - 1)
    }

    /// Completion also counts as a reached checkpoint, so finishing a level
    /// always unlocks the next one.
    pub fn mark_completed(&mut self, level: usize) {
        if level >= u64::BITS as usize {
            return;
        }
        let new_levels = self.doc.levels | (1 << level);
        let new_checkpoints = self.doc.checkpoints | (1 << level);
        if new_levels == self.doc.levels && new_checkpoints == self.doc.checkpoints {
            return;
        }
        self.doc.levels = new_levels;
        self.doc.checkpoints = new_checkpoints;
        self.mutated();
    }

    pub fn mark_checkpoint(&mut self, level: usize) {
        if level >= u64::BITS as usize || self.has_checkpoint(level) {
            return;
        }
        self.doc.checkpoints |= 1 << level;
        self.mutated();
    }

    pub fn record_death(&mut self) {
        self.doc.death_count += 1;
        self.mutated();
    }

    /// Wipe all progress and persist the empty state immediately.
    pub fn reset(&mut self) {
        self.doc = SaveDoc::default();
        self.flush();
    }

    /// Write to disk unconditionally.
    pub fn flush(&mut self) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }
        match serde_json::to_string(&self.doc) {
            Ok(raw) => {
                if let Err(err) = fs::write(&self.path, raw) {
                    log::error!("Failed to write save file {}: {err}", self.path.display());
                } else {
                    self.pending_mutations = 0;
                    log::info!("Save state flushed to {}", self.path.display());
                }
            }
            Err(err) => log::error!("Failed to serialize save state: {err}"),
        }
    }

    fn mutated(&mut self) {
        self.pending_mutations += 1;
        if self.pending_mutations >= FLUSH_EVERY {
            self.flush();
        }
    }

    #[cfg(test)]
    fn pending(&self) -> u32 {
        self.pending_mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_save_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "ih_save_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_save_path("missing");
        let save = SaveState::load(path);
        assert_eq!(save.levels_mask(), 0);
        assert_eq!(save.checkpoints_mask(), 0);
        assert_eq!(save.death_count(), 0);
    }

    #[test]
    fn unlock_follows_previous_checkpoint_bit() {
        let path = temp_save_path("unlock");
        let mut save = SaveState::load(path.clone());
        assert!(save.is_unlocked(0), "level 0 is always unlocked");
        assert!(!save.is_unlocked(1));
        assert!(!save.is_unlocked(2));

        save.mark_checkpoint(0);
        assert!(save.is_unlocked(1));
        assert!(!save.is_unlocked(2), "only the next level unlocks");

        for n in 1..10 {
            assert_eq!(save.is_unlocked(n), save.has_checkpoint(n - 1));
        }
        let _ = fs::remove_file(path);
    }

    #[test]
    fn checkpoint_marking_is_idempotent() {
        let path = temp_save_path("idempotent");
        let mut save = SaveState::load(path.clone());
        save.mark_checkpoint(3);
        let mask = save.checkpoints_mask();
        let pending = save.pending();
        save.mark_checkpoint(3);
        assert_eq!(save.checkpoints_mask(), mask);
        assert_eq!(save.pending(), pending, "repeat visit is not a mutation");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn completion_implies_checkpoint() {
        let path = temp_save_path("completion");
        let mut save = SaveState::load(path.clone());
        save.mark_completed(2);
        assert!(save.is_completed(2));
        assert!(save.has_checkpoint(2));
        assert!(save.is_unlocked(3));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn writes_coalesce_until_interval_or_flush() {
        let path = temp_save_path("coalesce");
        let mut save = SaveState::load(path.clone());
        for _ in 0..FLUSH_EVERY - 1 {
            save.record_death();
        }
        assert!(!path.exists(), "no write before the interval fills");
        save.record_death();
        assert!(path.exists(), "interval-filling mutation flushes");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn reset_wipes_progress_on_disk_too() {
        let path = temp_save_path("reset");
        let mut save = SaveState::load(path.clone());
        save.mark_completed(0);
        save.mark_checkpoint(1);
        save.record_death();
        save.reset();

        assert_eq!(save.levels_mask(), 0);
        assert_eq!(save.death_count(), 0);
        let reloaded = SaveState::load(path.clone());
        assert_eq!(reloaded.checkpoints_mask(), 0);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn flush_and_reload_round_trips() {
        let path = temp_save_path("roundtrip");
        let mut save = SaveState::load(path.clone());
        save.mark_completed(0);
        save.mark_checkpoint(1);
        save.record_death();
        save.flush();

        let reloaded = SaveState::load(path.clone());
        assert!(reloaded.is_completed(0));
        assert!(reloaded.has_checkpoint(1));
        assert_eq!(reloaded.death_count(), 1);
        let _ = fs::remove_file(path);
    }
}
