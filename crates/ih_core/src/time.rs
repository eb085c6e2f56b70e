//! Frame timing and the fixed-timestep accumulator.
//!
//! Rendering runs as fast as the display (or compositor) allows; gameplay
//! physics runs at `FIXED_FPS` by draining wall-clock time from an
//! accumulator in fixed slices. Gravity and jump constants are tuned as
//! per-tick deltas, so the tick rate is part of the gameplay contract.

use std::time::Instant;

/// Physics tick rate. Changing this without retuning the per-tick physics
/// constants changes how the game feels.
pub const FIXED_FPS: u32 = 60;

/// Exponential smoothing factor for the displayed FPS figure.
const FPS_SMOOTHING: f64 = 0.9;

pub struct TimeState {
    pub fixed_dt: f64,
    accumulator: f64,
    last_instant: Instant,
    /// Cap on how much simulation debt one frame may accrue.
    max_accumulator: f64,
    pub real_dt: f64,
    pub total_time: f64,
    pub fixed_step_count: u64,
    pub steps_this_frame: u32,
    pub frame_count: u64,
    pub smoothed_fps: f64,
}

impl TimeState {
    pub fn new() -> Self {
        Self {
            fixed_dt: 1.0 / FIXED_FPS as f64,
            accumulator: 0.0,
            last_instant: Instant::now(),
            max_accumulator: 0.25,
            real_dt: 0.0,
            total_time: 0.0,
            fixed_step_count: 0,
            steps_this_frame: 0,
            frame_count: 0,
            smoothed_fps: FIXED_FPS as f64,
        }
    }

    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        self.real_dt = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;

        // Spiral-of-death cap: a long stall must not translate into a burst
        // of hundreds of catch-up ticks.
        if self.real_dt > self.max_accumulator {
            log::warn!(
                "Frame took {:.0}ms, capping simulation catch-up at {:.0}ms",
                self.real_dt * 1000.0,
                self.max_accumulator * 1000.0
            );
            self.real_dt = self.max_accumulator;
        }

        self.accumulator += self.real_dt;
        self.steps_this_frame = 0;
        self.frame_count += 1;

        let instant_fps = if self.real_dt > 0.0 {
            1.0 / self.real_dt
        } else {
            1000.0
        };
        self.smoothed_fps =
            self.smoothed_fps * FPS_SMOOTHING + instant_fps * (1.0 - FPS_SMOOTHING);
    }

    /// Consume one fixed slice from the accumulator if enough time has
    /// built up. Call in a loop until it returns false.
    pub fn should_step(&mut self) -> bool {
        if self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            self.total_time += self.fixed_dt;
            self.fixed_step_count += 1;
            self.steps_this_frame += 1;
            true
        } else {
            false
        }
    }

    /// Total simulated time in whole milliseconds. Drives wall-clock-ish
    /// effects (walk animation frames) deterministically.
    pub fn total_millis(&self) -> u64 {
        (self.total_time * 1000.0) as u64
    }
}

impl Default for TimeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_step_without_accumulated_time() {
        let mut time = TimeState::new();
        // begin_frame immediately after construction accumulates (almost)
        // nothing, so no full fixed slice is available.
        time.begin_frame();
        assert_eq!(time.steps_this_frame, 0);
    }

    #[test]
    fn accumulated_time_drains_in_fixed_slices() {
        let mut time = TimeState::new();
        time.accumulator = time.fixed_dt * 3.5;
        let mut steps = 0;
        while time.should_step() {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert!(time.accumulator < time.fixed_dt);
        assert_eq!(time.fixed_step_count, 3);
    }

    #[test]
    fn accumulator_is_capped_after_a_stall() {
        let mut time = TimeState::new();
        time.last_instant = Instant::now() - std::time::Duration::from_secs(5);
        time.begin_frame();
        assert!(time.real_dt <= time.max_accumulator + f64::EPSILON);
    }

    #[test]
    fn total_millis_tracks_simulated_time() {
        let mut time = TimeState::new();
        time.accumulator = time.fixed_dt * 120.0;
        while time.should_step() {}
        // 120 ticks at 60 Hz is two simulated seconds, give or take
        // accumulated float error.
        let ms = time.total_millis();
        assert!((1999..=2001).contains(&ms), "unexpected total: {ms}ms");
    }
}
