//! World-to-screen projection.
//!
//! World space is measured in tiles with Y growing upward; the screen is
//! pixels with Y growing downward. The game renders at a logical 640x480
//! (4:3) resolution scaled to the real window, with a fixed zoom factor
//! `GROWNESS` (screen pixels per tile at logical resolution). An entity is
//! projected by shifting its position to be camera-relative, scaling to
//! pixels, flooring, and flipping the vertical axis.
//!
//! Projection results are memoized per entity against the exact tuple
//! (position, rotation, camera position). Equality is exact, not
//! approximate: any change recomputes, so the cache can never serve a rect
//! for a stale position.

use glam::Vec2;

pub const LOGICAL_WIDTH: f32 = 640.0;
pub const LOGICAL_HEIGHT: f32 = 480.0;

/// Screen pixels per world tile at the logical 640x480 resolution.
pub const GROWNESS: f32 = 50.0;

/// Axis-aligned screen rectangle in real window pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl ScreenRect {
    pub fn intersects(&self, other: &ScreenRect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x as f64
            && px < (self.x + self.w) as f64
            && py >= self.y as f64
            && py < (self.y + self.h) as f64
    }
}

/// Last-call memo for one entity's projection. Holds exactly one key/value
/// pair; a repeated query with an identical key is served without
/// recomputing.
#[derive(Debug, Default, Clone)]
pub struct ProjectionCache {
    last: Option<((Vec2, f32, Vec2), Option<ScreenRect>)>,
    /// Number of cache misses, surfaced in the debug overlay.
    pub recomputes: u64,
}

pub struct Viewport {
    pub screen_size: (u32, u32),
    /// Window pixels per logical pixel.
    pub scale_direct: f32,
    /// Window pixels per world tile.
    pub scale: f32,
    /// Shift applied before the camera is subtracted, placing world origin
    /// near the screen center when the camera sits at the origin.
    pub center_offset: Vec2,
}

impl Viewport {
    pub fn new(screen_w: u32, screen_h: u32) -> Self {
        let scale_direct = screen_w as f32 / LOGICAL_WIDTH;
        Self {
            screen_size: (screen_w, screen_h),
            scale_direct,
            scale: scale_direct * GROWNESS,
            center_offset: Vec2::new(
                LOGICAL_WIDTH / 2.0 / GROWNESS,
                LOGICAL_HEIGHT / 2.0 / GROWNESS,
            ),
        }
    }

    /// Height of the 4:3 content area in window pixels. Equal to the window
    /// height when the window is exactly 4:3.
    pub fn content_height_px(&self) -> f32 {
        LOGICAL_HEIGHT * self.scale_direct
    }

    pub fn camera_relative(&self, position: Vec2, camera: Vec2) -> Vec2 {
        position + self.center_offset - camera
    }

    /// Project through the entity's memo. `rotation` does not move the
    /// rect but is part of the key so rotated redraws are never stale.
    pub fn project_cached(
        &self,
        cache: &mut ProjectionCache,
        position: Vec2,
        rotation: f32,
        size_tiles: f32,
        camera: Vec2,
    ) -> Option<ScreenRect> {
        let key = (position, rotation, camera);
        if let Some((last_key, rect)) = cache.last {
            if last_key == key {
                return rect;
            }
        }
        let rect = self.project(position, size_tiles, camera);
        cache.last = Some((key, rect));
        cache.recomputes += 1;
        rect
    }

    /// Project a world position to a screen rect, or None when a
    /// tile-sized-or-smaller entity is outside the visible window (plus a
    /// one-tile margin). Larger entities are never culled here.
    pub fn project(&self, position: Vec2, size_tiles: f32, camera: Vec2) -> Option<ScreenRect> {
        let rel = self.camera_relative(position, camera);
        if size_tiles <= 1.0
            && (rel.x < -1.0
                || rel.y < -1.0
                || rel.x > GROWNESS * 4.0 / 3.0 + 1.0
                || rel.y > GROWNESS + 1.0)
        {
            return None;
        }
        let px = (rel * self.scale).floor();
        let side = (size_tiles * self.scale).floor() as i32;
        Some(ScreenRect {
            x: px.x as i32,
            y: self.content_height_px() as i32 - px.y as i32,
            w: side,
            h: side,
        })
    }
}
