//! The overworld hub: level markers and the generated island background.
//!
//! Markers are world-space sprites the player walks into to start a level.
//! Each marker owns its level's decoded data (or a note that the level
//! directory was missing, in which case the marker renders as unavailable
//! and entering it does nothing).
//!
//! The island background is a bitmap of randomly rotated sand tiles with a
//! band of water along the bottom, composed once with the image crate and
//! cached to `cache/bigmap.png`; later runs load the cached bitmap.

use crate::level::{self, LevelData};
use crate::projection::ProjectionCache;
use glam::Vec2;
use image::RgbaImage;
use rand::Rng;
use std::path::Path;

pub const LEVEL_COUNT: usize = 10;

/// World position of the island bitmap's top-left corner.
pub const MAP_POINT: Vec2 = Vec2::new(-40.0, 32.0);
/// Sand area in 16 px art tiles; a band of water rows is appended below.
pub const MAP_SIZE: (u32, u32) = (80, 56);
pub const WATER_ROWS: u32 = 8;
pub const ART_TILE_PX: u32 = 16;

const MARKER_SPACING: f32 = 2.5;
const MARKER_Y: f32 = 2.0;

pub struct LevelMarker {
    pub number: usize,
    pub position: Vec2,
    /// None when the level failed to load (missing directory/map); the
    /// marker then renders as unavailable and cannot be entered.
    pub data: Option<LevelData>,
    pub cache: ProjectionCache,
}

pub fn marker_position(number: usize) -> Vec2 {
    Vec2::new(-(number as f32) * MARKER_SPACING, MARKER_Y)
}

/// Load all level markers. Unloadable levels are warned about and kept as
/// inert markers; a corrupt level cache still aborts inside `load_level`.
pub fn load_markers(levels_dir: &Path, cache_dir: &Path) -> Vec<LevelMarker> {
    (0..LEVEL_COUNT)
        .map(|number| {
            let data = match level::load_level(number, levels_dir, cache_dir) {
                Ok(data) => Some(data),
                Err(err) => {
                    log::warn!("Level {number} unavailable: {err}");
                    None
                }
            };
            LevelMarker {
                number,
                position: marker_position(number),
                data,
                cache: ProjectionCache::default(),
            }
        })
        .collect()
}

/// Compose the island bitmap, or load it from the cache if a previous run
/// already did.
pub fn load_overworld(assets_dir: &Path, cache_dir: &Path) -> Result<RgbaImage, String> {
    let cache_path = cache_dir.join("bigmap.png");
    if cache_path.exists() {
        return image::open(&cache_path)
            .map(|img| img.to_rgba8())
            .map_err(|e| format!("Failed to open cached overworld {}: {e}", cache_path.display()));
    }

    let sand = open_art_tile(&assets_dir.join("sand.png"))?;
    let water = open_art_tile(&assets_dir.join("water.png"))?;
    let composed = compose_island(&sand, &water, &mut rand::thread_rng());

    if let Err(err) = std::fs::create_dir_all(cache_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| composed.save(&cache_path).map_err(|e| e.to_string()))
    {
        log::warn!("Failed to cache overworld bitmap: {err}");
    } else {
        log::info!("Overworld bitmap composed and cached to {}", cache_path.display());
    }
    Ok(composed)
}

fn open_art_tile(path: &Path) -> Result<RgbaImage, String> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("Failed to open art tile {}: {e}", path.display()))
}

/// Sand over the full map area, water across the appended bottom band,
/// every art tile stamped in a random quarter-turn orientation.
pub fn compose_island<R: Rng>(sand: &RgbaImage, water: &RgbaImage, rng: &mut R) -> RgbaImage {
    let total_rows = MAP_SIZE.1 + WATER_ROWS;
    let mut island = RgbaImage::new(MAP_SIZE.0 * ART_TILE_PX, total_rows * ART_TILE_PX);

    let sand_turns = quarter_turns(sand);
    let water_turns = quarter_turns(water);

    for tx in 0..MAP_SIZE.0 {
        for ty in 0..total_rows {
            let source = if ty < MAP_SIZE.1 {
                &sand_turns[rng.gen_range(0..4)]
            } else {
                &water_turns[rng.gen_range(0..4)]
            };
            image::imageops::replace(
                &mut island,
                source,
                (tx * ART_TILE_PX) as i64,
                (ty * ART_TILE_PX) as i64,
            );
        }
    }
    island
}

fn quarter_turns(tile: &RgbaImage) -> [RgbaImage; 4] {
    [
        tile.clone(),
        image::imageops::rotate90(tile),
        image::imageops::rotate180(tile),
        image::imageops::rotate270(tile),
    ]
}
