//! Level data: the tile grid and its loader.
//!
//! Levels are authored as color-coded PNGs. Every pixel maps to exactly one
//! tile or marker kind; unknown colors are logged and treated as air so a
//! stray pixel can never kill a level. The image origin is top-left while
//! the world origin is bottom-left, so image row `y` becomes world row
//! `height - y`. The grid is addressed `[x][world_y]`, which makes world
//! rows 1-based; each column therefore has `height + 1` slots with row 0
//! permanently empty.
//!
//! Decoding is done once per level and the result is cached to
//! `cache/level{n}.json`. A cache file that no longer deserializes is a
//! corrupt-cache integrity failure and aborts; deleting the file forces a
//! re-decode.

use glam::Vec2;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// Authoring palette (0xRRGGBB).
const COLOR_AIR: u32 = 0xffffff;
const COLOR_GROUND: u32 = 0x008000;
const COLOR_WALL: u32 = 0x006080;
const COLOR_WATER: u32 = 0x0000ff;
const COLOR_HAZARD: u32 = 0xff0000;
const COLOR_SPAWN: u32 = 0x00ff00;
const COLOR_CHECKPOINT: u32 = 0xffff00;
const COLOR_CHECKPOINT_RESPAWN: u32 = 0xff8000;
const COLOR_GOAL: u32 = 0xff00ff;
const COLOR_ENEMY_LEFT: u32 = 0x800080;
const COLOR_ENEMY_RIGHT: u32 = 0x808000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    Ground,
    Wall,
    Water,
    Hazard,
}

impl TileKind {
    pub fn collidable(self) -> bool {
        matches!(self, TileKind::Ground | TileKind::Wall)
    }

    pub fn friction(self) -> f32 {
        match self {
            TileKind::Ground => 1.0,
            TileKind::Wall => 0.8,
            TileKind::Water | TileKind::Hazard => 0.0,
        }
    }

    /// Asset registry key for this kind's texture.
    pub fn texture_key(self) -> &'static str {
        match self {
            TileKind::Ground => "tile:ground",
            TileKind::Wall => "tile:wall",
            TileKind::Water => "tile:water",
            TileKind::Hazard => "tile:hazard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    pub x: i32,
    pub y: i32,
}

/// Decoded enemy marker. Live enemies are built from these on level entry
/// and thrown away on exit, so replays always start from the same state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyPlaceholder {
    pub position: Vec2,
    /// -1.0 walks left first, +1.0 walks right first.
    pub direction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Optional per-level metadata sitting next to the map image.
#[derive(Debug, Clone, Default, Deserialize)]
struct LevelMeta {
    #[serde(default)]
    background: Option<WorldRect>,
    #[serde(default)]
    music: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelData {
    pub number: usize,
    pub size: (u32, u32),
    /// `tiles[x][world_y]`; world rows run 1..=height, slot 0 stays empty.
    pub tiles: Vec<Vec<Option<Tile>>>,
    pub startpoint: Vec2,
    pub endpoint: Vec2,
    /// Checkpoint-aware respawn position.
    pub checkpoint: Vec2,
    pub checkpoint_positions: HashSet<(i32, i32)>,
    pub enemies: Vec<EnemyPlaceholder>,
    pub background_rect: Option<WorldRect>,
    pub background_path: Option<String>,
    pub song_path: Option<String>,
}

impl LevelData {
    /// Bounds-checked grid lookup. Out-of-range coordinates (including a
    /// body that fell past the level edge) are simply empty.
    pub fn tile_at(&self, x: i32, world_y: i32) -> Option<&Tile> {
        if x < 0 || world_y < 0 {
            return None;
        }
        self.tiles
            .get(x as usize)
            .and_then(|column| column.get(world_y as usize))
            .and_then(|slot| slot.as_ref())
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }
}

fn pixel_rgb(image: &RgbaImage, x: u32, y: u32) -> u32 {
    let p = image.get_pixel(x, y);
    ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32
}

/// Decode a palette image into level data. Fails when the single-spawn or
/// single-goal structure is violated; unknown colors only warn.
pub fn decode_map(image: &RgbaImage, number: usize) -> Result<LevelData, String> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(format!("Level {number} map image is empty"));
    }

    let mut tiles: Vec<Vec<Option<Tile>>> = vec![vec![None; height as usize + 1]; width as usize];
    let mut startpoint = None;
    let mut endpoint = None;
    let mut respawn = None;
    let mut first_checkpoint = None;
    let mut checkpoint_positions = HashSet::new();
    let mut enemies = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let world_y = (height - y) as i32;
            let wx = x as i32;
            let world_pos = Vec2::new(wx as f32, world_y as f32);
            let mut place_tile = |kind| {
                tiles[x as usize][world_y as usize] = Some(Tile {
                    kind,
                    x: wx,
                    y: world_y,
                });
            };
            match pixel_rgb(image, x, y) {
                COLOR_AIR => {}
                COLOR_GROUND => place_tile(TileKind::Ground),
                COLOR_WALL => place_tile(TileKind::Wall),
                COLOR_WATER => place_tile(TileKind::Water),
                COLOR_HAZARD => place_tile(TileKind::Hazard),
                COLOR_SPAWN => {
                    if startpoint.is_some() {
                        return Err(format!(
                            "Level {number} has more than one spawn marker (second at {x},{y})"
                        ));
                    }
                    startpoint = Some(world_pos);
                }
                COLOR_GOAL => {
                    if endpoint.is_some() {
                        log::warn!(
                            "Level {number} has more than one goal marker, keeping the first"
                        );
                    } else {
                        endpoint = Some(world_pos);
                    }
                }
                COLOR_CHECKPOINT => {
                    checkpoint_positions.insert((wx, world_y));
                    if first_checkpoint.is_none() {
                        first_checkpoint = Some(world_pos);
                    }
                }
                COLOR_CHECKPOINT_RESPAWN => {
                    checkpoint_positions.insert((wx, world_y));
                    if respawn.is_some() {
                        log::warn!(
                            "Level {number} has more than one respawn marker, keeping the first"
                        );
                    } else {
                        respawn = Some(world_pos);
                    }
                }
                COLOR_ENEMY_LEFT => enemies.push(EnemyPlaceholder {
                    position: world_pos,
                    direction: -1.0,
                }),
                COLOR_ENEMY_RIGHT => enemies.push(EnemyPlaceholder {
                    position: world_pos,
                    direction: 1.0,
                }),
                unknown => {
                    log::warn!(
                        "Unknown color {unknown:#08x} in level {number} map at ({x},{y}), treating as air"
                    );
                }
            }
        }
    }

    let startpoint =
        startpoint.ok_or_else(|| format!("Level {number} map has no spawn marker"))?;
    let endpoint = endpoint.ok_or_else(|| format!("Level {number} map has no goal marker"))?;
    let checkpoint = respawn.or(first_checkpoint).unwrap_or(startpoint);

    Ok(LevelData {
        number,
        size: (width, height),
        tiles,
        startpoint,
        endpoint,
        checkpoint,
        checkpoint_positions,
        enemies,
        background_rect: None,
        background_path: None,
        song_path: None,
    })
}

/// Load a level, going through the on-disk cache. The cache is keyed by
/// level number and only ever invalidated by deleting the file.
///
/// Panics when an existing cache file fails to deserialize: proceeding with
/// garbage tile data is worse than stopping, and the fix (delete the cache)
/// is in the message.
pub fn load_level(number: usize, levels_dir: &Path, cache_dir: &Path) -> Result<LevelData, String> {
    let cache_path = cache_dir.join(format!("level{number}.json"));
    if cache_path.exists() {
        let raw = fs::read_to_string(&cache_path)
            .map_err(|e| format!("Failed to read level cache {}: {e}", cache_path.display()))?;
        let data: LevelData = serde_json::from_str(&raw).unwrap_or_else(|err| {
            panic!(
                "Level cache {} is corrupt or incompatible ({err}). Delete it to force a re-decode.",
                cache_path.display()
            )
        });
        return Ok(data);
    }

    let root = levels_dir.join(format!("level{number}"));
    let map_path = root.join("map.png");
    let image = image::open(&map_path)
        .map_err(|e| format!("Failed to open level map {}: {e}", map_path.display()))?
        .to_rgba8();
    let mut data = decode_map(&image, number)?;

    let meta_path = root.join("level.json");
    let meta = if meta_path.exists() {
        let raw = fs::read_to_string(&meta_path)
            .map_err(|e| format!("Failed to read {}: {e}", meta_path.display()))?;
        serde_json::from_str::<LevelMeta>(&raw)
            .map_err(|e| format!("Failed to parse {}: {e}", meta_path.display()))?
    } else {
        LevelMeta::default()
    };
    data.background_rect = meta.background;

    let background_path = root.join("background.png");
    if background_path.exists() {
        data.background_path = Some(background_path.to_string_lossy().into_owned());
    }
    let song = root.join(meta.music.as_deref().unwrap_or("music.wav"));
    if song.exists() {
        data.song_path = Some(song.to_string_lossy().into_owned());
    }

    if let Err(err) = fs::create_dir_all(cache_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| serde_json::to_string(&data).map_err(|e| e.to_string()))
        .and_then(|raw| fs::write(&cache_path, raw).map_err(|e| e.to_string()))
    {
        // A failed cache write costs a re-decode next run, nothing more.
        log::warn!("Failed to write level cache {}: {err}", cache_path.display());
    } else {
        log::info!("Level {number} decoded and cached to {}", cache_path.display());
    }

    Ok(data)
}
