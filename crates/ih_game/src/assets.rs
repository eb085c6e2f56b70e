//! GPU sprite registry.
//!
//! Every texture the game draws is loaded exactly once at startup (or at
//! level-set load) and registered under a string tag; tiles resolve
//! through their kind's tag, so no instance ever swaps or mutates its own
//! image. A missing file logs a warning and registers a solid-color
//! stand-in of the same tag, keeping the game runnable from a bare
//! checkout.

use crate::ui;
use ih_render::{SpritePipeline, Texture};
use image::RgbaImage;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub struct GpuSprite {
    pub texture: Texture,
    pub bind_group: wgpu::BindGroup,
}

#[derive(Default)]
pub struct AssetRegistry {
    sprites: HashMap<Arc<str>, GpuSprite>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&GpuSprite> {
        self.sprites.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sprites.contains_key(key)
    }

    pub fn insert_image(
        &mut self,
        key: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &SpritePipeline,
        image: &RgbaImage,
    ) {
        let texture = Texture::from_image(device, queue, image, key);
        let bind_group = pipeline.create_texture_bind_group(device, &texture);
        self.sprites.insert(
            Arc::from(key),
            GpuSprite {
                texture,
                bind_group,
            },
        );
    }

    pub fn insert_solid(
        &mut self,
        key: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &SpritePipeline,
        rgba: [u8; 4],
    ) {
        let texture = Texture::from_rgba8(device, queue, &rgba, 1, 1, key);
        let bind_group = pipeline.create_texture_bind_group(device, &texture);
        self.sprites.insert(
            Arc::from(key),
            GpuSprite {
                texture,
                bind_group,
            },
        );
    }

    /// Load a file under a tag, standing in a solid color when it cannot be
    /// read or decoded.
    pub fn load_file(
        &mut self,
        key: &str,
        path: &Path,
        fallback: [u8; 4],
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &SpritePipeline,
    ) {
        match std::fs::read(path) {
            Ok(bytes) => match Texture::from_bytes(device, queue, &bytes, key) {
                Ok(texture) => {
                    let bind_group = pipeline.create_texture_bind_group(device, &texture);
                    self.sprites.insert(
                        Arc::from(key),
                        GpuSprite {
                            texture,
                            bind_group,
                        },
                    );
                    return;
                }
                Err(err) => log::warn!("{err}, using solid stand-in for '{key}'"),
            },
            Err(err) => log::warn!(
                "Failed to read texture {} for '{key}': {err}, using solid stand-in",
                path.display()
            ),
        }
        self.insert_solid(key, device, queue, pipeline, fallback);
    }
}

/// Load the fixed game art set from the assets directory.
pub fn load_game_assets(
    registry: &mut AssetRegistry,
    assets_dir: &Path,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &SpritePipeline,
) {
    let files: &[(&str, &str, [u8; 4])] = &[
        ("player", "player.png", [240, 80, 80, 255]),
        ("marker", "tree.png", [40, 160, 60, 255]),
        ("ui:exit", "exit.png", [220, 220, 220, 255]),
        ("tile:ground", "grass.png", [0, 128, 0, 255]),
        ("tile:wall", "wall.png", [0, 96, 128, 255]),
        ("tile:water", "water.png", [0, 0, 255, 180]),
        ("tile:hazard", "hazard.png", [255, 0, 0, 255]),
        ("goal", "flag.png", [255, 0, 255, 255]),
        ("checkpoint", "checkpoint.png", [255, 255, 0, 255]),
        ("enemy", "enemy.png", [128, 0, 128, 255]),
    ];
    for (key, file, fallback) in files {
        registry.load_file(key, &assets_dir.join(file), *fallback, device, queue, pipeline);
    }

    // Button background slices, plus hover variants with swapped accents.
    for (key, file) in [
        ("ui:button-left", "button-bg-left.png"),
        ("ui:button-middle", "button-bg-middle.png"),
        ("ui:button-right", "button-bg-right.png"),
    ] {
        let path = assets_dir.join(file);
        match image::open(&path) {
            Ok(decoded) => {
                let slice = decoded.to_rgba8();
                registry.insert_image(key, device, queue, pipeline, &slice);
                registry.insert_image(
                    &format!("{key}:hover"),
                    device,
                    queue,
                    pipeline,
                    &ui::invert_accents(&slice),
                );
            }
            Err(err) => {
                log::warn!(
                    "Failed to open button slice {}: {err}, using solid stand-ins",
                    path.display()
                );
                registry.insert_solid(key, device, queue, pipeline, [0, 38, 255, 255]);
                registry.insert_solid(
                    &format!("{key}:hover"),
                    device,
                    queue,
                    pipeline,
                    [0, 148, 255, 255],
                );
            }
        }
    }

    // Untextured quads (solid tints) render through a white pixel.
    registry.insert_solid("white", device, queue, pipeline, [255, 255, 255, 255]);
}
