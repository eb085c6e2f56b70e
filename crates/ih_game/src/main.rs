//! islehop -- main loop and application entry point.
//!
//! winit drives the event loop via `ApplicationHandler`. Each redraw:
//!
//!   1. `begin_frame()` feeds the fixed-step accumulator
//!   2. `while should_step()` runs in-level physics ticks (gravity,
//!      enemies, checkpoints, deaths, goal detection)
//!   3. per-frame work: input-driven movement, hub marker intersection,
//!      UI buttons, one camera update
//!   4. the sprite mesh is rebuilt in screen space through the projection
//!      layer and streamed into GPU buffers, then drawn with the egui
//!      overlay composited on top
//!
//! The camera is written exactly once per frame (step 3) before any
//! projection runs, so every sprite in a frame sees the same camera.

mod assets;
mod audio;
mod camera;
mod enemy;
mod hub;
mod level;
mod physics;
mod player;
mod projection;
mod session;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use glam::Vec2;
use wgpu::util::DeviceExt;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use assets::AssetRegistry;
use audio::MusicPlayer;
use camera::{CameraBounds, CameraController};
use hub::LevelMarker;
use ih_core::input::{InputState, Key, MouseBtn};
use ih_core::save::SaveState;
use ih_core::time::TimeState;
use ih_devtools::{DebugOverlay, OverlayStats};
use ih_platform::window::PlatformConfig;
use ih_render::{GpuContext, ScreenUniform, SpritePipeline, SpriteVertex};
use level::{LevelData, WorldRect};
use physics::PhysicsConfig;
use player::Player;
use projection::{ProjectionCache, ScreenRect, Viewport, GROWNESS, LOGICAL_HEIGHT, LOGICAL_WIDTH};
use session::{Mode, Session, TickOutcome};
use ui::{Button, ButtonAction};

const ASSETS_DIR: &str = "assets";
const LEVELS_DIR: &str = "levels";
const CACHE_DIR: &str = "cache";
const SAVE_PATH: &str = "save.json";

/// A contiguous run of indices sharing one texture binding. Consecutive
/// quads with the same texture merge into a single draw.
#[derive(Debug, Clone)]
struct DrawCall {
    texture_key: Arc<str>,
    index_start: u32,
    index_count: u32,
}

const UV_FULL: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
const TINT_NONE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const TINT_LOCKED: [f32; 4] = [0.45, 0.45, 0.45, 1.0];
const TINT_COMPLETED: [f32; 4] = [0.7, 1.0, 0.7, 1.0];
const TINT_UNAVAILABLE: [f32; 4] = [0.9, 0.3, 0.3, 0.6];

struct GameState {
    window: Arc<Window>,
    gpu: GpuContext,
    time: TimeState,
    input: InputState,
    viewport: Viewport,
    camera: CameraController,
    sprite_pipeline: SpritePipeline,
    overlay: DebugOverlay,
    assets: AssetRegistry,

    session: Session,
    player: Player,
    markers: Vec<LevelMarker>,
    physics: PhysicsConfig,
    music: MusicPlayer,
    hub_song: Option<PathBuf>,
    exit_button: Button,

    // Static-geometry projection memos for the active level, parallel to
    // the tile grid / checkpoint list / goal.
    tile_caches: Vec<ProjectionCache>,
    checkpoint_cells: Vec<(i32, i32)>,
    checkpoint_caches: Vec<ProjectionCache>,
    goal_cache: ProjectionCache,

    // Per-frame GPU mesh state: rebuilt on the CPU every frame, streamed
    // into buffers that grow power-of-two and never shrink.
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
    mesh_vertex_capacity: usize,
    mesh_index_capacity: usize,
    draw_calls: Vec<DrawCall>,
    sprite_count: usize,
}

impl GameState {
    fn new(window: Arc<Window>) -> Self {
        let gpu = GpuContext::new(window.clone());
        let sprite_pipeline = SpritePipeline::new(&gpu.device, gpu.surface_format);
        let overlay = DebugOverlay::new(&gpu.device, gpu.surface_format, &window);
        let viewport = Viewport::new(gpu.size.0, gpu.size.1);

        let assets_dir = PathBuf::from(ASSETS_DIR);
        let cache_dir = PathBuf::from(CACHE_DIR);
        let mut registry = AssetRegistry::new();
        assets::load_game_assets(&mut registry, &assets_dir, &gpu.device, &gpu.queue, &sprite_pipeline);

        match hub::load_overworld(&assets_dir, &cache_dir) {
            Ok(island) => {
                registry.insert_image("bg:hub", &gpu.device, &gpu.queue, &sprite_pipeline, &island)
            }
            Err(err) => log::warn!("Overworld background unavailable: {err}"),
        }

        let markers = hub::load_markers(&PathBuf::from(LEVELS_DIR), &cache_dir);
        let loaded = markers.iter().filter(|m| m.data.is_some()).count();
        log::info!("{loaded}/{} levels loaded", markers.len());

        let session = Session::new(SaveState::load(PathBuf::from(SAVE_PATH)));
        let mut player = Player::default();
        player.spawn_at(session::HUB_ORIGIN);

        let hub_song = Some(assets_dir.join("hub.wav")).filter(|p| p.exists());
        let mut music = MusicPlayer::new();
        music.switch_to(hub_song.clone());

        let screen_uniform = ScreenUniform::new(gpu.size.0, gpu.size.1);
        let screen_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("screen uniform buffer"),
                contents: bytemuck::cast_slice(&[screen_uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let screen_bind_group = sprite_pipeline.create_screen_bind_group(&gpu.device, &screen_buffer);
        let vertex_buffer = create_vertex_buffer(&gpu.device, 1);
        let index_buffer = create_index_buffer(&gpu.device, 1);

        let exit_button = Button::new(button_rect(gpu.size.0), ButtonAction::Quit);

        Self {
            window,
            gpu,
            time: TimeState::new(),
            input: InputState::new(),
            viewport,
            camera: CameraController::default(),
            sprite_pipeline,
            overlay,
            assets: registry,
            session,
            player,
            markers,
            physics: PhysicsConfig::default(),
            music,
            hub_song,
            exit_button,
            tile_caches: Vec::new(),
            checkpoint_cells: Vec::new(),
            checkpoint_caches: Vec::new(),
            goal_cache: ProjectionCache::default(),
            vertex_buffer,
            index_buffer,
            screen_buffer,
            screen_bind_group,
            mesh_vertex_capacity: 0,
            mesh_index_capacity: 0,
            draw_calls: Vec::new(),
            sprite_count: 0,
        }
    }

    fn active_level(&self) -> Option<&LevelData> {
        match self.session.mode {
            Mode::InLevel(number) => self.markers.get(number).and_then(|m| m.data.as_ref()),
            Mode::Hub => None,
        }
    }

    /// Per-level state built at entry: projection memos for the static
    /// geometry, the background texture, the music switch.
    fn on_enter_level(&mut self, number: usize) {
        let Some(level) = self.markers[number].data.as_ref() else {
            return;
        };
        let columns = level.width() as usize;
        let rows = level.height() as usize + 1;
        self.tile_caches = vec![ProjectionCache::default(); columns * rows];

        let mut cells: Vec<(i32, i32)> = level.checkpoint_positions.iter().copied().collect();
        cells.sort_unstable();
        self.checkpoint_caches = vec![ProjectionCache::default(); cells.len()];
        self.checkpoint_cells = cells;
        self.goal_cache = ProjectionCache::default();

        let background_key = format!("bg:level{number}");
        if let Some(path) = level.background_path.clone() {
            if !self.assets.contains(&background_key) {
                self.assets.load_file(
                    &background_key,
                    std::path::Path::new(&path),
                    [20, 24, 40, 255],
                    &self.gpu.device,
                    &self.gpu.queue,
                    &self.sprite_pipeline,
                );
            }
        }
        let song = level.song_path.clone().map(PathBuf::from);
        self.music.switch_to(song);
        self.exit_button.action = ButtonAction::ExitLevel;
    }

    fn on_return_to_hub(&mut self) {
        self.tile_caches.clear();
        self.checkpoint_cells.clear();
        self.checkpoint_caches.clear();
        self.music.switch_to(self.hub_song.clone());
        self.exit_button.action = ButtonAction::Quit;
    }

    /// Hub-mode entry check: does the player's screen rect touch an
    /// unlocked marker's rect under the current camera?
    fn check_marker_entry(&mut self) {
        let camera = self.camera.position;
        let Some(player_rect) = self.viewport.project_cached(
            &mut self.player.cache,
            self.player.body.position,
            self.player.body.rotation,
            1.0,
            camera,
        ) else {
            return;
        };

        let mut entered = None;
        for marker in &mut self.markers {
            let Some(level) = marker.data.as_ref() else {
                continue;
            };
            if !self.session.save.is_unlocked(marker.number) {
                continue;
            }
            let Some(marker_rect) = self.viewport.project_cached(
                &mut marker.cache,
                marker.position,
                0.0,
                1.0,
                camera,
            ) else {
                continue;
            };
            if marker_rect.intersects(&player_rect)
                && self.session.enter_level(level, &mut self.player)
            {
                entered = Some(marker.number);
                break;
            }
        }
        if let Some(number) = entered {
            self.on_enter_level(number);
        }
    }

    fn run_fixed_steps(&mut self) {
        while self.time.should_step() {
            let Mode::InLevel(number) = self.session.mode else {
                continue;
            };
            let Some(level) = self.markers[number].data.as_ref() else {
                continue;
            };
            match self
                .session
                .fixed_tick(level, &mut self.player, &self.physics)
            {
                TickOutcome::Completed => {
                    self.session.exit_level(&mut self.player, true);
                    self.on_return_to_hub();
                }
                TickOutcome::Died | TickOutcome::None => {}
            }
        }
    }

    fn apply_frame_movement(&mut self) {
        let movement = self.input.movement_axis();
        let dt = self.time.real_dt as f32;
        match self.session.mode {
            Mode::Hub => {
                let hub_move = self.player.move_in_hub(movement, dt, &self.physics);
                if hub_move.wrap_delta != Vec2::ZERO {
                    self.camera.shift(hub_move.wrap_delta);
                }
                self.check_marker_entry();
            }
            Mode::InLevel(_) => {
                self.player
                    .move_in_level(movement, self.input.jump_held(), dt, &self.physics);
            }
        }
    }

    fn handle_buttons(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_button.update(&self.input) {
            match self.exit_button.action {
                ButtonAction::Quit => {
                    log::info!("Exit button pressed, quitting");
                    event_loop.exit();
                }
                ButtonAction::ExitLevel => {
                    self.session.exit_level(&mut self.player, false);
                    self.on_return_to_hub();
                }
            }
        }
    }

    fn update_camera(&mut self) {
        let bounds = self
            .active_level()
            .map(|level| CameraBounds::for_level(level.size, self.viewport.center_offset));
        self.camera
            .update(self.player.body.position, self.time.real_dt as f32, bounds);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.viewport = Viewport::new(width, height);
        self.exit_button.rect = button_rect(width);
        // Window-size changes invalidate every projection memo key-wise
        // only through the camera; reset them wholesale instead.
        self.player.cache = ProjectionCache::default();
        self.goal_cache = ProjectionCache::default();
        for marker in &mut self.markers {
            marker.cache = ProjectionCache::default();
        }
        for cache in self
            .tile_caches
            .iter_mut()
            .chain(self.checkpoint_caches.iter_mut())
        {
            *cache = ProjectionCache::default();
        }
        log::info!("Resized to {width}x{height}");
    }

    fn projection_recomputes(&self) -> u64 {
        let mut total = self.player.cache.recomputes + self.goal_cache.recomputes;
        total += self.markers.iter().map(|m| m.cache.recomputes).sum::<u64>();
        total += self.tile_caches.iter().map(|c| c.recomputes).sum::<u64>();
        total += self
            .checkpoint_caches
            .iter()
            .map(|c| c.recomputes)
            .sum::<u64>();
        total += self
            .session
            .enemies
            .iter()
            .map(|e| e.cache.recomputes)
            .sum::<u64>();
        total
    }

    // --- Mesh building ---------------------------------------------------

    fn rebuild_mesh(&mut self) {
        let (vertices, indices, draw_calls) = self.build_mesh();
        self.ensure_mesh_capacity(vertices.len(), indices.len());
        self.sprite_count = vertices.len() / 4;
        self.draw_calls = draw_calls;

        if !vertices.is_empty() {
            self.gpu
                .queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        }
        if !indices.is_empty() {
            self.gpu
                .queue
                .write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&indices));
        }
    }

    fn build_mesh(&mut self) -> (Vec<SpriteVertex>, Vec<u32>, Vec<DrawCall>) {
        let mut vertices = Vec::with_capacity(1024);
        let mut indices = Vec::with_capacity(1536);
        let mut draw_calls = Vec::with_capacity(16);
        let camera = self.camera.position;
        let viewport = &self.viewport;

        match self.session.mode {
            Mode::Hub => {
                // Island background: bitmap mapped over its world rect.
                let island_rect = WorldRect {
                    x: hub::MAP_POINT.x,
                    y: hub::MAP_POINT.y - (hub::MAP_SIZE.1 + hub::WATER_ROWS) as f32,
                    w: hub::MAP_SIZE.0 as f32,
                    h: (hub::MAP_SIZE.1 + hub::WATER_ROWS) as f32,
                };
                push_background(
                    viewport,
                    &self.assets,
                    "bg:hub",
                    island_rect,
                    camera,
                    &mut vertices,
                    &mut indices,
                    &mut draw_calls,
                );

                for marker in &mut self.markers {
                    let tint = if marker.data.is_none() {
                        TINT_UNAVAILABLE
                    } else if self.session.save.is_completed(marker.number) {
                        TINT_COMPLETED
                    } else if !self.session.save.is_unlocked(marker.number) {
                        TINT_LOCKED
                    } else {
                        TINT_NONE
                    };
                    if let Some(rect) = viewport.project_cached(
                        &mut marker.cache,
                        marker.position,
                        0.0,
                        1.0,
                        camera,
                    ) {
                        push_quad(&mut vertices, &mut indices, &mut draw_calls, "marker", rect, UV_FULL, tint);
                    }
                }
            }
            Mode::InLevel(number) => {
                let Some(level) = self.markers[number].data.as_ref() else {
                    return (vertices, indices, draw_calls);
                };

                if let Some(key_rect) = level.background_path.as_ref().map(|_| {
                    level.background_rect.unwrap_or(WorldRect {
                        x: 0.0,
                        y: 0.0,
                        w: level.width() as f32,
                        h: level.height() as f32,
                    })
                }) {
                    push_background(
                        viewport,
                        &self.assets,
                        &format!("bg:level{number}"),
                        key_rect,
                        camera,
                        &mut vertices,
                        &mut indices,
                        &mut draw_calls,
                    );
                }

                let rows = level.height() as usize + 1;
                for (column_index, column) in level.tiles.iter().enumerate() {
                    for (row_index, slot) in column.iter().enumerate() {
                        let Some(tile) = slot else { continue };
                        let cache = &mut self.tile_caches[column_index * rows + row_index];
                        if let Some(rect) = viewport.project_cached(
                            cache,
                            Vec2::new(tile.x as f32, tile.y as f32),
                            0.0,
                            1.0,
                            camera,
                        ) {
                            push_quad(
                                &mut vertices,
                                &mut indices,
                                &mut draw_calls,
                                tile.kind.texture_key(),
                                rect,
                                UV_FULL,
                                TINT_NONE,
                            );
                        }
                    }
                }

                for (cell, cache) in self
                    .checkpoint_cells
                    .iter()
                    .zip(self.checkpoint_caches.iter_mut())
                {
                    if let Some(rect) = viewport.project_cached(
                        cache,
                        Vec2::new(cell.0 as f32, cell.1 as f32),
                        0.0,
                        1.0,
                        camera,
                    ) {
                        push_quad(&mut vertices, &mut indices, &mut draw_calls, "checkpoint", rect, UV_FULL, TINT_NONE);
                    }
                }

                if let Some(rect) = viewport.project_cached(
                    &mut self.goal_cache,
                    level.endpoint,
                    0.0,
                    1.0,
                    camera,
                ) {
                    push_quad(&mut vertices, &mut indices, &mut draw_calls, "goal", rect, UV_FULL, TINT_NONE);
                }

                for enemy in &mut self.session.enemies {
                    if let Some(rect) = viewport.project_cached(
                        &mut enemy.cache,
                        enemy.body.position,
                        enemy.body.rotation,
                        1.0,
                        camera,
                    ) {
                        // Flip the sprite horizontally against the patrol
                        // direction.
                        let uv = if enemy.direction < 0.0 {
                            [1.0, 0.0, 0.0, 1.0]
                        } else {
                            UV_FULL
                        };
                        push_quad(&mut vertices, &mut indices, &mut draw_calls, "enemy", rect, uv, TINT_NONE);
                    }
                }
            }
        }

        // Player on top of the world, below the UI.
        if let Some(rect) = viewport.project_cached(
            &mut self.player.cache,
            self.player.body.position,
            self.player.body.rotation,
            1.0,
            camera,
        ) {
            let sheet = self
                .assets
                .get("player")
                .map(|sprite| sprite.texture.size)
                .unwrap_or((1, 1));
            let uv = self.player.animation_uv(self.time.total_millis(), sheet);
            push_quad(&mut vertices, &mut indices, &mut draw_calls, "player", rect, uv, TINT_NONE);
        }

        self.push_button_quads(&mut vertices, &mut indices, &mut draw_calls);

        (vertices, indices, draw_calls)
    }

    fn push_button_quads(
        &self,
        vertices: &mut Vec<SpriteVertex>,
        indices: &mut Vec<u32>,
        draw_calls: &mut Vec<DrawCall>,
    ) {
        let suffix = if self.exit_button.hovered { ":hover" } else { "" };
        let slices = self.exit_button.slice_rects();
        let last = slices.len() - 1;
        for (i, rect) in slices.into_iter().enumerate() {
            let part = match i {
                0 => "left",
                i if i == last => "right",
                _ => "middle",
            };
            push_quad(
                vertices,
                indices,
                draw_calls,
                &format!("ui:button-{part}{suffix}"),
                rect,
                UV_FULL,
                TINT_NONE,
            );
        }
        push_quad(
            vertices,
            indices,
            draw_calls,
            "ui:exit",
            self.exit_button.rect,
            UV_FULL,
            TINT_NONE,
        );
    }

    fn ensure_mesh_capacity(&mut self, vertex_count: usize, index_count: usize) {
        let needed_vertices = vertex_count.max(1);
        if needed_vertices > self.mesh_vertex_capacity {
            self.mesh_vertex_capacity = needed_vertices.next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.gpu.device, self.mesh_vertex_capacity);
        }

        let needed_indices = index_count.max(1);
        if needed_indices > self.mesh_index_capacity {
            self.mesh_index_capacity = needed_indices.next_power_of_two();
            self.index_buffer = create_index_buffer(&self.gpu.device, self.mesh_index_capacity);
        }
    }

    // --- Rendering -------------------------------------------------------

    fn render(&mut self) {
        let screen_uniform = ScreenUniform::new(self.gpu.size.0, self.gpu.size.1);
        self.gpu
            .queue
            .write_buffer(&self.screen_buffer, 0, bytemuck::cast_slice(&[screen_uniform]));

        let Some((output, view)) = self.gpu.begin_frame() else {
            return;
        };

        let mode_label = match self.session.mode {
            Mode::Hub => "Mode: Hub".to_string(),
            Mode::InLevel(number) => format!("Mode: Level {number}"),
        };
        let stats = OverlayStats {
            mode_label,
            death_count: self.session.save.death_count(),
            levels_mask: self.session.save.levels_mask(),
            checkpoints_mask: self.session.save.checkpoints_mask(),
            music_label: self.music.current_label(),
            draw_calls: self.draw_calls.len() as u32,
            sprite_count: self.sprite_count as u32,
            projection_recomputes: self.projection_recomputes(),
        };
        let (egui_primitives, egui_textures_delta, overlay_actions) =
            self.overlay.prepare(&self.window, &self.time, &stats);
        if overlay_actions.reset_save {
            self.session.save.reset();
            log::info!("Save state reset from the overlay");
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gpu.size.0, self.gpu.size.1],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        {
            let clear_color = wgpu::Color {
                r: 0.05,
                g: 0.07,
                b: 0.12,
                a: 1.0,
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            render_pass.set_pipeline(&self.sprite_pipeline.render_pipeline);
            render_pass.set_bind_group(0, &self.screen_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            let mut bound: Option<&Arc<str>> = None;
            for draw in &self.draw_calls {
                if let Some(sprite) = self.assets.get(&draw.texture_key) {
                    let rebind = match bound {
                        Some(key) => **key != *draw.texture_key,
                        None => true,
                    };
                    if rebind {
                        render_pass.set_bind_group(1, &sprite.bind_group, &[]);
                        bound = Some(&draw.texture_key);
                    }
                    render_pass.draw_indexed(
                        draw.index_start..(draw.index_start + draw.index_count),
                        0,
                        0..1,
                    );
                }
            }
        }

        self.overlay.upload(
            &self.gpu.device,
            &self.gpu.queue,
            &mut encoder,
            &egui_primitives,
            &egui_textures_delta,
            &screen_descriptor,
        );

        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui render pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();

            self.overlay
                .paint(&mut egui_pass, &egui_primitives, &screen_descriptor);
        }

        self.overlay.cleanup(&egui_textures_delta);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}

fn button_rect(screen_width: u32) -> ScreenRect {
    ScreenRect {
        x: screen_width as i32 - 60,
        y: 10,
        w: 50,
        h: 50,
    }
}

fn create_vertex_buffer(device: &wgpu::Device, vertex_capacity: usize) -> wgpu::Buffer {
    let byte_len = (vertex_capacity * std::mem::size_of::<SpriteVertex>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("scene vertex buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, index_capacity: usize) -> wgpu::Buffer {
    let byte_len = (index_capacity * std::mem::size_of::<u32>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("scene index buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn push_quad(
    vertices: &mut Vec<SpriteVertex>,
    indices: &mut Vec<u32>,
    draw_calls: &mut Vec<DrawCall>,
    texture_key: &str,
    rect: ScreenRect,
    uv: [f32; 4],
    color: [f32; 4],
) {
    let (x0, y0) = (rect.x as f32, rect.y as f32);
    let (x1, y1) = ((rect.x + rect.w) as f32, (rect.y + rect.h) as f32);
    let [u0, v0, u1, v1] = uv;
    let base_index = vertices.len() as u32;

    vertices.push(SpriteVertex {
        position: [x0, y0],
        tex_coords: [u0, v0],
        color,
    });
    vertices.push(SpriteVertex {
        position: [x1, y0],
        tex_coords: [u1, v0],
        color,
    });
    vertices.push(SpriteVertex {
        position: [x1, y1],
        tex_coords: [u1, v1],
        color,
    });
    vertices.push(SpriteVertex {
        position: [x0, y1],
        tex_coords: [u0, v1],
        color,
    });

    let draw_start = indices.len() as u32;
    indices.extend_from_slice(&[
        base_index,
        base_index + 1,
        base_index + 2,
        base_index,
        base_index + 2,
        base_index + 3,
    ]);

    push_draw_call(draw_calls, Arc::from(texture_key), draw_start, 6);
}

/// Append a draw call, merging with the previous one when the texture
/// matches and the indices are contiguous.
fn push_draw_call(
    draw_calls: &mut Vec<DrawCall>,
    texture_key: Arc<str>,
    index_start: u32,
    index_count: u32,
) {
    if let Some(last) = draw_calls.last_mut() {
        let contiguous = last.index_start + last.index_count == index_start;
        if *last.texture_key == *texture_key && contiguous {
            last.index_count += index_count;
            return;
        }
    }
    draw_calls.push(DrawCall {
        texture_key,
        index_start,
        index_count,
    });
}

/// Draw the slice of a background bitmap that falls inside the camera's
/// view window. The bitmap spans `world_rect` (top edge at y + h). When
/// the view has drifted entirely off the bitmap the layer is skipped for
/// the frame.
#[allow(clippy::too_many_arguments)]
fn push_background(
    viewport: &Viewport,
    assets: &AssetRegistry,
    texture_key: &str,
    world_rect: WorldRect,
    camera: Vec2,
    vertices: &mut Vec<SpriteVertex>,
    indices: &mut Vec<u32>,
    draw_calls: &mut Vec<DrawCall>,
) {
    let Some(sprite) = assets.get(texture_key) else {
        return;
    };
    let (bitmap_w, bitmap_h) = sprite.texture.size;

    // Visible world window in tiles.
    let view_w = LOGICAL_WIDTH / GROWNESS;
    let view_h = LOGICAL_HEIGHT / GROWNESS;
    let window_left = camera.x - viewport.center_offset.x;
    let window_top = camera.y - viewport.center_offset.y + view_h;

    // Window mapped into bitmap pixels (bitmap Y runs down from the top
    // edge of the world rect).
    let px_per_tile_x = bitmap_w as f32 / world_rect.w;
    let px_per_tile_y = bitmap_h as f32 / world_rect.h;
    let bm_x0 = (window_left - world_rect.x) * px_per_tile_x;
    let bm_y0 = (world_rect.y + world_rect.h - window_top) * px_per_tile_y;
    let bm_x1 = bm_x0 + view_w * px_per_tile_x;
    let bm_y1 = bm_y0 + view_h * px_per_tile_y;

    // Crop to the bitmap bounds.
    let cx0 = bm_x0.max(0.0);
    let cy0 = bm_y0.max(0.0);
    let cx1 = bm_x1.min(bitmap_w as f32);
    let cy1 = bm_y1.min(bitmap_h as f32);
    if cx0 >= cx1 || cy0 >= cy1 {
        log::debug!("Background '{texture_key}' entirely outside the view, skipped");
        return;
    }

    // Cropped bitmap rect back to screen pixels.
    let to_screen_x = viewport.scale / px_per_tile_x;
    let to_screen_y = viewport.scale / px_per_tile_y;
    let rect = ScreenRect {
        x: ((cx0 - bm_x0) * to_screen_x) as i32,
        y: ((cy0 - bm_y0) * to_screen_y) as i32,
        w: ((cx1 - cx0) * to_screen_x) as i32,
        h: ((cy1 - cy0) * to_screen_y) as i32,
    };
    let uv = [
        cx0 / bitmap_w as f32,
        cy0 / bitmap_h as f32,
        cx1 / bitmap_w as f32,
        cy1 / bitmap_h as f32,
    ];
    push_quad(vertices, indices, draw_calls, texture_key, rect, uv, TINT_NONE);
}

struct App {
    config: PlatformConfig,
    state: Option<GameState>,
}

impl App {
    fn new() -> Self {
        Self {
            config: PlatformConfig::default(),
            state: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window = ih_platform::window::create_window(event_loop, &self.config);
        self.state = Some(GameState::new(window));
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        let egui_consumed = state.overlay.handle_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                state.session.save.flush();
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                let w = physical_size.width;
                let h = physical_size.height;
                if w > 0 && h > 0 {
                    state.resize(w, h);
                }
            }

            WindowEvent::KeyboardInput { event, .. } if !egui_consumed => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    if let Some(engine_key) = map_key(key_code) {
                        match event.state {
                            ElementState::Pressed => state.input.key_down(engine_key),
                            ElementState::Released => state.input.key_up(engine_key),
                        }
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                state.input.mouse_position = (position.x, position.y);
            }

            WindowEvent::MouseInput { state: element_state, button, .. } if !egui_consumed => {
                if let Some(engine_btn) = map_mouse_button(button) {
                    match element_state {
                        ElementState::Pressed => state.input.mouse_down(engine_btn),
                        ElementState::Released => state.input.mouse_up(engine_btn),
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if state.gpu.size.0 == 0 || state.gpu.size.1 == 0 {
                    return;
                }

                state.time.begin_frame();

                if state.input.is_just_pressed(Key::Escape) {
                    state.session.save.flush();
                    event_loop.exit();
                    return;
                }
                if state.input.is_just_pressed(Key::F3) {
                    state.overlay.toggle();
                }

                state.run_fixed_steps();
                state.apply_frame_movement();
                state.handle_buttons(event_loop);
                state.update_camera();

                state.rebuild_mesh();
                state.render();

                state.input.end_frame();
            }

            _ => {}
        }
    }
}

fn map_key(key_code: KeyCode) -> Option<Key> {
    match key_code {
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyA => Some(Key::A),
        KeyCode::KeyS => Some(Key::S),
        KeyCode::KeyD => Some(Key::D),
        KeyCode::Space => Some(Key::Space),
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::F3 => Some(Key::F3),
        _ => None,
    }
}

fn map_mouse_button(button: MouseButton) -> Option<MouseBtn> {
    match button {
        MouseButton::Left => Some(MouseBtn::Left),
        MouseButton::Right => Some(MouseBtn::Right),
        _ => None,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("islehop starting...");

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app).expect("Event loop error");
}
