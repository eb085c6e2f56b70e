//! Window creation. The game renders at a logical 4:3 resolution, so the
//! window is sized to the largest 4:3 rectangle that fits the monitor
//! (or borderless-fullscreened onto it, letting the projection math pick
//! up whatever pixel width results).

use std::sync::Arc;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Fullscreen, Window, WindowAttributes};

pub struct PlatformConfig {
    pub title: String,
    pub fullscreen: bool,
    /// Windowed-mode fallback size when the monitor cannot be queried.
    pub width: u32,
    pub height: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "islehop".to_string(),
            fullscreen: false,
            width: 1280,
            height: 960,
        }
    }
}

/// Largest width/height pair of the given aspect ratio that fits in w x h.
pub fn size_from_ratio(w: u32, h: u32, ratio: f64) -> (u32, u32) {
    if w as f64 / h as f64 >= ratio {
        ((h as f64 * ratio) as u32, h)
    } else {
        (w, (w as f64 / ratio) as u32)
    }
}

pub fn create_window(event_loop: &ActiveEventLoop, config: &PlatformConfig) -> Arc<Window> {
    let (width, height) = event_loop
        .primary_monitor()
        .map(|monitor| {
            let size = monitor.size();
            size_from_ratio(size.width, size.height, 4.0 / 3.0)
        })
        .unwrap_or((config.width, config.height));

    let mut attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::PhysicalSize::new(width, height));
    if config.fullscreen {
        attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }

    let window = event_loop
        .create_window(attrs)
        .expect("Failed to create window");
    log::info!("Window created at {width}x{height}");
    Arc::new(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_monitor_pillarboxes_to_four_by_three() {
        assert_eq!(size_from_ratio(1920, 1080, 4.0 / 3.0), (1440, 1080));
    }

    #[test]
    fn tall_monitor_letterboxes_to_four_by_three() {
        assert_eq!(size_from_ratio(1080, 1920, 4.0 / 3.0), (1080, 810));
    }

    #[test]
    fn exact_ratio_is_preserved() {
        assert_eq!(size_from_ratio(640, 480, 4.0 / 3.0), (640, 480));
    }
}
