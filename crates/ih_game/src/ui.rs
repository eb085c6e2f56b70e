//! Screen-space UI buttons.
//!
//! A button is a fixed pixel rect with a three-slice background (left cap,
//! tiled middle, right cap) and an icon on top. Hovering swaps the
//! background to an accent-inverted variant; the action fires on left
//! mouse button release inside the rect.

use crate::projection::ScreenRect;
use ih_core::input::{InputState, MouseBtn};
use image::RgbaImage;

/// Width of one background slice column in logical pixels.
pub const SLICE_WIDTH: i32 = 11;

/// The two accent colors that trade places in the hover variant.
const ACCENT_LIGHT: [u8; 4] = [0x00, 0x94, 0xff, 0xff];
const ACCENT_DARK: [u8; 4] = [0x00, 0x26, 0xff, 0xff];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Quit,
    ExitLevel,
}

pub struct Button {
    pub rect: ScreenRect,
    pub action: ButtonAction,
    pub hovered: bool,
}

impl Button {
    pub fn new(rect: ScreenRect, action: ButtonAction) -> Self {
        Self {
            rect,
            action,
            hovered: false,
        }
    }

    /// Refresh hover state and report whether the button fired this frame.
    pub fn update(&mut self, input: &InputState) -> bool {
        let (mx, my) = input.mouse_position;
        self.hovered = self.rect.contains(mx, my);
        self.hovered && input.is_mouse_just_released(MouseBtn::Left)
    }

    /// Pixel rects of the background slices: left cap, middle fills, right
    /// cap. Middles tile every column so the right cap may overlap the
    /// last middle rather than leave a gap.
    pub fn slice_rects(&self) -> Vec<ScreenRect> {
        let mut rects = vec![ScreenRect {
            x: self.rect.x,
            y: self.rect.y,
            w: SLICE_WIDTH,
            h: self.rect.h,
        }];
        let middle_columns = (self.rect.w / SLICE_WIDTH - 1).max(0);
        for i in 0..middle_columns {
            rects.push(ScreenRect {
                x: self.rect.x + SLICE_WIDTH * (i + 1),
                y: self.rect.y,
                w: SLICE_WIDTH,
                h: self.rect.h,
            });
        }
        rects.push(ScreenRect {
            x: self.rect.x + self.rect.w - SLICE_WIDTH,
            y: self.rect.y,
            w: SLICE_WIDTH,
            h: self.rect.h,
        });
        rects
    }
}

/// Build the hover variant of a background slice by swapping the two
/// accent colors in place.
pub fn invert_accents(slice: &RgbaImage) -> RgbaImage {
    let mut inverted = slice.clone();
    for pixel in inverted.pixels_mut() {
        if pixel.0 == ACCENT_LIGHT {
            pixel.0 = ACCENT_DARK;
        } else if pixel.0 == ACCENT_DARK {
            pixel.0 = ACCENT_LIGHT;
        }
    }
    inverted
}

#[cfg(test)]
mod tests {
    use super::*;
    use ih_core::input::InputState;

    fn button() -> Button {
        Button::new(
            ScreenRect { x: 100, y: 10, w: 55, h: 50 },
            ButtonAction::Quit,
        )
    }

    #[test]
    fn hover_tracks_mouse_position() {
        let mut button = button();
        let mut input = InputState::new();

        input.mouse_position = (120.0, 30.0);
        button.update(&input);
        assert!(button.hovered);

        input.mouse_position = (90.0, 30.0);
        button.update(&input);
        assert!(!button.hovered);
    }

    #[test]
    fn click_fires_only_inside_the_rect() {
        let mut button = button();
        let mut input = InputState::new();

        // Release outside: nothing.
        input.mouse_position = (0.0, 0.0);
        input.mouse_down(MouseBtn::Left);
        input.mouse_up(MouseBtn::Left);
        assert!(!button.update(&input));
        input.end_frame();

        // Release inside: fires once, then the edge is consumed.
        input.mouse_position = (120.0, 30.0);
        input.mouse_down(MouseBtn::Left);
        input.mouse_up(MouseBtn::Left);
        assert!(button.update(&input));
        input.end_frame();
        assert!(!button.update(&input));
    }

    #[test]
    fn slices_cover_the_button_width() {
        let button = button();
        let rects = button.slice_rects();
        // 55 px wide with 11 px slices: left cap + 4 middles + right cap.
        assert_eq!(rects.len(), 6);
        assert_eq!(rects[0].x, 100);
        assert_eq!(rects.last().expect("right cap").x, 100 + 55 - SLICE_WIDTH);
        // No gaps: every pixel column of the button is inside some slice.
        for px in 0..55 {
            let x = 100.0 + px as f64;
            assert!(
                rects.iter().any(|r| r.contains(x, 30.0)),
                "column {px} uncovered"
            );
        }
        for rect in &rects {
            assert_eq!(rect.h, 50);
        }
    }

    #[test]
    fn accent_swap_is_an_involution() {
        let mut slice = RgbaImage::new(4, 4);
        slice.put_pixel(0, 0, image::Rgba(ACCENT_LIGHT));
        slice.put_pixel(1, 0, image::Rgba(ACCENT_DARK));
        slice.put_pixel(2, 0, image::Rgba([1, 2, 3, 255]));

        let once = invert_accents(&slice);
        assert_eq!(once.get_pixel(0, 0).0, ACCENT_DARK);
        assert_eq!(once.get_pixel(1, 0).0, ACCENT_LIGHT);
        assert_eq!(once.get_pixel(2, 0).0, [1, 2, 3, 255], "other colors untouched");

        let twice = invert_accents(&once);
        assert_eq!(twice, slice);
    }
}
