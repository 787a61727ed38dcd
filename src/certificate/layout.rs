//! Pure coordinate math for field placement.
//!
//! Template fields store fractions of the canvas; everything pixel-valued is
//! derived here so the alignment rules can be tested without rasterizing.

use crate::template::models::{Align, TemplateField};

/// Fixed logical canvas for the excellence (ID-card) kind.
pub const ID_CARD_CANVAS: (u32, u32) = (1350, 850);

/// Photo placement box, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fixed absolute photo rectangle on the ID-card canvas, near the left edge.
pub const ID_CARD_PHOTO_RECT: PhotoRect = PhotoRect {
    x: 110,
    y: 230,
    width: 400,
    height: 400,
};

/// Proportional photo placement for all non-ID-card kinds: a square of 12% of
/// canvas height, anchored at 85% width / 5% height.
pub fn proportional_photo_rect(canvas_w: u32, canvas_h: u32) -> PhotoRect {
    let side = (canvas_h as f32 * 0.12).round() as u32;
    PhotoRect {
        x: (canvas_w as f32 * 0.85).round() as u32,
        y: (canvas_h as f32 * 0.05).round() as u32,
        width: side,
        height: side,
    }
}

/// Absolute anchor position and font size of a field on a given canvas.
pub fn resolve_field(field: &TemplateField, canvas_w: u32, canvas_h: u32) -> (f32, f32, f32) {
    (
        field.x * canvas_w as f32,
        field.y * canvas_h as f32,
        field.font_size * canvas_h as f32,
    )
}

/// Where a line starts horizontally. Left keeps the anchor, center subtracts
/// half the measured width, right subtracts all of it, so for right
/// alignment the text's right edge sits exactly on the anchor.
pub fn line_origin_x(align: Align, anchor_x: f32, text_width: f32) -> f32 {
    match align {
        Align::Left => anchor_x,
        Align::Center => anchor_x - text_width / 2.0,
        Align::Right => anchor_x - text_width,
    }
}

/// Vertical distance between consecutive line baselines.
pub fn line_advance(field: &TemplateField, font_size_px: f32) -> f32 {
    field.line_height() * font_size_px
}
