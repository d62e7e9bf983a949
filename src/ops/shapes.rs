use egui::{Pos2, Rect};
use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::gpu::RenderDevice;
use crate::gpu::batcher::{ELLIPSE_SEGMENTS, GeometryBatcher};

/// Primitives the Shape instrument can draw from two anchors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Ellipse => "Ellipse",
        }
    }

    pub fn all() -> &'static [ShapeKind] {
        &[ShapeKind::Rectangle, ShapeKind::Ellipse]
    }
}

/// Stroke between two anchors with optional rounded ends.
pub fn draw_line_stroke(
    batcher: &mut GeometryBatcher,
    device: &mut dyn RenderDevice,
    start: Pos2,
    end: Pos2,
    width: f32,
    color: Rgba<u8>,
    rounded_start: bool,
    rounded_end: bool,
) {
    batcher.draw_line(device, start, end, width, color, rounded_start, rounded_end);
}

/// Filled, bordered shape inscribed in the normalized box spanned by `a` and
/// `b`.  Anchor order does not matter.
pub fn draw_shape(
    batcher: &mut GeometryBatcher,
    device: &mut dyn RenderDevice,
    kind: ShapeKind,
    a: Pos2,
    b: Pos2,
    fill: Rgba<u8>,
    border: Rgba<u8>,
    border_width: f32,
) {
    let bounds = Rect::from_two_pos(a, b);
    match kind {
        ShapeKind::Rectangle => {
            batcher.draw_filled_rect_with_border(device, bounds, fill, border, border_width);
        }
        ShapeKind::Ellipse => {
            let radius = bounds.size() / 2.0;
            batcher.draw_filled_ellipse(device, bounds.center(), radius, fill, ELLIPSE_SEGMENTS);
            if border_width > 0.0 {
                batcher.draw_ellipse_border(device, bounds.center(), radius, border, border_width, ELLIPSE_SEGMENTS);
            }
        }
    }
}
