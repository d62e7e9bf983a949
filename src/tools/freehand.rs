use image::Rgba;

use super::{BrushSettings, PencilSettings, ToolContext};
use crate::gpu::Compositor;
use crate::ops::shapes::draw_line_stroke;

/// How a freehand instrument lays down each segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreehandStyle {
    pub color: Rgba<u8>,
    pub width: f32,
    pub rounded: bool,
    pub blend: bool,
}

impl FreehandStyle {
    pub fn pencil(s: &PencilSettings) -> Self {
        Self { color: s.color, width: 1.0, rounded: false, blend: true }
    }

    pub fn brush(s: &BrushSettings) -> Self {
        Self { color: s.color, width: s.width, rounded: true, blend: s.blend_enabled }
    }
}

/// Draw the segment travelled since the previous frame straight onto the
/// active layer, clipped to the selection.  Nothing is drawn on the press
/// frame or while the pointer rests.
pub fn stroke(ctx: &mut ToolContext<'_>, style: &FreehandStyle) {
    let pointer = ctx.pointer;
    if !(pointer.active && pointer.prev_active) || pointer.position == pointer.prev_position {
        return;
    }
    let Some(target) = ctx.layers.active_surface() else { return };

    let from = ctx.canvas_prev_pointer();
    let to = ctx.canvas_pointer();
    let (canvas, scissor) = (ctx.canvas(), ctx.selection.rect());
    Compositor::begin_canvas_pass(ctx.device, target, canvas, scissor, style.blend);
    draw_line_stroke(ctx.batcher, ctx.device, from, to, style.width, style.color, style.rounded, style.rounded);
    ctx.batcher.flush(ctx.device);
}
