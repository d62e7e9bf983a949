// ============================================================================
// COMPOSITOR — textured quads, layer merging and the display frame
// ============================================================================
//
// Owns the single six-vertex quad buffer.  Every textured pass re-uploads the
// quad it needs right before drawing, so passes never depend on each other's
// buffer contents.
// ============================================================================

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use egui::{Pos2, Rect};

use super::{BufferId, CustomEffect, Effect, GeometryBatcher, RenderDevice, SurfaceId, TexturedVertex, Topology};
use crate::canvas::{LayerStack, PixelRect, TEMP_CLEAR};
use crate::settings::EngineSettings;
use crate::view::Affine2;

/// Uniform block for the checkerboard effect.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CheckerboardConstants {
    pub cell_size: f32,
    pub light: [u8; 4],
    pub dark: [u8; 4],
}

impl CheckerboardConstants {
    pub fn new(cell_size: f32) -> Self {
        Self { cell_size, light: [255, 255, 255, 255], dark: [204, 204, 204, 255] }
    }
}

/// Which of the active layer / temp surface the display composite shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreviewDisplay {
    /// Skip the active layer's own content.
    pub hide_active_layer: bool,
    /// Draw the temp surface directly above the active layer's slot.
    pub show_temp: bool,
}

/// Everything the display composite needs for one frame.
pub struct FrameParams<'a> {
    pub target: SurfaceId,
    pub viewport: PixelRect,
    pub canvas_to_view: Affine2,
    pub layers: &'a LayerStack,
    pub display: PreviewDisplay,
    pub selection: PixelRect,
    pub settings: &'a EngineSettings,
}

pub struct Compositor {
    quad: BufferId,
}

impl Compositor {
    pub fn new(device: &mut dyn RenderDevice) -> Self {
        Self { quad: device.create_vertex_buffer(6 * size_of::<TexturedVertex>()) }
    }

    fn upload_quad(&self, device: &mut dyn RenderDevice, rect: Rect) {
        let v = |p: Pos2, u: f32, w: f32| TexturedVertex { position: [p.x, p.y], uv: [u, w] };
        let vertices = [
            v(rect.left_top(), 0.0, 0.0),
            v(rect.right_top(), 1.0, 0.0),
            v(rect.left_bottom(), 0.0, 1.0),
            v(rect.left_bottom(), 0.0, 1.0),
            v(rect.right_top(), 1.0, 0.0),
            v(rect.right_bottom(), 1.0, 1.0),
        ];
        device.upload_vertices(self.quad, bytemuck::cast_slice(&vertices));
    }

    fn draw_quad(&self, device: &mut dyn RenderDevice, effect: Effect) {
        device.draw(Topology::TriangleList, effect, self.quad, 0..6);
    }

    /// Point `device` at a canvas-sized surface: full viewport, identity
    /// transform, scissor limited to `scissor`.
    pub fn begin_canvas_pass(
        device: &mut dyn RenderDevice,
        target: SurfaceId,
        canvas: PixelRect,
        scissor: PixelRect,
        blend: bool,
    ) {
        device.set_render_target(target);
        device.set_viewport(canvas);
        device.set_scissor(scissor);
        device.set_transform(Affine2::IDENTITY);
        device.set_blend(blend);
    }

    /// Draw `texture` 1:1 over the whole of a canvas-sized target through
    /// `effect`, honouring the current scissor and blend state.
    pub fn draw_canvas_quad(&self, device: &mut dyn RenderDevice, texture: SurfaceId, canvas: PixelRect, effect: Effect) {
        self.upload_quad(device, canvas.to_rect());
        device.set_texture(Some(texture));
        self.draw_quad(device, effect);
        device.set_texture(None);
    }

    /// Alpha-blend `src` over `dst` inside `scissor`.
    pub fn merge_into(
        &self,
        device: &mut dyn RenderDevice,
        dst: SurfaceId,
        src: SurfaceId,
        canvas: PixelRect,
        scissor: PixelRect,
    ) {
        Self::begin_canvas_pass(device, dst, canvas, scissor, true);
        self.draw_canvas_quad(device, src, canvas, Effect::Textured);
    }

    /// Flatten every visible layer, bottom to top, into the temp surface.
    pub fn merge_visible_into_temp(&self, device: &mut dyn RenderDevice, layers: &LayerStack) {
        let canvas = layers.bounds();
        let temp = layers.temp();
        device.clear(temp, TEMP_CLEAR);
        Self::begin_canvas_pass(device, temp, canvas, canvas, true);
        self.upload_quad(device, canvas.to_rect());
        for layer in layers.layers().iter().filter(|l| l.visible) {
            device.set_texture(Some(layer.surface));
            self.draw_quad(device, Effect::Textured);
        }
        device.set_texture(None);
    }

    /// Display composite: background, canvas shadow, checkerboard, layers
    /// (with the preview substitution), then the selection shade.
    pub fn draw_frame(&self, device: &mut dyn RenderDevice, batcher: &mut GeometryBatcher, frame: &FrameParams<'_>) {
        let settings = frame.settings;
        let (width, height) = frame.layers.size();
        let view_canvas = Rect::from_min_max(
            frame.canvas_to_view.apply(Pos2::ZERO),
            frame.canvas_to_view.apply(Pos2::new(width as f32, height as f32)),
        );
        let (vw, vh) = frame.viewport.size();

        device.set_render_target(frame.target);
        device.set_viewport(frame.viewport);
        device.set_scissor(frame.viewport);
        device.set_transform(Affine2::IDENTITY);
        device.set_blend(true);
        device.set_texture(None);

        // background
        let background = Rect::from_min_max(Pos2::ZERO, Pos2::new(vw as f32, vh as f32));
        batcher.draw_vertical_gradient_rect(device, background, settings.background_top, settings.background_bottom);
        batcher.draw_rect_shadow(device, view_canvas, settings.canvas_shadow_width, settings.canvas_shadow_color);
        batcher.flush(device);

        self.upload_quad(device, view_canvas);
        device.set_effect_constants(bytemuck::bytes_of(&CheckerboardConstants::new(settings.checker_cell_size)));
        self.draw_quad(device, Effect::Custom(CustomEffect::Checkerboard));

        // canvas
        let current = frame.layers.current();
        for (i, layer) in frame.layers.layers().iter().enumerate() {
            if !layer.visible {
                continue;
            }
            if i != current || !frame.display.hide_active_layer {
                device.set_texture(Some(layer.surface));
                self.draw_quad(device, Effect::Textured);
            }
            if i == current && frame.display.show_temp {
                device.set_texture(Some(frame.layers.temp()));
                self.draw_quad(device, Effect::Textured);
            }
        }
        device.set_texture(None);

        // canvas-space foreground: shade everything outside the selection
        device.set_transform(frame.canvas_to_view);
        let sel = frame.selection.to_rect();
        let (cw, ch) = (width as f32, height as f32);
        let shade = settings.selection_shadow_color;
        let mut shade_rect = |r: Rect| batcher.draw_filled_rect(device, r, shade);
        if frame.selection.left > 0 {
            shade_rect(Rect::from_min_max(Pos2::ZERO, Pos2::new(sel.left(), ch)));
        }
        if frame.selection.right < width as i32 {
            shade_rect(Rect::from_min_max(Pos2::new(sel.right(), 0.0), Pos2::new(cw, ch)));
        }
        if frame.selection.top > 0 {
            shade_rect(Rect::from_min_max(Pos2::new(sel.left(), 0.0), Pos2::new(sel.right(), sel.top())));
        }
        if frame.selection.bottom < height as i32 {
            shade_rect(Rect::from_min_max(Pos2::new(sel.left(), sel.bottom()), Pos2::new(sel.right(), ch)));
        }
        batcher.flush(device);
        device.set_transform(Affine2::IDENTITY);
    }
}
