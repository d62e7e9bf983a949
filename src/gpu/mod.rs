// ============================================================================
// GPU MODULE — rendering-device contract and the pieces that drive it
// ============================================================================
//
// Architecture:
//   mod.rs        — RenderDevice trait, handles, vertex formats, effects
//   shaders.rs    — WGSL source for the custom effects (opaque to the engine)
//   batcher.rs    — GeometryBatcher: colored triangle accumulation + flush
//   compositor.rs — textured quads, layer merging, display composite
//   software.rs   — CPU reference device (tests, headless replay)
//
// The engine never waits on the device: every call is an ordered,
// fire-and-forget submission.
// ============================================================================

pub mod batcher;
pub mod compositor;
pub mod shaders;
pub mod software;

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use egui::Pos2;
use image::Rgba;

use crate::canvas::PixelRect;
use crate::view::Affine2;

pub use batcher::GeometryBatcher;
pub use compositor::Compositor;
pub use software::SoftwareDevice;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
}

/// Pixel effects backed by registered shader bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CustomEffect {
    Checkerboard,
    BrightnessContrastGamma,
    GaussianBlur,
    Sharpen,
}

impl CustomEffect {
    pub const ALL: [CustomEffect; 4] = [
        CustomEffect::Checkerboard,
        CustomEffect::BrightnessContrastGamma,
        CustomEffect::GaussianBlur,
        CustomEffect::Sharpen,
    ];
}

/// How a draw call shades its triangles.  `PerVertexColor` consumes
/// [`ColorVertex`] data; every other effect consumes [`TexturedVertex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    PerVertexColor,
    Textured,
    Custom(CustomEffect),
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 2],
    /// Straight (non-premultiplied) RGBA8.
    pub color: [u8; 4],
}

impl ColorVertex {
    #[inline]
    pub fn new(position: Pos2, color: Rgba<u8>) -> Self {
        Self { position: [position.x, position.y], color: color.0 }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 2],
    /// Normalized texture coordinates, `0..=1` across the bound texture.
    pub uv: [f32; 2],
}

/// Capability set the engine consumes.  Object safe so helpers can take
/// `&mut dyn RenderDevice`.
pub trait RenderDevice {
    /// New surface with zeroed contents.
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceId;
    fn destroy_surface(&mut self, surface: SurfaceId);
    fn surface_size(&self, surface: SurfaceId) -> (u32, u32);

    fn create_vertex_buffer(&mut self, capacity_bytes: usize) -> BufferId;
    fn upload_vertices(&mut self, buffer: BufferId, data: &[u8]);

    /// Register opaque shader bytes for a custom effect.
    fn register_effect(&mut self, effect: CustomEffect, shader: &[u8]);

    fn set_render_target(&mut self, surface: SurfaceId);
    /// Vertex positions are offset by the viewport origin and clipped to it.
    fn set_viewport(&mut self, viewport: PixelRect);
    fn set_scissor(&mut self, scissor: PixelRect);
    fn set_transform(&mut self, transform: Affine2);
    /// `true` = alpha-over, `false` = replace.
    fn set_blend(&mut self, enabled: bool);
    fn set_texture(&mut self, texture: Option<SurfaceId>);
    fn set_effect_constants(&mut self, constants: &[u8]);

    /// Draw `vertices` (a range in vertices, not bytes) from `buffer`.
    fn draw(&mut self, topology: Topology, effect: Effect, buffer: BufferId, vertices: Range<u32>);

    /// RGBA8 rows, `stride` bytes apart (0 = tightly packed).
    fn upload_pixels(&mut self, surface: SurfaceId, region: PixelRect, data: &[u8], stride: usize);
    fn download_pixels(&mut self, surface: SurfaceId, region: PixelRect, data: &mut [u8], stride: usize);

    /// Copy `src_rect` of `src` so that its top-left lands on `dst_origin`.
    fn copy_region(&mut self, dst: SurfaceId, dst_origin: (i32, i32), src: SurfaceId, src_rect: PixelRect);

    /// Fill the whole surface, ignoring viewport and scissor.
    fn clear(&mut self, surface: SurfaceId, color: Rgba<u8>);
}

/// Register the WGSL source of every custom effect with `device`.
pub fn register_builtin_effects(device: &mut dyn RenderDevice) {
    for effect in CustomEffect::ALL {
        device.register_effect(effect, shaders::source(effect).as_bytes());
    }
}

/// Bytes needed to hold `count` tightly packed RGBA8 rows of `width` pixels.
pub(crate) fn required_len(width: usize, height: usize, stride: usize) -> usize {
    if height == 0 || width == 0 {
        return 0;
    }
    (height - 1) * stride + width * 4
}
