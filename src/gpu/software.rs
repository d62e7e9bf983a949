// ============================================================================
// SOFTWARE DEVICE — CPU reference implementation of RenderDevice
// ============================================================================
//
// Surfaces are straight-alpha `RgbaImage`s.  Triangles are rasterized with
// edge functions sampled at pixel centres under a top-left fill rule, so
// adjacent triangles never double-cover a pixel.  Rows are shaded in
// parallel with rayon.  Custom filter effects evaluate the same kernels as
// `ops::adjustments` / `ops::filters` over the bound texture.
// ============================================================================

use std::borrow::Cow;
use std::collections::HashMap;
use std::mem::size_of;
use std::ops::Range;

use bytemuck::Pod;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::compositor::CheckerboardConstants;
use super::{
    BufferId, ColorVertex, CustomEffect, Effect, RenderDevice, SurfaceId, Topology, TexturedVertex,
    required_len,
};
use crate::canvas::PixelRect;
use crate::ops::adjustments::{self, BrightnessContrastGammaConstants};
use crate::ops::filters::{self, BlurConstants, SharpenConstants};
use crate::view::Affine2;

/// Running counters, mostly for tests and the `--verbose` CLI summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub surfaces_alive: usize,
    pub draw_calls: usize,
    pub vertices_drawn: usize,
    pub clears: usize,
    pub copies: usize,
}

pub struct SoftwareDevice {
    surfaces: HashMap<SurfaceId, RgbaImage>,
    buffers: HashMap<BufferId, Vec<u8>>,
    effects: HashMap<CustomEffect, Vec<u8>>,
    next_id: u32,
    target: Option<SurfaceId>,
    viewport: PixelRect,
    scissor: PixelRect,
    transform: Affine2,
    blend: bool,
    texture: Option<SurfaceId>,
    constants: Vec<u8>,
    stats: DeviceStats,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Post-transform vertex: target-pixel position plus four interpolated
/// attributes (colour in 0..255, or uv in the first two slots).
#[derive(Clone, Copy)]
struct RasterVertex {
    pos: [f32; 2],
    attr: [f32; 4],
}

enum Shading<'a> {
    Color,
    Texture(Cow<'a, RgbaImage>),
    Checker(CheckerboardConstants),
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            buffers: HashMap::new(),
            effects: HashMap::new(),
            next_id: 1,
            target: None,
            viewport: PixelRect::default(),
            scissor: PixelRect::default(),
            transform: Affine2::IDENTITY,
            blend: true,
            texture: None,
            constants: Vec::new(),
            stats: DeviceStats::default(),
        }
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats { surfaces_alive: self.surfaces.len(), ..self.stats }
    }

    pub fn is_alive(&self, surface: SurfaceId) -> bool {
        self.surfaces.contains_key(&surface)
    }

    pub fn is_effect_registered(&self, effect: CustomEffect) -> bool {
        self.effects.contains_key(&effect)
    }

    /// Read-only view of a surface's pixels.
    pub fn surface(&self, surface: SurfaceId) -> &RgbaImage {
        match self.surfaces.get(&surface) {
            Some(img) => img,
            None => panic!("unknown surface {surface:?}"),
        }
    }

    pub fn pixel(&self, surface: SurfaceId, x: u32, y: u32) -> Rgba<u8> {
        *self.surface(surface).get_pixel(x, y)
    }

    fn surface_mut(&mut self, surface: SurfaceId) -> &mut RgbaImage {
        match self.surfaces.get_mut(&surface) {
            Some(img) => img,
            None => panic!("unknown surface {surface:?}"),
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn read_constants<T: Pod>(&self) -> T {
        let len = size_of::<T>();
        assert!(
            self.constants.len() >= len,
            "effect constants too small: {} bytes bound, {} needed",
            self.constants.len(),
            len
        );
        bytemuck::pod_read_unaligned(&self.constants[..len])
    }

    fn decode_vertices(&self, effect: Effect, buffer: BufferId, range: Range<u32>) -> Vec<RasterVertex> {
        let Some(data) = self.buffers.get(&buffer) else {
            panic!("unknown vertex buffer {buffer:?}");
        };
        let stride = match effect {
            Effect::PerVertexColor => size_of::<ColorVertex>(),
            _ => size_of::<TexturedVertex>(),
        };
        let start = range.start as usize * stride;
        let end = range.end as usize * stride;
        assert!(end <= data.len(), "draw range {range:?} exceeds uploaded vertex data");

        let origin = [self.viewport.left as f32, self.viewport.top as f32];
        data[start..end]
            .chunks_exact(stride)
            .map(|chunk| {
                let (position, attr) = match effect {
                    Effect::PerVertexColor => {
                        let v: ColorVertex = bytemuck::pod_read_unaligned(chunk);
                        let c = v.color.map(|c| c as f32);
                        (v.position, c)
                    }
                    _ => {
                        let v: TexturedVertex = bytemuck::pod_read_unaligned(chunk);
                        (v.position, [v.uv[0], v.uv[1], 0.0, 0.0])
                    }
                };
                let p = self.transform.apply(egui::Pos2::new(position[0], position[1]));
                RasterVertex { pos: [p.x + origin[0], p.y + origin[1]], attr }
            })
            .collect()
    }

    fn bound_texture(&self, effect: Effect) -> &RgbaImage {
        let Some(id) = self.texture else {
            panic!("{effect:?} draw without a bound texture");
        };
        assert!(Some(id) != self.target, "cannot sample the current render target");
        self.surface(id)
    }

    fn shading_for(&self, effect: Effect) -> Shading<'_> {
        let texture = || self.bound_texture(effect);
        match effect {
            Effect::PerVertexColor => Shading::Color,
            Effect::Textured => Shading::Texture(Cow::Borrowed(texture())),
            Effect::Custom(custom) => {
                assert!(self.effects.contains_key(&custom), "custom effect {custom:?} was never registered");
                match custom {
                    CustomEffect::Checkerboard => Shading::Checker(self.read_constants()),
                    CustomEffect::BrightnessContrastGamma => {
                        let c: BrightnessContrastGammaConstants = self.read_constants();
                        Shading::Texture(Cow::Owned(adjustments::brightness_contrast_gamma(texture(), &c)))
                    }
                    CustomEffect::GaussianBlur => {
                        let c: BlurConstants = self.read_constants();
                        Shading::Texture(Cow::Owned(filters::gaussian_blur(texture(), &c)))
                    }
                    CustomEffect::Sharpen => {
                        let c: SharpenConstants = self.read_constants();
                        Shading::Texture(Cow::Owned(filters::sharpen(texture(), &c)))
                    }
                }
            }
        }
    }
}

// ============================================================================
// RASTERIZATION
// ============================================================================

#[inline]
fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Top edge (horizontal, interior below) or left edge (interior to the
/// right) for a positively wound triangle in y-down space.
#[inline]
fn is_top_left(a: [f32; 2], b: [f32; 2]) -> bool {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

#[inline]
fn covers(w: f32, top_left: bool) -> bool {
    w > 0.0 || (w == 0.0 && top_left)
}

/// Straight-alpha "over".  `src` channels are in 0..255.
#[inline]
fn blend_over(dst: &mut [u8], src: [f32; 4]) {
    let sa = src[3] / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    for c in 0..3 {
        let v = (src[c] * sa + dst[c] as f32 * da * (1.0 - sa)) / oa;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[inline]
fn write_replace(dst: &mut [u8], src: [f32; 4]) {
    for c in 0..4 {
        dst[c] = src[c].round().clamp(0.0, 255.0) as u8;
    }
}

fn sample_nearest(img: &RgbaImage, u: f32, v: f32) -> [f32; 4] {
    let w = img.width();
    let h = img.height();
    let x = ((u * w as f32).floor() as i64).clamp(0, w as i64 - 1) as u32;
    let y = ((v * h as f32).floor() as i64).clamp(0, h as i64 - 1) as u32;
    img.get_pixel(x, y).0.map(|c| c as f32)
}

fn rasterize_triangle(
    target: &mut RgbaImage,
    clip: PixelRect,
    tri: [RasterVertex; 3],
    shading: &Shading<'_>,
    blend: bool,
) {
    let [mut v0, mut v1, mut v2] = tri;
    let mut area = edge(v0.pos, v1.pos, v2.pos);
    if !area.is_finite() || area.abs() <= f32::EPSILON {
        return;
    }
    if area < 0.0 {
        std::mem::swap(&mut v1, &mut v2);
        area = -area;
    }

    let min_x = v0.pos[0].min(v1.pos[0]).min(v2.pos[0]).floor() as i32;
    let max_x = v0.pos[0].max(v1.pos[0]).max(v2.pos[0]).ceil() as i32;
    let min_y = v0.pos[1].min(v1.pos[1]).min(v2.pos[1]).floor() as i32;
    let max_y = v0.pos[1].max(v1.pos[1]).max(v2.pos[1]).ceil() as i32;
    let bounds = PixelRect::new(min_x, min_y, max_x, max_y).intersect(&clip);
    if bounds.is_empty() {
        return;
    }

    let tl0 = is_top_left(v1.pos, v2.pos);
    let tl1 = is_top_left(v2.pos, v0.pos);
    let tl2 = is_top_left(v0.pos, v1.pos);
    let inv_area = 1.0 / area;

    let stride = target.width() as usize * 4;
    let raw: &mut [u8] = target;
    let rows = &mut raw[bounds.top as usize * stride..bounds.bottom as usize * stride];
    rows.par_chunks_mut(stride).enumerate().for_each(|(dy, row)| {
        let py = (bounds.top + dy as i32) as f32 + 0.5;
        for x in bounds.left..bounds.right {
            let p = [x as f32 + 0.5, py];
            let w0 = edge(v1.pos, v2.pos, p);
            let w1 = edge(v2.pos, v0.pos, p);
            let w2 = edge(v0.pos, v1.pos, p);
            if !(covers(w0, tl0) && covers(w1, tl1) && covers(w2, tl2)) {
                continue;
            }
            let (b0, b1, b2) = (w0 * inv_area, w1 * inv_area, w2 * inv_area);
            let mut attr = [0.0f32; 4];
            for (i, a) in attr.iter_mut().enumerate() {
                *a = v0.attr[i] * b0 + v1.attr[i] * b1 + v2.attr[i] * b2;
            }
            let src = match shading {
                Shading::Color => attr,
                Shading::Texture(img) => sample_nearest(img, attr[0], attr[1]),
                Shading::Checker(c) => {
                    let cell = c.cell_size.max(1.0);
                    let odd = ((x as f32 / cell).floor() as i64 + (py / cell).floor() as i64) & 1 == 1;
                    let color = if odd { c.dark } else { c.light };
                    color.map(|c| c as f32)
                }
            };
            let px = &mut row[x as usize * 4..x as usize * 4 + 4];
            if blend {
                blend_over(px, src);
            } else {
                write_replace(px, src);
            }
        }
    });
}

// ============================================================================
// RenderDevice
// ============================================================================

impl RenderDevice for SoftwareDevice {
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceId {
        assert!(width > 0 && height > 0, "surface size must be positive, got {width}x{height}");
        let id = SurfaceId(self.next_id());
        self.surfaces.insert(id, RgbaImage::new(width, height));
        id
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        if self.surfaces.remove(&surface).is_none() {
            panic!("destroying unknown surface {surface:?}");
        }
        if self.target == Some(surface) {
            self.target = None;
        }
        if self.texture == Some(surface) {
            self.texture = None;
        }
    }

    fn surface_size(&self, surface: SurfaceId) -> (u32, u32) {
        self.surface(surface).dimensions()
    }

    fn create_vertex_buffer(&mut self, capacity_bytes: usize) -> BufferId {
        let id = BufferId(self.next_id());
        self.buffers.insert(id, Vec::with_capacity(capacity_bytes));
        id
    }

    fn upload_vertices(&mut self, buffer: BufferId, data: &[u8]) {
        let Some(buf) = self.buffers.get_mut(&buffer) else {
            panic!("unknown vertex buffer {buffer:?}");
        };
        buf.clear();
        buf.extend_from_slice(data);
    }

    fn register_effect(&mut self, effect: CustomEffect, shader: &[u8]) {
        self.effects.insert(effect, shader.to_vec());
    }

    fn set_render_target(&mut self, surface: SurfaceId) {
        assert!(self.is_alive(surface), "unknown render target {surface:?}");
        self.target = Some(surface);
    }

    fn set_viewport(&mut self, viewport: PixelRect) {
        self.viewport = viewport;
    }

    fn set_scissor(&mut self, scissor: PixelRect) {
        self.scissor = scissor;
    }

    fn set_transform(&mut self, transform: Affine2) {
        self.transform = transform;
    }

    fn set_blend(&mut self, enabled: bool) {
        self.blend = enabled;
    }

    fn set_texture(&mut self, texture: Option<SurfaceId>) {
        self.texture = texture;
    }

    fn set_effect_constants(&mut self, constants: &[u8]) {
        self.constants.clear();
        self.constants.extend_from_slice(constants);
    }

    fn draw(&mut self, topology: Topology, effect: Effect, buffer: BufferId, vertices: Range<u32>) {
        let Some(target_id) = self.target else {
            panic!("draw without a render target");
        };
        let verts = self.decode_vertices(effect, buffer, vertices);
        self.stats.draw_calls += 1;
        self.stats.vertices_drawn += verts.len();

        // Take the target out of the map so the bound texture can be borrowed
        // while it is written.
        let mut target = match self.surfaces.remove(&target_id) {
            Some(img) => img,
            None => panic!("render target {target_id:?} was destroyed"),
        };
        let clip = PixelRect::from_size(target.width(), target.height())
            .intersect(&self.viewport)
            .intersect(&self.scissor);

        if !clip.is_empty() {
            let shading = self.shading_for(effect);
            match topology {
                Topology::TriangleList => {
                    for tri in verts.chunks_exact(3) {
                        rasterize_triangle(&mut target, clip, [tri[0], tri[1], tri[2]], &shading, self.blend);
                    }
                }
                Topology::TriangleStrip => {
                    for i in 2..verts.len() {
                        let tri = [verts[i - 2], verts[i - 1], verts[i]];
                        rasterize_triangle(&mut target, clip, tri, &shading, self.blend);
                    }
                }
            }
        }
        self.surfaces.insert(target_id, target);
    }

    fn upload_pixels(&mut self, surface: SurfaceId, region: PixelRect, data: &[u8], stride: usize) {
        let img = self.surface_mut(surface);
        let bounds = PixelRect::from_size(img.width(), img.height());
        assert!(bounds.contains_rect(&region), "upload region {region:?} outside surface {bounds:?}");
        let (w, h) = region.size();
        let row_bytes = w as usize * 4;
        let stride = if stride == 0 { row_bytes } else { stride };
        assert!(
            data.len() >= required_len(w as usize, h as usize, stride),
            "pixel data too small for {w}x{h} region"
        );

        let img_stride = img.width() as usize * 4;
        let raw: &mut [u8] = img;
        for y in 0..h as usize {
            let dst = (region.top as usize + y) * img_stride + region.left as usize * 4;
            raw[dst..dst + row_bytes].copy_from_slice(&data[y * stride..y * stride + row_bytes]);
        }
    }

    fn download_pixels(&mut self, surface: SurfaceId, region: PixelRect, data: &mut [u8], stride: usize) {
        let img = self.surface(surface);
        let bounds = PixelRect::from_size(img.width(), img.height());
        assert!(bounds.contains_rect(&region), "download region {region:?} outside surface {bounds:?}");
        let (w, h) = region.size();
        let row_bytes = w as usize * 4;
        let stride = if stride == 0 { row_bytes } else { stride };
        assert!(
            data.len() >= required_len(w as usize, h as usize, stride),
            "pixel buffer too small for {w}x{h} region"
        );

        let img_stride = img.width() as usize * 4;
        let raw = img.as_raw();
        for y in 0..h as usize {
            let src = (region.top as usize + y) * img_stride + region.left as usize * 4;
            data[y * stride..y * stride + row_bytes].copy_from_slice(&raw[src..src + row_bytes]);
        }
    }

    fn copy_region(&mut self, dst: SurfaceId, dst_origin: (i32, i32), src: SurfaceId, src_rect: PixelRect) {
        self.stats.copies += 1;
        let src_img = self.surface(src);
        let src_bounds = PixelRect::from_size(src_img.width(), src_img.height());
        let clipped = src_rect.intersect(&src_bounds);
        if clipped.is_empty() {
            return;
        }
        let (w, h) = clipped.size();
        let mut staging = vec![0u8; w as usize * h as usize * 4];
        self.download_pixels(src, clipped, &mut staging, 0);

        // Where the clipped source lands, then clip again against dst.
        let dx = dst_origin.0 + (clipped.left - src_rect.left);
        let dy = dst_origin.1 + (clipped.top - src_rect.top);
        let landing = PixelRect::from_origin_size(dx, dy, w, h);
        let dst_img = self.surface_mut(dst);
        let dst_bounds = PixelRect::from_size(dst_img.width(), dst_img.height());
        let visible = landing.intersect(&dst_bounds);
        if visible.is_empty() {
            return;
        }

        let dst_stride = dst_img.width() as usize * 4;
        let src_stride = w as usize * 4;
        let row_bytes = visible.width() as usize * 4;
        let raw: &mut [u8] = dst_img;
        for y in visible.top..visible.bottom {
            let sy = (y - landing.top) as usize;
            let sx = (visible.left - landing.left) as usize;
            let s = sy * src_stride + sx * 4;
            let d = y as usize * dst_stride + visible.left as usize * 4;
            raw[d..d + row_bytes].copy_from_slice(&staging[s..s + row_bytes]);
        }
    }

    fn clear(&mut self, surface: SurfaceId, color: Rgba<u8>) {
        self.stats.clears += 1;
        let img = self.surface_mut(surface);
        for p in img.pixels_mut() {
            *p = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Pos2;

    fn colored_quad(device: &mut SoftwareDevice, rect: PixelRect, color: Rgba<u8>) -> BufferId {
        let r = rect.to_rect();
        let v = |p: Pos2| ColorVertex::new(p, color);
        let verts = [
            v(r.left_top()),
            v(r.right_top()),
            v(r.right_bottom()),
            v(r.left_top()),
            v(r.right_bottom()),
            v(r.left_bottom()),
        ];
        let buf = device.create_vertex_buffer(std::mem::size_of_val(&verts));
        device.upload_vertices(buf, bytemuck::cast_slice(&verts));
        buf
    }

    fn prepare(device: &mut SoftwareDevice, target: SurfaceId, w: u32, h: u32) {
        device.set_render_target(target);
        device.set_viewport(PixelRect::from_size(w, h));
        device.set_scissor(PixelRect::from_size(w, h));
        device.set_transform(Affine2::IDENTITY);
        device.set_blend(true);
    }

    #[test]
    fn quad_covers_exactly_its_pixels() {
        let mut d = SoftwareDevice::new();
        let t = d.create_surface(8, 8);
        prepare(&mut d, t, 8, 8);
        let red = Rgba([255, 0, 0, 255]);
        let buf = colored_quad(&mut d, PixelRect::new(2, 3, 5, 6), red);
        d.draw(Topology::TriangleList, Effect::PerVertexColor, buf, 0..6);

        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..5).contains(&x) && (3..6).contains(&y);
                assert_eq!(d.pixel(t, x, y) == red, inside, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn shared_diagonal_is_not_double_blended() {
        let mut d = SoftwareDevice::new();
        let t = d.create_surface(4, 4);
        prepare(&mut d, t, 4, 4);
        let buf = colored_quad(&mut d, PixelRect::from_size(4, 4), Rgba([0, 0, 255, 128]));
        d.draw(Topology::TriangleList, Effect::PerVertexColor, buf, 0..6);
        let alphas: Vec<u8> = d.surface(t).pixels().map(|p| p[3]).collect();
        assert!(alphas.iter().all(|&a| a == 128), "{alphas:?}");
    }

    #[test]
    fn scissor_clips_drawing() {
        let mut d = SoftwareDevice::new();
        let t = d.create_surface(6, 6);
        prepare(&mut d, t, 6, 6);
        d.set_scissor(PixelRect::new(0, 0, 3, 6));
        let buf = colored_quad(&mut d, PixelRect::from_size(6, 6), Rgba([0, 255, 0, 255]));
        d.draw(Topology::TriangleList, Effect::PerVertexColor, buf, 0..6);
        assert_eq!(d.pixel(t, 2, 2)[1], 255);
        assert_eq!(d.pixel(t, 3, 2), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn replace_mode_overwrites_alpha() {
        let mut d = SoftwareDevice::new();
        let t = d.create_surface(2, 2);
        d.clear(t, Rgba([255, 255, 255, 255]));
        prepare(&mut d, t, 2, 2);
        d.set_blend(false);
        let buf = colored_quad(&mut d, PixelRect::from_size(2, 2), Rgba([0, 0, 0, 0]));
        d.draw(Topology::TriangleList, Effect::PerVertexColor, buf, 0..6);
        assert_eq!(d.pixel(t, 1, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn copy_region_clips_against_both_surfaces() {
        let mut d = SoftwareDevice::new();
        let src = d.create_surface(4, 4);
        let dst = d.create_surface(4, 4);
        d.clear(src, Rgba([9, 9, 9, 9]));
        d.copy_region(dst, (2, 2), src, PixelRect::from_size(4, 4));
        assert_eq!(d.pixel(dst, 1, 1), Rgba([0, 0, 0, 0]));
        assert_eq!(d.pixel(dst, 2, 2), Rgba([9, 9, 9, 9]));
        assert_eq!(d.pixel(dst, 3, 3), Rgba([9, 9, 9, 9]));
    }

    #[test]
    fn upload_then_download_with_padded_stride() {
        let mut d = SoftwareDevice::new();
        let s = d.create_surface(3, 2);
        let region = PixelRect::new(1, 0, 3, 2);
        let stride = 12;
        let mut data = vec![0u8; stride * 2];
        data[0..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[12..20].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        d.upload_pixels(s, region, &data, stride);
        assert_eq!(d.pixel(s, 2, 1), Rgba([13, 14, 15, 16]));

        let mut out = vec![0u8; 16];
        d.download_pixels(s, region, &mut out, 0);
        assert_eq!(&out[..8], &data[..8]);
        assert_eq!(&out[8..], &data[12..20]);
    }

    #[test]
    #[should_panic(expected = "cannot sample the current render target")]
    fn sampling_the_target_panics() {
        let mut d = SoftwareDevice::new();
        let t = d.create_surface(2, 2);
        prepare(&mut d, t, 2, 2);
        d.set_texture(Some(t));
        let verts = [TexturedVertex { position: [0.0, 0.0], uv: [0.0, 0.0] }; 3];
        let buf = d.create_vertex_buffer(48);
        d.upload_vertices(buf, bytemuck::cast_slice(&verts));
        d.draw(Topology::TriangleList, Effect::Textured, buf, 0..3);
    }
}
