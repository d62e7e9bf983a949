// ============================================================================
// GEOMETRY BATCHER — colored triangle accumulation with auto-flush
// ============================================================================
//
// Shapes append triangle-list vertices to a fixed-size CPU buffer.  When the
// next shape would not fit, the pending vertices are uploaded and drawn with
// whatever target/scissor/transform the device currently has, and the buffer
// starts over.  Callers set device state before drawing and `flush` at the
// end of each pass.
// ============================================================================

use std::f32::consts::PI;
use std::mem::size_of;

use egui::{Pos2, Rect, Vec2};
use image::Rgba;

use super::{BufferId, ColorVertex, Effect, RenderDevice, Topology};

/// Segments used for rounded line caps.
pub const CAP_SEGMENTS: u32 = 16;
/// Segments used for ellipses.
pub const ELLIPSE_SEGMENTS: u32 = 64;

/// Smallest buffer that still fits the largest single shape (an ellipse
/// border at the default segment count).
pub const MIN_BUFFER_BYTES: usize = ELLIPSE_SEGMENTS as usize * 6 * size_of::<ColorVertex>();

pub struct GeometryBatcher {
    buffer: BufferId,
    vertices: Vec<ColorVertex>,
    capacity: usize,
    flushes: usize,
}

#[inline]
fn normal_left(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

impl GeometryBatcher {
    pub fn new(device: &mut dyn RenderDevice, buffer_bytes: usize) -> Self {
        assert!(
            buffer_bytes >= MIN_BUFFER_BYTES,
            "vertex buffer of {buffer_bytes} bytes is smaller than the {MIN_BUFFER_BYTES}-byte minimum"
        );
        let capacity = buffer_bytes / size_of::<ColorVertex>();
        Self {
            buffer: device.create_vertex_buffer(capacity * size_of::<ColorVertex>()),
            vertices: Vec::with_capacity(capacity),
            capacity,
            flushes: 0,
        }
    }

    /// Vertices waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.vertices.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of non-empty flushes issued so far.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Drop pending vertices without drawing them.
    pub fn discard(&mut self) {
        self.vertices.clear();
    }

    pub fn flush(&mut self, device: &mut dyn RenderDevice) {
        if self.vertices.is_empty() {
            return;
        }
        device.upload_vertices(self.buffer, bytemuck::cast_slice(&self.vertices));
        device.draw(
            Topology::TriangleList,
            Effect::PerVertexColor,
            self.buffer,
            0..self.vertices.len() as u32,
        );
        self.vertices.clear();
        self.flushes += 1;
    }

    fn reserve(&mut self, device: &mut dyn RenderDevice, count: usize) {
        assert!(count <= self.capacity, "shape of {count} vertices exceeds batch capacity {}", self.capacity);
        if self.vertices.len() + count > self.capacity {
            self.flush(device);
        }
    }

    #[inline]
    fn push(&mut self, p: Pos2, color: Rgba<u8>) {
        self.vertices.push(ColorVertex::new(p, color));
    }

    fn push_quad(&mut self, a: Pos2, b: Pos2, c: Pos2, d: Pos2, color: Rgba<u8>) {
        // a-b-c, a-c-d
        self.push(a, color);
        self.push(b, color);
        self.push(c, color);
        self.push(a, color);
        self.push(c, color);
        self.push(d, color);
    }

    // ------------------------------------------------------------------------
    // Shapes
    // ------------------------------------------------------------------------

    /// Stroke from `start` to `end`, optionally capped with half-ellipse fans.
    /// Zero-length segments have no direction and draw nothing.
    pub fn draw_line(
        &mut self,
        device: &mut dyn RenderDevice,
        start: Pos2,
        end: Pos2,
        width: f32,
        color: Rgba<u8>,
        rounded_start: bool,
        rounded_end: bool,
    ) {
        let dir = end - start;
        if dir.length_sq() <= f32::EPSILON {
            return;
        }
        let w = normal_left(dir.normalized()) * (width / 2.0);

        self.reserve(device, 6);
        self.push_quad(end + w, start + w, start - w, end - w, color);

        if rounded_start {
            self.draw_left_half_ellipse_on_diameter(device, start - w, start + w, color, CAP_SEGMENTS);
        }
        if rounded_end {
            self.draw_left_half_ellipse_on_diameter(device, end + w, end - w, color, CAP_SEGMENTS);
        }
    }

    pub fn draw_filled_rect(&mut self, device: &mut dyn RenderDevice, rect: Rect, color: Rgba<u8>) {
        self.reserve(device, 6);
        self.push_quad(rect.left_top(), rect.right_top(), rect.right_bottom(), rect.left_bottom(), color);
    }

    /// Filled rectangle with a border centred on its edges.  When the border
    /// would swallow the interior the whole outer rect is drawn in the border
    /// colour as one quad.
    pub fn draw_filled_rect_with_border(
        &mut self,
        device: &mut dyn RenderDevice,
        rect: Rect,
        fill: Rgba<u8>,
        border: Rgba<u8>,
        border_width: f32,
    ) {
        let half = border_width * 0.5;
        let outer = rect.expand(half);

        if outer.width() > border_width * 2.0 && outer.height() > border_width * 2.0 {
            let inner = rect.shrink(half);
            self.reserve(device, 30);
            // fill
            self.push_quad(inner.left_top(), inner.right_top(), inner.right_bottom(), inner.left_bottom(), fill);
            // left
            self.push_quad(outer.left_top(), inner.left_top(), inner.left_bottom(), outer.left_bottom(), border);
            // top
            self.push_quad(outer.left_top(), outer.right_top(), inner.right_top(), inner.left_top(), border);
            // right
            self.push_quad(inner.right_top(), outer.right_top(), outer.right_bottom(), inner.right_bottom(), border);
            // bottom
            self.push_quad(inner.left_bottom(), inner.right_bottom(), outer.right_bottom(), outer.left_bottom(), border);
        } else {
            self.reserve(device, 6);
            self.push_quad(outer.left_top(), outer.right_top(), outer.right_bottom(), outer.left_bottom(), border);
        }
    }

    /// Drop shadow around `rect`: quads along each edge and a triangle at each
    /// corner, fading from `color` at the rect to fully transparent `width`
    /// pixels outside it.
    pub fn draw_rect_shadow(&mut self, device: &mut dyn RenderDevice, rect: Rect, width: f32, color: Rgba<u8>) {
        let inner = color;
        let outer = Rgba([color[0], color[1], color[2], 0]);
        let (l, t, r, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        let p = Pos2::new;

        self.reserve(device, 36);
        let tri = |this: &mut Self, a: (Pos2, Rgba<u8>), b: (Pos2, Rgba<u8>), c: (Pos2, Rgba<u8>)| {
            this.push(a.0, a.1);
            this.push(b.0, b.1);
            this.push(c.0, c.1);
        };

        // left
        tri(self, (p(l - width, t), outer), (p(l, t), inner), (p(l - width, b), outer));
        tri(self, (p(l, t), inner), (p(l, b), inner), (p(l - width, b), outer));
        // right
        tri(self, (p(r, t), inner), (p(r + width, t), outer), (p(r, b), inner));
        tri(self, (p(r + width, t), outer), (p(r + width, b), outer), (p(r, b), inner));
        // top
        tri(self, (p(l, t), inner), (p(l, t - width), outer), (p(r, t), inner));
        tri(self, (p(l, t - width), outer), (p(r, t - width), outer), (p(r, t), inner));
        // bottom
        tri(self, (p(l, b + width), outer), (p(l, b), inner), (p(r, b + width), outer));
        tri(self, (p(l, b), inner), (p(r, b), inner), (p(r, b + width), outer));
        // corners
        tri(self, (p(l, t), inner), (p(l - width, t), outer), (p(l, t - width), outer));
        tri(self, (p(l, b), inner), (p(l, b + width), outer), (p(l - width, b), outer));
        tri(self, (p(r, t), inner), (p(r, t - width), outer), (p(r + width, t), outer));
        tri(self, (p(r, b), inner), (p(r + width, b), outer), (p(r, b + width), outer));
    }

    pub fn draw_vertical_gradient_rect(
        &mut self,
        device: &mut dyn RenderDevice,
        rect: Rect,
        top: Rgba<u8>,
        bottom: Rgba<u8>,
    ) {
        self.reserve(device, 6);
        self.push(rect.left_top(), top);
        self.push(rect.right_top(), top);
        self.push(rect.right_bottom(), bottom);
        self.push(rect.left_top(), top);
        self.push(rect.right_bottom(), bottom);
        self.push(rect.left_bottom(), bottom);
    }

    /// Fan of `segments` triangles forming the half disc on the left of the
    /// directed diameter `start -> end`.
    pub fn draw_left_half_ellipse_on_diameter(
        &mut self,
        device: &mut dyn RenderDevice,
        start: Pos2,
        end: Pos2,
        color: Rgba<u8>,
        segments: u32,
    ) {
        let segments = segments.max(1);
        let step = PI / segments as f32;
        let half = (end - start) / 2.0;
        let side = normal_left(half);

        self.reserve(device, segments as usize * 3);
        let mut prev = end;
        for i in 1..=segments {
            let angle = step * i as f32;
            let next = start + half * (1.0 + angle.cos()) + side * angle.sin();
            self.push(start, color);
            self.push(prev, color);
            self.push(next, color);
            prev = next;
        }
    }

    /// Ring of `width` centred on the ellipse outline.  The ring normal is
    /// corrected for the radius aspect so the band stays even on flat
    /// ellipses.  Degenerate radii draw nothing.
    pub fn draw_ellipse_border(
        &mut self,
        device: &mut dyn RenderDevice,
        center: Pos2,
        radius: Vec2,
        color: Rgba<u8>,
        width: f32,
        segments: u32,
    ) {
        if radius.x <= 0.0 || radius.y <= 0.0 || segments < 3 {
            return;
        }
        let aspect = radius.y / radius.x;
        let w = width * 0.5;
        let step = PI * 2.0 / segments as f32;

        self.reserve(device, segments as usize * 6);
        let mut prev_inner = Pos2::new(center.x + radius.x - w, center.y);
        let mut prev_outer = Pos2::new(center.x + radius.x + w, center.y);
        for i in 1..=segments {
            let angle = step * i as f32;
            let (sin, cos) = angle.sin_cos();
            let base = center + Vec2::new(cos * radius.x, sin * radius.y);
            let normal = Vec2::new(cos * aspect, sin).normalized() * w;
            let inner = base - normal;
            let outer = base + normal;
            self.push_quad(prev_inner, prev_outer, outer, inner, color);
            prev_inner = inner;
            prev_outer = outer;
        }
    }

    /// Convex polygon fill: `segments - 2` triangles fanned from angle 0.
    pub fn draw_filled_ellipse(
        &mut self,
        device: &mut dyn RenderDevice,
        center: Pos2,
        radius: Vec2,
        color: Rgba<u8>,
        segments: u32,
    ) {
        if radius.x <= 0.0 || radius.y <= 0.0 || segments < 3 {
            return;
        }
        let step = PI * 2.0 / segments as f32;
        let at = |i: u32| {
            let (sin, cos) = (step * i as f32).sin_cos();
            center + Vec2::new(cos * radius.x, sin * radius.y)
        };

        let triangles = segments as usize - 2;
        self.reserve(device, triangles * 3);
        let first = Pos2::new(center.x + radius.x, center.y);
        let mut prev = at(1);
        for i in 2..segments {
            let next = at(i);
            self.push(first, color);
            self.push(prev, color);
            self.push(next, color);
            prev = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelRect;
    use crate::gpu::software::SoftwareDevice;
    use crate::view::Affine2;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn setup(bytes: usize) -> (SoftwareDevice, GeometryBatcher, crate::gpu::SurfaceId) {
        let mut device = SoftwareDevice::new();
        let target = device.create_surface(32, 32);
        device.set_render_target(target);
        device.set_viewport(PixelRect::from_size(32, 32));
        device.set_scissor(PixelRect::from_size(32, 32));
        device.set_transform(Affine2::IDENTITY);
        device.set_blend(true);
        let batcher = GeometryBatcher::new(&mut device, bytes);
        (device, batcher, target)
    }

    #[test]
    fn vertex_counts_per_shape() {
        let (mut device, mut b, _) = setup(65536);
        let rect = Rect::from_min_max(Pos2::new(2.0, 2.0), Pos2::new(20.0, 20.0));

        b.draw_filled_rect(&mut device, rect, RED);
        assert_eq!(b.pending(), 6);
        b.discard();

        b.draw_filled_rect_with_border(&mut device, rect, RED, RED, 2.0);
        assert_eq!(b.pending(), 30);
        b.discard();

        b.draw_rect_shadow(&mut device, rect, 12.0, RED);
        assert_eq!(b.pending(), 36);
        b.discard();

        b.draw_line(&mut device, Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0), 2.0, RED, true, true);
        assert_eq!(b.pending(), 6 + 2 * CAP_SEGMENTS as usize * 3);
        b.discard();

        b.draw_ellipse_border(&mut device, Pos2::new(10.0, 10.0), Vec2::new(5.0, 3.0), RED, 1.0, ELLIPSE_SEGMENTS);
        assert_eq!(b.pending(), ELLIPSE_SEGMENTS as usize * 6);
        b.discard();

        b.draw_filled_ellipse(&mut device, Pos2::new(10.0, 10.0), Vec2::new(5.0, 3.0), RED, ELLIPSE_SEGMENTS);
        assert_eq!(b.pending(), (ELLIPSE_SEGMENTS as usize - 2) * 3);
    }

    #[test]
    fn thick_border_degenerates_to_solid_quad() {
        let (mut device, mut b, target) = setup(65536);
        let rect = Rect::from_min_max(Pos2::new(4.0, 4.0), Pos2::new(8.0, 8.0));
        b.draw_filled_rect_with_border(&mut device, rect, Rgba([0, 255, 0, 255]), RED, 8.0);
        assert_eq!(b.pending(), 6);
        b.flush(&mut device);
        assert_eq!(device.pixel(target, 6, 6), RED);
    }

    #[test]
    fn zero_length_line_draws_nothing() {
        let (mut device, mut b, _) = setup(65536);
        b.draw_line(&mut device, Pos2::new(3.0, 3.0), Pos2::new(3.0, 3.0), 4.0, RED, true, true);
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn overflowing_batch_flushes_automatically() {
        let (mut device, mut b, target) = setup(MIN_BUFFER_BYTES);
        let per_batch = b.capacity() / 6;
        for i in 0..per_batch + 1 {
            let x = (i % 32) as f32;
            b.draw_filled_rect(&mut device, Rect::from_min_max(Pos2::new(x, 0.0), Pos2::new(x + 1.0, 1.0)), RED);
        }
        assert_eq!(b.flush_count(), 1);
        assert_eq!(b.pending(), 6);
        b.flush(&mut device);
        assert_eq!(b.flush_count(), 2);
        assert_eq!(device.pixel(target, 0, 0), RED);
    }

    #[test]
    fn flush_of_empty_batch_is_a_no_op() {
        let (mut device, mut b, _) = setup(65536);
        b.flush(&mut device);
        assert_eq!(b.flush_count(), 0);
        assert_eq!(device.stats().draw_calls, 0);
    }
}
