// ============================================================================
// VIEW — pan/zoom state with inertial smoothing and view <-> canvas mapping
// ============================================================================

use egui::{Pos2, Vec2};

/// Row-vector 2x3 affine matrix: `p' = [x y 1] * M`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    pub m11: f32,
    pub m12: f32,
    pub m21: f32,
    pub m22: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 { m11: 1.0, m12: 0.0, m21: 0.0, m22: 1.0, dx: 0.0, dy: 0.0 };

    pub fn scaling(s: f32) -> Self {
        Self { m11: s, m22: s, ..Self::IDENTITY }
    }

    pub fn translation(offset: Vec2) -> Self {
        Self { dx: offset.x, dy: offset.y, ..Self::IDENTITY }
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Affine2) -> Affine2 {
        Affine2 {
            m11: self.m11 * next.m11 + self.m12 * next.m21,
            m12: self.m11 * next.m12 + self.m12 * next.m22,
            m21: self.m21 * next.m11 + self.m22 * next.m21,
            m22: self.m21 * next.m12 + self.m22 * next.m22,
            dx: self.dx * next.m11 + self.dy * next.m21 + next.dx,
            dy: self.dx * next.m12 + self.dy * next.m22 + next.dy,
        }
    }

    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.m11 * self.m22 - self.m12 * self.m21;
        if det.abs() <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        let m11 = self.m22 * inv;
        let m12 = -self.m12 * inv;
        let m21 = -self.m21 * inv;
        let m22 = self.m11 * inv;
        Some(Affine2 {
            m11,
            m12,
            m21,
            m22,
            dx: -(self.dx * m11 + self.dy * m21),
            dy: -(self.dx * m12 + self.dy * m22),
        })
    }

    #[inline]
    pub fn apply(&self, p: Pos2) -> Pos2 {
        Pos2::new(
            p.x * self.m11 + p.y * self.m21 + self.dx,
            p.x * self.m12 + p.y * self.m22 + self.dy,
        )
    }

    /// Transform a direction (translation ignored).
    #[inline]
    pub fn apply_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(v.x * self.m11 + v.y * self.m21, v.x * self.m12 + v.y * self.m22)
    }
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// VIEW TRANSFORM
// ============================================================================

/// Target pan/zoom plus the displayed (inertial) values that chase it.
///
/// The view<->canvas transforms are derived from the displayed values only,
/// so discrete input still produces smooth camera motion.
#[derive(Clone, Debug)]
pub struct ViewTransform {
    position: Vec2,
    scale: f32,
    displayed_position: Vec2,
    displayed_scale: f32,
    centered: bool,
    canvas_to_view: Affine2,
    view_to_canvas: Affine2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewTransform {
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: 1.0,
            displayed_position: Vec2::ZERO,
            displayed_scale: 1.0,
            centered: true,
            canvas_to_view: Affine2::IDENTITY,
            view_to_canvas: Affine2::IDENTITY,
        }
    }

    pub fn pan(&mut self, offset: Vec2) {
        self.centered = false;
        self.position += offset;
    }

    /// Zoom by `factor`, keeping the canvas point under `pivot` (view space)
    /// fixed.
    pub fn scale_by(&mut self, factor: f32, pivot: Pos2) {
        assert!(factor > 0.0 && factor.is_finite(), "scale factor must be positive, got {factor}");
        self.centered = false;
        let new_scale = self.scale * factor;
        let canvas_pivot = self.view_to_canvas.apply(pivot).to_vec2();
        self.position += canvas_pivot * (self.scale - new_scale);
        self.scale = new_scale;
    }

    pub fn set_absolute_scale(&mut self, scale: f32) {
        assert!(scale > 0.0 && scale.is_finite(), "canvas scale must be positive, got {scale}");
        self.centered = false;
        self.scale = scale;
    }

    /// Sticky: every following frame refits the canvas until the next
    /// explicit pan or zoom.
    pub fn center(&mut self) {
        self.centered = true;
    }

    /// Set the target directly.  Clears `centered`.
    pub fn set_target(&mut self, position: Vec2, scale: f32) {
        self.set_absolute_scale(scale);
        self.position = position;
    }

    /// One frame: refit if centered, move the displayed values toward the
    /// target by `inertia`, then rebuild the transforms.
    pub fn step(&mut self, viewport: Vec2, canvas: Vec2, inertia: f32, margin: f32) {
        if self.centered {
            self.fit(viewport, canvas, margin);
        }
        let inertia = inertia.clamp(0.0, 1.0);
        self.displayed_position += (self.position - self.displayed_position) * inertia;
        self.displayed_scale += (self.scale - self.displayed_scale) * inertia;
        self.rebuild();
    }

    /// Jump the displayed values onto the target (refitting first when
    /// centered).
    pub fn snap(&mut self, viewport: Vec2, canvas: Vec2, margin: f32) {
        if self.centered {
            self.fit(viewport, canvas, margin);
        }
        self.displayed_position = self.position;
        self.displayed_scale = self.scale;
        self.rebuild();
    }

    fn fit(&mut self, viewport: Vec2, canvas: Vec2, margin: f32) {
        if viewport.x <= 0.0 || viewport.y <= 0.0 || canvas.x <= 0.0 || canvas.y <= 0.0 {
            return;
        }
        let viewport_aspect = viewport.x / viewport.y;
        let canvas_aspect = canvas.x / canvas.y;
        let scale = if canvas_aspect > viewport_aspect {
            viewport.x * (1.0 - margin) / canvas.x
        } else {
            viewport.y * (1.0 - margin) / canvas.y
        };
        self.position = viewport / 2.0 - canvas / 2.0 * scale;
        self.scale = scale;
    }

    fn rebuild(&mut self) {
        self.canvas_to_view =
            Affine2::scaling(self.displayed_scale).then(&Affine2::translation(self.displayed_position));
        self.view_to_canvas = Affine2::translation(-self.displayed_position)
            .then(&Affine2::scaling(1.0 / self.displayed_scale));
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn target_scale(&self) -> f32 {
        self.scale
    }

    pub fn displayed_position(&self) -> Vec2 {
        self.displayed_position
    }

    /// Displayed scale (what the user sees this frame).
    pub fn scale(&self) -> f32 {
        self.displayed_scale
    }

    pub fn is_centered(&self) -> bool {
        self.centered
    }

    pub fn canvas_to_view(&self) -> Affine2 {
        self.canvas_to_view
    }

    pub fn view_to_canvas(&self) -> Affine2 {
        self.view_to_canvas
    }

    #[inline]
    pub fn to_canvas(&self, view: Pos2) -> Pos2 {
        self.view_to_canvas.apply(view)
    }

    #[inline]
    pub fn to_view(&self, canvas: Pos2) -> Pos2 {
        self.canvas_to_view.apply(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn compose_then_invert_roundtrips_a_point() {
        let m = Affine2::scaling(2.5).then(&Affine2::translation(Vec2::new(10.0, -4.0)));
        let inv = m.inverse().expect("invertible");
        let p = Pos2::new(3.0, 7.0);
        let q = inv.apply(m.apply(p));
        assert!(close(p.x, q.x) && close(p.y, q.y));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        assert!(Affine2::scaling(0.0).inverse().is_none());
    }

    #[test]
    fn pan_clears_centered() {
        let mut view = ViewTransform::new();
        assert!(view.is_centered());
        view.pan(Vec2::new(5.0, 0.0));
        assert!(!view.is_centered());
        assert_eq!(view.position(), Vec2::new(5.0, 0.0));
    }

    #[test]
    fn displayed_values_approach_target_by_inertia() {
        let mut view = ViewTransform::new();
        view.set_target(Vec2::new(100.0, 0.0), 1.0);
        view.step(Vec2::new(800.0, 600.0), Vec2::new(100.0, 100.0), 0.15, 0.1);
        assert!(close(view.displayed_position().x, 15.0));
        view.step(Vec2::new(800.0, 600.0), Vec2::new(100.0, 100.0), 0.15, 0.1);
        assert!(close(view.displayed_position().x, 15.0 + 85.0 * 0.15));
    }

    #[test]
    fn transforms_follow_displayed_values_not_target() {
        let mut view = ViewTransform::new();
        view.snap(Vec2::new(100.0, 100.0), Vec2::new(10.0, 10.0), 0.0);
        view.set_target(Vec2::ZERO, 4.0);
        // No step yet: mapping still reflects the old displayed values.
        let before = view.to_view(Pos2::new(1.0, 1.0));
        view.step(Vec2::new(100.0, 100.0), Vec2::new(10.0, 10.0), 0.5, 0.0);
        let after = view.to_view(Pos2::new(1.0, 1.0));
        assert_ne!(before, after);
        assert!(close(view.scale(), 7.0));
        assert!(close(view.target_scale(), 4.0));
    }

    #[test]
    fn centered_fit_is_height_limited_for_tall_canvas() {
        let mut view = ViewTransform::new();
        view.snap(Vec2::new(800.0, 600.0), Vec2::new(100.0, 200.0), 0.1);
        assert!(close(view.target_scale(), 600.0 * 0.9 / 200.0));
        assert!(close(view.position().x, 400.0 - 50.0 * view.target_scale()));
        assert!(close(view.position().y, 300.0 - 100.0 * view.target_scale()));
    }
}
