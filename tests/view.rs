mod common;

use brushwork::tools::BrushSettings;
use brushwork::{CanvasManager, PixelRect, SoftwareDevice};
use common::*;
use egui::{Pos2, Vec2};

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn new_engine_starts_centered() {
    let m = CanvasManager::new(SoftwareDevice::new(), 10, 10);
    assert!(m.view().is_centered());
}

#[test]
fn centered_view_fits_wide_canvas_by_width() {
    let mut m = CanvasManager::new(SoftwareDevice::new(), 100, 50);
    m.center_view();
    m.snap_view(PixelRect::from_size(200, 200));

    assert!(close(m.canvas_scale(), 1.8));
    let p = m.view().position();
    assert!(close(p.x, 10.0) && close(p.y, 55.0), "{p:?}");
}

#[test]
fn centered_view_refits_when_viewport_changes() {
    let mut m = CanvasManager::new(SoftwareDevice::new(), 100, 100);
    m.snap_view(PixelRect::from_size(200, 200));
    assert!(close(m.canvas_scale(), 1.8));
    m.snap_view(PixelRect::from_size(400, 100));
    assert!(close(m.canvas_scale(), 0.9));
    assert!(m.view().is_centered());
}

#[test]
fn pan_and_zoom_leave_centered_mode() {
    let mut m = engine(10, 10);
    m.center_view();
    m.pan_view(Vec2::new(3.0, 0.0));
    assert!(!m.view().is_centered());

    m.center_view();
    m.scale_view(2.0);
    assert!(!m.view().is_centered());
}

#[test]
fn zoom_keeps_canvas_point_under_pointer() {
    let mut m = engine(10, 10);
    m.set_pointer_state(Pos2::new(4.0, 6.0), false);
    let before = m.canvas_space_pointer_position();

    m.scale_view(2.0);
    m.snap_view(viewport(&m));
    let after = m.canvas_space_pointer_position();
    assert!(close(before.x, after.x) && close(before.y, after.y), "{before:?} vs {after:?}");
    assert!(close(m.canvas_scale(), 2.0));
}

#[test]
fn pointer_maps_through_pan_and_scale() {
    let mut m = engine(10, 10);
    m.set_absolute_canvas_scale(2.0);
    m.pan_view(Vec2::new(2.0, 2.0));
    m.snap_view(viewport(&m));
    m.set_pointer_state(Pos2::new(6.0, 8.0), false);
    assert_eq!(m.canvas_space_pointer_position(), Pos2::new(2.0, 3.0));
}

#[test]
fn displayed_scale_follows_target_with_inertia() {
    let mut m = engine(10, 10);
    m.set_absolute_canvas_scale(2.0);
    let vp = viewport(&m);

    m.update(vp);
    assert!(close(m.canvas_scale(), 1.15));
    assert!(close(m.view().target_scale(), 2.0));

    for _ in 0..200 {
        m.update(vp);
    }
    assert!(close(m.canvas_scale(), 2.0));
}

#[test]
#[should_panic(expected = "canvas scale must be positive")]
fn zero_scale_is_rejected() {
    let mut m = engine(10, 10);
    m.set_absolute_canvas_scale(0.0);
}

#[test]
fn pan_mode_moves_view_instead_of_painting() {
    let mut m = engine_with_layer(8, 8, RED);
    m.set_instrument_brush(BrushSettings { color: BLUE, width: 3.0, blend_enabled: true });
    m.enable_pointer_pan_view_mode(true);

    frame(&mut m, 1.0, 1.0, true);
    frame(&mut m, 4.0, 5.0, true);
    assert_eq!(m.view().position(), Vec2::new(4.0, 5.0));
    assert!(m.device().surface(m.layers().layer(0).surface).pixels().all(|p| *p == RED));

    // A resting pointer does not pan.
    frame(&mut m, 4.0, 5.0, true);
    assert_eq!(m.view().position(), Vec2::new(4.0, 5.0));
}

#[test]
fn leaving_pan_mode_resumes_the_instrument() {
    let mut m = engine_with_layer(8, 8, RED);
    m.set_instrument_brush(BrushSettings { color: BLUE, width: 2.0, blend_enabled: true });
    m.enable_pointer_pan_view_mode(true);
    frame(&mut m, 0.0, 0.0, true);
    m.enable_pointer_pan_view_mode(false);

    frame(&mut m, 0.0, 4.0, true);
    frame(&mut m, 8.0, 4.0, true);
    assert_eq!(layer_pixel(&m, 0, 4, 4), BLUE);
}
