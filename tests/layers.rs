mod common;

use brushwork::tools::{BrightnessContrastGammaSettings, LineSettings};
use brushwork::{InstrumentKind, MAX_LAYERS, PixelRect, RenderDevice};
use common::*;
use egui::Vec2;
use image::Rgba;

// ----------------------------------------------------------------------------
// Merged download
// ----------------------------------------------------------------------------

#[test]
fn merged_download_with_no_visible_layers_is_zeroed() {
    let mut m = engine_with_layer(4, 4, RED);
    m.create_layer(None);
    m.enable_layer(0, false);
    m.enable_layer(1, false);

    let mut data = vec![0xABu8; 4 * 4 * 4];
    m.download_merged_layers(&mut data, 0);
    assert!(data.iter().all(|&b| b == 0));
}

#[test]
fn merged_download_of_empty_stack_is_zeroed() {
    let mut m = engine(3, 3);
    let mut data = vec![0xABu8; 3 * 3 * 4];
    m.download_merged_layers(&mut data, 0);
    assert!(data.iter().all(|&b| b == 0));
}

#[test]
fn merged_download_of_single_visible_layer_is_exact() {
    let mut m = engine(5, 3);
    m.create_layer(None);
    m.create_layer(None);
    m.upload_layer_region(0, PixelRect::from_size(5, 3), &coordinate_pattern(5, 3), 0);
    m.clear_layer(1, BLUE);
    m.enable_layer(1, false);

    let mut data = vec![0u8; 5 * 3 * 4];
    m.download_merged_layers(&mut data, 0);
    assert_eq!(data, coordinate_pattern(5, 3));
}

#[test]
fn merged_download_blends_layers_bottom_to_top() {
    let mut m = engine_with_layer(4, 4, RED);
    m.create_layer(None);
    m.upload_layer_region(1, PixelRect::new(1, 1, 2, 2), &BLUE.0, 0);

    let mut data = vec![0u8; 4 * 4 * 4];
    m.download_merged_layers(&mut data, 0);
    let px = |x: usize, y: usize| &data[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
    assert_eq!(px(1, 1), &BLUE.0);
    assert_eq!(px(0, 0), &RED.0);
    assert_eq!(px(3, 2), &RED.0);
}

#[test]
fn merged_download_honours_row_stride() {
    let mut m = engine_with_layer(3, 2, GREEN);
    let stride = 16;
    let mut data = vec![7u8; stride + 12];
    m.download_merged_layers(&mut data, stride);

    assert_eq!(&data[0..4], &GREEN.0);
    assert_eq!(&data[8..12], &GREEN.0);
    assert_eq!(&data[12..16], &[7, 7, 7, 7]);
    assert_eq!(&data[16..20], &GREEN.0);
}

#[test]
#[should_panic(expected = "pixel buffer too small")]
fn merged_download_rejects_short_buffer() {
    let mut m = engine_with_layer(4, 4, RED);
    let mut data = vec![0u8; 10];
    m.download_merged_layers(&mut data, 0);
}

#[test]
fn merged_download_applies_pending_shape() {
    let mut m = engine(10, 10);
    m.create_layer(None);
    m.set_instrument_line(LineSettings { color: BLUE, width: 2.0, rounded_start: false, rounded_end: false });
    frame(&mut m, 1.0, 4.0, true);
    frame(&mut m, 8.0, 4.0, true);

    let mut data = vec![0u8; 10 * 10 * 4];
    m.download_merged_layers(&mut data, 0);
    let at = (4 * 10 + 4) * 4;
    assert_eq!(&data[at..at + 4], &BLUE.0);
    assert_eq!(layer_pixel(&m, 0, 4, 4), BLUE);
    assert_eq!(m.instrument(), InstrumentKind::None);
}

// ----------------------------------------------------------------------------
// Stack structure
// ----------------------------------------------------------------------------

#[test]
fn insert_below_current_shifts_active_index() {
    let mut m = engine(4, 4);
    for expected in 0..3 {
        assert_eq!(m.create_layer(None), expected);
    }
    m.set_current_layer(2);
    let top = m.layers().layer(2).surface;

    assert_eq!(m.create_layer(Some(0)), 0);
    assert_eq!(m.layer_count(), 4);
    assert_eq!(m.current_layer(), 3);
    assert_eq!(m.layers().layer(3).surface, top);
}

#[test]
fn insert_above_current_keeps_active_index() {
    let mut m = engine(4, 4);
    m.create_layer(None);
    m.create_layer(None);
    m.set_current_layer(0);
    m.create_layer(Some(1));
    assert_eq!(m.current_layer(), 0);
}

#[test]
fn removing_layers_keeps_active_index_valid() {
    let mut m = engine(4, 4);
    for _ in 0..4 {
        m.create_layer(None);
    }
    let second = m.layers().layer(1).surface;
    m.set_current_layer(3);

    m.remove_layer(3);
    assert_eq!(m.current_layer(), 2);

    m.remove_layer(0);
    assert_eq!(m.current_layer(), 1);
    assert_eq!(m.layers().layer(0).surface, second);

    m.remove_layer(0);
    m.remove_layer(0);
    assert_eq!(m.layer_count(), 0);
    assert_eq!(m.current_layer(), 0);
    assert!(m.layers().active_surface().is_none());
}

#[test]
fn removed_surfaces_are_released() {
    let mut m = engine(4, 4);
    m.create_layer(None);
    m.create_layer(None);
    let gone = m.layers().layer(0).surface;
    let alive = m.device().stats().surfaces_alive;

    m.remove_layer(0);
    assert!(!m.device().is_alive(gone));
    assert_eq!(m.device().stats().surfaces_alive, alive - 1);
}

#[test]
fn capacity_allows_exactly_max_layers() {
    let mut m = engine(2, 2);
    for i in 0..MAX_LAYERS {
        assert_eq!(m.create_layer(None), i);
    }
    assert!(m.layers().is_full());
}

#[test]
#[should_panic(expected = "layer capacity")]
fn creating_past_capacity_panics() {
    let mut m = engine(2, 2);
    for _ in 0..=MAX_LAYERS {
        m.create_layer(None);
    }
}

#[test]
#[should_panic(expected = "invalid layer index")]
fn out_of_range_index_panics() {
    let mut m = engine(2, 2);
    m.create_layer(None);
    m.set_current_layer(1);
}

#[test]
fn move_swaps_slots_and_keeps_active_position() {
    let mut m = engine(4, 4);
    for _ in 0..3 {
        m.create_layer(None);
    }
    let (a, c) = (m.layers().layer(0).surface, m.layers().layer(2).surface);
    m.set_current_layer(0);
    m.move_layer(0, 2);

    assert_eq!(m.layers().layer(0).surface, c);
    assert_eq!(m.layers().layer(2).surface, a);
    assert_eq!(m.current_layer(), 0);
}

#[test]
fn hidden_layers_keep_their_pixels() {
    let mut m = engine_with_layer(2, 2, RED);
    m.enable_layer(0, false);
    assert!(!m.is_layer_enabled(0));
    m.enable_layer(0, true);
    assert!(m.is_layer_enabled(0));
    assert_eq!(layer_pixel(&m, 0, 1, 1), RED);
}

#[test]
fn region_upload_and_download_use_stride() {
    let mut m = engine(4, 4);
    m.create_layer(None);
    let region = PixelRect::new(1, 1, 3, 3);
    let mut src = vec![0u8; 12 * 2];
    src[0..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    src[12..20].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
    m.upload_layer_region(0, region, &src, 12);

    assert_eq!(layer_pixel(&m, 0, 2, 2), Rgba([13, 14, 15, 16]));
    let mut out = vec![0u8; 16];
    m.download_layer_region(0, region, &mut out, 0);
    assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
}

#[test]
fn empty_upload_is_ignored() {
    let mut m = engine_with_layer(2, 2, RED);
    m.upload_layer_region(0, PixelRect::from_size(2, 2), &[], 0);
    assert_eq!(layer_pixel(&m, 0, 0, 0), RED);
}

#[test]
fn releasing_the_engine_frees_every_surface() {
    let mut m = engine(4, 4);
    m.create_layer(None);
    m.create_layer(None);
    assert_eq!(m.device().stats().surfaces_alive, 3);
    let device = m.into_device();
    assert_eq!(device.stats().surfaces_alive, 0);
}

// ----------------------------------------------------------------------------
// Display composite
// ----------------------------------------------------------------------------

/// 4x4 canvas shown at scale 1, offset by (2,2), in an 8x8 target.
fn displayed(color: Rgba<u8>) -> (Engine, brushwork::SurfaceId) {
    let mut m = engine_with_layer(4, 4, color);
    m.pan_view(Vec2::new(2.0, 2.0));
    m.snap_view(PixelRect::from_size(8, 8));
    let target = m.device_mut().create_surface(8, 8);
    (m, target)
}

const VIEWPORT: PixelRect = PixelRect::new(0, 0, 8, 8);

#[test]
fn frame_places_layers_through_the_view() {
    let (mut m, target) = displayed(GREEN);
    m.draw(target, VIEWPORT);

    assert_eq!(m.device().pixel(target, 3, 3), GREEN);
    assert_eq!(m.device().pixel(target, 5, 5), GREEN);
    assert_ne!(m.device().pixel(target, 0, 0), GREEN);
    assert_ne!(m.device().pixel(target, 7, 7), GREEN);
}

#[test]
fn checkerboard_shows_through_transparent_canvas() {
    let (mut m, target) = displayed(CLEAR);
    m.draw(target, VIEWPORT);
    assert_eq!(m.device().pixel(target, 2, 2), WHITE);
}

#[test]
fn hidden_layers_are_not_composited() {
    let (mut m, target) = displayed(GREEN);
    m.enable_layer(0, false);
    m.draw(target, VIEWPORT);
    assert_eq!(m.device().pixel(target, 3, 3), WHITE);
}

#[test]
fn filter_preview_replaces_active_layer_on_screen() {
    let (mut m, target) = displayed(Rgba([10, 20, 30, 255]));
    m.set_instrument_brightness_contrast_gamma_filter(BrightnessContrastGammaSettings {
        brightness: 1.0,
        contrast: 1.0,
        gamma: 1.0,
    });
    m.update_and_draw(target, VIEWPORT);
    assert_eq!(m.device().pixel(target, 3, 3), WHITE);
    // The layer itself is untouched until apply.
    assert_eq!(layer_pixel(&m, 0, 1, 1), Rgba([10, 20, 30, 255]));
}

#[test]
fn area_outside_selection_is_shaded() {
    let (mut m, target) = displayed(GREEN);
    m.set_selection(PixelRect::new(0, 0, 2, 4));
    m.draw(target, VIEWPORT);

    assert_eq!(m.device().pixel(target, 3, 3), GREEN);
    let shaded = m.device().pixel(target, 5, 3);
    assert_ne!(shaded, GREEN);
    assert!(shaded[2] > 0, "selection shade should tint toward blue: {shaded:?}");
}
