#![allow(dead_code)]

use brushwork::{CanvasManager, PixelRect, SoftwareDevice};
use egui::Pos2;
use image::Rgba;

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub type Engine = CanvasManager<SoftwareDevice>;

/// Engine whose view maps canvas pixels 1:1 onto viewport pixels.
pub fn engine(width: u32, height: u32) -> Engine {
    let mut m = CanvasManager::new(SoftwareDevice::new(), width, height);
    m.set_absolute_canvas_scale(1.0);
    m.snap_view(PixelRect::from_size(width, height));
    m
}

/// Same as [`engine`] with one layer filled with `color`.
pub fn engine_with_layer(width: u32, height: u32, color: Rgba<u8>) -> Engine {
    let mut m = engine(width, height);
    m.create_layer(None);
    m.clear_layer(0, color);
    m
}

pub fn viewport(m: &Engine) -> PixelRect {
    let (w, h) = m.canvas_size();
    PixelRect::from_size(w, h)
}

/// Report the pointer and run one update.
pub fn frame(m: &mut Engine, x: f32, y: f32, active: bool) {
    m.set_pointer_state(Pos2::new(x, y), active);
    let vp = viewport(m);
    m.update(vp);
}

pub fn layer_pixel(m: &Engine, index: usize, x: u32, y: u32) -> Rgba<u8> {
    m.device().pixel(m.layers().layer(index).surface, x, y)
}

pub fn temp_pixel(m: &Engine, x: u32, y: u32) -> Rgba<u8> {
    m.device().pixel(m.layers().temp(), x, y)
}

pub fn layer_bytes(m: &Engine, index: usize) -> Vec<u8> {
    m.device().surface(m.layers().layer(index).surface).as_raw().clone()
}

/// Tightly packed buffer where pixel (x, y) is `[x, y, 0, 255]`.
pub fn coordinate_pattern(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[x as u8, y as u8, 0, 255]);
        }
    }
    data
}
