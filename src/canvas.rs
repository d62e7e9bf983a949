// ============================================================================
// CANVAS — pixel rectangles, selection and the bounded layer stack
// ============================================================================
//
// Every layer is an opaque device surface of exactly the canvas size.  The
// stack owns those surfaces plus one shared scratch ("temp") surface that
// instruments render previews into before committing them.
// ============================================================================

use egui::{Pos2, Rect};
use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::gpu::{RenderDevice, SurfaceId};
use crate::{log_info, log_warn};

/// Maximum number of layers a canvas can hold.
pub const MAX_LAYERS: usize = 16;

/// Fully transparent black; the initial content of a new layer.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Transparent white; the temp surface is cleared to this before every
/// preview render and before merging.
pub const TEMP_CLEAR: Rgba<u8> = Rgba([255, 255, 255, 0]);

// ============================================================================
// PIXEL RECT
// ============================================================================

/// Half-open integer rectangle `[left, right) x [top, bottom)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width as i32, y + height as i32)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// `(width, height)`, with negative extents reported as zero.
    pub fn size(&self) -> (u32, u32) {
        (self.width().max(0) as u32, self.height().max(0) as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Overlap of two rectangles.  Disjoint inputs give an empty rect anchored
    /// at the clamped corner, never an inverted one.
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right).max(left);
        let bottom = self.bottom.min(other.bottom).max(top);
        PixelRect::new(left, top, right, bottom)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn contains_rect(&self, other: &PixelRect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    pub fn translate(&self, dx: i32, dy: i32) -> PixelRect {
        PixelRect::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_min_max(
            Pos2::new(self.left as f32, self.top as f32),
            Pos2::new(self.right as f32, self.bottom as f32),
        )
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Axis-aligned canvas-space selection.  Always satisfies
/// `0 <= left <= right <= width` and `0 <= top <= bottom <= height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    rect: PixelRect,
}

impl Selection {
    /// The whole canvas.
    pub fn full(width: u32, height: u32) -> Self {
        Self { rect: PixelRect::from_size(width, height) }
    }

    /// Normalized bounding box of two corners, clamped to the canvas.
    /// Identical corners select the whole canvas.
    pub fn from_corners(a: [i32; 2], b: [i32; 2], width: u32, height: u32) -> Self {
        let clamp = |c: [i32; 2]| [c[0].clamp(0, width as i32), c[1].clamp(0, height as i32)];
        let (a, b) = (clamp(a), clamp(b));
        if a == b {
            return Self::full(width, height);
        }
        Self {
            rect: PixelRect::new(a[0].min(b[0]), a[1].min(b[1]), a[0].max(b[0]), a[1].max(b[1])),
        }
    }

    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        self.rect == PixelRect::from_size(width, height)
    }
}

// ============================================================================
// LAYER STACK
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layer {
    pub surface: SurfaceId,
    pub visible: bool,
}

/// Ordered, capacity-bounded collection of canvas-sized surfaces.
///
/// `current` always indexes a live layer while the stack is non-empty; every
/// structural edit goes through a method that keeps it consistent.
pub struct LayerStack {
    layers: Vec<Layer>,
    current: usize,
    temp: SurfaceId,
    width: u32,
    height: u32,
}

impl LayerStack {
    pub fn new(device: &mut dyn RenderDevice, width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "canvas size must be positive, got {width}x{height}");
        let temp = device.create_surface(width, height);
        device.clear(temp, TEMP_CLEAR);
        Self {
            layers: Vec::with_capacity(MAX_LAYERS),
            current: 0,
            temp,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The full canvas as a pixel rect.
    pub fn bounds(&self) -> PixelRect {
        PixelRect::from_size(self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.layers.len() >= MAX_LAYERS
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> &Layer {
        self.check_index(index);
        &self.layers[index]
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn set_current(&mut self, index: usize) {
        self.check_index(index);
        self.current = index;
    }

    /// Surface of the active layer, `None` when the stack is empty.
    pub fn active_surface(&self) -> Option<SurfaceId> {
        self.layers.get(self.current).map(|l| l.surface)
    }

    pub fn temp(&self) -> SurfaceId {
        self.temp
    }

    pub fn visible_count(&self) -> usize {
        self.layers.iter().filter(|l| l.visible).count()
    }

    /// Create a blank, visible layer.  `None` appends; `Some(i)` inserts at
    /// `i` and shifts the layers above it.  Returns the new layer's index.
    pub fn create_layer(&mut self, device: &mut dyn RenderDevice, insert_at: Option<usize>) -> usize {
        assert!(!self.is_full(), "layer capacity ({MAX_LAYERS}) exceeded");
        let index = insert_at.unwrap_or(self.layers.len());
        assert!(
            index <= self.layers.len(),
            "invalid layer insert index {index} (layer count {})",
            self.layers.len()
        );

        let surface = device.create_surface(self.width, self.height);
        device.clear(surface, TRANSPARENT);

        let was_empty = self.layers.is_empty();
        self.layers.insert(index, Layer { surface, visible: true });
        if !was_empty && self.current >= index {
            self.current += 1;
        }
        log_info!("Layer created at {} ({} total)", index, self.layers.len());
        index
    }

    /// Destroy a layer and compact the stack.  The active index follows the
    /// layer it pointed at, or steps down when that layer was removed.
    pub fn remove_layer(&mut self, device: &mut dyn RenderDevice, index: usize) {
        self.check_index(index);
        let layer = self.layers.remove(index);
        device.destroy_surface(layer.surface);

        if self.current >= index && self.current > 0 {
            self.current -= 1;
        }
        if self.layers.is_empty() {
            log_warn!("Last layer removed; canvas has no layers");
        } else {
            log_info!("Layer {} removed ({} left)", index, self.layers.len());
        }
    }

    /// Swap two slots.  The active index is positional and does not move.
    pub fn move_layer(&mut self, from: usize, to: usize) {
        self.check_index(from);
        self.check_index(to);
        self.layers.swap(from, to);
        log_info!("Layer {} swapped with {}", from, to);
    }

    pub fn enable_layer(&mut self, index: usize, enabled: bool) {
        self.check_index(index);
        self.layers[index].visible = enabled;
    }

    /// Swap in a freshly created surface for a layer, returning the old one.
    pub(crate) fn replace_surface(&mut self, index: usize, surface: SurfaceId) -> SurfaceId {
        self.check_index(index);
        std::mem::replace(&mut self.layers[index].surface, surface)
    }

    pub(crate) fn replace_temp(&mut self, surface: SurfaceId) -> SurfaceId {
        std::mem::replace(&mut self.temp, surface)
    }

    pub(crate) fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Release every surface owned by the stack.
    pub fn destroy(self, device: &mut dyn RenderDevice) {
        for layer in self.layers {
            device.destroy_surface(layer.surface);
        }
        device.destroy_surface(self.temp);
    }

    fn check_index(&self, index: usize) {
        assert!(
            index < self.layers.len(),
            "invalid layer index {index} (layer count {})",
            self.layers.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareDevice;

    #[test]
    fn intersect_of_disjoint_rects_is_empty() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(20, 20, 30, 30);
        let i = a.intersect(&b);
        assert!(i.is_empty());
        assert!(i.width() >= 0 && i.height() >= 0);
    }

    #[test]
    fn intersect_of_overlapping_rects() {
        let a = PixelRect::new(-10, -10, 90, 90);
        let b = PixelRect::from_size(100, 100);
        assert_eq!(a.intersect(&b), PixelRect::new(0, 0, 90, 90));
    }

    #[test]
    fn selection_corners_are_normalized_and_clamped() {
        let s = Selection::from_corners([30, 5], [-4, 50], 20, 20);
        assert_eq!(s.rect(), PixelRect::new(0, 5, 20, 20));
    }

    #[test]
    fn identical_corners_select_everything() {
        let s = Selection::from_corners([3, 3], [3, 3], 8, 6);
        assert!(s.is_full(8, 6));
    }

    #[test]
    fn insert_below_active_shifts_active_index() {
        let mut device = SoftwareDevice::new();
        let mut stack = LayerStack::new(&mut device, 4, 4);
        stack.create_layer(&mut device, None);
        stack.create_layer(&mut device, None);
        stack.set_current(1);
        let active = stack.active_surface();

        stack.create_layer(&mut device, Some(0));
        assert_eq!(stack.current(), 2);
        assert_eq!(stack.active_surface(), active);
    }

    #[test]
    fn removing_below_active_keeps_same_layer_active() {
        let mut device = SoftwareDevice::new();
        let mut stack = LayerStack::new(&mut device, 4, 4);
        for _ in 0..3 {
            stack.create_layer(&mut device, None);
        }
        stack.set_current(2);
        let active = stack.active_surface();

        stack.remove_layer(&mut device, 0);
        assert_eq!(stack.current(), 1);
        assert_eq!(stack.active_surface(), active);
    }

    #[test]
    fn removing_every_layer_leaves_empty_stack() {
        let mut device = SoftwareDevice::new();
        let mut stack = LayerStack::new(&mut device, 4, 4);
        stack.create_layer(&mut device, None);
        stack.remove_layer(&mut device, 0);
        assert!(stack.is_empty());
        assert_eq!(stack.active_surface(), None);
    }

    #[test]
    #[should_panic(expected = "layer capacity")]
    fn seventeenth_layer_panics() {
        let mut device = SoftwareDevice::new();
        let mut stack = LayerStack::new(&mut device, 2, 2);
        for _ in 0..=MAX_LAYERS {
            stack.create_layer(&mut device, None);
        }
    }

    #[test]
    #[should_panic(expected = "invalid layer index")]
    fn set_current_out_of_range_panics() {
        let mut device = SoftwareDevice::new();
        let mut stack = LayerStack::new(&mut device, 2, 2);
        stack.create_layer(&mut device, None);
        stack.set_current(1);
    }
}
