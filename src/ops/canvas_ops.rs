// ============================================================================
// CANVAS OPS — whole-canvas reflows of the layer stack
// ============================================================================

use image::Rgba;

use crate::canvas::{LayerStack, PixelRect, TEMP_CLEAR};
use crate::gpu::RenderDevice;
use crate::log_info;

/// Recreate every layer and the temp surface at `width` x `height`.  Old
/// contents are dropped; new contents are whatever the device gives a fresh
/// surface.
pub fn resize_discarding_contents(device: &mut dyn RenderDevice, layers: &mut LayerStack, width: u32, height: u32) {
    assert!(width > 0 && height > 0, "canvas size must be positive, got {width}x{height}");
    let (old_w, old_h) = layers.size();

    for i in 0..layers.len() {
        let fresh = device.create_surface(width, height);
        let old = layers.replace_surface(i, fresh);
        device.destroy_surface(old);
    }
    recreate_temp(device, layers, width, height);
    layers.set_size(width, height);

    log_info!("Canvas resized {}x{} -> {}x{} (contents discarded)", old_w, old_h, width, height);
}

/// Re-frame the canvas onto `new_rect`, given in current canvas coordinates.
/// The rect may extend past any edge or have a negative origin.  Content in
/// the overlap keeps its canvas position relative to the new origin; exposed
/// area is filled with `fill`.  Returns `false` when `new_rect` already is
/// the canvas and nothing was touched.
pub fn resize_saving_contents(
    device: &mut dyn RenderDevice,
    layers: &mut LayerStack,
    new_rect: PixelRect,
    fill: Rgba<u8>,
) -> bool {
    let old = layers.bounds();
    if new_rect == old {
        return false;
    }
    assert!(
        new_rect.width() > 0 && new_rect.height() > 0,
        "resize rect must have positive size, got {new_rect:?}"
    );

    let (width, height) = new_rect.size();
    let copied = new_rect.intersect(&old);
    // Where the preserved region lands inside the new canvas.
    let location = (copied.left - new_rect.left, copied.top - new_rect.top);
    let temp = layers.temp();

    if copied.is_empty() {
        for i in 0..layers.len() {
            let fresh = device.create_surface(width, height);
            device.clear(fresh, fill);
            let old_surface = layers.replace_surface(i, fresh);
            device.destroy_surface(old_surface);
        }
    } else {
        let exposed = copied.size() != (width, height);
        let staged = PixelRect::from_size(copied.size().0, copied.size().1);
        for i in 0..layers.len() {
            let src = layers.layer(i).surface;
            device.copy_region(temp, (0, 0), src, copied);

            let fresh = device.create_surface(width, height);
            if exposed {
                device.clear(fresh, fill);
            }
            device.copy_region(fresh, location, temp, staged);

            let old_surface = layers.replace_surface(i, fresh);
            device.destroy_surface(old_surface);
        }
    }

    recreate_temp(device, layers, width, height);
    layers.set_size(width, height);

    log_info!(
        "Canvas resized {}x{} -> {}x{} (preserved {:?} at {:?})",
        old.width(),
        old.height(),
        width,
        height,
        copied,
        location
    );
    true
}

fn recreate_temp(device: &mut dyn RenderDevice, layers: &mut LayerStack, width: u32, height: u32) {
    let temp = device.create_surface(width, height);
    device.clear(temp, TEMP_CLEAR);
    let old = layers.replace_temp(temp);
    device.destroy_surface(old);
}
