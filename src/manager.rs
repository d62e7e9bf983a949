// ============================================================================
// CANVAS MANAGER — owns the engine state and drives update-then-draw frames
// ============================================================================
//
// The host feeds pointer state and commands in, then calls `update` and
// `draw` once per frame.  Instruments only ever see a `ToolContext` built
// from disjoint borrows of the manager's fields.
// ============================================================================

use egui::{Pos2, Vec2};
use image::Rgba;

use crate::canvas::{LayerStack, PixelRect, Selection, TRANSPARENT};
use crate::gpu::compositor::{FrameParams, PreviewDisplay};
use crate::gpu::{Compositor, GeometryBatcher, RenderDevice, SurfaceId, register_builtin_effects, required_len};
use crate::ops::canvas_ops;
use crate::settings::EngineSettings;
use crate::tools::{
    BrightnessContrastGammaSettings, BrushSettings, GaussianBlurSettings, Instrument, InstrumentKind,
    InstrumentSettings, LineSettings, PencilSettings, PointerState, SettingsBank, ShapeSettings, SharpenSettings,
    ToolContext,
};
use crate::view::ViewTransform;
use crate::{log_info, log_warn};

/// Build a `ToolContext` from the manager's fields, leaving `instrument`
/// free to be borrowed mutably alongside it.
macro_rules! tool_context {
    ($m:expr) => {
        ToolContext {
            device: &mut $m.device,
            batcher: &mut $m.batcher,
            compositor: &$m.compositor,
            layers: &$m.layers,
            selection: &mut $m.selection,
            view: &$m.view,
            pointer: &$m.pointer,
            display: &mut $m.display,
            settings: &$m.instrument_settings,
            engine: &$m.settings,
            preview_generation: &mut $m.preview_generation,
        }
    };
}

pub struct CanvasManager<D: RenderDevice> {
    device: D,
    settings: EngineSettings,
    batcher: GeometryBatcher,
    compositor: Compositor,
    layers: LayerStack,
    selection: Selection,
    view: ViewTransform,
    pointer: PointerState,
    display: PreviewDisplay,
    instrument: Instrument,
    instrument_settings: SettingsBank,
    preview_generation: u64,
}

impl<D: RenderDevice> CanvasManager<D> {
    /// Engine with default settings and an empty `width` x `height` canvas.
    pub fn new(device: D, width: u32, height: u32) -> Self {
        Self::with_settings(device, width, height, EngineSettings::default())
    }

    pub fn with_settings(mut device: D, width: u32, height: u32, settings: EngineSettings) -> Self {
        register_builtin_effects(&mut device);
        let batcher = GeometryBatcher::new(&mut device, settings.vertex_buffer_bytes);
        let compositor = Compositor::new(&mut device);
        let layers = LayerStack::new(&mut device, width, height);
        log_info!("Canvas manager initialised: {}x{}", width, height);

        Self {
            device,
            settings,
            batcher,
            compositor,
            layers,
            selection: Selection::full(width, height),
            view: ViewTransform::new(),
            pointer: PointerState::default(),
            display: PreviewDisplay::default(),
            instrument: Instrument::None,
            instrument_settings: SettingsBank::default(),
            preview_generation: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    /// Release every surface the engine owns and hand the device back.
    pub fn into_device(self) -> D {
        let mut device = self.device;
        self.layers.destroy(&mut device);
        device
    }

    // ========================================================================
    // CANVAS SIZE
    // ========================================================================

    pub fn canvas_size(&self) -> (u32, u32) {
        self.layers.size()
    }

    /// Recreate all surfaces at the new size; contents are lost.
    pub fn resize_discarding_contents(&mut self, width: u32, height: u32) {
        canvas_ops::resize_discarding_contents(&mut self.device, &mut self.layers, width, height);
        self.after_resize();
    }

    /// Re-frame the canvas onto `rect` (current canvas coordinates), keeping
    /// the overlapping content and filling exposed area with `fill`.
    /// Returns `false` when `rect` already is the canvas.
    pub fn resize_saving_contents(&mut self, rect: PixelRect, fill: Rgba<u8>) -> bool {
        let changed = canvas_ops::resize_saving_contents(&mut self.device, &mut self.layers, rect, fill);
        if changed {
            self.after_resize();
        }
        changed
    }

    /// Crop every layer to the current selection.
    pub fn crop_to_selection(&mut self) -> bool {
        let rect = self.selection.rect();
        self.resize_saving_contents(rect, TRANSPARENT)
    }

    fn after_resize(&mut self) {
        let (width, height) = self.layers.size();
        self.selection = Selection::full(width, height);
        self.instrument.invalidate();
    }

    // ========================================================================
    // FRAME
    // ========================================================================

    /// Advance one frame: pan or drive the active instrument from the
    /// pointer, then move the view toward its target.  `viewport` is the
    /// host's drawing area; pointer positions are relative to its origin.
    pub fn update(&mut self, viewport: PixelRect) {
        if self.pointer.pan_mode {
            let delta = self.pointer.position - self.pointer.prev_position;
            if delta != Vec2::ZERO {
                self.view.pan(delta);
            }
        } else {
            let mut ctx = tool_context!(self);
            self.instrument.update(&mut ctx);
        }

        let (vw, vh) = viewport.size();
        let (cw, ch) = self.layers.size();
        self.view.step(
            Vec2::new(vw as f32, vh as f32),
            Vec2::new(cw as f32, ch as f32),
            self.settings.view_inertia,
            self.settings.centered_view_margin,
        );

        self.pointer.prev_position = self.pointer.position;
        self.pointer.prev_active = self.pointer.active;
    }

    /// Composite the canvas into `viewport` of `target`.
    pub fn draw(&mut self, target: SurfaceId, viewport: PixelRect) {
        let frame = FrameParams {
            target,
            viewport,
            canvas_to_view: self.view.canvas_to_view(),
            layers: &self.layers,
            display: self.display,
            selection: self.selection.rect(),
            settings: &self.settings,
        };
        self.compositor.draw_frame(&mut self.device, &mut self.batcher, &frame);
    }

    pub fn update_and_draw(&mut self, target: SurfaceId, viewport: PixelRect) {
        self.update(viewport);
        self.draw(target, viewport);
    }

    // ========================================================================
    // POINTER & SELECTION
    // ========================================================================

    /// Latest pointer position (viewport-relative view space) and primary
    /// button state.
    pub fn set_pointer_state(&mut self, position: Pos2, active: bool) {
        self.pointer.position = position;
        self.pointer.active = active;
    }

    pub fn enable_pointer_pan_view_mode(&mut self, enabled: bool) {
        self.pointer.pan_mode = enabled;
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn canvas_space_pointer_position(&self) -> Pos2 {
        self.view.to_canvas(self.pointer.position)
    }

    pub fn selection(&self) -> PixelRect {
        self.selection.rect()
    }

    /// Select the rectangle spanned by `rect`'s corners, clamped to the
    /// canvas.  A zero-area rect selects everything.  Previews are clipped
    /// to the selection, so a live one re-renders.
    pub fn set_selection(&mut self, rect: PixelRect) {
        let (width, height) = self.layers.size();
        self.selection = Selection::from_corners([rect.left, rect.top], [rect.right, rect.bottom], width, height);
        self.instrument.invalidate();
    }

    pub fn reset_selection(&mut self) {
        let (width, height) = self.layers.size();
        self.selection = Selection::full(width, height);
        self.instrument.invalidate();
    }

    // ========================================================================
    // LAYERS
    // ========================================================================

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn current_layer(&self) -> usize {
        self.layers.current()
    }

    pub fn is_layer_enabled(&self, index: usize) -> bool {
        self.layers.layer(index).visible
    }

    /// New transparent layer; `None` appends on top.  Returns its index.
    pub fn create_layer(&mut self, insert_at: Option<usize>) -> usize {
        let was_empty = self.layers.is_empty();
        let index = self.layers.create_layer(&mut self.device, insert_at);
        if was_empty {
            self.instrument.invalidate();
        }
        index
    }

    pub fn remove_layer(&mut self, index: usize) {
        let was_current = index == self.layers.current();
        self.layers.remove_layer(&mut self.device, index);
        if was_current {
            self.instrument.invalidate();
        }
    }

    pub fn move_layer(&mut self, from: usize, to: usize) {
        self.layers.move_layer(from, to);
        self.instrument.invalidate();
    }

    pub fn enable_layer(&mut self, index: usize, enabled: bool) {
        self.layers.enable_layer(index, enabled);
    }

    /// Make `index` the active layer.  A live preview re-renders from it.
    pub fn set_current_layer(&mut self, index: usize) {
        self.layers.set_current(index);
        self.instrument.invalidate();
    }

    pub fn clear_layer(&mut self, index: usize, color: Rgba<u8>) {
        let surface = self.layers.layer(index).surface;
        self.device.clear(surface, color);
        self.mark_layer_changed(index);
    }

    /// Write RGBA8 rows into `region` of a layer.  `stride` is the byte
    /// distance between rows (0 = tightly packed).  Empty data is a no-op.
    pub fn upload_layer_region(&mut self, index: usize, region: PixelRect, data: &[u8], stride: usize) {
        let surface = self.layers.layer(index).surface;
        if data.is_empty() {
            log_warn!("Upload to layer {} skipped: no pixel data", index);
            return;
        }
        self.device.upload_pixels(surface, region, data, stride);
        self.mark_layer_changed(index);
    }

    pub fn download_layer_region(&mut self, index: usize, region: PixelRect, data: &mut [u8], stride: usize) {
        let surface = self.layers.layer(index).surface;
        self.device.download_pixels(surface, region, data, stride);
    }

    /// Flatten the visible layers into `data` (whole canvas, RGBA8).  Any
    /// pending instrument edit is applied first and the instrument reset.
    pub fn download_merged_layers(&mut self, data: &mut [u8], stride: usize) {
        self.apply_instrument();
        self.reset_instrument();

        let canvas = self.layers.bounds();
        let (width, height) = canvas.size();
        let row_bytes = width as usize * 4;
        let stride = if stride == 0 { row_bytes } else { stride };
        assert!(
            data.len() >= required_len(width as usize, height as usize, stride),
            "pixel buffer too small for the {width}x{height} canvas"
        );

        let visible: Vec<SurfaceId> = self.layers.layers().iter().filter(|l| l.visible).map(|l| l.surface).collect();
        match visible.as_slice() {
            [] => {
                for row in 0..height as usize {
                    data[row * stride..row * stride + row_bytes].fill(0);
                }
            }
            [only] => self.device.download_pixels(*only, canvas, data, stride),
            _ => {
                self.compositor.merge_visible_into_temp(&mut self.device, &self.layers);
                self.device.download_pixels(self.layers.temp(), canvas, data, stride);
            }
        }
    }

    fn mark_layer_changed(&mut self, index: usize) {
        if index == self.layers.current() {
            self.instrument.invalidate();
        }
    }

    // ========================================================================
    // VIEW
    // ========================================================================

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Displayed canvas scale.
    pub fn canvas_scale(&self) -> f32 {
        self.view.scale()
    }

    pub fn pan_view(&mut self, offset: Vec2) {
        self.view.pan(offset);
    }

    /// Zoom by `factor` around the pointer.
    pub fn scale_view(&mut self, factor: f32) {
        self.view.scale_by(factor, self.pointer.position);
    }

    pub fn set_absolute_canvas_scale(&mut self, scale: f32) {
        self.view.set_absolute_scale(scale);
    }

    pub fn center_view(&mut self) {
        self.view.center();
    }

    /// Skip the inertia: show the target view immediately.
    pub fn snap_view(&mut self, viewport: PixelRect) {
        let (vw, vh) = viewport.size();
        let (cw, ch) = self.layers.size();
        self.view.snap(
            Vec2::new(vw as f32, vh as f32),
            Vec2::new(cw as f32, ch as f32),
            self.settings.centered_view_margin,
        );
    }

    // ========================================================================
    // INSTRUMENTS
    // ========================================================================

    pub fn instrument(&self) -> InstrumentKind {
        self.instrument.kind()
    }

    pub fn instrument_state(&self) -> &Instrument {
        &self.instrument
    }

    /// Copy of the active instrument's settings.
    pub fn instrument_settings(&self) -> Option<InstrumentSettings> {
        self.instrument_settings.get(self.instrument.kind())
    }

    /// Remembered settings of any kind, active or not.
    pub fn settings_for(&self, kind: InstrumentKind) -> Option<InstrumentSettings> {
        self.instrument_settings.get(kind)
    }

    /// Store new settings for their kind.  If that kind is active its preview
    /// goes out of date.
    pub fn update_instrument_settings(&mut self, settings: InstrumentSettings) {
        self.instrument_settings.store(settings);
        if settings.kind() == self.instrument.kind() {
            self.instrument.invalidate();
        }
    }

    /// Activate `kind` with fresh interaction state and its remembered
    /// settings.
    pub fn select_instrument(&mut self, kind: InstrumentKind) {
        self.instrument = Instrument::for_kind(kind);
        self.display = self.instrument.initial_display();
        log_info!("Instrument: {}", kind.label());
    }

    pub fn set_instrument_selection(&mut self) {
        self.select_instrument(InstrumentKind::Selection);
    }

    pub fn set_instrument_pencil(&mut self, settings: PencilSettings) {
        self.activate_with(InstrumentSettings::Pencil(settings));
    }

    pub fn set_instrument_brush(&mut self, settings: BrushSettings) {
        self.activate_with(InstrumentSettings::Brush(settings));
    }

    pub fn set_instrument_line(&mut self, settings: LineSettings) {
        self.activate_with(InstrumentSettings::Line(settings));
    }

    pub fn set_instrument_shape(&mut self, settings: ShapeSettings) {
        self.activate_with(InstrumentSettings::Shape(settings));
    }

    pub fn set_instrument_brightness_contrast_gamma_filter(&mut self, settings: BrightnessContrastGammaSettings) {
        self.activate_with(InstrumentSettings::BrightnessContrastGamma(settings));
    }

    pub fn set_instrument_gaussian_blur_filter(&mut self, settings: GaussianBlurSettings) {
        self.activate_with(InstrumentSettings::GaussianBlur(settings));
    }

    pub fn set_instrument_sharpen_filter(&mut self, settings: SharpenSettings) {
        self.activate_with(InstrumentSettings::Sharpen(settings));
    }

    fn activate_with(&mut self, settings: InstrumentSettings) {
        self.instrument_settings.store(settings);
        self.select_instrument(settings.kind());
    }

    /// Drop any uncommitted preview and deactivate the instrument.
    pub fn reset_instrument(&mut self) {
        self.instrument = Instrument::None;
        self.display = PreviewDisplay::default();
    }

    /// Commit the active instrument's pending edit.  Filters fall back to no
    /// instrument afterwards.
    pub fn apply_instrument(&mut self) {
        let mut ctx = tool_context!(self);
        let done = self.instrument.apply(&mut ctx);
        if done {
            self.reset_instrument();
        }
    }

    pub fn preview_display(&self) -> PreviewDisplay {
        self.display
    }

    /// Number of preview renders into temp so far.
    pub fn preview_generation(&self) -> u64 {
        self.preview_generation
    }
}
