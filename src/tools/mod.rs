// ============================================================================
// TOOLS — instrument settings and per-instrument interaction state machines
// ============================================================================
//
// Exactly one instrument is active.  Settings live in a `SettingsBank` that
// survives instrument switches; interaction state lives in the `Instrument`
// variant and is rebuilt every time an instrument is (re)selected.
//
//   selection.rs : two-corner rectangle drag
//   freehand.rs  : pencil / brush strokes straight onto the active layer
//   anchored.rs  : line / shape with grabbable anchors and a temp preview
//   filter.rs    : memoized full-canvas filter preview + commit
// ============================================================================

pub mod anchored;
pub mod filter;
pub mod freehand;
pub mod selection;

use egui::Pos2;
use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::{LayerStack, PixelRect, Selection};
use crate::gpu::compositor::PreviewDisplay;
use crate::gpu::{Compositor, GeometryBatcher, RenderDevice};
use crate::ops::shapes::ShapeKind;
use crate::settings::{EngineSettings, rgba_serde};
use crate::view::ViewTransform;

pub use anchored::{Anchor, AnchorPhase, AnchoredShape, AnchoredStyle};
pub use filter::{FilterPass, FilterPreview};
pub use freehand::FreehandStyle;
pub use selection::SelectionDrag;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    #[default]
    None,
    Selection,
    Pencil,
    Brush,
    Line,
    Shape,
    BrightnessContrastGammaFilter,
    GaussianBlurFilter,
    SharpenFilter,
}

impl InstrumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            InstrumentKind::None => "None",
            InstrumentKind::Selection => "Selection",
            InstrumentKind::Pencil => "Pencil",
            InstrumentKind::Brush => "Brush",
            InstrumentKind::Line => "Line",
            InstrumentKind::Shape => "Shape",
            InstrumentKind::BrightnessContrastGammaFilter => "Brightness / Contrast / Gamma",
            InstrumentKind::GaussianBlurFilter => "Gaussian Blur",
            InstrumentKind::SharpenFilter => "Sharpen",
        }
    }

    /// Filter instruments replace the active layer on screen with their
    /// preview.
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            InstrumentKind::BrightnessContrastGammaFilter
                | InstrumentKind::GaussianBlurFilter
                | InstrumentKind::SharpenFilter
        )
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PencilSettings {
    #[serde(with = "rgba_serde")]
    pub color: Rgba<u8>,
}

impl Default for PencilSettings {
    fn default() -> Self {
        Self { color: Rgba([0, 0, 0, 0]) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    #[serde(with = "rgba_serde")]
    pub color: Rgba<u8>,
    pub width: f32,
    /// `false` writes the colour with replace semantics (eraser).
    pub blend_enabled: bool,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self { color: Rgba([0, 0, 0, 0]), width: 5.0, blend_enabled: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    #[serde(with = "rgba_serde")]
    pub color: Rgba<u8>,
    pub width: f32,
    pub rounded_start: bool,
    pub rounded_end: bool,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self { color: Rgba([0, 0, 0, 0]), width: 5.0, rounded_start: false, rounded_end: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeSettings {
    #[serde(with = "rgba_serde")]
    pub fill_color: Rgba<u8>,
    #[serde(with = "rgba_serde")]
    pub border_color: Rgba<u8>,
    pub border_width: f32,
    pub shape: ShapeKind,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            fill_color: Rgba([0, 0, 0, 0]),
            border_color: Rgba([0, 0, 0, 0]),
            border_width: 5.0,
            shape: ShapeKind::Rectangle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessContrastGammaSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub gamma: f32,
}

impl Default for BrightnessContrastGammaSettings {
    fn default() -> Self {
        Self { brightness: 0.0, contrast: 1.0, gamma: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianBlurSettings {
    /// Clamped to 1..=16 when the preview is rendered.
    pub radius: u32,
}

impl Default for GaussianBlurSettings {
    fn default() -> Self {
        Self { radius: 8 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpenSettings {
    /// Saturated to 0..=1 when the preview is rendered.
    pub intensity: f32,
}

impl Default for SharpenSettings {
    fn default() -> Self {
        Self { intensity: 1.0 }
    }
}

/// Settings of one instrument kind, passed by value in and out of the
/// manager.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstrumentSettings {
    Pencil(PencilSettings),
    Brush(BrushSettings),
    Line(LineSettings),
    Shape(ShapeSettings),
    BrightnessContrastGamma(BrightnessContrastGammaSettings),
    GaussianBlur(GaussianBlurSettings),
    Sharpen(SharpenSettings),
}

impl InstrumentSettings {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            InstrumentSettings::Pencil(_) => InstrumentKind::Pencil,
            InstrumentSettings::Brush(_) => InstrumentKind::Brush,
            InstrumentSettings::Line(_) => InstrumentKind::Line,
            InstrumentSettings::Shape(_) => InstrumentKind::Shape,
            InstrumentSettings::BrightnessContrastGamma(_) => InstrumentKind::BrightnessContrastGammaFilter,
            InstrumentSettings::GaussianBlur(_) => InstrumentKind::GaussianBlurFilter,
            InstrumentSettings::Sharpen(_) => InstrumentKind::SharpenFilter,
        }
    }
}

/// Remembered settings for every configurable instrument.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SettingsBank {
    pub pencil: PencilSettings,
    pub brush: BrushSettings,
    pub line: LineSettings,
    pub shape: ShapeSettings,
    pub brightness_contrast_gamma: BrightnessContrastGammaSettings,
    pub gaussian_blur: GaussianBlurSettings,
    pub sharpen: SharpenSettings,
}

impl SettingsBank {
    /// Settings of `kind`; `None` for kinds without settings.
    pub fn get(&self, kind: InstrumentKind) -> Option<InstrumentSettings> {
        Some(match kind {
            InstrumentKind::None | InstrumentKind::Selection => return None,
            InstrumentKind::Pencil => InstrumentSettings::Pencil(self.pencil),
            InstrumentKind::Brush => InstrumentSettings::Brush(self.brush),
            InstrumentKind::Line => InstrumentSettings::Line(self.line),
            InstrumentKind::Shape => InstrumentSettings::Shape(self.shape),
            InstrumentKind::BrightnessContrastGammaFilter => {
                InstrumentSettings::BrightnessContrastGamma(self.brightness_contrast_gamma)
            }
            InstrumentKind::GaussianBlurFilter => InstrumentSettings::GaussianBlur(self.gaussian_blur),
            InstrumentKind::SharpenFilter => InstrumentSettings::Sharpen(self.sharpen),
        })
    }

    pub fn store(&mut self, settings: InstrumentSettings) {
        match settings {
            InstrumentSettings::Pencil(s) => self.pencil = s,
            InstrumentSettings::Brush(s) => self.brush = s,
            InstrumentSettings::Line(s) => self.line = s,
            InstrumentSettings::Shape(s) => self.shape = s,
            InstrumentSettings::BrightnessContrastGamma(s) => self.brightness_contrast_gamma = s,
            InstrumentSettings::GaussianBlur(s) => self.gaussian_blur = s,
            InstrumentSettings::Sharpen(s) => self.sharpen = s,
        }
    }
}

// ============================================================================
// FRAME CONTEXT
// ============================================================================

/// Pointer as last reported by the host, in viewport-relative view space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub position: Pos2,
    pub prev_position: Pos2,
    /// Primary button held.
    pub active: bool,
    pub prev_active: bool,
    /// Secondary button held: the pointer pans the view instead.
    pub pan_mode: bool,
}

/// Everything an instrument may touch during one update.
pub struct ToolContext<'a> {
    pub device: &'a mut dyn RenderDevice,
    pub batcher: &'a mut GeometryBatcher,
    pub compositor: &'a Compositor,
    pub layers: &'a LayerStack,
    pub selection: &'a mut Selection,
    pub view: &'a ViewTransform,
    pub pointer: &'a PointerState,
    pub display: &'a mut PreviewDisplay,
    pub settings: &'a SettingsBank,
    pub engine: &'a EngineSettings,
    pub preview_generation: &'a mut u64,
}

impl ToolContext<'_> {
    pub fn canvas_pointer(&self) -> Pos2 {
        self.view.to_canvas(self.pointer.position)
    }

    pub fn canvas_prev_pointer(&self) -> Pos2 {
        self.view.to_canvas(self.pointer.prev_position)
    }

    pub fn canvas(&self) -> PixelRect {
        self.layers.bounds()
    }

    /// Clear temp and target it with the selection as scissor.
    fn begin_temp_pass(&mut self, blend: bool) {
        let temp = self.layers.temp();
        self.device.clear(temp, crate::canvas::TEMP_CLEAR);
        let (canvas, scissor) = (self.canvas(), self.selection.rect());
        Compositor::begin_canvas_pass(self.device, temp, canvas, scissor, blend);
    }

    fn preview_rendered(&mut self) {
        *self.preview_generation += 1;
    }
}

// ============================================================================
// INSTRUMENT
// ============================================================================

/// The active instrument with its interaction state.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Instrument {
    #[default]
    None,
    Selection(SelectionDrag),
    Pencil,
    Brush,
    Line(AnchoredShape),
    Shape(AnchoredShape),
    BrightnessContrastGammaFilter(FilterPreview),
    GaussianBlurFilter(FilterPreview),
    SharpenFilter(FilterPreview),
}

impl Instrument {
    /// Fresh interaction state for `kind`.
    pub fn for_kind(kind: InstrumentKind) -> Self {
        match kind {
            InstrumentKind::None => Instrument::None,
            InstrumentKind::Selection => Instrument::Selection(SelectionDrag::Idle),
            InstrumentKind::Pencil => Instrument::Pencil,
            InstrumentKind::Brush => Instrument::Brush,
            InstrumentKind::Line => Instrument::Line(AnchoredShape::default()),
            InstrumentKind::Shape => Instrument::Shape(AnchoredShape::default()),
            InstrumentKind::BrightnessContrastGammaFilter => {
                Instrument::BrightnessContrastGammaFilter(FilterPreview::new())
            }
            InstrumentKind::GaussianBlurFilter => Instrument::GaussianBlurFilter(FilterPreview::new()),
            InstrumentKind::SharpenFilter => Instrument::SharpenFilter(FilterPreview::new()),
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::None => InstrumentKind::None,
            Instrument::Selection(_) => InstrumentKind::Selection,
            Instrument::Pencil => InstrumentKind::Pencil,
            Instrument::Brush => InstrumentKind::Brush,
            Instrument::Line(_) => InstrumentKind::Line,
            Instrument::Shape(_) => InstrumentKind::Shape,
            Instrument::BrightnessContrastGammaFilter(_) => InstrumentKind::BrightnessContrastGammaFilter,
            Instrument::GaussianBlurFilter(_) => InstrumentKind::GaussianBlurFilter,
            Instrument::SharpenFilter(_) => InstrumentKind::SharpenFilter,
        }
    }

    /// Display mode right after activation.
    pub fn initial_display(&self) -> PreviewDisplay {
        if self.kind().is_filter() {
            PreviewDisplay { hide_active_layer: true, show_temp: true }
        } else {
            PreviewDisplay::default()
        }
    }

    /// Anchored shape state, if this is the Line or Shape instrument.
    pub fn anchored(&self) -> Option<&AnchoredShape> {
        match self {
            Instrument::Line(shape) | Instrument::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    /// Filter preview state, if this is a filter instrument.
    pub fn filter(&self) -> Option<&FilterPreview> {
        match self {
            Instrument::BrightnessContrastGammaFilter(f)
            | Instrument::GaussianBlurFilter(f)
            | Instrument::SharpenFilter(f) => Some(f),
            _ => None,
        }
    }

    /// Advance one frame.  Everything but the selection instrument needs an
    /// active layer and is idle without one.
    pub fn update(&mut self, ctx: &mut ToolContext<'_>) {
        if let Instrument::Selection(drag) = self {
            drag.update(ctx);
            return;
        }
        if ctx.layers.is_empty() {
            return;
        }
        let kind = self.kind();
        match self {
            Instrument::None | Instrument::Selection(_) => {}
            Instrument::Pencil => {
                let style = FreehandStyle::pencil(&ctx.settings.pencil);
                freehand::stroke(ctx, &style);
            }
            Instrument::Brush => {
                let style = FreehandStyle::brush(&ctx.settings.brush);
                freehand::stroke(ctx, &style);
            }
            Instrument::Line(shape) => {
                let style = AnchoredStyle::Line(ctx.settings.line);
                shape.update(ctx, &style);
            }
            Instrument::Shape(shape) => {
                let style = AnchoredStyle::Shape(ctx.settings.shape);
                shape.update(ctx, &style);
            }
            Instrument::BrightnessContrastGammaFilter(preview)
            | Instrument::GaussianBlurFilter(preview)
            | Instrument::SharpenFilter(preview) => {
                if let Some(pass) = FilterPass::for_kind(kind, ctx.settings) {
                    preview.update(ctx, &pass);
                }
            }
        }
    }

    /// Commit the pending edit.  Returns `true` when the instrument is done
    /// and the caller should fall back to no instrument.
    pub fn apply(&mut self, ctx: &mut ToolContext<'_>) -> bool {
        let kind = self.kind();
        match self {
            Instrument::Line(shape) => {
                let style = AnchoredStyle::Line(ctx.settings.line);
                shape.apply(ctx, &style);
                false
            }
            Instrument::Shape(shape) => {
                let style = AnchoredStyle::Shape(ctx.settings.shape);
                shape.apply(ctx, &style);
                false
            }
            Instrument::BrightnessContrastGammaFilter(preview)
            | Instrument::GaussianBlurFilter(preview)
            | Instrument::SharpenFilter(preview) => {
                if !ctx.layers.is_empty()
                    && let Some(pass) = FilterPass::for_kind(kind, ctx.settings)
                {
                    preview.apply(ctx, &pass);
                }
                true
            }
            Instrument::None | Instrument::Selection(_) | Instrument::Pencil | Instrument::Brush => false,
        }
    }

    /// Mark any cached preview stale so the next update re-renders it.
    pub fn invalidate(&mut self) {
        match self {
            Instrument::Line(shape) | Instrument::Shape(shape) => shape.invalidate(),
            Instrument::BrightnessContrastGammaFilter(preview)
            | Instrument::GaussianBlurFilter(preview)
            | Instrument::SharpenFilter(preview) => preview.invalidate(),
            Instrument::None | Instrument::Selection(_) | Instrument::Pencil | Instrument::Brush => {}
        }
    }
}
