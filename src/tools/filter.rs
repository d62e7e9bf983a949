use super::{InstrumentKind, SettingsBank, ToolContext};
use crate::gpu::{Compositor, CustomEffect, Effect};
use crate::log_info;
use crate::ops::adjustments::BrightnessContrastGammaConstants;
use crate::ops::filters::{BlurConstants, SharpenConstants};

/// Effect plus its packed constant block for one filter render.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterPass {
    pub effect: CustomEffect,
    pub constants: Vec<u8>,
}

impl FilterPass {
    /// `None` for non-filter kinds.
    pub fn for_kind(kind: InstrumentKind, bank: &SettingsBank) -> Option<Self> {
        let (effect, constants) = match kind {
            InstrumentKind::BrightnessContrastGammaFilter => {
                let s = bank.brightness_contrast_gamma;
                let c = BrightnessContrastGammaConstants::new(s.brightness, s.contrast, s.gamma);
                (CustomEffect::BrightnessContrastGamma, bytemuck::bytes_of(&c).to_vec())
            }
            InstrumentKind::GaussianBlurFilter => {
                let c = BlurConstants::from_radius(bank.gaussian_blur.radius);
                (CustomEffect::GaussianBlur, bytemuck::bytes_of(&c).to_vec())
            }
            InstrumentKind::SharpenFilter => {
                let c = SharpenConstants::from_intensity(bank.sharpen.intensity);
                (CustomEffect::Sharpen, bytemuck::bytes_of(&c).to_vec())
            }
            _ => return None,
        };
        Some(Self { effect, constants })
    }
}

/// Pull-based preview: the filtered canvas is recomputed into temp only when
/// marked out of date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPreview {
    out_of_date: bool,
}

impl Default for FilterPreview {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterPreview {
    /// Starts out of date so the first frame renders.
    pub fn new() -> Self {
        Self { out_of_date: true }
    }

    pub fn is_out_of_date(&self) -> bool {
        self.out_of_date
    }

    pub fn invalidate(&mut self) {
        self.out_of_date = true;
    }

    pub fn update(&mut self, ctx: &mut ToolContext<'_>, pass: &FilterPass) {
        if self.out_of_date {
            self.render(ctx, pass);
        }
    }

    /// Copy the filtered selection back into the active layer.
    pub fn apply(&mut self, ctx: &mut ToolContext<'_>, pass: &FilterPass) {
        if self.out_of_date {
            self.render(ctx, pass);
        }
        let Some(active) = ctx.layers.active_surface() else { return };
        let sel = ctx.selection.rect();
        ctx.device.copy_region(active, (sel.left, sel.top), ctx.layers.temp(), sel);
        log_info!("{:?} applied to layer {} over {:?}", pass.effect, ctx.layers.current(), sel);
    }

    /// Temp = active layer, with the selection replaced by its filtered
    /// version.
    fn render(&mut self, ctx: &mut ToolContext<'_>, pass: &FilterPass) {
        let Some(active) = ctx.layers.active_surface() else { return };
        let temp = ctx.layers.temp();
        let canvas = ctx.canvas();
        let scissor = ctx.selection.rect();

        ctx.device.copy_region(temp, (0, 0), active, canvas);
        Compositor::begin_canvas_pass(ctx.device, temp, canvas, scissor, false);
        ctx.device.set_effect_constants(&pass.constants);
        ctx.compositor.draw_canvas_quad(ctx.device, active, canvas, Effect::Custom(pass.effect));

        self.out_of_date = false;
        ctx.preview_rendered();
    }
}
