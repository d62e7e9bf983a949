// ============================================================================
// ANCHORED SHAPES — Line and Shape instruments
// ============================================================================
//
// A shape is defined by two canvas-space anchors.  While it is pending it
// lives only in the temp surface; pressing away from both anchors (or an
// explicit apply) merges it into the active layer.  Pressing within the grab
// distance of an anchor drags that anchor instead.
//
// `out_of_date` is a memo flag: it is set when something the preview depends
// on changes (settings, active layer, canvas size) and cleared only by a
// successful render.
// ============================================================================

use egui::{Pos2, Vec2};

use super::{LineSettings, ShapeSettings, ToolContext};
use crate::log_info;
use crate::ops::shapes::{draw_line_stroke, draw_shape};

/// Which end of the shape a drag holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum AnchorPhase {
    #[default]
    Standby,
    /// Dragging out a new shape from `start`.
    Draw,
    /// Dragging an existing anchor.  `offset` is pointer minus anchor in
    /// canvas space at grab time.
    Modify {
        anchor: Anchor,
        offset: Vec2,
        prev_pointer: Pos2,
    },
}

/// Rendering parameters, resolved from the settings bank every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnchoredStyle {
    Line(LineSettings),
    Shape(ShapeSettings),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnchoredShape {
    start: Pos2,
    end: Pos2,
    phase: AnchorPhase,
    not_empty: bool,
    out_of_date: bool,
}

/// Whether the anchors are at least one canvas unit apart on some axis.
fn is_drawable(start: Pos2, end: Pos2) -> bool {
    let d = end - start;
    d.x.abs() >= 1.0 || d.y.abs() >= 1.0
}

impl AnchoredShape {
    pub fn start(&self) -> Pos2 {
        self.start
    }

    pub fn end(&self) -> Pos2 {
        self.end
    }

    pub fn phase(&self) -> AnchorPhase {
        self.phase
    }

    /// A drawable shape is pending in temp.
    pub fn is_pending(&self) -> bool {
        self.not_empty
    }

    pub fn is_out_of_date(&self) -> bool {
        self.out_of_date
    }

    pub fn invalidate(&mut self) {
        self.out_of_date = true;
    }

    pub fn update(&mut self, ctx: &mut ToolContext<'_>, style: &AnchoredStyle) {
        if ctx.pointer.active {
            let pointer = ctx.canvas_pointer();
            match self.phase {
                AnchorPhase::Standby => {
                    if self.not_empty {
                        self.grab_or_commit(ctx, style, pointer);
                    } else {
                        self.begin(pointer);
                        self.out_of_date = false;
                    }
                }
                AnchorPhase::Draw => {
                    if self.end != pointer {
                        self.end = pointer;
                        self.refresh(ctx, style);
                    }
                }
                AnchorPhase::Modify { anchor, offset, prev_pointer } => {
                    if prev_pointer != pointer {
                        let moved = pointer - offset;
                        match anchor {
                            Anchor::Start => self.start = moved,
                            Anchor::End => self.end = moved,
                        }
                        self.phase = AnchorPhase::Modify { anchor, offset, prev_pointer: pointer };
                        self.refresh(ctx, style);
                    }
                }
            }
        } else {
            self.phase = AnchorPhase::Standby;
        }

        if self.out_of_date && self.not_empty {
            self.render(ctx, style);
        }
    }

    /// Commit the pending shape (if any) and go back to standby.
    pub fn apply(&mut self, ctx: &mut ToolContext<'_>, style: &AnchoredStyle) {
        if self.not_empty {
            if self.out_of_date {
                self.render(ctx, style);
            }
            self.commit(ctx);
            self.not_empty = false;
            ctx.display.show_temp = false;
        }
        self.phase = AnchorPhase::Standby;
    }

    fn begin(&mut self, at: Pos2) {
        self.start = at;
        self.end = at;
        self.phase = AnchorPhase::Draw;
        self.not_empty = false;
    }

    /// Press while a shape is pending: grab the nearer anchor if it is within
    /// reach in view space, otherwise commit and start a new shape.
    fn grab_or_commit(&mut self, ctx: &mut ToolContext<'_>, style: &AnchoredStyle, pointer: Pos2) {
        let view_pointer = ctx.pointer.position;
        let start_distance = ctx.view.to_view(self.start).distance(view_pointer);
        let end_distance = ctx.view.to_view(self.end).distance(view_pointer);
        let (anchor, distance, position) = if end_distance < start_distance {
            (Anchor::End, end_distance, self.end)
        } else {
            (Anchor::Start, start_distance, self.start)
        };

        if distance <= ctx.engine.anchor_grab_distance {
            self.phase = AnchorPhase::Modify { anchor, offset: pointer - position, prev_pointer: pointer };
        } else {
            if self.out_of_date {
                self.render(ctx, style);
            }
            self.commit(ctx);
            ctx.display.show_temp = false;
            self.begin(pointer);
        }
    }

    /// After an anchor moved: re-render immediately if the shape is drawable.
    fn refresh(&mut self, ctx: &mut ToolContext<'_>, style: &AnchoredStyle) {
        self.not_empty = is_drawable(self.start, self.end);
        if self.not_empty {
            self.render(ctx, style);
        }
        ctx.display.show_temp = self.not_empty;
    }

    fn render(&mut self, ctx: &mut ToolContext<'_>, style: &AnchoredStyle) {
        ctx.begin_temp_pass(true);
        match style {
            AnchoredStyle::Line(s) => draw_line_stroke(
                ctx.batcher,
                ctx.device,
                self.start,
                self.end,
                s.width,
                s.color,
                s.rounded_start,
                s.rounded_end,
            ),
            AnchoredStyle::Shape(s) => draw_shape(
                ctx.batcher,
                ctx.device,
                s.shape,
                self.start,
                self.end,
                s.fill_color,
                s.border_color,
                s.border_width,
            ),
        }
        ctx.batcher.flush(ctx.device);
        self.out_of_date = false;
        ctx.preview_rendered();
    }

    /// Alpha-blend temp over the active layer inside the selection.
    fn commit(&self, ctx: &mut ToolContext<'_>) {
        let Some(active) = ctx.layers.active_surface() else { return };
        let (temp, canvas, scissor) = (ctx.layers.temp(), ctx.canvas(), ctx.selection.rect());
        ctx.compositor.merge_into(ctx.device, active, temp, canvas, scissor);
        log_info!(
            "Shape committed ({:.1},{:.1}) -> ({:.1},{:.1})",
            self.start.x,
            self.start.y,
            self.end.x,
            self.end.y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawable_needs_one_unit_on_some_axis() {
        assert!(!is_drawable(Pos2::new(3.0, 3.0), Pos2::new(3.9, 3.5)));
        assert!(is_drawable(Pos2::new(3.0, 3.0), Pos2::new(3.0, 4.0)));
        assert!(is_drawable(Pos2::new(3.0, 3.0), Pos2::new(1.5, 3.0)));
    }
}
