use egui::Pos2;

use super::ToolContext;
use crate::canvas::Selection;

/// Two-corner rectangle drag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionDrag {
    #[default]
    Idle,
    CornerPicked {
        first: [i32; 2],
    },
}

/// Canvas pixel under a canvas-space point, clamped to `0..=size`.
fn corner(p: Pos2, width: u32, height: u32) -> [i32; 2] {
    [
        (p.x.max(0.0).floor() as i32).min(width as i32),
        (p.y.max(0.0).floor() as i32).min(height as i32),
    ]
}

impl SelectionDrag {
    pub fn update(&mut self, ctx: &mut ToolContext<'_>) {
        let (width, height) = ctx.layers.size();
        if !ctx.pointer.active {
            *self = SelectionDrag::Idle;
            return;
        }

        let here = corner(ctx.canvas_pointer(), width, height);
        match *self {
            SelectionDrag::Idle => {
                *ctx.selection = Selection::full(width, height);
                *self = SelectionDrag::CornerPicked { first: here };
            }
            SelectionDrag::CornerPicked { first } => {
                *ctx.selection = Selection::from_corners(first, here, width, height);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_is_clamped_to_canvas() {
        assert_eq!(corner(Pos2::new(-3.0, 2.7), 10, 10), [0, 2]);
        assert_eq!(corner(Pos2::new(55.0, 9.99), 10, 10), [10, 9]);
    }
}
