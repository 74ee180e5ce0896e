// SPDX-License-Identifier: GPL-3.0-only

use smithay::utils::{Logical, Physical, Rectangle, Size, Transform};
use std::sync::Arc;

use super::{FbHandle, KmsOutput};
use crate::backend::render::{Buffer, Renderable};

/// Finds the renderable that could be scanned out instead of compositing.
///
/// Feed renderables topmost first. A renderable matches if it exactly covers
/// the view area, is opaque, unshaped and untransformed. Once a renderable
/// overlapping the view area fails to match, nothing below it can match
/// either, since it would be drawn on top.
#[derive(Debug)]
pub struct BypassMatch {
    view_area: Rectangle<i32, Logical>,
    feasible: bool,
}

impl BypassMatch {
    pub fn new(view_area: Rectangle<i32, Logical>) -> BypassMatch {
        BypassMatch {
            view_area,
            feasible: true,
        }
    }

    pub fn matches(&mut self, renderable: &dyn Renderable) -> bool {
        if !self.feasible {
            return false;
        }

        if renderable.transformation() != Transform::Normal {
            self.feasible = false;
            return false;
        }

        let position = renderable.screen_position();
        if !position.overlaps(self.view_area) {
            return false;
        }

        if renderable.alpha() != 1.0 || renderable.shaped() || position != self.view_area {
            self.feasible = false;
            return false;
        }

        true
    }
}

/// A client buffer selected for direct scan-out, with its framebuffer.
#[derive(Debug)]
pub struct BypassCandidate {
    pub buffer: Arc<dyn Buffer>,
    pub fb: FbHandle,
}

/// Picks the client buffer to present directly, if any.
///
/// Besides geometrically matching, the buffer must be the size of the render
/// surface and importable as a framebuffer by `output`.
pub fn select_candidate(
    renderables: &[Arc<dyn Renderable>],
    view_area: Rectangle<i32, Logical>,
    surface_size: Size<i32, Physical>,
    output: &dyn KmsOutput,
) -> Option<BypassCandidate> {
    let mut matcher = BypassMatch::new(view_area);
    let renderable = renderables
        .iter()
        .rev()
        .find(|r| matcher.matches(r.as_ref()))?;

    let buffer = renderable.buffer();
    if buffer.size() != surface_size {
        return None;
    }
    let fb = output.fb_for_dmabuf(buffer.dmabuf()?)?;
    Some(BypassCandidate { buffer, fb })
}
