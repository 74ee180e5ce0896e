// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{bail, Context, Result};
use smallvec::SmallVec;
use smithay::utils::{Clock, Logical, Monotonic, Rectangle, Transform};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, trace, warn};

use super::{
    bypass::{self, BypassCandidate},
    render::{BufferCopierFactory, FrontBufferPipeline},
    BypassOption, FbHandle, FrontBuffer, KmsOutput, PresentError, RenderSurface,
};
use crate::{
    backend::{
        render::{Buffer, Renderable},
        DisplayBuffer, DisplaySyncGroup,
    },
    config::Config,
};

pub mod timings;

use self::timings::{FrameKind, Timings};

/// A frame handed to the outputs.
///
/// Holding it keeps the underlying buffer from being reused while it might
/// still be read by the display hardware.
#[derive(Debug)]
enum ScanoutFrame {
    Composite(FrontBuffer),
    Bypass(Arc<dyn Buffer>),
}

/// A group of outputs showing the same content, presented in lockstep.
///
/// A surface is driven by a single thread. Between two [`DisplaySyncGroup::post`]
/// calls at most one frame is scheduled and one is visible.
pub struct Surface {
    outputs: SmallVec<[Arc<dyn KmsOutput>; 2]>,
    render_surface: Box<dyn RenderSurface>,
    pipeline: FrontBufferPipeline,

    area: Rectangle<i32, Logical>,
    transform: Transform,
    bypass_option: BypassOption,

    bypass: Option<BypassCandidate>,
    scheduled: Option<ScanoutFrame>,
    visible: Option<ScanoutFrame>,
    needs_set_crtc: bool,
    page_flips_pending: bool,

    timings: Timings,
    clock: Clock<Monotonic>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("outputs", &self.outputs.iter().map(|o| o.id()).collect::<Vec<_>>())
            .field("pipeline", &self.pipeline)
            .field("area", &self.area)
            .field("transform", &self.transform)
            .field("bypass_option", &self.bypass_option)
            .field("needs_set_crtc", &self.needs_set_crtc)
            .field("page_flips_pending", &self.page_flips_pending)
            .field("scheduled", &self.scheduled)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

impl Surface {
    /// Creates a surface and shows its first (blank) frame on every output.
    pub fn new(
        config: &Config,
        outputs: impl IntoIterator<Item = Arc<dyn KmsOutput>>,
        mut render_surface: Box<dyn RenderSurface>,
        copier_factory: &dyn BufferCopierFactory,
        area: Rectangle<i32, Logical>,
        transform: Transform,
    ) -> Result<Surface> {
        let outputs: SmallVec<[Arc<dyn KmsOutput>; 2]> = outputs.into_iter().collect();
        let Some(first) = outputs.first().cloned() else {
            bail!("Cannot create a display buffer without outputs");
        };

        render_surface
            .make_current()
            .context("Failed to make render surface current")?;
        render_surface
            .swap_buffers()
            .context("Failed to submit initial frame")?;
        let front = render_surface
            .lock_front()
            .context("Failed to get frontbuffer")?;

        let mut pipeline = if first.buffer_requires_migration(&*front) {
            info!(
                output = first.id(),
                "Hybrid GPU setup detected; DisplayBuffer using EGL buffer copies for migration"
            );
            FrontBufferPipeline::bounce(copier_factory, first.drm_fd(), render_surface.size())?
        } else {
            info!(
                output = first.id(),
                "Detected single-GPU DisplayBuffer. Rendering will be sent directly to output."
            );
            FrontBufferPipeline::Direct
        };

        let visible = pipeline
            .migrate(front)
            .context("Failed to migrate initial frame")?;
        if outputs
            .iter()
            .any(|output| output.buffer_requires_migration(&*visible))
        {
            bail!("Attempted to create a DisplayBuffer spanning multiple GPU memory domains");
        }

        let fb = first
            .fb_for(&*visible)
            .context("Failed to get framebuffer for initial frame")?;

        let timings = Timings::new(
            config.composite_render_budget(),
            config.bypass_render_budget(),
        );

        let mut surface = Surface {
            outputs,
            render_surface,
            pipeline,
            area,
            transform,
            bypass_option: config.bypass(),
            bypass: None,
            scheduled: None,
            visible: Some(ScanoutFrame::Composite(visible)),
            needs_set_crtc: false,
            page_flips_pending: false,
            timings,
            clock: Clock::new(),
        };
        surface.set_crtc(fb);
        surface.render_surface.release_current();

        Ok(surface)
    }

    pub fn output_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.outputs.iter().map(|output| output.id())
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Whether frames are copied to another GPU before scan-out.
    pub fn uses_bounce_copies(&self) -> bool {
        self.pipeline.is_bounce()
    }

    /// Refresh interval used for the sleep recommendation.
    ///
    /// Cloned outputs defer their flip wait to the next post and never sleep.
    fn refresh_interval(&self) -> Option<Duration> {
        match self.outputs.as_slice() {
            [output] => Timings::interval_for_rate(output.max_refresh_rate()),
            _ => None,
        }
    }

    /// Forces the next post to do a full mode-set instead of a page flip.
    pub fn schedule_set_crtc(&mut self) {
        self.needs_set_crtc = true;
    }

    fn set_crtc(&self, fb: FbHandle) {
        for output in &self.outputs {
            if !output.set_crtc(fb) {
                error!(
                    output = output.id(),
                    "Failed to set DRM CRTC. Screen contents may be incomplete. Try plugging the monitor in again."
                );
            }
        }
    }

    fn schedule_page_flip(&mut self, fb: FbHandle) -> bool {
        let mut page_flip_needed = false;
        for output in &self.outputs {
            if output.schedule_page_flip(fb) {
                page_flip_needed = true;
            }
        }

        if page_flip_needed {
            self.page_flips_pending = true;
            let now: Duration = self.clock.now().into();
            self.timings.flip_scheduled(now);
        }
        page_flip_needed
    }

    /// Waits for outstanding flips and retires the previously visible frame.
    fn wait_for_page_flip(&mut self) {
        if self.page_flips_pending {
            for output in &self.outputs {
                output.wait_for_page_flip();
            }
            self.page_flips_pending = false;
            let now: Duration = self.clock.now().into();
            self.timings.flip_completed(now);
        }

        if let Some(frame) = self.scheduled.take() {
            trace!(?frame, "Frame is now visible");
            self.visible = Some(frame);
        }
    }

    fn next_frame(&mut self) -> Result<(ScanoutFrame, FbHandle), PresentError> {
        if let Some(BypassCandidate { buffer, fb }) = self.bypass.take() {
            return Ok((ScanoutFrame::Bypass(buffer), fb));
        }

        let front = self
            .render_surface
            .lock_front()
            .map_err(PresentError::NoFrontBuffer)?;
        let front = self
            .pipeline
            .migrate(front)
            .map_err(PresentError::Migration)?;
        let fb = self.outputs[0]
            .fb_for(&*front)
            .ok_or(PresentError::NoFramebuffer)?;
        Ok((ScanoutFrame::Composite(front), fb))
    }
}

impl DisplaySyncGroup for Surface {
    fn for_each_display_buffer(&mut self, f: &mut dyn FnMut(&mut dyn DisplayBuffer)) {
        f(self)
    }

    #[profiling::function]
    fn post(&mut self) -> Result<(), PresentError> {
        // The front buffer must not be locked again while a flip to it is pending.
        self.wait_for_page_flip();

        let (frame, fb) = self.next_frame()?;
        let kind = match frame {
            ScanoutFrame::Composite(_) => FrameKind::Composite,
            ScanoutFrame::Bypass(_) => FrameKind::Bypass,
        };
        self.scheduled = Some(frame);

        if !self.needs_set_crtc && !self.schedule_page_flip(fb) {
            warn!("Failed to schedule page flip, falling back to mode-set");
            self.needs_set_crtc = true;
        }
        if self.needs_set_crtc {
            self.set_crtc(fb);
            self.needs_set_crtc = false;
        }

        match kind {
            // Client buffers must stay untouched until they are on screen.
            FrameKind::Bypass => self.wait_for_page_flip(),
            // With several outputs the wait is deferred to the next post, so
            // vblanks of the other outputs can catch up in the meantime.
            FrameKind::Composite if self.outputs.len() == 1 => self.wait_for_page_flip(),
            FrameKind::Composite => {}
        }

        let refresh_interval = self.refresh_interval();
        self.timings.frame_posted(kind, refresh_interval);
        Ok(())
    }

    fn recommended_sleep(&self) -> Duration {
        self.timings.recommended_sleep()
    }
}

impl DisplayBuffer for Surface {
    fn view_area(&self) -> Rectangle<i32, Logical> {
        self.area
    }

    #[profiling::function]
    fn overlay(&mut self, renderables: &[Arc<dyn Renderable>]) -> bool {
        self.bypass = None;
        if self.transform != Transform::Normal || self.bypass_option != BypassOption::Allowed {
            return false;
        }

        self.bypass = bypass::select_candidate(
            renderables,
            self.area,
            self.render_surface.size(),
            &*self.outputs[0],
        );
        match self.bypass.as_ref() {
            Some(candidate) => trace!(buffer = ?candidate.buffer.id(), "Scanning out client buffer"),
            None => trace!("No renderable eligible for direct scan-out"),
        }
        self.bypass.is_some()
    }

    fn transformation(&self) -> Transform {
        self.transform
    }

    fn set_transformation(&mut self, transform: Transform, area: Rectangle<i32, Logical>) {
        self.transform = transform;
        self.area = area;
    }

    fn make_current(&mut self) -> Result<()> {
        self.render_surface.make_current()
    }

    fn release_current(&mut self) {
        self.render_surface.release_current()
    }

    fn swap_buffers(&mut self) -> Result<()> {
        self.render_surface.swap_buffers()?;
        self.bypass = None;
        Ok(())
    }
}
