// SPDX-License-Identifier: GPL-3.0-only

//! Scan-out of composited frames and client buffers on KMS outputs.
//!
//! A [`Surface`] drives a group of outputs sharing one render surface. The
//! collaborators it talks to (connectors, the GBM surface, the EGL copier) are
//! expressed as traits so the scheduling logic does not depend on a particular
//! driver stack.

use anyhow::Result;
use smithay::{
    backend::allocator::Fourcc,
    utils::{Physical, Size},
};
use std::{fmt, ops::Deref, os::fd::RawFd};

pub mod bypass;
pub mod render;
pub mod surface;

pub use cosmic_mux_config::BypassOption;
pub use surface::{timings::Timings, Surface};

use super::render::DmabufBuffer;

/// Handle of a framebuffer registered with the DRM device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FbHandle(pub u32);

#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("failed to get front buffer")]
    NoFrontBuffer(#[source] anyhow::Error),
    #[error("failed to migrate front buffer to the scan-out device")]
    Migration(#[source] anyhow::Error),
    #[error("failed to get framebuffer for front buffer")]
    NoFramebuffer,
}

/// A single connector/crtc pair.
///
/// All methods take `&self`, outputs are shared between a surface and the
/// display owning them.
pub trait KmsOutput: Send + Sync {
    fn id(&self) -> u32;
    fn size(&self) -> Size<i32, Physical>;
    /// Highest refresh rate of the current mode in Hz, 0 if unknown.
    fn max_refresh_rate(&self) -> u32;

    /// Synchronous mode-set showing `fb`. Returns `false` on failure.
    fn set_crtc(&self, fb: FbHandle) -> bool;
    /// Asynchronously flips to `fb` at the next vblank. Returns `false` on failure.
    fn schedule_page_flip(&self, fb: FbHandle) -> bool;
    /// Blocks until the last scheduled flip happened.
    fn wait_for_page_flip(&self);

    fn fb_for(&self, bo: &dyn BufferObject) -> Option<FbHandle>;
    fn fb_for_dmabuf(&self, buffer: &dyn DmabufBuffer) -> Option<FbHandle>;

    /// Whether `bo` lives in memory this output's device cannot scan out from.
    fn buffer_requires_migration(&self, bo: &dyn BufferObject) -> bool;
    fn drm_fd(&self) -> RawFd;
}

/// A buffer object allocated by the render surface.
///
/// Dropping it hands the buffer back to its allocator.
pub trait BufferObject: fmt::Debug + Send {
    fn handle(&self) -> u64;
    fn size(&self) -> Size<i32, Physical>;
    fn format(&self) -> Fourcc;
    fn stride(&self) -> u32;
}

/// A locked front buffer of a render surface.
///
/// The buffer stays reserved until this is dropped.
#[derive(Debug)]
pub struct FrontBuffer(Box<dyn BufferObject>);

impl FrontBuffer {
    pub fn new(bo: Box<dyn BufferObject>) -> FrontBuffer {
        FrontBuffer(bo)
    }
}

impl Deref for FrontBuffer {
    type Target = dyn BufferObject;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

/// The GBM surface a group of outputs is rendered into.
pub trait RenderSurface: Send {
    fn size(&self) -> Size<i32, Physical>;
    fn make_current(&mut self) -> Result<()>;
    fn release_current(&mut self);
    fn swap_buffers(&mut self) -> Result<()>;
    /// Locks the buffer submitted by the last [`RenderSurface::swap_buffers`].
    fn lock_front(&mut self) -> Result<FrontBuffer>;
}
