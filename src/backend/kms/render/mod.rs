// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use smithay::{
    backend::allocator::Fourcc,
    utils::{Physical, Size},
};
use std::{fmt, os::fd::RawFd};
use tracing::debug;

use super::FrontBuffer;

pub const REQUIRED_GL_EXTENSIONS: &[&str] = &["GL_OES_EGL_image"];
pub const REQUIRED_EGL_EXTENSIONS: &[&str] =
    &["EGL_KHR_image_base", "EGL_EXT_image_dma_buf_import"];

/// Format of the intermediate buffers a bounce copy renders into.
pub const BOUNCE_FORMAT: Fourcc = Fourcc::Xrgb8888;

#[derive(Debug, thiserror::Error)]
#[error("missing required {api} extensions: {}", .missing.join(", "))]
pub struct MissingExtensions {
    pub api: &'static str,
    pub missing: Vec<String>,
}

/// Checks that every extension of `required` is advertised in the
/// space-separated `available` list.
pub fn require_extensions(
    api: &'static str,
    required: &[&str],
    available: &str,
) -> Result<(), MissingExtensions> {
    let missing = required
        .iter()
        .filter(|ext| !available.split_whitespace().any(|avail| avail == **ext))
        .map(|ext| ext.to_string())
        .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingExtensions { api, missing })
    }
}

/// Copies front buffers into memory owned by the scan-out device.
pub trait BufferCopier: Send {
    fn copy_front_buffer_from(&mut self, from: FrontBuffer) -> Result<FrontBuffer>;
}

/// Creates [`BufferCopier`]s on the scan-out device of an output group.
pub trait BufferCopierFactory {
    fn egl_extensions(&self) -> String;
    fn gl_extensions(&self) -> String;
    fn create_copier(
        &self,
        drm_fd: RawFd,
        size: Size<i32, Physical>,
        format: Fourcc,
    ) -> Result<Box<dyn BufferCopier>>;
}

/// How rendered frames reach memory the outputs can scan out from.
pub enum FrontBufferPipeline {
    /// Render and scan-out device share memory, frames are used as is.
    Direct,
    /// Frames are copied to the scan-out device first.
    Bounce(Box<dyn BufferCopier>),
}

impl fmt::Debug for FrontBufferPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontBufferPipeline::Direct => f.write_str("Direct"),
            FrontBufferPipeline::Bounce(_) => f.write_str("Bounce"),
        }
    }
}

impl FrontBufferPipeline {
    /// Sets up copies onto the device behind `drm_fd`.
    pub fn bounce(
        factory: &dyn BufferCopierFactory,
        drm_fd: RawFd,
        size: Size<i32, Physical>,
    ) -> Result<FrontBufferPipeline> {
        require_extensions("EGL", REQUIRED_EGL_EXTENSIONS, &factory.egl_extensions())?;
        require_extensions("GL", REQUIRED_GL_EXTENSIONS, &factory.gl_extensions())?;

        debug!(?size, "Creating bounce buffer copier");
        let copier = factory
            .create_copier(drm_fd, size, BOUNCE_FORMAT)
            .context("Failed to create buffer copier for hybrid output")?;
        Ok(FrontBufferPipeline::Bounce(copier))
    }

    pub fn is_bounce(&self) -> bool {
        matches!(self, FrontBufferPipeline::Bounce(_))
    }

    pub fn migrate(&mut self, front: FrontBuffer) -> Result<FrontBuffer> {
        match self {
            FrontBufferPipeline::Direct => Ok(front),
            FrontBufferPipeline::Bounce(copier) => copier.copy_front_buffer_from(front),
        }
    }
}
