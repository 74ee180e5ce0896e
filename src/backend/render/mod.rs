// SPDX-License-Identifier: GPL-3.0-only

use smithay::{
    backend::allocator::Fourcc,
    utils::{Logical, Physical, Rectangle, Size, Transform},
};
use std::{fmt, os::fd::RawFd, sync::Arc};

/// Identity of a client buffer, stable for the buffer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDescriptor {
    pub fd: RawFd,
    pub stride: u32,
    pub offset: u32,
}

/// A logical buffer backed by one or more dma-bufs.
pub trait DmabufBuffer: fmt::Debug + Send + Sync {
    fn format(&self) -> Fourcc;
    /// The modifier of the logical buffer, if the client specified one.
    fn modifier(&self) -> Option<u64>;
    fn planes(&self) -> &[PlaneDescriptor];
}

/// A client buffer that may end up on screen.
pub trait Buffer: fmt::Debug + Send + Sync {
    fn id(&self) -> BufferId;
    fn size(&self) -> Size<i32, Physical>;
    fn format(&self) -> Fourcc;

    /// The dma-buf backing this buffer, if it can be shared with other devices
    /// without a copy. Shm buffers return `None`.
    fn dmabuf(&self) -> Option<&dyn DmabufBuffer> {
        None
    }
}

/// Something the compositor would draw this frame.
pub trait Renderable: Send + Sync {
    fn buffer(&self) -> Arc<dyn Buffer>;

    /// Area covered on screen.
    fn screen_position(&self) -> Rectangle<i32, Logical>;

    /// Transformation applied when drawing, on top of the screen position.
    fn transformation(&self) -> Transform {
        Transform::Normal
    }

    fn alpha(&self) -> f32 {
        1.0
    }

    /// Whether the renderable has a non-rectangular shape or translucent regions.
    fn shaped(&self) -> bool {
        false
    }
}
