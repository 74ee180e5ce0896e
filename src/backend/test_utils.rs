// SPDX-License-Identifier: GPL-3.0-only

//! Hand-written doubles for the hardware facing traits.

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use smithay::{
    backend::allocator::Fourcc,
    utils::{Logical, Physical, Point, Rectangle, Size, Transform},
};
use std::{collections::VecDeque, os::fd::RawFd, sync::Arc};

use super::{
    configuration::{
        CardId, DisplayConfiguration, GammaCurves, Mode, OutputConfig, OutputId, PowerMode,
    },
    kms::{
        render::{BufferCopier, BufferCopierFactory, REQUIRED_EGL_EXTENSIONS, REQUIRED_GL_EXTENSIONS},
        BufferObject, FbHandle, FrontBuffer, KmsOutput, RenderSurface,
    },
    render::{Buffer, BufferId, DmabufBuffer, PlaneDescriptor, Renderable},
    ConfigurationChangeHandler, Display, DisplayBuffer, DisplayError, DisplaySyncGroup, GlContext,
};

const FORMATS: &[Fourcc] = &[
    Fourcc::Xrgb8888,
    Fourcc::Argb8888,
    Fourcc::Xbgr8888,
    Fourcc::Abgr8888,
    Fourcc::Rgbx8888,
    Fourcc::Rgba8888,
    Fourcc::Bgrx8888,
    Fourcc::Bgra8888,
    Fourcc::Rgb565,
    Fourcc::Bgr565,
    Fourcc::Xrgb2101010,
    Fourcc::Argb2101010,
];

/// Generates distinguishable outputs, numbered from 1.
///
/// Every output supports a single pixel format unique to it.
#[derive(Debug, Default)]
pub struct OutputGenerator {
    next_id: u32,
}

impl OutputGenerator {
    pub fn output(&mut self, card: CardId) -> OutputConfig {
        self.next_id += 1;
        let id = self.next_id;
        let format = FORMATS[(id as usize - 1) % FORMATS.len()];

        OutputConfig {
            id: OutputId(id),
            card_id: card,
            name: format!("DP-{}", id),
            connected: true,
            used: true,
            pixel_formats: vec![format],
            modes: vec![Mode::new((3840, 2160), 59_980)],
            preferred_mode_index: 0,
            current_mode_index: Some(0),
            physical_size_mm: Size::from((340, 190)),
            top_left: Point::from((0, 0)),
            current_format: format,
            power_mode: PowerMode::On,
            orientation: Transform::Normal,
            scale: 2.0,
            gamma_supported: false,
            gamma: GammaCurves::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCall {
    Pause,
    Resume,
    ForEachSyncGroup,
    CreateGlContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Accept,
    Reject,
    Fail,
}

#[derive(Default)]
pub struct DisplayState {
    pub conf: DisplayConfiguration,
    pub configured: Vec<DisplayConfiguration>,
    pub configure_fails: bool,
    pub applied: Vec<DisplayConfiguration>,
    /// Results of upcoming applies, accepting once exhausted.
    pub apply_results: VecDeque<ApplyResult>,
    pub handlers: Vec<ConfigurationChangeHandler>,
    pub calls: Vec<DisplayCall>,
}

impl DisplayState {
    pub fn count(&self, call: DisplayCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

/// A display backend keeping whatever configuration it is given.
pub struct TestDisplay {
    pub state: Arc<Mutex<DisplayState>>,
}

impl TestDisplay {
    pub fn new(conf: DisplayConfiguration) -> TestDisplay {
        TestDisplay {
            state: Arc::new(Mutex::new(DisplayState {
                conf,
                ..DisplayState::default()
            })),
        }
    }
}

impl Display for TestDisplay {
    fn configuration(&self) -> DisplayConfiguration {
        self.state.lock().conf.clone()
    }

    fn configure(&mut self, conf: &DisplayConfiguration) -> Result<()> {
        let mut state = self.state.lock();
        if state.configure_fails {
            bail!("mode-set rejected");
        }
        state.configured.push(conf.clone());
        state.conf = conf.clone();
        Ok(())
    }

    fn apply_if_configuration_preserves_display_buffers(
        &mut self,
        conf: &DisplayConfiguration,
    ) -> Result<bool, DisplayError> {
        let mut state = self.state.lock();
        state.applied.push(conf.clone());
        match state.apply_results.pop_front().unwrap_or(ApplyResult::Accept) {
            ApplyResult::Accept => {
                state.conf = conf.clone();
                Ok(true)
            }
            ApplyResult::Reject => Ok(false),
            ApplyResult::Fail => Err(DisplayError::Backend {
                card: conf.cards().first().copied().unwrap_or(CardId(0)),
                source: anyhow!("atomic commit failed"),
            }),
        }
    }

    fn for_each_display_sync_group(&mut self, f: &mut dyn FnMut(&mut dyn DisplaySyncGroup)) {
        self.state.lock().calls.push(DisplayCall::ForEachSyncGroup);
        f(&mut NullSyncGroup)
    }

    fn register_configuration_change_handler(&mut self, handler: ConfigurationChangeHandler) {
        self.state.lock().handlers.push(handler);
    }

    fn pause(&mut self) {
        self.state.lock().calls.push(DisplayCall::Pause);
    }

    fn resume(&mut self) {
        self.state.lock().calls.push(DisplayCall::Resume);
    }

    fn create_gl_context(&self) -> Result<Box<dyn GlContext>> {
        self.state.lock().calls.push(DisplayCall::CreateGlContext);
        Ok(Box::new(NullGlContext))
    }
}

pub struct NullGlContext;

impl GlContext for NullGlContext {
    fn make_current(&self) {}
    fn release_current(&self) {}
}

pub struct NullSyncGroup;

impl DisplaySyncGroup for NullSyncGroup {
    fn for_each_display_buffer(&mut self, _f: &mut dyn FnMut(&mut dyn DisplayBuffer)) {}

    fn post(&mut self) -> Result<(), super::kms::PresentError> {
        Ok(())
    }

    fn recommended_sleep(&self) -> std::time::Duration {
        std::time::Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    SetCrtc(FbHandle),
    SchedulePageFlip(FbHandle),
    WaitForPageFlip,
}

#[derive(Debug)]
pub struct OutputState {
    pub events: Vec<OutputEvent>,
    pub max_refresh_rate: u32,
    pub flip_succeeds: bool,
    pub set_crtc_succeeds: bool,
    pub dmabuf_import: bool,
    pub fb_creation: bool,
    /// Buffer objects with a handle below this live on another GPU.
    pub foreign_below: u64,
}

/// An output recording what was asked of it.
///
/// Framebuffers of buffer objects carry the object's handle, those of
/// imported dma-bufs 1000 plus the fd of the first plane.
#[derive(Debug)]
pub struct TestKmsOutput {
    id: u32,
    pub state: Mutex<OutputState>,
}

impl TestKmsOutput {
    pub fn new(id: u32) -> TestKmsOutput {
        TestKmsOutput {
            id,
            state: Mutex::new(OutputState {
                events: Vec::new(),
                max_refresh_rate: 60,
                flip_succeeds: true,
                set_crtc_succeeds: true,
                dmabuf_import: true,
                fb_creation: true,
                foreign_below: 0,
            }),
        }
    }
}

impl KmsOutput for TestKmsOutput {
    fn id(&self) -> u32 {
        self.id
    }

    fn size(&self) -> Size<i32, Physical> {
        Size::from((1920, 1080))
    }

    fn max_refresh_rate(&self) -> u32 {
        self.state.lock().max_refresh_rate
    }

    fn set_crtc(&self, fb: FbHandle) -> bool {
        let mut state = self.state.lock();
        state.events.push(OutputEvent::SetCrtc(fb));
        state.set_crtc_succeeds
    }

    fn schedule_page_flip(&self, fb: FbHandle) -> bool {
        let mut state = self.state.lock();
        state.events.push(OutputEvent::SchedulePageFlip(fb));
        state.flip_succeeds
    }

    fn wait_for_page_flip(&self) {
        self.state.lock().events.push(OutputEvent::WaitForPageFlip);
    }

    fn fb_for(&self, bo: &dyn BufferObject) -> Option<FbHandle> {
        self.state
            .lock()
            .fb_creation
            .then(|| FbHandle(bo.handle() as u32))
    }

    fn fb_for_dmabuf(&self, buffer: &dyn DmabufBuffer) -> Option<FbHandle> {
        if !self.state.lock().dmabuf_import {
            return None;
        }
        let plane = buffer.planes().first()?;
        Some(FbHandle(1000 + plane.fd as u32))
    }

    fn buffer_requires_migration(&self, bo: &dyn BufferObject) -> bool {
        bo.handle() < self.state.lock().foreign_below
    }

    fn drm_fd(&self) -> RawFd {
        self.id as RawFd
    }
}

/// A buffer object logging its handle to `released` when dropped.
#[derive(Debug)]
pub struct TestBufferObject {
    pub handle: u64,
    pub size: Size<i32, Physical>,
    pub released: Arc<Mutex<Vec<u64>>>,
}

impl TestBufferObject {
    pub fn front(
        handle: u64,
        size: impl Into<Size<i32, Physical>>,
    ) -> (FrontBuffer, Arc<Mutex<Vec<u64>>>) {
        let released = Arc::new(Mutex::new(Vec::new()));
        let bo = TestBufferObject {
            handle,
            size: size.into(),
            released: released.clone(),
        };
        (FrontBuffer::new(Box::new(bo)), released)
    }
}

impl BufferObject for TestBufferObject {
    fn handle(&self) -> u64 {
        self.handle
    }

    fn size(&self) -> Size<i32, Physical> {
        self.size
    }

    fn format(&self) -> Fourcc {
        Fourcc::Xrgb8888
    }

    fn stride(&self) -> u32 {
        self.size.w as u32 * 4
    }
}

impl Drop for TestBufferObject {
    fn drop(&mut self) {
        self.released.lock().push(self.handle);
    }
}

#[derive(Debug, Default)]
pub struct RenderSurfaceState {
    /// Number of submitted frames, also the handle of the latest one.
    pub swaps: u64,
    pub locks: u32,
    pub current: bool,
    pub lock_fails: bool,
}

/// A render surface whose n-th submitted frame is buffer object `n`.
#[derive(Debug, Clone)]
pub struct TestRenderSurface {
    size: Size<i32, Physical>,
    pub state: Arc<Mutex<RenderSurfaceState>>,
    pub released: Arc<Mutex<Vec<u64>>>,
}

impl TestRenderSurface {
    pub fn new(size: impl Into<Size<i32, Physical>>) -> TestRenderSurface {
        TestRenderSurface {
            size: size.into(),
            state: Arc::default(),
            released: Arc::default(),
        }
    }
}

impl RenderSurface for TestRenderSurface {
    fn size(&self) -> Size<i32, Physical> {
        self.size
    }

    fn make_current(&mut self) -> Result<()> {
        self.state.lock().current = true;
        Ok(())
    }

    fn release_current(&mut self) {
        self.state.lock().current = false;
    }

    fn swap_buffers(&mut self) -> Result<()> {
        self.state.lock().swaps += 1;
        Ok(())
    }

    fn lock_front(&mut self) -> Result<FrontBuffer> {
        let mut state = self.state.lock();
        if state.lock_fails || state.swaps == 0 {
            bail!("no buffer submitted");
        }
        state.locks += 1;
        Ok(FrontBuffer::new(Box::new(TestBufferObject {
            handle: state.swaps,
            size: self.size,
            released: self.released.clone(),
        })))
    }
}

/// Copies buffers into new buffer objects numbered from 1001.
pub struct TestCopier {
    next: u64,
    released: Arc<Mutex<Vec<u64>>>,
}

impl BufferCopier for TestCopier {
    fn copy_front_buffer_from(&mut self, from: FrontBuffer) -> Result<FrontBuffer> {
        self.next += 1;
        let size = from.size();
        drop(from);
        Ok(FrontBuffer::new(Box::new(TestBufferObject {
            handle: self.next,
            size,
            released: self.released.clone(),
        })))
    }
}

pub struct TestCopierFactory {
    pub egl_extensions: String,
    pub gl_extensions: String,
    pub created: Arc<Mutex<Vec<(RawFd, Size<i32, Physical>, Fourcc)>>>,
}

impl Default for TestCopierFactory {
    fn default() -> Self {
        TestCopierFactory {
            egl_extensions: REQUIRED_EGL_EXTENSIONS.join(" "),
            gl_extensions: REQUIRED_GL_EXTENSIONS.join(" "),
            created: Arc::default(),
        }
    }
}

impl BufferCopierFactory for TestCopierFactory {
    fn egl_extensions(&self) -> String {
        self.egl_extensions.clone()
    }

    fn gl_extensions(&self) -> String {
        self.gl_extensions.clone()
    }

    fn create_copier(
        &self,
        drm_fd: RawFd,
        size: Size<i32, Physical>,
        format: Fourcc,
    ) -> Result<Box<dyn BufferCopier>> {
        if drm_fd < 0 {
            return Err(anyhow!("invalid drm fd"));
        }
        self.created.lock().push((drm_fd, size, format));
        Ok(Box::new(TestCopier {
            next: 1000,
            released: Arc::default(),
        }))
    }
}

#[derive(Debug)]
pub struct TestDmabuf {
    planes: Vec<PlaneDescriptor>,
}

impl DmabufBuffer for TestDmabuf {
    fn format(&self) -> Fourcc {
        Fourcc::Xrgb8888
    }

    fn modifier(&self) -> Option<u64> {
        None
    }

    fn planes(&self) -> &[PlaneDescriptor] {
        &self.planes
    }
}

#[derive(Debug)]
pub struct TestBuffer {
    id: u64,
    size: Size<i32, Physical>,
    dmabuf: Option<TestDmabuf>,
}

impl TestBuffer {
    /// A dma-buf backed buffer, its plane fd is the buffer id.
    pub fn dmabuf(id: u64, size: impl Into<Size<i32, Physical>>) -> Arc<TestBuffer> {
        let size = size.into();
        Arc::new(TestBuffer {
            id,
            size,
            dmabuf: Some(TestDmabuf {
                planes: vec![PlaneDescriptor {
                    fd: id as RawFd,
                    stride: size.w as u32 * 4,
                    offset: 0,
                }],
            }),
        })
    }

    pub fn shm(id: u64, size: impl Into<Size<i32, Physical>>) -> Arc<TestBuffer> {
        Arc::new(TestBuffer {
            id,
            size: size.into(),
            dmabuf: None,
        })
    }
}

impl Buffer for TestBuffer {
    fn id(&self) -> BufferId {
        BufferId(self.id)
    }

    fn size(&self) -> Size<i32, Physical> {
        self.size
    }

    fn format(&self) -> Fourcc {
        Fourcc::Xrgb8888
    }

    fn dmabuf(&self) -> Option<&dyn DmabufBuffer> {
        self.dmabuf.as_ref().map(|d| d as &dyn DmabufBuffer)
    }
}

pub struct TestRenderable {
    buffer: Arc<TestBuffer>,
    pub position: Rectangle<i32, Logical>,
    pub transform: Transform,
    pub alpha: f32,
    pub shaped: bool,
}

impl TestRenderable {
    pub fn new(buffer: Arc<TestBuffer>, position: Rectangle<i32, Logical>) -> TestRenderable {
        TestRenderable {
            buffer,
            position,
            transform: Transform::Normal,
            alpha: 1.0,
            shaped: false,
        }
    }
}

impl Renderable for TestRenderable {
    fn buffer(&self) -> Arc<dyn Buffer> {
        self.buffer.clone()
    }

    fn screen_position(&self) -> Rectangle<i32, Logical> {
        self.position
    }

    fn transformation(&self) -> Transform {
        self.transform
    }

    fn alpha(&self) -> f32 {
        self.alpha
    }

    fn shaped(&self) -> bool {
        self.shaped
    }
}
