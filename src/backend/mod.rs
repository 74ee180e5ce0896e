// SPDX-License-Identifier: GPL-3.0-only

use anyhow::Result;
use calloop::channel::{channel, Channel};
use parking_lot::Mutex;
use smithay::utils::{Logical, Rectangle, Transform};
use std::{sync::Arc, time::Duration};
use tracing::debug;

pub mod configuration;
pub mod kms;
pub mod multiplex;
pub mod policy;
pub mod render;
#[cfg(test)]
pub(crate) mod test_utils;

pub use self::configuration::{CardId, DisplayConfiguration, OutputConfig, OutputId};
use self::{kms::PresentError, render::Renderable};

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// Applying a configuration failed and so did restoring the previous one.
    ///
    /// Some backends now run the new configuration and others the old one. The
    /// display must be torn down and recreated.
    #[error("incomplete configuration applied: failed to restore previous configuration on {card}")]
    IncompleteConfigurationApplied { card: CardId },
    /// A backend failed to apply a configuration, as opposed to rejecting it.
    #[error("display backend on {card} failed to apply configuration")]
    Backend {
        card: CardId,
        #[source]
        source: anyhow::Error,
    },
    #[error("a multiplexing display needs at least one display backend")]
    NoBackends,
}

/// Callback invoked by a backend whenever its hardware configuration changed.
pub type ConfigurationChangeHandler = Arc<dyn Fn() + Send + Sync>;

/// Creates a change handler whose invocations arrive on a calloop channel.
///
/// Insert the channel into the compositor's event loop to handle hotplug
/// notifications on the loop's thread instead of the backend's.
pub fn configuration_change_channel() -> (ConfigurationChangeHandler, Channel<()>) {
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    let handler: ConfigurationChangeHandler = Arc::new(move || {
        if let Err(err) = tx.lock().send(()) {
            debug!(?err, "Configuration change channel closed");
        }
    });
    (handler, rx)
}

/// A GL context shared with a display, used by out-of-tree renderers.
pub trait GlContext: Send {
    fn make_current(&self);
    fn release_current(&self);
}

/// One physical display adapter, owning one or more outputs.
pub trait Display: Send {
    /// Current configuration of every output of this display.
    fn configuration(&self) -> DisplayConfiguration;

    /// Applies `conf`, possibly destroying and recreating display buffers.
    fn configure(&mut self, conf: &DisplayConfiguration) -> Result<()>;

    /// Applies `conf` only if that is possible without recreating display buffers.
    ///
    /// Returns `Ok(false)` if the configuration was rejected and the display is
    /// still running its previous configuration.
    fn apply_if_configuration_preserves_display_buffers(
        &mut self,
        conf: &DisplayConfiguration,
    ) -> Result<bool, DisplayError>;

    fn for_each_display_sync_group(&mut self, f: &mut dyn FnMut(&mut dyn DisplaySyncGroup));

    fn register_configuration_change_handler(&mut self, handler: ConfigurationChangeHandler);

    fn pause(&mut self);
    fn resume(&mut self);

    fn create_gl_context(&self) -> Result<Box<dyn GlContext>>;
}

/// Outputs that have to be flipped together, e.g. a set of cloned outputs.
pub trait DisplaySyncGroup {
    fn for_each_display_buffer(&mut self, f: &mut dyn FnMut(&mut dyn DisplayBuffer));

    /// Presents the frame rendered (or selected for bypass) since the last call.
    fn post(&mut self) -> Result<(), PresentError>;

    /// How long the caller may sleep before starting the next frame.
    fn recommended_sleep(&self) -> Duration;
}

/// A render target covering an area of the logical layout.
pub trait DisplayBuffer {
    fn view_area(&self) -> Rectangle<i32, Logical>;

    /// Tries to present one of `renderables` directly instead of compositing.
    ///
    /// Returns `true` if the next [`DisplaySyncGroup::post`] will scan out a
    /// client buffer, in which case the caller should skip rendering.
    fn overlay(&mut self, renderables: &[Arc<dyn Renderable>]) -> bool;

    fn transformation(&self) -> Transform;
    fn set_transformation(&mut self, transform: Transform, area: Rectangle<i32, Logical>);

    fn make_current(&mut self) -> Result<()>;
    fn release_current(&mut self);
    fn swap_buffers(&mut self) -> Result<()>;
}
