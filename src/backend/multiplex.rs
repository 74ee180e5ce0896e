// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use tracing::{debug, error, warn};

use crate::config::Config;

use super::{
    configuration::{CardId, DisplayConfiguration, OutputId},
    policy::DisplayConfigurationPolicy,
    ConfigurationChangeHandler, Display, DisplayError, DisplaySyncGroup, GlContext,
};

/// Presents several display backends (usually one per graphics card) as a
/// single [`Display`].
///
/// Outputs of a snapshot returned by [`Display::configuration`] are numbered
/// from 1 in backend order. Slices handed back to a backend keep the snapshot's
/// ids, backends identify their outputs by card and connector name.
///
/// Once restoring a rejected configuration failed, the display refuses any
/// further configuration and has to be recreated.
pub struct MultiplexingDisplay {
    displays: Vec<Box<dyn Display>>,
    incomplete: Option<CardId>,
}

impl std::fmt::Debug for MultiplexingDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexingDisplay")
            .field("displays", &self.displays.len())
            .field("incomplete", &self.incomplete)
            .finish()
    }
}

impl MultiplexingDisplay {
    /// Takes ownership of `displays` and applies the layout chosen by `policy`.
    pub fn new(
        displays: Vec<Box<dyn Display>>,
        policy: &mut dyn DisplayConfigurationPolicy,
    ) -> Result<MultiplexingDisplay> {
        if displays.is_empty() {
            return Err(DisplayError::NoBackends.into());
        }

        let mut display = MultiplexingDisplay {
            displays,
            incomplete: None,
        };
        let mut conf = display.configuration();
        policy.apply_to(&mut conf);
        display
            .configure(&conf)
            .context("Failed to apply initial display configuration")?;

        Ok(display)
    }

    /// Creates the display with the initial layout configured in `config`.
    pub fn with_config(
        displays: Vec<Box<dyn Display>>,
        config: &Config,
    ) -> Result<MultiplexingDisplay> {
        MultiplexingDisplay::new(displays, &mut *config.layout_policy())
    }

    pub fn backends(&self) -> usize {
        self.displays.len()
    }

    fn check_complete(&self) -> Result<(), DisplayError> {
        match self.incomplete {
            Some(card) => Err(DisplayError::IncompleteConfigurationApplied { card }),
            None => Ok(()),
        }
    }

    /// Slices `conf` into the part owned by each backend, in backend order.
    ///
    /// Backends without any output in `conf` get `None`.
    fn slices_for(&self, conf: &DisplayConfiguration) -> Vec<Option<(CardId, DisplayConfiguration)>> {
        let mut by_card = conf.partition_by_card();
        self.displays
            .iter()
            .map(|display| {
                let cards = display.configuration().cards();
                let slice = cards
                    .iter()
                    .filter_map(|card| by_card.shift_remove(card))
                    .flat_map(DisplayConfiguration::into_outputs)
                    .collect::<DisplayConfiguration>();
                (!slice.is_empty()).then(|| (cards[0], slice))
            })
            .collect()
    }

    /// Applies each slice in order, stopping at the first backend that rejects
    /// or fails to apply its slice.
    fn apply_slices(&mut self, slices: &[Option<(CardId, DisplayConfiguration)>]) -> SliceOutcome {
        for (idx, (display, slice)) in self.displays.iter_mut().zip(slices).enumerate() {
            let Some((card, slice)) = slice else {
                continue;
            };
            match display.apply_if_configuration_preserves_display_buffers(slice) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(%card, "Backend rejected configuration");
                    return SliceOutcome::Rejected(idx);
                }
                Err(err) => {
                    warn!(%card, ?err, "Backend failed to apply configuration");
                    return SliceOutcome::Failed(idx, err);
                }
            }
        }
        SliceOutcome::Applied
    }

    /// Restores `previous` on the first `count` backends.
    ///
    /// Poisons the display if any of them does not take its previous
    /// configuration back.
    fn restore(
        &mut self,
        previous: Vec<Option<(CardId, DisplayConfiguration)>>,
        count: usize,
    ) -> Result<(), DisplayError> {
        warn!("Display configuration not applied, restoring previous configuration");
        let touched = previous.into_iter().take(count).collect::<Vec<_>>();
        let idx = match self.apply_slices(&touched) {
            SliceOutcome::Applied => return Ok(()),
            SliceOutcome::Rejected(idx) | SliceOutcome::Failed(idx, _) => idx,
        };

        let card = touched[idx]
            .as_ref()
            .map(|(card, _)| *card)
            .unwrap_or(CardId(0));
        error!(%card, "Failed to restore previous display configuration");
        self.incomplete = Some(card);
        Err(DisplayError::IncompleteConfigurationApplied { card })
    }
}

enum SliceOutcome {
    Applied,
    /// The backend at this index kept its previous configuration.
    Rejected(usize),
    Failed(usize, DisplayError),
}

impl Display for MultiplexingDisplay {
    fn configuration(&self) -> DisplayConfiguration {
        self.displays
            .iter()
            .flat_map(|display| display.configuration().into_outputs())
            .zip(1..)
            .map(|(mut output, id)| {
                output.id = OutputId(id);
                output
            })
            .collect()
    }

    fn configure(&mut self, conf: &DisplayConfiguration) -> Result<()> {
        self.check_complete()?;
        let slices = self.slices_for(conf);
        for (display, slice) in self.displays.iter_mut().zip(slices) {
            let Some((card, slice)) = slice else {
                continue;
            };
            display
                .configure(&slice)
                .with_context(|| format!("Failed to configure outputs of {}", card))?;
        }
        Ok(())
    }

    #[profiling::function]
    fn apply_if_configuration_preserves_display_buffers(
        &mut self,
        conf: &DisplayConfiguration,
    ) -> Result<bool, DisplayError> {
        self.check_complete()?;
        let previous = self.configuration();
        let previous_slices = self.slices_for(&previous);
        let slices = self.slices_for(conf);

        match self.apply_slices(&slices) {
            SliceOutcome::Applied => Ok(true),
            SliceOutcome::Rejected(idx) => {
                self.restore(previous_slices, idx)?;
                Ok(false)
            }
            SliceOutcome::Failed(idx, err) => {
                self.restore(previous_slices, idx)?;
                Err(err)
            }
        }
    }

    fn for_each_display_sync_group(&mut self, f: &mut dyn FnMut(&mut dyn DisplaySyncGroup)) {
        for display in &mut self.displays {
            display.for_each_display_sync_group(f);
        }
    }

    fn register_configuration_change_handler(&mut self, handler: ConfigurationChangeHandler) {
        for display in &mut self.displays {
            display.register_configuration_change_handler(handler.clone());
        }
    }

    fn pause(&mut self) {
        for display in &mut self.displays {
            display.pause();
        }
    }

    fn resume(&mut self) {
        for display in &mut self.displays {
            display.resume();
        }
    }

    fn create_gl_context(&self) -> Result<Box<dyn GlContext>> {
        self.displays
            .first()
            .ok_or(DisplayError::NoBackends)?
            .create_gl_context()
    }
}
