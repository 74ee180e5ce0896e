// SPDX-License-Identifier: GPL-3.0-only

use indexmap::IndexMap;
use smithay::{
    backend::allocator::Fourcc,
    utils::{Logical, Physical, Point, Raw, Rectangle, Size, Transform},
};
use std::fmt;

/// Identifier of an output inside a single [`DisplayConfiguration`] snapshot.
///
/// Ids are only meaningful within the snapshot that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputId(pub u32);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output-{}", self.0)
    }
}

/// Identifier of the backend (graphics card) owning an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub size: Size<i32, Physical>,
    /// Refresh rate in millihertz
    pub refresh_mhz: u32,
}

impl Mode {
    pub fn new(size: impl Into<Size<i32, Physical>>, refresh_mhz: u32) -> Mode {
        Mode {
            size: size.into(),
            refresh_mhz,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PowerMode {
    #[default]
    On,
    Standby,
    Suspend,
    Off,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GammaCurves {
    pub red: Vec<u16>,
    pub green: Vec<u16>,
    pub blue: Vec<u16>,
}

impl GammaCurves {
    pub fn is_empty(&self) -> bool {
        self.red.is_empty() && self.green.is_empty() && self.blue.is_empty()
    }
}

/// State of a single physical output as reported by, or requested from, its backend.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub id: OutputId,
    /// Backend this output belongs to. Decides which backend receives it on apply.
    pub card_id: CardId,
    /// Connector name, e.g. `eDP-1`
    pub name: String,
    pub connected: bool,
    pub used: bool,
    pub pixel_formats: Vec<Fourcc>,
    pub modes: Vec<Mode>,
    pub preferred_mode_index: usize,
    pub current_mode_index: Option<usize>,
    pub physical_size_mm: Size<i32, Raw>,
    pub top_left: Point<i32, Logical>,
    pub current_format: Fourcc,
    pub power_mode: PowerMode,
    pub orientation: Transform,
    pub scale: f64,
    pub gamma_supported: bool,
    pub gamma: GammaCurves,
}

impl OutputConfig {
    pub fn current_mode(&self) -> Option<&Mode> {
        self.current_mode_index.and_then(|idx| self.modes.get(idx))
    }

    pub fn preferred_mode(&self) -> Option<&Mode> {
        self.modes.get(self.preferred_mode_index)
    }

    /// Area covered by this output in the logical layout.
    pub fn extents(&self) -> Rectangle<i32, Logical> {
        let Some(mode) = self.current_mode() else {
            return Rectangle::new(self.top_left, Size::from((0, 0)));
        };

        let size = self.orientation.transform_size(mode.size);
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        let logical = Size::<i32, Logical>::from((
            (size.w as f64 / scale).round() as i32,
            (size.h as f64 / scale).round() as i32,
        ));
        Rectangle::new(self.top_left, logical)
    }

    pub fn valid(&self) -> bool {
        if !self.used {
            return true;
        }

        self.connected
            && self.current_mode().is_some()
            && self.pixel_formats.contains(&self.current_format)
            && self.scale > 0.0
    }
}

/// A snapshot of the configuration of every output of a display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayConfiguration {
    outputs: Vec<OutputConfig>,
}

impl DisplayConfiguration {
    pub fn new(outputs: Vec<OutputConfig>) -> DisplayConfiguration {
        DisplayConfiguration { outputs }
    }

    pub fn outputs(&self) -> &[OutputConfig] {
        &self.outputs
    }

    pub fn into_outputs(self) -> Vec<OutputConfig> {
        self.outputs
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn for_each_output(&self, mut f: impl FnMut(&OutputConfig)) {
        for output in &self.outputs {
            f(output);
        }
    }

    pub fn for_each_output_mut(&mut self, mut f: impl FnMut(&mut OutputConfig)) {
        for output in &mut self.outputs {
            f(output);
        }
    }

    pub fn output(&self, id: OutputId) -> Option<&OutputConfig> {
        self.outputs.iter().find(|o| o.id == id)
    }

    pub fn output_mut(&mut self, id: OutputId) -> Option<&mut OutputConfig> {
        self.outputs.iter_mut().find(|o| o.id == id)
    }

    /// Cards referenced by this configuration, in order of first appearance.
    pub fn cards(&self) -> Vec<CardId> {
        self.partition_by_card().into_keys().collect()
    }

    /// Splits the configuration into one slice per card.
    ///
    /// Cards keep the order in which they first appear, outputs keep their relative
    /// order within a card.
    pub fn partition_by_card(&self) -> IndexMap<CardId, DisplayConfiguration> {
        let mut slices = IndexMap::<CardId, DisplayConfiguration>::new();
        for output in &self.outputs {
            slices
                .entry(output.card_id)
                .or_default()
                .outputs
                .push(output.clone());
        }
        slices
    }

    pub fn valid(&self) -> bool {
        self.outputs.iter().all(OutputConfig::valid)
    }
}

impl FromIterator<OutputConfig> for DisplayConfiguration {
    fn from_iter<T: IntoIterator<Item = OutputConfig>>(iter: T) -> Self {
        DisplayConfiguration {
            outputs: iter.into_iter().collect(),
        }
    }
}
