// SPDX-License-Identifier: GPL-3.0-only

use cosmic_mux_config::DisplayLayout;
use smithay::utils::{Logical, Point, Transform};
use tracing::debug;

use super::configuration::{DisplayConfiguration, OutputConfig, PowerMode};

/// Decides the layout of a display before its first configuration is applied.
pub trait DisplayConfigurationPolicy {
    fn apply_to(&mut self, conf: &mut DisplayConfiguration);
}

/// Leaves the configuration reported by the hardware untouched.
#[derive(Debug, Default)]
pub struct NullDisplayConfigurationPolicy;

impl DisplayConfigurationPolicy for NullDisplayConfigurationPolicy {
    fn apply_to(&mut self, _conf: &mut DisplayConfiguration) {}
}

#[derive(Debug, Default)]
pub struct SideBySideDisplayConfigurationPolicy;

impl DisplayConfigurationPolicy for SideBySideDisplayConfigurationPolicy {
    fn apply_to(&mut self, conf: &mut DisplayConfiguration) {
        let mut max_x = 0;
        conf.for_each_output_mut(|output| {
            if enable_at(output, Point::from((max_x, 0))) {
                max_x += output.extents().size.w;
            }
        });
    }
}

#[derive(Debug, Default)]
pub struct CloneDisplayConfigurationPolicy;

impl DisplayConfigurationPolicy for CloneDisplayConfigurationPolicy {
    fn apply_to(&mut self, conf: &mut DisplayConfiguration) {
        conf.for_each_output_mut(|output| {
            enable_at(output, Point::from((0, 0)));
        });
    }
}

#[derive(Debug, Default)]
pub struct SingleDisplayConfigurationPolicy;

impl DisplayConfigurationPolicy for SingleDisplayConfigurationPolicy {
    fn apply_to(&mut self, conf: &mut DisplayConfiguration) {
        let mut done = false;
        conf.for_each_output_mut(|output| {
            if done {
                disable(output);
            } else {
                done = enable_at(output, Point::from((0, 0)));
            }
        });
    }
}

pub fn policy_for_layout(layout: DisplayLayout) -> Box<dyn DisplayConfigurationPolicy> {
    debug!(?layout, "Selecting initial display layout");
    match layout {
        DisplayLayout::SideBySide => Box::new(SideBySideDisplayConfigurationPolicy),
        DisplayLayout::Clone => Box::new(CloneDisplayConfigurationPolicy),
        DisplayLayout::Single => Box::new(SingleDisplayConfigurationPolicy),
    }
}

// Returns false (and disables the output) if it cannot be lit.
fn enable_at(output: &mut OutputConfig, top_left: Point<i32, Logical>) -> bool {
    if !output.connected || output.modes.is_empty() {
        disable(output);
        return false;
    }

    let mode = if output.preferred_mode_index < output.modes.len() {
        output.preferred_mode_index
    } else {
        0
    };
    output.used = true;
    output.top_left = top_left;
    output.current_mode_index = Some(mode);
    output.power_mode = PowerMode::On;
    output.orientation = Transform::Normal;
    true
}

fn disable(output: &mut OutputConfig) {
    output.used = false;
    output.power_mode = PowerMode::Off;
}
