// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum BypassOption {
    #[default]
    Allowed,
    Prohibited,
}

/// Initial arrangement of the outputs of a freshly created display.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLayout {
    /// Every connected output, left to right.
    #[default]
    SideBySide,
    /// Every connected output showing the same content at the origin.
    Clone,
    /// Only the first connected output.
    Single,
}
