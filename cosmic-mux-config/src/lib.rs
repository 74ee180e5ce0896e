// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use std::{fs::OpenOptions, path::Path};
use tracing::warn;

pub mod output;

pub use output::{BypassOption, DisplayLayout};

fn default_composite_budget() -> u64 {
    50
}

fn default_bypass_budget() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MuxConfig {
    /// Whether client buffers may be scanned out directly.
    #[serde(default)]
    pub bypass: BypassOption,
    /// Layout applied once when the logical display is created.
    #[serde(default)]
    pub initial_layout: DisplayLayout,
    /// Predicted worst case time to render and flip a composited frame.
    #[serde(default = "default_composite_budget")]
    pub composite_render_budget_ms: u64,
    /// Predicted time needed when the next frame is likely bypassed again.
    #[serde(default = "default_bypass_budget")]
    pub bypass_render_budget_ms: u64,
}

impl Default for MuxConfig {
    fn default() -> MuxConfig {
        MuxConfig {
            bypass: BypassOption::default(),
            initial_layout: DisplayLayout::default(),
            composite_render_budget_ms: default_composite_budget(),
            bypass_render_budget_ms: default_bypass_budget(),
        }
    }
}

pub fn load_config(path: Option<impl AsRef<Path>>) -> MuxConfig {
    if let Some(path) = path.as_ref() {
        let path: &Path = path.as_ref();
        if path.exists() {
            match OpenOptions::new().read(true).open(path) {
                Ok(file) => match ron::de::from_reader::<_, MuxConfig>(file) {
                    Ok(config) => return config,
                    Err(err) => {
                        warn!(?err, path = %path.display(), "Malformed mux config, using defaults.");
                    }
                },
                Err(err) => {
                    warn!(?err, path = %path.display(), "Failed to open mux config.");
                }
            }
        }
    }

    MuxConfig::default()
}
