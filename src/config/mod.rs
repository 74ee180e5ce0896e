// SPDX-License-Identifier: GPL-3.0-only

use std::{path::PathBuf, time::Duration};

use cosmic_mux_config::{load_config, BypassOption, MuxConfig};
use tracing::{debug, info};

use crate::{
    backend::policy::{policy_for_layout, DisplayConfigurationPolicy},
    utils::env::{bool_var, millis_var},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub mux: MuxConfig,
}

/// Environment variables taking precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub disable_direct_scanout: Option<bool>,
    pub composite_render_budget: Option<Duration>,
    pub bypass_render_budget: Option<Duration>,
}

impl EnvOverrides {
    pub fn from_env() -> EnvOverrides {
        EnvOverrides {
            disable_direct_scanout: bool_var("COSMIC_DISABLE_DIRECT_SCANOUT"),
            composite_render_budget: millis_var("COSMIC_COMPOSITE_RENDER_BUDGET_MS"),
            bypass_render_budget: millis_var("COSMIC_BYPASS_RENDER_BUDGET_MS"),
        }
    }

    pub fn apply(&self, config: &mut MuxConfig) {
        if self.disable_direct_scanout == Some(true) {
            config.bypass = BypassOption::Prohibited;
        }
        if let Some(budget) = self.composite_render_budget {
            config.composite_render_budget_ms = budget.as_millis() as u64;
        }
        if let Some(budget) = self.bypass_render_budget {
            config.bypass_render_budget_ms = budget.as_millis() as u64;
        }
    }
}

impl Config {
    pub fn load() -> Config {
        let xdg = xdg::BaseDirectories::new().ok();
        let mut config = Config {
            mux: Self::load_static(xdg.as_ref()),
        };
        EnvOverrides::from_env().apply(&mut config.mux);
        debug!(?config, "Configuration loaded");
        config
    }

    fn locations(xdg: Option<&xdg::BaseDirectories>) -> Vec<PathBuf> {
        let mut locations = if let Some(base) = xdg {
            vec![
                base.get_config_file("cosmic-mux.ron"),
                base.get_config_file("cosmic-mux/config.ron"),
            ]
        } else {
            Vec::with_capacity(1)
        };
        locations.push(PathBuf::from("/etc/cosmic-mux/config.ron"));
        locations
    }

    fn load_static(xdg: Option<&xdg::BaseDirectories>) -> MuxConfig {
        for path in Self::locations(xdg) {
            debug!("Trying config location: {}", path.display());
            if path.exists() {
                info!("Using config at {}", path.display());
                return load_config(Some(path));
            }
        }

        MuxConfig::default()
    }

    pub fn bypass(&self) -> BypassOption {
        self.mux.bypass
    }

    pub fn composite_render_budget(&self) -> Duration {
        Duration::from_millis(self.mux.composite_render_budget_ms)
    }

    pub fn bypass_render_budget(&self) -> Duration {
        Duration::from_millis(self.mux.bypass_render_budget_ms)
    }

    /// Policy laying out outputs when the logical display is created.
    pub fn layout_policy(&self) -> Box<dyn DisplayConfigurationPolicy> {
        policy_for_layout(self.mux.initial_layout)
    }
}
