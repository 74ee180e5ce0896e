// SPDX-License-Identifier: GPL-3.0-only

//! Multiplexing display core.
//!
//! Aggregates any number of per-GPU display backends behind one logical
//! [`backend::Display`] and drives frame presentation (page flips, bounce copies
//! and direct scanout) for every output group of those backends.

pub mod backend;
pub mod config;
pub mod logger;
pub mod utils;

pub use backend::{
    configuration_change_channel, multiplex::MultiplexingDisplay, Display, DisplayBuffer,
    DisplayError, DisplaySyncGroup,
};
pub use config::Config;
