// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

pub fn bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|value| parse_bool(&value))
}

/// Reads a millisecond count, ignoring values that don't parse.
pub fn millis_var(name: &str) -> Option<Duration> {
    parse_millis(&std::env::var(name).ok()?)
}

pub fn parse_bool(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    ["1", "true", "yes", "y"].contains(&value.as_str())
}

pub fn parse_millis(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}
