// SPDX-License-Identifier: GPL-3.0-only

use std::{collections::VecDeque, time::Duration};

use tracing::trace;

/// What the last posted frame consisted of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Composite,
    Bypass,
}

/// Frame pacing of a single output group.
///
/// Timestamps are monotonic clock readings as [`Duration`]s.
#[derive(Debug)]
pub struct Timings {
    composite_budget: Duration,
    bypass_budget: Duration,
    recommended_sleep: Duration,

    pending_flip: Option<Duration>,
    pub previous_flips: VecDeque<Duration>,
}

impl Timings {
    const CLEANUP: usize = 360;

    pub fn new(composite_budget: Duration, bypass_budget: Duration) -> Self {
        Self {
            composite_budget,
            bypass_budget,
            recommended_sleep: Duration::ZERO,

            pending_flip: None,
            previous_flips: VecDeque::new(),
        }
    }

    /// Refresh interval of an output refreshing at `max_refresh_rate` Hz.
    pub fn interval_for_rate(max_refresh_rate: u32) -> Option<Duration> {
        (max_refresh_rate > 0).then(|| Duration::from_millis(1000) / max_refresh_rate)
    }

    fn render_budget(&self, kind: FrameKind) -> Duration {
        match kind {
            FrameKind::Composite => self.composite_budget,
            FrameKind::Bypass => self.bypass_budget,
        }
    }

    /// Updates the sleep recommendation after posting a frame of `kind`.
    ///
    /// Without a known `refresh_interval` the caller should not sleep at all.
    pub fn frame_posted(&mut self, kind: FrameKind, refresh_interval: Option<Duration>) -> Duration {
        self.recommended_sleep = match refresh_interval.filter(|interval| !interval.is_zero()) {
            Some(interval) => interval.saturating_sub(self.render_budget(kind)),
            None => Duration::ZERO,
        };
        trace!(?kind, sleep = ?self.recommended_sleep, "Frame posted");
        self.recommended_sleep
    }

    pub fn recommended_sleep(&self) -> Duration {
        self.recommended_sleep
    }

    pub fn flip_scheduled(&mut self, now: Duration) {
        self.pending_flip = Some(now);
    }

    pub fn flip_completed(&mut self, now: Duration) {
        if let Some(scheduled) = self.pending_flip.take() {
            self.previous_flips
                .push_back(now.saturating_sub(scheduled));

            if let Some(overflow) = self.previous_flips.len().checked_sub(Self::CLEANUP * 2) {
                self.previous_flips = self.previous_flips.split_off(overflow + Self::CLEANUP);
            }
        }
    }

    pub fn max_flip_time(&self) -> Duration {
        self.previous_flips
            .iter()
            .copied()
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn avg_flip_time(&self) -> Duration {
        let Some(sum) = self
            .previous_flips
            .iter()
            .try_fold(Duration::ZERO, |acc, x| acc.checked_add(*x))
        else {
            return Duration::ZERO;
        };

        sum.checked_div(self.previous_flips.len() as u32)
            .unwrap_or(Duration::ZERO)
    }
}
