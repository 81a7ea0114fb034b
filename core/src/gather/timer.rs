//! Single-run progress accumulator
//!
//! `Idle → Accumulating → Complete → Idle`. At most one run exists at a
//! time: `start` is refused unless the timer is idle.

use std::time::Duration;

use forage_types::{GatherTiming, ResourceId};
use tokio_util::sync::CancellationToken;

use super::{Continuation, Wake};

pub const MAX_PROGRESS: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Accumulating {
        resource: ResourceId,
    },
    /// Progress hit 100; waiting on the discovery result
    Complete {
        resource: ResourceId,
    },
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Cancelled token or nothing running
    Ignored,
    Advanced {
        resource: ResourceId,
        progress: u8,
        next: Continuation,
    },
    Completed {
        resource: ResourceId,
        /// Token of the finished run, carried by the discovery request
        token: CancellationToken,
    },
}

#[derive(Debug)]
pub struct GatherTimer {
    state: TimerState,
    progress: u8,
    step: u8,
    interval: Duration,
    run_token: Option<CancellationToken>,
}

impl GatherTimer {
    pub fn new(timing: &GatherTiming) -> Self {
        Self {
            state: TimerState::Idle,
            progress: 0,
            step: timing.progress_step.max(1),
            interval: Duration::from_millis(timing.tick_interval_ms),
            run_token: None,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_idle(&self) -> bool {
        self.state == TimerState::Idle
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, TimerState::Accumulating { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, TimerState::Complete { .. })
    }

    /// Resource of the current run, if any
    pub fn resource(&self) -> Option<&ResourceId> {
        match &self.state {
            TimerState::Idle => None,
            TimerState::Accumulating { resource } | TimerState::Complete { resource } => {
                Some(resource)
            }
        }
    }

    /// Begin a run. Returns the first tick to schedule, or None if a run is
    /// already in progress. The run token is a child of `parent`.
    pub fn start(
        &mut self,
        resource: ResourceId,
        parent: &CancellationToken,
    ) -> Option<Continuation> {
        if !self.is_idle() {
            return None;
        }

        let token = parent.child_token();
        self.run_token = Some(token.clone());
        self.progress = 0;
        self.state = TimerState::Accumulating { resource };

        Some(Continuation {
            delay: self.interval,
            token,
            wake: Wake::Tick,
        })
    }

    pub fn tick(&mut self, token: &CancellationToken) -> TickOutcome {
        if token.is_cancelled() {
            return TickOutcome::Ignored;
        }
        let TimerState::Accumulating { resource } = &self.state else {
            return TickOutcome::Ignored;
        };
        let resource = resource.clone();

        self.progress = self.progress.saturating_add(self.step).min(MAX_PROGRESS);

        if self.progress < MAX_PROGRESS {
            return TickOutcome::Advanced {
                resource,
                progress: self.progress,
                next: Continuation {
                    delay: self.interval,
                    token: token.clone(),
                    wake: Wake::Tick,
                },
            };
        }

        self.state = TimerState::Complete {
            resource: resource.clone(),
        };
        TickOutcome::Completed {
            resource,
            token: token.clone(),
        }
    }

    /// Leave `Complete` once the discovery result has been handled
    pub fn finish(&mut self) {
        if self.is_complete() {
            self.reset();
        }
    }

    /// Cancel whatever is running. Returns false if already idle.
    pub fn stop(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        self.reset();
        true
    }

    fn reset(&mut self) {
        if let Some(token) = self.run_token.take() {
            token.cancel();
        }
        self.progress = 0;
        self.state = TimerState::Idle;
    }
}
