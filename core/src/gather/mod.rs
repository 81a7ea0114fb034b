//! Gathering state machine
//!
//! The engine never sleeps and never performs I/O. Anything that has to
//! happen later, or outside the process, is handed to the runtime as an
//! [`Effect`]:
//!
//! ```text
//!  UI action ──► GatherSessionController ──► matcher gate ──► GatherTimer
//!                        │                                        │
//!                        │◄──── wake(Tick/Reveal/…) ◄── Schedule ─┤
//!                        │                                        │
//!                        │◄──── resolve_discovery ◄──── Discover ─┘
//!                        ▼
//!                AutoGatherScheduler (round-robin over ≤3 resources)
//! ```
//!
//! Every scheduled continuation carries a [`CancellationToken`]. The
//! runtime cannot take a continuation back once scheduled, so the engine
//! checks the token when the continuation fires and ignores it if cancelled.

mod controller;
mod scheduler;
mod session;
mod timer;


pub use controller::{AutoGatherView, GatherSessionController, GatherView};
pub use scheduler::{
    AutoGatherRun, AutoGatherScheduler, AutoGatherSelection, GatherStats, MAX_AUTO_RESOURCES,
};
pub use session::{DiscoveryOutcome, GatherSession, Workbench};
pub use timer::{GatherTimer, TickOutcome, TimerState};

use std::time::Duration;

use forage_types::{CharacterId, ResourceId};
use tokio_util::sync::CancellationToken;

use crate::events::GatherEvent;

/// Which continuation is being resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Advance the active gather run by one step
    Tick,
    /// Reveal the next element of a known combination
    Reveal,
    /// Auto-gather: begin the resource now at the head of the queue
    NextResource,
    /// Auto-gather: reseed the queue and begin a new cycle
    NextCycle,
}

/// A delayed continuation the runtime must deliver back via `wake`
#[derive(Debug, Clone)]
pub struct Continuation {
    pub delay: Duration,
    pub token: CancellationToken,
    pub wake: Wake,
}

#[derive(Debug, Clone)]
pub enum Effect {
    Schedule(Continuation),
    /// Persist a discovery, then report back via `resolve_discovery`
    Discover {
        resource: ResourceId,
        character: CharacterId,
        token: CancellationToken,
    },
}

/// Effects and events produced by one engine operation
#[derive(Debug, Default)]
pub struct Outbox {
    effects: Vec<Effect>,
    events: Vec<GatherEvent>,
}

impl Outbox {
    pub fn schedule(&mut self, delay: Duration, token: CancellationToken, wake: Wake) {
        self.effects.push(Effect::Schedule(Continuation { delay, token, wake }));
    }

    pub fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn event(&mut self, event: GatherEvent) {
        self.events.push(event);
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn take_events(&mut self) -> Vec<GatherEvent> {
        std::mem::take(&mut self.events)
    }
}
