//! The live gather session and the state it shares with the scheduler

use std::time::Duration;

use forage_types::{CharacterId, ElementId, GatherTiming, ResourceId};
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::events::GatherEvent;
use crate::gateway::{DiscoveryResponse, GatewayError};
use crate::matcher::matches;

use super::{Effect, GatherTimer, Outbox, TickOutcome, Wake};

/// The one resource currently being worked on
#[derive(Debug, Clone)]
pub struct GatherSession {
    pub target: ResourceId,
    pub selected: Vec<ElementId>,
    /// Opened by auto-gather rather than the player
    pub auto: bool,
    /// Parent of every continuation belonging to this session
    token: CancellationToken,
}

impl GatherSession {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// How a discovery result was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Gathered {
        resource: ResourceId,
        newly_discovered: bool,
    },
    Failed {
        resource: ResourceId,
    },
    /// The run was torn down before the result came back
    Stale,
}

/// Catalog, session and timer, plus the outbox every change is reported to.
///
/// Both manual play and auto-gather drive the same workbench, which is what
/// keeps the single-active-run rule structural.
#[derive(Debug)]
pub struct Workbench {
    catalog: Catalog,
    session: Option<GatherSession>,
    timer: GatherTimer,
    character: CharacterId,
    timing: GatherTiming,
    pub(crate) outbox: Outbox,
}

impl Workbench {
    pub fn new(catalog: Catalog, character: CharacterId, timing: GatherTiming) -> Self {
        Self {
            catalog,
            session: None,
            timer: GatherTimer::new(&timing),
            character,
            timing,
            outbox: Outbox::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> Option<&GatherSession> {
        self.session.as_ref()
    }

    pub fn timer(&self) -> &GatherTimer {
        &self.timer
    }

    pub fn character(&self) -> &CharacterId {
        &self.character
    }

    pub fn timing(&self) -> &GatherTiming {
        &self.timing
    }

    /// Replace any current session with a fresh one on `target`.
    ///
    /// With a `parent` token the session is cancelled along with it.
    pub fn open_session(
        &mut self,
        target: ResourceId,
        parent: Option<&CancellationToken>,
        auto: bool,
    ) {
        self.reset_session();

        let token = parent
            .map(CancellationToken::child_token)
            .unwrap_or_else(CancellationToken::new);
        self.outbox.event(GatherEvent::ResourceSelected {
            resource: target.clone(),
        });
        self.session = Some(GatherSession {
            target,
            selected: Vec::new(),
            auto,
            token,
        });
    }

    /// Stop the timer and drop the session. Returns the old target.
    pub fn reset_session(&mut self) -> Option<ResourceId> {
        if let Some(resource) = self.timer.resource().cloned()
            && self.timer.stop()
        {
            self.outbox.event(GatherEvent::GatherCancelled { resource });
        }

        let session = self.session.take()?;
        session.token.cancel();
        self.outbox.event(GatherEvent::ResourceDeselected {
            resource: session.target.clone(),
        });
        Some(session.target)
    }

    pub fn push_element(&mut self, element: ElementId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.selected.push(element);
        self.selection_changed();
    }

    /// Remove one occurrence of `element`. Returns false if it wasn't selected.
    pub fn remove_element(&mut self, element: &ElementId) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(pos) = session.selected.iter().position(|e| e == element) else {
            return false;
        };
        session.selected.remove(pos);
        self.selection_changed();
        true
    }

    pub fn clear_elements(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.selected.is_empty() {
            return;
        }
        session.selected.clear();
        self.selection_changed();
    }

    fn selection_changed(&mut self) {
        if let Some(session) = &self.session {
            self.outbox.event(GatherEvent::ElementsChanged {
                selected: session.selected.clone(),
            });
        }
        self.reevaluate();
    }

    /// Gate the timer on the matcher: start on a match, cancel an
    /// accumulating run on a mismatch. A run waiting on discovery is left alone.
    pub fn reevaluate(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(resource) = self.catalog.resource(&session.target) else {
            return;
        };

        if matches(&resource.required_combination, &session.selected) {
            if let Some(first) = self.timer.start(session.target.clone(), &session.token) {
                self.outbox.event(GatherEvent::GatherStarted {
                    resource: session.target.clone(),
                });
                self.outbox.effect(Effect::Schedule(first));
            }
        } else if self.timer.is_accumulating() {
            self.timer.stop();
            self.outbox.event(GatherEvent::GatherCancelled {
                resource: session.target.clone(),
            });
        }
    }

    /// Queue the next reveal step for the current session
    pub fn schedule_reveal(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        self.outbox.schedule(
            Duration::from_millis(self.timing.reveal_delay_ms),
            session.token.clone(),
            Wake::Reveal,
        );
    }

    /// Reveal the next element of the target's combination. Keeps scheduling
    /// itself until the whole combination is shown, which lets the matcher
    /// start the timer on its own.
    pub fn reveal_next(&mut self, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(resource) = self.catalog.resource(&session.target) else {
            return;
        };
        let Some(next) = resource.required_combination.get(session.selected.len()) else {
            return;
        };

        session.selected.push(next.clone());
        let more = session.selected.len() < resource.required_combination.len();

        self.selection_changed();
        if more {
            self.schedule_reveal();
        }
    }

    pub fn tick(&mut self, token: &CancellationToken) {
        match self.timer.tick(token) {
            TickOutcome::Ignored => {}
            TickOutcome::Advanced {
                resource,
                progress,
                next,
            } => {
                self.outbox
                    .event(GatherEvent::ProgressChanged { resource, progress });
                self.outbox.effect(Effect::Schedule(next));
            }
            TickOutcome::Completed { resource, token } => {
                self.outbox.event(GatherEvent::ProgressChanged {
                    resource: resource.clone(),
                    progress: self.timer.progress(),
                });
                self.outbox.effect(Effect::Discover {
                    resource,
                    character: self.character.clone(),
                    token,
                });
            }
        }
    }

    /// Apply the gateway's answer for a completed run
    pub fn resolve_discovery(
        &mut self,
        resource: &ResourceId,
        token: &CancellationToken,
        result: Result<DiscoveryResponse, GatewayError>,
    ) -> DiscoveryOutcome {
        let verdict = match result {
            Ok(response) if response.success => Ok(()),
            Ok(response) => Err(response
                .message
                .unwrap_or_else(|| "discovery was not accepted".to_string())),
            Err(e) => Err(e.to_string()),
        };

        let current = !token.is_cancelled()
            && self.timer.is_complete()
            && self.timer.resource() == Some(resource);

        if !current {
            // Discoveries cannot be undone, so a late success still counts
            if verdict.is_ok() && self.catalog.mark_discovered(resource) {
                tracing::info!(%resource, "Recorded discovery that finished after its run was cancelled");
                let name = self.resource_name(resource);
                self.outbox.event(GatherEvent::ResourceDiscovered {
                    resource: resource.clone(),
                    name,
                });
            }
            tracing::debug!(%resource, "Ignoring stale discovery result");
            return DiscoveryOutcome::Stale;
        }

        self.timer.finish();
        let auto = self.session.as_ref().is_some_and(|s| s.auto);

        let outcome = match verdict {
            Ok(()) => {
                let newly_discovered = self.catalog.mark_discovered(resource);
                let name = self.resource_name(resource);
                tracing::info!(%resource, newly_discovered, auto, "Resource gathered");
                self.outbox.event(GatherEvent::ResourceGathered {
                    resource: resource.clone(),
                    name,
                    newly_discovered,
                    auto,
                });
                DiscoveryOutcome::Gathered {
                    resource: resource.clone(),
                    newly_discovered,
                }
            }
            Err(message) => {
                tracing::warn!(%resource, %message, auto, "Discovery failed");
                self.outbox.event(GatherEvent::DiscoveryFailed {
                    resource: resource.clone(),
                    message,
                });
                DiscoveryOutcome::Failed {
                    resource: resource.clone(),
                }
            }
        };

        self.reset_session();
        outcome
    }

    fn resource_name(&self, resource: &ResourceId) -> String {
        self.catalog
            .resource(resource)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| resource.to_string())
    }

    pub fn progress(&self) -> u8 {
        self.timer.progress()
    }
}
