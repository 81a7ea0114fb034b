//! Entry point for the UI layer
//!
//! Validates player actions, routes continuations and discovery results to
//! the workbench and scheduler, and fans events out to listeners.

use forage_types::{CharacterId, ElementId, GatherTiming, ResourceId};
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, CatalogProvider};
use crate::error::ValidationError;
use crate::events::{GatherEvent, GatherListener};
use crate::gateway::{DiscoveryResponse, GatewayError};

use super::{
    AutoGatherScheduler, DiscoveryOutcome, Effect, GatherStats, TimerState, Wake, Workbench,
};

/// Snapshot of everything a front-end displays
#[derive(Debug, Clone, PartialEq)]
pub struct GatherView {
    pub target: Option<ResourceId>,
    pub selected: Vec<ElementId>,
    pub progress: u8,
    pub running: bool,
    pub timer: TimerState,
    pub auto_members: Vec<ResourceId>,
    pub auto: Option<AutoGatherView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoGatherView {
    pub current: Option<ResourceId>,
    pub queue: Vec<ResourceId>,
    pub original_order: Vec<ResourceId>,
    pub stats: GatherStats,
}

pub struct GatherSessionController {
    bench: Workbench,
    scheduler: AutoGatherScheduler,
    listeners: Vec<Box<dyn GatherListener + Send>>,
}

impl GatherSessionController {
    pub fn new(catalog: Catalog, character: CharacterId, timing: GatherTiming) -> Self {
        Self {
            scheduler: AutoGatherScheduler::new(&timing),
            bench: Workbench::new(catalog, character, timing),
            listeners: Vec::new(),
        }
    }

    /// Build from a provider. An unavailable catalog leaves the controller
    /// with nothing to gather rather than failing.
    pub fn from_provider(
        provider: &impl CatalogProvider,
        character: CharacterId,
        timing: GatherTiming,
    ) -> Self {
        let catalog = match provider.load_catalog(&character) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(error = %e, %character, "Catalog unavailable, starting empty");
                Catalog::empty()
            }
        };
        Self::new(catalog, character, timing)
    }

    /// Register a listener to receive every event from now on
    pub fn subscribe(&mut self, listener: Box<dyn GatherListener + Send>) {
        self.listeners.push(listener);
    }

    pub fn catalog(&self) -> &Catalog {
        self.bench.catalog()
    }

    pub fn workbench(&self) -> &Workbench {
        &self.bench
    }

    pub fn scheduler(&self) -> &AutoGatherScheduler {
        &self.scheduler
    }

    pub fn is_auto_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Drain the effects the runtime has to carry out
    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.bench.outbox.take_effects()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Manual play
    // ─────────────────────────────────────────────────────────────────────────

    /// Select a resource to work on. Selecting the active resource again
    /// deselects it. A discovered resource reveals its known combination.
    pub fn select_resource(&mut self, resource: &ResourceId) -> Result<(), ValidationError> {
        let result = self.try_select_resource(resource);
        self.settle(result)
    }

    fn try_select_resource(&mut self, resource: &ResourceId) -> Result<(), ValidationError> {
        self.manual_guard()?;

        if self.bench.session().is_some_and(|s| &s.target == resource) {
            self.bench.reset_session();
            return Ok(());
        }

        let entry = self
            .bench
            .catalog()
            .resource(resource)
            .ok_or_else(|| ValidationError::UnknownResource(resource.clone()))?;
        let discovered = entry.discovered;
        let empty_combination = entry.required_combination.is_empty();

        self.bench.open_session(resource.clone(), None, false);
        if discovered {
            if empty_combination {
                self.bench.reevaluate();
            } else {
                self.bench.schedule_reveal();
            }
        }
        Ok(())
    }

    /// Add `element` if absent, otherwise remove it. Returns whether it is
    /// selected afterwards.
    pub fn toggle_element(&mut self, element: &ElementId) -> Result<bool, ValidationError> {
        let result = self.element_guard(element).map(|_| {
            if self.bench.remove_element(element) {
                false
            } else {
                self.bench.push_element(element.clone());
                true
            }
        });
        self.settle(result)
    }

    /// Append `element`, allowing duplicates
    pub fn add_element(&mut self, element: &ElementId) -> Result<(), ValidationError> {
        let result = self
            .element_guard(element)
            .map(|_| self.bench.push_element(element.clone()));
        self.settle(result)
    }

    /// Remove one occurrence of `element`. Returns false if it wasn't selected.
    pub fn remove_element(&mut self, element: &ElementId) -> Result<bool, ValidationError> {
        let result = self
            .element_guard(element)
            .map(|_| self.bench.remove_element(element));
        self.settle(result)
    }

    pub fn clear_selection(&mut self) -> Result<(), ValidationError> {
        let result = self.selection_guard().map(|_| self.bench.clear_elements());
        self.settle(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auto-gather
    // ─────────────────────────────────────────────────────────────────────────

    /// Add or remove a resource from the auto-gather set. Returns true if added.
    pub fn toggle_auto_member(&mut self, resource: &ResourceId) -> Result<bool, ValidationError> {
        let result = if self.scheduler.is_running() {
            Err(ValidationError::AutoGatherRunning)
        } else {
            self.scheduler
                .toggle_member(resource, self.bench.catalog())
                .inspect(|_| {
                    self.bench.outbox.event(GatherEvent::AutoMembershipChanged {
                        members: self.scheduler.selection().members().to_vec(),
                    });
                })
        };
        self.settle(result)
    }

    /// Start auto-gather if stopped, stop it if running. Returns whether it
    /// is running afterwards.
    pub fn start_or_stop_auto(&mut self) -> Result<bool, ValidationError> {
        if self.scheduler.is_running() {
            self.stop_auto();
            Ok(false)
        } else {
            self.start_auto().map(|_| true)
        }
    }

    pub fn start_auto(&mut self) -> Result<(), ValidationError> {
        let result = self.scheduler.start(&mut self.bench);
        self.settle(result)
    }

    /// Stop auto-gather, returning the final stats if it was running
    pub fn stop_auto(&mut self) -> Option<GatherStats> {
        let stats = self.scheduler.stop(&mut self.bench);
        self.flush();
        stats
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Runtime callbacks
    // ─────────────────────────────────────────────────────────────────────────

    /// Deliver a scheduled continuation. Cancelled ones do nothing.
    pub fn wake(&mut self, wake: Wake, token: &CancellationToken) {
        if token.is_cancelled() {
            tracing::trace!(?wake, "Dropping cancelled continuation");
            return;
        }

        match wake {
            Wake::Tick => self.bench.tick(token),
            Wake::Reveal => self.bench.reveal_next(token),
            Wake::NextResource | Wake::NextCycle => {
                self.scheduler.wake(wake, token, &mut self.bench)
            }
        }
        self.flush();
    }

    /// Deliver the gateway's answer for a `Discover` effect
    pub fn resolve_discovery(
        &mut self,
        resource: &ResourceId,
        token: &CancellationToken,
        result: Result<DiscoveryResponse, GatewayError>,
    ) -> DiscoveryOutcome {
        let outcome = self.bench.resolve_discovery(resource, token, result);
        self.scheduler.on_discovery(&outcome, &mut self.bench);
        self.flush();
        outcome
    }

    pub fn view(&self) -> GatherView {
        let session = self.bench.session();
        GatherView {
            target: session.map(|s| s.target.clone()),
            selected: session.map(|s| s.selected.clone()).unwrap_or_default(),
            progress: self.bench.progress(),
            running: self.bench.timer().is_accumulating(),
            timer: self.bench.timer().state().clone(),
            auto_members: self.scheduler.selection().members().to_vec(),
            auto: self.scheduler.run().map(|run| AutoGatherView {
                current: run.current().cloned(),
                queue: run.queue().iter().cloned().collect(),
                original_order: run.original_order().to_vec(),
                stats: run.stats().clone(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Guards
    // ─────────────────────────────────────────────────────────────────────────

    fn manual_guard(&self) -> Result<(), ValidationError> {
        if self.scheduler.is_running() {
            return Err(ValidationError::AutoGatherRunning);
        }
        Ok(())
    }

    fn selection_guard(&self) -> Result<(), ValidationError> {
        self.manual_guard()?;
        let session = self.bench.session().ok_or(ValidationError::NoActiveResource)?;
        let discovered = self
            .bench
            .catalog()
            .resource(&session.target)
            .is_some_and(|r| r.discovered);
        if discovered {
            return Err(ValidationError::AlreadyDiscovered(session.target.clone()));
        }
        if self.bench.timer().is_complete() {
            return Err(ValidationError::DiscoveryPending(session.target.clone()));
        }
        Ok(())
    }

    fn element_guard(&self, element: &ElementId) -> Result<(), ValidationError> {
        self.selection_guard()?;
        if self.bench.catalog().element(element).is_none() {
            return Err(ValidationError::UnknownElement(element.clone()));
        }
        Ok(())
    }

    /// Report a rejection as a notice, then dispatch everything queued
    fn settle<T>(&mut self, result: Result<T, ValidationError>) -> Result<T, ValidationError> {
        if let Err(err) = &result {
            tracing::debug!(%err, "Rejected action");
            self.bench.outbox.event(GatherEvent::Rejected(err.clone()));
        }
        self.flush();
        result
    }

    fn flush(&mut self) {
        for event in self.bench.outbox.take_events() {
            for listener in &mut self.listeners {
                listener.on_event(&event);
            }
        }
    }
}
