//! Round-robin auto-gather
//!
//! Cycles over up to three discovered resources in the order the player
//! picked them, revealing each combination, letting the timer run and
//! counting completions until stopped:
//!
//! ```text
//!  STOPPED ──start──► RUNNING ─────────────────────────────stop──► STOPPED
//!                       │
//!                       ├─ reveal head's elements (one per reveal delay)
//!                       ├─ timer runs, discovery resolves
//!                       ├─ pop head, update stats
//!                       └─ queue empty? → cycle++, reseed after cycle delay
//!                                  else → next head after resource delay
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use forage_types::{AutoFailurePolicy, GatherTiming, ResourceId};
use hashbrown::HashMap;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::error::ValidationError;
use crate::events::GatherEvent;

use super::{DiscoveryOutcome, Wake, Workbench};

/// Hard limit on the auto-gather set, whatever the config says
pub const MAX_AUTO_RESOURCES: usize = 3;

fn auto_cap(configured: usize) -> usize {
    let cap = configured.clamp(1, MAX_AUTO_RESOURCES);
    if cap != configured {
        tracing::warn!(configured, cap, "max_auto_resources out of range, clamping");
    }
    cap
}

/// Resources picked for auto-gather, in selection order
#[derive(Debug, Clone)]
pub struct AutoGatherSelection {
    members: Vec<ResourceId>,
    max: usize,
}

impl AutoGatherSelection {
    pub fn new(max: usize) -> Self {
        Self {
            members: Vec::with_capacity(max),
            max,
        }
    }

    pub fn members(&self) -> &[ResourceId] {
        &self.members
    }

    pub fn contains(&self, resource: &ResourceId) -> bool {
        self.members.contains(resource)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Add or remove `resource`. Returns true if it was added.
    ///
    /// Only discovered resources may join, and never more than `max`.
    pub fn toggle(
        &mut self,
        resource: &ResourceId,
        catalog: &Catalog,
    ) -> Result<bool, ValidationError> {
        if let Some(pos) = self.members.iter().position(|m| m == resource) {
            self.members.remove(pos);
            return Ok(false);
        }

        let entry = catalog
            .resource(resource)
            .ok_or_else(|| ValidationError::UnknownResource(resource.clone()))?;
        if !entry.discovered {
            return Err(ValidationError::NotDiscovered(resource.clone()));
        }
        if self.members.len() >= self.max {
            return Err(ValidationError::AutoGatherFull { max: self.max });
        }

        self.members.push(resource.clone());
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatherStats {
    pub total_gathered: u64,
    pub cycles_completed: u64,
    pub per_resource: HashMap<ResourceId, u64>,
    /// Discovery failures; not part of `total_gathered`
    pub failed_attempts: u64,
}

impl GatherStats {
    fn for_members(members: &[ResourceId]) -> Self {
        Self {
            per_resource: members.iter().map(|id| (id.clone(), 0)).collect(),
            ..Self::default()
        }
    }

    fn record_gather(&mut self, resource: &ResourceId) {
        *self.per_resource.entry(resource.clone()).or_insert(0) += 1;
        self.total_gathered += 1;
    }

    pub fn count(&self, resource: &ResourceId) -> u64 {
        self.per_resource.get(resource).copied().unwrap_or(0)
    }
}

/// State that only exists while auto-gather is running
#[derive(Debug, Clone)]
pub struct AutoGatherRun {
    original_order: Vec<ResourceId>,
    queue: VecDeque<ResourceId>,
    stats: GatherStats,
    token: CancellationToken,
}

impl AutoGatherRun {
    pub fn original_order(&self) -> &[ResourceId] {
        &self.original_order
    }

    /// Resources still to be gathered this cycle, head first
    pub fn queue(&self) -> &VecDeque<ResourceId> {
        &self.queue
    }

    pub fn current(&self) -> Option<&ResourceId> {
        self.queue.front()
    }

    pub fn stats(&self) -> &GatherStats {
        &self.stats
    }
}

enum AfterDiscovery {
    Advance,
    Halt,
}

#[derive(Debug)]
pub struct AutoGatherScheduler {
    selection: AutoGatherSelection,
    run: Option<AutoGatherRun>,
    policy: AutoFailurePolicy,
    resource_delay: Duration,
    cycle_delay: Duration,
}

impl AutoGatherScheduler {
    pub fn new(timing: &GatherTiming) -> Self {
        Self {
            selection: AutoGatherSelection::new(auto_cap(timing.max_auto_resources)),
            run: None,
            policy: timing.auto_failure_policy,
            resource_delay: Duration::from_millis(timing.inter_resource_delay_ms),
            cycle_delay: Duration::from_millis(timing.inter_cycle_delay_ms),
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn run(&self) -> Option<&AutoGatherRun> {
        self.run.as_ref()
    }

    pub fn selection(&self) -> &AutoGatherSelection {
        &self.selection
    }

    pub fn toggle_member(
        &mut self,
        resource: &ResourceId,
        catalog: &Catalog,
    ) -> Result<bool, ValidationError> {
        self.selection.toggle(resource, catalog)
    }

    /// Begin cycling over the selection. No-op if already running.
    pub fn start(&mut self, bench: &mut Workbench) -> Result<(), ValidationError> {
        if self.is_running() {
            return Ok(());
        }

        let order: Vec<ResourceId> = self
            .selection
            .members()
            .iter()
            .filter(|id| bench.catalog().resource(id).is_some_and(|r| r.discovered))
            .cloned()
            .collect();
        if order.is_empty() {
            return Err(ValidationError::NoResourcesSelected);
        }

        bench.reset_session();

        tracing::info!(resources = ?order, "Auto-gather started");
        bench.outbox.event(GatherEvent::AutoGatherStarted {
            resources: order.clone(),
        });

        self.run = Some(AutoGatherRun {
            stats: GatherStats::for_members(&order),
            queue: order.iter().cloned().collect(),
            original_order: order,
            token: CancellationToken::new(),
        });
        self.begin_head(bench);
        Ok(())
    }

    /// Cancel everything and return the final stats, or None if not running
    pub fn stop(&mut self, bench: &mut Workbench) -> Option<GatherStats> {
        let run = self.run.take()?;
        run.token.cancel();
        bench.reset_session();

        tracing::info!(
            total = run.stats.total_gathered,
            cycles = run.stats.cycles_completed,
            "Auto-gather stopped"
        );
        bench.outbox.event(GatherEvent::AutoGatherStopped {
            total_gathered: run.stats.total_gathered,
        });
        Some(run.stats)
    }

    /// Resume after an inter-resource or inter-cycle delay
    pub fn wake(&mut self, wake: Wake, token: &CancellationToken, bench: &mut Workbench) {
        if token.is_cancelled() {
            return;
        }
        let Some(run) = self.run.as_mut() else {
            return;
        };

        match wake {
            Wake::NextCycle => {
                run.queue = run.original_order.iter().cloned().collect();
            }
            Wake::NextResource => {}
            Wake::Tick | Wake::Reveal => return,
        }
        self.begin_head(bench);
    }

    /// Book-keeping after the workbench applied a discovery result
    pub fn on_discovery(&mut self, outcome: &DiscoveryOutcome, bench: &mut Workbench) {
        let Some(run) = self.run.as_mut() else {
            return;
        };

        let next = match outcome {
            DiscoveryOutcome::Stale => return,
            DiscoveryOutcome::Gathered { resource, .. } => {
                if run.queue.front() != Some(resource) {
                    return;
                }
                run.stats.record_gather(resource);
                run.queue.pop_front();
                AfterDiscovery::Advance
            }
            DiscoveryOutcome::Failed { resource } => {
                if run.queue.front() != Some(resource) {
                    return;
                }
                run.stats.failed_attempts += 1;
                match self.policy {
                    AutoFailurePolicy::Skip => {
                        run.queue.pop_front();
                        AfterDiscovery::Advance
                    }
                    AutoFailurePolicy::Retry => AfterDiscovery::Advance,
                    AutoFailurePolicy::Halt => AfterDiscovery::Halt,
                }
            }
        };

        match next {
            AfterDiscovery::Advance => self.advance(bench),
            AfterDiscovery::Halt => {
                self.stop(bench);
            }
        }
    }

    fn advance(&mut self, bench: &mut Workbench) {
        let Some(run) = self.run.as_mut() else {
            return;
        };

        if run.queue.is_empty() {
            run.stats.cycles_completed += 1;
            bench.outbox.event(GatherEvent::CycleCompleted {
                cycles_completed: run.stats.cycles_completed,
            });
            bench
                .outbox
                .schedule(self.cycle_delay, run.token.clone(), Wake::NextCycle);
        } else {
            bench
                .outbox
                .schedule(self.resource_delay, run.token.clone(), Wake::NextResource);
        }
    }

    fn begin_head(&mut self, bench: &mut Workbench) {
        let Some(run) = &self.run else {
            return;
        };
        let Some(head) = run.queue.front().cloned() else {
            return;
        };
        let empty_combination = bench
            .catalog()
            .resource(&head)
            .is_some_and(|r| r.required_combination.is_empty());

        bench.open_session(head, Some(&run.token), true);
        if empty_combination {
            bench.reevaluate();
        } else {
            bench.schedule_reveal();
        }
    }
}
