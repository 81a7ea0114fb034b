//! Notifications emitted by the gathering engine
//!
//! Every state change and every journal-worthy moment is a [`GatherEvent`].
//! Listeners registered on the controller see them in emission order.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use forage_types::{ElementId, ResourceId};
use tokio::sync::{broadcast, mpsc};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq)]
pub enum GatherEvent {
    // ─── Journal ────────────────────────────────────────────────────────────
    AutoGatherStarted {
        resources: Vec<ResourceId>,
    },
    AutoGatherStopped {
        total_gathered: u64,
    },
    ResourceGathered {
        resource: ResourceId,
        name: String,
        /// True the first time this resource is discovered
        newly_discovered: bool,
        auto: bool,
    },
    /// A discovery confirmed after its run was cancelled. Not a gather:
    /// stats and the auto-gather queue are unaffected.
    ResourceDiscovered {
        resource: ResourceId,
        name: String,
    },
    DiscoveryFailed {
        resource: ResourceId,
        message: String,
    },
    CycleCompleted {
        cycles_completed: u64,
    },
    Rejected(ValidationError),

    // ─── State ──────────────────────────────────────────────────────────────
    ResourceSelected {
        resource: ResourceId,
    },
    ResourceDeselected {
        resource: ResourceId,
    },
    ElementsChanged {
        selected: Vec<ElementId>,
    },
    GatherStarted {
        resource: ResourceId,
    },
    ProgressChanged {
        resource: ResourceId,
        progress: u8,
    },
    GatherCancelled {
        resource: ResourceId,
    },
    AutoMembershipChanged {
        members: Vec<ResourceId>,
    },
}

impl GatherEvent {
    /// Human-readable journal text, or None for state-only events
    pub fn journal_line(&self) -> Option<String> {
        match self {
            Self::AutoGatherStarted { resources } => Some(format!(
                "Auto-gather started for {} resource{}",
                resources.len(),
                if resources.len() == 1 { "" } else { "s" }
            )),
            Self::AutoGatherStopped { total_gathered } => Some(format!(
                "Auto-gather stopped after gathering {} resources",
                total_gathered
            )),
            Self::ResourceGathered {
                name,
                newly_discovered: true,
                ..
            } => Some(format!("Discovered {}!", name)),
            Self::ResourceGathered { name, .. } => Some(format!("Gathered {}", name)),
            Self::ResourceDiscovered { name, .. } => Some(format!("Discovered {}!", name)),
            Self::DiscoveryFailed { resource, message } => {
                Some(format!("Failed to gather {}: {}", resource, message))
            }
            Self::CycleCompleted { cycles_completed } => {
                Some(format!("Auto-gather cycle {} complete", cycles_completed))
            }
            Self::Rejected(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

/// Receives engine events
pub trait GatherListener {
    fn on_event(&mut self, event: &GatherEvent);
}

impl GatherListener for mpsc::UnboundedSender<GatherEvent> {
    fn on_event(&mut self, event: &GatherEvent) {
        // Receiver gone just means nobody is listening anymore
        let _ = self.send(event.clone());
    }
}

impl GatherListener for broadcast::Sender<GatherEvent> {
    fn on_event(&mut self, event: &GatherEvent) {
        let _ = self.send(event.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub timestamp: NaiveDateTime,
    pub message: String,
}

/// Rolling journal of human-readable events, oldest dropped first
#[derive(Debug, Clone)]
pub struct Journal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
}

impl Journal {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(JournalEntry {
            timestamp: chrono::Local::now().naive_local(),
            message,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl GatherListener for Journal {
    fn on_event(&mut self, event: &GatherEvent) {
        if let Some(line) = event.journal_line() {
            self.push(line);
        }
    }
}
