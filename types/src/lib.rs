//! Shared types for forage
//!
//! Kept free of runtime dependencies so that config files, the engine and
//! any front-end agree on the same serde representation.

pub mod formatting;

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// Catalog token for a selectable element. Equality is the only thing
    /// the matcher looks at.
    ElementId
);
opaque_id!(
    /// Catalog token for a gatherable resource
    ResourceId
);
opaque_id!(
    /// Character the discoveries are persisted for
    CharacterId
);

// ─────────────────────────────────────────────────────────────────────────────
// Rarity
// ─────────────────────────────────────────────────────────────────────────────

/// How rare a resource is. Purely informational for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timing
// ─────────────────────────────────────────────────────────────────────────────

/// What auto-gather does when a discovery call fails for the current resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoFailurePolicy {
    /// Drop the resource for this cycle and move on
    #[default]
    Skip,
    /// Keep it at the head of the queue and try again after the usual delay
    Retry,
    /// Stop auto-gather entirely
    Halt,
}

/// Cadence and limits of the gathering engine.
///
/// All durations are milliseconds. Every field has a default, so a config
/// file only needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherTiming {
    /// Interval between progress ticks
    pub tick_interval_ms: u64,
    /// Progress added per tick (progress runs 0..=100)
    pub progress_step: u8,
    /// Delay before each element of a known combination is revealed
    pub reveal_delay_ms: u64,
    /// Pause between two resources within a cycle
    pub inter_resource_delay_ms: u64,
    /// Pause before a new cycle starts
    pub inter_cycle_delay_ms: u64,
    /// Cap on resources selected for auto-gather
    pub max_auto_resources: usize,
    pub auto_failure_policy: AutoFailurePolicy,
}

impl Default for GatherTiming {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            progress_step: 3,
            reveal_delay_ms: 200,
            inter_resource_delay_ms: 500,
            inter_cycle_delay_ms: 500,
            max_auto_resources: 3,
            auto_failure_policy: AutoFailurePolicy::Skip,
        }
    }
}

impl GatherTiming {
    /// Number of ticks a full run takes from 0 to 100
    pub fn ticks_per_run(&self) -> u32 {
        let step = u32::from(self.progress_step.max(1));
        100u32.div_ceil(step)
    }
}
