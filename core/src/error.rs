use forage_types::{ElementId, ResourceId};

/// A user action the engine refused. Always paired with a `Rejected` notice
/// and never leaves state half-changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("auto-gather is limited to {max} resources")]
    AutoGatherFull { max: usize },
    #[error("'{0}' must be discovered before it can be auto-gathered")]
    NotDiscovered(ResourceId),
    #[error("select at least one discovered resource to auto-gather")]
    NoResourcesSelected,
    #[error("'{0}' is already discovered; its combination is fixed")]
    AlreadyDiscovered(ResourceId),
    #[error("unknown resource '{0}'")]
    UnknownResource(ResourceId),
    #[error("unknown element '{0}'")]
    UnknownElement(ElementId),
    #[error("no resource selected")]
    NoActiveResource,
    #[error("manual gathering is disabled while auto-gather is running")]
    AutoGatherRunning,
    #[error("discovery for '{0}' is still being confirmed")]
    DiscoveryPending(ResourceId),
}
