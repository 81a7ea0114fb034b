pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod gather;
pub mod matcher;
pub mod service;

// Re-exports for convenience
pub use catalog::{Catalog, CatalogProvider, Element, FileCatalogProvider, Resource};
pub use config::AppConfig;
pub use error::ValidationError;
pub use events::{GatherEvent, GatherListener, Journal};
pub use gateway::{DiscoveryGateway, DiscoveryResponse, GatewayError};
pub use gather::{GatherSessionController, GatherView};
pub use matcher::matches;
pub use service::{GatherHandle, GatherService};
pub use forage_types::*;
