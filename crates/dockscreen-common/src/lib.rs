//! dockscreen-common — Shared types and errors used across all dockscreen crates.

pub mod error;
pub mod assets;
pub mod target_config;

// Re-export commonly used types
pub use assets::{LigandAsset, TargetDefinition};
pub use error::{AssetDiagnostic, Result, ScreenError};
pub use target_config::{TargetCatalog, TargetEntry};
