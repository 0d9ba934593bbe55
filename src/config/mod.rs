//! Configuration module
//!
//! Handles loading, validating, and accessing archiver configuration
//! from TOML files, falling back to built-in defaults when no file exists.

mod parser;
mod types;
mod validation;

pub use parser::{load_config, load_or_default};
pub use types::{ArchiveConfig, CatalogConfig, Config, ResourceToggles, UserAgentConfig};
pub use validation::validate;
