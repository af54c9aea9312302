// Configuration: file loading and keep rules

pub mod keep;
mod loader;

pub use keep::KeepRules;
pub use loader::{Config, NamingConfig, SymbolicConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid glob pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid keep rule {rule:?}: {reason}")]
    InvalidKeepRule { rule: String, reason: String },

    #[error("Invalid naming settings: {0}")]
    InvalidNaming(String),
}
