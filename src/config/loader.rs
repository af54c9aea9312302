// Configuration loader

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for an obfuscation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Keep rules: entries matching any of these are never renamed
    pub keep: Vec<String>,

    /// Rename entries. When off the bundle is only filtered/merged and re-emitted.
    pub enable_obfuscation: bool,

    /// Name generation settings
    pub naming: NamingConfig,

    /// Glob patterns of archive entries to remove
    pub file_filter: Vec<String>,

    /// Collapse byte-identical file resources onto one path
    pub merge_duplicates: bool,

    /// Abort when a reference points at an entry that does not exist
    pub fail_on_unresolved: bool,

    /// Scan and rewrite XML documents on the rayon pool
    pub parallel: bool,

    /// Symbolic string detection
    pub symbolic: SymbolicConfig,

    /// Mapping file from a previous run whose names should be reused
    pub mapping: Option<PathBuf>,

    /// File name of the rewritten bundle
    pub output_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Longest name the generator may produce
    pub max_name_length: usize,

    /// Extra names that must never be generated
    pub reserved_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolicConfig {
    /// Treat unqualified attribute strings that equal a resource name as references
    pub bare_names: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keep: vec![],
            enable_obfuscation: true,
            naming: NamingConfig::default(),
            file_filter: vec![],
            merge_duplicates: false,
            fail_on_unresolved: true,
            parallel: true,
            symbolic: SymbolicConfig::default(),
            mapping: None,
            output_name: None,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_name_length: 6,
            reserved_names: vec![],
        }
    }
}

impl Default for SymbolicConfig {
    fn default() -> Self {
        Self { bare_names: true }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config")?,
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config")?,
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    config
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")?
                }
            }
        };

        // A relative mapping path is relative to the config file
        if let (Some(mapping), Some(dir)) = (&config.mapping, path.parent()) {
            if mapping.is_relative() {
                config.mapping = Some(dir.join(mapping));
            }
        }
        Ok(config)
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(dir: &Path) -> Result<Self> {
        let default_names = [
            ".reschiper.yml",
            ".reschiper.yaml",
            ".reschiper.toml",
            "reschiper.yml",
            "reschiper.yaml",
            "reschiper.toml",
        ];

        for name in &default_names {
            let path = dir.join(name);
            if path.exists() {
                tracing::debug!("Using config file {}", path.display());
                return Self::from_file(&path);
            }
        }

        // No config file found, use defaults
        Ok(Self::default())
    }
}
