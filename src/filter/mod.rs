// File filter: drops archive entries matching user globs

mod duplicates;

pub use duplicates::{DuplicateMerger, MergedFile};

use crate::archive::Archive;
use crate::bundle::{is_manifest, Module};
use crate::config::ConfigError;
use glob::Pattern;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    patterns: Vec<Pattern>,
}

impl FileFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Remove matching entries and return their paths in archive order.
    ///
    /// Tables, manifests and files named by a table value are never removed.
    pub fn apply(&self, archive: &mut Archive, modules: &[Module]) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }

        let protected: HashSet<String> = modules
            .iter()
            .flat_map(|m| {
                let files: Vec<String> = m
                    .table
                    .file_paths()
                    .into_iter()
                    .map(|p| m.archive_path(&p))
                    .collect();
                std::iter::once(m.table_path.clone()).chain(files)
            })
            .collect();

        let candidates: Vec<String> = archive
            .entries()
            .iter()
            .filter(|e| self.matches(&e.path))
            .map(|e| e.path.clone())
            .collect();

        let mut removed = Vec::new();
        for path in candidates {
            if protected.contains(&path) || is_manifest(&path) {
                warn!("File filter matches {} which the bundle needs, keeping it", path);
                continue;
            }
            if archive.remove_entry(&path).is_some() {
                debug!("Filtered {}", path);
                removed.push(path);
            }
        }

        info!("File filter removed {} entries", removed.len());
        removed
    }
}
