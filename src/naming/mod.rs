//! Naming policy: decides which entries are renamed and to what
//!
//! Processing follows table order (module, package, type, entry index), so the
//! same input always yields the same plan.

pub mod generator;
pub mod reserved;

pub use generator::{is_sequence_name, NameGenerator};
pub use reserved::ReservedNames;

use crate::bundle::Module;
use crate::config::{ConfigError, KeepRules, NamingConfig};
use crate::error::{ObfuscateError, Result};
use crate::index::{AnchorReason, ReferenceIndex};
use crate::mapping::PreviousMapping;
use crate::res::{Entry, ResConfig, ResId};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// A file move, with module-relative paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathMove {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    /// Module prefix the entry's table lives under
    pub module: String,
    pub package: String,
    pub type_name: String,
    pub original_name: String,
    pub new_name: String,
    pub paths: Vec<PathMove>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum KeepReason {
    Rule(String),
    Anchor(AnchorReason),
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepReason::Rule(rule) => write!(f, "keep rule {}", rule),
            KeepReason::Anchor(reason) => write!(f, "{}", reason),
        }
    }
}

/// The computed renaming. Built once, applied once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameMap {
    pub renames: BTreeMap<ResId, Rename>,
    pub kept: BTreeMap<ResId, KeepReason>,
}

impl RenameMap {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn get(&self, id: ResId) -> Option<&Rename> {
        self.renames.get(&id)
    }

    /// Renames belonging to the module with `prefix`
    pub fn for_module<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (ResId, &'a Rename)> + 'a {
        self.renames
            .iter()
            .filter(move |(_, r)| r.module == prefix)
            .map(|(id, r)| (*id, r))
    }

    /// Every path move of a module, module-relative
    pub fn path_moves<'a>(&'a self, prefix: &'a str) -> Vec<&'a PathMove> {
        self.for_module(prefix).flat_map(|(_, r)| &r.paths).collect()
    }
}

pub struct NamingPolicy<'a> {
    keep: &'a KeepRules,
    reserved: ReservedNames,
    max_name_length: usize,
    previous: Option<&'a PreviousMapping>,
}

impl<'a> NamingPolicy<'a> {
    pub fn new(keep: &'a KeepRules, config: &NamingConfig) -> std::result::Result<Self, ConfigError> {
        if config.max_name_length == 0 {
            return Err(ConfigError::InvalidNaming(
                "max_name_length must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            keep,
            reserved: ReservedNames::new(&config.reserved_names),
            max_name_length: config.max_name_length,
            previous: None,
        })
    }

    pub fn with_previous_mapping(mut self, previous: &'a PreviousMapping) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn plan(&self, modules: &[Module], index: &ReferenceIndex) -> Result<RenameMap> {
        let mut map = RenameMap::default();
        let mut reused = 0;

        for module in modules {
            // Files of kept entries never move, even when shared after merging
            let mut claimed_paths: HashSet<&str> = HashSet::new();
            for (package, spec, entry) in module.table.entries() {
                if let Some(reason) = self.keep_reason(&package.name, &spec.name, entry, index) {
                    claimed_paths.extend(entry.file_paths());
                    map.kept.insert(entry.id(), reason);
                }
            }

            for package in module.table.packages() {
                for spec in package.types() {
                    let mut taken: HashSet<&str> = HashSet::new();
                    let mut renamable: Vec<&Entry> = Vec::new();

                    for entry in spec.entries() {
                        if map.kept.contains_key(&entry.id()) {
                            taken.insert(entry.name());
                        } else {
                            renamable.push(entry);
                        }
                    }

                    let mut assigned: Vec<Option<String>> = vec![None; renamable.len()];
                    let mut used: HashSet<String> = HashSet::new();

                    // Names from a previous run come first
                    if let Some(previous) = self.previous {
                        for (slot, entry) in assigned.iter_mut().zip(&renamable) {
                            let Some(name) = previous.reusable_name(entry.id(), &spec.name, entry.name()) else {
                                continue;
                            };
                            if !is_sequence_name(name, self.max_name_length) {
                                debug!("Previous name {} of {} is not a valid short name, skipping", name, entry.id());
                                continue;
                            }
                            if self.is_available(name, &taken, &used) {
                                used.insert(name.to_string());
                                *slot = Some(name.to_string());
                                reused += 1;
                            }
                        }
                    }

                    let mut generator = NameGenerator::new(self.max_name_length);
                    for slot in assigned.iter_mut().filter(|s| s.is_none()) {
                        let name = generator
                            .by_ref()
                            .find(|candidate| self.is_available(candidate, &taken, &used))
                            .ok_or_else(|| ObfuscateError::NameExhaustion {
                                package: package.name.clone(),
                                type_name: spec.name.clone(),
                                max_length: self.max_name_length,
                            })?;
                        used.insert(name.clone());
                        *slot = Some(name);
                    }

                    for (entry, new_name) in renamable.iter().zip(assigned) {
                        let Some(new_name) = new_name else {
                            continue;
                        };
                        let mut paths = Vec::new();
                        for cv in entry.config_values() {
                            let Some(path) = cv.value.file_path() else {
                                continue;
                            };
                            if !claimed_paths.insert(path) {
                                continue;
                            }
                            let to = renamed_path(path, &spec.name, &new_name, &cv.config);
                            if to != path {
                                paths.push(PathMove {
                                    from: path.to_string(),
                                    to,
                                });
                            }
                        }
                        map.renames.insert(
                            entry.id(),
                            Rename {
                                module: module.prefix.clone(),
                                package: package.name.clone(),
                                type_name: spec.name.clone(),
                                original_name: entry.name().to_string(),
                                new_name,
                                paths,
                            },
                        );
                    }
                    debug!(
                        "{}:{}: {} renamed, {} kept",
                        package.name,
                        spec.name,
                        renamable.len(),
                        taken.len()
                    );
                }
            }
        }

        info!(
            "Planned {} renames ({} reused from previous mapping), {} entries kept",
            map.renames.len(),
            reused,
            map.kept.len()
        );
        Ok(map)
    }

    /// Keep rules win over anchors when both apply
    fn keep_reason(
        &self,
        package: &str,
        type_name: &str,
        entry: &Entry,
        index: &ReferenceIndex,
    ) -> Option<KeepReason> {
        match self.keep.matching_rule(package, type_name, entry.name()) {
            Some(rule) => Some(KeepReason::Rule(rule.to_string())),
            None => index.anchor_reason(entry.id()).map(KeepReason::Anchor),
        }
    }

    fn is_available(&self, name: &str, taken: &HashSet<&str>, used: &HashSet<String>) -> bool {
        !name.is_empty()
            && !taken.contains(name)
            && !used.contains(name)
            && !self.reserved.contains(name)
    }
}

/// `res/<type><qualifiers>/<name><extension>`
///
/// Qualifiers come from the original directory, or from `config` when the
/// directory carries none. The extension runs from the first dot of the file
/// name, so `.9.png` survives.
pub fn renamed_path(path: &str, type_name: &str, new_name: &str, config: &ResConfig) -> String {
    let (dir, file) = path.rsplit_once('/').unwrap_or(("", path));
    let dir_name = dir.rsplit('/').next().unwrap_or("");
    let qualifiers = match dir_name.find('-') {
        Some(i) => dir_name[i..].to_string(),
        None if config.is_default() => String::new(),
        None => match config.qualifier().as_str() {
            "default" => String::new(),
            qualifier => format!("-{}", qualifier),
        },
    };
    let extension = file.find('.').map_or("", |i| &file[i..]);
    format!("res/{}{}/{}{}", type_name, qualifiers, new_name, extension)
}
