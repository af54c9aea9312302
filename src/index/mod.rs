//! Reverse index from resource ids to the places that name them
//!
//! Sites come from two sources:
//! - compiled XML documents: typed references, resource-mapped attribute
//!   names and string attributes that spell a resource name
//! - resource tables: references, bag parents, bag keys and bag item values
//!
//! Entries that must keep their name (manifest references, public entries,
//! ambiguous symbolic names) are collected as anchors.

pub mod symbolic;

pub use symbolic::{NameTable, SymbolicForm, SymbolicName};

use crate::archive::Archive;
use crate::bundle::{is_manifest, Module};
use crate::error::{ObfuscateError, Result};
use crate::res::{ResId, XmlDocument};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Where a reference lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "in", rename_all = "snake_case")]
pub enum SiteLocation {
    Xml {
        path: String,
        /// Offset of the attribute record inside the document
        offset: usize,
        string_index: Option<u32>,
    },
    Table {
        module: String,
        source: ResId,
        config: String,
    },
}

impl fmt::Display for SiteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteLocation::Xml { path, offset, .. } => write!(f, "{} @ {:#x}", path, offset),
            SiteLocation::Table {
                module,
                source,
                config,
            } => write!(f, "{} entry {} [{}]", module, source, config),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteKind {
    /// Refers by numeric id; survives renaming untouched
    IdReference,
    /// Spells the name; must be rewritten
    SymbolicName { text: String, form: SymbolicForm },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSite {
    pub location: SiteLocation,
    pub kind: SiteKind,
    pub target: ResId,
}

impl ReferenceSite {
    pub fn is_symbolic(&self) -> bool {
        matches!(self.kind, SiteKind::SymbolicName { .. })
    }
}

/// Why an entry must keep its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorReason {
    Manifest,
    Public,
    AmbiguousName,
}

impl fmt::Display for AnchorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AnchorReason::Manifest => "referenced from manifest",
            AnchorReason::Public => "public",
            AnchorReason::AmbiguousName => "ambiguous symbolic name",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub parallel: bool,
    pub bare_names: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            bare_names: true,
        }
    }
}

#[derive(Default)]
struct DocumentScan {
    sites: Vec<ReferenceSite>,
    anchors: Vec<(ResId, AnchorReason)>,
}

#[derive(Debug, Default)]
pub struct ReferenceIndex {
    sites: Vec<ReferenceSite>,
    anchors: BTreeMap<ResId, AnchorReason>,
    by_target: HashMap<ResId, Vec<usize>>,
    defined: HashSet<ResId>,
}

impl ReferenceIndex {
    pub fn build(archive: &Archive, modules: &[Module], options: &IndexOptions) -> Result<Self> {
        let names = NameTable::build(modules);
        let owned: HashSet<u8> = modules
            .iter()
            .flat_map(|m| m.table.packages().iter().map(|p| p.id))
            .collect();

        let documents: Vec<(&str, &[u8])> = archive
            .entries()
            .iter()
            .filter(|e| !e.is_dir && XmlDocument::is_binary_xml(&e.payload))
            .map(|e| (e.path.as_str(), e.payload.as_slice()))
            .collect();

        info!("Scanning {} compiled XML documents...", documents.len());
        let scan = |(path, bytes): &(&str, &[u8])| scan_document(path, bytes, &names, &owned, options);
        let scans: Vec<DocumentScan> = if options.parallel {
            documents.par_iter().map(scan).collect::<Result<_>>()?
        } else {
            documents.iter().map(scan).collect::<Result<_>>()?
        };

        let mut index = ReferenceIndex::default();
        for scan in scans {
            for site in scan.sites {
                index.add_site(site);
            }
            for (id, reason) in scan.anchors {
                index.add_anchor(id, reason);
            }
        }

        for module in modules {
            for (_, _, entry) in module.table.entries() {
                index.defined.insert(entry.id());
                if entry.is_public() {
                    index.add_anchor(entry.id(), AnchorReason::Public);
                }
                for cv in entry.config_values() {
                    for target in cv.value.referenced_ids() {
                        if owned.contains(&target.package_id()) {
                            index.add_site(ReferenceSite {
                                location: SiteLocation::Table {
                                    module: module.name().to_string(),
                                    source: entry.id(),
                                    config: cv.config.qualifier(),
                                },
                                kind: SiteKind::IdReference,
                                target,
                            });
                        }
                    }
                }
            }
        }

        info!(
            "Indexed {} reference sites, {} anchors",
            index.sites.len(),
            index.anchors.len()
        );
        Ok(index)
    }

    fn add_site(&mut self, site: ReferenceSite) {
        self.by_target
            .entry(site.target)
            .or_default()
            .push(self.sites.len());
        self.sites.push(site);
    }

    /// The first reason recorded for an id wins
    fn add_anchor(&mut self, id: ResId, reason: AnchorReason) {
        self.anchors.entry(id).or_insert(reason);
    }

    pub fn sites(&self) -> &[ReferenceSite] {
        &self.sites
    }

    pub fn sites_for(&self, id: ResId) -> impl Iterator<Item = &ReferenceSite> {
        self.by_target
            .get(&id)
            .into_iter()
            .flatten()
            .map(|i| &self.sites[*i])
    }

    pub fn symbolic_sites(&self) -> impl Iterator<Item = &ReferenceSite> {
        self.sites.iter().filter(|s| s.is_symbolic())
    }

    pub fn anchors(&self) -> &BTreeMap<ResId, AnchorReason> {
        &self.anchors
    }

    pub fn anchor_reason(&self, id: ResId) -> Option<AnchorReason> {
        self.anchors.get(&id).copied()
    }

    /// Sites whose target is not defined by any table
    pub fn unresolved(&self) -> Vec<&ReferenceSite> {
        self.sites
            .iter()
            .filter(|s| !self.defined.contains(&s.target))
            .collect()
    }
}

fn scan_document(
    path: &str,
    bytes: &[u8],
    names: &NameTable,
    owned: &HashSet<u8>,
    options: &IndexOptions,
) -> Result<DocumentScan> {
    let document = XmlDocument::parse(bytes).map_err(|source| ObfuscateError::MalformedXml {
        path: path.to_string(),
        source,
    })?;
    let manifest = is_manifest(path);
    let mut scan = DocumentScan::default();

    for attribute in document.attributes() {
        let location = || SiteLocation::Xml {
            path: path.to_string(),
            offset: attribute.offset,
            string_index: attribute.raw_index,
        };

        let mut ids = Vec::new();
        if let Some((_, target)) = attribute.typed_value.reference() {
            ids.push(target);
        }
        ids.extend(attribute.name_id);
        for target in ids {
            if !owned.contains(&target.package_id()) {
                continue;
            }
            if manifest {
                scan.anchors.push((target, AnchorReason::Manifest));
            }
            scan.sites.push(ReferenceSite {
                location: location(),
                kind: SiteKind::IdReference,
                target,
            });
        }

        let Some(text) = attribute.string_value() else {
            continue;
        };
        let Some(symbol) = SymbolicName::parse(text) else {
            continue;
        };
        let candidates = names.resolve(&symbol, options.bare_names);
        match candidates.as_slice() {
            [] => {}
            [target] if !manifest => scan.sites.push(ReferenceSite {
                location: location(),
                kind: SiteKind::SymbolicName {
                    text: text.to_string(),
                    form: symbol.form(),
                },
                target: *target,
            }),
            [target] => scan.anchors.push((*target, AnchorReason::Manifest)),
            many => {
                let reason = if manifest {
                    AnchorReason::Manifest
                } else {
                    AnchorReason::AmbiguousName
                };
                debug!("{}: {:?} matches {} entries", path, text, many.len());
                scan.anchors.extend(many.iter().map(|id| (*id, reason)));
            }
        }
    }

    Ok(scan)
}
