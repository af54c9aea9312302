//! Applies a [`RenameMap`] to the bundle
//!
//! Order matters:
//! 1. symbolic strings in compiled XML, addressed by the documents' original paths
//! 2. entry names in each table's key pool
//! 3. archive moves for renamed files, then the file values pointing at them
//! 4. tables serialized back into their archive entries
//!
//! Id references need no change since ids never move.

use crate::archive::Archive;
use crate::bundle::Module;
use crate::error::{ObfuscateError, Result};
use crate::index::{ReferenceIndex, SiteKind, SiteLocation, SymbolicName};
use crate::naming::RenameMap;
use crate::res::XmlDocument;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, trace};

/// One string attribute to rewrite inside a document
struct StringEdit {
    offset: usize,
    text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Rewriter {
    parallel: bool,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl Rewriter {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    pub fn apply(
        &self,
        archive: &mut Archive,
        modules: &mut [Module],
        index: &ReferenceIndex,
        map: &RenameMap,
    ) -> Result<()> {
        self.rewrite_symbolic_sites(archive, index, map)?;

        for module in modules.iter_mut() {
            let mut renamed = 0;
            for (id, rename) in map.for_module(&module.prefix) {
                if module.table.rename_entry(id, &rename.new_name) {
                    renamed += 1;
                }
            }

            let moves = map.path_moves(&module.prefix);
            let archive_moves: Vec<(String, String)> = moves
                .iter()
                .map(|m| (module.archive_path(&m.from), module.archive_path(&m.to)))
                .collect();
            archive.rename_entries(&archive_moves)?;

            let relative: HashMap<String, String> = moves
                .iter()
                .map(|m| (m.from.clone(), m.to.clone()))
                .collect();
            let relocated = module.table.relocate_files(&relative);

            let bytes = module
                .table
                .serialize()
                .map_err(|source| ObfuscateError::MalformedTable {
                    path: module.table_path.clone(),
                    source,
                })?;
            archive.put_entry(&module.table_path, bytes);

            debug!(
                "{}: {} entries renamed, {} files moved, {} file values updated",
                module.name(),
                renamed,
                archive_moves.len(),
                relocated
            );
        }

        Ok(())
    }

    fn rewrite_symbolic_sites(&self, archive: &mut Archive, index: &ReferenceIndex, map: &RenameMap) -> Result<()> {
        let mut edits: BTreeMap<&str, Vec<StringEdit>> = BTreeMap::new();
        for site in index.symbolic_sites() {
            let Some(rename) = map.get(site.target) else {
                continue;
            };
            let (SiteLocation::Xml { path, offset, .. }, SiteKind::SymbolicName { text, .. }) =
                (&site.location, &site.kind)
            else {
                continue;
            };
            let Some(symbol) = SymbolicName::parse(text) else {
                continue;
            };
            edits.entry(path.as_str()).or_default().push(StringEdit {
                offset: *offset,
                text: symbol.render(&rename.new_name),
            });
        }

        if edits.is_empty() {
            return Ok(());
        }

        let jobs: Vec<(&str, &[u8], Vec<StringEdit>)> = edits
            .into_iter()
            .filter_map(|(path, edits)| archive.payload(path).map(|bytes| (path, bytes, edits)))
            .collect();

        let rewrite = |(path, bytes, edits): &(&str, &[u8], Vec<StringEdit>)| rewrite_document(path, bytes, edits);
        let rewritten: Vec<(String, Vec<u8>)> = if self.parallel {
            jobs.par_iter().map(rewrite).collect::<Result<_>>()?
        } else {
            jobs.iter().map(rewrite).collect::<Result<_>>()?
        };

        info!("Rewrote symbolic names in {} documents", rewritten.len());
        for (path, bytes) in rewritten {
            archive.put_entry(&path, bytes);
        }
        Ok(())
    }
}

fn rewrite_document(path: &str, bytes: &[u8], edits: &[StringEdit]) -> Result<(String, Vec<u8>)> {
    let malformed = |source| ObfuscateError::MalformedXml {
        path: path.to_string(),
        source,
    };
    let mut document = XmlDocument::parse(bytes).map_err(malformed)?;
    for edit in edits {
        trace!("{} @ {:#x} -> {:?}", path, edit.offset, edit.text);
        document
            .rewrite_attribute_string(edit.offset, &edit.text)
            .map_err(malformed)?;
    }
    Ok((path.to_string(), document.serialize()))
}
