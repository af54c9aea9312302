//! In-memory view of a zip bundle
//!
//! Entries keep their original order, compression method, timestamp and
//! permissions so that emitting an unmodified archive reproduces the same
//! logical content in the same order.

pub mod emitter;

pub use emitter::BundleEmitter;

use crate::error::{ObfuscateError, Result};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::{CompressionMethod, DateTime, ZipArchive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    Deflated,
}

impl Compression {
    fn from_method(method: CompressionMethod, path: &str) -> Self {
        match method {
            CompressionMethod::Stored => Compression::Stored,
            CompressionMethod::Deflated => Compression::Deflated,
            other => {
                warn!("{} uses {:?}, re-emitting deflated", path, other);
                Compression::Deflated
            }
        }
    }

    pub fn method(self) -> CompressionMethod {
        match self {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// One file or directory of the bundle
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub payload: Vec<u8>,
    pub compression: Compression,
    /// Position in the source archive
    pub order: usize,
    pub last_modified: Option<DateTime>,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

/// Ordered, path-unique collection of archive entries
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl Archive {
    /// Read every entry of a zip archive into memory
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let corrupt = |e: zip::result::ZipError| ObfuscateError::CorruptArchive {
            reason: e.to_string(),
        };
        let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;

        let mut archive = Archive::default();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(corrupt)?;
            let path = file.name().to_string();
            if archive.index.contains_key(&path) {
                return Err(ObfuscateError::CorruptArchive {
                    reason: format!("duplicate entry {}", path),
                });
            }

            let mut payload = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut payload)
                .map_err(|e| ObfuscateError::CorruptArchive {
                    reason: format!("{}: {}", path, e),
                })?;

            let entry = ArchiveEntry {
                compression: Compression::from_method(file.compression(), &path),
                order: i,
                last_modified: file.last_modified(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
                path,
                payload,
            };
            archive.index.insert(entry.path.clone(), archive.entries.len());
            archive.entries.push(entry);
        }

        debug!("Loaded archive with {} entries", archive.entries.len());
        Ok(archive)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.index.get(path).map(|i| &self.entries[*i])
    }

    pub fn payload(&self, path: &str) -> Option<&[u8]> {
        self.entry(path).map(|e| e.payload.as_slice())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Replace the payload of `path`, or append a new deflated entry
    pub fn put_entry(&mut self, path: &str, payload: Vec<u8>) {
        if let Some(&i) = self.index.get(path) {
            self.entries[i].payload = payload;
            return;
        }
        let order = self.entries.len();
        self.index.insert(path.to_string(), order);
        self.entries.push(ArchiveEntry {
            path: path.to_string(),
            payload,
            compression: Compression::Deflated,
            order,
            last_modified: None,
            unix_mode: None,
            is_dir: false,
        });
    }

    pub fn remove_entry(&mut self, path: &str) -> Option<ArchiveEntry> {
        let i = self.index.remove(path)?;
        let removed = self.entries.remove(i);
        self.reindex();
        Some(removed)
    }

    /// Apply several renames at once. Each entry keeps its position.
    ///
    /// Fails without changing anything when a destination is held by an entry
    /// that is not itself moving, when two moves share a destination, or when
    /// a source does not exist.
    pub fn rename_entries(&mut self, moves: &[(String, String)]) -> Result<()> {
        let sources: HashSet<&str> = moves.iter().map(|(from, _)| from.as_str()).collect();
        let mut destinations: HashMap<&str, &str> = HashMap::new();

        for (from, to) in moves {
            if !self.contains(from) {
                return Err(ObfuscateError::RewriteConflict {
                    source_path: from.clone(),
                    destination: to.clone(),
                    occupant: "<missing source>".to_string(),
                });
            }
            if let Some(other) = destinations.insert(to.as_str(), from.as_str()) {
                return Err(ObfuscateError::RewriteConflict {
                    source_path: from.clone(),
                    destination: to.clone(),
                    occupant: other.to_string(),
                });
            }
            if from != to && self.contains(to) && !sources.contains(to.as_str()) {
                return Err(ObfuscateError::RewriteConflict {
                    source_path: from.clone(),
                    destination: to.clone(),
                    occupant: to.clone(),
                });
            }
        }

        for (from, to) in moves {
            if let Some(&i) = self.index.get(from) {
                self.entries[i].path = to.clone();
            }
        }
        self.reindex();
        debug!("Renamed {} archive entries", moves.len());
        Ok(())
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect();
    }

    /// Write the archive back to zip bytes
    pub fn serialize(&self) -> Result<Vec<u8>> {
        BundleEmitter::default().emit(self)
    }
}
