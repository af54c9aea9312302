// Duplicate merging: byte-identical resource files collapse onto one path

use crate::archive::Archive;
use crate::bundle::Module;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::{debug, info};

/// A removed duplicate and the archive path its values now point at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedFile {
    pub module: String,
    pub kept: String,
    pub removed: String,
    pub size: usize,
}

pub struct DuplicateMerger;

impl DuplicateMerger {
    /// Merge identical files referenced by the module's table.
    ///
    /// The first path in table order survives. Only files with the same
    /// extension are merged so `.9.png` never folds into `.png`.
    pub fn merge(archive: &mut Archive, module: &mut Module) -> Vec<MergedFile> {
        let mut buckets: HashMap<(String, u64), Vec<String>> = HashMap::new();
        let mut moves: HashMap<String, String> = HashMap::new();
        let mut merged = Vec::new();

        for path in module.table.file_paths() {
            let archive_path = module.archive_path(&path);
            let Some(payload) = archive.payload(&archive_path) else {
                continue;
            };

            let key = (extension(&path).to_string(), digest(payload));
            let bucket = buckets.entry(key).or_default();
            let original = bucket
                .iter()
                .find(|kept| archive.payload(&module.archive_path(kept)) == Some(payload));

            match original {
                Some(kept) => {
                    debug!("{} duplicates {}", path, kept);
                    merged.push(MergedFile {
                        module: module.name().to_string(),
                        kept: module.archive_path(kept),
                        removed: archive_path,
                        size: payload.len(),
                    });
                    moves.insert(path, kept.clone());
                }
                None => bucket.push(path),
            }
        }

        if moves.is_empty() {
            return merged;
        }

        let updated = module.table.relocate_files(&moves);
        for file in &merged {
            archive.remove_entry(&file.removed);
        }
        info!(
            "{}: merged {} duplicate files ({} values re-pointed)",
            module.name(),
            merged.len(),
            updated
        );
        merged
    }
}

fn extension(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.find('.').map_or("", |i| &file[i..])
}

fn digest(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}
