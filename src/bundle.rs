// Module discovery: pairs every resource table in the archive with the
// directory prefix of the module it belongs to

use crate::archive::Archive;
use crate::error::{ObfuscateError, Result};
use crate::res::ResourceTable;
use tracing::{debug, info};

pub const TABLE_FILE: &str = "resources.arsc";
pub const MANIFEST_FILE: &str = "AndroidManifest.xml";

/// One module of the bundle and its parsed resource table
#[derive(Debug, Clone)]
pub struct Module {
    /// `""` for a root-level table, otherwise `"<module>/"`
    pub prefix: String,
    pub table_path: String,
    pub table: ResourceTable,
}

impl Module {
    /// Find and parse every `resources.arsc` and `<module>/resources.arsc`
    pub fn discover(archive: &Archive) -> Result<Vec<Module>> {
        let mut modules = Vec::new();
        for entry in archive.entries() {
            let Some(prefix) = table_prefix(&entry.path) else {
                continue;
            };
            let table =
                ResourceTable::parse(&entry.payload).map_err(|source| ObfuscateError::MalformedTable {
                    path: entry.path.clone(),
                    source,
                })?;
            debug!("Found resource table {}", entry.path);
            modules.push(Module {
                prefix: prefix.to_string(),
                table_path: entry.path.clone(),
                table,
            });
        }
        info!("Discovered {} module(s) with resource tables", modules.len());
        Ok(modules)
    }

    /// Name used in logs and reports
    pub fn name(&self) -> &str {
        match self.prefix.trim_end_matches('/') {
            "" => "<root>",
            name => name,
        }
    }

    /// Archive path of a module-relative path
    pub fn archive_path(&self, relative: &str) -> String {
        format!("{}{}", self.prefix, relative)
    }

    /// Module-relative form of `archive_path`, if it lives in this module
    pub fn relative_path<'a>(&self, archive_path: &'a str) -> Option<&'a str> {
        archive_path.strip_prefix(self.prefix.as_str())
    }
}

fn table_prefix(path: &str) -> Option<&str> {
    if path == TABLE_FILE {
        return Some("");
    }
    let prefix = path.strip_suffix(TABLE_FILE)?;
    let module = prefix.strip_suffix('/')?;
    (!module.is_empty() && !module.contains('/')).then_some(prefix)
}

/// Whether the archive path names a manifest (`AndroidManifest.xml` or
/// `<module>/manifest/AndroidManifest.xml`)
pub fn is_manifest(path: &str) -> bool {
    path == MANIFEST_FILE || path.ends_with(&format!("/{}", MANIFEST_FILE))
}
