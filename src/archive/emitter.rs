// Zip writer for the rewritten bundle

use super::{Archive, Compression};
use crate::error::{ObfuscateError, Result};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Serializes an [`Archive`] in entry order
#[derive(Debug, Clone, Copy)]
pub struct BundleEmitter {
    /// Alignment of entry data, required for stored entries
    pub alignment: u16,
}

impl Default for BundleEmitter {
    fn default() -> Self {
        Self { alignment: 4 }
    }
}

impl BundleEmitter {
    pub fn emit(&self, archive: &Archive) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in archive.entries() {
            let mut options =
                SimpleFileOptions::default().compression_method(entry.compression.method());
            if let Some(time) = entry.last_modified {
                options = options.last_modified_time(time);
            }
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }

            if entry.is_dir {
                zip.add_directory(entry.path.as_str(), options)
                    .map_err(ObfuscateError::Emit)?;
                continue;
            }

            if entry.compression == Compression::Stored {
                options = options.with_alignment(self.alignment);
            }
            zip.start_file(entry.path.as_str(), options)
                .map_err(ObfuscateError::Emit)?;
            zip.write_all(&entry.payload)?;
        }

        let cursor = zip.finish().map_err(ObfuscateError::Emit)?;
        let bytes = cursor.into_inner();
        debug!("Emitted bundle: {} entries, {} bytes", archive.len(), bytes.len());
        Ok(bytes)
    }
}
