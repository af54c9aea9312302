// Engine-level failures

use crate::config::ConfigError;
use crate::res::{ParseError, ResId};
use std::io;
use thiserror::Error;

/// Everything that can abort an obfuscation run. No output is produced once
/// one of these is raised.
#[derive(Error, Debug)]
pub enum ObfuscateError {
    #[error("Bundle is not a readable archive: {reason}")]
    CorruptArchive { reason: String },

    #[error("Malformed resource table {path}")]
    MalformedTable {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("Malformed compiled XML {path}")]
    MalformedXml {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("Unresolved reference to {target} from {location}")]
    UnresolvedReference { target: ResId, location: String },

    #[error("Cannot move {source_path} to {destination}: already used by {occupant}")]
    RewriteConflict {
        source_path: String,
        destination: String,
        occupant: String,
    },

    #[error("Ran out of names for {package}:{type_name} within {max_length} characters")]
    NameExhaustion {
        package: String,
        type_name: String,
        max_length: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write bundle")]
    Emit(#[source] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = ObfuscateError> = std::result::Result<T, E>;
