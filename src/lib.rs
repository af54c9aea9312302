//! reschiper - resource name obfuscation for Android App Bundles
//!
//! Renames resource entries to short generated names, moves their files to
//! matching paths and rewrites every place that spells a name, without
//! changing any resource id.
//!
//! # Architecture
//!
//! The pipeline consists of:
//! 1. **Archive** - Load the bundle into an ordered in-memory archive
//! 2. **Resource model** - Parse each module's `resources.arsc` and compiled XML
//! 3. **Filtering** - Optionally drop unwanted files and merge duplicates
//! 4. **Reference index** - Find every site naming a resource, and the anchors
//! 5. **Naming** - Plan new names under keep rules and anchors
//! 6. **Rewrite** - Apply the plan to tables, documents and archive paths
//! 7. **Emit** - Write the bundle and the mapping report

pub mod archive;
pub mod bundle;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod index;
pub mod mapping;
pub mod naming;
pub mod res;
pub mod rewrite;

pub use archive::{Archive, BundleEmitter};
pub use bundle::Module;
pub use config::{Config, KeepRules};
pub use engine::{ObfuscationOutput, Obfuscator};
pub use error::{ObfuscateError, Result};
pub use filter::{DuplicateMerger, FileFilter, MergedFile};
pub use index::{AnchorReason, ReferenceIndex, ReferenceSite};
pub use mapping::{MappingReport, PreviousMapping};
pub use naming::{KeepReason, NamingPolicy, RenameMap};
pub use res::{ResId, ResourceTable, XmlDocument};
pub use rewrite::Rewriter;
