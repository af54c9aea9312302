// Obfuscation pipeline
//
// load -> discover tables -> file filter -> duplicate merge -> index
//      -> unresolved check -> naming -> rewrite -> emit

use crate::archive::Archive;
use crate::bundle::Module;
use crate::config::{Config, KeepRules};
use crate::error::{ObfuscateError, Result};
use crate::filter::{DuplicateMerger, FileFilter, MergedFile};
use crate::index::{IndexOptions, ReferenceIndex};
use crate::mapping::{MappingReport, PreviousMapping};
use crate::naming::{NamingPolicy, RenameMap};
use crate::rewrite::Rewriter;
use std::time::Instant;
use tracing::{info, warn};

/// Result of one run
#[derive(Debug)]
pub struct ObfuscationOutput {
    /// Rewritten bundle bytes
    pub bundle: Vec<u8>,
    pub map: RenameMap,
    pub report: MappingReport,
}

pub struct Obfuscator {
    config: Config,
    previous: Option<PreviousMapping>,
}

impl Obfuscator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    /// Reuse names from an earlier run where the entry is unchanged
    pub fn with_previous_mapping(mut self, mapping: PreviousMapping) -> Self {
        self.previous = Some(mapping);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, bytes: &[u8]) -> Result<ObfuscationOutput> {
        let start = Instant::now();
        let config = &self.config;

        // Settings are validated before any work is done
        let keep = KeepRules::compile(&config.keep)?;
        let filter = FileFilter::new(&config.file_filter)?;
        let mut policy = NamingPolicy::new(&keep, &config.naming)?;
        if let Some(previous) = &self.previous {
            policy = policy.with_previous_mapping(previous);
        }

        let mut archive = Archive::load(bytes)?;
        let mut modules = Module::discover(&archive)?;

        let filtered = filter.apply(&mut archive, &modules);

        let mut merged: Vec<MergedFile> = Vec::new();
        if config.merge_duplicates {
            for module in modules.iter_mut() {
                merged.extend(DuplicateMerger::merge(&mut archive, module));
            }
        }

        let (index, map) = if config.enable_obfuscation {
            let options = IndexOptions {
                parallel: config.parallel,
                bare_names: config.symbolic.bare_names,
            };
            let index = ReferenceIndex::build(&archive, &modules, &options)?;
            self.check_unresolved(&index)?;
            let map = policy.plan(&modules, &index)?;
            (index, map)
        } else {
            info!("Obfuscation disabled, re-emitting bundle");
            (ReferenceIndex::default(), RenameMap::default())
        };

        Rewriter::new(config.parallel).apply(&mut archive, &mut modules, &index, &map)?;

        let report = MappingReport::build(&modules, &map, &index, &merged, &filtered);
        let bundle = archive.serialize()?;

        info!(
            "Renamed {} entries across {} module(s) in {:.2}s",
            map.len(),
            modules.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(ObfuscationOutput {
            bundle,
            map,
            report,
        })
    }

    fn check_unresolved(&self, index: &ReferenceIndex) -> Result<()> {
        for site in index.unresolved() {
            if self.config.fail_on_unresolved {
                return Err(ObfuscateError::UnresolvedReference {
                    target: site.target,
                    location: site.location.to_string(),
                });
            }
            warn!("Unresolved reference to {} from {}", site.target, site.location);
        }
        Ok(())
    }
}
