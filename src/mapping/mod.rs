// Mapping report: what was renamed, moved, kept, merged and filtered
//
// Text layout (tab-indented records under unindented section headers):
// ```
// res id mapping:
//     0x7f010001 : com.example.R.drawable.ic_launcher -> com.example.R.drawable.a
// res path mapping:
//     res/mipmap/ic_launcher.png -> res/drawable/a.png
// kept:
//     0x7f020001 : string/app_name (keep rule string/app_name)
// merged duplicates:
//     res/drawable/b.png => res/drawable/a.png
// filtered:
//     META-INF/foo.kotlin_module
// risks:
//     0x7f020002 : string/welcome_msg renamed with 1 symbolic string site(s)
// ```

mod previous;

pub use previous::{PreviousMapping, PreviousName};

use crate::bundle::Module;
use crate::filter::MergedFile;
use crate::index::ReferenceIndex;
use crate::naming::{PathMove, RenameMap};
use crate::res::ResId;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct RenamedRecord {
    pub id: ResId,
    pub package: String,
    pub type_name: String,
    pub original_name: String,
    pub new_name: String,
    /// Archive paths
    pub paths: Vec<PathMove>,
    pub symbolic_sites: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeptRecord {
    pub id: ResId,
    pub type_name: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskRecord {
    pub id: ResId,
    pub type_name: String,
    pub name: String,
    pub symbolic_sites: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MappingReport {
    pub renamed: Vec<RenamedRecord>,
    pub kept: Vec<KeptRecord>,
    pub merged: Vec<MergedFile>,
    pub filtered: Vec<String>,
    pub risks: Vec<RiskRecord>,
}

impl MappingReport {
    pub fn build(
        modules: &[Module],
        map: &RenameMap,
        index: &ReferenceIndex,
        merged: &[MergedFile],
        filtered: &[String],
    ) -> Self {
        let mut report = MappingReport {
            merged: merged.to_vec(),
            filtered: filtered.to_vec(),
            ..Default::default()
        };

        for (id, rename) in &map.renames {
            let symbolic_sites = index.sites_for(*id).filter(|s| s.is_symbolic()).count();
            let paths = rename
                .paths
                .iter()
                .map(|m| PathMove {
                    from: format!("{}{}", rename.module, m.from),
                    to: format!("{}{}", rename.module, m.to),
                })
                .collect();

            report.renamed.push(RenamedRecord {
                id: *id,
                package: rename.package.clone(),
                type_name: rename.type_name.clone(),
                original_name: rename.original_name.clone(),
                new_name: rename.new_name.clone(),
                paths,
                symbolic_sites,
            });

            // Lookups by name at runtime cannot be seen; strings that spelled
            // the name were rewritten but remain a heuristic
            if symbolic_sites > 0 {
                report.risks.push(RiskRecord {
                    id: *id,
                    type_name: rename.type_name.clone(),
                    name: rename.original_name.clone(),
                    symbolic_sites,
                });
            }
        }

        for (id, reason) in &map.kept {
            let located = modules.iter().find_map(|m| m.table.locate(*id));
            let (type_name, name) = located
                .map(|(_, spec, entry)| (spec.name.clone(), entry.name().to_string()))
                .unwrap_or_default();
            report.kept.push(KeptRecord {
                id: *id,
                type_name,
                name,
                reason: reason.to_string(),
            });
        }

        report
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();

        out.push_str("res id mapping:\n");
        for record in &self.renamed {
            let _ = writeln!(
                out,
                "\t{} : {}.R.{}.{} -> {}.R.{}.{}",
                record.id,
                record.package,
                record.type_name,
                record.original_name,
                record.package,
                record.type_name,
                record.new_name
            );
        }

        out.push_str("res path mapping:\n");
        for path in self.renamed.iter().flat_map(|r| &r.paths) {
            let _ = writeln!(out, "\t{} -> {}", path.from, path.to);
        }

        out.push_str("kept:\n");
        for record in &self.kept {
            let _ = writeln!(
                out,
                "\t{} : {}/{} ({})",
                record.id, record.type_name, record.name, record.reason
            );
        }

        if !self.merged.is_empty() {
            out.push_str("merged duplicates:\n");
            for merged in &self.merged {
                let _ = writeln!(out, "\t{} => {}", merged.removed, merged.kept);
            }
        }

        if !self.filtered.is_empty() {
            out.push_str("filtered:\n");
            for path in &self.filtered {
                let _ = writeln!(out, "\t{}", path);
            }
        }

        out.push_str("risks:\n");
        for risk in &self.risks {
            let _ = writeln!(
                out,
                "\t{} : {}/{} renamed with {} symbolic string site(s)",
                risk.id, risk.type_name, risk.name, risk.symbolic_sites
            );
        }

        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).into_diagnostic()
    }

    pub fn write_text(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write mapping: {}", path.display()))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write JSON report: {}", path.display()))
    }
}
