// Mapping file from an earlier run
//
// Only the id section is read:
// ```
// res id mapping:
//     0x7f010001 : com.example.R.drawable.ic_launcher -> com.example.R.drawable.a
// ```
// Every other section is ignored.

use crate::res::ResId;
use miette::{IntoDiagnostic, Result, WrapErr};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

pub(super) const ID_SECTION: &str = "res id mapping:";

fn id_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(0[xX][0-9a-fA-F]{1,8})\s*:\s*(\S+)\s*->\s*(\S+)\s*$").expect("valid regex")
    })
}

fn r_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(.*)\.)?R\.([^.]+)\.(.+)$").expect("valid regex"))
}

/// One line of the id section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousName {
    pub package: String,
    pub type_name: String,
    pub original_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct PreviousMapping {
    names: HashMap<ResId, PreviousName>,
}

impl PreviousMapping {
    /// Parse a mapping file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read mapping file: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Parse mapping text. Malformed lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut mapping = PreviousMapping::default();
        let mut in_id_section = false;

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            // Section headers are not indented
            if !line.starts_with(' ') && !line.starts_with('\t') {
                in_id_section = line.trim() == ID_SECTION;
                continue;
            }
            if !in_id_section {
                continue;
            }

            match Self::parse_id_line(line) {
                Some((id, name)) => {
                    mapping.names.insert(id, name);
                }
                None => debug!("Skipping malformed mapping line: {}", line.trim()),
            }
        }

        mapping
    }

    fn parse_id_line(line: &str) -> Option<(ResId, PreviousName)> {
        let caps = id_line_regex().captures(line)?;
        let id = ResId::parse_hex(&caps[1])?;
        let original = r_field_regex().captures(&caps[2])?;
        let renamed = r_field_regex().captures(&caps[3])?;

        // Both sides must name the same type
        if original[2] != renamed[2] {
            return None;
        }

        Some((
            id,
            PreviousName {
                package: original.get(1).map_or("", |m| m.as_str()).to_string(),
                type_name: original[2].to_string(),
                original_name: original[3].to_string(),
                new_name: renamed[3].to_string(),
            },
        ))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, id: ResId) -> Option<&PreviousName> {
        self.names.get(&id)
    }

    /// The earlier name of `id`, if it was recorded for the same type and original name
    pub fn reusable_name(&self, id: ResId, type_name: &str, original_name: &str) -> Option<&str> {
        self.names
            .get(&id)
            .filter(|n| n.type_name == type_name && n.original_name == original_name)
            .map(|n| n.new_name.as_str())
    }
}
