// Symbolic resource names inside attribute strings
//
// Recognized spellings:
//   name                 bare
//   type/name
//   @type/name           also ?type/name
//   pkg:type/name
//   @pkg:type/name

use crate::bundle::Module;
use crate::res::ResId;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

fn symbolic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([@?])?(?:([A-Za-z][\w.]*):)?(?:([a-z][a-z0-9_-]*)/)?([A-Za-z_][\w.]*)$")
            .expect("valid regex")
    })
}

/// How a symbolic name was spelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolicForm {
    Bare,
    Typed,
    PrefixedTyped,
    Qualified,
    PrefixedQualified,
}

/// A parsed symbolic name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicName {
    pub prefix: Option<char>,
    pub package: Option<String>,
    pub type_name: Option<String>,
    pub name: String,
}

impl SymbolicName {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = symbolic_regex().captures(text)?;
        let prefix = caps.get(1).and_then(|m| m.as_str().chars().next());
        let package = caps.get(2).map(|m| m.as_str().to_string());
        let type_name = caps.get(3).map(|m| m.as_str().to_string());
        let name = caps.get(4)?.as_str().to_string();

        // A prefix or package without a type is not a resource reference
        if type_name.is_none() && (prefix.is_some() || package.is_some()) {
            return None;
        }

        Some(Self {
            prefix,
            package,
            type_name,
            name,
        })
    }

    pub fn form(&self) -> SymbolicForm {
        match (self.prefix.is_some(), self.package.is_some(), self.type_name.is_some()) {
            (_, _, false) => SymbolicForm::Bare,
            (false, false, true) => SymbolicForm::Typed,
            (true, false, true) => SymbolicForm::PrefixedTyped,
            (false, true, true) => SymbolicForm::Qualified,
            (true, true, true) => SymbolicForm::PrefixedQualified,
        }
    }

    /// The same spelling with `name` replaced
    pub fn render(&self, name: &str) -> String {
        let mut out = String::new();
        if let Some(prefix) = self.prefix {
            out.push(prefix);
        }
        if let Some(package) = &self.package {
            out.push_str(package);
            out.push(':');
        }
        if let Some(type_name) = &self.type_name {
            out.push_str(type_name);
            out.push('/');
        }
        out.push_str(name);
        out
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: ResId,
    package: String,
    type_name: String,
}

/// Resource names of every module, for resolving symbolic names
#[derive(Debug, Default)]
pub struct NameTable {
    by_name: HashMap<String, Vec<Candidate>>,
}

impl NameTable {
    pub fn build(modules: &[Module]) -> Self {
        let mut by_name: HashMap<String, Vec<Candidate>> = HashMap::new();
        for module in modules {
            for (package, spec, entry) in module.table.entries() {
                by_name
                    .entry(entry.original_name().to_string())
                    .or_default()
                    .push(Candidate {
                        id: entry.id(),
                        package: package.name.clone(),
                        type_name: spec.name.clone(),
                    });
            }
        }
        Self { by_name }
    }

    /// Ids the name could refer to. Bare names only match when `bare_names` is set.
    pub fn resolve(&self, symbol: &SymbolicName, bare_names: bool) -> Vec<ResId> {
        if symbol.type_name.is_none() && !bare_names {
            return Vec::new();
        }
        let Some(candidates) = self.by_name.get(&symbol.name) else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter(|c| symbol.type_name.as_deref().map_or(true, |t| t == c.type_name))
            .filter(|c| symbol.package.as_deref().map_or(true, |p| p == c.package))
            .map(|c| c.id)
            .collect()
    }
}
