// Keep rules: resource patterns excluded from renaming
//
// Accepted forms (each part is a glob):
//   app_name                      any type, any package
//   string/app_name               @ prefix allowed
//   com.example:string/app_name
//   R.string.app_name
//   com.example.R.string.app_name
//   drawable/*                    whole type

use super::ConfigError;
use glob::Pattern;
use regex::Regex;
use std::sync::OnceLock;

fn r_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?P<package>[A-Za-z_*?][\w.*?\[\]-]*)\.)?R\.(?P<type>[\w*?\[\]-]+)\.(?P<name>.+)$")
            .expect("valid regex")
    })
}

#[derive(Debug, Clone)]
struct KeepRule {
    text: String,
    package: Option<Pattern>,
    type_name: Option<Pattern>,
    name: Pattern,
}

impl KeepRule {
    fn parse(text: &str) -> Result<Self, ConfigError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidKeepRule {
                rule: text.to_string(),
                reason: "empty rule".to_string(),
            });
        }

        let (package, type_name, name) = if let Some(caps) = r_field_regex().captures(trimmed) {
            (
                caps.name("package").map(|m| m.as_str()),
                caps.name("type").map(|m| m.as_str()),
                caps.name("name").map_or("", |m| m.as_str()),
            )
        } else {
            let body = trimmed.trim_start_matches('@');
            let (package, rest) = match body.split_once(':') {
                Some((package, rest)) => (Some(package), rest),
                None => (None, body),
            };
            match rest.split_once('/') {
                Some((type_name, name)) => (package, Some(type_name), name),
                None => (package, None, rest),
            }
        };

        if name.is_empty() {
            return Err(ConfigError::InvalidKeepRule {
                rule: text.to_string(),
                reason: "missing resource name".to_string(),
            });
        }

        Ok(Self {
            text: text.to_string(),
            package: package.map(compile).transpose()?,
            type_name: type_name.map(compile).transpose()?,
            name: compile(name)?,
        })
    }

    fn matches(&self, package: &str, type_name: &str, name: &str) -> bool {
        if let Some(pattern) = &self.package {
            if !pattern.matches(package) {
                return false;
            }
        }
        if let Some(pattern) = &self.type_name {
            if !pattern.matches(type_name) {
                return false;
            }
        }
        // R fields spell '.' in style names as '_'
        self.name.matches(name) || self.name.matches(&name.replace('.', "_"))
    }
}

fn compile(pattern: &str) -> Result<Pattern, ConfigError> {
    Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Ordered set of compiled keep rules
#[derive(Debug, Clone, Default)]
pub struct KeepRules {
    rules: Vec<KeepRule>,
}

impl KeepRules {
    pub fn compile<S: AsRef<str>>(rules: &[S]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|r| KeepRule::parse(r.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule matching the entry, as written
    pub fn matching_rule(&self, package: &str, type_name: &str, name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(package, type_name, name))
            .map(|rule| rule.text.as_str())
    }

    pub fn is_kept(&self, package: &str, type_name: &str, name: &str) -> bool {
        self.matching_rule(package, type_name, name).is_some()
    }
}
