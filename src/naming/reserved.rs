// Names the generator must never hand out

use std::collections::HashSet;

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long", "native",
    "new", "package", "private", "protected", "public", "return", "short", "static", "strictfp",
    "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try", "void",
    "volatile", "while",
];

const JAVA_LITERALS: &[&str] = &["true", "false", "null"];

// Reserved file names on Windows, compared case-insensitively
const DEVICE_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

#[derive(Debug, Clone)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl ReservedNames {
    /// Built-in reserved names plus `extra`
    pub fn new<S: AsRef<str>>(extra: &[S]) -> Self {
        let names = JAVA_KEYWORDS
            .iter()
            .chain(JAVA_LITERALS)
            .chain(DEVICE_NAMES)
            .map(|s| s.to_string())
            .chain(extra.iter().map(|s| s.as_ref().to_lowercase()))
            .collect();
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self::new::<&str>(&[])
    }
}
