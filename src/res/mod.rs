//! Compiled Android resource formats
//!
//! Readers and writers for the binary chunk formats found inside a bundle:
//! the resource table (`resources.arsc`) and compiled XML documents. Both keep
//! enough of the original bytes that an untouched structure re-serializes
//! byte for byte.

pub mod chunk;
pub mod config;
pub mod string_pool;
pub mod table;
pub mod value;
pub mod xml;

pub use config::ResConfig;
pub use string_pool::StringPool;
pub use table::{ConfigValue, Entry, Package, ResourceTable, TypeSpec};
pub use value::{Bag, BagItem, ReferenceKind, ResValue, Value};
pub use xml::{XmlAttribute, XmlDocument};

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors raised while decoding binary resource structures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of data at offset {offset:#x} while reading {context}")]
    Truncated { offset: usize, context: &'static str },

    #[error("unexpected chunk type {found:#06x} at offset {offset:#x}, expected {expected}")]
    UnexpectedChunk {
        offset: usize,
        found: u16,
        expected: &'static str,
    },

    #[error("invalid chunk at offset {offset:#x}: {reason}")]
    InvalidChunk { offset: usize, reason: String },

    #[error("string index {index} out of range (pool has {len} strings)")]
    StringIndex { index: u32, len: usize },

    #[error("key index {index} does not fit a compact entry")]
    KeyIndexOverflow { index: usize },

    #[error("no attribute at offset {offset:#x}")]
    NoAttribute { offset: usize },
}

/// A resource identifier: `0xPPTTEEEE` (package, type, entry index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResId(pub u32);

impl ResId {
    pub fn new(package: u8, type_id: u8, entry: u16) -> Self {
        Self(((package as u32) << 24) | ((type_id as u32) << 16) | entry as u32)
    }

    pub fn package_id(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn type_id(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn entry_index(self) -> u16 {
        self.0 as u16
    }

    /// Parse the `0x7f010001` notation used in mapping files
    pub fn parse_hex(text: &str) -> Option<Self> {
        let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Serialize for ResId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
