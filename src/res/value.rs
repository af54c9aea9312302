// Res_value and the decoded value model
//
// Res_value layout (8 bytes):
// ```
// u16 size | u8 res0 | u8 data_type | u32 data
// ```

use super::chunk::ByteReader;
use super::string_pool::StringPool;
use super::{ParseError, ResId};

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

/// Prefix of value-pool strings that name files inside a module
pub const FILE_PREFIX: &str = "res/";

/// A raw Res_value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResValue {
    pub size: u16,
    pub res0: u8,
    pub data_type: u8,
    pub data: u32,
}

impl ResValue {
    pub const SIZE: usize = 8;

    pub fn read(data: &[u8], offset: usize) -> Result<Self, ParseError> {
        let mut reader = ByteReader::at(data, offset);
        Ok(Self {
            size: reader.u16("value size")?,
            res0: reader.u8("value res0")?,
            data_type: reader.u8("value type")?,
            data: reader.u32("value data")?,
        })
    }

    /// A value of `data_type` with the standard 8-byte size
    pub fn new(data_type: u8, data: u32) -> Self {
        Self {
            size: Self::SIZE as u16,
            res0: 0,
            data_type,
            data,
        }
    }

    pub fn reference_kind(&self) -> Option<ReferenceKind> {
        ReferenceKind::from_type(self.data_type)
    }

    /// The referenced id, if this is a non-null reference
    pub fn reference(&self) -> Option<(ReferenceKind, ResId)> {
        match self.reference_kind() {
            Some(kind) if self.data != 0 => Some((kind, ResId(self.data))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Reference,
    Attribute,
    DynamicReference,
    DynamicAttribute,
}

impl ReferenceKind {
    pub fn from_type(data_type: u8) -> Option<Self> {
        match data_type {
            TYPE_REFERENCE => Some(Self::Reference),
            TYPE_ATTRIBUTE => Some(Self::Attribute),
            TYPE_DYNAMIC_REFERENCE => Some(Self::DynamicReference),
            TYPE_DYNAMIC_ATTRIBUTE => Some(Self::DynamicAttribute),
            _ => None,
        }
    }

    pub fn data_type(self) -> u8 {
        match self {
            Self::Reference => TYPE_REFERENCE,
            Self::Attribute => TYPE_ATTRIBUTE,
            Self::DynamicReference => TYPE_DYNAMIC_REFERENCE,
            Self::DynamicAttribute => TYPE_DYNAMIC_ATTRIBUTE,
        }
    }
}

/// A decoded resource value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integers, booleans, colors, floats, dimensions, fractions and @null
    Scalar(ResValue),
    String { index: u32, text: String },
    StyledString { index: u32, text: String },
    Reference { kind: ReferenceKind, target: ResId },
    /// A value-pool string naming a file inside the module
    File { index: u32, path: String },
    Bag(Bag),
}

/// A complex (map) value: style, attr, array, plurals, ...
#[derive(Debug, Clone, PartialEq)]
pub struct Bag {
    pub parent: Option<ResId>,
    pub items: Vec<BagItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BagItem {
    pub name: ResId,
    pub value: Value,
}

impl Value {
    /// Decode a value. With `file_backed` set, unstyled `res/` strings become [`Value::File`].
    pub fn classify(raw: ResValue, pool: &StringPool, file_backed: bool) -> Result<Self, ParseError> {
        if let Some((kind, target)) = raw.reference() {
            return Ok(Value::Reference { kind, target });
        }
        if raw.data_type != TYPE_STRING {
            return Ok(Value::Scalar(raw));
        }

        let text = pool.resolve(raw.data)?.to_string();
        if pool.is_styled(raw.data) {
            Ok(Value::StyledString {
                index: raw.data,
                text,
            })
        } else if file_backed && text.starts_with(FILE_PREFIX) {
            Ok(Value::File {
                index: raw.data,
                path: text,
            })
        } else {
            Ok(Value::String {
                index: raw.data,
                text,
            })
        }
    }

    pub fn as_reference(&self) -> Option<ResId> {
        match self {
            Value::Reference { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn file_path(&self) -> Option<&str> {
        match self {
            Value::File { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Value-pool string index used by this value, for non-bag values
    pub fn string_index(&self) -> Option<u32> {
        match self {
            Value::String { index, .. }
            | Value::StyledString { index, .. }
            | Value::File { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Every id this value references: direct references, bag parents,
    /// bag attribute keys and bag item references
    pub fn referenced_ids(&self) -> Vec<ResId> {
        match self {
            Value::Reference { target, .. } => vec![*target],
            Value::Bag(bag) => {
                let mut ids: Vec<ResId> = bag.parent.into_iter().collect();
                for item in &bag.items {
                    ids.push(item.name);
                    ids.extend(item.value.as_reference());
                }
                ids
            }
            _ => Vec::new(),
        }
    }

    /// Every value-pool string index this value uses, including bag items
    pub fn string_indices(&self) -> Vec<u32> {
        match self {
            Value::Bag(bag) => bag
                .items
                .iter()
                .filter_map(|item| item.value.string_index())
                .collect(),
            other => other.string_index().into_iter().collect(),
        }
    }
}
