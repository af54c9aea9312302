// ResStringPool reader/writer
//
// Layout:
// ```
// header (28 bytes): chunk header, string_count, style_count, flags,
//                    strings_start, styles_start
// u32 string offsets[string_count]
// u32 style offsets[style_count]
// string data (UTF-8 or UTF-16, each length-prefixed and NUL terminated)
// style data (span triplets terminated by 0xFFFFFFFF)
// ```
//
// A pool keeps its original chunk bytes until something mutates it, so an
// untouched pool re-serializes exactly. Mutated pools re-emit every string
// from its encoded form and carry the style block over verbatim.

use super::chunk::{
    pad_to_four, push_u16, push_u32, read_u32, set_chunk_size, ByteReader, ChunkHeader,
    RES_STRING_POOL_TYPE,
};
use super::ParseError;
use std::collections::HashMap;

pub const SORTED_FLAG: u32 = 0x0000_0001;
pub const UTF8_FLAG: u32 = 0x0000_0100;

/// Marker for "no string" in string references
pub const NO_STRING: u32 = 0xFFFF_FFFF;

const POOL_HEADER_SIZE: u16 = 28;
const SPAN_END: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq)]
struct PoolString {
    text: String,
    /// Encoded bytes including length prefix and terminator
    encoded: Vec<u8>,
}

/// A decoded string pool
#[derive(Debug, Clone, PartialEq)]
pub struct StringPool {
    flags: u32,
    strings: Vec<PoolString>,
    style_offsets: Vec<u32>,
    styles: Vec<u8>,
    span_names: Vec<u32>,
    raw: Option<Vec<u8>>,
}

impl StringPool {
    /// Parse the pool chunk starting at `offset`
    pub fn parse(data: &[u8], offset: usize) -> Result<Self, ParseError> {
        let header = ChunkHeader::expect(data, offset, RES_STRING_POOL_TYPE, "string pool")?;
        if header.header_size < POOL_HEADER_SIZE {
            return Err(ParseError::InvalidChunk {
                offset,
                reason: format!("string pool header size {}", header.header_size),
            });
        }

        let mut reader = ByteReader::at(data, offset + 8);
        let string_count = reader.u32("string count")? as usize;
        let style_count = reader.u32("style count")? as usize;
        let flags = reader.u32("string pool flags")?;
        let strings_start = reader.u32("strings start")? as usize;
        let styles_start = reader.u32("styles start")? as usize;

        let utf8 = flags & UTF8_FLAG != 0;
        let chunk_size = header.size as usize;
        let chunk_end = header.end();
        let has_styles = style_count > 0 && styles_start != 0;

        // Every offset table entry takes four bytes of the chunk body
        let body_len = chunk_size - header.header_size as usize;
        if string_count.saturating_add(style_count) > body_len / 4 {
            return Err(ParseError::InvalidChunk {
                offset,
                reason: format!(
                    "{} strings and {} styles do not fit a {} byte pool",
                    string_count, style_count, chunk_size
                ),
            });
        }
        if strings_start > chunk_size || (has_styles && styles_start > chunk_size) {
            return Err(ParseError::InvalidChunk {
                offset,
                reason: format!(
                    "string data at {:#x} or style data at {:#x} outside a {} byte pool",
                    strings_start, styles_start, chunk_size
                ),
            });
        }
        let strings_end = if has_styles {
            offset + styles_start
        } else {
            chunk_end
        };

        let mut reader = ByteReader::at(&data[..chunk_end], header.body_start());
        let mut string_offsets = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            string_offsets.push(reader.u32("string offset")? as usize);
        }
        let mut style_offsets = Vec::with_capacity(style_count);
        for _ in 0..style_count {
            style_offsets.push(reader.u32("style offset")?);
        }

        let strings_base = offset + strings_start;
        let mut strings = Vec::with_capacity(string_count);
        for string_offset in string_offsets {
            let start = strings_base.saturating_add(string_offset);
            let (text, len) = if utf8 {
                decode_utf8(data, start, strings_end)?
            } else {
                decode_utf16(data, start, strings_end)?
            };
            strings.push(PoolString {
                text,
                encoded: data[start..start + len].to_vec(),
            });
        }

        let (styles, span_names) = if has_styles {
            let styles_base = offset + styles_start;
            let chunk = &data[..chunk_end];
            let mut names = Vec::new();
            for style_offset in &style_offsets {
                let mut pos = styles_base.saturating_add(*style_offset as usize);
                loop {
                    let name = read_u32(chunk, pos, "style span")?;
                    if name == SPAN_END {
                        break;
                    }
                    names.push(name);
                    pos += 12;
                }
            }
            (data[styles_base..chunk_end].to_vec(), names)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Self {
            flags,
            strings,
            style_offsets,
            styles,
            span_names,
            raw: Some(header.bytes(data).to_vec()),
        })
    }

    /// Create an empty UTF-8 pool
    pub fn new_utf8() -> Self {
        Self {
            flags: UTF8_FLAG,
            strings: Vec::new(),
            style_offsets: Vec::new(),
            styles: Vec::new(),
            span_names: Vec::new(),
            raw: None,
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn is_utf8(&self) -> bool {
        self.flags & UTF8_FLAG != 0
    }

    /// Whether the pool still matches the bytes it was parsed from
    pub fn is_pristine(&self) -> bool {
        self.raw.is_some()
    }

    pub fn style_count(&self) -> usize {
        self.style_offsets.len()
    }

    /// Whether the string at `index` carries style spans
    pub fn is_styled(&self, index: u32) -> bool {
        (index as usize) < self.style_offsets.len()
    }

    /// String indices used as span tag names by the style block
    pub fn span_names(&self) -> &[u32] {
        &self.span_names
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        if index == NO_STRING {
            return None;
        }
        self.strings.get(index as usize).map(|s| s.text.as_str())
    }

    /// Like [`get`](Self::get) but reports a bad index as a parse error
    pub fn resolve(&self, index: u32) -> Result<&str, ParseError> {
        self.get(index).ok_or(ParseError::StringIndex {
            index,
            len: self.strings.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.text.as_str())
    }

    /// First index holding `text`
    pub fn find(&self, text: &str) -> Option<u32> {
        self.strings
            .iter()
            .position(|s| s.text == text)
            .map(|i| i as u32)
    }

    /// Replace the string at `index`, keeping every reference to it valid
    pub fn set(&mut self, index: u32, text: &str) {
        let encoded = self.encode(text);
        if let Some(slot) = self.strings.get_mut(index as usize) {
            if slot.text != text {
                slot.text = text.to_string();
                slot.encoded = encoded;
                self.raw = None;
            }
        }
    }

    /// Append a string and return its index
    pub fn push(&mut self, text: &str) -> u32 {
        let encoded = self.encode(text);
        self.strings.push(PoolString {
            text: text.to_string(),
            encoded,
        });
        self.raw = None;
        (self.strings.len() - 1) as u32
    }

    /// Build a new pool that keeps the strings selected by `keep` (in order)
    /// and appends `extra`. Returns the pool and the old-index -> new-index map.
    ///
    /// Only valid for pools without styles, which is what key pools are.
    pub fn rebuilt(&self, keep: impl Fn(u32) -> bool, extra: &[String]) -> (Self, HashMap<u32, u32>) {
        let mut pool = Self {
            flags: self.flags & !SORTED_FLAG,
            strings: Vec::with_capacity(self.strings.len() + extra.len()),
            style_offsets: Vec::new(),
            styles: Vec::new(),
            span_names: Vec::new(),
            raw: None,
        };
        let mut remap = HashMap::new();
        for (index, string) in self.strings.iter().enumerate() {
            if keep(index as u32) {
                remap.insert(index as u32, pool.strings.len() as u32);
                pool.strings.push(string.clone());
            }
        }
        for text in extra {
            pool.push(text);
        }
        (pool, remap)
    }

    /// Serialize the pool chunk
    pub fn to_bytes(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }

        let string_count = self.strings.len() as u32;
        let style_count = self.style_offsets.len() as u32;
        let strings_start = POOL_HEADER_SIZE as u32 + 4 * (string_count + style_count);

        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(self.strings.len());
        for string in &self.strings {
            offsets.push(data.len() as u32);
            data.extend_from_slice(&string.encoded);
        }
        pad_to_four(&mut data);

        let styles_start = if style_count > 0 {
            strings_start + data.len() as u32
        } else {
            0
        };

        let mut out = Vec::with_capacity(strings_start as usize + data.len() + self.styles.len());
        push_u16(&mut out, RES_STRING_POOL_TYPE);
        push_u16(&mut out, POOL_HEADER_SIZE);
        push_u32(&mut out, 0);
        push_u32(&mut out, string_count);
        push_u32(&mut out, style_count);
        push_u32(&mut out, self.flags & !SORTED_FLAG);
        push_u32(&mut out, if string_count > 0 { strings_start } else { 0 });
        push_u32(&mut out, styles_start);
        for offset in offsets {
            push_u32(&mut out, offset);
        }
        for offset in &self.style_offsets {
            push_u32(&mut out, *offset);
        }
        out.extend_from_slice(&data);
        out.extend_from_slice(&self.styles);
        pad_to_four(&mut out);
        set_chunk_size(&mut out);
        out
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        if self.is_utf8() {
            encode_utf8(text)
        } else {
            encode_utf16(text)
        }
    }
}

fn decode_utf8(data: &[u8], start: usize, limit: usize) -> Result<(String, usize), ParseError> {
    let mut reader = ByteReader::at(&data[..limit], start);
    // UTF-16 length first, then the byte length; both are 1 or 2 bytes
    read_utf8_length(&mut reader)?;
    let byte_len = read_utf8_length(&mut reader)?;
    let bytes = reader.bytes(byte_len, "utf-8 string")?;
    reader.u8("utf-8 terminator")?;
    let text = String::from_utf8_lossy(bytes).into_owned();
    Ok((text, reader.position() - start))
}

fn read_utf8_length(reader: &mut ByteReader<'_>) -> Result<usize, ParseError> {
    let first = reader.u8("utf-8 length")? as usize;
    if first & 0x80 != 0 {
        let second = reader.u8("utf-8 length")? as usize;
        Ok(((first & 0x7F) << 8) | second)
    } else {
        Ok(first)
    }
}

fn decode_utf16(data: &[u8], start: usize, limit: usize) -> Result<(String, usize), ParseError> {
    let mut reader = ByteReader::at(&data[..limit], start);
    let first = reader.u16("utf-16 length")? as usize;
    let len = if first & 0x8000 != 0 {
        let second = reader.u16("utf-16 length")? as usize;
        ((first & 0x7FFF) << 16) | second
    } else {
        first
    };
    let mut units = Vec::with_capacity(len.min(limit.saturating_sub(start) / 2));
    for _ in 0..len {
        units.push(reader.u16("utf-16 string")?);
    }
    reader.u16("utf-16 terminator")?;
    Ok((String::from_utf16_lossy(&units), reader.position() - start))
}

fn push_utf8_length(buf: &mut Vec<u8>, len: usize) {
    if len > 0x7F {
        buf.push((((len >> 8) & 0x7F) as u8) | 0x80);
        buf.push((len & 0xFF) as u8);
    } else {
        buf.push(len as u8);
    }
}

fn encode_utf8(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 3);
    push_utf8_length(&mut buf, text.encode_utf16().count());
    push_utf8_length(&mut buf, text.len());
    buf.extend_from_slice(text.as_bytes());
    buf.push(0);
    buf
}

fn encode_utf16(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut buf = Vec::with_capacity(units.len() * 2 + 4);
    if units.len() > 0x7FFF {
        push_u16(&mut buf, (((units.len() >> 16) & 0x7FFF) as u16) | 0x8000);
        push_u16(&mut buf, (units.len() & 0xFFFF) as u16);
    } else {
        push_u16(&mut buf, units.len() as u16);
    }
    for unit in units {
        push_u16(&mut buf, unit);
    }
    push_u16(&mut buf, 0);
    buf
}
