// Chunk framing shared by the resource table and compiled XML formats.
//
// Every structure starts with a ResChunk_header:
// ```
// u16 type | u16 header_size | u32 size
// ```
// `size` covers the header, the body and any children.

use super::ParseError;
use byteorder::{ByteOrder, LittleEndian};

pub const RES_NULL_TYPE: u16 = 0x0000;
pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;

pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
pub const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;

/// Size of the common chunk header
pub const CHUNK_HEADER_SIZE: usize = 8;

/// A decoded ResChunk_header, positioned inside its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: u16,
    pub header_size: u16,
    pub size: u32,
    /// Absolute offset of the chunk inside the buffer it was read from
    pub offset: usize,
}

impl ChunkHeader {
    /// Read and validate the chunk header at `offset`
    pub fn read(data: &[u8], offset: usize) -> Result<Self, ParseError> {
        let mut reader = ByteReader::at(data, offset);
        let chunk_type = reader.u16("chunk type")?;
        let header_size = reader.u16("chunk header size")?;
        let size = reader.u32("chunk size")?;

        if (header_size as usize) < CHUNK_HEADER_SIZE || size < header_size as u32 {
            return Err(ParseError::InvalidChunk {
                offset,
                reason: format!("header size {} / chunk size {}", header_size, size),
            });
        }

        if offset + size as usize > data.len() {
            return Err(ParseError::Truncated {
                offset: data.len(),
                context: "chunk body",
            });
        }

        Ok(Self {
            chunk_type,
            header_size,
            size,
            offset,
        })
    }

    /// Read the header and require a specific chunk type
    pub fn expect(
        data: &[u8],
        offset: usize,
        chunk_type: u16,
        expected: &'static str,
    ) -> Result<Self, ParseError> {
        let header = Self::read(data, offset)?;
        if header.chunk_type != chunk_type {
            return Err(ParseError::UnexpectedChunk {
                offset,
                found: header.chunk_type,
                expected,
            });
        }
        Ok(header)
    }

    /// Absolute offset one past the end of the chunk
    pub fn end(&self) -> usize {
        self.offset + self.size as usize
    }

    /// Absolute offset of the first byte after the header
    pub fn body_start(&self) -> usize {
        self.offset + self.header_size as usize
    }

    /// The full chunk bytes
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.end()]
    }
}

/// Bounds-checked little-endian cursor over a byte slice
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(ParseError::Truncated {
                offset: self.pos,
                context,
            }),
        }
    }

    pub fn u8(&mut self, context: &'static str) -> Result<u8, ParseError> {
        Ok(self.take(1, context)?[0])
    }

    pub fn u16(&mut self, context: &'static str) -> Result<u16, ParseError> {
        Ok(LittleEndian::read_u16(self.take(2, context)?))
    }

    pub fn u32(&mut self, context: &'static str) -> Result<u32, ParseError> {
        Ok(LittleEndian::read_u32(self.take(4, context)?))
    }

    pub fn bytes(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], ParseError> {
        self.take(len, context)
    }
}

pub fn read_u16(data: &[u8], offset: usize, context: &'static str) -> Result<u16, ParseError> {
    ByteReader::at(data, offset).u16(context)
}

pub fn read_u32(data: &[u8], offset: usize, context: &'static str) -> Result<u32, ParseError> {
    ByteReader::at(data, offset).u32(context)
}

pub fn push_u16(buf: &mut Vec<u8>, value: u16) {
    let mut bytes = [0u8; 2];
    LittleEndian::write_u16(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

pub fn push_u32(buf: &mut Vec<u8>, value: u32) {
    let mut bytes = [0u8; 4];
    LittleEndian::write_u32(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

/// Overwrite a u16 field in place. The caller guarantees the offset came from parsing.
pub fn patch_u16(buf: &mut [u8], offset: usize, value: u16) {
    LittleEndian::write_u16(&mut buf[offset..offset + 2], value);
}

/// Overwrite a u32 field in place. The caller guarantees the offset came from parsing.
pub fn patch_u32(buf: &mut [u8], offset: usize, value: u32) {
    LittleEndian::write_u32(&mut buf[offset..offset + 4], value);
}

/// Rewrite the `size` field of a chunk that starts at the beginning of `buf`
pub fn set_chunk_size(buf: &mut [u8]) {
    let size = buf.len() as u32;
    patch_u32(buf, 4, size);
}

pub fn pad_to_four(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}
