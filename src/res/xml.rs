// Compiled (binary) XML documents
//
// ```
// RES_XML_TYPE
// ├── RES_STRING_POOL_TYPE
// ├── RES_XML_RESOURCE_MAP_TYPE      attribute name index -> resource id
// └── node chunks                    namespaces, elements, cdata
// ```
//
// Everything after the string pool is kept as one byte buffer. String index
// fields inside it are recorded while parsing so a rewrite can patch them
// without re-encoding any node.

use super::chunk::{
    patch_u32, read_u16, read_u32, set_chunk_size, ChunkHeader, RES_STRING_POOL_TYPE,
    RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE,
    RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE,
    RES_XML_TYPE,
};
use super::string_pool::{StringPool, NO_STRING};
use super::value::{ResValue, TYPE_STRING};
use super::{ParseError, ResId};

const NODE_COMMENT_OFFSET: usize = 12;
const ATTRIBUTE_RAW_OFFSET: usize = 8;
const ATTRIBUTE_TYPED_OFFSET: usize = 12;
const RES_VALUE_DATA_OFFSET: usize = 4;

/// One attribute of a start-element node
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub element: String,
    pub namespace: Option<String>,
    pub name: String,
    /// Resource id bound to the attribute name through the resource map
    pub name_id: Option<ResId>,
    pub raw_value: Option<String>,
    pub raw_index: Option<u32>,
    pub typed_value: ResValue,
    /// Byte offset of the attribute record in the parsed document
    pub offset: usize,
}

impl XmlAttribute {
    /// The string this attribute's value reads as, if it is string-typed
    pub fn string_value(&self) -> Option<&str> {
        if self.typed_value.data_type == TYPE_STRING {
            self.raw_value.as_deref()
        } else {
            None
        }
    }

    /// String index carried by the value, preferring the raw field
    fn value_string_index(&self) -> Option<u32> {
        self.raw_index.or_else(|| {
            (self.typed_value.data_type == TYPE_STRING).then_some(self.typed_value.data)
        })
    }
}

/// A parsed compiled XML document
#[derive(Debug, Clone)]
pub struct XmlDocument {
    header: Vec<u8>,
    before_pool: Vec<u8>,
    pool: StringPool,
    body: Vec<u8>,
    /// Offset of `body` in the parsed document
    body_start: usize,
    trailing: Vec<u8>,
    attributes: Vec<XmlAttribute>,
    /// Body-relative offsets of every u32 string index field
    string_refs: Vec<usize>,
}

impl XmlDocument {
    /// Whether `data` starts like a compiled XML document
    pub fn is_binary_xml(data: &[u8]) -> bool {
        data.len() >= 8
            && read_u16(data, 0, "xml magic").ok() == Some(RES_XML_TYPE)
            && read_u16(data, 2, "xml header size").ok() == Some(8)
    }

    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let header = ChunkHeader::expect(data, 0, RES_XML_TYPE, "xml document")?;

        let mut offset = header.body_start();
        let mut pool_chunk = None;
        while offset < header.end() {
            let chunk = ChunkHeader::read(data, offset)?;
            if chunk.chunk_type == RES_STRING_POOL_TYPE {
                pool_chunk = Some(chunk);
                break;
            }
            offset = chunk.end();
        }
        let pool_chunk = pool_chunk.ok_or_else(|| ParseError::InvalidChunk {
            offset: 0,
            reason: "xml document has no string pool".to_string(),
        })?;
        let pool = StringPool::parse(data, pool_chunk.offset)?;
        let body_start = pool_chunk.end();

        let mut document = Self {
            header: data[..header.body_start()].to_vec(),
            before_pool: data[header.body_start()..pool_chunk.offset].to_vec(),
            pool,
            body: data[body_start..header.end()].to_vec(),
            body_start,
            trailing: data[header.end()..].to_vec(),
            attributes: Vec::new(),
            string_refs: Vec::new(),
        };
        document.scan_nodes(data, body_start, header.end())?;
        Ok(document)
    }

    fn scan_nodes(&mut self, data: &[u8], start: usize, end: usize) -> Result<(), ParseError> {
        let mut resource_map: Vec<u32> = Vec::new();
        let mut offset = start;

        while offset < end {
            let chunk = ChunkHeader::read(data, offset)?;
            let ext = chunk.body_start();
            let rel = |absolute: usize| absolute - start;

            match chunk.chunk_type {
                RES_XML_RESOURCE_MAP_TYPE => {
                    let count = (chunk.size as usize - chunk.header_size as usize) / 4;
                    resource_map = (0..count)
                        .map(|i| read_u32(data, ext + i * 4, "resource map"))
                        .collect::<Result<_, _>>()?;
                }
                RES_XML_START_NAMESPACE_TYPE | RES_XML_END_NAMESPACE_TYPE => {
                    self.string_refs.push(rel(offset + NODE_COMMENT_OFFSET));
                    self.string_refs.push(rel(ext));
                    self.string_refs.push(rel(ext + 4));
                }
                RES_XML_END_ELEMENT_TYPE => {
                    self.string_refs.push(rel(offset + NODE_COMMENT_OFFSET));
                    self.string_refs.push(rel(ext));
                    self.string_refs.push(rel(ext + 4));
                }
                RES_XML_CDATA_TYPE => {
                    self.string_refs.push(rel(offset + NODE_COMMENT_OFFSET));
                    self.string_refs.push(rel(ext));
                    let typed = ResValue::read(data, ext + 4)?;
                    if typed.data_type == TYPE_STRING {
                        self.string_refs.push(rel(ext + 4 + RES_VALUE_DATA_OFFSET));
                    }
                }
                RES_XML_START_ELEMENT_TYPE => {
                    self.string_refs.push(rel(offset + NODE_COMMENT_OFFSET));
                    self.string_refs.push(rel(ext));
                    self.string_refs.push(rel(ext + 4));

                    let element = self.pool.resolve(read_u32(data, ext + 4, "element name")?)?.to_string();
                    let attribute_start = read_u16(data, ext + 8, "attribute start")? as usize;
                    let attribute_size = read_u16(data, ext + 10, "attribute size")? as usize;
                    let attribute_count = read_u16(data, ext + 12, "attribute count")? as usize;

                    for i in 0..attribute_count {
                        let at = ext + attribute_start + i * attribute_size;
                        let attribute = self.read_attribute(data, at, &element, &resource_map)?;

                        self.string_refs.push(rel(at));
                        self.string_refs.push(rel(at + 4));
                        self.string_refs.push(rel(at + ATTRIBUTE_RAW_OFFSET));
                        if attribute.typed_value.data_type == TYPE_STRING {
                            self.string_refs
                                .push(rel(at + ATTRIBUTE_TYPED_OFFSET + RES_VALUE_DATA_OFFSET));
                        }
                        self.attributes.push(attribute);
                    }
                }
                _ => {}
            }
            offset = chunk.end();
        }
        Ok(())
    }

    fn read_attribute(
        &self,
        data: &[u8],
        at: usize,
        element: &str,
        resource_map: &[u32],
    ) -> Result<XmlAttribute, ParseError> {
        let namespace = read_u32(data, at, "attribute namespace")?;
        let name = read_u32(data, at + 4, "attribute name")?;
        let raw = read_u32(data, at + ATTRIBUTE_RAW_OFFSET, "attribute raw value")?;
        let typed_value = ResValue::read(data, at + ATTRIBUTE_TYPED_OFFSET)?;

        let raw_index = (raw != NO_STRING).then_some(raw);
        Ok(XmlAttribute {
            element: element.to_string(),
            namespace: self.pool.get(namespace).map(str::to_string),
            name: self.pool.resolve(name)?.to_string(),
            name_id: resource_map
                .get(name as usize)
                .copied()
                .filter(|id| *id != 0)
                .map(ResId),
            raw_value: match raw_index {
                Some(index) => Some(self.pool.resolve(index)?.to_string()),
                None => None,
            },
            raw_index,
            typed_value,
            offset: at,
        })
    }

    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    /// Number of places in the document that use string `index`
    pub fn string_use_count(&self, index: u32) -> usize {
        let fields = self
            .string_refs
            .iter()
            .filter(|rel| read_u32(&self.body, **rel, "string ref").ok() == Some(index))
            .count();
        let spans = self.pool.span_names().iter().filter(|i| **i == index).count();
        fields + spans
    }

    /// Make the attribute at `offset` read `text`.
    ///
    /// Edits the pooled string when this attribute is its only user, otherwise
    /// points the attribute at another pool string holding `text`.
    pub fn rewrite_attribute_string(&mut self, offset: usize, text: &str) -> Result<(), ParseError> {
        let position = self
            .attributes
            .iter()
            .position(|a| a.offset == offset)
            .ok_or(ParseError::NoAttribute { offset })?;
        let attribute = &self.attributes[position];
        let index = attribute
            .value_string_index()
            .ok_or(ParseError::NoAttribute { offset })?;

        let rel = offset - self.body_start;
        let typed_is_string = attribute.typed_value.data_type == TYPE_STRING
            && attribute.typed_value.data == index;
        let own_uses = usize::from(attribute.raw_index == Some(index)) + usize::from(typed_is_string);

        let new_index = if self.string_use_count(index) == own_uses {
            self.pool.set(index, text);
            index
        } else {
            let reusable = self
                .pool
                .find(text)
                .filter(|found| *found as usize >= self.pool.style_count());
            let new_index = reusable.unwrap_or_else(|| self.pool.push(text));
            if attribute.raw_index == Some(index) {
                patch_u32(&mut self.body, rel + ATTRIBUTE_RAW_OFFSET, new_index);
            }
            if typed_is_string {
                patch_u32(
                    &mut self.body,
                    rel + ATTRIBUTE_TYPED_OFFSET + RES_VALUE_DATA_OFFSET,
                    new_index,
                );
            }
            new_index
        };

        let attribute = &mut self.attributes[position];
        if attribute.raw_index.is_some() {
            attribute.raw_index = Some(new_index);
            attribute.raw_value = Some(text.to_string());
        }
        if typed_is_string {
            attribute.typed_value.data = new_index;
        }
        Ok(())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.header.clone();
        out.extend_from_slice(&self.before_pool);
        out.extend_from_slice(&self.pool.to_bytes());
        out.extend_from_slice(&self.body);
        set_chunk_size(&mut out);
        out.extend_from_slice(&self.trailing);
        out
    }
}
