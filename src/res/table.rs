// ResTable reader/writer
//
// ```
// RES_TABLE_TYPE
// ├── RES_STRING_POOL_TYPE           global value pool
// └── RES_TABLE_PACKAGE_TYPE         one per package
//     ├── RES_STRING_POOL_TYPE       type names
//     ├── RES_STRING_POOL_TYPE       key (entry) names
//     ├── RES_TABLE_TYPE_SPEC_TYPE   per type: entry count and public flags
//     ├── RES_TABLE_TYPE_TYPE        per type and configuration: entries
//     └── ...                        library / overlayable / staged alias (opaque)
// ```
//
// Every chunk keeps its original bytes. Renames and file moves are applied by
// rebuilding the affected string pool and patching fixed-width index fields in
// place, so chunk layouts are never re-derived and an untouched table
// serializes byte for byte.

use super::chunk::{
    patch_u16, patch_u32, read_u16, read_u32, set_chunk_size, ChunkHeader, RES_STRING_POOL_TYPE,
    RES_TABLE_PACKAGE_TYPE, RES_TABLE_TYPE, RES_TABLE_TYPE_SPEC_TYPE, RES_TABLE_TYPE_TYPE,
};
use super::config::ResConfig;
use super::string_pool::StringPool;
use super::value::{Bag, BagItem, ResValue, Value};
use super::{ParseError, ResId};
use std::collections::{btree_map, BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};

const TABLE_HEADER_SIZE: u16 = 12;

const PACKAGE_NAME_OFFSET: usize = 12;
const PACKAGE_NAME_UNITS: usize = 128;
const TYPE_STRINGS_OFFSET: usize = 268;
const KEY_STRINGS_OFFSET: usize = 276;
const TYPE_ID_OFFSET_OFFSET: usize = 284;
const MIN_PACKAGE_HEADER: u16 = 284;

const SPEC_PUBLIC: u32 = 0x4000_0000;

const TYPE_FLAG_SPARSE: u8 = 0x01;
const TYPE_FLAG_OFFSET16: u8 = 0x02;
const TYPE_CONFIG_OFFSET: usize = 20;
const NO_ENTRY: u32 = 0xFFFF_FFFF;
const NO_ENTRY16: u16 = 0xFFFF;

const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
const ENTRY_FLAG_PUBLIC: u16 = 0x0002;
const ENTRY_FLAG_COMPACT: u16 = 0x0008;
const MAP_ENTRY_SIZE: usize = 12;

#[derive(Debug, Clone)]
enum TableChild {
    ValuePool,
    Package(usize),
    Opaque(Vec<u8>),
}

#[derive(Debug, Clone)]
enum PackageChild {
    TypePool,
    KeyPool,
    Chunk(Vec<u8>),
}

/// Location of an entry's key-name index inside a type chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyField {
    offset: usize,
    compact: bool,
}

/// A parsed resource table
#[derive(Debug, Clone)]
pub struct ResourceTable {
    header: Vec<u8>,
    value_pool: StringPool,
    packages: Vec<Package>,
    children: Vec<TableChild>,
    trailing: Vec<u8>,
    lookup: HashMap<ResId, (usize, usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub id: u8,
    pub name: String,
    types: Vec<TypeSpec>,
    header: Vec<u8>,
    children: Vec<PackageChild>,
    type_pool: StringPool,
    key_pool: StringPool,
    referenced_keys: HashSet<u32>,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub id: u8,
    pub name: String,
    entries: Vec<Entry>,
}

/// One named, id-addressed resource
#[derive(Debug, Clone)]
pub struct Entry {
    id: ResId,
    name: String,
    original_name: String,
    config_values: Vec<ConfigValue>,
    public: bool,
}

/// A value defined for one configuration
#[derive(Debug, Clone)]
pub struct ConfigValue {
    pub config: ResConfig,
    pub value: Value,
    chunk: usize,
    key_field: KeyField,
    original_key: u32,
    data_offset: Option<usize>,
}

struct ParsedEntry {
    key: u32,
    key_field: KeyField,
    flags: u16,
    value: Value,
    data_offset: Option<usize>,
}

impl ResourceTable {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let header = ChunkHeader::expect(data, 0, RES_TABLE_TYPE, "resource table")?;
        if header.header_size < TABLE_HEADER_SIZE {
            return Err(ParseError::InvalidChunk {
                offset: 0,
                reason: format!("table header size {}", header.header_size),
            });
        }

        let mut value_pool: Option<StringPool> = None;
        let mut packages = Vec::new();
        let mut children = Vec::new();

        let mut offset = header.body_start();
        while offset < header.end() {
            let chunk = ChunkHeader::read(data, offset)?;
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE if value_pool.is_none() => {
                    value_pool = Some(StringPool::parse(data, offset)?);
                    children.push(TableChild::ValuePool);
                }
                RES_TABLE_PACKAGE_TYPE => {
                    let pool = value_pool.as_ref().ok_or_else(|| ParseError::InvalidChunk {
                        offset,
                        reason: "package precedes the value string pool".to_string(),
                    })?;
                    packages.push(Package::parse(data, chunk, pool)?);
                    children.push(TableChild::Package(packages.len() - 1));
                }
                other => {
                    trace!("Keeping opaque table chunk {:#06x} at {:#x}", other, offset);
                    children.push(TableChild::Opaque(chunk.bytes(data).to_vec()));
                }
            }
            offset = chunk.end();
        }

        let value_pool = value_pool.ok_or_else(|| ParseError::InvalidChunk {
            offset: 0,
            reason: "missing value string pool".to_string(),
        })?;

        let mut table = Self {
            header: data[..header.header_size as usize].to_vec(),
            value_pool,
            packages,
            children,
            trailing: data[header.end()..].to_vec(),
            lookup: HashMap::new(),
        };
        table.build_lookup();

        debug!(
            "Parsed resource table: {} packages, {} entries",
            table.packages.len(),
            table.lookup.len()
        );
        Ok(table)
    }

    fn build_lookup(&mut self) {
        self.lookup.clear();
        for (p, package) in self.packages.iter().enumerate() {
            for (t, spec) in package.types.iter().enumerate() {
                for (e, entry) in spec.entries.iter().enumerate() {
                    self.lookup.insert(entry.id, (p, t, e));
                }
            }
        }
    }

    /// Re-emit the table. Untouched parts are copied from their original bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut out = self.header.clone();
        for child in &self.children {
            match child {
                TableChild::ValuePool => out.extend_from_slice(&self.value_pool.to_bytes()),
                TableChild::Package(index) => {
                    out.extend_from_slice(&self.packages[*index].serialize()?)
                }
                TableChild::Opaque(bytes) => out.extend_from_slice(bytes),
            }
        }
        set_chunk_size(&mut out);
        out.extend_from_slice(&self.trailing);
        Ok(out)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn value_pool(&self) -> &StringPool {
        &self.value_pool
    }

    /// Whether `package_id` is one of this table's packages
    pub fn owns_package(&self, package_id: u8) -> bool {
        self.packages.iter().any(|p| p.id == package_id)
    }

    pub fn contains(&self, id: ResId) -> bool {
        self.lookup.contains_key(&id)
    }

    pub fn entry(&self, id: ResId) -> Option<&Entry> {
        self.locate(id).map(|(_, _, entry)| entry)
    }

    /// The package, type and entry for `id`
    pub fn locate(&self, id: ResId) -> Option<(&Package, &TypeSpec, &Entry)> {
        let (p, t, e) = *self.lookup.get(&id)?;
        let package = &self.packages[p];
        let spec = &package.types[t];
        Some((package, spec, &spec.entries[e]))
    }

    /// Every entry in table order (package, type, entry index)
    pub fn entries(&self) -> impl Iterator<Item = (&Package, &TypeSpec, &Entry)> {
        self.packages.iter().flat_map(|package| {
            package.types.iter().flat_map(move |spec| {
                spec.entries
                    .iter()
                    .map(move |entry| (package, spec, entry))
            })
        })
    }

    /// Every file path named by a file value, in table order without repeats
    pub fn file_paths(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for (_, _, entry) in self.entries() {
            for cv in &entry.config_values {
                if let Some(path) = cv.value.file_path() {
                    if seen.insert(path) {
                        paths.push(path.to_string());
                    }
                }
            }
        }
        paths
    }

    /// `(source, target)` pairs whose target lies in one of this table's
    /// packages but is not defined
    pub fn unresolved_references(&self) -> Vec<(ResId, ResId)> {
        let mut missing = BTreeSet::new();
        for (_, _, entry) in self.entries() {
            for cv in &entry.config_values {
                for target in cv.value.referenced_ids() {
                    if self.owns_package(target.package_id()) && !self.contains(target) {
                        missing.insert((entry.id, target));
                    }
                }
            }
        }
        missing.into_iter().collect()
    }

    /// Give the entry a new key name. Returns false if `id` is unknown.
    pub fn rename_entry(&mut self, id: ResId, name: &str) -> bool {
        let Some(&(p, t, e)) = self.lookup.get(&id) else {
            return false;
        };
        self.packages[p].types[t].entries[e].name = name.to_string();
        true
    }

    /// Point every file value naming a key of `moves` at the mapped path.
    ///
    /// The pooled string is edited in place when file values with that path
    /// are its only users; otherwise a new string is appended and those values
    /// are re-pointed. Returns the number of values updated.
    pub fn relocate_files(&mut self, moves: &HashMap<String, String>) -> usize {
        if moves.is_empty() {
            return 0;
        }

        let users = self.string_users();
        let mut sites: BTreeMap<u32, (String, Vec<(usize, usize, usize, usize)>)> = BTreeMap::new();
        for (p, package) in self.packages.iter().enumerate() {
            for (t, spec) in package.types.iter().enumerate() {
                for (e, entry) in spec.entries.iter().enumerate() {
                    for (c, cv) in entry.config_values.iter().enumerate() {
                        if let Value::File { index, path } = &cv.value {
                            if let Some(target) = moves.get(path) {
                                sites
                                    .entry(*index)
                                    .or_insert_with(|| (target.clone(), Vec::new()))
                                    .1
                                    .push((p, t, e, c));
                            }
                        }
                    }
                }
            }
        }

        let mut updated = 0;
        for (index, (target, positions)) in sites {
            let in_place = users.get(&index).copied().unwrap_or(0) == positions.len();
            let new_index = if in_place {
                self.value_pool.set(index, &target);
                index
            } else {
                self.value_pool.push(&target)
            };

            for (p, t, e, c) in positions {
                let package = &mut self.packages[p];
                let cv = &mut package.types[t].entries[e].config_values[c];
                cv.value = Value::File {
                    index: new_index,
                    path: target.clone(),
                };
                let (chunk, data_offset) = (cv.chunk, cv.data_offset);
                if !in_place {
                    if let Some(offset) = data_offset {
                        package.patch_chunk(chunk, offset, new_index);
                    }
                }
                updated += 1;
            }
        }
        updated
    }

    /// Single-path form of [`relocate_files`](Self::relocate_files)
    pub fn relocate_file(&mut self, old: &str, new: &str) -> usize {
        self.relocate_files(&HashMap::from([(old.to_string(), new.to_string())]))
    }

    /// How many value and span references each value-pool string has
    fn string_users(&self) -> HashMap<u32, usize> {
        let mut users: HashMap<u32, usize> = HashMap::new();
        for (_, _, entry) in self.entries() {
            for cv in &entry.config_values {
                for index in cv.value.string_indices() {
                    *users.entry(index).or_default() += 1;
                }
            }
        }
        for index in self.value_pool.span_names() {
            *users.entry(*index).or_default() += 1;
        }
        users
    }
}

impl Package {
    fn parse(data: &[u8], chunk: ChunkHeader, value_pool: &StringPool) -> Result<Self, ParseError> {
        let base = chunk.offset;
        if chunk.header_size < MIN_PACKAGE_HEADER {
            return Err(ParseError::InvalidChunk {
                offset: base,
                reason: format!("package header size {}", chunk.header_size),
            });
        }

        let id = read_u32(data, base + 8, "package id")? as u8;
        let mut units = Vec::with_capacity(PACKAGE_NAME_UNITS);
        for i in 0..PACKAGE_NAME_UNITS {
            let unit = read_u16(data, base + PACKAGE_NAME_OFFSET + i * 2, "package name")?;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        let name = String::from_utf16_lossy(&units);

        let type_strings = read_u32(data, base + TYPE_STRINGS_OFFSET, "type strings offset")? as usize;
        let key_strings = read_u32(data, base + KEY_STRINGS_OFFSET, "key strings offset")? as usize;
        let type_id_offset = if chunk.header_size as usize >= TYPE_ID_OFFSET_OFFSET + 4 {
            read_u32(data, base + TYPE_ID_OFFSET_OFFSET, "type id offset")? as u8
        } else {
            0
        };

        let mut children = Vec::new();
        let mut type_pool = None;
        let mut key_pool = None;
        let mut offset = chunk.body_start();
        while offset < chunk.end() {
            let child = ChunkHeader::read(data, offset)?;
            let relative = offset - base;
            if child.chunk_type == RES_STRING_POOL_TYPE && relative == type_strings {
                type_pool = Some(StringPool::parse(data, offset)?);
                children.push(PackageChild::TypePool);
            } else if child.chunk_type == RES_STRING_POOL_TYPE && relative == key_strings {
                key_pool = Some(StringPool::parse(data, offset)?);
                children.push(PackageChild::KeyPool);
            } else {
                children.push(PackageChild::Chunk(child.bytes(data).to_vec()));
            }
            offset = child.end();
        }

        let type_pool = type_pool.ok_or_else(|| ParseError::InvalidChunk {
            offset: base,
            reason: "package has no type string pool".to_string(),
        })?;
        let key_pool = key_pool.ok_or_else(|| ParseError::InvalidChunk {
            offset: base,
            reason: "package has no key string pool".to_string(),
        })?;

        let mut package = Self {
            id,
            name,
            types: Vec::new(),
            header: data[base..chunk.body_start()].to_vec(),
            children,
            type_pool,
            key_pool,
            referenced_keys: HashSet::new(),
        };
        package.decode_types(type_id_offset, value_pool)?;
        Ok(package)
    }

    fn decode_types(&mut self, type_id_offset: u8, value_pool: &StringPool) -> Result<(), ParseError> {
        let mut specs: Vec<(TypeSpec, Vec<u32>, BTreeMap<u16, Entry>)> = Vec::new();
        let mut positions: HashMap<u8, usize> = HashMap::new();

        for (index, child) in self.children.iter().enumerate() {
            let PackageChild::Chunk(bytes) = child else {
                continue;
            };
            let header = ChunkHeader::read(bytes, 0)?;
            match header.chunk_type {
                RES_TABLE_TYPE_SPEC_TYPE => {
                    let type_id = bytes.get(8).copied().ok_or(ParseError::Truncated {
                        offset: 8,
                        context: "type spec id",
                    })?;
                    let entry_count = read_u32(bytes, 12, "type spec entry count")? as usize;
                    let mut flags = Vec::with_capacity(entry_count.min(bytes.len() / 4));
                    for i in 0..entry_count {
                        flags.push(read_u32(bytes, header.header_size as usize + i * 4, "type spec flags")?);
                    }
                    let pool_index = (type_id as u32)
                        .checked_sub(1 + type_id_offset as u32)
                        .ok_or(ParseError::InvalidChunk {
                            offset: 8,
                            reason: format!("type id {} below type id offset", type_id),
                        })?;
                    let name = self.type_pool.resolve(pool_index)?.to_string();
                    positions.insert(type_id, specs.len());
                    specs.push((
                        TypeSpec {
                            id: type_id,
                            name,
                            entries: Vec::new(),
                        },
                        flags,
                        BTreeMap::new(),
                    ));
                }
                RES_TABLE_TYPE_TYPE => {
                    let type_id = bytes.get(8).copied().ok_or(ParseError::Truncated {
                        offset: 8,
                        context: "type id",
                    })?;
                    let position = *positions.get(&type_id).ok_or_else(|| ParseError::InvalidChunk {
                        offset: 8,
                        reason: format!("type chunk {} without a type spec", type_id),
                    })?;
                    let (spec, flags, entries) = &mut specs[position];
                    let file_backed = spec.name != "string";
                    let config = ResConfig::read(bytes, TYPE_CONFIG_OFFSET)?;

                    for (entry_index, entry_offset) in entry_offsets(bytes, &header)? {
                        if entry_index as usize >= flags.len() {
                            return Err(ParseError::InvalidChunk {
                                offset: entry_offset,
                                reason: format!(
                                    "entry {} beyond type spec count {}",
                                    entry_index,
                                    flags.len()
                                ),
                            });
                        }
                        let parsed = parse_entry(bytes, entry_offset, value_pool, file_backed)?;
                        let public = flags[entry_index as usize] & SPEC_PUBLIC != 0
                            || parsed.flags & ENTRY_FLAG_PUBLIC != 0;
                        self.referenced_keys.insert(parsed.key);

                        let entry = match entries.entry(entry_index) {
                            btree_map::Entry::Occupied(slot) => slot.into_mut(),
                            btree_map::Entry::Vacant(slot) => {
                                let name = self.key_pool.resolve(parsed.key)?.to_string();
                                slot.insert(Entry {
                                    id: ResId::new(self.id, type_id, entry_index),
                                    original_name: name.clone(),
                                    name,
                                    config_values: Vec::new(),
                                    public: false,
                                })
                            }
                        };
                        entry.public |= public;
                        entry.config_values.push(ConfigValue {
                            config: config.clone(),
                            value: parsed.value,
                            chunk: index,
                            key_field: parsed.key_field,
                            original_key: parsed.key,
                            data_offset: parsed.data_offset,
                        });
                    }
                }
                _ => {}
            }
        }

        self.types = specs
            .into_iter()
            .map(|(mut spec, _, entries)| {
                spec.entries = entries.into_values().collect();
                spec
            })
            .collect();
        Ok(())
    }

    pub fn types(&self) -> &[TypeSpec] {
        &self.types
    }

    pub fn type_named(&self, name: &str) -> Option<&TypeSpec> {
        self.types.iter().find(|t| t.name == name)
    }

    fn chunk_bytes(&self, index: usize) -> &[u8] {
        match &self.children[index] {
            PackageChild::Chunk(bytes) => bytes,
            _ => &[],
        }
    }

    fn patch_chunk(&mut self, index: usize, offset: usize, value: u32) {
        if let Some(PackageChild::Chunk(bytes)) = self.children.get_mut(index) {
            patch_u32(bytes, offset, value);
        }
    }

    fn is_renamed(&self) -> bool {
        self.types
            .iter()
            .flat_map(|t| &t.entries)
            .any(Entry::is_renamed)
    }

    /// Rebuild the key pool for the current entry names.
    ///
    /// Original order is kept, keys that only renamed entries used are dropped,
    /// keys no entry ever used are kept, and new names are appended in table
    /// order. Returns the pool and the key field patches to apply.
    fn rebuild_keys(&self) -> Result<(StringPool, Vec<(usize, KeyField, u32)>), ParseError> {
        let mut used = HashSet::new();
        let mut new_names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for entry in self.types.iter().flat_map(|t| &t.entries) {
            if entry.is_renamed() {
                if seen.insert(entry.name.as_str()) {
                    new_names.push(entry.name.clone());
                }
            } else {
                used.extend(entry.config_values.iter().map(|cv| cv.original_key));
            }
        }

        let keep = |index: u32| used.contains(&index) || !self.referenced_keys.contains(&index);
        let kept: HashSet<&str> = (0..self.key_pool.len() as u32)
            .filter(|i| keep(*i))
            .filter_map(|i| self.key_pool.get(i))
            .collect();
        new_names.retain(|name| !kept.contains(name.as_str()));

        let (pool, remap) = self.key_pool.rebuilt(keep, &new_names);
        let mut by_name: HashMap<&str, u32> = HashMap::new();
        for (index, text) in pool.iter().enumerate() {
            by_name.entry(text).or_insert(index as u32);
        }

        let mut patches = Vec::new();
        for entry in self.types.iter().flat_map(|t| &t.entries) {
            for cv in &entry.config_values {
                let index = if entry.is_renamed() {
                    by_name.get(entry.name.as_str()).copied()
                } else {
                    remap.get(&cv.original_key).copied()
                };
                let index = index.ok_or(ParseError::StringIndex {
                    index: cv.original_key,
                    len: pool.len(),
                })?;
                if cv.key_field.compact && index > u16::MAX as u32 {
                    return Err(ParseError::KeyIndexOverflow {
                        index: index as usize,
                    });
                }
                patches.push((cv.chunk, cv.key_field, index));
            }
        }

        debug!(
            "Rebuilt key pool of package {}: {} -> {} strings",
            self.name,
            self.key_pool.len(),
            pool.len()
        );
        Ok((pool, patches))
    }

    fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut patched: HashMap<usize, Vec<u8>> = HashMap::new();
        let key_pool = if self.is_renamed() {
            let (pool, patches) = self.rebuild_keys()?;
            for (chunk, field, index) in patches {
                let bytes = patched
                    .entry(chunk)
                    .or_insert_with(|| self.chunk_bytes(chunk).to_vec());
                if field.compact {
                    patch_u16(bytes, field.offset, index as u16);
                } else {
                    patch_u32(bytes, field.offset, index);
                }
            }
            pool.to_bytes()
        } else {
            self.key_pool.to_bytes()
        };

        let mut out = self.header.clone();
        for (index, child) in self.children.iter().enumerate() {
            match child {
                PackageChild::TypePool => {
                    let position = out.len() as u32;
                    patch_u32(&mut out, TYPE_STRINGS_OFFSET, position);
                    out.extend_from_slice(&self.type_pool.to_bytes());
                }
                PackageChild::KeyPool => {
                    let position = out.len() as u32;
                    patch_u32(&mut out, KEY_STRINGS_OFFSET, position);
                    out.extend_from_slice(&key_pool);
                }
                PackageChild::Chunk(bytes) => {
                    let bytes = patched.get(&index).map(Vec::as_slice).unwrap_or(bytes);
                    out.extend_from_slice(bytes);
                }
            }
        }
        set_chunk_size(&mut out);
        Ok(out)
    }
}

impl TypeSpec {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

impl Entry {
    pub fn id(&self) -> ResId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn is_renamed(&self) -> bool {
        self.name != self.original_name
    }

    pub fn config_values(&self) -> &[ConfigValue] {
        &self.config_values
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    /// First file-backed path, if any
    pub fn source_path(&self) -> Option<&str> {
        self.config_values.iter().find_map(|cv| cv.value.file_path())
    }

    /// All distinct file paths, in configuration order
    pub fn file_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for path in self.config_values.iter().filter_map(|cv| cv.value.file_path()) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}

/// `(entry index, offset of the entry inside the chunk)` for every present entry
fn entry_offsets(chunk: &[u8], header: &ChunkHeader) -> Result<Vec<(u16, usize)>, ParseError> {
    let flags = chunk.get(9).copied().unwrap_or(0);
    let entry_count = read_u32(chunk, 12, "type entry count")? as usize;
    let entries_start = read_u32(chunk, 16, "type entries start")? as usize;
    let table = header.header_size as usize;

    let mut offsets = Vec::new();
    if flags & TYPE_FLAG_SPARSE != 0 {
        for i in 0..entry_count {
            let index = read_u16(chunk, table + i * 4, "sparse entry index")?;
            let offset = read_u16(chunk, table + i * 4 + 2, "sparse entry offset")? as usize * 4;
            offsets.push((index, entries_start + offset));
        }
    } else if flags & TYPE_FLAG_OFFSET16 != 0 {
        for i in 0..entry_count {
            let offset = read_u16(chunk, table + i * 2, "entry offset")?;
            if offset != NO_ENTRY16 {
                offsets.push((i as u16, entries_start + offset as usize * 4));
            }
        }
    } else {
        for i in 0..entry_count {
            let offset = read_u32(chunk, table + i * 4, "entry offset")?;
            if offset != NO_ENTRY {
                offsets.push((i as u16, entries_start + offset as usize));
            }
        }
    }
    Ok(offsets)
}

fn parse_entry(
    chunk: &[u8],
    at: usize,
    value_pool: &StringPool,
    file_backed: bool,
) -> Result<ParsedEntry, ParseError> {
    let flags = read_u16(chunk, at + 2, "entry flags")?;

    if flags & ENTRY_FLAG_COMPACT != 0 {
        let key = read_u16(chunk, at, "compact entry key")? as u32;
        let data = read_u32(chunk, at + 4, "compact entry data")?;
        let raw = ResValue::new((flags >> 8) as u8, data);
        return Ok(ParsedEntry {
            key,
            key_field: KeyField {
                offset: at,
                compact: true,
            },
            flags,
            value: Value::classify(raw, value_pool, file_backed)?,
            data_offset: Some(at + 4),
        });
    }

    let size = read_u16(chunk, at, "entry size")? as usize;
    let key = read_u32(chunk, at + 4, "entry key")?;
    let key_field = KeyField {
        offset: at + 4,
        compact: false,
    };

    if flags & ENTRY_FLAG_COMPLEX != 0 {
        let parent = read_u32(chunk, at + 8, "map entry parent")?;
        let count = read_u32(chunk, at + 12, "map entry count")? as usize;
        let mut items = Vec::with_capacity(count.min(chunk.len() / MAP_ENTRY_SIZE));
        let mut pos = at + size;
        for _ in 0..count {
            let name = read_u32(chunk, pos, "map item name")?;
            let raw = ResValue::read(chunk, pos + 4)?;
            items.push(BagItem {
                name: ResId(name),
                value: Value::classify(raw, value_pool, false)?,
            });
            pos += MAP_ENTRY_SIZE;
        }
        return Ok(ParsedEntry {
            key,
            key_field,
            flags,
            value: Value::Bag(Bag {
                parent: (parent != 0).then_some(ResId(parent)),
                items,
            }),
            data_offset: None,
        });
    }

    let raw = ResValue::read(chunk, at + size)?;
    Ok(ParsedEntry {
        key,
        key_field,
        flags,
        value: Value::classify(raw, value_pool, file_backed)?,
        data_offset: Some(at + size + 4),
    })
}
