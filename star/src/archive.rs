//! C6 — archive container: member storage, compression wrapper, and the
//! optional symbol index.

use std::path::Path;

use log::{debug, info};
use smof::{Endian, SmofFile, StringTable, SymbolBinding};

use crate::codec::codec_for;
use crate::error::{Error, Result};
use crate::header::{ArchiveFlags, StarHeader, HEADER_SIZE, VERSION_CURRENT};
use crate::member::{CompressionAlgorithm, MemberEntry, MemberFlags, ENTRY_SIZE as MEMBER_ENTRY_SIZE};
use crate::options::ArchiveOptions;
use crate::symbol_index::{self, SymbolIndexEntry};

enum Payload {
    Owned(Vec<u8>),
    Lazy { stored: Vec<u8> },
}

struct Member {
    name: String,
    timestamp: u32,
    flags: MemberFlags,
    compression: CompressionAlgorithm,
    uncompressed_size: u32,
    checksum: u32,
    payload: Payload,
}

impl Member {
    /// Uncompressed bytes, decompressing lazily on first access.
    fn bytes(&self) -> Result<Vec<u8>> {
        match &self.payload {
            Payload::Owned(bytes) => Ok(bytes.clone()),
            Payload::Lazy { stored } => codec_for(self.compression)
                .decompress(stored, self.uncompressed_size as usize)
                .map_err(|e| tag_member(e, &self.name)),
        }
    }
}

/// An in-memory STAR archive: a writable builder before `finalize`, or the
/// parsed contents of an opened file. Either way every member's metadata is
/// loaded up front; a member's bytes are only decompressed when read.
pub struct StarArchive {
    options: ArchiveOptions,
    members: Vec<Member>,
    symbol_index: Option<Vec<SymbolIndexEntry>>,
}

impl StarArchive {
    /// An empty, writable archive.
    pub fn create(options: ArchiveOptions) -> Self {
        Self {
            options,
            members: Vec::new(),
            symbol_index: None,
        }
    }

    /// Parse an existing archive from its serialized bytes.
    pub fn open(bytes: &[u8], options: ArchiveOptions) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(bytes);
        let header = StarHeader::read(&mut cursor)?;
        let endian = header.endian()?;
        let file_len = bytes.len() as u64;

        checked_floor(header.string_table_offset, "string table")?;
        checked_floor(header.member_table_offset, "member table")?;
        checked_floor(header.index_offset, "symbol index")?;

        let member_table_len = header.member_count.saturating_mul(MEMBER_ENTRY_SIZE as u32);
        let member_table_range = checked_range(header.member_table_offset, member_table_len as u64, file_len, "member table")?;
        let string_range = checked_range(header.string_table_offset, header.string_table_size as u64, file_len, "string table")?;
        let index_range = if header.flags.contains(ArchiveFlags::INDEXED) {
            Some(checked_range(header.index_offset, header.index_size as u64, file_len, "symbol index")?)
        } else {
            None
        };

        let string_bytes = &bytes[string_range.start as usize..string_range.end as usize];
        let strings = StringTable::from_bytes(string_bytes.to_vec());
        let resolve = |offset: u32| -> Result<String> {
            strings
                .get(offset)
                .map(str::to_string)
                .map_err(|e| Error::ArchiveCorrupt { reason: e.to_string() })
        };

        let member_table = &bytes[member_table_range.start as usize..member_table_range.end as usize];
        let mut member_cursor = std::io::Cursor::new(member_table);

        let mut members = Vec::with_capacity(header.member_count as usize);
        let mut payload_ranges = Vec::with_capacity(header.member_count as usize);
        for _ in 0..header.member_count {
            let entry = MemberEntry::read(&mut member_cursor, endian)?;
            let name = resolve(entry.name_offset)?;
            checked_floor(entry.data_offset, "member payload")?;
            let payload_range = checked_range(entry.data_offset, entry.compressed_size as u64, file_len, "member payload")?;
            let stored = bytes[payload_range.start as usize..payload_range.end as usize].to_vec();
            payload_ranges.push(payload_range);
            members.push(Member {
                name,
                timestamp: entry.timestamp,
                flags: entry.flags,
                compression: entry.compression,
                uncompressed_size: entry.size,
                checksum: entry.checksum,
                payload: Payload::Lazy { stored },
            });
        }

        let mut ranges: Vec<&TableRange> = vec![&member_table_range, &string_range];
        ranges.extend(payload_ranges.iter());
        if let Some(index_range) = &index_range {
            ranges.push(index_range);
        }
        for i in 0..ranges.len() {
            for j in (i + 1)..ranges.len() {
                if ranges_overlap(ranges[i], ranges[j]) {
                    return Err(Error::ArchiveCorrupt {
                        reason: "two archive regions overlap".into(),
                    });
                }
            }
        }

        let symbol_index = if let Some(index_range) = index_range {
            let index_bytes = &bytes[index_range.start as usize..index_range.end as usize];
            let mut index_cursor = std::io::Cursor::new(index_bytes);
            let count = index_bytes.len() / symbol_index::ENTRY_SIZE;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                entries.push(symbol_index::read_entry(&mut index_cursor, endian, &resolve)?);
            }
            Some(entries)
        } else {
            None
        };

        let mut options = options;
        options.sort_members = header.flags.contains(ArchiveFlags::SORTED);
        options.create_index = header.flags.contains(ArchiveFlags::INDEXED);

        Ok(Self {
            options,
            members,
            symbol_index,
        })
    }

    /// Add a member, to be compressed with the archive's current
    /// compression choice at `finalize` time. `timestamp` is Unix seconds.
    pub fn add_member(&mut self, name: &str, bytes: Vec<u8>, timestamp: u32, flags: MemberFlags) {
        let checksum = crc32fast::hash(&bytes);
        self.members.push(Member {
            name: name.to_string(),
            timestamp,
            flags,
            compression: self.options.compression,
            uncompressed_size: bytes.len() as u32,
            checksum,
            payload: Payload::Owned(bytes),
        });
        if self.options.sort_members {
            self.members.sort_by(|a, b| a.name.cmp(&b.name));
        }
        debug!("added member `{name}`");
    }

    /// Read `path` and add it as a member named `name`.
    pub fn add_member_from_path(&mut self, name: &str, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let timestamp = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        self.add_member(name, bytes, timestamp, MemberFlags::empty());
        Ok(())
    }

    /// Change the compression algorithm applied to members added from now on.
    pub fn set_compression(&mut self, algorithm: CompressionAlgorithm) {
        self.options.compression = algorithm;
    }

    /// Build the symbol index by parsing every member as a SMOF file and
    /// enumerating its non-LOCAL symbols.
    pub fn build_symbol_index(&mut self) -> Result<()> {
        let mut entries = Vec::new();
        for (index, member) in self.members.iter().enumerate() {
            let bytes = member.bytes()?;
            let file = SmofFile::read(&bytes).map_err(|source| Error::Smof {
                member: member.name.clone(),
                source,
            })?;
            for symbol in &file.symbols {
                if symbol.binding == SymbolBinding::Local || symbol.is_undefined() {
                    continue;
                }
                entries.push(SymbolIndexEntry {
                    name: symbol.name.clone(),
                    member_index: index as u32,
                    symbol_value: symbol.value,
                    symbol_type: symbol.sym_type,
                    symbol_binding: symbol.binding,
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        info!("built symbol index with {} entries", entries.len());
        self.symbol_index = Some(entries);
        self.options.create_index = true;
        Ok(())
    }

    /// Find a member's position by name. O(log n) when the member table is
    /// kept sorted, O(n) otherwise — matching `spec.md` §4.6's find semantics.
    pub fn find_member(&self, name: &str) -> Option<usize> {
        if self.options.sort_members {
            self.members.binary_search_by(|m| m.name.as_str().cmp(name)).ok()
        } else {
            self.members.iter().position(|m| m.name == name)
        }
    }

    /// Iterate every member's name, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the archive holds no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Extract a member's uncompressed bytes, verifying its CRC-32.
    pub fn extract(&self, name: &str) -> Result<Vec<u8>> {
        let index = self
            .find_member(name)
            .ok_or_else(|| Error::MemberNotFound { name: name.to_string() })?;
        let member = &self.members[index];
        let bytes = member.bytes()?;
        let actual = crc32fast::hash(&bytes);
        if actual != member.checksum {
            return Err(Error::ChecksumMismatch {
                member: name.to_string(),
                expected: member.checksum,
                actual,
            });
        }
        Ok(bytes)
    }

    /// Look up a symbol by name in the built index, if one exists.
    pub fn find_symbol(&self, name: &str) -> Option<&SymbolIndexEntry> {
        symbol_index::find(self.symbol_index.as_deref()?, name)
    }

    /// Logically remove a member and any symbol-index entries referencing
    /// it. The archive is rewritten compactly on the next `finalize`; this
    /// does not touch an already-written file.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let index = self
            .find_member(name)
            .ok_or_else(|| Error::MemberNotFound { name: name.to_string() })?;
        self.members.remove(index);
        if let Some(entries) = &mut self.symbol_index {
            entries.retain(|e| e.member_index != index as u32);
            for entry in entries.iter_mut() {
                if entry.member_index > index as u32 {
                    entry.member_index -= 1;
                }
            }
        }
        Ok(())
    }

    /// Serialize the archive: header (placeholder), member table, string
    /// table, payloads in member-table order, symbol index, then a rewrite
    /// of the header with final offsets and checksum — the order `spec.md`
    /// §4.6 specifies.
    pub fn finalize(&mut self, creation_time: u32) -> Result<Vec<u8>> {
        let endian = Endian::host();
        let mut strings = StringTable::new();

        let member_name_offsets: Vec<u32> = self.members.iter().map(|m| strings.insert(&m.name)).collect();
        let index_name_offsets: Vec<u32> = self
            .symbol_index
            .as_ref()
            .map(|entries| entries.iter().map(|e| strings.insert(&e.name)).collect())
            .unwrap_or_default();

        let member_table_offset = HEADER_SIZE as u32;
        let member_table_size = self.members.len() as u32 * MEMBER_ENTRY_SIZE as u32;
        let string_table_offset = member_table_offset + member_table_size;
        let string_table_bytes = strings.as_bytes().to_vec();
        let string_table_size = string_table_bytes.len() as u32;
        let payload_start = string_table_offset + string_table_size;

        let mut payloads = Vec::with_capacity(self.members.len());
        let mut entries = Vec::with_capacity(self.members.len());
        let mut cursor = payload_start;
        let mut any_compressed = false;

        for (member, &name_offset) in self.members.iter().zip(&member_name_offsets) {
            let raw = member.bytes()?;
            let stored = if matches!(member.compression, CompressionAlgorithm::None) {
                raw
            } else {
                any_compressed = true;
                codec_for(member.compression)
                    .compress(&raw, self.options.compression_level)
                    .map_err(|e| tag_member(e, &member.name))?
            };

            let mut flags = member.flags;
            if !matches!(member.compression, CompressionAlgorithm::None) {
                flags |= MemberFlags::COMPRESSED;
            }
            entries.push(MemberEntry {
                name_offset,
                size: member.uncompressed_size,
                compressed_size: stored.len() as u32,
                data_offset: cursor,
                checksum: member.checksum,
                timestamp: member.timestamp,
                flags,
                compression: member.compression,
            });
            cursor += stored.len() as u32;
            payloads.push(stored);
        }

        let create_index = self.options.create_index && self.symbol_index.is_some();
        let index_entries = self.symbol_index.clone().unwrap_or_default();
        let index_offset = if create_index { cursor } else { 0 };
        let index_size = if create_index {
            index_entries.len() as u32 * symbol_index::ENTRY_SIZE as u32
        } else {
            0
        };

        let mut flags = ArchiveFlags::empty();
        if any_compressed {
            flags |= ArchiveFlags::COMPRESSED;
        }
        if create_index {
            flags |= ArchiveFlags::INDEXED;
        }
        if self.options.sort_members {
            flags |= ArchiveFlags::SORTED;
        }

        let mut header = StarHeader {
            version: VERSION_CURRENT,
            flags,
            member_count: self.members.len() as u32,
            index_offset,
            index_size,
            member_table_offset,
            string_table_offset,
            string_table_size,
            creation_time,
            checksum: 0,
        };

        let mut out = Vec::new();
        header.write(endian, &mut out)?;
        for entry in &entries {
            entry.write(endian, &mut out)?;
        }
        out.extend_from_slice(&string_table_bytes);
        for payload in &payloads {
            out.extend_from_slice(payload);
        }
        if create_index {
            for (entry, &name_offset) in index_entries.iter().zip(&index_name_offsets) {
                symbol_index::write_entry(entry, name_offset, endian, &mut out)?;
            }
        }

        let checksum = crc32fast::hash(&out[..HEADER_SIZE]);
        header.checksum = checksum;
        let mut patched_header = Vec::new();
        header.write(endian, &mut patched_header)?;
        out[..HEADER_SIZE].copy_from_slice(&patched_header);

        Ok(out)
    }
}

struct TableRange {
    start: u64,
    end: u64,
}

/// A non-zero offset must land at or past the fixed-size header.
fn checked_floor(offset: u32, what: &str) -> Result<()> {
    if offset != 0 && (offset as usize) < HEADER_SIZE {
        return Err(Error::ArchiveCorrupt {
            reason: format!("{what} offset {offset} precedes the header"),
        });
    }
    Ok(())
}

fn checked_range(offset: u32, len: u64, file_len: u64, what: &str) -> Result<TableRange> {
    let start = offset as u64;
    let end = start.checked_add(len).ok_or_else(|| Error::ArchiveCorrupt {
        reason: format!("{what} size overflows"),
    })?;
    if end > file_len {
        return Err(Error::ArchiveCorrupt {
            reason: format!("{what} [{start}, {end}) extends past end of file ({file_len})"),
        });
    }
    Ok(TableRange { start, end })
}

fn ranges_overlap(a: &TableRange, b: &TableRange) -> bool {
    a.start < b.end && b.start < a.end
}

fn tag_member(err: Error, name: &str) -> Error {
    match err {
        Error::CompressionFailed { algorithm, reason, .. } => Error::CompressionFailed {
            member: name.to_string(),
            algorithm,
            reason,
        },
        Error::DecompressionFailed { algorithm, reason, .. } => Error::DecompressionFailed {
            member: name.to_string(),
            algorithm,
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ArchiveOptions {
        ArchiveOptions::builder().build()
    }

    #[test]
    fn round_trip_preserves_members_and_checksums() {
        let mut archive = StarArchive::create(
            ArchiveOptions::builder()
                .compression(CompressionAlgorithm::Zlib)
                .build(),
        );
        archive.add_member("a", vec![1; 100], 1_000, MemberFlags::empty());
        archive.add_member("b", vec![], 1_000, MemberFlags::empty());
        archive.add_member("c", vec![7; 5000], 1_000, MemberFlags::empty());

        let bytes = archive.finalize(1_700_000_000).unwrap();
        let reopened = StarArchive::open(&bytes, options()).unwrap();

        let names: Vec<&str> = reopened.iter().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(reopened.extract("a").unwrap(), vec![1u8; 100]);
        assert_eq!(reopened.extract("b").unwrap(), Vec::<u8>::new());
        assert_eq!(reopened.extract("c").unwrap(), vec![7u8; 5000]);
    }

    #[test]
    fn open_rejects_member_table_offset_that_precedes_the_header() {
        let mut archive = StarArchive::create(options());
        archive.add_member("a", vec![1, 2, 3], 1_000, MemberFlags::empty());
        let mut bytes = archive.finalize(1_700_000_000).unwrap();

        // `member_table_offset` sits right after `member_count`/`index_offset`/
        // `index_size` in the header body, at byte 20.
        bytes[20..24].copy_from_slice(&4u32.to_ne_bytes());

        let result = StarArchive::open(&bytes, options());
        assert!(matches!(result, Err(Error::ArchiveCorrupt { .. })));
    }

    #[test]
    fn open_rejects_overlapping_member_and_string_tables() {
        let mut archive = StarArchive::create(options());
        archive.add_member("a", vec![1, 2, 3], 1_000, MemberFlags::empty());
        let mut bytes = archive.finalize(1_700_000_000).unwrap();

        // Point the string table at the member table's own offset so the two
        // spans overlap.
        let member_table_offset = u32::from_ne_bytes(bytes[20..24].try_into().unwrap());
        bytes[24..28].copy_from_slice(&member_table_offset.to_ne_bytes());

        let result = StarArchive::open(&bytes, options());
        assert!(matches!(result, Err(Error::ArchiveCorrupt { .. })));
    }

    #[test]
    fn reserializing_a_reopened_archive_is_byte_identical() {
        let mut archive = StarArchive::create(
            ArchiveOptions::builder()
                .compression(CompressionAlgorithm::Zlib)
                .build(),
        );
        archive.add_member("a", vec![1; 100], 1_000, MemberFlags::empty());
        archive.add_member("b", vec![7; 5000], 1_000, MemberFlags::empty());

        let first = archive.finalize(1_700_000_000).unwrap();
        let mut reopened = StarArchive::open(&first, options()).unwrap();
        let second = reopened.finalize(1_700_000_000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn symbol_index_lookup_matches_scenario_7() {
        use smof::{Section, SectionFlags, Symbol, SymbolBinding, SymbolType};

        let plain = SmofFile::default().write(Endian::host()).unwrap();

        let mut defines_helper = SmofFile::default();
        defines_helper.sections.push(Section {
            name: ".text".into(),
            virtual_addr: 0,
            size: 4,
            file_offset: 1,
            flags: SectionFlags::EXECUTABLE | SectionFlags::READABLE,
            alignment: 1,
            data: Some(vec![0; 4]),
        });
        defines_helper.symbols.push(Symbol {
            name: "helper".into(),
            value: 0,
            size: 4,
            section_index: Some(0),
            sym_type: SymbolType::Func,
            binding: SymbolBinding::Global,
        });
        let defines_helper = defines_helper.write(Endian::host()).unwrap();

        let mut archive = StarArchive::create(options());
        archive.add_member("empty.o", plain, 0, MemberFlags::empty());
        archive.add_member("helper.o", defines_helper, 0, MemberFlags::empty());
        archive.build_symbol_index().unwrap();

        let found = archive.find_symbol("helper").unwrap();
        assert_eq!(found.member_index, 1);
        assert!(archive.find_symbol("missing").is_none());
    }

    #[test]
    fn missing_member_is_reported() {
        let archive = StarArchive::create(options());
        assert!(matches!(archive.extract("nope"), Err(Error::MemberNotFound { .. })));
    }

    #[test]
    fn remove_drops_member_and_reindexes_symbol_entries() {
        let mut archive = StarArchive::create(options());
        archive.add_member("a", vec![1], 0, MemberFlags::empty());
        archive.add_member("b", vec![2], 0, MemberFlags::empty());
        archive.symbol_index = Some(vec![SymbolIndexEntry {
            name: "helper".into(),
            member_index: 1,
            symbol_value: 0,
            symbol_type: smof::SymbolType::Func,
            symbol_binding: SymbolBinding::Global,
        }]);
        archive.remove("a").unwrap();
        assert_eq!(archive.symbol_index.as_ref().unwrap()[0].member_index, 0);
    }

    #[test]
    fn sorted_archive_finds_in_log_n_via_binary_search() {
        let mut archive = StarArchive::create(ArchiveOptions::builder().sort_members(true).build());
        archive.add_member("zeta", vec![], 0, MemberFlags::empty());
        archive.add_member("alpha", vec![], 0, MemberFlags::empty());
        archive.add_member("mid", vec![], 0, MemberFlags::empty());
        assert_eq!(archive.iter().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(archive.find_member("mid"), Some(1));
    }
}
