//! The aggregate, fully-decoded SMOF file and its read/write/validate
//! contract (component C1).

use std::io::Cursor;

use log::{debug, trace};

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::header::{SmofFlags, SmofHeader, HEADER_SIZE};
use crate::import::{self, Import};
use crate::relocation::{self, Relocation, RelocationType};
use crate::section::{self, Section, SectionFlags};
use crate::strtab::StringTable;
use crate::symbol::{self, Symbol, SymbolBinding, SymbolType, SECTION_UNDEFINED};

/// A fully-decoded SMOF file: header fields plus owned section, symbol,
/// relocation, and import tables. Never a view over raw file bytes — see
/// `spec.md` §9's Design Notes on packed on-disk structs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmofFile {
    /// Format version (preserved across read/write).
    pub version: u16,
    /// File-level flags, excluding the endianness marker bits which
    /// [`SmofFile::write`] manages itself.
    pub flags: SmofFlags,
    /// Virtual address of the entry point.
    pub entry_point: u32,
    /// Sections, in on-disk table order.
    pub sections: Vec<Section>,
    /// Symbols, in on-disk table order.
    pub symbols: Vec<Symbol>,
    /// Relocations, in on-disk table order.
    pub relocations: Vec<Relocation>,
    /// Imports, in on-disk table order (the core writer always leaves this
    /// empty; dynamic linking is a non-goal).
    pub imports: Vec<Import>,
}

impl Default for SmofFile {
    fn default() -> Self {
        Self {
            version: crate::header::VERSION_CURRENT,
            flags: SmofFlags::empty(),
            entry_point: 0,
            sections: Vec::new(),
            symbols: Vec::new(),
            relocations: Vec::new(),
            imports: Vec::new(),
        }
    }
}

struct TableRange {
    start: u64,
    end: u64,
}

fn checked_range(offset: u32, len: u64, file_len: u64, what: &str) -> Result<TableRange> {
    let start = offset as u64;
    let end = start
        .checked_add(len)
        .ok_or_else(|| Error::CorruptHeader {
            reason: format!("{what} size overflows"),
        })?;
    if end > file_len {
        return Err(Error::CorruptHeader {
            reason: format!("{what} [{start}, {end}) extends past end of file ({file_len})"),
        });
    }
    Ok(TableRange { start, end })
}

fn ranges_overlap(a: &TableRange, b: &TableRange) -> bool {
    a.start < b.end && b.start < a.end
}

fn round_up(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

impl SmofFile {
    /// Parse a complete SMOF file from `bytes`.
    ///
    /// Parsing order matches `spec.md` §4.1: header, string table, section
    /// table, symbol table, relocation table (the import table, which has
    /// no dedicated header offset field, is placed immediately after the
    /// relocation table — see `DESIGN.md`). Every offset is range-checked
    /// before it is dereferenced.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let file_len = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        let header = SmofHeader::read(&mut cursor)?;
        let endian = header.endian();
        trace!(
            "parsed SMOF header: {} section(s), {} symbol(s), {} relocation(s), endian {endian:?}",
            header.section_count, header.symbol_count, header.reloc_count
        );

        if header.string_table_offset != 0 && (header.string_table_offset as usize) < HEADER_SIZE
        {
            return Err(Error::CorruptHeader {
                reason: "string table offset precedes the header".into(),
            });
        }
        if header.section_table_offset != 0
            && (header.section_table_offset as usize) < HEADER_SIZE
        {
            return Err(Error::CorruptHeader {
                reason: "section table offset precedes the header".into(),
            });
        }
        if header.reloc_table_offset != 0 && (header.reloc_table_offset as usize) < HEADER_SIZE {
            return Err(Error::CorruptHeader {
                reason: "relocation table offset precedes the header".into(),
            });
        }

        let string_range = checked_range(
            header.string_table_offset,
            header.string_table_size as u64,
            file_len,
            "string table",
        )?;
        let section_range = checked_range(
            header.section_table_offset,
            header.section_count as u64 * section::ENTRY_SIZE as u64,
            file_len,
            "section table",
        )?;
        let symbol_table_offset = header.section_table_offset
            + header.section_count as u32 * section::ENTRY_SIZE as u32;
        let symbol_range = checked_range(
            symbol_table_offset,
            header.symbol_count as u64 * symbol::ENTRY_SIZE as u64,
            file_len,
            "symbol table",
        )?;
        let reloc_range = checked_range(
            header.reloc_table_offset,
            header.reloc_count as u64 * relocation::ENTRY_SIZE as u64,
            file_len,
            "relocation table",
        )?;
        let import_table_offset =
            header.reloc_table_offset + header.reloc_count as u32 * relocation::ENTRY_SIZE as u32;
        let import_range = checked_range(
            import_table_offset,
            header.import_count as u64 * import::ENTRY_SIZE as u64,
            file_len,
            "import table",
        )?;

        let ranges = [
            &string_range,
            &section_range,
            &symbol_range,
            &reloc_range,
            &import_range,
        ];
        for i in 0..ranges.len() {
            for j in (i + 1)..ranges.len() {
                if ranges_overlap(ranges[i], ranges[j]) {
                    return Err(Error::CorruptHeader {
                        reason: "two tables overlap".into(),
                    });
                }
            }
        }

        let strtab = StringTable::from_bytes(
            bytes[string_range.start as usize..string_range.end as usize].to_vec(),
        );

        let mut sections = Vec::with_capacity(header.section_count as usize);
        {
            let mut r = &bytes[section_range.start as usize..section_range.end as usize];
            for index in 0..header.section_count as usize {
                let name_offset = endian.read_u32(&mut r)?;
                let virtual_addr = endian.read_u32(&mut r)?;
                let size = endian.read_u32(&mut r)?;
                let file_offset = endian.read_u32(&mut r)?;
                let flags_raw = endian.read_u16(&mut r)?;
                let alignment_exp = endian.read_u8(&mut r)?;
                let _reserved = endian.read_u8(&mut r)?;

                let name = strtab.get(name_offset)?.to_string();
                let flags = SectionFlags::from_bits_truncate(flags_raw);
                let alignment = Section::decode_alignment(alignment_exp, index)?;
                if virtual_addr % alignment != 0 {
                    return Err(Error::InvalidSection {
                        index,
                        reason: format!(
                            "virtual address {virtual_addr:#x} is not a multiple of alignment {alignment}"
                        ),
                    });
                }

                let data = if file_offset == 0 {
                    None
                } else {
                    let range =
                        checked_range(file_offset, size as u64, file_len, "section payload")?;
                    Some(bytes[range.start as usize..range.end as usize].to_vec())
                };

                sections.push(Section {
                    name,
                    virtual_addr,
                    size,
                    file_offset,
                    flags,
                    alignment,
                    data,
                });
            }
        }

        let mut symbols = Vec::with_capacity(header.symbol_count as usize);
        {
            let mut r = &bytes[symbol_range.start as usize..symbol_range.end as usize];
            for index in 0..header.symbol_count as usize {
                let name_offset = endian.read_u32(&mut r)?;
                let value = endian.read_u32(&mut r)?;
                let size = endian.read_u32(&mut r)?;
                let section_index_raw = endian.read_u16(&mut r)?;
                let type_raw = endian.read_u8(&mut r)?;
                let binding_raw = endian.read_u8(&mut r)?;

                let name = strtab.get(name_offset)?.to_string();
                let section_index = if section_index_raw == SECTION_UNDEFINED {
                    None
                } else {
                    if section_index_raw as usize >= sections.len() {
                        return Err(Error::InvalidSymbol {
                            index,
                            reason: format!(
                                "section index {section_index_raw} is out of range ({} sections)",
                                sections.len()
                            ),
                        });
                    }
                    Some(section_index_raw)
                };
                let sym_type = SymbolType::from_u8(type_raw).map_err(|_| Error::InvalidSymbol {
                    index,
                    reason: format!("unknown symbol type {type_raw}"),
                })?;
                let binding =
                    SymbolBinding::from_u8(binding_raw).map_err(|_| Error::InvalidSymbol {
                        index,
                        reason: format!("unknown symbol binding {binding_raw}"),
                    })?;

                symbols.push(Symbol {
                    name,
                    value,
                    size,
                    section_index,
                    sym_type,
                    binding,
                });
            }
        }

        let mut relocations = Vec::with_capacity(header.reloc_count as usize);
        {
            let mut r = &bytes[reloc_range.start as usize..reloc_range.end as usize];
            for index in 0..header.reloc_count as usize {
                let offset = endian.read_u32(&mut r)?;
                let symbol_index = endian.read_u16(&mut r)?;
                let type_raw = endian.read_u8(&mut r)?;
                let section_index = endian.read_u8(&mut r)?;
                let reloc_type =
                    RelocationType::from_u8(type_raw).map_err(|_| Error::InvalidRelocation {
                        index,
                        reason: format!("unknown relocation type {type_raw}"),
                    })?;
                if symbol_index as usize >= symbols.len() {
                    return Err(Error::InvalidRelocation {
                        index,
                        reason: format!(
                            "symbol index {symbol_index} is out of range ({} symbols)",
                            symbols.len()
                        ),
                    });
                }
                relocations.push(Relocation {
                    offset,
                    symbol_index,
                    reloc_type,
                    section_index,
                });
            }
        }

        let mut imports = Vec::with_capacity(header.import_count as usize);
        {
            let mut r = &bytes[import_range.start as usize..import_range.end as usize];
            for _ in 0..header.import_count as usize {
                let library_offset = endian.read_u32(&mut r)?;
                let symbol_offset = endian.read_u32(&mut r)?;
                imports.push(Import {
                    library: strtab.get(library_offset)?.to_string(),
                    symbol: strtab.get(symbol_offset)?.to_string(),
                });
            }
        }

        Ok(Self {
            version: header.version,
            flags: header.flags & !(SmofFlags::LITTLE_ENDIAN | SmofFlags::BIG_ENDIAN),
            entry_point: header.entry_point,
            sections,
            symbols,
            relocations,
            imports,
        })
    }

    /// Serialize the file using `endian` byte order.
    ///
    /// Writing order matches `spec.md` §4.1: header, string table, section
    /// table, symbol table, relocation table, import table, section
    /// payloads in section-table order (each padded so its file offset
    /// matches the section's alignment). Counts and table offsets in the
    /// header are always recomputed from the current tables; stale values
    /// from a prior read are never trusted.
    pub fn write(&self, endian: Endian) -> Result<Vec<u8>> {
        if self.sections.len() > u16::MAX as usize {
            return Err(Error::CorruptHeader {
                reason: "too many sections to encode".into(),
            });
        }
        if self.symbols.len() > u16::MAX as usize {
            return Err(Error::CorruptHeader {
                reason: "too many symbols to encode".into(),
            });
        }
        if self.relocations.len() > u16::MAX as usize {
            return Err(Error::CorruptHeader {
                reason: "too many relocations to encode".into(),
            });
        }
        if self.imports.len() > u16::MAX as usize {
            return Err(Error::CorruptHeader {
                reason: "too many imports to encode".into(),
            });
        }

        let mut strtab = StringTable::new();
        let section_name_offsets: Vec<u32> =
            self.sections.iter().map(|s| strtab.insert(&s.name)).collect();
        let symbol_name_offsets: Vec<u32> =
            self.symbols.iter().map(|s| strtab.insert(&s.name)).collect();
        let import_name_offsets: Vec<(u32, u32)> = self
            .imports
            .iter()
            .map(|i| (strtab.insert(&i.library), strtab.insert(&i.symbol)))
            .collect();

        let string_table_offset = HEADER_SIZE as u32;
        let string_table_size = strtab.len() as u32;
        let section_table_offset = string_table_offset + string_table_size;
        let symbol_table_offset =
            section_table_offset + self.sections.len() as u32 * section::ENTRY_SIZE as u32;
        let reloc_table_offset =
            symbol_table_offset + self.symbols.len() as u32 * symbol::ENTRY_SIZE as u32;
        let import_table_offset =
            reloc_table_offset + self.relocations.len() as u32 * relocation::ENTRY_SIZE as u32;
        let payload_start =
            import_table_offset + self.imports.len() as u32 * import::ENTRY_SIZE as u32;

        let mut file_offsets = Vec::with_capacity(self.sections.len());
        let mut cursor = payload_start;
        for (index, section) in self.sections.iter().enumerate() {
            if section.is_bss() {
                file_offsets.push(0u32);
                continue;
            }
            if section.alignment == 0 || !section.alignment.is_power_of_two() {
                return Err(Error::InvalidSection {
                    index,
                    reason: format!("alignment {} is not a power of two", section.alignment),
                });
            }
            cursor = round_up(cursor, section.alignment);
            file_offsets.push(cursor);
            cursor += section.size;
        }

        let header = SmofHeader {
            version: self.version,
            flags: self.flags,
            entry_point: self.entry_point,
            section_count: self.sections.len() as u16,
            symbol_count: self.symbols.len() as u16,
            string_table_offset,
            string_table_size,
            section_table_offset,
            reloc_table_offset,
            reloc_count: self.relocations.len() as u16,
            import_count: self.imports.len() as u16,
        };

        let mut out = Vec::with_capacity(cursor as usize);
        header.write(endian, &mut out)?;
        out.extend_from_slice(strtab.as_bytes());

        for (index, section) in self.sections.iter().enumerate() {
            endian.write_u32(&mut out, section_name_offsets[index])?;
            endian.write_u32(&mut out, section.virtual_addr)?;
            endian.write_u32(&mut out, section.size)?;
            endian.write_u32(&mut out, file_offsets[index])?;
            endian.write_u16(&mut out, section.flags.bits())?;
            endian.write_u8(&mut out, Section::encode_alignment(section.alignment, index)?)?;
            endian.write_u8(&mut out, 0)?;
        }

        for (index, symbol) in self.symbols.iter().enumerate() {
            endian.write_u32(&mut out, symbol_name_offsets[index])?;
            endian.write_u32(&mut out, symbol.value)?;
            endian.write_u32(&mut out, symbol.size)?;
            endian.write_u16(&mut out, symbol.section_index.unwrap_or(SECTION_UNDEFINED))?;
            endian.write_u8(&mut out, symbol.sym_type as u8)?;
            endian.write_u8(&mut out, symbol.binding as u8)?;
        }

        for reloc in &self.relocations {
            endian.write_u32(&mut out, reloc.offset)?;
            endian.write_u16(&mut out, reloc.symbol_index)?;
            endian.write_u8(&mut out, reloc.reloc_type as u8)?;
            endian.write_u8(&mut out, reloc.section_index)?;
        }

        for (library_offset, symbol_offset) in &import_name_offsets {
            endian.write_u32(&mut out, *library_offset)?;
            endian.write_u32(&mut out, *symbol_offset)?;
        }

        debug_assert_eq!(out.len() as u32, payload_start);
        for (index, section) in self.sections.iter().enumerate() {
            if section.is_bss() {
                continue;
            }
            while (out.len() as u32) < file_offsets[index] {
                out.push(0);
            }
            out.extend_from_slice(section.data.as_deref().unwrap_or_default());
        }

        debug!("wrote SMOF file: {} byte(s), {} section(s)", out.len(), self.sections.len());
        Ok(out)
    }

    /// Re-check the structural invariants of an in-memory file (§3,
    /// invariants 5–7; invariants that require on-disk offsets are enforced
    /// by [`SmofFile::read`] itself).
    pub fn validate(&self) -> Result<()> {
        for (index, section) in self.sections.iter().enumerate() {
            if section.alignment == 0 || !section.alignment.is_power_of_two() {
                return Err(Error::InvalidSection {
                    index,
                    reason: format!("alignment {} is not a power of two", section.alignment),
                });
            }
            if section.virtual_addr % section.alignment != 0 {
                return Err(Error::InvalidSection {
                    index,
                    reason: "virtual address is not aligned".into(),
                });
            }
        }
        for (index, symbol) in self.symbols.iter().enumerate() {
            if let Some(section_index) = symbol.section_index {
                if section_index as usize >= self.sections.len() {
                    return Err(Error::InvalidSymbol {
                        index,
                        reason: "section index out of range".into(),
                    });
                }
            }
        }
        for (index, reloc) in self.relocations.iter().enumerate() {
            if reloc.symbol_index as usize >= self.symbols.len() {
                return Err(Error::InvalidRelocation {
                    index,
                    reason: "symbol index out of range".into(),
                });
            }
        }
        Ok(())
    }
}
