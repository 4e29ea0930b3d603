//! STAR symbol index: a sorted name → member lookup table.

use std::io::{Read, Write};

use smof::{Endian, SymbolBinding, SymbolType};

use crate::endian_io::{read_u16, read_u32, read_u8, write_u16, write_u32, write_u8};
use crate::error::{Error, Result};

/// On-disk size of a symbol index entry, in bytes.
pub const ENTRY_SIZE: usize = 16;

/// A decoded symbol index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolIndexEntry {
    /// Symbol name.
    pub name: String,
    /// Index of the member that defines this symbol.
    pub member_index: u32,
    /// Symbol's value, as recorded in the member's own symbol table.
    pub symbol_value: u32,
    /// Symbol type.
    pub symbol_type: SymbolType,
    /// Symbol binding.
    pub symbol_binding: SymbolBinding,
}

pub(crate) fn write_entry<W: Write>(
    entry: &SymbolIndexEntry,
    name_offset: u32,
    endian: Endian,
    writer: &mut W,
) -> Result<()> {
    write_u32(writer, endian, name_offset)?;
    write_u32(writer, endian, entry.member_index)?;
    write_u32(writer, endian, entry.symbol_value)?;
    write_u8(writer, entry.symbol_type as u8)?;
    write_u8(writer, entry.symbol_binding as u8)?;
    write_u16(writer, endian, 0)?;
    Ok(())
}

pub(crate) fn read_entry<R: Read>(
    reader: &mut R,
    endian: Endian,
    resolve_name: impl FnOnce(u32) -> Result<String>,
) -> Result<SymbolIndexEntry> {
    let name_offset = read_u32(reader, endian)?;
    let member_index = read_u32(reader, endian)?;
    let symbol_value = read_u32(reader, endian)?;
    let symbol_type = SymbolType::from_u8(read_u8(reader)?).map_err(|source| Error::Smof {
        member: String::new(),
        source,
    })?;
    let symbol_binding = SymbolBinding::from_u8(read_u8(reader)?).map_err(|source| Error::Smof {
        member: String::new(),
        source,
    })?;
    let _reserved = read_u16(reader, endian)?;
    Ok(SymbolIndexEntry {
        name: resolve_name(name_offset)?,
        member_index,
        symbol_value,
        symbol_type,
        symbol_binding,
    })
}

/// Binary search a sorted symbol index by name.
pub fn find(index: &[SymbolIndexEntry], name: &str) -> Option<&SymbolIndexEntry> {
    index
        .binary_search_by(|entry| entry.name.as_str().cmp(name))
        .ok()
        .map(|i| &index[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_one_entry() {
        let entry = SymbolIndexEntry {
            name: "helper".into(),
            member_index: 1,
            symbol_value: 0x4000,
            symbol_type: SymbolType::Func,
            symbol_binding: SymbolBinding::Global,
        };
        let mut buf = Vec::new();
        write_entry(&entry, 7, Endian::Little, &mut buf).unwrap();
        assert_eq!(buf.len(), ENTRY_SIZE);
        let decoded = read_entry(&mut std::io::Cursor::new(&buf), Endian::Little, |offset| {
            assert_eq!(offset, 7);
            Ok("helper".to_string())
        })
        .unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn find_locates_by_name_in_sorted_order() {
        let index = vec![
            SymbolIndexEntry {
                name: "alpha".into(),
                member_index: 0,
                symbol_value: 0,
                symbol_type: SymbolType::Object,
                symbol_binding: SymbolBinding::Global,
            },
            SymbolIndexEntry {
                name: "helper".into(),
                member_index: 1,
                symbol_value: 0x4000,
                symbol_type: SymbolType::Func,
                symbol_binding: SymbolBinding::Global,
            },
        ];
        assert_eq!(find(&index, "helper").unwrap().member_index, 1);
        assert!(find(&index, "missing").is_none());
    }
}
