//! The 36-byte SMOF file header.
//!
//! `spec.md` §9 notes that the source repository this format was distilled
//! from carries several divergent header layouts (32-byte and 36-byte
//! variants, with the magic constant byte-reversed between them) and fixes
//! the 36-byte layout with magic `'SMOF'` as canonical; the 32-byte variant
//! is rejected, never silently accepted.

use std::io::{Read, Write};

use crate::endian::Endian;
use crate::error::{Error, Result};

bitflags::bitflags! {
    /// File-level flags stored in the SMOF header.
    ///
    /// The first eight bits are the feature flags from the reference
    /// implementation (`SMOF_FLAG_*`). Bits 8 and 9 are this crate's
    /// per-file endianness marker (see [`SmofHeader::read`]): exactly one
    /// of [`SmofFlags::LITTLE_ENDIAN`] / [`SmofFlags::BIG_ENDIAN`] is set on
    /// a valid file, the same invariant STAR archives enforce on their own
    /// endianness flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SmofFlags: u16 {
        /// The file is executable.
        const EXECUTABLE     = 0x0001;
        /// The file is a shared library.
        const SHARED_LIB     = 0x0002;
        /// The file's code is position independent.
        const POSITION_INDEP = 0x0004;
        /// Debug symbols have been stripped.
        const STRIPPED       = 0x0008;
        /// The file is statically linked.
        const STATIC         = 0x0010;
        /// Section payloads are stored compressed.
        const COMPRESSED     = 0x0020;
        /// The file carries basic encryption (round-tripped only; not implemented).
        const ENCRYPTED      = 0x0040;
        /// The file uses extended Unix features (round-tripped only; not implemented).
        const UNIX_FEATURES  = 0x0080;
        /// The file's integer fields are little-endian.
        const LITTLE_ENDIAN  = 0x0100;
        /// The file's integer fields are big-endian.
        const BIG_ENDIAN     = 0x0200;
    }
}

/// The canonical SMOF magic, as it appears on disk: the four ASCII bytes
/// `'S'`, `'M'`, `'O'`, `'F'`. Checked byte-for-byte, never as a 32-bit
/// integer, which sidesteps the `0x534D4F46`-vs-`0x464F4D53` ambiguity noted
/// in `spec.md` §9 entirely: a byte sequence has no endianness.
pub const MAGIC: [u8; 4] = *b"SMOF";

/// Newest format version this crate understands.
pub const VERSION_CURRENT: u16 = 1;

/// On-disk size of the header, in bytes.
pub const HEADER_SIZE: usize = 36;

/// The decoded SMOF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmofHeader {
    /// Format version.
    pub version: u16,
    /// File-level flags.
    pub flags: SmofFlags,
    /// Virtual address of the entry point.
    pub entry_point: u32,
    /// Number of section table entries.
    pub section_count: u16,
    /// Number of symbol table entries.
    pub symbol_count: u16,
    /// Byte offset of the string table.
    pub string_table_offset: u32,
    /// Byte size of the string table.
    pub string_table_size: u32,
    /// Byte offset of the section table.
    pub section_table_offset: u32,
    /// Byte offset of the relocation table.
    pub reloc_table_offset: u32,
    /// Number of relocation table entries.
    pub reloc_count: u16,
    /// Number of import table entries.
    pub import_count: u16,
}

impl SmofHeader {
    /// The file's byte order, derived from [`SmofFlags::LITTLE_ENDIAN`] /
    /// [`SmofFlags::BIG_ENDIAN`].
    pub fn endian(&self) -> Endian {
        if self.flags.contains(SmofFlags::BIG_ENDIAN) {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Read the header, discovering the file's endianness along the way.
    ///
    /// The magic is checked as a raw byte sequence first. The endianness
    /// marker bits then let the reader pick, out of the two possible
    /// interpretations of the `flags` field's raw bytes, the one where
    /// exactly one of the marker bits is set; every field after `flags` is
    /// then decoded with that byte order.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic {
                expected: u32::from_le_bytes(MAGIC),
                found: u32::from_le_bytes(magic),
            });
        }

        let mut version_raw = [0u8; 2];
        r.read_exact(&mut version_raw)?;
        let mut flags_raw = [0u8; 2];
        r.read_exact(&mut flags_raw)?;

        let as_le = u16::from_le_bytes(flags_raw);
        let as_be = u16::from_be_bytes(flags_raw);
        let le_marked = as_le & 0x0300;
        let be_marked = as_be & 0x0300;
        let (endian, flags_value) = match (le_marked, be_marked) {
            (0x0100, m) if m != 0x0100 => (Endian::Little, as_le),
            (m, 0x0200) if m != 0x0200 => (Endian::Big, as_be),
            _ => {
                return Err(Error::CorruptHeader {
                    reason: "flags field does not carry exactly one endianness marker".into(),
                })
            }
        };
        let version = match endian {
            Endian::Little => u16::from_le_bytes(version_raw),
            Endian::Big => u16::from_be_bytes(version_raw),
        };
        if version > VERSION_CURRENT {
            return Err(Error::UnsupportedVersion {
                found: version,
                current: VERSION_CURRENT,
            });
        }

        let entry_point = endian.read_u32(r)?;
        let section_count = endian.read_u16(r)?;
        let symbol_count = endian.read_u16(r)?;
        let string_table_offset = endian.read_u32(r)?;
        let string_table_size = endian.read_u32(r)?;
        let section_table_offset = endian.read_u32(r)?;
        let reloc_table_offset = endian.read_u32(r)?;
        let reloc_count = endian.read_u16(r)?;
        let import_count = endian.read_u16(r)?;

        Ok(Self {
            version,
            flags: SmofFlags::from_bits_truncate(flags_value),
            entry_point,
            section_count,
            symbol_count,
            string_table_offset,
            string_table_size,
            section_table_offset,
            reloc_table_offset,
            reloc_count,
            import_count,
        })
    }

    /// Write the header using `endian` byte order, setting the appropriate
    /// endianness marker bit.
    pub fn write<W: Write>(&self, endian: Endian, w: &mut W) -> Result<()> {
        w.write_all(&MAGIC)?;

        let mut flags = self.flags;
        flags.remove(SmofFlags::LITTLE_ENDIAN | SmofFlags::BIG_ENDIAN);
        flags.insert(match endian {
            Endian::Little => SmofFlags::LITTLE_ENDIAN,
            Endian::Big => SmofFlags::BIG_ENDIAN,
        });

        endian.write_u16(w, self.version)?;
        endian.write_u16(w, flags.bits())?;
        endian.write_u32(w, self.entry_point)?;
        endian.write_u16(w, self.section_count)?;
        endian.write_u16(w, self.symbol_count)?;
        endian.write_u32(w, self.string_table_offset)?;
        endian.write_u32(w, self.string_table_size)?;
        endian.write_u32(w, self.section_table_offset)?;
        endian.write_u32(w, self.reloc_table_offset)?;
        endian.write_u16(w, self.reloc_count)?;
        endian.write_u16(w, self.import_count)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SmofHeader {
        SmofHeader {
            version: 1,
            flags: SmofFlags::EXECUTABLE,
            entry_point: 0x1000,
            section_count: 2,
            symbol_count: 3,
            string_table_offset: 100,
            string_table_size: 40,
            section_table_offset: 36,
            reloc_table_offset: 200,
            reloc_count: 1,
            import_count: 0,
        }
    }

    #[test]
    fn round_trips_little_endian() {
        let header = sample();
        let mut buf = Vec::new();
        header.write(Endian::Little, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let decoded = SmofHeader::read(&mut &buf[..]).unwrap();
        assert_eq!(decoded.endian(), Endian::Little);
        assert_eq!(decoded.entry_point, header.entry_point);
        assert_eq!(decoded.section_count, header.section_count);
        assert!(decoded.flags.contains(SmofFlags::EXECUTABLE));
    }

    #[test]
    fn round_trips_big_endian() {
        let header = sample();
        let mut buf = Vec::new();
        header.write(Endian::Big, &mut buf).unwrap();
        let decoded = SmofHeader::read(&mut &buf[..]).unwrap();
        assert_eq!(decoded.endian(), Endian::Big);
        assert_eq!(decoded.entry_point, header.entry_point);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            SmofHeader::read(&mut &buf[..]),
            Err(Error::InvalidMagic { .. })
        ));
    }

    #[test]
    fn rejects_future_version() {
        let mut header = sample();
        header.version = VERSION_CURRENT + 1;
        let mut buf = Vec::new();
        header.write(Endian::Little, &mut buf).unwrap();
        assert!(matches!(
            SmofHeader::read(&mut &buf[..]),
            Err(Error::UnsupportedVersion { .. })
        ));
    }
}
