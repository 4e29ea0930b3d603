//! STAR archive header.

use std::io::{Read, Write};

use smof::Endian;

use crate::endian_io::{read_u32, write_u16, write_u32};
use crate::error::{Error, Result};

/// On-disk size of the archive header, in bytes.
pub const HEADER_SIZE: usize = 64;

/// Archive magic: the 4 ASCII bytes `"STAR"`.
pub const MAGIC: [u8; 4] = *b"STAR";

/// Current on-disk format version.
pub const VERSION_CURRENT: u16 = 1;

bitflags::bitflags! {
    /// Archive-wide flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArchiveFlags: u16 {
        /// At least one member is stored compressed.
        const COMPRESSED    = 0x0001;
        /// The archive carries a symbol index.
        const INDEXED       = 0x0002;
        /// The member table is kept sorted by name.
        const SORTED        = 0x0004;
        /// Archive was written in little-endian byte order.
        const LITTLE_ENDIAN = 0x0008;
        /// Archive was written in big-endian byte order.
        const BIG_ENDIAN    = 0x0010;
    }
}

/// Decoded archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarHeader {
    /// Format version.
    pub version: u16,
    /// Archive-wide flags.
    pub flags: ArchiveFlags,
    /// Number of members.
    pub member_count: u32,
    /// Byte offset of the symbol index, or 0 if absent.
    pub index_offset: u32,
    /// Byte size of the symbol index.
    pub index_size: u32,
    /// Byte offset of the member table.
    pub member_table_offset: u32,
    /// Byte offset of the string table.
    pub string_table_offset: u32,
    /// Byte size of the string table.
    pub string_table_size: u32,
    /// Unix timestamp of archive creation.
    pub creation_time: u32,
    /// CRC-32 of the header with this field zeroed.
    pub checksum: u32,
}

impl StarHeader {
    /// Which endianness this header declares, per its flag pair.
    pub fn endian(&self) -> Result<Endian> {
        match (
            self.flags.contains(ArchiveFlags::LITTLE_ENDIAN),
            self.flags.contains(ArchiveFlags::BIG_ENDIAN),
        ) {
            (true, false) => Ok(Endian::Little),
            (false, true) => Ok(Endian::Big),
            _ => Err(Error::ArchiveCorrupt {
                reason: "exactly one of LITTLE_ENDIAN/BIG_ENDIAN must be set".into(),
            }),
        }
    }

    /// Read and structurally validate a header, bootstrapping endianness
    /// the same way `smof::SmofHeader` does: trying both interpretations
    /// of the flags field and keeping whichever sets exactly one marker.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; HEADER_SIZE];
        reader.read_exact(&mut raw)?;

        if raw[0..4] != MAGIC {
            return Err(Error::ArchiveCorrupt {
                reason: format!("bad magic: {:?}", &raw[0..4]),
            });
        }

        let flags_bytes = [raw[6], raw[7]];
        let le_flags = ArchiveFlags::from_bits_truncate(u16::from_le_bytes(flags_bytes));
        let be_flags = ArchiveFlags::from_bits_truncate(u16::from_be_bytes(flags_bytes));
        let le_marked = le_flags.intersects(ArchiveFlags::LITTLE_ENDIAN | ArchiveFlags::BIG_ENDIAN);
        let be_marked = be_flags.intersects(ArchiveFlags::LITTLE_ENDIAN | ArchiveFlags::BIG_ENDIAN);

        let (endian, flags) = match (le_marked, be_marked) {
            (true, false) => (Endian::Little, le_flags),
            (false, true) => (Endian::Big, be_flags),
            _ => {
                return Err(Error::ArchiveCorrupt {
                    reason: "ambiguous or missing endianness marker in header flags".into(),
                })
            }
        };

        let mut cursor = std::io::Cursor::new(&raw[8..]);
        let version = u16::from_le_bytes([raw[4], raw[5]]);
        let version = if endian == Endian::Big { version.swap_bytes() } else { version };
        if version > VERSION_CURRENT {
            return Err(Error::ArchiveCorrupt {
                reason: format!("unsupported version {version}"),
            });
        }

        let member_count = read_u32(&mut cursor, endian)?;
        let index_offset = read_u32(&mut cursor, endian)?;
        let index_size = read_u32(&mut cursor, endian)?;
        let member_table_offset = read_u32(&mut cursor, endian)?;
        let string_table_offset = read_u32(&mut cursor, endian)?;
        let string_table_size = read_u32(&mut cursor, endian)?;
        let creation_time = read_u32(&mut cursor, endian)?;
        let checksum = read_u32(&mut cursor, endian)?;

        Ok(StarHeader {
            version,
            flags,
            member_count,
            index_offset,
            index_size,
            member_table_offset,
            string_table_offset,
            string_table_size,
            creation_time,
            checksum,
        })
    }

    /// Write the header in `endian` byte order, with `checksum` written
    /// verbatim (callers patch it in place after the rest of the archive
    /// is known, per `spec.md` §4.6 step 6).
    pub fn write<W: Write>(&self, endian: Endian, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        write_u16(writer, endian, self.version)?;

        let mut flags = self.flags;
        flags.remove(ArchiveFlags::LITTLE_ENDIAN | ArchiveFlags::BIG_ENDIAN);
        flags.insert(if endian == Endian::Little {
            ArchiveFlags::LITTLE_ENDIAN
        } else {
            ArchiveFlags::BIG_ENDIAN
        });
        write_u16(writer, endian, flags.bits())?;

        write_u32(writer, endian, self.member_count)?;
        write_u32(writer, endian, self.index_offset)?;
        write_u32(writer, endian, self.index_size)?;
        write_u32(writer, endian, self.member_table_offset)?;
        write_u32(writer, endian, self.string_table_offset)?;
        write_u32(writer, endian, self.string_table_size)?;
        write_u32(writer, endian, self.creation_time)?;
        write_u32(writer, endian, self.checksum)?;
        writer.write_all(&[0u8; 24])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StarHeader {
        StarHeader {
            version: VERSION_CURRENT,
            flags: ArchiveFlags::INDEXED | ArchiveFlags::SORTED,
            member_count: 3,
            index_offset: 500,
            index_size: 48,
            member_table_offset: 64,
            string_table_offset: 448,
            string_table_size: 52,
            creation_time: 1_700_000_000,
            checksum: 0xdead_beef,
        }
    }

    #[test]
    fn round_trips_little_endian() {
        let header = sample();
        let mut buf = Vec::new();
        header.write(Endian::Little, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let decoded = StarHeader::read(&mut std::io::Cursor::new(&buf)).unwrap();
        assert_eq!(decoded.member_count, header.member_count);
        assert_eq!(decoded.endian().unwrap(), Endian::Little);
    }

    #[test]
    fn round_trips_big_endian() {
        let header = sample();
        let mut buf = Vec::new();
        header.write(Endian::Big, &mut buf).unwrap();
        let decoded = StarHeader::read(&mut std::io::Cursor::new(&buf)).unwrap();
        assert_eq!(decoded.member_count, header.member_count);
        assert_eq!(decoded.endian().unwrap(), Endian::Big);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"NOPE");
        assert!(StarHeader::read(&mut std::io::Cursor::new(&buf)).is_err());
    }
}
