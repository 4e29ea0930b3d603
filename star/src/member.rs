//! STAR member table entries.

use std::io::{Read, Write};

use smof::Endian;

use crate::endian_io::{read_u16, read_u32, read_u8, write_u16, write_u32, write_u8};
use crate::error::{Error, Result};

/// On-disk size of a member table entry, in bytes.
pub const ENTRY_SIZE: usize = 128;

bitflags::bitflags! {
    /// Per-member flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemberFlags: u16 {
        /// Payload is stored compressed.
        const COMPRESSED = 0x0001;
        /// Member is an executable SMOF file.
        const EXECUTABLE = 0x0002;
        /// Member should be treated as read-only.
        const READONLY   = 0x0004;
    }
}

/// Compression algorithm a member's payload is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    /// Payload is stored as-is.
    None,
    /// LZ4 block format (`lz4_flex`).
    Lz4,
    /// ZLIB (`flate2`).
    Zlib,
    /// Recognized and round-tripped; no codec is implemented.
    Lzma,
}

impl CompressionAlgorithm {
    pub(crate) fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => Ok(Self::Zlib),
            3 => Ok(Self::Lzma),
            other => Err(Error::ArchiveCorrupt {
                reason: format!("unknown compression algorithm {other}"),
            }),
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lz4 => 1,
            Self::Zlib => 2,
            Self::Lzma => 3,
        }
    }

    /// Human-readable name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zlib => "zlib",
            Self::Lzma => "lzma",
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded member table entry. Does not carry the member's bytes; those
/// live in the archive's payload region, addressed by `data_offset`.
#[derive(Debug, Clone, Copy)]
pub struct MemberEntry {
    /// Offset of the member's name in the string table.
    pub name_offset: u32,
    /// Uncompressed size in bytes.
    pub size: u32,
    /// On-disk (possibly compressed) size in bytes.
    pub compressed_size: u32,
    /// Byte offset of the payload within the archive file.
    pub data_offset: u32,
    /// CRC-32 of the uncompressed payload.
    pub checksum: u32,
    /// Unix timestamp.
    pub timestamp: u32,
    /// Member flags.
    pub flags: MemberFlags,
    /// Compression algorithm applied to the payload.
    pub compression: CompressionAlgorithm,
}

impl MemberEntry {
    pub(crate) fn read<R: Read>(reader: &mut R, endian: Endian) -> Result<Self> {
        let name_offset = read_u32(reader, endian)?;
        let size = read_u32(reader, endian)?;
        let compressed_size = read_u32(reader, endian)?;
        let data_offset = read_u32(reader, endian)?;
        let checksum = read_u32(reader, endian)?;
        let timestamp = read_u32(reader, endian)?;
        let flags = MemberFlags::from_bits_truncate(read_u16(reader, endian)?);
        let compression = CompressionAlgorithm::from_u8(read_u8(reader)?)?;
        let mut reserved = [0u8; 101];
        reader.read_exact(&mut reserved)?;
        Ok(Self {
            name_offset,
            size,
            compressed_size,
            data_offset,
            checksum,
            timestamp,
            flags,
            compression,
        })
    }

    pub(crate) fn write<W: Write>(&self, endian: Endian, writer: &mut W) -> Result<()> {
        write_u32(writer, endian, self.name_offset)?;
        write_u32(writer, endian, self.size)?;
        write_u32(writer, endian, self.compressed_size)?;
        write_u32(writer, endian, self.data_offset)?;
        write_u32(writer, endian, self.checksum)?;
        write_u32(writer, endian, self.timestamp)?;
        write_u16(writer, endian, self.flags.bits())?;
        write_u8(writer, self.compression.to_u8())?;
        writer.write_all(&[0u8; 101])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let entry = MemberEntry {
            name_offset: 4,
            size: 1000,
            compressed_size: 400,
            data_offset: 512,
            checksum: 0x1234_5678,
            timestamp: 1_700_000_000,
            flags: MemberFlags::COMPRESSED,
            compression: CompressionAlgorithm::Zlib,
        };
        let mut buf = Vec::new();
        entry.write(Endian::Little, &mut buf).unwrap();
        assert_eq!(buf.len(), ENTRY_SIZE);
        let decoded = MemberEntry::read(&mut std::io::Cursor::new(&buf), Endian::Little).unwrap();
        assert_eq!(decoded.name_offset, entry.name_offset);
        assert_eq!(decoded.compression, entry.compression);
    }
}
