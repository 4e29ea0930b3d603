//! Endian-aware primitive reads/writes shared by the header, member, and
//! symbol-index codecs.
//!
//! `smof::Endian`'s own read/write helpers are crate-private to `smof`; this
//! is the equivalent for STAR's own on-disk integers.

use std::io::{Read, Write};

use smof::Endian;

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16<R: Read>(reader: &mut R, endian: Endian) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(match endian {
        Endian::Little => u16::from_le_bytes(buf),
        Endian::Big => u16::from_be_bytes(buf),
    })
}

pub(crate) fn read_u32<R: Read>(reader: &mut R, endian: Endian) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(match endian {
        Endian::Little => u32::from_le_bytes(buf),
        Endian::Big => u32::from_be_bytes(buf),
    })
}

pub(crate) fn write_u8<W: Write>(writer: &mut W, value: u8) -> std::io::Result<()> {
    writer.write_all(&[value])
}

pub(crate) fn write_u16<W: Write>(writer: &mut W, endian: Endian, value: u16) -> std::io::Result<()> {
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    writer.write_all(&bytes)
}

pub(crate) fn write_u32<W: Write>(writer: &mut W, endian: Endian, value: u32) -> std::io::Result<()> {
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    writer.write_all(&bytes)
}
