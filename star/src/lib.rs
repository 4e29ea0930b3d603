//! STAR — an indexed archive container for SMOF object files.
//!
//! Implements component C6 of the toolchain: the archive header and member
//! table ([`header`], [`member`]), the compression codec abstraction
//! ([`codec`]), the symbol index ([`symbol_index`]), and [`archive::StarArchive`]
//! itself, which ties them together behind the create/add/extract/find/remove
//! contract. Depends on `smof` (C1) to build the symbol index by parsing each
//! member as a SMOF file.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod archive;
pub mod codec;
pub mod endian_io;
pub mod error;
pub mod header;
pub mod member;
pub mod options;
pub mod symbol_index;

pub use archive::StarArchive;
pub use codec::{codec_for, CompressionCodec, Lz4Codec, LzmaCodec, NoneCodec, ZlibCodec};
pub use error::{Error, Result};
pub use header::{ArchiveFlags, StarHeader, HEADER_SIZE, MAGIC, VERSION_CURRENT};
pub use member::{CompressionAlgorithm, MemberEntry, MemberFlags};
pub use options::ArchiveOptions;
pub use symbol_index::SymbolIndexEntry;
