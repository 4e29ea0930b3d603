//! Codec for SMOF (STIX Minimal Object Format), a compact relocatable
//! object-file format for resource-constrained targets.
//!
//! This crate implements component C1 of the toolchain: reading, writing,
//! and structurally validating SMOF files. It knows nothing about symbol
//! resolution, section layout, or relocation patching — those are the
//! linker's job (the `stld` crate) — and nothing about archives (the `star`
//! crate).

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod endian;
pub mod error;
pub mod file;
pub mod header;
pub mod import;
pub mod relocation;
pub mod section;
pub mod strtab;
pub mod symbol;

pub use endian::Endian;
pub use error::{Error, Result};
pub use file::SmofFile;
pub use header::{SmofFlags, SmofHeader, HEADER_SIZE, MAGIC, VERSION_CURRENT};
pub use import::Import;
pub use relocation::{Relocation, RelocationType};
pub use section::{Section, SectionFlags};
pub use strtab::StringTable;
pub use symbol::{Symbol, SymbolBinding, SymbolType, SECTION_UNDEFINED};
