//! STLD — a linker for SMOF relocatable object files.
//!
//! Implements components C2–C5 of the toolchain: symbol resolution
//! ([`symbol_table`]), section layout ([`section_manager`]), relocation
//! patching ([`relocation`]), and the driver that orchestrates them
//! ([`driver`]) against the `smof` crate's codec (C1).

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod driver;
pub mod error;
pub mod map;
pub mod options;
pub mod relocation;
pub mod section_manager;
pub mod symbol_table;

pub use driver::{LinkStats, LinkerContext, Phase};
pub use error::{Error, Result, Severity};
pub use options::{LinkerOptions, OutputType};
pub use relocation::{LinkRelocation, RelocationEngine, RelocationState};
pub use section_manager::{SectionHandle, SectionManager};
pub use symbol_table::{FnvBuildHasher, FnvHasher, SymbolHandle, SymbolTable};
