//! Import table entries.
//!
//! Reserved for dynamic linking, which is a non-goal of this core
//! (`spec.md` §1): the core always emits zero import entries, but reads and
//! round-trips any that are present in an input file.

/// On-disk size of an import table entry, in bytes.
pub const ENTRY_SIZE: usize = 8;

/// A decoded import table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Name of the providing library.
    pub library: String,
    /// Name of the imported symbol.
    pub symbol: String,
}
