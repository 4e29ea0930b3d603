//! Error type for SMOF decoding, encoding, and validation failures.

#[derive(thiserror::Error, Debug)]
/// Everything that can go wrong reading, writing, or validating a SMOF file.
pub enum Error {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {kind}")]
    Io {
        /// The kind of I/O error that occurred.
        kind: std::io::ErrorKind,
    },
    /// The file's magic number did not match `'SMOF'`.
    #[error("invalid SMOF magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic {
        /// The expected magic value.
        expected: u32,
        /// The magic value actually present.
        found: u32,
    },
    /// The file declares a format version newer than this crate supports.
    #[error("unsupported SMOF version {found} (current is {current})")]
    UnsupportedVersion {
        /// The version found in the header.
        found: u16,
        /// The newest version this crate understands.
        current: u16,
    },
    /// The header failed a structural check (overlapping tables, bad
    /// endianness flags, an offset or size pointing outside the file, etc).
    #[error("corrupt SMOF header: {reason}")]
    CorruptHeader {
        /// Human-readable description of which check failed.
        reason: String,
    },
    /// A section table entry is structurally invalid.
    #[error("invalid section {index}: {reason}")]
    InvalidSection {
        /// Index of the offending section.
        index: usize,
        /// Human-readable description of which check failed.
        reason: String,
    },
    /// A symbol table entry is structurally invalid.
    #[error("invalid symbol {index}: {reason}")]
    InvalidSymbol {
        /// Index of the offending symbol.
        index: usize,
        /// Human-readable description of which check failed.
        reason: String,
    },
    /// A relocation table entry is structurally invalid.
    #[error("invalid relocation {index}: {reason}")]
    InvalidRelocation {
        /// Index of the offending relocation.
        index: usize,
        /// Human-readable description of which check failed.
        reason: String,
    },
    /// A `name_offset` field did not point at a valid, in-bounds,
    /// NUL-terminated string.
    #[error("invalid string table offset {offset} (table size {size})")]
    InvalidStringOffset {
        /// The offset that was out of range or unterminated.
        offset: u32,
        /// The size of the string table it was checked against.
        size: u32,
    },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io { kind: e.kind() }
    }
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;
