//! Error type for the linker (components C2–C5).

/// Severity independent of error kind, per `spec.md` §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Purely informational.
    Info,
    /// Worth surfacing but does not abort the link.
    Warning,
    /// Aborts the current operation.
    Error,
    /// Unrecoverable; the process should exit.
    Fatal,
}

#[derive(thiserror::Error, Debug)]
/// Everything that can go wrong while linking.
pub enum Error {
    /// No input files were given.
    #[error("no input files")]
    NoInputFiles,
    /// Failed to decode, validate, or otherwise process a SMOF file.
    #[error("{path}: {source}")]
    Smof {
        /// Path of the file that failed to decode.
        path: String,
        /// Underlying codec error.
        #[source]
        source: smof::Error,
    },
    /// Two inputs each define the same global symbol.
    #[error("duplicate definition of global symbol `{name}`")]
    DuplicateSymbol {
        /// The colliding symbol's name.
        name: String,
    },
    /// One or more referenced symbols have no definition anywhere in the link.
    #[error("undefined symbol(s): {}", .names.join(", "))]
    SymbolNotFound {
        /// Every name that could not be resolved.
        names: Vec<String>,
    },
    /// Two same-named sections cannot be merged (e.g. one is BSS, the other is not).
    #[error("cannot merge section `{name}`: {reason}")]
    SectionMismatch {
        /// Name of the offending section.
        name: String,
        /// Human-readable description of the mismatch.
        reason: String,
    },
    /// A relocation could not be satisfied.
    #[error("relocation failed for symbol `{symbol}` at section {section} offset {offset:#x}")]
    RelocationFailed {
        /// Name of the symbol the relocation targeted.
        symbol: String,
        /// Index of the section being patched.
        section: usize,
        /// Byte offset within that section.
        offset: u32,
    },
    /// A relocated value did not fit in its target width.
    #[error("relocation overflow for symbol `{symbol}`: value {value:#x} does not fit in {width} bits")]
    RelocOverflow {
        /// Name of the symbol the relocation targeted.
        symbol: String,
        /// The value that did not fit.
        value: i64,
        /// Target width in bits (8 or 16).
        width: u8,
    },
    /// An I/O error occurred reading an input or writing the output.
    #[error("I/O error: {kind}")]
    Io {
        /// The kind of I/O error that occurred.
        kind: std::io::ErrorKind,
    },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io { kind: e.kind() }
    }
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;
