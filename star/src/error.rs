//! Error type for the archiver (component C6).

#[derive(thiserror::Error, Debug)]
/// Everything that can go wrong building, reading, or modifying an archive.
pub enum Error {
    /// Failed to decode a member as a SMOF file while building the symbol index.
    #[error("{member}: {source}")]
    Smof {
        /// Name of the offending member.
        member: String,
        /// Underlying codec error.
        #[source]
        source: smof::Error,
    },
    /// Bad magic, out-of-range offset, overlapping table, or similar.
    #[error("archive corrupt: {reason}")]
    ArchiveCorrupt {
        /// Description of the structural problem.
        reason: String,
    },
    /// No member with the requested name exists.
    #[error("member not found: {name}")]
    MemberNotFound {
        /// Name that was looked up.
        name: String,
    },
    /// A codec failed to compress a member's bytes.
    #[error("compression failed for member `{member}` ({algorithm}): {reason}")]
    CompressionFailed {
        /// Name of the member being compressed.
        member: String,
        /// Algorithm in use.
        algorithm: String,
        /// Description of the failure.
        reason: String,
    },
    /// A codec failed to decompress a member's bytes.
    #[error("decompression failed for member `{member}` ({algorithm}): {reason}")]
    DecompressionFailed {
        /// Name of the member being decompressed.
        member: String,
        /// Algorithm in use.
        algorithm: String,
        /// Description of the failure.
        reason: String,
    },
    /// A member's recomputed CRC-32 does not match the stored value.
    #[error("checksum mismatch for member `{member}`: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Name of the offending member.
        member: String,
        /// Value stored in the member table.
        expected: u32,
        /// Value recomputed from the extracted bytes.
        actual: u32,
    },
    /// A requested compression algorithm has no working codec (LZMA is
    /// recognized and round-tripped but not implemented).
    #[error("unsupported compression algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// An I/O error occurred reading an input or writing the archive.
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
