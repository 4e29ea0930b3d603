//! Archive configuration, as driven by the CLI or an embedding caller.

use typed_builder::TypedBuilder;

use crate::member::CompressionAlgorithm;

/// Options bundle for one archive operation, mirroring `spec.md` §6's `star`
/// flag set.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ArchiveOptions {
    /// Default compression algorithm for newly added members.
    #[builder(default = CompressionAlgorithm::None)]
    pub compression: CompressionAlgorithm,
    /// Compression level, 0–9.
    #[builder(default = 6)]
    pub compression_level: u8,
    /// Whether to build and write a symbol index on finalize.
    #[builder(default)]
    pub create_index: bool,
    /// Whether to keep the member table sorted by name.
    #[builder(default)]
    pub sort_members: bool,
    /// Directory to chdir into before the operation (`-C`).
    #[builder(default)]
    pub chdir: Option<String>,
    /// Temp directory used for staging; falls back to the platform default.
    #[builder(default)]
    pub temp_dir: Option<String>,
    /// Enables progress reporting via `log::info`.
    #[builder(default)]
    pub verbose: bool,
    /// Overwrite an existing archive file instead of failing.
    #[builder(default)]
    pub force: bool,
}
