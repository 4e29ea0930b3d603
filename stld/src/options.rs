//! Linker configuration, as driven by the CLI or an embedding caller.

use typed_builder::TypedBuilder;

/// Shape of the emitted output, per `spec.md` §4.5 phase 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// A SMOF file with the `EXECUTABLE` header flag set.
    #[default]
    Executable,
    /// A SMOF file with the `SHARED_LIB` header flag set.
    SharedLibrary,
    /// A SMOF file with the `STATIC` header flag set.
    StaticLibrary,
    /// A plain relocatable SMOF object (no executable flags).
    Object,
    /// Raw concatenated section payloads, no SMOF header at all.
    BinaryFlat,
}

/// Options bundle for one link, mirroring the table in `spec.md` §4.5.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LinkerOptions {
    /// Input object file paths, in link order.
    #[builder(default)]
    pub inputs: Vec<String>,
    /// Output file path.
    #[builder(default = "a.out".to_string())]
    pub output_path: String,
    /// Emit format.
    #[builder(default)]
    pub output_type: OutputType,
    /// Overrides `_start` detection when non-zero.
    #[builder(default)]
    pub entry_point: u32,
    /// Entry-point symbol name override (`-e`); resolved once layout has
    /// assigned it a value. Takes precedence over `_start` but not over a
    /// non-zero `entry_point`.
    #[builder(default)]
    pub entry_symbol: Option<String>,
    /// Layout origin for section addresses.
    #[builder(default)]
    pub base_address: u32,
    /// Reserved: does not change observable output in the core.
    #[builder(default)]
    pub optimize: bool,
    /// Omits FILE/LOCAL symbols from the emitted table.
    #[builder(default)]
    pub strip_debug: bool,
    /// Sets `POSITION_INDEP` in the header and in every section's flags.
    #[builder(default)]
    pub position_independent: bool,
    /// Whether `BINARY_FLAT` output fills inter-section gaps.
    #[builder(default)]
    pub fill_gaps: bool,
    /// Byte value used to fill gaps when `fill_gaps` is set.
    #[builder(default)]
    pub fill_value: u8,
    /// Minimum alignment applied to the first section.
    #[builder(default = 1)]
    pub page_size: u32,
    /// Whether to emit a textual map file.
    #[builder(default)]
    pub generate_map: bool,
    /// Path for the map file; `None` uses a name derived from the output path.
    #[builder(default)]
    pub map_file: Option<String>,
    /// Enables progress reporting via `log::info`.
    #[builder(default)]
    pub verbose: bool,
}
