//! Relocation table entries.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::error::{Error, Result};

/// On-disk size of a relocation table entry, in bytes.
pub const ENTRY_SIZE: usize = 8;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
/// The patch formula a relocation entry applies.
///
/// `Abs8`/`Pc8` are the optional 8-bit variants `spec.md` §3 allows to
/// extend the enumerated set; any other value is rejected at decode time.
pub enum RelocationType {
    /// No-op; the relocation processor writes nothing.
    None = 0,
    /// `S + A`, written as a 32-bit little-endian word.
    Abs32 = 1,
    /// `S + A - P - 4`, written as a 32-bit little-endian word.
    Rel32 = 2,
    /// `S + A`, written as a 16-bit value; overflow is an error.
    Abs16 = 3,
    /// `S + A - P - 4`, written as a 16-bit value; overflow is an error.
    Rel16 = 4,
    /// The symbol's raw `value`, written as a 32-bit syscall number.
    Syscall = 5,
    /// Global Offset Table entry; unsupported in a static link.
    Got = 6,
    /// Procedure Linkage Table entry; unsupported in a static link.
    Plt = 7,
    /// `S + A`, written as an 8-bit value; overflow is an error.
    Abs8 = 8,
    /// `S + A - P - 4`, written as an 8-bit value; overflow is an error.
    Pc8 = 9,
}

impl RelocationType {
    /// Decode from the on-disk byte, rejecting unknown values.
    pub fn from_u8(value: u8) -> Result<Self> {
        FromPrimitive::from_u8(value).ok_or(Error::InvalidRelocation {
            index: 0,
            reason: format!("unknown relocation type {value}"),
        })
    }
}

/// A decoded relocation table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Byte offset within the target section.
    pub offset: u32,
    /// Index of the symbol providing the value to patch in.
    pub symbol_index: u16,
    /// Patch formula.
    pub reloc_type: RelocationType,
    /// Index of the section to patch.
    pub section_index: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_relocation_type() {
        assert!(RelocationType::from_u8(200).is_err());
    }

    #[test]
    fn recognizes_optional_byte_variants() {
        assert_eq!(RelocationType::from_u8(8).unwrap(), RelocationType::Abs8);
        assert_eq!(RelocationType::from_u8(9).unwrap(), RelocationType::Pc8);
    }
}
