//! Section table entries.

use crate::error::{Error, Result};

bitflags::bitflags! {
    /// Per-section permission and loading flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u16 {
        /// Contains executable code.
        const EXECUTABLE     = 0x0001;
        /// Writable at runtime.
        const WRITABLE       = 0x0002;
        /// Readable (conventionally always set).
        const READABLE       = 0x0004;
        /// Should be loaded into memory at link time.
        const LOADABLE       = 0x0008;
        /// Zero-filled at load time; carries no file bytes (`.bss`-like).
        const ZERO_FILL      = 0x0010;
        /// Payload is stored compressed.
        const COMPRESSED     = 0x0020;
        /// Shareable between processes.
        const SHARED         = 0x0040;
        /// Position-independent code or data.
        const POSITION_INDEP = 0x0080;
    }
}

/// On-disk size of a section table entry, in bytes.
pub const ENTRY_SIZE: usize = 20;

/// A decoded section table entry, its bytes owned alongside it.
///
/// `file_offset` of `0` means the section is zero-fill (BSS): it occupies
/// address space at link time but no bytes on disk, so `data` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name.
    pub name: String,
    /// Virtual address assigned at link time (or already assigned, for an
    /// already-linked file).
    pub virtual_addr: u32,
    /// Size in bytes.
    pub size: u32,
    /// Offset of the section's bytes within the file, or `0` for BSS.
    pub file_offset: u32,
    /// Permission and loading flags.
    pub flags: SectionFlags,
    /// Required alignment, a power of two.
    pub alignment: u32,
    /// The section's bytes, or `None` for a zero-fill (BSS) section.
    pub data: Option<Vec<u8>>,
}

impl Section {
    /// Whether this section is zero-filled BSS (no file bytes).
    pub fn is_bss(&self) -> bool {
        self.flags.contains(SectionFlags::ZERO_FILL) || self.data.is_none()
    }

    pub(crate) fn encode_alignment(alignment: u32, index: usize) -> Result<u8> {
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(Error::InvalidSection {
                index,
                reason: format!("alignment {alignment} is not a power of two"),
            });
        }
        let exponent = alignment.trailing_zeros();
        u8::try_from(exponent).map_err(|_| Error::InvalidSection {
            index,
            reason: format!("alignment {alignment} is too large to encode"),
        })
    }

    pub(crate) fn decode_alignment(exponent: u8, index: usize) -> Result<u32> {
        1u32.checked_shl(exponent as u32)
            .ok_or_else(|| Error::InvalidSection {
                index,
                reason: format!("alignment exponent {exponent} overflows"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_round_trips_power_of_two() {
        for exp in 0u8..=20 {
            let value = Section::decode_alignment(exp, 0).unwrap();
            assert_eq!(Section::encode_alignment(value, 0).unwrap(), exp);
        }
    }

    #[test]
    fn non_power_of_two_alignment_is_rejected() {
        assert!(Section::encode_alignment(3, 0).is_err());
        assert!(Section::encode_alignment(0, 0).is_err());
    }

    #[test]
    fn zero_file_offset_section_is_bss() {
        let section = Section {
            name: "bss".into(),
            virtual_addr: 0x2000,
            size: 64,
            file_offset: 0,
            flags: SectionFlags::WRITABLE | SectionFlags::READABLE | SectionFlags::ZERO_FILL,
            alignment: 4,
            data: None,
        };
        assert!(section.is_bss());
    }
}
