//! Symbol table entries.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::error::{Error, Result};

/// On-disk size of a symbol table entry, in bytes.
pub const ENTRY_SIZE: usize = 16;

/// Section index meaning "this symbol is undefined".
pub const SECTION_UNDEFINED: u16 = 0xFFFF;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
/// The kind of entity a symbol names.
pub enum SymbolType {
    /// No type specified.
    NoType = 0,
    /// A data object.
    Object = 1,
    /// A function.
    Func = 2,
    /// A symbol representing a section.
    Section = 3,
    /// A symbol naming the source file.
    File = 4,
    /// A system call entry point.
    Syscall = 5,
}

impl SymbolType {
    /// Decode from the on-disk byte, rejecting unknown values.
    pub fn from_u8(value: u8) -> Result<Self> {
        FromPrimitive::from_u8(value).ok_or(Error::InvalidSymbol {
            index: 0,
            reason: format!("unknown symbol type {value}"),
        })
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
/// Binding (linkage visibility) of a symbol.
pub enum SymbolBinding {
    /// Visible only within the input file that defined it.
    Local = 0,
    /// Visible to every input in the link; at most one definition allowed.
    Global = 1,
    /// Visible to every input, but yields to a [`SymbolBinding::Global`]
    /// definition of the same name.
    Weak = 2,
    /// Global and additionally exported for external consumers (e.g. an
    /// archive's symbol index).
    Export = 3,
}

impl SymbolBinding {
    /// Decode from the on-disk byte, rejecting unknown values.
    pub fn from_u8(value: u8) -> Result<Self> {
        FromPrimitive::from_u8(value).ok_or(Error::InvalidSymbol {
            index: 0,
            reason: format!("unknown symbol binding {value}"),
        })
    }

    /// Whether this binding participates in cross-input name resolution.
    /// Locals are scoped to the input file they came from.
    pub fn is_global_scope(self) -> bool {
        !matches!(self, SymbolBinding::Local)
    }
}

/// A decoded symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Symbol name.
    pub name: String,
    /// Value (address, once resolved and laid out).
    pub value: u32,
    /// Size in bytes, if known.
    pub size: u32,
    /// Defining section, or `None` if undefined.
    pub section_index: Option<u16>,
    /// Symbol type.
    pub sym_type: SymbolType,
    /// Symbol binding.
    pub binding: SymbolBinding,
}

impl Symbol {
    /// Whether this symbol is a reference with no definition in its own file.
    pub fn is_undefined(&self) -> bool {
        self.section_index.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_symbol_type() {
        assert!(SymbolType::from_u8(200).is_err());
    }

    #[test]
    fn rejects_unknown_binding() {
        assert!(SymbolBinding::from_u8(200).is_err());
    }

    #[test]
    fn only_local_is_scoped_to_its_file() {
        assert!(!SymbolBinding::Local.is_global_scope());
        assert!(SymbolBinding::Global.is_global_scope());
        assert!(SymbolBinding::Weak.is_global_scope());
        assert!(SymbolBinding::Export.is_global_scope());
    }
}
