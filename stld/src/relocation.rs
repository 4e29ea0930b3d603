//! C4 — relocation engine: applies typed patches to section bytes using
//! resolved symbol values.

use smof::RelocationType;

use crate::error::{Error, Result};
use crate::section_manager::{SectionHandle, SectionManager};
use crate::symbol_table::{SymbolHandle, SymbolTable};

/// Per-entry processing state, mirroring `spec.md` §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationState {
    /// Not yet processed.
    Pending,
    /// Patched successfully.
    Resolved,
    /// The target symbol has no definition anywhere in the link.
    FailedUnresolved,
    /// The computed value does not fit the target width.
    FailedOverflow,
}

/// A relocation translated into link-wide handles (as opposed to the
/// per-input-file indices `smof::Relocation` carries on disk).
#[derive(Debug, Clone, Copy)]
pub struct LinkRelocation {
    /// Section to patch.
    pub section: SectionHandle,
    /// Byte offset within that section.
    pub offset: u32,
    /// Patch formula.
    pub reloc_type: RelocationType,
    /// Symbol providing the value.
    pub symbol: SymbolHandle,
}

/// Owns every relocation collected across every input of a link.
#[derive(Debug, Default)]
pub struct RelocationEngine {
    entries: Vec<(LinkRelocation, RelocationState)>,
}

impl RelocationEngine {
    /// An empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a relocation, tagged `Pending`.
    pub fn add(&mut self, reloc: LinkRelocation) {
        self.entries.push((reloc, RelocationState::Pending));
    }

    /// Apply a section-handle permutation produced by
    /// [`SectionManager::calculate_layout`] to every queued entry.
    pub fn remap_section_handles(&mut self, mapping: &[SectionHandle]) {
        for (reloc, _) in &mut self.entries {
            reloc.section = mapping[reloc.section.0];
        }
    }

    /// Counts of entries in each state after `process_all`.
    pub fn counts(&self) -> (usize, usize) {
        let resolved = self
            .entries
            .iter()
            .filter(|(_, s)| *s == RelocationState::Resolved)
            .count();
        let failed = self.entries.len() - resolved;
        (resolved, failed)
    }

    /// Patch every queued relocation's bytes into its target section.
    ///
    /// Every entry is attempted even after a failure, so the final error
    /// lists every defect at once; bytes from entries that succeeded stay
    /// patched (the driver discards the whole output on failure, so this
    /// is observable only through `counts()` and logging).
    pub fn process_all(&mut self, symbols: &SymbolTable, sections: &mut SectionManager) -> Result<()> {
        let mut unresolved = Vec::new();
        let mut failure: Option<Error> = None;

        for (reloc, state) in &mut self.entries {
            let symbol = symbols.get(reloc.symbol);
            if symbol.is_undefined() {
                *state = RelocationState::FailedUnresolved;
                unresolved.push(symbol.name.clone());
                continue;
            }

            let s = symbol.value as i64;
            let a = 0i64;
            let section = sections.get(reloc.section);
            let p = section.virtual_addr as i64 + reloc.offset as i64;

            let result = match reloc.reloc_type {
                RelocationType::None => Ok(None),
                RelocationType::Abs32 => Ok(Some((s + a, 4))),
                RelocationType::Abs16 => Ok(Some((s + a, 2))),
                RelocationType::Abs8 => Ok(Some((s + a, 1))),
                RelocationType::Rel32 => Ok(Some((s + a - p - 4, 4))),
                RelocationType::Rel16 => Ok(Some((s + a - p - 4, 2))),
                RelocationType::Pc8 => Ok(Some((s + a - p - 4, 1))),
                RelocationType::Syscall => Ok(Some((s, 4))),
                RelocationType::Got | RelocationType::Plt => Err(Error::RelocationFailed {
                    symbol: symbol.name.clone(),
                    section: reloc.section.0,
                    offset: reloc.offset,
                }),
            };

            match result {
                Ok(None) => {
                    *state = RelocationState::Resolved;
                }
                Ok(Some((value, width))) => {
                    if !fits(value, width) {
                        *state = RelocationState::FailedOverflow;
                        failure.get_or_insert(Error::RelocOverflow {
                            symbol: symbol.name.clone(),
                            value,
                            width: (width * 8) as u8,
                        });
                        continue;
                    }
                    let section = sections.get_mut(reloc.section);
                    match patch(section, reloc.offset, value, width) {
                        Ok(()) => *state = RelocationState::Resolved,
                        Err(e) => {
                            *state = RelocationState::FailedUnresolved;
                            failure.get_or_insert(e);
                        }
                    }
                }
                Err(e) => {
                    *state = RelocationState::FailedUnresolved;
                    failure.get_or_insert(e);
                }
            }
        }

        if !unresolved.is_empty() {
            return Err(Error::SymbolNotFound { names: unresolved });
        }
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(())
    }
}

fn fits(value: i64, width: u8) -> bool {
    match width {
        1 => value >= i8::MIN as i64 && value <= u8::MAX as i64,
        2 => value >= i16::MIN as i64 && value <= u16::MAX as i64,
        _ => true,
    }
}

fn patch(section: &mut smof::Section, offset: u32, value: i64, width: u8) -> Result<()> {
    let data = section.data.as_mut().ok_or_else(|| Error::RelocationFailed {
        symbol: String::new(),
        section: 0,
        offset,
    })?;
    let start = offset as usize;
    let end = start + width as usize;
    if end > data.len() {
        return Err(Error::RelocationFailed {
            symbol: String::new(),
            section: 0,
            offset,
        });
    }
    let bytes = (value as u32).to_le_bytes();
    data[start..end].copy_from_slice(&bytes[..width as usize]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smof::{Section, SectionFlags, Symbol, SymbolBinding, SymbolType};

    fn make_section(bytes: Vec<u8>, addr: u32) -> Section {
        Section {
            name: ".text".into(),
            virtual_addr: addr,
            size: bytes.len() as u32,
            file_offset: 0,
            flags: SectionFlags::EXECUTABLE | SectionFlags::READABLE,
            alignment: 4,
            data: Some(bytes),
        }
    }

    #[test]
    fn abs32_patches_symbol_value() {
        let mut sections = SectionManager::new();
        let section = sections.add(make_section(vec![0, 0, 0, 0], 0x1000)).unwrap();
        let mut symbols = SymbolTable::new();
        let sym = symbols
            .insert(Symbol {
                name: "target".into(),
                value: 0x2000,
                size: 0,
                section_index: Some(0),
                sym_type: SymbolType::Object,
                binding: SymbolBinding::Global,
            })
            .unwrap();

        let mut engine = RelocationEngine::new();
        engine.add(LinkRelocation {
            section,
            offset: 0,
            reloc_type: RelocationType::Abs32,
            symbol: sym,
        });
        engine.process_all(&symbols, &mut sections).unwrap();
        assert_eq!(sections.get(section).data.as_deref(), Some(&0x2000u32.to_le_bytes()[..]));
    }

    #[test]
    fn rel32_matches_scenario_3_from_the_spec() {
        // file A defines `main` at 0x1000; file B's .text lands at 0x1010 and
        // references `main` via REL32 at offset 4.
        let mut sections = SectionManager::new();
        let section = sections.add(make_section(vec![0; 16], 0x1010)).unwrap();
        let mut symbols = SymbolTable::new();
        let sym = symbols
            .insert(Symbol {
                name: "main".into(),
                value: 0x1000,
                size: 0,
                section_index: Some(0),
                sym_type: SymbolType::Func,
                binding: SymbolBinding::Global,
            })
            .unwrap();

        let mut engine = RelocationEngine::new();
        engine.add(LinkRelocation {
            section,
            offset: 4,
            reloc_type: RelocationType::Rel32,
            symbol: sym,
        });
        engine.process_all(&symbols, &mut sections).unwrap();
        let patched = &sections.get(section).data.as_ref().unwrap()[4..8];
        assert_eq!(patched, &0xFFFF_FFE8u32.to_le_bytes());
    }

    #[test]
    fn undefined_symbol_is_reported_but_does_not_abort_remaining_entries() {
        let mut sections = SectionManager::new();
        let section = sections.add(make_section(vec![0, 0, 0, 0, 0, 0, 0, 0], 0x1000)).unwrap();
        let mut symbols = SymbolTable::new();
        let missing = symbols
            .insert(Symbol {
                name: "missing".into(),
                value: 0,
                size: 0,
                section_index: None,
                sym_type: SymbolType::Func,
                binding: SymbolBinding::Global,
            })
            .unwrap();
        let present = symbols
            .insert(Symbol {
                name: "present".into(),
                value: 0x42,
                size: 0,
                section_index: Some(0),
                sym_type: SymbolType::Object,
                binding: SymbolBinding::Global,
            })
            .unwrap();

        let mut engine = RelocationEngine::new();
        engine.add(LinkRelocation {
            section,
            offset: 0,
            reloc_type: RelocationType::Abs32,
            symbol: missing,
        });
        engine.add(LinkRelocation {
            section,
            offset: 4,
            reloc_type: RelocationType::Abs32,
            symbol: present,
        });

        let result = engine.process_all(&symbols, &mut sections);
        assert!(matches!(result, Err(Error::SymbolNotFound { .. })));
        assert_eq!(
            &sections.get(section).data.as_ref().unwrap()[4..8],
            &0x42u32.to_le_bytes()
        );
    }

    #[test]
    fn abs16_overflow_is_detected() {
        let mut sections = SectionManager::new();
        let section = sections.add(make_section(vec![0, 0], 0x1000)).unwrap();
        let mut symbols = SymbolTable::new();
        let sym = symbols
            .insert(Symbol {
                name: "big".into(),
                value: 0x1_0000,
                size: 0,
                section_index: Some(0),
                sym_type: SymbolType::Object,
                binding: SymbolBinding::Global,
            })
            .unwrap();
        let mut engine = RelocationEngine::new();
        engine.add(LinkRelocation {
            section,
            offset: 0,
            reloc_type: RelocationType::Abs16,
            symbol: sym,
        });
        assert!(matches!(
            engine.process_all(&symbols, &mut sections),
            Err(Error::RelocOverflow { .. })
        ));
    }
}
