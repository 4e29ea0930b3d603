//! C2 — symbol table: insertion, cross-input resolution, lookup.

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hasher};

use smof::{Symbol, SymbolBinding};

use crate::error::{Error, Result};

/// A 32-bit FNV-1a mix, matching the "simple FNV-like mix" the spec asks
/// for — not cryptographic, just cheap and well distributed for a few
/// thousand symbol names.
#[derive(Debug)]
pub struct FnvHasher(u32);

impl Default for FnvHasher {
    fn default() -> Self {
        FnvHasher(0x811c_9dc5)
    }
}

impl Hasher for FnvHasher {
    fn write(&mut self, bytes: &[u8]) {
        let mut hash = self.0;
        for &byte in bytes {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        self.0 = hash;
    }

    fn finish(&self) -> u64 {
        u64::from(self.0)
    }
}

/// [`HashMap`] `BuildHasher` using [`FnvHasher`].
pub type FnvBuildHasher = BuildHasherDefault<FnvHasher>;

/// Opaque reference to an entry in a [`SymbolTable`]. Stable for the
/// lifetime of the table; never reused after the entry it names changes
/// identity (merging never creates new handles, only updates in place).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolHandle(pub usize);

/// Owns every symbol seen across every input of a link.
///
/// GLOBAL/WEAK/EXPORT symbols sharing a name share a single entry and
/// handle, so every relocation referencing that name — regardless of
/// which input file it came from — points at the same resolved value
/// once layout runs. LOCAL symbols never share an entry: each occurrence
/// gets its own handle and plays no part in cross-input resolution.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<Symbol>,
    by_name: HashMap<String, SymbolHandle, FnvBuildHasher>,
}

impl SymbolTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol, applying the binding resolution rules immediately.
    ///
    /// A `LOCAL` symbol always gets a fresh handle. A non-local symbol
    /// shares a handle with any prior sighting of the same name; the two
    /// are merged per the rules below, returning an error only for rule 1
    /// (two GLOBAL/EXPORT definitions of the same name).
    pub fn insert(&mut self, symbol: Symbol) -> Result<SymbolHandle> {
        if symbol.binding == SymbolBinding::Local {
            let handle = SymbolHandle(self.entries.len());
            self.entries.push(symbol);
            return Ok(handle);
        }

        if let Some(&handle) = self.by_name.get(&symbol.name) {
            self.merge(handle, symbol)?;
            Ok(handle)
        } else {
            let handle = SymbolHandle(self.entries.len());
            self.by_name.insert(symbol.name.clone(), handle);
            self.entries.push(symbol);
            Ok(handle)
        }
    }

    fn merge(&mut self, handle: SymbolHandle, incoming: Symbol) -> Result<()> {
        let existing_is_def = self.entries[handle.0].section_index.is_some();
        let incoming_is_def = incoming.section_index.is_some();

        match (existing_is_def, incoming_is_def) {
            (false, true) => {
                // First definition seen for a name previously only referenced.
                self.entries[handle.0] = incoming;
            }
            (true, false) => {
                // A reference arriving after the definition changes nothing.
            }
            (false, false) => {
                // Two references to a name with no definition yet; nothing to merge.
            }
            (true, true) => {
                let existing_binding = self.entries[handle.0].binding;
                match (existing_binding, incoming.binding) {
                    (SymbolBinding::Weak, SymbolBinding::Global | SymbolBinding::Export) => {
                        self.entries[handle.0] = incoming;
                    }
                    (SymbolBinding::Global | SymbolBinding::Export, SymbolBinding::Weak) => {
                        // Global already won; discard the weak definition.
                    }
                    (SymbolBinding::Weak, SymbolBinding::Weak) => {
                        // First weak definition wins; discard the rest.
                    }
                    (SymbolBinding::Global | SymbolBinding::Export, SymbolBinding::Global | SymbolBinding::Export) => {
                        return Err(Error::DuplicateSymbol { name: incoming.name });
                    }
                    (SymbolBinding::Local, _) | (_, SymbolBinding::Local) => {
                        unreachable!("local symbols never enter by_name");
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a non-local symbol's handle by name.
    pub fn find_by_name(&self, name: &str) -> Option<SymbolHandle> {
        self.by_name.get(name).copied()
    }

    /// Resolve the table: every non-local symbol that is still undefined
    /// (no definition was ever merged in) is collected and returned as a
    /// failure. Rule 1's duplicate check already happened at `insert` time;
    /// this is the step-4 check for names with no definition anywhere.
    pub fn resolve_all(&self) -> std::result::Result<(), Vec<String>> {
        let unresolved: Vec<String> = self
            .entries
            .iter()
            .filter(|s| s.binding.is_global_scope() && s.section_index.is_none())
            .map(|s| s.name.clone())
            .collect();
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(unresolved)
        }
    }

    /// Borrow a symbol by handle.
    pub fn get(&self, handle: SymbolHandle) -> &Symbol {
        &self.entries[handle.0]
    }

    /// Mutably borrow a symbol by handle (layout uses this to add each
    /// section's assigned base address into every symbol it defines).
    pub fn get_mut(&mut self, handle: SymbolHandle) -> &mut Symbol {
        &mut self.entries[handle.0]
    }

    /// Number of entries, local and non-local combined.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate every entry alongside its handle, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolHandle, &Symbol)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolHandle(i), s))
    }

    /// Iterate entries with a given binding.
    pub fn by_binding(&self, binding: SymbolBinding) -> impl Iterator<Item = (SymbolHandle, &Symbol)> {
        self.iter().filter(move |(_, s)| s.binding == binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smof::SymbolType;

    fn sym(name: &str, binding: SymbolBinding, section: Option<u16>) -> Symbol {
        Symbol {
            name: name.to_string(),
            value: 0,
            size: 0,
            section_index: section,
            sym_type: SymbolType::Func,
            binding,
        }
    }

    #[test]
    fn two_global_definitions_are_a_duplicate() {
        let mut table = SymbolTable::new();
        table.insert(sym("foo", SymbolBinding::Global, Some(0))).unwrap();
        let err = table.insert(sym("foo", SymbolBinding::Global, Some(1)));
        assert!(matches!(err, Err(Error::DuplicateSymbol { .. })));
    }

    #[test]
    fn global_overrides_weak_regardless_of_order() {
        let mut table = SymbolTable::new();
        table.insert(sym("log", SymbolBinding::Weak, Some(0))).unwrap();
        let handle = table.insert(sym("log", SymbolBinding::Global, Some(1))).unwrap();
        assert_eq!(table.get(handle).binding, SymbolBinding::Global);
        assert_eq!(table.get(handle).section_index, Some(1));
    }

    #[test]
    fn weak_overriding_global_is_discarded() {
        let mut table = SymbolTable::new();
        table.insert(sym("log", SymbolBinding::Global, Some(1))).unwrap();
        let handle = table.insert(sym("log", SymbolBinding::Weak, Some(0))).unwrap();
        assert_eq!(table.get(handle).binding, SymbolBinding::Global);
        assert_eq!(table.get(handle).section_index, Some(1));
    }

    #[test]
    fn first_weak_wins_among_several() {
        let mut table = SymbolTable::new();
        table.insert(sym("opt", SymbolBinding::Weak, Some(0))).unwrap();
        let handle = table.insert(sym("opt", SymbolBinding::Weak, Some(1))).unwrap();
        assert_eq!(table.get(handle).section_index, Some(0));
    }

    #[test]
    fn locals_never_collide() {
        let mut table = SymbolTable::new();
        let a = table.insert(sym("tmp", SymbolBinding::Local, Some(0))).unwrap();
        let b = table.insert(sym("tmp", SymbolBinding::Local, Some(1))).unwrap();
        assert_ne!(a, b);
        assert!(table.find_by_name("tmp").is_none());
    }

    #[test]
    fn undefined_reference_adopts_later_definition() {
        let mut table = SymbolTable::new();
        table.insert(sym("main", SymbolBinding::Global, None)).unwrap();
        let handle = table.insert(sym("main", SymbolBinding::Global, Some(0))).unwrap();
        assert!(!table.get(handle).is_undefined());
    }

    #[test]
    fn resolve_all_reports_names_with_no_definition() {
        let mut table = SymbolTable::new();
        table.insert(sym("main", SymbolBinding::Global, Some(0))).unwrap();
        table.insert(sym("missing", SymbolBinding::Global, None)).unwrap();
        let result = table.resolve_all();
        assert_eq!(result, Err(vec!["missing".to_string()]));
    }
}
