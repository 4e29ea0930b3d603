//! C5 — linker driver: orchestrates C1–C4 through the Load, Resolve,
//! Layout, Relocate, and Emit phases.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};

use log::info;

use smof::{Endian, SectionFlags, SmofFile, SmofFlags, Symbol, SymbolBinding, SymbolType};

use crate::error::{Error, Result};
use crate::map;
use crate::options::{LinkerOptions, OutputType};
use crate::relocation::{LinkRelocation, RelocationEngine};
use crate::section_manager::SectionManager;
use crate::symbol_table::{SymbolHandle, SymbolTable};

/// Phases reported through the progress callback, one per `spec.md` §4.5 step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading and validating inputs, collecting sections/symbols/relocations.
    Load,
    /// Cross-input symbol resolution.
    Resolve,
    /// Section address assignment.
    Layout,
    /// Relocation patching.
    Relocate,
    /// Output serialization.
    Emit,
}

/// Summary statistics returned after a successful link.
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    /// Number of input files loaded.
    pub inputs_loaded: usize,
    /// Number of distinct sections in the output.
    pub sections: usize,
    /// Number of symbol table entries (local and non-local).
    pub symbols: usize,
    /// Number of relocations patched successfully.
    pub relocations_resolved: usize,
    /// Number of relocations that failed.
    pub relocations_failed: usize,
    /// Size in bytes of the primary output file.
    pub output_bytes: usize,
}

/// Owns the full state of one link: accumulated sections, symbols, and
/// relocations, plus the options bundle that drives emission. Produces one
/// output and is then discarded, per `spec.md` §3's entity-lifecycle note.
pub struct LinkerContext {
    options: LinkerOptions,
    sections: SectionManager,
    symbols: SymbolTable,
    relocations: RelocationEngine,
    progress: Option<Box<dyn FnMut(Phase, u8)>>,
}

impl LinkerContext {
    /// Start a new, empty link with the given options.
    pub fn new(options: LinkerOptions) -> Self {
        Self {
            options,
            sections: SectionManager::new(),
            symbols: SymbolTable::new(),
            relocations: RelocationEngine::new(),
            progress: None,
        }
    }

    /// Attach a progress-reporting callback, invoked at phase boundaries
    /// with a percentage. The driver has no concrete UI of its own; this
    /// is the seam a caller (the CLI, or an embedder) hooks into.
    pub fn with_progress(mut self, cb: impl FnMut(Phase, u8) + 'static) -> Self {
        self.progress = Some(Box::new(cb));
        self
    }

    fn report(&mut self, phase: Phase, percent: u8) {
        if let Some(cb) = self.progress.as_mut() {
            cb(phase, percent);
        }
        if self.options.verbose {
            info!("{phase:?}: {percent}%");
        }
    }

    /// Run the full Load → Resolve → Layout → Relocate → Emit pipeline.
    pub fn link(mut self) -> Result<LinkStats> {
        if self.options.inputs.is_empty() {
            return Err(Error::NoInputFiles);
        }

        self.load()?;
        self.report(Phase::Load, 100);

        self.resolve()?;
        self.report(Phase::Resolve, 100);

        self.layout();
        self.report(Phase::Layout, 100);

        self.relocate()?;
        self.report(Phase::Relocate, 100);

        let output_bytes = self.emit()?;
        self.report(Phase::Emit, 100);

        let (resolved, failed) = self.relocations.counts();
        Ok(LinkStats {
            inputs_loaded: self.options.inputs.len(),
            sections: self.sections.len(),
            symbols: self.symbols.len(),
            relocations_resolved: resolved,
            relocations_failed: failed,
            output_bytes,
        })
    }

    fn load(&mut self) -> Result<()> {
        let inputs = self.options.inputs.clone();
        let total = inputs.len();

        for (index, path) in inputs.iter().enumerate() {
            let bytes = fs::read(path)?;
            let file = SmofFile::read(&bytes).map_err(|source| Error::Smof {
                path: path.clone(),
                source,
            })?;
            file.validate().map_err(|source| Error::Smof {
                path: path.clone(),
                source,
            })?;

            let mut section_map = Vec::with_capacity(file.sections.len());
            for section in &file.sections {
                let mut section = section.clone();
                if self.options.position_independent {
                    section.flags |= SectionFlags::POSITION_INDEP;
                }
                section_map.push(self.sections.add(section)?);
            }

            let mut symbol_map: Vec<SymbolHandle> = Vec::with_capacity(file.symbols.len());
            for symbol in &file.symbols {
                let mut symbol = symbol.clone();
                if let Some(local_index) = symbol.section_index {
                    symbol.section_index = Some(section_map[local_index as usize].0 as u16);
                }
                symbol_map.push(self.symbols.insert(symbol)?);
            }

            for reloc in &file.relocations {
                self.relocations.add(LinkRelocation {
                    section: section_map[reloc.section_index as usize],
                    offset: reloc.offset,
                    reloc_type: reloc.reloc_type,
                    symbol: symbol_map[reloc.symbol_index as usize],
                });
            }

            self.report(Phase::Load, (100 * (index + 1) / total) as u8);
        }
        Ok(())
    }

    fn resolve(&mut self) -> Result<()> {
        self.symbols
            .resolve_all()
            .map_err(|names| Error::SymbolNotFound { names })
    }

    fn layout(&mut self) {
        if let Some(handle) = self.sections.first_in_layout_order() {
            let floor = self.options.page_size.max(1);
            let section = self.sections.get_mut(handle);
            section.alignment = section.alignment.max(floor);
        }

        let mapping = self.sections.calculate_layout(self.options.base_address);
        self.relocations.remap_section_handles(&mapping);

        let old_section_indices: Vec<(SymbolHandle, Option<u16>)> = self
            .symbols
            .iter()
            .map(|(h, s)| (h, s.section_index))
            .collect();
        for (handle, old_index) in old_section_indices {
            let Some(old_index) = old_index else { continue };
            let new_handle = mapping[old_index as usize];
            let base = self.sections.get(new_handle).virtual_addr;
            let symbol = self.symbols.get_mut(handle);
            symbol.section_index = Some(new_handle.0 as u16);
            symbol.value += base;
        }
    }

    fn relocate(&mut self) -> Result<()> {
        self.relocations.process_all(&self.symbols, &mut self.sections)
    }

    fn entry_point(&self) -> u32 {
        if self.options.entry_point != 0 {
            return self.options.entry_point;
        }
        let name = self.options.entry_symbol.as_deref().unwrap_or("_start");
        self.symbols
            .find_by_name(name)
            .map(|h| self.symbols.get(h).value)
            .unwrap_or(0)
    }

    fn emit(&mut self) -> Result<usize> {
        let result = match self.options.output_type {
            OutputType::BinaryFlat => self.emit_binary_flat(),
            _ => self.emit_smof(),
        };

        let size = match result {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&self.options.output_path);
                return Err(e);
            }
        };

        if self.options.generate_map {
            let map_path = self
                .options
                .map_file
                .clone()
                .unwrap_or_else(|| format!("{}.map", self.options.output_path));
            fs::write(map_path, map::render(&self.sections, &self.symbols))?;
        }

        Ok(size)
    }

    fn emit_smof(&mut self) -> Result<usize> {
        let mut flags = SmofFlags::empty();
        match self.options.output_type {
            OutputType::Executable => flags |= SmofFlags::EXECUTABLE,
            OutputType::SharedLibrary => flags |= SmofFlags::SHARED_LIB,
            OutputType::StaticLibrary => flags |= SmofFlags::STATIC,
            OutputType::Object | OutputType::BinaryFlat => {}
        }
        if self.options.position_independent {
            flags |= SmofFlags::POSITION_INDEP;
        }

        let strip_debug = self.options.strip_debug;
        let mut symbols: Vec<Symbol> = self
            .symbols
            .iter()
            .map(|(_, s)| s.clone())
            .filter(|s| !(strip_debug && s.binding == SymbolBinding::Local && s.sym_type == SymbolType::File))
            .collect();
        symbols.sort_by(|a, b| a.name.cmp(&b.name));

        let entry_point = self.entry_point();
        let file = SmofFile {
            version: smof::VERSION_CURRENT,
            flags,
            entry_point,
            sections: self.sections.iter().map(|(_, s)| s.clone()).collect(),
            symbols,
            relocations: Vec::new(),
            imports: Vec::new(),
        };
        let bytes = file.write(Endian::host()).map_err(|source| Error::Smof {
            path: self.options.output_path.clone(),
            source,
        })?;
        fs::write(&self.options.output_path, &bytes)?;
        Ok(bytes.len())
    }

    /// Raw concatenated section payloads at `options.base_address`. Gaps are
    /// materialized with `fill_value` when `fill_gaps` is set; otherwise the
    /// file is written with seeks so unwritten regions become holes on
    /// filesystems that support sparse files.
    fn emit_binary_flat(&self) -> Result<usize> {
        let base = self.options.base_address;
        let mut sections: Vec<_> = self.sections.iter().map(|(_, s)| s).collect();
        sections.sort_by_key(|s| s.virtual_addr);

        let end = sections.last().map(|s| s.virtual_addr + s.size).unwrap_or(base);
        let total_len = end.saturating_sub(base) as usize;

        let mut file = File::create(&self.options.output_path)?;

        if self.options.fill_gaps {
            let mut buf = vec![self.options.fill_value; total_len];
            for section in &sections {
                if let Some(data) = &section.data {
                    let start = (section.virtual_addr - base) as usize;
                    buf[start..start + data.len()].copy_from_slice(data);
                }
            }
            file.write_all(&buf)?;
        } else {
            for section in &sections {
                if let Some(data) = &section.data {
                    let start = (section.virtual_addr - base) as u64;
                    file.seek(SeekFrom::Start(start))?;
                    file.write_all(data)?;
                }
            }
            file.set_len(total_len as u64)?;
        }

        Ok(total_len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use smof::{Endian, Section, SectionFlags, SmofFile, Symbol, SymbolBinding, SymbolType};

    use super::*;

    /// A scratch path under the platform temp directory, unique per call so
    /// parallel tests never collide.
    fn scratch_path(label: &str) -> String {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("stld-driver-test-{}-{label}-{n}", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn empty_input_list_is_rejected() {
        let options = LinkerOptions::builder().build();
        let result = LinkerContext::new(options).link();
        assert!(matches!(result, Err(Error::NoInputFiles)));
    }

    /// Scenario 2: one input with a single four-byte `.text` section,
    /// linked to a raw binary at `0x1000`. The output is exactly those four
    /// bytes — no header, no padding.
    #[test]
    fn single_object_binary_flat_matches_scenario_2() {
        let input_path = scratch_path("in.o");
        let output_path = scratch_path("out.bin");

        let mut input = SmofFile::default();
        input.sections.push(Section {
            name: ".text".into(),
            virtual_addr: 0,
            size: 4,
            file_offset: 1,
            flags: SectionFlags::EXECUTABLE | SectionFlags::READABLE,
            alignment: 1,
            data: Some(vec![0x90, 0x90, 0x90, 0xC3]),
        });
        std::fs::write(&input_path, input.write(Endian::host()).unwrap()).unwrap();

        let options = LinkerOptions::builder()
            .inputs(vec![input_path.clone()])
            .output_path(output_path.clone())
            .output_type(OutputType::BinaryFlat)
            .base_address(0x1000)
            .entry_point(0x1000)
            .build();

        let stats = LinkerContext::new(options).link().unwrap();
        assert_eq!(stats.output_bytes, 4);

        let bytes = std::fs::read(&output_path).unwrap();
        assert_eq!(bytes, vec![0x90, 0x90, 0x90, 0xC3]);

        let _ = std::fs::remove_file(&input_path);
        let _ = std::fs::remove_file(&output_path);
    }

    /// The first section added (insertion order, from the first input file)
    /// is `.data`, but `.text` from the second input file sorts ahead of it
    /// once `calculate_layout` runs. `page_size` must floor the alignment of
    /// whichever section actually lands first in the output, not whichever
    /// happened to be inserted first.
    #[test]
    fn page_size_floor_applies_after_category_sort_not_insertion_order() {
        let path_data = scratch_path("data.o");
        let path_text = scratch_path("text.o");

        let mut data_file = SmofFile::default();
        data_file.sections.push(Section {
            name: ".data".into(),
            virtual_addr: 0,
            size: 4,
            file_offset: 1,
            flags: SectionFlags::WRITABLE | SectionFlags::READABLE,
            alignment: 1,
            data: Some(vec![0; 4]),
        });
        std::fs::write(&path_data, data_file.write(Endian::host()).unwrap()).unwrap();

        let mut text_file = SmofFile::default();
        text_file.sections.push(Section {
            name: ".text".into(),
            virtual_addr: 0,
            size: 4,
            file_offset: 1,
            flags: SectionFlags::EXECUTABLE | SectionFlags::READABLE,
            alignment: 1,
            data: Some(vec![0x90; 4]),
        });
        std::fs::write(&path_text, text_file.write(Endian::host()).unwrap()).unwrap();

        let options = LinkerOptions::builder()
            .inputs(vec![path_data.clone(), path_text.clone()])
            .base_address(0x1000)
            .page_size(0x1000)
            .build();

        let mut ctx = LinkerContext::new(options);
        ctx.load().unwrap();
        ctx.resolve().unwrap();
        ctx.layout();

        let text_handle = ctx.sections.find_by_name(".text").unwrap();
        let text_section = ctx.sections.get(text_handle);
        assert_eq!(text_section.alignment, 0x1000);
        assert_eq!(text_section.virtual_addr % 0x1000, 0);

        let _ = std::fs::remove_file(&path_data);
        let _ = std::fs::remove_file(&path_text);
    }

    /// Two inputs, one global symbol defined in each of them — the
    /// duplicate must be reported before any output is written.
    #[test]
    fn duplicate_global_across_inputs_aborts_before_emit_matches_scenario_4() {
        let path_a = scratch_path("a.o");
        let path_b = scratch_path("b.o");
        let output_path = scratch_path("out.o");

        for path in [&path_a, &path_b] {
            let mut file = SmofFile::default();
            file.sections.push(Section {
                name: ".text".into(),
                virtual_addr: 0,
                size: 4,
                file_offset: 1,
                flags: SectionFlags::EXECUTABLE | SectionFlags::READABLE,
                alignment: 4,
                data: Some(vec![0; 4]),
            });
            file.symbols.push(Symbol {
                name: "foo".into(),
                value: 0,
                size: 0,
                section_index: Some(0),
                sym_type: SymbolType::Func,
                binding: SymbolBinding::Global,
            });
            std::fs::write(path, file.write(Endian::host()).unwrap()).unwrap();
        }

        let options = LinkerOptions::builder()
            .inputs(vec![path_a.clone(), path_b.clone()])
            .output_path(output_path.clone())
            .build();

        let result = LinkerContext::new(options).link();
        assert!(matches!(result, Err(Error::DuplicateSymbol { .. })));
        assert!(!std::path::Path::new(&output_path).exists());

        let _ = std::fs::remove_file(&path_a);
        let _ = std::fs::remove_file(&path_b);
    }
}
