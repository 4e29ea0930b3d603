//! Textual map-file writer, per `spec.md` §6's `# Sections` / `# Symbols`
//! / `# Memory` layout.

use std::fmt::Write as _;

use smof::{Symbol, SymbolBinding};

use crate::section_manager::SectionManager;
use crate::symbol_table::SymbolTable;

/// Render a map file describing every section and every non-local symbol
/// in the linked output.
pub fn render(sections: &SectionManager, symbols: &SymbolTable) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Sections");
    for (_, section) in sections.iter() {
        let _ = writeln!(
            out,
            "{:<16} {:#010x} {:#x}",
            section.name, section.virtual_addr, section.size
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "# Symbols");
    for (_, symbol) in symbols.iter() {
        if symbol.binding == SymbolBinding::Local {
            continue;
        }
        write_symbol_line(&mut out, symbol);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "# Memory");
    let (low, high) = address_range(sections);
    let _ = writeln!(out, "{:<16} {:#010x} {:#x}", "total", low, high.saturating_sub(low));

    out
}

fn write_symbol_line(out: &mut String, symbol: &Symbol) {
    let binding = match symbol.binding {
        SymbolBinding::Local => "LOCAL",
        SymbolBinding::Global => "GLOBAL",
        SymbolBinding::Weak => "WEAK",
        SymbolBinding::Export => "EXPORT",
    };
    let _ = writeln!(
        out,
        "{:<24} {:#010x} {:<8} {:?}",
        symbol.name, symbol.value, binding, symbol.sym_type
    );
}

fn address_range(sections: &SectionManager) -> (u32, u32) {
    let mut low = u32::MAX;
    let mut high = 0u32;
    for (_, section) in sections.iter() {
        low = low.min(section.virtual_addr);
        high = high.max(section.virtual_addr + section.size);
    }
    if low > high {
        low = 0;
    }
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smof::{Section, SectionFlags, Symbol, SymbolType};

    fn text_section() -> Section {
        Section {
            name: ".text".to_string(),
            virtual_addr: 0x1000,
            size: 0x10,
            file_offset: 0,
            flags: SectionFlags::EXECUTABLE,
            alignment: 4,
            data: Some(vec![0u8; 0x10]),
        }
    }

    #[test]
    fn renders_sections_and_non_local_symbols_only() {
        let mut sections = SectionManager::new();
        sections.add(text_section()).unwrap();

        let mut symbols = SymbolTable::new();
        symbols
            .insert(Symbol {
                name: "main".to_string(),
                value: 0x1000,
                size: 0,
                section_index: Some(0),
                sym_type: SymbolType::Func,
                binding: SymbolBinding::Global,
            })
            .unwrap();
        symbols
            .insert(Symbol {
                name: ".Ltmp0".to_string(),
                value: 0x1004,
                size: 0,
                section_index: Some(0),
                sym_type: SymbolType::NoType,
                binding: SymbolBinding::Local,
            })
            .unwrap();

        let rendered = render(&sections, &symbols);
        assert!(rendered.contains("# Sections"));
        assert!(rendered.contains(".text"));
        assert!(rendered.contains("# Symbols"));
        assert!(rendered.contains("main"));
        assert!(!rendered.contains(".Ltmp0"));
        assert!(rendered.contains("# Memory"));
    }
}
