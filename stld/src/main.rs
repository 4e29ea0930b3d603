//! `stld` — command-line linker for SMOF relocatable object files.

use std::process::ExitCode;

use stld::{LinkerContext, LinkerOptions, OutputType};

const USAGE: &str = "\
Usage: stld [options] <input...>

  -o FILE       output path (default a.out)
  -L DIR        library search path (reserved)
  -l NAME       library link (reserved)
  -e SYM        entry-point symbol override
  -b ADDR       base address (decimal, or 0x-prefixed hex)
  -B            binary-flat output
  -s            shared library output
  -S            static library output
  -O            optimize for size (reserved)
  -x            strip debug symbols
  -m[FILE]      generate map file, optional path
  -v            verbose
  -h            show this help
  -V            show version";

fn parse_integer(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn parse_args(args: &[String]) -> Result<LinkerOptions, String> {
    let mut builder = LinkerOptions::builder();
    let mut inputs = Vec::new();
    let mut output_path = "a.out".to_string();
    let mut output_type = OutputType::Executable;
    let mut entry_symbol = None;
    let mut base_address = 0u32;
    let mut strip_debug = false;
    let mut generate_map = false;
    let mut map_file = None;
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" => output_path = iter.next().ok_or("-o requires an argument")?.clone(),
            "-L" | "-l" => {
                iter.next().ok_or("library flag requires an argument")?;
            }
            "-e" => entry_symbol = Some(iter.next().ok_or("-e requires an argument")?.clone()),
            "-b" => {
                let raw = iter.next().ok_or("-b requires an argument")?;
                base_address = parse_integer(raw).ok_or_else(|| format!("invalid base address: {raw}"))?;
            }
            "-B" => output_type = OutputType::BinaryFlat,
            "-s" => output_type = OutputType::SharedLibrary,
            "-S" => output_type = OutputType::StaticLibrary,
            "-O" => {}
            "-x" => strip_debug = true,
            "-v" => verbose = true,
            "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "-V" => {
                println!("stld {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other if other.starts_with("-m") => {
                generate_map = true;
                if other.len() > 2 {
                    map_file = Some(other[2..].to_string());
                }
            }
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(format!("unrecognized option: {other}"));
            }
            path => inputs.push(path.to_string()),
        }
    }

    Ok(builder
        .inputs(inputs)
        .output_path(output_path)
        .output_type(output_type)
        .entry_symbol(entry_symbol)
        .base_address(base_address)
        .strip_debug(strip_debug)
        .generate_map(generate_map)
        .map_file(map_file)
        .verbose(verbose)
        .build())
}

fn run() -> Result<(), (u8, String)> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args).map_err(|e| (1, e))?;

    let context = LinkerContext::new(options);
    match context.link() {
        Ok(stats) => {
            log::info!(
                "linked {} input(s), {} section(s), {} symbol(s), {} relocation(s) resolved",
                stats.inputs_loaded,
                stats.sections,
                stats.symbols,
                stats.relocations_resolved
            );
            Ok(())
        }
        Err(e) => Err((2, e.to_string())),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err((code, message)) => {
            eprintln!("stld: {message}");
            ExitCode::from(code)
        }
    }
}
