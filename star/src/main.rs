//! `star` — command-line archiver for STAR indexed archives of SMOF objects.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use star::{ArchiveOptions, CompressionAlgorithm, StarArchive};

const USAGE: &str = "\
Usage: star -c|-x|-u|-t|-d -f ARCHIVE [options] [file|member...]

Modes (exactly one required):
  -c            create a new archive
  -x            extract members
  -u            update (add members to an existing archive)
  -t            list members
  -d            delete members

Options:
  -f ARCHIVE    archive path (required)
  -C DIR        chdir before the operation
  -z ALG        compression: none|lz4|zlib|lzma (default none)
  -L N          compression level 0-9 (default 6)
  -i            build a symbol index
  -s            keep the member table sorted
  -v            verbose
  -F            force overwrite
  -h            show this help
  -V            show version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Extract,
    Update,
    List,
    Delete,
}

struct Args {
    mode: Mode,
    archive_path: String,
    chdir: Option<String>,
    compression: CompressionAlgorithm,
    compression_level: u8,
    create_index: bool,
    sort_members: bool,
    verbose: bool,
    force: bool,
    operands: Vec<String>,
}

fn parse_compression(text: &str) -> Result<CompressionAlgorithm, String> {
    match text {
        "none" => Ok(CompressionAlgorithm::None),
        "lz4" => Ok(CompressionAlgorithm::Lz4),
        "zlib" => Ok(CompressionAlgorithm::Zlib),
        "lzma" => Ok(CompressionAlgorithm::Lzma),
        other => Err(format!("unknown compression algorithm: {other}")),
    }
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut mode: Option<Mode> = None;
    let mut archive_path: Option<String> = None;
    let mut chdir = None;
    let mut compression = CompressionAlgorithm::None;
    let mut compression_level = 6u8;
    let mut create_index = false;
    let mut sort_members = false;
    let mut verbose = false;
    let mut force = false;
    let mut operands = Vec::new();

    fn set_mode(m: Mode, mode: &mut Option<Mode>) -> Result<(), String> {
        if mode.is_some() {
            return Err("only one of -c/-x/-u/-t/-d may be given".into());
        }
        *mode = Some(m);
        Ok(())
    }

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" => set_mode(Mode::Create, &mut mode)?,
            "-x" => set_mode(Mode::Extract, &mut mode)?,
            "-u" => set_mode(Mode::Update, &mut mode)?,
            "-t" => set_mode(Mode::List, &mut mode)?,
            "-d" => set_mode(Mode::Delete, &mut mode)?,
            "-f" => archive_path = Some(iter.next().ok_or("-f requires an argument")?.clone()),
            "-C" => chdir = Some(iter.next().ok_or("-C requires an argument")?.clone()),
            "-z" => {
                let raw = iter.next().ok_or("-z requires an argument")?;
                compression = parse_compression(raw)?;
            }
            "-L" => {
                let raw = iter.next().ok_or("-L requires an argument")?;
                compression_level = raw.parse().map_err(|_| format!("invalid compression level: {raw}"))?;
            }
            "-i" => create_index = true,
            "-s" => sort_members = true,
            "-v" => verbose = true,
            "-F" => force = true,
            "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "-V" => {
                println!("star {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(format!("unrecognized option: {other}"));
            }
            path => operands.push(path.to_string()),
        }
    }

    Ok(Args {
        mode: mode.ok_or("exactly one of -c/-x/-u/-t/-d is required")?,
        archive_path: archive_path.ok_or("-f ARCHIVE is required")?,
        chdir,
        compression,
        compression_level,
        create_index,
        sort_members,
        verbose,
        force,
        operands,
    })
}

fn options_from(args: &Args) -> ArchiveOptions {
    ArchiveOptions::builder()
        .compression(args.compression)
        .compression_level(args.compression_level)
        .create_index(args.create_index)
        .sort_members(args.sort_members)
        .verbose(args.verbose)
        .force(args.force)
        .build()
}

fn now_unix() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn run_create(args: &Args) -> star::Result<()> {
    if !args.force && Path::new(&args.archive_path).exists() {
        return Err(star::Error::ArchiveCorrupt {
            reason: format!("{} already exists (use -F to overwrite)", args.archive_path),
        });
    }
    let mut archive = StarArchive::create(options_from(args));
    for path in &args.operands {
        let name = member_name(path);
        archive.add_member_from_path(&name, Path::new(path))?;
        log::info!("added `{name}`");
    }
    if args.create_index {
        archive.build_symbol_index()?;
    }
    let bytes = archive.finalize(now_unix())?;
    std::fs::write(&args.archive_path, bytes)?;
    Ok(())
}

fn run_update(args: &Args) -> star::Result<()> {
    let bytes = std::fs::read(&args.archive_path)?;
    let mut archive = StarArchive::open(&bytes, options_from(args))?;
    for path in &args.operands {
        let name = member_name(path);
        archive.add_member_from_path(&name, Path::new(path))?;
        log::info!("added `{name}`");
    }
    if args.create_index {
        archive.build_symbol_index()?;
    }
    let bytes = archive.finalize(now_unix())?;
    std::fs::write(&args.archive_path, bytes)?;
    Ok(())
}

fn run_list(args: &Args) -> star::Result<()> {
    let bytes = std::fs::read(&args.archive_path)?;
    let archive = StarArchive::open(&bytes, options_from(args))?;
    for name in archive.iter() {
        println!("{name}");
    }
    Ok(())
}

fn run_extract(args: &Args) -> star::Result<()> {
    let bytes = std::fs::read(&args.archive_path)?;
    let archive = StarArchive::open(&bytes, options_from(args))?;
    let names: Vec<String> = if args.operands.is_empty() {
        archive.iter().map(str::to_string).collect()
    } else {
        args.operands.clone()
    };
    for name in names {
        let data = archive.extract(&name)?;
        std::fs::write(&name, data)?;
        log::info!("extracted `{name}`");
    }
    Ok(())
}

fn run_delete(args: &Args) -> star::Result<()> {
    let bytes = std::fs::read(&args.archive_path)?;
    let mut archive = StarArchive::open(&bytes, options_from(args))?;
    for name in &args.operands {
        archive.remove(name)?;
        log::info!("deleted `{name}`");
    }
    let bytes = archive.finalize(now_unix())?;
    std::fs::write(&args.archive_path, bytes)?;
    Ok(())
}

fn member_name(path: &str) -> String {
    PathBuf::from(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn run() -> Result<(), (u8, String)> {
    env_logger::init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw).map_err(|e| (1, e))?;

    if let Some(dir) = &args.chdir {
        std::env::set_current_dir(dir).map_err(|e| (2, format!("cannot chdir to {dir}: {e}")))?;
    }

    let result = match args.mode {
        Mode::Create => run_create(&args),
        Mode::Update => run_update(&args),
        Mode::List => run_list(&args),
        Mode::Extract => run_extract(&args),
        Mode::Delete => run_delete(&args),
    };

    result.map_err(|e| (2, e.to_string()))
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err((code, message)) => {
            eprintln!("star: {message}");
            ExitCode::from(code)
        }
    }
}
