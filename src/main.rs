//! cvforge – headless driver for the resume engine.
//!
//! Usage:
//!   cvforge <command> [--store DIR] [--out DIR] [--font FILE] [--config FILE]
//!
//! The resume and layout settings are read from `--store` (default
//! `.cvforge`), one JSON file per key. Missing state falls back to the
//! sample resume.

use std::{env, path::PathBuf, process};

use cv_forge::export::{ExportFormat, ExportOutcome, NoFrames};
use cv_forge::pipeline::{EngineConfig, PreviewSession};
use cv_forge::store::{DocumentStore, FileStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Init,
    Pages,
    Png,
    Pdf,
    Print,
    Layout,
}

impl Command {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "init" => Some(Command::Init),
            "pages" => Some(Command::Pages),
            "png" => Some(Command::Png),
            "pdf" => Some(Command::Pdf),
            "print" => Some(Command::Print),
            "layout" => Some(Command::Layout),
            _ => None,
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut command: Option<Command> = None;
    let mut store_dir = PathBuf::from(".cvforge");
    let mut out_dir = PathBuf::from(".");
    let mut font: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--store" | "-s" => store_dir = PathBuf::from(flag_value(&mut iter, arg, &args[0])),
            "--out" | "-o" => out_dir = PathBuf::from(flag_value(&mut iter, arg, &args[0])),
            "--font" | "-f" => font = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0])))
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            name => match (command, Command::parse(name)) {
                (None, Some(c)) => command = Some(c),
                _ => {
                    eprintln!("Unexpected argument: {name}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
            },
        }
    }

    let command = match command {
        Some(c) => c,
        None => {
            eprintln!("Error: no command specified.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let mut config = match &config_path {
        Some(path) => EngineConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error reading config '{}': {e}", path.display());
            process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    if font.is_some() {
        config.font_path = font;
    }

    let storage = FileStorage::open(&store_dir).unwrap_or_else(|e| {
        eprintln!("Error opening store '{}': {e}", store_dir.display());
        process::exit(1);
    });
    let mut store = DocumentStore::load(storage);

    if command == Command::Init {
        if let Err(e) = store.save() {
            eprintln!("Error writing store: {e}");
            process::exit(1);
        }
        eprintln!("Initialised store '{}'", store_dir.display());
        return;
    }

    let fonts = config.load_fonts().unwrap_or_else(|e| {
        eprintln!("Error loading fonts: {e}");
        process::exit(1);
    });
    let doc = store.document().clone();
    let settings = *store.settings();

    let mut session = PreviewSession::new(config, fonts);
    if let Err(e) = session.refresh(&doc, &settings) {
        eprintln!("Error laying out resume: {e}");
        process::exit(1);
    }
    session.on_frame();

    let artifact = match command {
        Command::Pages => {
            let pages = session.page_count();
            println!("{pages}");
            return;
        }
        Command::Layout => {
            match session.print_layout(&doc).to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serialising print layout: {e}");
                    process::exit(1);
                }
            }
            return;
        }
        Command::Print => session.print(&doc),
        Command::Png | Command::Pdf => {
            let format = if command == Command::Png {
                ExportFormat::Png
            } else {
                ExportFormat::Pdf
            };
            match session.export(format, &doc, &mut NoFrames) {
                ExportOutcome::Written(artifact) => artifact,
                ExportOutcome::Skipped => process::exit(0),
                ExportOutcome::Failed(e) => {
                    eprintln!("Error generating {}: {e}", format.extension());
                    process::exit(1);
                }
            }
        }
        Command::Init => return,
    };

    match artifact.write_to(&out_dir) {
        Ok(path) => {
            let pages = session.page_count();
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{})",
                path.display(),
                artifact.bytes.len(),
                pages,
                if pages == 1 { "" } else { "s" }
            );
        }
        Err(e) => {
            eprintln!("Error writing '{}': {e}", artifact.file_name);
            process::exit(1);
        }
    }
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> &'a str {
    match iter.next() {
        Some(v) => v.as_str(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("cvforge – resume pagination and export (cv-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <command> [--store DIR] [--out DIR] [--font FILE] [--config FILE]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  init     Write the current (or sample) resume and settings to the store");
    eprintln!("  pages    Print the estimated A4 page count");
    eprintln!("  png      Export the resume as one continuous PNG");
    eprintln!("  pdf      Export the resume as an A4 PDF");
    eprintln!("  print    Write the print HTML document");
    eprintln!("  layout   Print the print pagination as JSON");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --store, -s    Directory holding resumeData.json and layoutSettings.json (default: .cvforge)");
    eprintln!("  --out, -o      Output directory for exports (default: current directory)");
    eprintln!("  --font, -f     TTF/OTF face used to draw text (default: placeholder bars)");
    eprintln!("  --config, -c   Engine config JSON (pageGapPx, rasterScale, fontPath, boldFontPath)");
    eprintln!("  --help         Print this message");
}
