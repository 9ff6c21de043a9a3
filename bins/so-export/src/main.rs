//! Offset exporter for ELF shared objects with DWARF debug info.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use offscope_core::{ClassExtractor, Document, ExtractOptions};
use offscope_dwarf::DwarfBackend;

#[derive(Parser)]
#[command(name = "so-export")]
#[command(about = "Extracts class layouts from a shared object")]
struct Cli {
    /// Newline-separated list of class names to extract
    #[arg(long, value_name = "PATH")]
    class_list: PathBuf,

    /// Path to the .so
    #[arg(long, value_name = "PATH")]
    so: PathBuf,

    /// Path to the output JSON
    #[arg(long, value_name = "PATH")]
    out: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage problems and --help both print and exit 1.
            if err.use_stderr() {
                println!("Error: {err}");
            } else {
                let _ = err.print();
            }
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        println!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let class_list = offscope_core::read_class_list(&cli.class_list)?;
    let backend = DwarfBackend::open(&cli.so)?;

    // DWARF preserves the string_t typedef, so the name heuristic stays off.
    let mut extractor = ClassExtractor::new(
        class_list,
        ExtractOptions {
            string_intern_heuristic: false,
        },
    );
    let classes = extractor.extract_all(&backend)?;
    let document = Document::from_classes(classes);

    std::fs::write(&cli.out, document.to_json()?)?;
    info!("wrote {}", cli.out.display());
    Ok(())
}
