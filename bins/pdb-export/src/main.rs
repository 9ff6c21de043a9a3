//! Offset exporter for Microsoft PDB files.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use offscope_core::{ClassExtractor, Document, ExtractOptions};
use offscope_pdb::PdbBackend;

#[derive(Parser)]
#[command(name = "pdb-export")]
#[command(about = "Extracts class layouts from a PDB")]
struct Cli {
    /// Newline-separated list of class names to extract
    #[arg(long, value_name = "PATH")]
    class_list: PathBuf,

    /// Path to the PDB
    #[arg(long, value_name = "PATH")]
    pdb: PathBuf,

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
    let backend = PdbBackend::open(&cli.pdb)?;

    // PDB type info erases the string_t typedef; recover interned strings
    // from the member naming convention instead.
    let mut extractor = ClassExtractor::new(
        class_list,
        ExtractOptions {
            string_intern_heuristic: true,
        },
    );
    let classes = extractor.extract_all(&backend)?;
    let document = Document::from_classes(classes);

    std::fs::write(&cli.out, document.to_json()?)?;
    info!("wrote {}", cli.out.display());
    Ok(())
}
