use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rlcpp_lab_core::{logging, SourceTree};
use tracing::info;

/// Flatten the library sources and generate a single-header distribution.
#[derive(Parser, Debug)]
#[command(name = "single-header")]
struct Cli {
    /// Library source tree to bundle.
    #[arg(long, default_value = "rlcpp")]
    source: PathBuf,
    /// Folder receiving the flattened copy and the umbrella header.
    #[arg(long, default_value = "single_header/all_files")]
    dest: PathBuf,
    /// File name of the umbrella header inside `dest`.
    #[arg(long, default_value = "rlcpp.hpp")]
    name: String,
    #[arg(long, default_value = "__RLCPP_H__")]
    guard: String,
    /// Also write an amalgamated header with every file inlined.
    #[arg(long)]
    amalgamate: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut tree = SourceTree::scan(&cli.source)
        .with_context(|| format!("failed to scan {}", cli.source.display()))?;
    // A previous run's umbrella must not end up inside the new one.
    tree.exclude(&cli.name);
    info!(source = %tree.root().display(), files = tree.files().len(), "bundling");

    for file in tree.dependency_order() {
        println!("{}", file.name);
    }

    let written = tree
        .write_single_header(&cli.dest, &cli.name, &cli.guard, cli.amalgamate.as_deref())
        .with_context(|| format!("failed to bundle into {}", cli.dest.display()))?;
    for path in written {
        println!("wrote {}", path.display());
    }

    Ok(())
}
