//! genja - declarative build-manifest generator.
//!
//! Reference driver around `genja-lib`: declares the bundled sample
//! project, resolves its configuration, and writes the generated manifest
//! to stdout or a file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use genja_lib::task::GenerateOptions;
use genja_lib::template::ResolveMode;
use genja_lib::writer::DEFAULT_WIDTH;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod sample;

/// Generate a build manifest for the bundled sample project
#[derive(Parser)]
#[command(name = "genja")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Write the manifest to this file instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Column width for line wrapping
  #[arg(long, default_value_t = DEFAULT_WIDTH)]
  width: usize,

  /// Substitute unresolved {cfg.*} references with the empty string
  #[arg(long)]
  lax: bool,

  /// Print the resolved configuration as JSON and exit
  #[arg(long)]
  dump_config: bool,
}

fn main() -> Result<()> {
  // Logs go to stderr; stdout carries the manifest.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();

  let registry = sample::registry();
  let mut config = registry.run();

  if cli.dump_config {
    let json = serde_json::to_string_pretty(&config).context("failed to serialize configuration")?;
    println!("{}", json);
    return Ok(());
  }

  let task = sample::task().context("failed to declare sample task")?;
  let options = GenerateOptions {
    width: cli.width,
    resolve: if cli.lax { ResolveMode::Lax } else { ResolveMode::Strict },
  };
  let manifest = task
    .generate_with(&mut config, options)
    .context("failed to generate manifest")?;

  match cli.output {
    Some(path) => {
      fs::write(&path, &manifest).with_context(|| format!("failed to write {}", path.display()))?;
      info!(path = %path.display(), bytes = manifest.len(), "manifest written");
    }
    None => print!("{}", manifest),
  }

  Ok(())
}
