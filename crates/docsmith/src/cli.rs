//! Command line front-end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;

use crate::app::output::{RenderedDocs, write_rendered};
use crate::app::pipeline::{self, Options};
use crate::infra::config::Config;
use crate::infra::resources::ResourceStore;

#[derive(Debug, Parser)]
#[command(
    name = "docsmith",
    author,
    version,
    about = "Extract and render documentation embedded in templates",
    long_about = None
)]
pub struct Cli {
    /// Entry templates to document
    #[arg(required = true, value_name = "ENTRY")]
    pub entries: Vec<String>,

    /// Add a library search path (searched before configured paths)
    #[arg(short = 'J', long = "jpath", value_name = "DIR")]
    pub jpath: Vec<PathBuf>,

    /// Output directory for rendered Markdown
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the raw documentation tree instead of rendering
    #[arg(long, conflicts_with = "dump")]
    pub raw: bool,

    /// Print the loaded package model instead of rendering
    #[arg(long, value_name = "FORMAT")]
    pub dump: Option<DumpFormat>,
}

/// Serialization used by `--dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Raw,
    Dump(DumpFormat),
    Render,
}

impl Cli {
    fn mode(&self) -> Mode {
        match (self.raw, self.dump) {
            (true, _) => Mode::Raw,
            (false, Some(format)) => Mode::Dump(format),
            (false, None) => Mode::Render,
        }
    }
}

/// Parse arguments and run.
pub fn run() -> Result<()> {
    execute(Cli::parse())
}

pub fn execute(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let resources = Arc::new(ResourceStore::bundled()?);
    let configured = Options::from_config(&config, resources);
    let search_paths: Vec<PathBuf> = cli
        .jpath
        .iter()
        .chain(
            configured
                .search_paths
                .iter()
                .filter(|path| !cli.jpath.contains(path)),
        )
        .cloned()
        .collect();
    let opts = configured.with_search_paths(search_paths);
    tracing::debug!(search_paths = ?opts.search_paths, entries = cli.entries.len(), "starting");

    let mode = cli.mode();
    let outcomes: Vec<Result<Outcome>> = cli
        .entries
        .par_iter()
        .map(|entry| {
            produce(entry, &opts, mode).with_context(|| format!("failed to document {entry}"))
        })
        .collect();

    let out_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory());
    let several = cli.entries.len() > 1;

    for (entry, outcome) in cli.entries.iter().zip(outcomes) {
        match outcome? {
            Outcome::Text(text) => print!("{text}"),
            Outcome::Docs(docs) => {
                let dir = if several {
                    out_dir.join(entry_stem(entry))
                } else {
                    out_dir.clone()
                };
                let written = write_rendered(&docs, &dir)?;
                println!("{entry}: wrote {} file(s) to {}", written.len(), dir.display());
            }
        }
    }
    Ok(())
}

enum Outcome {
    Text(String),
    Docs(RenderedDocs),
}

fn produce(entry: &str, opts: &Options, mode: Mode) -> Result<Outcome> {
    let outcome = match mode {
        Mode::Raw => {
            let mut raw = pipeline::extract(entry, opts)?;
            raw.push('\n');
            Outcome::Text(raw)
        }
        Mode::Dump(DumpFormat::Json) => {
            let package = pipeline::load(entry, opts)?;
            let mut text = serde_json::to_string_pretty(&package)?;
            text.push('\n');
            Outcome::Text(text)
        }
        Mode::Dump(DumpFormat::Yaml) => {
            let package = pipeline::load(entry, opts)?;
            Outcome::Text(serde_yaml::to_string(&package)?)
        }
        Mode::Render => Outcome::Docs(pipeline::render(entry, opts)?),
    };
    Ok(outcome)
}

fn entry_stem(entry: &str) -> String {
    Path::new(entry)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.to_owned())
}
