//! Offline asset converter.
//!
//! Mirrors a game data tree into an output tree the handheld renderer can
//! load directly: images are merged with their GIF masks, halved, split into
//! bands and given a size sidecar; every other file is copied as is. Load
//! lists are written for the converted tree afterwards.

mod image_ops;
mod lists;
mod tree;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use xtech_render::config::RenderConfig;
use xtech_render::logging::{init_logging, LoggingConfig};

use crate::tree::{ConvertOptions, Converter};

#[derive(Parser, Debug)]
#[command(name = "xtech-convert", about = "Convert game graphics for the handheld renderer")]
struct Cli {
    /// Game data directory to convert.
    input: PathBuf,

    /// Destination directory (created if missing).
    output: PathBuf,

    /// Image file names converted at full scale (repeatable).
    #[arg(long = "keep-scale", value_name = "NAME")]
    keep_scale: Vec<String>,

    /// Convert files whose output already exists.
    #[arg(long)]
    redo: bool,

    /// Skip writing graphics.list files.
    #[arg(long)]
    no_lists: bool,

    /// Log filter (env_logger syntax), overrides RUST_LOG.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        timestamps: false,
        ..Default::default()
    });

    if !cli.input.is_dir() {
        bail!("{} is not a directory", cli.input.display());
    }

    let opts = ConvertOptions {
        keep_scale: cli.keep_scale.into_iter().collect::<HashSet<_>>(),
        redo: cli.redo,
        band_rows: RenderConfig::handheld().band_rows as u32,
    };
    let summary = Converter::new(&cli.input, &cli.output, &opts).run()?;
    log::info!(
        "converted {} image(s), copied {} file(s), skipped {}, failed {}",
        summary.converted,
        summary.copied,
        summary.skipped,
        summary.failed
    );

    if !cli.no_lists {
        let lists = lists::write_load_lists(&cli.output)?;
        log::info!("wrote {lists} load list(s)");
    }

    if summary.failed > 0 {
        bail!("{} image(s) failed to convert", summary.failed);
    }
    Ok(())
}
