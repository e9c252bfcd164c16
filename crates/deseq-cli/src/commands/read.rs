use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use deseq_core::frame::Sample;
use deseq_core::{read_path, FrameStack, ReadOptions, SequenceData};
use indicatif::{ProgressBar, ProgressStyle};
use num_traits::ToPrimitive;
use tracing::debug;

use super::VariantArg;
use crate::summary::print_read_summary;

/// Frames decoded per progress step when scanning.
const SCAN_BATCH: usize = 64;

#[derive(Args)]
pub struct ReadArgs {
    /// Input .seq file (either half for split recordings)
    pub file: PathBuf,

    /// Navigation shape, e.g. `50,50`
    #[arg(long, value_delimiter = ',')]
    pub nav: Vec<usize>,

    /// Decode frames on demand
    #[arg(long)]
    pub lazy: bool,

    /// Camera variant
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Read options TOML file (command-line flags take precedence)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Decode every frame and report the value range
    #[arg(long)]
    pub scan: bool,
}

pub fn run(args: &ReadArgs) -> Result<()> {
    let mut options = match args.config {
        Some(ref path) => ReadOptions::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReadOptions::default(),
    };
    if !args.nav.is_empty() {
        options = options.with_navigation_shape(args.nav.clone());
    }
    if args.lazy {
        options = options.with_lazy(true);
    }
    if let Some(variant) = args.variant {
        options = options.with_variant(variant.into());
    }

    debug!(?options, "Resolved read options");
    let read = read_path(&args.file, &options)?;
    print_read_summary(&read);

    if args.scan {
        let (min, max) = match &read.data {
            SequenceData::U8(stack) => scan(stack)?,
            SequenceData::U16(stack) => scan(stack)?,
            SequenceData::U32(stack) => scan(stack)?,
        };
        println!("\nValue range: {} .. {}", min, max);
    }

    Ok(())
}

/// Walk the stack in batches and return the smallest and largest sample.
fn scan<T: Sample>(stack: &FrameStack<T>) -> Result<(u64, u64)> {
    let total = stack.frame_count();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Scanning frames");

    let mut min = u64::MAX;
    let mut max = 0u64;
    let mut start = 0;
    while start < total {
        let end = (start + SCAN_BATCH).min(total);
        let frames = stack.frames(start..end)?;
        for v in frames.iter().filter_map(|v| v.to_u64()) {
            min = min.min(v);
            max = max.max(v);
        }
        pb.set_position(end as u64);
        start = end;
    }
    pb.finish_with_message("Scan complete");

    if total == 0 {
        min = 0;
    }
    Ok((min, max))
}
