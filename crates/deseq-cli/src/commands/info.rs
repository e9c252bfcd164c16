use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use deseq_core::io::header::FileHeader;
use deseq_core::io::sidecar::SidecarMetadata;
use deseq_core::SequenceSource;

use super::VariantArg;
use crate::summary::{print_header, print_sidecar};

#[derive(Args)]
pub struct InfoArgs {
    /// Input .seq file (either half for split recordings)
    pub file: PathBuf,

    /// Camera variant
    #[arg(long, value_enum, default_value = "auto")]
    pub variant: VariantArg,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    match SequenceSource::from_path(&args.file, args.variant.into())? {
        SequenceSource::Single(single) => {
            let header = FileHeader::read(&single.file)?;
            print_header(&single.file.display().to_string(), &header);
        }
        SequenceSource::Dual(dual) => {
            for pair in &dual.segments.pairs {
                print_header(&pair.top.display().to_string(), &FileHeader::read(&pair.top)?);
                print_header(
                    &pair.bottom.display().to_string(),
                    &FileHeader::read(&pair.bottom)?,
                );
            }
            print_sidecar(&SidecarMetadata::read(&dual.xml)?);
        }
    }
    Ok(())
}
