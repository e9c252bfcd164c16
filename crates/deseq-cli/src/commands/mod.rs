pub mod config;
pub mod info;
pub mod read;

use clap::ValueEnum;
use deseq_core::CameraVariant;

#[derive(Clone, Copy, ValueEnum)]
pub enum VariantArg {
    Auto,
    Single,
    Celeritas,
}

impl From<VariantArg> for CameraVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Auto => CameraVariant::Auto,
            VariantArg::Single => CameraVariant::SingleSensor,
            VariantArg::Celeritas => CameraVariant::Celeritas,
        }
    }
}
