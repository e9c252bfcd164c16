pub mod config;
pub mod consts;
pub mod decode;
pub mod error;
pub mod frame;
pub mod io;
pub mod reader;
pub mod stack;

pub use config::{CameraVariant, ReadOptions};
pub use error::{Result, SeqError};
pub use reader::{read, read_path, SequenceData, SequenceRead, SequenceSource};
pub use stack::{FrameSource, FrameStack, NavigationShape};
