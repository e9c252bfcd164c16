use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqError};
use crate::stack::NavigationShape;

/// Which camera pipeline to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraVariant {
    /// Dual-sensor when the file name carries `_Top`/`_Bottom`, otherwise single.
    #[default]
    Auto,
    SingleSensor,
    /// Dual-sensor camera writing split top/bottom segment files.
    Celeritas,
}

impl std::fmt::Display for CameraVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::SingleSensor => write!(f, "Single sensor"),
            Self::Celeritas => write!(f, "Celeritas"),
        }
    }
}

/// Options for one read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Leading dimensions to fold the frame axis into. Empty keeps one frame axis.
    pub navigation_shape: NavigationShape,
    /// Decode frames on demand instead of up front.
    pub lazy: bool,
    pub variant: CameraVariant,
    /// Fail instead of continuing when the dark reference is missing.
    pub require_dark: bool,
    /// Fail instead of continuing when the gain reference is missing.
    pub require_gain: bool,
}

impl ReadOptions {
    pub fn with_navigation_shape(mut self, dims: impl Into<Vec<usize>>) -> Self {
        self.navigation_shape = NavigationShape::new(dims);
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_variant(mut self, variant: CameraVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SeqError::Config(e.to_string()))
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SeqError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SeqError::Config(e.to_string()))
    }
}
