use super::DigitizerConfig;
use crate::error::{DigitizeError, Result};
use crate::types::LeadRegion;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OutputConfig {
    pub json_out: Option<PathBuf>,
    /// Writes the binarised input and line masks here when set.
    pub debug_dir: Option<PathBuf>,
}

/// Input of the `digitize` binary.
#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub regions: Vec<LeadRegion>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub digitizer: DigitizerConfig,
}

pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path).map_err(|source| DigitizeError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| DigitizeError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
