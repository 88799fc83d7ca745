//! JSON configuration tree.
//!
//! Every section is optional in the file and falls back to its defaults.
pub mod run;

use crate::adaptive::AdaptiveOptions;
use crate::batch::BatchOptions;
use crate::error::{DigitizeError, Result};
use crate::fit::{FitOptions, OscillationOptions};
use crate::grid::{
    CalibrationOptions, FftOptions, IntersectionOptions, MultiScaleOptions, TilingOptions,
};
use crate::lines::LineFinderOptions;
use crate::quality::{GateOptions, QualityOptions};
use crate::signal::{ExtractionOptions, FilterOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use run::{load_run_config, OutputConfig, RunConfig};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitizerConfig {
    pub gates: GateOptions,
    pub finder: LineFinderOptions,
    pub fit: FitOptions,
    pub oscillation: OscillationOptions,
    pub intersections: IntersectionOptions,
    pub calibration: CalibrationOptions,
    pub multiscale: MultiScaleOptions,
    pub fft: FftOptions,
    pub adaptive: AdaptiveOptions,
    pub extraction: ExtractionOptions,
    pub filters: FilterOptions,
    pub quality: QualityOptions,
    pub tiling: TilingOptions,
    pub batch: BatchOptions,
}

impl DigitizerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| DigitizeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| DigitizeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = DigitizerConfig::from_json_str("{}").expect("parse");
        assert_eq!(cfg.fit.max_order, 5);
        assert_eq!(cfg.adaptive.good, 0.7);
        assert_eq!(cfg.extraction.sampling_rate, 500);
        assert_eq!(cfg.filters.notch_hz, vec![50.0, 60.0]);
        assert!(!cfg.tiling.multitile);
    }

    #[test]
    fn partial_sections_override_single_fields() {
        let cfg = DigitizerConfig::from_json_str(
            r#"{ "fit": { "max_order": 3 }, "tiling": { "multitile": true }, "filters": { "lowpass_hz": 40.0 } }"#,
        )
        .expect("parse");
        assert_eq!(cfg.fit.max_order, 3);
        assert_eq!(cfg.fit.min_points, 8);
        assert!(cfg.tiling.multitile);
        assert_eq!(cfg.tiling.tiles_x, 2);
        assert_eq!(cfg.filters.lowpass_hz, 40.0);
        assert_eq!(cfg.filters.highpass_hz, 0.5);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            DigitizerConfig::from_json_str("{ \"fit\": 3 }"),
            Err(DigitizeError::Serialize(_))
        ));
        let missing = Path::new("/nonexistent/digitizer.json");
        assert!(matches!(
            DigitizerConfig::from_json_file(missing),
            Err(DigitizeError::ConfigRead { .. })
        ));
    }
}
