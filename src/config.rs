//! Config module.
//! Manages I/O for the calibration record (board bounds) and the optional tool config
//! (paths, recognition thresholds, dispatch parameters).
//! Uses serde_json for both files; a missing tool config falls back to defaults.

use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "fenshot.json";

/// Board rectangle inside a captured window image, in window pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Calibration {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Side length of one square, `floor(min(width, height) / 8)`.
    pub fn square_size(&self) -> u32 {
        (self.width().min(self.height()).max(0) / 8) as u32
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.width() <= 0 || self.height() <= 0 {
            return Err(format!(
                "degenerate rectangle ({}, {}) - ({}, {})",
                self.left, self.top, self.right, self.bottom
            ));
        }
        if self.square_size() == 0 {
            return Err(format!(
                "rectangle {}x{} is too small for an 8x8 board",
                self.width(),
                self.height()
            ));
        }
        Ok(())
    }
}

/// Persists the calibration record at a fixed path.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites any existing record.
    pub fn save(&self, calibration: &Calibration) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(calibration)
            .map_err(|e| BoardError::InvalidConfig(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn load(&self) -> Result<Calibration> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            BoardError::NotCalibrated(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let calibration: Calibration = serde_json::from_str(&text).map_err(|e| {
            BoardError::NotCalibrated(format!("malformed {}: {}", self.path.display(), e))
        })?;
        calibration.validate().map_err(BoardError::NotCalibrated)?;
        Ok(calibration)
    }
}

/// Named thresholds for edge filtering and template matching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionParams {
    /// Lower Canny gradient threshold.
    pub canny_low: f32,
    /// Upper Canny gradient threshold.
    pub canny_high: f32,
    /// Gaussian sigma applied to squares before edge detection (0.8 matches a 3x3 kernel).
    pub blur_sigma: f32,
    /// Squares with a smaller fraction of edge pixels are empty without correlating. Range [0, 1].
    pub min_edge_density: f32,
    /// Minimum ZNCC score for a template match. Range [-1, 1].
    pub match_threshold: f32,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        Self {
            canny_low: 40.0,
            canny_high: 120.0,
            blur_sigma: 0.8,
            min_edge_density: 0.02,
            match_threshold: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub depth: u32,
    pub multipv: u32,
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            depth: 16,
            multipv: 3,
            timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calibration_path: PathBuf,
    pub templates_dir: PathBuf,
    pub recognition: RecognitionParams,
    pub dispatch: DispatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calibration_path: PathBuf::from("calibration.json"),
            templates_dir: PathBuf::from("templates"),
            recognition: RecognitionParams::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Config {
    /// Reads `path` if it exists, otherwise returns defaults.
    pub fn load_or_default(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| BoardError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.recognition;
        let invalid = |msg: String| Err(BoardError::InvalidConfig(msg));
        if !(r.canny_low.is_finite() && r.canny_high.is_finite())
            || r.canny_low <= 0.0
            || r.canny_low > r.canny_high
        {
            return invalid(format!(
                "canny thresholds must satisfy 0 < low <= high (got {} / {})",
                r.canny_low, r.canny_high
            ));
        }
        if !(r.blur_sigma.is_finite() && r.blur_sigma > 0.0) {
            return invalid(format!("blur_sigma must be positive (got {})", r.blur_sigma));
        }
        if !(0.0..=1.0).contains(&r.min_edge_density) {
            return invalid(format!(
                "min_edge_density must be in [0, 1] (got {})",
                r.min_edge_density
            ));
        }
        if !(-1.0..=1.0).contains(&r.match_threshold) {
            return invalid(format!(
                "match_threshold must be in [-1, 1] (got {})",
                r.match_threshold
            ));
        }
        if self.dispatch.timeout_secs == 0 {
            return invalid("dispatch.timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn calib() -> Calibration {
        Calibration {
            left: 100,
            top: 50,
            right: 580,
            bottom: 530,
        }
    }

    #[test]
    fn test_calibration_geometry() {
        let c = calib();
        assert_eq!((c.width(), c.height()), (480, 480));
        assert_eq!(c.square_size(), 60);
        let narrow = Calibration { right: 107, ..c };
        assert_eq!(narrow.square_size(), 0);
        assert!(narrow.validate().is_err());
    }

    #[test]
    fn test_store_round_trip_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("nested/calibration.json"));
        store.save(&calib()).unwrap();
        assert_eq!(store.load().unwrap(), calib());

        let moved = Calibration { left: 0, top: 0, ..calib() };
        store.save(&moved).unwrap();
        assert_eq!(store.load().unwrap(), moved);
    }

    #[test]
    fn test_load_missing_is_not_calibrated() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration.json"));
        assert!(matches!(store.load(), Err(BoardError::NotCalibrated(_))));
    }

    #[test]
    fn test_load_malformed_is_not_calibrated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        let store = CalibrationStore::new(&path);
        for text in [
            r#"{"left": 1, "top": 2, "right": 300}"#,
            r#"{"left": 1, "top": 2, "right": "wide", "bottom": 300}"#,
            r#"{"left": 1.5, "top": 2, "right": 300, "bottom": 300}"#,
            r#"{"left": 300, "top": 2, "right": 10, "bottom": 300}"#,
            r#"{"left": 1, "top": 300, "right": 300, "bottom": 300}"#,
            "not json",
        ] {
            fs::write(&path, text).unwrap();
            assert!(
                matches!(store.load(), Err(BoardError::NotCalibrated(_))),
                "accepted {text}"
            );
        }
    }

    #[test]
    fn test_config_defaults_and_partial_file() {
        let dir = tempdir().unwrap();
        let missing = Config::load_or_default(&dir.path().join("none.json")).unwrap();
        assert_eq!(missing, Config::default());

        let path = dir.path().join("fenshot.json");
        fs::write(&path, r#"{"templates_dir": "themes/neo", "recognition": {"match_threshold": 0.4}}"#)
            .unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.templates_dir, PathBuf::from("themes/neo"));
        assert_eq!(config.recognition.match_threshold, 0.4);
        assert_eq!(config.recognition.canny_high, 120.0);
        assert_eq!(config.dispatch.depth, 16);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_validation_ranges() {
        let mut config = Config::default();
        config.validate().unwrap();

        config.recognition.match_threshold = 1.5;
        assert!(config.validate().is_err());

        config = Config::default();
        config.recognition.canny_low = 200.0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.recognition.min_edge_density = -0.1;
        assert!(config.validate().is_err());

        config = Config::default();
        config.recognition.blur_sigma = 0.0;
        assert!(config.validate().is_err());
    }
}
