use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sink::{frame_destination, summary_destination};

/// Labels the collection tooling knows about. The pipeline itself treats
/// the label as an opaque string.
pub const KNOWN_LABELS: [&str; 7] = [
    "correct",
    "too_close",
    "too_far",
    "head_left",
    "head_right",
    "head_up",
    "head_down",
];

/// Settings for one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub label: String,
    /// Number of frames with a detected face to record.
    pub frame_target: u64,
    /// Which capture device or recording feeds the run.
    pub capture_source_id: String,
    pub output_directory: PathBuf,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            label: String::new(),
            frame_target: 100,
            capture_source_id: "0".to_string(),
            output_directory: PathBuf::from("ml/data"),
        }
    }
}

impl CollectionConfig {
    pub fn new(label: impl Into<String>, frame_target: u64) -> Self {
        Self {
            label: label.into(),
            frame_target,
            ..Self::default()
        }
    }

    pub fn with_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_directory = dir.into();
        self
    }

    pub fn with_capture_source(mut self, id: impl Into<String>) -> Self {
        self.capture_source_id = id.into();
        self
    }

    /// Load from a JSON file. Fields missing from the file keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(Error::InvalidConfig("label must not be empty".into()));
        }
        if self.frame_target == 0 {
            return Err(Error::InvalidConfig(
                "frame_target must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Per-label frame destination.
    pub fn frame_path(&self) -> PathBuf {
        frame_destination(&self.output_directory, &self.label)
    }

    /// Shared summary destination.
    pub fn summary_path(&self) -> PathBuf {
        summary_destination(&self.output_directory)
    }
}
