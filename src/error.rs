use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "Landmark topology mismatch: landmark index {required} required, detector provides {available} points"
    )]
    TopologyMismatch { required: usize, available: usize },

    #[error("Missing source files: {}", display_paths(.missing))]
    MissingSourceFile { missing: Vec<PathBuf> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Recorded stream error at line {line}: {message}")]
    Replay { line: usize, message: String },

    #[error("Missing column '{column}' in {}", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Pipeline has already run")]
    PipelineClosed,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
