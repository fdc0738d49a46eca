//! # posture-collect
//!
//! Feature extraction and run aggregation for posture training data.
//!
//! A face-landmark detector reports, for every video frame, zero or more
//! faces as normalized 3-D landmarks. This crate turns that stream into:
//! - **Frame rows**: five geometric descriptors of the dominant face per
//!   frame, appended to a per-label CSV file
//! - **Run summaries**: mean and population standard deviation of each
//!   descriptor over a run, appended to a shared CSV file
//!
//! ## Pipeline
//!
//! 1. Read a frame from the capture source (failed reads are retried)
//! 2. Detect faces (external detector behind [`LandmarkDetector`])
//! 3. Keep the face with the largest pixel bounding box
//! 4. Compute eye distance, face height, face/frame area ratio,
//!    forehead-to-chin angle and chin/forehead depth delta
//! 5. Append the frame row and accumulate its values
//! 6. When the run ends, for any reason, append the run summary
//!
//! ## Quick Start
//!
//! ```rust
//! use posture_collect::{extract_features, select_dominant_face, LandmarkPoint, LandmarkSet};
//!
//! // A 468-point face mesh, all points at the frame centre
//! let mut face = LandmarkSet::new(vec![LandmarkPoint::new(0.5, 0.5, 0.0); 468]);
//! face[33] = LandmarkPoint::new(0.40, 0.40, 0.0); // right eye outer corner
//! face[263] = LandmarkPoint::new(0.60, 0.40, 0.0); // left eye outer corner
//! face[10] = LandmarkPoint::new(0.50, 0.20, -0.05); // forehead
//! face[152] = LandmarkPoint::new(0.50, 0.80, 0.02); // chin
//!
//! let faces = vec![face];
//! let dominant = select_dominant_face(&faces, 100, 100).unwrap();
//! let features = extract_features(dominant, 100, 100).unwrap();
//!
//! assert_eq!(features.eye_distance_px, 20);
//! assert_eq!(features.face_height_px, 60);
//! assert_eq!(features.head_tilt_h, 90.0);
//! ```
//!
//! ## Custom Capture Sources
//!
//! Implement [`FrameSource`] for a camera and [`LandmarkDetector`] for a
//! model, then hand both to a [`CollectionPipeline`]. Any
//! `image::ImageBuffer` already works as a frame.

mod accumulator;
mod config;
pub mod dataset;
mod error;
mod features;
mod pipeline;
pub mod replay;
mod selector;
mod sink;
mod source;
mod types;

pub use accumulator::RunAccumulator;
pub use config::{CollectionConfig, KNOWN_LABELS};
pub use dataset::{assemble_dataset, DatasetReport};
pub use error::{Error, Result};
pub use features::{extract_features, fast_atan2, round4, FaceTopology, GeometryExtractor};
pub use pipeline::{
    now_millis, CollectionPipeline, PipelineState, RunReport, StopSignal, Termination,
};
pub use selector::select_dominant_face;
pub use sink::{
    frame_destination, summary_destination, FrameSink, SummarySink, FRAME_COLUMNS,
    SUMMARY_COLUMNS, SUMMARY_FILE_NAME,
};
pub use source::{FrameDimensions, FrameRead, FrameSource, LandmarkDetector};
pub use types::{
    FeatureVector, FrameRecord, LandmarkPoint, LandmarkSet, PixelBox, PixelPoint, RunId,
    RunSummary,
};
