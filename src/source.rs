//! Capability seams to the capture device and the landmark detector.
//!
//! Both live outside this crate. The pipeline only needs frames that know
//! their size, and a detector that maps a frame to zero or more faces.

use std::ops::Deref;

use image::{ImageBuffer, Pixel};

use crate::error::Result;
use crate::types::LandmarkSet;

/// Pixel dimensions of a captured frame.
pub trait FrameDimensions {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl<P, C> FrameDimensions for ImageBuffer<P, C>
where
    P: Pixel,
    C: Deref<Target = [P::Subpixel]>,
{
    fn width(&self) -> u32 {
        ImageBuffer::width(self)
    }

    fn height(&self) -> u32 {
        ImageBuffer::height(self)
    }
}

/// Outcome of one read from a capture source.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRead<F> {
    Frame(F),
    /// No frame this time. Transient; the caller reads again.
    Unavailable,
    /// The source has no more frames.
    EndOfStream,
}

/// A blocking source of frames, such as a camera or a recording.
///
/// An `Err` from `read_frame` is a hard failure of the source, unlike
/// [`FrameRead::Unavailable`].
pub trait FrameSource {
    type Frame: FrameDimensions;

    fn read_frame(&mut self) -> Result<FrameRead<Self::Frame>>;

    /// Give the underlying device back. Called once when a run finishes.
    fn release(&mut self) {}
}

/// A face-landmark detector.
pub trait LandmarkDetector<F> {
    /// Faces found in `frame`, in the detector's own order.
    fn detect(&mut self, frame: &F) -> Result<Vec<LandmarkSet>>;

    /// Number of landmarks per face, when the detector knows it up front.
    fn landmark_count(&self) -> Option<usize> {
        None
    }
}

impl<F, T> LandmarkDetector<F> for T
where
    T: FnMut(&F) -> Result<Vec<LandmarkSet>>,
{
    fn detect(&mut self, frame: &F) -> Result<Vec<LandmarkSet>> {
        self(frame)
    }
}
