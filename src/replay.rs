//! Recorded detection streams.
//!
//! A recording is a JSON Lines file with one captured frame per line:
//!
//! ```text
//! {"width": 640, "height": 480, "faces": [[[0.41, 0.37, -0.02], ...], ...]}
//! ```
//!
//! A blank line or `null` stands for a failed capture read. Replaying a
//! recording drives the collection pipeline exactly like a live camera
//! plus detector would, which keeps runs reproducible offline.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::source::{FrameDimensions, FrameRead, FrameSource, LandmarkDetector};
use crate::types::LandmarkSet;

/// One captured frame together with the faces detected in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub faces: Vec<LandmarkSet>,
}

impl FrameDimensions for RecordedFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Frame source reading a JSON Lines recording.
pub struct RecordedStream<R> {
    lines: Lines<R>,
    line_no: usize,
    released: bool,
}

impl RecordedStream<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordedStream<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            released: false,
        }
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> FrameSource for RecordedStream<R> {
    type Frame = RecordedFrame;

    fn read_frame(&mut self) -> Result<FrameRead<RecordedFrame>> {
        if self.released {
            return Ok(FrameRead::EndOfStream);
        }
        let Some(line) = self.lines.next() else {
            return Ok(FrameRead::EndOfStream);
        };
        let line = line?;
        self.line_no += 1;

        let text = line.trim();
        if text.is_empty() || text == "null" {
            return Ok(FrameRead::Unavailable);
        }
        serde_json::from_str(text)
            .map(FrameRead::Frame)
            .map_err(|e| Error::Replay {
                line: self.line_no,
                message: e.to_string(),
            })
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Detector that hands back the faces stored in a [`RecordedFrame`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedDetector {
    landmark_count: Option<usize>,
}

impl RecordedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the recording's landmarks-per-face so topology problems
    /// surface before a run starts.
    pub fn with_landmark_count(mut self, count: usize) -> Self {
        self.landmark_count = Some(count);
        self
    }
}

impl LandmarkDetector<RecordedFrame> for RecordedDetector {
    fn detect(&mut self, frame: &RecordedFrame) -> Result<Vec<LandmarkSet>> {
        Ok(frame.faces.clone())
    }

    fn landmark_count(&self) -> Option<usize> {
        self.landmark_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(text: &str) -> RecordedStream<Cursor<Vec<u8>>> {
        RecordedStream::from_reader(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn reads_frames_gaps_and_end() {
        let mut s = stream(
            "{\"width\": 4, \"height\": 2, \"faces\": [[[0.1, 0.2, 0.3]]]}\n\nnull\n{\"width\": 4, \"height\": 2}\n",
        );

        match s.read_frame().unwrap() {
            FrameRead::Frame(f) => {
                assert_eq!((f.width, f.height), (4, 2));
                assert_eq!(f.faces.len(), 1);
                assert_eq!(f.faces[0][0].z, 0.3);
            }
            other => panic!("expected a frame, got {other:?}"),
        }
        assert_eq!(s.read_frame().unwrap(), FrameRead::Unavailable);
        assert_eq!(s.read_frame().unwrap(), FrameRead::Unavailable);
        match s.read_frame().unwrap() {
            FrameRead::Frame(f) => assert!(f.faces.is_empty()),
            other => panic!("expected a frame, got {other:?}"),
        }
        assert_eq!(s.read_frame().unwrap(), FrameRead::EndOfStream);
        assert_eq!(s.lines_read(), 4);
    }

    #[test]
    fn malformed_line_names_its_number() {
        let mut s = stream("null\n{\"width\": 4\n");
        assert_eq!(s.read_frame().unwrap(), FrameRead::Unavailable);
        match s.read_frame() {
            Err(Error::Replay { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected replay error, got {other:?}"),
        }
    }

    #[test]
    fn released_stream_is_exhausted() {
        let mut s = stream("{\"width\": 4, \"height\": 2}\n");
        s.release();
        assert_eq!(s.read_frame().unwrap(), FrameRead::EndOfStream);
    }

    #[test]
    fn detector_returns_recorded_faces() {
        let frame = RecordedFrame {
            width: 10,
            height: 10,
            faces: vec![LandmarkSet::default(), LandmarkSet::default()],
        };
        let mut detector = RecordedDetector::new().with_landmark_count(478);
        assert_eq!(detector.detect(&frame).unwrap().len(), 2);
        assert_eq!(
            LandmarkDetector::<RecordedFrame>::landmark_count(&detector),
            Some(478)
        );
    }
}
