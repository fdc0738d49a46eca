use std::fmt;

use serde::{Deserialize, Serialize};

/// A detector landmark in normalized coordinates.
///
/// `x` and `y` are fractions of the frame width and height. `z` is the
/// detector's unitless depth relative to its own reference plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LandmarkPoint {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert to pixel coordinates by truncating toward zero.
    pub fn to_pixel(&self, width: u32, height: u32) -> PixelPoint {
        PixelPoint {
            x: (self.x * f64::from(width)).trunc() as i64,
            y: (self.y * f64::from(height)).trunc() as i64,
        }
    }
}

impl From<[f64; 3]> for LandmarkPoint {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<LandmarkPoint> for [f64; 3] {
    fn from(p: LandmarkPoint) -> Self {
        [p.x, p.y, p.z]
    }
}

/// An integer pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

/// Axis-aligned pixel bounding box, inclusive of its extreme points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl PixelBox {
    /// Smallest box enclosing all points, or `None` for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = PixelPoint>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }
}

/// All landmarks the detector reported for one face, in detector index order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    pub points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&LandmarkPoint> {
        self.points.get(idx)
    }

    /// Bounding box of every landmark after conversion to pixel space.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> Option<PixelBox> {
        PixelBox::enclosing(self.points.iter().map(|p| p.to_pixel(width, height)))
    }
}

impl std::ops::Index<usize> for LandmarkSet {
    type Output = LandmarkPoint;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

impl std::ops::IndexMut<usize> for LandmarkSet {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.points[idx]
    }
}

/// Geometric descriptors of one face in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeatureVector {
    pub eye_distance_px: u32,
    pub face_height_px: u32,
    /// Bounding-box area over frame area, 4 decimals.
    pub face_area_ratio: f64,
    /// Forehead-to-chin direction in degrees, `[0, 360)`, 4 decimals.
    pub head_tilt_h: f64,
    /// Chin depth minus forehead depth, 4 decimals.
    pub head_tilt_v: f64,
}

/// Opaque identifier shared by every row of one collection run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Eight lowercase hex characters taken from a random v4 UUID.
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recorded frame of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub run_id: RunId,
    /// Zero-based position among the frames recorded in this run.
    pub frame_idx: u64,
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub features: FeatureVector,
    pub label: String,
}

/// Per-run aggregate. Field names are the summary file's column names.
///
/// Means of the pixel measurements are truncated to integers; everything
/// else carries 4 decimals. Standard deviations are population (divisor N).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub label: String,
    pub count: u64,
    pub eye_dist_mean: i64,
    pub eye_dist_std: f64,
    pub face_height_mean: i64,
    pub face_height_std: f64,
    pub face_area_mean: f64,
    pub face_area_std: f64,
    pub head_tilt_h_mean: f64,
    pub head_tilt_h_std: f64,
    pub head_tilt_v_mean: f64,
    pub head_tilt_v_std: f64,
}
