//! Per-frame geometric descriptors computed from a selected face.

use crate::error::{Error, Result};
use crate::types::{FeatureVector, LandmarkSet};

/// Landmark indices the extractor reads, in the detector's own topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceTopology {
    pub right_eye_outer: usize,
    pub left_eye_outer: usize,
    pub forehead: usize,
    pub chin: usize,
}

impl FaceTopology {
    /// The 468/478-point face mesh layout.
    pub const FACE_MESH: Self = Self {
        right_eye_outer: 33,
        left_eye_outer: 263,
        forehead: 10,
        chin: 152,
    };

    /// Highest landmark index this topology reads.
    pub fn max_index(&self) -> usize {
        self.right_eye_outer
            .max(self.left_eye_outer)
            .max(self.forehead)
            .max(self.chin)
    }

    /// Fail unless a landmark set with `available` points covers every index.
    pub fn check(&self, available: usize) -> Result<()> {
        let required = self.max_index();
        if available <= required {
            return Err(Error::TopologyMismatch {
                required,
                available,
            });
        }
        Ok(())
    }
}

impl Default for FaceTopology {
    fn default() -> Self {
        Self::FACE_MESH
    }
}

/// Turns a landmark set plus frame size into a [`FeatureVector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryExtractor {
    topology: FaceTopology,
}

impl GeometryExtractor {
    pub fn new(topology: FaceTopology) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &FaceTopology {
        &self.topology
    }

    /// Compute the descriptors of `face` in a `width` x `height` frame.
    ///
    /// Pure: the same inputs always give bit-identical output. The only
    /// failure is a face that lacks one of the topology's indices.
    pub fn extract(&self, face: &LandmarkSet, width: u32, height: u32) -> Result<FeatureVector> {
        self.topology.check(face.len())?;
        let t = &self.topology;

        let eye_r = face[t.right_eye_outer].to_pixel(width, height);
        let eye_l = face[t.left_eye_outer].to_pixel(width, height);
        let eye_dx = (eye_l.x - eye_r.x) as f64;
        let eye_dy = (eye_l.y - eye_r.y) as f64;
        let eye_distance_px = eye_dx.hypot(eye_dy).trunc() as u32;

        let forehead = face[t.forehead];
        let chin = face[t.chin];
        let forehead_px = forehead.to_pixel(width, height);
        let chin_px = chin.to_pixel(width, height);
        let dx = chin_px.x - forehead_px.x;
        let dy = chin_px.y - forehead_px.y;
        let face_height_px = dy.unsigned_abs() as u32;

        let head_tilt_h = f64::from(fast_atan2(dy as f32, dx as f32));
        let head_tilt_v = chin.z - forehead.z;

        let frame_area = f64::from(width) * f64::from(height);
        let face_area_ratio = match face.pixel_bounds(width, height) {
            Some(bbox) if frame_area > 0.0 => bbox.area() as f64 / frame_area,
            _ => 0.0,
        };

        Ok(FeatureVector {
            eye_distance_px,
            face_height_px,
            face_area_ratio: round4(face_area_ratio),
            head_tilt_h: round4(head_tilt_h),
            head_tilt_v: round4(head_tilt_v),
        })
    }
}

/// Shorthand for [`GeometryExtractor::extract`] with the face-mesh topology.
pub fn extract_features(face: &LandmarkSet, width: u32, height: u32) -> Result<FeatureVector> {
    GeometryExtractor::default().extract(face, width, height)
}

const RAD_TO_DEG: f32 = (180.0 / std::f64::consts::PI) as f32;
const ATAN2_P1: f32 = 0.999_787_841_279_480_7_f64 as f32 * RAD_TO_DEG;
const ATAN2_P3: f32 = -0.325_808_397_464_097_5_f64 as f32 * RAD_TO_DEG;
const ATAN2_P5: f32 = 0.155_578_651_846_328_1_f64 as f32 * RAD_TO_DEG;
const ATAN2_P7: f32 = -0.044_326_555_547_921_28_f64 as f32 * RAD_TO_DEG;

/// Angle of `(x, y)` in degrees within `[0, 360)`.
///
/// This is the polynomial approximation computer-vision toolkits ship as
/// `fastAtan2` (about 0.3 degree accuracy). Trained downstream models were
/// fitted on its exact output, so it is reproduced here instead of
/// `f32::atan2`.
pub fn fast_atan2(y: f32, x: f32) -> f32 {
    let ax = x.abs();
    let ay = y.abs();
    let mut a = if ax >= ay {
        let c = ay / (ax + f64::EPSILON as f32);
        let c2 = c * c;
        (((ATAN2_P7 * c2 + ATAN2_P5) * c2 + ATAN2_P3) * c2 + ATAN2_P1) * c
    } else {
        let c = ax / (ay + f64::EPSILON as f32);
        let c2 = c * c;
        90.0 - (((ATAN2_P7 * c2 + ATAN2_P5) * c2 + ATAN2_P3) * c2 + ATAN2_P1) * c
    };
    if x < 0.0 {
        a = 180.0 - a;
    }
    if y < 0.0 {
        a = 360.0 - a;
    }
    a
}

/// Round to 4 decimal places.
///
/// Rounds the exact binary value of `value` (ties to even), so a ratio such
/// as `1152 / 307200`, stored just below `0.00375`, gives `0.0037`.
pub fn round4(value: f64) -> f64 {
    format!("{value:.4}").parse().unwrap_or(value)
}
