//! Running collection of one run's feature vectors and their summary.

use crate::features::round4;
use crate::types::{FeatureVector, RunId, RunSummary};

/// Feature values of every frame recorded in a run, in arrival order.
///
/// One column per feature dimension. `finalize` consumes the accumulator,
/// so a run can be summarised at most once.
#[derive(Debug, Clone, Default)]
pub struct RunAccumulator {
    eye_distance: Vec<f64>,
    face_height: Vec<f64>,
    face_area: Vec<f64>,
    head_tilt_h: Vec<f64>,
    head_tilt_v: Vec<f64>,
}

impl RunAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, features: &FeatureVector) {
        self.eye_distance.push(f64::from(features.eye_distance_px));
        self.face_height.push(f64::from(features.face_height_px));
        self.face_area.push(features.face_area_ratio);
        self.head_tilt_h.push(features.head_tilt_h);
        self.head_tilt_v.push(features.head_tilt_v);
    }

    /// Number of samples added so far.
    pub fn len(&self) -> usize {
        self.eye_distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eye_distance.is_empty()
    }

    /// Summarise the run, or `None` if nothing was added.
    pub fn finalize(self, run_id: RunId, label: &str) -> Option<RunSummary> {
        if self.is_empty() {
            return None;
        }

        let (eye_mean, eye_std) = mean_and_pstdev(&self.eye_distance);
        let (height_mean, height_std) = mean_and_pstdev(&self.face_height);
        let (area_mean, area_std) = mean_and_pstdev(&self.face_area);
        let (tilt_h_mean, tilt_h_std) = mean_and_pstdev(&self.head_tilt_h);
        let (tilt_v_mean, tilt_v_std) = mean_and_pstdev(&self.head_tilt_v);

        Some(RunSummary {
            run_id,
            label: label.to_owned(),
            count: self.len() as u64,
            eye_dist_mean: eye_mean.trunc() as i64,
            eye_dist_std: eye_std,
            face_height_mean: height_mean.trunc() as i64,
            face_height_std: height_std,
            face_area_mean: round4(area_mean),
            face_area_std: area_std,
            head_tilt_h_mean: round4(tilt_h_mean),
            head_tilt_h_std: tilt_h_std,
            head_tilt_v_mean: round4(tilt_v_mean),
            head_tilt_v_std: tilt_v_std,
        })
    }
}

/// Arithmetic mean and population standard deviation (rounded to 4
/// decimals, `0.0` for a single sample) of a non-empty slice.
fn mean_and_pstdev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, round4(variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(eye: u32, height: u32, area: f64, tilt_h: f64, tilt_v: f64) -> FeatureVector {
        FeatureVector {
            eye_distance_px: eye,
            face_height_px: height,
            face_area_ratio: area,
            head_tilt_h: tilt_h,
            head_tilt_v: tilt_v,
        }
    }

    #[test]
    fn empty_run_has_no_summary() {
        let acc = RunAccumulator::new();
        assert!(acc.is_empty());
        assert!(acc.finalize(RunId::from("deadbeef"), "correct").is_none());
    }

    #[test]
    fn population_statistics() {
        let mut acc = RunAccumulator::new();
        acc.add(&vector(40, 100, 0.1, 90.0, 0.01));
        acc.add(&vector(42, 101, 0.2, 90.0, 0.02));
        acc.add(&vector(44, 103, 0.3, 90.0, 0.03));
        assert_eq!(acc.len(), 3);

        let s = acc.finalize(RunId::from("deadbeef"), "too_close").unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.label, "too_close");
        assert_eq!(s.eye_dist_mean, 42);
        assert_eq!(s.eye_dist_std, 1.633);
        // mean 101.33 truncates to 101
        assert_eq!(s.face_height_mean, 101);
        assert_eq!(s.face_height_std, 1.2472);
        assert!((s.face_area_mean - 0.2).abs() < 1e-12);
        assert_eq!(s.face_area_std, 0.0816);
        assert_eq!(s.head_tilt_h_mean, 90.0);
        assert_eq!(s.head_tilt_h_std, 0.0);
        assert!((s.head_tilt_v_mean - 0.02).abs() < 1e-12);
        assert_eq!(s.head_tilt_v_std, 0.0082);
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let mut acc = RunAccumulator::new();
        acc.add(&vector(57, 131, 0.0731, 91.2345, -0.0412));

        let s = acc.finalize(RunId::from("cafe0001"), "correct").unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.eye_dist_mean, 57);
        assert_eq!(s.face_height_mean, 131);
        assert_eq!(s.face_area_mean, 0.0731);
        assert_eq!(s.head_tilt_h_mean, 91.2345);
        assert_eq!(s.head_tilt_v_mean, -0.0412);
        for std in [
            s.eye_dist_std,
            s.face_height_std,
            s.face_area_std,
            s.head_tilt_h_std,
            s.head_tilt_v_std,
        ] {
            assert_eq!(std, 0.0);
        }
    }
}
