use crate::types::LandmarkSet;

/// Pick the face with the largest pixel bounding box.
///
/// Ties keep the earliest face in `faces`. Faces without any landmark are
/// never chosen. Returns `None` when there is nothing to choose, in which
/// case the frame produces no record.
pub fn select_dominant_face(faces: &[LandmarkSet], width: u32, height: u32) -> Option<&LandmarkSet> {
    let mut best: Option<(i64, &LandmarkSet)> = None;

    for face in faces {
        let Some(bbox) = face.pixel_bounds(width, height) else {
            continue;
        };
        let area = bbox.area();
        match best {
            Some((best_area, _)) if area <= best_area => {}
            _ => best = Some((area, face)),
        }
    }

    best.map(|(_, face)| face)
}
