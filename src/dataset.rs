//! Training-set assembly from the per-label frame files.
//!
//! Projects every label file onto the five feature columns plus `label`,
//! drops incomplete rows, and writes the union as one CSV.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::sink::frame_destination;

/// Label files read by [`assemble_dataset`], in output order.
pub const DATASET_LABELS: [&str; 7] = [
    "correct",
    "head_down",
    "head_left",
    "head_right",
    "head_up",
    "too_close",
    "too_far",
];

/// Columns of the assembled dataset.
pub const DATASET_COLUMNS: [&str; 6] = [
    "eye_distance_px",
    "face_height_px",
    "face_area_ratio",
    "head_tilt_h",
    "head_tilt_v",
    "label",
];

/// Counts from one assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetReport {
    pub sources: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

/// Build `out_path` from the label files in `data_dir`.
///
/// Every expected file must exist; otherwise nothing is written and the
/// error lists all missing files at once.
pub fn assemble_dataset(data_dir: &Path, out_path: &Path) -> Result<DatasetReport> {
    let sources: Vec<PathBuf> = DATASET_LABELS
        .iter()
        .map(|label| frame_destination(data_dir, label))
        .collect();

    let missing: Vec<PathBuf> = sources.iter().filter(|p| !p.is_file()).cloned().collect();
    if !missing.is_empty() {
        return Err(Error::MissingSourceFile { missing });
    }

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(out_path)?;
    writer.write_record(DATASET_COLUMNS)?;

    let mut report = DatasetReport {
        sources: sources.len(),
        ..DatasetReport::default()
    };
    for source in &sources {
        let (kept, dropped) = project_source(source, &mut writer)?;
        debug!(source = %source.display(), kept, dropped, "label file projected");
        report.rows_kept += kept;
        report.rows_dropped += dropped;
    }
    writer.flush()?;

    info!(
        out = %out_path.display(),
        rows = report.rows_kept,
        dropped = report.rows_dropped,
        "dataset assembled"
    );
    Ok(report)
}

/// Copy the complete rows of one label file. Returns (kept, dropped).
fn project_source<W: std::io::Write>(
    path: &Path,
    writer: &mut csv::Writer<W>,
) -> Result<(usize, usize)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok((0, 0));
    }
    let mut columns = [0usize; DATASET_COLUMNS.len()];
    for (slot, column) in columns.iter_mut().zip(DATASET_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| Error::MissingColumn {
                path: path.to_path_buf(),
                column,
            })?;
    }

    let (mut kept, mut dropped) = (0, 0);
    for record in reader.records() {
        let record = record?;
        let fields: Option<Vec<&str>> = columns
            .iter()
            .map(|&i| record.get(i).map(str::trim).filter(|v| !v.is_empty()))
            .collect();

        match fields {
            Some(fields) => {
                writer.write_record(&fields)?;
                kept += 1;
            }
            None => dropped += 1,
        }
    }
    Ok((kept, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_values_drop_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("correct.csv");
        let header = crate::sink::FRAME_COLUMNS.join(",");
        fs::write(
            &path,
            format!(
                "{header}\n\
                 ab12cd34,0,1,61,n/a,0.0857,90.0,-0.02,correct\n\
                 ab12cd34,1,2,62,142,,90.0,-0.02,correct\n"
            ),
        )
        .unwrap();
        let mut writer = csv::Writer::from_writer(Vec::new());

        assert_eq!(project_source(&path, &mut writer).unwrap(), (1, 1));
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text, "61,n/a,0.0857,90.0,-0.02,correct\n");
    }

    #[test]
    fn missing_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("correct.csv");
        fs::write(&path, "run_id,eye_distance_px\nabc,1\n").unwrap();
        let mut writer = csv::Writer::from_writer(Vec::new());

        match project_source(&path, &mut writer) {
            Err(Error::MissingColumn { column, .. }) => assert_eq!(column, "face_height_px"),
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn empty_label_file_contributes_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("too_far.csv");
        fs::write(&path, "").unwrap();
        let mut writer = csv::Writer::from_writer(Vec::new());

        assert_eq!(project_source(&path, &mut writer).unwrap(), (0, 0));
    }
}
