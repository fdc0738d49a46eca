//! Append-only CSV destinations for frame rows and run summaries.
//!
//! A destination gets its header only when it is new or empty, so repeated
//! runs against the same directory keep accumulating rows under a single
//! header. Each row, with the header in front of it when one is due, is
//! encoded in memory and handed to the file in one `write_all`, so an I/O
//! failure never leaves a half-encoded row behind at this layer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::types::{FrameRecord, RunSummary};

/// Column order of the per-label frame files.
pub const FRAME_COLUMNS: [&str; 9] = [
    "run_id",
    "frame_idx",
    "ts",
    "eye_distance_px",
    "face_height_px",
    "face_area_ratio",
    "head_tilt_h",
    "head_tilt_v",
    "label",
];

/// Column order of the shared summary file.
pub const SUMMARY_COLUMNS: [&str; 13] = [
    "run_id",
    "label",
    "count",
    "eye_dist_mean",
    "eye_dist_std",
    "face_height_mean",
    "face_height_std",
    "face_area_mean",
    "face_area_std",
    "head_tilt_h_mean",
    "head_tilt_h_std",
    "head_tilt_v_mean",
    "head_tilt_v_std",
];

/// File name of the shared summary destination.
pub const SUMMARY_FILE_NAME: &str = "summary_stats.csv";

/// File path of the per-label frame destination inside `dir`.
pub fn frame_destination(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("{label}.csv"))
}

/// File path of the summary destination inside `dir`.
pub fn summary_destination(dir: &Path) -> PathBuf {
    dir.join(SUMMARY_FILE_NAME)
}

/// An append-mode CSV file with a fixed header.
#[derive(Debug)]
struct CsvSink {
    path: PathBuf,
    file: File,
    header: &'static [&'static str],
    header_pending: bool,
}

impl CsvSink {
    fn open(path: PathBuf, header: &'static [&'static str]) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let header_pending = file.metadata()?.len() == 0;
        Ok(Self {
            path,
            file,
            header,
            header_pending,
        })
    }

    fn append<R: Serialize>(&mut self, row: &R) -> Result<()> {
        let mut encoder = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if self.header_pending {
            encoder.write_record(self.header)?;
        }
        encoder.serialize(row)?;
        let bytes = encoder.into_inner().map_err(|e| e.into_error())?;

        self.file.write_all(&bytes)?;
        self.file.flush()?;
        self.header_pending = false;
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct FrameRow<'a> {
    run_id: &'a str,
    frame_idx: u64,
    ts: i64,
    eye_distance_px: u32,
    face_height_px: u32,
    face_area_ratio: f64,
    head_tilt_h: f64,
    head_tilt_v: f64,
    label: &'a str,
}

impl<'a> From<&'a FrameRecord> for FrameRow<'a> {
    fn from(r: &'a FrameRecord) -> Self {
        Self {
            run_id: r.run_id.as_str(),
            frame_idx: r.frame_idx,
            ts: r.timestamp_ms,
            eye_distance_px: r.features.eye_distance_px,
            face_height_px: r.features.face_height_px,
            face_area_ratio: r.features.face_area_ratio,
            head_tilt_h: r.features.head_tilt_h,
            head_tilt_v: r.features.head_tilt_v,
            label: &r.label,
        }
    }
}

/// Per-label destination for [`FrameRecord`] rows.
#[derive(Debug)]
pub struct FrameSink {
    inner: CsvSink,
}

impl FrameSink {
    /// Open (creating if needed) `<dir>/<label>.csv` for appending.
    pub fn open(dir: &Path, label: &str) -> Result<Self> {
        Self::open_path(frame_destination(dir, label))
    }

    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            inner: CsvSink::open(path.into(), &FRAME_COLUMNS)?,
        })
    }

    pub fn append(&mut self, record: &FrameRecord) -> Result<()> {
        self.inner.append(&FrameRow::from(record))
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Flush and sync to disk.
    pub fn close(self) -> Result<()> {
        self.inner.close()
    }
}

/// Shared destination for [`RunSummary`] rows.
#[derive(Debug)]
pub struct SummarySink {
    inner: CsvSink,
}

impl SummarySink {
    /// Open (creating if needed) `<dir>/summary_stats.csv` for appending.
    pub fn open(dir: &Path) -> Result<Self> {
        Self::open_path(summary_destination(dir))
    }

    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            inner: CsvSink::open(path.into(), &SUMMARY_COLUMNS)?,
        })
    }

    pub fn append(&mut self, summary: &RunSummary) -> Result<()> {
        self.inner.append(summary)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Flush and sync to disk.
    pub fn close(self) -> Result<()> {
        self.inner.close()
    }
}
