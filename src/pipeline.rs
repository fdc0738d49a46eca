//! The collection run: capture, detect, select, extract, record, summarise.
//!
//! A run moves through [`PipelineState`] in order and never goes back.
//! Whatever ends the frame loop (target reached, stop signal, end of
//! stream, an error, or a panic in a collaborator), finalisation still runs: the summary row is
//! appended when at least one frame was recorded, the sinks are flushed,
//! and the capture source is released.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::accumulator::RunAccumulator;
use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::features::{FaceTopology, GeometryExtractor};
use crate::selector::select_dominant_face;
use crate::sink::{FrameSink, SummarySink};
use crate::source::{FrameDimensions, FrameRead, FrameSource, LandmarkDetector};
use crate::types::{FrameRecord, RunId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Running,
    Finalizing,
    Closed,
}

/// Why the frame loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    TargetReached,
    Interrupted,
    SourceExhausted,
}

/// Cooperative interruption flag, checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a run that finished without error.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: RunId,
    pub label: String,
    /// Frames recorded, which is also the summary's `count`.
    pub collected: u64,
    pub termination: Termination,
    pub summary_written: bool,
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

struct OpenRun {
    run_id: RunId,
    frames: FrameSink,
    summaries: SummarySink,
    accumulator: RunAccumulator,
}

/// Drives one collection run over a frame source and a detector.
pub struct CollectionPipeline<S, D> {
    config: CollectionConfig,
    source: S,
    detector: D,
    extractor: GeometryExtractor,
    stop: StopSignal,
    clock: fn() -> i64,
    state: PipelineState,
}

impl<S, D> CollectionPipeline<S, D>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
{
    pub fn new(config: CollectionConfig, source: S, detector: D) -> Self {
        Self {
            config,
            source,
            detector,
            extractor: GeometryExtractor::default(),
            stop: StopSignal::new(),
            clock: now_millis,
            state: PipelineState::Initializing,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_topology(mut self, topology: FaceTopology) -> Self {
        self.extractor = GeometryExtractor::new(topology);
        self
    }

    /// Replace the timestamp source used for the `ts` column.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// A handle that interrupts this pipeline when triggered.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Execute the run. A pipeline runs once; later calls fail with
    /// [`Error::PipelineClosed`].
    pub fn run(&mut self) -> Result<RunReport> {
        if self.state != PipelineState::Initializing {
            return Err(Error::PipelineClosed);
        }

        let mut guard = RunGuard {
            pipeline: self,
            run: None,
        };
        let run = guard.pipeline.open()?;
        guard.pipeline.transition(PipelineState::Running);
        info!(
            run_id = %run.run_id,
            label = %guard.pipeline.config.label,
            target = guard.pipeline.config.frame_target,
            source = %guard.pipeline.config.capture_source_id,
            frames = %run.frames.path().display(),
            "collection started"
        );
        guard.run = Some(run);

        let loop_result = guard.collect();
        let finished = guard.finalize().ok_or(Error::PipelineClosed)?;
        let label = guard.pipeline.config.label.clone();
        drop(guard);

        match loop_result {
            Ok(termination) => {
                let Finished {
                    run_id,
                    collected,
                    summary,
                    frames_closed,
                    summaries_closed,
                } = finished;
                let summary_written = summary?;
                frames_closed?;
                summaries_closed?;
                info!(
                    run_id = %run_id,
                    collected,
                    ?termination,
                    summary_written,
                    "collection finished"
                );
                Ok(RunReport {
                    run_id,
                    label,
                    collected,
                    termination,
                    summary_written,
                })
            }
            Err(err) => {
                finished.log_after_failure();
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "pipeline state change");
        self.state = next;
    }

    fn open(&mut self) -> Result<OpenRun> {
        self.config.validate()?;
        if let Some(count) = self.detector.landmark_count() {
            self.extractor.topology().check(count)?;
        }

        fs::create_dir_all(&self.config.output_directory)?;
        let frames = FrameSink::open(&self.config.output_directory, &self.config.label)?;
        let summaries = SummarySink::open(&self.config.output_directory)?;

        Ok(OpenRun {
            run_id: RunId::generate(),
            frames,
            summaries,
            accumulator: RunAccumulator::new(),
        })
    }

    fn collect(
        &mut self,
        run_id: &RunId,
        frames: &mut FrameSink,
        accumulator: &mut RunAccumulator,
    ) -> Result<Termination> {
        loop {
            if accumulator.len() as u64 >= self.config.frame_target {
                return Ok(Termination::TargetReached);
            }
            if self.stop.is_triggered() {
                warn!(collected = accumulator.len(), "collection interrupted");
                return Ok(Termination::Interrupted);
            }

            let frame = match self.source.read_frame()? {
                FrameRead::Frame(frame) => frame,
                FrameRead::Unavailable => {
                    trace!("no frame from capture source, reading again");
                    continue;
                }
                FrameRead::EndOfStream => {
                    info!(collected = accumulator.len(), "capture source exhausted");
                    return Ok(Termination::SourceExhausted);
                }
            };
            let (width, height) = (frame.width(), frame.height());

            let faces = self.detector.detect(&frame)?;
            let Some(face) = select_dominant_face(&faces, width, height) else {
                trace!("no face detected, frame skipped");
                continue;
            };
            let features = self.extractor.extract(face, width, height)?;

            let record = FrameRecord {
                run_id: run_id.clone(),
                frame_idx: accumulator.len() as u64,
                timestamp_ms: (self.clock)(),
                features,
                label: self.config.label.clone(),
            };
            frames.append(&record)?;
            accumulator.add(&record.features);
            debug!(frame_idx = record.frame_idx, ?features, "frame recorded");
        }
    }
}

/// Owns an open run. Finalisation and source release happen when the guard
/// drops, so a panic from the source or the detector still leaves the
/// summary row behind.
struct RunGuard<'p, S, D>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
{
    pipeline: &'p mut CollectionPipeline<S, D>,
    run: Option<OpenRun>,
}

impl<S, D> RunGuard<'_, S, D>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
{
    fn collect(&mut self) -> Result<Termination> {
        match self.run.as_mut() {
            Some(run) => {
                self.pipeline
                    .collect(&run.run_id, &mut run.frames, &mut run.accumulator)
            }
            None => Err(Error::PipelineClosed),
        }
    }

    /// Append the summary and close both sinks. `None` once already done.
    fn finalize(&mut self) -> Option<Finished> {
        let OpenRun {
            run_id,
            frames,
            mut summaries,
            accumulator,
        } = self.run.take()?;
        self.pipeline.transition(PipelineState::Finalizing);

        let collected = accumulator.len() as u64;
        let summary = match accumulator.finalize(run_id.clone(), &self.pipeline.config.label) {
            Some(summary) => summaries.append(&summary).map(|()| true),
            None => Ok(false),
        };
        Some(Finished {
            run_id,
            collected,
            summary,
            frames_closed: frames.close(),
            summaries_closed: summaries.close(),
        })
    }
}

impl<S, D> Drop for RunGuard<'_, S, D>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
{
    fn drop(&mut self) {
        if let Some(finished) = self.finalize() {
            warn!(
                run_id = %finished.run_id,
                collected = finished.collected,
                "frame loop unwound, run finalised on the way out"
            );
            finished.log_after_failure();
        }
        self.pipeline.source.release();
        self.pipeline.transition(PipelineState::Closed);
    }
}

/// Results of finalising one run.
struct Finished {
    run_id: RunId,
    collected: u64,
    summary: Result<bool>,
    frames_closed: Result<()>,
    summaries_closed: Result<()>,
}

impl Finished {
    /// The run already failed; finalisation errors are logged, not returned.
    fn log_after_failure(&self) {
        let run_id = &self.run_id;
        match &self.summary {
            Ok(true) => info!(run_id = %run_id, collected = self.collected, "summary written after failed run"),
            Ok(false) => {}
            Err(e) => warn!(run_id = %run_id, error = %e, "summary write failed"),
        }
        if let Err(e) = &self.frames_closed {
            warn!(run_id = %run_id, error = %e, "frame file close failed");
        }
        if let Err(e) = &self.summaries_closed {
            warn!(run_id = %run_id, error = %e, "summary file close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{RecordedDetector, RecordedFrame, RecordedStream};
    use std::io::{self, Cursor, Write};
    use std::sync::Mutex;

    fn empty_stream() -> RecordedStream<Cursor<Vec<u8>>> {
        RecordedStream::from_reader(Cursor::new(Vec::new()))
    }

    #[test]
    fn stop_signal_is_shared() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_triggered());
        handle.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn invalid_config_fails_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let config = CollectionConfig::new("", 5).with_output_directory(&out);
        let mut pipeline = CollectionPipeline::new(config, empty_stream(), RecordedDetector::new());

        assert!(matches!(pipeline.run(), Err(Error::InvalidConfig(_))));
        assert_eq!(pipeline.state(), PipelineState::Closed);
        assert!(!out.exists());
    }

    #[test]
    fn declared_topology_is_checked_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = CollectionConfig::new("correct", 5).with_output_directory(dir.path());
        let detector = RecordedDetector::new().with_landmark_count(68);
        let mut pipeline = CollectionPipeline::new(config, empty_stream(), detector);

        assert!(matches!(
            pipeline.run(),
            Err(Error::TopologyMismatch {
                required: 263,
                available: 68
            })
        ));
        assert!(!dir.path().join("correct.csv").exists());
        assert!(!dir.path().join("summary_stats.csv").exists());
    }

    #[test]
    fn pipeline_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = CollectionConfig::new("correct", 5).with_output_directory(dir.path());
        let mut pipeline = CollectionPipeline::new(config, empty_stream(), RecordedDetector::new());
        assert_eq!(pipeline.state(), PipelineState::Initializing);

        let report = pipeline.run().unwrap();
        assert_eq!(report.termination, Termination::SourceExhausted);
        assert_eq!(report.collected, 0);
        assert!(!report.summary_written);
        assert_eq!(pipeline.state(), PipelineState::Closed);
        assert!(matches!(pipeline.run(), Err(Error::PipelineClosed)));
    }

    #[test]
    fn fixed_clock_feeds_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut face = crate::types::LandmarkSet::new(vec![
            crate::types::LandmarkPoint::new(0.5, 0.5, 0.0);
            468
        ]);
        face[152] = crate::types::LandmarkPoint::new(0.5, 0.9, 0.0);
        let frame = RecordedFrame {
            width: 100,
            height: 100,
            faces: vec![face],
        };
        let line = serde_json::to_string(&frame).unwrap();
        let stream = RecordedStream::from_reader(Cursor::new(line.into_bytes()));

        let config = CollectionConfig::new("correct", 1).with_output_directory(dir.path());
        let mut pipeline = CollectionPipeline::new(config, stream, RecordedDetector::new())
            .with_clock(|| 1_234);
        let report = pipeline.run().unwrap();
        assert_eq!(report.termination, Termination::TargetReached);

        let text = fs::read_to_string(dir.path().join("correct.csv")).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with(&format!("{},0,1234,", report.run_id)));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn close_failures_after_a_failed_run_are_logged() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let finished = Finished {
            run_id: RunId::from("0badf00d"),
            collected: 2,
            summary: Ok(true),
            frames_closed: Err(Error::Io(io::Error::new(io::ErrorKind::Other, "disk full"))),
            summaries_closed: Err(Error::Io(io::Error::new(io::ErrorKind::Other, "sync failed"))),
        };

        tracing::subscriber::with_default(subscriber, || finished.log_after_failure());

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("summary written after failed run"));
        assert!(text.contains("frame file close failed"));
        assert!(text.contains("disk full"));
        assert!(text.contains("summary file close failed"));
        assert!(text.contains("sync failed"));
    }
}
