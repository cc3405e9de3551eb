//! Streaming ingestion of a detection feed into tracks.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::consolidation::IdentityState;
use crate::error::{RecordError, Result};
use crate::integration::cancel::CancelToken;
use crate::integration::feed;

/// Counts from one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub frames: usize,
    pub detections: usize,
    /// Lines that were not a usable frame record.
    pub skipped_records: usize,
    /// Detections dropped from otherwise valid records.
    pub skipped_detections: usize,
}

/// Aggregate every detection of `reader` into tracks.
///
/// Malformed lines and detections are skipped and counted. I/O errors and
/// cancellation abort the pass.
pub fn load<R: BufRead>(reader: R, cancel: &CancelToken) -> Result<(IdentityState, LoadReport)> {
    let mut state = IdentityState::new();
    let mut report = LoadReport::default();

    for (line_no, line) in feed::record_lines(reader).enumerate() {
        cancel.check()?;
        let line = match line? {
            Ok(line) => line,
            Err(err) => {
                debug!(line = line_no + 1, error = %err, "skipping record");
                report.skipped_records += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let mut record = match feed::parse_line(&line) {
            Ok(record) => record,
            Err(err) => {
                debug!(line = line_no + 1, error = %err, "skipping record");
                report.skipped_records += 1;
                continue;
            }
        };
        let frame = match feed::frame_index(&record) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(line = line_no + 1, error = %err, "skipping record");
                report.skipped_records += 1;
                continue;
            }
        };
        let detections = match feed::detections_mut(&mut record) {
            Ok(detections) => detections,
            Err(err) => {
                debug!(line = line_no + 1, error = %err, "skipping record");
                report.skipped_records += 1;
                continue;
            }
        };

        report.frames += 1;
        for (index, detection) in detections.iter().enumerate() {
            match ingest(&mut state, detection, frame, index) {
                Ok(()) => report.detections += 1,
                Err(err) => {
                    trace!(frame, index, error = %err, "skipping detection");
                    report.skipped_detections += 1;
                }
            }
        }
    }

    info!(
        frames = report.frames,
        detections = report.detections,
        tracks = state.store().len(),
        skipped_records = report.skipped_records,
        skipped_detections = report.skipped_detections,
        "feed loaded"
    );
    Ok((state, report))
}

fn ingest(
    state: &mut IdentityState,
    detection: &serde_json::Value,
    frame: u64,
    index: usize,
) -> std::result::Result<(), RecordError> {
    let id = feed::detection_identity(detection, frame, index)?;
    let rect = feed::detection_box(detection)?;
    state.append(id, frame, rect)
}

pub fn load_path(path: &Path, cancel: &CancelToken) -> Result<(IdentityState, LoadReport)> {
    load(feed::open_feed(path)?, cancel)
}

/// Run [`load_path`] on a worker thread so an interactive caller is not
/// blocked. Cancel through `cancel`.
pub fn spawn_load(
    path: PathBuf,
    cancel: CancelToken,
) -> JoinHandle<Result<(IdentityState, LoadReport)>> {
    thread::spawn(move || load_path(&path, &cancel))
}
