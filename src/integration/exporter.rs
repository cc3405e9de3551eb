//! Resolving the final lineage into downstream outputs.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::consolidation::{IdentityState, TrackId};
use crate::error::Result;
use crate::integration::cancel::CancelToken;
use crate::integration::feed;

/// `{original identity: role}` for every identity whose master is labelled.
pub fn identity_map(state: &IdentityState) -> Result<BTreeMap<TrackId, String>> {
    let mut map = BTreeMap::new();
    for id in state.lineage().identities() {
        let (_, track) = state.track(id)?;
        if !track.role().is_default() {
            map.insert(id, track.role().to_string());
        }
    }
    Ok(map)
}

/// Write the identity map as a JSON object keyed by identity.
pub fn write_identity_map<W: Write>(state: &IdentityState, writer: W) -> Result<usize> {
    let map = identity_map(state)?;
    serde_json::to_writer_pretty(writer, &map)?;
    info!(identities = map.len(), "identity map written");
    Ok(map.len())
}

/// Counts from one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichReport {
    pub frames: usize,
    pub detections: usize,
    /// Detections whose identity is not in the lineage; they are written
    /// with the default role and a null `master_id`.
    pub unresolved: usize,
    pub skipped_records: usize,
}

/// Re-read the feed and append `role` and `master_id` to every detection.
///
/// One record is held in memory at a time. Unusable lines are dropped and
/// counted; every other field passes through untouched.
pub fn enrich<R: BufRead, W: Write>(
    state: &IdentityState,
    reader: R,
    mut writer: W,
    cancel: &CancelToken,
) -> Result<EnrichReport> {
    let mut report = EnrichReport::default();
    for line in feed::record_lines(reader) {
        cancel.check()?;
        let Ok(line) = line? else {
            report.skipped_records += 1;
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(mut record) = feed::parse_line(&line) else {
            report.skipped_records += 1;
            continue;
        };
        let Ok(frame) = feed::frame_index(&record) else {
            report.skipped_records += 1;
            continue;
        };
        let Ok(detections) = feed::detections_mut(&mut record) else {
            report.skipped_records += 1;
            continue;
        };

        for (index, detection) in detections.iter_mut().enumerate() {
            let resolved = feed::detection_identity(detection, frame, index)
                .ok()
                .and_then(|id| state.track(id).ok());
            let (role, master) = match resolved {
                Some((master, track)) => (track.role().to_string(), Value::from(master)),
                None => {
                    report.unresolved += 1;
                    (crate::consolidation::IGNORE.to_string(), Value::Null)
                }
            };
            if let Value::Object(fields) = detection {
                fields.insert("role".into(), Value::String(role));
                fields.insert("master_id".into(), master);
            }
            report.detections += 1;
        }

        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        report.frames += 1;
    }
    writer.flush()?;
    debug!(?report, "enrichment finished");
    Ok(report)
}
