//! Line-delimited detection feed: reading, writing and record parsing.
//!
//! One JSON object per frame:
//! `{"f_idx": 12, "ts": 0.4, "det": [{"track_id": 5, "box": {"x1": .., "y1": .., "x2": .., "y2": ..}}, ...]}`.
//! `frame_index` is accepted for `f_idx`, and `box` may also be a
//! `[x1, y1, x2, y2]` array. A `track_id` of `-1` or `null` marks an
//! unassigned detection. Files are gzip-compressed or plain.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use serde_json::{Map, Value};

use crate::consolidation::{Rect, TrackId, resolve_raw_id};
use crate::error::{RecordError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a feed, transparently decompressing gzip input.
pub fn open_feed(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let mut reader = BufReader::new(File::open(path)?);
    let gzipped = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Output feed, gzip-compressed when the path ends in `.gz`.
pub enum FeedWriter {
    Gzip(GzEncoder<BufWriter<File>>),
    Plain(BufWriter<File>),
}

impl FeedWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        let gzipped = path.extension().is_some_and(|ext| ext == "gz");
        Ok(if gzipped {
            FeedWriter::Gzip(GzEncoder::new(file, Compression::new(3)))
        } else {
            FeedWriter::Plain(file)
        })
    }

    /// Flush everything, writing the gzip trailer if compressed.
    pub fn finish(self) -> Result<()> {
        match self {
            FeedWriter::Gzip(encoder) => encoder.finish()?.flush()?,
            FeedWriter::Plain(mut file) => file.flush()?,
        }
        Ok(())
    }
}

impl Write for FeedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FeedWriter::Gzip(encoder) => encoder.write(buf),
            FeedWriter::Plain(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FeedWriter::Gzip(encoder) => encoder.flush(),
            FeedWriter::Plain(file) => file.flush(),
        }
    }
}

/// Raw lines of a feed, one per record.
///
/// A line that is not valid UTF-8 is yielded as a [`RecordError`] so the
/// caller can skip it; only read failures end the stream with an error.
pub struct RecordLines<R> {
    reader: R,
    buf: Vec<u8>,
}

pub fn record_lines<R: BufRead>(reader: R) -> RecordLines<R> {
    RecordLines {
        reader,
        buf: Vec::new(),
    }
}

impl<R: BufRead> Iterator for RecordLines<R> {
    type Item = io::Result<std::result::Result<String, RecordError>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf[..]);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                let decoded = std::str::from_utf8(line)
                    .map(str::to_owned)
                    .map_err(|err| RecordError::InvalidJson(err.to_string()));
                Some(Ok(decoded))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// Parse one feed line into its JSON object.
pub fn parse_line(line: &str) -> std::result::Result<Map<String, Value>, RecordError> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(RecordError::InvalidJson("record is not an object".into())),
        Err(err) => Err(RecordError::InvalidJson(err.to_string())),
    }
}

pub fn frame_index(record: &Map<String, Value>) -> std::result::Result<u64, RecordError> {
    record
        .get("f_idx")
        .or_else(|| record.get("frame_index"))
        .and_then(Value::as_u64)
        .ok_or(RecordError::MissingField("f_idx"))
}

/// The detections of a frame record. A record without `det` has none.
pub fn detections_mut(
    record: &mut Map<String, Value>,
) -> std::result::Result<&mut [Value], RecordError> {
    match record.get_mut("det") {
        None | Some(Value::Null) => Ok(&mut []),
        Some(Value::Array(dets)) => Ok(dets.as_mut_slice()),
        Some(_) => Err(RecordError::MissingField("det")),
    }
}

/// Identity of the detection at `detection_index` in frame `frame_index`.
///
/// Unassigned detections get the same synthetic identity every time, so the
/// ingestion and enrichment passes agree.
pub fn detection_identity(
    detection: &Value,
    frame_index: u64,
    detection_index: usize,
) -> std::result::Result<TrackId, RecordError> {
    let raw = match detection.get("track_id") {
        None | Some(Value::Null) => None,
        Some(value) => Some(integer(value).ok_or(RecordError::MissingField("track_id"))?),
    };
    resolve_raw_id(raw, frame_index, detection_index)
}

fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

pub fn detection_box(detection: &Value) -> std::result::Result<Rect, RecordError> {
    let missing = RecordError::MissingField("box");
    let corners = match detection.get("box").ok_or(missing.clone())? {
        Value::Object(b) => ["x1", "y1", "x2", "y2"].map(|k| b.get(k).and_then(Value::as_f64)),
        Value::Array(b) if b.len() == 4 => [0, 1, 2, 3].map(|i| b[i].as_f64()),
        _ => return Err(missing),
    };
    match corners {
        [Some(x1), Some(y1), Some(x2), Some(y2)] => {
            Ok(Rect::from_tlbr(x1 as f32, y1 as f32, x2 as f32, y2 as f32))
        }
        _ => Err(missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::synthetic_id;
    use serde_json::json;

    #[test]
    fn test_parse_frame_record() {
        let mut record = parse_line(
            r#"{"f_idx": 4, "ts": 0.1, "det": [{"track_id": 9, "box": {"x1": 1, "y1": 2, "x2": 3, "y2": 6}}]}"#,
        )
        .unwrap();
        assert_eq!(frame_index(&record).unwrap(), 4);
        let dets = detections_mut(&mut record).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(detection_identity(&dets[0], 4, 0).unwrap(), 9);
        assert_eq!(detection_box(&dets[0]).unwrap(), Rect::new(1.0, 2.0, 2.0, 4.0));
    }

    #[test]
    fn test_aliases_and_array_boxes() {
        let record = parse_line(r#"{"frame_index": 7, "det": []}"#).unwrap();
        assert_eq!(frame_index(&record).unwrap(), 7);
        let det = json!({"track_id": 3.0, "box": [0, 0, 10, 10]});
        assert_eq!(detection_identity(&det, 0, 0).unwrap(), 3);
        assert_eq!(detection_box(&det).unwrap(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_unassigned_detections_are_synthetic() {
        let unassigned = json!({"track_id": -1, "box": [0, 0, 1, 1]});
        let missing = json!({"box": [0, 0, 1, 1]});
        let expected = synthetic_id(12, 2).unwrap();
        assert_eq!(detection_identity(&unassigned, 12, 2).unwrap(), expected);
        assert_eq!(detection_identity(&missing, 12, 2).unwrap(), expected);
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(parse_line("{not json"), Err(RecordError::InvalidJson(_))));
        assert!(matches!(parse_line("[1, 2]"), Err(RecordError::InvalidJson(_))));
        let record = parse_line(r#"{"det": []}"#).unwrap();
        assert_eq!(frame_index(&record), Err(RecordError::MissingField("f_idx")));
        assert_eq!(
            detection_box(&json!({"box": {"x1": 1}})),
            Err(RecordError::MissingField("box"))
        );
        assert_eq!(
            detection_identity(&json!({"track_id": "seven"}), 0, 0),
            Err(RecordError::MissingField("track_id"))
        );
    }

    #[test]
    fn test_record_lines_flag_invalid_utf8() {
        let raw: &[u8] = b"{\"f_idx\": 1}\r\n\xff\xfe garbage\n\nlast";
        let lines: Vec<_> = record_lines(raw).map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], Ok(r#"{"f_idx": 1}"#.to_string()));
        assert!(matches!(lines[1], Err(RecordError::InvalidJson(_))));
        assert_eq!(lines[2], Ok(String::new()));
        assert_eq!(lines[3], Ok("last".to_string()));
    }

    #[test]
    fn test_gzip_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.jsonl.gz");
        let mut writer = FeedWriter::create(&path).unwrap();
        writeln!(writer, r#"{{"f_idx": 1, "det": []}}"#).unwrap();
        writer.finish().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(&GZIP_MAGIC));
        let lines: Vec<String> = open_feed(&path).unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec![r#"{"f_idx": 1, "det": []}"#.to_string()]);
    }
}
