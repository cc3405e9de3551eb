//! Identity handles and the synthetic identity range.
//!
//! Native identities (assigned by the upstream tracker) and split-generated
//! identities live in `[0, SYNTHETIC_BASE)`. Synthetic identities set bit 62
//! and pack `(frame_index, detection_index)` into the low bits, so they can
//! never collide with a native identity or with each other.

use crate::error::RecordError;

/// Integer handle naming a track.
pub type TrackId = u64;

/// First identity of the synthetic range.
pub const SYNTHETIC_BASE: TrackId = 1 << 62;

const DETECTION_BITS: u32 = 20;
const FRAME_BITS: u32 = 42;

/// Largest detection index (exclusive) that can be given a synthetic identity.
pub const MAX_DETECTIONS_PER_FRAME: usize = 1 << DETECTION_BITS;
/// Largest frame index (exclusive) that can be given a synthetic identity.
pub const MAX_SYNTHETIC_FRAME: u64 = 1 << FRAME_BITS;

/// Track id the upstream tracker uses for "unassigned".
pub const UNASSIGNED: i64 = -1;

/// Derive the synthetic identity of an unassigned detection.
///
/// Returns `None` when the frame or detection index does not fit the
/// reserved bit layout.
pub fn synthetic_id(frame_index: u64, detection_index: usize) -> Option<TrackId> {
    if frame_index >= MAX_SYNTHETIC_FRAME || detection_index >= MAX_DETECTIONS_PER_FRAME {
        return None;
    }
    Some(SYNTHETIC_BASE | (frame_index << DETECTION_BITS) | detection_index as u64)
}

/// Recover `(frame_index, detection_index)` from a synthetic identity.
pub fn synthetic_origin(id: TrackId) -> Option<(u64, usize)> {
    if !is_synthetic(id) {
        return None;
    }
    let low = id & !SYNTHETIC_BASE;
    let index = (low & (MAX_DETECTIONS_PER_FRAME as u64 - 1)) as usize;
    Some((low >> DETECTION_BITS, index))
}

#[inline]
pub fn is_synthetic(id: TrackId) -> bool {
    id >= SYNTHETIC_BASE
}

/// Map the raw `track_id` of a detection at `(frame_index, detection_index)`
/// to its identity. `None` and `-1` mean unassigned.
pub fn resolve_raw_id(
    raw: Option<i64>,
    frame_index: u64,
    detection_index: usize,
) -> Result<TrackId, RecordError> {
    match raw {
        None | Some(UNASSIGNED) => synthetic_id(frame_index, detection_index).ok_or(
            RecordError::SyntheticOutOfRange {
                frame: frame_index,
                index: detection_index,
            },
        ),
        Some(id) if id >= 0 && (id as u64) < SYNTHETIC_BASE => Ok(id as u64),
        Some(id) => Err(RecordError::TrackIdOutOfRange(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_synthetic_layout() {
        let id = synthetic_id(12, 3).unwrap();
        assert!(is_synthetic(id));
        assert_eq!(synthetic_origin(id), Some((12, 3)));
        assert!(!is_synthetic(SYNTHETIC_BASE - 1));
        assert_eq!(synthetic_origin(42), None);
    }

    #[test]
    fn test_out_of_range_synthetic() {
        assert_eq!(synthetic_id(MAX_SYNTHETIC_FRAME, 0), None);
        assert_eq!(synthetic_id(0, MAX_DETECTIONS_PER_FRAME), None);
        assert!(synthetic_id(MAX_SYNTHETIC_FRAME - 1, MAX_DETECTIONS_PER_FRAME - 1).is_some());
    }

    #[test]
    fn test_resolve_raw_id() {
        assert_eq!(resolve_raw_id(Some(7), 1, 0), Ok(7));
        assert_eq!(resolve_raw_id(None, 4, 2), Ok(synthetic_id(4, 2).unwrap()));
        assert_eq!(resolve_raw_id(Some(-1), 4, 2), Ok(synthetic_id(4, 2).unwrap()));
        assert_eq!(
            resolve_raw_id(Some(-5), 0, 0),
            Err(RecordError::TrackIdOutOfRange(-5))
        );
        assert_eq!(
            resolve_raw_id(Some(SYNTHETIC_BASE as i64), 0, 0),
            Err(RecordError::TrackIdOutOfRange(SYNTHETIC_BASE as i64))
        );
    }

    proptest! {
        #[test]
        fn synthetic_ids_are_distinct(
            f1 in 0..MAX_SYNTHETIC_FRAME,
            d1 in 0..MAX_DETECTIONS_PER_FRAME,
            f2 in 0..MAX_SYNTHETIC_FRAME,
            d2 in 0..MAX_DETECTIONS_PER_FRAME,
            native in 0..SYNTHETIC_BASE,
        ) {
            let a = synthetic_id(f1, d1).unwrap();
            let b = synthetic_id(f2, d2).unwrap();
            prop_assert_eq!(a == b, (f1, d1) == (f2, d2));
            prop_assert_ne!(a, native);
            prop_assert_eq!(synthetic_origin(a), Some((f1, d1)));
        }
    }
}
