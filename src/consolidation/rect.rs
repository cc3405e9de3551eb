use nalgebra::Point2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Detection rectangle stored in TLWH form.
///
/// Feed records carry TLBR corners (`x1, y1, x2, y2`); stitching only needs
/// box centres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from TLBR corners (x1, y1, x2, y2).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Euclidean distance between the two box centres, in pixels.
    #[inline]
    pub fn center_distance(&self, other: &Rect) -> f32 {
        nalgebra::distance(&self.center(), &other.center())
    }
}

/// Centre distance matrix between two sets of boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `from`
/// and N is the length of `to`.
pub fn center_distance_batch(from: &[Rect], to: &[Rect]) -> Array2<f32> {
    let mut dists = Array2::zeros((from.len(), to.len()));
    for (i, a) in from.iter().enumerate() {
        for (j, b) in to.iter().enumerate() {
            dists[[i, j]] = a.center_distance(b);
        }
    }
    dists
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tlbr_round_trip() {
        let rect = Rect::from_tlbr(10.0, 20.0, 40.0, 60.0);
        assert_eq!(rect, Rect::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn test_center() {
        let rect = Rect::from_tlbr(0.0, 0.0, 10.0, 20.0);
        assert_eq!(rect.center(), Point2::new(5.0, 10.0));
    }

    #[test]
    fn test_center_distance() {
        let a = Rect::from_tlbr(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_tlbr(30.0, 40.0, 40.0, 50.0);
        // centres (5, 5) and (35, 45): a 30-40-50 triangle
        assert!((a.center_distance(&b) - 50.0).abs() < 1e-4);
        assert_eq!(a.center_distance(&a), 0.0);
    }

    #[test]
    fn test_distance_batch_shape() {
        let a = [Rect::new(0.0, 0.0, 2.0, 2.0)];
        let b = [Rect::new(0.0, 0.0, 2.0, 2.0), Rect::new(3.0, 4.0, 2.0, 2.0)];
        let dists = center_distance_batch(&a, &b);
        assert_eq!(dists.dim(), (1, 2));
        assert_eq!(dists[[0, 0]], 0.0);
        assert!((dists[[0, 1]] - 5.0).abs() < 1e-5);
    }
}
