//! Page-space geometry: bounding boxes, ruling segments and the positional
//! filters used to drop running headers/footers and decorative images.
//!
//! All coordinates are in points with the origin at the top-left corner of
//! the page and `y` growing downwards.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
    /// Right edge
    pub x2: f32,
    /// Bottom edge
    pub y2: f32,
}

impl BoundingBox {
    /// Create a box from two corners in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Create a box from its top-left corner and size.
    pub fn from_origin(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// A box with no extent on at least one axis.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Strict overlap on both axes. Touching edges and degenerate boxes
    /// never intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x1 >= self.x1 && other.x2 <= self.x2 && other.y1 >= self.y1 && other.y2 <= self.y2
    }

    /// Whether a point lies inside this box (edges included).
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Distance between the horizontal extents, zero when they overlap.
    pub fn horizontal_gap(&self, other: &BoundingBox) -> f32 {
        (other.x1 - self.x2).max(self.x1 - other.x2).max(0.0)
    }

    /// Distance between the vertical extents, zero when they overlap.
    pub fn vertical_gap(&self, other: &BoundingBox) -> f32 {
        (other.y1 - self.y2).max(self.y1 - other.y2).max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Union of a sequence of boxes, `None` when the sequence is empty.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<BoundingBox> {
        boxes.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(a) => Some(a.union(b)),
        })
    }
}

/// Symmetric strict-overlap test.
pub fn intersects(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.intersects(b)
}

/// Whether a block falls in the running header or footer band.
///
/// A block is in the margin when it starts above `page_height * ratio` or
/// ends below `page_height * (1 - ratio)`.
pub fn is_in_margin(block: &BoundingBox, page_height: f32, margin_ratio: f32) -> bool {
    block.y1 < page_height * margin_ratio || block.y2 > page_height * (1.0 - margin_ratio)
}

/// Whether an image is too small on either axis to be worth indexing
/// (icons, bullets, rules drawn as images).
pub fn is_trivial_image(bbox: &BoundingBox, page_width: f32, page_height: f32, divisor: f32) -> bool {
    bbox.width() < page_width / divisor || bbox.height() < page_height / divisor
}

/// A straight line segment drawn on the page, candidate for a table rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Segment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn length(&self) -> f32 {
        ((self.x2 - self.x1).powi(2) + (self.y2 - self.y1).powi(2)).sqrt()
    }

    pub fn is_horizontal(&self, tolerance: f32) -> bool {
        (self.y2 - self.y1).abs() <= tolerance && (self.x2 - self.x1).abs() > tolerance
    }

    pub fn is_vertical(&self, tolerance: f32) -> bool {
        (self.x2 - self.x1).abs() <= tolerance && (self.y2 - self.y1).abs() > tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_corners() {
        let b = BoundingBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(b, BoundingBox::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }

    #[test]
    fn test_intersects_is_symmetric() {
        let cases = [
            (
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(5.0, 5.0, 15.0, 15.0),
            ),
            (
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(10.0, 0.0, 20.0, 10.0),
            ),
            (
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(2.0, 2.0, 3.0, 3.0),
            ),
            (
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(20.0, 20.0, 30.0, 30.0),
            ),
        ];
        for (a, b) in cases {
            assert_eq!(intersects(&a, &b), intersects(&b, &a));
        }
    }

    #[test]
    fn test_touching_edges_do_not_intersect() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));

        let c = BoundingBox::new(9.9, 0.0, 20.0, 10.0);
        assert!(a.intersects(&c));
    }

    #[test]
    fn test_degenerate_box_never_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let line = BoundingBox::new(5.0, 0.0, 5.0, 10.0);
        let point = BoundingBox::new(5.0, 5.0, 5.0, 5.0);
        assert!(!a.intersects(&line));
        assert!(!line.intersects(&a));
        assert!(!a.intersects(&point));
        assert!(!point.intersects(&point));
    }

    #[test]
    fn test_margin_bands() {
        let page_height = 800.0;
        // Running header starting at y=40 (< 80)
        assert!(is_in_margin(
            &BoundingBox::new(50.0, 40.0, 300.0, 60.0),
            page_height,
            0.1
        ));
        // Footer ending at y=760 (> 720)
        assert!(is_in_margin(
            &BoundingBox::new(50.0, 700.0, 300.0, 760.0),
            page_height,
            0.1
        ));
        // Body text
        assert!(!is_in_margin(
            &BoundingBox::new(50.0, 100.0, 300.0, 700.0),
            page_height,
            0.1
        ));
    }

    #[test]
    fn test_trivial_image_filter() {
        // 612 / 20 = 30.6, 792 / 20 = 39.6
        let icon = BoundingBox::from_origin(100.0, 100.0, 16.0, 16.0);
        let banner = BoundingBox::from_origin(100.0, 100.0, 400.0, 20.0);
        let figure = BoundingBox::from_origin(100.0, 100.0, 300.0, 200.0);
        assert!(is_trivial_image(&icon, 612.0, 792.0, 20.0));
        assert!(is_trivial_image(&banner, 612.0, 792.0, 20.0));
        assert!(!is_trivial_image(&figure, 612.0, 792.0, 20.0));
    }

    #[test]
    fn test_gaps_and_union() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(15.0, 30.0, 20.0, 40.0);
        assert_eq!(a.horizontal_gap(&b), 5.0);
        assert_eq!(b.horizontal_gap(&a), 5.0);
        assert_eq!(a.vertical_gap(&b), 20.0);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, 0.0, 20.0, 40.0));
        assert_eq!(BoundingBox::union_all(&[a, b]), Some(a.union(&b)));
        assert_eq!(BoundingBox::union_all(&[]), None);
    }

    #[test]
    fn test_segment_orientation() {
        assert!(Segment::new(0.0, 10.0, 100.0, 10.4).is_horizontal(1.0));
        assert!(!Segment::new(0.0, 10.0, 100.0, 10.4).is_vertical(1.0));
        assert!(Segment::new(50.0, 0.0, 50.0, 80.0).is_vertical(1.0));
        assert!(!Segment::new(0.0, 0.0, 30.0, 40.0).is_horizontal(1.0));
        assert_eq!(Segment::new(0.0, 0.0, 30.0, 40.0).length(), 50.0);
    }
}
