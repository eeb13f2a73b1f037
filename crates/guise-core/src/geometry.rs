//! Integer rectangle geometry and the frame-to-frame continuity test.

use serde::{Deserialize, Serialize};

/// Fraction of intersection-over-bounding-span above which two detections
/// are judged to be the same tracked subject.
const CONTINUITY_THRESHOLD: f64 = 0.5;

/// Axis-aligned integer rectangle. A zero-area rectangle signals
/// "no detection".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The zero rectangle, used as the "no detection" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Overlapping region of two rectangles; the zero rectangle if disjoint.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= x as i64 || bottom <= y as i64 {
            return Rect::empty();
        }

        Rect::new(x, y, (right - x as i64) as u32, (bottom - y as i64) as u32)
    }

    /// Smallest rectangle containing both `self` and `other`
    /// (the bounding span, not the union of areas).
    pub fn span(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect::new(x, y, (right - x as i64) as u32, (bottom - y as i64) as u32)
    }

    /// Inner crop leaving a `num/den` margin untouched on each side.
    ///
    /// `inner_margin(1, 10)` yields the centered 80%-sized rectangle used to
    /// give the blend a natural frame around the replaced face. Margins of
    /// half the extent or more leave nothing: the result is the zero rect.
    pub fn inner_margin(&self, num: u32, den: u32) -> Rect {
        let mx = self.width * num / den;
        let my = self.height * num / den;
        let keep = den.saturating_sub(2 * num);
        Rect::new(
            self.x + mx as i32,
            self.y + my as i32,
            self.width * keep / den,
            self.height * keep / den,
        )
    }
}

/// Same-subject-across-frames heuristic: true iff the intersection covers
/// more than half of the bounding span of the two rectangles.
///
/// This only suppresses single-frame detection jitter; it is not identity
/// verification. Callers must gate on `!rect.is_empty()` first — a
/// zero-area input means "no continuity" regardless of the ratio.
pub fn same_subject(a: &Rect, b: &Rect) -> bool {
    let span = a.span(b);
    if span.area() == 0 {
        return false;
    }
    let inter = a.intersection(b);
    (inter.area() as f64 / span.area() as f64) > CONTINUITY_THRESHOLD
}

/// The largest rectangle by area, or `None` for an empty slice.
pub fn largest_rect(rects: &[Rect]) -> Option<Rect> {
    rects.iter().copied().max_by_key(Rect::area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_overlapping() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        let inter = a.intersection(&b);
        assert_eq!(inter, Rect::new(5, 5, 5, 5));
    }

    #[test]
    fn test_intersection_disjoint_is_zero() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 10, 10);
        assert!(a.intersection(&b).is_empty());
    }

    #[test]
    fn test_span_contains_both() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 10, 10);
        let span = a.span(&b);
        assert_eq!(span, Rect::new(0, 0, 30, 30));
    }

    #[test]
    fn test_same_subject_reflexive() {
        let r = Rect::new(3, 7, 40, 50);
        assert!(same_subject(&r, &r));
    }

    #[test]
    fn test_same_subject_symmetric() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(10, 10, 100, 100);
        assert_eq!(same_subject(&a, &b), same_subject(&b, &a));
    }

    #[test]
    fn test_same_subject_high_overlap() {
        // IoU-style ratio well above 0.5
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(5, 5, 100, 100);
        assert!(same_subject(&a, &b));
    }

    #[test]
    fn test_same_subject_disjoint() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(100, 100, 10, 10);
        assert!(!same_subject(&a, &b));
    }

    #[test]
    fn test_same_subject_degenerate_span() {
        let z = Rect::empty();
        assert!(!same_subject(&z, &z));
    }

    #[test]
    fn test_largest_rect() {
        let rects = [
            Rect::new(0, 0, 10, 10),
            Rect::new(0, 0, 50, 50),
            Rect::new(0, 0, 20, 20),
        ];
        assert_eq!(largest_rect(&rects), Some(Rect::new(0, 0, 50, 50)));
        assert_eq!(largest_rect(&[]), None);
    }

    #[test]
    fn test_inner_margin_80_percent() {
        let r = Rect::new(100, 200, 50, 80);
        let inner = r.inner_margin(1, 10);
        assert_eq!(inner, Rect::new(105, 208, 40, 64));
    }

    #[test]
    fn test_inner_margin_oversized_margin_is_empty() {
        // 3/5 margin per side consumes more than the whole rect; no
        // underflow, just a zero-area result.
        let r = Rect::new(0, 0, 50, 80);
        assert!(r.inner_margin(3, 5).is_empty());
        assert!(r.inner_margin(1, 2).is_empty());
    }
}
