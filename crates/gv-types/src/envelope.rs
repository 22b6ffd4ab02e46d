use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in the plane.
///
/// Used as optional spatial bounds on tree nodes and buckets so that a
/// bounds filter can prune whole subtrees without loading them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope, normalizing inverted ranges.
    pub fn new(x1: f64, x2: f64, y1: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            max_x: x1.max(x2),
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        }
    }

    /// A degenerate envelope covering a single point.
    pub fn of_point(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow this envelope to include `other`.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Grow this envelope to include the point `(x, y)`.
    pub fn expand_to_include_point(&mut self, x: f64, y: f64) {
        self.expand_to_include(&Envelope::of_point(x, y));
    }

    /// Returns `true` if the two envelopes share at least one point.
    pub fn intersects(&self, other: &Envelope) -> bool {
        !(other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    /// Returns `true` if `other` lies entirely inside this envelope.
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Union of an optional accumulator and an optional envelope.
    pub fn merge(acc: Option<Envelope>, other: Option<&Envelope>) -> Option<Envelope> {
        match (acc, other) {
            (Some(mut a), Some(b)) => {
                a.expand_to_include(b);
                Some(a)
            }
            (None, Some(b)) => Some(*b),
            (a, None) => a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_ranges() {
        let env = Envelope::new(5.0, 1.0, 4.0, -2.0);
        assert_eq!(env.min_x, 1.0);
        assert_eq!(env.max_x, 5.0);
        assert_eq!(env.min_y, -2.0);
        assert_eq!(env.max_y, 4.0);
        assert_eq!(env.width(), 4.0);
        assert_eq!(env.height(), 6.0);
    }

    #[test]
    fn intersects_and_contains() {
        let a = Envelope::new(0.0, 10.0, 0.0, 10.0);
        let b = Envelope::new(5.0, 15.0, 5.0, 15.0);
        let c = Envelope::new(11.0, 12.0, 11.0, 12.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.contains(&Envelope::of_point(3.0, 3.0)));
        assert!(!a.contains(&b));
    }

    #[test]
    fn touching_edges_intersect() {
        let a = Envelope::new(0.0, 1.0, 0.0, 1.0);
        let b = Envelope::new(1.0, 2.0, 1.0, 2.0);
        assert!(a.intersects(&b));
    }

    #[test]
    fn merge_accumulates() {
        let a = Envelope::of_point(1.0, 1.0);
        let b = Envelope::of_point(-1.0, 3.0);
        let merged = Envelope::merge(Envelope::merge(None, Some(&a)), Some(&b)).unwrap();
        assert_eq!(merged, Envelope::new(-1.0, 1.0, 1.0, 3.0));
        assert_eq!(Envelope::merge(None, None), None);
    }
}
