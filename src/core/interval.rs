use std::fmt;

/// Closed bound `[a, b]` on a continuous variable. The default interval spans
/// the whole finite range of `f64` and counts as unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub a: f64,
    pub b: f64,
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            a: f64::MIN,
            b: f64::MAX,
        }
    }
}

impl Interval {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    pub fn is_maximal(&self) -> bool {
        self.a == f64::MIN && self.b == f64::MAX
    }

    pub fn contains(&self, x: f64) -> bool {
        self.a <= x && x <= self.b
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_maximal() {
        let ab = Interval::default();
        assert!(ab.is_maximal());
        assert!(ab.contains(0.0));
        assert!(ab.contains(f64::MAX));
    }

    #[test]
    fn narrowed_interval_is_not_maximal() {
        let ab = Interval::new(f64::MIN, 3.0);
        assert!(!ab.is_maximal());
        assert!(ab.contains(3.0));
        assert!(!ab.contains(3.5));
    }
}
