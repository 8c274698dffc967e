/// Sentinel stored in a dataset cell whose value is unknown.
pub const MISSING: f64 = f64::NAN;

#[inline]
pub fn is_missing(x: f64) -> bool {
    x.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_the_only_missing_value() {
        assert!(is_missing(MISSING));
        assert!(is_missing(-f64::NAN));
        assert!(!is_missing(0.0));
        assert!(!is_missing(f64::INFINITY));
        assert!(!is_missing(f64::MIN));
    }
}
