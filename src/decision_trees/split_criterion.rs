use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, Result};
use crate::core::missing::is_missing;

/// Largest number of categories a subset split can encode in its mask.
pub const MAX_SUBSET_SIZE: u32 = 32;

/// Binary test on one variable of a sample. `select` returns `0` for the left
/// side and `1` for the right side; a missing value always goes right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SplitCriterion {
    #[default]
    None,
    Single { variable: usize, value: u32 },
    Subset { variable: usize, mask: u32 },
    Threshold { variable: usize, value: f64 },
}

impl SplitCriterion {
    pub fn is_defined(&self) -> bool {
        !matches!(self, SplitCriterion::None)
    }

    pub fn variable(&self) -> Option<usize> {
        match *self {
            SplitCriterion::None => None,
            SplitCriterion::Single { variable, .. }
            | SplitCriterion::Subset { variable, .. }
            | SplitCriterion::Threshold { variable, .. } => Some(variable),
        }
    }

    /// Side of the split that `x` falls on.
    ///
    /// # Panics
    /// On an undefined split; callers that may hold one use [`SplitCriterion::try_select`].
    #[inline]
    pub fn select(&self, x: &[f64]) -> usize {
        match self.try_select(x) {
            Some(side) => side,
            None => panic!("cannot select a side with an undefined split"),
        }
    }

    #[inline]
    pub fn try_select(&self, x: &[f64]) -> Option<usize> {
        let side = match *self {
            SplitCriterion::None => return None,
            SplitCriterion::Single { variable, value } => x[variable] == value as f64,
            SplitCriterion::Subset { variable, .. } => {
                let v = x[variable];
                !is_missing(v) && v >= 0.0 && self.contains(v as u32)
            }
            SplitCriterion::Threshold { variable, value } => x[variable] < value,
        };
        Some(if side { 0 } else { 1 })
    }

    /// Whether `category` belongs to the left side of a subset split.
    pub fn contains(&self, category: u32) -> bool {
        match *self {
            SplitCriterion::Subset { mask, .. } => {
                category < MAX_SUBSET_SIZE && mask & (1 << category) != 0
            }
            _ => false,
        }
    }
}

impl fmt::Display for SplitCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SplitCriterion::None => write!(f, "NoSplit()"),
            SplitCriterion::Single { variable, value } => write!(f, "SingleSplit({variable}, {value})"),
            SplitCriterion::Subset { variable, mask } => write!(f, "SubsetSplit({variable}, {mask:032b})"),
            SplitCriterion::Threshold { variable, value } => {
                write!(f, "ThresholdSplit({variable}, {value})")
            }
        }
    }
}

impl FromStr for SplitCriterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidOption(format!("cannot parse split '{s}'"));
        let open = s.find('(').ok_or_else(invalid)?;
        let name = &s[..open];
        let body = s[open + 1..].strip_suffix(')').ok_or_else(invalid)?;

        if name == "NoSplit" {
            return if body.trim().is_empty() {
                Ok(SplitCriterion::None)
            } else {
                Err(invalid())
            };
        }

        let (variable, value) = body.split_once(',').ok_or_else(invalid)?;
        let variable: usize = variable.trim().parse().map_err(|_| invalid())?;
        let value = value.trim();

        match name {
            "SingleSplit" => Ok(SplitCriterion::Single {
                variable,
                value: value.parse().map_err(|_| invalid())?,
            }),
            "SubsetSplit" => Ok(SplitCriterion::Subset {
                variable,
                mask: u32::from_str_radix(value, 2).map_err(|_| invalid())?,
            }),
            "ThresholdSplit" => Ok(SplitCriterion::Threshold {
                variable,
                value: value.parse().map_err(|_| invalid())?,
            }),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::missing::MISSING;

    #[test]
    fn select_per_kind() {
        let x = [1.0, 3.0, 7.5];
        assert_eq!(SplitCriterion::Single { variable: 0, value: 1 }.select(&x), 0);
        assert_eq!(SplitCriterion::Single { variable: 1, value: 1 }.select(&x), 1);
        assert_eq!(SplitCriterion::Threshold { variable: 2, value: 8.0 }.select(&x), 0);
        assert_eq!(SplitCriterion::Threshold { variable: 2, value: 7.5 }.select(&x), 1);

        let subset = SplitCriterion::Subset { variable: 1, mask: 0b1010 };
        assert_eq!(subset.select(&x), 0);
        assert!(subset.contains(1));
        assert!(!subset.contains(0));
        assert!(!subset.contains(40));
    }

    #[test]
    fn missing_values_go_right() {
        let x = [MISSING];
        assert_eq!(SplitCriterion::Single { variable: 0, value: 0 }.select(&x), 1);
        assert_eq!(SplitCriterion::Subset { variable: 0, mask: u32::MAX }.select(&x), 1);
        assert_eq!(SplitCriterion::Threshold { variable: 0, value: 1.0 }.select(&x), 1);
    }

    #[test]
    fn undefined_split_has_no_side() {
        assert_eq!(SplitCriterion::None.try_select(&[1.0]), None);
        assert!(!SplitCriterion::None.is_defined());
        assert_eq!(SplitCriterion::None.variable(), None);
    }

    #[test]
    #[should_panic]
    fn select_on_undefined_split_panics() {
        SplitCriterion::None.select(&[1.0]);
    }

    #[test]
    fn text_form_round_trips() {
        let splits = [
            SplitCriterion::None,
            SplitCriterion::Single { variable: 6, value: 0 },
            SplitCriterion::Subset { variable: 3, mask: 0b1011 },
            SplitCriterion::Threshold { variable: 3, value: 131.37 },
        ];
        for split in splits {
            let text = split.to_string();
            assert_eq!(text.parse::<SplitCriterion>().unwrap(), split);
        }
        assert_eq!(
            SplitCriterion::Subset { variable: 3, mask: 0b1011 }.to_string(),
            "SubsetSplit(3, 00000000000000000000000000001011)"
        );
        assert_eq!(
            SplitCriterion::Threshold { variable: 2, value: 5.0 }.to_string(),
            "ThresholdSplit(2, 5)"
        );
    }

    #[test]
    fn malformed_text_is_rejected() {
        for text in ["Split(1, 2)", "ThresholdSplit(1 2)", "SingleSplit(a, 2)", "NoSplit(1)", "SubsetSplit(1, 102)"] {
            assert!(text.parse::<SplitCriterion>().is_err(), "{text}");
        }
        assert_eq!(
            "ThresholdSplit(2, 5.0)".parse::<SplitCriterion>().unwrap(),
            SplitCriterion::Threshold { variable: 2, value: 5.0 }
        );
    }
}
