use std::{error::Error, fmt::Display, num::ParseFloatError, ops::Range, str::FromStr};

use mzpeaks::coordinate::Span1D;
use serde::{Deserialize, Serialize};

/// A rectangle over retention time (minutes) and m/z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_rt: f64,
    pub max_rt: f64,
    pub min_mz: f64,
    pub max_mz: f64,
}

impl Bounds {
    /// The upper retention time used when nothing narrower was requested
    pub const UNBOUNDED_RT: f64 = 1_000_000.0;
    /// The upper m/z bound used when resolving a selection with nothing narrower requested
    pub const UNBOUNDED_MZ: f64 = 1_000_000.0;
    /// Any window wider than this, starting at zero, is streamed without the index
    pub const FULL_SCAN_RT: f64 = 1000.0;

    /// Defaults for drawing the map
    pub const MAP_DEFAULT: Bounds = Bounds::new(0.0, Self::UNBOUNDED_RT, 0.0, 2000.0);
    /// Defaults for a resolved selection
    pub const SELECTION_DEFAULT: Bounds =
        Bounds::new(0.0, Self::UNBOUNDED_RT, 0.0, Self::UNBOUNDED_MZ);

    pub const fn new(min_rt: f64, max_rt: f64, min_mz: f64, max_mz: f64) -> Self {
        Self {
            min_rt,
            max_rt,
            min_mz,
            max_mz,
        }
    }

    pub fn contains_time(&self, time: f64) -> bool {
        self.min_rt <= time && time <= self.max_rt
    }

    pub fn contains_mz(&self, mz: f64) -> bool {
        self.min_mz <= mz && mz <= self.max_mz
    }

    /// Whether the retention time window covers essentially every acquisition time
    pub fn covers_full_time_domain(&self) -> bool {
        self.min_rt <= 0.0 && self.max_rt > Self::FULL_SCAN_RT
    }

    pub fn mz_width(&self) -> f64 {
        self.max_mz - self.min_mz
    }

    pub fn time_range(&self) -> AxisRange {
        AxisRange::new(self.min_rt, self.max_rt)
    }

    pub fn mz_range(&self) -> AxisRange {
        AxisRange::new(self.min_mz, self.max_mz)
    }

    pub fn with_time_range(mut self, range: AxisRange) -> Self {
        self.min_rt = range.start;
        self.max_rt = range.end;
        self
    }

    pub fn with_mz_range(mut self, range: AxisRange) -> Self {
        self.min_mz = range.start;
        self.max_mz = range.end;
        self
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::MAP_DEFAULT
    }
}

/// A closed interval along one axis of the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: f64,
    pub end: f64,
}

impl AxisRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

impl Span1D for AxisRange {
    type DimType = f64;

    fn start(&self) -> Self::DimType {
        self.start
    }

    fn end(&self) -> Self::DimType {
        self.end
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: f64::INFINITY,
        }
    }
}

#[derive(Debug)]
pub enum AxisRangeParseError {
    MalformedStart(ParseFloatError),
    MalformedEnd(ParseFloatError),
    /// More than one separator, as in `1-2-3` or a negative bound
    TooManyParts(String),
    Inverted { start: f64, end: f64 },
}

impl Display for AxisRangeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisRangeParseError::MalformedStart(e) => {
                write!(f, "Failed to parse range start {e}")
            }
            AxisRangeParseError::MalformedEnd(e) => {
                write!(f, "Failed to parse range end {e}")
            }
            AxisRangeParseError::TooManyParts(s) => {
                write!(f, "Expected at most two range bounds, got {s:?}")
            }
            AxisRangeParseError::Inverted { start, end } => {
                write!(f, "Range start {start} is after its end {end}")
            }
        }
    }
}

impl Error for AxisRangeParseError {}

impl FromStr for AxisRange {
    type Err = AxisRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start_s, end_s) = match [' ', ':', '-'].into_iter().find(|c| s.contains(*c)) {
            Some(sep) => {
                let mut parts = s.split(sep);
                let start_s = parts.next().unwrap_or_default();
                let end_s = parts.next().unwrap_or_default();
                if parts.next().is_some() {
                    return Err(AxisRangeParseError::TooManyParts(s.to_string()));
                }
                (start_s, end_s)
            }
            None => (s, ""),
        };
        let start = match start_s.trim() {
            "" => 0.0,
            token => token.parse().map_err(AxisRangeParseError::MalformedStart)?,
        };
        let end = match end_s.trim() {
            "" => f64::INFINITY,
            token => token.parse().map_err(AxisRangeParseError::MalformedEnd)?,
        };
        if start > end {
            return Err(AxisRangeParseError::Inverted { start, end });
        }
        Ok(AxisRange { start, end })
    }
}

impl From<Range<f64>> for AxisRange {
    fn from(value: Range<f64>) -> Self {
        Self::new(value.start, value.end)
    }
}

impl From<(f64, f64)> for AxisRange {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_range_fromstr() -> Result<(), AxisRangeParseError> {
        let t: AxisRange = "52.0-".parse()?;
        assert_eq!(t.start(), 52.0);
        assert_eq!(t.end(), f64::INFINITY);

        let t: AxisRange = "-52.0".parse()?;
        assert_eq!(t.start(), 0.0);
        assert_eq!(t.end(), 52.0);

        let t: AxisRange = "32:52.0".parse()?;
        assert_eq!(t.start(), 32.0);
        assert_eq!(t.end(), 52.0);

        let t: AxisRange = "-".parse()?;
        assert_eq!(t.start(), 0.0);
        assert_eq!(t.end(), f64::INFINITY);

        let t: AxisRange = "12.5".parse()?;
        assert_eq!(t.start(), 12.5);
        assert_eq!(t.end(), f64::INFINITY);
        Ok(())
    }

    #[test]
    fn test_range_fromstr_malformed() {
        assert!(matches!(
            "a-".parse::<AxisRange>(),
            Err(AxisRangeParseError::MalformedStart(_))
        ));
        assert!(matches!(
            "-b".parse::<AxisRange>(),
            Err(AxisRangeParseError::MalformedEnd(_))
        ));
        assert!(matches!(
            "a-b".parse::<AxisRange>(),
            Err(AxisRangeParseError::MalformedStart(_))
        ));
    }

    #[test]
    fn test_range_fromstr_ambiguous() {
        assert!(matches!(
            "1-2-3".parse::<AxisRange>(),
            Err(AxisRangeParseError::TooManyParts(_))
        ));
        assert!(matches!(
            "-5-10".parse::<AxisRange>(),
            Err(AxisRangeParseError::TooManyParts(_))
        ));
        assert!(matches!(
            "20:10".parse::<AxisRange>(),
            Err(AxisRangeParseError::Inverted { .. })
        ));
        let t: AxisRange = "10:10".parse().unwrap();
        assert_eq!(t.width(), 0.0);
    }

    #[test]
    fn test_bounds_containment() {
        let b = Bounds::new(1.0, 2.0, 100.0, 200.0);
        assert!(b.contains_time(1.0));
        assert!(b.contains_time(2.0));
        assert!(!b.contains_time(2.01));
        assert!(b.contains_mz(150.0));
        assert!(!b.contains_mz(99.9));
        assert!(!b.covers_full_time_domain());
        assert!(Bounds::MAP_DEFAULT.covers_full_time_domain());
        assert_eq!(Bounds::default().max_mz, 2000.0);
        assert_eq!(Bounds::SELECTION_DEFAULT.max_mz, 1_000_000.0);
    }
}
