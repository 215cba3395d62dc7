//! Lazily stream the spectra of a run that fall within a retention time window
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bounds::{AxisRange, Bounds};
use crate::locate::{is_time_monotonic, locate_time_index};
use crate::run::{MapSpectrum, RunAccessError, SpectrumRun};

/// How a [`RangeStream`] should visit the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamStrategy {
    #[default]
    /// Use the retention time index unless the window spans the whole run
    Auto,
    /// Always read every spectrum from the start of the run
    Linear,
    /// Always use the retention time index, even for the whole run
    Indexed,
}

impl Display for StreamStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Forward iteration, ignoring spectra before `skip_below`
    Linear { skip_below: usize },
    /// Random access over `next..end`
    Indexed { next: usize, end: usize },
}

/// A single pass over the spectra of a run restricted to a retention time window.
///
/// When the window spans the whole run every spectrum is read in order. Otherwise the window edges
/// are located by binary search and only the spectra between them are read. Any failure to locate
/// or read through the index falls back to forward iteration so no spectrum is lost, and none is
/// yielded twice.
///
/// The indexed window may include one spectrum past `max_rt`, callers filter by time themselves.
pub struct RangeStream<'a, R: SpectrumRun + ?Sized> {
    run: &'a mut R,
    window: AxisRange,
    cursor: Cursor,
}

impl<'a, R: SpectrumRun + ?Sized> RangeStream<'a, R> {
    pub fn new(run: &'a mut R, min_rt: f64, max_rt: f64) -> Self {
        Self::with_strategy(run, min_rt, max_rt, StreamStrategy::Auto, false)
    }

    pub fn with_strategy(
        run: &'a mut R,
        min_rt: f64,
        max_rt: f64,
        strategy: StreamStrategy,
        verify_monotonic: bool,
    ) -> Self {
        let window = AxisRange::new(min_rt, max_rt);
        let bounds = Bounds::MAP_DEFAULT.with_time_range(window);
        let use_index = match strategy {
            StreamStrategy::Auto => !bounds.covers_full_time_domain(),
            StreamStrategy::Linear => false,
            StreamStrategy::Indexed => true,
        };

        let cursor = if !use_index {
            debug!("Streaming {min_rt:0.3}-{max_rt:0.3} by linear scan");
            Self::start_linear(run, 0)
        } else if verify_monotonic && !is_time_monotonic(run) {
            warn!("Retention times are not monotonic, streaming by linear scan");
            Self::start_linear(run, 0)
        } else {
            match Self::locate_window(run, window) {
                Ok((next, end)) => {
                    debug!("Streaming {min_rt:0.3}-{max_rt:0.3} from index {next} to {end}");
                    Cursor::Indexed { next, end }
                }
                Err(e) => {
                    warn!("Failed to index {min_rt:0.3}-{max_rt:0.3}, streaming by linear scan: {e}");
                    Self::start_linear(run, 0)
                }
            }
        };
        Self {
            run,
            window,
            cursor,
        }
    }

    fn start_linear(run: &mut R, skip_below: usize) -> Cursor {
        run.rewind();
        Cursor::Linear { skip_below }
    }

    fn locate_window(run: &mut R, window: AxisRange) -> Result<(usize, usize), RunAccessError> {
        let n = run.len();
        let left = locate_time_index(run, window.start)?;
        let mut right = locate_time_index(run, window.end)?;
        while right < n && run.time_at(right)? <= window.end {
            right += 1;
        }
        let right = (right + 1).min(n);

        if left + 1 < right && run.time_at(left)? > run.time_at(right - 1)? {
            return Err(RunAccessError::Unreadable(
                left,
                format!("retention time decreases between index {left} and {}", right - 1),
            ));
        }
        Ok((left.min(right), right))
    }

    /// Whether spectra are being read through the retention time index
    pub fn is_indexed(&self) -> bool {
        matches!(self.cursor, Cursor::Indexed { .. })
    }

    pub fn window(&self) -> AxisRange {
        self.window
    }
}

impl<R: SpectrumRun + ?Sized> Iterator for RangeStream<'_, R> {
    type Item = MapSpectrum;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.cursor {
                Cursor::Indexed { next, end } => {
                    if *next >= *end {
                        return None;
                    }
                    match self.run.get(*next) {
                        Ok(spec) => {
                            *next += 1;
                            return Some(spec);
                        }
                        Err(e) => {
                            warn!("Indexed read failed, resuming by linear scan: {e}");
                            let skip_below = *next;
                            self.cursor = Self::start_linear(self.run, skip_below);
                        }
                    }
                }
                Cursor::Linear { skip_below } => {
                    let skip_below = *skip_below;
                    loop {
                        let spec = self.run.next_spectrum()?;
                        if spec.index >= skip_below {
                            return Some(spec);
                        }
                    }
                }
            }
        }
    }
}

/// Stream the spectra of `run` whose retention time lies within `min_rt..=max_rt`, with the
/// automatic strategy.
pub fn stream_spectra<R: SpectrumRun + ?Sized>(
    run: &mut R,
    min_rt: f64,
    max_rt: f64,
) -> RangeStream<'_, R> {
    RangeStream::new(run, min_rt, max_rt)
}
