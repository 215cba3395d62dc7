//! Binary search for retention times over a [`SpectrumRun`]
use itertools::Itertools;
use tracing::trace;

use crate::run::{RunAccessError, SpectrumRun};

/// Find the first index whose retention time is at or after `time`.
///
/// This bisects `[0, run.len())` assuming retention time never decreases with index. If that
/// assumption does not hold the search still terminates, but the index is meaningless.
///
/// The result is an insertion point: `run.len()` when every spectrum is earlier than `time`,
/// `0` when none are.
pub fn locate_time_index<R: SpectrumRun + ?Sized>(
    run: &mut R,
    time: f64,
) -> Result<usize, RunAccessError> {
    let count = run.len();
    let mut lo = 0;
    let mut hi = count;
    let mut probes = 0usize;
    loop {
        let mid = (lo + hi) / 2;
        if mid == 0 || mid == count || lo == hi || hi - lo == 1 {
            break;
        }
        let mid_time = run.time_at(mid)?;
        probes += 1;
        if mid_time < time {
            lo = mid;
        } else if mid_time > time {
            hi = mid;
        } else {
            let mut first = mid;
            while first > 0 && run.time_at(first - 1)? >= time {
                first -= 1;
            }
            trace!("Located {time} at {first} after {probes} probes");
            return Ok(first);
        }
    }
    // The first spectrum is never probed by bisection
    if lo == 0 && hi == 1 && run.time_at(0)? >= time {
        return Ok(0);
    }
    trace!("Located {time} at {hi} after {probes} probes");
    Ok(hi)
}

/// Check that retention time never decreases over the whole run.
///
/// This reads every spectrum once and leaves the run's iteration cursor exhausted.
pub fn is_time_monotonic<R: SpectrumRun + ?Sized>(run: &mut R) -> bool {
    run.rewind();
    std::iter::from_fn(|| run.next_spectrum())
        .map(|s| s.time)
        .tuple_windows()
        .all(|(a, b)| a <= b)
}
