use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::aggregate::{DensityAggregator, DensityGrid, MapAccumulator, Ms2Point};
use crate::bounds::Bounds;
use crate::reduce::PeakReducer;
use crate::run::SpectrumRun;
use crate::stream::{RangeStream, StreamStrategy};

/// Counters describing what went into a map
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct MapProgress {
    pub ms1_spectra: usize,
    pub msn_spectra: usize,
    pub ms1_peaks: usize,
    /// MS1 spectra with no peaks left in the m/z window
    pub skipped_spectra: usize,
    pub ms2_points: usize,
    /// MSn spectra above level 2, which are counted but not drawn
    pub higher_msn_spectra: usize,
    /// Spectra streamed but outside of the retention time window
    pub out_of_window: usize,
}

impl Add for MapProgress {
    type Output = MapProgress;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for MapProgress {
    fn add_assign(&mut self, rhs: Self) {
        self.ms1_spectra += rhs.ms1_spectra;
        self.msn_spectra += rhs.msn_spectra;
        self.ms1_peaks += rhs.ms1_peaks;
        self.skipped_spectra += rhs.skipped_spectra;
        self.ms2_points += rhs.ms2_points;
        self.higher_msn_spectra += rhs.higher_msn_spectra;
        self.out_of_window += rhs.out_of_window;
    }
}

/// Everything that controls how a map is drawn other than its bounds
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapParams {
    pub reducer: PeakReducer,
    pub aggregator: DensityAggregator,
    pub strategy: StreamStrategy,
    /// Check that retention time never decreases before trusting the index
    pub verify_monotonic: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LcmsMap {
    pub bounds: Bounds,
    pub grid: DensityGrid,
    pub ms2_points: Vec<Ms2Point>,
    pub progress: MapProgress,
}

/// Stream the spectra of `run` within `bounds`, reduce each MS1 spectrum to its most intense
/// peaks and bin them, collecting MSn precursors along the way.
///
/// This never fails. A run with nothing in view produces a degenerate, empty grid.
#[instrument(level = "debug", skip(run, params))]
pub fn build_map<R: SpectrumRun + ?Sized>(run: &mut R, bounds: &Bounds, params: &MapParams) -> LcmsMap {
    let mut acc = MapAccumulator::new();
    let mut progress = MapProgress::default();

    let stream = RangeStream::with_strategy(
        run,
        bounds.min_rt,
        bounds.max_rt,
        params.strategy,
        params.verify_monotonic,
    );

    for spec in stream {
        if !bounds.contains_time(spec.time) {
            progress.out_of_window += 1;
            continue;
        }
        if spec.ms_level == 1 {
            progress.ms1_spectra += 1;
            match params.reducer.reduce(&spec.peaks, bounds.min_mz, bounds.max_mz) {
                Some(peaks) => {
                    progress.ms1_peaks += peaks.len();
                    acc.add_ms1(spec.time, &peaks);
                }
                None => {
                    trace!("Skipping {}, no peaks in the m/z window", spec.id);
                    progress.skipped_spectra += 1;
                    acc.skip_ms1();
                }
            }
        } else if spec.ms_level != 2 {
            progress.msn_spectra += 1;
            progress.higher_msn_spectra += 1;
            trace!("Not drawing MS{} spectrum {}", spec.ms_level, spec.id);
        } else {
            progress.msn_spectra += 1;
            if let Some(mz) = spec.precursor_mz.filter(|mz| bounds.contains_mz(*mz)) {
                acc.add_ms2(spec.time, mz);
                progress.ms2_points += 1;
            }
        }
    }

    let (grid, ms2_points) = params.aggregator.aggregate(acc, bounds);
    debug!(
        "Built a {}x{} map from {} MS1 and {} MSn spectra",
        grid.width, grid.height, progress.ms1_spectra, progress.msn_spectra
    );
    LcmsMap {
        bounds: *bounds,
        grid,
        ms2_points,
        progress,
    }
}
