//! Binning of retained peaks into a two dimensional intensity grid
use mzpeaks::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bounds::Bounds;
use crate::types::CPeak;

/// A single retained peak placed on the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub time: f64,
    pub mz: f64,
    pub intensity: f32,
    /// The running number of the MS1 spectrum this peak came from
    pub spectrum_index: usize,
}

/// The precursor of an MSn spectrum, drawn as a marker rather than binned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ms2Point {
    pub time: f64,
    pub precursor_mz: f64,
}

/// Collects the points of a map as spectra are streamed
#[derive(Debug, Default, Clone)]
pub struct MapAccumulator {
    pub points: Vec<MapPoint>,
    pub ms2_points: Vec<Ms2Point>,
    /// The number of MS1 spectra in the retention time window, with or without peaks in view
    pub span_count: usize,
}

impl MapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the reduced peaks of one MS1 spectrum. Peaks with a negative or non-finite intensity
    /// are dropped.
    pub fn add_ms1(&mut self, time: f64, peaks: &[CPeak]) {
        let spectrum_index = self.span_count;
        self.points.extend(
            peaks
                .iter()
                .filter(|p| p.intensity().is_finite() && p.intensity() >= 0.0)
                .map(|p| MapPoint {
                    time,
                    mz: p.mz(),
                    intensity: p.intensity(),
                    spectrum_index,
                }),
        );
        self.span_count += 1;
    }

    /// Count an MS1 spectrum that had nothing left after reduction. It still advances the
    /// spectrum index and sizes the grid.
    pub fn skip_ms1(&mut self) {
        self.span_count += 1;
    }

    pub fn add_ms2(&mut self, time: f64, precursor_mz: f64) {
        self.ms2_points.push(Ms2Point { time, precursor_mz });
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Summed intensity over a `width` x `height` grid of retention time by m/z.
///
/// Cells are stored row-major with one row per m/z bin, so the cell for retention time bin `x`
/// and m/z bin `y` is at `y * width + x`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DensityGrid {
    pub width: usize,
    pub height: usize,
    /// `width + 1` retention time bin edges
    pub rt_edges: Vec<f64>,
    /// `height + 1` m/z bin edges
    pub mz_edges: Vec<f64>,
    /// Raw intensity sums
    pub sums: Vec<f64>,
    /// `log10` of each non-zero sum, zero elsewhere
    pub values: Vec<f64>,
}

impl DensityGrid {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The compressed value at retention time bin `x` and m/z bin `y`
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(y * self.width + x).copied()
    }

    pub fn sum_at(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.sums.get(y * self.width + x).copied()
    }

    pub fn has_signal(&self) -> bool {
        self.sums.iter().any(|v| *v != 0.0)
    }

    pub fn total_intensity(&self) -> f64 {
        self.sums.iter().sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Axis {
    start: f64,
    step: f64,
    bins: usize,
}

impl Axis {
    /// Span the extent of the data, widening a zero-width extent so it still has bins
    fn spanning(mut lo: f64, mut hi: f64, bins: usize) -> Self {
        if hi <= lo {
            lo -= 0.5;
            hi += 0.5;
        }
        Self {
            start: lo,
            step: (hi - lo) / bins as f64,
            bins,
        }
    }

    fn bin(&self, value: f64) -> usize {
        let i = ((value - self.start) / self.step).floor();
        if i <= 0.0 {
            0
        } else {
            (i as usize).min(self.bins - 1)
        }
    }

    fn edges(&self) -> Vec<f64> {
        (0..=self.bins)
            .map(|i| self.start + self.step * i as f64)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridResolution {
    pub width: usize,
    pub height: usize,
}

impl GridResolution {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<GridResolution> for (usize, usize) {
    fn from(value: GridResolution) -> Self {
        (value.width, value.height)
    }
}

/// Chooses a grid resolution from the data and sums intensity into it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityAggregator {
    pub max_width: usize,
    pub max_height: usize,
    pub width_factor: f64,
    pub height_factor: f64,
}

impl Default for DensityAggregator {
    fn default() -> Self {
        Self {
            max_width: 500,
            max_height: 500,
            width_factor: 4.0,
            height_factor: 1.75,
        }
    }
}

impl DensityAggregator {
    /// The grid size for `span_count` MS1 spectra drawn within `bounds`.
    ///
    /// The resolution follows whichever is smaller, the number of spectra or the whole number
    /// of m/z units in view.
    pub fn resolution(&self, span_count: usize, bounds: &Bounds) -> GridResolution {
        let mz_span = bounds.mz_width().floor();
        let mz_span = if mz_span.is_finite() && mz_span > 0.0 {
            mz_span as usize
        } else {
            0
        };
        let min_size = span_count.min(mz_span) as f64;
        GridResolution {
            width: ((min_size * self.width_factor) as usize).min(self.max_width),
            height: ((min_size * self.height_factor).round() as usize).min(self.max_height),
        }
    }

    /// Bin the accumulated points, returning the grid and the unbinned MS2 markers.
    pub fn aggregate(&self, acc: MapAccumulator, bounds: &Bounds) -> (DensityGrid, Vec<Ms2Point>) {
        let grid = self.bin_points(&acc.points, acc.span_count, bounds);
        (grid, acc.ms2_points)
    }

    pub fn bin_points(&self, points: &[MapPoint], span_count: usize, bounds: &Bounds) -> DensityGrid {
        let GridResolution { width, height } = self.resolution(span_count, bounds);
        if points.is_empty() || width == 0 || height == 0 {
            debug!(
                "Degenerate grid: {} points, {width}x{height}",
                points.len()
            );
            return DensityGrid::empty();
        }

        let (mut rt_lo, mut rt_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut mz_lo, mut mz_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in points {
            rt_lo = rt_lo.min(p.time);
            rt_hi = rt_hi.max(p.time);
            mz_lo = mz_lo.min(p.mz);
            mz_hi = mz_hi.max(p.mz);
        }
        let rt_axis = Axis::spanning(rt_lo, rt_hi, width);
        let mz_axis = Axis::spanning(mz_lo, mz_hi, height);

        let mut sums = vec![0.0f64; width * height];
        for p in points {
            let x = rt_axis.bin(p.time);
            let y = mz_axis.bin(p.mz);
            sums[y * width + x] += p.intensity as f64;
        }
        let values = sums
            .iter()
            .map(|v| if *v != 0.0 { v.log10() } else { 0.0 })
            .collect();

        debug!(
            "Binned {} points from {span_count} spectra into a {width}x{height} grid",
            points.len()
        );
        DensityGrid {
            width,
            height,
            rt_edges: rt_axis.edges(),
            mz_edges: mz_axis.edges(),
            sums,
            values,
        }
    }
}
