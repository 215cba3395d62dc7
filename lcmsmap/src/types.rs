use mzdata::spectrum::MultiLayerSpectrum;
use mzpeaks::{CentroidPeak, DeconvolutedPeak};

pub type CPeak = CentroidPeak;
pub type DPeak = DeconvolutedPeak;
pub type SpectrumType = MultiLayerSpectrum<CPeak, DPeak>;

/// The number of most intense peaks kept from each MS1 spectrum
pub const DEFAULT_PEAK_CAP: usize = 150;
/// The largest number of rows read from an overlay table
pub const OVERLAY_ROW_LIMIT: usize = 20_000;
