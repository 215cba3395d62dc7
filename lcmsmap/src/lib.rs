//! Draw bounded, aggregated LC-MS density maps from a run of mass spectra.
//!
//! The pipeline resolves the view [`Bounds`] with [`resolve_selection`], streams the spectra of
//! a [`SpectrumRun`] within them with [`RangeStream`], keeps the most intense peaks of each MS1
//! spectrum with [`PeakReducer`] and bins them into a [`DensityGrid`] with [`DensityAggregator`].
//! [`build_map`] ties the last three together. External annotations are mapped onto the same
//! coordinates with [`resolve_overlay`].
pub mod aggregate;
pub mod bounds;
pub mod locate;
pub mod map;
pub mod overlay;
pub mod reduce;
pub mod run;
pub mod selection;
pub mod source;
pub mod stream;
pub mod summary;
pub mod types;
pub mod usi;

pub use aggregate::{
    DensityAggregator, DensityGrid, GridResolution, MapAccumulator, MapPoint, Ms2Point,
};
pub use bounds::{AxisRange, AxisRangeParseError, Bounds};
pub use locate::{is_time_monotonic, locate_time_index};
pub use map::{build_map, LcmsMap, MapParams, MapProgress};
pub use overlay::{
    resolve_overlay, OverlayAliases, OverlayChannel, OverlayDataset, OverlayError, OverlayPoint,
    OverlayTable,
};
pub use reduce::PeakReducer;
pub use run::{MapSpectrum, MemoryRun, RunAccessError, SpectrumRun};
pub use selection::{
    resolve_selection, AxisOverrides, HighlightMarker, Selection, SelectionInputs,
    SelectionSource, SelectionState,
};
pub use source::{convert_spectrum, MzDataRun};
pub use stream::{stream_spectra, RangeStream, StreamStrategy};
pub use summary::{summarize_run, total_ion_chromatogram, RunSummary, TotalIonChromatogram};
pub use types::{CPeak, DPeak, SpectrumType, DEFAULT_PEAK_CAP, OVERLAY_ROW_LIMIT};
pub use usi::{Usi, UsiParseError};
