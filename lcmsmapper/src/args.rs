use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use lcmsmap::{DensityAggregator, MapParams, OverlayAliases, PeakReducer, StreamStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgStreamStrategy {
    #[default]
    /// Use the retention time index unless the whole run is requested
    Auto,
    /// Read every spectrum in order
    Linear,
    /// Always read through the retention time index
    Indexed,
}

impl From<ArgStreamStrategy> for StreamStrategy {
    fn from(value: ArgStreamStrategy) -> Self {
        match value {
            ArgStreamStrategy::Auto => StreamStrategy::Auto,
            ArgStreamStrategy::Linear => StreamStrategy::Linear,
            ArgStreamStrategy::Indexed => StreamStrategy::Indexed,
        }
    }
}

impl Display for ArgStreamStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub(crate) fn positive_usize(s: &str) -> Result<usize, String> {
    let value = s.parse::<usize>().map_err(|e| e.to_string())?;
    if value == 0 {
        Err(format!("`{s}` must be greater than zero"))
    } else {
        Ok(value)
    }
}

pub(crate) fn positive_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("`{s}` must be a finite number greater than zero"))
    }
}

pub fn make_map_params(
    peak_cap: usize,
    max_width: usize,
    max_height: usize,
    width_factor: f64,
    height_factor: f64,
    strategy: ArgStreamStrategy,
    verify_monotonic: bool,
) -> MapParams {
    MapParams {
        reducer: PeakReducer::new(peak_cap),
        aggregator: DensityAggregator {
            max_width,
            max_height,
            width_factor,
            height_factor,
        },
        strategy: strategy.into(),
        verify_monotonic,
    }
}

/// Column names for each overlay channel as given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq, clap::Args, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayColumnArgs {
    /// The overlay column holding m/z
    #[arg(long = "overlay-mz", default_value = "")]
    pub mz: String,

    /// The overlay column holding retention time
    #[arg(long = "overlay-rt", default_value = "")]
    pub rt: String,

    /// Keep only the overlay rows where this column equals `--overlay-filter-value`
    #[arg(long = "overlay-filter-column", default_value = "")]
    pub filter_column: String,

    #[arg(long = "overlay-filter-value", default_value = "")]
    pub filter_value: String,

    /// The overlay column to size markers by
    #[arg(long = "overlay-size", default_value = "")]
    pub size: String,

    /// The overlay column to color markers by
    #[arg(long = "overlay-color", default_value = "")]
    pub color: String,

    /// The overlay column to label markers with
    #[arg(long = "overlay-hover", default_value = "")]
    pub hover: String,
}

impl From<&OverlayColumnArgs> for OverlayAliases {
    fn from(value: &OverlayColumnArgs) -> Self {
        OverlayAliases {
            mz: value.mz.clone(),
            rt: value.rt.clone(),
            filter_column: value.filter_column.clone(),
            filter_value: value.filter_value.clone(),
            size: value.size.clone(),
            color: value.color.clone(),
            hover: value.hover.clone(),
        }
    }
}
