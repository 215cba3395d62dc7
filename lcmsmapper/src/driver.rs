use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use clap::{parser::ValueSource, ArgMatches, FromArgMatches, Parser};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzdata::io::{infer_format, MassSpectrometryFormat};
use mzdata::prelude::*;
use mzdata::MZReader;

use lcmsmap::{
    build_map, resolve_overlay, resolve_selection, summarize_run, total_ion_chromatogram,
    AxisOverrides, AxisRange, MapParams, MzDataRun, OverlayAliases, OverlayError, OverlayTable,
    SelectionInputs, SelectionState, Usi, OVERLAY_ROW_LIMIT,
};

use crate::args::{
    make_map_params, positive_f64, positive_usize, ArgStreamStrategy, OverlayColumnArgs,
};
use crate::write::{write_report, MapReport};

#[derive(Debug, Error)]
pub enum LcmsMapperError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The input file format for {0} was either unknown or not supported ({1:?})")]
    FormatUnknownOrNotSupportedError(String, MassSpectrometryFormat),
    #[error("Failed to read the overlay: {0}")]
    OverlayError(#[from] OverlayError),
    #[error("Failed to read configuration: {0}")]
    ConfigError(#[from] figment::Error),
    #[error(transparent)]
    ArgumentError(#[from] clap::Error),
}

/// Draw an LC-MS density map of a mass spectrometry file.
///
/// Resolve the view from a spectrum identifier, saved and interactive selections and explicit
/// bounds, bin the most intense MS1 peaks in view into a grid, collect MSn precursors and any
/// overlay annotations, and write it all out as JSON.
#[derive(Parser, Debug, Clone, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct LcmsMapper {
    /// The path to read the input spectra from
    #[arg()]
    pub input_file: String,

    /// The path to write the JSON report to, or if '-' is passed, write to STDOUT.
    ///
    /// Paths ending in `.gz` are gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `lcmsmapper.toml` in the working directory.
    /// Environment variables prefixed with `LCMSMAPPER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// A spectrum identifier, `mzspec:<dataset>:<file>:scan:<n>`, whose scan to center on
    #[arg(short = 'u', long = "usi")]
    pub usi: Option<String>,

    /// The scan number to center on, taking precedence over the one in `--usi`.
    ///
    /// Scan 1 means "do not center".
    #[arg(short = 's', long = "scan")]
    pub scan: Option<u64>,

    /// A saved selection as a JSON object with `xaxis.range[0]`-style keys
    #[arg(long = "url-state")]
    pub url_state: Option<String>,

    /// A pan/zoom event from the plot as a JSON object with `xaxis.range[0]`-style keys
    #[arg(long = "ui-event")]
    pub ui_event: Option<String>,

    /// The retention time range to show in minutes, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="rt-range",
        value_parser=AxisRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The retention time range to show in minutes, denoted (start?)-(stop?)

This overrides every other source of retention time bounds. A start of zero or an
absent stop leaves that bound to the other sources.
"#
    )]
    pub rt_range: Option<AxisRange>,

    /// The m/z range to show, denoted (start?)-(stop?)
    #[arg(
        short='z',
        long="mz-range",
        value_parser=AxisRange::from_str,
        value_name="BEGIN-END",
    )]
    pub mz_range: Option<AxisRange>,

    /// The lowest retention time to show, ignored unless above zero
    #[arg(long = "rt-min")]
    pub rt_min: Option<f64>,

    /// The highest retention time to show, ignored unless below 1000000
    #[arg(long = "rt-max")]
    pub rt_max: Option<f64>,

    /// The lowest m/z to show, ignored unless above zero
    #[arg(long = "mz-min")]
    pub mz_min: Option<f64>,

    /// The highest m/z to show, ignored unless below 1000000
    #[arg(long = "mz-max")]
    pub mz_max: Option<f64>,

    /// The number of most intense peaks to keep from each MS1 spectrum
    #[arg(short = 'k', long = "peak-cap", default_value_t = 150, value_parser = positive_usize)]
    pub peak_cap: usize,

    /// The largest number of retention time bins in the grid
    #[arg(long = "max-grid-width", default_value_t = 500, value_parser = positive_usize)]
    pub max_grid_width: usize,

    /// The largest number of m/z bins in the grid
    #[arg(long = "max-grid-height", default_value_t = 500, value_parser = positive_usize)]
    pub max_grid_height: usize,

    /// Retention time bins per spectrum in view
    #[arg(long = "width-factor", default_value_t = 4.0, value_parser = positive_f64)]
    pub width_factor: f64,

    /// m/z bins per spectrum in view
    #[arg(long = "height-factor", default_value_t = 1.75, value_parser = positive_f64)]
    pub height_factor: f64,

    /// How to read spectra within the retention time range
    #[arg(long = "stream-strategy", default_value = "auto")]
    pub stream_strategy: ArgStreamStrategy,

    /// Check that retention time never decreases before using the retention time index
    #[arg(long = "verify-monotonic")]
    pub verify_monotonic: bool,

    /// Include the total ion chromatogram of the run
    #[arg(long = "tic")]
    pub tic: bool,

    /// A CSV or TSV table of annotations to overlay
    #[arg(long = "overlay-file")]
    pub overlay_file: Option<PathBuf>,

    /// The most overlay rows to read
    #[arg(long = "overlay-row-limit", default_value_t = OVERLAY_ROW_LIMIT)]
    pub overlay_row_limit: usize,

    #[command(flatten)]
    pub overlay_columns: OverlayColumnArgs,
}

impl Default for LcmsMapper {
    fn default() -> Self {
        Self {
            input_file: String::new(),
            output_file: PathBuf::from("-"),
            log_file: None,
            config_file: None,
            usi: None,
            scan: None,
            url_state: None,
            ui_event: None,
            rt_range: None,
            mz_range: None,
            rt_min: None,
            rt_max: None,
            mz_min: None,
            mz_max: None,
            peak_cap: 150,
            max_grid_width: 500,
            max_grid_height: 500,
            width_factor: 4.0,
            height_factor: 1.75,
            stream_strategy: ArgStreamStrategy::Auto,
            verify_monotonic: false,
            tic: false,
            overlay_file: None,
            overlay_row_limit: OVERLAY_ROW_LIMIT,
            overlay_columns: OverlayColumnArgs::default(),
        }
    }
}

impl LcmsMapper {
    /// Build the arguments from parsed command line `matches`, layered with any configuration.
    ///
    /// Flags given explicitly on the command line take precedence over `lcmsmapper.toml`, the
    /// `--config-file` and `LCMSMAPPER_` environment variables. Defaults do not.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, LcmsMapperError> {
        let args = Self::from_arg_matches(matches)?;
        let explicit: Vec<String> = matches
            .ids()
            .filter(|id| matches.value_source(id.as_str()) == Some(ValueSource::CommandLine))
            .map(|id| id.as_str().to_string())
            .collect();
        args.configure(&explicit)
    }

    /// Layer `lcmsmapper.toml`, the `--config-file` and `LCMSMAPPER_` environment variables over
    /// these arguments, then restore the `explicit` fields.
    pub fn configure(self, explicit: &[String]) -> Result<Self, LcmsMapperError> {
        let pinned = self.pinned_fields(explicit);
        let mut config = Figment::new()
            .merge(Serialized::defaults(&self))
            .merge(Toml::file("lcmsmapper.toml"));
        if let Some(path) = self.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        let config = config
            .merge(Env::prefixed("LCMSMAPPER_").split("__"))
            .merge(Serialized::defaults(pinned));
        Ok(config.extract()?)
    }

    /// The subset of these arguments named by `fields`, shaped like the configuration
    fn pinned_fields(&self, fields: &[String]) -> serde_json::Map<String, serde_json::Value> {
        let mut pinned = serde_json::Map::new();
        let serde_json::Value::Object(mut all) = serde_json::to_value(self).unwrap_or_default()
        else {
            return pinned;
        };
        let mut overlay_columns = match all.remove("overlay_columns") {
            Some(serde_json::Value::Object(columns)) => columns,
            _ => serde_json::Map::new(),
        };
        let mut pinned_columns = serde_json::Map::new();
        for field in fields {
            if let Some(value) = all.remove(field) {
                pinned.insert(field.clone(), value);
            } else if let Some(value) = overlay_columns.remove(field) {
                pinned_columns.insert(field.clone(), value);
            }
        }
        if !pinned_columns.is_empty() {
            pinned.insert(
                "overlay_columns".to_string(),
                serde_json::Value::Object(pinned_columns),
            );
        }
        pinned
    }

    pub fn map_params(&self) -> MapParams {
        make_map_params(
            self.peak_cap,
            self.max_grid_width,
            self.max_grid_height,
            self.width_factor,
            self.height_factor,
            self.stream_strategy,
            self.verify_monotonic,
        )
    }

    fn axis_overrides(&self) -> AxisOverrides {
        AxisOverrides {
            min_rt: self.rt_min.or(self.rt_range.map(|r| r.start)),
            max_rt: self.rt_max.or(self.rt_range.map(|r| r.end)),
            min_mz: self.mz_min.or(self.mz_range.map(|r| r.start)),
            max_mz: self.mz_max.or(self.mz_range.map(|r| r.end)),
        }
    }

    pub fn selection_inputs(&self, usi: Option<&Usi>) -> SelectionInputs {
        SelectionInputs {
            url_state: self.url_state.as_deref().and_then(SelectionState::from_json),
            requested_scan: self.scan.or(usi.and_then(|u| u.scan)),
            ui_event: self.ui_event.as_deref().and_then(SelectionState::from_json),
            overrides: self.axis_overrides(),
        }
    }

    fn open_reader(&self) -> Result<MZReader<std::fs::File>, LcmsMapperError> {
        let (ms_format, compressed) = infer_format(&self.input_file)?;
        debug!("Detected {ms_format:?} from path (compressed? {compressed})");
        match ms_format {
            MassSpectrometryFormat::MzML | MassSpectrometryFormat::MGF => {}
            #[cfg(feature = "mzmlb")]
            MassSpectrometryFormat::MzMLb => {}
            #[cfg(feature = "thermo")]
            MassSpectrometryFormat::ThermoRaw => {}
            _ => {
                return Err(LcmsMapperError::FormatUnknownOrNotSupportedError(
                    self.input_file.clone(),
                    ms_format,
                ))
            }
        }
        Ok(MZReader::open_path(&self.input_file)?)
    }

    /// The spectrum identifier to center on. An identifier that does not parse is ignored and
    /// the map is drawn without centering.
    pub fn parse_usi(&self) -> Option<Usi> {
        let text = self.usi.as_deref()?;
        match text.parse::<Usi>() {
            Ok(usi) => Some(usi),
            Err(e) => {
                warn!("Ignoring spectrum identifier: {e}");
                None
            }
        }
    }

    /// Read the input and overlay and compute the report without writing it
    pub fn build_report(&self) -> Result<MapReport, LcmsMapperError> {
        let usi = self.parse_usi();
        let mut run = MzDataRun::new(self.open_reader()?);

        let summary = summarize_run(&mut run);
        info!(
            "Spectra: {} | MS1: {} | MSn: {}",
            summary.spectrum_count, summary.ms1_spectra, summary.msn_spectra
        );

        let inputs = self.selection_inputs(usi.as_ref());
        let (selection, highlight) = resolve_selection(&mut run, &inputs);
        let rendering_bounds = selection.rendering_bounds();
        info!(
            "Rendering RT {:0.3}-{:0.3} | m/z {:0.3}-{:0.3}",
            rendering_bounds.min_rt,
            rendering_bounds.max_rt,
            rendering_bounds.min_mz,
            rendering_bounds.max_mz
        );
        if let Some(marker) = highlight.as_ref() {
            debug!("Highlighting {marker:?}");
        }

        let map = build_map(&mut run, &rendering_bounds, &self.map_params());
        info!("MS1 Spectra: {}", map.progress.ms1_spectra);
        info!("MSn Spectra: {}", map.progress.msn_spectra);
        info!("MS1 Peaks: {}", map.progress.ms1_peaks);
        info!("MS2 Points: {}", map.ms2_points.len());
        info!("Grid: {}x{}", map.grid.width, map.grid.height);

        let tic = self.tic.then(|| total_ion_chromatogram(&mut run));

        let (overlay_channels, overlay_points) = match self.overlay_file.as_ref() {
            Some(path) => {
                let table = OverlayTable::from_path(path, self.overlay_row_limit)?;
                let aliases = OverlayAliases::from(&self.overlay_columns);
                let dataset = resolve_overlay(table, &aliases);
                let points = dataset.points();
                info!("Overlay Rows: {} | Points: {}", dataset.len(), points.len());
                (dataset.channels, points)
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(MapReport {
            input_file: self.input_file.clone(),
            usi,
            selection,
            highlight,
            rendering_bounds,
            map,
            summary,
            tic,
            overlay_channels,
            overlay_points,
        })
    }

    pub fn main(&self) -> Result<(), LcmsMapperError> {
        info!(
            "lcmsmapper v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());
        let start = Instant::now();
        let report = self.build_report()?;
        write_report(&self.output_file, &report)?;
        info!("Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lcmsmap::Bounds;

    #[test]
    fn test_parse_args() {
        let args = LcmsMapper::parse_from([
            "lcmsmapper",
            "run.mzML",
            "-r",
            "1.5-3",
            "--mz-max",
            "800",
            "-u",
            "mzspec:MSV1:run:scan:12",
            "--overlay-mz",
            "precursor_mz",
        ]);
        assert_eq!(args.output_file, PathBuf::from("-"));
        assert_eq!(args.peak_cap, 150);
        assert_eq!(args.overlay_columns.mz, "precursor_mz");

        let usi: Usi = args.usi.as_deref().unwrap().parse().unwrap();
        let inputs = args.selection_inputs(Some(&usi));
        assert_eq!(inputs.requested_scan, Some(12));
        assert_eq!(inputs.overrides.min_rt, Some(1.5));
        assert_eq!(inputs.overrides.max_rt, Some(3.0));
        assert_eq!(inputs.overrides.max_mz, Some(800.0));
        assert_eq!(inputs.overrides.min_mz, None);
    }

    #[test]
    fn test_pinned_fields() {
        let args = LcmsMapper::parse_from([
            "lcmsmapper",
            "run.mzML",
            "-k",
            "50",
            "--overlay-mz",
            "precursor_mz",
        ]);
        let pinned = args.pinned_fields(&[
            "peak_cap".to_string(),
            "mz".to_string(),
            "not_an_argument".to_string(),
        ]);
        assert_eq!(pinned.get("peak_cap"), Some(&serde_json::json!(50)));
        assert_eq!(
            pinned.get("overlay_columns"),
            Some(&serde_json::json!({"mz": "precursor_mz"}))
        );
        assert_eq!(pinned.len(), 2);
    }

    #[test]
    fn test_bad_usi_ignored() {
        let mut args = LcmsMapper {
            usi: Some("mzspec:MSV1:run:scan:abc".to_string()),
            ..Default::default()
        };
        assert!(args.parse_usi().is_none());
        args.usi = Some("mzdata:A:B".to_string());
        assert!(args.parse_usi().is_none());
        args.usi = Some("mzspec:MSV1:run:scan:7".to_string());
        assert_eq!(args.parse_usi().and_then(|u| u.scan), Some(7));
        args.usi = None;
        assert!(args.parse_usi().is_none());
    }

    #[test]
    fn test_scan_overrides_usi() {
        let args = LcmsMapper {
            scan: Some(3),
            url_state: Some(r#"{"autosize": true}"#.to_string()),
            ..Default::default()
        };
        let usi: Usi = "mzspec:MSV1:run:scan:12".parse().unwrap();
        let inputs = args.selection_inputs(Some(&usi));
        assert_eq!(inputs.requested_scan, Some(3));
        assert!(inputs.url_state.unwrap().is_autosize());
        assert_eq!(args.map_params().aggregator.max_width, 500);
        assert_eq!(
            Bounds::MAP_DEFAULT,
            lcmsmap::Selection::default().rendering_bounds()
        );
    }
}
