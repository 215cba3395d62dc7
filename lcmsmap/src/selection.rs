//! Reconcile the retention time and m/z bounds of a map view from every place they can come from.
//!
//! Bounds are resolved by applying an ordered list of [`SelectionPatch`]es to an empty
//! [`SelectionState`]:
//!
//! 1. the state saved in a URL
//! 2. a window centered on a requested scan's precursor, only if the URL state was empty or just
//!    an `autosize` marker
//! 3. a UI pan/zoom event, replacing the state wholesale
//! 4. explicit per-axis values, each replacing a single bound
//!
//! Nothing here fails. Anything that cannot be parsed or looked up is skipped.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::bounds::Bounds;
use crate::run::SpectrumRun;

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// A view selection as serialized by the plotting layer, keyed by axis range names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    #[serde(
        rename = "xaxis.range[0]",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_rt: Option<f64>,
    #[serde(
        rename = "xaxis.range[1]",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_rt: Option<f64>,
    #[serde(
        rename = "yaxis.range[0]",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_mz: Option<f64>,
    #[serde(
        rename = "yaxis.range[1]",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_mz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autosize: Option<Value>,
    #[serde(
        rename = "xaxis.autorange",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub xaxis_autorange: Option<Value>,
    #[serde(
        rename = "yaxis.autorange",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub yaxis_autorange: Option<Value>,
}

impl SelectionState {
    /// Parse a JSON object, returning `None` when it is not one
    pub fn from_json(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!("Ignoring malformed selection {text:?}: {e}");
                None
            }
        }
    }

    pub fn from_ranges(min_rt: f64, max_rt: f64, min_mz: f64, max_mz: f64) -> Self {
        Self {
            min_rt: Some(min_rt),
            max_rt: Some(max_rt),
            min_mz: Some(min_mz),
            max_mz: Some(max_mz),
            ..Default::default()
        }
    }

    pub fn has_ranges(&self) -> bool {
        self.min_rt.is_some()
            || self.max_rt.is_some()
            || self.min_mz.is_some()
            || self.max_mz.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_ranges()
            && self.autosize.is_none()
            && self.xaxis_autorange.is_none()
            && self.yaxis_autorange.is_none()
    }

    pub fn is_autosize(&self) -> bool {
        self.autosize.is_some()
    }

    /// Whether this carries an explicit pan, zoom or axis reset rather than a plain resize
    pub fn is_user_action(&self) -> bool {
        self.has_ranges() || self.xaxis_autorange.is_some() || self.yaxis_autorange.is_some()
    }

    /// Fill in every unset bound from `defaults`
    pub fn to_bounds(&self, defaults: &Bounds) -> Bounds {
        Bounds::new(
            self.min_rt.unwrap_or(defaults.min_rt),
            self.max_rt.unwrap_or(defaults.max_rt),
            self.min_mz.unwrap_or(defaults.min_mz),
            self.max_mz.unwrap_or(defaults.max_mz),
        )
    }

    fn bound_mut(&mut self, bound: AxisBound) -> &mut Option<f64> {
        match bound {
            AxisBound::MinRt => &mut self.min_rt,
            AxisBound::MaxRt => &mut self.max_rt,
            AxisBound::MinMz => &mut self.min_mz,
            AxisBound::MaxMz => &mut self.max_mz,
        }
    }

    fn bound(&self, bound: AxisBound) -> Option<f64> {
        match bound {
            AxisBound::MinRt => self.min_rt,
            AxisBound::MaxRt => self.max_rt,
            AxisBound::MinMz => self.min_mz,
            AxisBound::MaxMz => self.max_mz,
        }
    }
}

/// Where a bound of a [`Selection`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionSource {
    #[default]
    Default,
    Url,
    ScanCentering,
    UiEvent,
    ExplicitOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisBound {
    MinRt,
    MaxRt,
    MinMz,
    MaxMz,
}

impl AxisBound {
    pub const ALL: [AxisBound; 4] = [
        AxisBound::MinRt,
        AxisBound::MaxRt,
        AxisBound::MinMz,
        AxisBound::MaxMz,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionProvenance {
    pub min_rt: SelectionSource,
    pub max_rt: SelectionSource,
    pub min_mz: SelectionSource,
    pub max_mz: SelectionSource,
}

impl SelectionProvenance {
    pub fn get(&self, bound: AxisBound) -> SelectionSource {
        match bound {
            AxisBound::MinRt => self.min_rt,
            AxisBound::MaxRt => self.max_rt,
            AxisBound::MinMz => self.min_mz,
            AxisBound::MaxMz => self.max_mz,
        }
    }

    fn set(&mut self, bound: AxisBound, source: SelectionSource) {
        match bound {
            AxisBound::MinRt => self.min_rt = source,
            AxisBound::MaxRt => self.max_rt = source,
            AxisBound::MinMz => self.min_mz = source,
            AxisBound::MaxMz => self.max_mz = source,
        }
    }
}

/// A tight box around a requested precursor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightMarker {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// The retention time and precursor m/z of a requested scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanCenter {
    pub time: f64,
    pub precursor_mz: f64,
}

impl ScanCenter {
    pub const RT_HALF_WIDTH: f64 = 0.5;
    pub const MZ_HALF_WIDTH: f64 = 3.0;
    pub const HIGHLIGHT_RT_HALF_WIDTH: f64 = 0.01;
    pub const HIGHLIGHT_MZ_HALF_WIDTH: f64 = 0.1;

    pub fn new(time: f64, precursor_mz: f64) -> Self {
        Self { time, precursor_mz }
    }

    /// The view around this precursor. Retention time never goes below zero.
    pub fn window(&self) -> SelectionState {
        SelectionState::from_ranges(
            (self.time - Self::RT_HALF_WIDTH).max(0.0),
            self.time + Self::RT_HALF_WIDTH,
            self.precursor_mz - Self::MZ_HALF_WIDTH,
            self.precursor_mz + Self::MZ_HALF_WIDTH,
        )
    }

    pub fn highlight(&self) -> HighlightMarker {
        HighlightMarker {
            left: self.time - Self::HIGHLIGHT_RT_HALF_WIDTH,
            right: self.time + Self::HIGHLIGHT_RT_HALF_WIDTH,
            top: self.precursor_mz + Self::HIGHLIGHT_MZ_HALF_WIDTH,
            bottom: self.precursor_mz - Self::HIGHLIGHT_MZ_HALF_WIDTH,
        }
    }
}

/// Scan number 1 means "do not center on anything"
pub const NO_CENTERING_SCAN: u64 = 1;

/// Look up the retention time and precursor m/z of `scan`.
///
/// Returns `None` for [`NO_CENTERING_SCAN`], for scans that cannot be found and for scans without
/// a precursor.
pub fn locate_scan_center<R: SpectrumRun + ?Sized>(run: &mut R, scan: u64) -> Option<ScanCenter> {
    if scan == NO_CENTERING_SCAN {
        return None;
    }
    let spec = match run.get_by_scan_number(scan) {
        Ok(spec) => spec,
        Err(e) => {
            debug!("Not centering on scan {scan}: {e}");
            return None;
        }
    };
    match spec.precursor_mz {
        Some(mz) => Some(ScanCenter::new(spec.time, mz)),
        None => {
            debug!("Not centering on scan {scan}, {} has no precursor", spec.id);
            None
        }
    }
}

/// Explicitly requested single bounds.
///
/// A minimum only counts when it is above zero and a maximum only when it is below
/// [`Bounds::UNBOUNDED_RT`]/[`Bounds::UNBOUNDED_MZ`], so the defaults of a form can be passed
/// through as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisOverrides {
    pub min_rt: Option<f64>,
    pub max_rt: Option<f64>,
    pub min_mz: Option<f64>,
    pub max_mz: Option<f64>,
}

impl AxisOverrides {
    /// Parse each bound from text, treating anything unparseable as unset
    pub fn from_strings(min_rt: &str, max_rt: &str, min_mz: &str, max_mz: &str) -> Self {
        let parse = |s: &str| s.trim().parse::<f64>().ok();
        Self {
            min_rt: parse(min_rt),
            max_rt: parse(max_rt),
            min_mz: parse(min_mz),
            max_mz: parse(max_mz),
        }
    }

    fn effective(&self, bound: AxisBound) -> Option<f64> {
        match bound {
            AxisBound::MinRt => self.min_rt.filter(|v| *v > 0.0),
            AxisBound::MaxRt => self.max_rt.filter(|v| *v < Bounds::UNBOUNDED_RT),
            AxisBound::MinMz => self.min_mz.filter(|v| *v > 0.0),
            AxisBound::MaxMz => self.max_mz.filter(|v| *v < Bounds::UNBOUNDED_MZ),
        }
    }
}

/// One step of selection resolution
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionPatch {
    /// Replace the whole state
    Replace {
        source: SelectionSource,
        state: SelectionState,
    },
    /// Set all four bounds, but only if the state so far is empty or an `autosize` marker
    Center { window: SelectionState },
    /// Set a single bound
    Axis {
        bound: AxisBound,
        value: f64,
    },
}

impl SelectionPatch {
    pub fn apply(&self, selection: &mut Selection) {
        match self {
            SelectionPatch::Replace { source, state } => {
                selection.state = state.clone();
                for bound in AxisBound::ALL {
                    let src = if state.bound(bound).is_some() {
                        *source
                    } else {
                        SelectionSource::Default
                    };
                    selection.provenance.set(bound, src);
                }
            }
            SelectionPatch::Center { window } => {
                if !(selection.state.is_empty() || selection.state.is_autosize()) {
                    debug!("Keeping the existing selection instead of centering");
                    return;
                }
                for bound in AxisBound::ALL {
                    if let Some(v) = window.bound(bound) {
                        *selection.state.bound_mut(bound) = Some(v);
                        selection
                            .provenance
                            .set(bound, SelectionSource::ScanCentering);
                    }
                }
            }
            SelectionPatch::Axis { bound, value } => {
                *selection.state.bound_mut(*bound) = Some(*value);
                selection
                    .provenance
                    .set(*bound, SelectionSource::ExplicitOverride);
            }
        }
        selection.bounds = selection.state.to_bounds(&Bounds::SELECTION_DEFAULT);
    }
}

/// Everything a selection may be resolved from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionInputs {
    pub url_state: Option<SelectionState>,
    pub requested_scan: Option<u64>,
    pub ui_event: Option<SelectionState>,
    pub overrides: AxisOverrides,
}

/// The resolved view bounds along with where each one came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub bounds: Bounds,
    pub state: SelectionState,
    pub provenance: SelectionProvenance,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            bounds: Bounds::SELECTION_DEFAULT,
            state: SelectionState::default(),
            provenance: SelectionProvenance::default(),
        }
    }
}

impl Selection {
    /// The bounds to draw the map with, where an unset m/z maximum is 2000 rather than unbounded
    pub fn rendering_bounds(&self) -> Bounds {
        self.state.to_bounds(&Bounds::MAP_DEFAULT)
    }
}

/// Arrange the inputs into patches in order of increasing precedence
pub fn build_patches(inputs: &SelectionInputs, center: Option<&ScanCenter>) -> Vec<SelectionPatch> {
    let mut patches = Vec::new();
    if let Some(state) = inputs.url_state.as_ref() {
        patches.push(SelectionPatch::Replace {
            source: SelectionSource::Url,
            state: state.clone(),
        });
    }
    if let Some(center) = center {
        patches.push(SelectionPatch::Center {
            window: center.window(),
        });
    }
    if let Some(event) = inputs.ui_event.as_ref().filter(|e| e.is_user_action()) {
        patches.push(SelectionPatch::Replace {
            source: SelectionSource::UiEvent,
            state: event.clone(),
        });
    }
    for bound in AxisBound::ALL {
        if let Some(value) = inputs.overrides.effective(bound) {
            patches.push(SelectionPatch::Axis { bound, value });
        }
    }
    patches
}

pub fn apply_patches(patches: &[SelectionPatch]) -> Selection {
    let mut selection = Selection::default();
    for patch in patches {
        patch.apply(&mut selection);
    }
    selection
}

/// Resolve the final selection and, when a scan was requested and found, its highlight marker.
#[instrument(level = "debug", skip(run))]
pub fn resolve_selection<R: SpectrumRun + ?Sized>(
    run: &mut R,
    inputs: &SelectionInputs,
) -> (Selection, Option<HighlightMarker>) {
    let center = inputs
        .requested_scan
        .and_then(|scan| locate_scan_center(run, scan));
    let patches = build_patches(inputs, center.as_ref());
    let selection = apply_patches(&patches);
    debug!("Resolved selection {:?} from {} patches", selection.bounds, patches.len());
    (selection, center.map(|c| c.highlight()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::run::{MapSpectrum, MemoryRun};

    fn make_run() -> MemoryRun {
        (0..10)
            .map(|i| {
                let spec = MapSpectrum::new(i, if i % 2 == 0 { 1 } else { 2 }, i as f64 * 0.25, Vec::new());
                if i % 2 == 1 {
                    spec.with_precursor(500.0 + i as f64)
                } else {
                    spec
                }
            })
            .collect()
    }

    #[test]
    fn test_precedence() {
        let mut run = make_run();
        let inputs = SelectionInputs {
            url_state: SelectionState::from_json(r#"{"xaxis.range[0]": 10, "xaxis.range[1]": 20}"#),
            requested_scan: Some(4),
            ui_event: SelectionState::from_json(r#"{"xaxis.range[0]": 5}"#),
            overrides: AxisOverrides::from_strings("1", "", "", ""),
        };
        let (selection, highlight) = resolve_selection(&mut run, &inputs);
        assert_eq!(selection.bounds.min_rt, 1.0);
        assert_eq!(selection.provenance.min_rt, SelectionSource::ExplicitOverride);
        // The UI event replaced the URL state, so nothing sets the maximum
        assert_eq!(selection.bounds.max_rt, Bounds::UNBOUNDED_RT);
        assert_eq!(selection.provenance.max_rt, SelectionSource::Default);
        assert_eq!(selection.bounds.max_mz, Bounds::UNBOUNDED_MZ);

        let highlight = highlight.unwrap();
        assert!((highlight.left - 0.74).abs() < 1e-9);
        assert!((highlight.top - 503.1).abs() < 1e-9);
    }

    #[test]
    fn test_ui_event_keeps_sibling() {
        let inputs = SelectionInputs {
            url_state: SelectionState::from_json(r#"{"xaxis.range[0]": 10, "xaxis.range[1]": 20}"#),
            ui_event: SelectionState::from_json(r#"{"xaxis.range[0]": 5, "xaxis.range[1]": "7.5"}"#),
            overrides: AxisOverrides::from_strings("1", "", "", ""),
            ..Default::default()
        };
        let (selection, highlight) = resolve_selection(&mut make_run(), &inputs);
        assert_eq!(selection.bounds.min_rt, 1.0);
        assert_eq!(selection.bounds.max_rt, 7.5);
        assert_eq!(selection.provenance.max_rt, SelectionSource::UiEvent);
        assert!(highlight.is_none());
    }

    #[test]
    fn test_scan_one_does_not_center() {
        let mut run = make_run();
        let inputs = SelectionInputs {
            requested_scan: Some(1),
            ..Default::default()
        };
        let (selection, highlight) = resolve_selection(&mut run, &inputs);
        assert!(highlight.is_none());
        assert_eq!(selection.bounds, Bounds::SELECTION_DEFAULT);
        assert_eq!(selection.rendering_bounds(), Bounds::MAP_DEFAULT);
    }

    #[test]
    fn test_centering() {
        let mut run = make_run();
        let inputs = SelectionInputs {
            url_state: SelectionState::from_json(r#"{"autosize": true}"#),
            requested_scan: Some(2),
            ..Default::default()
        };
        let (selection, highlight) = resolve_selection(&mut run, &inputs);
        // scan=2 is index 1, at 0.25 minutes
        assert_eq!(selection.bounds.min_rt, 0.0);
        assert_eq!(selection.bounds.max_rt, 0.75);
        assert_eq!(selection.bounds.min_mz, 498.0);
        assert_eq!(selection.bounds.max_mz, 504.0);
        assert_eq!(selection.provenance.min_mz, SelectionSource::ScanCentering);
        assert!(selection.state.is_autosize());
        assert!(highlight.is_some());

        // A zoom saved in the URL wins over centering, the marker is still produced
        let inputs = SelectionInputs {
            url_state: Some(SelectionState::from_ranges(1.0, 2.0, 100.0, 200.0)),
            requested_scan: Some(2),
            ..Default::default()
        };
        let (selection, highlight) = resolve_selection(&mut run, &inputs);
        assert_eq!(selection.bounds, Bounds::new(1.0, 2.0, 100.0, 200.0));
        assert_eq!(selection.provenance.max_mz, SelectionSource::Url);
        assert!(highlight.is_some());
    }

    #[test]
    fn test_lookup_failures_absorbed() {
        let mut run = make_run();
        let inputs = SelectionInputs {
            url_state: SelectionState::from_json("not json"),
            // Missing scan, and an MS1 scan without a precursor
            requested_scan: Some(99),
            ui_event: SelectionState::from_json(r#"{"autosize": true}"#),
            overrides: AxisOverrides::from_strings("abc", "1000000", "0", "-"),
        };
        assert!(inputs.url_state.is_none());
        let (selection, highlight) = resolve_selection(&mut run, &inputs);
        assert!(highlight.is_none());
        assert_eq!(selection.bounds, Bounds::SELECTION_DEFAULT);

        assert!(locate_scan_center(&mut run, 3).is_none());
        assert!(locate_scan_center(&mut run, 4).is_some());
    }

    #[test]
    fn test_autorange_resets() {
        let inputs = SelectionInputs {
            url_state: Some(SelectionState::from_ranges(1.0, 2.0, 100.0, 200.0)),
            ui_event: SelectionState::from_json(r#"{"xaxis.autorange": true}"#),
            overrides: AxisOverrides {
                max_mz: Some(900.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let patches = build_patches(&inputs, None);
        assert_eq!(patches.len(), 3);
        let selection = apply_patches(&patches);
        assert_eq!(selection.bounds, Bounds::new(0.0, Bounds::UNBOUNDED_RT, 0.0, 900.0));
        assert_eq!(selection.rendering_bounds().max_mz, 900.0);
    }

    #[test]
    fn test_state_serde() {
        let state = SelectionState::from_ranges(1.0, 2.0, 3.0, 4.0);
        let text = serde_json::to_string(&state).unwrap();
        assert!(text.contains("\"xaxis.range[0]\":1.0"));
        assert!(!text.contains("autosize"));
        assert_eq!(SelectionState::from_json(&text), Some(state));
    }
}
