//! An abstract, randomly indexable run of spectra.
//!
//! The rest of the crate only sees [`MapSpectrum`] values produced by a [`SpectrumRun`]. Real
//! files are wrapped with [`MzDataRun`](crate::source::MzDataRun), tests use [`MemoryRun`].
use mzdata::spectrum::ScanPolarity;
use mzpeaks::prelude::*;
use thiserror::Error;

use crate::types::CPeak;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunAccessError {
    #[error("Spectrum index {0} is out of range for a run of {1} spectra")]
    IndexOutOfRange(usize, usize),
    #[error("No spectrum with scan number {0} was found")]
    ScanNotFound(u64),
    #[error("The spectrum at index {0} could not be read: {1}")]
    Unreadable(usize, String),
}

/// A single spectrum reduced to what an LC-MS map needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSpectrum {
    pub index: usize,
    pub id: String,
    pub ms_level: u8,
    /// Scan start time in minutes
    pub time: f64,
    pub polarity: ScanPolarity,
    pub peaks: Vec<CPeak>,
    /// The first selected ion's m/z, only for MSn spectra
    pub precursor_mz: Option<f64>,
}

impl MapSpectrum {
    pub fn new(index: usize, ms_level: u8, time: f64, peaks: Vec<CPeak>) -> Self {
        Self {
            index,
            id: format!("scan={}", index + 1),
            ms_level,
            time,
            polarity: ScanPolarity::Unknown,
            peaks,
            precursor_mz: None,
        }
    }

    pub fn with_precursor(mut self, precursor_mz: f64) -> Self {
        self.precursor_mz = Some(precursor_mz);
        self
    }

    pub fn with_polarity(mut self, polarity: ScanPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn tic(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity() as f64).sum()
    }
}

/// Extract the trailing `scan=<n>` number from a native spectrum id
pub fn scan_number_from_id(id: &str) -> Option<u64> {
    id.split_whitespace()
        .filter_map(|token| token.strip_prefix("scan="))
        .next_back()
        .and_then(|n| n.parse().ok())
}

/// An ordered sequence of spectra supporting random access and forward iteration.
///
/// Retention time is expected, but not guaranteed, to be non-decreasing with index.
pub trait SpectrumRun {
    /// The number of spectra in the run
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&mut self, index: usize) -> Result<MapSpectrum, RunAccessError>;

    /// Read only the retention time at `index`. Implementations may override this with something
    /// cheaper than decoding the whole spectrum.
    fn time_at(&mut self, index: usize) -> Result<f64, RunAccessError> {
        self.get(index).map(|s| s.time)
    }

    /// Look up a spectrum by its vendor scan number.
    ///
    /// The default searches the native ids by linear iteration, falling back to the index
    /// `scan - 1`.
    fn get_by_scan_number(&mut self, scan: u64) -> Result<MapSpectrum, RunAccessError> {
        if scan == 0 {
            return Err(RunAccessError::ScanNotFound(scan));
        }
        self.rewind();
        while let Some(spec) = self.next_spectrum() {
            if scan_number_from_id(&spec.id) == Some(scan) {
                return Ok(spec);
            }
        }
        self.get(scan as usize - 1)
            .map_err(|_| RunAccessError::ScanNotFound(scan))
    }

    /// Move the forward iteration cursor back to the start of the run
    fn rewind(&mut self);

    /// Read the next spectrum from the forward iteration cursor
    fn next_spectrum(&mut self) -> Option<MapSpectrum>;
}

impl<T: SpectrumRun + ?Sized> SpectrumRun for &mut T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&mut self, index: usize) -> Result<MapSpectrum, RunAccessError> {
        (**self).get(index)
    }

    fn time_at(&mut self, index: usize) -> Result<f64, RunAccessError> {
        (**self).time_at(index)
    }

    fn get_by_scan_number(&mut self, scan: u64) -> Result<MapSpectrum, RunAccessError> {
        (**self).get_by_scan_number(scan)
    }

    fn rewind(&mut self) {
        (**self).rewind()
    }

    fn next_spectrum(&mut self) -> Option<MapSpectrum> {
        (**self).next_spectrum()
    }
}

/// A [`SpectrumRun`] held entirely in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryRun {
    spectra: Vec<MapSpectrum>,
    cursor: usize,
}

impl MemoryRun {
    pub fn new(spectra: Vec<MapSpectrum>) -> Self {
        Self { spectra, cursor: 0 }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MapSpectrum> {
        self.spectra.iter()
    }
}

impl FromIterator<MapSpectrum> for MemoryRun {
    fn from_iter<T: IntoIterator<Item = MapSpectrum>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl SpectrumRun for MemoryRun {
    fn len(&self) -> usize {
        self.spectra.len()
    }

    fn get(&mut self, index: usize) -> Result<MapSpectrum, RunAccessError> {
        self.spectra
            .get(index)
            .cloned()
            .ok_or(RunAccessError::IndexOutOfRange(index, self.spectra.len()))
    }

    fn time_at(&mut self, index: usize) -> Result<f64, RunAccessError> {
        self.spectra
            .get(index)
            .map(|s| s.time)
            .ok_or(RunAccessError::IndexOutOfRange(index, self.spectra.len()))
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn next_spectrum(&mut self) -> Option<MapSpectrum> {
        let spec = self.spectra.get(self.cursor).cloned();
        if spec.is_some() {
            self.cursor += 1;
        }
        spec
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_run() -> MemoryRun {
        (0..5)
            .map(|i| {
                MapSpectrum::new(i, 1, i as f64, vec![CPeak::new(100.0, 10.0, 0)])
                    .with_id(format!("controllerType=0 controllerNumber=1 scan={}", i + 10))
            })
            .collect()
    }

    #[test]
    fn test_scan_number_from_id() {
        assert_eq!(scan_number_from_id("scan=42"), Some(42));
        assert_eq!(
            scan_number_from_id("controllerType=0 controllerNumber=1 scan=7"),
            Some(7)
        );
        assert_eq!(scan_number_from_id("index=7"), None);
        assert_eq!(scan_number_from_id("scan=abc"), None);
    }

    #[test]
    fn test_get_by_scan_number() {
        let mut run = make_run();
        let spec = run.get_by_scan_number(12).unwrap();
        assert_eq!(spec.index, 2);

        // No id carries scan=3, so the index fallback is used
        let spec = run.get_by_scan_number(3).unwrap();
        assert_eq!(spec.index, 2);

        assert_eq!(
            run.get_by_scan_number(100),
            Err(RunAccessError::ScanNotFound(100))
        );
        assert_eq!(
            run.get_by_scan_number(0),
            Err(RunAccessError::ScanNotFound(0))
        );
    }

    #[test]
    fn test_forward_iteration() {
        let mut run = make_run();
        let mut n = 0;
        while let Some(s) = run.next_spectrum() {
            assert_eq!(s.index, n);
            n += 1;
        }
        assert_eq!(n, 5);
        assert!(run.next_spectrum().is_none());
        run.rewind();
        assert_eq!(run.next_spectrum().map(|s| s.index), Some(0));
    }
}
