//! Adapting `mzdata` readers into a [`SpectrumRun`]
use mzdata::prelude::*;
use mzdata::spectrum::bindata::ArrayRetrievalError;
use tracing::{debug, trace};

use crate::run::{MapSpectrum, RunAccessError, SpectrumRun};
use crate::types::{CPeak, DPeak, SpectrumType};

/// Convert a decoded `mzdata` spectrum into a [`MapSpectrum`].
///
/// Centroided peaks are used when the reader already produced them, otherwise the raw
/// m/z and intensity arrays are read point by point.
pub fn convert_spectrum(spec: &SpectrumType) -> Result<MapSpectrum, ArrayRetrievalError> {
    let peaks: Vec<CPeak> = if let Some(peaks) = spec.peaks.as_ref() {
        peaks.iter().cloned().collect()
    } else if let Some(arrays) = spec.arrays.as_ref() {
        let mzs = match arrays.mzs() {
            Ok(mzs) => mzs,
            Err(ArrayRetrievalError::NotFound(_)) => return Ok(empty_spectrum(spec)),
            Err(e) => return Err(e),
        };
        let intensities = arrays.intensities()?;
        mzs.iter()
            .zip(intensities.iter())
            .enumerate()
            .map(|(i, (mz, inten))| CPeak::new(*mz, *inten, i as u32))
            .collect()
    } else {
        Vec::new()
    };

    let mut converted = empty_spectrum(spec);
    converted.peaks = peaks;
    Ok(converted)
}

fn empty_spectrum(spec: &SpectrumType) -> MapSpectrum {
    let precursor_mz = if spec.ms_level() > 1 {
        spec.precursor()
            .and_then(|prec| prec.ions.first())
            .map(|ion| ion.mz)
    } else {
        None
    };

    MapSpectrum {
        index: spec.index(),
        id: spec.id().to_string(),
        ms_level: spec.ms_level(),
        time: spec.start_time(),
        polarity: spec.description().polarity,
        peaks: Vec::new(),
        precursor_mz,
    }
}

/// A [`SpectrumRun`] over any random access `mzdata` reader, e.g. `MZReader`.
#[derive(Debug)]
pub struct MzDataRun<R: SpectrumSource<CPeak, DPeak, SpectrumType>> {
    reader: R,
}

impl<R: SpectrumSource<CPeak, DPeak, SpectrumType>> MzDataRun<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn convert(spec: SpectrumType) -> Result<MapSpectrum, RunAccessError> {
        convert_spectrum(&spec).map_err(|e| RunAccessError::Unreadable(spec.index(), e.to_string()))
    }
}

impl<R: SpectrumSource<CPeak, DPeak, SpectrumType>> SpectrumRun for MzDataRun<R> {
    fn len(&self) -> usize {
        self.reader.len()
    }

    fn get(&mut self, index: usize) -> Result<MapSpectrum, RunAccessError> {
        let n = self.len();
        match self.reader.get_spectrum_by_index(index) {
            Some(spec) => Self::convert(spec),
            None => Err(RunAccessError::IndexOutOfRange(index, n)),
        }
    }

    fn time_at(&mut self, index: usize) -> Result<f64, RunAccessError> {
        let n = self.len();
        self.reader
            .get_spectrum_by_index(index)
            .map(|s| s.start_time())
            .ok_or(RunAccessError::IndexOutOfRange(index, n))
    }

    fn get_by_scan_number(&mut self, scan: u64) -> Result<MapSpectrum, RunAccessError> {
        let candidates = [
            format!("scan={scan}"),
            format!("controllerType=0 controllerNumber=1 scan={scan}"),
        ];
        for id in candidates.iter() {
            if let Some(spec) = self.reader.get_spectrum_by_id(id) {
                trace!("Found scan {scan} by native id {id}");
                return Self::convert(spec);
            }
        }
        if scan == 0 {
            return Err(RunAccessError::ScanNotFound(scan));
        }
        debug!("Scan {scan} not found by native id, reading index {}", scan - 1);
        self.reader
            .get_spectrum_by_index(scan as usize - 1)
            .ok_or(RunAccessError::ScanNotFound(scan))
            .and_then(|spec| Self::convert(spec))
    }

    fn rewind(&mut self) {
        self.reader.reset();
    }

    fn next_spectrum(&mut self) -> Option<MapSpectrum> {
        loop {
            let spec = self.reader.next()?;
            match Self::convert(spec) {
                Ok(spec) => return Some(spec),
                Err(e) => {
                    debug!("Skipping spectrum during iteration: {e}");
                }
            }
        }
    }
}
