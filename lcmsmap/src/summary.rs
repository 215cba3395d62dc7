//! Whole-run statistics computed by a single forward pass
use mzdata::spectrum::ScanPolarity;
use serde::Serialize;

use crate::run::SpectrumRun;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub spectrum_count: usize,
    pub ms1_spectra: usize,
    pub msn_spectra: usize,
    pub positive: usize,
    pub negative: usize,
    pub unknown_polarity: usize,
}

impl RunSummary {
    /// The polarity shared by every spectrum, if there is exactly one
    pub fn polarity(&self) -> ScanPolarity {
        match (self.positive > 0, self.negative > 0) {
            (true, false) => ScanPolarity::Positive,
            (false, true) => ScanPolarity::Negative,
            _ => ScanPolarity::Unknown,
        }
    }
}

/// Count spectra by MS level and polarity
pub fn summarize_run<R: SpectrumRun + ?Sized>(run: &mut R) -> RunSummary {
    let mut summary = RunSummary::default();
    run.rewind();
    while let Some(spec) = run.next_spectrum() {
        summary.spectrum_count += 1;
        if spec.ms_level == 1 {
            summary.ms1_spectra += 1;
        } else {
            summary.msn_spectra += 1;
        }
        match spec.polarity {
            ScanPolarity::Positive => summary.positive += 1,
            ScanPolarity::Negative => summary.negative += 1,
            _ => summary.unknown_polarity += 1,
        }
    }
    summary
}

/// Summed MS1 intensity over time, in seconds
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TotalIonChromatogram {
    pub times: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl TotalIonChromatogram {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.intensities.iter().copied())
    }
}

pub fn total_ion_chromatogram<R: SpectrumRun + ?Sized>(run: &mut R) -> TotalIonChromatogram {
    let mut tic = TotalIonChromatogram::default();
    run.rewind();
    while let Some(spec) = run.next_spectrum() {
        if spec.ms_level != 1 {
            continue;
        }
        tic.times.push(spec.time * 60.0);
        tic.intensities.push(spec.tic());
    }
    tic
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::run::{MapSpectrum, MemoryRun};
    use crate::types::CPeak;

    fn make_run() -> MemoryRun {
        (0..6)
            .map(|i| {
                let level = if i % 3 == 0 { 1 } else { 2 };
                let polarity = if i < 5 {
                    ScanPolarity::Positive
                } else {
                    ScanPolarity::Unknown
                };
                MapSpectrum::new(
                    i,
                    level,
                    i as f64 * 0.5,
                    vec![CPeak::new(100.0, 2.0, 0), CPeak::new(200.0, 3.0, 1)],
                )
                .with_polarity(polarity)
            })
            .collect()
    }

    #[test]
    fn test_summary() {
        let summary = summarize_run(&mut make_run());
        assert_eq!(summary.spectrum_count, 6);
        assert_eq!(summary.ms1_spectra, 2);
        assert_eq!(summary.msn_spectra, 4);
        assert_eq!(summary.positive, 5);
        assert_eq!(summary.unknown_polarity, 1);
        assert_eq!(summary.polarity(), ScanPolarity::Positive);
    }

    #[test]
    fn test_tic() {
        let tic = total_ion_chromatogram(&mut make_run());
        assert_eq!(tic.times, vec![0.0, 90.0]);
        assert_eq!(tic.intensities, vec![5.0, 5.0]);
        assert_eq!(tic.iter().count(), 2);
    }
}
