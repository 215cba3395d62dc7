use mzpeaks::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{CPeak, DEFAULT_PEAK_CAP};

/// Keep only the most intense peaks of a spectrum within an m/z window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakReducer {
    pub max_peaks: usize,
}

impl Default for PeakReducer {
    fn default() -> Self {
        Self {
            max_peaks: DEFAULT_PEAK_CAP,
        }
    }
}

impl PeakReducer {
    pub fn new(max_peaks: usize) -> Self {
        Self { max_peaks }
    }

    /// Select the peaks with `min_mz <= mz <= max_mz`, then keep the `max_peaks` most intense.
    ///
    /// The result is ordered by ascending intensity. Equal intensities keep their m/z order, so
    /// ties at the cutoff favor the higher m/z. Returns `None` when nothing remains, in which
    /// case the spectrum contributes no points.
    pub fn reduce(&self, peaks: &[CPeak], min_mz: f64, max_mz: f64) -> Option<Vec<CPeak>> {
        let mut kept: Vec<CPeak> = peaks
            .iter()
            .filter(|p| min_mz <= p.mz() && p.mz() <= max_mz)
            .cloned()
            .collect();
        if kept.is_empty() || self.max_peaks == 0 {
            return None;
        }
        kept.sort_by(|a, b| a.intensity().total_cmp(&b.intensity()));
        if kept.len() > self.max_peaks {
            let excess = kept.len() - self.max_peaks;
            kept.drain(..excess);
        }
        Some(kept)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;

    fn make_peaks(n: usize) -> Vec<CPeak> {
        (0..n)
            .map(|i| {
                // Intensity is unrelated to m/z order
                let inten = ((i * 37) % n) as f32 + 1.0;
                CPeak::new(100.0 + i as f64, inten, i as u32)
            })
            .collect()
    }

    #[test]
    fn test_cap_keeps_most_intense() {
        let peaks = make_peaks(400);
        let reducer = PeakReducer::default();
        let kept = reducer.reduce(&peaks, 0.0, 10_000.0).unwrap();
        assert_eq!(kept.len(), 150);
        assert!(kept
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.intensity() <= b.intensity()));

        let floor = kept
            .iter()
            .map(|p| p.intensity())
            .fold(f32::INFINITY, f32::min);
        let dropped_max = peaks
            .iter()
            .filter(|p| !kept.iter().any(|k| k.index == p.index))
            .map(|p| p.intensity())
            .fold(f32::NEG_INFINITY, f32::max);
        assert!(dropped_max <= floor);
    }

    #[test]
    fn test_mz_window() {
        let peaks = make_peaks(50);
        let reducer = PeakReducer::new(10);
        let kept = reducer.reduce(&peaks, 110.0, 114.0).unwrap();
        assert_eq!(kept.len(), 5);
        assert!(kept.iter().all(|p| (110.0..=114.0).contains(&p.mz())));

        assert!(reducer.reduce(&peaks, 500.0, 600.0).is_none());
        assert!(reducer.reduce(&[], 0.0, 1000.0).is_none());
    }

    #[test]
    fn test_under_cap_keeps_all() {
        let peaks = make_peaks(20);
        let kept = PeakReducer::default().reduce(&peaks, 0.0, 1e6).unwrap();
        assert_eq!(kept.len(), peaks.len());
        assert_eq!(kept.first().map(|p| p.intensity()), Some(1.0));
        assert_eq!(kept.last().map(|p| p.intensity()), Some(20.0));
    }
}
