//! The McLeod pitch method (MPM), from *A Smarter Way to Find Pitch* by Philip McLeod
//! and Geoff Wyvill.
//!
//! The signal's *normalized square difference function* (NSDF),
//! $$ n(t) = \frac{2\sum_i s_i s_{i+t}}{\sum_i s_i^2 + s_{i+t}^2}, $$
//! is bounded by $[-1, 1]$ and equals $1$ when the signal lines up perfectly with
//! itself shifted by $t$. Between every positive-going and negative-going zero
//! crossing of the NSDF the highest point is a candidate peak. Of these, the *key
//! maximum* is the first one reaching a fixed fraction of the highest peak, which
//! favours the fundamental over its sub-harmonics.
//!
//! ## Implementation
//! The autocorrelation inside the NSDF is computed with an FFT over a zero padded
//! signal. Peaks are refined with parabolic interpolation. The probabilistic
//! variant sweeps the key maximum fraction and lets a [PitchModel] arbitrate
//! between the peaks it selects.
use std::sync::Arc;

use log::{debug, warn};

use crate::detector::internals::{
    has_power, normalized_square_difference, pitch_from_lag, DetectorInternals,
};
use crate::detector::PitchDetector;
use crate::error::Result;
use crate::float::Float;
use crate::resolver::{Candidate, PitchModel};
use crate::utils::peak::{detect_peaks, parabolic_interpolation, Peak};

/// Fraction of the highest peak the key maximum must reach.
const MPM_CUTOFF: f64 = 0.9;
/// Peaks below this NSDF value are never candidates.
const MPM_SMALL_CUTOFF: f64 = 0.5;
const PMPM_CUTOFF_BEGIN: f64 = 0.8;
const PMPM_CUTOFF_STEP: f64 = 0.01;
const PMPM_N_CUTOFFS: usize = 20;

pub struct MpmDetector<T>
where
    T: Float,
{
    internals: DetectorInternals<T>,
    estimates: Vec<Peak<T>>,
}

impl<T> MpmDetector<T>
where
    T: Float,
{
    /// Allocate an MPM detector for signals of exactly `size` samples.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_model(size, PitchModel::shared())
    }

    pub fn with_model(size: usize, model: Arc<PitchModel>) -> Result<Self> {
        // Lags 0..=size/2
        let internals = DetectorInternals::new(size, size / 2 + 1, "MPM", model)?;
        Ok(MpmDetector {
            internals,
            estimates: Vec::new(),
        })
    }

    /// Compute the NSDF of `signal` and collect its refined candidate peaks in
    /// lag order. Returns the highest peak strength seen.
    fn collect_estimates(&mut self, signal: &[T]) -> Option<T> {
        assert_eq!(signal.len(), self.internals.size);
        self.estimates.clear();

        if !has_power(signal) {
            return None;
        }

        let DetectorInternals {
            transform, work, ..
        } = &mut self.internals;
        if let Err(err) = normalized_square_difference(signal, transform, work) {
            warn!("NSDF computation failed: {}", err);
            return None;
        }
        let nsdf = &work[..];

        let small_cutoff = T::from_f64(MPM_SMALL_CUTOFF).unwrap();
        let mut highest = -T::infinity();
        for (idx, value) in detect_peaks(nsdf) {
            highest = highest.max(value);
            if value > small_cutoff {
                if let Some(peak) = parabolic_interpolation(nsdf, idx) {
                    highest = highest.max(peak.strength);
                    self.estimates.push(peak);
                }
            }
        }

        if self.estimates.is_empty() {
            debug!("no NSDF peak above {}", MPM_SMALL_CUTOFF);
            return None;
        }
        Some(highest)
    }
}

/// The earliest peak at least as strong as `cutoff`.
fn key_maximum<T: Float>(estimates: &[Peak<T>], cutoff: T) -> Option<usize> {
    estimates.iter().position(|peak| peak.strength >= cutoff)
}

impl<T> PitchDetector<T> for MpmDetector<T>
where
    T: Float,
{
    /// # Panics
    /// If `signal` does not have the length the detector was allocated for.
    fn pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T> {
        let highest = self.collect_estimates(signal)?;
        let cutoff = T::from_f64(MPM_CUTOFF).unwrap() * highest;
        let key = key_maximum(&self.estimates, cutoff)?;

        pitch_from_lag(sample_rate, self.estimates[key].lag)
    }

    /// # Panics
    /// If `signal` does not have the length the detector was allocated for.
    fn probabilistic_pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T> {
        let highest = self.collect_estimates(signal)?;

        // Every cutoff votes for the key maximum it would select.
        let share = T::one() / T::from_usize(PMPM_N_CUTOFFS).unwrap();
        let mut probabilities = vec![T::zero(); self.estimates.len()];
        for i in 0..PMPM_N_CUTOFFS {
            let fraction = PMPM_CUTOFF_BEGIN + i as f64 * PMPM_CUTOFF_STEP;
            let cutoff = T::from_f64(fraction).unwrap() * highest;
            if let Some(key) = key_maximum(&self.estimates, cutoff) {
                probabilities[key] = probabilities[key] + share;
            }
        }

        let candidates: Vec<Candidate<T>> = self
            .estimates
            .iter()
            .zip(probabilities)
            .filter(|(_, probability)| *probability > T::zero())
            .filter_map(|(peak, probability)| {
                Some(Candidate {
                    frequency: pitch_from_lag(sample_rate, peak.lag)?,
                    probability,
                })
            })
            .collect();

        self.internals.model.resolve(&candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sine(freq: f64, size: usize, sample_rate: usize) -> Vec<f64> {
        let dx = 2.0 * std::f64::consts::PI * freq / sample_rate as f64;
        (0..size).map(|i| (i as f64 * dx).sin()).collect()
    }

    #[test]
    fn empty_detector_is_rejected() {
        assert!(matches!(MpmDetector::<f64>::new(0), Err(Error::EmptyBuffer)));
        assert!(MpmDetector::<f64>::new(1).is_ok());
    }

    #[test]
    fn key_maximum_prefers_earliest_peak() {
        let estimates = [
            Peak {
                lag: 50.0,
                strength: 0.6,
            },
            Peak {
                lag: 100.0,
                strength: 0.92,
            },
            Peak {
                lag: 200.0,
                strength: 0.99,
            },
        ];
        assert_eq!(key_maximum(&estimates, 0.9 * 0.99), Some(1));
        assert_eq!(key_maximum(&estimates, 0.995), None);
    }

    #[test]
    fn detector_is_reusable() {
        let mut detector = MpmDetector::new(1024).unwrap();
        for freq in [220.0, 440.0, 330.0] {
            let signal = sine(freq, 1024, 44100);
            let pitch = detector.pitch(&signal, 44100).unwrap();
            assert!((pitch - freq).abs() < 0.01 * freq, "{} vs {}", pitch, freq);
            let pitch = detector.probabilistic_pitch(&signal, 44100).unwrap();
            assert!((pitch - freq).abs() < 0.01 * freq, "{} vs {}", pitch, freq);
        }
    }

    #[test]
    fn constant_signal_has_no_pitch() {
        let mut detector = MpmDetector::new(256).unwrap();
        assert_eq!(detector.pitch(&[0.5; 256], 8000), None);
        assert_eq!(detector.probabilistic_pitch(&[0.5; 256], 8000), None);
    }

    #[test]
    #[should_panic]
    fn length_mismatch_panics() {
        let mut detector = MpmDetector::<f64>::new(256).unwrap();
        detector.pitch(&[0.0; 128], 8000);
    }
}
