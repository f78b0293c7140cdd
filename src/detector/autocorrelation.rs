//! Pitch from the periodicity of the autocorrelation function (ACF).
//!
//! A periodic signal correlates with itself at every multiple of its period,
//! so the ACF has a row of peaks at lags _P, 2P, 3P, ..._. The period is taken
//! as the mean spacing of those peaks, counted from lag zero. The ACF is divided
//! by the overlap at each lag so that later peaks are not dwarfed by earlier ones.
//!
//! This is the simplest and least robust of the detectors: any strong peak that
//! is not a multiple of the period skews the mean.
use std::sync::Arc;

use log::{debug, warn};

use crate::detector::internals::{
    has_power, pitch_from_lag, unbiased_autocorrelation, DetectorInternals,
};
use crate::detector::PitchDetector;
use crate::error::Result;
use crate::float::Float;
use crate::resolver::{Candidate, PitchModel};
use crate::utils::peak::{detect_peaks, parabolic_interpolation, Peak};

/// Peaks below this fraction of the lag zero value are ignored.
const ACF_CLARITY: f64 = 0.5;

pub struct AutocorrelationDetector<T>
where
    T: Float,
{
    internals: DetectorInternals<T>,
    peaks: Vec<Peak<T>>,
}

impl<T> AutocorrelationDetector<T>
where
    T: Float,
{
    /// Allocate an autocorrelation detector for signals of exactly `size` samples.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_model(size, PitchModel::shared())
    }

    pub fn with_model(size: usize, model: Arc<PitchModel>) -> Result<Self> {
        let internals = DetectorInternals::new(size, size / 2 + 1, "ACF", model)?;
        Ok(AutocorrelationDetector {
            internals,
            peaks: Vec::new(),
        })
    }

    /// Compute the normalized ACF of `signal` and collect its refined peaks in
    /// lag order. Returns `false` if no peak is clear enough.
    fn collect_peaks(&mut self, signal: &[T]) -> bool {
        assert_eq!(signal.len(), self.internals.size);
        self.peaks.clear();

        if !has_power(signal) {
            return false;
        }

        let DetectorInternals {
            transform, work, ..
        } = &mut self.internals;
        if let Err(err) = unbiased_autocorrelation(signal, transform, work) {
            warn!("autocorrelation failed: {}", err);
            return false;
        }
        let power = work[0];
        if !(power > T::zero()) {
            return false;
        }
        work.iter_mut().for_each(|r| *r = *r / power);
        let acf = &work[..];

        let clarity = T::from_f64(ACF_CLARITY).unwrap();
        self.peaks.extend(
            detect_peaks(acf)
                .filter(|&(_, value)| value > clarity)
                .filter_map(|(idx, _)| parabolic_interpolation(acf, idx)),
        );

        if self.peaks.is_empty() {
            debug!("no ACF peak above {}", ACF_CLARITY);
            return false;
        }
        true
    }
}

/// Mean spacing of `peaks`, counting the first one from lag zero.
fn mean_period<T: Float>(peaks: &[Peak<T>]) -> Option<T> {
    let last = peaks.last()?;
    Some(last.lag / T::from_usize(peaks.len()).unwrap())
}

impl<T> PitchDetector<T> for AutocorrelationDetector<T>
where
    T: Float,
{
    /// # Panics
    /// If `signal` does not have the length the detector was allocated for.
    fn pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T> {
        if !self.collect_peaks(signal) {
            return None;
        }
        pitch_from_lag(sample_rate, mean_period(&self.peaks)?)
    }

    /// The single periodicity estimate, weighted by the height of the first
    /// ACF peak, resolved by the pitch model.
    ///
    /// # Panics
    /// If `signal` does not have the length the detector was allocated for.
    fn probabilistic_pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T> {
        if !self.collect_peaks(signal) {
            return None;
        }
        let candidate = Candidate {
            frequency: pitch_from_lag(sample_rate, mean_period(&self.peaks)?)?,
            probability: self.peaks[0].strength.min(T::one()),
        };
        self.internals.model.resolve(&[candidate])
    }
}
