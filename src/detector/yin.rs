//! The YIN pitch detection algorithm is based on the algorithm from the paper
//! *[YIN, a fundamental frequency estimator for speech and music](http://recherche.ircam.fr/equipes/pcm/cheveign/ps/2002_JASA_YIN_proof.pdf)*.
//! It is efficient and offers an improvement over basic autocorrelation.
//!
//! The YIN pitch detection algorithm is similar to the [MPM][crate::detector::mpm], but it is based on
//! a different normalization of the *mean square difference function*.
//!
//! Let $S=(s_0,s_1,\ldots,s_N)$ be a discrete signal. The *mean square difference function* at time $t$
//! is defined by
//! $$ d(t) = \sum_{i=0}^{N-t} (s_i-s_{i+t})^2. $$
//! This function is close to zero when the signal "lines up" with itself. However, *close* is a relative term,
//! and the value of $d\'(t)$ depends on volume, which should not affect the pitch of the signal. For this
//! reason, the signal is normalized. The YIN algorithm computes the *cumulative mean normalized difference function*,
//! $$ d\'(t) = \begin{cases}1&\text{if }t=0\\\\ d(t) / \left[ \tfrac{1}{t}\sum_{i=1}^t d(i) \right] & \text{otherwise}\end{cases}. $$
//! Then, it searches for the first local minimum of $d\'(t)$ below a given threshold.
//!
//! ## Implementation
//! Rather than compute the cumulative mean normalized difference function directly,
//! an [FFT](https://en.wikipedia.org/wiki/Fast_Fourier_transform) is used, providing a dramatic speed increase for large buffers.
//!
//! After a candidate frequency is found, quadratic interpolation is applied to further refine the estimate.
//!
//! ## Probabilistic YIN
//! Following *pYIN: A fundamental frequency estimator using probabilistic threshold distributions*
//! (Mauch and Dixon), the probabilistic variant does not fix the threshold. It sweeps 100 thresholds
//! weighted by a Beta(2, 18) prior, and every dip found collects the weight of the thresholds that
//! select it. A [PitchModel] then picks among the dips.
//!
//! The current implementation does not perform *Step 6* of the algorithm specified in the YIN paper.
use std::collections::BTreeMap;
use std::sync::Arc;

use log::{trace, warn};

use crate::detector::internals::{
    has_power, pitch_from_lag, windowed_square_error, yin_normalize_square_error,
    DetectorInternals,
};
use crate::detector::PitchDetector;
use crate::error::Result;
use crate::float::Float;
use crate::resolver::{Candidate, PitchModel};
use crate::utils::peak::{find_extremum, parabolic_interpolation, Extremum};

/// The YIN paper uses 0.1 as a threshold; TarsosDSP uses 0.2.
const YIN_THRESHOLD: f64 = 0.15;
const PYIN_N_THRESHOLDS: usize = 100;
const PYIN_BETA_A: f64 = 2.0;
const PYIN_BETA_B: f64 = 18.0;
/// Weight kept by the global minimum when a threshold finds no dip.
const PYIN_ABSOLUTE_MIN_PROBABILITY: f64 = 0.01;
/// Dips whose refined value is not below this are not candidates.
const PYIN_ACCEPT_THRESHOLD: f64 = 0.5;

pub struct YinDetector<T>
where
    T: Float,
{
    internals: DetectorInternals<T>,
    threshold_weights: Vec<T>,
}

impl<T> YinDetector<T>
where
    T: Float,
{
    /// Allocate a YIN detector for signals of exactly `size` samples. The
    /// difference function covers `size / 2` lags, so `size` must be at least 2.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_model(size, PitchModel::shared())
    }

    pub fn with_model(size: usize, model: Arc<PitchModel>) -> Result<Self> {
        let internals = DetectorInternals::new(size, size / 2, "YIN", model)?;
        Ok(YinDetector {
            internals,
            threshold_weights: beta_threshold_weights(),
        })
    }

    /// Fill the working buffer with the cumulative mean normalized difference
    /// function of `signal`. Returns `false` if there is nothing to analyse.
    fn difference(&mut self, signal: &[T]) -> bool {
        assert_eq!(signal.len(), self.internals.size);

        if !has_power(signal) {
            return false;
        }

        let DetectorInternals {
            transform, work, ..
        } = &mut self.internals;
        let window_size = work.len();

        // STEP 2: Calculate the difference function, d_t.
        if let Err(err) = windowed_square_error(signal, window_size, transform, work) {
            warn!("difference function failed: {}", err);
            return false;
        }

        // STEP 3: Calculate the cumulative mean normalized difference function, d_t'.
        yin_normalize_square_error(work);
        true
    }
}

/// STEP 4: The absolute threshold. The first lag whose d' dips below
/// `threshold`, followed down to the bottom of that dip.
fn first_dip<T: Float>(cmnd: &[T], threshold: T) -> Option<usize> {
    let tau = (2..cmnd.len()).find(|&tau| cmnd[tau] < threshold)?;
    find_extremum(cmnd, tau, Extremum::Minimum)
}

/// The lowest d' at an interior lag, provided it is below 1 (i.e. better than
/// the running mean at all).
fn global_minimum<T: Float>(cmnd: &[T]) -> Option<usize> {
    let interior = 2..cmnd.len().saturating_sub(1);
    let tau = interior.min_by(|&a, &b| {
        cmnd[a]
            .partial_cmp(&cmnd[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    })?;
    if cmnd[tau] < T::one() {
        Some(tau)
    } else {
        None
    }
}

/// Beta distribution weights for the thresholds `0.01, 0.02, ..., 1.00`, summing to 1.
fn beta_threshold_weights<T: Float>() -> Vec<T> {
    let density: Vec<f64> = (1..=PYIN_N_THRESHOLDS)
        .map(|n| {
            let x = n as f64 / PYIN_N_THRESHOLDS as f64;
            x.powf(PYIN_BETA_A - 1.) * (1. - x).powf(PYIN_BETA_B - 1.)
        })
        .collect();
    let total: f64 = density.iter().sum();
    density
        .iter()
        .map(|d| T::from_f64(d / total).unwrap())
        .collect()
}

/// Pitch detection based on the YIN algorithm. See <http://recherche.ircam.fr/equipes/pcm/cheveign/ps/2002_JASA_YIN_proof.pdf>
impl<T> PitchDetector<T> for YinDetector<T>
where
    T: Float,
{
    /// # Panics
    /// If `signal` does not have the length the detector was allocated for.
    fn pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T> {
        if !self.difference(signal) {
            return None;
        }
        let cmnd = &self.internals.work[..];
        let threshold = T::from_f64(YIN_THRESHOLD).unwrap();

        let tau = first_dip(cmnd, threshold).or_else(|| global_minimum(cmnd))?;

        // STEP 5: Use quadratic interpolation to fine-tune the result
        let peak = parabolic_interpolation(cmnd, tau)?;
        pitch_from_lag(sample_rate, peak.lag)

        // STEP 6: TODO. Step 6 of the YIN paper can eek out a little more accuracy/consistency, but
        // it also involves computing over a much larger window.
    }

    /// # Panics
    /// If `signal` does not have the length the detector was allocated for.
    fn probabilistic_pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T> {
        if !self.difference(signal) {
            return None;
        }
        let cmnd = &self.internals.work[..];
        let n_thresholds = T::from_usize(PYIN_N_THRESHOLDS).unwrap();
        let absolute_min_probability = T::from_f64(PYIN_ABSOLUTE_MIN_PROBABILITY).unwrap();
        let global = global_minimum(cmnd);

        let mut probabilities: BTreeMap<usize, T> = BTreeMap::new();
        for (n, &weight) in self.threshold_weights.iter().enumerate() {
            let threshold = T::from_usize(n + 1).unwrap() / n_thresholds;
            let (tau, weight) = match (first_dip(cmnd, threshold), global) {
                (Some(tau), _) => (tau, weight),
                (None, Some(tau)) => (tau, weight * absolute_min_probability),
                (None, None) => continue,
            };
            let probability = probabilities.entry(tau).or_insert_with(T::zero);
            *probability = *probability + weight;
        }

        let accept = T::from_f64(PYIN_ACCEPT_THRESHOLD).unwrap();
        let candidates: Vec<Candidate<T>> = probabilities
            .into_iter()
            .filter_map(|(tau, probability)| {
                let peak = parabolic_interpolation(cmnd, tau)?;
                if peak.strength >= accept {
                    trace!("dip at lag {} is too shallow ({})", tau, peak.strength);
                    return None;
                }
                Some(Candidate {
                    frequency: pitch_from_lag(sample_rate, peak.lag)?,
                    probability,
                })
            })
            .collect();

        self.internals.model.resolve(&candidates)
    }
}
