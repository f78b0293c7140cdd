use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::float::Float;
use crate::resolver::PitchModel;
use crate::utils::buffer::{new_real_buffer, square_sum};
use crate::utils::fft::Transform;

/// Data structure to hold any buffers needed for pitch computation.
/// Buffers and transform plans are allocated once for a given signal size
/// and reused by every call, rather than allocated and freed repeatedly.
pub struct DetectorInternals<T>
where
    T: Float,
{
    pub size: usize,
    pub transform: Transform<T>,
    pub work: Vec<T>,
    pub model: Arc<PitchModel>,
}

impl<T> DetectorInternals<T>
where
    T: Float,
{
    /// The transform is twice as long as `size` so that every correlation is
    /// computed on a zero padded signal.
    pub fn new(
        size: usize,
        working_size: usize,
        detector: &'static str,
        model: Arc<PitchModel>,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::EmptyBuffer);
        }
        if working_size == 0 {
            return Err(Error::WorkingBufferTooSmall { size, detector });
        }

        let transform = Transform::new(2 * size)?;
        debug!(
            "allocated {} detector for {} samples ({} lags)",
            detector, size, working_size
        );

        Ok(DetectorInternals {
            size,
            transform,
            work: new_real_buffer(working_size),
            model,
        })
    }
}

/// A silent (or non-finite) signal carries no pitch.
pub fn has_power<T: Float>(signal: &[T]) -> bool {
    square_sum(signal) > T::zero()
}

/// Convert a refined lag to a frequency. Lags below one sample are rejected.
pub fn pitch_from_lag<T: Float>(sample_rate: usize, lag: T) -> Option<T> {
    if !(lag >= T::one()) {
        return None;
    }
    let frequency = T::from_usize(sample_rate).unwrap() / lag;
    if frequency > T::zero() && frequency.is_finite() {
        Some(frequency)
    } else {
        None
    }
}

/// Compute the autocorrelation of `signal` divided by the number of samples
/// overlapping at each lag,
///
/// > r'(t) = 1/(N-t) * sum_{i=0}^{N-t-1} x_i * x_{i+t}
///
/// so a periodic signal peaks with the same height at every multiple of its
/// period. `result` may hold at most `signal.len()` lags.
pub fn unbiased_autocorrelation<T>(
    signal: &[T],
    transform: &mut Transform<T>,
    result: &mut [T],
) -> Result<()>
where
    T: Float,
{
    assert!(result.len() <= signal.len());

    transform.autocorrelation(signal, result)?;
    let n = signal.len();
    result
        .iter_mut()
        .enumerate()
        .for_each(|(t, r)| *r = *r / T::from_usize(n - t).unwrap());
    Ok(())
}

/// Compute the normalized square difference function (NSDF) of the McLeod
/// pitch method,
///
/// > n(t) = 2 * r(t) / m(t), with m(t) = sum_{i=0}^{N-t-1} (x_i^2 + x_{i+t}^2)
///
/// where _r(t)_ is the autocorrelation. _n(t)_ lies in `[-1, 1]` and is set to
/// zero wherever _m(t)_ vanishes. `result` may hold at most `signal.len() + 1` lags.
pub fn normalized_square_difference<T>(
    signal: &[T],
    transform: &mut Transform<T>,
    result: &mut [T],
) -> Result<()>
where
    T: Float,
{
    assert!(result.len() <= signal.len() + 1);
    let two = T::from_usize(2).unwrap();

    transform.autocorrelation(signal, result)?;

    // m(t) shrinks by the two samples that drop out of the overlap at each step.
    let n = signal.len();
    let mut m = two * square_sum(signal);
    result.iter_mut().enumerate().for_each(|(t, r)| {
        if t > 0 {
            m = m - signal[t - 1] * signal[t - 1] - signal[n - t] * signal[n - t];
        }
        *r = if m > T::zero() { two * *r / m } else { T::zero() };
    });
    Ok(())
}

/// Compute the windowed square error, _d(t)_, of `signal`. For a window size of _w_ and a signal
/// _x=(x_0,x_1,...)_, this is defined by
///
///  > d(t) = sum_{i=0}^{w-1} (x_i - x_{i+t})^2
///
/// This function is computed efficiently using an FFT. It is assumed that `window_size` is at most half
/// the length of `signal`.
pub fn windowed_square_error<T>(
    signal: &[T],
    window_size: usize,
    transform: &mut Transform<T>,
    result: &mut [T],
) -> Result<()>
where
    T: Float,
{
    assert!(
        2 * window_size <= signal.len(),
        "The window size cannot be more than half the signal length"
    );

    let two = T::from_f64(2.).unwrap();
    let result = &mut result[..window_size];

    // The windowed square error function, d(t), can be computed
    // as d(t) = pow_0^w + pow_t^{t+w} - 2*windowed_autocorrelation(t)
    // where pow_a^b is the sum of the square of `signal` on the window `a..b`
    // We proceed accordingly.
    transform.cross_correlation(signal, &signal[..window_size], result)?;
    let mut windowed_power = square_sum(&signal[..window_size]);
    let power = windowed_power;

    result.iter_mut().enumerate().for_each(|(i, a)| {
        *a = power + windowed_power - two * *a;
        // Slide the window: pow_{t+1}^{t+1+w} from pow_t^{t+w}.
        windowed_power = windowed_power - signal[i] * signal[i]
            + signal[i + window_size] * signal[i + window_size];
    });
    Ok(())
}

/// Calculate the "cumulative mean normalized difference function" as
/// specified in the YIN paper. If _d(t)_ is the square error function,
/// compute _d'(0) = 1_ and for _t > 0_
///
///  > d'(t) = d(t) / [ (1/t) * sum_{i=1}^t d(i) ]
///
/// While the running sum is still zero, _d'(t) = 1_.
pub fn yin_normalize_square_error<T: Float>(square_error: &mut [T]) {
    let mut sum = T::zero();
    if let Some(first) = square_error.first_mut() {
        *first = T::one();
    }
    square_error
        .iter_mut()
        .enumerate()
        .skip(1)
        .for_each(|(i, a)| {
            sum = sum + *a;
            *a = if sum > T::zero() {
                *a * T::from_usize(i).unwrap() / sum
            } else {
                T::one()
            };
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(values: &mut [f64]) {
        // Using an FFT loses precision; we don't care that much, so round generously.
        values.iter_mut().for_each(|x| *x = (*x * 100.).round() / 100.);
    }

    #[test]
    fn windowed_square_error_test() {
        let signal: Vec<f64> = vec![0., 1., 2., 0., -1., -2.];
        let window_size: usize = 3;

        let transform = &mut Transform::new(2 * signal.len()).unwrap();

        let result: Vec<f64> = (0..window_size)
            .map(|i| {
                signal[..window_size]
                    .iter()
                    .zip(signal[i..(i + window_size)].iter())
                    .map(|(x_j, x_j_tau)| (*x_j - *x_j_tau) * (*x_j - *x_j_tau))
                    .sum()
            })
            .collect();

        let mut computed_result = vec![0.; window_size];
        windowed_square_error(&signal, window_size, transform, &mut computed_result).unwrap();
        round(&mut computed_result);

        assert_eq!(result, computed_result);
    }

    #[test]
    fn normalized_square_difference_test() {
        let signal: Vec<f64> = vec![0., 1., 2., 0., -1., -2.];
        let lags = signal.len() / 2 + 1;
        let n = signal.len();

        let mut result: Vec<f64> = (0..lags)
            .map(|t| {
                let r: f64 = (0..n - t).map(|i| signal[i] * signal[i + t]).sum();
                let m: f64 = (0..n - t)
                    .map(|i| signal[i] * signal[i] + signal[i + t] * signal[i + t])
                    .sum();
                2. * r / m
            })
            .collect();
        round(&mut result);

        let transform = &mut Transform::new(2 * n).unwrap();
        let mut computed_result = vec![0.; lags];
        normalized_square_difference(&signal, transform, &mut computed_result).unwrap();
        round(&mut computed_result);

        assert_eq!(result, computed_result);
        assert_eq!(computed_result[0], 1.);
    }

    #[test]
    fn unbiased_autocorrelation_test() {
        let signal: Vec<f64> = vec![1., -1., 1., -1.];
        let transform = &mut Transform::new(8).unwrap();

        let mut computed_result = vec![0.; 3];
        unbiased_autocorrelation(&signal, transform, &mut computed_result).unwrap();
        round(&mut computed_result);

        assert_eq!(computed_result, vec![1., -1., 1.]);
    }

    #[test]
    fn yin_normalized_square_error_test() {
        let signal: &mut Vec<f64> = &mut vec![0., 6., 14.];
        let result = vec![1., 1., 2. * 14. / (6. + 14.)];

        yin_normalize_square_error(signal);

        assert_eq!(result, *signal);
    }

    #[test]
    fn yin_normalization_of_flat_error() {
        let signal = &mut vec![0.0f32; 4];
        yin_normalize_square_error(signal);
        assert_eq!(*signal, vec![1.; 4]);
    }

    #[test]
    fn lag_conversion() {
        assert_eq!(pitch_from_lag(44100, 100.0f64), Some(441.0));
        assert_eq!(pitch_from_lag(44100, 0.5f64), None);
        assert_eq!(pitch_from_lag(0, 100.0f64), None);
        assert_eq!(pitch_from_lag(44100, f64::NAN), None);
    }

    #[test]
    fn internals_reject_empty_sizes() {
        let model = PitchModel::shared();
        assert!(matches!(
            DetectorInternals::<f64>::new(0, 1, "test", model.clone()),
            Err(Error::EmptyBuffer)
        ));
        assert!(matches!(
            DetectorInternals::<f64>::new(4, 0, "test", model.clone()),
            Err(Error::WorkingBufferTooSmall { size: 4, .. })
        ));
        let internals = DetectorInternals::<f64>::new(4, 2, "test", model).unwrap();
        assert_eq!(internals.transform.len(), 8);
        assert_eq!(internals.work.len(), 2);
    }
}
