//! Forward/inverse Fourier transforms of a fixed length, together with the
//! spectrum and scratch buffers they work in.
//!
//! Power-of-two lengths use a real-to-complex plan from `realfft`, whose
//! spectrum only holds the `len / 2 + 1` non-redundant bins. Other lengths fall
//! back to a complex-to-complex plan from `rustfft` over `len` bins.
use std::sync::Arc;

use log::debug;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{Fft, FftPlanner};

use crate::error::{Error, Result};
use crate::float::Float;
use crate::utils::buffer::{
    copy_complex_to_real, copy_real_padded, copy_real_to_complex, modulus_squared,
    new_complex_buffer, new_real_buffer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftKind {
    RealToComplex,
    ComplexToComplex,
}

enum Plan<T: Float> {
    Real {
        forward: Arc<dyn RealToComplex<T>>,
        inverse: Arc<dyn ComplexToReal<T>>,
        input: Vec<T>,
    },
    Complex {
        forward: Arc<dyn Fft<T>>,
        inverse: Arc<dyn Fft<T>>,
    },
}

/// A pair of forward/inverse plans for one transform length and the buffers
/// they write to. The buffers are overwritten by every call, so a `Transform`
/// is only ever used through `&mut self`.
pub struct Transform<T: Float> {
    len: usize,
    plan: Plan<T>,
    spectrum: Vec<Complex<T>>,
    window_spectrum: Vec<Complex<T>>,
    output: Vec<T>,
    scratch: Vec<Complex<T>>,
}

impl<T: Float> Transform<T> {
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::EmptyBuffer);
        }

        let (plan, spectrum_len, scratch_len) = if len.is_power_of_two() {
            let mut planner = RealFftPlanner::<T>::new();
            let forward = planner.plan_fft_forward(len);
            let inverse = planner.plan_fft_inverse(len);
            let scratch_len = forward.get_scratch_len().max(inverse.get_scratch_len());
            let plan = Plan::Real {
                forward,
                inverse,
                input: new_real_buffer(len),
            };
            (plan, len / 2 + 1, scratch_len)
        } else {
            let mut planner = FftPlanner::<T>::new();
            let forward = planner.plan_fft_forward(len);
            let inverse = planner.plan_fft_inverse(len);
            let scratch_len = forward
                .get_inplace_scratch_len()
                .max(inverse.get_inplace_scratch_len());
            (Plan::Complex { forward, inverse }, len, scratch_len)
        };

        let transform = Transform {
            len,
            plan,
            spectrum: new_complex_buffer(spectrum_len),
            window_spectrum: new_complex_buffer(spectrum_len),
            output: new_real_buffer(len),
            scratch: new_complex_buffer(scratch_len),
        };
        debug!(
            "planned {:?} transform of length {} ({} spectrum bins)",
            transform.kind(),
            len,
            spectrum_len
        );
        Ok(transform)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn kind(&self) -> FftKind {
        match self.plan {
            Plan::Real { .. } => FftKind::RealToComplex,
            Plan::Complex { .. } => FftKind::ComplexToComplex,
        }
    }

    /// Number of complex bins the forward transform produces.
    pub fn spectrum_len(&self) -> usize {
        self.spectrum.len()
    }

    /// Zero the spectrum buffers so nothing from a previous call leaks into the next.
    pub fn clear(&mut self) {
        self.spectrum.iter_mut().for_each(|c| *c = Complex::zero());
        self.window_spectrum
            .iter_mut()
            .for_each(|c| *c = Complex::zero());
    }

    /// Compute the linear autocorrelation _r(t) = sum_i x_i*x_{i+t}_ of `signal`
    /// into `result`. `signal` is zero padded to the transform length, so the result
    /// has no wraparound as long as the transform is at least twice as long as `signal`.
    pub fn autocorrelation(&mut self, signal: &[T], result: &mut [T]) -> Result<()> {
        assert!(
            signal.len() <= self.len,
            "Signal of length {} does not fit a transform of length {}",
            signal.len(),
            self.len
        );

        self.clear();
        forward(&mut self.plan, signal, &mut self.spectrum, &mut self.scratch)?;
        modulus_squared(&mut self.spectrum);
        inverse(&self.plan, &mut self.spectrum, &mut self.scratch, &mut self.output)?;
        self.write_result(result);
        Ok(())
    }

    /// Compute the cross correlation _c(t) = sum_i window_i*signal_{i+t}_ into `result`.
    pub fn cross_correlation(&mut self, signal: &[T], window: &[T], result: &mut [T]) -> Result<()> {
        assert!(
            signal.len() <= self.len && window.len() <= self.len,
            "Inputs do not fit a transform of length {}",
            self.len
        );

        self.clear();
        forward(&mut self.plan, signal, &mut self.spectrum, &mut self.scratch)?;
        forward(
            &mut self.plan,
            window,
            &mut self.window_spectrum,
            &mut self.scratch,
        )?;
        self.spectrum
            .iter_mut()
            .zip(self.window_spectrum.iter())
            .for_each(|(a, b)| *a = *a * b.conj());
        inverse(&self.plan, &mut self.spectrum, &mut self.scratch, &mut self.output)?;
        self.write_result(result);
        Ok(())
    }

    // Neither library normalizes, so forward -> inverse scales everything by `len`.
    fn write_result(&self, result: &mut [T]) {
        let normalization_const = T::one() / T::from_usize(self.len).unwrap();
        let n = result.len().min(self.len);
        result[..n]
            .iter_mut()
            .zip(self.output.iter())
            .for_each(|(r, o)| *r = *o * normalization_const);
        result[n..].iter_mut().for_each(|r| *r = T::zero());
    }
}

fn forward<T: Float>(
    plan: &mut Plan<T>,
    signal: &[T],
    spectrum: &mut [Complex<T>],
    scratch: &mut [Complex<T>],
) -> Result<()> {
    match plan {
        Plan::Real { forward, input, .. } => {
            copy_real_padded(signal, input);
            forward.process_with_scratch(input, spectrum, scratch)?;
        }
        Plan::Complex { forward, .. } => {
            copy_real_to_complex(signal, spectrum);
            forward.process_with_scratch(spectrum, scratch);
        }
    }
    Ok(())
}

fn inverse<T: Float>(
    plan: &Plan<T>,
    spectrum: &mut [Complex<T>],
    scratch: &mut [Complex<T>],
    output: &mut [T],
) -> Result<()> {
    match plan {
        Plan::Real { inverse, .. } => {
            // A real output needs purely real DC and Nyquist bins.
            if let Some(first) = spectrum.first_mut() {
                first.im = T::zero();
            }
            if let Some(last) = spectrum.last_mut() {
                last.im = T::zero();
            }
            inverse.process_with_scratch(spectrum, output, scratch)?;
        }
        Plan::Complex { inverse, .. } => {
            inverse.process_with_scratch(spectrum, scratch);
            copy_complex_to_real(spectrum, output);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_autocorrelation(signal: &[f64], lags: usize) -> Vec<f64> {
        (0..lags)
            .map(|t| {
                signal
                    .iter()
                    .zip(signal.iter().skip(t))
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    fn round(values: &mut [f64]) {
        // Using an FFT loses precision; we don't care that much, so round generously.
        values.iter_mut().for_each(|x| *x = (*x * 100.).round() / 100.);
    }

    #[test]
    fn empty_transform_is_rejected() {
        assert!(matches!(Transform::<f64>::new(0), Err(Error::EmptyBuffer)));
    }

    #[test]
    fn kind_follows_power_of_two() {
        let real = Transform::<f32>::new(16).unwrap();
        assert_eq!(real.kind(), FftKind::RealToComplex);
        assert_eq!(real.spectrum_len(), 9);

        let complex = Transform::<f32>::new(12).unwrap();
        assert_eq!(complex.kind(), FftKind::ComplexToComplex);
        assert_eq!(complex.spectrum_len(), 12);
        assert_eq!(complex.len(), 12);
    }

    #[test]
    fn autocorrelation_matches_direct_sum() {
        let signal: Vec<f64> = vec![0., 1., 2., 0., -1., -2.];
        let expected = naive_autocorrelation(&signal, signal.len());

        // 16 takes the real path, 12 the complex one.
        for len in [16, 12] {
            let mut transform = Transform::new(len).unwrap();
            let mut computed = vec![0.; signal.len()];
            transform.autocorrelation(&signal, &mut computed).unwrap();
            round(&mut computed);
            assert_eq!(expected, computed, "transform length {}", len);
        }
    }

    #[test]
    fn repeated_calls_do_not_accumulate() {
        let mut transform = Transform::new(8).unwrap();
        let mut first = vec![0.; 4];
        let mut second = vec![0.; 4];
        transform.autocorrelation(&[1., 2., 3., 4.], &mut first).unwrap();
        transform.autocorrelation(&[1., 2., 3., 4.], &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cross_correlation_matches_direct_sum() {
        let signal: Vec<f64> = vec![0., 1., 2., 0., -1., -2.];
        let window = &signal[..3];
        let expected: Vec<f64> = (0..3)
            .map(|t| {
                window
                    .iter()
                    .zip(signal[t..].iter())
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect();

        for len in [12, 16] {
            let mut transform = Transform::new(len).unwrap();
            let mut computed = vec![0.; 3];
            transform
                .cross_correlation(&signal, window, &mut computed)
                .unwrap();
            round(&mut computed);
            assert_eq!(expected, computed, "transform length {}", len);
        }
    }
}
