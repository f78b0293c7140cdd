use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

use crate::float::Float;

pub fn new_real_buffer<T: Float>(size: usize) -> Vec<T> {
    vec![T::zero(); size]
}

pub fn new_complex_buffer<T: Float>(size: usize) -> Vec<Complex<T>> {
    vec![Complex::zero(); size]
}

/// Copy `input` into the first `input.len()` elements of `output` and zero the rest.
pub fn copy_real_padded<T: Float>(input: &[T], output: &mut [T]) {
    assert!(input.len() <= output.len());
    output[..input.len()].copy_from_slice(input);
    output[input.len()..].iter_mut().for_each(|o| *o = T::zero());
}

/// Copy `input` into the real part of `output`, zero padding past `input.len()`.
pub fn copy_real_to_complex<T: Float>(input: &[T], output: &mut [Complex<T>]) {
    assert!(input.len() <= output.len());
    input.iter().zip(output.iter_mut()).for_each(|(i, o)| {
        o.re = *i;
        o.im = T::zero();
    });
    output[input.len()..]
        .iter_mut()
        .for_each(|o| *o = Complex::zero())
}

/// Copy the real part of `input` into `output`, zero padding past `input.len()`.
pub fn copy_complex_to_real<T: Float>(input: &[Complex<T>], output: &mut [T]) {
    let n = input.len().min(output.len());
    input[..n]
        .iter()
        .zip(output.iter_mut())
        .for_each(|(i, o)| *o = i.re);
    output[n..].iter_mut().for_each(|o| *o = T::zero());
}

/// Computes |x|^2 for each complex value x in `arr`. This function
/// modifies `arr` in place and leaves the complex component zero.
pub fn modulus_squared<T: Float>(arr: &mut [Complex<T>]) {
    for s in arr {
        s.re = s.re * s.re + s.im * s.im;
        s.im = T::zero();
    }
}

/// Compute the sum of the square of each element of `arr`.
pub fn square_sum<T: Float>(arr: &[T]) -> T {
    arr.iter().map(|&s| s * s).sum::<T>()
}
