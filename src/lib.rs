//! # Pitch Estimation
//! *pitch_estimation* implements several algorithms for estimating the
//! fundamental frequency of a monophonic sound stored in a buffer.
//!
//! # Detectors
//! A *detector* is an implementation of a pitch detection algorithm. It owns the
//! transform plans and buffers for one signal length, so repeated calls on
//! same-sized buffers allocate nothing.
//!
//!   * [MpmDetector][detector::mpm::MpmDetector]
//!   * [YinDetector][detector::yin::YinDetector]
//!   * [AutocorrelationDetector][detector::autocorrelation::AutocorrelationDetector]
//!
//! Each detector has a deterministic [pitch][detector::PitchDetector::pitch] and a
//! [probabilistic_pitch][detector::PitchDetector::probabilistic_pitch] (pMPM, pYIN)
//! that resolves all plausible candidates with a [PitchModel][resolver::PitchModel].
//!
//! For occasional calls on buffers of varying size, the free functions [yin], [mpm],
//! [pyin], [pmpm] and [acf] allocate a detector on the fly.
//!
//! A detector is not meant to be shared between threads; use one per thread.
//! The pitch model is immutable and shared.
//!
//! # Examples
//! ```
//! use pitch_estimation::detector::mpm::MpmDetector;
//! use pitch_estimation::detector::PitchDetector;
//!
//! fn main() -> Result<(), pitch_estimation::Error> {
//!     const SAMPLE_RATE: usize = 44100;
//!     const SIZE: usize = 1024;
//!
//!     // Signal coming from some source (microphone, generated, etc...)
//!     let dt = 1.0 / SAMPLE_RATE as f64;
//!     let freq = 300.0;
//!     let signal: Vec<f64> = (0..SIZE)
//!         .map(|x| (2.0 * std::f64::consts::PI * x as f64 * dt * freq).sin())
//!         .collect();
//!
//!     let mut detector = MpmDetector::new(SIZE)?;
//!
//!     match detector.pitch(&signal, SAMPLE_RATE) {
//!         Some(frequency) => println!("Frequency: {}", frequency),
//!         None => println!("No pitch"),
//!     }
//!
//!     let robust = pitch_estimation::pyin(&signal, SAMPLE_RATE)?;
//!     assert!(robust.is_some());
//!     Ok(())
//! }
//! ```

use detector::autocorrelation::AutocorrelationDetector;
use detector::mpm::MpmDetector;
use detector::yin::YinDetector;
use detector::PitchDetector;
use float::Float;

pub use error::{Error, Result};

pub mod detector;
pub mod error;
pub mod float;
pub mod resolver;
pub mod utils;

/// Estimate the pitch of `signal` with YIN. `Ok(None)` means no pitch was found.
pub fn yin<T: Float>(signal: &[T], sample_rate: usize) -> Result<Option<T>> {
    Ok(YinDetector::new(signal.len())?.pitch(signal, sample_rate))
}

/// Estimate the pitch of `signal` with the McLeod pitch method.
pub fn mpm<T: Float>(signal: &[T], sample_rate: usize) -> Result<Option<T>> {
    Ok(MpmDetector::new(signal.len())?.pitch(signal, sample_rate))
}

/// Estimate the pitch of `signal` with probabilistic YIN.
pub fn pyin<T: Float>(signal: &[T], sample_rate: usize) -> Result<Option<T>> {
    Ok(YinDetector::new(signal.len())?.probabilistic_pitch(signal, sample_rate))
}

/// Estimate the pitch of `signal` with probabilistic MPM.
pub fn pmpm<T: Float>(signal: &[T], sample_rate: usize) -> Result<Option<T>> {
    Ok(MpmDetector::new(signal.len())?.probabilistic_pitch(signal, sample_rate))
}

/// Estimate the pitch of `signal` from the spacing of its autocorrelation peaks.
pub fn acf<T: Float>(signal: &[T], sample_rate: usize) -> Result<Option<T>> {
    Ok(AutocorrelationDetector::new(signal.len())?.pitch(signal, sample_rate))
}
