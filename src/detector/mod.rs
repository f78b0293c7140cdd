use crate::float::Float;

pub mod autocorrelation;
pub mod internals;
pub mod mpm;
pub mod yin;

/// A pitch detector owns every buffer it needs for one signal length.
///
/// Both methods return `None` when no pitch can be determined (silence, noise,
/// or a period too long for the buffer); `None` never means 0 Hz.
///
/// Periods are searched up to half the buffer length, which bounds the lowest
/// detectable frequency at `2 * sample_rate / size`. Peaks are refined from
/// three samples, so a period must span at least about seven samples: above
/// roughly `sample_rate / 7` an estimate may fall an octave or more low.
pub trait PitchDetector<T>
where
    T: Float,
{
    /// Estimate the pitch of `signal` by committing to the single best periodicity peak.
    fn pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T>;

    /// Estimate the pitch of `signal` by resolving every plausible candidate
    /// with the detector's pitch model.
    fn probabilistic_pitch(&mut self, signal: &[T], sample_rate: usize) -> Option<T>;
}
