/// Errors raised while allocating detectors or building a pitch model.
///
/// Estimation itself never fails: a frame without a detectable pitch is
/// reported as `None`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Buffers cannot be allocated for an empty signal
    #[error("cannot allocate buffers for an empty signal")]
    EmptyBuffer,

    /// The detector's derived working buffer would be empty
    #[error("a buffer of {size} samples leaves no room for the {detector} working buffer")]
    WorkingBufferTooSmall { size: usize, detector: &'static str },

    /// Pitch model parameters were rejected
    #[error("invalid pitch model: {0}")]
    InvalidModel(&'static str),

    /// The FFT backend refused its arguments
    #[error("transform failed: {0}")]
    Transform(#[from] realfft::FftError),
}

pub type Result<T> = std::result::Result<T, Error>;
