/// A logarithmic partition of the detectable frequency range.
///
/// Bin `i` is centred on `lowest * 2^(i / bins_per_octave)` and covers the
/// half-open range reaching half a bin to either side, so neighbouring bins
/// share a boundary and never overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchBins {
    lowest: f64,
    bins_per_octave: f64,
    centres: Vec<f64>,
}

impl PitchBins {
    pub fn new(lowest: f64, n_bins: usize, bins_per_octave: usize) -> Self {
        let bins_per_octave = bins_per_octave as f64;
        let centres = (0..n_bins)
            .map(|i| lowest * (i as f64 / bins_per_octave).exp2())
            .collect();
        PitchBins {
            lowest,
            bins_per_octave,
            centres,
        }
    }

    pub fn len(&self) -> usize {
        self.centres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    pub fn centre(&self, bin: usize) -> f64 {
        self.centres[bin]
    }

    /// The `[low, high)` frequency range of `bin`.
    pub fn bounds(&self, bin: usize) -> (f64, f64) {
        let edge = |position: f64| self.lowest * (position / self.bins_per_octave).exp2();
        (edge(bin as f64 - 0.5), edge(bin as f64 + 0.5))
    }

    pub fn bin_of(&self, frequency: f64) -> Option<usize> {
        if !(frequency > 0.0) || !frequency.is_finite() {
            return None;
        }
        let position = self.bins_per_octave * (frequency / self.lowest).log2();
        let bin = (position + 0.5).floor();
        if bin >= 0.0 && bin < self.centres.len() as f64 {
            Some(bin as usize)
        } else {
            None
        }
    }

    /// Like [bin_of][PitchBins::bin_of], but frequencies beyond either end of
    /// the range fall into the edge bin.
    pub fn nearest(&self, frequency: f64) -> Option<usize> {
        if !(frequency > 0.0) || !frequency.is_finite() || self.is_empty() {
            return None;
        }
        let position = self.bins_per_octave * (frequency / self.lowest).log2();
        let last = (self.centres.len() - 1) as f64;
        Some((position + 0.5).floor().max(0.0).min(last) as usize)
    }
}
