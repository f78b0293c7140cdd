use crate::float::Float;

/// A refined extremum of a similarity function: a fractional lag and the
/// interpolated value of the function there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak<T: Float> {
    pub lag: T,
    pub strength: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Maximum,
    Minimum,
}

impl Extremum {
    fn better<T: Float>(self, a: T, b: T) -> bool {
        match self {
            Extremum::Maximum => a > b,
            Extremum::Minimum => a < b,
        }
    }
}

/// Positive lobes of `arr` as `start..stop` ranges, skipping the lobe that
/// starts at index 0. The last lobe may run to the end of `arr`.
fn positive_lobes<T: Float>(arr: &[T]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut pos = arr
        .iter()
        .position(|&v| v <= T::zero())
        .unwrap_or(arr.len());

    std::iter::from_fn(move || {
        let start = pos + arr[pos..].iter().position(|&v| v > T::zero())?;
        let stop = arr[start..]
            .iter()
            .position(|&v| v <= T::zero())
            .map_or(arr.len(), |len| start + len);
        pos = stop;
        Some((start, stop))
    })
}

/// McLeod peak picking: the highest point of every positive region of `arr`
/// that lies between a positive-going and a negative-going zero crossing.
pub fn detect_peaks<T: Float>(arr: &[T]) -> impl Iterator<Item = (usize, T)> + '_ {
    positive_lobes(arr).map(move |(start, stop)| {
        let mut peak_idx = start;
        let mut peak_val = -T::infinity();
        for (i, &val) in arr.iter().enumerate().take(stop).skip(start) {
            if val > peak_val {
                peak_val = val;
                peak_idx = i;
            }
        }
        (peak_idx, peak_val)
    })
}

/// Walk from `idx` to the nearest local extremum of `data`. Returns `None`
/// if the walk reaches either end of `data`, where a neighbour is missing.
pub fn find_extremum<T: Float>(data: &[T], mut idx: usize, kind: Extremum) -> Option<usize> {
    loop {
        if idx == 0 || idx + 1 >= data.len() {
            return None;
        }
        let (left, center, right) = (data[idx - 1], data[idx], data[idx + 1]);
        if kind.better(right, center) && !kind.better(left, right) {
            idx += 1;
        } else if kind.better(left, center) {
            idx -= 1;
        } else {
            return Some(idx);
        }
    }
}

/// Fit a parabola through `data[idx - 1..=idx + 1]` and return its vertex.
///
/// The refined strength is kept within the range spanned by the three samples,
/// and the lag within one sample of `idx`. Returns `None` when `idx` has no
/// neighbour on one side.
pub fn parabolic_interpolation<T: Float>(data: &[T], idx: usize) -> Option<Peak<T>> {
    if idx == 0 || idx + 1 >= data.len() {
        return None;
    }

    let two = T::from_f64(2.0).unwrap();
    let eight = T::from_f64(8.0).unwrap();
    let (left, center, right) = (data[idx - 1], data[idx], data[idx + 1]);
    let x = T::from_usize(idx).unwrap();

    let den = left + right - two * center;
    if den == T::zero() {
        return Some(Peak {
            lag: x,
            strength: center,
        });
    }

    let delta = left - right;
    let shift = (delta / (two * den)).max(-T::one()).min(T::one());
    let lowest = left.min(center).min(right);
    let highest = left.max(center).max(right);
    let strength = (center - delta * delta / (eight * den))
        .max(lowest)
        .min(highest);

    Some(Peak {
        lag: x + shift,
        strength,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parabola(x: f64) -> f64 {
        4.0 - (x - 0.2) * (x - 0.2)
    }

    #[test]
    fn peak_correction() {
        let data = [parabola(-1.0), parabola(0.0), parabola(1.0), 0.0];
        let peak = parabolic_interpolation(&data, 1).unwrap();
        assert!((peak.lag - 1.2).abs() < 1e-12);
        // The vertex (4.0) is above every sample, so the strength stays at the centre sample.
        assert_eq!(peak.strength, parabola(0.0));
    }

    #[test]
    fn centred_peak_is_unchanged() {
        let data = [1.0, 3.0, 4.0, 3.0, 1.0];
        let peak = parabolic_interpolation(&data, 2).unwrap();
        assert_eq!(peak.lag, 2.0);
        assert_eq!(peak.strength, 4.0);

        let again = parabolic_interpolation(&data, peak.lag as usize).unwrap();
        assert_eq!(peak, again);
    }

    #[test]
    fn minimum_refinement() {
        let data = [5.0, 1.0, 2.0];
        let peak = parabolic_interpolation(&data, 1).unwrap();
        assert!(peak.lag > 1.0 && peak.lag < 1.5);
        assert!(peak.strength >= 1.0 && peak.strength <= 5.0);
    }

    #[test]
    fn interpolation_needs_neighbours() {
        let data = [1.0, 2.0, 1.0];
        assert!(parabolic_interpolation(&data, 0).is_none());
        assert!(parabolic_interpolation(&data, 2).is_none());
        assert!(parabolic_interpolation::<f64>(&[], 0).is_none());
    }

    #[test]
    fn flat_interpolation() {
        let data = [2.0f32, 2.0, 2.0];
        let peak = parabolic_interpolation(&data, 1).unwrap();
        assert_eq!(peak.lag, 1.0);
        assert_eq!(peak.strength, 2.0);
    }

    #[test]
    fn extremum_search() {
        let data = [0.0, 1.0, 3.0, 2.0, 1.0, 0.5, 0.7, 0.0];
        assert_eq!(find_extremum(&data, 1, Extremum::Maximum), Some(2));
        assert_eq!(find_extremum(&data, 4, Extremum::Maximum), Some(2));
        assert_eq!(find_extremum(&data, 3, Extremum::Minimum), Some(5));
        // Descending towards index 0 runs out of neighbours.
        assert_eq!(find_extremum(&data, 1, Extremum::Minimum), None);
        assert_eq!(find_extremum(&data, 7, Extremum::Maximum), None);
    }

    #[test]
    fn peaks_between_crossings() {
        let data = [1.0, 0.5, -0.5, 0.2, 0.9, 0.4, -0.1, -0.3, 0.3, 0.8, 0.6];
        let peaks: Vec<_> = detect_peaks(&data).collect();
        assert_eq!(peaks, vec![(4, 0.9), (9, 0.8)]);
    }

    #[test]
    fn no_peaks_without_crossings() {
        let data = [1.0, 0.8, 0.6, 0.4];
        assert_eq!(detect_peaks(&data).count(), 0);
        assert_eq!(detect_peaks::<f64>(&[]).count(), 0);
    }
}
