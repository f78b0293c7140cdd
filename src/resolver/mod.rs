//! Probabilistic resolution of a candidate list into a single pitch.
//!
//! The probabilistic detectors do not commit to one periodicity peak. They
//! hand every plausible candidate, together with a probability, to a
//! [PitchModel]. The model quantizes candidates into [PitchBins] and treats the
//! candidate list of *one* frame as a sequence of observations of a discrete
//! state (one state per bin plus an unvoiced state). A belief over the states
//! starts out uniform and, for each observation in turn, is propagated through
//! a continuity prior and weighted by the observation's likelihood. The most
//! probable state after the last observation wins.
use std::sync::{Arc, OnceLock};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::float::Float;

pub mod bins;

pub use bins::PitchBins;

/// A pitch hypothesis: a refined frequency and the probability mass the
/// detector assigns to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<T: Float> {
    pub frequency: T,
    pub probability: T,
}

/// Parameters of a [PitchModel].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    /// Centre frequency of the lowest bin, in Hz.
    pub lowest_frequency: f64,
    pub n_bins: usize,
    pub bins_per_octave: usize,
    /// Largest jump, in bins, the continuity prior allows between two observations.
    pub max_jump: usize,
    /// Ratio between the transition weights of jumps of `d` and `d + 1` bins.
    pub jump_decay: f64,
    /// Probability of switching between voiced and unvoiced.
    pub voicing_switch: f64,
    /// How much of a candidate's probability is taken at face value.
    pub trust: f64,
    /// Share of an observation's evidence given to each neighbouring bin.
    pub neighbour_spread: f64,
    /// Extra weight of the unvoiced state in every observation.
    pub unvoiced_bias: f64,
}

impl Default for ModelParams {
    /// Semitone bins from A0 (27.5 Hz) over nine octaves.
    fn default() -> Self {
        ModelParams {
            lowest_frequency: 27.5,
            n_bins: 108,
            bins_per_octave: 12,
            max_jump: 12,
            jump_decay: 0.25,
            voicing_switch: 0.01,
            trust: 0.5,
            neighbour_spread: 0.25,
            unvoiced_bias: 1.25,
        }
    }
}

impl ModelParams {
    fn validate(&self) -> Result<()> {
        if !(self.lowest_frequency > 0.0) || !self.lowest_frequency.is_finite() {
            return Err(Error::InvalidModel("lowest frequency must be positive"));
        }
        if self.n_bins == 0 || self.bins_per_octave == 0 {
            return Err(Error::InvalidModel("at least one pitch bin is required"));
        }
        if !(self.jump_decay > 0.0 && self.jump_decay <= 1.0) {
            return Err(Error::InvalidModel("jump decay must lie in (0, 1]"));
        }
        if !(self.voicing_switch > 0.0 && self.voicing_switch < 1.0) {
            return Err(Error::InvalidModel("voicing switch must lie in (0, 1)"));
        }
        if !(self.trust > 0.0 && self.trust <= 1.0) {
            return Err(Error::InvalidModel("trust must lie in (0, 1]"));
        }
        if !(self.neighbour_spread >= 0.0 && self.neighbour_spread < 0.5) {
            return Err(Error::InvalidModel("neighbour spread must lie in [0, 0.5)"));
        }
        if !(self.unvoiced_bias > 0.0) || !self.unvoiced_bias.is_finite() {
            return Err(Error::InvalidModel("unvoiced bias must be positive"));
        }
        Ok(())
    }
}

/// The discrete pitch model: bins, an unvoiced state, and a row-stochastic
/// transition matrix between them. Immutable once built, so one instance can
/// be shared by every detector and thread.
#[derive(Debug, Clone)]
pub struct PitchModel {
    params: ModelParams,
    bins: PitchBins,
    // Row-major, `states() x states()`; the last state is unvoiced.
    transitions: Vec<f64>,
}

static SHARED: OnceLock<Arc<PitchModel>> = OnceLock::new();

impl PitchModel {
    pub fn new(params: ModelParams) -> Result<Self> {
        params.validate()?;
        Ok(Self::build(params))
    }

    /// The default model, built on first use and shared afterwards.
    pub fn shared() -> Arc<PitchModel> {
        SHARED
            .get_or_init(|| Arc::new(Self::build(ModelParams::default())))
            .clone()
    }

    fn build(params: ModelParams) -> Self {
        let bins = PitchBins::new(
            params.lowest_frequency,
            params.n_bins,
            params.bins_per_octave,
        );
        let transitions = transition_matrix(&params);
        debug!(
            "built pitch model with {} bins from {} Hz",
            params.n_bins, params.lowest_frequency
        );
        PitchModel {
            params,
            bins,
            transitions,
        }
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn bins(&self) -> &PitchBins {
        &self.bins
    }

    /// Number of states: one per bin plus the unvoiced state.
    pub fn states(&self) -> usize {
        self.bins.len() + 1
    }

    pub fn unvoiced_state(&self) -> usize {
        self.bins.len()
    }

    pub fn transition(&self, from: usize, to: usize) -> f64 {
        self.transitions[from * self.states() + to]
    }

    /// Resolve `candidates`, taken in order, into one frequency. Candidates
    /// outside the bin range are counted in the nearest edge bin. Returns `None`
    /// when no candidate is usable or when the unvoiced state wins.
    pub fn resolve<T: Float>(&self, candidates: &[Candidate<T>]) -> Option<T> {
        let states = self.states();
        let mut belief = vec![1.0 / states as f64; states];
        let mut next = vec![0.0; states];
        let mut observed: Vec<(usize, f64, T)> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let probability = candidate.probability.to_f64().unwrap_or(0.0).min(1.0);
            let bin = candidate
                .frequency
                .to_f64()
                .and_then(|frequency| self.bins.nearest(frequency));
            let bin = match bin {
                Some(bin) if probability > 0.0 => bin,
                _ => {
                    trace!("rejected candidate {:?}", candidate);
                    continue;
                }
            };

            self.predict(&belief, &mut next);
            self.weigh(&mut next, bin, probability);

            let total: f64 = next.iter().sum();
            if !(total > 0.0) || !total.is_finite() {
                return None;
            }
            belief
                .iter_mut()
                .zip(next.iter())
                .for_each(|(b, n)| *b = n / total);
            observed.push((bin, probability, candidate.frequency));
        }

        if observed.is_empty() {
            debug!("no usable candidate");
            return None;
        }

        let (winner, posterior) = belief
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (state, &p)| {
                if p > best.1 {
                    (state, p)
                } else {
                    best
                }
            });
        if winner == self.unvoiced_state() {
            debug!("unvoiced state dominates with posterior {:.3}", posterior);
            return None;
        }
        trace!("bin {} wins with posterior {:.3}", winner, posterior);

        let strongest = |max_distance: usize| {
            observed
                .iter()
                .filter(|(bin, _, _)| bin.abs_diff(winner) <= max_distance)
                .fold(None, |best: Option<&(usize, f64, T)>, obs| match best {
                    Some(b) if b.1 >= obs.1 => Some(b),
                    _ => Some(obs),
                })
                .map(|&(_, _, frequency)| frequency)
        };
        strongest(0)
            .or_else(|| strongest(1))
            .or_else(|| T::from_f64(self.bins.centre(winner)))
    }

    /// `next = belief * transitions`
    fn predict(&self, belief: &[f64], next: &mut [f64]) {
        let states = self.states();
        next.iter_mut().for_each(|n| *n = 0.0);
        for (from, &b) in belief.iter().enumerate() {
            if b == 0.0 {
                continue;
            }
            let row = &self.transitions[from * states..(from + 1) * states];
            next.iter_mut()
                .zip(row.iter())
                .for_each(|(n, &t)| *n += b * t);
        }
    }

    /// Multiply `belief` by the likelihood of observing `bin` with `probability`.
    /// Whatever part of the observation is not trusted is spread evenly over the
    /// bins, with the unvoiced state weighted by `unvoiced_bias`.
    fn weigh(&self, belief: &mut [f64], bin: usize, probability: f64) {
        let n_bins = self.bins.len();
        let evidence = self.params.trust * probability;
        let background = (1.0 - evidence) / n_bins as f64;
        let spread = self.params.neighbour_spread;

        belief[..n_bins]
            .iter_mut()
            .enumerate()
            .for_each(|(state, b)| {
                let share = match state.abs_diff(bin) {
                    0 => 1.0 - 2.0 * spread,
                    1 => spread,
                    _ => 0.0,
                };
                *b *= evidence * share + background;
            });
        belief[n_bins] *= self.params.unvoiced_bias * background;
    }
}

/// Voiced states move to bins within `max_jump` with geometrically decaying
/// weight, or fall silent with probability `voicing_switch`. The unvoiced state
/// stays unvoiced or enters any bin with equal probability.
fn transition_matrix(params: &ModelParams) -> Vec<f64> {
    let n_bins = params.n_bins;
    let states = n_bins + 1;
    let unvoiced = n_bins;
    let stay_voiced = 1.0 - params.voicing_switch;
    let mut transitions = vec![0.0; states * states];

    for from in 0..n_bins {
        let low = from.saturating_sub(params.max_jump);
        let high = (from + params.max_jump).min(n_bins - 1);
        let weight = |to: usize| params.jump_decay.powi(from.abs_diff(to) as i32);
        let total: f64 = (low..=high).map(weight).sum();

        let row = &mut transitions[from * states..(from + 1) * states];
        for to in low..=high {
            row[to] = stay_voiced * weight(to) / total;
        }
        row[unvoiced] = params.voicing_switch;
    }

    let row = &mut transitions[unvoiced * states..];
    row[..n_bins]
        .iter_mut()
        .for_each(|t| *t = params.voicing_switch / n_bins as f64);
    row[unvoiced] = stay_voiced;

    transitions
}
