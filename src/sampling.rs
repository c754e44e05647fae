//! Random variates and the exact/approximate resampling strategy.
//!
//! Cohorts below the exact-mode threshold are resampled one individual at a
//! time. Larger cohorts go through Gaussian approximations of the binomial and
//! multinomial distributions, which cost the same whatever the head count.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::Serialize;
use tracing::{trace, warn};

use crate::counter::BigCount;

/// Counts up to this many bits go through `f64` arithmetic; wider counts are
/// scaled exactly as big integers.
const NATIVE_BITS: u64 = 960;

/// A draw together with whether it had to be clamped into its support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sampled<T> {
    pub value: T,
    pub clamped: bool,
}

impl<T> Sampled<T> {
    fn unclamped(value: T) -> Self {
        Self {
            value,
            clamped: false,
        }
    }
}

/// Source of every random quantity the engines consume.
pub trait Sampler {
    /// Uniform variate in `[0, 1)`.
    fn uniform01(&mut self) -> f64;

    /// Uniform integer in `[low, high]`.
    fn uniform_int(&mut self, low: u32, high: u32) -> u32;

    fn standard_normal(&mut self) -> f64;

    /// Gaussian approximation of `Binomial(n, p)`, within `[0, n]`.
    fn binomial_approx(&mut self, n: &BigCount, p: f64) -> Sampled<BigCount> {
        binomial_gaussian(self, n, p)
    }

    /// Gaussian approximation of a multinomial draw of `n` over the categories
    /// of `cdf`. The counts sum to exactly `n`.
    fn multinomial_approx(&mut self, n: &BigCount, cdf: &[f64]) -> Sampled<Vec<BigCount>> {
        multinomial_gaussian(self, n, cdf)
    }
}

impl<R: Rng + ?Sized> Sampler for R {
    fn uniform01(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn uniform_int(&mut self, low: u32, high: u32) -> u32 {
        self.gen_range(low..=high)
    }

    fn standard_normal(&mut self) -> f64 {
        self.sample::<f64, _>(StandardNormal)
    }
}

pub fn binomial_gaussian<S: Sampler + ?Sized>(
    sampler: &mut S,
    n: &BigCount,
    p: f64,
) -> Sampled<BigCount> {
    if n.is_zero() || p.is_nan() || p <= 0.0 {
        return Sampled::unclamped(BigCount::zero());
    }
    if p >= 1.0 {
        return Sampled::unclamped(n.clone());
    }

    let z = sampler.standard_normal();
    if n.bits() <= NATIVE_BITS {
        let total = n.to_f64();
        let mean = total * p;
        let sd = (total * p * (1.0 - p)).sqrt();
        let x = mean + sd * z;
        let (x, clamped) = if x < 0.0 {
            (0.0, true)
        } else if x > total {
            (total, true)
        } else {
            (x, false)
        };
        let value = BigCount::from_f64_floor(x + 0.5);
        // f64 rounding of very wide totals can land one ulp above n.
        let value = if value > *n { n.clone() } else { value };
        return Sampled { value, clamped };
    }

    let mean = n.scale(p);
    let sd = n.scale(p * (1.0 - p)).isqrt();
    let noise = sd.scale(z.abs());
    if z >= 0.0 {
        let value = &mean + &noise;
        if value > *n {
            Sampled {
                value: n.clone(),
                clamped: true,
            }
        } else {
            Sampled::unclamped(value)
        }
    } else {
        match mean.checked_sub(&noise) {
            Some(value) => Sampled::unclamped(value),
            None => Sampled {
                value: BigCount::zero(),
                clamped: true,
            },
        }
    }
}

pub fn multinomial_gaussian<S: Sampler + ?Sized>(
    sampler: &mut S,
    n: &BigCount,
    cdf: &[f64],
) -> Sampled<Vec<BigCount>> {
    let mut counts = vec![BigCount::zero(); cdf.len()];
    if n.is_zero() || cdf.is_empty() {
        return Sampled::unclamped(counts);
    }

    let probabilities = category_probabilities(cdf);
    let mut clamped = false;
    for (count, &p) in counts.iter_mut().zip(&probabilities) {
        let draw = binomial_gaussian(sampler, n, p);
        clamped |= draw.clamped;
        *count = draw.value;
    }

    let total: BigCount = counts.iter().sum();
    if total.is_zero() {
        let likeliest = index_of_max_by(&probabilities, |a, b| a.total_cmp(b));
        counts[likeliest] = n.clone();
        return Sampled {
            value: counts,
            clamped,
        };
    }
    if total != *n {
        for count in counts.iter_mut() {
            *count = count.mul_div_round(n, &total);
        }
    }
    rebalance(&mut counts, n);
    Sampled {
        value: counts,
        clamped,
    }
}

/// Index of the first category `i >= 1` whose cumulative probability exceeds a
/// uniform draw, or 0 when none does.
pub fn categorical<S: Sampler + ?Sized>(sampler: &mut S, cdf: &[f64]) -> usize {
    let u = sampler.uniform01();
    (1..cdf.len()).find(|&i| u < cdf[i]).unwrap_or(0)
}

/// Adjusts `counts` so they sum to `n`, adding a deficit to the largest
/// category or removing an excess from the largest categories first. Returns
/// whether anything changed.
pub fn rebalance(counts: &mut [BigCount], n: &BigCount) -> bool {
    if counts.is_empty() {
        return false;
    }
    let total: BigCount = counts.iter().sum();
    if total == *n {
        return false;
    }
    if let Some(deficit) = n.checked_sub(&total) {
        let largest = index_of_max_by(counts, |a, b| a.cmp(b));
        counts[largest] += deficit;
        return true;
    }
    let mut excess = total.saturating_sub(n);
    while !excess.is_zero() {
        let largest = index_of_max_by(counts, |a, b| a.cmp(b));
        let take = if counts[largest] >= excess {
            excess.clone()
        } else {
            counts[largest].clone()
        };
        counts[largest] = counts[largest].saturating_sub(&take);
        excess = excess.saturating_sub(&take);
    }
    true
}

fn category_probabilities(cdf: &[f64]) -> Vec<f64> {
    cdf.iter()
        .enumerate()
        .map(|(i, &value)| {
            if i == 0 {
                value
            } else {
                (value - cdf[i - 1]).max(0.0)
            }
        })
        .collect()
}

/// First index holding the maximum.
fn index_of_max_by<T>(items: &[T], mut cmp: impl FnMut(&T, &T) -> std::cmp::Ordering) -> usize {
    let mut best = 0;
    for i in 1..items.len() {
        if cmp(&items[i], &items[best]) == std::cmp::Ordering::Greater {
            best = i;
        }
    }
    best
}

/// How a count is resampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One draw per individual; carries the native head count.
    Exact(u64),
    /// Aggregate Gaussian draws.
    Approximate,
}

impl Strategy {
    pub fn select(count: &BigCount, threshold: u64) -> Self {
        if count.is_below(threshold) {
            count
                .to_u64()
                .map(Strategy::Exact)
                .unwrap_or(Strategy::Approximate)
        } else {
            Strategy::Approximate
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Anomalies {
    /// Gaussian draws that fell outside their support.
    pub gaussian_clamps: u64,
    /// Sampled counts larger than the population they were drawn from.
    pub bound_violations: u64,
    /// Multinomial draws whose counts did not add up to their input.
    pub reconciled_splits: u64,
}

impl Anomalies {
    pub fn total(&self) -> u64 {
        self.gaussian_clamps + self.bound_violations + self.reconciled_splits
    }
}

/// Resampling operations over one sampler, switching between exact and
/// approximate mode per count and keeping the anomaly tally.
pub struct Draws<'a, S: ?Sized> {
    sampler: &'a mut S,
    threshold: u64,
    anomalies: &'a mut Anomalies,
}

impl<'a, S: Sampler + ?Sized> Draws<'a, S> {
    pub fn new(sampler: &'a mut S, threshold: u64, anomalies: &'a mut Anomalies) -> Self {
        Self {
            sampler,
            threshold,
            anomalies,
        }
    }

    pub fn strategy(&self, count: &BigCount) -> Strategy {
        Strategy::select(count, self.threshold)
    }

    pub fn sampler(&mut self) -> &mut S {
        &mut *self.sampler
    }

    /// Keeps each member of `count` independently with probability `p`.
    pub fn thin(&mut self, count: &BigCount, p: f64) -> BigCount {
        let strategy = self.strategy(count);
        self.thin_with(strategy, count, p)
    }

    pub fn thin_with(&mut self, strategy: Strategy, count: &BigCount, p: f64) -> BigCount {
        match strategy {
            Strategy::Exact(n) => {
                let mut kept = 0u64;
                for _ in 0..n {
                    if self.sampler.uniform01() < p {
                        kept += 1;
                    }
                }
                BigCount::from_u64(kept)
            }
            Strategy::Approximate => {
                let drawn = self.sampler.binomial_approx(count, p);
                self.note_clamp(drawn.clamped, "binomial");
                self.bounded(drawn.value, count)
            }
        }
    }

    /// Scatters `count` over the categories of `cdf`; the result has one entry
    /// per category and sums to `count`.
    pub fn split(&mut self, count: &BigCount, cdf: &[f64]) -> Vec<BigCount> {
        let strategy = self.strategy(count);
        self.split_with(strategy, count, cdf)
    }

    pub fn split_with(&mut self, strategy: Strategy, count: &BigCount, cdf: &[f64]) -> Vec<BigCount> {
        if cdf.is_empty() {
            return Vec::new();
        }
        match strategy {
            Strategy::Exact(n) => {
                let mut tallies = vec![0u64; cdf.len()];
                for _ in 0..n {
                    tallies[categorical(self.sampler, cdf)] += 1;
                }
                tallies.into_iter().map(BigCount::from_u64).collect()
            }
            Strategy::Approximate => {
                let drawn = self.sampler.multinomial_approx(count, cdf);
                self.note_clamp(drawn.clamped, "multinomial");
                let mut counts = drawn.value;
                counts.resize(cdf.len(), BigCount::zero());
                if rebalance(&mut counts, count) {
                    self.anomalies.reconciled_splits += 1;
                    warn!(%count, "multinomial draw did not sum to its input, reconciled");
                }
                counts
            }
        }
    }

    /// Clamps `drawn` to `limit`, recording the violation.
    pub fn bounded(&mut self, drawn: BigCount, limit: &BigCount) -> BigCount {
        if drawn > *limit {
            self.anomalies.bound_violations += 1;
            warn!(%drawn, %limit, "sampled count exceeds its population, clamping");
            limit.clone()
        } else {
            drawn
        }
    }

    fn note_clamp(&mut self, clamped: bool, draw: &'static str) {
        if clamped {
            self.anomalies.gaussian_clamps += 1;
            trace!(draw, "gaussian draw clamped to its support");
        }
    }
}
