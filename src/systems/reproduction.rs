use anyhow::Result;

use crate::{
    counter::BigCount,
    engine::{System, SystemContext},
    grid::{CohortGrid, AGE_MAX, LITTER_CATEGORIES, MONTHS_PER_YEAR},
    params::ParameterSet,
    rng::SystemRng,
    sampling::{Anomalies, Draws, Sampler, Strategy},
    world::World,
};

pub struct ReproductionSystem;

impl ReproductionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReproductionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ReproductionSystem {
    fn name(&self) -> &str {
        "reproduction"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let newborns = reproduce(
            &mut world.grid,
            ctx.params,
            rng,
            &mut world.bookkeeping.anomalies,
        );
        world.queue_newborns(newborns);
        Ok(())
    }
}

/// Delivers this month's litters across the whole grid and returns the number
/// of newborns. Mothers move from bucket `k` to bucket `k - 1`; the newborns
/// themselves are left for the caller to place.
pub fn reproduce<S: Sampler + ?Sized>(
    grid: &mut CohortGrid,
    params: &ParameterSet,
    sampler: &mut S,
    anomalies: &mut Anomalies,
) -> BigCount {
    let mut draws = Draws::new(sampler, params.exact_threshold(), anomalies);
    let mut newborns = BigCount::zero();
    for age in 0..=AGE_MAX {
        for month in 0..MONTHS_PER_YEAR {
            let cohort = grid.cohort_mut(age, month);
            for remaining in 1..LITTER_CATEGORIES {
                let females = &cohort.females[remaining];
                if females.is_zero() {
                    continue;
                }
                let p = birth_probability(remaining, month);
                let (mothers, born) = deliver(&mut draws, params, females, p);
                cohort.females[remaining] = cohort.females[remaining].saturating_sub(&mothers);
                cohort.females[remaining - 1] += mothers;
                newborns += born;
            }
        }
    }
    newborns
}

/// Remaining litters spread evenly over the months left in the year.
pub fn birth_probability(remaining_litters: usize, month: usize) -> f64 {
    remaining_litters as f64 / (MONTHS_PER_YEAR - month) as f64
}

/// Picks the mothers among `females` and draws their litters. Returns
/// `(mothers, newborns)` with `mothers <= females`.
fn deliver<S: Sampler + ?Sized>(
    draws: &mut Draws<'_, S>,
    params: &ParameterSet,
    females: &BigCount,
    p: f64,
) -> (BigCount, BigCount) {
    let strategy = draws.strategy(females);
    let mothers = draws.thin_with(strategy, females, p);
    let newborns = match strategy {
        Strategy::Exact(_) => {
            let size = params.litter_size();
            let mut total = 0u64;
            for _ in 0..mothers.to_u64().unwrap_or(0) {
                total += u64::from(draws.sampler().uniform_int(size.min, size.max));
            }
            BigCount::from_u64(total)
        }
        Strategy::Approximate => {
            let sizes = draws.split_with(strategy, &mothers, params.litter_size_cdf());
            sizes
                .iter()
                .enumerate()
                .map(|(size, count)| count.mul_small(size as u64))
                .sum()
        }
    };
    (mothers, newborns)
}
