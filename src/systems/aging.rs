use anyhow::Result;

use crate::{
    counter::BigCount,
    engine::{System, SystemContext},
    grid::{Cohort, CohortGrid, AGE_MAX, MONTHS_PER_YEAR},
    params::{ParameterSet, YearRollover},
    rng::SystemRng,
    sampling::{Anomalies, Draws, Sampler},
    world::World,
};

pub struct AgingSystem;

impl AgingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AgingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for AgingSystem {
    fn name(&self) -> &str {
        "aging"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        age_population(
            &mut world.grid,
            ctx.params,
            rng,
            &mut world.bookkeeping.anomalies,
        );
        Ok(())
    }
}

/// Advances every cohort by one month.
///
/// Each cell is rebuilt from its predecessor in the previous generation, oldest
/// cells first. The newborn cell `(0, 0)` is left empty for the driver, and
/// whatever sat in the last cell leaves the grid.
pub fn age_population<S: Sampler + ?Sized>(
    grid: &mut CohortGrid,
    params: &ParameterSet,
    sampler: &mut S,
    anomalies: &mut Anomalies,
) {
    let previous = grid.clone();
    let mut draws = Draws::new(sampler, params.exact_threshold(), anomalies);

    for age in (0..=AGE_MAX).rev() {
        let survival = params.adult_survival_for_age(age);
        for month in (0..MONTHS_PER_YEAR).rev() {
            let Some((from_age, from_month)) = CohortGrid::predecessor(age, month) else {
                continue;
            };
            let source = previous.cohort(from_age, from_month);
            let mut next = Cohort {
                males: draws.thin(&source.males, survival),
                ..Cohort::default()
            };

            if month == 0 {
                roll_over(&mut draws, params, source, survival, &mut next);
            } else {
                for (bucket, count) in next.females.iter_mut().zip(&source.females) {
                    *bucket = draws.thin(count, survival);
                }
            }

            if age == 0 {
                mature(&mut draws, params, &source.babies, month, &mut next);
            }

            *grid.cohort_mut(age, month) = next;
        }
    }

    *grid.cohort_mut(0, 0) = Cohort::default();
}

/// Month-0 re-scheduling: surviving females draw a fresh yearly litter count.
fn roll_over<S: Sampler + ?Sized>(
    draws: &mut Draws<'_, S>,
    params: &ParameterSet,
    source: &Cohort,
    survival: f64,
    next: &mut Cohort,
) {
    let candidates = match params.year_rollover() {
        YearRollover::ExhaustedOnly => source.females[0].clone(),
        YearRollover::AllFemales => source.female_total(),
    };
    let survivors = draws.thin(&candidates, survival);
    let scheduled = draws.split(&survivors, params.litter_cdf());
    for (bucket, count) in next.females.iter_mut().zip(scheduled) {
        *bucket = count;
    }
}

/// Juvenile survival and maturation for an age-0 cell. Matured females only
/// keep the litters that still fit in the months left this year.
///
/// Draws are staged over the whole cohort: every survival draw, then every
/// maturity draw, then every sex draw. An exact-mode run therefore consumes
/// its variates in a different order than a per-individual loop would, with
/// the same distribution.
fn mature<S: Sampler + ?Sized>(
    draws: &mut Draws<'_, S>,
    params: &ParameterSet,
    babies: &BigCount,
    month: usize,
    next: &mut Cohort,
) {
    // Past the end of the schedule every juvenile has matured.
    let Some(maturity) = params.maturity(month) else {
        return;
    };

    let survivors = draws.thin(babies, params.baby_survival_month());
    let matured = draws.thin(&survivors, maturity);
    let males = draws.thin(&matured, params.male_ratio());
    let females = matured.saturating_sub(&males);

    let scheduled = draws.split(&females, params.litter_cdf());
    for (litters, count) in scheduled.into_iter().enumerate() {
        next.females[litters.saturating_sub(month)] += count;
    }
    next.males += males;
    next.babies = survivors.saturating_sub(&matured);
}
