//! The cohort grid: population state indexed by (age in years, month in year).

use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::counter::BigCount;
use crate::params::ParameterSet;
use crate::sampling::{Draws, Sampler};

/// Oldest age row, in years.
pub const AGE_MAX: usize = 16;
pub const MONTHS_PER_YEAR: usize = 12;
/// Remaining-litter buckets per cohort (0 through 9 litters).
pub const LITTER_CATEGORIES: usize = 10;

/// Age row where founders are placed.
const FOUNDER_AGE: usize = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Cohort {
    /// Juveniles that have not matured yet; only used at age 0.
    pub babies: BigCount,
    pub males: BigCount,
    /// `females[k]` holds females with `k` litters left this year.
    pub females: [BigCount; LITTER_CATEGORIES],
}

impl Cohort {
    pub fn female_total(&self) -> BigCount {
        self.females.iter().sum()
    }

    pub fn total(&self) -> BigCount {
        &self.babies + &self.males + self.female_total()
    }

    pub fn is_empty(&self) -> bool {
        self.babies.is_zero() && self.males.is_zero() && self.females.iter().all(BigCount::is_zero)
    }
}

/// Aggregate head counts over a whole grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Census {
    pub babies: BigCount,
    pub males: BigCount,
    pub females: BigCount,
}

impl Census {
    pub fn total(&self) -> BigCount {
        &(&self.babies + &self.males) + &self.females
    }
}

impl fmt::Display for Census {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "babies = {}, males = {}, females = {}",
            self.babies, self.males, self.females
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CohortGrid {
    cohorts: [[Cohort; MONTHS_PER_YEAR]; AGE_MAX + 1],
}

impl CohortGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the starting grid: every founder is one year old, males as a flat
    /// count and each female scheduled for her own yearly litter count.
    pub fn founders<S: Sampler + ?Sized>(
        females: &BigCount,
        males: &BigCount,
        params: &ParameterSet,
        draws: &mut Draws<'_, S>,
    ) -> Self {
        let mut grid = Self::new();
        let cell = grid.cohort_mut(FOUNDER_AGE, 0);
        cell.males = males.clone();
        let scheduled = draws.split(females, params.litter_cdf());
        for (bucket, count) in cell.females.iter_mut().zip(scheduled) {
            *bucket = count;
        }
        grid
    }

    /// # Panics
    ///
    /// Panics when `age > AGE_MAX` or `month >= MONTHS_PER_YEAR`.
    pub fn cohort(&self, age: usize, month: usize) -> &Cohort {
        &self.cohorts[age][month]
    }

    /// # Panics
    ///
    /// Panics when `age > AGE_MAX` or `month >= MONTHS_PER_YEAR`.
    pub fn cohort_mut(&mut self, age: usize, month: usize) -> &mut Cohort {
        &mut self.cohorts[age][month]
    }

    /// Cell whose individuals move into `(age, month)` after one month, or
    /// `None` for the newborn cell.
    pub fn predecessor(age: usize, month: usize) -> Option<(usize, usize)> {
        match (age, month) {
            (0, 0) => None,
            (age, 0) => Some((age - 1, MONTHS_PER_YEAR - 1)),
            (age, month) => Some((age, month - 1)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Cohort)> {
        self.cohorts.iter().enumerate().flat_map(|(age, row)| {
            row.iter()
                .enumerate()
                .map(move |(month, cohort)| (age, month, cohort))
        })
    }

    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for (_, _, cohort) in self.iter() {
            census.babies += &cohort.babies;
            census.males += &cohort.males;
            census.females += cohort.female_total();
        }
        census
    }

    pub fn is_extinct(&self) -> bool {
        self.iter().all(|(_, _, cohort)| cohort.is_empty())
    }

    /// Full per-cell listing, one line per (age, month).
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (age, row) in self.cohorts.iter().enumerate() {
            let _ = writeln!(out, "AGE = {age}");
            for (month, cohort) in row.iter().enumerate() {
                let females = cohort
                    .females
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(
                    out,
                    "MONTH {month:2} : babies = {}, males = {}, females = [{females}]",
                    cohort.babies, cohort.males
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::params::ModelConfig;
    use crate::sampling::Anomalies;

    #[test]
    fn predecessor_walks_back_one_month() {
        assert_eq!(CohortGrid::predecessor(0, 0), None);
        assert_eq!(CohortGrid::predecessor(0, 5), Some((0, 4)));
        assert_eq!(CohortGrid::predecessor(3, 0), Some((2, 11)));
        assert_eq!(CohortGrid::predecessor(AGE_MAX, 11), Some((AGE_MAX, 10)));
    }

    #[test]
    fn founders_sit_at_age_one_month_zero() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut anomalies = Anomalies::default();
        let mut draws = Draws::new(&mut rng, params.exact_threshold(), &mut anomalies);
        let grid = CohortGrid::founders(
            &BigCount::from_u64(40),
            &BigCount::from_u64(25),
            &params,
            &mut draws,
        );

        let cell = grid.cohort(1, 0);
        assert_eq!(cell.males, BigCount::from_u64(25));
        assert_eq!(cell.female_total(), BigCount::from_u64(40));
        assert!(cell.females[..3].iter().all(BigCount::is_zero));

        let census = grid.census();
        assert_eq!(census.total(), BigCount::from_u64(65));
        assert!(grid
            .iter()
            .filter(|(age, month, _)| (*age, *month) != (1, 0))
            .all(|(_, _, cohort)| cohort.is_empty()));
    }

    #[test]
    fn large_founder_groups_are_split_approximately() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut anomalies = Anomalies::default();
        let mut draws = Draws::new(&mut rng, params.exact_threshold(), &mut anomalies);
        let females = BigCount::from_u64(1_000_000);
        let grid = CohortGrid::founders(&females, &BigCount::zero(), &params, &mut draws);
        assert_eq!(grid.cohort(1, 0).female_total(), females);
    }

    #[test]
    fn census_display_matches_report_format() {
        let mut grid = CohortGrid::new();
        grid.cohort_mut(0, 3).babies = BigCount::from_u64(7);
        grid.cohort_mut(2, 1).males = BigCount::from_u64(2);
        grid.cohort_mut(2, 1).females[4] = BigCount::from_u64(5);
        assert_eq!(
            grid.census().to_string(),
            "babies = 7, males = 2, females = 5"
        );
        assert!(grid.render().contains("MONTH  1 : babies = 0, males = 2, females = [0, 0, 0, 0, 5, 0, 0, 0, 0, 0]"));
    }

    #[test]
    fn empty_grid_is_extinct() {
        assert!(CohortGrid::new().is_extinct());
    }
}
