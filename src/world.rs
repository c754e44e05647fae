use serde::Serialize;

use crate::counter::BigCount;
use crate::grid::{Census, CohortGrid, MONTHS_PER_YEAR};
use crate::sampling::Anomalies;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Bookkeeping {
    pub anomalies: Anomalies,
    pub births_last_month: BigCount,
    pub births_total: BigCount,
}

/// Simulation state: the grid plus the clock and the newborns waiting to be
/// placed in the grid at the end of the month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    pub grid: CohortGrid,
    pub bookkeeping: Bookkeeping,
    pending_newborns: BigCount,
    months_elapsed: u64,
}

impl World {
    pub fn new(grid: CohortGrid) -> Self {
        Self {
            grid,
            bookkeeping: Bookkeeping::default(),
            pending_newborns: BigCount::zero(),
            months_elapsed: 0,
        }
    }

    pub fn months_elapsed(&self) -> u64 {
        self.months_elapsed
    }

    pub fn years_elapsed(&self) -> u64 {
        self.months_elapsed / MONTHS_PER_YEAR as u64
    }

    pub fn census(&self) -> Census {
        self.grid.census()
    }

    pub fn total_population(&self) -> BigCount {
        self.grid.census().total()
    }

    pub fn pending_newborns(&self) -> &BigCount {
        &self.pending_newborns
    }

    pub fn queue_newborns(&mut self, newborns: BigCount) {
        self.pending_newborns += newborns;
    }

    /// Moves this month's newborns into the newborn cell and closes the month.
    pub fn admit_newborns(&mut self) {
        let newborns = std::mem::take(&mut self.pending_newborns);
        self.bookkeeping.births_total += &newborns;
        self.grid.cohort_mut(0, 0).babies = newborns.clone();
        self.bookkeeping.births_last_month = newborns;
        self.months_elapsed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admitting_newborns_overwrites_the_newborn_cell() {
        let mut world = World::new(CohortGrid::new());
        world.grid.cohort_mut(0, 0).babies = BigCount::from_u64(99);
        world.queue_newborns(BigCount::from_u64(4));
        world.queue_newborns(BigCount::from_u64(6));
        world.admit_newborns();

        assert_eq!(world.grid.cohort(0, 0).babies, BigCount::from_u64(10));
        assert!(world.pending_newborns().is_zero());
        assert_eq!(world.bookkeeping.births_total, BigCount::from_u64(10));
        assert_eq!(world.months_elapsed(), 1);
        assert_eq!(world.years_elapsed(), 0);
    }
}
