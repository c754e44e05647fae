use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    counter::BigCount,
    grid::{Census, CohortGrid, MONTHS_PER_YEAR},
    params::ParameterSet,
    rng::{RngManager, SystemRng},
    sampling::Draws,
    snapshot::SnapshotWriter,
    systems::{AgingSystem, ReproductionSystem},
    world::World,
};

const FOUNDERS_STREAM: &str = "founders";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    /// Write a census snapshot every this many years; 0 disables snapshots.
    pub snapshot_interval_years: u64,
    pub snapshot_dir: PathBuf,
}

impl EngineSettings {
    pub fn new(scenario_name: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            seed,
            snapshot_interval_years: 0,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    params: ParameterSet,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, params: ParameterSet) -> Self {
        Self {
            settings,
            params,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Reproduction followed by aging, the monthly order the model requires.
    pub fn with_demography(self) -> Self {
        self.with_system(ReproductionSystem::new())
            .with_system(AgingSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_years,
            ),
            params: self.params,
            settings: self.settings,
        }
    }
}

#[derive(Clone, Debug)]
pub struct YearReport {
    pub year: u64,
    pub census: Census,
    pub snapshot_path: Option<PathBuf>,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    params: ParameterSet,
    settings: EngineSettings,
}

impl Engine {
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Builds the initial world from the `founders` stream.
    pub fn found_world(&mut self, females: &BigCount, males: &BigCount) -> World {
        let mut stream = self.rng.stream(FOUNDERS_STREAM);
        let mut world = World::new(CohortGrid::new());
        let mut draws = Draws::new(
            &mut stream,
            self.params.exact_threshold(),
            &mut world.bookkeeping.anomalies,
        );
        let grid = CohortGrid::founders(females, males, &self.params, &mut draws);
        world.grid = grid;
        info!(
            scenario = %self.settings.scenario_name,
            %females,
            %males,
            "founded population"
        );
        world
    }

    pub fn simulate_month(&mut self, world: &mut World) -> Result<()> {
        let month = world.months_elapsed();
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            let ctx = SystemContext {
                month,
                params: &self.params,
                scenario_name: &self.settings.scenario_name,
            };
            system.run(&ctx, world, &mut rng_stream)?;
        }
        world.admit_newborns();
        debug!(
            month = month + 1,
            births = %world.bookkeeping.births_last_month,
            "month simulated"
        );
        Ok(())
    }

    pub fn simulate_year(&mut self, world: &mut World) -> Result<()> {
        for _ in 0..MONTHS_PER_YEAR {
            self.simulate_month(world)?;
        }
        Ok(())
    }

    pub fn run_years(&mut self, world: &mut World, years: u64) -> Result<()> {
        self.run_years_with_hook(world, years, |_| {})
    }

    pub fn run_years_with_hook<F>(&mut self, world: &mut World, years: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(&YearReport),
    {
        for _ in 0..years {
            self.simulate_year(world)?;
            let year = world.years_elapsed();
            let census = world.census();
            info!(
                scenario = %self.settings.scenario_name,
                year,
                %census,
                anomalies = world.bookkeeping.anomalies.total(),
                "year complete"
            );
            let snapshot_path = self
                .snapshot_writer
                .maybe_write(world, &self.settings.scenario_name)?;
            hook(&YearReport {
                year,
                census,
                snapshot_path,
            });
        }
        Ok(())
    }
}

/// Founds a population and runs it for `years` years with the standard
/// reproduction and aging systems.
pub fn simulate_population(
    settings: EngineSettings,
    params: ParameterSet,
    females: &BigCount,
    males: &BigCount,
    years: u64,
) -> Result<World> {
    let mut engine = EngineBuilder::new(settings, params).with_demography().build();
    let mut world = engine.found_world(females, males);
    engine.run_years(&mut world, years)?;
    Ok(world)
}

pub struct SystemContext<'a> {
    /// Months completed before this one.
    pub month: u64,
    pub params: &'a ParameterSet,
    pub scenario_name: &'a str,
}

pub trait System {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModelConfig;

    fn params() -> ParameterSet {
        ParameterSet::derive(&ModelConfig::default()).unwrap()
    }

    struct CountingSystem {
        runs: u64,
    }

    impl System for CountingSystem {
        fn name(&self) -> &str {
            "counting"
        }

        fn run(
            &mut self,
            ctx: &SystemContext,
            world: &mut World,
            _rng: &mut SystemRng<'_>,
        ) -> Result<()> {
            assert_eq!(ctx.month, world.months_elapsed());
            self.runs += 1;
            world.queue_newborns(BigCount::from_u64(1));
            Ok(())
        }
    }

    #[test]
    fn month_admits_queued_newborns() {
        let mut engine = EngineBuilder::new(EngineSettings::new("unit", 1), params())
            .with_system(CountingSystem { runs: 0 })
            .build();
        assert_eq!(engine.settings().seed, 1);
        assert_eq!(engine.params().exact_threshold(), 10_000);
        let mut world = engine.found_world(&BigCount::zero(), &BigCount::zero());
        engine.simulate_year(&mut world).unwrap();

        assert_eq!(world.months_elapsed(), 12);
        assert_eq!(world.grid.cohort(0, 0).babies, BigCount::from_u64(1));
        assert_eq!(world.bookkeeping.births_total, BigCount::from_u64(12));
    }

    #[test]
    fn hook_sees_every_year() {
        let mut engine = EngineBuilder::new(EngineSettings::new("unit", 3), params())
            .with_demography()
            .build();
        let mut world = engine.found_world(&BigCount::from_u64(10), &BigCount::from_u64(10));
        let mut years = Vec::new();
        engine
            .run_years_with_hook(&mut world, 3, |report| years.push(report.year))
            .unwrap();
        assert_eq!(years, vec![1, 2, 3]);
    }
}
