//! Yearly JSON census export.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::counter::BigCount;
use crate::grid::{Census, Cohort};
use crate::sampling::Anomalies;
use crate::world::World;

#[derive(Debug, Serialize)]
pub struct CohortRecord<'a> {
    pub age: usize,
    pub month: usize,
    #[serde(flatten)]
    pub cohort: &'a Cohort,
}

#[derive(Debug, Serialize)]
pub struct YearSnapshot<'a> {
    pub scenario: &'a str,
    pub year: u64,
    pub months_elapsed: u64,
    pub written_at: DateTime<Utc>,
    pub census: Census,
    pub anomalies: Anomalies,
    pub births_total: &'a BigCount,
    /// Non-empty cohorts only.
    pub cohorts: Vec<CohortRecord<'a>>,
}

impl<'a> YearSnapshot<'a> {
    pub fn capture(world: &'a World, scenario: &'a str) -> Self {
        Self {
            scenario,
            year: world.years_elapsed(),
            months_elapsed: world.months_elapsed(),
            written_at: Utc::now(),
            census: world.census(),
            anomalies: world.bookkeeping.anomalies,
            births_total: &world.bookkeeping.births_total,
            cohorts: world
                .grid
                .iter()
                .filter(|(_, _, cohort)| !cohort.is_empty())
                .map(|(age, month, cohort)| CohortRecord { age, month, cohort })
                .collect(),
        }
    }
}

pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_years: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval_years: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval_years,
        }
    }

    pub fn should_write(&self, year: u64) -> bool {
        self.interval_years != 0 && year > 0 && year % self.interval_years == 0
    }

    /// Writes `<dir>/<scenario>/year_NNNN.json` when the world sits on a
    /// snapshot year.
    pub fn maybe_write(&self, world: &World, scenario_name: &str) -> Result<Option<PathBuf>> {
        let year = world.years_elapsed();
        if !self.should_write(year) {
            return Ok(None);
        }

        let dir = self.output_dir.join(scenario_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;
        let path = dir.join(format!("year_{year:04}.json"));
        let snapshot = YearSnapshot::capture(world, scenario_name);
        let json = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize year snapshot")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        debug!(path = %path.display(), year, "snapshot written");
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_zero_never_writes() {
        let writer = SnapshotWriter::new("unused", 0);
        assert!(!writer.should_write(0));
        assert!(!writer.should_write(5));
    }

    #[test]
    fn writes_on_multiples_of_the_interval() {
        let writer = SnapshotWriter::new("unused", 5);
        assert!(!writer.should_write(0));
        assert!(!writer.should_write(4));
        assert!(writer.should_write(5));
        assert!(writer.should_write(10));
    }
}
