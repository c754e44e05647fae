//! Replicate series: the same founders run under consecutive seeds, summarised
//! by the spread of the final population.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::{
    counter::BigCount,
    engine::{simulate_population, EngineSettings},
    grid::Census,
    params::ParameterSet,
    scenario::SeriesSpec,
};

#[derive(Debug, Clone, Serialize)]
pub struct ReplicateOutcome {
    pub seed: u64,
    pub census: Census,
}

impl ReplicateOutcome {
    pub fn total(&self) -> BigCount {
        self.census.total()
    }
}

/// Summary of final population totals. The standard deviation is the
/// population one (divides by the replicate count).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub mean: f64,
    pub std_dev: f64,
    /// `std_dev / mean`; `None` when every replicate went extinct.
    pub coefficient_of_variation: Option<f64>,
    pub min: BigCount,
    pub max: BigCount,
}

impl SeriesStats {
    pub fn from_totals(totals: &[BigCount]) -> Option<Self> {
        let min = totals.iter().min()?.clone();
        let max = totals.iter().max()?.clone();
        let count = totals.len() as f64;
        let values: Vec<f64> = totals.iter().map(BigCount::to_f64).collect();
        let mean = values.iter().sum::<f64>() / count;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        let std_dev = variance.sqrt();
        let coefficient_of_variation = (mean > 0.0).then(|| std_dev / mean);
        Some(Self {
            mean,
            std_dev,
            coefficient_of_variation,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub label: String,
    pub outcomes: Vec<ReplicateOutcome>,
    pub stats: Option<SeriesStats>,
}

/// Runs every replicate of `spec`. Replicate `i` uses seed `first_seed + i`,
/// where `first_seed` is the series seed or `default_seed`.
pub fn run_series(spec: &SeriesSpec, params: &ParameterSet, default_seed: u64) -> Result<SeriesReport> {
    let first_seed = spec.seed.unwrap_or(default_seed);
    info!(
        series = %spec.label,
        females = %spec.females,
        males = %spec.males,
        years = spec.years,
        replicates = spec.replicates,
        "starting series"
    );

    let mut outcomes = Vec::with_capacity(spec.replicates as usize);
    for index in 0..u64::from(spec.replicates) {
        let seed = first_seed.wrapping_add(index);
        let settings = EngineSettings::new(format!("{}-{index}", spec.label), seed);
        let world = simulate_population(
            settings,
            params.clone(),
            &spec.females,
            &spec.males,
            spec.years,
        )?;
        let census = world.census();
        info!(series = %spec.label, replicate = index + 1, seed, %census, "replicate complete");
        outcomes.push(ReplicateOutcome { seed, census });
    }

    let totals: Vec<BigCount> = outcomes.iter().map(ReplicateOutcome::total).collect();
    Ok(SeriesReport {
        label: spec.label.clone(),
        stats: SeriesStats::from_totals(&totals),
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModelConfig;

    fn counts(values: &[u64]) -> Vec<BigCount> {
        values.iter().copied().map(BigCount::from_u64).collect()
    }

    #[test]
    fn stats_use_population_variance() {
        let stats = SeriesStats::from_totals(&counts(&[2, 4, 4, 4, 5, 5, 7, 9])).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std_dev, 2.0);
        assert_eq!(stats.coefficient_of_variation, Some(0.4));
        assert_eq!(stats.min, BigCount::from_u64(2));
        assert_eq!(stats.max, BigCount::from_u64(9));
    }

    #[test]
    fn extinct_series_has_no_coefficient() {
        let stats = SeriesStats::from_totals(&counts(&[0, 0, 0])).unwrap();
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.coefficient_of_variation, None);
        assert!(SeriesStats::from_totals(&[]).is_none());
    }

    #[test]
    fn replicates_use_consecutive_seeds() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        let spec = SeriesSpec {
            label: "small".into(),
            females: BigCount::from_u64(5),
            males: BigCount::from_u64(5),
            years: 1,
            replicates: 3,
            seed: Some(10_000),
        };
        let report = run_series(&spec, &params, 1).unwrap();
        let seeds: Vec<u64> = report.outcomes.iter().map(|o| o.seed).collect();
        assert_eq!(seeds, vec![10_000, 10_001, 10_002]);
        assert!(report.stats.is_some());
    }
}
