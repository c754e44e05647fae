//! Biological model parameters.
//!
//! A [`ModelConfig`] is what a scenario file carries; [`ParameterSet::derive`]
//! validates it once and turns it into the immutable probability tables every
//! engine pass reads.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::grid::LITTER_CATEGORIES;
use crate::sampling::{categorical, Sampler};

/// Number of adult age brackets with their own survival rate.
pub const AGE_BRACKETS: usize = 7;

/// Lowest litter count a female can be scheduled for, apart from zero.
const FIRST_SCHEDULED_LITTER: usize = 3;

/// Largest litter size a scenario may configure.
pub const MAX_LITTER_SIZE: u32 = 1_000;

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("litter weights must be finite and non-negative (index {index} is {value})")]
    InvalidLitterWeight { index: usize, value: f64 },
    #[error("litter weight {index} must be zero, females are never scheduled for 1 or 2 litters")]
    StructuralLitterWeight { index: usize },
    #[error("litter weights for 3..=9 litters sum to zero")]
    EmptyLitterWeights,
    #[error("{name} must be a probability in [0, 1], got {value}")]
    NotAProbability { name: &'static str, value: f64 },
    #[error("maturity schedule must not be empty")]
    EmptyMaturitySchedule,
    #[error("maturity schedule decreases at month {month}")]
    DecreasingMaturity { month: usize },
    #[error("maturity schedule must reach 1.0 by its last month, ends at {last}")]
    IncompleteMaturity { last: f64 },
    #[error("maturity schedule covers {months} months, at most 11 fit in the first year")]
    MaturityScheduleTooLong { months: usize },
    #[error("litter size range {min}..={max} is empty, starts at zero or exceeds 1000")]
    InvalidLitterSize { min: u32, max: u32 },
    #[error("baby survival root must be at least one month")]
    InvalidBabySurvivalMonths,
    #[error("exact-mode threshold must be at least 1")]
    InvalidThreshold,
}

/// Which distribution the approximate reproduction path draws litter sizes
/// from. `LitterCountProxy` is the legacy model, whose approximate path
/// averages 6 pups per litter against 4.5 in exact mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LitterSizeModel {
    /// Uniform over the configured litter size range, matching exact mode.
    #[default]
    Uniform,
    /// Reuse the yearly litter-count distribution as the litter-size shape.
    LitterCountProxy,
}

/// Which females are handed a fresh annual litter count in month 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearRollover {
    /// Only females that delivered every scheduled litter carry over.
    #[default]
    ExhaustedOnly,
    /// Every surviving female carries over, whatever she had left.
    AllFemales,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LitterSizeRange {
    pub min: u32,
    pub max: u32,
}

impl Default for LitterSizeRange {
    fn default() -> Self {
        Self { min: 3, max: 6 }
    }
}

fn default_litter_weights() -> [f64; LITTER_CATEGORIES] {
    [0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0]
}

fn default_maturity_by_month() -> Vec<f64> {
    vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.2, 0.4, 0.6, 0.8, 1.0, 1.0]
}

fn default_adult_annual_survival() -> f64 {
    0.6
}

fn default_adult_survival_decline() -> f64 {
    0.1
}

fn default_senescence_age() -> usize {
    10
}

fn default_baby_annual_survival() -> f64 {
    0.35
}

fn default_baby_survival_months() -> u32 {
    8
}

fn default_male_ratio() -> f64 {
    0.5
}

fn default_exact_threshold() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_litter_weights")]
    pub litter_weights: [f64; LITTER_CATEGORIES],
    #[serde(default)]
    pub litter_size: LitterSizeRange,
    #[serde(default)]
    pub litter_size_model: LitterSizeModel,
    #[serde(default = "default_maturity_by_month")]
    pub maturity_by_month: Vec<f64>,
    #[serde(default = "default_adult_annual_survival")]
    pub adult_annual_survival: f64,
    #[serde(default = "default_adult_survival_decline")]
    pub adult_survival_decline: f64,
    #[serde(default = "default_senescence_age")]
    pub senescence_age: usize,
    #[serde(default = "default_baby_annual_survival")]
    pub baby_annual_survival: f64,
    #[serde(default = "default_baby_survival_months")]
    pub baby_survival_months: u32,
    #[serde(default = "default_male_ratio")]
    pub male_ratio: f64,
    #[serde(default = "default_exact_threshold")]
    pub exact_threshold: u64,
    #[serde(default)]
    pub year_rollover: YearRollover,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            litter_weights: default_litter_weights(),
            litter_size: LitterSizeRange::default(),
            litter_size_model: LitterSizeModel::default(),
            maturity_by_month: default_maturity_by_month(),
            adult_annual_survival: default_adult_annual_survival(),
            adult_survival_decline: default_adult_survival_decline(),
            senescence_age: default_senescence_age(),
            baby_annual_survival: default_baby_annual_survival(),
            baby_survival_months: default_baby_survival_months(),
            male_ratio: default_male_ratio(),
            exact_threshold: default_exact_threshold(),
            year_rollover: YearRollover::default(),
        }
    }
}

/// Derived, read-only probability tables shared by every engine pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    litter_cdf: [f64; LITTER_CATEGORIES],
    litter_size: LitterSizeRange,
    litter_size_cdf: Vec<f64>,
    maturity_by_month: Vec<f64>,
    adult_survival: [f64; AGE_BRACKETS],
    senescence_age: usize,
    baby_survival_month: f64,
    male_ratio: f64,
    exact_threshold: u64,
    year_rollover: YearRollover,
}

impl ParameterSet {
    pub fn derive(config: &ModelConfig) -> Result<Self, ParamsError> {
        let litter_cdf = derive_litter_cdf(&config.litter_weights)?;

        let LitterSizeRange { min, max } = config.litter_size;
        if min == 0 || min > max || max > MAX_LITTER_SIZE {
            return Err(ParamsError::InvalidLitterSize { min, max });
        }
        let litter_size_cdf = match config.litter_size_model {
            LitterSizeModel::Uniform => uniform_cdf(min, max),
            LitterSizeModel::LitterCountProxy => litter_cdf.to_vec(),
        };

        let maturity_by_month = validate_maturity(&config.maturity_by_month)?;

        check_probability("adult_annual_survival", config.adult_annual_survival)?;
        check_probability("adult_survival_decline", config.adult_survival_decline)?;
        let mut adult_survival = [0.0; AGE_BRACKETS];
        for (bracket, rate) in adult_survival.iter_mut().enumerate() {
            *rate = derive_adult_survival(
                bracket,
                config.adult_annual_survival,
                config.adult_survival_decline,
            );
        }

        check_probability("baby_annual_survival", config.baby_annual_survival)?;
        if config.baby_survival_months == 0 {
            return Err(ParamsError::InvalidBabySurvivalMonths);
        }
        let baby_survival_month =
            derive_baby_survival(config.baby_annual_survival, config.baby_survival_months);

        check_probability("male_ratio", config.male_ratio)?;
        if config.exact_threshold == 0 {
            return Err(ParamsError::InvalidThreshold);
        }

        debug!(
            ?litter_cdf,
            ?adult_survival,
            baby_survival_month,
            exact_threshold = config.exact_threshold,
            "derived parameter set"
        );

        Ok(Self {
            litter_cdf,
            litter_size: config.litter_size,
            litter_size_cdf,
            maturity_by_month,
            adult_survival,
            senescence_age: config.senescence_age,
            baby_survival_month,
            male_ratio: config.male_ratio,
            exact_threshold: config.exact_threshold,
            year_rollover: config.year_rollover,
        })
    }

    pub fn litter_cdf(&self) -> &[f64; LITTER_CATEGORIES] {
        &self.litter_cdf
    }

    pub fn litter_size_cdf(&self) -> &[f64] {
        &self.litter_size_cdf
    }

    pub fn litter_size(&self) -> LitterSizeRange {
        self.litter_size
    }

    /// Probability that a juvenile aged `month` months matures this month.
    /// `None` past the end of the schedule, where no juvenile is left.
    pub fn maturity(&self, month: usize) -> Option<f64> {
        self.maturity_by_month.get(month).copied()
    }

    pub fn adult_survival(&self) -> &[f64; AGE_BRACKETS] {
        &self.adult_survival
    }

    pub fn adult_survival_for_age(&self, age_years: usize) -> f64 {
        if age_years < self.senescence_age {
            return self.adult_survival[0];
        }
        let bracket = (age_years - self.senescence_age).min(AGE_BRACKETS - 1);
        self.adult_survival[bracket]
    }

    pub fn baby_survival_month(&self) -> f64 {
        self.baby_survival_month
    }

    pub fn male_ratio(&self) -> f64 {
        self.male_ratio
    }

    pub fn exact_threshold(&self) -> u64 {
        self.exact_threshold
    }

    pub fn year_rollover(&self) -> YearRollover {
        self.year_rollover
    }

    /// Draws how many litters a female is scheduled to deliver this year.
    pub fn litter_per_year<S: Sampler + ?Sized>(&self, sampler: &mut S) -> usize {
        categorical(sampler, &self.litter_cdf)
    }
}

/// Cumulative distribution over yearly litter counts.
///
/// Only weights 3..=9 are normalised; `cdf[0]` keeps the raw weight of index 0
/// so the "no litter" outcome stays outside the sampled range.
pub fn derive_litter_cdf(
    weights: &[f64; LITTER_CATEGORIES],
) -> Result<[f64; LITTER_CATEGORIES], ParamsError> {
    for (index, &value) in weights.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(ParamsError::InvalidLitterWeight { index, value });
        }
        if index < FIRST_SCHEDULED_LITTER && value != 0.0 {
            return Err(ParamsError::StructuralLitterWeight { index });
        }
    }
    let sum: f64 = weights[FIRST_SCHEDULED_LITTER..].iter().sum();
    if sum <= 0.0 {
        return Err(ParamsError::EmptyLitterWeights);
    }

    let mut cdf = [0.0; LITTER_CATEGORIES];
    cdf[0] = weights[0];
    for i in 1..LITTER_CATEGORIES {
        cdf[i] = weights[i] / sum + cdf[i - 1];
    }
    Ok(cdf)
}

pub fn derive_adult_survival(bracket: usize, annual_base: f64, decline: f64) -> f64 {
    let annual = (annual_base - decline * bracket as f64).max(0.0);
    annual.powf(1.0 / 12.0)
}

pub fn derive_baby_survival(annual: f64, months: u32) -> f64 {
    annual.powf(1.0 / months as f64)
}

fn uniform_cdf(min: u32, max: u32) -> Vec<f64> {
    let width = (max - min + 1) as f64;
    (0..=max)
        .map(|size| {
            if size < min {
                0.0
            } else {
                (size - min + 1) as f64 / width
            }
        })
        .collect()
}

fn validate_maturity(schedule: &[f64]) -> Result<Vec<f64>, ParamsError> {
    let Some(&last) = schedule.last() else {
        return Err(ParamsError::EmptyMaturitySchedule);
    };
    if schedule.len() > 11 {
        return Err(ParamsError::MaturityScheduleTooLong {
            months: schedule.len(),
        });
    }
    for (month, &value) in schedule.iter().enumerate() {
        check_probability("maturity_by_month", value)?;
        if month > 0 && value < schedule[month - 1] {
            return Err(ParamsError::DecreasingMaturity { month });
        }
    }
    if last != 1.0 {
        return Err(ParamsError::IncompleteMaturity { last });
    }
    Ok(schedule.to_vec())
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamsError::NotAProbability { name, value })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn litter_cdf_is_normalised_and_non_decreasing() {
        let cdf = derive_litter_cdf(&default_litter_weights()).unwrap();
        assert!((cdf[9] - 1.0).abs() < 1e-12);
        assert!(cdf.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(cdf[0], 0.0);
        assert_eq!(cdf[2], 0.0);
        assert!((cdf[3] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let err = derive_litter_cdf(&[0.0; LITTER_CATEGORIES]).unwrap_err();
        assert_eq!(err, ParamsError::EmptyLitterWeights);
    }

    #[test]
    fn weights_below_three_litters_are_rejected() {
        let mut weights = default_litter_weights();
        weights[1] = 1.0;
        assert_eq!(
            derive_litter_cdf(&weights).unwrap_err(),
            ParamsError::StructuralLitterWeight { index: 1 }
        );
    }

    #[test]
    fn adult_survival_declines_and_floors_at_zero() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        let rates = params.adult_survival();
        assert!((rates[0] - 0.6_f64.powf(1.0 / 12.0)).abs() < 1e-12);
        assert!(rates.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(rates[6], 0.0);
    }

    #[test]
    fn survival_lookup_clamps_brackets() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        let rates = *params.adult_survival();
        assert_eq!(params.adult_survival_for_age(0), rates[0]);
        assert_eq!(params.adult_survival_for_age(9), rates[0]);
        assert_eq!(params.adult_survival_for_age(10), rates[0]);
        assert_eq!(params.adult_survival_for_age(12), rates[2]);
        assert_eq!(params.adult_survival_for_age(40), rates[6]);
    }

    #[test]
    fn baby_survival_is_eighth_root() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        let expected = 0.35_f64.powf(1.0 / 8.0);
        assert!((params.baby_survival_month() - expected).abs() < 1e-12);
    }

    #[test]
    fn uniform_litter_sizes_cover_the_range() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        assert_eq!(
            params.litter_size_cdf(),
            &[0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0]
        );
    }

    #[test]
    fn proxy_model_reuses_litter_cdf() {
        let config = ModelConfig {
            litter_size_model: LitterSizeModel::LitterCountProxy,
            ..ModelConfig::default()
        };
        let params = ParameterSet::derive(&config).unwrap();
        assert_eq!(params.litter_size_cdf(), params.litter_cdf().as_slice());
    }

    #[test]
    fn maturity_schedule_must_complete() {
        let config = ModelConfig {
            maturity_by_month: vec![0.0, 0.5, 0.9],
            ..ModelConfig::default()
        };
        assert_eq!(
            ParameterSet::derive(&config).unwrap_err(),
            ParamsError::IncompleteMaturity { last: 0.9 }
        );

        let config = ModelConfig {
            maturity_by_month: vec![0.0, 0.6, 0.4, 1.0],
            ..ModelConfig::default()
        };
        assert_eq!(
            ParameterSet::derive(&config).unwrap_err(),
            ParamsError::DecreasingMaturity { month: 2 }
        );
    }

    #[test]
    fn oversized_litters_are_rejected() {
        let config = ModelConfig {
            litter_size: LitterSizeRange {
                min: 3,
                max: u32::MAX,
            },
            ..ModelConfig::default()
        };
        assert_eq!(
            ParameterSet::derive(&config).unwrap_err(),
            ParamsError::InvalidLitterSize {
                min: 3,
                max: u32::MAX
            }
        );

        let config = ModelConfig {
            litter_size: LitterSizeRange {
                min: 1,
                max: MAX_LITTER_SIZE,
            },
            ..ModelConfig::default()
        };
        let params = ParameterSet::derive(&config).unwrap();
        assert_eq!(params.litter_size_cdf().len(), MAX_LITTER_SIZE as usize + 1);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = ModelConfig {
            exact_threshold: 0,
            ..ModelConfig::default()
        };
        assert_eq!(
            ParameterSet::derive(&config).unwrap_err(),
            ParamsError::InvalidThreshold
        );
    }

    #[test]
    fn litter_per_year_stays_in_scheduled_range() {
        let params = ParameterSet::derive(&ModelConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = [0u32; LITTER_CATEGORIES];
        for _ in 0..5_000 {
            seen[params.litter_per_year(&mut rng)] += 1;
        }
        assert_eq!(seen[0] + seen[1] + seen[2], 0);
        assert!(seen[3..].iter().all(|&count| count > 0));
        // weights 2/10 vs 1/10
        assert!(seen[5] > seen[3]);
    }
}
