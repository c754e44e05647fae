pub mod counter;
pub mod engine;
pub mod experiments;
pub mod grid;
pub mod params;
pub mod rng;
pub mod sampling;
pub mod scenario;
pub mod snapshot;
pub mod systems;
pub mod world;

pub use counter::BigCount;
pub use engine::{simulate_population, Engine, EngineBuilder, EngineSettings, YearReport};
pub use grid::{Census, Cohort, CohortGrid};
pub use params::{ModelConfig, ParameterSet, ParamsError};
pub use scenario::Scenario;
