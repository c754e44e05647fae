mod aging;
mod reproduction;

pub use aging::{age_population, AgingSystem};
pub use reproduction::{birth_probability, reproduce, ReproductionSystem};
