//! Configuration module for quarry.
//!
//! Handles settings files, environment variables, and cube definitions.

mod cubes;
mod settings;

pub use cubes::{
    Backend, CalculatorDefinition, ColumnDefinition, CubeDefinition, DimensionDefinition,
    Executors, MeasureDefinition,
};
pub use settings::{
    expand_env_vars, parse_duration, EngineSettings, SearchSettings, Settings, SettingsError,
    SqlSettings, CONFIG_ENV,
};
