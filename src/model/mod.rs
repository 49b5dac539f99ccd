//! Dimensional model: columns, dimensions, measures and rows.

pub mod column;
pub mod cube_map;
pub mod dimension;
pub mod measure;

pub use column::{Aggregation, Column};
pub use cube_map::{as_number, CubeMap, Row, NULL_KEY};
pub use dimension::Dimension;
pub use measure::{
    number_value, round_half_up, Calculator, ColumnCalculator, DivideCalculator, Measure,
};
