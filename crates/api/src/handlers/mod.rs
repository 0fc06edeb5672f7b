pub mod builds;
pub mod charts;
pub mod formulas;
