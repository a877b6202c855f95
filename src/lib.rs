//! Reshapes a daily metrics sheet (metric names down one column, one column
//! per day) into per-day cards and keeps the trailing window anchored on the
//! latest day with data.
//!
//! - `parser`: text → matrix → day columns → cards
//! - `window`: anchor date and trailing window selection
//! - `sheet`: where the raw CSV comes from
//! - `cycle`: one cancellable ingestion cycle and the periodic watch loop

pub mod config;
pub mod cycle;
pub mod error;
pub mod parser;
pub mod sheet;
pub mod window;

pub use config::{AbsenceSource, AuxRange, PipelineConfig};
pub use error::PipelineError;
pub use parser::reduce::{DayCard, Kpis, MetricEntry};
