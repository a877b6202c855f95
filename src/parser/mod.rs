pub mod absences;
pub mod dates;
pub mod matrix;
pub mod reduce;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use reduce::{DayCard, Layout};

/// Four-pass pipeline: text → matrix → day columns → one card per day.
/// Pure; `today` only supplies the year for labels that omit it.
pub fn process_text(
    raw: &str,
    config: &PipelineConfig,
    today: NaiveDate,
) -> Result<Vec<DayCard>, PipelineError> {
    let matrix = matrix::parse(raw)?;

    let header_idx = config.header_idx();
    let header = matrix.row(header_idx).ok_or(PipelineError::InvalidHeaderRow {
        row: config.header_row,
        available: matrix.len(),
    })?;

    let days = dates::classify_header(header, config.metric_idx(), today.year())?;
    debug!(rows = matrix.len(), days = days.len(), "classified header");

    let layout = Layout {
        metric_col: config.metric_idx(),
        data_start: header_idx + 1,
    };
    let absences = absences::strategy_for(&config.absences);

    Ok(days
        .iter()
        .map(|day| reduce::reduce_day(&matrix, &layout, day, absences.as_ref()))
        .collect())
}
