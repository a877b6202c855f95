use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use super::dates::DayColumn;
use super::matrix::Matrix;
use super::reduce::{is_absence_row, normalize_name, Layout};
use crate::config::{AbsenceSource, AuxRange};

static ID_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{3,}").unwrap());

/// Source of a day's absence-identifier list.
pub trait AbsenceStrategy: Send + Sync {
    fn absence_ids(&self, matrix: &Matrix, layout: &Layout, day: &DayColumn) -> Vec<String>;
}

/// Reads the value of the last row whose name mentions "legajo" and "inasist".
#[derive(Debug, Clone, Copy, Default)]
pub struct ByMetricName;

impl AbsenceStrategy for ByMetricName {
    fn absence_ids(&self, matrix: &Matrix, layout: &Layout, day: &DayColumn) -> Vec<String> {
        let mut ids = Vec::new();
        for r in layout.data_start..matrix.len() {
            let name = matrix.cell(r, layout.metric_col);
            if name.is_empty() || !is_absence_row(&normalize_name(name)) {
                continue;
            }
            ids = parse_identifier_list(matrix.cell(r, day.col));
        }
        ids
    }
}

/// Scans a fixed block of the sheet, independent of metric names.
#[derive(Debug, Clone, Copy)]
pub struct FixedRange(pub AuxRange);

impl AbsenceStrategy for FixedRange {
    fn absence_ids(&self, matrix: &Matrix, _layout: &Layout, day: &DayColumn) -> Vec<String> {
        if !self.0.contains_col(day.col) {
            return Vec::new();
        }
        let mut ids: Vec<String> = self
            .0
            .row_indices()
            .flat_map(|r| identifier_runs(matrix.cell(r, day.col)))
            .collect();
        sort_ids(&mut ids);
        ids
    }
}

pub fn strategy_for(source: &AbsenceSource) -> Box<dyn AbsenceStrategy> {
    match source {
        AbsenceSource::ByMetricName => Box::new(ByMetricName),
        AbsenceSource::FixedRange(range) => Box::new(FixedRange(*range)),
    }
}

/// Every maximal run of 3+ digits, deduplicated, ascending by numeric value.
pub fn parse_identifier_list(value: &str) -> Vec<String> {
    let mut ids = identifier_runs(value);
    sort_ids(&mut ids);
    ids
}

fn identifier_runs(value: &str) -> Vec<String> {
    ID_RUN_RE
        .find_iter(value)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn sort_ids(ids: &mut Vec<String>) {
    ids.sort_by(|a, b| numeric_cmp(a, b));
    ids.dedup();
}

/// Compares digit strings by value without overflowing on long runs.
fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len()
        .cmp(&tb.len())
        .then_with(|| ta.cmp(tb))
        .then_with(|| a.cmp(b))
}
