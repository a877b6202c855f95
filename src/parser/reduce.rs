use chrono::NaiveDate;
use serde::Serialize;

use super::absences::AbsenceStrategy;
use super::dates::DayColumn;
use super::matrix::Matrix;

/// Shown for a KPI whose row is missing or empty.
pub const PLACEHOLDER: &str = "—";

const LINE_TM: &str = "linea tm";
const LINE_TT: &str = "linea tt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Kpis {
    pub line_tm: String,
    pub line_tt: String,
    /// Deduplicated, ascending by numeric value.
    pub absence_ids: Vec<String>,
}

impl Default for Kpis {
    fn default() -> Self {
        Self {
            line_tm: PLACEHOLDER.to_string(),
            line_tt: PLACEHOLDER.to_string(),
            absence_ids: Vec::new(),
        }
    }
}

/// One day's column reshaped into KPIs plus the visible metric table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCard {
    pub date: NaiveDate,
    pub label: String,
    pub kpis: Kpis,
    pub table: Vec<MetricEntry>,
}

impl DayCard {
    pub fn total(&self) -> usize {
        self.table.len()
    }

    /// Table entries that carry a value.
    pub fn filled_count(&self) -> usize {
        self.table.iter().filter(|m| !m.value.is_empty()).count()
    }
}

/// Where metric names live and where data rows begin (both 0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub metric_col: usize,
    pub data_start: usize,
}

/// Walk the data rows once for `day`, filling the line KPIs and the visible
/// table, then ask `absences` for the identifier list.
pub fn reduce_day(
    matrix: &Matrix,
    layout: &Layout,
    day: &DayColumn,
    absences: &dyn AbsenceStrategy,
) -> DayCard {
    let mut kpis = Kpis::default();
    let mut table = Vec::new();

    for r in layout.data_start..matrix.len() {
        let name = matrix.cell(r, layout.metric_col);
        if name.is_empty() {
            continue;
        }
        let value = matrix.cell(r, day.col);
        let norm = normalize_name(name);

        if norm.contains(LINE_TM) {
            kpis.line_tm = or_placeholder(value);
        }
        if norm.contains(LINE_TT) {
            kpis.line_tt = or_placeholder(value);
        }

        if !is_hidden(&norm) {
            table.push(MetricEntry {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    kpis.absence_ids = absences.absence_ids(matrix, layout, day);

    DayCard {
        date: day.date,
        label: day.label.clone(),
        kpis,
        table,
    }
}

fn or_placeholder(value: &str) -> String {
    if value.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

/// Rows already shown as a KPI stay out of the full table.
pub fn is_hidden(norm: &str) -> bool {
    norm == LINE_TM || norm == LINE_TT || is_absence_row(norm)
}

pub fn is_absence_row(norm: &str) -> bool {
    norm.contains("legajo") && norm.contains("inasist")
}

/// Lower-case, strip diacritics and collapse whitespace runs.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .map(fold_char)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        _ => c,
    }
}
