use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::error::PipelineError;

// Tried in order; first match wins. Boundaries keep "1/2" from matching inside "11/2/2024".
static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4})-(\d{2})-(\d{2})(?:\D|$)").unwrap());
static DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d/])(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})(?:[^\d/]|$)").unwrap()
});
static DM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d/])(\d{1,2})/(\d{1,2})(?:[^\d/]|$)").unwrap());
// Whole cell only: "Turno 14-22" or "Semana 1-7" are ranges, not days.
static DM_DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})$").unwrap());

/// A column whose header cell encodes a calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayColumn {
    pub col: usize,
    pub date: NaiveDate,
    pub label: String,
}

/// Classify every header cell except `skip_col`. Cells without a date pattern
/// are dropped; a pattern that names an impossible day is an error.
/// Labels without a year take `current_year`.
pub fn classify_header(
    header: &[String],
    skip_col: usize,
    current_year: i32,
) -> Result<Vec<DayColumn>, PipelineError> {
    let mut days = Vec::new();
    for (col, label) in header.iter().enumerate() {
        if col == skip_col {
            continue;
        }
        if let Some(date) = parse_day_label(label, current_year)? {
            days.push(DayColumn {
                col,
                date,
                label: label.clone(),
            });
        }
    }

    if days.is_empty() {
        return Err(PipelineError::NoDateColumns);
    }
    Ok(days)
}

/// `Ok(None)` when the cell is not a day label at all.
pub fn parse_day_label(
    label: &str,
    current_year: i32,
) -> Result<Option<NaiveDate>, PipelineError> {
    let t = label.trim();
    if t.is_empty() {
        return Ok(None);
    }

    if let Some(c) = ISO_RE.captures(t) {
        return build(label, num(&c, 1), num(&c, 2), num(&c, 3)).map(Some);
    }
    if let Some(c) = DMY_RE.captures(t) {
        let raw_year = &c[3];
        let mut year = num(&c, 3);
        if raw_year.len() <= 2 {
            year += 2000;
        }
        return build(label, year, num(&c, 2), num(&c, 1)).map(Some);
    }
    if let Some(c) = DM_RE.captures(t).or_else(|| DM_DASH_RE.captures(t)) {
        return build(label, current_year, num(&c, 2), num(&c, 1)).map(Some);
    }
    Ok(None)
}

fn num(c: &Captures, idx: usize) -> i32 {
    // Capture groups are at most four ASCII digits.
    c[idx].parse().unwrap_or(0)
}

fn build(label: &str, year: i32, month: i32, day: i32) -> Result<NaiveDate, PipelineError> {
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(|| {
        PipelineError::InvalidDate {
            label: label.to_string(),
            reason: format!("day {} of month {} in {} does not exist", day, month, year),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn header(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn iso_inside_text() {
        let got = parse_day_label("Día 2024-03-10 (dom)", 2026).unwrap();
        assert_eq!(got, Some(d(2024, 3, 10)));
    }

    #[test]
    fn day_month_year_forms() {
        assert_eq!(parse_day_label("01/02/2025", 2026).unwrap(), Some(d(2025, 2, 1)));
        assert_eq!(parse_day_label("1/2/25", 2026).unwrap(), Some(d(2025, 2, 1)));
        assert_eq!(parse_day_label("lun 9/3/24", 2026).unwrap(), Some(d(2024, 3, 9)));
    }

    #[test]
    fn day_month_takes_current_year() {
        assert_eq!(parse_day_label("01/02", 2026).unwrap(), Some(d(2026, 2, 1)));
        assert_eq!(parse_day_label("Mar 3/2", 2030).unwrap(), Some(d(2030, 2, 3)));
    }

    #[test]
    fn day_month_dash_form() {
        assert_eq!(parse_day_label("15-03", 2026).unwrap(), Some(d(2026, 3, 15)));
        assert_eq!(parse_day_label(" 1-2 ", 2026).unwrap(), Some(d(2026, 2, 1)));
    }

    #[test]
    fn dashed_ranges_in_text_are_not_days() {
        for cell in ["Semana 1-7", "Turno 14-22", "Lote 3-4 B", "12-13-14"] {
            assert_eq!(parse_day_label(cell, 2026).unwrap(), None, "{cell}");
        }

        let h = header(&["Métrica", "01/02", "Turno 14-22"]);
        let days = classify_header(&h, 0, 2026).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].label, "01/02");
    }

    #[test]
    fn non_date_cells() {
        for cell in ["", "Métrica", "Total", "Semana 12", "1/2/202"] {
            assert_eq!(parse_day_label(cell, 2026).unwrap(), None, "{cell}");
        }
    }

    #[test]
    fn impossible_day_is_an_error() {
        let err = parse_day_label("31/04/2024", 2026).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDate { .. }));
        assert!(parse_day_label("2024-02-30", 2026).is_err());
    }

    #[test]
    fn header_with_invalid_month_fails() {
        let h = header(&["Métrica", "01/02", "02/02", "15/13"]);
        let err = classify_header(&h, 0, 2026).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDate { ref label, .. } if label == "15/13"));

        let days = classify_header(&h[..3], 0, 2026).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!((days[0].col, days[0].date), (1, d(2026, 2, 1)));
        assert_eq!((days[1].col, days[1].date), (2, d(2026, 2, 2)));
    }

    #[test]
    fn metric_column_skipped_even_if_dated() {
        let h = header(&["01/01", "Total", "02/01"]);
        let days = classify_header(&h, 0, 2026).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].col, 2);
        assert_eq!(days[0].label, "02/01");
    }

    #[test]
    fn no_date_columns() {
        let h = header(&["Métrica", "Total", "Notas"]);
        assert_eq!(classify_header(&h, 0, 2026), Err(PipelineError::NoDateColumns));
    }
}
