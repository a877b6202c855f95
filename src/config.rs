/// Fixed rectangular block of the sheet scanned for absence identifiers.
/// Bounds are 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxRange {
    pub rows: (usize, usize),
    pub cols: (usize, usize),
}

impl AuxRange {
    pub fn new(rows: (usize, usize), cols: (usize, usize)) -> Self {
        Self { rows, cols }
    }

    /// 0-based inclusive row indices covered by the range.
    pub fn row_indices(&self) -> std::ops::RangeInclusive<usize> {
        let (a, b) = ordered(self.rows);
        a.saturating_sub(1)..=b.saturating_sub(1)
    }

    /// Whether the 0-based column index lies inside the range.
    pub fn contains_col(&self, col: usize) -> bool {
        let (a, b) = ordered(self.cols);
        (a.saturating_sub(1)..=b.saturating_sub(1)).contains(&col)
    }
}

fn ordered((a, b): (usize, usize)) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Where the absence-identifier KPI comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsenceSource {
    /// The row whose metric name mentions "legajo" and "inasist".
    #[default]
    ByMetricName,
    /// A fixed block of the sheet, regardless of metric names.
    FixedRange(AuxRange),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Row holding the day labels (1-based).
    pub header_row: usize,
    /// Column holding the metric names (1-based).
    pub metric_col: usize,
    /// Trailing window size in days, counted back from the anchor date.
    pub window_days: u32,
    pub absences: AbsenceSource,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            header_row: 1,
            metric_col: 1,
            window_days: 6,
            absences: AbsenceSource::ByMetricName,
        }
    }
}

impl PipelineConfig {
    pub fn header_idx(&self) -> usize {
        self.header_row.max(1) - 1
    }

    pub fn metric_idx(&self) -> usize {
        self.metric_col.max(1) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_clamp_to_first() {
        let cfg = PipelineConfig {
            header_row: 0,
            metric_col: 3,
            ..Default::default()
        };
        assert_eq!(cfg.header_idx(), 0);
        assert_eq!(cfg.metric_idx(), 2);
    }

    #[test]
    fn aux_range_bounds() {
        let r = AuxRange::new((10, 12), (2, 4));
        assert_eq!(r.row_indices(), 9..=11);
        assert!(r.contains_col(1));
        assert!(r.contains_col(3));
        assert!(!r.contains_col(0));
        assert!(!r.contains_col(4));
    }

    #[test]
    fn aux_range_swapped_bounds() {
        let r = AuxRange::new((5, 3), (4, 2));
        assert_eq!(r.row_indices(), 2..=4);
        assert!(r.contains_col(2));
    }
}
