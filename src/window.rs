use chrono::{Days, NaiveDate};

use crate::error::PipelineError;
use crate::parser::reduce::DayCard;

/// Latest card date that is not in the future.
pub fn anchor_date(cards: &[DayCard], today: NaiveDate) -> Option<NaiveDate> {
    cards.iter().map(|c| c.date).filter(|d| *d <= today).max()
}

/// Cards dated within `window_days` before the anchor (inclusive), newest
/// first. Cards sharing a date keep their column order.
pub fn select_window(cards: &[DayCard], window_days: u32, today: NaiveDate) -> Vec<&DayCard> {
    let Some(anchor) = anchor_date(cards, today) else {
        return Vec::new();
    };
    let floor = anchor
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);

    let mut window: Vec<&DayCard> = cards
        .iter()
        .filter(|c| c.date >= floor && c.date <= anchor)
        .collect();
    window.sort_by(|a, b| b.date.cmp(&a.date));
    window
}

/// What the rendering side should show for the current state.
#[derive(Debug)]
pub enum View<'a> {
    /// Windowed cards. `stale` carries the latest failure when these cards
    /// come from an earlier successful cycle.
    Cards {
        cards: Vec<&'a DayCard>,
        stale: Option<&'a PipelineError>,
    },
    /// Data loaded, but no day on or before today.
    NoQualifyingDay,
    /// Nothing loaded yet and the last cycle failed.
    Failed(&'a PipelineError),
    /// No cycle has completed.
    Loading,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::reduce::Kpis;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn card(date: NaiveDate, label: &str) -> DayCard {
        DayCard {
            date,
            label: label.to_string(),
            kpis: Kpis::default(),
            table: Vec::new(),
        }
    }

    fn dates(w: &[&DayCard]) -> Vec<NaiveDate> {
        w.iter().map(|c| c.date).collect()
    }

    #[test]
    fn trailing_week_newest_first() {
        let cards: Vec<DayCard> = (1..=11).map(|day| card(d(2024, 3, day), "")).collect();
        let w = select_window(&cards, 6, d(2024, 3, 10));
        let expected: Vec<NaiveDate> = (4..=10).rev().map(|day| d(2024, 3, day)).collect();
        assert_eq!(dates(&w), expected);
        assert!(w.iter().all(|c| c.date != d(2024, 3, 11)));
    }

    #[test]
    fn anchor_is_true_maximum_not_last_seen() {
        let cards = vec![
            card(d(2024, 3, 8), ""),
            card(d(2024, 3, 12), ""),
            card(d(2024, 3, 2), ""),
        ];
        assert_eq!(anchor_date(&cards, d(2024, 3, 20)), Some(d(2024, 3, 12)));
        let w = select_window(&cards, 6, d(2024, 3, 20));
        assert_eq!(dates(&w), vec![d(2024, 3, 12), d(2024, 3, 8)]);
    }

    #[test]
    fn anchor_lags_behind_today_when_sheet_is_stale() {
        let cards = vec![card(d(2024, 1, 30), ""), card(d(2024, 2, 1), "")];
        let w = select_window(&cards, 1, d(2024, 2, 20));
        assert_eq!(dates(&w), vec![d(2024, 2, 1)]);
    }

    #[test]
    fn only_future_days_is_empty() {
        let cards = vec![card(d(2024, 3, 11), ""), card(d(2024, 3, 12), "")];
        assert!(select_window(&cards, 6, d(2024, 3, 10)).is_empty());
        assert!(select_window(&[], 6, d(2024, 3, 10)).is_empty());
    }

    #[test]
    fn duplicate_dates_keep_column_order() {
        let cards = vec![
            card(d(2024, 3, 9), "a"),
            card(d(2024, 3, 10), "first"),
            card(d(2024, 3, 10), "second"),
        ];
        let w = select_window(&cards, 0, d(2024, 3, 10));
        let labels: Vec<&str> = w.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["first", "second"]);
    }

    #[test]
    fn input_untouched() {
        let cards = vec![card(d(2024, 3, 1), ""), card(d(2024, 3, 3), "")];
        let before = cards.clone();
        let _ = select_window(&cards, 6, d(2024, 3, 3));
        assert_eq!(cards, before);
    }
}
