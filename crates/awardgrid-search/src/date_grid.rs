//! The 7×7 grid of date combinations around a center date.
//!
//! Rows are outbound dates (center −3 to +3 days), columns are return
//! offsets (+1 to +7 days from each outbound). The orchestrator searches a
//! sampled subset; the blocking endpoint reports every cell.

use awardgrid_core::DatePairKey;
use chrono::{Datelike, Duration, NaiveDate};

/// One outbound/return combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCombo {
    pub outbound: NaiveDate,
    pub return_date: NaiveDate,
    /// Short display label, e.g. "Jul 14"
    pub outbound_label: String,
    /// Short display label, e.g. "Jul 18"
    pub return_label: String,
    pub key: DatePairKey,
}

/// The full grid of candidate date combinations.
#[derive(Debug, Clone)]
pub struct DateGrid {
    rows: Vec<Vec<DateCombo>>,
}

impl DateGrid {
    /// Build the grid around a center date.
    #[must_use]
    pub fn around(center: NaiveDate) -> Self {
        let mut rows = Vec::with_capacity(7);
        for outbound_offset in -3i64..=3 {
            let outbound = center + Duration::days(outbound_offset);
            let mut row = Vec::with_capacity(7);
            for return_offset in 1i64..=7 {
                let return_date = outbound + Duration::days(return_offset);
                row.push(DateCombo {
                    outbound,
                    return_date,
                    outbound_label: short_label(outbound),
                    return_label: short_label(return_date),
                    key: DatePairKey::new(outbound, return_date),
                });
            }
            rows.push(row);
        }
        Self { rows }
    }

    /// All rows, outermost by outbound date.
    #[must_use]
    pub fn rows(&self) -> &[Vec<DateCombo>] {
        &self.rows
    }

    /// Iterate every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &DateCombo> {
        self.rows.iter().flatten()
    }

    /// Number of cells in the grid.
    #[must_use]
    pub fn total_cells(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// The sampled subset actually searched: cells where
    /// `(row + col) % stride == 0`. A stride of 1 selects everything.
    #[must_use]
    pub fn sampled(&self, stride: usize) -> Vec<DateCombo> {
        let stride = stride.max(1);
        let mut combos = Vec::new();
        for (row_index, row) in self.rows.iter().enumerate() {
            for (col_index, combo) in row.iter().enumerate() {
                if (row_index + col_index) % stride == 0 {
                    combos.push(combo.clone());
                }
            }
        }
        combos
    }
}

/// "Jul 14"-style label.
fn short_label(date: NaiveDate) -> String {
    format!("{} {}", date.format("%b"), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date")
    }

    #[test]
    fn test_grid_shape() {
        let grid = DateGrid::around(center());
        assert_eq!(grid.rows().len(), 7);
        assert!(grid.rows().iter().all(|row| row.len() == 7));
        assert_eq!(grid.total_cells(), 49);
    }

    #[test]
    fn test_grid_date_ranges() {
        let grid = DateGrid::around(center());

        let first = &grid.rows()[0][0];
        assert_eq!(
            first.outbound,
            NaiveDate::from_ymd_opt(2026, 7, 11).expect("valid date")
        );
        assert_eq!(
            first.return_date,
            NaiveDate::from_ymd_opt(2026, 7, 12).expect("valid date")
        );

        let last = &grid.rows()[6][6];
        assert_eq!(
            last.outbound,
            NaiveDate::from_ymd_opt(2026, 7, 17).expect("valid date")
        );
        assert_eq!(
            last.return_date,
            NaiveDate::from_ymd_opt(2026, 7, 24).expect("valid date")
        );
    }

    #[test]
    fn test_key_and_labels() {
        let grid = DateGrid::around(center());
        let cell = &grid.rows()[3][0];
        assert_eq!(cell.key.as_str(), "2026-07-14-2026-07-15");
        assert_eq!(cell.outbound_label, "Jul 14");
        assert_eq!(cell.return_label, "Jul 15");
    }

    #[test]
    fn test_sampling_counts() {
        let grid = DateGrid::around(center());
        assert_eq!(grid.sampled(1).len(), 49);
        // Diagonal sums 0..=12 divisible by 4: 0, 4, 8, 12.
        assert_eq!(grid.sampled(4).len(), 12);
        // A stride of zero is treated as "no sampling".
        assert_eq!(grid.sampled(0).len(), 49);
    }

    #[test]
    fn test_sampled_keys_are_unique() {
        let grid = DateGrid::around(center());
        let combos = grid.sampled(4);
        let mut keys: Vec<_> = combos.iter().map(|c| c.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), combos.len());
    }
}
