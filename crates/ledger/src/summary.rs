use serde::Serialize;

use crate::extract::ExtractStats;
use crate::labor::OtLabor;

/// Counters for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub sheets_read: usize,
    pub sheets_skipped: usize,
    pub rows_folded: usize,
    pub rows_skipped: usize,
    pub coerced_fields: usize,
    pub work_orders: usize,
    pub labor_lines: usize,
}

impl BatchSummary {
    /// Account for one successfully folded file.
    pub fn record_file(&mut self, stats: &ExtractStats, rows_folded: usize) {
        self.files_processed += 1;
        self.sheets_read += stats.sheets_read;
        self.sheets_skipped += stats.sheets_skipped;
        self.rows_folded += rows_folded;
        self.rows_skipped += stats.rows_skipped;
        self.coerced_fields += stats.coerced_fields;
    }

    /// Account for a file that was skipped. `stats` holds whatever was
    /// counted before the file was given up on.
    pub fn record_failure(&mut self, stats: &ExtractStats) {
        self.files_failed += 1;
        self.sheets_skipped += stats.sheets_skipped;
        self.rows_skipped += stats.rows_skipped;
    }

    pub fn record_labor(&mut self, work_orders: usize, labor: &[OtLabor]) {
        self.work_orders = work_orders;
        self.labor_lines = labor.iter().map(|l| l.lines.len()).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_accumulate() {
        let mut summary = BatchSummary::default();
        let stats = ExtractStats {
            sheets_read: 2,
            sheets_skipped: 1,
            rows_read: 10,
            rows_skipped: 1,
            coerced_fields: 3,
        };
        summary.record_file(&stats, 9);
        summary.record_file(&stats, 9);
        summary.record_failure(&ExtractStats::default());
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.rows_folded, 18);
        assert_eq!(summary.sheets_skipped, 2);
        assert_eq!(summary.coerced_fields, 6);
    }
}
