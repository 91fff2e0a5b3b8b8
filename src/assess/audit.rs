//! Auto-audit aggregation over the accumulated status.

use crate::config::QcThresholds;
use crate::data::SampleTable;

/// Mark rows whose status exceeds the audit threshold.
///
/// `auto_audit` is only ever set to `Some(true)` here; rows at or under
/// the threshold keep `None`, leaving the manual-review fields untouched.
/// Returns the number of rows marked.
pub fn apply_auto_audit(
    table: &mut SampleTable,
    thresholds: &QcThresholds,
    audit_threshold: u32,
) -> usize {
    let mut marked = 0;
    for row in table.rows_mut() {
        if row.status(thresholds) > audit_threshold {
            row.auto_audit = Some(true);
            marked += 1;
        }
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckId;

    fn create_test_table() -> SampleTable {
        SampleTable::from_records(
            vec![
                ("A".to_string(), "a.fastq.gz".to_string(), vec![]),
                ("B".to_string(), "b.fastq.gz".to_string(), vec![]),
                ("C".to_string(), "c.fastq.gz".to_string(), vec![]),
            ],
            &[],
        )
    }

    #[test]
    fn test_marks_rows_over_threshold() {
        let mut table = create_test_table();
        let thresholds = QcThresholds::default();
        table.rows_mut()[1].flag(CheckId::TotalReads);
        table.rows_mut()[2].flag(CheckId::CovMed);

        let marked = apply_auto_audit(&mut table, &thresholds, 0);
        assert_eq!(marked, 2);
        assert_eq!(table.rows()[0].auto_audit, None);
        assert_eq!(table.rows()[1].auto_audit, Some(true));
        assert_eq!(table.rows()[2].auto_audit, Some(true));
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut table = create_test_table();
        let thresholds = QcThresholds::default();
        table.rows_mut()[1].flag(CheckId::TotalReads);

        // Status 1 does not exceed an audit threshold of 1.
        let marked = apply_auto_audit(&mut table, &thresholds, 1);
        assert_eq!(marked, 0);
        assert_eq!(table.rows()[1].auto_audit, None);
    }
}
