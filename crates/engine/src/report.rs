//! Per-region workload counts for managers and inspectors.
//!
//! The roster workbook is a stack of region blocks (title row, header row,
//! data rows, TOTAL row). Cells may carry several people separated by "/";
//! each person is counted individually.

use std::collections::BTreeMap;

use crate::scan::{scan_blocks, HeaderRules};
use crate::sheet::SourceBook;

/// Label used when a roster block carries no region title.
pub const NO_REGION: &str = "SEM REGIÃO";

/// Label counted for rows with an empty manager/inspector cell.
pub const UNASSIGNED: &str = "NÃO DEFINIDO";

/// Name → number of works, alphabetically ordered.
pub type Counts = BTreeMap<String, usize>;

#[derive(Debug, Default)]
pub struct Workload {
    pub managers: Counts,
    pub inspectors: Counts,
}

impl Workload {
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty() && self.inspectors.is_empty()
    }
}

/// Workload per region plus the overall totals.
#[derive(Debug, Default)]
pub struct WorkloadReport {
    pub regions: BTreeMap<String, Workload>,
    pub overall: Workload,
}

impl WorkloadReport {
    pub fn build(book: &SourceBook, rules: &HeaderRules) -> Self {
        let mut report = Self::default();

        for grid in &book.sheets {
            for block in scan_blocks(grid, rules) {
                let region = block
                    .section
                    .clone()
                    .unwrap_or_else(|| NO_REGION.to_string());
                let manager_col = block.header.column_containing("GESTOR");
                let inspector_col = block.header.column_containing("FISCAL");

                let bucket = report.regions.entry(region).or_default();
                for &row in &block.rows {
                    if let Some(col) = manager_col {
                        count_names(
                            &grid.display(row, col),
                            &mut bucket.managers,
                            &mut report.overall.managers,
                        );
                    }
                    if let Some(col) = inspector_col {
                        count_names(
                            &grid.display(row, col),
                            &mut bucket.inspectors,
                            &mut report.overall.inspectors,
                        );
                    }
                }
            }
        }

        report
    }

    /// Region labels in render order: alphabetical, the no-region bucket
    /// last.
    pub fn region_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = self
            .regions
            .keys()
            .map(String::as_str)
            .filter(|r| *r != NO_REGION)
            .collect();
        if self.regions.contains_key(NO_REGION) {
            order.push(NO_REGION);
        }
        order
    }
}

/// Split a multi-person cell on "/" and count each person once; an empty
/// cell counts as unassigned.
fn count_names(raw: &str, region_counts: &mut Counts, overall_counts: &mut Counts) {
    let cleaned = raw.trim().to_uppercase();
    let value = if cleaned.is_empty() {
        UNASSIGNED.to_string()
    } else {
        cleaned
    };
    for name in value.split('/') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        *region_counts.entry(name.to_string()).or_insert(0) += 1;
        *overall_counts.entry(name.to_string()).or_insert(0) += 1;
    }
}
