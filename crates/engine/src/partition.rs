//! Partitioning, ordering and numbering of consolidated records.

use std::collections::HashSet;

use crate::model::ProcessRecord;

/// The two output partitions. Every consolidated record lands in exactly
/// one of them.
#[derive(Debug, Default)]
pub struct Partitioned {
    pub execution: Vec<ProcessRecord>,
    pub other: Vec<ProcessRecord>,
}

/// Split by execution status, dedup each partition by id, order by
/// (category rank, contractor) and renumber from 1.
pub fn partition(records: Vec<ProcessRecord>, execution_status: &str) -> Partitioned {
    let mut split = Partitioned::default();
    for record in records {
        if record.status == execution_status {
            split.execution.push(record);
        } else {
            split.other.push(record);
        }
    }
    for part in [&mut split.execution, &mut split.other] {
        dedup_by_id(part);
        order(part);
        renumber(part);
    }
    split
}

/// Residual duplicates should not exist after consolidation; keep the first.
fn dedup_by_id(records: &mut Vec<ProcessRecord>) {
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.id.clone()));
}

fn order(records: &mut [ProcessRecord]) {
    records.sort_by(|a, b| {
        a.category
            .rank()
            .cmp(&b.category.rank())
            .then_with(|| a.contractor.cmp(&b.contractor))
    });
}

fn renumber(records: &mut [ProcessRecord]) {
    for (idx, record) in records.iter_mut().enumerate() {
        record.seq = idx + 1;
    }
}
