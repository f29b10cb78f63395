//! Time-bucketed aggregation of the payments ledger.

use std::collections::{BTreeMap, HashMap};

use crate::error::PipelineError;
use crate::normalize::{cell_cents, clean_id, normalize_header};
use crate::period::{period_label, UNKNOWN_PERIOD};
use crate::sheet::{CellValue, Grid};

/// Process id → period label → summed cents. Sparse: absent periods read as
/// zero, empty periods are never materialized here.
#[derive(Debug, Default)]
pub struct PeriodMatrix {
    cells: HashMap<String, BTreeMap<String, i64>>,
    /// Ledger entries skipped for an unrecognized month or year token.
    pub skipped_entries: usize,
}

impl PeriodMatrix {
    pub fn amount(&self, id: &str, period: &str) -> i64 {
        self.cells
            .get(id)
            .and_then(|periods| periods.get(period))
            .copied()
            .unwrap_or(0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    pub fn id_count(&self) -> usize {
        self.cells.len()
    }
}

struct LedgerColumns {
    id: usize,
    month: usize,
    year: usize,
    amount: usize,
}

/// Locate the ledger columns from the header row.
fn locate_columns(grid: &Grid) -> Result<LedgerColumns, PipelineError> {
    let header: Vec<String> = grid
        .row(0)
        .iter()
        .map(|cell| normalize_header(&cell.display()))
        .collect();

    let exact = |names: &[&str]| {
        header
            .iter()
            .position(|h| names.iter().any(|n| h == n))
    };
    let containing = |fragment: &str| header.iter().position(|h| h.contains(fragment));

    let missing = |column: &str| PipelineError::MissingColumn {
        source: grid.name.clone(),
        column: column.to_string(),
    };

    Ok(LedgerColumns {
        id: exact(&["PROCESSO SEI", "SEI"]).ok_or_else(|| missing("Processo SEI"))?,
        month: exact(&["MÊS", "MES"]).ok_or_else(|| missing("Mês"))?,
        year: exact(&["ANO"]).ok_or_else(|| missing("Ano"))?,
        amount: containing("VALOR").ok_or_else(|| missing("Valor das medições"))?,
    })
}

/// Build the matrix: normalize id, parse amount, bucket by period, sum.
/// Entries with an unusable month or year are counted and skipped.
pub fn build_matrix(grid: &Grid) -> Result<PeriodMatrix, PipelineError> {
    let columns = locate_columns(grid)?;
    let mut matrix = PeriodMatrix::default();

    for row in 1..grid.row_count() {
        let id = clean_id(&grid.display(row, columns.id));
        if id.is_empty() {
            continue;
        }
        let month = cell_int(grid.cell(row, columns.month));
        let year = cell_int(grid.cell(row, columns.year));
        let label = match (month, year) {
            (Some(m), Some(y)) if m >= 0 => period_label(m as u32, y as i32),
            _ => UNKNOWN_PERIOD.to_string(),
        };
        if label == UNKNOWN_PERIOD {
            matrix.skipped_entries += 1;
            continue;
        }
        let cents = cell_cents(grid.cell(row, columns.amount));
        *matrix
            .cells
            .entry(id)
            .or_default()
            .entry(label)
            .or_insert(0) += cents;
    }

    Ok(matrix)
}

fn cell_int(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(rows: Vec<Vec<CellValue>>) -> Grid {
        let mut all = vec![vec![
            CellValue::Text("Processo SEI".into()),
            CellValue::Text("Mês".into()),
            CellValue::Text("Ano".into()),
            CellValue::Text("Valor das medições".into()),
        ]];
        all.extend(rows);
        Grid::from_rows("BASE", all)
    }

    fn entry(id: &str, month: f64, year: f64, amount: &str) -> Vec<CellValue> {
        vec![
            CellValue::Text(id.into()),
            CellValue::Number(month),
            CellValue::Number(year),
            CellValue::Text(amount.into()),
        ]
    }

    #[test]
    fn buckets_and_sums_by_period() {
        let grid = ledger(vec![
            entry("123", 3.0, 2021.0, "1.234,56"),
            entry("123", 3.0, 2021.0, "100,00"),
            entry("123", 4.0, 2021.0, "50,00"),
            entry("999", 3.0, 2021.0, "1,00"),
        ]);
        let matrix = build_matrix(&grid).unwrap();
        assert_eq!(matrix.amount("123", "MAR/21"), 133_456);
        assert_eq!(matrix.amount("123", "ABR/21"), 5_000);
        assert_eq!(matrix.amount("999", "MAR/21"), 100);
        assert_eq!(matrix.id_count(), 2);
    }

    #[test]
    fn ledger_scenario_from_locale_text() {
        let grid = ledger(vec![entry("123", 3.0, 2021.0, "1.234,56")]);
        let matrix = build_matrix(&grid).unwrap();
        assert_eq!(matrix.amount("123", "MAR/21"), 123_456);
    }

    #[test]
    fn absent_periods_read_as_zero() {
        let grid = ledger(vec![entry("123", 3.0, 2021.0, "10,00")]);
        let matrix = build_matrix(&grid).unwrap();
        assert_eq!(matrix.amount("123", "JAN/21"), 0);
        assert_eq!(matrix.amount("777", "MAR/21"), 0);
        assert!(!matrix.contains("777"));
    }

    #[test]
    fn bad_month_is_skipped_and_counted() {
        let grid = ledger(vec![
            entry("123", 13.0, 2021.0, "10,00"),
            entry("123", 3.0, 2021.0, "10,00"),
        ]);
        let matrix = build_matrix(&grid).unwrap();
        assert_eq!(matrix.skipped_entries, 1);
        assert_eq!(matrix.amount("123", "MAR/21"), 1_000);
    }

    #[test]
    fn unparseable_amount_counts_as_zero() {
        let grid = ledger(vec![entry("5", 1.0, 2022.0, "a combinar")]);
        let matrix = build_matrix(&grid).unwrap();
        assert_eq!(matrix.amount("5", "JAN/22"), 0);
        assert!(matrix.contains("5"));
    }

    #[test]
    fn missing_column_is_fatal() {
        let grid = Grid::from_rows(
            "BASE",
            vec![vec![
                CellValue::Text("Processo SEI".into()),
                CellValue::Text("Ano".into()),
            ]],
        );
        let err = build_matrix(&grid).unwrap_err();
        assert!(err.to_string().contains("Mês"));
    }

    #[test]
    fn numeric_id_cells_join_text_ids() {
        let mut rows = vec![entry("321", 2.0, 2023.0, "5,00")];
        rows.push(vec![
            CellValue::Number(321.0),
            CellValue::Number(2.0),
            CellValue::Number(2023.0),
            CellValue::Number(5.0),
        ]);
        let matrix = build_matrix(&ledger(rows)).unwrap();
        assert_eq!(matrix.amount("321", "FEV/23"), 1_000);
        assert_eq!(matrix.id_count(), 1);
    }
}
