//! Record consolidation: one unified record per registry process id.

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};

use crate::aggregate::PeriodMatrix;
use crate::error::PipelineError;
use crate::lookup::{CommitteeLookup, ContractorLookup, RegionLookup};
use crate::model::{MissingManager, ProcessRecord};
use crate::normalize::{cell_cents, clean_id, normalize_header};
use crate::sheet::{CellValue, Grid};

/// Consolidated output plus the informational missing-manager partition.
#[derive(Debug)]
pub struct Consolidation {
    pub records: Vec<ProcessRecord>,
    pub missing_managers: Vec<MissingManager>,
}

struct RegistryColumns {
    id: usize,
    municipality: usize,
    contractor: usize,
    contract_value: usize,
    start: usize,
    end: usize,
    phase: usize,
}

fn locate_columns(grid: &Grid) -> Result<RegistryColumns, PipelineError> {
    let header: Vec<String> = grid
        .row(0)
        .iter()
        .map(|cell| normalize_header(&cell.display()))
        .collect();

    let exact = |names: &[&str]| header.iter().position(|h| names.iter().any(|n| h == n));
    let containing = |fragments: &[&str]| {
        header
            .iter()
            .position(|h| fragments.iter().all(|f| h.contains(f)))
    };
    let missing = |column: &str| PipelineError::MissingColumn {
        source: grid.name.clone(),
        column: column.to_string(),
    };

    Ok(RegistryColumns {
        id: exact(&["PROCESSO SEI", "SEI"]).ok_or_else(|| missing("Processo SEI"))?,
        municipality: containing(&["MUNIC"]).ok_or_else(|| missing("Municipio"))?,
        contractor: exact(&["CONTRATADA"]).ok_or_else(|| missing("Contratada"))?,
        contract_value: containing(&["VALOR", "CONTRATO"])
            .ok_or_else(|| missing("Valor contrato (Atual)"))?,
        start: containing(&["ORDEM"]).ok_or_else(|| missing("Ordem de Início"))?,
        end: containing(&["PRAZO", "FINAL"]).ok_or_else(|| missing("Prazo Final"))?,
        phase: containing(&["FASE"]).ok_or_else(|| missing("Fase"))?,
    })
}

/// Derive one record per registry id. Duplicated ids keep their first
/// occurrence; all derived amounts are rounded (integer cents) at this
/// point, not at render time.
pub fn consolidate(
    registry: &Grid,
    committees: &CommitteeLookup,
    regions: &RegionLookup,
    contractors: &ContractorLookup,
    matrix: &PeriodMatrix,
    periods: &[String],
    final_year_periods: &[String],
) -> Result<Consolidation, PipelineError> {
    let columns = locate_columns(registry)?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    let mut missing_managers = Vec::new();

    for row in 1..registry.row_count() {
        let id = clean_id(&registry.display(row, columns.id));
        if id.is_empty() || !seen.insert(id.clone()) {
            continue;
        }

        let info = committees.get(&id);
        let status = if info.status_override.is_empty() {
            registry.display(row, columns.phase).trim().to_uppercase()
        } else {
            info.status_override.clone()
        };

        let contractor_raw = registry.display(row, columns.contractor).trim().to_string();
        if info.manager.is_empty() {
            missing_managers.push(MissingManager {
                id: id.clone(),
                contractor: contractor_raw.clone(),
            });
        }

        let municipality = registry
            .display(row, columns.municipality)
            .trim()
            .to_string();
        let region = regions.get(&municipality);
        let contractor = contractors.resolve(&contractor_raw);

        let start_date = cell_date(registry.cell(row, columns.start));
        let end_date = cell_date(registry.cell(row, columns.end));
        let duration_days = match (start_date, end_date) {
            (Some(start), Some(end)) => Some((end - start).num_days()),
            _ => None,
        };

        let contract_cents = cell_cents(registry.cell(row, columns.contract_value));

        let mut monthly_cents = BTreeMap::new();
        let mut accumulated_cents = 0i64;
        for period in periods {
            let cents = matrix.amount(&id, period);
            monthly_cents.insert(period.clone(), cents);
            accumulated_cents += cents;
        }
        let final_year_cents = final_year_periods
            .iter()
            .map(|p| monthly_cents.get(p).copied().unwrap_or(0))
            .sum();

        let balance_cents = contract_cents - accumulated_cents;
        let execution_pct = if contract_cents > 0 {
            accumulated_cents as f64 / contract_cents as f64
        } else {
            0.0
        };

        records.push(ProcessRecord {
            seq: 0,
            id,
            category: info.category,
            status,
            manager: info.manager,
            region,
            municipality,
            contractor,
            contract_cents,
            monthly_cents,
            final_year_cents,
            accumulated_cents,
            balance_cents,
            execution_pct,
            start_date,
            end_date,
            duration_days,
        });
    }

    Ok(Consolidation {
        records,
        missing_managers,
    })
}

/// Lenient date reading: real dates pass through, Excel serials convert,
/// text tries the formats seen in the sources, everything else is absent.
fn cell_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(serial) => serial_to_date(*serial),
        CellValue::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    for format in ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }
    None
}

/// 1900-system Excel serial. The 1899-12-30 epoch absorbs Excel's phantom
/// 1900-02-29.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{CommitteeLookup, ContractorLookup, RegionLookup};
    use crate::period::YearRange;
    use crate::scan::HeaderRules;
    use crate::sheet::SourceBook;

    fn text_row(cells: &[&str]) -> Vec<CellValue> {
        cells
            .iter()
            .map(|s| {
                if s.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text((*s).to_string())
                }
            })
            .collect()
    }

    fn registry(rows: Vec<Vec<CellValue>>) -> Grid {
        let mut all = vec![text_row(&[
            "Processo SEI",
            "Municipio",
            "Contratada",
            "Valor contrato (Atual)",
            "Ordem de Início",
            "Prazo Final",
            "Fase",
        ])];
        all.extend(rows);
        Grid::from_rows("ANALITICA", all)
    }

    fn registry_row(
        id: &str,
        municipality: &str,
        contractor: &str,
        value: &str,
        start: &str,
        end: &str,
        phase: &str,
    ) -> Vec<CellValue> {
        text_row(&[id, municipality, contractor, value, start, end, phase])
    }

    fn empty_lookups() -> (CommitteeLookup, RegionLookup, ContractorLookup) {
        (
            CommitteeLookup::default(),
            RegionLookup::default(),
            ContractorLookup::default(),
        )
    }

    fn run(
        grid: &Grid,
        committees: &CommitteeLookup,
        regions: &RegionLookup,
        contractors: &ContractorLookup,
        matrix: &PeriodMatrix,
    ) -> Consolidation {
        let range = YearRange::default();
        consolidate(
            grid,
            committees,
            regions,
            contractors,
            matrix,
            &range.labels(),
            &range.final_year_labels(),
        )
        .unwrap()
    }

    fn matrix_with(id: &str, period: &str, cents: i64) -> PeriodMatrix {
        let grid = Grid::from_rows(
            "BASE",
            vec![
                text_row(&["Processo SEI", "Mês", "Ano", "Valor das medições"]),
                text_row(&[
                    id,
                    &period_month(period).to_string(),
                    &format!("20{}", &period[4..]),
                    &crate::normalize::cents_to_string(cents).replace('.', ","),
                ]),
            ],
        );
        crate::aggregate::build_matrix(&grid).unwrap()
    }

    fn period_month(label: &str) -> u32 {
        1 + crate::period::MONTH_ABBREV
            .iter()
            .position(|m| label.starts_with(m))
            .unwrap() as u32
    }

    #[test]
    fn derives_financials_from_matrix() {
        let grid = registry(vec![registry_row(
            "10",
            "MACAÉ",
            "ALFA",
            "R$ 100.000,00",
            "01/01/2021",
            "31/01/2021",
            "Execução",
        )]);
        let matrix = matrix_with("10", "MAR/21", 2_500_000);
        let (committees, regions, contractors) = empty_lookups();
        let out = run(&grid, &committees, &regions, &contractors, &matrix);

        let record = &out.records[0];
        assert_eq!(record.contract_cents, 10_000_000);
        assert_eq!(record.accumulated_cents, 2_500_000);
        assert_eq!(record.balance_cents, 7_500_000);
        assert!((record.execution_pct - 0.25).abs() < 1e-12);
        assert_eq!(record.status, "EXECUÇÃO");
        assert_eq!(record.duration_days, Some(30));
        assert_eq!(record.monthly_cents.len(), 60);
        assert_eq!(record.monthly_cents["MAR/21"], 2_500_000);
        let sum: i64 = record.monthly_cents.values().sum();
        assert_eq!(record.accumulated_cents, sum);
    }

    #[test]
    fn non_positive_contract_keeps_pct_zero() {
        let grid = registry(vec![registry_row(
            "10", "X", "Y", "0,00", "", "", "Execução",
        )]);
        let matrix = matrix_with("10", "JAN/21", 500);
        let (committees, regions, contractors) = empty_lookups();
        let out = run(&grid, &committees, &regions, &contractors, &matrix);
        let record = &out.records[0];
        assert_eq!(record.execution_pct, 0.0);
        assert_eq!(record.balance_cents, -500);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let grid = registry(vec![
            registry_row("10", "A", "PRIMEIRA", "1,00", "", "", "Execução"),
            registry_row("10", "B", "SEGUNDA", "2,00", "", "", "Paralisada"),
        ]);
        let matrix = PeriodMatrix::default();
        let (committees, regions, contractors) = empty_lookups();
        let out = run(&grid, &committees, &regions, &contractors, &matrix);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].contractor, "PRIMEIRA");
    }

    #[test]
    fn missing_dates_leave_duration_absent() {
        let grid = registry(vec![registry_row(
            "10", "A", "B", "1,00", "01/01/2021", "data a definir", "Execução",
        )]);
        let matrix = PeriodMatrix::default();
        let (committees, regions, contractors) = empty_lookups();
        let out = run(&grid, &committees, &regions, &contractors, &matrix);
        let record = &out.records[0];
        assert_eq!(record.start_date, Some(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()));
        assert_eq!(record.end_date, None);
        assert_eq!(record.duration_days, None);
    }

    #[test]
    fn committee_override_beats_registry_phase() {
        let book = SourceBook {
            sheets: vec![Grid::from_rows(
                "AUXILIAR",
                vec![
                    text_row(&["SEI", "GESTOR", "STATUS", "LOCAL"]),
                    text_row(&["10", "ANA", "#PARALISADA", "ESPECIAIS"]),
                ],
            )],
        };
        let committees = CommitteeLookup::build(&book, &HeaderRules::committee());
        let grid = registry(vec![registry_row(
            "10", "A", "B", "1,00", "", "", "Execução",
        )]);
        let matrix = PeriodMatrix::default();
        let regions = RegionLookup::default();
        let contractors = ContractorLookup::default();
        let out = run(&grid, &committees, &regions, &contractors, &matrix);
        let record = &out.records[0];
        assert_eq!(record.status, "PARALISADA");
        assert_eq!(record.manager, "ANA");
        assert!(out.missing_managers.is_empty());
    }

    #[test]
    fn missing_manager_is_surfaced_not_fatal() {
        let grid = registry(vec![registry_row(
            "10", "A", "CONSTRUTORA X", "1,00", "", "", "Execução",
        )]);
        let matrix = PeriodMatrix::default();
        let (committees, regions, contractors) = empty_lookups();
        let out = run(&grid, &committees, &regions, &contractors, &matrix);
        assert_eq!(out.missing_managers.len(), 1);
        assert_eq!(out.missing_managers[0].id, "10");
        assert_eq!(out.missing_managers[0].contractor, "CONSTRUTORA X");
    }

    #[test]
    fn unmapped_region_and_contractor_pass_through() {
        let grid = registry(vec![registry_row(
            "10",
            "CIDADE IGNOTA",
            "EMPREITEIRA NOVA",
            "1,00",
            "",
            "",
            "Execução",
        )]);
        let matrix = PeriodMatrix::default();
        let (committees, regions, contractors) = empty_lookups();
        let out = run(&grid, &committees, &regions, &contractors, &matrix);
        let record = &out.records[0];
        assert_eq!(record.region, None);
        assert_eq!(record.contractor, "EMPREITEIRA NOVA");
    }

    #[test]
    fn serial_dates_convert() {
        // 44197 = 2021-01-01 in the 1900 date system.
        assert_eq!(
            serial_to_date(44_197.0),
            NaiveDate::from_ymd_opt(2021, 1, 1)
        );
        assert_eq!(serial_to_date(0.0), None);
        assert_eq!(serial_to_date(-3.0), None);
    }

    #[test]
    fn missing_registry_column_is_fatal() {
        let grid = Grid::from_rows(
            "ANALITICA",
            vec![text_row(&["Processo SEI", "Municipio", "Contratada"])],
        );
        let matrix = PeriodMatrix::default();
        let (committees, regions, contractors) = empty_lookups();
        let range = YearRange::default();
        let err = consolidate(
            &grid,
            &committees,
            &regions,
            &contractors,
            &matrix,
            &range.labels(),
            &range.final_year_labels(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }
}
