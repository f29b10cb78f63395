// CSV export of consolidated partitions

use std::path::Path;

use medicoes_engine::model::{MissingManager, ProcessRecord};
use medicoes_engine::normalize::cents_to_string;
use medicoes_engine::schema::{Field, OutputSchema};

use crate::template::clean_title;

/// Write one partition as CSV, same columns as the template schema.
/// Multi-line titles flatten to one line; money renders as plain decimals.
pub fn export_partition(
    path: &Path,
    schema: &OutputSchema,
    records: &[ProcessRecord],
) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|e| e.to_string())?;

    let header: Vec<String> = schema
        .columns
        .iter()
        .map(|c| clean_title(&c.title))
        .collect();
    writer.write_record(&header).map_err(|e| e.to_string())?;

    for record in records {
        let row: Vec<String> = schema
            .columns
            .iter()
            .map(|c| field_text(record, &c.field))
            .collect();
        writer.write_record(&row).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())
}

/// Write the missing-manager partition as a two-column CSV.
pub fn export_missing(path: &Path, missing: &[MissingManager]) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|e| e.to_string())?;
    writer
        .write_record(["SEI", "CONTRATADA"])
        .map_err(|e| e.to_string())?;
    for entry in missing {
        writer
            .write_record([entry.id.as_str(), entry.contractor.as_str()])
            .map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

fn field_text(record: &ProcessRecord, field: &Field) -> String {
    match field {
        Field::Seq => record.seq.to_string(),
        Field::Id => record.id.clone(),
        Field::Category => record.category.as_str().to_string(),
        Field::Status => record.status.clone(),
        Field::Manager => record.manager.clone(),
        Field::Region => record
            .region
            .map(|r| r.as_str().to_string())
            .unwrap_or_default(),
        Field::Municipality => record.municipality.clone(),
        Field::Contractor => record.contractor.clone(),
        Field::DurationDays => record
            .duration_days
            .map(|d| d.to_string())
            .unwrap_or_default(),
        Field::StartDate => record
            .start_date
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_default(),
        Field::EndDate => record
            .end_date
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_default(),
        Field::ContractValue => cents_to_string(record.contract_cents),
        Field::FinalYearTotal => cents_to_string(record.final_year_cents),
        Field::Accumulated => cents_to_string(record.accumulated_cents),
        Field::Balance => cents_to_string(record.balance_cents),
        Field::ExecutionPct => format!("{:.4}", record.execution_pct),
        Field::Period(label) => {
            cents_to_string(record.monthly_cents.get(label).copied().unwrap_or(0))
        }
        Field::Unmatched => String::new(),
    }
}
