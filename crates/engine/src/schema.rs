//! Output schema resolved from the template header row.
//!
//! The output column set is externally owned: whatever columns the template
//! carries appear in the output, in template order. Header text maps onto
//! internal fields through keyword rules, so a renamed or re-ordered
//! template keeps working without a code change.

use crate::error::PipelineError;
use crate::normalize::normalize_header;
use crate::period::MONTH_ABBREV;

/// Semantic field a template column resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Seq,
    Id,
    Category,
    DurationDays,
    StartDate,
    EndDate,
    ContractValue,
    Status,
    Manager,
    Region,
    Municipality,
    Contractor,
    FinalYearTotal,
    Accumulated,
    ExecutionPct,
    Balance,
    /// A month/year payment column, carrying its normalized label.
    Period(String),
    /// Template column with no matching field; rendered empty.
    Unmatched,
}

/// One output column: the template title verbatim plus its resolved field.
#[derive(Debug, Clone)]
pub struct Column {
    pub title: String,
    pub field: Field,
}

/// Ordered output schema, resolved once at startup and passed explicitly to
/// the consolidation and rendering stages.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub columns: Vec<Column>,
}

impl OutputSchema {
    /// Resolve template header titles. Fails when nothing resolves — an
    /// unreadable template must abort the run before output is written.
    pub fn resolve(titles: &[String]) -> Result<Self, PipelineError> {
        let columns: Vec<Column> = titles
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Column {
                title: t.clone(),
                field: classify(t),
            })
            .collect();
        if columns.iter().all(|c| c.field == Field::Unmatched) {
            return Err(PipelineError::EmptySchema);
        }
        Ok(Self { columns })
    }

    /// Titles of columns that resolved to no field.
    pub fn unmatched_titles(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.field == Field::Unmatched)
            .map(|c| c.title.as_str())
            .collect()
    }
}

/// Keyword rules mapping header text onto fields. Rule order matters: the
/// balance rule must run before the contract-value rule since both mention
/// the contract, and period labels are claimed before everything else.
fn classify(title: &str) -> Field {
    let t = normalize_header(title);
    if let Some(label) = as_period_label(&t) {
        return Field::Period(label);
    }
    match t.as_str() {
        "Nº" | "N°" | "NO" | "NUM" => return Field::Seq,
        "SEI" | "PROCESSO SEI" => return Field::Id,
        "LOCAL" => return Field::Category,
        "STATUS" => return Field::Status,
        _ => {}
    }
    if t.contains("PRAZO") && t.contains("EXEC") {
        return Field::DurationDays;
    }
    if t.contains("ORDEM") {
        return Field::StartDate;
    }
    if t.contains("DATA") && t.contains("FINAL") {
        return Field::EndDate;
    }
    if t.contains("SALDO") {
        return Field::Balance;
    }
    if t.contains("CONTRATO") && (t.contains("VLR") || t.contains("VALOR")) {
        return Field::ContractValue;
    }
    if t.contains("GESTOR") {
        return Field::Manager;
    }
    if t.contains("REGI") {
        return Field::Region;
    }
    if t.contains("MUNIC") {
        return Field::Municipality;
    }
    if t.contains("CONTRATADA") {
        return Field::Contractor;
    }
    if t.contains("MEDI") && t.contains("ACUMULADA") {
        return Field::Accumulated;
    }
    if t.contains("MEDI") && contains_year(&t) {
        return Field::FinalYearTotal;
    }
    if t.contains('%') || t.contains("EXEC") {
        return Field::ExecutionPct;
    }
    Field::Unmatched
}

/// "MAR/21"-style labels: a known month abbreviation, a slash, two digits.
fn as_period_label(normalized: &str) -> Option<String> {
    let (month, year) = normalized.split_once('/')?;
    let month = month.trim();
    let year = year.trim();
    if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !MONTH_ABBREV.contains(&month) {
        return None;
    }
    Some(format!("{}/{}", month, year))
}

fn contains_year(normalized: &str) -> bool {
    normalized
        .split_whitespace()
        .any(|token| token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()))
}
