use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Domain enums
// ---------------------------------------------------------------------------

/// Works-contract category ("LOCAL" in the sources).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    Civis,
    Contingencia,
    Especiais,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Civis => "CIVIS",
            Self::Contingencia => "CONTINGENCIA",
            Self::Especiais => "ESPECIAIS",
        }
    }

    /// Output ordering: CIVIS, then CONTINGENCIA, then ESPECIAIS.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Civis => 0,
            Self::Contingencia => 1,
            Self::Especiais => 2,
        }
    }

    /// Category from a cell label. Unrecognized or empty labels fall back to
    /// CIVIS, the default bucket.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "CONTINGENCIA" => Self::Contingencia,
            "ESPECIAIS" => Self::Especiais,
            _ => Self::Civis,
        }
    }

    /// Category a committee sheet declares through its own name. The
    /// contingency sheet is spelled "CONTIGENCIA" in the source workbook and
    /// is matched as-is.
    pub fn from_sheet_name(name: &str) -> Self {
        match name.trim().to_uppercase().as_str() {
            "CONTIGENCIA" => Self::Contingencia,
            "ESPECIAIS" => Self::Especiais,
            _ => Self::Civis,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic grouping, resolved from the municipality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Bx,
    Mt,
    Sl,
    Nt,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bx => "BX",
            Self::Mt => "MT",
            Self::Sl => "SL",
            Self::Nt => "NT",
        }
    }

    /// Static region-name → code table for the auxiliary sheet headers.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "BAIXADA" => Some(Self::Bx),
            "METROPOLITANA" => Some(Self::Mt),
            "SUL FLUMINENSE" => Some(Self::Sl),
            "NORTE" => Some(Self::Nt),
            _ => None,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Consolidated record
// ---------------------------------------------------------------------------

/// One consolidated works record, immutable once derived.
///
/// Amounts are integer cents, so `balance + accumulated == contract` holds
/// exactly and `accumulated` is exactly the sum of the per-period map.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    /// 1-based position within its output partition; 0 until numbered.
    pub seq: usize,
    pub id: String,
    pub category: Category,
    pub status: String,
    pub manager: String,
    pub region: Option<Region>,
    pub municipality: String,
    pub contractor: String,
    pub contract_cents: i64,
    /// Period label → cents, materialized over the full period range.
    /// Chronological order comes from the period list, not from this map.
    pub monthly_cents: BTreeMap<String, i64>,
    pub final_year_cents: i64,
    pub accumulated_cents: i64,
    pub balance_cents: i64,
    /// Ratio (0.25 = 25%); 0 when the contract value is non-positive.
    pub execution_pct: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_days: Option<i64>,
}

/// Registry rows whose committee info carries no manager — surfaced as their
/// own output sheet, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct MissingManager {
    pub id: String,
    pub contractor: String,
}
