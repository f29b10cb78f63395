//! Job configuration: source paths, template, output and period range.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::PipelineError;
use crate::period::YearRange;

#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub sources: Sources,
    pub template: TemplateConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub periods: YearRange,
    #[serde(default)]
    pub labels: LabelConfig,
}

/// The four read-only source workbooks.
#[derive(Debug, Deserialize)]
pub struct Sources {
    /// Transactional ledger of monthly measurements.
    pub ledger: PathBuf,
    /// Master contract registry.
    pub registry: PathBuf,
    /// Auxiliary workbook: region columns, contractor aliases.
    pub auxiliary: PathBuf,
    /// Committee roster, one sheet per category plus the auxiliary sheet.
    pub committees: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct TemplateConfig {
    pub file: PathBuf,
    #[serde(default = "default_template_sheet")]
    pub sheet: String,
    /// 1-based row carrying the column titles. The model workbook keeps
    /// them on row 2.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub file: PathBuf,
    #[serde(default = "default_execution_sheet")]
    pub execution_sheet: String,
    #[serde(default = "default_problems_sheet")]
    pub problems_sheet: String,
    #[serde(default = "default_missing_sheet")]
    pub missing_managers_sheet: String,
}

#[derive(Debug, Deserialize)]
pub struct LabelConfig {
    /// Canonical status meaning "contract active and being paid".
    #[serde(default = "default_execution_status")]
    pub execution_status: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            execution_status: default_execution_status(),
        }
    }
}

fn default_template_sheet() -> String {
    "Medições".to_string()
}

fn default_header_row() -> usize {
    2
}

fn default_execution_sheet() -> String {
    "Medições".to_string()
}

fn default_problems_sheet() -> String {
    "PROBLEMAS".to_string()
}

fn default_missing_sheet() -> String {
    "GESTOR_FALTANTES".to_string()
}

fn default_execution_status() -> String {
    "EXECUÇÃO".to_string()
}

impl JobConfig {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let config: JobConfig =
            toml::from_str(input).map_err(|e| PipelineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.periods.first > self.periods.last {
            return Err(PipelineError::ConfigValidation(format!(
                "period range {}..{} is inverted",
                self.periods.first, self.periods.last
            )));
        }
        if self.template.header_row == 0 {
            return Err(PipelineError::ConfigValidation(
                "template header_row is 1-based".into(),
            ));
        }
        Ok(())
    }
}
