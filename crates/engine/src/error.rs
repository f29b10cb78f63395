use std::fmt;

#[derive(Debug)]
pub enum PipelineError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Job validation error (inverted year range, bad header row, etc.).
    ConfigValidation(String),
    /// A required sheet is missing from a source workbook.
    SheetNotFound { source: String, sheet: String },
    /// A required column could not be located in a source header row.
    MissingColumn { source: String, column: String },
    /// No template column resolved to a known field.
    EmptySchema,
    /// IO error reported by the loading layer.
    Io(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "job parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "job validation error: {msg}"),
            Self::SheetNotFound { source, sheet } => {
                write!(f, "source '{source}': sheet '{sheet}' not found")
            }
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::EmptySchema => {
                write!(f, "template header resolved to no known columns")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}
