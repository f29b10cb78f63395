//! Heterogeneous block scanner for loosely structured sheets.
//!
//! Hand-maintained sheets shift their header rows around, glue several
//! tables into one sheet and close each with a TOTAL row. The scanner walks
//! a sheet row by row, recognizes header rows from a declared rule table and
//! yields the data block that follows each one. Malformed rows are skipped,
//! never fatal.

use std::collections::HashMap;

use crate::normalize::normalize_header;
use crate::sheet::Grid;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Declarative description of what counts as a header row, testable without
/// the scanning loop.
#[derive(Debug, Clone)]
pub struct HeaderRules {
    /// A cell must equal one of these exactly (normalized) for the row to
    /// qualify; the first token with a column also names the identifier
    /// column.
    pub key_tokens: Vec<String>,
    /// At least one cell must contain one of these substrings.
    pub secondary_contains: Vec<String>,
    /// First-cell tokens that mark the title row of a following section.
    pub section_tokens: Vec<String>,
}

impl HeaderRules {
    /// Rules for committee and roster sheets: a process-id column plus a
    /// manager column.
    pub fn committee() -> Self {
        Self {
            key_tokens: vec!["SEI".into(), "PROCESSO SEI".into()],
            secondary_contains: vec!["GESTOR".into()],
            section_tokens: vec![
                "BAIXADA".into(),
                "SUL".into(),
                "NORTE".into(),
                "METROPOLITANA".into(),
                "CENTRO".into(),
            ],
        }
    }

    pub fn is_key_token(&self, normalized: &str) -> bool {
        self.key_tokens.iter().any(|t| t == normalized)
    }

    pub fn is_section_token(&self, normalized: &str) -> bool {
        self.section_tokens.iter().any(|t| t == normalized)
    }

    /// Does a normalized row qualify as a header row?
    pub fn matches_header(&self, cells: &[String]) -> bool {
        let has_key = cells.iter().any(|c| self.is_key_token(c));
        let has_secondary = cells
            .iter()
            .any(|c| self.secondary_contains.iter().any(|s| c.contains(s.as_str())));
        has_key && has_secondary
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Column map built from a recognized header row.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    pub row: usize,
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    /// Leftmost column whose normalized title contains `fragment`.
    pub fn column_containing(&self, fragment: &str) -> Option<usize> {
        self.columns
            .iter()
            .filter(|(name, _)| name.contains(fragment))
            .map(|(_, idx)| *idx)
            .min()
    }
}

/// One extracted data block.
#[derive(Debug)]
pub struct Block {
    pub header: HeaderMap,
    /// Index of the identifier column within the sheet.
    pub id_col: usize,
    /// Sheet row indices of the emitted data rows.
    pub rows: Vec<usize>,
    /// Section title found on the row above the header, when present.
    pub section: Option<String>,
}

/// Scan an entire sheet for header-delimited blocks.
pub fn scan_blocks(grid: &Grid, rules: &HeaderRules) -> Vec<Block> {
    let mut blocks = Vec::new();
    let row_count = grid.row_count();
    let mut i = 0;

    while i < row_count {
        let normalized = normalized_row(grid, i);
        if !rules.matches_header(&normalized) {
            i += 1;
            continue;
        }

        let mut columns = HashMap::new();
        for (idx, name) in normalized.iter().enumerate() {
            if !name.is_empty() {
                columns.entry(name.clone()).or_insert(idx);
            }
        }
        let header = HeaderMap { row: i, columns };
        let Some(id_col) = rules.key_tokens.iter().find_map(|t| header.column(t)) else {
            i += 1;
            continue;
        };

        let section = section_above(grid, i);
        let mut rows = Vec::new();
        let mut j = i + 1;
        while j < row_count {
            let id_val = normalize_header(&grid.display(j, id_col));
            let next_val = normalize_header(&grid.display(j, id_col + 1));
            // Explicit total row closes the block and is not emitted.
            if id_val.is_empty() && next_val.contains("TOTAL") {
                break;
            }
            // A section title after at least one consumed row is the next
            // block's header area masquerading as data.
            let first_val = normalize_header(&grid.display(j, 0));
            if j > i + 1 && rules.is_section_token(&first_val) {
                break;
            }
            if !id_val.is_empty() && !rules.is_key_token(&id_val) && !id_val.contains("TOTAL") {
                rows.push(j);
            }
            j += 1;
        }

        blocks.push(Block {
            header,
            id_col,
            rows,
            section,
        });
        // Resume searching at the terminator row itself; it can never match
        // a header so the scan always advances.
        i = j.max(i + 1);
    }

    blocks
}

fn normalized_row(grid: &Grid, row: usize) -> Vec<String> {
    grid.row(row)
        .iter()
        .map(|cell| normalize_header(&cell.display()))
        .collect()
}

/// First non-empty cell on the row above a header, unless it is itself a
/// total marker.
fn section_above(grid: &Grid, header_row: usize) -> Option<String> {
    let row = header_row.checked_sub(1)?;
    let title = grid
        .row(row)
        .iter()
        .map(|cell| normalize_header(&cell.display()))
        .find(|v| !v.is_empty())?;
    if title.contains("TOTAL") {
        return None;
    }
    Some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{CellValue, Grid};

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

    fn roster_grid() -> Grid {
        Grid::from_rows(
            "NORTE",
            vec![
                text_row(&["BAIXADA", "", ""]),
                text_row(&["", "SEI", "GESTOR(A) ATUANTE", "MUNICIPIO"]),
                text_row(&["", "100", "ANA", "MACAÉ"]),
                text_row(&["", "200", "BIA", "CAMPOS"]),
                text_row(&["", "", "TOTAL", ""]),
                text_row(&["NORTE", "", ""]),
                text_row(&["", "SEI", "GESTOR(A) ATUANTE", "MUNICIPIO"]),
                text_row(&["", "300", "", "ITAPERUNA"]),
            ],
        )
    }

    #[test]
    fn header_rule_matching_is_isolated() {
        let rules = HeaderRules::committee();
        let header = vec!["".to_string(), "SEI".to_string(), "GESTOR(A) ATUANTE".to_string()];
        assert!(rules.matches_header(&header));

        // Key token alone is not enough.
        let no_secondary = vec!["SEI".to_string(), "MUNICIPIO".to_string()];
        assert!(!rules.matches_header(&no_secondary));

        // Secondary alone is not enough either.
        let no_key = vec!["PROCESSO".to_string(), "GESTOR".to_string()];
        assert!(!rules.matches_header(&no_key));
    }

    #[test]
    fn scans_two_blocks_with_sections() {
        let grid = roster_grid();
        let blocks = scan_blocks(&grid, &HeaderRules::committee());
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].section.as_deref(), Some("BAIXADA"));
        assert_eq!(blocks[0].rows, vec![2, 3]);
        assert_eq!(blocks[0].id_col, 1);

        assert_eq!(blocks[1].section.as_deref(), Some("NORTE"));
        assert_eq!(blocks[1].rows, vec![7]);
    }

    #[test]
    fn total_row_terminates_without_emission() {
        let grid = Grid::from_rows(
            "s",
            vec![
                text_row(&["", "SEI", "GESTOR(A) ATUANTE"]),
                text_row(&["", "123", "ANA"]),
                text_row(&["", "", "TOTAL"]),
                text_row(&["", "999", "ZOE"]),
            ],
        );
        let blocks = scan_blocks(&grid, &HeaderRules::committee());
        // Rows after the TOTAL terminator belong to no block: there is no
        // second header row to open one.
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].rows, vec![1]);
    }

    #[test]
    fn repeated_header_token_rows_are_not_data() {
        let grid = Grid::from_rows(
            "s",
            vec![
                text_row(&["SEI", "GESTOR"]),
                text_row(&["SEI", "GESTOR"]),
                text_row(&["7", "ANA"]),
            ],
        );
        let blocks = scan_blocks(&grid, &HeaderRules::committee());
        assert_eq!(blocks[0].rows, vec![2]);
    }

    #[test]
    fn missing_optional_columns_resolve_to_none() {
        let grid = Grid::from_rows(
            "s",
            vec![text_row(&["SEI", "GESTOR"]), text_row(&["1", "ANA"])],
        );
        let blocks = scan_blocks(&grid, &HeaderRules::committee());
        assert_eq!(blocks[0].header.column_containing("FISCAL"), None);
        assert_eq!(blocks[0].header.column_containing("GESTOR"), Some(1));
    }

    #[test]
    fn header_shifted_down_is_found() {
        let grid = Grid::from_rows(
            "s",
            vec![
                text_row(&["RELATÓRIO DE OBRAS", ""]),
                text_row(&["", ""]),
                text_row(&["", "PROCESSO SEI", "GESTOR ATUANTE"]),
                text_row(&["", "42", "CARLA"]),
            ],
        );
        let blocks = scan_blocks(&grid, &HeaderRules::committee());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].header.row, 2);
        assert_eq!(blocks[0].rows, vec![3]);
    }
}
