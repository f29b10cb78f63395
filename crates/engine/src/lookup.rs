//! Lookup tables resolved once per run from the auxiliary sources.
//!
//! Each builder is a pure function over loaded grids returning an immutable
//! map; nothing is mutated after construction.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{Category, Region};
use crate::normalize::{clean_id, normalize_header, normalize_name};
use crate::scan::{scan_blocks, HeaderRules};
use crate::sheet::{Grid, SourceBook};

// ---------------------------------------------------------------------------
// Region lookup
// ---------------------------------------------------------------------------

/// Municipality (uppercased) → region code.
#[derive(Debug, Default)]
pub struct RegionLookup {
    map: HashMap<String, Region>,
}

impl RegionLookup {
    /// Column headers carry region names; every non-empty cell below a
    /// recognized header is a municipality of that region. Unrecognized
    /// headers are ignored.
    pub fn build(grid: &Grid) -> Self {
        let mut map = HashMap::new();
        let width = grid.row(0).len();
        for col in 0..width {
            let Some(region) = Region::from_name(&normalize_header(&grid.display(0, col))) else {
                continue;
            };
            for row in 1..grid.row_count() {
                let municipality = grid.display(row, col).trim().to_uppercase();
                if !municipality.is_empty() {
                    map.insert(municipality, region);
                }
            }
        }
        Self { map }
    }

    pub fn get(&self, municipality: &str) -> Option<Region> {
        self.map.get(&municipality.trim().to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Contractor lookup
// ---------------------------------------------------------------------------

/// Normalized contractor name → canonical short alias.
#[derive(Debug, Default)]
pub struct ContractorLookup {
    map: HashMap<String, String>,
}

impl ContractorLookup {
    /// Reads the full-name / alias column pair. Rows missing either value
    /// are skipped; a source without the columns yields an empty lookup.
    pub fn build(grid: &Grid) -> Self {
        let mut full_col = None;
        let mut alias_col = None;
        for (idx, cell) in grid.row(0).iter().enumerate() {
            match normalize_header(&cell.display()).as_str() {
                "CONTRATADA" => full_col.get_or_insert(idx),
                "RESUMIDO" => alias_col.get_or_insert(idx),
                _ => continue,
            };
        }
        let (Some(full_col), Some(alias_col)) = (full_col, alias_col) else {
            return Self::default();
        };

        let mut map = HashMap::new();
        for row in 1..grid.row_count() {
            let full = normalize_name(&grid.display(row, full_col));
            let alias = grid.display(row, alias_col).trim().to_string();
            if full.is_empty() || alias.is_empty() {
                continue;
            }
            map.insert(full, alias);
        }
        Self { map }
    }

    /// Short alias when the name is known, otherwise the raw value trimmed.
    pub fn resolve(&self, raw: &str) -> String {
        self.map
            .get(&normalize_name(raw))
            .cloned()
            .unwrap_or_else(|| raw.trim().to_string())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Committee lookup
// ---------------------------------------------------------------------------

/// Committee info for one process id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitteeInfo {
    pub manager: String,
    /// Status that overrides the registry phase when non-empty.
    pub status_override: String,
    pub category: Category,
}

/// Two category sheets claimed the same id with different categories. The
/// later sheet wins (observed behavior, kept); the conflict is surfaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryConflict {
    pub id: String,
    pub kept: Category,
    pub replaced: Category,
}

/// Process id → committee info, merged from the auxiliary table and the
/// per-category sheets.
#[derive(Debug, Default)]
pub struct CommitteeLookup {
    map: HashMap<String, CommitteeInfo>,
    pub conflicts: Vec<CategoryConflict>,
}

impl CommitteeLookup {
    /// Two-phase merge. Phase A reads the auxiliary sheet keyed by id
    /// (manager, status override, category). Phase B walks every other
    /// sheet: the sheet name declares the category; a new id is inserted
    /// with the sheet's category and manager, an existing id gets its
    /// category overwritten but keeps a non-empty manager.
    pub fn build(book: &SourceBook, rules: &HeaderRules) -> Self {
        let mut lookup = Self::default();

        if let Some(grid) = book.sheet_ignore_case("AUXILIAR") {
            lookup.merge_auxiliary(grid);
        }

        let mut seen_in_sheets: HashSet<String> = HashSet::new();
        for grid in &book.sheets {
            if normalize_header(&grid.name) == "AUXILIAR" {
                continue;
            }
            let category = Category::from_sheet_name(&grid.name);
            lookup.merge_category_sheet(grid, category, rules, &mut seen_in_sheets);
        }

        lookup
    }

    fn merge_auxiliary(&mut self, grid: &Grid) {
        let mut columns: HashMap<String, usize> = HashMap::new();
        for (idx, cell) in grid.row(0).iter().enumerate() {
            let name = normalize_header(&cell.display());
            if !name.is_empty() {
                columns.entry(name).or_insert(idx);
            }
        }
        let Some(&id_col) = columns.get("SEI") else {
            return;
        };
        let manager_col = columns.get("GESTOR").copied();
        let status_col = columns.get("STATUS").copied();
        let category_col = columns.get("LOCAL").copied();

        for row in 1..grid.row_count() {
            let id = clean_id(&grid.display(row, id_col));
            if id.is_empty() {
                continue;
            }
            let manager = manager_col
                .map(|c| grid.display(row, c).trim().to_string())
                .unwrap_or_default();
            let status_override = status_col
                .map(|c| grid.display(row, c).replace('#', "").trim().to_uppercase())
                .unwrap_or_default();
            let category = category_col
                .map(|c| Category::from_label(&grid.display(row, c)))
                .unwrap_or_default();
            self.map.insert(
                id,
                CommitteeInfo {
                    manager,
                    status_override,
                    category,
                },
            );
        }
    }

    fn merge_category_sheet(
        &mut self,
        grid: &Grid,
        category: Category,
        rules: &HeaderRules,
        seen_in_sheets: &mut HashSet<String>,
    ) {
        for block in scan_blocks(grid, rules) {
            let manager_col = block.header.column_containing("GESTOR");
            for &row in &block.rows {
                let id = clean_id(&grid.display(row, block.id_col));
                let manager = manager_col
                    .map(|c| grid.display(row, c).trim().to_string())
                    .unwrap_or_default();

                match self.map.entry(id.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(CommitteeInfo {
                            manager,
                            status_override: String::new(),
                            category,
                        });
                    }
                    Entry::Occupied(mut slot) => {
                        let info = slot.get_mut();
                        if info.category != category && seen_in_sheets.contains(&id) {
                            self.conflicts.push(CategoryConflict {
                                id: id.clone(),
                                kept: category,
                                replaced: info.category,
                            });
                        }
                        info.category = category;
                        if info.manager.is_empty() && !manager.is_empty() {
                            info.manager = manager;
                        }
                    }
                }
                seen_in_sheets.insert(id);
            }
        }
    }

    /// Info for an id; defaults (empty manager, CIVIS) when unknown.
    pub fn get(&self, id: &str) -> CommitteeInfo {
        self.map.get(id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

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

    #[test]
    fn region_lookup_reads_recognized_columns_only() {
        let grid = Grid::from_rows(
            "AUXILIAR",
            vec![
                text_row(&["BAIXADA", "NORTE", "OBSERVAÇÕES"]),
                text_row(&["Duque de Caxias", "Macaé", "ignorar"]),
                text_row(&["Magé", "", ""]),
            ],
        );
        let lookup = RegionLookup::build(&grid);
        assert_eq!(lookup.len(), 3);
        assert_eq!(lookup.get("duque de caxias"), Some(Region::Bx));
        assert_eq!(lookup.get("MACAÉ"), Some(Region::Nt));
        assert_eq!(lookup.get("ignorar"), None);
    }

    #[test]
    fn contractor_lookup_skips_incomplete_rows() {
        let grid = Grid::from_rows(
            "AUXILIAR",
            vec![
                text_row(&["CONTRATADA", "RESUMIDO"]),
                text_row(&["CONSTRUTORA ALFA LTDA.", "ALFA"]),
                text_row(&["SEM ALIAS S/A", ""]),
                text_row(&["", "ORFAO"]),
            ],
        );
        let lookup = ContractorLookup::build(&grid);
        assert_eq!(lookup.len(), 1);
        // Punctuation variants of the full name resolve to the alias.
        assert_eq!(lookup.resolve("Construtora Alfa Ltda"), "ALFA");
        assert_eq!(lookup.resolve("SEM ALIAS S/A"), "SEM ALIAS S/A");
    }

    #[test]
    fn contractor_lookup_without_columns_is_empty() {
        let grid = Grid::from_rows("AUXILIAR", vec![text_row(&["A", "B"])]);
        let lookup = ContractorLookup::build(&grid);
        assert!(lookup.is_empty());
        assert_eq!(lookup.resolve(" raw "), "raw");
    }

    fn committee_book() -> SourceBook {
        let auxiliar = Grid::from_rows(
            "AUXILIAR",
            vec![
                text_row(&["SEI", "GESTOR", "STATUS", "LOCAL"]),
                text_row(&["555", "ANA", "#PARALISADA", ""]),
                text_row(&["700", "", "", "CONTINGENCIA"]),
            ],
        );
        let especiais = Grid::from_rows(
            "ESPECIAIS",
            vec![
                text_row(&["SEI", "GESTOR(A) ATUANTE"]),
                text_row(&["555", ""]),
                text_row(&["800", "BETO"]),
            ],
        );
        let contigencia = Grid::from_rows(
            "CONTIGENCIA",
            vec![
                text_row(&["SEI", "GESTOR ATUANTE"]),
                text_row(&["800", "CAIO"]),
            ],
        );
        SourceBook {
            sheets: vec![auxiliar, especiais, contigencia],
        }
    }

    #[test]
    fn auxiliary_status_wins_category_comes_from_sheet() {
        let lookup = CommitteeLookup::build(&committee_book(), &HeaderRules::committee());
        let info = lookup.get("555");
        assert_eq!(info.manager, "ANA");
        assert_eq!(info.status_override, "PARALISADA");
        assert_eq!(info.category, Category::Especiais);
    }

    #[test]
    fn manager_fills_only_when_empty() {
        let lookup = CommitteeLookup::build(&committee_book(), &HeaderRules::committee());
        // "800" enters via ESPECIAIS with BETO; CONTIGENCIA must not
        // replace the manager, only the category.
        let info = lookup.get("800");
        assert_eq!(info.manager, "BETO");
        assert_eq!(info.category, Category::Contingencia);
    }

    #[test]
    fn category_conflicts_are_surfaced() {
        let lookup = CommitteeLookup::build(&committee_book(), &HeaderRules::committee());
        assert_eq!(lookup.conflicts.len(), 1);
        let conflict = &lookup.conflicts[0];
        assert_eq!(conflict.id, "800");
        assert_eq!(conflict.kept, Category::Contingencia);
        assert_eq!(conflict.replaced, Category::Especiais);
    }

    #[test]
    fn unknown_id_defaults() {
        let lookup = CommitteeLookup::build(&committee_book(), &HeaderRules::committee());
        let info = lookup.get("nope");
        assert_eq!(info.manager, "");
        assert_eq!(info.status_override, "");
        assert_eq!(info.category, Category::Civis);
    }

    #[test]
    fn auxiliary_default_category_is_civis() {
        let lookup = CommitteeLookup::build(&committee_book(), &HeaderRules::committee());
        assert_eq!(lookup.get("700").category, Category::Contingencia);
        // "555" has an empty LOCAL in the auxiliary table; before any
        // category sheet touches it the default is CIVIS. Here ESPECIAIS
        // later overwrote it, so check via a book without that sheet.
        let book = SourceBook {
            sheets: vec![Grid::from_rows(
                "AUXILIAR",
                vec![
                    text_row(&["SEI", "GESTOR", "STATUS", "LOCAL"]),
                    text_row(&["555", "ANA", "", ""]),
                ],
            )],
        };
        let lookup = CommitteeLookup::build(&book, &HeaderRules::committee());
        assert_eq!(lookup.get("555").category, Category::Civis);
    }
}
