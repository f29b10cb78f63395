//! `medicoes-io` — spreadsheet I/O for the consolidation pipeline.
//!
//! Reads source workbooks into the engine's grid model (calamine), reads
//! the output template (titles via calamine; widths and header styles from
//! the raw XLSX XML, which calamine does not expose) and renders the
//! consolidated workbook (rust_xlsxwriter).

pub mod csv;
pub mod render;
pub mod template;
pub mod xlsx;
