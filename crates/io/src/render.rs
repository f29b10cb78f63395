// Consolidated workbook rendering.
//
// Column set and order come from the resolved template schema; the visual
// treatment (accounting number format, category/region fills, template
// header styling and widths) reproduces the model workbook.

use std::path::Path;

use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use medicoes_engine::model::{Category, MissingManager, ProcessRecord, Region};
use medicoes_engine::normalize::cents_to_value;
use medicoes_engine::report::WorkloadReport;
use medicoes_engine::schema::{Field, OutputSchema};

use crate::template::{clean_title, HeaderStyle, Template};

/// Accounting format used by every money column.
const MONEY_FORMAT: &str = "_-R$ * #,##0.00_-;_-R$ * -#,##0.00_-;_-R$ * \"-\"??_-;_-@_-";
const DATE_FORMAT: &str = "DD/MM/YYYY";
const PCT_FORMAT: &str = "0.00%";
const HEADER_FILL: u32 = 0x00E6_E6E6;
const MAX_FALLBACK_WIDTH: f64 = 40.0;

fn category_fill(category: Category) -> u32 {
    match category {
        Category::Civis => 0x00F4_B084,
        Category::Contingencia => 0x00FF_FF99,
        Category::Especiais => 0x00C6_E0B4,
    }
}

fn region_fill(region: Region) -> u32 {
    match region {
        Region::Sl => 0x00C6_EFCE,
        Region::Nt => 0x00D9_D9D9,
        Region::Bx => 0x00FC_E4D6,
        Region::Mt => 0x0000_B0F0,
    }
}

/// Sheet names and template context for one consolidated run.
pub struct RenderOptions<'a> {
    pub schema: &'a OutputSchema,
    pub template: &'a Template,
    pub execution_sheet: &'a str,
    pub problems_sheet: &'a str,
    pub missing_sheet: &'a str,
}

/// Write the consolidated workbook: the execution sheet always, the
/// problems and missing-manager sheets only when they carry rows.
pub fn write_consolidated(
    path: &Path,
    options: &RenderOptions<'_>,
    execution: &[ProcessRecord],
    problems: &[ProcessRecord],
    missing: &[MissingManager],
) -> Result<(), String> {
    let mut workbook = Workbook::new();

    let sheet = add_sheet(&mut workbook, options.execution_sheet)?;
    write_partition(sheet, options, execution)?;

    if !problems.is_empty() {
        let sheet = add_sheet(&mut workbook, options.problems_sheet)?;
        write_partition(sheet, options, problems)?;
    }

    if !missing.is_empty() {
        let sheet = add_sheet(&mut workbook, options.missing_sheet)?;
        write_missing(sheet, missing)?;
    }

    workbook
        .save(path)
        .map_err(|e| format!("failed to save {}: {}", path.display(), e))
}

fn add_sheet<'a>(workbook: &'a mut Workbook, name: &str) -> Result<&'a mut Worksheet, String> {
    workbook
        .add_worksheet()
        .set_name(name)
        .map_err(|e| format!("failed to create sheet '{}': {}", name, e))
}

// ---------------------------------------------------------------------------
// Consolidated partitions
// ---------------------------------------------------------------------------

struct DataFormats {
    text: Format,
    number: Format,
    money: Format,
    date: Format,
    pct: Format,
    category: [Format; 3],
    region: [Format; 4],
}

impl DataFormats {
    fn new() -> Self {
        let base = Format::new().set_border(FormatBorder::Thin);
        Self {
            text: base.clone(),
            number: base.clone(),
            money: base.clone().set_num_format(MONEY_FORMAT),
            date: base.clone().set_num_format(DATE_FORMAT),
            pct: base.clone().set_num_format(PCT_FORMAT),
            category: [
                category_format(Category::Civis),
                category_format(Category::Contingencia),
                category_format(Category::Especiais),
            ],
            region: [
                region_format(Region::Bx),
                region_format(Region::Mt),
                region_format(Region::Sl),
                region_format(Region::Nt),
            ],
        }
    }

    fn for_category(&self, category: Category) -> &Format {
        &self.category[category.rank() as usize]
    }

    fn for_region(&self, region: Region) -> &Format {
        match region {
            Region::Bx => &self.region[0],
            Region::Mt => &self.region[1],
            Region::Sl => &self.region[2],
            Region::Nt => &self.region[3],
        }
    }
}

fn category_format(category: Category) -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_bold()
        .set_background_color(Color::RGB(category_fill(category)))
}

fn region_format(region: Region) -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_background_color(Color::RGB(region_fill(region)))
}

/// Header format: the template's style for this title when it has one, the
/// grey fallback otherwise. Headers always wrap, center and carry borders.
fn header_format(style: Option<&HeaderStyle>) -> Format {
    let mut format = Format::new()
        .set_border(FormatBorder::Thin)
        .set_text_wrap()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    match style {
        Some(style) => {
            format = format.set_background_color(Color::RGB(
                style.fill_rgb.unwrap_or(HEADER_FILL),
            ));
            if style.bold {
                format = format.set_bold();
            }
            if let Some(rgb) = style.font_rgb {
                format = format.set_font_color(Color::RGB(rgb));
            }
        }
        None => {
            format = format.set_background_color(Color::RGB(HEADER_FILL)).set_bold();
        }
    }
    format
}

fn write_partition(
    sheet: &mut Worksheet,
    options: &RenderOptions<'_>,
    records: &[ProcessRecord],
) -> Result<(), String> {
    let schema = options.schema;
    let formats = DataFormats::new();
    let err = |e: rust_xlsxwriter::XlsxError| e.to_string();

    // Track content widths for columns the template does not size.
    let mut max_len: Vec<usize> = schema
        .columns
        .iter()
        .map(|c| clean_title(&c.title).chars().count())
        .collect();

    for (col_idx, column) in schema.columns.iter().enumerate() {
        let style = options.template.header_styles.get(&clean_title(&column.title));
        let format = header_format(style);
        sheet
            .write_string_with_format(0, col_idx as u16, &column.title, &format)
            .map_err(err)?;
    }

    for (row_idx, record) in records.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        for (col_idx, column) in schema.columns.iter().enumerate() {
            let col = col_idx as u16;
            let written = write_field(sheet, row, col, record, &column.field, &formats)?;
            if written > max_len[col_idx] {
                max_len[col_idx] = written;
            }
        }
    }

    for (col_idx, column) in schema.columns.iter().enumerate() {
        let width = options
            .template
            .widths
            .get(&clean_title(&column.title))
            .copied()
            .unwrap_or_else(|| ((max_len[col_idx] + 5) as f64).min(MAX_FALLBACK_WIDTH));
        sheet.set_column_width(col_idx as u16, width).map_err(err)?;
    }

    Ok(())
}

/// Write one field; returns the display length used for fallback widths.
fn write_field(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    record: &ProcessRecord,
    field: &Field,
    formats: &DataFormats,
) -> Result<usize, String> {
    let err = |e: rust_xlsxwriter::XlsxError| e.to_string();
    match field {
        Field::Seq => {
            sheet
                .write_number_with_format(row, col, record.seq as f64, &formats.number)
                .map_err(err)?;
            Ok(record.seq.to_string().len())
        }
        Field::Id => {
            sheet
                .write_string_with_format(row, col, &record.id, &formats.text)
                .map_err(err)?;
            Ok(record.id.chars().count())
        }
        Field::Category => {
            let format = formats.for_category(record.category);
            sheet
                .write_string_with_format(row, col, record.category.as_str(), format)
                .map_err(err)?;
            Ok(record.category.as_str().len())
        }
        Field::Status => {
            sheet
                .write_string_with_format(row, col, &record.status, &formats.text)
                .map_err(err)?;
            Ok(record.status.chars().count())
        }
        Field::Manager => {
            sheet
                .write_string_with_format(row, col, &record.manager, &formats.text)
                .map_err(err)?;
            Ok(record.manager.chars().count())
        }
        Field::Region => {
            match record.region {
                Some(region) => {
                    sheet
                        .write_string_with_format(row, col, region.as_str(), formats.for_region(region))
                        .map_err(err)?;
                }
                None => {
                    sheet.write_blank(row, col, &formats.text).map_err(err)?;
                }
            }
            Ok(2)
        }
        Field::Municipality => {
            sheet
                .write_string_with_format(row, col, &record.municipality, &formats.text)
                .map_err(err)?;
            Ok(record.municipality.chars().count())
        }
        Field::Contractor => {
            sheet
                .write_string_with_format(row, col, &record.contractor, &formats.text)
                .map_err(err)?;
            Ok(record.contractor.chars().count())
        }
        Field::DurationDays => {
            match record.duration_days {
                Some(days) => {
                    sheet
                        .write_number_with_format(row, col, days as f64, &formats.number)
                        .map_err(err)?;
                }
                None => {
                    sheet.write_blank(row, col, &formats.text).map_err(err)?;
                }
            }
            Ok(5)
        }
        Field::StartDate => write_date(sheet, row, col, record.start_date, formats),
        Field::EndDate => write_date(sheet, row, col, record.end_date, formats),
        Field::ContractValue => write_money(sheet, row, col, record.contract_cents, formats),
        Field::FinalYearTotal => write_money(sheet, row, col, record.final_year_cents, formats),
        Field::Accumulated => write_money(sheet, row, col, record.accumulated_cents, formats),
        Field::Balance => write_money(sheet, row, col, record.balance_cents, formats),
        Field::ExecutionPct => {
            sheet
                .write_number_with_format(row, col, record.execution_pct, &formats.pct)
                .map_err(err)?;
            Ok(7)
        }
        Field::Period(label) => {
            let cents = record.monthly_cents.get(label).copied().unwrap_or(0);
            write_money(sheet, row, col, cents, formats)
        }
        Field::Unmatched => {
            sheet.write_blank(row, col, &formats.text).map_err(err)?;
            Ok(0)
        }
    }
}

fn write_money(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cents: i64,
    formats: &DataFormats,
) -> Result<usize, String> {
    sheet
        .write_number_with_format(row, col, cents_to_value(cents), &formats.money)
        .map_err(|e| e.to_string())?;
    // Accounting format pads with the currency symbol.
    Ok(cents.to_string().len() + 4)
}

fn write_date(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    date: Option<NaiveDate>,
    formats: &DataFormats,
) -> Result<usize, String> {
    let err = |e: rust_xlsxwriter::XlsxError| e.to_string();
    match date {
        Some(date) => {
            sheet
                .write_number_with_format(row, col, date_serial(date), &formats.date)
                .map_err(err)?;
        }
        None => {
            sheet.write_blank(row, col, &formats.text).map_err(err)?;
        }
    }
    Ok(10)
}

/// 1900-system serial for a date cell.
fn date_serial(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("fixed epoch");
    (date - epoch).num_days() as f64
}

// ---------------------------------------------------------------------------
// Missing-manager sheet
// ---------------------------------------------------------------------------

fn write_missing(sheet: &mut Worksheet, missing: &[MissingManager]) -> Result<(), String> {
    let err = |e: rust_xlsxwriter::XlsxError| e.to_string();
    let header = header_format(None);
    let cell = Format::new().set_border(FormatBorder::Thin);

    sheet.write_string_with_format(0, 0, "SEI", &header).map_err(err)?;
    sheet
        .write_string_with_format(0, 1, "CONTRATADA", &header)
        .map_err(err)?;

    let mut widths = [5usize, 12usize];
    for (idx, entry) in missing.iter().enumerate() {
        let row = (idx + 1) as u32;
        sheet
            .write_string_with_format(row, 0, &entry.id, &cell)
            .map_err(err)?;
        sheet
            .write_string_with_format(row, 1, &entry.contractor, &cell)
            .map_err(err)?;
        widths[0] = widths[0].max(entry.id.chars().count());
        widths[1] = widths[1].max(entry.contractor.chars().count());
    }
    for (col, width) in widths.iter().enumerate() {
        sheet
            .set_column_width(col as u16, ((*width + 5) as f64).min(MAX_FALLBACK_WIDTH))
            .map_err(err)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Workload report
// ---------------------------------------------------------------------------

/// Render the per-region manager/inspector workload summary: side-by-side
/// tables per region, then the overall table.
pub fn write_workload(path: &Path, report: &WorkloadReport) -> Result<(), String> {
    let err = |e: rust_xlsxwriter::XlsxError| e.to_string();
    let mut workbook = Workbook::new();
    let sheet = add_sheet(&mut workbook, "Resumo Obras")?;

    let border = Format::new().set_border(FormatBorder::Thin);
    let centered = border.clone().set_align(FormatAlign::Center);
    let title = Format::new()
        .set_border(FormatBorder::Thin)
        .set_bold()
        .set_font_size(14.0)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let header = Format::new()
        .set_border(FormatBorder::Thin)
        .set_bold()
        .set_font_size(12.0)
        .set_align(FormatAlign::Center);

    sheet
        .merge_range(0, 0, 1, 6, "RELATÓRIO DE OBRAS POR GESTORES E FISCAIS", &title)
        .map_err(err)?;

    let mut row: u32 = 3;
    for region in report.region_order() {
        let workload = &report.regions[region];
        if workload.is_empty() {
            continue;
        }

        sheet
            .merge_range(row, 0, row, 2, &format!("{} - Obras por FISCAL", region), &header)
            .map_err(err)?;
        sheet
            .merge_range(row, 4, row, 6, &format!("{} - Obras por GESTOR", region), &header)
            .map_err(err)?;
        row += 1;

        let rows = workload.inspectors.len().max(workload.managers.len());
        let mut inspectors = workload.inspectors.iter();
        let mut managers = workload.managers.iter();
        for offset in 0..rows {
            let r = row + offset as u32;
            match inspectors.next() {
                Some((name, count)) => {
                    sheet
                        .write_number_with_format(r, 0, (offset + 1) as f64, &centered)
                        .map_err(err)?;
                    sheet.write_string_with_format(r, 1, name, &border).map_err(err)?;
                    sheet
                        .write_number_with_format(r, 2, *count as f64, &centered)
                        .map_err(err)?;
                }
                None => {
                    for col in 0..3 {
                        sheet.write_blank(r, col, &border).map_err(err)?;
                    }
                }
            }
            match managers.next() {
                Some((name, count)) => {
                    sheet
                        .write_number_with_format(r, 4, (offset + 1) as f64, &centered)
                        .map_err(err)?;
                    sheet.write_string_with_format(r, 5, name, &border).map_err(err)?;
                    sheet
                        .write_number_with_format(r, 6, *count as f64, &centered)
                        .map_err(err)?;
                }
                None => {
                    for col in 4..7 {
                        sheet.write_blank(r, col, &border).map_err(err)?;
                    }
                }
            }
        }
        row += rows as u32 + 3;
    }

    // Overall table, both sides again.
    row += 1;
    sheet.merge_range(row, 0, row, 1, "FISCAL", &header).map_err(err)?;
    sheet.write_string_with_format(row, 2, "OBRAS", &header).map_err(err)?;
    sheet.merge_range(row, 4, row, 5, "GESTOR", &header).map_err(err)?;
    sheet.write_string_with_format(row, 6, "OBRAS", &header).map_err(err)?;
    row += 1;

    let rows = report
        .overall
        .inspectors
        .len()
        .max(report.overall.managers.len());
    let mut inspectors = report.overall.inspectors.iter();
    let mut managers = report.overall.managers.iter();
    for offset in 0..rows {
        let r = row + offset as u32;
        match inspectors.next() {
            Some((name, count)) => {
                sheet.merge_range(r, 0, r, 1, name, &border).map_err(err)?;
                sheet
                    .write_number_with_format(r, 2, *count as f64, &centered)
                    .map_err(err)?;
            }
            None => {
                for col in 0..3 {
                    sheet.write_blank(r, col, &border).map_err(err)?;
                }
            }
        }
        match managers.next() {
            Some((name, count)) => {
                sheet.merge_range(r, 4, r, 5, name, &border).map_err(err)?;
                sheet
                    .write_number_with_format(r, 6, *count as f64, &centered)
                    .map_err(err)?;
            }
            None => {
                for col in 4..7 {
                    sheet.write_blank(r, col, &border).map_err(err)?;
                }
            }
        }
    }

    for (col, width) in [5.0, 45.0, 12.0, 5.0, 5.0, 45.0, 12.0].iter().enumerate() {
        sheet.set_column_width(col as u16, *width).map_err(err)?;
    }

    workbook
        .save(path)
        .map_err(|e| format!("failed to save {}: {}", path.display(), e))
}
