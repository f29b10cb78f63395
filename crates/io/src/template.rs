// Output template reading.
//
// Titles come through calamine like any other sheet. Column widths and
// header-cell styling live in layout XML that calamine does not surface, so
// those are pulled straight from the XLSX archive (worksheet XML plus
// xl/styles.xml). Layout reading is best-effort: a template without
// readable layout still yields its titles, and the renderer falls back to
// default widths and header colors.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::xlsx;

/// Visual attributes of one template header cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderStyle {
    /// Solid fill as RGB, when the template sets one.
    pub fill_rgb: Option<u32>,
    pub bold: bool,
    pub font_rgb: Option<u32>,
}

/// Everything the renderer needs from the model workbook.
#[derive(Debug, Default)]
pub struct Template {
    /// Header titles in template order, embedded newlines preserved.
    pub titles: Vec<String>,
    /// Cleaned title → column width.
    pub widths: HashMap<String, f64>,
    /// Cleaned title → header style.
    pub header_styles: HashMap<String, HeaderStyle>,
}

/// Width/style keys flatten newlines and trim, so multi-line titles match
/// their single-line spellings.
pub fn clean_title(title: &str) -> String {
    title.replace('\n', " ").trim().to_string()
}

/// Read the template: titles from the header row (1-based), widths and
/// header styles keyed by cleaned title.
pub fn read(path: &Path, sheet: &str, header_row: usize) -> Result<Template, String> {
    let book = xlsx::import(path)?;
    let grid = book.sheet_ignore_case(sheet).ok_or_else(|| {
        format!("{}: template sheet '{}' not found", path.display(), sheet)
    })?;
    let row = header_row.saturating_sub(1);
    let titles: Vec<String> = grid.row(row).iter().map(|cell| cell.display()).collect();

    let layout = read_layout(path, sheet, header_row).unwrap_or_default();

    let mut widths = HashMap::new();
    let mut header_styles = HashMap::new();
    for (idx, title) in titles.iter().enumerate() {
        let key = clean_title(title);
        if key.is_empty() {
            continue;
        }
        if let Some(width) = layout.widths_by_col.get(&idx) {
            widths.insert(key.clone(), *width);
        }
        if let Some(style) = layout.styles_by_col.get(&idx) {
            header_styles.insert(key, style.clone());
        }
    }

    Ok(Template {
        titles,
        widths,
        header_styles,
    })
}

// ---------------------------------------------------------------------------
// Layout XML
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Layout {
    /// 0-based column → width.
    widths_by_col: HashMap<usize, f64>,
    /// 0-based column → header style.
    styles_by_col: HashMap<usize, HeaderStyle>,
}

fn read_layout(path: &Path, sheet: &str, header_row: usize) -> Option<Layout> {
    let file = File::open(path).ok()?;
    let mut archive = ZipArchive::new(file).ok()?;

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml")?;
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let worksheet_path = resolve_sheet_path(&workbook_xml, &rels_xml, sheet)?;
    let worksheet_xml = read_zip_file(&mut archive, &worksheet_path)?;
    let styles = read_zip_file(&mut archive, "xl/styles.xml")
        .map(|xml| parse_styles(&xml))
        .unwrap_or_default();

    let mut layout = Layout::default();
    parse_worksheet(&worksheet_xml, header_row, &styles, &mut layout);
    Some(layout)
}

fn read_zip_file<R: std::io::Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Option<String> {
    use std::io::Read;
    let mut file = archive.by_name(path).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Resolve a sheet name to its worksheet XML path via workbook.xml and the
/// workbook rels.
fn resolve_sheet_path(workbook_xml: &str, rels_xml: &str, sheet: &str) -> Option<String> {
    let wanted = sheet.trim().to_uppercase();

    // Step 1: sheet name → rId.
    let mut rid = None;
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut id = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"r:id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if let (Some(name), Some(id)) = (name, id) {
                    if name.trim().to_uppercase() == wanted {
                        rid = Some(id);
                        break;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    let rid = rid?;

    // Step 2: rId → target path.
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => target = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rid.as_str()) {
                    return target.map(|t| format!("xl/{}", t.trim_start_matches('/')));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

// ---------------------------------------------------------------------------
// styles.xml
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct FontInfo {
    bold: bool,
    rgb: Option<u32>,
}

#[derive(Debug, Default)]
struct Styles {
    /// Fill index → solid fgColor.
    fills: Vec<Option<u32>>,
    fonts: Vec<FontInfo>,
    /// Cell xf index → (fill index, font index).
    xfs: Vec<(usize, usize)>,
}

impl Styles {
    fn header_style(&self, xf_index: usize) -> Option<HeaderStyle> {
        let &(fill_id, font_id) = self.xfs.get(xf_index)?;
        let font = self.fonts.get(font_id).cloned().unwrap_or_default();
        Some(HeaderStyle {
            fill_rgb: self.fills.get(fill_id).copied().flatten(),
            bold: font.bold,
            font_rgb: font.rgb,
        })
    }
}

#[derive(Debug, PartialEq)]
enum StyleSection {
    None,
    Fonts,
    Fills,
    CellXfs,
}

fn parse_styles(xml: &str) -> Styles {
    let mut styles = Styles::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut section = StyleSection::None;
    let mut current_font: Option<FontInfo> = None;
    let mut current_fill: Option<Option<u32>> = None;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(e) => e,
            Err(_) => break,
        };
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    b"fonts" => section = StyleSection::Fonts,
                    b"fills" => section = StyleSection::Fills,
                    b"cellXfs" => section = StyleSection::CellXfs,
                    b"font" if section == StyleSection::Fonts => {
                        if is_empty {
                            styles.fonts.push(FontInfo::default());
                        } else {
                            current_font = Some(FontInfo::default());
                        }
                    }
                    b"b" => {
                        if let Some(font) = current_font.as_mut() {
                            font.bold = attr_value(e, b"val")
                                .map(|v| v != "0" && v != "false")
                                .unwrap_or(true);
                        }
                    }
                    b"color" => {
                        if let Some(font) = current_font.as_mut() {
                            if let Some(rgb) = attr_rgb(e) {
                                font.rgb = Some(rgb);
                            }
                        }
                    }
                    b"fill" if section == StyleSection::Fills => {
                        if is_empty {
                            styles.fills.push(None);
                        } else {
                            current_fill = Some(None);
                        }
                    }
                    b"fgColor" => {
                        if let Some(fill) = current_fill.as_mut() {
                            if let Some(rgb) = attr_rgb(e) {
                                *fill = Some(rgb);
                            }
                        }
                    }
                    b"xf" if section == StyleSection::CellXfs => {
                        let fill_id = attr_value(e, b"fillId")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        let font_id = attr_value(e, b"fontId")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        styles.xfs.push((fill_id, font_id));
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"fonts" | b"fills" | b"cellXfs" => section = StyleSection::None,
                b"font" => {
                    if let Some(font) = current_font.take() {
                        styles.fonts.push(font);
                    }
                }
                b"fill" => {
                    if let Some(fill) = current_fill.take() {
                        styles.fills.push(fill);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

// ---------------------------------------------------------------------------
// Worksheet XML
// ---------------------------------------------------------------------------

fn parse_worksheet(xml: &str, header_row: usize, styles: &Styles, layout: &mut Layout) {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_header_row = false;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(e) => e,
            Err(_) => break,
        };
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"col" => {
                    let min: Option<usize> = attr_value(e, b"min").and_then(|v| v.parse().ok());
                    let max: Option<usize> = attr_value(e, b"max").and_then(|v| v.parse().ok());
                    let width: Option<f64> = attr_value(e, b"width").and_then(|v| v.parse().ok());
                    if let (Some(min), Some(max), Some(width)) = (min, max, width) {
                        for col in min..=max.min(min + 16_383) {
                            layout.widths_by_col.insert(col.saturating_sub(1), width);
                        }
                    }
                }
                b"row" => {
                    in_header_row = attr_value(e, b"r")
                        .and_then(|v| v.parse::<usize>().ok())
                        .map(|r| r == header_row)
                        .unwrap_or(false);
                }
                b"c" if in_header_row => {
                    let col = attr_value(e, b"r").and_then(|r| col_from_ref(&r));
                    let style_index: Option<usize> =
                        attr_value(e, b"s").and_then(|v| v.parse().ok());
                    if let (Some(col), Some(style_index)) = (col, style_index) {
                        if let Some(style) = styles.header_style(style_index) {
                            layout.styles_by_col.insert(col, style);
                        }
                    }
                }
                _ => {}
            },
            Event::End(ref e) if e.name().as_ref() == b"row" => in_header_row = false,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// ARGB or RGB hex attribute → RGB.
fn attr_rgb(e: &quick_xml::events::BytesStart<'_>) -> Option<u32> {
    let hex = attr_value(e, b"rgb")?;
    u32::from_str_radix(&hex, 16).ok().map(|argb| argb & 0x00FF_FFFF)
}

/// Column index from a cell reference: "B2" → 1.
fn col_from_ref(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut n = 0usize;
    for c in letters.chars() {
        n = n * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(n - 1)
}
