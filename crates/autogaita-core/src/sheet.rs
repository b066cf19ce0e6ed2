//! Cell-level workbook and CSV I/O.
//!
//! Inputs arrive as `.xlsx` / `.xls` workbooks (read with `calamine`) or as
//! CSV files (read with `csv`). Outputs are written either as one `.xlsx`
//! workbook with one worksheet per [`RawSheet`] (`rust_xlsxwriter`) or as
//! CSV files: a single-sheet table becomes `<stem>.csv`, a multi-sheet
//! table becomes `<stem> - <sheet>.csv`.

use calamine::{open_workbook_auto, Data, Reader};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DataError, GaitError, GaitResult};

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// No value.
    Empty,
    /// A numeric value.
    Number(f64),
    /// Any other content.
    Text(String),
}

impl Cell {
    /// Parse CSV field text into a cell.
    pub fn from_text(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else if let Ok(v) = trimmed.parse::<f64>() {
            Cell::Number(v)
        } else {
            Cell::Text(raw.to_string())
        }
    }

    /// Whether the cell holds nothing (or only whitespace).
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Numeric value, accepting comma decimals in text cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => parse_number(s),
            Cell::Empty => None,
        }
    }

    /// Text rendering; integral numbers print without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            Cell::Number(v) => format!("{v}"),
        }
    }

    fn to_field(&self) -> String {
        match self {
            Cell::Number(v) if v.is_nan() => String::new(),
            Cell::Number(v) => format!("{v}"),
            Cell::Text(s) => s.clone(),
            Cell::Empty => String::new(),
        }
    }
}

/// Parse a number written with either a period or a comma decimal separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>()
        .ok()
        .or_else(|| if s.contains(',') && !s.contains('.') { s.replace(',', ".").parse().ok() } else { None })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(if *b { "True" } else { "False" }.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// RawSheet
// ---------------------------------------------------------------------------

/// A named grid of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    /// Worksheet name (`"Sheet1"` for CSV input).
    pub name: String,
    /// Rows of cells; rows may differ in length.
    pub rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    /// Create a sheet.
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        RawSheet { name: name.into(), rows }
    }

    /// Cell at `(row, col)`, treating missing cells as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&Cell::Empty)
    }

    /// Whether every cell of `row` is empty.
    pub fn row_is_empty(&self, row: usize) -> bool {
        self.rows.get(row).map_or(true, |r| r.iter().all(Cell::is_empty))
    }

    /// Widest row length.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// SheetFormat / naming
// ---------------------------------------------------------------------------

/// On-disk table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// One `.xlsx` workbook per table.
    Xlsx,
    /// One `.csv` file per sheet.
    Csv,
}

impl SheetFormat {
    /// `Xlsx` when `save_to_xls` is set, otherwise `Csv`.
    pub fn from_save_to_xls(save_to_xls: bool) -> Self {
        if save_to_xls { SheetFormat::Xlsx } else { SheetFormat::Csv }
    }
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = stem.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Path of `sheet` of the table at `stem` in `format`.
pub fn sheet_path(stem: &Path, sheet: Option<&str>, format: SheetFormat) -> PathBuf {
    match (format, sheet) {
        (SheetFormat::Xlsx, _) => with_suffix(stem, ".xlsx"),
        (SheetFormat::Csv, None) => with_suffix(stem, ".csv"),
        (SheetFormat::Csv, Some(name)) => with_suffix(stem, &format!(" - {name}.csv")),
    }
}

/// Locate a workbook given its name with or without extension.
///
/// Tries `<base>.xlsx`, `<base>.xls`, then `<base>` itself.
pub fn resolve_workbook(base: &Path) -> Option<PathBuf> {
    [with_suffix(base, ".xlsx"), with_suffix(base, ".xls"), base.to_path_buf()]
        .into_iter()
        .find(|p| p.is_file())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("csv"))
}

/// Read every sheet of a workbook, or the single sheet of a CSV file.
pub fn read_sheets(path: &Path) -> GaitResult<Vec<RawSheet>> {
    if !path.is_file() {
        return Err(DataError::NotFound {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            pattern: format!("`{}`", path.display()),
        }
        .into());
    }
    if is_csv(path) {
        return Ok(vec![read_csv(path)?]);
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| DataError::invalid_format(path, e.to_string()))?;
    let names: Vec<String> = workbook.sheet_names().to_owned();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| DataError::invalid_format(path, e.to_string()))?;
        // calamine crops leading empty rows/columns; restore them so column
        // positions match what a spreadsheet user sees.
        let (row0, col0) = range.start().map_or((0, 0), |(r, c)| (r as usize, c as usize));
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row0];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; col0];
            cells.extend(row.iter().map(cell_from_data));
            rows.push(cells);
        }
        debug!("read sheet `{name}` of {} ({} rows)", path.display(), rows.len());
        sheets.push(RawSheet::new(name, rows));
    }
    Ok(sheets)
}

/// Read the first sheet of a workbook or CSV file.
pub fn read_first_sheet(path: &Path) -> GaitResult<RawSheet> {
    read_sheets(path)?
        .into_iter()
        .next()
        .ok_or_else(|| DataError::invalid_format(path, "workbook has no sheets").into())
}

fn read_csv(path: &Path) -> GaitResult<RawSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }
    Ok(RawSheet::new("Sheet1", rows))
}

/// Read `sheet` of the table at `stem`, whichever format it was written in.
pub fn read_table_sheet(stem: &Path, sheet: Option<&str>) -> GaitResult<RawSheet> {
    let xlsx = sheet_path(stem, sheet, SheetFormat::Xlsx);
    if xlsx.is_file() {
        let sheets = read_sheets(&xlsx)?;
        let found = match sheet {
            Some(name) => sheets.into_iter().find(|s| s.name == name),
            None => sheets.into_iter().next(),
        };
        return found.ok_or_else(|| {
            DataError::invalid_format(&xlsx, format!("no sheet named `{}`", sheet.unwrap_or("")))
                .into()
        });
    }
    let csv = sheet_path(stem, sheet, SheetFormat::Csv);
    if csv.is_file() {
        return read_csv(&csv);
    }
    Err(DataError::NotFound {
        dir: stem.parent().map(Path::to_path_buf).unwrap_or_default(),
        pattern: format!("`{}` (.xlsx or .csv)", stem.display()),
    }
    .into())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `sheets` as the table at `stem`; returns the files written.
pub fn write_table_sheets(
    stem: &Path,
    sheets: &[RawSheet],
    format: SheetFormat,
) -> GaitResult<Vec<PathBuf>> {
    match format {
        SheetFormat::Xlsx => {
            let path = sheet_path(stem, None, format);
            write_xlsx(&path, sheets)?;
            Ok(vec![path])
        }
        SheetFormat::Csv if sheets.len() == 1 => {
            let path = sheet_path(stem, None, format);
            write_csv(&path, &sheets[0])?;
            Ok(vec![path])
        }
        SheetFormat::Csv => sheets
            .iter()
            .map(|sheet| {
                let path = sheet_path(stem, Some(&sheet.name), format);
                write_csv(&path, sheet).map(|_| path)
            })
            .collect(),
    }
}

fn write_csv(path: &Path, sheet: &RawSheet) -> GaitResult<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in &sheet.rows {
        writer.write_record(row.iter().map(Cell::to_field))?;
    }
    writer.flush().map_err(|e| GaitError::io(path, e))?;
    Ok(())
}

fn write_xlsx(path: &Path, sheets: &[RawSheet]) -> GaitResult<()> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name.as_str())?;
        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    // Excel has no NaN; missing values stay blank.
                    Cell::Number(v) if v.is_finite() => {
                        worksheet.write_number(r as u32, c as u16, *v)?;
                    }
                    Cell::Text(s) => {
                        worksheet.write_string(r as u32, c as u16, s.as_str())?;
                    }
                    _ => {}
                }
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_comma_and_period_decimals() {
        assert_eq!(parse_number("1.25"), Some(1.25));
        assert_eq!(parse_number(" 1,25 "), Some(1.25));
        assert_eq!(parse_number("1,250.5"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(15.0).as_text(), "15");
        assert_eq!(Cell::Number(1.5).as_text(), "1.5");
        assert_eq!(Cell::Text(" 7 ".into()).as_text(), "7");
    }

    #[test]
    fn csv_round_trip_keeps_nan_as_blank() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("ID 1 - Standard Devs. Stepcycle");
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![Cell::Text("a".into()), Cell::Text("b".into())],
                vec![Cell::Number(0.1), Cell::Number(f64::NAN)],
            ],
        );
        let written = write_table_sheets(&stem, &[sheet], SheetFormat::Csv).unwrap();
        assert_eq!(written[0].file_name().unwrap(), "ID 1 - Standard Devs. Stepcycle.csv");

        let back = read_table_sheet(&stem, None).unwrap();
        assert_eq!(back.cell(1, 0), &Cell::Number(0.1));
        assert_eq!(back.cell(1, 1), &Cell::Empty);
    }

    #[test]
    fn multi_sheet_csv_uses_sheet_suffix() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("subj - Average Stepcycle");
        let sheets = vec![
            RawSheet::new("left", vec![vec![Cell::Number(1.0)]]),
            RawSheet::new("right", vec![vec![Cell::Number(2.0)]]),
        ];
        write_table_sheets(&stem, &sheets, SheetFormat::Csv).unwrap();
        let right = read_table_sheet(&stem, Some("right")).unwrap();
        assert_eq!(right.cell(0, 0), &Cell::Number(2.0));
        assert!(read_table_sheet(&stem, Some("both")).is_err());
    }

    #[test]
    fn xlsx_round_trip_preserves_sheets() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("book");
        let sheets = vec![
            RawSheet::new(
                "left",
                vec![
                    vec![Cell::Text("Time".into()), Cell::Text("Knee Z".into())],
                    vec![Cell::Number(0.01), Cell::Number(f64::NAN)],
                ],
            ),
            RawSheet::new("right", vec![vec![Cell::Text("x".into())]]),
        ];
        write_table_sheets(&stem, &sheets, SheetFormat::Xlsx).unwrap();
        let left = read_table_sheet(&stem, Some("left")).unwrap();
        assert_eq!(left.cell(0, 1), &Cell::Text("Knee Z".into()));
        assert_eq!(left.cell(1, 0), &Cell::Number(0.01));
        assert!(left.cell(1, 1).is_empty());
    }

    #[test]
    fn resolve_workbook_tries_extensions() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("table.xls"), b"").unwrap();
        let found = resolve_workbook(&dir.path().join("table")).unwrap();
        assert_eq!(found.file_name().unwrap(), "table.xls");
        assert!(resolve_workbook(&dir.path().join("other")).is_none());
    }
}
