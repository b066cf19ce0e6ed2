//! Result tables on disk.
//!
//! Every subject gets four tables in its results directory:
//!
//! | File | Content |
//! |---|---|
//! | `<ID> - Original Stepcycles` | cycles at their original length |
//! | `<ID> - Normalised Stepcycles` | cycles resampled to `bin_num` rows |
//! | `<ID> - Average Stepcycle` | per-bin mean over cycles |
//! | `<ID> - Standard Devs. Stepcycle` | per-bin standard deviation |
//!
//! Step tables are rendered with three separator rows between cycles `k`
//! and `k + 1`: an empty row, a row holding `k` in every numeric column, and
//! another empty row. [`parse_step_table`] removes them again.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregate::{mean_of_tables, Cycle, StepTable, Summary};
use crate::error::{DataError, GaitError, GaitResult};
use crate::joint::{neutral_column, Side};
use crate::sheet::{read_table_sheet, write_table_sheets, Cell, RawSheet, SheetFormat};
use crate::table::{is_flag_column, Table, LEG, TIME};

/// Sheet name of single-sheet (2D) workbooks.
pub const DEFAULT_SHEET: &str = "Sheet1";
/// Sheet name of the combined 3D tables.
pub const BOTH_SHEET: &str = "both";

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// The four per-subject result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Cycles at original length.
    Original,
    /// Cycles resampled to `bin_num` rows.
    Normalised,
    /// Per-bin mean.
    Average,
    /// Per-bin standard deviation.
    Std,
}

impl ResultKind {
    /// All kinds in output order.
    pub const ALL: [ResultKind; 4] =
        [ResultKind::Original, ResultKind::Normalised, ResultKind::Average, ResultKind::Std];

    /// Suffix after `"<ID> - "`.
    pub fn suffix(self) -> &'static str {
        match self {
            ResultKind::Original => "Original Stepcycles",
            ResultKind::Normalised => "Normalised Stepcycles",
            ResultKind::Average => "Average Stepcycle",
            ResultKind::Std => "Standard Devs. Stepcycle",
        }
    }

    /// Path stem (without extension) of this table for subject `name`.
    pub fn stem(self, dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name} - {}", self.suffix()))
    }
}

// ---------------------------------------------------------------------------
// Subject tables
// ---------------------------------------------------------------------------

/// The tables of one output sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTables {
    /// Sheet name (`"Sheet1"`, `"left"`, `"right"` or `"both"`).
    pub sheet: String,
    /// Cycles at original length.
    pub original: StepTable,
    /// Normalised cycles.
    pub normalised: StepTable,
    /// Per-bin mean and standard deviation.
    pub summary: Summary,
}

/// All result tables of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectTables {
    /// One entry per output sheet, in sheet order.
    pub sheets: Vec<SheetTables>,
}

impl SubjectTables {
    /// Tables of `sheet`, if present.
    pub fn sheet(&self, sheet: &str) -> Option<&SheetTables> {
        self.sheets.iter().find(|s| s.sheet == sheet)
    }
}

/// Combine per-side tables into the `both` sheet.
///
/// Column names lose their bodyside qualifier. Step tables are concatenated
/// left then right, with `Leg` labelling each cycle; average and standard
/// deviation are the per-bin mean over the sides present.
pub fn combine_sides(sides: &[&SheetTables]) -> GaitResult<SheetTables> {
    let neutral = |step: &StepTable, leg: Option<Side>| {
        let mut s = step.clone();
        s.rename_columns(neutral_column);
        if let Some(leg) = leg {
            s.set_leg(leg);
        }
        s
    };
    let leg_of = |t: &SheetTables| Side::parse(&t.sheet);
    let neutral_table = |t: &Table| {
        let mut t = t.clone();
        t.rename_columns(neutral_column);
        t
    };

    let original = StepTable::concat(sides.iter().map(|&t| neutral(&t.original, leg_of(t))).collect());
    let normalised =
        StepTable::concat(sides.iter().map(|&t| neutral(&t.normalised, leg_of(t))).collect());
    let averages: Vec<Table> = sides.iter().map(|t| neutral_table(&t.summary.average)).collect();
    let stds: Vec<Table> = sides.iter().map(|t| neutral_table(&t.summary.std)).collect();
    Ok(SheetTables {
        sheet: BOTH_SHEET.to_string(),
        original,
        normalised,
        summary: Summary { average: mean_of_tables(&averages)?, std: mean_of_tables(&stds)? },
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub(crate) fn text(s: &str) -> Cell {
    Cell::Text(s.to_string())
}

pub(crate) fn value_cell(column: &str, v: f64) -> Cell {
    if is_flag_column(column) {
        if v.is_nan() {
            Cell::Empty
        } else {
            text(if v != 0.0 { "True" } else { "False" })
        }
    } else {
        Cell::Number(v)
    }
}

/// Output column order: `Time` first, then `Leg` when present, then the rest.
fn ordered_columns(columns: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = columns.iter().filter(|c| *c == TIME).cloned().collect();
    ordered.extend(columns.iter().filter(|c| *c != TIME).cloned());
    ordered
}

/// Render a step table with its separator rows.
pub fn render_step_table(step: &StepTable, sheet: &str) -> RawSheet {
    let columns = ordered_columns(step.columns());
    let leg_at = step
        .has_legs()
        .then(|| usize::from(columns.first().map_or(false, |c| c == TIME)));
    let mut header: Vec<Cell> = columns.iter().map(|c| text(c)).collect();
    if let Some(at) = leg_at {
        header.insert(at, text(LEG));
    }

    let mut rows = vec![header];
    let last = step.len().saturating_sub(1);
    for (k, cycle) in step.cycles().iter().enumerate() {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| cycle.table.index_of(c)).collect();
        for r in 0..cycle.table.n_rows() {
            let mut row: Vec<Cell> = columns
                .iter()
                .zip(&indices)
                .map(|(c, i)| value_cell(c, i.map_or(f64::NAN, |i| cycle.table.values()[[r, i]])))
                .collect();
            if let Some(at) = leg_at {
                row.insert(at, cycle.leg.map_or(Cell::Empty, |l| text(l.as_str())));
            }
            rows.push(row);
        }
        if k < last {
            let width = columns.len() + usize::from(leg_at.is_some());
            let blank = vec![Cell::Empty; width];
            let mut marker = vec![Cell::Number((k + 1) as f64); width];
            if let Some(at) = leg_at {
                marker[at] = Cell::Empty;
            }
            rows.push(blank.clone());
            rows.push(marker);
            rows.push(blank);
        }
    }
    RawSheet::new(sheet, rows)
}

/// Render a plain table (average/std) with a header row.
pub fn render_table(table: &Table, sheet: &str) -> RawSheet {
    let mut rows = vec![table.columns().iter().map(|c| text(c)).collect::<Vec<_>>()];
    for r in 0..table.n_rows() {
        rows.push(
            table.columns().iter().enumerate().map(|(c, name)| value_cell(name, table.values()[[r, c]])).collect(),
        );
    }
    RawSheet::new(sheet, rows)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn numeric(path: &str, cell: &Cell, row: usize, column: &str) -> GaitResult<f64> {
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    if is_flag_column(column) {
        match cell.as_text().to_lowercase().as_str() {
            "true" => return Ok(1.0),
            "false" => return Ok(0.0),
            _ => {}
        }
    }
    cell.as_f64().ok_or_else(|| {
        DataError::Malformed {
            path: PathBuf::from(path),
            row: row + 1,
            column: column.to_string(),
            value: cell.as_text(),
        }
        .into()
    })
}

/// Parse a rendered plain table. Text columns in `skip` are ignored.
pub fn parse_table(sheet: &RawSheet, skip: &[&str]) -> GaitResult<Table> {
    let header: Vec<String> = (0..sheet.width()).map(|c| sheet.cell(0, c).as_text()).collect();
    let keep: Vec<usize> =
        (0..header.len()).filter(|&c| !header[c].is_empty() && !skip.contains(&header[c].as_str())).collect();
    let mut data: Vec<(String, Vec<f64>)> = keep.iter().map(|&c| (header[c].clone(), Vec::new())).collect();
    for r in 1..sheet.rows.len() {
        for (&c, (name, values)) in keep.iter().zip(data.iter_mut()) {
            values.push(numeric(&sheet.name, sheet.cell(r, c), r, name)?);
        }
    }
    Table::from_columns(data)
}

fn is_blank(row: &[f64]) -> bool {
    row.iter().all(|v| v.is_nan())
}

fn is_marker(row: &[f64]) -> bool {
    let mut finite = row.iter().filter(|v| !v.is_nan());
    match finite.next() {
        Some(first) => finite.all(|v| v == first),
        None => false,
    }
}

/// Parse a rendered step table back into cycles.
pub fn parse_step_table(sheet: &RawSheet) -> GaitResult<StepTable> {
    let leg_col = (0..sheet.width()).find(|&c| sheet.cell(0, c).as_text() == LEG);
    let table = parse_table(sheet, &[LEG])?;
    let n = table.n_rows();
    let rows: Vec<Vec<f64>> = table.values().rows().into_iter().map(|r| r.to_vec()).collect();
    let leg_of = |r: usize| leg_col.and_then(|c| Side::parse(&sheet.cell(r + 1, c).as_text()));

    let mut cycles = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut r = 0;
    while r < n {
        let separator =
            r + 2 < n && is_blank(&rows[r]) && is_marker(&rows[r + 1]) && is_blank(&rows[r + 2]);
        if separator {
            if !current.is_empty() {
                cycles.push(std::mem::take(&mut current));
            }
            r += 3;
        } else if is_blank(&rows[r]) && r + 1 == n {
            r += 1;
        } else {
            current.push(r);
            r += 1;
        }
    }
    if !current.is_empty() {
        cycles.push(current);
    }

    let cycles = cycles
        .into_iter()
        .map(|rows| Cycle { leg: leg_of(rows[0]), table: table.select_rows(&rows) })
        .collect();
    Ok(StepTable::new(cycles))
}

// ---------------------------------------------------------------------------
// Writing / reading subject results
// ---------------------------------------------------------------------------

/// Write the four result tables of `name` into `dir`.
pub fn export_subject(
    dir: &Path,
    name: &str,
    tables: &SubjectTables,
    format: SheetFormat,
) -> GaitResult<Vec<PathBuf>> {
    if tables.sheets.is_empty() {
        return Err(GaitError::bug("no result sheets to export"));
    }
    let mut written = Vec::new();
    for kind in ResultKind::ALL {
        let sheets: Vec<RawSheet> = tables
            .sheets
            .iter()
            .map(|t| match kind {
                ResultKind::Original => render_step_table(&t.original, &t.sheet),
                ResultKind::Normalised => render_step_table(&t.normalised, &t.sheet),
                ResultKind::Average => render_table(&t.summary.average, &t.sheet),
                ResultKind::Std => render_table(&t.summary.std, &t.sheet),
            })
            .collect();
        written.extend(write_table_sheets(&kind.stem(dir, name), &sheets, format)?);
    }
    info!("wrote {} result files for {name} to {}", written.len(), dir.display());
    Ok(written)
}

fn sheet_arg(sheet: Option<&str>) -> Option<&str> {
    sheet.filter(|s| *s != DEFAULT_SHEET)
}

/// Read a subject's step table (`Original` or `Normalised`).
pub fn read_step_table(dir: &Path, name: &str, kind: ResultKind, sheet: Option<&str>) -> GaitResult<StepTable> {
    parse_step_table(&read_table_sheet(&kind.stem(dir, name), sheet_arg(sheet))?)
}

/// Read a subject's summary table (`Average` or `Std`).
pub fn read_summary_table(dir: &Path, name: &str, kind: ResultKind, sheet: Option<&str>) -> GaitResult<Table> {
    parse_table(&read_table_sheet(&kind.stem(dir, name), sheet_arg(sheet))?, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::summarise;
    use crate::table::FLIPPED;
    use tempfile::tempdir;

    fn cycle(start: f64, n: usize) -> Table {
        Table::from_columns(vec![
            ("Hip y".into(), (0..n).map(|i| start + i as f64).collect()),
            (TIME.into(), (0..n).map(|i| i as f64 / 100.0).collect()),
            (FLIPPED.into(), vec![1.0; n]),
        ])
        .unwrap()
    }

    #[test]
    fn renders_separators_between_cycles() {
        let step = StepTable::new(vec![Cycle::new(cycle(0.0, 2)), Cycle::new(cycle(5.0, 2))]);
        let sheet = render_step_table(&step, DEFAULT_SHEET);
        assert_eq!(sheet.cell(0, 0), &Cell::Text(TIME.into()));
        assert_eq!(sheet.rows.len(), 1 + 2 + 3 + 2);
        assert!(sheet.row_is_empty(3));
        assert_eq!(sheet.cell(4, 1), &Cell::Number(1.0));
        assert!(sheet.row_is_empty(5));
        assert_eq!(sheet.cell(1, 2), &Cell::Text("True".into()));
    }

    #[test]
    fn parse_inverts_render() {
        let step = StepTable::new(vec![
            Cycle::with_leg(cycle(0.0, 3), Side::Left),
            Cycle::with_leg(cycle(5.0, 3), Side::Left),
            Cycle::with_leg(cycle(9.0, 3), Side::Right),
        ]);
        let sheet = render_step_table(&step, "both");
        assert_eq!(sheet.cell(0, 1), &Cell::Text(LEG.into()));
        let back = parse_step_table(&sheet).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.cycles()[2].leg, Some(Side::Right));
        assert_eq!(back.cycles()[1].table.column("Hip y").unwrap().to_vec(), vec![5.0, 6.0, 7.0]);
        assert_eq!(back.cycles()[0].table.column(FLIPPED).unwrap()[0], 1.0);
    }

    #[test]
    fn csv_round_trip_recomputes_summary() {
        let dir = tempdir().unwrap();
        let normalised = StepTable::new(vec![Cycle::new(cycle(0.0, 4)), Cycle::new(cycle(2.0, 4))]);
        let keep = |c: &str| c == "Hip y";
        let summary = summarise(&normalised, 4, keep).unwrap();
        let tables = SubjectTables {
            sheets: vec![SheetTables {
                sheet: DEFAULT_SHEET.into(),
                original: normalised.clone(),
                normalised: normalised.clone(),
                summary: summary.clone(),
            }],
        };
        let written = export_subject(dir.path(), "ID 1 - Run 1", &tables, SheetFormat::Csv).unwrap();
        assert_eq!(written.len(), 4);
        assert!(dir.path().join("ID 1 - Run 1 - Standard Devs. Stepcycle.csv").is_file());

        let back = read_step_table(dir.path(), "ID 1 - Run 1", ResultKind::Normalised, None).unwrap();
        let again = summarise(&back, 4, keep).unwrap();
        let stored = read_summary_table(dir.path(), "ID 1 - Run 1", ResultKind::Average, None).unwrap();
        assert_eq!(again.average, stored);
        assert_eq!(again.std, summary.std);
    }

    #[test]
    fn both_sheet_neutralises_names() {
        let side = |leg: &str, v: f64| {
            let t = Table::from_columns(vec![(format!("Knee, {leg} Z"), vec![v, v])]).unwrap();
            let step = StepTable::new(vec![Cycle::new(t.clone())]);
            SheetTables {
                sheet: leg.into(),
                original: step.clone(),
                normalised: step.clone(),
                summary: Summary { average: t.clone(), std: t },
            }
        };
        let (left, right) = (side("left", 1.0), side("right", 3.0));
        let both = combine_sides(&[&left, &right]).unwrap();
        assert_eq!(both.summary.average.column("Knee Z").unwrap().to_vec(), vec![2.0, 2.0]);
        assert_eq!(both.normalised.len(), 2);
        assert_eq!(both.normalised.cycles()[1].leg, Some(Side::Right));
    }
}
