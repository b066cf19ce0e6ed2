//! Coordinate-file discovery and parsing.
//!
//! # 2D tracker layout
//!
//! ```text
//! scorer,    DLC_resnet50, DLC_resnet50, DLC_resnet50, ...
//! bodyparts, Hip,          Hip,          Hip,          ...
//! coords,    x,            y,            likelihood,   ...
//! 0,         12.1,         40.3,         0.99,         ...
//! ```
//!
//! The header is flattened to `"<point> <axis>"` names and the index column
//! is dropped. Files are selected by the subject/trial naming convention of
//! [`FolderInfo`]; baseline (beam) files use the same convention with a
//! different identifier and are appended as extra columns.
//!
//! # 3D tracker layout
//!
//! A workbook with a single header row (`Time`, `Head Y`, `Knee, left Z`,
//! ...). Values may use comma decimals; the recording may start with two
//! `Time == 0` rows, of which only the later one is kept.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::FolderInfo;
use crate::error::{ConfigError, DataError, GaitResult};
use crate::issues::IssueLog;
use crate::joint::{Axis, Tracker};
use crate::sheet::{read_first_sheet, Cell, RawSheet};
use crate::table::{Table, TIME};

// ---------------------------------------------------------------------------
// CoordinateFrame
// ---------------------------------------------------------------------------

/// One subject/trial's coordinates after loading.
#[derive(Debug, Clone)]
pub struct CoordinateFrame {
    /// Tracker that produced the data.
    pub tracker: Tracker,
    /// Samples × coordinate columns.
    pub table: Table,
    /// Names of appended baseline columns (2D with beam subtraction).
    pub baseline_columns: Vec<String>,
    /// File the coordinates were read from.
    pub source: PathBuf,
}

impl CoordinateFrame {
    /// Columns on `axis`, in table order.
    pub fn columns_on(&self, axis: Axis) -> Vec<String> {
        self.tracker.columns_on(self.table.columns(), axis)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

fn list_files(dir: &Path) -> GaitResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| crate::error::GaitError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn exactly_one(dir: &Path, pattern: String, mut matches: Vec<PathBuf>) -> GaitResult<PathBuf> {
    match matches.len() {
        0 => Err(DataError::NotFound { dir: dir.to_path_buf(), pattern }.into()),
        1 => Ok(matches.remove(0)),
        count => Err(DataError::AmbiguousFiles { dir: dir.to_path_buf(), pattern, count }.into()),
    }
}

/// Which file of a 2D trial to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlcFileKind {
    /// Joint coordinates (`data_string`).
    Data,
    /// Baseline coordinates (`beam_string`).
    Beam,
}

/// Fail when the data and baseline identifiers cannot tell files apart.
pub fn check_identifiers(folder: &FolderInfo) -> Result<(), ConfigError> {
    let data = folder.data_string.trim();
    let beam = folder.beam_string.trim();
    if data.is_empty() || beam.is_empty() || data.contains(beam) || beam.contains(data) {
        return Err(ConfigError::ConflictingIdentifiers {
            data: data.to_string(),
            baseline: beam.to_string(),
        });
    }
    Ok(())
}

/// Locate the single 2D coordinate file of subject `mouse`, trial `run`.
pub fn find_dlc_file(
    folder: &FolderInfo,
    mouse: &str,
    run: &str,
    kind: DlcFileKind,
) -> GaitResult<PathBuf> {
    let subject = format!("{}{}{}", folder.premouse_string, mouse, folder.postmouse_string);
    let trial = format!("{}{}{}", folder.prerun_string, run, folder.postrun_string);
    let (wanted, other) = match kind {
        DlcFileKind::Data => (folder.data_string.trim(), folder.beam_string.trim()),
        DlcFileKind::Beam => (folder.beam_string.trim(), folder.data_string.trim()),
    };
    // The other identifier only excludes files when it cannot hide the wanted one.
    let exclude = !other.is_empty() && !wanted.contains(other);

    let matches: Vec<PathBuf> = list_files(&folder.root_dir)?
        .into_iter()
        .filter(|p| has_extension(p, &["csv"]))
        .filter(|p| {
            let name = file_name(p);
            name.contains(&subject)
                && name.contains(&trial)
                && name.contains(wanted)
                && !(exclude && name.contains(other))
        })
        .collect();
    debug!("{} candidate files for `{subject}` / `{trial}` / `{wanted}`", matches.len());
    exactly_one(
        &folder.root_dir,
        format!("`{subject}`, `{trial}` and `{wanted}` (.csv)"),
        matches,
    )
}

/// Locate the single 3D workbook of `subject`, ignoring the annotation table.
pub fn find_3d_file(folder: &FolderInfo, subject: &str) -> GaitResult<PathBuf> {
    let annotation = folder.sctable_filename.trim();
    let candidates: Vec<PathBuf> = list_files(&folder.root_dir)?
        .into_iter()
        .filter(|p| has_extension(p, &["xlsx", "xls"]))
        .filter(|p| {
            let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            annotation.is_empty() || (stem != annotation && file_name(p) != annotation)
        })
        .filter(|p| file_name(p).contains(subject))
        .collect();
    let exact: Vec<PathBuf> = candidates
        .iter()
        .filter(|p| p.file_stem().and_then(|s| s.to_str()) == Some(subject))
        .cloned()
        .collect();
    let matches = if exact.len() == 1 { exact } else { candidates };
    exactly_one(&folder.root_dir, format!("`{subject}` (.xlsx, .xls)"), matches)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

const DLC_HEADER_LABELS: &[&str] = &["scorer", "individuals", "bodyparts", "coords"];

fn numeric_cell(path: &Path, cell: &Cell, row: usize, column: &str) -> GaitResult<f64> {
    match cell {
        Cell::Empty => Ok(f64::NAN),
        _ if cell.is_empty() => Ok(f64::NAN),
        _ => cell.as_f64().ok_or_else(|| {
            DataError::Malformed {
                path: path.to_path_buf(),
                row: row + 1,
                column: column.to_string(),
                value: cell.as_text(),
            }
            .into()
        }),
    }
}

fn build_table(
    path: &Path,
    sheet: &RawSheet,
    columns: &[(usize, String)],
    rows: &[usize],
) -> GaitResult<Table> {
    let mut data: Vec<(String, Vec<f64>)> =
        columns.iter().map(|(_, name)| (name.clone(), Vec::with_capacity(rows.len()))).collect();
    for &r in rows {
        for ((c, name), (_, values)) in columns.iter().zip(data.iter_mut()) {
            values.push(numeric_cell(path, sheet.cell(r, *c), r, name)?);
        }
    }
    Table::from_columns(data)
}

/// Parse a 2D tracker CSV into a table of `"<point> <axis>"` columns.
pub fn parse_dlc_sheet(path: &Path, sheet: &RawSheet, log: &mut IssueLog) -> GaitResult<Table> {
    let label_rows = sheet
        .rows
        .iter()
        .take_while(|row| {
            row.first()
                .map_or(false, |c| DLC_HEADER_LABELS.contains(&c.as_text().to_lowercase().as_str()))
        })
        .count();
    let (points_row, axes_row) = if label_rows >= 2 {
        (label_rows - 2, label_rows - 1)
    } else {
        (0, 1)
    };
    let data_start = axes_row + 1;
    if sheet.rows.len() <= data_start {
        return Err(DataError::invalid_format(path, "no data rows below the two-row header").into());
    }

    let columns: Vec<(usize, String)> = (1..sheet.width())
        .filter_map(|c| {
            let point = sheet.cell(points_row, c).as_text();
            let axis = sheet.cell(axes_row, c).as_text();
            (!point.is_empty() && !axis.is_empty()).then(|| (c, format!("{point} {axis}")))
        })
        .collect();
    if columns.is_empty() {
        return Err(DataError::invalid_format(path, "header names no tracked points").into());
    }

    let names: Vec<String> = columns.iter().map(|(_, n)| n.clone()).collect();
    let counts: Vec<usize> = [Axis::Horizontal, Axis::Vertical, Axis::Likelihood]
        .iter()
        .map(|&axis| Tracker::Dlc.columns_on(&names, axis).len())
        .collect();
    if counts[0] != counts[1] || counts[1] != counts[2] {
        log.warn(format!(
            "{} has {} x, {} y and {} likelihood columns",
            file_name(path),
            counts[0],
            counts[1],
            counts[2]
        ));
    }

    // Interior blank rows stay as NaN samples so frame indices match the
    // annotation latencies; trailing blank rows are dropped.
    let last = (data_start..sheet.rows.len()).rev().find(|&r| !sheet.row_is_empty(r));
    let rows: Vec<usize> = match last {
        Some(last) => (data_start..=last).collect(),
        None => Vec::new(),
    };
    let blank = rows.iter().filter(|&&r| sheet.row_is_empty(r)).count();
    if blank > 0 {
        log.warn(format!(
            "{} has {blank} blank data rows; they are kept as missing samples",
            file_name(path)
        ));
    }
    build_table(path, sheet, &columns, &rows)
}

/// Parse a 3D tracker sheet.
///
/// Only `Time` and horizontal/vertical coordinate columns are kept.
pub fn parse_3d_sheet(path: &Path, sheet: &RawSheet) -> GaitResult<Table> {
    let columns: Vec<(usize, String)> = (0..sheet.width())
        .filter_map(|c| {
            let name = sheet.cell(0, c).as_text();
            let keep = name == TIME
                || matches!(Tracker::Simi.classify(&name), Some(Axis::Horizontal | Axis::Vertical));
            keep.then_some((c, name))
        })
        .collect();
    if !columns.iter().any(|(_, n)| n != TIME) {
        return Err(DataError::invalid_format(path, "no `<joint> Y` / `<joint> Z` columns").into());
    }

    let mut rows: Vec<usize> = (1..sheet.rows.len()).filter(|&r| !sheet.row_is_empty(r)).collect();
    if let Some(&(time_col, _)) = columns.iter().find(|(_, n)| n == TIME) {
        let zero_rows: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&r| sheet.cell(r, time_col).as_f64() == Some(0.0))
            .collect();
        if let Some((&keep, dropped)) = zero_rows.split_last() {
            if !dropped.is_empty() {
                debug!("dropping {} duplicate Time == 0 rows of {}", dropped.len(), path.display());
                rows.retain(|r| *r == keep || !dropped.contains(r));
            }
        }
    }
    build_table(path, sheet, &columns, &rows)
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Load the 2D coordinates of subject `mouse`, trial `run`.
///
/// With `with_baseline` the matching beam file is loaded too and its columns
/// are appended; the data and baseline recordings must have equal length.
pub fn load_dlc(
    folder: &FolderInfo,
    mouse: &str,
    run: &str,
    with_baseline: bool,
    log: &mut IssueLog,
) -> GaitResult<CoordinateFrame> {
    if with_baseline {
        check_identifiers(folder)?;
    }
    let data_path = find_dlc_file(folder, mouse, run, DlcFileKind::Data)?;
    let mut table = parse_dlc_sheet(&data_path, &read_first_sheet(&data_path)?, log)?;

    let mut baseline_columns = Vec::new();
    if with_baseline {
        let beam_path = find_dlc_file(folder, mouse, run, DlcFileKind::Beam)?;
        let beam = parse_dlc_sheet(&beam_path, &read_first_sheet(&beam_path)?, log)?;
        if beam.n_rows() != table.n_rows() {
            return Err(DataError::LengthMismatch { data: table.n_rows(), baseline: beam.n_rows() }
                .into());
        }
        for name in beam.columns() {
            if table.has(name) {
                log.warn(format!("Baseline column `{name}` duplicates a data column; ignored"));
                continue;
            }
            if let Some(values) = beam.column(name) {
                table.set_column(name, values.to_owned())?;
                baseline_columns.push(name.clone());
            }
        }
        info!("loaded baseline {} ({} columns)", beam_path.display(), baseline_columns.len());
    }

    info!("loaded {} ({} samples, {} columns)", data_path.display(), table.n_rows(), table.n_cols());
    Ok(CoordinateFrame { tracker: Tracker::Dlc, table, baseline_columns, source: data_path })
}

/// Load the 3D coordinates of `subject`.
pub fn load_3d(folder: &FolderInfo, subject: &str) -> GaitResult<CoordinateFrame> {
    let path = find_3d_file(folder, subject)?;
    let table = parse_3d_sheet(&path, &read_first_sheet(&path)?)?;
    info!("loaded {} ({} samples, {} columns)", path.display(), table.n_rows(), table.n_cols());
    Ok(CoordinateFrame { tracker: Tracker::Simi, table, baseline_columns: Vec::new(), source: path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DLC_CSV: &str = "\
scorer,net,net,net,net,net,net
bodyparts,Hip,Hip,Hip,Ankle,Ankle,Ankle
coords,x,y,likelihood,x,y,likelihood
0,1.0,2.0,0.99,3.0,4.0,0.98
1,1.5,2.5,0.97,3.5,4.5,0.96
";

    fn folder(root: &Path) -> FolderInfo {
        FolderInfo {
            root_dir: root.to_path_buf(),
            data_string: "SIDE".into(),
            beam_string: "BEAM".into(),
            premouse_string: "Mouse".into(),
            postmouse_string: "_".into(),
            prerun_string: "run".into(),
            postrun_string: "-".into(),
            ..FolderInfo::default()
        }
    }

    #[test]
    fn parses_two_row_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Mouse15_run1-SIDE.csv");
        std::fs::write(&path, DLC_CSV).unwrap();
        let mut log = IssueLog::new("t");
        let frame = load_dlc(&folder(dir.path()), "15", "1", false, &mut log).unwrap();
        assert_eq!(
            frame.table.columns(),
            &["Hip x", "Hip y", "Hip likelihood", "Ankle x", "Ankle y", "Ankle likelihood"]
        );
        assert_eq!(frame.table.n_rows(), 2);
        assert_eq!(frame.table.column("Ankle y").unwrap().to_vec(), vec![4.0, 4.5]);
        assert!(log.issues().is_empty());
    }

    #[test]
    fn appends_baseline_columns() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Mouse15_run1-SIDE.csv"), DLC_CSV).unwrap();
        std::fs::write(
            dir.path().join("Mouse15_run1-BEAM.csv"),
            "scorer,net,net,net\nbodyparts,BeamL,BeamL,BeamL\ncoords,x,y,likelihood\n0,0,1,1\n1,0,1,1\n",
        )
        .unwrap();
        let mut log = IssueLog::new("t");
        let frame = load_dlc(&folder(dir.path()), "15", "1", true, &mut log).unwrap();
        assert_eq!(frame.baseline_columns, vec!["BeamL x", "BeamL y", "BeamL likelihood"]);
        assert!(frame.table.has("BeamL y"));
    }

    #[test]
    fn ambiguous_and_missing_files_are_data_errors() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Mouse15_run1-SIDE.csv"), DLC_CSV).unwrap();
        std::fs::write(dir.path().join("Mouse15_run1-SIDE copy.csv"), DLC_CSV).unwrap();
        let f = folder(dir.path());
        assert!(matches!(
            find_dlc_file(&f, "15", "1", DlcFileKind::Data),
            Err(crate::error::GaitError::Data(DataError::AmbiguousFiles { count: 2, .. }))
        ));
        assert!(matches!(
            find_dlc_file(&f, "16", "1", DlcFileKind::Data),
            Err(crate::error::GaitError::Data(DataError::NotFound { .. }))
        ));
    }

    #[test]
    fn identical_identifiers_conflict() {
        let dir = tempdir().unwrap();
        let mut f = folder(dir.path());
        f.beam_string = "SIDE".into();
        assert!(check_identifiers(&f).is_err());
        f.beam_string = "BEAM".into();
        assert!(check_identifiers(&f).is_ok());
    }

    #[test]
    fn column_count_asymmetry_warns() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![Cell::Text("scorer".into()), Cell::Text("n".into()), Cell::Text("n".into())],
                vec![Cell::Text("bodyparts".into()), Cell::Text("Hip".into()), Cell::Text("Hip".into())],
                vec![Cell::Text("coords".into()), Cell::Text("x".into()), Cell::Text("y".into())],
                vec![Cell::Number(0.0), Cell::Number(1.0), Cell::Number(2.0)],
            ],
        );
        let mut log = IssueLog::new("t");
        parse_dlc_sheet(Path::new("a.csv"), &sheet, &mut log).unwrap();
        assert_eq!(log.warning_count(), 1);
    }

    #[test]
    fn blank_rows_keep_frame_positions() {
        let n = |v: f64| Cell::Number(v);
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![Cell::Text("scorer".into()), Cell::Text("n".into()), Cell::Text("n".into())],
                vec![Cell::Text("bodyparts".into()), Cell::Text("Hip".into()), Cell::Text("Hip".into())],
                vec![Cell::Text("coords".into()), Cell::Text("x".into()), Cell::Text("y".into())],
                vec![n(0.0), n(1.0), n(2.0)],
                vec![],
                vec![n(2.0), n(5.0), n(6.0)],
                vec![],
            ],
        );
        let mut log = IssueLog::new("t");
        let table = parse_dlc_sheet(Path::new("a.csv"), &sheet, &mut log).unwrap();
        assert_eq!(table.n_rows(), 3);
        assert!(table.column("Hip x").unwrap()[1].is_nan());
        assert_eq!(table.column("Hip x").unwrap()[2], 5.0);
        assert!(log.issues().iter().any(|i| i.message.contains("blank data rows")));
    }

    #[test]
    fn parses_3d_sheet_with_comma_decimals_and_duplicate_start() {
        let t = |s: &str| Cell::Text(s.into());
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![t("Time"), t("Head Y"), t("Head Z"), t("Knee, left Z"), t("Marker")],
                vec![t("0"), t("9,0"), t("9,0"), t("9,0"), t("a")],
                vec![t("0"), t("1,5"), t("2,5"), t("0,5"), t("b")],
                vec![t("0,01"), t("1,6"), t("2,6"), t("0,6"), t("c")],
            ],
        );
        let table = parse_3d_sheet(Path::new("SK1.xlsx"), &sheet).unwrap();
        assert_eq!(table.columns(), &["Time", "Head Y", "Head Z", "Knee, left Z"]);
        assert_eq!(table.column("Head Y").unwrap().to_vec(), vec![1.5, 1.6]);
    }

    #[test]
    fn unparseable_3d_value_is_malformed() {
        let t = |s: &str| Cell::Text(s.into());
        let sheet = RawSheet::new(
            "Sheet1",
            vec![vec![t("Time"), t("Head Y")], vec![t("0"), t("oops")]],
        );
        let err = parse_3d_sheet(Path::new("SK1.xlsx"), &sheet).unwrap_err();
        assert!(matches!(err, crate::error::GaitError::Data(DataError::Malformed { row: 2, .. })));
    }

    #[test]
    fn finds_3d_workbook_but_not_annotation_table() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("SK1.xlsx"), b"").unwrap();
        std::fs::write(dir.path().join("SK1 SC Table.xlsx"), b"").unwrap();
        let f = FolderInfo {
            root_dir: dir.path().to_path_buf(),
            sctable_filename: "SK1 SC Table".into(),
            ..FolderInfo::default()
        };
        let found = find_3d_file(&f, "SK1").unwrap();
        assert_eq!(found.file_name().unwrap(), "SK1.xlsx");
    }
}
