//! Group-level table assembly.
//!
//! A group directory holds one subfolder per subject, each written by the
//! per-subject pipeline. For every group this module writes:
//!
//! - `<group> - Normalised Group` / `<group> - Original Group`: the
//!   subjects' step tables stacked with `ID` and `SC Number` columns, a
//!   single empty row between subjects;
//! - `<group> - Average Group` / `<group> - Standard Deviation Group`: the
//!   subjects' average/std tables stacked the same way;
//! - `<group> - Grand Average Group` / `<group> - Grand Standard Deviation
//!   Group`: mean and population std over subjects' average tables, plus an
//!   `N` column;
//!
//! and `group_config.json` describing the run. All subjects of all groups
//! must share one `bin_num`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::aggregate::{sc_percentages, summarise, Cycle, StepTable, Summary};
use crate::error::{ConfigError, DataError, GaitError, GaitResult};
use crate::export::{
    read_step_table, read_summary_table, render_table, text, value_cell, ResultKind, DEFAULT_SHEET,
};
use crate::issues::IssueLog;
use crate::sheet::{sheet_path, write_table_sheets, Cell, RawSheet, SheetFormat};
use crate::table::{Table, LEG, SC_PERCENTAGES, TIME};

/// Subject identifier column of group tables.
pub const ID: &str = "ID";
/// Per-subject cycle counter column of group tables.
pub const SC_NUMBER: &str = "SC Number";
/// Contributing-subject count of grand tables.
pub const N: &str = "N";
/// File name of the group run snapshot.
pub const GROUP_CONFIG_FILE: &str = "group_config.json";

// ---------------------------------------------------------------------------
// GroupConfig
// ---------------------------------------------------------------------------

/// Configuration of a group run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Group names, used as file-name prefixes.
    pub group_names: Vec<String>,
    /// One results directory per group, holding subject subfolders.
    pub group_dirs: Vec<PathBuf>,
    /// Where group tables are written.
    pub results_dir: PathBuf,
    /// Sheet to read from subject workbooks (e.g. `"both"` for 3D results).
    pub sheet: Option<String>,
    /// Write `.xlsx` workbooks instead of CSV.
    pub save_to_xls: bool,
}

impl GroupConfig {
    /// Load from a JSON file.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::FileRead { path: path.to_path_buf(), source })?;
        let cfg: GroupConfig = serde_json::from_str(&contents)
            .map_err(|source| ConfigError::ParseError { path: path.to_path_buf(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that names and directories pair up and names are unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_names.is_empty() {
            return Err(ConfigError::invalid_value("group_names", "at least one group is required"));
        }
        if self.group_names.len() != self.group_dirs.len() {
            return Err(ConfigError::invalid_value(
                "group_dirs",
                format!("{} directories for {} groups", self.group_dirs.len(), self.group_names.len()),
            ));
        }
        for (i, name) in self.group_names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid_value("group_names", "names must not be empty"));
            }
            if self.group_names[..i].contains(name) {
                return Err(ConfigError::invalid_value("group_names", format!("`{name}` is listed twice")));
            }
        }
        Ok(())
    }

    fn format(&self) -> SheetFormat {
        SheetFormat::from_save_to_xls(self.save_to_xls)
    }
}

// ---------------------------------------------------------------------------
// Subject discovery / loading
// ---------------------------------------------------------------------------

fn result_exists(dir: &Path, name: &str, kind: ResultKind, sheet: Option<&str>) -> bool {
    let stem = kind.stem(dir, name);
    let mut candidates = vec![sheet_path(&stem, None, SheetFormat::Xlsx), sheet_path(&stem, None, SheetFormat::Csv)];
    if let Some(sheet) = sheet {
        candidates.push(sheet_path(&stem, Some(sheet), SheetFormat::Csv));
    }
    candidates.iter().any(|p| p.is_file())
}

/// Subject subfolders of `group_dir` holding normalised and original tables,
/// sorted by name.
pub fn discover_subjects(group_dir: &Path, sheet: Option<&str>) -> GaitResult<Vec<String>> {
    if !group_dir.is_dir() {
        return Err(DataError::NotFound { dir: group_dir.to_path_buf(), pattern: "group directory".into() }.into());
    }
    let entries = std::fs::read_dir(group_dir).map_err(|e| GaitError::io(group_dir, e))?;
    let mut subjects: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| {
            let dir = group_dir.join(name);
            let complete = result_exists(&dir, name, ResultKind::Normalised, sheet)
                && result_exists(&dir, name, ResultKind::Original, sheet);
            if !complete {
                debug!("skipping {}: no step-cycle tables", dir.display());
            }
            complete
        })
        .collect();
    subjects.sort();
    Ok(subjects)
}

/// The tables read back from one subject folder.
#[derive(Debug, Clone)]
pub struct SubjectEntry {
    /// Subject (folder) name.
    pub id: String,
    /// Original-length cycles.
    pub original: StepTable,
    /// Normalised cycles.
    pub normalised: StepTable,
    /// Average table.
    pub average: Table,
    /// Standard-deviation table.
    pub std: Table,
}

fn load_subject(group_dir: &Path, id: &str, sheet: Option<&str>) -> GaitResult<SubjectEntry> {
    let dir = group_dir.join(id);
    Ok(SubjectEntry {
        id: id.to_string(),
        original: read_step_table(&dir, id, ResultKind::Original, sheet)?,
        normalised: read_step_table(&dir, id, ResultKind::Normalised, sheet)?,
        average: read_summary_table(&dir, id, ResultKind::Average, sheet)?,
        std: read_summary_table(&dir, id, ResultKind::Std, sheet)?,
    })
}

/// Bins per cycle of a subject, from its normalised cycles.
fn subject_bin_num(entry: &SubjectEntry) -> GaitResult<usize> {
    match entry.normalised.uniform_len() {
        Some(n) if n > 0 && entry.average.n_rows() == n => Ok(n),
        Some(n) if n > 0 => Err(DataError::BinNumMismatch {
            subject: entry.id.clone(),
            expected: n,
            found: entry.average.n_rows(),
        }
        .into()),
        _ => Err(DataError::invalid_format(
            entry.id.as_str(),
            "normalised step cycles have differing lengths",
        )
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Assembled tables of one group.
#[derive(Debug, Clone)]
pub struct GroupTables {
    /// Group name.
    pub name: String,
    /// Subjects in table order.
    pub subjects: Vec<SubjectEntry>,
    /// Grand average and grand standard deviation (with `N`).
    pub grand: Summary,
}

/// Mean and population std over subjects' average tables, with `N`.
pub fn grand_summary(averages: &[&Table], bin_num: usize) -> GaitResult<Summary> {
    let cycles = averages
        .iter()
        .map(|t| {
            let mut t = (*t).clone();
            t.retain_columns(|c| c != SC_PERCENTAGES);
            Cycle::new(t)
        })
        .collect();
    let step = StepTable::new(cycles);
    let mut summary = summarise(&step, bin_num, |_| true)?;
    let n = Array1::from_elem(bin_num, averages.len() as f64);
    summary.average.set_column(N, n.clone())?;
    summary.std.set_column(N, n)?;
    Ok(summary)
}

/// Load every group, check `bin_num`, and write the group tables.
pub fn assemble_groups(cfg: &GroupConfig, log: &mut IssueLog) -> GaitResult<Vec<GroupTables>> {
    cfg.validate()?;
    let sheet = cfg.sheet.as_deref().filter(|s| *s != DEFAULT_SHEET);

    let mut loaded: Vec<(String, Vec<SubjectEntry>)> = Vec::new();
    let mut expected: Option<usize> = None;
    for (name, dir) in cfg.group_names.iter().zip(&cfg.group_dirs) {
        let ids = discover_subjects(dir, sheet)?;
        if ids.is_empty() {
            return Err(DataError::NotFound {
                dir: dir.clone(),
                pattern: "subject folders with step-cycle tables".into(),
            }
            .into());
        }
        let mut entries = Vec::with_capacity(ids.len());
        for id in &ids {
            let entry = load_subject(dir, id, sheet)?;
            let found = subject_bin_num(&entry)?;
            match expected {
                None => expected = Some(found),
                Some(e) if e != found => {
                    return Err(DataError::BinNumMismatch { subject: id.clone(), expected: e, found }.into())
                }
                Some(_) => {}
            }
            entries.push(entry);
        }
        info!("group {name}: {} subjects from {}", entries.len(), dir.display());
        loaded.push((name.clone(), entries));
    }
    let bin_num = expected.ok_or_else(|| GaitError::bug("no subjects loaded"))?;

    std::fs::create_dir_all(&cfg.results_dir).map_err(|e| GaitError::io(&cfg.results_dir, e))?;
    log.attach(&cfg.results_dir)?;

    let mut groups = Vec::with_capacity(loaded.len());
    for (name, subjects) in loaded {
        let averages: Vec<&Table> = subjects.iter().map(|s| &s.average).collect();
        let grand = grand_summary(&averages, bin_num)?;
        let group = GroupTables { name, subjects, grand };
        write_group(&cfg.results_dir, &group, bin_num, cfg.format())?;
        groups.push(group);
    }
    write_group_config(cfg, &groups, bin_num)?;
    Ok(groups)
}

// ---------------------------------------------------------------------------
// Rendering / writing
// ---------------------------------------------------------------------------

fn union_columns<'a>(lists: impl Iterator<Item = &'a [String]>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for list in lists {
        for c in list {
            if !out.contains(c) {
                out.push(c.clone());
            }
        }
    }
    if let Some(i) = out.iter().position(|c| c == TIME) {
        let time = out.remove(i);
        out.insert(0, time);
    }
    out
}

/// Stack subjects' step tables: `ID`, `SC Number`, optional
/// `SC Percentages`, optional `Leg`, then the data columns.
pub fn render_group_steps(subjects: &[(&str, &StepTable)], bin_num: Option<usize>, sheet: &str) -> RawSheet {
    let columns = union_columns(subjects.iter().map(|(_, s)| s.columns()));
    let with_leg = subjects.iter().any(|(_, s)| s.has_legs());
    let percentages = bin_num.map(sc_percentages);

    let mut header = vec![text(ID), text(SC_NUMBER)];
    if percentages.is_some() {
        header.push(text(SC_PERCENTAGES));
    }
    if with_leg {
        header.push(text(LEG));
    }
    header.extend(columns.iter().map(|c| text(c)));
    let width = header.len();

    let mut rows = vec![header];
    for (s, (id, step)) in subjects.iter().enumerate() {
        if s > 0 {
            rows.push(vec![Cell::Empty; width]);
        }
        for (k, cycle) in step.cycles().iter().enumerate() {
            let indices: Vec<Option<usize>> = columns.iter().map(|c| cycle.table.index_of(c)).collect();
            for r in 0..cycle.table.n_rows() {
                let mut row = vec![text(id), Cell::Number((k + 1) as f64)];
                if let Some(p) = &percentages {
                    row.push(p.get(r).map_or(Cell::Empty, |&v| Cell::Number(v)));
                }
                if with_leg {
                    row.push(cycle.leg.map_or(Cell::Empty, |l| text(l.as_str())));
                }
                row.extend(
                    columns
                        .iter()
                        .zip(&indices)
                        .map(|(c, i)| value_cell(c, i.map_or(f64::NAN, |i| cycle.table.values()[[r, i]]))),
                );
                rows.push(row);
            }
        }
    }
    RawSheet::new(sheet, rows)
}

/// Stack subjects' average or std tables with an `ID` column.
pub fn render_group_summaries(subjects: &[(&str, &Table)], sheet: &str) -> RawSheet {
    let mut columns = union_columns(subjects.iter().map(|(_, t)| t.columns()));
    if let Some(i) = columns.iter().position(|c| c == SC_PERCENTAGES) {
        let pct = columns.remove(i);
        columns.insert(0, pct);
    }
    let mut header = vec![text(ID)];
    header.extend(columns.iter().map(|c| text(c)));
    let width = header.len();

    let mut rows = vec![header];
    for (s, (id, table)) in subjects.iter().enumerate() {
        if s > 0 {
            rows.push(vec![Cell::Empty; width]);
        }
        let indices: Vec<Option<usize>> = columns.iter().map(|c| table.index_of(c)).collect();
        for r in 0..table.n_rows() {
            let mut row = vec![text(id)];
            row.extend(indices.iter().map(|i| Cell::Number(i.map_or(f64::NAN, |i| table.values()[[r, i]]))));
            rows.push(row);
        }
    }
    RawSheet::new(sheet, rows)
}

fn pick<'a, T>(subjects: &'a [SubjectEntry], f: impl Fn(&'a SubjectEntry) -> &'a T) -> Vec<(&'a str, &'a T)> {
    subjects.iter().map(|s| (s.id.as_str(), f(s))).collect()
}

fn write_group(dir: &Path, group: &GroupTables, bin_num: usize, format: SheetFormat) -> GaitResult<()> {
    let stem = |suffix: &str| dir.join(format!("{} - {suffix}", group.name));
    let subjects = &group.subjects;
    let outputs = [
        (
            "Normalised Group",
            render_group_steps(&pick(subjects, |s| &s.normalised), Some(bin_num), DEFAULT_SHEET),
        ),
        ("Original Group", render_group_steps(&pick(subjects, |s| &s.original), None, DEFAULT_SHEET)),
        ("Average Group", render_group_summaries(&pick(subjects, |s| &s.average), DEFAULT_SHEET)),
        ("Standard Deviation Group", render_group_summaries(&pick(subjects, |s| &s.std), DEFAULT_SHEET)),
        ("Grand Average Group", render_table(&group.grand.average, DEFAULT_SHEET)),
        ("Grand Standard Deviation Group", render_table(&group.grand.std, DEFAULT_SHEET)),
    ];
    for (suffix, sheet) in outputs {
        write_table_sheets(&stem(suffix), &[sheet], format)?;
    }
    info!("wrote group tables for {} to {}", group.name, dir.display());
    Ok(())
}

#[derive(Serialize)]
struct GroupSnapshot<'a> {
    group_names: &'a [String],
    group_dirs: &'a [PathBuf],
    results_dir: &'a Path,
    sheet: Option<&'a str>,
    bin_num: usize,
    subjects: BTreeMap<&'a str, Vec<&'a str>>,
    subject_counts: BTreeMap<&'a str, usize>,
}

fn write_group_config(cfg: &GroupConfig, groups: &[GroupTables], bin_num: usize) -> GaitResult<()> {
    let snapshot = GroupSnapshot {
        group_names: &cfg.group_names,
        group_dirs: &cfg.group_dirs,
        results_dir: &cfg.results_dir,
        sheet: cfg.sheet.as_deref(),
        bin_num,
        subjects: groups
            .iter()
            .map(|g| (g.name.as_str(), g.subjects.iter().map(|s| s.id.as_str()).collect()))
            .collect(),
        subject_counts: groups.iter().map(|g| (g.name.as_str(), g.subjects.len())).collect(),
    };
    let path = cfg.results_dir.join(GROUP_CONFIG_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?).map_err(|e| GaitError::io(&path, e))
}
