//! Manually annotated swing/stance latencies.
//!
//! The annotation workbook has one header row and one row per trial (2D) or
//! per bodyside (3D). Subjects form contiguous row blocks separated by empty
//! rows; the subject cell may be written only on the first row of a block.
//! Step cycle `i` is described by a `Swing (ti)` / `Stance (te)` column pair
//! (repeated headers may carry a `.i` suffix).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, DataError, GaitResult};
use crate::issues::IssueLog;
use crate::joint::Side;
use crate::sheet::{read_first_sheet, resolve_workbook, Cell, RawSheet};

const SUBJECT_SYNONYMS: &[&str] =
    &["id", "mouse", "mouse id", "subject", "subject id", "animal", "animal id"];
const TRIAL_SYNONYMS: &[&str] = &["run", "run number", "trial", "trial number"];
const COUNT_SYNONYMS: &[&str] = &[
    "sc number",
    "sc number (#)",
    "sc count",
    "number of scs",
    "number of step cycles",
    "nr of scs",
    "# scs",
];
const LEG_SYNONYMS: &[&str] = &["leg", "side", "body side", "bodyside"];
const SWING_PREFIX: &str = "swing (ti)";
const STANCE_PREFIX: &str = "stance (te)";

fn normalise_header(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Columns whose header starts with `prefix`, keyed by their repeat suffix
/// (`""` is 0, `".2"` is 2).
fn latency_columns(headers: &[String], prefix: &str, path: &Path) -> GaitResult<BTreeMap<usize, usize>> {
    let mut columns = BTreeMap::new();
    for (col, header) in headers.iter().enumerate() {
        let Some(suffix) = header.strip_prefix(prefix) else {
            continue;
        };
        let suffix = suffix.trim();
        let index = if suffix.is_empty() {
            Some(0)
        } else {
            suffix.strip_prefix('.').and_then(|n| n.parse::<usize>().ok())
        };
        let Some(index) = index else {
            return Err(ConfigError::invalid_value(
                "annotation header",
                format!("`{header}` in `{}` has an unreadable step-cycle suffix", path.display()),
            )
            .into());
        };
        if columns.insert(index, col).is_some() {
            return Err(ConfigError::invalid_value(
                "annotation header",
                format!("`{header}` appears more than once in `{}`", path.display()),
            )
            .into());
        }
    }
    Ok(columns)
}

/// Whether two identifiers denote the same subject/trial (`"15"` == `15.0`).
pub fn same_id(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a == b {
        return true;
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Which row of a subject block to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKey<'a> {
    /// The row of a trial (2D).
    Trial(&'a str),
    /// The row of a bodyside (3D).
    Side(Side),
}

#[derive(Debug, Clone)]
struct SubjectBlock {
    subject: String,
    rows: Vec<usize>,
}

/// A loaded annotation workbook.
#[derive(Debug, Clone)]
pub struct AnnotationTable {
    path: PathBuf,
    sheet: RawSheet,
    count_col: usize,
    trial_col: Option<usize>,
    leg_col: Option<usize>,
    pairs: Vec<(usize, usize)>,
    blocks: Vec<SubjectBlock>,
}

impl AnnotationTable {
    /// Load the annotation workbook at `path` (extension optional).
    ///
    /// # Errors
    ///
    /// [`DataError::NotFound`] when no workbook exists and
    /// [`ConfigError::MissingColumn`] when the subject, cycle-count, or
    /// latency columns cannot be identified.
    pub fn load(path: &Path) -> GaitResult<Self> {
        let resolved = resolve_workbook(path).ok_or_else(|| DataError::NotFound {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            pattern: format!("annotation table `{}` (.xlsx, .xls)", path.display()),
        })?;
        let sheet = read_first_sheet(&resolved)?;
        let table = Self::from_sheet(&resolved, sheet)?;
        info!(
            "loaded annotation table {} ({} subjects, up to {} step cycles per row)",
            resolved.display(),
            table.blocks.len(),
            table.pairs.len()
        );
        Ok(table)
    }

    /// Build from an already-read sheet whose first row is the header.
    pub fn from_sheet(path: &Path, sheet: RawSheet) -> GaitResult<Self> {
        let headers: Vec<String> =
            (0..sheet.width()).map(|c| normalise_header(&sheet.cell(0, c).as_text())).collect();
        let find = |synonyms: &[&str]| headers.iter().position(|h| synonyms.contains(&h.as_str()));

        let subject_col = find(SUBJECT_SYNONYMS)
            .ok_or_else(|| ConfigError::missing_column("subject identifier", path))?;
        let count_col = find(COUNT_SYNONYMS)
            .ok_or_else(|| ConfigError::missing_column("step-cycle count", path))?;
        let trial_col = find(TRIAL_SYNONYMS);
        let leg_col = find(LEG_SYNONYMS);
        if trial_col.is_none() && leg_col.is_none() {
            return Err(ConfigError::missing_column("trial or leg", path).into());
        }

        let swings = latency_columns(&headers, SWING_PREFIX, path)?;
        let stances = latency_columns(&headers, STANCE_PREFIX, path)?;
        if swings.is_empty() || stances.is_empty() {
            return Err(ConfigError::missing_column("Swing (ti) / Stance (te)", path).into());
        }
        // Pair by suffix so column order does not matter.
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(swings.len());
        for (index, &swing) in &swings {
            let Some(&stance) = stances.get(index) else {
                let what = format!("Stance (te) for step cycle {}", index + 1);
                return Err(ConfigError::missing_column(what, path).into());
            };
            pairs.push((swing, stance));
        }
        if let Some(index) = stances.keys().find(|&i| !swings.contains_key(i)) {
            let what = format!("Swing (ti) for step cycle {}", index + 1);
            return Err(ConfigError::missing_column(what, path).into());
        }

        let mut blocks: Vec<SubjectBlock> = Vec::new();
        let mut open = false;
        for row in 1..sheet.rows.len() {
            if sheet.row_is_empty(row) {
                open = false;
                continue;
            }
            let subject = sheet.cell(row, subject_col).as_text();
            let continues = open
                && blocks
                    .last()
                    .map_or(false, |b| subject.is_empty() || same_id(&b.subject, &subject));
            if continues {
                if let Some(block) = blocks.last_mut() {
                    block.rows.push(row);
                }
            } else if subject.is_empty() {
                debug!("annotation row {} has no subject; skipped", row + 1);
            } else {
                blocks.push(SubjectBlock { subject, rows: vec![row] });
                open = true;
            }
        }

        Ok(AnnotationTable {
            path: path.to_path_buf(),
            sheet,
            count_col,
            trial_col,
            leg_col,
            pairs,
            blocks,
        })
    }

    /// Path of the loaded workbook.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subject identifiers in table order (duplicates included).
    pub fn subjects(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.subject.as_str()).collect()
    }

    /// Trial identifiers annotated for `subject`, in table order.
    pub fn trials_for(&self, subject: &str) -> Vec<String> {
        let Some(col) = self.trial_col else {
            return Vec::new();
        };
        self.blocks
            .iter()
            .filter(|b| same_id(&b.subject, subject))
            .flat_map(|b| b.rows.iter())
            .map(|&r| self.sheet.cell(r, col).as_text())
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn key_matches(&self, block: &SubjectBlock, key: AnnotationKey<'_>) -> GaitResult<Option<usize>> {
        let col = match key {
            AnnotationKey::Trial(_) => self.trial_col,
            AnnotationKey::Side(_) => self.leg_col,
        };
        let Some(col) = col else {
            let what = match key {
                AnnotationKey::Trial(_) => "trial",
                AnnotationKey::Side(_) => "leg",
            };
            return Err(ConfigError::missing_column(what, &self.path).into());
        };
        // Key cells may be written once per group of rows; carry them forward.
        let mut current = String::new();
        for &row in &block.rows {
            let text = self.sheet.cell(row, col).as_text();
            if !text.is_empty() {
                current = text;
            }
            let hit = match key {
                AnnotationKey::Trial(trial) => same_id(&current, trial),
                AnnotationKey::Side(side) => Side::parse(&current) == Some(side),
            };
            if hit {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn latency(&self, row: usize, col: usize) -> GaitResult<Option<f64>> {
        match self.sheet.cell(row, col) {
            Cell::Empty => Ok(None),
            cell => match cell.as_f64() {
                Some(v) if v.is_nan() => Ok(None),
                Some(v) => Ok(Some(v)),
                None if cell.is_empty() => Ok(None),
                None => Err(ConfigError::invalid_value(
                    "annotation latency",
                    format!("`{}` in row {} of `{}` is not a number", cell.as_text(), row + 1, self.path.display()),
                )
                .into()),
            },
        }
    }

    /// Annotated `(swing start, stance end)` latencies in seconds.
    ///
    /// An absent subject or key row yields a warning and an empty list; a
    /// subject listed in more than one block is a configuration error.
    pub fn cycles_for(
        &self,
        subject: &str,
        key: AnnotationKey<'_>,
        log: &mut IssueLog,
    ) -> GaitResult<Vec<(f64, f64)>> {
        let blocks: Vec<&SubjectBlock> =
            self.blocks.iter().filter(|b| same_id(&b.subject, subject)).collect();
        let block = match blocks.as_slice() {
            [] => {
                log.warn(format!("Subject {subject} was not found in the annotation table"));
                return Ok(Vec::new());
            }
            [block] => *block,
            _ => {
                return Err(ConfigError::DuplicateSubject {
                    subject: subject.to_string(),
                    count: blocks.len(),
                }
                .into())
            }
        };

        let Some(row) = self.key_matches(block, key)? else {
            let what = match key {
                AnnotationKey::Trial(trial) => format!("Run {trial}"),
                AnnotationKey::Side(side) => format!("the {side} leg"),
            };
            log.warn(format!("No annotation row for {what} of subject {subject}"));
            return Ok(Vec::new());
        };

        let mut latencies = Vec::new();
        for (i, &(swing_col, stance_col)) in self.pairs.iter().enumerate() {
            let Some(end) = self.latency(row, stance_col)? else {
                break;
            };
            let Some(start) = self.latency(row, swing_col)? else {
                log.warn(format!(
                    "Step cycle {} of subject {subject} has a stance end but no swing start; \
                     ignoring it and all later cycles",
                    i + 1
                ));
                break;
            };
            latencies.push((start, end));
        }

        if let Some(claimed) = self.sheet.cell(row, self.count_col).as_f64() {
            if claimed.is_finite() && claimed.round() as usize != latencies.len() {
                log.warn(format!(
                    "Annotation claims {claimed} step cycles for subject {subject} but {} were \
                     found; using {}",
                    latencies.len(),
                    latencies.len()
                ));
            }
        }
        debug!("{} annotated step cycles for subject {subject}", latencies.len());
        Ok(latencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn num(v: f64) -> Cell {
        Cell::Number(v)
    }

    fn dlc_sheet() -> RawSheet {
        RawSheet::new(
            "Sheet1",
            vec![
                vec![
                    text("ID"),
                    text("Run"),
                    text("SC Number"),
                    text("Swing (ti)"),
                    text("Stance (te)"),
                    text("Swing (ti).1"),
                    text("Stance (te).1"),
                ],
                vec![num(15.0), num(1.0), num(2.0), num(0.1), num(0.5), num(0.6), num(1.0)],
                vec![Cell::Empty, num(2.0), num(3.0), num(0.2), num(0.7), Cell::Empty, Cell::Empty],
                vec![],
                vec![num(16.0), num(1.0), num(1.0), num(0.3), num(0.9)],
                vec![],
                vec![num(17.0), num(1.0), num(1.0), num(0.3), num(0.9)],
                vec![],
                vec![num(17.0), num(2.0), num(1.0), num(0.3), num(0.9)],
            ],
        )
    }

    fn table() -> AnnotationTable {
        AnnotationTable::from_sheet(Path::new("SC Latency Table.xlsx"), dlc_sheet()).unwrap()
    }

    #[test]
    fn reads_pairs_until_missing_stance() {
        let mut log = IssueLog::new("test");
        let cycles = table().cycles_for("15", AnnotationKey::Trial("1"), &mut log).unwrap();
        assert_eq!(cycles, vec![(0.1, 0.5), (0.6, 1.0)]);
        assert!(log.issues().is_empty());
    }

    #[test]
    fn count_mismatch_warns_and_trusts_pairs() {
        let mut log = IssueLog::new("test");
        let cycles = table().cycles_for("15", AnnotationKey::Trial("2"), &mut log).unwrap();
        assert_eq!(cycles, vec![(0.2, 0.7)]);
        assert_eq!(log.warning_count(), 1);
    }

    #[test]
    fn absent_subject_warns_with_empty_list() {
        let mut log = IssueLog::new("test");
        let cycles = table().cycles_for("99", AnnotationKey::Trial("1"), &mut log).unwrap();
        assert!(cycles.is_empty());
        assert_eq!(log.warning_count(), 1);
    }

    #[test]
    fn duplicate_subject_is_an_error() {
        let mut log = IssueLog::new("test");
        let err = table().cycles_for("17", AnnotationKey::Trial("1"), &mut log).unwrap_err();
        assert!(err.to_string().contains("appears 2 times"));
    }

    #[test]
    fn lists_trials_of_a_subject() {
        assert_eq!(table().trials_for("15"), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn missing_count_column_is_a_config_error() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![vec![text("ID"), text("Run"), text("Swing (ti)"), text("Stance (te)")]],
        );
        let err = AnnotationTable::from_sheet(Path::new("t.xlsx"), sheet).unwrap_err();
        assert!(matches!(err, crate::error::GaitError::Config(ConfigError::MissingColumn { .. })));
    }

    #[test]
    fn latency_columns_pair_by_suffix_not_position() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![
                    text("ID"),
                    text("Run"),
                    text("SC Number"),
                    text("Swing (ti).1"),
                    text("Stance (te)"),
                    text("Swing (ti)"),
                    text("Stance (te).1"),
                ],
                vec![num(15.0), num(1.0), num(2.0), num(0.6), num(0.5), num(0.1), num(1.0)],
            ],
        );
        let t = AnnotationTable::from_sheet(Path::new("t.xlsx"), sheet).unwrap();
        let mut log = IssueLog::new("15");
        let cycles = t.cycles_for("15", AnnotationKey::Trial("1"), &mut log).unwrap();
        assert_eq!(cycles, vec![(0.1, 0.5), (0.6, 1.0)]);
    }

    #[test]
    fn unpaired_latency_column_is_a_config_error() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![vec![
                text("ID"),
                text("Run"),
                text("SC Number"),
                text("Swing (ti)"),
                text("Stance (te)"),
                text("Swing (ti).1"),
                text("Stance (te).2"),
            ]],
        );
        let err = AnnotationTable::from_sheet(Path::new("t.xlsx"), sheet).unwrap_err();
        assert!(matches!(err, crate::error::GaitError::Config(ConfigError::MissingColumn { .. })));
    }

    #[test]
    fn side_rows_are_matched_in_3d_layout() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![text("Subject"), text("Leg"), text("Number of SCs"), text("Swing (ti)"), text("Stance (te)")],
                vec![text("SK1"), text("Left"), num(1.0), num(0.1), num(0.4)],
                vec![Cell::Empty, text("Right"), num(1.0), num(0.2), num(0.5)],
            ],
        );
        let t = AnnotationTable::from_sheet(Path::new("t.xlsx"), sheet).unwrap();
        let mut log = IssueLog::new("SK1");
        let right = t.cycles_for("SK1", AnnotationKey::Side(Side::Right), &mut log).unwrap();
        assert_eq!(right, vec![(0.2, 0.5)]);
        assert!(t.cycles_for("SK1", AnnotationKey::Trial("1"), &mut log).is_err());
    }
}
