//! Batch subcommands
//!
//! Each invocation of the per-subject pipeline is isolated: a failure (or a
//! panic) is recorded in that subject's `Issues.txt` and the batch moves on.

use anyhow::{Context, Result};
use clap::Args;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use autogaita_core::{
    append_issue, assemble_groups, run_3d_subject, run_dlc_subject, AnnotationTable, FolderInfo,
    GaitConfig, GroupConfig, Issue, IssueLog, SubjectInfo, SubjectTables,
};

/// Arguments for the dlc command
#[derive(Args, Debug)]
pub struct DlcArgs {
    /// Folder information JSON (`root_dir`, file-name conventions)
    #[arg(short, long)]
    pub folderinfo: PathBuf,

    /// Analysis configuration JSON
    #[arg(short, long)]
    pub config: PathBuf,

    /// Only analyse this subject
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Only analyse this trial (requires --subject)
    #[arg(short, long, requires = "subject")]
    pub run: Option<String>,
}

/// Arguments for the simi command
#[derive(Args, Debug)]
pub struct SimiArgs {
    /// Folder information JSON
    #[arg(short, long)]
    pub folderinfo: PathBuf,

    /// Analysis configuration JSON
    #[arg(short, long)]
    pub config: PathBuf,

    /// Only analyse this subject
    #[arg(short, long)]
    pub subject: Option<String>,
}

/// Arguments for the group command
#[derive(Args, Debug)]
pub struct GroupArgs {
    /// Group configuration JSON (`group_names`, `group_dirs`, `results_dir`)
    #[arg(short, long)]
    pub config: PathBuf,
}

/// Outcome counts of a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Invocations that produced result tables.
    pub ok: usize,
    /// Invocations that were aborted.
    pub skipped: usize,
}

impl BatchSummary {
    fn record(&mut self, produced: bool) {
        if produced {
            self.ok += 1;
        } else {
            self.skipped += 1;
        }
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ok / {} skipped", self.ok, self.skipped)
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one invocation, turning a panic into an `Issues.txt` entry.
pub fn run_guarded(info: &SubjectInfo, run: impl FnOnce() -> Option<SubjectTables>) -> bool {
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(result) => result.is_some(),
        Err(payload) => {
            let issue = Issue::error(format!(
                "Unexpected failure while analysing {}: {}",
                info.name,
                panic_message(payload.as_ref())
            ));
            error!(subject = %info.name, "{}", issue.message);
            if let Err(e) = append_issue(&info.results_dir, &issue) {
                error!(subject = %info.name, "cannot record failure: {e}");
            }
            false
        }
    }
}

fn load_inputs(folderinfo: &Path, config: &Path) -> Result<(FolderInfo, GaitConfig, AnnotationTable)> {
    let folder = FolderInfo::from_json(folderinfo)
        .with_context(|| format!("loading folder information from {}", folderinfo.display()))?;
    let cfg = GaitConfig::from_json(config)
        .with_context(|| format!("loading configuration from {}", config.display()))?;
    let annotation = AnnotationTable::load(&folder.root_dir.join(&folder.sctable_filename))
        .context("loading the annotation table")?;
    Ok((folder, cfg, annotation))
}

fn unique_subjects(annotation: &AnnotationTable) -> Vec<String> {
    let mut subjects: Vec<String> = Vec::new();
    for s in annotation.subjects() {
        if !subjects.iter().any(|known| known == s) {
            subjects.push(s.to_string());
        }
    }
    subjects
}

/// Execute the dlc command
pub fn execute_dlc(args: DlcArgs) -> Result<BatchSummary> {
    let (folder, cfg, annotation) = load_inputs(&args.folderinfo, &args.config)?;
    let subjects = match &args.subject {
        Some(s) => vec![s.clone()],
        None => unique_subjects(&annotation),
    };

    let mut summary = BatchSummary::default();
    for subject in &subjects {
        let trials = match &args.run {
            Some(r) => vec![r.clone()],
            None => annotation.trials_for(subject),
        };
        if trials.is_empty() {
            warn!("no trials annotated for subject {subject}");
            summary.record(false);
            continue;
        }
        for run in &trials {
            let info = SubjectInfo::dlc(&folder, subject, run);
            info!("analysing {}", info.name);
            summary.record(run_guarded(&info, || run_dlc_subject(&info, &folder, &cfg)));
        }
    }
    Ok(summary)
}

/// Execute the simi command
pub fn execute_simi(args: SimiArgs) -> Result<BatchSummary> {
    let (folder, cfg, annotation) = load_inputs(&args.folderinfo, &args.config)?;
    let subjects = match &args.subject {
        Some(s) => vec![s.clone()],
        None => unique_subjects(&annotation),
    };

    let mut summary = BatchSummary::default();
    for subject in &subjects {
        let info = SubjectInfo::simi(&folder, subject);
        info!("analysing {}", info.name);
        summary.record(run_guarded(&info, || run_3d_subject(&info, &folder, &cfg)));
    }
    Ok(summary)
}

/// Execute the group command
pub fn execute_group(args: GroupArgs) -> Result<()> {
    let cfg = GroupConfig::from_json(&args.config)
        .with_context(|| format!("loading group configuration from {}", args.config.display()))?;
    let mut log = IssueLog::new("group");
    let groups = assemble_groups(&cfg, &mut log).context("assembling group tables")?;
    for g in &groups {
        println!("{}: {} subjects", g.name, g.subjects.len());
    }
    println!("Group tables written to {}", cfg.results_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_summary_display() {
        let mut s = BatchSummary::default();
        s.record(true);
        s.record(false);
        s.record(true);
        assert_eq!(s.to_string(), "2 ok / 1 skipped");
    }

    #[test]
    fn test_panic_is_recorded_in_issues() {
        let dir = tempdir().unwrap();
        let info = SubjectInfo {
            name: "ID 1 - Run 1".into(),
            mouse_num: "1".into(),
            run_num: "1".into(),
            results_dir: dir.path().join("ID 1 - Run 1"),
        };
        let ok = run_guarded(&info, || panic!("boom"));
        assert!(!ok);
        let issues = std::fs::read_to_string(info.results_dir.join("Issues.txt")).unwrap();
        assert!(issues.contains("boom"));
    }

    #[test]
    fn test_panic_message_of_string_payload() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bad index"));
        assert_eq!(panic_message(payload.as_ref()), "bad index");
    }
}
