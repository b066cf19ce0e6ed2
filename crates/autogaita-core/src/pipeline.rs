//! Per-subject orchestration.
//!
//! [`run_dlc_subject`] and [`run_3d_subject`] chain the components for one
//! invocation: annotation lookup, coordinate loading, configuration
//! validation, preprocessing, cycle extraction, feature building,
//! normalisation, aggregation and export. Any error aborts the invocation,
//! is written to the subject's `Issues.txt`, and is returned to the caller
//! as `None`; no result tables are written in that case.

use std::path::Path;
use tracing::{info, warn};

use crate::aggregate::{is_averaged, summarise, Cycle, StepTable};
use crate::annotation::{AnnotationKey, AnnotationTable};
use crate::config::{ConfigValidator, FolderInfo, GaitConfig, ResolvedConfig, SubjectInfo};
use crate::coordinates::{load_3d, load_dlc, CoordinateFrame};
use crate::cycles::{slice_cycles, StepCycleExtractor};
use crate::error::{ConfigError, GaitError, GaitResult};
use crate::export::{combine_sides, export_subject, SheetTables, SubjectTables, DEFAULT_SHEET};
use crate::features::FeatureBuilder;
use crate::issues::{Issue, IssueLog, Severity};
use crate::joint::{is_other_side, Side, Tracker};
use crate::normalize::normalise_cycle;
use crate::preprocess::Preprocessor;
use crate::sheet::SheetFormat;
use crate::table::Table;

/// Analyse one 2D subject/trial. Returns `None` when the invocation aborts.
pub fn run_dlc_subject(info: &SubjectInfo, folder: &FolderInfo, cfg: &GaitConfig) -> Option<SubjectTables> {
    run_logged(info, |log| analyse_dlc(info, folder, cfg, log))
}

/// Analyse one 3D subject. Returns `None` when the invocation aborts.
pub fn run_3d_subject(info: &SubjectInfo, folder: &FolderInfo, cfg: &GaitConfig) -> Option<SubjectTables> {
    run_logged(info, |log| analyse_3d(info, folder, cfg, log))
}

fn run_logged(
    info: &SubjectInfo,
    analyse: impl FnOnce(&mut IssueLog) -> GaitResult<SubjectTables>,
) -> Option<SubjectTables> {
    let mut log = IssueLog::new(&info.name);
    match analyse(&mut log) {
        Ok(tables) => {
            info!(subject = %info.name, warnings = log.warning_count(), "analysis complete");
            Some(tables)
        }
        Err(e) => {
            if log.path().is_none() {
                if let Err(io) = std::fs::create_dir_all(&info.results_dir) {
                    warn!(subject = %info.name, "cannot create {}: {io}", info.results_dir.display());
                } else if let Err(io) = log.attach(&info.results_dir) {
                    warn!(subject = %info.name, "cannot write issues log: {io}");
                }
            }
            log.error(format!("{e}; skipping {}", info.name));
            None
        }
    }
}

fn annotation_path(folder: &FolderInfo) -> std::path::PathBuf {
    folder.root_dir.join(&folder.sctable_filename)
}

/// Validate `cfg` against the loaded columns, recording repairs in `log`.
fn resolve_config(
    cfg: &GaitConfig,
    tracker: Tracker,
    frame: &CoordinateFrame,
    log: &mut IssueLog,
) -> GaitResult<ResolvedConfig> {
    match ConfigValidator::new(cfg, tracker, frame.table.columns()).resolve() {
        Ok(validated) => {
            for issue in validated.warnings {
                log.record(issue);
            }
            Ok(validated.config)
        }
        Err(issues) => {
            let (errors, warnings): (Vec<Issue>, Vec<Issue>) =
                issues.into_iter().partition(|i| i.severity == Severity::Error);
            for issue in warnings {
                log.record(issue);
            }
            let reason = errors.iter().map(|i| i.message.as_str()).collect::<Vec<_>>().join("; ");
            Err(ConfigError::invalid_value("configuration", reason).into())
        }
    }
}

/// Replace the previous results of this invocation with an empty directory
/// and bind the issues log to it.
fn prepare_results_dir(dir: &Path, log: &mut IssueLog) -> GaitResult<()> {
    let mut removal_failed = None;
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            removal_failed = Some(e);
        }
    }
    std::fs::create_dir_all(dir).map_err(|e| GaitError::io(dir, e))?;
    log.attach(dir)?;
    if let Some(e) = removal_failed {
        log.warn(format!("Could not remove previous results in {}: {e}", dir.display()));
    }
    Ok(())
}

/// Feature tables of `cycles`, their normalised versions and summary.
fn analyse_cycles(
    cfg: &ResolvedConfig,
    table: &Table,
    cycles: &[(usize, usize)],
    side: Option<Side>,
    sheet: &str,
) -> GaitResult<SheetTables> {
    let builder = FeatureBuilder::new(cfg);
    let mut original = Vec::with_capacity(cycles.len());
    let mut normalised = Vec::with_capacity(cycles.len());
    for raw in slice_cycles(table, cycles) {
        let built = builder.build(&raw, side)?;
        let binned = normalise_cycle(&built, cfg.bin_num)?;
        match side {
            Some(leg) => {
                original.push(Cycle::with_leg(built, leg));
                normalised.push(Cycle::with_leg(binned, leg));
            }
            None => {
                original.push(Cycle::new(built));
                normalised.push(Cycle::new(binned));
            }
        }
    }
    let normalised = StepTable::new(normalised);
    let horizontal = cfg.analyse_average_horizontal();
    let summary = summarise(&normalised, cfg.bin_num, |c| is_averaged(c, cfg.tracker, horizontal))?;
    Ok(SheetTables { sheet: sheet.to_string(), original: StepTable::new(original), normalised, summary })
}

fn finish(
    info: &SubjectInfo,
    cfg: &ResolvedConfig,
    tables: SubjectTables,
) -> GaitResult<SubjectTables> {
    cfg.write_json(&info.results_dir)?;
    let format = SheetFormat::from_save_to_xls(cfg.options.save_to_xls);
    export_subject(&info.results_dir, &info.name, &tables, format)?;
    Ok(tables)
}

// ---------------------------------------------------------------------------
// 2D
// ---------------------------------------------------------------------------

fn analyse_dlc(
    info: &SubjectInfo,
    folder: &FolderInfo,
    cfg: &GaitConfig,
    log: &mut IssueLog,
) -> GaitResult<SubjectTables> {
    cfg.validate()?;
    let annotation = AnnotationTable::load(&annotation_path(folder))?;
    let latencies = annotation.cycles_for(&info.mouse_num, AnnotationKey::Trial(&info.run_num), log)?;
    if latencies.is_empty() {
        return Err(GaitError::NoCycles { subject: info.name.clone() });
    }
    let frame = load_dlc(folder, &info.mouse_num, &info.run_num, cfg.subtract_beam, log)?;
    let resolved = resolve_config(cfg, Tracker::Dlc, &frame, log)?;
    prepare_results_dir(&info.results_dir, log)?;

    let table = Preprocessor::new(&resolved).run(frame, log)?;
    let cycles = StepCycleExtractor::new(&resolved).extract(&latencies, &table, None, log)?;
    let sheet = analyse_cycles(&resolved, &table, &cycles, None, DEFAULT_SHEET)?;
    finish(info, &resolved, SubjectTables { sheets: vec![sheet] })
}

// ---------------------------------------------------------------------------
// 3D
// ---------------------------------------------------------------------------

fn analyse_3d(
    info: &SubjectInfo,
    folder: &FolderInfo,
    cfg: &GaitConfig,
    log: &mut IssueLog,
) -> GaitResult<SubjectTables> {
    cfg.validate()?;
    let annotation = AnnotationTable::load(&annotation_path(folder))?;
    let frame = load_3d(folder, &info.mouse_num)?;
    let resolved = resolve_config(cfg, Tracker::Simi, &frame, log)?;
    prepare_results_dir(&info.results_dir, log)?;

    let table = Preprocessor::new(&resolved).run(frame, log)?;
    let extractor = StepCycleExtractor::new(&resolved);
    let mut sides = Vec::with_capacity(2);
    for side in Side::BOTH {
        let latencies = annotation.cycles_for(&info.mouse_num, AnnotationKey::Side(side), log)?;
        if latencies.is_empty() {
            continue;
        }
        let cycles = match extractor.extract(&latencies, &table, Some(side), log) {
            Ok(cycles) => cycles,
            Err(GaitError::NoCycles { subject }) => {
                log.warn(format!("No step cycles left for {subject}"));
                continue;
            }
            Err(e) => return Err(e),
        };
        let mut side_table = table.clone();
        side_table.retain_columns(|c| !is_other_side(c, side));
        sides.push(analyse_cycles(&resolved, &side_table, &cycles, Some(side), side.as_str())?);
    }
    if sides.is_empty() {
        return Err(GaitError::NoCycles { subject: info.name.clone() });
    }

    let both = combine_sides(&sides.iter().collect::<Vec<_>>())?;
    sides.push(both);
    finish(info, &resolved, SubjectTables { sheets: sides })
}
