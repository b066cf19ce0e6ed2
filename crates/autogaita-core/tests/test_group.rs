//! Integration tests for group assembly.
//!
//! Subjects are first analysed with the per-subject pipeline; the group
//! assembler then re-reads their result folders.

mod common;

use approx::assert_abs_diff_eq;
use std::path::Path;
use tempfile::tempdir;

use autogaita_core::group::{GROUP_CONFIG_FILE, N};
use autogaita_core::sheet::read_first_sheet;
use autogaita_core::{
    assemble_groups, run_dlc_subject, DataError, GaitError, GroupConfig, IssueLog, SubjectInfo,
};

use common::*;

fn analyse(root: &Path, subject: &str, bin_num: usize) {
    let folder = dlc_folder(root);
    let info = SubjectInfo::dlc(&folder, subject, "1");
    run_dlc_subject(&info, &folder, &dlc_config(bin_num)).expect("analysis should succeed");
}

fn group_config(root: &Path) -> GroupConfig {
    GroupConfig {
        group_names: vec!["WT".into()],
        group_dirs: vec![dlc_folder(root).results_root()],
        results_dir: root.join("Group Results"),
        ..GroupConfig::default()
    }
}

/// The grand average is the mean of the subjects' average tables, with an
/// `N` column counting them.
#[test]
fn grand_average_is_mean_over_subjects() {
    let dir = tempdir().unwrap();
    write_dlc_experiment(dir.path());
    analyse(dir.path(), "15", 25);
    analyse(dir.path(), "16", 25);

    let cfg = group_config(dir.path());
    let groups = assemble_groups(&cfg, &mut IssueLog::new("group")).unwrap();
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    let ids: Vec<&str> = group.subjects.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["ID 15 - Run 1", "ID 16 - Run 1"]);

    let grand = &group.grand.average;
    assert_eq!(grand.n_rows(), 25);
    let a = group.subjects[0].average.column("Knee Angle").unwrap();
    let b = group.subjects[1].average.column("Knee Angle").unwrap();
    let g = grand.column("Knee Angle").unwrap();
    for i in 0..25 {
        assert_abs_diff_eq!(g[i], (a[i] + b[i]) / 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            group.grand.std.column("Knee Angle").unwrap()[i],
            (a[i] - b[i]).abs() / 2.0,
            epsilon = 1e-9
        );
    }
    assert!(grand.column(N).unwrap().iter().all(|&n| n == 2.0));
}

/// Every group file is written, and group step tables lead with the subject
/// identifier, the cycle counter and the bin percentage.
#[test]
fn group_files_are_written() {
    let dir = tempdir().unwrap();
    write_dlc_experiment(dir.path());
    analyse(dir.path(), "15", 25);
    analyse(dir.path(), "16", 25);

    let cfg = group_config(dir.path());
    assemble_groups(&cfg, &mut IssueLog::new("group")).unwrap();

    for suffix in [
        "Normalised Group",
        "Original Group",
        "Average Group",
        "Standard Deviation Group",
        "Grand Average Group",
        "Grand Standard Deviation Group",
    ] {
        let path = cfg.results_dir.join(format!("WT - {suffix}.csv"));
        assert!(path.is_file(), "{} missing", path.display());
    }

    let sheet = read_first_sheet(&cfg.results_dir.join("WT - Normalised Group.csv")).unwrap();
    let header: Vec<String> = (0..3).map(|c| sheet.cell(0, c).as_text()).collect();
    assert_eq!(header, vec!["ID", "SC Number", "SC Percentages"]);
    // 2 subjects × 2 cycles × 25 bins, one empty row between subjects
    assert_eq!(sheet.rows.len(), 1 + 100 + 1);
    assert!(sheet.row_is_empty(51));

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(cfg.results_dir.join(GROUP_CONFIG_FILE)).unwrap())
            .unwrap();
    assert_eq!(snapshot["bin_num"], 25);
    assert_eq!(snapshot["subject_counts"]["WT"], 2);
}

/// Subjects normalised to different bin counts cannot be grouped; the error
/// names the offending subject.
#[test]
fn mismatched_bin_num_names_the_subject() {
    let dir = tempdir().unwrap();
    write_dlc_experiment(dir.path());
    analyse(dir.path(), "15", 25);
    analyse(dir.path(), "16", 20);

    let err = assemble_groups(&group_config(dir.path()), &mut IssueLog::new("group")).unwrap_err();
    match err {
        GaitError::Data(DataError::BinNumMismatch { subject, expected, found }) => {
            assert_eq!(subject, "ID 16 - Run 1");
            assert_eq!((expected, found), (25, 20));
        }
        other => panic!("unexpected error {other}"),
    }
}

/// A group directory without analysed subjects is reported.
#[test]
fn empty_group_directory_is_an_error() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("Results")).unwrap();
    let err = assemble_groups(&group_config(dir.path()), &mut IssueLog::new("group")).unwrap_err();
    assert!(matches!(err, GaitError::Data(DataError::NotFound { .. })));
}
