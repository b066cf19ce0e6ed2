//! Fixture builders shared by the integration tests.
//!
//! Every fixture is deterministic: coordinates are smooth closed-form
//! trajectories sampled at 100 Hz.

#![allow(dead_code)]

use std::path::Path;

use autogaita_core::config::AngleConfig;
use autogaita_core::sheet::{write_table_sheets, Cell, RawSheet, SheetFormat};
use autogaita_core::{FolderInfo, GaitConfig};

pub const ANNOTATION_FILE: &str = "SC Latency Table.csv";

/// Folder conventions of the 2D fixtures: `Mouse<n>_run<r>-SIDE.csv`.
pub fn dlc_folder(root: &Path) -> FolderInfo {
    FolderInfo {
        root_dir: root.to_path_buf(),
        sctable_filename: ANNOTATION_FILE.into(),
        data_string: "SIDE".into(),
        beam_string: "BEAM".into(),
        premouse_string: "Mouse".into(),
        postmouse_string: "_".into(),
        prerun_string: "run".into(),
        postrun_string: "-".into(),
        ..FolderInfo::default()
    }
}

/// Knee angle between ankle (lower) and hip (upper).
pub fn knee_angle() -> AngleConfig {
    AngleConfig {
        name: vec!["Knee".into()],
        lower_joint: vec!["Ankle".into()],
        upper_joint: vec!["Hip".into()],
    }
}

pub fn dlc_config(bin_num: usize) -> GaitConfig {
    GaitConfig {
        bin_num,
        hind_joints: vec!["Hip".into(), "Knee".into(), "Ankle".into()],
        angles: knee_angle(),
        ..GaitConfig::default()
    }
}

pub fn simi_config() -> GaitConfig {
    GaitConfig {
        joints: vec!["Hip".into(), "Knee".into(), "Ankle".into()],
        angles: knee_angle(),
        ..GaitConfig::default()
    }
}

/// A 2D tracker CSV of `n` samples walking left to right.
pub fn dlc_csv(n: usize, offset: f64) -> String {
    let joints = ["Hip", "Knee", "Ankle"];
    let mut s = String::from("scorer");
    for _ in 0..joints.len() * 3 {
        s.push_str(",net");
    }
    s.push_str("\nbodyparts");
    for j in joints {
        for _ in 0..3 {
            s.push_str(&format!(",{j}"));
        }
    }
    s.push_str("\ncoords");
    for _ in joints {
        s.push_str(",x,y,likelihood");
    }
    s.push('\n');
    for i in 0..n {
        let t = i as f64;
        let hip = (10.0 + 2.0 * t + offset, 40.0 + 3.0 * (0.3 * t).sin());
        let knee = (hip.0 + 4.0, hip.1 - 15.0 + (0.3 * t).cos());
        let ankle = (hip.0 + 1.0, 5.0 + 2.0 * (0.3 * t).sin().abs());
        s.push_str(&format!(
            "{i},{},{},0.99,{},{},0.98,{},{},0.97\n",
            hip.0, hip.1, knee.0, knee.1, ankle.0, ankle.1
        ));
    }
    s
}

/// A 2D baseline CSV of `n` samples: left beam at height 4, right beam at 1.
pub fn beam_csv(n: usize) -> String {
    let mut s = String::from("scorer,net,net,net,net,net,net\n");
    s.push_str("bodyparts,BeamL,BeamL,BeamL,BeamR,BeamR,BeamR\n");
    s.push_str("coords,x,y,likelihood,x,y,likelihood\n");
    for i in 0..n {
        s.push_str(&format!("{i},0,4,1,0,1,1\n"));
    }
    s
}

/// Raw height of the hip in [`dlc_csv`] at sample `i`.
pub fn raw_hip_y(i: usize) -> f64 {
    40.0 + 3.0 * (0.3 * i as f64).sin()
}

/// Two subjects, one trial each. Subject 15's third cycle ends past the data.
pub const DLC_ANNOTATION: &str = "\
ID,Run,SC Number,Swing (ti),Stance (te),Swing (ti).1,Stance (te).1,Swing (ti).2,Stance (te).2
15,1,3,0.05,0.35,0.35,0.7,0.8,1.5
16,1,2,0.1,0.4,0.45,0.9,,
";

/// Write the 2D experiment (subjects 15 and 16, 100 samples each).
pub fn write_dlc_experiment(root: &Path) {
    std::fs::write(root.join("Mouse15_run1-SIDE.csv"), dlc_csv(100, 0.0)).unwrap();
    std::fs::write(root.join("Mouse16_run1-SIDE.csv"), dlc_csv(100, 7.0)).unwrap();
    std::fs::write(root.join(ANNOTATION_FILE), DLC_ANNOTATION).unwrap();
}

/// A 3D workbook `SK1.xlsx` with lateral hip, knee and ankle.
pub fn write_simi_experiment(root: &Path) {
    let n = 120;
    let mut header = vec![Cell::Text("Time".into())];
    for joint in ["Hip", "Knee", "Ankle"] {
        for side in ["left", "right"] {
            header.push(Cell::Text(format!("{joint}, {side} Y")));
            header.push(Cell::Text(format!("{joint}, {side} Z")));
        }
    }
    let mut rows = vec![header];
    for i in 0..n {
        let t = i as f64;
        let mut row = vec![Cell::Number(t / 100.0)];
        for (j, lift) in [(0.0, 60.0), (3.0, 35.0), (1.0, 4.0)] {
            for phase in [0.0, 1.5] {
                let y = 5.0 + 1.5 * t + j;
                let z = lift + 2.0 * (0.25 * t + phase).sin();
                row.push(Cell::Number(y));
                row.push(Cell::Number(z));
            }
        }
        rows.push(row);
    }
    write_table_sheets(&root.join("SK1"), &[RawSheet::new("Sheet1", rows)], SheetFormat::Xlsx)
        .unwrap();
    std::fs::write(
        root.join(ANNOTATION_FILE),
        "ID,Leg,SC Number,Swing (ti),Stance (te),Swing (ti).1,Stance (te).1\n\
         SK1,left,2,0.0,0.3,0.4,0.8\n\
         ,right,1,0.1,0.5,,\n",
    )
    .unwrap();
}

pub fn simi_folder(root: &Path) -> FolderInfo {
    FolderInfo {
        root_dir: root.to_path_buf(),
        sctable_filename: ANNOTATION_FILE.into(),
        ..FolderInfo::default()
    }
}
