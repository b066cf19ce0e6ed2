//! AutoGaitA Step-Cycle Engine
//!
//! This crate turns pose-tracked coordinate time series of walking subjects
//! into per-subject and per-group step-cycle tables: it loads tracker output
//! and manual swing/stance annotations, extracts and cleans step cycles,
//! computes joint angles and derivatives, normalises every cycle to a fixed
//! number of bins, and writes original, normalised, average and
//! standard-deviation tables.
//!
//! # Features
//!
//! - **2D tracking** (DeepLabCut-style CSV with optional beam baseline)
//! - **3D tracking** (Simi-style workbooks with lateral joints, per-leg sheets)
//! - **Group assembly** with grand average / grand standard deviation tables
//! - **Issues log**: every warning and error lands in the subject's `Issues.txt`
//!
//! # Example
//!
//! ```rust,no_run
//! use autogaita_core::{run_dlc_subject, FolderInfo, GaitConfig, SubjectInfo};
//!
//! let folder = FolderInfo {
//!     root_dir: "/data/beam".into(),
//!     sctable_filename: "SC Latency Table".into(),
//!     data_string: "SIDE".into(),
//!     premouse_string: "Mouse".into(),
//!     prerun_string: "run".into(),
//!     ..FolderInfo::default()
//! };
//! let cfg = GaitConfig { hind_joints: vec!["Hind paw tao".into()], ..GaitConfig::default() };
//! let info = SubjectInfo::dlc(&folder, "15", "3");
//! if let Some(tables) = run_dlc_subject(&info, &folder, &cfg) {
//!     println!("{} sheets written", tables.sheets.len());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod annotation;
pub mod config;
pub mod coordinates;
pub mod cycles;
pub mod error;
pub mod export;
pub mod features;
pub mod group;
pub mod issues;
pub mod joint;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod sheet;
pub mod table;

// Re-export main types for convenience
pub use aggregate::{Cycle, StepTable, Summary};
pub use annotation::{AnnotationKey, AnnotationTable};
pub use config::{ConfigValidator, FolderInfo, GaitConfig, ResolvedConfig, SubjectInfo};
pub use error::{ConfigError, DataError, GaitError, GaitResult};
pub use export::{ResultKind, SheetTables, SubjectTables};
pub use group::{assemble_groups, GroupConfig, GroupTables};
pub use issues::{append_issue, Issue, IssueLog, Severity};
pub use joint::{Side, Tracker};
pub use pipeline::{run_3d_subject, run_dlc_subject};
pub use table::Table;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
