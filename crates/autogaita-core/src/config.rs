//! Analysis configuration and its validation against loaded data.
//!
//! [`GaitConfig`] is the user-facing option bag (deserialized from JSON with
//! defaults for every field). [`ConfigValidator`] checks it against the
//! columns of a loaded coordinate table and produces an immutable
//! [`ResolvedConfig`], which is what every later stage reads and what is
//! persisted as `config.json` next to the results.
//!
//! # Example
//!
//! ```rust
//! use autogaita_core::config::GaitConfig;
//!
//! let cfg = GaitConfig::default();
//! cfg.validate().expect("default config is valid");
//! assert_eq!(cfg.bin_num, 25);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, GaitError, GaitResult};
use crate::issues::Issue;
use crate::joint::{Axis, JointRef, JointSpec, Tracker};

/// File name of the persisted configuration snapshot.
pub const CONFIG_FILE: &str = "config.json";

// ---------------------------------------------------------------------------
// AngleConfig
// ---------------------------------------------------------------------------

/// Joint-angle definitions as three parallel lists.
///
/// Angle `i` is measured at joint `name[i]` between `lower_joint[i]` and
/// `upper_joint[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleConfig {
    /// Joint at which each angle is measured.
    #[serde(default)]
    pub name: Vec<String>,
    /// Lower reference joint of each angle.
    #[serde(default)]
    pub lower_joint: Vec<String>,
    /// Upper reference joint of each angle.
    #[serde(default)]
    pub upper_joint: Vec<String>,
}

// ---------------------------------------------------------------------------
// GaitConfig
// ---------------------------------------------------------------------------

/// Complete per-subject analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitConfig {
    // -----------------------------------------------------------------------
    // Sampling / normalisation
    // -----------------------------------------------------------------------
    /// Frame rate of the tracked video in Hz. Default: **100**.
    pub sampling_rate: u32,

    /// Number of bins each step cycle is normalised to. Default: **25**.
    pub bin_num: usize,

    // -----------------------------------------------------------------------
    // Units and baseline (2D)
    // -----------------------------------------------------------------------
    /// Convert pixel coordinates to millimetres. Default: **false**.
    pub convert_to_mm: bool,

    /// Pixels per millimetre used by `convert_to_mm`. Default: **1.0**.
    pub pixel_to_mm_ratio: f64,

    /// Subtract beam (baseline) heights from joint heights. Default: **false**.
    pub subtract_beam: bool,

    /// Baseline point subtracted from hind joints.
    pub beam_col_left: String,

    /// Baseline point subtracted from fore joints.
    pub beam_col_right: String,

    /// Extra joints that receive the left beam subtraction.
    pub beam_hind_jointadd: Vec<String>,

    /// Extra joints that receive the right beam subtraction.
    pub beam_fore_jointadd: Vec<String>,

    // -----------------------------------------------------------------------
    // Height / direction standardisation
    // -----------------------------------------------------------------------
    /// Zero heights per step cycle instead of per trial. Default: **false**.
    #[serde(rename = "normalise_height_at_SC_level")]
    pub normalise_height_at_sc_level: bool,

    /// Use one joint's minimum as the vertical zero. Default: **false**.
    pub standardise_y_to_a_joint: bool,

    /// Joint used by `standardise_y_to_a_joint`.
    pub y_standardisation_joint: String,

    /// Use one joint's per-cycle minimum as the horizontal zero (2D).
    pub standardise_x_coordinates: bool,

    /// Joint used by `standardise_x_coordinates`.
    pub x_standardisation_joint: String,

    /// Negate vertical coordinates after loading. Default: **false**.
    pub invert_y_axis: bool,

    /// Mirror horizontals of right-to-left walks. Default: **false**.
    pub flip_gait_direction: bool,

    // -----------------------------------------------------------------------
    // Features
    // -----------------------------------------------------------------------
    /// Add horizontal acceleration columns. Default: **false**.
    pub x_acceleration: bool,

    /// Add angular acceleration columns. Default: **false**.
    pub angular_acceleration: bool,

    /// Keep horizontals in 2D average/std tables. Default: **false**.
    pub analyse_average_x: bool,

    /// Keep horizontals in 3D average/std tables. Default: **false**.
    pub analyse_average_y: bool,

    // -----------------------------------------------------------------------
    // Joints
    // -----------------------------------------------------------------------
    /// Primary joints of the 2D tracker.
    pub hind_joints: Vec<String>,

    /// Secondary joints of the 2D tracker.
    pub fore_joints: Vec<String>,

    /// Joints of the 3D tracker.
    pub joints: Vec<String>,

    /// Joint-angle definitions.
    pub angles: AngleConfig,

    // -----------------------------------------------------------------------
    // Quality gate / output
    // -----------------------------------------------------------------------
    /// Largest accepted horizontal jump between samples. Default: **200**.
    pub x_sc_broken_threshold: f64,

    /// Largest accepted vertical jump between samples. Default: **50**.
    pub y_sc_broken_threshold: f64,

    /// Write `.xlsx` workbooks instead of CSV. Default: **false**.
    pub save_to_xls: bool,

    /// Number of joints shown by plot consumers. Default: **3**.
    pub plot_joint_number: usize,
}

impl Default for GaitConfig {
    fn default() -> Self {
        GaitConfig {
            sampling_rate: 100,
            bin_num: 25,
            convert_to_mm: false,
            pixel_to_mm_ratio: 1.0,
            subtract_beam: false,
            beam_col_left: String::new(),
            beam_col_right: String::new(),
            beam_hind_jointadd: Vec::new(),
            beam_fore_jointadd: Vec::new(),
            normalise_height_at_sc_level: false,
            standardise_y_to_a_joint: false,
            y_standardisation_joint: String::new(),
            standardise_x_coordinates: false,
            x_standardisation_joint: String::new(),
            invert_y_axis: false,
            flip_gait_direction: false,
            x_acceleration: false,
            angular_acceleration: false,
            analyse_average_x: false,
            analyse_average_y: false,
            hind_joints: Vec::new(),
            fore_joints: Vec::new(),
            joints: Vec::new(),
            angles: AngleConfig::default(),
            x_sc_broken_threshold: 200.0,
            y_sc_broken_threshold: 50.0,
            save_to_xls: false,
            plot_joint_number: 3,
        }
    }
}

impl GaitConfig {
    /// Load a [`GaitConfig`] from a JSON file and validate it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FileRead`] if the file cannot be read,
    /// [`ConfigError::ParseError`] for malformed JSON (including values of
    /// the wrong type), and any [`GaitConfig::validate`] error.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::FileRead { path: path.to_path_buf(), source })?;
        let cfg: GaitConfig = serde_json::from_str(&contents)
            .map_err(|source| ConfigError::ParseError { path: path.to_path_buf(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check scalar fields. Joint lists are checked by [`ConfigValidator`].
    ///
    /// # Validated invariants
    ///
    /// - `sampling_rate` and `bin_num` are positive.
    /// - `pixel_to_mm_ratio` is positive and finite when `convert_to_mm`.
    /// - Broken-tracking thresholds are positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_rate == 0 {
            return Err(ConfigError::invalid_value("sampling_rate", "must be > 0"));
        }
        if self.bin_num == 0 {
            return Err(ConfigError::invalid_value("bin_num", "must be > 0"));
        }
        if self.convert_to_mm && !(self.pixel_to_mm_ratio.is_finite() && self.pixel_to_mm_ratio > 0.0)
        {
            return Err(ConfigError::invalid_value("pixel_to_mm_ratio", "must be > 0.0"));
        }
        if !(self.x_sc_broken_threshold > 0.0) {
            return Err(ConfigError::invalid_value("x_sc_broken_threshold", "must be > 0.0"));
        }
        if !(self.y_sc_broken_threshold > 0.0) {
            return Err(ConfigError::invalid_value("y_sc_broken_threshold", "must be > 0.0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Invocation records
// ---------------------------------------------------------------------------

/// Where a run finds its inputs and how input files are named.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderInfo {
    /// Directory holding tracker files and the annotation table.
    pub root_dir: PathBuf,
    /// Annotation workbook name (extension optional).
    pub sctable_filename: String,
    /// Substring identifying coordinate files (2D).
    pub data_string: String,
    /// Substring identifying baseline files (2D).
    pub beam_string: String,
    /// Text before the subject number in file names (2D).
    pub premouse_string: String,
    /// Text after the subject number in file names (2D).
    pub postmouse_string: String,
    /// Text before the trial number in file names (2D).
    pub prerun_string: String,
    /// Text after the trial number in file names (2D).
    pub postrun_string: String,
    /// Results root; defaults to `<root_dir>/Results`.
    pub results_dir: Option<PathBuf>,
}

impl FolderInfo {
    /// Load folder information from a JSON file.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::FileRead { path: path.to_path_buf(), source })?;
        serde_json::from_str(&contents)
            .map_err(|source| ConfigError::ParseError { path: path.to_path_buf(), source })
    }

    /// Results root directory.
    pub fn results_root(&self) -> PathBuf {
        self.results_dir.clone().unwrap_or_else(|| self.root_dir.join("Results"))
    }
}

/// Identity of one subject/trial invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInfo {
    /// Output label, e.g. `"ID 15 - Run 3"` (2D) or `"SK1"` (3D).
    pub name: String,
    /// Subject identifier as it appears in file names and the annotation table.
    pub mouse_num: String,
    /// Trial identifier (2D only).
    pub run_num: String,
    /// Output directory of this invocation.
    pub results_dir: PathBuf,
}

impl SubjectInfo {
    /// 2D invocation for subject `mouse_num`, trial `run_num`.
    pub fn dlc(folder: &FolderInfo, mouse_num: &str, run_num: &str) -> Self {
        let name = format!("ID {mouse_num} - Run {run_num}");
        SubjectInfo {
            results_dir: folder.results_root().join(&name),
            name,
            mouse_num: mouse_num.to_string(),
            run_num: run_num.to_string(),
        }
    }

    /// 3D invocation for subject `name`.
    pub fn simi(folder: &FolderInfo, name: &str) -> Self {
        SubjectInfo {
            name: name.to_string(),
            mouse_num: name.to_string(),
            run_num: String::new(),
            results_dir: folder.results_root().join(name),
        }
    }
}

// ---------------------------------------------------------------------------
// ResolvedConfig
// ---------------------------------------------------------------------------

/// One validated angle definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleSpec {
    /// Joint at which the angle is measured.
    pub angle: JointSpec,
    /// Lower reference joint.
    pub lower: JointSpec,
    /// Upper reference joint.
    pub upper: JointSpec,
}

/// Configuration after validation against the loaded columns.
///
/// Immutable once built; every pipeline stage reads from it.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Tracker that produced the data.
    pub tracker: Tracker,
    /// Frame rate in Hz.
    pub sampling_rate: u32,
    /// Bins per normalised step cycle.
    pub bin_num: usize,
    /// Primary joints (hind joints in 2D, joints in 3D), in configured order.
    pub joints: Vec<JointSpec>,
    /// Secondary joints (fore joints in 2D; empty in 3D).
    pub fore_joints: Vec<JointSpec>,
    /// Angles whose three joints all resolved.
    pub angles: Vec<AngleSpec>,
    /// First primary joint; drives direction detection.
    pub direction_joint: JointSpec,
    /// Extra joints receiving the left beam subtraction.
    pub beam_hind_jointadd: Vec<JointSpec>,
    /// Extra joints receiving the right beam subtraction.
    pub beam_fore_jointadd: Vec<JointSpec>,
    /// Joint used as vertical zero, if enabled.
    pub y_standardisation_joint: Option<JointSpec>,
    /// Joint used as horizontal zero, if enabled.
    pub x_standardisation_joint: Option<JointSpec>,
    /// `plot_joint_number` clipped to the joint count.
    pub plot_joint_number: usize,
    /// The original option bag (flags and thresholds).
    pub options: GaitConfig,
}

#[derive(Serialize)]
struct ConfigSnapshot<'a> {
    tracking_software: &'static str,
    sampling_rate: u32,
    bin_num: usize,
    joints: Vec<&'a str>,
    fore_joints: Vec<&'a str>,
    angles: AngleConfig,
    direction_joint: &'a str,
    convert_to_mm: bool,
    pixel_to_mm_ratio: f64,
    subtract_beam: bool,
    beam_col_left: &'a str,
    beam_col_right: &'a str,
    beam_hind_jointadd: Vec<&'a str>,
    beam_fore_jointadd: Vec<&'a str>,
    #[serde(rename = "normalise_height_at_SC_level")]
    normalise_height_at_sc_level: bool,
    standardise_y_to_a_joint: bool,
    y_standardisation_joint: &'a str,
    standardise_x_coordinates: bool,
    x_standardisation_joint: &'a str,
    invert_y_axis: bool,
    flip_gait_direction: bool,
    x_acceleration: bool,
    angular_acceleration: bool,
    analyse_average_x: bool,
    analyse_average_y: bool,
    x_sc_broken_threshold: f64,
    y_sc_broken_threshold: f64,
    save_to_xls: bool,
    plot_joint_number: usize,
}

fn names(joints: &[JointSpec]) -> Vec<&str> {
    joints.iter().map(|j| j.name.as_str()).collect()
}

impl ResolvedConfig {
    /// Pixel/mm divisor applied to coordinates (1.0 when not converting).
    pub fn unit_divisor(&self) -> f64 {
        if self.options.convert_to_mm { self.options.pixel_to_mm_ratio } else { 1.0 }
    }

    /// Whether horizontals are kept in average/std tables.
    pub fn analyse_average_horizontal(&self) -> bool {
        match self.tracker {
            Tracker::Dlc => self.options.analyse_average_x,
            Tracker::Simi => self.options.analyse_average_y,
        }
    }

    /// Serialize the resolved configuration with stable key order.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let o = &self.options;
        let snapshot = ConfigSnapshot {
            tracking_software: self.tracker.as_str(),
            sampling_rate: self.sampling_rate,
            bin_num: self.bin_num,
            joints: names(&self.joints),
            fore_joints: names(&self.fore_joints),
            angles: AngleConfig {
                name: self.angles.iter().map(|a| a.angle.name.clone()).collect(),
                lower_joint: self.angles.iter().map(|a| a.lower.name.clone()).collect(),
                upper_joint: self.angles.iter().map(|a| a.upper.name.clone()).collect(),
            },
            direction_joint: &self.direction_joint.name,
            convert_to_mm: o.convert_to_mm,
            pixel_to_mm_ratio: o.pixel_to_mm_ratio,
            subtract_beam: o.subtract_beam,
            beam_col_left: o.beam_col_left.trim(),
            beam_col_right: o.beam_col_right.trim(),
            beam_hind_jointadd: names(&self.beam_hind_jointadd),
            beam_fore_jointadd: names(&self.beam_fore_jointadd),
            normalise_height_at_sc_level: o.normalise_height_at_sc_level,
            standardise_y_to_a_joint: o.standardise_y_to_a_joint,
            y_standardisation_joint: self
                .y_standardisation_joint
                .as_ref()
                .map_or("", |j| j.name.as_str()),
            standardise_x_coordinates: o.standardise_x_coordinates,
            x_standardisation_joint: self
                .x_standardisation_joint
                .as_ref()
                .map_or("", |j| j.name.as_str()),
            invert_y_axis: o.invert_y_axis,
            flip_gait_direction: o.flip_gait_direction,
            x_acceleration: o.x_acceleration,
            angular_acceleration: o.angular_acceleration,
            analyse_average_x: o.analyse_average_x,
            analyse_average_y: o.analyse_average_y,
            x_sc_broken_threshold: o.x_sc_broken_threshold,
            y_sc_broken_threshold: o.y_sc_broken_threshold,
            save_to_xls: o.save_to_xls,
            plot_joint_number: self.plot_joint_number,
        };
        serde_json::to_string_pretty(&snapshot)
    }

    /// Write `config.json` into `dir`.
    pub fn write_json(&self, dir: &Path) -> GaitResult<PathBuf> {
        let path = dir.join(CONFIG_FILE);
        let json = self
            .to_json_string()
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| GaitError::io(&path, e))?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// ConfigValidator
// ---------------------------------------------------------------------------

/// Outcome of a successful validation: the configuration plus the warnings
/// produced while repairing it.
#[derive(Debug, Clone)]
pub struct Validated {
    /// The resolved configuration.
    pub config: ResolvedConfig,
    /// Repairs that were applied (removed joints, truncated lists, ...).
    pub warnings: Vec<Issue>,
}

/// Checks and repairs a [`GaitConfig`] against the loaded columns.
pub struct ConfigValidator<'a> {
    cfg: &'a GaitConfig,
    tracker: Tracker,
    columns: &'a [String],
    warnings: Vec<Issue>,
    errors: Vec<Issue>,
}

/// Trim, drop empty entries and duplicates, keep order.
fn canonical_names(list: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in list.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

impl<'a> ConfigValidator<'a> {
    /// Validator for `cfg` against a table with `columns`.
    pub fn new(cfg: &'a GaitConfig, tracker: Tracker, columns: &'a [String]) -> Self {
        ConfigValidator { cfg, tracker, columns, warnings: Vec::new(), errors: Vec::new() }
    }

    fn resolve_list(&mut self, field: &str, list: &[String]) -> Vec<JointSpec> {
        let mut kept = Vec::new();
        let mut removed = Vec::new();
        for name in canonical_names(list) {
            match JointSpec::resolve(&name, self.tracker, self.columns) {
                Some(spec) => kept.push(spec),
                None => removed.push(name),
            }
        }
        if !removed.is_empty() {
            self.warnings.push(Issue::warning(format!(
                "Removed {} from {field} because their columns were not found in the data",
                removed.join(", ")
            )));
        }
        kept
    }

    fn resolve_single(&mut self, field: &str, name: &str) -> Option<JointSpec> {
        let name = name.trim();
        let found = JointSpec::resolve(name, self.tracker, self.columns);
        if found.is_none() {
            self.errors.push(Issue::error(format!(
                "{field} `{name}` was not found in the data"
            )));
        }
        found
    }

    fn resolve_angles(&mut self) -> Vec<AngleSpec> {
        let cfg = self.cfg;
        let a = &cfg.angles;
        let n = a.name.len().min(a.lower_joint.len()).min(a.upper_joint.len());
        if a.name.len() != n || a.lower_joint.len() != n || a.upper_joint.len() != n {
            self.warnings.push(Issue::warning(format!(
                "Angle lists have unequal lengths ({}, {}, {}); using the first {n} angles",
                a.name.len(),
                a.lower_joint.len(),
                a.upper_joint.len()
            )));
        }
        let mut kept = Vec::new();
        let mut removed = Vec::new();
        for i in 0..n {
            let triplet = [&a.name[i], &a.lower_joint[i], &a.upper_joint[i]];
            if triplet.iter().any(|s| s.trim().is_empty()) {
                continue;
            }
            let resolved: Vec<Option<JointSpec>> = triplet
                .iter()
                .map(|s| JointSpec::resolve(s.trim(), self.tracker, self.columns))
                .collect();
            match resolved.as_slice() {
                [Some(angle), Some(lower), Some(upper)] => kept.push(AngleSpec {
                    angle: angle.clone(),
                    lower: lower.clone(),
                    upper: upper.clone(),
                }),
                _ => removed.push(a.name[i].trim().to_string()),
            }
        }
        if !removed.is_empty() {
            self.warnings.push(Issue::warning(format!(
                "Removed angles {} because one of their joints was not found in the data",
                removed.join(", ")
            )));
        }
        kept
    }

    fn check_beam(&mut self, field: &str, name: &str) {
        let name = name.trim();
        let column = JointRef::central(name).column(self.tracker, Axis::Vertical);
        if name.is_empty() || !self.columns.iter().any(|c| *c == column) {
            self.errors.push(Issue::error(format!(
                "{field} `{name}` was not found in the baseline data"
            )));
        }
    }

    /// Warnings first, then errors.
    fn into_issues(self) -> Vec<Issue> {
        let mut issues = self.warnings;
        issues.extend(self.errors);
        issues
    }

    /// Validate and repair.
    ///
    /// Returns the resolved configuration with its warnings, or every issue
    /// raised when the configuration is unusable (every joint rejected, a
    /// standardisation/beam joint missing, invalid scalars).
    pub fn resolve(mut self) -> Result<Validated, Vec<Issue>> {
        let cfg = self.cfg;
        if let Err(e) = cfg.validate() {
            return Err(vec![Issue::error(e.to_string())]);
        }

        let joints = match self.tracker {
            Tracker::Dlc => self.resolve_list("hind_joints", &cfg.hind_joints),
            Tracker::Simi => self.resolve_list("joints", &cfg.joints),
        };
        let fore_joints = match self.tracker {
            Tracker::Dlc => self.resolve_list("fore_joints", &cfg.fore_joints),
            Tracker::Simi => Vec::new(),
        };
        let angles = self.resolve_angles();

        let mut beam_hind_jointadd = Vec::new();
        let mut beam_fore_jointadd = Vec::new();
        if cfg.subtract_beam && self.tracker == Tracker::Dlc {
            self.check_beam("beam_col_left", &cfg.beam_col_left);
            self.check_beam("beam_col_right", &cfg.beam_col_right);
            beam_hind_jointadd = self.resolve_list("beam_hind_jointadd", &cfg.beam_hind_jointadd);
            beam_fore_jointadd = self.resolve_list("beam_fore_jointadd", &cfg.beam_fore_jointadd);
        }

        let y_standardisation_joint = if cfg.standardise_y_to_a_joint {
            self.resolve_single("y_standardisation_joint", &cfg.y_standardisation_joint)
        } else {
            None
        };
        let x_standardisation_joint =
            if cfg.standardise_x_coordinates && self.tracker == Tracker::Dlc {
                self.resolve_single("x_standardisation_joint", &cfg.x_standardisation_joint)
            } else {
                None
            };

        let Some(direction_joint) = joints.first().cloned() else {
            self.errors.push(Issue::error(ConfigError::NoJoints.to_string()));
            return Err(self.into_issues());
        };
        if !self.errors.is_empty() {
            return Err(self.into_issues());
        }

        let plot_joint_number = cfg.plot_joint_number.min(joints.len());
        let config = ResolvedConfig {
            tracker: self.tracker,
            sampling_rate: self.cfg.sampling_rate,
            bin_num: self.cfg.bin_num,
            joints,
            fore_joints,
            angles,
            direction_joint,
            beam_hind_jointadd,
            beam_fore_jointadd,
            y_standardisation_joint,
            x_standardisation_joint,
            plot_joint_number,
            options: cfg.clone(),
        };
        Ok(Validated { config, warnings: self.warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dlc_columns() -> Vec<String> {
        ["Hip x", "Hip y", "Hip likelihood", "Knee x", "Knee y", "Ankle x", "Ankle y"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn dlc_cfg() -> GaitConfig {
        GaitConfig {
            hind_joints: vec!["Hip ".into(), "".into(), "Knee".into(), "Tail".into()],
            angles: AngleConfig {
                name: vec!["Knee".into(), "Ankle".into()],
                lower_joint: vec!["Ankle".into(), "Toe".into()],
                upper_joint: vec!["Hip".into(), "Knee".into(), "extra".into()],
            },
            ..GaitConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        GaitConfig::default().validate().expect("default config should be valid");
    }

    #[test]
    fn zero_bin_num_is_invalid() {
        let cfg = GaitConfig { bin_num: 0, ..GaitConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_ratio_is_invalid_only_when_converting() {
        let mut cfg = GaitConfig { pixel_to_mm_ratio: 0.0, ..GaitConfig::default() };
        assert!(cfg.validate().is_ok());
        cfg.convert_to_mm = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn resolve_trims_and_drops_missing_joints() {
        let columns = dlc_columns();
        let cfg = dlc_cfg();
        let validated = ConfigValidator::new(&cfg, Tracker::Dlc, &columns).resolve().unwrap();
        let c = &validated.config;
        assert_eq!(names(&c.joints), vec!["Hip", "Knee"]);
        assert_eq!(c.direction_joint.name, "Hip");
        // Angle lists truncated to 2; the Toe angle is removed.
        assert_eq!(c.angles.len(), 1);
        assert_eq!(c.angles[0].angle.name, "Knee");
        assert!(validated.warnings.iter().any(|w| w.message.contains("Tail")));
        assert!(validated.warnings.iter().any(|w| w.message.contains("unequal lengths")));
        assert_eq!(c.plot_joint_number, 2);
    }

    #[test]
    fn empty_joint_list_is_an_error() {
        let columns = dlc_columns();
        let cfg = GaitConfig { hind_joints: vec!["Nose".into()], ..GaitConfig::default() };
        let issues = ConfigValidator::new(&cfg, Tracker::Dlc, &columns).resolve().unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("None of the configured joints")));
    }

    #[test]
    fn missing_standardisation_joint_is_an_error() {
        let columns = dlc_columns();
        let cfg = GaitConfig {
            standardise_y_to_a_joint: true,
            y_standardisation_joint: "Toe".into(),
            ..dlc_cfg()
        };
        assert!(ConfigValidator::new(&cfg, Tracker::Dlc, &columns).resolve().is_err());
    }

    #[test]
    fn snapshot_has_stable_keys() {
        let dir = tempdir().unwrap();
        let columns = dlc_columns();
        let cfg = dlc_cfg();
        let resolved = ConfigValidator::new(&cfg, Tracker::Dlc, &columns).resolve().unwrap().config;
        let path = resolved.write_json(dir.path()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["tracking_software"], "DLC");
        assert_eq!(value["sampling_rate"], 100);
        assert_eq!(value["bin_num"], 25);
        assert_eq!(value["joints"], serde_json::json!(["Hip", "Knee"]));
        assert_eq!(value["angles"]["name"], serde_json::json!(["Knee"]));
        assert_eq!(value["normalise_height_at_SC_level"], false);
    }

    #[test]
    fn failed_snapshot_write_is_an_io_error() {
        let dir = tempdir().unwrap();
        let columns = dlc_columns();
        let resolved = ConfigValidator::new(&dlc_cfg(), Tracker::Dlc, &columns).resolve().unwrap().config;
        let missing = dir.path().join("not-created");
        match resolved.write_json(&missing) {
            Err(GaitError::Io { path, .. }) => assert_eq!(path, missing.join(CONFIG_FILE)),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn json_round_trip_uses_defaults_for_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"bin_num": 50, "hind_joints": ["Hip"]}"#).unwrap();
        let cfg = GaitConfig::from_json(&path).unwrap();
        assert_eq!(cfg.bin_num, 50);
        assert_eq!(cfg.sampling_rate, 100);
        assert_eq!(cfg.hind_joints, vec!["Hip".to_string()]);
    }

    #[test]
    fn malformed_values_are_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"bin_num": "many"}"#).unwrap();
        assert!(matches!(GaitConfig::from_json(&path), Err(ConfigError::ParseError { .. })));
    }
}
