//! Trial-level preprocessing of a loaded coordinate frame.
//!
//! Steps run in a fixed order:
//!
//! 1. invert verticals (`invert_y_axis`);
//! 2. zero verticals at the global (or standardisation joint's) minimum
//!    unless a baseline is subtracted; in 3D also make horizontals
//!    non-negative;
//! 3. convert pixels to millimetres (`convert_to_mm`);
//! 4. detect the walking direction and mirror horizontals (2D,
//!    `flip_gait_direction`);
//! 5. subtract baseline heights and drop baseline columns (2D,
//!    `subtract_beam`);
//! 6. recompute the `Time` column.

use ndarray::Array1;
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::coordinates::CoordinateFrame;
use crate::error::{DataError, GaitResult};
use crate::issues::IssueLog;
use crate::joint::{Axis, JointRef, JointSpec, Side, Tracker};
use crate::table::{Table, FLIPPED, TIME};

/// Samples averaged when looking for a confident entry/exit window.
pub const DIRECTION_WINDOW: usize = 5;
/// Mean likelihood a direction window must reach.
pub const DIRECTION_CONFIDENCE: f64 = 0.9;

/// Walking direction of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Horizontal coordinates increase over the trial.
    LeftToRight,
    /// Horizontal coordinates decrease over the trial.
    RightToLeft,
}

/// `Time` values `round(i / rate)` with 2, 3 or 4 decimals depending on the
/// sampling rate.
pub fn time_column(n_rows: usize, sampling_rate: u32) -> Array1<f64> {
    let decimals = match sampling_rate {
        0..=100 => 2,
        101..=1000 => 3,
        _ => 4,
    };
    let scale = 10f64.powi(decimals);
    let rate = f64::from(sampling_rate);
    Array1::from_iter((0..n_rows).map(|i| (i as f64 / rate * scale).round() / scale))
}

/// Every column of `spec` on `axis`: both sides for lateral 3D joints.
pub fn joint_columns(spec: &JointSpec, tracker: Tracker, axis: Axis) -> Vec<String> {
    if spec.lateral {
        Side::BOTH.iter().map(|&s| spec.at(Some(s)).column(tracker, axis)).collect()
    } else {
        vec![spec.at(None).column(tracker, axis)]
    }
}

/// Applies the trial-level preprocessing steps of a [`ResolvedConfig`].
pub struct Preprocessor<'a> {
    cfg: &'a ResolvedConfig,
}

impl<'a> Preprocessor<'a> {
    /// Create a preprocessor for `cfg`.
    pub fn new(cfg: &'a ResolvedConfig) -> Self {
        Preprocessor { cfg }
    }

    fn subtracts_beam(&self) -> bool {
        self.cfg.tracker == Tracker::Dlc && self.cfg.options.subtract_beam
    }

    /// Run every step and return the preprocessed table.
    pub fn run(&self, frame: CoordinateFrame, log: &mut IssueLog) -> GaitResult<Table> {
        let CoordinateFrame { tracker, mut table, baseline_columns, .. } = frame;
        if self.cfg.options.invert_y_axis {
            self.invert_vertical(&mut table);
        }
        if !self.subtracts_beam() {
            self.zero_vertical(&mut table);
            if tracker == Tracker::Simi {
                self.zero_horizontal(&mut table);
            }
        }
        if self.cfg.options.convert_to_mm {
            self.convert_units(&mut table);
        }
        if tracker == Tracker::Dlc {
            let direction = self.detect_direction(&table)?;
            if self.cfg.options.flip_gait_direction {
                self.standardise_direction(&mut table, direction, log)?;
            }
        }
        if self.subtracts_beam() {
            self.subtract_baseline(&mut table, &baseline_columns)?;
        }
        self.add_time(&mut table)?;
        debug!("preprocessed {} samples × {} columns", table.n_rows(), table.n_cols());
        Ok(table)
    }

    /// Negate every vertical column.
    pub fn invert_vertical(&self, table: &mut Table) {
        for name in self.cfg.tracker.columns_on(table.columns(), Axis::Vertical) {
            if let Some(mut col) = table.column_mut(&name) {
                col.mapv_inplace(|v| -v);
            }
        }
    }

    /// Shift verticals so the reference minimum becomes zero.
    ///
    /// The reference is the standardisation joint when heights are
    /// standardised to a joint at trial level, otherwise every vertical.
    pub fn zero_vertical(&self, table: &mut Table) {
        let verticals = self.cfg.tracker.columns_on(table.columns(), Axis::Vertical);
        let reference = match &self.cfg.y_standardisation_joint {
            Some(joint) if !self.cfg.options.normalise_height_at_sc_level => {
                joint_columns(joint, self.cfg.tracker, Axis::Vertical)
            }
            _ => verticals.clone(),
        };
        if let Some(min) = table.min_over(&reference) {
            shift(table, &verticals, min);
        }
    }

    /// Shift horizontals so their minimum is zero when it is negative.
    pub fn zero_horizontal(&self, table: &mut Table) {
        let horizontals = self.cfg.tracker.columns_on(table.columns(), Axis::Horizontal);
        if let Some(min) = table.min_over(&horizontals) {
            if min < 0.0 {
                shift(table, &horizontals, min);
            }
        }
    }

    /// Divide every coordinate column by the pixel/mm ratio.
    pub fn convert_units(&self, table: &mut Table) {
        let ratio = self.cfg.unit_divisor();
        let tracker = self.cfg.tracker;
        let names: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| *c != TIME && tracker.classify(c) != Some(Axis::Likelihood))
            .cloned()
            .collect();
        for name in names {
            if let Some(mut col) = table.column_mut(&name) {
                col.mapv_inplace(|v| v / ratio);
            }
        }
    }

    /// Decide the walking direction from the direction joint.
    ///
    /// The entry (exit) sample is the first (last) sample whose
    /// [`DIRECTION_WINDOW`]-sample mean likelihood reaches
    /// [`DIRECTION_CONFIDENCE`]. Without a likelihood column the first and
    /// last finite horizontal samples are compared.
    pub fn detect_direction(&self, table: &Table) -> GaitResult<Direction> {
        let joint = self.cfg.direction_joint.at(None);
        let broken = || DataError::BrokenTracking { joint: joint.to_string() };
        let x = table
            .column(&joint.column(self.cfg.tracker, Axis::Horizontal))
            .ok_or_else(broken)?;
        let n = x.len();

        let (entry, exit) = match table.column(&joint.column(self.cfg.tracker, Axis::Likelihood)) {
            Some(likelihood) => {
                let confident = |start: usize| {
                    let window = likelihood.slice(ndarray::s![start..start + DIRECTION_WINDOW]);
                    window.mean().map_or(false, |m| m >= DIRECTION_CONFIDENCE)
                };
                if n < DIRECTION_WINDOW {
                    return Err(broken().into());
                }
                let last_start = n - DIRECTION_WINDOW;
                let entry = (0..=last_start).find(|&s| confident(s)).ok_or_else(broken)?;
                let exit = (0..=last_start)
                    .rev()
                    .find(|&s| confident(s))
                    .map(|s| s + DIRECTION_WINDOW - 1)
                    .ok_or_else(broken)?;
                (entry, exit)
            }
            None => {
                let entry = (0..n).find(|&i| x[i].is_finite()).ok_or_else(broken)?;
                let exit = (0..n).rev().find(|&i| x[i].is_finite()).ok_or_else(broken)?;
                (entry, exit)
            }
        };
        if entry >= exit || !x[entry].is_finite() || !x[exit].is_finite() {
            return Err(broken().into());
        }
        Ok(if x[entry] > x[exit] { Direction::RightToLeft } else { Direction::LeftToRight })
    }

    /// Mirror horizontals of right-to-left trials and add the `Flipped` column.
    pub fn standardise_direction(
        &self,
        table: &mut Table,
        direction: Direction,
        log: &mut IssueLog,
    ) -> GaitResult<()> {
        let flipped = direction == Direction::RightToLeft;
        if flipped {
            let horizontals = self.cfg.tracker.columns_on(table.columns(), Axis::Horizontal);
            if let Some(max) = table.max_over(&horizontals) {
                for name in &horizontals {
                    if let Some(mut col) = table.column_mut(name) {
                        col.mapv_inplace(|v| max - v);
                    }
                }
            }
            info!(subject = %log.label(), "gait direction right to left; horizontals flipped");
        }
        table.set_column(FLIPPED, Array1::from_elem(table.n_rows(), f64::from(u8::from(flipped))))
    }

    /// Subtract the beams' verticals from the joints they apply to, then
    /// drop the baseline columns.
    pub fn subtract_baseline(&self, table: &mut Table, baseline_columns: &[String]) -> GaitResult<()> {
        let tracker = self.cfg.tracker;
        let o = &self.cfg.options;
        let groups = [
            (o.beam_col_left.trim(), [&self.cfg.joints, &self.cfg.beam_hind_jointadd]),
            (o.beam_col_right.trim(), [&self.cfg.fore_joints, &self.cfg.beam_fore_jointadd]),
        ];
        for (beam, lists) in groups {
            let beam_col = JointRef::central(beam).column(tracker, Axis::Vertical);
            let Some(beam_y) = table.column(&beam_col).map(|c| c.to_owned()) else {
                return Err(DataError::invalid_format(
                    "baseline",
                    format!("column `{beam_col}` is missing"),
                )
                .into());
            };
            let mut done: Vec<String> = Vec::new();
            for joint in lists.into_iter().flatten() {
                let name = joint.at(None).column(tracker, Axis::Vertical);
                if done.contains(&name) {
                    continue;
                }
                if let Some(mut col) = table.column_mut(&name) {
                    col -= &beam_y;
                }
                done.push(name);
            }
        }
        table.retain_columns(|c| !baseline_columns.iter().any(|b| b == c));
        Ok(())
    }

    /// Put a recomputed `Time` column first.
    pub fn add_time(&self, table: &mut Table) -> GaitResult<()> {
        table.retain_columns(|c| c != TIME);
        table.insert_column(0, TIME, time_column(table.n_rows(), self.cfg.sampling_rate))
    }
}

fn shift(table: &mut Table, names: &[String], by: f64) {
    for name in names {
        if let Some(mut col) = table.column_mut(name) {
            col.mapv_inplace(|v| v - by);
        }
    }
}
