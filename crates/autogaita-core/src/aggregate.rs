//! Step tables and their per-bin summaries.
//!
//! A [`StepTable`] is a sequence of [`Cycle`]s, each a contiguous block of
//! rows sharing the table's columns. Separator rows exist only in the
//! on-disk rendering (see [`crate::export`]).
//!
//! Average and standard-deviation tables are computed from a
//! `(bin, column, cycle)` cube reduced along the cycle axis; the standard
//! deviation is the population one (`ddof = 0`) and NaN propagates.

use ndarray::{Array1, Array2, Array3, Axis as NdAxis};

use crate::error::{GaitError, GaitResult};
use crate::joint::{Axis, Side, Tracker};
use crate::table::{is_flag_column, Table, LEG, SC_PERCENTAGES, TIME};

// ---------------------------------------------------------------------------
// Cycle / StepTable
// ---------------------------------------------------------------------------

/// One step cycle's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// Bodyside of the cycle (3D only).
    pub leg: Option<Side>,
    /// Samples (or bins) × columns.
    pub table: Table,
}

impl Cycle {
    /// A cycle without a bodyside.
    pub fn new(table: Table) -> Self {
        Cycle { leg: None, table }
    }

    /// A cycle of the given bodyside.
    pub fn with_leg(table: Table, leg: Side) -> Self {
        Cycle { leg: Some(leg), table }
    }
}

/// Cycles stacked in annotation order; cycle `k` (1-based) is `cycles[k-1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepTable {
    columns: Vec<String>,
    cycles: Vec<Cycle>,
}

impl StepTable {
    /// Build from cycles; every cycle is reindexed to the union of columns
    /// (first-seen order), absent values becoming NaN.
    pub fn new(cycles: Vec<Cycle>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for cycle in &cycles {
            for c in cycle.table.columns() {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }
        let cycles = cycles
            .into_iter()
            .map(|c| {
                if c.table.columns() == columns.as_slice() {
                    c
                } else {
                    Cycle { leg: c.leg, table: c.table.reindex(&columns) }
                }
            })
            .collect();
        StepTable { columns, cycles }
    }

    /// Concatenate step tables in order.
    pub fn concat(parts: Vec<StepTable>) -> Self {
        StepTable::new(parts.into_iter().flat_map(|p| p.cycles).collect())
    }

    /// Column names shared by all cycles.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The cycles.
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Number of cycles.
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Whether there are no cycles.
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Whether any cycle carries a bodyside.
    pub fn has_legs(&self) -> bool {
        self.cycles.iter().any(|c| c.leg.is_some())
    }

    /// Rows of every cycle, or `None` when cycles differ in length.
    pub fn uniform_len(&self) -> Option<usize> {
        let first = self.cycles.first()?.table.n_rows();
        self.cycles.iter().all(|c| c.table.n_rows() == first).then_some(first)
    }

    /// Apply `f` to every cycle's table.
    pub fn map_tables(&self, mut f: impl FnMut(&Table) -> GaitResult<Table>) -> GaitResult<StepTable> {
        let cycles = self
            .cycles
            .iter()
            .map(|c| Ok(Cycle { leg: c.leg, table: f(&c.table)? }))
            .collect::<GaitResult<Vec<_>>>()?;
        Ok(StepTable::new(cycles))
    }

    /// Rename every column through `f`.
    pub fn rename_columns(&mut self, f: impl Fn(&str) -> String) {
        for c in &mut self.columns {
            *c = f(c);
        }
        for cycle in &mut self.cycles {
            cycle.table.rename_columns(&f);
        }
    }

    /// Set the bodyside of every cycle.
    pub fn set_leg(&mut self, leg: Side) {
        for cycle in &mut self.cycles {
            cycle.leg = Some(leg);
        }
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Whether `column` enters average/std tables.
///
/// `Time`, `Leg`, flag columns, likelihoods and (unless
/// `analyse_horizontal`) horizontal coordinates are excluded.
pub fn is_averaged(column: &str, tracker: Tracker, analyse_horizontal: bool) -> bool {
    if column == TIME || column == LEG || column == SC_PERCENTAGES || is_flag_column(column) {
        return false;
    }
    match tracker.classify(column) {
        Some(Axis::Likelihood) => false,
        Some(Axis::Horizontal) => analyse_horizontal,
        _ => true,
    }
}

/// `100 * (i + 1) / bin_num` for `i` in `0..bin_num`.
pub fn sc_percentages(bin_num: usize) -> Array1<f64> {
    Array1::from_iter((0..bin_num).map(|i| 100.0 * (i + 1) as f64 / bin_num as f64))
}

/// Per-bin mean and population standard deviation over cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Mean per bin, `SC Percentages` first.
    pub average: Table,
    /// Standard deviation per bin, `SC Percentages` first.
    pub std: Table,
}

/// Average and standard deviation of a normalised step table.
///
/// # Errors
///
/// [`GaitError::Bug`] when the table is empty or a cycle does not have
/// exactly `bin_num` rows.
pub fn summarise(step: &StepTable, bin_num: usize, keep: impl Fn(&str) -> bool) -> GaitResult<Summary> {
    if step.is_empty() {
        return Err(GaitError::bug("cannot summarise a step table without cycles"));
    }
    if let Some((k, c)) = step.cycles().iter().enumerate().find(|(_, c)| c.table.n_rows() != bin_num) {
        return Err(GaitError::bug(format!(
            "normalised step cycle {} has {} rows instead of {bin_num}",
            k + 1,
            c.table.n_rows()
        )));
    }

    let kept: Vec<usize> = (0..step.columns().len()).filter(|&i| keep(&step.columns()[i])).collect();
    let names: Vec<String> = kept.iter().map(|&i| step.columns()[i].clone()).collect();

    let mut cube = Array3::<f64>::zeros((bin_num, kept.len(), step.len()));
    for (k, cycle) in step.cycles().iter().enumerate() {
        let selected = cycle.table.values().select(NdAxis(1), &kept);
        cube.index_axis_mut(NdAxis(2), k).assign(&selected);
    }
    let mean = cube
        .mean_axis(NdAxis(2))
        .ok_or_else(|| GaitError::bug("empty cycle axis"))?;
    let std = cube.std_axis(NdAxis(2), 0.0);

    Ok(Summary { average: with_percentages(&names, mean)?, std: with_percentages(&names, std)? })
}

fn with_percentages(names: &[String], values: Array2<f64>) -> GaitResult<Table> {
    let bin_num = values.nrows();
    let mut table = Table::new(names.to_vec(), values)?;
    table.insert_column(0, SC_PERCENTAGES, sc_percentages(bin_num))?;
    Ok(table)
}

/// Element-wise mean of tables with equal row counts, over the tables that
/// contain each column. Columns appear in first-seen order.
pub fn mean_of_tables(tables: &[Table]) -> GaitResult<Table> {
    let Some(first) = tables.first() else {
        return Ok(Table::with_rows(0));
    };
    let n_rows = first.n_rows();
    if let Some(t) = tables.iter().find(|t| t.n_rows() != n_rows) {
        return Err(GaitError::bug(format!(
            "cannot average tables with {n_rows} and {} rows",
            t.n_rows()
        )));
    }
    let mut names: Vec<String> = Vec::new();
    for t in tables {
        for c in t.columns() {
            if !names.contains(c) {
                names.push(c.clone());
            }
        }
    }
    let mut out = Table::with_rows(n_rows);
    for name in &names {
        let present: Vec<_> = tables.iter().filter_map(|t| t.column(name)).collect();
        let mut sum = Array1::<f64>::zeros(n_rows);
        for col in &present {
            sum += col;
        }
        out.set_column(name, sum / present.len() as f64)?;
    }
    Ok(out)
}
