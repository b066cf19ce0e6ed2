//! Named-column numeric tables.
//!
//! A [`Table`] is a row-major `ndarray::Array2<f64>` with one name per
//! column. Boolean columns (`Flipped`) are stored as `0.0` / `1.0`; text
//! columns (`Leg`, `ID`) never enter a table and are carried next to it.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1, Axis};

use crate::error::{GaitError, GaitResult};

/// Name of the sample-time column.
pub const TIME: &str = "Time";
/// Name of the direction-flip flag column.
pub const FLIPPED: &str = "Flipped";
/// Name of the bodyside label column.
pub const LEG: &str = "Leg";
/// Name of the normalised-position column of average tables.
pub const SC_PERCENTAGES: &str = "SC Percentages";

/// Columns whose values are categorical and must never be averaged.
pub fn is_flag_column(name: &str) -> bool {
    name == FLIPPED
}

/// A rectangular table of `f64` values with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl Table {
    /// Build a table, checking that `values` has one column per name.
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> GaitResult<Self> {
        if columns.len() != values.ncols() {
            return Err(GaitError::bug(format!(
                "table has {} column names but {} value columns",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(Table { columns, values })
    }

    /// A table with `n_rows` rows and no columns.
    pub fn with_rows(n_rows: usize) -> Self {
        Table { columns: Vec::new(), values: Array2::zeros((n_rows, 0)) }
    }

    /// Build a table from `(name, values)` pairs of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> GaitResult<Self> {
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        if let Some((name, v)) = columns.iter().find(|(_, v)| v.len() != n_rows) {
            return Err(GaitError::bug(format!(
                "column `{name}` has {} rows, expected {n_rows}",
                v.len()
            )));
        }
        let names: Vec<String> = columns.iter().map(|(n, _)| n.clone()).collect();
        let values =
            Array2::from_shape_fn((n_rows, names.len()), |(r, c)| columns[c].1[r]);
        Table::new(names, values)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The value matrix (`rows × columns`).
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Mutable access to the value matrix.
    pub fn values_mut(&mut self) -> &mut Array2<f64> {
        &mut self.values
    }

    /// Position of the column called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether a column called `name` exists.
    pub fn has(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// View of the column called `name`.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.index_of(name).map(|i| self.values.column(i))
    }

    /// Mutable view of the column called `name`.
    pub fn column_mut(&mut self, name: &str) -> Option<ArrayViewMut1<'_, f64>> {
        self.index_of(name).map(move |i| self.values.column_mut(i))
    }

    /// Replace the column called `name`, or append it when absent.
    pub fn set_column(&mut self, name: &str, data: Array1<f64>) -> GaitResult<()> {
        if data.len() != self.n_rows() {
            return Err(GaitError::bug(format!(
                "column `{name}` has {} rows, table has {}",
                data.len(),
                self.n_rows()
            )));
        }
        match self.index_of(name) {
            Some(i) => self.values.column_mut(i).assign(&data),
            None => {
                self.values
                    .push_column(data.view())
                    .map_err(|e| GaitError::bug(format!("cannot append `{name}`: {e}")))?;
                self.columns.push(name.to_string());
            }
        }
        Ok(())
    }

    /// Insert a new column at position `at`.
    pub fn insert_column(&mut self, at: usize, name: &str, data: Array1<f64>) -> GaitResult<()> {
        if data.len() != self.n_rows() || at > self.n_cols() {
            return Err(GaitError::bug(format!("cannot insert `{name}` at {at}")));
        }
        let old = &self.values;
        let values = Array2::from_shape_fn((self.n_rows(), self.n_cols() + 1), |(r, c)| {
            if c < at {
                old[[r, c]]
            } else if c == at {
                data[r]
            } else {
                old[[r, c - 1]]
            }
        });
        self.columns.insert(at, name.to_string());
        self.values = values;
        Ok(())
    }

    /// Keep only the columns for which `keep` returns `true`.
    pub fn retain_columns(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let indices: Vec<usize> =
            (0..self.n_cols()).filter(|&i| keep(&self.columns[i])).collect();
        self.values = self.values.select(Axis(1), &indices);
        self.columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
    }

    /// A table with exactly `names` as columns; absent columns are NaN.
    pub fn reindex(&self, names: &[String]) -> Table {
        let values = Array2::from_shape_fn((self.n_rows(), names.len()), |(r, c)| {
            self.index_of(&names[c]).map_or(f64::NAN, |i| self.values[[r, i]])
        });
        Table { columns: names.to_vec(), values }
    }

    /// Rows `start..=end` as a new table.
    pub fn slice_rows(&self, start: usize, end: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            values: self.values.slice(s![start..=end, ..]).to_owned(),
        }
    }

    /// Rows at `indices` (in that order) as a new table.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table { columns: self.columns.clone(), values: self.values.select(Axis(0), indices) }
    }

    /// Rename every column through `f`.
    pub fn rename_columns(&mut self, f: impl Fn(&str) -> String) {
        for c in &mut self.columns {
            *c = f(c);
        }
    }

    /// Stack tables with identical columns vertically.
    pub fn vstack(tables: &[Table]) -> GaitResult<Table> {
        let Some(first) = tables.first() else {
            return Ok(Table::with_rows(0));
        };
        if let Some(t) = tables.iter().find(|t| t.columns != first.columns) {
            return Err(GaitError::bug(format!(
                "cannot stack tables with columns {:?} and {:?}",
                first.columns, t.columns
            )));
        }
        let views: Vec<_> = tables.iter().map(|t| t.values.view()).collect();
        let values = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| GaitError::bug(format!("cannot stack tables: {e}")))?;
        Ok(Table { columns: first.columns.clone(), values })
    }

    /// Minimum over the named columns, ignoring NaN. `None` if no finite value.
    pub fn min_over(&self, names: &[String]) -> Option<f64> {
        names
            .iter()
            .filter_map(|n| self.column(n))
            .flat_map(|col| col.iter().copied().collect::<Vec<_>>())
            .filter(|v| !v.is_nan())
            .reduce(f64::min)
    }

    /// Maximum over the named columns, ignoring NaN. `None` if no finite value.
    pub fn max_over(&self, names: &[String]) -> Option<f64> {
        names
            .iter()
            .filter_map(|n| self.column(n))
            .flat_map(|col| col.iter().copied().collect::<Vec<_>>())
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Table {
        Table::from_columns(vec![
            ("a".into(), vec![1.0, 2.0, 3.0]),
            ("b".into(), vec![4.0, f64::NAN, -6.0]),
        ])
        .unwrap()
    }

    #[test]
    fn set_column_appends_then_replaces() {
        let mut t = sample();
        t.set_column("c", array![7.0, 8.0, 9.0]).unwrap();
        assert_eq!(t.columns(), &["a", "b", "c"]);
        t.set_column("a", array![0.0, 0.0, 0.0]).unwrap();
        assert_eq!(t.column("a").unwrap().to_vec(), vec![0.0, 0.0, 0.0]);
        assert!(t.set_column("d", array![1.0]).is_err());
    }

    #[test]
    fn insert_column_shifts_existing() {
        let mut t = sample();
        t.insert_column(0, "first", array![9.0, 9.0, 9.0]).unwrap();
        assert_eq!(t.columns(), &["first", "a", "b"]);
        assert_eq!(t.values()[[2, 1]], 3.0);
    }

    #[test]
    fn min_and_max_ignore_nan() {
        let t = sample();
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(t.min_over(&names), Some(-6.0));
        assert_eq!(t.max_over(&names), Some(4.0));
        assert_eq!(t.min_over(&["zzz".to_string()]), None);
    }

    #[test]
    fn reindex_fills_missing_with_nan() {
        let t = sample().reindex(&["b".to_string(), "missing".to_string()]);
        assert_eq!(t.columns(), &["b", "missing"]);
        assert!(t.values()[[0, 1]].is_nan());
        assert_eq!(t.values()[[0, 0]], 4.0);
    }

    #[test]
    fn slice_and_stack_rows() {
        let t = sample();
        let top = t.slice_rows(0, 1);
        let bottom = t.slice_rows(2, 2);
        let stacked = Table::vstack(&[top, bottom]).unwrap();
        assert_eq!(stacked.n_rows(), 3);
        assert_eq!(stacked.column("a").unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn retain_columns_drops_by_name() {
        let mut t = sample();
        t.retain_columns(|c| c != "a");
        assert_eq!(t.columns(), &["b"]);
        assert_eq!(t.n_rows(), 3);
    }
}
