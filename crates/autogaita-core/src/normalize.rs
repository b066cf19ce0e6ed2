//! Length normalisation of step cycles to a fixed number of bins.
//!
//! A cycle of `L` samples is mapped to `bin_num = N` rows:
//!
//! - `L > N`: sample `i` is assigned to bin `i mod N` and the assignment is
//!   then sorted, so each bin is a contiguous run of `L / N` or `L / N + 1`
//!   samples; the bin value is the column-wise mean of its run.
//! - `L < N`: output row `i` takes sample `i mod L`; rows are sorted by
//!   source sample so repeated samples stay contiguous.
//! - `L = N`: identity.
//!
//! Flag columns (`Flipped`) take the value of the first sample in the bin.

use ndarray::{Array2, Axis};

use crate::error::{GaitError, GaitResult};
use crate::table::{is_flag_column, Table};

/// Source sample indices of each of the `bin_num` output rows of a cycle
/// with `len` samples.
pub fn bin_members(len: usize, bin_num: usize) -> Vec<Vec<usize>> {
    if len == 0 || bin_num == 0 {
        return Vec::new();
    }
    if len >= bin_num {
        let base = len / bin_num;
        let extra = len % bin_num;
        let mut start = 0;
        (0..bin_num)
            .map(|b| {
                let size = base + usize::from(b < extra);
                let run: Vec<usize> = (start..start + size).collect();
                start += size;
                run
            })
            .collect()
    } else {
        let mut sources: Vec<usize> = (0..bin_num).map(|i| i % len).collect();
        sources.sort_unstable();
        sources.into_iter().map(|s| vec![s]).collect()
    }
}

/// Resample `cycle` to `bin_num` rows.
///
/// # Errors
///
/// [`GaitError::Bug`] if the cycle is empty or the result does not have
/// exactly `bin_num` rows.
pub fn normalise_cycle(cycle: &Table, bin_num: usize) -> GaitResult<Table> {
    let len = cycle.n_rows();
    if len == bin_num {
        return Ok(cycle.clone());
    }
    let members = bin_members(len, bin_num);
    if members.len() != bin_num {
        return Err(GaitError::bug(format!(
            "binning a cycle of {len} samples produced {} bins instead of {bin_num}",
            members.len()
        )));
    }

    let flags: Vec<bool> = cycle.columns().iter().map(|c| is_flag_column(c)).collect();
    let mut out = Array2::<f64>::zeros((bin_num, cycle.n_cols()));
    for (b, rows) in members.iter().enumerate() {
        let block = cycle.values().select(Axis(0), rows);
        let means = block
            .mean_axis(Axis(0))
            .ok_or_else(|| GaitError::bug(format!("bin {b} of a {len}-sample cycle is empty")))?;
        for (c, &is_flag) in flags.iter().enumerate() {
            out[[b, c]] = if is_flag { block[[0, c]] } else { means[c] };
        }
    }
    Table::new(cycle.columns().to_vec(), out)
}
