//! Step-cycle extraction and cleaning.
//!
//! Annotated latencies (seconds) become inclusive sample-index pairs, which
//! are then cleaned in a fixed order: bounds, duplicate endpoints, order,
//! tracking quality. Every removal is recorded in the issues log under the
//! cycle's 1-based annotation number.

use tracing::debug;

use crate::config::ResolvedConfig;
use crate::error::{DataError, GaitError, GaitResult};
use crate::issues::IssueLog;
use crate::joint::{Axis, Side};
use crate::table::Table;

/// Inclusive `(start, end)` sample indices of one step cycle.
pub type CycleBounds = (usize, usize);

/// Latencies closer than this (in samples) to a frame are taken as exact.
pub const FRAME_TOLERANCE: f64 = 1e-6;

/// Sample index of latency `t` (seconds) and whether it lay on the frame grid.
pub fn latency_to_sample(t: f64, sampling_rate: u32) -> (i64, bool) {
    let exact = t * f64::from(sampling_rate);
    let nearest = exact.round();
    if (exact - nearest).abs() <= FRAME_TOLERANCE {
        (nearest as i64, true)
    } else {
        (exact.floor() as i64, false)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    number: usize,
    start: i64,
    end: i64,
}

/// Converts annotated latencies to validated step cycles.
pub struct StepCycleExtractor<'a> {
    cfg: &'a ResolvedConfig,
}

impl<'a> StepCycleExtractor<'a> {
    /// Create an extractor for `cfg`.
    pub fn new(cfg: &'a ResolvedConfig) -> Self {
        StepCycleExtractor { cfg }
    }

    /// Extract the cycles of one subject/trial (or one side in 3D).
    ///
    /// # Errors
    ///
    /// [`DataError::OutOfRange`] when every annotated cycle lies outside the
    /// data, [`GaitError::NoCycles`] when nothing survives cleaning.
    pub fn extract(
        &self,
        latencies: &[(f64, f64)],
        table: &Table,
        side: Option<Side>,
        log: &mut IssueLog,
    ) -> GaitResult<Vec<CycleBounds>> {
        let candidates = self.to_samples(latencies, log);
        let in_bounds = self.clean_bounds(&candidates, table.n_rows(), log);
        if in_bounds.is_empty() {
            if let Some(c) = candidates.first() {
                let sample = if c.start < 0 || c.start as usize >= table.n_rows() { c.start } else { c.end };
                return Err(DataError::OutOfRange {
                    sample: sample.max(0) as usize,
                    rows: table.n_rows(),
                }
                .into());
            }
        }
        let bumped = clean_duplicates(in_bounds);
        let ordered = clean_order(bumped, log);
        let cycles = self.clean_tracking(ordered, table, side, log);

        if cycles.is_empty() {
            let subject = match side {
                Some(side) => format!("{} ({} leg)", log.label(), side),
                None => log.label().to_string(),
            };
            return Err(GaitError::NoCycles { subject });
        }
        debug!("{} of {} annotated step cycles kept", cycles.len(), latencies.len());
        Ok(cycles)
    }

    fn to_samples(&self, latencies: &[(f64, f64)], log: &mut IssueLog) -> Vec<Candidate> {
        let rate = self.cfg.sampling_rate;
        latencies
            .iter()
            .enumerate()
            .map(|(i, &(start_s, end_s))| {
                let number = i + 1;
                let mut convert = |t: f64| {
                    let (sample, aligned) = latency_to_sample(t, rate);
                    if !aligned {
                        log.warn(format!(
                            "Latency {t} s of step cycle {number} is not on the {rate} Hz frame \
                             grid; rounded down to sample {sample}"
                        ));
                    }
                    sample
                };
                let start = convert(start_s);
                let end = convert(end_s);
                Candidate { number, start, end }
            })
            .collect()
    }

    fn clean_bounds(&self, candidates: &[Candidate], n_rows: usize, log: &mut IssueLog) -> Vec<Candidate> {
        let last = n_rows as i64 - 1;
        candidates
            .iter()
            .copied()
            .filter(|c| {
                let inside = c.start >= 0 && c.end >= 0 && c.start <= last && c.end <= last;
                if !inside {
                    log.warn(format!(
                        "Step cycle {} (samples {}-{}) lies outside the {n_rows} tracked samples; \
                         removed",
                        c.number, c.start, c.end
                    ));
                }
                inside
            })
            .collect()
    }

    fn clean_tracking(
        &self,
        cycles: Vec<Candidate>,
        table: &Table,
        side: Option<Side>,
        log: &mut IssueLog,
    ) -> Vec<CycleBounds> {
        let divisor = self.cfg.unit_divisor();
        let limits = [
            (Axis::Horizontal, self.cfg.options.x_sc_broken_threshold / divisor),
            (Axis::Vertical, self.cfg.options.y_sc_broken_threshold / divisor),
        ];
        let checked: Vec<(String, f64)> = self
            .cfg
            .joints
            .iter()
            .flat_map(|j| {
                let joint = j.at(side);
                limits.iter().map(move |&(axis, limit)| (joint.column(self.cfg.tracker, axis), limit))
            })
            .filter(|(name, _)| table.has(name))
            .collect();

        cycles
            .into_iter()
            .filter_map(|c| {
                let (start, end) = (c.start as usize, c.end as usize);
                let slice = table.slice_rows(start, end);
                for (name, limit) in &checked {
                    let Some(col) = slice.column(name) else { continue };
                    let jump = col
                        .windows(2)
                        .into_iter()
                        .map(|w| (w[1] - w[0]).abs())
                        .fold(0.0_f64, f64::max);
                    if jump > *limit {
                        log.warn(format!(
                            "Step cycle {} removed: `{name}` jumps by {jump:.2} between samples \
                             (limit {limit:.2})",
                            c.number
                        ));
                        return None;
                    }
                }
                Some((start, end))
            })
            .collect()
    }
}

fn clean_duplicates(mut cycles: Vec<Candidate>) -> Vec<Candidate> {
    for k in 1..cycles.len() {
        if cycles[k].start == cycles[k - 1].end {
            cycles[k].start += 1;
        }
    }
    cycles
}

fn clean_order(cycles: Vec<Candidate>, log: &mut IssueLog) -> Vec<Candidate> {
    let mut max_end: Option<i64> = None;
    let mut kept = Vec::with_capacity(cycles.len());
    for c in cycles {
        let overlaps = max_end.map_or(false, |m| c.start <= m);
        if overlaps || c.end <= c.start {
            log.warn(format!(
                "Step cycle {} (samples {}-{}) is out of order or empty; removed",
                c.number, c.start, c.end
            ));
        } else {
            kept.push(c);
        }
        max_end = Some(max_end.map_or(c.end, |m| m.max(c.end)));
    }
    kept
}

/// The rows of `cycles` as separate tables.
pub fn slice_cycles(table: &Table, cycles: &[CycleBounds]) -> Vec<Table> {
    cycles.iter().map(|&(s, e)| table.slice_rows(s, e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValidator, GaitConfig};
    use crate::joint::Tracker;

    fn table(n: usize) -> Table {
        Table::from_columns(vec![
            ("Hip x".into(), (0..n).map(|i| i as f64).collect()),
            ("Hip y".into(), vec![1.0; n]),
        ])
        .unwrap()
    }

    fn resolved(cfg: GaitConfig, t: &Table) -> ResolvedConfig {
        ConfigValidator::new(&cfg, Tracker::Dlc, t.columns()).resolve().unwrap().config
    }

    fn base() -> GaitConfig {
        GaitConfig { hind_joints: vec!["Hip".into()], ..GaitConfig::default() }
    }

    #[test]
    fn latencies_snap_within_tolerance_else_floor() {
        assert_eq!(latency_to_sample(0.07, 100), (7, true));
        assert_eq!(latency_to_sample(0.075, 100), (7, false));
        assert_eq!(latency_to_sample(1.0 / 3.0, 3), (1, true));
    }

    #[test]
    fn out_of_bounds_cycle_is_dropped_and_named() {
        let t = table(50);
        let cfg = resolved(base(), &t);
        let mut log = IssueLog::new("t");
        let cycles = StepCycleExtractor::new(&cfg)
            .extract(&[(0.0, 0.2), (0.3, 0.6)], &t, None, &mut log)
            .unwrap();
        assert_eq!(cycles, vec![(0, 20)]);
        assert!(log.issues()[0].message.contains("Step cycle 2"));
    }

    #[test]
    fn shared_endpoint_bumps_next_start() {
        let t = table(50);
        let cfg = resolved(base(), &t);
        let mut log = IssueLog::new("t");
        let cycles = StepCycleExtractor::new(&cfg)
            .extract(&[(0.0, 0.1), (0.1, 0.2)], &t, None, &mut log)
            .unwrap();
        assert_eq!(cycles, vec![(0, 10), (11, 20)]);
        assert!(log.issues().is_empty());
    }

    #[test]
    fn overlapping_and_reversed_cycles_are_removed() {
        let t = table(50);
        let cfg = resolved(base(), &t);
        let mut log = IssueLog::new("t");
        let cycles = StepCycleExtractor::new(&cfg)
            .extract(&[(0.1, 0.3), (0.2, 0.4), (0.45, 0.41), (0.42, 0.48)], &t, None, &mut log)
            .unwrap();
        assert_eq!(cycles, vec![(10, 30), (42, 48)]);
        assert_eq!(log.warning_count(), 2);
    }

    #[test]
    fn tracking_jumps_remove_cycles() {
        let mut t = table(50);
        t.column_mut("Hip y").unwrap()[35] = 500.0;
        let cfg = resolved(base(), &t);
        let mut log = IssueLog::new("t");
        let cycles = StepCycleExtractor::new(&cfg)
            .extract(&[(0.0, 0.2), (0.3, 0.4)], &t, None, &mut log)
            .unwrap();
        assert_eq!(cycles, vec![(0, 20)]);
        assert!(log.issues()[0].message.contains("Hip y"));
    }

    #[test]
    fn thresholds_scale_with_mm_conversion() {
        let mut t = table(50);
        t.column_mut("Hip y").unwrap()[5] = 31.0;
        let cfg = resolved(
            GaitConfig { convert_to_mm: true, pixel_to_mm_ratio: 2.0, ..base() },
            &t,
        );
        let mut log = IssueLog::new("t");
        let err = StepCycleExtractor::new(&cfg)
            .extract(&[(0.0, 0.2)], &t, None, &mut log)
            .unwrap_err();
        assert!(matches!(err, GaitError::NoCycles { .. }));
    }

    #[test]
    fn all_cycles_outside_the_data_is_out_of_range() {
        let t = table(10);
        let cfg = resolved(base(), &t);
        let mut log = IssueLog::new("t");
        let err = StepCycleExtractor::new(&cfg)
            .extract(&[(1.0, 2.0)], &t, None, &mut log)
            .unwrap_err();
        assert!(matches!(err, GaitError::Data(DataError::OutOfRange { sample: 100, rows: 10 })));
    }
}
