//! Per-cycle standardisation and kinematic features.
//!
//! Operates on a copy of one step cycle's rows:
//!
//! 1. zero heights per cycle (`normalise_height_at_SC_level`), optionally
//!    at a standardisation joint;
//! 2. mirror right-to-left 3D cycles (`flip_gait_direction`);
//! 3. zero horizontals at a standardisation joint (2D,
//!    `standardise_x_coordinates`);
//! 4. planar joint angles, velocities and optional accelerations.

use ndarray::{Array1, ArrayView1, Zip};
use tracing::trace;

use crate::config::ResolvedConfig;
use crate::error::GaitResult;
use crate::joint::{Axis, Feature, JointRef, Side, Tracker};
use crate::table::{Table, FLIPPED};

/// Angle in degrees at `vertex` between the rays to `lower` and `upper`.
///
/// Returns NaN when either ray has zero length.
pub fn planar_angle(vertex: [f64; 2], lower: [f64; 2], upper: [f64; 2]) -> f64 {
    let v1 = [vertex[0] - lower[0], vertex[1] - lower[1]];
    let v2 = [vertex[0] - upper[0], vertex[1] - upper[1]];
    let norm = v1[0].hypot(v1[1]) * v2[0].hypot(v2[1]);
    if norm == 0.0 || !norm.is_finite() {
        return f64::NAN;
    }
    let cos = ((v1[0] * v2[0] + v1[1] * v2[1]) / norm).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Derivative per sample: central differences inside, one-sided at the ends.
pub fn gradient(values: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = values.len();
    match n {
        0 => Array1::zeros(0),
        1 => Array1::from_elem(1, f64::NAN),
        _ => Array1::from_shape_fn(n, |i| match i {
            0 => values[1] - values[0],
            i if i == n - 1 => values[n - 1] - values[n - 2],
            i => (values[i + 1] - values[i - 1]) / 2.0,
        }),
    }
}

/// Builds the derived columns of one step cycle.
pub struct FeatureBuilder<'a> {
    cfg: &'a ResolvedConfig,
}

impl<'a> FeatureBuilder<'a> {
    /// Create a builder for `cfg`.
    pub fn new(cfg: &'a ResolvedConfig) -> Self {
        FeatureBuilder { cfg }
    }

    fn tracker(&self) -> Tracker {
        self.cfg.tracker
    }

    /// Standardise `cycle` and append its features. `side` selects the
    /// bodyside of lateral 3D joints.
    pub fn build(&self, cycle: &Table, side: Option<Side>) -> GaitResult<Table> {
        let mut t = cycle.clone();
        if self.cfg.options.normalise_height_at_sc_level {
            self.standardise_height(&mut t, side);
        }
        if self.tracker() == Tracker::Simi && self.cfg.options.flip_gait_direction {
            self.standardise_direction(&mut t, side)?;
        }
        if self.cfg.x_standardisation_joint.is_some() {
            self.standardise_x(&mut t, side);
        }
        self.add_angles(&mut t, side)?;
        self.add_derivatives(&mut t, side)?;
        trace!("built features for a cycle of {} samples", t.n_rows());
        Ok(t)
    }

    fn shift_axis(&self, t: &mut Table, axis: Axis, reference: &[String]) {
        let Some(min) = t.min_over(reference) else {
            return;
        };
        for name in self.tracker().columns_on(t.columns(), axis) {
            if let Some(mut col) = t.column_mut(&name) {
                col.mapv_inplace(|v| v - min);
            }
        }
    }

    /// Shift verticals by the cycle minimum (of the standardisation joint
    /// when one is configured).
    pub fn standardise_height(&self, t: &mut Table, side: Option<Side>) {
        let reference = match &self.cfg.y_standardisation_joint {
            Some(joint) => vec![joint.at(side).column(self.tracker(), Axis::Vertical)],
            None => self.tracker().columns_on(t.columns(), Axis::Vertical),
        };
        self.shift_axis(t, Axis::Vertical, &reference);
    }

    /// Shift horizontals by the cycle minimum of the x-standardisation joint.
    pub fn standardise_x(&self, t: &mut Table, side: Option<Side>) {
        if let Some(joint) = &self.cfg.x_standardisation_joint {
            let reference = vec![joint.at(side).column(self.tracker(), Axis::Horizontal)];
            self.shift_axis(t, Axis::Horizontal, &reference);
        }
    }

    /// Mirror horizontals when the direction joint's cycle mean exceeds its
    /// first sample, and record the outcome in `Flipped`.
    pub fn standardise_direction(&self, t: &mut Table, side: Option<Side>) -> GaitResult<()> {
        let column = self.cfg.direction_joint.at(side).column(self.tracker(), Axis::Horizontal);
        let flip = match t.column(&column) {
            Some(x) if !x.is_empty() => x.mean().map_or(false, |mean| mean > x[0]),
            _ => false,
        };
        if flip {
            let horizontals = self.tracker().columns_on(t.columns(), Axis::Horizontal);
            if let Some(max) = t.max_over(&horizontals) {
                for name in &horizontals {
                    if let Some(mut col) = t.column_mut(name) {
                        col.mapv_inplace(|v| max - v);
                    }
                }
            }
        }
        t.set_column(FLIPPED, Array1::from_elem(t.n_rows(), f64::from(u8::from(flip))))
    }

    fn planar(&self, t: &Table, joint: &JointRef) -> Option<(Array1<f64>, Array1<f64>)> {
        let h = t.column(&joint.column(self.tracker(), Axis::Horizontal))?;
        let v = t.column(&joint.column(self.tracker(), Axis::Vertical))?;
        Some((h.to_owned(), v.to_owned()))
    }

    /// Append one `Angle` column per configured angle.
    pub fn add_angles(&self, t: &mut Table, side: Option<Side>) -> GaitResult<()> {
        for spec in &self.cfg.angles {
            let vertex = spec.angle.at(side);
            let name = vertex.feature_column(Feature::Angle);
            let points = (
                self.planar(t, &vertex),
                self.planar(t, &spec.lower.at(side)),
                self.planar(t, &spec.upper.at(side)),
            );
            let values = match points {
                (Some((ax, ay)), Some((lx, ly)), Some((ux, uy))) => {
                    let mut out = Array1::<f64>::zeros(t.n_rows());
                    Zip::indexed(&mut out).for_each(|i, o| {
                        *o = planar_angle([ax[i], ay[i]], [lx[i], ly[i]], [ux[i], uy[i]]);
                    });
                    out
                }
                _ => Array1::from_elem(t.n_rows(), f64::NAN),
            };
            t.set_column(&name, values)?;
        }
        Ok(())
    }

    /// Append velocities (and enabled accelerations) of the primary joints'
    /// horizontals and of every angle.
    pub fn add_derivatives(&self, t: &mut Table, side: Option<Side>) -> GaitResult<()> {
        let mut sources: Vec<(String, JointRef, bool)> = Vec::new();
        for joint in &self.cfg.joints {
            let r = joint.at(side);
            sources.push((r.column(self.tracker(), Axis::Horizontal), r, false));
        }
        for spec in &self.cfg.angles {
            let r = spec.angle.at(side);
            sources.push((r.feature_column(Feature::Angle), r, true));
        }

        let mut accelerations = Vec::new();
        for (column, joint, is_angle) in sources {
            let Some(values) = t.column(&column).map(|c| c.to_owned()) else {
                continue;
            };
            let (velocity_feature, acceleration_feature, wants_acceleration) = if is_angle {
                (Feature::AngleVelocity, Feature::AngleAcceleration, self.cfg.options.angular_acceleration)
            } else {
                (Feature::Velocity, Feature::Acceleration, self.cfg.options.x_acceleration)
            };
            let velocity = gradient(values.view());
            if wants_acceleration {
                accelerations.push((joint.feature_column(acceleration_feature), gradient(velocity.view())));
            }
            t.set_column(&joint.feature_column(velocity_feature), velocity)?;
        }
        for (name, values) in accelerations {
            t.set_column(&name, values)?;
        }
        Ok(())
    }
}
