//! Typed references to tracked points and their column names.
//!
//! Coordinate tables are keyed by human-readable column strings such as
//! `"Ankle y"` (2D tracker) or `"Knee, left Z"` (3D tracker). Everything in
//! the crate addresses columns through [`JointRef`] and renders the string
//! only at the table boundary, so the separating space and the bodyside
//! qualifier are inserted in exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Tracking software that produced the coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tracker {
    /// DeepLabCut-style 2D tracking (`x`, `y`, `likelihood`).
    #[serde(rename = "DLC")]
    Dlc,
    /// Simi Motion-style 3D tracking (`Y`, `Z`; planar analysis).
    #[serde(rename = "Simi")]
    Simi,
}

impl Tracker {
    /// Name written to `config.json` as `tracking_software`.
    pub fn as_str(self) -> &'static str {
        match self {
            Tracker::Dlc => "DLC",
            Tracker::Simi => "Simi",
        }
    }

    /// Column suffix used by this tracker for `axis`.
    pub fn axis_label(self, axis: Axis) -> &'static str {
        match (self, axis) {
            (Tracker::Dlc, Axis::Horizontal) => "x",
            (Tracker::Dlc, Axis::Vertical) => "y",
            (Tracker::Simi, Axis::Horizontal) => "Y",
            (Tracker::Simi, Axis::Vertical) => "Z",
            (_, Axis::Likelihood) => "likelihood",
        }
    }

    /// Classify a column name by its axis suffix.
    pub fn classify(self, column: &str) -> Option<Axis> {
        [Axis::Horizontal, Axis::Vertical, Axis::Likelihood]
            .into_iter()
            .find(|&axis| {
                let label = self.axis_label(axis);
                column.len() > label.len() + 1
                    && column.ends_with(label)
                    && column[..column.len() - label.len()].ends_with(' ')
            })
    }

    /// The subset of `columns` on `axis`, in order.
    pub fn columns_on(self, columns: &[String], axis: Axis) -> Vec<String> {
        columns.iter().filter(|c| self.classify(c) == Some(axis)).cloned().collect()
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Side / Axis / Feature
// ---------------------------------------------------------------------------

/// Body side of a lateralised point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left body side.
    Left,
    /// Right body side.
    Right,
}

impl Side {
    /// Both sides in output order.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Lower-case label used in column names and sheet names.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// The opposite side.
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Parse a side label, ignoring case and surrounding whitespace.
    pub fn parse(label: &str) -> Option<Side> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Some(Side::Left),
            "right" | "r" => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinate axis of a tracked point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Walking direction (`x` in 2D, `Y` in 3D).
    Horizontal,
    /// Height (`y` in 2D, `Z` in 3D).
    Vertical,
    /// Tracker confidence (2D only).
    Likelihood,
}

/// Derived kinematic quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Planar joint angle in degrees.
    Angle,
    /// First derivative of an angle.
    AngleVelocity,
    /// Second derivative of an angle.
    AngleAcceleration,
    /// First derivative of a horizontal coordinate.
    Velocity,
    /// Second derivative of a horizontal coordinate.
    Acceleration,
}

impl Feature {
    fn label(self) -> &'static str {
        match self {
            Feature::Angle => "Angle",
            Feature::AngleVelocity => "Angle Velocity",
            Feature::AngleAcceleration => "Angle Acceleration",
            Feature::Velocity => "Velocity",
            Feature::Acceleration => "Acceleration",
        }
    }
}

// ---------------------------------------------------------------------------
// JointRef
// ---------------------------------------------------------------------------

/// A tracked point, optionally qualified by body side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JointRef {
    /// Point name without trailing whitespace.
    pub name: String,
    /// Body side for lateralised points.
    pub side: Option<Side>,
}

impl JointRef {
    /// A point on the body midline (or any 2D point).
    pub fn central(name: impl Into<String>) -> Self {
        JointRef { name: name.into(), side: None }
    }

    /// A lateralised point.
    pub fn lateral(name: impl Into<String>, side: Side) -> Self {
        JointRef { name: name.into(), side: Some(side) }
    }

    fn stem(&self) -> String {
        match self.side {
            None => self.name.clone(),
            Some(side) => format!("{}, {}", self.name, side),
        }
    }

    /// Coordinate column, e.g. `"Ankle y"` or `"Knee, left Z"`.
    pub fn column(&self, tracker: Tracker, axis: Axis) -> String {
        format!("{} {}", self.stem(), tracker.axis_label(axis))
    }

    /// Derived column, e.g. `"Ankle Angle"` or `"Toe Velocity"`.
    pub fn feature_column(&self, feature: Feature) -> String {
        format!("{} {}", self.stem(), feature.label())
    }
}

impl fmt::Display for JointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

// ---------------------------------------------------------------------------
// JointSpec
// ---------------------------------------------------------------------------

/// A configured point after validation against the loaded columns.
///
/// In 3D data a point is either central (`"Head Y"`) or lateral
/// (`"Knee, left Y"`); [`JointSpec::at`] produces the reference for the side
/// currently being analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointSpec {
    /// Canonical point name.
    pub name: String,
    /// Whether the columns carry a bodyside qualifier.
    pub lateral: bool,
}

impl JointSpec {
    /// Resolve `name` against `columns`: central columns win over lateral
    /// ones. Returns `None` when neither variant is present.
    pub fn resolve(name: &str, tracker: Tracker, columns: &[String]) -> Option<JointSpec> {
        let has_both = |joint: &JointRef| {
            [Axis::Horizontal, Axis::Vertical]
                .iter()
                .all(|&axis| columns.iter().any(|c| *c == joint.column(tracker, axis)))
        };
        if has_both(&JointRef::central(name)) {
            return Some(JointSpec { name: name.to_string(), lateral: false });
        }
        if tracker == Tracker::Simi
            && Side::BOTH.iter().any(|&side| has_both(&JointRef::lateral(name, side)))
        {
            return Some(JointSpec { name: name.to_string(), lateral: true });
        }
        None
    }

    /// Reference to this point on `side` (ignored for central points).
    pub fn at(&self, side: Option<Side>) -> JointRef {
        match (self.lateral, side) {
            (true, Some(side)) => JointRef::lateral(self.name.clone(), side),
            _ => JointRef::central(self.name.clone()),
        }
    }
}

/// Drop the bodyside qualifier from a column name:
/// `"Knee, left Z"` becomes `"Knee Z"`.
pub fn neutral_column(column: &str) -> String {
    let mut out = column.to_string();
    for side in Side::BOTH {
        out = out.replace(&format!(", {} ", side), " ");
    }
    out
}

/// Whether `column` belongs to the opposite body side of `side`.
pub fn is_other_side(column: &str, side: Side) -> bool {
    column.contains(&format!(", {} ", side.other()))
}
