//! Core types for **deck slots**, **labware** and **well locations**.
//!
//! This module holds the data model used across the crate. It is intentionally
//! simple (we stay on `&'static str` labels so every deck layout can live in
//! the binary as constants).
//!
//! Pipetting operations address a whole column at a time, matching the
//! 8-channel instruments the protocols were written for, so a [`Location`] is
//! a labware label plus a column index plus a vertical place within the well.

use core::fmt;

use serde::Serialize;

/// Numbered position on the robot deck (1 through 11 on an OT-2).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct Slot(pub u8);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vertical place within a well that an operation targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WellPlace {
    /// At working depth, submerged in (or near) the liquid.
    Depth,
    /// Above the liquid surface, at the rim of the well.
    Top,
}

/// A column-level address: which labware, which column, how deep.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct Location {
    /// Human label of the labware (e.g. `"Reagent Reservoir"`).
    pub labware: &'static str,
    /// Zero-based column index within the labware.
    pub column: usize,
    /// Vertical place within the well.
    pub place: WellPlace,
}

impl Location {
    /// The same column, addressed at the top of the well (above the liquid).
    pub fn top(&self) -> Location {
        Location {
            place: WellPlace::Top,
            ..self.clone()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.place {
            WellPlace::Depth => write!(f, "{}[{}]", self.labware, self.column),
            WellPlace::Top => write!(f, "{}[{}].top", self.labware, self.column),
        }
    }
}

/// A piece of labware and where it sits, as declared by a deck layout table.
#[derive(Clone, Debug)]
pub struct LabwareSpec {
    /// Vendor load name (e.g. `"usascientific_12_reservoir_22ml"`).
    pub name: &'static str,
    /// Deck slot, or `None` when the labware sits on a module.
    pub slot: Option<Slot>,
    /// Human label used in locations and traces.
    pub label: &'static str,
    /// Number of addressable columns.
    pub columns: usize,
}

impl LabwareSpec {
    /// Address column `column` of this labware at working depth.
    pub fn column(&self, column: usize) -> Location {
        debug_assert!(column < self.columns, "column {column} out of range for {}", self.label);
        Location {
            labware: self.label,
            column,
            place: WellPlace::Depth,
        }
    }
}

/// A filter-tip rack and where it sits.
#[derive(Clone, Debug)]
pub struct TipRackSpec {
    /// Vendor load name (e.g. `"opentrons_96_filtertiprack_200ul"`).
    pub name: &'static str,
    /// Deck slot.
    pub slot: Slot,
    /// Human label.
    pub label: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_keeps_the_column_and_lifts_the_place() {
        let spec = LabwareSpec {
            name: "usascientific_12_reservoir_22ml",
            slot: Some(Slot(11)),
            label: "Reagent Reservoir",
            columns: 12,
        };
        let depth = spec.column(3);
        let top = depth.top();
        assert_eq!(depth.place, WellPlace::Depth);
        assert_eq!(top.place, WellPlace::Top);
        assert_eq!(top.column, 3);
        assert_eq!(top.labware, "Reagent Reservoir");
    }
}
