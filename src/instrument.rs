//! Abstract instrument surface the protocols run against.
//!
//! Every operation takes its handles as explicit arguments; there is no
//! ambient run context. Execution is strictly sequential and single-threaded:
//! the only waiting primitives are fixed [`RunControl::delay`]s and operator
//! [`RunControl::pause`]s, both of which block the whole run.
//!
//! Implementations report physical failures as [`crate::Error::Transfer`];
//! nothing in this crate retries them.

use std::time::Duration;

use crate::error::Result;
use crate::labware::Location;

/// A multichannel pipetting instrument.
///
/// The tip contract: `pick_up_tip` acquires exactly one tip, which is held
/// until `drop_tip`; no two transfers ever hold a tip simultaneously. Callers
/// must keep the pick up -> act -> drop ordering, never interleaved.
pub trait Pipette {
    /// Maximum volume (uL) one aspiration can hold. This is the capacity fed
    /// to [`crate::plan::plan_chunks`].
    fn working_volume(&self) -> u32;

    /// Number of channels that aspirate simultaneously (8 for the multis).
    fn channels(&self) -> u32;

    fn pick_up_tip(&mut self) -> Result<()>;
    fn drop_tip(&mut self) -> Result<()>;

    fn aspirate(&mut self, volume: u32, location: &Location) -> Result<()>;
    fn dispense(&mut self, volume: u32, location: &Location) -> Result<()>;

    /// Expel residual liquid from the tip at `location`.
    fn blow_out(&mut self, location: &Location) -> Result<()>;

    /// Touch the tip to the well wall to shed droplets.
    fn touch_tip(&mut self, radius: f64, v_offset_mm: f64, speed_mm_s: f64) -> Result<()>;

    /// Aspirate/dispense `volume` at `location`, `repetitions` times.
    fn mix(&mut self, repetitions: u32, volume: u32, location: &Location) -> Result<()>;

    /// Draw an air gap (possibly zero) into the tip after an aspiration.
    fn air_gap(&mut self, volume: u32) -> Result<()>;

    /// Millimeters above the well bottom at which aspirations happen.
    fn set_aspirate_clearance(&mut self, mm: f64);
    /// Millimeters above the well bottom at which dispenses happen.
    fn set_dispense_clearance(&mut self, mm: f64);
    /// Flow rates in uL/s for aspirate and dispense.
    fn set_flow_rate(&mut self, aspirate: f64, dispense: f64);
    /// Restore default clearances and flow rates.
    fn reset_defaults(&mut self);

    /// Mark all tip racks as refilled (done by the operator during a pause).
    fn reset_tip_racks(&mut self);
}

/// Run-level control surface: operator handoffs and fixed waits.
pub trait RunControl {
    /// Block until the operator resumes the run (sealing, shaking, ...).
    fn pause(&mut self, message: &str) -> Result<()>;
    /// Block for a fixed wall-clock duration (bead capture, settling).
    fn delay(&mut self, duration: Duration) -> Result<()>;
}

/// Magnetic separation module under the reaction plate.
pub trait MagneticModule {
    /// Raise the magnets to `height_mm`, drawing beads to the well walls.
    fn engage(&mut self, height_mm: f64) -> Result<()>;
    /// Lower the magnets.
    fn disengage(&mut self) -> Result<()>;
}

/// Temperature module under the output plate.
pub trait TemperatureModule {
    fn set_temperature(&mut self, celsius: f64) -> Result<()>;
}

/// The full set of handles a protocol needs, passed explicitly.
pub struct ProtocolEnv<'a> {
    /// Small-volume pipette (p20 multi).
    pub small: &'a mut dyn Pipette,
    /// Large-volume pipette (p300 multi).
    pub large: &'a mut dyn Pipette,
    pub ctl: &'a mut dyn RunControl,
    pub mag: &'a mut dyn MagneticModule,
    pub temp: &'a mut dyn TemperatureModule,
    /// Number of sample columns to process (12 for a full plate).
    pub num_cols: usize,
}
