//! Chunked transfer execution with single-tip reuse.
//!
//! When a requested volume exceeds the pipette's working volume, the transfer
//! runs as the chunk sequence from [`crate::plan::plan_chunks`] under one tip:
//! every chunk but the last is dispensed at the **top** of the destination
//! well, so the tip never re-enters already-dispensed liquid and stays clean
//! enough to reuse; only the final chunk is dispensed at depth. Re-acquiring
//! a tip per chunk would defeat the point of chunking, so the tip is picked
//! up once and dropped once.
//!
//! Failures from the instrument are fatal and propagate unchanged; there is
//! no retry and no partial-state cleanup.

use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::instrument::{Pipette, RunControl};
use crate::labware::Location;
use crate::plan::plan_chunks;

/// Tip-touch speed used everywhere (the instrument minimum).
pub const TOUCH_SPEED_MM_S: f64 = 20.0;

/// Volume retained in the tip when not dispensing in full, to avoid
/// disturbing a bead pellet while discarding supernatant.
const HOLDBACK_UL: u32 = 10;

/// A mixing instruction: aspirate/dispense `volume` (or the current chunk
/// volume when unset), `repetitions` times.
#[derive(Clone, Copy, Debug)]
pub struct Mix {
    pub repetitions: u32,
    /// Explicit mix volume, clamped to the pipette's working volume. `None`
    /// mixes with the volume of the chunk being moved.
    pub volume: Option<u32>,
}

impl Mix {
    /// Mix with the chunk volume.
    pub fn scaled(repetitions: u32) -> Self {
        Mix { repetitions, volume: None }
    }

    /// Mix with a fixed volume.
    pub fn fixed(repetitions: u32, volume: u32) -> Self {
        Mix { repetitions, volume: Some(volume) }
    }
}

/// A wall-touch instruction applied after the final dispense.
#[derive(Clone, Copy, Debug)]
pub struct TouchTip {
    /// Fraction of the well radius to travel out to.
    pub radius: f64,
    /// Vertical offset from the well top, in mm (negative = below the rim).
    pub v_offset_mm: f64,
}

/// Optional trimmings around a chunked transfer.
#[derive(Clone, Debug)]
pub struct TransferParams {
    /// Mix at the source before each aspiration.
    pub mix_before: Option<Mix>,
    /// Mix at the destination after the final dispense.
    pub mix_after: Option<Mix>,
    /// Touch the tip to the destination wall after the final dispense.
    pub touch_tip: Option<TouchTip>,
    /// Wait after each aspiration (viscous liquids settling in the tip); a
    /// zero-volume air gap is drawn first so nothing drips during the wait.
    pub pre_dispense_delay: Option<Duration>,
    /// When false, hold back 10 uL on every dispense instead of emptying the
    /// tip (supernatant discards).
    pub dispense_all: bool,
}

impl Default for TransferParams {
    fn default() -> Self {
        TransferParams {
            mix_before: None,
            mix_after: None,
            touch_tip: None,
            pre_dispense_delay: None,
            dispense_all: true,
        }
    }
}

/// Move `volume` uL from `source` to `dest` under a single tip.
///
/// The volume is split by [`plan_chunks`] against the pipette's working
/// volume. Intermediate chunks dispense at `dest.top()` followed by a
/// blow-out; the final chunk dispenses at depth, then applies `mix_after`,
/// blow-out and `touch_tip` before the tip is dropped.
pub fn execute_transfer(
    pipette: &mut dyn Pipette,
    ctl: &mut dyn RunControl,
    volume: u32,
    source: &Location,
    dest: &Location,
    params: &TransferParams,
) -> Result<()> {
    pipette.pick_up_tip()?;

    let capacity = pipette.working_volume();
    let chunks = plan_chunks(volume, capacity)?;
    debug!("transfer {volume} uL {source} -> {dest} in {} chunk(s)", chunks.len());

    let (last, head) = chunks.split_last().expect("plan is never empty");

    let mix_volume = |mix: &Mix, chunk: u32| mix.volume.unwrap_or(chunk).min(capacity);

    // dispense to the top of the well so we can reuse the tip
    for &chunk in head {
        if let Some(mix) = &params.mix_before {
            pipette.mix(mix.repetitions, mix_volume(mix, chunk), source)?;
        }
        pipette.aspirate(chunk, source)?;
        if let Some(delay) = params.pre_dispense_delay {
            pipette.air_gap(0)?;
            ctl.delay(delay)?;
        }
        let out = if params.dispense_all { chunk } else { chunk.saturating_sub(HOLDBACK_UL) };
        pipette.dispense(out, &dest.top())?;
        pipette.blow_out(dest)?;
    }

    // the final chunk, dispensed at depth
    if let Some(mix) = &params.mix_before {
        pipette.mix(mix.repetitions, mix_volume(mix, *last), source)?;
    }
    pipette.aspirate(*last, source)?;
    if let Some(delay) = params.pre_dispense_delay {
        pipette.air_gap(0)?;
        ctl.delay(delay)?;
    }
    let out = if params.dispense_all { *last } else { last.saturating_sub(HOLDBACK_UL) };
    pipette.dispense(out, dest)?;

    if let Some(mix) = &params.mix_after {
        pipette.mix(mix.repetitions, mix_volume(mix, *last), dest)?;
    }

    pipette.blow_out(dest)?;
    if let Some(touch) = &params.touch_tip {
        pipette.touch_tip(touch.radius, touch.v_offset_mm, TOUCH_SPEED_MM_S)?;
    }
    pipette.drop_tip()
}
