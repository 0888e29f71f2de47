//! qPCR reaction-plate assembly from extracted RNA eluates.
//!
//! Aliquots 10 uL of eluent per column into the cold qPCR plate, then adds
//! 15 uL of reaction master mix with thorough mixing on both sides of the
//! transfer. Run this immediately after the extraction, with the output
//! plate still on the temperature module.
//!
//! Manual prep beforehand: thaw reagents on ice, vortex and spin down, dilute
//! the positive control to 25 copies/uL, and combine the master mix with 10%
//! overage for the number of tests plus the two controls.

use log::info;

use crate::deck::{QPCR_PLATE, QPCR_REAGENT_PLATE, RNA_PLATE};
use crate::error::Result;
use crate::instrument::ProtocolEnv;
use crate::reagent::{Reagent, ReagentMap};
use crate::transfer::{execute_transfer, Mix, TouchTip, TransferParams};

const VOL_RNA: u32 = 10;
const VOL_MASTER_MIX: u32 = 15;
const PLATE_TEMP_C: f64 = 4.0;

const TOUCH_SM_PCR: TouchTip = TouchTip { radius: 1.2, v_offset_mm: -2.0 };

/// Master mix lives in one column of a PCR plate: each channel draws from its
/// own well, so depletion is tracked per well.
pub fn reagent_map() -> ReagentMap {
    let mut map = ReagentMap::new();
    // 15 uL per sample, 198 uL in each well of the column
    map.insert(Reagent::MasterMix, vec![(198, QPCR_REAGENT_PLATE.column(0))]);
    map
}

/// Move 10 uL of eluent from each RNA-plate column to the qPCR plate.
fn aliquot_eluent(env: &mut ProtocolEnv<'_>) -> Result<()> {
    info!("aliquoting RNA eluent");
    let params = TransferParams::default();
    for c in 0..env.num_cols {
        execute_transfer(
            &mut *env.small,
            &mut *env.ctl,
            VOL_RNA,
            &RNA_PLATE.column(c),
            &QPCR_PLATE.column(c),
            &params,
        )?;
    }
    Ok(())
}

/// Add 15 uL of master mix to each qPCR column.
fn add_master_mix(env: &mut ProtocolEnv<'_>, reagents: &mut ReagentMap) -> Result<()> {
    info!("adding master mix");
    let params = TransferParams {
        mix_before: Some(Mix::fixed(5, VOL_MASTER_MIX)),
        mix_after: Some(Mix::fixed(5, VOL_MASTER_MIX)),
        touch_tip: Some(TOUCH_SM_PCR),
        ..Default::default()
    };
    for c in 0..env.num_cols {
        let source = reagents.take(Reagent::MasterMix, VOL_MASTER_MIX)?;
        execute_transfer(
            &mut *env.small,
            &mut *env.ctl,
            VOL_MASTER_MIX,
            &source,
            &QPCR_PLATE.column(c),
            &params,
        )?;
    }
    Ok(())
}

/// The full qPCR prep. Only the small pipette is used; after the run the
/// operator seals the plate, vortexes for 10 seconds and spins it down.
pub fn run(env: &mut ProtocolEnv<'_>) -> Result<()> {
    info!("qPCR prep, {} columns", env.num_cols);
    env.small.reset_defaults();
    let mut reagents = reagent_map();

    env.temp.set_temperature(PLATE_TEMP_C)?;
    aliquot_eluent(env)?;
    add_master_mix(env, &mut reagents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Event, SimRun};

    #[test]
    fn full_plate_prep_uses_one_tip_per_transfer() {
        let sim = SimRun::new();
        let mut small = sim.small_pipette();
        let mut large = sim.large_pipette();
        let mut ctl = sim.run_control();
        let mut mag = sim.magnetic_module();
        let mut temp = sim.temperature_module();
        {
            let mut env = ProtocolEnv {
                small: &mut small,
                large: &mut large,
                ctl: &mut ctl,
                mag: &mut mag,
                temp: &mut temp,
                num_cols: 12,
            };
            run(&mut env).unwrap();
        }
        assert_eq!(small.tips_used(), 24);
        assert_eq!(large.tips_used(), 0);
        assert_eq!(temp.temperature(), Some(4.0));
        assert!(!mag.engaged());

        let events = sim.events();
        // no operator handoffs in this protocol
        assert!(!events.iter().any(|e| matches!(e, Event::Pause { .. })));

        let eluent: Vec<&Event> = events
            .iter()
            .filter(|e| {
                matches!(e, Event::Aspirate { volume_ul: 10, location, .. } if location.labware == "RNA Plate")
            })
            .collect();
        assert_eq!(eluent.len(), 12);

        let mix_sources: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                Event::Aspirate { volume_ul: 15, location, .. }
                    if location.labware == "Reagent Plate" =>
                {
                    Some(location.column)
                }
                _ => None,
            })
            .collect();
        // master mix always comes from column 0: 12 x 15 uL fits in 198 uL
        assert_eq!(mix_sources, vec![0; 12]);

        // every master-mix transfer touches the wall exactly once
        let touches = events.iter().filter(|e| matches!(e, Event::TouchTip { .. })).count();
        assert_eq!(touches, 12);
    }
}
