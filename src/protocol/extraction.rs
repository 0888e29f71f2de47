//! RNA extraction with the MagMAX Viral/Pathogen II kit, 200 uL sample input.
//!
//! The run is one straight line: lyse (Proteinase K, binding bead mix, MS2
//! control), capture on the magnet, three bead washes, then elute onto a cold
//! output plate. Operator steps (sealing, shaking, incubating, refilling tip
//! racks) happen at explicit pauses; bead capture is an explicit timed delay.
//!
//! Before the run the operator prepares the Binding Bead Mix fresh each day:
//! 265 uL Binding Solution plus 10 uL Total Nucleic Acid Magnetic Beads per
//! reaction, plus 10% overage, mixed by inversion and kept at room
//! temperature.

use std::time::Duration;

use log::info;

use crate::deck::{OUTPUT_PLATE, REACTION_PLATE, REAGENT_PLATE, REAGENT_RESERVOIR, WASTE_RESERVOIR};
use crate::error::Result;
use crate::instrument::ProtocolEnv;
use crate::reagent::{Reagent, ReagentMap};
use crate::transfer::{execute_transfer, Mix, TouchTip, TransferParams};

// Per-column volumes, in uL.
const VOL_PROTEINASE_K: u32 = 5;
const VOL_MS2: u32 = 5;
const VOL_BEAD: u32 = 275;
const VOL_WASH: u32 = 500;
const VOL_ETHANOL_2: u32 = 250;
const VOL_ELUTE: u32 = 50;
const VOL_WASTE: u32 = 485;
const VOL_MIX_SMALL: u32 = 10;

const OUTPUT_TEMP_C: f64 = 4.0;
const MAG_ENGAGE_HEIGHT_MM: f64 = 12.0;

/// Aspirating close to the bottom while the beads are pelleted.
const DEPTH_BOTTOM_LOW_MM: f64 = 1.0;
/// Slow flow for supernatant removal, to leave the pellet undisturbed.
const SLOW_FLOW_UL_S: f64 = 50.0;

/// The bead mix is viscous; let it settle in the tip after aspirating.
const BEAD_SETTLE: Duration = Duration::from_secs(5);

// Touch-tip geometry per pipette/labware pairing.
const TOUCH_SM_DEEPWELL: TouchTip = TouchTip { radius: 1.0, v_offset_mm: -3.0 };
const TOUCH_LG_DEEPWELL: TouchTip = TouchTip { radius: 0.75, v_offset_mm: -7.0 };
const TOUCH_LG_PCR: TouchTip = TouchTip { radius: 0.8, v_offset_mm: -1.0 };

/// Initial reagent quantities and their wells, sized for a full 96-well plate
/// with 10% overage.
pub fn reagent_map() -> ReagentMap {
    let mut map = ReagentMap::new();
    // 5 uL per sample, 528 uL in the well
    map.insert(Reagent::ProteinaseK, vec![(528, REAGENT_PLATE.column(0))]);
    map.insert(Reagent::Ms2PhageControl, vec![(528, REAGENT_PLATE.column(1))]);
    // 275 uL per sample, 14.52 mL per reservoir well
    map.insert(
        Reagent::BindingBeadMix,
        vec![(14520, REAGENT_RESERVOIR.column(0)), (14520, REAGENT_RESERVOIR.column(1))],
    );
    // 500 uL per sample, 17.6 mL per reservoir well
    map.insert(
        Reagent::WashBuffer,
        vec![
            (17600, REAGENT_RESERVOIR.column(2)),
            (17600, REAGENT_RESERVOIR.column(3)),
            (17600, REAGENT_RESERVOIR.column(4)),
        ],
    );
    map.insert(
        Reagent::EthanolWash1,
        vec![
            (17600, REAGENT_RESERVOIR.column(5)),
            (17600, REAGENT_RESERVOIR.column(6)),
            (17600, REAGENT_RESERVOIR.column(7)),
        ],
    );
    // 250 uL per sample, 13.2 mL per reservoir well
    map.insert(
        Reagent::EthanolWash2,
        vec![(13200, REAGENT_RESERVOIR.column(8)), (13200, REAGENT_RESERVOIR.column(9))],
    );
    // 50 uL per sample, 5.28 mL in the well
    map.insert(Reagent::ElutionSolution, vec![(5280, REAGENT_RESERVOIR.column(10))]);
    map
}

/// Mix and add 5 uL of Proteinase K to each reaction column (the wells
/// already hold 200 uL of sample).
fn add_proteinase_k(env: &mut ProtocolEnv<'_>, reagents: &mut ReagentMap) -> Result<()> {
    info!("adding Proteinase K");
    let params = TransferParams {
        mix_before: Some(Mix::fixed(2, VOL_MIX_SMALL)),
        mix_after: Some(Mix::fixed(3, VOL_MIX_SMALL)),
        touch_tip: Some(TOUCH_SM_DEEPWELL),
        ..Default::default()
    };
    for c in 0..env.num_cols {
        let needed = VOL_PROTEINASE_K * env.small.channels();
        let source = reagents.take(Reagent::ProteinaseK, needed)?;
        execute_transfer(
            &mut *env.small,
            &mut *env.ctl,
            VOL_PROTEINASE_K,
            &source,
            &REACTION_PLATE.column(c),
            &params,
        )?;
    }
    Ok(())
}

/// Mix and add 275 uL of Binding Bead Mix to each reaction column, rolling
/// over between the two reservoir wells as they run low.
fn add_beads(env: &mut ProtocolEnv<'_>, reagents: &mut ReagentMap) -> Result<()> {
    info!("adding Binding Bead Mix");
    let params = TransferParams {
        mix_before: Some(Mix::scaled(5)),
        mix_after: Some(Mix::scaled(2)),
        touch_tip: Some(TOUCH_LG_DEEPWELL),
        pre_dispense_delay: Some(BEAD_SETTLE),
        ..Default::default()
    };
    for c in 0..env.num_cols {
        let needed = VOL_BEAD * env.large.channels();
        let source = reagents.take(Reagent::BindingBeadMix, needed)?;
        execute_transfer(
            &mut *env.large,
            &mut *env.ctl,
            VOL_BEAD,
            &source,
            &REACTION_PLATE.column(c),
            &params,
        )?;
    }
    Ok(())
}

/// Add 5 uL of MS2 Phage Control to each reaction column.
fn add_ms2(env: &mut ProtocolEnv<'_>, reagents: &mut ReagentMap) -> Result<()> {
    info!("adding MS2 Phage Control");
    let params = TransferParams {
        mix_before: Some(Mix::fixed(2, VOL_MIX_SMALL)),
        mix_after: Some(Mix::fixed(3, VOL_MIX_SMALL)),
        touch_tip: Some(TOUCH_SM_DEEPWELL),
        ..Default::default()
    };
    for c in 0..env.num_cols {
        let needed = VOL_MS2 * env.small.channels();
        let source = reagents.take(Reagent::Ms2PhageControl, needed)?;
        execute_transfer(
            &mut *env.small,
            &mut *env.ctl,
            VOL_MS2,
            &source,
            &REACTION_PLATE.column(c),
            &params,
        )?;
    }
    Ok(())
}

/// With the plate on the magnet, remove the supernatant to waste without
/// disturbing the pellet: low aspiration depth, slow flow, 10 uL holdback.
fn discard_supernatant(env: &mut ProtocolEnv<'_>) -> Result<()> {
    info!("discarding supernatant");
    env.large.set_aspirate_clearance(DEPTH_BOTTOM_LOW_MM);
    env.large.set_flow_rate(SLOW_FLOW_UL_S, SLOW_FLOW_UL_S);
    let params = TransferParams { dispense_all: false, ..Default::default() };
    for c in 0..env.num_cols {
        execute_transfer(
            &mut *env.large,
            &mut *env.ctl,
            VOL_WASTE,
            &REACTION_PLATE.column(c),
            &WASTE_RESERVOIR.column(0),
            &params,
        )?;
    }
    env.large.reset_defaults();
    Ok(())
}

/// Add `volume` of `reagent` to every reaction column.
fn wash(env: &mut ProtocolEnv<'_>, reagents: &mut ReagentMap, reagent: Reagent, volume: u32) -> Result<()> {
    let params = TransferParams {
        mix_before: Some(Mix::scaled(3)),
        mix_after: Some(Mix::scaled(5)),
        touch_tip: Some(TOUCH_LG_DEEPWELL),
        ..Default::default()
    };
    for c in 0..env.num_cols {
        let needed = volume * env.large.channels();
        let source = reagents.take(reagent, needed)?;
        execute_transfer(
            &mut *env.large,
            &mut *env.ctl,
            volume,
            &source,
            &REACTION_PLATE.column(c),
            &params,
        )?;
    }
    Ok(())
}

/// One full wash cycle: off the magnet, add wash liquid, hand off for
/// sealing/shaking, recapture, and discard the supernatant.
fn wash_beads(env: &mut ProtocolEnv<'_>, reagents: &mut ReagentMap, reagent: Reagent, volume: u32) -> Result<()> {
    info!("washing beads with {} uL of {}", volume, reagent.name());
    env.mag.disengage()?;
    wash(env, reagents, reagent, volume)?;
    env.ctl.pause("Reseal the plate, then shake at 1,050 rpm for 1 minute")?;
    env.mag.engage(MAG_ENGAGE_HEIGHT_MM)?;
    env.ctl.delay(Duration::from_secs(2 * 60))?;
    discard_supernatant(env)
}

/// Add 50 uL of Elution Solution to each column.
fn elute(env: &mut ProtocolEnv<'_>, reagents: &mut ReagentMap) -> Result<()> {
    info!("adding Elution Solution");
    env.large.set_aspirate_clearance(DEPTH_BOTTOM_LOW_MM);
    let params = TransferParams {
        mix_before: Some(Mix::fixed(3, 175)),
        mix_after: Some(Mix::fixed(5, 35)),
        touch_tip: Some(TOUCH_LG_DEEPWELL),
        ..Default::default()
    };
    for c in 0..env.num_cols {
        let needed = VOL_ELUTE * env.large.channels();
        let source = reagents.take(Reagent::ElutionSolution, needed)?;
        execute_transfer(
            &mut *env.large,
            &mut *env.ctl,
            VOL_ELUTE,
            &source,
            &REACTION_PLATE.column(c),
            &params,
        )?;
    }
    env.large.reset_defaults();
    Ok(())
}

/// With the beads captured, move the eluates to the cold output plate.
fn make_qpcr_plate(env: &mut ProtocolEnv<'_>) -> Result<()> {
    info!("transferring eluates to the output plate");
    env.large.set_aspirate_clearance(DEPTH_BOTTOM_LOW_MM);
    let params = TransferParams { touch_tip: Some(TOUCH_LG_PCR), ..Default::default() };
    for c in 0..env.num_cols {
        execute_transfer(
            &mut *env.large,
            &mut *env.ctl,
            VOL_ELUTE,
            &REACTION_PLATE.column(c),
            &OUTPUT_PLATE.column(c),
            &params,
        )?;
    }
    env.large.reset_defaults();
    Ok(())
}

/// The full extraction, start to finish.
pub fn run(env: &mut ProtocolEnv<'_>) -> Result<()> {
    info!("RNA extraction (MagMAX), {} columns", env.num_cols);
    env.small.reset_defaults();
    env.large.reset_defaults();
    let mut reagents = reagent_map();

    // Lyse the samples.
    add_proteinase_k(env, &mut reagents)?;
    add_beads(env, &mut reagents)?;
    add_ms2(env, &mut reagents)?;
    env.ctl.pause(
        "Seal the plate, shake at 1,050 rpm for 2 minutes, incubate at 65 C for 5 minutes, \
         then shake at 1,050 rpm for 5 minutes",
    )?;

    // Capture the beads; 10 minutes or until all beads have collected.
    env.mag.engage(MAG_ENGAGE_HEIGHT_MM)?;
    env.ctl.delay(Duration::from_secs(10 * 60))?;

    // Wash the beads.
    discard_supernatant(env)?;
    wash_beads(env, &mut reagents, Reagent::WashBuffer, VOL_WASH)?;

    env.ctl.pause("Refill the 200 uL filter-tip racks")?;
    env.large.reset_tip_racks();

    wash_beads(env, &mut reagents, Reagent::EthanolWash1, VOL_WASH)?;
    wash_beads(env, &mut reagents, Reagent::EthanolWash2, VOL_ETHANOL_2)?;

    env.ctl.pause(
        "Dry the beads: shake the uncovered plate at 1,050 rpm for 2 minutes, \
         and refill the 200 uL filter-tip racks",
    )?;
    env.large.reset_tip_racks();

    // Elute the nucleic acid onto the cold output plate.
    env.temp.set_temperature(OUTPUT_TEMP_C)?;
    env.mag.disengage()?;
    elute(env, &mut reagents)?;
    env.ctl.pause(
        "Seal the plate, shake at 1,050 rpm for 5 minutes, incubate at 65 C for 10 minutes, \
         then shake at 1,050 rpm for 5 minutes",
    )?;
    env.mag.engage(MAG_ENGAGE_HEIGHT_MM)?;
    env.ctl.delay(Duration::from_secs(3 * 60))?;
    make_qpcr_plate(env)?;

    info!("extraction complete; proceed immediately to qPCR prep");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Event, SimRun};

    fn simulate(num_cols: usize) -> (SimRun, u32, u32) {
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
                num_cols,
            };
            run(&mut env).unwrap();
        }
        assert!(mag.engaged(), "run ends with the beads captured");
        assert_eq!(temp.temperature(), Some(4.0));
        // the slow/low supernatant settings are always restored afterwards
        assert_eq!(large.aspirate_clearance_mm(), crate::sim::DEFAULT_CLEARANCE_MM);
        assert_eq!(large.flow_rate_ul_s(), (crate::sim::DEFAULT_FLOW_UL_S, crate::sim::DEFAULT_FLOW_UL_S));
        let (s, l) = (small.tips_used(), large.tips_used());
        (sim, s, l)
    }

    #[test]
    fn reagent_map_registers_every_reagent_the_run_needs() {
        let map = reagent_map();
        for r in [
            Reagent::ProteinaseK,
            Reagent::Ms2PhageControl,
            Reagent::BindingBeadMix,
            Reagent::WashBuffer,
            Reagent::EthanolWash1,
            Reagent::EthanolWash2,
            Reagent::ElutionSolution,
        ] {
            assert!(map.stack(r).is_some(), "{} missing", r.name());
        }
        assert_eq!(map.stack(Reagent::BindingBeadMix).unwrap().current_remaining(), 14520);
    }

    #[test]
    fn full_plate_trace_has_the_expected_shape() {
        let (sim, small_tips, large_tips) = simulate(12);
        let events = sim.events();

        // One tip per column for Proteinase K and MS2.
        assert_eq!(small_tips, 24);
        // Large pipette: beads (12) + 4 supernatant discards (48) + 3 washes
        // (36) + elution (12) + output transfer (12).
        assert_eq!(large_tips, 120);

        let pauses = events.iter().filter(|e| matches!(e, Event::Pause { .. })).count();
        // lyse handoff + 3 wash handoffs + 2 tip refills + elution handoff
        assert_eq!(pauses, 7);

        let engages = events.iter().filter(|e| matches!(e, Event::MagnetEngage { .. })).count();
        let disengages = events.iter().filter(|e| matches!(e, Event::MagnetDisengage)).count();
        assert_eq!(engages, 5); // initial capture + 3 washes + elution capture
        assert_eq!(disengages, 4); // 3 washes + elution

        // Bead capture is 10 minutes, washes 2, elution 3.
        let delays: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                Event::Delay { seconds } => Some(*seconds),
                _ => None,
            })
            .collect();
        assert_eq!(delays.iter().filter(|&&s| s == 600).count(), 1);
        assert_eq!(delays.iter().filter(|&&s| s == 120).count(), 3);
        assert_eq!(delays.iter().filter(|&&s| s == 180).count(), 1);
        // plus a 5 s settle after each bead-mix aspiration (2 chunks/column)
        assert_eq!(delays.iter().filter(|&&s| s == 5).count(), 24);
    }

    #[test]
    fn bead_mix_rolls_to_the_second_reservoir_well_mid_plate() {
        let (sim, _, _) = simulate(12);
        // 275 uL x 8 channels = 2200 uL per column out of 14520 uL per well:
        // six columns per well, so the bead chunks (138/137) aspirate from
        // reservoir columns 0 and 1 twelve times each.
        let bead_aspirates: Vec<usize> = sim
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::Aspirate { volume_ul, location, .. }
                    if location.labware == "Reagent Reservoir"
                        && (*volume_ul == 138 || *volume_ul == 137) =>
                {
                    Some(location.column)
                }
                _ => None,
            })
            .collect();
        assert_eq!(bead_aspirates.len(), 24);
        assert_eq!(bead_aspirates.iter().filter(|&&c| c == 0).count(), 12);
        assert_eq!(bead_aspirates.iter().filter(|&&c| c == 1).count(), 12);
        // forward-only: once on well 1, never back to well 0
        let first_on_1 = bead_aspirates.iter().position(|&c| c == 1).unwrap();
        assert!(bead_aspirates[first_on_1..].iter().all(|&c| c == 1));
    }

    #[test]
    fn wash_buffer_walks_across_its_three_wells() {
        let (sim, _, _) = simulate(12);
        // 500 uL x 8 = 4000 uL per column out of 17600 per well: four columns
        // per well across reservoir columns 2..=4.
        let wash_wells: Vec<usize> = sim
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::Aspirate { volume_ul, location, .. }
                    if location.labware == "Reagent Reservoir"
                        && location.column >= 2
                        && location.column <= 4
                        && (*volume_ul == 167 || *volume_ul == 166) =>
                {
                    Some(location.column)
                }
                _ => None,
            })
            .collect();
        assert!(wash_wells.contains(&2) && wash_wells.contains(&3) && wash_wells.contains(&4));
    }

    #[test]
    fn a_short_plate_needs_no_rollover() {
        let (sim, small_tips, large_tips) = simulate(4);
        assert_eq!(small_tips, 8);
        assert_eq!(large_tips, 40);
        // every bead aspiration stays on the first reservoir well
        assert!(sim.events().iter().all(|e| match e {
            Event::Aspirate { volume_ul, location, .. }
                if location.labware == "Reagent Reservoir"
                    && (*volume_ul == 138 || *volume_ul == 137) =>
                location.column == 0,
            _ => true,
        }));
    }
}
