#![forbid(unsafe_code)]
//! # beadwash
//!
//! Typed liquid-handling protocols for **magnetic-bead RNA extraction** and
//! **qPCR reaction-plate assembly**, built around a **chunked transfer
//! planner** that splits volumes exceeding a pipette's working volume into
//! near-equal sub-transfers under a single reused tip.
//!
//! ## Highlights
//! - 🧪 **Deterministic recipes**: each protocol is a straight-line sequence
//!   of explicit pipetting steps; no runtime branching, no error recovery.
//! - 🧭 **Explicit handles**: every operation takes its pipette, run control
//!   and module handles as arguments; there is no ambient run context.
//! - 📋 **Simulated deck**: a trace-recording backend drives the CLI and the
//!   tests; no hardware is modeled.
//!
//! ## Examples
//! ```rust
//! // Split 500 uL across a 200 uL pipette: minimal chunks, exact sum.
//! assert_eq!(beadwash::plan::plan_chunks(500, 200).unwrap(), vec![167, 167, 166]);
//! // Discover protocols:
//! for p in beadwash::list_supported_protocols() { println!("{} — {}", p.id, p.description); }
//! // Simulate a full extraction and inspect the trace:
//! let sim = beadwash::sim::SimRun::new();
//! let (mut small, mut large) = (sim.small_pipette(), sim.large_pipette());
//! let (mut ctl, mut mag, mut temp) =
//!     (sim.run_control(), sim.magnetic_module(), sim.temperature_module());
//! let mut env = beadwash::ProtocolEnv {
//!     small: &mut small, large: &mut large, ctl: &mut ctl, mag: &mut mag,
//!     temp: &mut temp, num_cols: 12,
//! };
//! (beadwash::get_protocol("rna-extraction-magmax").unwrap().run)(&mut env).unwrap();
//! assert!(!sim.events().is_empty());
//! ```

pub mod deck;
pub mod error;
pub mod instrument;
pub mod labware;
pub mod plan;
pub mod reagent;
pub mod sim;
pub mod transfer;
pub mod protocol { pub mod extraction; pub mod qpcr; }

pub use error::{Error, Result};
pub use instrument::ProtocolEnv;

use deck::InstrumentSpec;
use labware::{LabwareSpec, Slot, TipRackSpec};

/// A runnable protocol and the deck it expects.
#[derive(Clone)]
pub struct ProtocolInfo {
    /// Stable identifier (e.g. `"rna-extraction-magmax"`).
    pub id: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Plates and reservoirs on the deck.
    pub labware: &'static [&'static LabwareSpec],
    /// Tip racks for the small pipette.
    pub small_tip_racks: &'static [TipRackSpec],
    /// Tip racks for the large pipette (empty when unused).
    pub large_tip_racks: &'static [TipRackSpec],
    /// Pipettes and their mounts.
    pub instruments: &'static [InstrumentSpec],
    /// Magnetic module slot, if the protocol drives one.
    pub mag_module_slot: Option<Slot>,
    /// Temperature module slot, if the protocol drives one.
    pub temp_module_slot: Option<Slot>,
    /// Entry point, driven with explicit handles.
    pub run: fn(&mut ProtocolEnv<'_>) -> Result<()>,
}

/// Static registry of supported protocols.
pub const PROTOCOLS: &[ProtocolInfo] = &[
    ProtocolInfo {
        id: "rna-extraction-magmax",
        description: "Extract RNA with the MagMAX Viral/Pathogen II kit, 200 uL sample input",
        labware: &[
            &deck::OUTPUT_PLATE,
            &deck::REACTION_PLATE,
            &deck::REAGENT_PLATE,
            &deck::REAGENT_RESERVOIR,
            &deck::WASTE_RESERVOIR,
        ],
        small_tip_racks: deck::EXTRACTION_FILTER_TIP_20,
        large_tip_racks: deck::EXTRACTION_FILTER_TIP_200,
        instruments: &[deck::P20_MULTI, deck::P300_MULTI],
        mag_module_slot: Some(deck::EXTRACTION_MAG_MODULE_SLOT),
        temp_module_slot: Some(deck::EXTRACTION_TEMP_MODULE_SLOT),
        run: protocol::extraction::run,
    },
    ProtocolInfo {
        id: "qpcr-prep-taqpath",
        description: "Aliquot RNA eluent and distribute reaction master mix to a 96-well plate",
        labware: &[&deck::QPCR_PLATE, &deck::RNA_PLATE, &deck::QPCR_REAGENT_PLATE],
        small_tip_racks: deck::QPCR_FILTER_TIP_20,
        large_tip_racks: &[],
        instruments: &[deck::P20_MULTI],
        mag_module_slot: None,
        temp_module_slot: Some(deck::QPCR_TEMP_MODULE_SLOT),
        run: protocol::qpcr::run,
    },
];

/// Return the static registry of supported protocols.
pub fn list_supported_protocols() -> &'static [ProtocolInfo] {
    PROTOCOLS
}

/// Look up a protocol by id (case-insensitive).
pub fn get_protocol(id: &str) -> Option<&'static ProtocolInfo> {
    PROTOCOLS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod registry_tests {
    use super::*;
    use crate::sim::SimRun;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(get_protocol("RNA-Extraction-MagMAX").is_some());
        assert!(get_protocol("qpcr-prep-taqpath").is_some());
        assert!(get_protocol("no-such-protocol").is_none());
    }

    #[test]
    fn extraction_deck_matches_the_constants_file() {
        let p = get_protocol("rna-extraction-magmax").unwrap();
        assert_eq!(p.labware.len(), 5);
        assert_eq!(p.small_tip_racks.len(), 2);
        assert_eq!(p.large_tip_racks.len(), 4);
        assert_eq!(p.mag_module_slot, Some(labware::Slot(10)));
        assert_eq!(p.temp_module_slot, Some(labware::Slot(7)));
        // reaction plate sits on the magnet, so it carries no slot of its own
        let reaction = p.labware.iter().find(|l| l.label == "Reaction Plate").unwrap();
        assert!(reaction.slot.is_none());
    }

    #[test]
    fn every_registered_protocol_simulates_cleanly() {
        for info in list_supported_protocols() {
            let sim = SimRun::new();
            let mut small = sim.small_pipette();
            let mut large = sim.large_pipette();
            let mut ctl = sim.run_control();
            let mut mag = sim.magnetic_module();
            let mut temp = sim.temperature_module();
            let mut env = ProtocolEnv {
                small: &mut small,
                large: &mut large,
                ctl: &mut ctl,
                mag: &mut mag,
                temp: &mut temp,
                num_cols: 12,
            };
            (info.run)(&mut env).expect(info.id);
            assert!(!sim.events().is_empty(), "{} produced no trace", info.id);
        }
    }
}
