//! Static deck layouts for the supported protocols.
//!
//! These tables are configuration, not logic: which labware sits in which
//! slot, where the tip racks are, and which mount carries which pipette. The
//! protocol modules consume them; nothing here is computed at runtime.

use core::fmt;

use crate::labware::{LabwareSpec, Slot, TipRackSpec};

/// Pipette mount side.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mount {
    Left,
    Right,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Left => write!(f, "left"),
            Mount::Right => write!(f, "right"),
        }
    }
}

/// An instrument and the mount it occupies.
#[derive(Clone, Debug)]
pub struct InstrumentSpec {
    /// Vendor load name (e.g. `"p300_multi_gen2"`).
    pub name: &'static str,
    pub mount: Mount,
}

// ---------------------------------------------------------------------------
// RNA extraction (MagMAX), 200 uL sample input
// ---------------------------------------------------------------------------

/// Temperature module holding the output plate (slot 7).
pub const EXTRACTION_TEMP_MODULE_SLOT: Slot = Slot(7);
/// Magnetic module holding the reaction plate (slot 10).
pub const EXTRACTION_MAG_MODULE_SLOT: Slot = Slot(10);

/// Eluate destination; sits on the temperature module, kept at 4 C.
pub const OUTPUT_PLATE: LabwareSpec = LabwareSpec {
    name: "biorad_96_wellplate_200ul_pcr",
    slot: None,
    label: "Output Plate",
    columns: 12,
};

/// Deep-well plate the samples are lysed and washed in; sits on the magnet.
pub const REACTION_PLATE: LabwareSpec = LabwareSpec {
    name: "usascientific_96_wellplate_2.4ml_deep",
    slot: None,
    label: "Reaction Plate",
    columns: 12,
};

/// Small-volume reagents (Proteinase K, MS2 control).
pub const REAGENT_PLATE: LabwareSpec = LabwareSpec {
    name: "biorad_96_wellplate_200ul_pcr",
    slot: Some(Slot(5)),
    label: "Reagent Plate",
    columns: 12,
};

/// Bulk reagents (bead mix, wash buffer, ethanol, elution solution).
pub const REAGENT_RESERVOIR: LabwareSpec = LabwareSpec {
    name: "usascientific_12_reservoir_22ml",
    slot: Some(Slot(11)),
    label: "Reagent Reservoir",
    columns: 12,
};

/// Single-well waste trough for discarded supernatant.
pub const WASTE_RESERVOIR: LabwareSpec = LabwareSpec {
    name: "agilent_1_reservoir_290ml",
    slot: Some(Slot(8)),
    label: "Waste Reservoir",
    columns: 1,
};

/// 20 uL filter-tip racks for the small pipette.
pub const EXTRACTION_FILTER_TIP_20: &[TipRackSpec] = &[
    TipRackSpec { name: "opentrons_96_filtertiprack_20ul", slot: Slot(1), label: "Filter Tip SM1" },
    TipRackSpec { name: "opentrons_96_filtertiprack_20ul", slot: Slot(4), label: "Filter Tip SM4" },
];

/// 200 uL filter-tip racks for the large pipette.
pub const EXTRACTION_FILTER_TIP_200: &[TipRackSpec] = &[
    TipRackSpec { name: "opentrons_96_filtertiprack_200ul", slot: Slot(2), label: "Filter Tip LG3" },
    TipRackSpec { name: "opentrons_96_filtertiprack_200ul", slot: Slot(3), label: "Filter Tip LG6" },
    TipRackSpec { name: "opentrons_96_filtertiprack_200ul", slot: Slot(6), label: "Filter Tip LG9" },
    TipRackSpec { name: "opentrons_96_filtertiprack_200ul", slot: Slot(9), label: "Filter Tip LG5" },
];

/// Small-volume 8-channel pipette.
pub const P20_MULTI: InstrumentSpec = InstrumentSpec { name: "p20_multi_gen2", mount: Mount::Right };
/// Large-volume 8-channel pipette.
pub const P300_MULTI: InstrumentSpec = InstrumentSpec { name: "p300_multi_gen2", mount: Mount::Left };

// ---------------------------------------------------------------------------
// qPCR plate prep
// ---------------------------------------------------------------------------

/// Temperature module holding the qPCR plate (slot 7).
pub const QPCR_TEMP_MODULE_SLOT: Slot = Slot(7);

/// Reaction plate being assembled; sits on the temperature module.
pub const QPCR_PLATE: LabwareSpec = LabwareSpec {
    name: "biorad_96_wellplate_200ul_pcr",
    slot: None,
    label: "qPCR Plate",
    columns: 12,
};

/// Extracted RNA eluates, straight from the extraction run.
pub const RNA_PLATE: LabwareSpec = LabwareSpec {
    name: "biorad_96_wellplate_200ul_pcr",
    slot: Some(Slot(8)),
    label: "RNA Plate",
    columns: 12,
};

/// Master mix source plate.
pub const QPCR_REAGENT_PLATE: LabwareSpec = LabwareSpec {
    name: "biorad_96_wellplate_200ul_pcr",
    slot: Some(Slot(4)),
    label: "Reagent Plate",
    columns: 12,
};

/// 20 uL filter-tip racks for the qPCR prep.
pub const QPCR_FILTER_TIP_20: &[TipRackSpec] = &[
    TipRackSpec { name: "opentrons_96_filtertiprack_20ul", slot: Slot(1), label: "Filter Tip S-1" },
    TipRackSpec { name: "opentrons_96_filtertiprack_20ul", slot: Slot(2), label: "Filter Tip S-2" },
];
