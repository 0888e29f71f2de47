//! Simulated instrument backend.
//!
//! [`SimRun`] hands out pipettes, run control and module handles that all
//! append to one shared event trace. The simulator enforces the tip contract
//! (no double pickup, no liquid handling without a tip) and can inject a
//! failure at an arbitrary instrument op so tests can watch a run halt.
//!
//! The trace is the crate's only output surface: tests assert on its shape,
//! and the CLI serializes it as CSV rows or JSON.
//!
//! Everything here is single-threaded by design, matching the protocols; the
//! handles share the trace through `Rc<RefCell<..>>`.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use log::info;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::instrument::{MagneticModule, Pipette, RunControl, TemperatureModule};
use crate::labware::Location;

/// Default well-bottom clearance, in mm.
pub const DEFAULT_CLEARANCE_MM: f64 = 2.0;
/// Default aspirate/dispense flow rate, in uL/s.
pub const DEFAULT_FLOW_UL_S: f64 = 94.0;

/// One recorded instrument or run-control operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Event {
    PickUpTip { pipette: &'static str },
    DropTip { pipette: &'static str },
    Aspirate { pipette: &'static str, volume_ul: u32, location: Location },
    Dispense { pipette: &'static str, volume_ul: u32, location: Location },
    BlowOut { pipette: &'static str, location: Location },
    TouchTip { pipette: &'static str, radius: f64, v_offset_mm: f64, speed_mm_s: f64 },
    Mix { pipette: &'static str, repetitions: u32, volume_ul: u32, location: Location },
    AirGap { pipette: &'static str, volume_ul: u32 },
    Pause { message: String },
    Delay { seconds: u64 },
    MagnetEngage { height_mm: f64 },
    MagnetDisengage,
    SetTemperature { celsius: f64 },
}

#[derive(Default)]
struct Shared {
    events: Vec<Event>,
    /// Countdown to an injected failure; `Some(0)` fails the next op.
    fail_countdown: Option<u64>,
}

impl Shared {
    /// Record a physical instrument op, honoring the injected failure point.
    fn record(&mut self, operation: &'static str, event: Event) -> Result<()> {
        if let Some(n) = self.fail_countdown.as_mut() {
            if *n == 0 {
                return Err(Error::transfer(operation, "injected instrument failure"));
            }
            *n -= 1;
        }
        self.events.push(event);
        Ok(())
    }

    /// Record a run-control op; these are never failure-injected.
    fn record_ctl(&mut self, event: Event) {
        self.events.push(event);
    }
}

/// A simulated run: builds handles and owns the shared trace.
#[derive(Default)]
pub struct SimRun {
    shared: Rc<RefCell<Shared>>,
}

impl SimRun {
    pub fn new() -> Self {
        SimRun::default()
    }

    /// Make the `(n+1)`-th subsequent instrument op fail.
    pub fn fail_after_ops(&self, n: u64) {
        self.shared.borrow_mut().fail_countdown = Some(n);
    }

    /// A pipette with an arbitrary geometry.
    pub fn pipette(&self, name: &'static str, working_volume: u32, channels: u32) -> SimPipette {
        SimPipette {
            name,
            working_volume,
            channels,
            tip_on: false,
            tips_used: 0,
            aspirate_clearance_mm: DEFAULT_CLEARANCE_MM,
            dispense_clearance_mm: DEFAULT_CLEARANCE_MM,
            aspirate_flow_ul_s: DEFAULT_FLOW_UL_S,
            dispense_flow_ul_s: DEFAULT_FLOW_UL_S,
            shared: Rc::clone(&self.shared),
        }
    }

    /// The small-volume 8-channel pipette (20 uL working volume).
    pub fn small_pipette(&self) -> SimPipette {
        self.pipette("p20_multi_gen2", 20, 8)
    }

    /// The large-volume 8-channel pipette (200 uL working volume).
    pub fn large_pipette(&self) -> SimPipette {
        self.pipette("p300_multi_gen2", 200, 8)
    }

    pub fn run_control(&self) -> SimRunControl {
        SimRunControl { shared: Rc::clone(&self.shared) }
    }

    pub fn magnetic_module(&self) -> SimMagneticModule {
        SimMagneticModule { shared: Rc::clone(&self.shared), engaged: false }
    }

    pub fn temperature_module(&self) -> SimTemperatureModule {
        SimTemperatureModule { shared: Rc::clone(&self.shared), celsius: None }
    }

    /// Snapshot of the trace so far.
    pub fn events(&self) -> Vec<Event> {
        self.shared.borrow().events.clone()
    }
}

/// Simulated multichannel pipette.
pub struct SimPipette {
    name: &'static str,
    working_volume: u32,
    channels: u32,
    tip_on: bool,
    tips_used: u32,
    aspirate_clearance_mm: f64,
    dispense_clearance_mm: f64,
    aspirate_flow_ul_s: f64,
    dispense_flow_ul_s: f64,
    shared: Rc<RefCell<Shared>>,
}

impl SimPipette {
    /// Tips consumed so far (one per pickup).
    pub fn tips_used(&self) -> u32 {
        self.tips_used
    }

    pub fn aspirate_clearance_mm(&self) -> f64 {
        self.aspirate_clearance_mm
    }

    pub fn flow_rate_ul_s(&self) -> (f64, f64) {
        (self.aspirate_flow_ul_s, self.dispense_flow_ul_s)
    }

    fn require_tip(&self, operation: &'static str) -> Result<()> {
        if self.tip_on {
            Ok(())
        } else {
            Err(Error::transfer(operation, format!("{}: no tip attached", self.name)))
        }
    }
}

impl Pipette for SimPipette {
    fn working_volume(&self) -> u32 {
        self.working_volume
    }

    fn channels(&self) -> u32 {
        self.channels
    }

    fn pick_up_tip(&mut self) -> Result<()> {
        if self.tip_on {
            return Err(Error::transfer("pick_up_tip", format!("{}: tip already held", self.name)));
        }
        self.shared
            .borrow_mut()
            .record("pick_up_tip", Event::PickUpTip { pipette: self.name })?;
        self.tip_on = true;
        self.tips_used += 1;
        Ok(())
    }

    fn drop_tip(&mut self) -> Result<()> {
        self.require_tip("drop_tip")?;
        self.shared.borrow_mut().record("drop_tip", Event::DropTip { pipette: self.name })?;
        self.tip_on = false;
        Ok(())
    }

    fn aspirate(&mut self, volume: u32, location: &Location) -> Result<()> {
        self.require_tip("aspirate")?;
        if volume > self.working_volume {
            return Err(Error::transfer(
                "aspirate",
                format!("{}: {volume} uL exceeds the {} uL working volume", self.name, self.working_volume),
            ));
        }
        self.shared.borrow_mut().record(
            "aspirate",
            Event::Aspirate { pipette: self.name, volume_ul: volume, location: location.clone() },
        )
    }

    fn dispense(&mut self, volume: u32, location: &Location) -> Result<()> {
        self.require_tip("dispense")?;
        self.shared.borrow_mut().record(
            "dispense",
            Event::Dispense { pipette: self.name, volume_ul: volume, location: location.clone() },
        )
    }

    fn blow_out(&mut self, location: &Location) -> Result<()> {
        self.require_tip("blow_out")?;
        self.shared.borrow_mut().record(
            "blow_out",
            Event::BlowOut { pipette: self.name, location: location.clone() },
        )
    }

    fn touch_tip(&mut self, radius: f64, v_offset_mm: f64, speed_mm_s: f64) -> Result<()> {
        self.require_tip("touch_tip")?;
        self.shared.borrow_mut().record(
            "touch_tip",
            Event::TouchTip { pipette: self.name, radius, v_offset_mm, speed_mm_s },
        )
    }

    fn mix(&mut self, repetitions: u32, volume: u32, location: &Location) -> Result<()> {
        self.require_tip("mix")?;
        self.shared.borrow_mut().record(
            "mix",
            Event::Mix {
                pipette: self.name,
                repetitions,
                volume_ul: volume,
                location: location.clone(),
            },
        )
    }

    fn air_gap(&mut self, volume: u32) -> Result<()> {
        self.require_tip("air_gap")?;
        self.shared
            .borrow_mut()
            .record("air_gap", Event::AirGap { pipette: self.name, volume_ul: volume })
    }

    fn set_aspirate_clearance(&mut self, mm: f64) {
        self.aspirate_clearance_mm = mm;
    }

    fn set_dispense_clearance(&mut self, mm: f64) {
        self.dispense_clearance_mm = mm;
    }

    fn set_flow_rate(&mut self, aspirate: f64, dispense: f64) {
        self.aspirate_flow_ul_s = aspirate;
        self.dispense_flow_ul_s = dispense;
    }

    fn reset_defaults(&mut self) {
        self.aspirate_clearance_mm = DEFAULT_CLEARANCE_MM;
        self.dispense_clearance_mm = DEFAULT_CLEARANCE_MM;
        self.aspirate_flow_ul_s = DEFAULT_FLOW_UL_S;
        self.dispense_flow_ul_s = DEFAULT_FLOW_UL_S;
    }

    fn reset_tip_racks(&mut self) {
        info!("{}: tip racks refilled", self.name);
    }
}

/// Simulated run control: pauses resume immediately, delays are recorded
/// without sleeping.
pub struct SimRunControl {
    shared: Rc<RefCell<Shared>>,
}

impl RunControl for SimRunControl {
    fn pause(&mut self, message: &str) -> Result<()> {
        info!("pause: {message}");
        self.shared.borrow_mut().record_ctl(Event::Pause { message: message.to_string() });
        Ok(())
    }

    fn delay(&mut self, duration: Duration) -> Result<()> {
        self.shared.borrow_mut().record_ctl(Event::Delay { seconds: duration.as_secs() });
        Ok(())
    }
}

/// Simulated magnetic separation module.
pub struct SimMagneticModule {
    shared: Rc<RefCell<Shared>>,
    engaged: bool,
}

impl SimMagneticModule {
    pub fn engaged(&self) -> bool {
        self.engaged
    }
}

impl MagneticModule for SimMagneticModule {
    fn engage(&mut self, height_mm: f64) -> Result<()> {
        self.shared.borrow_mut().record("engage", Event::MagnetEngage { height_mm })?;
        self.engaged = true;
        Ok(())
    }

    fn disengage(&mut self) -> Result<()> {
        self.shared.borrow_mut().record("disengage", Event::MagnetDisengage)?;
        self.engaged = false;
        Ok(())
    }
}

/// Simulated temperature module.
pub struct SimTemperatureModule {
    shared: Rc<RefCell<Shared>>,
    celsius: Option<f64>,
}

impl SimTemperatureModule {
    pub fn temperature(&self) -> Option<f64> {
        self.celsius
    }
}

impl TemperatureModule for SimTemperatureModule {
    fn set_temperature(&mut self, celsius: f64) -> Result<()> {
        self.shared
            .borrow_mut()
            .record("set_temperature", Event::SetTemperature { celsius })?;
        self.celsius = Some(celsius);
        Ok(())
    }
}

/// Write the trace as CSV rows: `step,op,instrument,volume_ul,labware,column,place,detail`.
pub fn write_trace_csv<W: io::Write>(events: &[Event], writer: W) -> anyhow::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["step", "op", "instrument", "volume_ul", "labware", "column", "place", "detail"])?;
    for (i, event) in events.iter().enumerate() {
        let step = i.to_string();
        let row: [String; 8] = match event {
            Event::PickUpTip { pipette } => row(&step, "pick_up_tip", pipette, "", None, ""),
            Event::DropTip { pipette } => row(&step, "drop_tip", pipette, "", None, ""),
            Event::Aspirate { pipette, volume_ul, location } => {
                row(&step, "aspirate", pipette, &volume_ul.to_string(), Some(location), "")
            }
            Event::Dispense { pipette, volume_ul, location } => {
                row(&step, "dispense", pipette, &volume_ul.to_string(), Some(location), "")
            }
            Event::BlowOut { pipette, location } => {
                row(&step, "blow_out", pipette, "", Some(location), "")
            }
            Event::TouchTip { pipette, radius, v_offset_mm, speed_mm_s } => row(
                &step,
                "touch_tip",
                pipette,
                "",
                None,
                &format!("radius={radius};v_offset={v_offset_mm}mm;speed={speed_mm_s}mm/s"),
            ),
            Event::Mix { pipette, repetitions, volume_ul, location } => row(
                &step,
                "mix",
                pipette,
                &volume_ul.to_string(),
                Some(location),
                &format!("repetitions={repetitions}"),
            ),
            Event::AirGap { pipette, volume_ul } => {
                row(&step, "air_gap", pipette, &volume_ul.to_string(), None, "")
            }
            Event::Pause { message } => row(&step, "pause", "", "", None, message),
            Event::Delay { seconds } => row(&step, "delay", "", "", None, &format!("{seconds}s")),
            Event::MagnetEngage { height_mm } => {
                row(&step, "magnet_engage", "", "", None, &format!("height={height_mm}mm"))
            }
            Event::MagnetDisengage => row(&step, "magnet_disengage", "", "", None, ""),
            Event::SetTemperature { celsius } => {
                row(&step, "set_temperature", "", "", None, &format!("{celsius}C"))
            }
        };
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

fn row(
    step: &str,
    op: &str,
    instrument: &str,
    volume: &str,
    location: Option<&Location>,
    detail: &str,
) -> [String; 8] {
    let (labware, column, place) = match location {
        Some(loc) => (
            loc.labware.to_string(),
            loc.column.to_string(),
            format!("{:?}", loc.place).to_lowercase(),
        ),
        None => (String::new(), String::new(), String::new()),
    };
    [
        step.to_string(),
        op.to_string(),
        instrument.to_string(),
        volume.to_string(),
        labware,
        column,
        place,
        detail.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labware::{LabwareSpec, Slot};

    fn loc() -> Location {
        LabwareSpec {
            name: "biorad_96_wellplate_200ul_pcr",
            slot: Some(Slot(5)),
            label: "Reagent Plate",
            columns: 12,
        }
        .column(0)
    }

    #[test]
    fn liquid_handling_without_a_tip_is_a_transfer_failure() {
        let sim = SimRun::new();
        let mut p20 = sim.small_pipette();
        let err = p20.aspirate(5, &loc()).unwrap_err();
        assert!(matches!(err, Error::Transfer { operation: "aspirate", .. }));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn double_pickup_is_a_transfer_failure() {
        let sim = SimRun::new();
        let mut p20 = sim.small_pipette();
        p20.pick_up_tip().unwrap();
        let err = p20.pick_up_tip().unwrap_err();
        assert!(matches!(err, Error::Transfer { operation: "pick_up_tip", .. }));
        assert_eq!(p20.tips_used(), 1);
    }

    #[test]
    fn over_capacity_aspiration_is_rejected() {
        let sim = SimRun::new();
        let mut p20 = sim.small_pipette();
        p20.pick_up_tip().unwrap();
        let err = p20.aspirate(21, &loc()).unwrap_err();
        assert!(matches!(err, Error::Transfer { operation: "aspirate", .. }));
    }

    #[test]
    fn trace_serializes_to_csv_and_json() {
        let sim = SimRun::new();
        let mut p20 = sim.small_pipette();
        let mut ctl = sim.run_control();
        p20.pick_up_tip().unwrap();
        p20.aspirate(5, &loc()).unwrap();
        p20.dispense(5, &loc().top()).unwrap();
        p20.drop_tip().unwrap();
        ctl.pause("seal the plate").unwrap();

        let events = sim.events();
        let mut csv_out = Vec::new();
        write_trace_csv(&events, &mut csv_out).unwrap();
        let text = String::from_utf8(csv_out).unwrap();
        assert_eq!(text.lines().count(), 6); // header + 5 events
        assert!(text.contains("Reagent Plate"));
        assert!(text.contains("seal the plate"));

        let json = serde_json::to_string(&events).unwrap();
        assert!(json.contains("\"op\":\"pick_up_tip\""));
        assert!(json.contains("\"place\":\"top\""));
    }
}
