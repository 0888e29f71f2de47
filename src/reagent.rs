//! Reagent identities and per-run source-volume tracking.
//!
//! Bulk reagents span several physically separate reservoir wells. A
//! [`ReagentStack`] tracks the remaining quantity of each well and advances
//! to the next well when the current one cannot cover the next withdrawal
//! (low-reagent rollover). Advancement is forward-only and quantities only
//! ever decrease; the whole map is built once per run and discarded at the
//! end.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::labware::Location;

/// Reagents used across the supported protocols.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Reagent {
    ProteinaseK,
    Ms2PhageControl,
    BindingBeadMix,
    WashBuffer,
    EthanolWash1,
    EthanolWash2,
    ElutionSolution,
    MasterMix,
}

impl Reagent {
    /// Stable display name, used in errors and traces.
    pub fn name(&self) -> &'static str {
        match self {
            Reagent::ProteinaseK => "Proteinase K",
            Reagent::Ms2PhageControl => "MS2 Phage Control",
            Reagent::BindingBeadMix => "Binding Bead Mix",
            Reagent::WashBuffer => "Wash Buffer",
            Reagent::EthanolWash1 => "Ethanol Wash 1",
            Reagent::EthanolWash2 => "Ethanol Wash 2",
            Reagent::ElutionSolution => "Elution Solution",
            Reagent::MasterMix => "Master Mix",
        }
    }
}

/// One physical source well and how much reagent it still holds.
#[derive(Clone, Debug)]
pub struct ReagentSource {
    /// Remaining quantity in uL; decrement-only within a run.
    pub remaining: u32,
    /// Column holding the reagent.
    pub well: Location,
}

/// Ordered source wells for one reagent, consumed front to back.
#[derive(Clone, Debug)]
pub struct ReagentStack {
    reagent: Reagent,
    sources: Vec<ReagentSource>,
    current: usize,
}

impl ReagentStack {
    /// Build a stack from `(initial quantity, well)` pairs, consumed in order.
    pub fn new(reagent: Reagent, sources: Vec<(u32, Location)>) -> Self {
        let sources = sources
            .into_iter()
            .map(|(remaining, well)| ReagentSource { remaining, well })
            .collect();
        ReagentStack { reagent, sources, current: 0 }
    }

    /// Index of the source the next withdrawal will draw from.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Remaining quantity in the currently indexed source.
    pub fn current_remaining(&self) -> u32 {
        self.sources[self.current].remaining
    }

    /// Advance past sources that cannot cover `needed`, before withdrawing.
    ///
    /// This is a pure lookahead check: callers must run it (directly or via
    /// [`ReagentStack::take`]) before committing a withdrawal, never as a
    /// correction afterwards. Sources are never revisited.
    pub fn advance_if_low(&mut self, needed: u32) -> Result<usize> {
        while self.sources[self.current].remaining < needed {
            if self.current + 1 >= self.sources.len() {
                return Err(Error::ReagentExhausted {
                    reagent: self.reagent.name(),
                    needed,
                    remaining: self.sources[self.current].remaining,
                });
            }
            log::debug!(
                "{}: source {} low ({} uL < {} uL), rolling over",
                self.reagent.name(),
                self.current,
                self.sources[self.current].remaining,
                needed
            );
            self.current += 1;
        }
        Ok(self.current)
    }

    /// Withdraw `needed` uL: roll over if required, decrement, and return the
    /// well to aspirate from.
    pub fn take(&mut self, needed: u32) -> Result<Location> {
        let idx = self.advance_if_low(needed)?;
        self.sources[idx].remaining -= needed;
        Ok(self.sources[idx].well.clone())
    }
}

/// Per-run map from reagent to its source stack.
#[derive(Debug, Default)]
pub struct ReagentMap {
    stacks: HashMap<Reagent, ReagentStack>,
}

impl ReagentMap {
    pub fn new() -> Self {
        ReagentMap::default()
    }

    /// Register the source wells for `reagent`.
    pub fn insert(&mut self, reagent: Reagent, sources: Vec<(u32, Location)>) {
        self.stacks.insert(reagent, ReagentStack::new(reagent, sources));
    }

    /// Withdraw `needed` uL of `reagent`, returning the well to draw from.
    ///
    /// Panics if the reagent was never registered; the static maps in the
    /// protocol modules register every reagent they use.
    pub fn take(&mut self, reagent: Reagent, needed: u32) -> Result<Location> {
        self.stacks
            .get_mut(&reagent)
            .unwrap_or_else(|| panic!("reagent {} not in map", reagent.name()))
            .take(needed)
    }

    /// Inspect a stack (tests and trace summaries).
    pub fn stack(&self, reagent: Reagent) -> Option<&ReagentStack> {
        self.stacks.get(&reagent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labware::{LabwareSpec, Slot};

    fn reservoir() -> LabwareSpec {
        LabwareSpec {
            name: "usascientific_12_reservoir_22ml",
            slot: Some(Slot(11)),
            label: "Reagent Reservoir",
            columns: 12,
        }
    }

    #[test]
    fn rollover_happens_before_the_withdrawal() {
        let res = reservoir();
        let mut stack = ReagentStack::new(
            Reagent::WashBuffer,
            vec![(100, res.column(0)), (1000, res.column(1))],
        );
        assert_eq!(stack.current_index(), 0);
        let idx = stack.advance_if_low(150).unwrap();
        assert_eq!(idx, 1);
        // first source left untouched at 100 uL
        let well = stack.take(150).unwrap();
        assert_eq!(well.column, 1);
        assert_eq!(stack.current_remaining(), 850);
    }

    #[test]
    fn exhaustion_is_fatal_once_the_last_source_is_low() {
        let res = reservoir();
        let mut stack =
            ReagentStack::new(Reagent::EthanolWash2, vec![(100, res.column(8)), (120, res.column(9))]);
        let err = stack.take(150).unwrap_err();
        assert!(matches!(
            err,
            Error::ReagentExhausted { reagent: "Ethanol Wash 2", needed: 150, remaining: 120 }
        ));
    }

    #[test]
    fn bead_mix_rolls_over_after_52_withdrawals() {
        // Two 14520 uL wells drained 275 uL at a time: 52 withdrawals fit in
        // the first well (52 * 275 = 14300, leaving 220), so the 53rd must
        // come from the second.
        let res = reservoir();
        let mut stack = ReagentStack::new(
            Reagent::BindingBeadMix,
            vec![(14520, res.column(0)), (14520, res.column(1))],
        );
        let mut rollover_at = None;
        for i in 0..60 {
            let well = stack.take(275).unwrap();
            if well.column == 1 && rollover_at.is_none() {
                rollover_at = Some(i);
            }
        }
        assert_eq!(rollover_at, Some(52));
    }

    #[test]
    fn sources_are_never_revisited() {
        let res = reservoir();
        let mut stack =
            ReagentStack::new(Reagent::WashBuffer, vec![(300, res.column(2)), (300, res.column(3))]);
        assert_eq!(stack.take(250).unwrap().column, 2);
        // 50 left in the first source; roll to the second
        assert_eq!(stack.take(250).unwrap().column, 3);
        // a tiny withdrawal still draws from the second, not the leftover first
        assert_eq!(stack.take(10).unwrap().column, 3);
    }
}
