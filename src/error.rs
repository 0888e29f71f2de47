//! Error taxonomy for planning and pipetting.
//!
//! Every failure here is fatal to the run: a partially completed pipetting
//! step leaves physical state a script cannot reason about, so the run halts
//! and a human inspects the deck. No variant is ever retried.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways a planned or executed liquid transfer can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// A zero volume or zero capacity was handed to the planner. Caller error.
    #[error("invalid volume: requested {requested} uL against a capacity of {capacity} uL")]
    InvalidVolume { requested: u32, capacity: u32 },

    /// Every configured source well for a reagent is insufficient for the
    /// next withdrawal. The reservoir must be refilled and the map rebuilt.
    #[error("reagent '{reagent}' exhausted: needed {needed} uL, final source holds {remaining} uL")]
    ReagentExhausted {
        reagent: &'static str,
        needed: u32,
        remaining: u32,
    },

    /// A physical pipetting operation failed (tip pickup, aspiration, ...).
    #[error("transfer failed during {operation}: {message}")]
    Transfer {
        operation: &'static str,
        message: String,
    },
}

impl Error {
    /// Shorthand for instrument backends reporting a physical failure.
    pub fn transfer(operation: &'static str, message: impl Into<String>) -> Self {
        Error::Transfer {
            operation,
            message: message.into(),
        }
    }
}
