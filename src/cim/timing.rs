use serde::{Deserialize, Serialize};

use crate::tools::math::cycles_of;

/// the unit every latency is expressed in while aggregating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Timing {
    /// latencies are seconds
    Asynchronous,
    /// latencies are cycles of a fixed clock
    Synchronous { period: f64 },
}

impl Timing {
    /// express a stage taking `seconds` in the current unit
    pub fn stage(&self, seconds: f64) -> f64 {
        match self {
            Timing::Asynchronous => seconds,
            Timing::Synchronous { period } => cycles_of(seconds, *period),
        }
    }

    /// convert a latency in the current unit back to seconds
    pub fn to_seconds(&self, value: f64) -> f64 {
        match self {
            Timing::Asynchronous => value,
            Timing::Synchronous { period } => value * period,
        }
    }

    /// bus transfers are overlapped with compute under a global clock
    pub fn hides_bus(&self) -> bool {
        matches!(self, Timing::Synchronous { .. })
    }
}
