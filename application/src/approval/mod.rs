//! Approval gate and its decision API.

mod gate;

pub use gate::{ApprovalGate, ApprovalVerdict, DecisionAction};
