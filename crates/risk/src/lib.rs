pub mod ledger;
pub mod sizer;

pub use ledger::{Evaluation, PositionLedger, RiskConfig};
pub use sizer::{PositionSizer, RiskBudget, REFERENCE_PIP_VALUE_USD};
