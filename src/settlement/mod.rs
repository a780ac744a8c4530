pub mod aggregator;
pub mod orchestrator;

pub use aggregator::{EventSettlementAggregator, EventSettlements};
pub use orchestrator::{SettlementEngine, SettlementOutcome};
