//! Pari-mutuel pool settlement core.
//!
//! Settles a closed sub-competition against a declared winning entry: computes
//! each wager's payout from the pooled stakes, transitions the sub-competition
//! into its terminal SETTLED state exactly once, and posts the resulting money
//! movements to per-user wallets through an append-only transaction journal.
//!
//! Library-level contract only — authentication, HTTP routing, and
//! notification delivery belong to the consuming service layer. Collaborators
//! get post-commit plain-data events through [`events::EventBus`].

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod payout;
pub mod settlement;
pub mod store;
pub mod wallet;

pub use config::Config;
pub use error::{Result, SettlementError};
pub use events::{EventBus, LedgerEvent};
pub use payout::{PayoutComputation, WagerPayout};
pub use settlement::{EventSettlementAggregator, EventSettlements, SettlementEngine, SettlementOutcome};
pub use wallet::{Page, WalletLedger};
