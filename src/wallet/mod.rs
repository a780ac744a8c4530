pub mod ledger;

pub use ledger::{Page, WalletLedger};
