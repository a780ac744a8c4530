pub mod calculator;

pub use calculator::{compute_payouts, PayoutComputation, WagerPayout};
