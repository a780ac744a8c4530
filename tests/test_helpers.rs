//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use parimutuel_settlement::events::EventBus;
use parimutuel_settlement::settlement::SettlementEngine;
use parimutuel_settlement::store::memory::MemStore;
use parimutuel_settlement::wallet::WalletLedger;
use parimutuel_settlement::config::LedgerConfig;

pub struct Harness {
    pub store: Arc<MemStore>,
    pub bus: Arc<EventBus>,
    pub engine: SettlementEngine<MemStore>,
    pub ledger: WalletLedger<MemStore>,
}

/// Engine + ledger over a fresh in-memory store with the given house cut.
pub fn harness(house_cut_fraction: Decimal) -> Harness {
    let store = Arc::new(MemStore::new());
    let bus = Arc::new(EventBus::new(64));
    let engine = SettlementEngine::new(store.clone(), house_cut_fraction, bus.clone())
        .expect("valid house cut");
    let ledger = WalletLedger::new(store.clone(), &LedgerConfig::default(), bus.clone());
    Harness {
        store,
        bus,
        engine,
        ledger,
    }
}

/// A 200-unit pool: wagers of 60 and 40 on entry X, 100 on entry Y.
/// Returns (sub_competition_id, entry_x, entry_y, [wager ids]).
pub async fn seed_reference_pool(store: &MemStore) -> (i64, i64, i64, Vec<i64>) {
    let sub = store.add_sub_competition(1, "final heat").await;
    let entry_x = store.add_entry(sub, "X").await;
    let entry_y = store.add_entry(sub, "Y").await;
    let w1 = store.add_wager(101, sub, entry_x, dec!(60)).await;
    let w2 = store.add_wager(102, sub, entry_x, dec!(40)).await;
    let w3 = store.add_wager(103, sub, entry_y, dec!(100)).await;
    (sub, entry_x, entry_y, vec![w1, w2, w3])
}
