//! In-memory implementation of the store traits.
//!
//! Backs the integration tests and embedded use. A single async mutex guards
//! the whole state, so units of work serialize; each unit of work snapshots
//! the state on begin and restores it on drop unless committed, which gives
//! the same all-or-nothing visibility as a database transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::models::*;
use crate::error::{Result, SettlementError};
use crate::store::{
    NewTransaction, ResultRepo, SettlementRepo, Store, SubCompetitionRepo, TransactionRepo,
    UnitOfWork, WagerRepo, WalletRepo,
};

#[derive(Debug, Clone, Default)]
struct MemState {
    sub_competitions: BTreeMap<i64, DbSubCompetition>,
    entries: BTreeMap<i64, DbEntry>,
    wagers: BTreeMap<i64, DbWager>,
    results: BTreeMap<i64, DbResult>,
    settlements: BTreeMap<i64, DbSettlement>,
    wallets: BTreeMap<i64, DbWallet>,
    transactions: BTreeMap<i64, DbTransaction>,
    next_id: i64,
}

impl MemState {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store.
#[derive(Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixture helper: seed an OPEN sub-competition. Wager placement and
    /// competition management live outside this core.
    pub async fn add_sub_competition(&self, event_id: i64, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.alloc_id();
        state.sub_competitions.insert(
            id,
            DbSubCompetition {
                id,
                event_id,
                name: name.to_string(),
                status: SubCompetitionStatus::Open,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Fixture helper: register an entry (candidate outcome).
    pub async fn add_entry(&self, sub_competition_id: i64, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.alloc_id();
        state.entries.insert(
            id,
            DbEntry {
                id,
                sub_competition_id,
                name: name.to_string(),
            },
        );
        id
    }

    /// Fixture helper: seed a PENDING wager.
    pub async fn add_wager(
        &self,
        user_id: i64,
        sub_competition_id: i64,
        entry_id: i64,
        stake: Decimal,
    ) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.alloc_id();
        state.wagers.insert(
            id,
            DbWager {
                id,
                user_id,
                sub_competition_id,
                entry_id,
                stake,
                status: WagerStatus::Pending,
                result_id: None,
                created_at: Utc::now(),
            },
        );
        id
    }
}

#[async_trait]
impl Store for MemStore {
    type Uow = MemUow;

    async fn begin(&self) -> Result<MemUow> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(MemUow {
            guard,
            snapshot,
            committed: false,
        })
    }
}

/// Unit of work over the in-memory state.
pub struct MemUow {
    guard: OwnedMutexGuard<MemState>,
    snapshot: MemState,
    committed: bool,
}

impl Drop for MemUow {
    fn drop(&mut self) {
        if !self.committed {
            *self.guard = std::mem::take(&mut self.snapshot);
        }
    }
}

#[async_trait]
impl SubCompetitionRepo for MemUow {
    async fn sub_competition_for_update(&mut self, id: i64) -> Result<Option<DbSubCompetition>> {
        Ok(self.guard.sub_competitions.get(&id).cloned())
    }

    async fn sub_competitions_for_event(
        &mut self,
        event_id: i64,
    ) -> Result<Vec<DbSubCompetition>> {
        Ok(self
            .guard
            .sub_competitions
            .values()
            .filter(|sc| sc.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn entries_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Vec<DbEntry>> {
        Ok(self
            .guard
            .entries
            .values()
            .filter(|e| e.sub_competition_id == sub_competition_id)
            .cloned()
            .collect())
    }

    async fn set_sub_competition_status(
        &mut self,
        id: i64,
        status: SubCompetitionStatus,
    ) -> Result<()> {
        match self.guard.sub_competitions.get_mut(&id) {
            Some(sc) => {
                sc.status = status;
                Ok(())
            }
            None => Err(SettlementError::NotFound {
                entity: "sub-competition",
                id,
            }),
        }
    }
}

#[async_trait]
impl WagerRepo for MemUow {
    async fn wager(&mut self, id: i64) -> Result<Option<DbWager>> {
        Ok(self.guard.wagers.get(&id).cloned())
    }

    async fn wagers_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Vec<DbWager>> {
        Ok(self
            .guard
            .wagers
            .values()
            .filter(|w| w.sub_competition_id == sub_competition_id)
            .cloned()
            .collect())
    }

    async fn mark_wager_settled(
        &mut self,
        id: i64,
        status: WagerStatus,
        result_id: i64,
    ) -> Result<()> {
        match self.guard.wagers.get_mut(&id) {
            Some(w) => {
                w.status = status;
                w.result_id = Some(result_id);
                Ok(())
            }
            None => Err(SettlementError::NotFound {
                entity: "wager",
                id,
            }),
        }
    }
}

#[async_trait]
impl ResultRepo for MemUow {
    async fn result_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Option<DbResult>> {
        Ok(self
            .guard
            .results
            .values()
            .find(|r| r.sub_competition_id == sub_competition_id)
            .cloned())
    }

    async fn insert_result(
        &mut self,
        sub_competition_id: i64,
        winning_entry_id: i64,
        outcome: &str,
    ) -> Result<DbResult> {
        // mirrors the unique key on results.sub_competition_id
        if self
            .guard
            .results
            .values()
            .any(|r| r.sub_competition_id == sub_competition_id)
        {
            return Err(SettlementError::StoreConflict(format!(
                "result already exists for sub-competition {sub_competition_id}"
            )));
        }
        let id = self.guard.alloc_id();
        let row = DbResult {
            id,
            sub_competition_id,
            winning_entry_id,
            outcome: outcome.to_string(),
            recorded_at: Utc::now(),
        };
        self.guard.results.insert(id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl SettlementRepo for MemUow {
    async fn settlement_for_update(&mut self, id: i64) -> Result<Option<DbSettlement>> {
        Ok(self.guard.settlements.get(&id).cloned())
    }

    async fn upsert_settlement(
        &mut self,
        wager_id: i64,
        result_id: i64,
        payout: Decimal,
    ) -> Result<DbSettlement> {
        let existing_id = self
            .guard
            .settlements
            .values()
            .find(|s| s.wager_id == wager_id)
            .map(|s| s.id);
        let id = match existing_id {
            Some(id) => id,
            None => self.guard.alloc_id(),
        };
        let row = DbSettlement {
            id,
            wager_id,
            result_id,
            status: SettlementStatus::Pending,
            payout,
            settled_at: None,
        };
        self.guard.settlements.insert(id, row.clone());
        Ok(row)
    }

    async fn settlements_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Vec<DbSettlement>> {
        let wager_ids: Vec<i64> = self
            .guard
            .wagers
            .values()
            .filter(|w| w.sub_competition_id == sub_competition_id)
            .map(|w| w.id)
            .collect();
        Ok(self
            .guard
            .settlements
            .values()
            .filter(|s| wager_ids.contains(&s.wager_id))
            .cloned()
            .collect())
    }

    async fn settlements_for_event(&mut self, event_id: i64) -> Result<Vec<DbSettlement>> {
        let sub_ids: Vec<i64> = self
            .guard
            .sub_competitions
            .values()
            .filter(|sc| sc.event_id == event_id)
            .map(|sc| sc.id)
            .collect();
        let wager_ids: Vec<i64> = self
            .guard
            .wagers
            .values()
            .filter(|w| sub_ids.contains(&w.sub_competition_id))
            .map(|w| w.id)
            .collect();
        Ok(self
            .guard
            .settlements
            .values()
            .filter(|s| wager_ids.contains(&s.wager_id))
            .cloned()
            .collect())
    }

    async fn complete_settlement(&mut self, id: i64, settled_at: DateTime<Utc>) -> Result<()> {
        match self.guard.settlements.get_mut(&id) {
            Some(s) => {
                s.status = SettlementStatus::Completed;
                s.settled_at = Some(settled_at);
                Ok(())
            }
            None => Err(SettlementError::NotFound {
                entity: "settlement",
                id,
            }),
        }
    }
}

#[async_trait]
impl WalletRepo for MemUow {
    async fn ensure_wallet(&mut self, owner: WalletOwner) -> Result<DbWallet> {
        if let Some(w) = self
            .guard
            .wallets
            .values()
            .find(|w| w.owner_kind == owner.kind() && w.owner_id == owner.id())
        {
            return Ok(w.clone());
        }
        let id = self.guard.alloc_id();
        let row = DbWallet {
            id,
            owner_kind: owner.kind(),
            owner_id: owner.id(),
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        };
        self.guard.wallets.insert(id, row.clone());
        Ok(row)
    }

    async fn wallet(&mut self, id: i64) -> Result<Option<DbWallet>> {
        Ok(self.guard.wallets.get(&id).cloned())
    }

    async fn wallet_for_update(&mut self, id: i64) -> Result<Option<DbWallet>> {
        Ok(self.guard.wallets.get(&id).cloned())
    }

    async fn set_wallet_balance(&mut self, id: i64, balance: Decimal) -> Result<()> {
        match self.guard.wallets.get_mut(&id) {
            Some(w) => {
                w.balance = balance;
                Ok(())
            }
            None => Err(SettlementError::NotFound {
                entity: "wallet",
                id,
            }),
        }
    }
}

#[async_trait]
impl TransactionRepo for MemUow {
    async fn append_transaction(&mut self, tx: NewTransaction) -> Result<DbTransaction> {
        let id = self.guard.alloc_id();
        let (reference_kind, reference_id) = match tx.reference {
            Some((kind, rid)) => (Some(kind), Some(rid)),
            None => (None, None),
        };
        let row = DbTransaction {
            id,
            wallet_id: tx.wallet_id,
            direction: tx.direction,
            reason: tx.reason,
            amount: tx.amount,
            balance: tx.balance,
            reference_kind,
            reference_id,
            created_at: Utc::now(),
        };
        self.guard.transactions.insert(id, row.clone());
        Ok(row)
    }

    async fn transactions_for_wallet(
        &mut self,
        wallet_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DbTransaction>> {
        Ok(self
            .guard
            .transactions
            .values()
            .rev()
            .filter(|t| t.wallet_id == wallet_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for MemUow {
    async fn commit(mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}
