//! Repository traits over the backing store.
//!
//! One narrow trait per entity, combined into a [`UnitOfWork`] that represents
//! a single atomic transaction: every read and write issued through a unit of
//! work either commits as a whole or leaves no trace. `*_for_update` methods
//! additionally lock the row for the remainder of the unit of work, which is
//! what serializes concurrent settle calls and wallet mutations.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::db::models::{
    DbEntry, DbResult, DbSettlement, DbSubCompetition, DbTransaction, DbWager, DbWallet,
    ReferenceKind, SubCompetitionStatus, TxDirection, TxReason, WagerStatus, WalletOwner,
};
use crate::error::Result;

/// Input for appending one journal row.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub wallet_id: i64,
    pub direction: TxDirection,
    pub reason: TxReason,
    pub amount: Decimal,
    /// Post-operation balance snapshot.
    pub balance: Decimal,
    pub reference: Option<(ReferenceKind, i64)>,
}

#[async_trait]
pub trait SubCompetitionRepo {
    /// Load a sub-competition and hold its row lock until commit.
    async fn sub_competition_for_update(&mut self, id: i64) -> Result<Option<DbSubCompetition>>;

    async fn sub_competitions_for_event(&mut self, event_id: i64)
        -> Result<Vec<DbSubCompetition>>;

    async fn entries_for_sub_competition(&mut self, sub_competition_id: i64)
        -> Result<Vec<DbEntry>>;

    async fn set_sub_competition_status(
        &mut self,
        id: i64,
        status: SubCompetitionStatus,
    ) -> Result<()>;
}

#[async_trait]
pub trait WagerRepo {
    async fn wager(&mut self, id: i64) -> Result<Option<DbWager>>;

    async fn wagers_for_sub_competition(&mut self, sub_competition_id: i64)
        -> Result<Vec<DbWager>>;

    /// Flip a wager to WON/LOST and attach the result reference.
    async fn mark_wager_settled(
        &mut self,
        id: i64,
        status: WagerStatus,
        result_id: i64,
    ) -> Result<()>;
}

#[async_trait]
pub trait ResultRepo {
    async fn result_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Option<DbResult>>;

    async fn insert_result(
        &mut self,
        sub_competition_id: i64,
        winning_entry_id: i64,
        outcome: &str,
    ) -> Result<DbResult>;
}

#[async_trait]
pub trait SettlementRepo {
    async fn settlement_for_update(&mut self, id: i64) -> Result<Option<DbSettlement>>;

    /// Create or refresh the settlement row for a wager: status back to
    /// PENDING, payout replaced, settled_at cleared.
    async fn upsert_settlement(
        &mut self,
        wager_id: i64,
        result_id: i64,
        payout: Decimal,
    ) -> Result<DbSettlement>;

    async fn settlements_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Vec<DbSettlement>>;

    async fn settlements_for_event(&mut self, event_id: i64) -> Result<Vec<DbSettlement>>;

    async fn complete_settlement(&mut self, id: i64, settled_at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait WalletRepo {
    /// Create-or-return the wallet for an owner. Upsert keyed by owner so
    /// concurrent callers converge on one row.
    async fn ensure_wallet(&mut self, owner: WalletOwner) -> Result<DbWallet>;

    async fn wallet(&mut self, id: i64) -> Result<Option<DbWallet>>;

    /// Load a wallet and hold its row lock until commit.
    async fn wallet_for_update(&mut self, id: i64) -> Result<Option<DbWallet>>;

    async fn set_wallet_balance(&mut self, id: i64, balance: Decimal) -> Result<()>;
}

#[async_trait]
pub trait TransactionRepo {
    async fn append_transaction(&mut self, tx: NewTransaction) -> Result<DbTransaction>;

    /// Journal entries for a wallet, newest first.
    async fn transactions_for_wallet(
        &mut self,
        wallet_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DbTransaction>>;
}

/// One atomic unit of work. Dropping without commit rolls everything back.
#[async_trait]
pub trait UnitOfWork:
    SubCompetitionRepo + WagerRepo + ResultRepo + SettlementRepo + WalletRepo + TransactionRepo + Send
{
    async fn commit(self) -> Result<()>;
}

/// Opens units of work against the backing store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Uow: UnitOfWork;

    async fn begin(&self) -> Result<Self::Uow>;
}
