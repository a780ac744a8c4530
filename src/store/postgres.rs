//! sqlx/Postgres implementation of the store traits.
//!
//! A [`PgUow`] wraps one database transaction. Row locks come from
//! `SELECT ... FOR UPDATE`; lazily-created rows use `ON CONFLICT` upserts so
//! concurrent callers converge on a single row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::*;
use crate::error::Result;
use crate::store::{
    NewTransaction, ResultRepo, SettlementRepo, Store, SubCompetitionRepo, TransactionRepo,
    UnitOfWork, WagerRepo, WalletRepo,
};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    type Uow = PgUow;

    async fn begin(&self) -> Result<PgUow> {
        let tx = self.pool.begin().await?;
        Ok(PgUow { tx })
    }
}

/// One database transaction; rolls back on drop unless committed.
pub struct PgUow {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SubCompetitionRepo for PgUow {
    async fn sub_competition_for_update(&mut self, id: i64) -> Result<Option<DbSubCompetition>> {
        let row = sqlx::query_as::<_, DbSubCompetition>(
            "SELECT * FROM sub_competitions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn sub_competitions_for_event(
        &mut self,
        event_id: i64,
    ) -> Result<Vec<DbSubCompetition>> {
        let rows = sqlx::query_as::<_, DbSubCompetition>(
            "SELECT * FROM sub_competitions WHERE event_id = $1 ORDER BY id",
        )
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn entries_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Vec<DbEntry>> {
        let rows = sqlx::query_as::<_, DbEntry>(
            "SELECT * FROM entries WHERE sub_competition_id = $1 ORDER BY id",
        )
        .bind(sub_competition_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn set_sub_competition_status(
        &mut self,
        id: i64,
        status: SubCompetitionStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE sub_competitions SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WagerRepo for PgUow {
    async fn wager(&mut self, id: i64) -> Result<Option<DbWager>> {
        let row = sqlx::query_as::<_, DbWager>("SELECT * FROM wagers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn wagers_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Vec<DbWager>> {
        let rows = sqlx::query_as::<_, DbWager>(
            "SELECT * FROM wagers WHERE sub_competition_id = $1 ORDER BY id",
        )
        .bind(sub_competition_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn mark_wager_settled(
        &mut self,
        id: i64,
        status: WagerStatus,
        result_id: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE wagers SET status = $1, result_id = $2 WHERE id = $3")
            .bind(status)
            .bind(result_id)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResultRepo for PgUow {
    async fn result_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Option<DbResult>> {
        let row = sqlx::query_as::<_, DbResult>(
            "SELECT * FROM results WHERE sub_competition_id = $1",
        )
        .bind(sub_competition_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_result(
        &mut self,
        sub_competition_id: i64,
        winning_entry_id: i64,
        outcome: &str,
    ) -> Result<DbResult> {
        let row = sqlx::query_as::<_, DbResult>(
            "INSERT INTO results (sub_competition_id, winning_entry_id, outcome)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(sub_competition_id)
        .bind(winning_entry_id)
        .bind(outcome)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl SettlementRepo for PgUow {
    async fn settlement_for_update(&mut self, id: i64) -> Result<Option<DbSettlement>> {
        let row = sqlx::query_as::<_, DbSettlement>(
            "SELECT * FROM settlements WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn upsert_settlement(
        &mut self,
        wager_id: i64,
        result_id: i64,
        payout: Decimal,
    ) -> Result<DbSettlement> {
        let row = sqlx::query_as::<_, DbSettlement>(
            "INSERT INTO settlements (wager_id, result_id, status, payout, settled_at)
             VALUES ($1, $2, 'PENDING', $3, NULL)
             ON CONFLICT (wager_id)
             DO UPDATE SET result_id = EXCLUDED.result_id, status = 'PENDING',
                           payout = EXCLUDED.payout, settled_at = NULL
             RETURNING *",
        )
        .bind(wager_id)
        .bind(result_id)
        .bind(payout)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn settlements_for_sub_competition(
        &mut self,
        sub_competition_id: i64,
    ) -> Result<Vec<DbSettlement>> {
        let rows = sqlx::query_as::<_, DbSettlement>(
            "SELECT s.* FROM settlements s
             JOIN wagers w ON w.id = s.wager_id
             WHERE w.sub_competition_id = $1
             ORDER BY s.id",
        )
        .bind(sub_competition_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn settlements_for_event(&mut self, event_id: i64) -> Result<Vec<DbSettlement>> {
        let rows = sqlx::query_as::<_, DbSettlement>(
            "SELECT s.* FROM settlements s
             JOIN wagers w ON w.id = s.wager_id
             JOIN sub_competitions sc ON sc.id = w.sub_competition_id
             WHERE sc.event_id = $1
             ORDER BY s.id",
        )
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn complete_settlement(&mut self, id: i64, settled_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE settlements SET status = 'COMPLETED', settled_at = $1 WHERE id = $2")
            .bind(settled_at)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WalletRepo for PgUow {
    async fn ensure_wallet(&mut self, owner: WalletOwner) -> Result<DbWallet> {
        // DO UPDATE instead of DO NOTHING so RETURNING yields the existing row
        let row = sqlx::query_as::<_, DbWallet>(
            "INSERT INTO wallets (owner_kind, owner_id, balance)
             VALUES ($1, $2, 0)
             ON CONFLICT (owner_kind, owner_id)
             DO UPDATE SET owner_id = EXCLUDED.owner_id
             RETURNING *",
        )
        .bind(owner.kind())
        .bind(owner.id())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn wallet(&mut self, id: i64) -> Result<Option<DbWallet>> {
        let row = sqlx::query_as::<_, DbWallet>("SELECT * FROM wallets WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn wallet_for_update(&mut self, id: i64) -> Result<Option<DbWallet>> {
        let row = sqlx::query_as::<_, DbWallet>("SELECT * FROM wallets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn set_wallet_balance(&mut self, id: i64, balance: Decimal) -> Result<()> {
        sqlx::query("UPDATE wallets SET balance = $1 WHERE id = $2")
            .bind(balance)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionRepo for PgUow {
    async fn append_transaction(&mut self, tx: NewTransaction) -> Result<DbTransaction> {
        let (reference_kind, reference_id) = match tx.reference {
            Some((kind, id)) => (Some(kind), Some(id)),
            None => (None, None),
        };
        let row = sqlx::query_as::<_, DbTransaction>(
            "INSERT INTO transactions (wallet_id, direction, reason, amount, balance,
                                       reference_kind, reference_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(tx.wallet_id)
        .bind(tx.direction)
        .bind(tx.reason)
        .bind(tx.amount)
        .bind(tx.balance)
        .bind(reference_kind)
        .bind(reference_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn transactions_for_wallet(
        &mut self,
        wallet_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DbTransaction>> {
        let rows = sqlx::query_as::<_, DbTransaction>(
            "SELECT * FROM transactions WHERE wallet_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3",
        )
        .bind(wallet_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl UnitOfWork for PgUow {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
