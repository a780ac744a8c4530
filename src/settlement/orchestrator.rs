//! Settlement orchestrator — drives the one-time OPEN/CLOSED → SETTLED
//! transition and the decoupled, idempotent crediting step.
//!
//! `settle` runs entirely inside one unit of work: outside observers see
//! either pre-settlement or fully-settled state, never in-between. The
//! sub-competition row is locked at the start of the transaction, so
//! concurrent settle calls serialize and the loser fails the AlreadySettled
//! guard. Crediting deliberately runs in separate transactions (one per
//! settlement) keyed off each settlement's settled_at marker, so retries are
//! no-ops and wallet locks are never held across the whole settlement.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::SettlementConfig;
use crate::db::models::{
    DbSettlement, DbTransaction, ReferenceKind, SettlementStatus, SubCompetitionStatus,
    TxDirection, TxReason, WagerStatus, WalletOwner,
};
use crate::error::{Result, SettlementError};
use crate::events::{EventBus, LedgerEvent};
use crate::payout::{compute_payouts, PayoutComputation, WagerPayout};
use crate::store::{
    ResultRepo, SettlementRepo, Store, SubCompetitionRepo, UnitOfWork, WagerRepo, WalletRepo,
};
use crate::wallet::ledger;

/// Outcome tag recorded on every result row.
const OUTCOME_WIN: &str = "WIN";

/// Aggregate returned by a successful settle call.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub sub_competition_id: i64,
    pub result_id: i64,
    pub total_pool: Decimal,
    pub payouts: Vec<WagerPayout>,
    pub settlements: Vec<DbSettlement>,
}

/// Orchestrates settlement runs against the backing store.
pub struct SettlementEngine<S: Store> {
    store: Arc<S>,
    bus: Arc<EventBus>,
    house_cut_fraction: Decimal,
}

impl<S: Store> SettlementEngine<S> {
    pub fn new(store: Arc<S>, house_cut_fraction: Decimal, bus: Arc<EventBus>) -> Result<Self> {
        if house_cut_fraction < Decimal::ZERO || house_cut_fraction >= Decimal::ONE {
            return Err(SettlementError::InvalidHouseCut(house_cut_fraction));
        }
        Ok(Self {
            store,
            bus,
            house_cut_fraction,
        })
    }

    pub fn from_config(
        store: Arc<S>,
        config: &SettlementConfig,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        let cut = Decimal::try_from(config.house_cut_fraction)
            .map_err(|e| SettlementError::Store(format!("bad house cut fraction: {e}")))?;
        Self::new(store, cut, bus)
    }

    /// Settle a sub-competition: record the result, flip every wager to
    /// WON/LOST, and upsert one PENDING settlement per wager — atomically.
    pub async fn settle(
        &self,
        sub_competition_id: i64,
        winning_entry_id: i64,
    ) -> Result<SettlementOutcome> {
        let mut uow = self.store.begin().await?;

        let sub = uow
            .sub_competition_for_update(sub_competition_id)
            .await?
            .ok_or(SettlementError::NotFound {
                entity: "sub-competition",
                id: sub_competition_id,
            })?;

        if sub.status == SubCompetitionStatus::Settled {
            return Err(SettlementError::AlreadySettled(sub_competition_id));
        }

        let entries = uow.entries_for_sub_competition(sub_competition_id).await?;
        if !entries.iter().any(|e| e.id == winning_entry_id) {
            return Err(SettlementError::InvalidEntry {
                sub_competition_id,
                entry_id: winning_entry_id,
            });
        }

        // Narrow-race backstop behind the AlreadySettled guard; the unique
        // key on results catches anything that slips past both.
        if uow
            .result_for_sub_competition(sub_competition_id)
            .await?
            .is_some()
        {
            return Err(SettlementError::DuplicateResult(sub_competition_id));
        }

        let result = uow
            .insert_result(sub_competition_id, winning_entry_id, OUTCOME_WIN)
            .await?;
        uow.set_sub_competition_status(sub_competition_id, SubCompetitionStatus::Settled)
            .await?;

        let wagers = uow.wagers_for_sub_competition(sub_competition_id).await?;
        let computation = compute_payouts(&wagers, &result, self.house_cut_fraction)?;

        let mut settlements = Vec::with_capacity(computation.payouts.len());
        for payout in &computation.payouts {
            let status = if payout.is_winner {
                WagerStatus::Won
            } else {
                WagerStatus::Lost
            };
            uow.mark_wager_settled(payout.wager_id, status, result.id)
                .await?;
            let settlement = uow
                .upsert_settlement(payout.wager_id, result.id, payout.payout)
                .await?;
            settlements.push(settlement);
        }

        uow.commit().await?;

        info!(
            sub_competition_id,
            result_id = result.id,
            winning_entry_id,
            total_pool = %computation.total_pool,
            winners = computation.winner_count(),
            "sub-competition settled"
        );
        self.bus.publish(LedgerEvent::SubCompetitionSettled {
            sub_competition_id,
            event_id: sub.event_id,
            result_id: result.id,
            winning_entry_id,
            total_pool: computation.total_pool,
            winner_count: computation.winner_count(),
        });

        Ok(SettlementOutcome {
            sub_competition_id,
            result_id: result.id,
            total_pool: computation.total_pool,
            payouts: computation.payouts,
            settlements,
        })
    }

    /// Read-only payout recomputation. Requires a previously recorded result.
    pub async fn compute_payouts(&self, sub_competition_id: i64) -> Result<PayoutComputation> {
        let mut uow = self.store.begin().await?;

        if uow
            .sub_competition_for_update(sub_competition_id)
            .await?
            .is_none()
        {
            return Err(SettlementError::NotFound {
                entity: "sub-competition",
                id: sub_competition_id,
            });
        }
        let result = uow
            .result_for_sub_competition(sub_competition_id)
            .await?
            .ok_or(SettlementError::NotFound {
                entity: "result",
                id: sub_competition_id,
            })?;
        let wagers = uow.wagers_for_sub_competition(sub_competition_id).await?;
        let computation = compute_payouts(&wagers, &result, self.house_cut_fraction)?;
        uow.commit().await?;
        Ok(computation)
    }

    /// Move one settlement's payout into the winner's wallet.
    ///
    /// Idempotent: a settlement whose settled_at marker is already set is
    /// skipped and `None` is returned. Zero-payout settlements are marked
    /// COMPLETED without a journal row — there is no money to move.
    pub async fn credit_settlement(&self, settlement_id: i64) -> Result<Option<DbTransaction>> {
        let mut uow = self.store.begin().await?;

        let settlement = uow.settlement_for_update(settlement_id).await?.ok_or(
            SettlementError::NotFound {
                entity: "settlement",
                id: settlement_id,
            },
        )?;
        if settlement.settled_at.is_some() {
            debug!(settlement_id, "settlement already credited, skipping");
            return Ok(None);
        }

        let wager = uow
            .wager(settlement.wager_id)
            .await?
            .ok_or(SettlementError::NotFound {
                entity: "wager",
                id: settlement.wager_id,
            })?;

        let credited = if settlement.payout > Decimal::ZERO {
            let wallet = uow.ensure_wallet(WalletOwner::User(wager.user_id)).await?;
            let (_, tx) = ledger::apply(
                &mut uow,
                wallet.id,
                TxDirection::Credit,
                settlement.payout,
                TxReason::Payout,
                Some((ReferenceKind::Settlement, settlement.id)),
            )
            .await?;
            Some((wallet.id, tx))
        } else {
            None
        };

        uow.complete_settlement(settlement.id, Utc::now()).await?;
        uow.commit().await?;

        if let Some((wallet_id, tx)) = credited {
            info!(
                settlement_id,
                wager_id = settlement.wager_id,
                wallet_id,
                payout = %settlement.payout,
                "settlement payout credited"
            );
            self.bus.publish(LedgerEvent::SettlementCompleted {
                settlement_id,
                wager_id: settlement.wager_id,
                wallet_id,
                payout: settlement.payout,
            });
            Ok(Some(tx))
        } else {
            Ok(None)
        }
    }

    /// Credit every still-pending settlement of a sub-competition.
    /// Returns the number of settlements whose payout actually moved.
    pub async fn credit_pending_settlements(&self, sub_competition_id: i64) -> Result<usize> {
        let mut uow = self.store.begin().await?;
        let settlements = uow
            .settlements_for_sub_competition(sub_competition_id)
            .await?;
        uow.commit().await?;

        let mut credited = 0;
        for settlement in settlements
            .iter()
            .filter(|s| s.status == SettlementStatus::Pending && s.settled_at.is_none())
        {
            if self.credit_settlement(settlement.id).await?.is_some() {
                credited += 1;
            }
        }
        Ok(credited)
    }
}
