//! Read-side aggregation of settlement data across a whole event.
//!
//! Best-effort reporting view: sub-competitions that are not yet settled, or
//! whose recomputation fails, are logged and omitted rather than failing the
//! whole aggregation. Never mutates settlement state.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::db::models::{DbSettlement, SubCompetitionStatus};
use crate::error::Result;
use crate::payout::{compute_payouts, PayoutComputation};
use crate::store::{
    ResultRepo, SettlementRepo, Store, SubCompetitionRepo, UnitOfWork, WagerRepo,
};

/// Recomputed payout data for one settled sub-competition.
#[derive(Debug, Clone, Serialize)]
pub struct SubCompetitionSettlement {
    pub sub_competition_id: i64,
    pub name: String,
    pub computation: PayoutComputation,
}

/// Payout data for every settled sub-competition of an event, joined with
/// the persisted settlement rows.
#[derive(Debug, Clone, Serialize)]
pub struct EventSettlements {
    pub event_id: i64,
    pub sub_competitions: Vec<SubCompetitionSettlement>,
    pub settlements: Vec<DbSettlement>,
}

/// Read-only aggregator over the event's sub-competitions.
pub struct EventSettlementAggregator<S: Store> {
    store: Arc<S>,
    house_cut_fraction: Decimal,
}

impl<S: Store> EventSettlementAggregator<S> {
    pub fn new(store: Arc<S>, house_cut_fraction: Decimal) -> Self {
        Self {
            store,
            house_cut_fraction,
        }
    }

    pub async fn aggregate(&self, event_id: i64) -> Result<EventSettlements> {
        let mut uow = self.store.begin().await?;

        let subs = uow.sub_competitions_for_event(event_id).await?;
        let mut sub_competitions = Vec::new();

        for sub in &subs {
            if sub.status != SubCompetitionStatus::Settled {
                debug!(
                    sub_competition_id = sub.id,
                    status = ?sub.status,
                    "skipping unsettled sub-competition"
                );
                continue;
            }
            let result = match uow.result_for_sub_competition(sub.id).await? {
                Some(r) => r,
                None => {
                    debug!(sub_competition_id = sub.id, "settled but no result, skipping");
                    continue;
                }
            };
            let wagers = uow.wagers_for_sub_competition(sub.id).await?;
            match compute_payouts(&wagers, &result, self.house_cut_fraction) {
                Ok(computation) => sub_competitions.push(SubCompetitionSettlement {
                    sub_competition_id: sub.id,
                    name: sub.name.clone(),
                    computation,
                }),
                Err(e) => {
                    debug!(
                        sub_competition_id = sub.id,
                        error = %e,
                        "payout recomputation failed, omitting"
                    );
                }
            }
        }

        let settlements = uow.settlements_for_event(event_id).await?;
        uow.commit().await?;

        Ok(EventSettlements {
            event_id,
            sub_competitions,
            settlements,
        })
    }
}
