//! Pure pari-mutuel payout computation.
//!
//! All arithmetic stays in exact `Decimal`; rounding to 2 fraction digits
//! (round-half-up) happens only on the per-wager payout, the externally
//! visible amount. Running sums are never rounded.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::db::models::{DbResult, DbWager};
use crate::error::{Result, SettlementError};

/// Round an externally-visible amount to 2 fraction digits, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-wager share of the pool.
#[derive(Debug, Clone, Serialize)]
pub struct WagerPayout {
    pub wager_id: i64,
    pub user_id: i64,
    pub entry_id: i64,
    pub stake: Decimal,
    pub is_winner: bool,
    /// Rounded to 2 fraction digits; zero for losers.
    pub payout: Decimal,
}

/// Full payout breakdown for one sub-competition.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutComputation {
    pub sub_competition_id: i64,
    pub result_id: i64,
    pub winning_entry_id: i64,
    pub total_pool: Decimal,
    /// Sum of stakes on the winning entry. Zero means the degenerate
    /// no-winner pool: every payout is zero and the house keeps the pool.
    pub winning_stake: Decimal,
    /// Amount retained by the house, unrounded.
    pub house_cut: Decimal,
    /// Pool distributed to winners, unrounded.
    pub net_pool: Decimal,
    /// Net pool per unit of winning stake, unrounded.
    pub payout_per_unit: Decimal,
    pub payouts: Vec<WagerPayout>,
}

impl PayoutComputation {
    pub fn winner_count(&self) -> usize {
        self.payouts.iter().filter(|p| p.is_winner).count()
    }
}

/// Compute the payout for every wager of a sub-competition given its result.
///
/// Pure: no I/O, no persistence. `house_cut_fraction` must lie in [0, 1).
pub fn compute_payouts(
    wagers: &[DbWager],
    result: &DbResult,
    house_cut_fraction: Decimal,
) -> Result<PayoutComputation> {
    if house_cut_fraction < Decimal::ZERO || house_cut_fraction >= Decimal::ONE {
        return Err(SettlementError::InvalidHouseCut(house_cut_fraction));
    }

    let total_pool: Decimal = wagers.iter().map(|w| w.stake).sum();
    let winning_stake: Decimal = wagers
        .iter()
        .filter(|w| w.entry_id == result.winning_entry_id)
        .map(|w| w.stake)
        .sum();

    let net_pool = total_pool * (Decimal::ONE - house_cut_fraction);
    let payout_per_unit = if winning_stake > Decimal::ZERO {
        net_pool / winning_stake
    } else {
        Decimal::ZERO
    };

    let payouts = wagers
        .iter()
        .map(|w| {
            let is_winner = w.entry_id == result.winning_entry_id;
            let payout = if is_winner {
                round_money(w.stake * payout_per_unit)
            } else {
                Decimal::ZERO
            };
            WagerPayout {
                wager_id: w.id,
                user_id: w.user_id,
                entry_id: w.entry_id,
                stake: w.stake,
                is_winner,
                payout,
            }
        })
        .collect();

    Ok(PayoutComputation {
        sub_competition_id: result.sub_competition_id,
        result_id: result.id,
        winning_entry_id: result.winning_entry_id,
        total_pool,
        winning_stake,
        house_cut: total_pool - net_pool,
        net_pool,
        payout_per_unit,
        payouts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::WagerStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn wager(id: i64, user_id: i64, entry_id: i64, stake: Decimal) -> DbWager {
        DbWager {
            id,
            user_id,
            sub_competition_id: 1,
            entry_id,
            stake,
            status: WagerStatus::Pending,
            result_id: None,
            created_at: Utc::now(),
        }
    }

    fn result(winning_entry_id: i64) -> DbResult {
        DbResult {
            id: 99,
            sub_competition_id: 1,
            winning_entry_id,
            outcome: "WIN".into(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn splits_net_pool_proportionally() {
        // 200-unit pool, 10% cut, entry 10 wins with 100 staked on it
        let wagers = vec![
            wager(1, 1, 10, dec!(60)),
            wager(2, 2, 10, dec!(40)),
            wager(3, 3, 11, dec!(100)),
        ];
        let comp = compute_payouts(&wagers, &result(10), dec!(0.10)).unwrap();

        assert_eq!(comp.total_pool, dec!(200));
        assert_eq!(comp.winning_stake, dec!(100));
        assert_eq!(comp.net_pool, dec!(180.0));
        assert_eq!(comp.payout_per_unit, dec!(1.8));
        assert_eq!(comp.payouts[0].payout, dec!(108.00));
        assert_eq!(comp.payouts[1].payout, dec!(72.00));
        assert_eq!(comp.payouts[2].payout, Decimal::ZERO);
        assert!(comp.payouts[0].is_winner);
        assert!(!comp.payouts[2].is_winner);
    }

    #[test]
    fn no_winner_pays_nothing() {
        let wagers = vec![wager(1, 1, 10, dec!(50)), wager(2, 2, 11, dec!(50))];
        let comp = compute_payouts(&wagers, &result(12), dec!(0.10)).unwrap();

        assert_eq!(comp.winning_stake, Decimal::ZERO);
        assert_eq!(comp.payout_per_unit, Decimal::ZERO);
        assert!(comp.payouts.iter().all(|p| p.payout == Decimal::ZERO));
    }

    #[test]
    fn empty_wager_list_is_a_zero_pool() {
        let comp = compute_payouts(&[], &result(10), dec!(0.10)).unwrap();
        assert_eq!(comp.total_pool, Decimal::ZERO);
        assert!(comp.payouts.is_empty());
    }

    #[test]
    fn rounds_half_up_at_the_boundary() {
        // 3 units on the winner out of 10 total, no cut:
        // per-unit = 10/3, payout = 10 exactly for the single winner
        let wagers = vec![wager(1, 1, 10, dec!(3)), wager(2, 2, 11, dec!(7))];
        let comp = compute_payouts(&wagers, &result(10), Decimal::ZERO).unwrap();
        assert_eq!(comp.payouts[0].payout, dec!(10.00));

        // 0.125 * 1 rounds to 0.13, not 0.12
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(0.124)), dec!(0.12));
    }

    #[test]
    fn conservation_with_uneven_stakes() {
        let wagers = vec![
            wager(1, 1, 10, dec!(33.33)),
            wager(2, 2, 10, dec!(66.67)),
            wager(3, 3, 11, dec!(100)),
        ];
        let comp = compute_payouts(&wagers, &result(10), dec!(0.05)).unwrap();

        let paid: Decimal = comp.payouts.iter().map(|p| p.payout).sum();
        let tolerance = dec!(0.01) * Decimal::from(comp.winner_count() as i64);
        assert!((paid - comp.net_pool).abs() <= tolerance);
    }

    #[test]
    fn rejects_house_cut_outside_range() {
        let wagers = vec![wager(1, 1, 10, dec!(10))];
        assert!(matches!(
            compute_payouts(&wagers, &result(10), dec!(1)),
            Err(SettlementError::InvalidHouseCut(_))
        ));
        assert!(matches!(
            compute_payouts(&wagers, &result(10), dec!(-0.1)),
            Err(SettlementError::InvalidHouseCut(_))
        ));
    }
}
