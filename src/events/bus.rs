//! Internal event broadcast — tokio::broadcast channel for cross-component events.
//!
//! Emission is fire-and-forget: the core never blocks on, retries, or depends
//! on a subscriber. Collaborators turn these plain data events into
//! notifications or achievement grants.

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::models::TxReason;

/// Post-commit events for notification and reporting collaborators.
#[derive(Debug, Clone, Serialize)]
pub enum LedgerEvent {
    /// A sub-competition was settled; settlements are PENDING crediting.
    SubCompetitionSettled {
        sub_competition_id: i64,
        event_id: i64,
        result_id: i64,
        winning_entry_id: i64,
        total_pool: Decimal,
        winner_count: usize,
    },
    /// A wallet was credited.
    WalletCredited {
        wallet_id: i64,
        transaction_id: i64,
        amount: Decimal,
        balance: Decimal,
        reason: TxReason,
    },
    /// A wallet was debited.
    WalletDebited {
        wallet_id: i64,
        transaction_id: i64,
        amount: Decimal,
        balance: Decimal,
        reason: TxReason,
    },
    /// A settlement's payout reached the winner's wallet.
    SettlementCompleted {
        settlement_id: i64,
        wager_id: i64,
        wallet_id: i64,
        payout: Decimal,
    },
}

/// Central event bus for broadcasting events to all subscribers.
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: LedgerEvent) {
        // Ignore error if no subscribers
        let _ = self.tx.send(event);
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    /// Get current subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
