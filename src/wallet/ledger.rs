//! Wallet ledger — per-entity balances backed by an append-only journal.
//!
//! The ledger is the only writer of wallet balances and transaction rows.
//! Every mutation re-reads the balance under the store's row lock inside one
//! unit of work, so concurrent credits/debits against the same wallet
//! serialize through the store; no application-level lock spans store calls.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::config::LedgerConfig;
use crate::db::models::{
    DbTransaction, DbWallet, ReferenceKind, TxDirection, TxReason, WalletOwner,
};
use crate::error::{Result, SettlementError};
use crate::events::{EventBus, LedgerEvent};
use crate::store::{NewTransaction, Store, TransactionRepo, UnitOfWork, WalletRepo};

/// Pagination for journal reads. A non-positive limit selects the server
/// default; the server caps the limit regardless of what is asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

/// Apply one balance mutation inside an already-open unit of work.
///
/// Shared by the standalone credit/debit entry points and the settlement
/// crediting step, which runs in its own transaction. Returns the wallet with
/// its new balance and the appended journal row.
pub(crate) async fn apply<U: UnitOfWork>(
    uow: &mut U,
    wallet_id: i64,
    direction: TxDirection,
    amount: Decimal,
    reason: TxReason,
    reference: Option<(ReferenceKind, i64)>,
) -> Result<(DbWallet, DbTransaction)> {
    if amount <= Decimal::ZERO {
        return Err(SettlementError::InvalidAmount(amount));
    }

    let mut wallet = uow
        .wallet_for_update(wallet_id)
        .await?
        .ok_or(SettlementError::NotFound {
            entity: "wallet",
            id: wallet_id,
        })?;

    let new_balance = match direction {
        TxDirection::Credit => wallet.balance + amount,
        TxDirection::Debit => {
            if amount > wallet.balance {
                return Err(SettlementError::InsufficientFunds {
                    wallet_id,
                    balance: wallet.balance,
                    requested: amount,
                });
            }
            wallet.balance - amount
        }
    };

    uow.set_wallet_balance(wallet_id, new_balance).await?;
    let tx = uow
        .append_transaction(NewTransaction {
            wallet_id,
            direction,
            reason,
            amount,
            balance: new_balance,
            reference,
        })
        .await?;

    wallet.balance = new_balance;
    Ok((wallet, tx))
}

/// Wallet ledger service.
pub struct WalletLedger<S: Store> {
    store: Arc<S>,
    bus: Arc<EventBus>,
    max_page_size: i64,
    default_page_size: i64,
}

impl<S: Store> WalletLedger<S> {
    pub fn new(store: Arc<S>, config: &LedgerConfig, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            max_page_size: config.max_page_size,
            default_page_size: config.default_page_size,
        }
    }

    /// Lazily create-or-return the wallet for an owner.
    pub async fn ensure_wallet(&self, owner: WalletOwner) -> Result<DbWallet> {
        let mut uow = self.store.begin().await?;
        let wallet = uow.ensure_wallet(owner).await?;
        uow.commit().await?;
        Ok(wallet)
    }

    /// Credit a wallet. Fails with `InvalidAmount` on a non-positive amount.
    pub async fn credit(
        &self,
        wallet_id: i64,
        amount: Decimal,
        reason: TxReason,
        reference: Option<(ReferenceKind, i64)>,
    ) -> Result<(DbWallet, DbTransaction)> {
        let mut uow = self.store.begin().await?;
        let (wallet, tx) =
            apply(&mut uow, wallet_id, TxDirection::Credit, amount, reason, reference).await?;
        uow.commit().await?;

        info!(
            wallet_id,
            amount = %amount,
            balance = %wallet.balance,
            reason = ?reason,
            "wallet credited"
        );
        self.bus.publish(LedgerEvent::WalletCredited {
            wallet_id,
            transaction_id: tx.id,
            amount,
            balance: wallet.balance,
            reason,
        });
        Ok((wallet, tx))
    }

    /// Debit a wallet. Fails with `InsufficientFunds` rather than ever
    /// letting a balance go negative.
    pub async fn debit(
        &self,
        wallet_id: i64,
        amount: Decimal,
        reason: TxReason,
        reference: Option<(ReferenceKind, i64)>,
    ) -> Result<(DbWallet, DbTransaction)> {
        let mut uow = self.store.begin().await?;
        let (wallet, tx) =
            apply(&mut uow, wallet_id, TxDirection::Debit, amount, reason, reference).await?;
        uow.commit().await?;

        info!(
            wallet_id,
            amount = %amount,
            balance = %wallet.balance,
            reason = ?reason,
            "wallet debited"
        );
        self.bus.publish(LedgerEvent::WalletDebited {
            wallet_id,
            transaction_id: tx.id,
            amount,
            balance: wallet.balance,
            reason,
        });
        Ok((wallet, tx))
    }

    /// Journal entries for a wallet, newest first.
    pub async fn history(&self, wallet_id: i64, page: Page) -> Result<Vec<DbTransaction>> {
        let limit = if page.limit <= 0 {
            self.default_page_size
        } else {
            page.limit.min(self.max_page_size)
        };
        let offset = page.offset.max(0);

        let mut uow = self.store.begin().await?;
        if uow.wallet(wallet_id).await?.is_none() {
            return Err(SettlementError::NotFound {
                entity: "wallet",
                id: wallet_id,
            });
        }
        let rows = uow.transactions_for_wallet(wallet_id, limit, offset).await?;
        uow.commit().await?;
        Ok(rows)
    }
}
