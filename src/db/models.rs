//! Database row types and status enums for all tables.
//!
//! Statuses are stored as TEXT; the enums encode/decode as their
//! SCREAMING-case names. Money columns are NUMERIC and map to
//! `rust_decimal::Decimal` — binary floating point never touches a balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;

/// Lifecycle of a sub-competition. Only moves forward; SETTLED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubCompetitionStatus {
    Open,
    Closed,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum WagerStatus {
    Pending,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementStatus {
    Pending,
    Completed,
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TxDirection {
    Credit,
    Debit,
}

/// Reason code attached to every ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TxReason {
    Payout,
    Stake,
    Purchase,
    Adjustment,
}

/// What a ledger entry points back at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ReferenceKind {
    Wager,
    Settlement,
    Purchase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OwnerKind {
    User,
    House,
}

/// Wallet owner: a single user or the distinguished house account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WalletOwner {
    User(i64),
    House,
}

impl WalletOwner {
    pub fn kind(&self) -> OwnerKind {
        match self {
            WalletOwner::User(_) => OwnerKind::User,
            WalletOwner::House => OwnerKind::House,
        }
    }

    /// The owner id column value. The house row is pinned at 0.
    pub fn id(&self) -> i64 {
        match self {
            WalletOwner::User(id) => *id,
            WalletOwner::House => 0,
        }
    }
}

impl fmt::Display for WalletOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletOwner::User(id) => write!(f, "user:{id}"),
            WalletOwner::House => write!(f, "house"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbSubCompetition {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub status: SubCompetitionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbEntry {
    pub id: i64,
    pub sub_competition_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbWager {
    pub id: i64,
    pub user_id: i64,
    pub sub_competition_id: i64,
    pub entry_id: i64,
    pub stake: Decimal,
    pub status: WagerStatus,
    pub result_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbResult {
    pub id: i64,
    pub sub_competition_id: i64,
    pub winning_entry_id: i64,
    pub outcome: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbSettlement {
    pub id: i64,
    pub wager_id: i64,
    pub result_id: i64,
    pub status: SettlementStatus,
    pub payout: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbWallet {
    pub id: i64,
    pub owner_kind: OwnerKind,
    pub owner_id: i64,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl DbWallet {
    pub fn owner(&self) -> WalletOwner {
        match self.owner_kind {
            OwnerKind::User => WalletOwner::User(self.owner_id),
            OwnerKind::House => WalletOwner::House,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbTransaction {
    pub id: i64,
    pub wallet_id: i64,
    pub direction: TxDirection,
    pub reason: TxReason,
    pub amount: Decimal,
    /// Post-operation balance snapshot. Replaying the journal in id order
    /// must reproduce every snapshot exactly.
    pub balance: Decimal,
    pub reference_kind: Option<ReferenceKind>,
    pub reference_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
