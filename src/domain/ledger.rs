//! Append-only balance ledger entries.
//!
//! Each entry snapshots the balance before and after at the moment it is
//! written; snapshots are never recomputed from history.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{DomainError, DomainResult, Hairdresser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deduction,
    Recharge,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deduction => "deduction",
            TransactionType::Recharge => "recharge",
            TransactionType::Refund => "refund",
        }
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deduction" => Ok(TransactionType::Deduction),
            "recharge" => Ok(TransactionType::Recharge),
            "refund" => Ok(TransactionType::Refund),
            other => Err(DomainError::Validation(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Approved,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "approved" => Ok(TransactionStatus::Approved),
            other => Err(DomainError::Validation(format!(
                "unknown transaction status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceTransaction {
    pub id: Uuid,
    pub hairdresser_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
    pub booking_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl BalanceTransaction {
    fn applied(
        hairdresser: &mut Hairdresser,
        kind: TransactionType,
        amount: BigDecimal,
        booking_id: Option<Uuid>,
        description: String,
    ) -> Self {
        let balance_before = hairdresser.balance.clone();
        let balance_after = &balance_before + &amount;
        hairdresser.balance = balance_after.clone();
        Self {
            id: Uuid::new_v4(),
            hairdresser_id: hairdresser.id,
            kind,
            amount,
            balance_before,
            balance_after,
            booking_id,
            status: TransactionStatus::Approved,
            payment_method: None,
            description,
            created_at: Utc::now(),
        }
    }

    /// Debits the service fee from the hairdresser's balance.
    pub fn deduction(hairdresser: &mut Hairdresser, booking_id: Uuid, fee: &BigDecimal) -> Self {
        Self::applied(
            hairdresser,
            TransactionType::Deduction,
            -fee.clone(),
            Some(booking_id),
            format!("Service fee for booking {}", booking_id),
        )
    }

    /// Credits back a fee taken for a booking that never started.
    pub fn refund(hairdresser: &mut Hairdresser, booking_id: Uuid, fee: &BigDecimal) -> Self {
        Self::applied(
            hairdresser,
            TransactionType::Refund,
            fee.clone(),
            Some(booking_id),
            format!("Service fee refund for booking {}", booking_id),
        )
    }

    /// Pending recharge. The balance is untouched until an admin approves it.
    pub fn recharge_request(hairdresser: &Hairdresser, amount: BigDecimal, method: String) -> DomainResult<Self> {
        if amount <= BigDecimal::from(0) {
            return Err(DomainError::Validation(
                "amount: must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            hairdresser_id: hairdresser.id,
            kind: TransactionType::Recharge,
            description: format!("Recharge request via {}", method),
            amount,
            balance_before: hairdresser.balance.clone(),
            balance_after: hairdresser.balance.clone(),
            booking_id: None,
            status: TransactionStatus::Pending,
            payment_method: Some(method),
            created_at: Utc::now(),
        })
    }

    /// Credits a pending recharge and rewrites its snapshot with the live balance.
    pub fn approve(&mut self, hairdresser: &mut Hairdresser) -> DomainResult<()> {
        if self.kind != TransactionType::Recharge || self.status != TransactionStatus::Pending {
            return Err(DomainError::NotPendingRecharge);
        }
        if self.hairdresser_id != hairdresser.id {
            return Err(DomainError::Forbidden(
                "recharge belongs to another hairdresser".to_string(),
            ));
        }
        self.balance_before = hairdresser.balance.clone();
        self.balance_after = &self.balance_before + &self.amount;
        hairdresser.balance = self.balance_after.clone();
        self.status = TransactionStatus::Approved;
        Ok(())
    }
}
