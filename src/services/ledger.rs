use bigdecimal::BigDecimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::{BalanceTransaction, DomainError, Hairdresser};
use crate::error::AppError;
use crate::services::notifications::{NotificationDispatcher, NotificationEntry, NotificationEvent};

/// Append-only balance history. Fee deductions and refunds are written by
/// the booking lifecycle; this service owns recharges and reads.
#[derive(Clone)]
pub struct BalanceLedger {
    pool: PgPool,
    notifications: NotificationDispatcher,
}

impl BalanceLedger {
    pub fn new(pool: PgPool, notifications: NotificationDispatcher) -> Self {
        Self {
            pool,
            notifications,
        }
    }

    pub async fn request_recharge(
        &self,
        hairdresser_id: Uuid,
        amount: BigDecimal,
        payment_method: String,
    ) -> Result<BalanceTransaction, AppError> {
        let hairdresser = self.hairdresser(hairdresser_id).await?;
        let entry = BalanceTransaction::recharge_request(&hairdresser, amount, payment_method)?;
        let entry = queries::insert_balance_transaction(&self.pool, &entry).await?;

        tracing::info!(
            transaction_id = %entry.id,
            hairdresser_id = %hairdresser_id,
            amount = %entry.amount,
            "Recharge requested"
        );
        Ok(entry)
    }

    pub async fn approve_recharge(&self, transaction_id: Uuid) -> Result<BalanceTransaction, AppError> {
        let (entry, notifications) = self.settle_recharge(transaction_id).await?;
        self.notifications.notify(notifications);
        Ok(entry)
    }

    /// Commits the approval and hands back the notifications instead of
    /// spawning them, for callers that must wait for delivery.
    pub async fn settle_recharge(
        &self,
        transaction_id: Uuid,
    ) -> Result<(BalanceTransaction, Vec<NotificationEntry>), AppError> {
        let mut tx = self.pool.begin().await?;

        let mut entry = queries::lock_balance_transaction(&mut *tx, transaction_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::NotFound("transaction".to_string())))?;
        let mut hairdresser = queries::lock_hairdresser(&mut *tx, entry.hairdresser_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::NotFound("hairdresser".to_string())))?;

        entry.approve(&mut hairdresser)?;

        if !queries::settle_pending_recharge(&mut *tx, &entry).await? {
            return Err(DomainError::NotPendingRecharge.into());
        }
        queries::save_hairdresser(&mut *tx, &hairdresser).await?;
        tx.commit().await?;

        tracing::info!(
            transaction_id = %entry.id,
            hairdresser_id = %hairdresser.id,
            balance = %hairdresser.balance,
            "Recharge approved"
        );
        let notifications = vec![NotificationEntry::new(
            hairdresser.user_id,
            NotificationEvent::RechargeApproved,
            json!({
                "transaction_id": entry.id,
                "amount": entry.amount.to_string(),
                "balance": hairdresser.balance.to_string(),
            }),
        )];

        Ok((entry, notifications))
    }

    pub async fn balance(&self, hairdresser_id: Uuid) -> Result<BigDecimal, AppError> {
        Ok(self.hairdresser(hairdresser_id).await?.balance)
    }

    pub async fn history(
        &self,
        hairdresser_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BalanceTransaction>, AppError> {
        Ok(queries::list_balance_transactions(&self.pool, hairdresser_id, limit, offset).await?)
    }

    async fn hairdresser(&self, hairdresser_id: Uuid) -> Result<Hairdresser, AppError> {
        queries::get_hairdresser(&self.pool, hairdresser_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("hairdresser".to_string()).into())
    }
}
