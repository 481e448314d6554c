//! Row types for SQLx. Status columns are stored as text and parsed into the
//! domain enums on the way out; a value the domain does not know is a decode
//! error.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{BalanceTransaction, Booking, DomainError, Hairdresser, Rating};

fn decode_err(err: DomainError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Hairstyle {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event: String,
    pub title: String,
    pub payload: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    client_id: Option<Uuid>,
    client_name: String,
    client_phone: String,
    hairdresser_id: Option<Uuid>,
    hairstyle_id: Uuid,
    service_type: String,
    status: String,
    service_fee: BigDecimal,
    client_price: BigDecimal,
    location_address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    scheduled_time: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    rejection_reason: Option<String>,
    extension_requested: bool,
    extension_minutes: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    pub(crate) fn into_domain(self) -> sqlx::Result<Booking> {
        Ok(Booking {
            id: self.id,
            client_id: self.client_id,
            client_name: self.client_name,
            client_phone: self.client_phone,
            hairdresser_id: self.hairdresser_id,
            hairstyle_id: self.hairstyle_id,
            service_type: self.service_type.parse().map_err(decode_err)?,
            status: self.status.parse().map_err(decode_err)?,
            service_fee: self.service_fee,
            client_price: self.client_price,
            location_address: self.location_address,
            latitude: self.latitude,
            longitude: self.longitude,
            scheduled_time: self.scheduled_time,
            started_at: self.started_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
            cancellation_reason: self.cancellation_reason,
            rejection_reason: self.rejection_reason,
            extension_requested: self.extension_requested,
            extension_minutes: self.extension_minutes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct HairdresserRow {
    id: Uuid,
    user_id: Uuid,
    profession: String,
    registration_status: String,
    is_available: bool,
    current_job_id: Option<Uuid>,
    balance: BigDecimal,
    average_rating: BigDecimal,
    total_jobs: i32,
    total_earnings: BigDecimal,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl HairdresserRow {
    pub(crate) fn into_domain(self) -> sqlx::Result<Hairdresser> {
        Ok(Hairdresser {
            id: self.id,
            user_id: self.user_id,
            profession: self.profession,
            registration_status: self.registration_status.parse().map_err(decode_err)?,
            is_available: self.is_available,
            current_job_id: self.current_job_id,
            balance: self.balance,
            average_rating: self.average_rating,
            total_jobs: self.total_jobs,
            total_earnings: self.total_earnings,
            latitude: self.latitude,
            longitude: self.longitude,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct BalanceTransactionRow {
    id: Uuid,
    hairdresser_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    amount: BigDecimal,
    balance_before: BigDecimal,
    balance_after: BigDecimal,
    booking_id: Option<Uuid>,
    status: String,
    payment_method: Option<String>,
    description: String,
    created_at: DateTime<Utc>,
}

impl BalanceTransactionRow {
    pub(crate) fn into_domain(self) -> sqlx::Result<BalanceTransaction> {
        Ok(BalanceTransaction {
            id: self.id,
            hairdresser_id: self.hairdresser_id,
            kind: self.kind.parse().map_err(decode_err)?,
            amount: self.amount,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            booking_id: self.booking_id,
            status: self.status.parse().map_err(decode_err)?,
            payment_method: self.payment_method,
            description: self.description,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RatingRow {
    id: Uuid,
    booking_id: Uuid,
    hairdresser_id: Uuid,
    client_id: Option<Uuid>,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating {
            id: row.id,
            booking_id: row.booking_id,
            hairdresser_id: row.hairdresser_id,
            client_id: row.client_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}
