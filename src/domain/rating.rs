use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Booking, BookingStatus, DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rating {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub hairdresser_id: Uuid,
    pub client_id: Option<Uuid>,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn for_booking(booking: &Booking, rating: i16, comment: Option<String>) -> DomainResult<Self> {
        if !(1..=5).contains(&rating) {
            return Err(DomainError::Validation(
                "rating: must be between 1 and 5".to_string(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(DomainError::NotCompleted);
        }
        let hairdresser_id = booking
            .hairdresser_id
            .ok_or_else(|| DomainError::NotFound("hairdresser".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            hairdresser_id,
            client_id: booking.client_id,
            rating,
            comment,
            created_at: Utc::now(),
        })
    }
}

/// Arithmetic mean of every rating, rounded to two decimals. Zero when empty.
pub fn average(ratings: &[i16]) -> BigDecimal {
    if ratings.is_empty() {
        return BigDecimal::from(0);
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    (BigDecimal::from(sum) / BigDecimal::from(ratings.len() as i64)).round(2)
}
