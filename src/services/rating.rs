use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::rating::average;
use crate::domain::{Actor, DomainError, Rating};
use crate::error::AppError;

const RATING_UNIQUE_CONSTRAINT: &str = "uq_ratings_booking";

#[derive(Clone)]
pub struct RatingAggregator {
    pool: PgPool,
}

impl RatingAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores the single rating of a completed booking and recomputes the
    /// hairdresser's average from every rating they have.
    pub async fn rate(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        rating: i16,
        comment: Option<String>,
    ) -> Result<Rating, AppError> {
        let mut tx = self.pool.begin().await?;

        let booking = queries::lock_booking(&mut *tx, booking_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::NotFound("booking".to_string())))?;

        let may_rate = match actor {
            Actor::Client(_) | Actor::Guest(_) => booking.is_party(actor),
            _ => false,
        };
        if !may_rate {
            return Err(DomainError::Forbidden("only the client can rate this booking".to_string()).into());
        }

        let rating = Rating::for_booking(&booking, rating, comment)?;
        if queries::rating_exists(&mut *tx, booking.id).await? {
            return Err(DomainError::AlreadyRated.into());
        }

        let rating = queries::insert_rating(&mut *tx, &rating)
            .await
            .map_err(already_rated_on_conflict)?;

        let mut hairdresser = queries::lock_hairdresser(&mut *tx, rating.hairdresser_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::NotFound("hairdresser".to_string())))?;
        let values = queries::list_rating_values(&mut *tx, hairdresser.id).await?;
        hairdresser.average_rating = average(&values);
        queries::save_hairdresser(&mut *tx, &hairdresser).await?;

        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            hairdresser_id = %hairdresser.id,
            rating = rating.rating,
            average_rating = %hairdresser.average_rating,
            "Booking rated"
        );
        Ok(rating)
    }
}

fn already_rated_on_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.constraint() == Some(RATING_UNIQUE_CONSTRAINT) => {
            DomainError::AlreadyRated.into()
        }
        _ => err.into(),
    }
}
