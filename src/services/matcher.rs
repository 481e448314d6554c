use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::db::queries;
use crate::domain::geo::{rank_by_distance, rank_for_assignment};
use crate::domain::{Candidate, DomainError, GeoPoint};
use crate::error::AppError;

/// Nearest-hairdresser search over the matchable set. Nothing is cached;
/// every call reads current availability.
#[derive(Clone)]
pub struct GeoMatcher {
    pool: PgPool,
}

impl GeoMatcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_nearby(
        &self,
        origin: GeoPoint,
        radius_meters: f64,
        hairstyle_id: Option<Uuid>,
    ) -> Result<Vec<Candidate>, AppError> {
        let hairdressers = queries::list_matchable_hairdressers(&self.pool, hairstyle_id).await?;
        let candidates = rank_by_distance(hairdressers, origin, radius_meters);

        if candidates.is_empty() {
            return Err(DomainError::NoHairdresserAvailable.into());
        }
        Ok(candidates)
    }
}

/// Auto-assignment order for a booking. May be empty.
pub async fn assignment_candidates<'e, E: PgExecutor<'e>>(
    executor: E,
    origin: GeoPoint,
    radius_meters: f64,
    hairstyle_id: Uuid,
) -> Result<Vec<Candidate>, AppError> {
    let hairdressers = queries::list_matchable_hairdressers(executor, Some(hairstyle_id)).await?;
    Ok(rank_for_assignment(hairdressers, origin, radius_meters))
}
