use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::{DomainError, GeoPoint, Hairdresser, RegistrationStatus};
use crate::error::AppError;

/// Profile updates a hairdresser or an admin makes outside a booking.
#[derive(Clone)]
pub struct HairdresserService {
    pool: PgPool,
}

impl HairdresserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn profile(&self, hairdresser_id: Uuid) -> Result<Hairdresser, AppError> {
        queries::get_hairdresser(&self.pool, hairdresser_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("hairdresser".to_string()).into())
    }

    pub async fn profile_for_user(&self, user_id: Uuid) -> Result<Hairdresser, AppError> {
        queries::get_hairdresser_by_user(&self.pool, user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("hairdresser profile".to_string()).into())
    }

    pub async fn update_location(&self, hairdresser_id: Uuid, location: GeoPoint) -> Result<Hairdresser, AppError> {
        self.update(hairdresser_id, |h| {
            h.latitude = Some(location.latitude);
            h.longitude = Some(location.longitude);
            Ok(())
        })
        .await
    }

    pub async fn set_availability(&self, hairdresser_id: Uuid, available: bool) -> Result<Hairdresser, AppError> {
        let hairdresser = self
            .update(hairdresser_id, |h| h.set_availability(available))
            .await?;
        tracing::info!(hairdresser_id = %hairdresser_id, available, "Availability changed");
        Ok(hairdresser)
    }

    /// Admin decision on a registration. Leaving `approved` also takes the
    /// hairdresser off the matchable set.
    pub async fn set_registration_status(
        &self,
        hairdresser_id: Uuid,
        status: RegistrationStatus,
    ) -> Result<Hairdresser, AppError> {
        let hairdresser = self
            .update(hairdresser_id, |h| {
                h.registration_status = status;
                if status != RegistrationStatus::Approved {
                    h.is_available = false;
                }
                Ok(())
            })
            .await?;
        tracing::info!(
            hairdresser_id = %hairdresser_id,
            registration_status = status.as_str(),
            "Registration status changed"
        );
        Ok(hairdresser)
    }

    async fn update<F>(&self, hairdresser_id: Uuid, apply: F) -> Result<Hairdresser, AppError>
    where
        F: FnOnce(&mut Hairdresser) -> Result<(), DomainError>,
    {
        let mut tx = self.pool.begin().await?;
        let mut hairdresser = queries::lock_hairdresser(&mut *tx, hairdresser_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::NotFound("hairdresser".to_string())))?;

        apply(&mut hairdresser)?;
        queries::save_hairdresser(&mut *tx, &hairdresser).await?;
        tx.commit().await?;
        Ok(hairdresser)
    }
}
