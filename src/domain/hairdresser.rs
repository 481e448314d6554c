use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{DomainError, DomainResult, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "approved" => Ok(RegistrationStatus::Approved),
            "rejected" => Ok(RegistrationStatus::Rejected),
            other => Err(DomainError::Validation(format!(
                "registration_status must be one of: pending, approved, rejected (got '{}')",
                other
            ))),
        }
    }
}

/// Service-provider profile. `current_job_id` is the only link to an active booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hairdresser {
    pub id: Uuid,
    pub user_id: Uuid,
    pub profession: String,
    pub registration_status: RegistrationStatus,
    pub is_available: bool,
    pub current_job_id: Option<Uuid>,
    pub balance: BigDecimal,
    pub average_rating: BigDecimal,
    pub total_jobs: i32,
    pub total_earnings: BigDecimal,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hairdresser {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn is_matchable(&self) -> bool {
        self.is_available
            && self.current_job_id.is_none()
            && self.registration_status == RegistrationStatus::Approved
            && self.location().is_some()
    }

    pub fn ensure_balance(&self, required: &BigDecimal) -> DomainResult<()> {
        if &self.balance < required {
            return Err(DomainError::InsufficientBalance {
                required: required.clone(),
                available: self.balance.clone(),
            });
        }
        Ok(())
    }

    /// Ties the hairdresser to `booking_id`. Re-claiming the same booking is a no-op.
    pub fn claim(&mut self, booking_id: Uuid) -> DomainResult<()> {
        match self.current_job_id {
            Some(current) if current != booking_id => Err(DomainError::HairdresserBusy),
            _ => {
                self.current_job_id = Some(booking_id);
                self.is_available = false;
                Ok(())
            }
        }
    }

    /// Frees the hairdresser only if `booking_id` is the job holding them.
    /// A revoked registration stays unavailable.
    pub fn release(&mut self, booking_id: Uuid) -> bool {
        if self.current_job_id != Some(booking_id) {
            return false;
        }
        self.current_job_id = None;
        self.is_available = self.registration_status == RegistrationStatus::Approved;
        true
    }

    pub fn record_completion(&mut self, booking_id: Uuid, earnings: &BigDecimal) {
        self.total_jobs += 1;
        self.total_earnings = &self.total_earnings + earnings;
        self.release(booking_id);
    }

    pub fn set_availability(&mut self, available: bool) -> DomainResult<()> {
        if available && self.current_job_id.is_some() {
            return Err(DomainError::HairdresserBusy);
        }
        if available && self.registration_status != RegistrationStatus::Approved {
            return Err(DomainError::Forbidden(
                "registration is not approved".to_string(),
            ));
        }
        self.is_available = available;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn approved_hairdresser(balance: i64, latitude: f64, longitude: f64) -> Hairdresser {
        Hairdresser {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            profession: "hairdresser".to_string(),
            registration_status: RegistrationStatus::Approved,
            is_available: true,
            current_job_id: None,
            balance: BigDecimal::from(balance),
            average_rating: BigDecimal::from(0),
            total_jobs: 0,
            total_earnings: BigDecimal::from(0),
            latitude: Some(latitude),
            longitude: Some(longitude),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_claim_and_release() {
        let mut h = approved_hairdresser(10_000, 5.36, -4.01);
        let job = Uuid::new_v4();
        h.claim(job).unwrap();
        assert!(!h.is_available);
        assert_eq!(h.current_job_id, Some(job));
        assert!(!h.is_matchable());

        assert!(matches!(h.claim(Uuid::new_v4()), Err(DomainError::HairdresserBusy)));
        h.claim(job).unwrap();

        assert!(!h.release(Uuid::new_v4()));
        assert!(h.release(job));
        assert!(h.is_available);
        assert!(h.current_job_id.is_none());
    }

    #[test]
    fn test_release_keeps_revoked_hairdresser_unavailable() {
        let mut h = approved_hairdresser(0, 5.36, -4.01);
        let job = Uuid::new_v4();
        h.claim(job).unwrap();
        h.registration_status = RegistrationStatus::Rejected;

        assert!(h.release(job));
        assert!(h.current_job_id.is_none());
        assert!(!h.is_available);
    }

    #[test]
    fn test_completion_updates_counters() {
        let mut h = approved_hairdresser(0, 5.36, -4.01);
        let job = Uuid::new_v4();
        h.claim(job).unwrap();
        h.record_completion(job, &BigDecimal::from(13_000));
        assert_eq!(h.total_jobs, 1);
        assert_eq!(h.total_earnings, BigDecimal::from(13_000));
        assert!(h.is_available);
    }

    #[test]
    fn test_insufficient_balance() {
        let h = approved_hairdresser(1500, 5.36, -4.01);
        assert!(h.ensure_balance(&BigDecimal::from(1500)).is_ok());
        assert!(matches!(
            h.ensure_balance(&BigDecimal::from(2000)),
            Err(DomainError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_cannot_go_available_while_on_a_job() {
        let mut h = approved_hairdresser(0, 5.36, -4.01);
        h.claim(Uuid::new_v4()).unwrap();
        assert!(h.set_availability(true).is_err());
        assert!(h.set_availability(false).is_ok());
    }

    #[test]
    fn test_pending_registration_is_not_matchable() {
        let mut h = approved_hairdresser(0, 5.36, -4.01);
        h.registration_status = RegistrationStatus::Pending;
        assert!(!h.is_matchable());
        assert!(h.set_availability(true).is_err());
    }
}
