//! Booking entity and its state machine.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Completed | BookingStatus::Cancelled
        )
    }

    /// Edges of the lifecycle graph. Terminal states have no outgoing edge.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Accepted, Rejected)
                | (Accepted, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "accepted" => Ok(BookingStatus::Accepted),
            "rejected" => Ok(BookingStatus::Rejected),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(DomainError::Validation(format!(
                "unknown booking status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Home,
    Salon,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Home => "home",
            ServiceType::Salon => "salon",
        }
    }
}

impl FromStr for ServiceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(ServiceType::Home),
            "salon" => Ok(ServiceType::Salon),
            other => Err(DomainError::Validation(format!(
                "service_type must be one of: home, salon (got '{}')",
                other
            ))),
        }
    }
}

/// Who is acting on a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Admin,
    /// Authenticated client, by user id.
    Client(Uuid),
    /// Hairdresser, by hairdresser profile id.
    Hairdresser(Uuid),
    /// Unauthenticated caller presenting the phone number of a guest booking.
    Guest(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub client_phone: String,
    pub hairdresser_id: Option<Uuid>,
    pub hairstyle_id: Uuid,
    pub service_type: ServiceType,
    pub status: BookingStatus,
    pub service_fee: BigDecimal,
    pub client_price: BigDecimal,
    pub location_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scheduled_time: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub rejection_reason: Option<String>,
    pub extension_requested: bool,
    pub extension_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new booking. Pricing is resolved by the caller.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub client_phone: String,
    pub hairstyle_id: Uuid,
    pub service_type: ServiceType,
    pub service_fee: BigDecimal,
    pub client_price: BigDecimal,
    pub location_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scheduled_time: DateTime<Utc>,
}

impl Booking {
    pub fn new(input: NewBooking, hairdresser_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id: input.client_id,
            client_name: input.client_name,
            client_phone: input.client_phone,
            hairdresser_id,
            hairstyle_id: input.hairstyle_id,
            service_type: input.service_type,
            status: BookingStatus::Pending,
            service_fee: input.service_fee,
            client_price: input.client_price,
            location_address: input.location_address,
            latitude: input.latitude,
            longitude: input.longitude,
            scheduled_time: input.scheduled_time,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            rejection_reason: None,
            extension_requested: false,
            extension_minutes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn location(&self) -> Option<super::GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(super::GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn is_assigned_to(&self, hairdresser_id: Uuid) -> bool {
        self.hairdresser_id == Some(hairdresser_id)
    }

    pub fn ensure_assigned_to(&self, hairdresser_id: Uuid) -> DomainResult<()> {
        if self.is_assigned_to(hairdresser_id) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "booking is not assigned to this hairdresser".to_string(),
            ))
        }
    }

    /// Owning client, assigned hairdresser, guest with the booking phone, or admin.
    pub fn is_party(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Admin => true,
            Actor::Client(user_id) => self.client_id == Some(*user_id),
            Actor::Hairdresser(hairdresser_id) => self.is_assigned_to(*hairdresser_id),
            Actor::Guest(phone) => self.client_id.is_none() && self.client_phone == *phone,
        }
    }

    fn transition(&mut self, next: BookingStatus, action: &'static str, now: DateTime<Utc>) -> DomainResult<BookingStatus> {
        let previous = self.status;
        if !previous.can_transition_to(next) {
            return Err(DomainError::InvalidStatus {
                current: previous,
                action,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(previous)
    }

    pub fn accept(&mut self, hairdresser_id: Uuid, now: DateTime<Utc>) -> DomainResult<BookingStatus> {
        self.ensure_assigned_to(hairdresser_id)?;
        self.transition(BookingStatus::Accepted, "accept", now)
    }

    /// Returns the status the booking was rejected from.
    pub fn reject(
        &mut self,
        hairdresser_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<BookingStatus> {
        self.ensure_assigned_to(hairdresser_id)?;
        let previous = self.transition(BookingStatus::Rejected, "reject", now)?;
        self.rejection_reason = reason;
        Ok(previous)
    }

    pub fn start(&mut self, hairdresser_id: Uuid, now: DateTime<Utc>) -> DomainResult<BookingStatus> {
        self.ensure_assigned_to(hairdresser_id)?;
        let previous = self.transition(BookingStatus::InProgress, "start", now)?;
        self.started_at = Some(now);
        Ok(previous)
    }

    pub fn complete(&mut self, hairdresser_id: Uuid, now: DateTime<Utc>) -> DomainResult<BookingStatus> {
        self.ensure_assigned_to(hairdresser_id)?;
        let previous = self.transition(BookingStatus::Completed, "complete", now)?;
        self.completed_at = Some(now);
        Ok(previous)
    }

    pub fn cancel(&mut self, actor: &Actor, reason: String, now: DateTime<Utc>) -> DomainResult<BookingStatus> {
        if !self.is_party(actor) {
            return Err(DomainError::Forbidden(
                "only the client, the assigned hairdresser or an admin can cancel".to_string(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "reason: must not be empty".to_string(),
            ));
        }
        let previous = self.transition(BookingStatus::Cancelled, "cancel", now)?;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason);
        Ok(previous)
    }

    /// Flags the booking for an admin decision. Duration and fees are untouched.
    pub fn request_extension(&mut self, actor: &Actor, minutes: i32, now: DateTime<Utc>) -> DomainResult<()> {
        if matches!(actor, Actor::Admin) || !self.is_party(actor) {
            return Err(DomainError::Forbidden(
                "only the client or the assigned hairdresser can request an extension".to_string(),
            ));
        }
        if !matches!(self.status, BookingStatus::Accepted | BookingStatus::InProgress) {
            return Err(DomainError::InvalidStatus {
                current: self.status,
                action: "extend",
            });
        }
        if minutes <= 0 {
            return Err(DomainError::Validation(
                "minutes: must be greater than zero".to_string(),
            ));
        }
        self.extension_requested = true;
        self.extension_minutes = Some(minutes);
        self.updated_at = now;
        Ok(())
    }
}

/// A deduction was taken on accept and the work never started.
pub fn owes_refund(left_from: BookingStatus) -> bool {
    left_from == BookingStatus::Accepted
}
