//! Booking state transitions.
//!
//! Each public method is one unit of work: the booking row is locked first,
//! then the hairdresser row, the domain rule is applied in memory and every
//! write goes through the same transaction. Returning early drops the
//! transaction, which rolls it back. Notifications leave only after commit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::queries::{self, BookingFilter};
use crate::domain::booking::{owes_refund, NewBooking};
use crate::domain::{
    Actor, BalanceTransaction, Booking, BookingStatus, DomainError, EarningsPolicy, GeoPoint,
    Hairdresser, RegistrationStatus, ServiceFees, ServiceType,
};
use crate::error::AppError;
use crate::services::matcher::assignment_candidates;
use crate::services::notifications::{NotificationDispatcher, NotificationEntry, NotificationEvent};
use crate::services::routing::{EstimateSource, TravelEstimator};

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub client_phone: String,
    pub hairstyle_id: Uuid,
    pub service_type: ServiceType,
    pub location_address: Option<String>,
    pub location: Option<GeoPoint>,
    pub scheduled_time: DateTime<Utc>,
    /// Direct booking. Only honoured for authenticated clients.
    pub hairdresser_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingInfo {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub hairdresser_id: Option<Uuid>,
    pub hairdresser_location: Option<GeoPoint>,
    pub estimated_minutes: Option<i64>,
    pub distance_meters: Option<f64>,
    pub estimate_source: Option<EstimateSource>,
}

#[derive(Clone)]
pub struct BookingLifecycle {
    pool: PgPool,
    fees: ServiceFees,
    earnings_policy: EarningsPolicy,
    match_radius_meters: f64,
    notifications: NotificationDispatcher,
    travel: TravelEstimator,
}

impl BookingLifecycle {
    pub fn new(
        pool: PgPool,
        fees: ServiceFees,
        earnings_policy: EarningsPolicy,
        match_radius_meters: f64,
        notifications: NotificationDispatcher,
        travel: TravelEstimator,
    ) -> Self {
        Self {
            pool,
            fees,
            earnings_policy,
            match_radius_meters,
            notifications,
            travel,
        }
    }

    pub async fn create(&self, input: CreateBooking) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let hairstyle = queries::get_hairstyle(&mut *tx, input.hairstyle_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::NotFound("hairstyle".to_string())))?;

        let direct_hairdresser = input.hairdresser_id;
        let new_booking = NewBooking {
            client_id: input.client_id,
            client_name: input.client_name,
            client_phone: input.client_phone,
            hairstyle_id: hairstyle.id,
            service_type: input.service_type,
            service_fee: self.fees.fee_for(input.service_type),
            client_price: hairstyle.price.clone(),
            location_address: input.location_address,
            latitude: input.location.map(|p| p.latitude),
            longitude: input.location.map(|p| p.longitude),
            scheduled_time: input.scheduled_time,
        };

        let (booking, hairdresser) = match direct_hairdresser {
            Some(hairdresser_id) => {
                if new_booking.client_id.is_none() {
                    return Err(DomainError::Forbidden(
                        "only signed-in clients can book a hairdresser directly".to_string(),
                    )
                    .into());
                }
                let hairdresser = queries::get_hairdresser(&mut *tx, hairdresser_id)
                    .await?
                    .filter(|h| h.registration_status == RegistrationStatus::Approved)
                    .ok_or_else(|| AppError::from(DomainError::NotFound("hairdresser".to_string())))?;

                let booking = queries::insert_booking(&mut *tx, &Booking::new(new_booking, Some(hairdresser.id))).await?;
                (booking, hairdresser)
            }
            None => self.create_auto_matched(&mut tx, new_booking).await?,
        };

        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            hairdresser_id = %hairdresser.id,
            service_type = booking.service_type.as_str(),
            "Booking created"
        );
        self.notifications.notify(vec![NotificationEntry::new(
            hairdresser.user_id,
            NotificationEvent::BookingAssigned,
            booking_payload(&booking),
        )]);

        Ok(booking)
    }

    /// Walks the ranked candidates until one can be claimed.
    async fn create_auto_matched(
        &self,
        conn: &mut PgConnection,
        new_booking: NewBooking,
    ) -> Result<(Booking, Hairdresser), AppError> {
        let origin = match (new_booking.latitude, new_booking.longitude) {
            (Some(latitude), Some(longitude)) => GeoPoint::new(latitude, longitude),
            _ => {
                return Err(AppError::Validation(
                    "latitude and longitude are required to find a hairdresser".to_string(),
                ))
            }
        };

        let candidates = assignment_candidates(
            &mut *conn,
            origin,
            self.match_radius_meters,
            new_booking.hairstyle_id,
        )
        .await?;

        let mut booking = Booking::new(new_booking, None);
        let mut shortfall: Option<DomainError> = None;

        for candidate in candidates {
            let hairdresser = candidate.hairdresser;
            if let Err(e) = hairdresser.ensure_balance(&booking.service_fee) {
                shortfall.get_or_insert(e);
                continue;
            }

            if !queries::claim_hairdresser(&mut *conn, hairdresser.id, booking.id).await? {
                tracing::warn!(
                    hairdresser_id = %hairdresser.id,
                    "Hairdresser was claimed concurrently, trying next candidate"
                );
                continue;
            }

            booking.hairdresser_id = Some(hairdresser.id);
            let booking = queries::insert_booking(&mut *conn, &booking).await?;
            return Ok((booking, hairdresser));
        }

        Err(shortfall.unwrap_or(DomainError::NoHairdresserAvailable).into())
    }

    pub async fn accept(&self, booking_id: Uuid, hairdresser_id: Uuid) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let expected = booking.status;
        booking.accept(hairdresser_id, Utc::now())?;

        let mut hairdresser = lock_hairdresser(&mut tx, hairdresser_id).await?;
        hairdresser.ensure_balance(&booking.service_fee)?;
        hairdresser.claim(booking.id)?;
        let deduction = BalanceTransaction::deduction(&mut hairdresser, booking.id, &booking.service_fee);

        write_booking(&mut tx, &booking, expected, "accept").await?;
        queries::save_hairdresser(&mut *tx, &hairdresser).await?;
        queries::insert_balance_transaction(&mut *tx, &deduction).await?;
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            hairdresser_id = %hairdresser.id,
            fee = %booking.service_fee,
            balance = %hairdresser.balance,
            "Booking accepted"
        );
        self.notify_client(&booking, NotificationEvent::BookingAccepted);

        Ok(booking)
    }

    pub async fn reject(
        &self,
        booking_id: Uuid,
        hairdresser_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let previous = booking.reject(hairdresser_id, reason, Utc::now())?;

        let mut hairdresser = lock_hairdresser(&mut tx, hairdresser_id).await?;
        hairdresser.release(booking.id);
        let refund = owes_refund(previous)
            .then(|| BalanceTransaction::refund(&mut hairdresser, booking.id, &booking.service_fee));

        write_booking(&mut tx, &booking, previous, "reject").await?;
        queries::save_hairdresser(&mut *tx, &hairdresser).await?;
        if let Some(refund) = &refund {
            queries::insert_balance_transaction(&mut *tx, refund).await?;
        }
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            hairdresser_id = %hairdresser.id,
            refunded = refund.is_some(),
            "Booking rejected"
        );
        self.notify_client(&booking, NotificationEvent::BookingRejected);

        Ok(booking)
    }

    pub async fn start(&self, booking_id: Uuid, hairdresser_id: Uuid) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let previous = booking.start(hairdresser_id, Utc::now())?;
        write_booking(&mut tx, &booking, previous, "start").await?;
        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, hairdresser_id = %hairdresser_id, "Booking started");
        self.notify_client(&booking, NotificationEvent::BookingStarted);

        Ok(booking)
    }

    pub async fn complete(&self, booking_id: Uuid, hairdresser_id: Uuid) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let previous = booking.complete(hairdresser_id, Utc::now())?;

        let mut hairdresser = lock_hairdresser(&mut tx, hairdresser_id).await?;
        let earnings = self.earnings_policy.earnings_for(&booking);
        hairdresser.record_completion(booking.id, &earnings);

        write_booking(&mut tx, &booking, previous, "complete").await?;
        queries::save_hairdresser(&mut *tx, &hairdresser).await?;
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            hairdresser_id = %hairdresser.id,
            earnings = %earnings,
            total_jobs = hairdresser.total_jobs,
            "Booking completed"
        );
        self.notify_client(&booking, NotificationEvent::BookingCompleted);

        Ok(booking)
    }

    pub async fn cancel(&self, booking_id: Uuid, actor: &Actor, reason: String) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let previous = booking.cancel(actor, reason, Utc::now())?;

        let mut hairdresser = match booking.hairdresser_id {
            Some(id) => Some(lock_hairdresser(&mut tx, id).await?),
            None => None,
        };
        let mut refund = None;
        if let Some(hairdresser) = hairdresser.as_mut() {
            hairdresser.release(booking.id);
            if owes_refund(previous) {
                refund = Some(BalanceTransaction::refund(hairdresser, booking.id, &booking.service_fee));
            }
        }

        write_booking(&mut tx, &booking, previous, "cancel").await?;
        if let Some(hairdresser) = &hairdresser {
            queries::save_hairdresser(&mut *tx, hairdresser).await?;
        }
        if let Some(refund) = &refund {
            queries::insert_balance_transaction(&mut *tx, refund).await?;
        }
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            cancelled_from = previous.as_str(),
            refunded = refund.is_some(),
            "Booking cancelled"
        );
        let entries = counterpart_recipients(&booking, hairdresser.as_ref().map(|h| h.user_id), actor)
            .into_iter()
            .map(|recipient| {
                NotificationEntry::new(recipient, NotificationEvent::BookingCancelled, booking_payload(&booking))
            })
            .collect();
        self.notifications.notify(entries);

        Ok(booking)
    }

    pub async fn request_extension(&self, booking_id: Uuid, actor: &Actor, minutes: i32) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let status = booking.status;
        booking.request_extension(actor, minutes, Utc::now())?;
        write_booking(&mut tx, &booking, status, "extend").await?;

        let hairdresser_user = match booking.hairdresser_id {
            Some(id) => queries::get_hairdresser(&mut *tx, id).await?.map(|h| h.user_id),
            None => None,
        };
        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, minutes, "Extension requested");
        let entries = counterpart_recipients(&booking, hairdresser_user, actor)
            .into_iter()
            .map(|recipient| {
                NotificationEntry::new(
                    recipient,
                    NotificationEvent::ExtensionRequested,
                    json!({ "booking_id": booking.id, "minutes": minutes }),
                )
            })
            .collect();
        self.notifications.notify(entries);

        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid, actor: &Actor) -> Result<Booking, AppError> {
        let booking = queries::get_booking(&self.pool, booking_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::NotFound("booking".to_string())))?;

        if !booking.is_party(actor) {
            return Err(DomainError::Forbidden("not a party to this booking".to_string()).into());
        }
        Ok(booking)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, AppError> {
        let filter = match actor {
            Actor::Admin => BookingFilter {
                status,
                ..Default::default()
            },
            Actor::Client(user_id) => BookingFilter {
                client_id: Some(*user_id),
                status,
                ..Default::default()
            },
            Actor::Hairdresser(hairdresser_id) => BookingFilter {
                hairdresser_id: Some(*hairdresser_id),
                status,
                ..Default::default()
            },
            Actor::Guest(_) => {
                return Err(DomainError::Forbidden("sign in to list bookings".to_string()).into())
            }
        };

        Ok(queries::list_bookings(&self.pool, &filter, limit, offset).await?)
    }

    pub async fn track(&self, booking_id: Uuid, actor: &Actor) -> Result<TrackingInfo, AppError> {
        let booking = self.get(booking_id, actor).await?;

        let hairdresser_location = match booking.hairdresser_id {
            Some(id) => queries::get_hairdresser(&self.pool, id)
                .await?
                .and_then(|h| h.location()),
            None => None,
        };

        let estimate = match (hairdresser_location, booking.location()) {
            (Some(from), Some(to)) if !booking.status.is_terminal() => Some(self.travel.estimate(from, to).await),
            _ => None,
        };

        Ok(TrackingInfo {
            booking_id: booking.id,
            status: booking.status,
            hairdresser_id: booking.hairdresser_id,
            hairdresser_location,
            estimated_minutes: estimate.as_ref().map(|e| e.duration_minutes),
            distance_meters: estimate.as_ref().map(|e| e.distance_meters),
            estimate_source: estimate.map(|e| e.source),
        })
    }

    fn notify_client(&self, booking: &Booking, event: NotificationEvent) {
        if let Some(client_id) = booking.client_id {
            self.notifications
                .notify(vec![NotificationEntry::new(client_id, event, booking_payload(booking))]);
        }
    }
}

async fn lock_booking(conn: &mut PgConnection, booking_id: Uuid) -> Result<Booking, AppError> {
    queries::lock_booking(conn, booking_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("booking".to_string()).into())
}

async fn lock_hairdresser(conn: &mut PgConnection, hairdresser_id: Uuid) -> Result<Hairdresser, AppError> {
    queries::lock_hairdresser(conn, hairdresser_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("hairdresser".to_string()).into())
}

async fn write_booking(
    conn: &mut PgConnection,
    booking: &Booking,
    expected: BookingStatus,
    action: &'static str,
) -> Result<(), AppError> {
    if !queries::update_booking_guarded(conn, booking, expected).await? {
        tracing::warn!(booking_id = %booking.id, action, "Booking changed concurrently");
        return Err(DomainError::InvalidStatus {
            current: expected,
            action,
        }
        .into());
    }
    Ok(())
}

fn booking_payload(booking: &Booking) -> serde_json::Value {
    json!({
        "booking_id": booking.id,
        "status": booking.status.as_str(),
        "scheduled_time": booking.scheduled_time,
        "service_fee": booking.service_fee.to_string(),
    })
}

/// Users to tell about a change, excluding whoever made it.
fn counterpart_recipients(booking: &Booking, hairdresser_user: Option<Uuid>, actor: &Actor) -> Vec<Uuid> {
    let mut recipients = Vec::with_capacity(2);
    if let Some(client_id) = booking.client_id {
        if *actor != Actor::Client(client_id) {
            recipients.push(client_id);
        }
    }
    if let (Some(user_id), Some(hairdresser_id)) = (hairdresser_user, booking.hairdresser_id) {
        if *actor != Actor::Hairdresser(hairdresser_id) {
            recipients.push(user_id);
        }
    }
    recipients
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::tests::pending_booking;

    #[test]
    fn test_counterparts_exclude_actor() {
        let hairdresser_id = Uuid::new_v4();
        let hairdresser_user = Uuid::new_v4();
        let client_id = Uuid::new_v4();
        let mut booking = pending_booking(Some(hairdresser_id));
        booking.client_id = Some(client_id);

        assert_eq!(
            counterpart_recipients(&booking, Some(hairdresser_user), &Actor::Client(client_id)),
            vec![hairdresser_user]
        );
        assert_eq!(
            counterpart_recipients(&booking, Some(hairdresser_user), &Actor::Hairdresser(hairdresser_id)),
            vec![client_id]
        );
        assert_eq!(
            counterpart_recipients(&booking, Some(hairdresser_user), &Actor::Admin),
            vec![client_id, hairdresser_user]
        );
    }

    #[test]
    fn test_guest_booking_only_notifies_hairdresser() {
        let hairdresser_id = Uuid::new_v4();
        let hairdresser_user = Uuid::new_v4();
        let booking = pending_booking(Some(hairdresser_id));

        let guest = Actor::Guest(booking.client_phone.clone());
        assert_eq!(
            counterpart_recipients(&booking, Some(hairdresser_user), &guest),
            vec![hairdresser_user]
        );
    }

    #[test]
    fn test_payload_carries_booking_id() {
        let booking = pending_booking(None);
        let payload = booking_payload(&booking);
        assert_eq!(payload["booking_id"], json!(booking.id));
        assert_eq!(payload["status"], "pending");
    }
}
