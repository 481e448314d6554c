use sqlx::{PgExecutor, Postgres, QueryBuilder, Result};
use uuid::Uuid;

use crate::db::models::{
    BalanceTransactionRow, BookingRow, HairdresserRow, Hairstyle, Notification, RatingRow, User,
};
use crate::domain::{BalanceTransaction, Booking, BookingStatus, Hairdresser, Rating};
use crate::services::notifications::NotificationEntry;

// --- User Queries ---

pub async fn find_user_by_phone<'e, E: PgExecutor<'e>>(executor: E, phone: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT id, name, phone, role, created_at FROM users WHERE phone = $1")
        .bind(phone)
        .fetch_optional(executor)
        .await
}

// --- Hairstyle Queries ---

pub async fn get_hairstyle<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Hairstyle>> {
    sqlx::query_as::<_, Hairstyle>(
        "SELECT id, name, price, duration_minutes FROM hairstyles WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

// --- Hairdresser Queries ---

const HAIRDRESSER_COLUMNS: &str = r#"
    id, user_id, profession, registration_status, is_available, current_job_id,
    balance, average_rating, total_jobs, total_earnings, latitude, longitude,
    created_at, updated_at
"#;

pub async fn get_hairdresser<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Hairdresser>> {
    sqlx::query_as::<_, HairdresserRow>(&format!(
        "SELECT {} FROM hairdressers WHERE id = $1",
        HAIRDRESSER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .map(HairdresserRow::into_domain)
    .transpose()
}

pub async fn get_hairdresser_by_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<Hairdresser>> {
    sqlx::query_as::<_, HairdresserRow>(&format!(
        "SELECT {} FROM hairdressers WHERE user_id = $1",
        HAIRDRESSER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await?
    .map(HairdresserRow::into_domain)
    .transpose()
}

/// Row-locks the hairdresser until the enclosing transaction ends.
pub async fn lock_hairdresser<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Hairdresser>> {
    sqlx::query_as::<_, HairdresserRow>(&format!(
        "SELECT {} FROM hairdressers WHERE id = $1 FOR UPDATE",
        HAIRDRESSER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .map(HairdresserRow::into_domain)
    .transpose()
}

/// Available, approved, located hairdressers, optionally offering a hairstyle.
pub async fn list_matchable_hairdressers<'e, E: PgExecutor<'e>>(
    executor: E,
    hairstyle_id: Option<Uuid>,
) -> Result<Vec<Hairdresser>> {
    let rows = sqlx::query_as::<_, HairdresserRow>(&format!(
        r#"
        SELECT {} FROM hairdressers h
        WHERE h.is_available = TRUE
        AND h.current_job_id IS NULL
        AND h.registration_status = 'approved'
        AND h.latitude IS NOT NULL
        AND h.longitude IS NOT NULL
        AND (
            $1::uuid IS NULL
            OR EXISTS (
                SELECT 1 FROM hairdresser_hairstyles hh
                WHERE hh.hairdresser_id = h.id AND hh.hairstyle_id = $1
            )
        )
        "#,
        HAIRDRESSER_COLUMNS
    ))
    .bind(hairstyle_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(HairdresserRow::into_domain).collect()
}

/// Ties the hairdresser to a booking only if still free. `false` means another
/// request claimed them first.
pub async fn claim_hairdresser<'e, E: PgExecutor<'e>>(
    executor: E,
    hairdresser_id: Uuid,
    booking_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE hairdressers
        SET is_available = FALSE, current_job_id = $2, updated_at = NOW()
        WHERE id = $1 AND is_available = TRUE AND current_job_id IS NULL
        "#,
    )
    .bind(hairdresser_id)
    .bind(booking_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn save_hairdresser<'e, E: PgExecutor<'e>>(executor: E, hairdresser: &Hairdresser) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE hairdressers SET
            registration_status = $2,
            is_available = $3,
            current_job_id = $4,
            balance = $5,
            average_rating = $6,
            total_jobs = $7,
            total_earnings = $8,
            latitude = $9,
            longitude = $10,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(hairdresser.id)
    .bind(hairdresser.registration_status.as_str())
    .bind(hairdresser.is_available)
    .bind(hairdresser.current_job_id)
    .bind(&hairdresser.balance)
    .bind(&hairdresser.average_rating)
    .bind(hairdresser.total_jobs)
    .bind(&hairdresser.total_earnings)
    .bind(hairdresser.latitude)
    .bind(hairdresser.longitude)
    .execute(executor)
    .await?;

    Ok(())
}

// --- Booking Queries ---

const BOOKING_COLUMNS: &str = r#"
    id, client_id, client_name, client_phone, hairdresser_id, hairstyle_id,
    service_type, status, service_fee, client_price, location_address,
    latitude, longitude, scheduled_time, started_at, completed_at, cancelled_at,
    cancellation_reason, rejection_reason, extension_requested, extension_minutes,
    created_at, updated_at
"#;

pub async fn insert_booking<'e, E: PgExecutor<'e>>(executor: E, booking: &Booking) -> Result<Booking> {
    sqlx::query_as::<_, BookingRow>(&format!(
        r#"
        INSERT INTO bookings (
            id, client_id, client_name, client_phone, hairdresser_id, hairstyle_id,
            service_type, status, service_fee, client_price, location_address,
            latitude, longitude, scheduled_time, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {}
        "#,
        BOOKING_COLUMNS
    ))
    .bind(booking.id)
    .bind(booking.client_id)
    .bind(&booking.client_name)
    .bind(&booking.client_phone)
    .bind(booking.hairdresser_id)
    .bind(booking.hairstyle_id)
    .bind(booking.service_type.as_str())
    .bind(booking.status.as_str())
    .bind(&booking.service_fee)
    .bind(&booking.client_price)
    .bind(&booking.location_address)
    .bind(booking.latitude)
    .bind(booking.longitude)
    .bind(booking.scheduled_time)
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .fetch_one(executor)
    .await?
    .into_domain()
}

pub async fn get_booking<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Booking>> {
    sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {} FROM bookings WHERE id = $1",
        BOOKING_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .map(BookingRow::into_domain)
    .transpose()
}

pub async fn lock_booking<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Booking>> {
    sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
        BOOKING_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .map(BookingRow::into_domain)
    .transpose()
}

/// Writes the booking back only if it is still in `expected` status. Zero
/// affected rows means a concurrent transition won.
pub async fn update_booking_guarded<'e, E: PgExecutor<'e>>(
    executor: E,
    booking: &Booking,
    expected: BookingStatus,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE bookings SET
            status = $3,
            hairdresser_id = $4,
            started_at = $5,
            completed_at = $6,
            cancelled_at = $7,
            cancellation_reason = $8,
            rejection_reason = $9,
            extension_requested = $10,
            extension_minutes = $11,
            updated_at = $12
        WHERE id = $1 AND status = $2
        "#,
    )
    .bind(booking.id)
    .bind(expected.as_str())
    .bind(booking.status.as_str())
    .bind(booking.hairdresser_id)
    .bind(booking.started_at)
    .bind(booking.completed_at)
    .bind(booking.cancelled_at)
    .bind(&booking.cancellation_reason)
    .bind(&booking.rejection_reason)
    .bind(booking.extension_requested)
    .bind(booking.extension_minutes)
    .bind(booking.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub hairdresser_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

pub async fn list_bookings<'e, E: PgExecutor<'e>>(
    executor: E,
    filter: &BookingFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Booking>> {
    let rows = sqlx::query_as::<_, BookingRow>(&format!(
        r#"
        SELECT {} FROM bookings
        WHERE ($1::uuid IS NULL OR hairdresser_id = $1)
        AND ($2::uuid IS NULL OR client_id = $2)
        AND ($3::text IS NULL OR status = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
        BOOKING_COLUMNS
    ))
    .bind(filter.hairdresser_id)
    .bind(filter.client_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(BookingRow::into_domain).collect()
}

// --- Ledger Queries ---

const BALANCE_TRANSACTION_COLUMNS: &str = r#"
    id, hairdresser_id, type, amount, balance_before, balance_after,
    booking_id, status, payment_method, description, created_at
"#;

pub async fn insert_balance_transaction<'e, E: PgExecutor<'e>>(
    executor: E,
    entry: &BalanceTransaction,
) -> Result<BalanceTransaction> {
    sqlx::query_as::<_, BalanceTransactionRow>(&format!(
        r#"
        INSERT INTO balance_transactions (
            id, hairdresser_id, type, amount, balance_before, balance_after,
            booking_id, status, payment_method, description, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        BALANCE_TRANSACTION_COLUMNS
    ))
    .bind(entry.id)
    .bind(entry.hairdresser_id)
    .bind(entry.kind.as_str())
    .bind(&entry.amount)
    .bind(&entry.balance_before)
    .bind(&entry.balance_after)
    .bind(entry.booking_id)
    .bind(entry.status.as_str())
    .bind(&entry.payment_method)
    .bind(&entry.description)
    .bind(entry.created_at)
    .fetch_one(executor)
    .await?
    .into_domain()
}

pub async fn lock_balance_transaction<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<BalanceTransaction>> {
    sqlx::query_as::<_, BalanceTransactionRow>(&format!(
        "SELECT {} FROM balance_transactions WHERE id = $1 FOR UPDATE",
        BALANCE_TRANSACTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .map(BalanceTransactionRow::into_domain)
    .transpose()
}

/// The one permitted ledger mutation: settling a pending recharge.
pub async fn settle_pending_recharge<'e, E: PgExecutor<'e>>(
    executor: E,
    entry: &BalanceTransaction,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE balance_transactions
        SET status = $2, balance_before = $3, balance_after = $4
        WHERE id = $1 AND status = 'pending' AND type = 'recharge'
        "#,
    )
    .bind(entry.id)
    .bind(entry.status.as_str())
    .bind(&entry.balance_before)
    .bind(&entry.balance_after)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_balance_transactions<'e, E: PgExecutor<'e>>(
    executor: E,
    hairdresser_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<BalanceTransaction>> {
    let rows = sqlx::query_as::<_, BalanceTransactionRow>(&format!(
        r#"
        SELECT {} FROM balance_transactions
        WHERE hairdresser_id = $1
        ORDER BY created_at DESC, id
        LIMIT $2 OFFSET $3
        "#,
        BALANCE_TRANSACTION_COLUMNS
    ))
    .bind(hairdresser_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(BalanceTransactionRow::into_domain).collect()
}

// --- Rating Queries ---

pub async fn rating_exists<'e, E: PgExecutor<'e>>(executor: E, booking_id: Uuid) -> Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM ratings WHERE booking_id = $1)")
        .bind(booking_id)
        .fetch_one(executor)
        .await
}

pub async fn insert_rating<'e, E: PgExecutor<'e>>(executor: E, rating: &Rating) -> Result<Rating> {
    sqlx::query_as::<_, RatingRow>(
        r#"
        INSERT INTO ratings (id, booking_id, hairdresser_id, client_id, rating, comment, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, booking_id, hairdresser_id, client_id, rating, comment, created_at
        "#,
    )
    .bind(rating.id)
    .bind(rating.booking_id)
    .bind(rating.hairdresser_id)
    .bind(rating.client_id)
    .bind(rating.rating)
    .bind(&rating.comment)
    .bind(rating.created_at)
    .fetch_one(executor)
    .await
    .map(Rating::from)
}

pub async fn list_rating_values<'e, E: PgExecutor<'e>>(executor: E, hairdresser_id: Uuid) -> Result<Vec<i16>> {
    sqlx::query_scalar::<_, i16>("SELECT rating FROM ratings WHERE hairdresser_id = $1")
        .bind(hairdresser_id)
        .fetch_all(executor)
        .await
}

// --- Notification Queries ---

pub async fn insert_notifications<'e, E: PgExecutor<'e>>(
    executor: E,
    entries: &[NotificationEntry],
) -> Result<u64> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO notifications (id, user_id, event, title, payload) ");
    builder.push_values(entries, |mut row, entry| {
        row.push_bind(Uuid::new_v4())
            .push_bind(entry.recipient)
            .push_bind(entry.event.as_str())
            .push_bind(entry.title.clone())
            .push_bind(entry.payload.clone());
    });

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

pub async fn list_notifications<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Notification>> {
    sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, event, title, payload, read, created_at
        FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}
