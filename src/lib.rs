pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::services::otp::LoggingSms;
use crate::services::{
    BalanceLedger, BookingLifecycle, GeoMatcher, HairdresserService, NotificationDispatcher,
    OtpService, RatingAggregator, TravelEstimator,
};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub matcher: GeoMatcher,
    pub lifecycle: BookingLifecycle,
    pub ledger: BalanceLedger,
    pub ratings: RatingAggregator,
    pub hairdressers: HairdresserService,
    pub otp: OtpService,
    pub start_time: Instant,
}

impl AppState {
    /// Wires every service over one pool. No connection is opened here.
    pub fn new(db: sqlx::PgPool, config: Config) -> anyhow::Result<Self> {
        let notifications = NotificationDispatcher::from_config(db.clone(), config.push_webhook_url.as_deref());
        let travel = TravelEstimator::new(config.osrm_url.clone(), config.fallback_speed_kmh);
        let otp = OtpService::new(&config.redis_url, config.otp_ttl_secs, Arc::new(LoggingSms))?;

        let lifecycle = BookingLifecycle::new(
            db.clone(),
            config.fees.clone(),
            config.earnings_policy.clone(),
            config.match_radius_meters,
            notifications.clone(),
            travel,
        );

        Ok(Self {
            matcher: GeoMatcher::new(db.clone()),
            lifecycle,
            ledger: BalanceLedger::new(db.clone(), notifications),
            ratings: RatingAggregator::new(db.clone()),
            hairdressers: HairdresserService::new(db.clone()),
            otp,
            db,
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let log_request_body = state.config.log_request_body;

    let bookings = Router::new()
        .route(
            "/",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/nearby-hairdressers", get(handlers::bookings::nearby_hairdressers))
        .route("/:id", get(handlers::bookings::get_booking))
        .route("/:id/accept", put(handlers::bookings::accept_booking))
        .route("/:id/reject", put(handlers::bookings::reject_booking))
        .route("/:id/start", put(handlers::bookings::start_booking))
        .route("/:id/complete", put(handlers::bookings::complete_booking))
        .route("/:id/cancel", put(handlers::bookings::cancel_booking))
        .route("/:id/extension", put(handlers::bookings::request_extension))
        .route("/:id/rate", post(handlers::bookings::rate_booking))
        .route("/:id/track", get(handlers::bookings::track_booking));

    let hairdressers = Router::new()
        .route("/me", get(handlers::hairdressers::me))
        .route("/me/location", put(handlers::hairdressers::update_location))
        .route("/me/availability", put(handlers::hairdressers::set_availability))
        .route("/me/balance", get(handlers::hairdressers::balance))
        .route("/me/transactions", get(handlers::hairdressers::transactions))
        .route("/me/recharge", post(handlers::hairdressers::request_recharge));

    let admin = Router::new()
        .route("/recharges/:id/approve", put(handlers::admin::approve_recharge))
        .route(
            "/hairdressers/:id/registration",
            put(handlers::admin::set_registration_status),
        );

    let auth = Router::new()
        .route("/otp/request", post(handlers::auth::request_otp))
        .route("/otp/verify", post(handlers::auth::verify_otp));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/bookings", bookings)
        .nest("/hairdressers", hairdressers)
        .nest("/admin", admin)
        .nest("/auth", auth)
        .route("/notifications", get(handlers::notifications::list_notifications))
        .layer(axum::middleware::from_fn_with_state(
            log_request_body,
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
