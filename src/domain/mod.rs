//! Framework-agnostic booking domain.
//!
//! Every lifecycle rule lives here as plain functions over in-memory values.
//! The services layer loads rows under lock, applies these rules and writes
//! the result back inside one database transaction.

pub mod booking;
pub mod geo;
pub mod hairdresser;
pub mod ledger;
pub mod pricing;
pub mod rating;

use bigdecimal::BigDecimal;
use thiserror::Error;

pub use booking::{Actor, Booking, BookingStatus, ServiceType};
pub use geo::{Candidate, GeoPoint};
pub use hairdresser::{Hairdresser, RegistrationStatus};
pub use ledger::{BalanceTransaction, TransactionStatus, TransactionType};
pub use pricing::{EarningsPolicy, ServiceFees};
pub use rating::Rating;

/// Precondition and authorization failures raised by the domain rules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("cannot {action} a booking that is {current}")]
    InvalidStatus {
        current: BookingStatus,
        action: &'static str,
    },

    #[error("insufficient balance: {required} required, {available} available")]
    InsufficientBalance {
        required: BigDecimal,
        available: BigDecimal,
    },

    #[error("no hairdresser available")]
    NoHairdresserAvailable,

    #[error("hairdresser is busy with another booking")]
    HairdresserBusy,

    #[error("booking is not completed")]
    NotCompleted,

    #[error("booking has already been rated")]
    AlreadyRated,

    #[error("transaction is not a pending recharge")]
    NotPendingRecharge,

    #[error("{0}")]
    Validation(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
