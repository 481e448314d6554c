pub mod hairdressers;
pub mod ledger;
pub mod lifecycle;
pub mod matcher;
pub mod notifications;
pub mod otp;
pub mod rating;
pub mod routing;

pub use hairdressers::HairdresserService;
pub use ledger::BalanceLedger;
pub use lifecycle::BookingLifecycle;
pub use matcher::GeoMatcher;
pub use notifications::NotificationDispatcher;
pub use otp::OtpService;
pub use rating::RatingAggregator;
pub use routing::TravelEstimator;
