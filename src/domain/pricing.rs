use bigdecimal::BigDecimal;
use std::str::FromStr;

use super::{Booking, DomainError, ServiceType};

/// Platform commission per service type.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFees {
    pub reservation: BigDecimal,
    pub home: BigDecimal,
}

impl ServiceFees {
    pub fn fee_for(&self, service_type: ServiceType) -> BigDecimal {
        match service_type {
            ServiceType::Home => self.home.clone(),
            ServiceType::Salon => self.reservation.clone(),
        }
    }
}

/// How much a completed booking adds to a hairdresser's earnings.
#[derive(Debug, Clone, PartialEq)]
pub enum EarningsPolicy {
    /// Client price minus the service fee, never below zero.
    Net,
    /// Client price as paid.
    Gross,
    Fixed(BigDecimal),
}

impl EarningsPolicy {
    pub fn earnings_for(&self, booking: &Booking) -> BigDecimal {
        match self {
            EarningsPolicy::Net => {
                let net = &booking.client_price - &booking.service_fee;
                if net < BigDecimal::from(0) {
                    BigDecimal::from(0)
                } else {
                    net
                }
            }
            EarningsPolicy::Gross => booking.client_price.clone(),
            EarningsPolicy::Fixed(amount) => amount.clone(),
        }
    }
}

impl FromStr for EarningsPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "net" => Ok(EarningsPolicy::Net),
            "gross" => Ok(EarningsPolicy::Gross),
            other => other
                .parse::<BigDecimal>()
                .map(EarningsPolicy::Fixed)
                .map_err(|_| {
                    DomainError::Validation(format!(
                        "EARNINGS_POLICY must be 'net', 'gross' or a decimal amount (got '{}')",
                        other
                    ))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::tests::pending_booking;

    #[test]
    fn test_fee_for_service_type() {
        let fees = ServiceFees {
            reservation: BigDecimal::from(1000),
            home: BigDecimal::from(2000),
        };
        assert_eq!(fees.fee_for(ServiceType::Home), BigDecimal::from(2000));
        assert_eq!(fees.fee_for(ServiceType::Salon), BigDecimal::from(1000));
    }

    #[test]
    fn test_earnings_policies() {
        let booking = pending_booking(None);
        assert_eq!(EarningsPolicy::Net.earnings_for(&booking), BigDecimal::from(13_000));
        assert_eq!(EarningsPolicy::Gross.earnings_for(&booking), BigDecimal::from(15_000));
        assert_eq!(
            "20000".parse::<EarningsPolicy>().unwrap().earnings_for(&booking),
            BigDecimal::from(20_000)
        );
    }

    #[test]
    fn test_net_earnings_never_negative() {
        let mut booking = pending_booking(None);
        booking.client_price = BigDecimal::from(500);
        assert_eq!(EarningsPolicy::Net.earnings_for(&booking), BigDecimal::from(0));
    }

    #[test]
    fn test_invalid_policy() {
        assert!("sometimes".parse::<EarningsPolicy>().is_err());
    }
}
