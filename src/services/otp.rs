//! One-time login codes keyed by phone number.

use async_trait::async_trait;
use rand::Rng;
use redis::AsyncCommands;
use std::sync::Arc;

use crate::error::AppError;

const OTP_PREFIX: &str = "otp:";
const OTP_ATTEMPTS_PREFIX: &str = "otp_attempts:";
const OTP_DIGITS: u32 = 6;
pub const MAX_VERIFY_ATTEMPTS: i64 = 5;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> anyhow::Result<()>;
}

/// Writes the message to the log instead of an SMS gateway. Codes never reach the log.
pub struct LoggingSms;

#[async_trait]
impl SmsSender for LoggingSms {
    async fn send(&self, phone: &str, message: &str) -> anyhow::Result<()> {
        tracing::info!(
            phone = %crate::utils::sanitize::mask_phone(phone),
            "SMS: {}",
            redact_codes(message)
        );
        Ok(())
    }
}

/// Replaces every run of at least `OTP_DIGITS` digits with asterisks.
fn redact_codes(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut digits = String::new();
    let flush = |digits: &mut String, out: &mut String| {
        if digits.len() >= OTP_DIGITS as usize {
            out.extend(std::iter::repeat('*').take(digits.len()));
        } else {
            out.push_str(digits);
        }
        digits.clear();
    };
    for ch in message.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            flush(&mut digits, &mut out);
            out.push(ch);
        }
    }
    flush(&mut digits, &mut out);
    out
}

#[derive(Clone)]
pub struct OtpService {
    redis_client: redis::Client,
    sms: Arc<dyn SmsSender>,
    ttl_secs: u64,
}

impl OtpService {
    pub fn new(redis_url: &str, ttl_secs: u64, sms: Arc<dyn SmsSender>) -> anyhow::Result<Self> {
        let redis_client = redis::Client::open(redis_url)?;
        Ok(Self {
            redis_client,
            sms,
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Stores a fresh code for `phone`, replacing any earlier one.
    pub async fn issue(&self, phone: &str) -> Result<(), AppError> {
        let code = generate_code();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let _: () = redis::cmd("SET")
            .arg(code_key(phone))
            .arg(&code)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        let _: () = conn.del(attempts_key(phone)).await?;

        let message = format!(
            "Your verification code is {}. It expires in {} minutes.",
            code,
            (self.ttl_secs / 60).max(1)
        );
        if let Err(e) = self.sms.send(phone, &message).await {
            tracing::warn!("OTP delivery failed: {}", e);
        }
        Ok(())
    }

    /// Consumes the code on a match. Only one concurrent verifier can win.
    pub async fn verify(&self, phone: &str, code: &str) -> Result<(), AppError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let key = code_key(phone);

        let stored: Option<String> = conn.get(&key).await?;
        let Some(stored) = stored else {
            return Err(AppError::InvalidOtp);
        };

        if stored != code.trim() {
            let attempts_key = attempts_key(phone);
            let attempts: i64 = conn.incr(&attempts_key, 1).await?;
            let _: () = redis::cmd("EXPIRE")
                .arg(&attempts_key)
                .arg(self.ttl_secs)
                .query_async(&mut conn)
                .await?;
            if attempts >= MAX_VERIFY_ATTEMPTS {
                tracing::warn!("Too many OTP attempts, discarding code");
                let _: () = conn.del(&key).await?;
            }
            return Err(AppError::InvalidOtp);
        }

        let removed: i64 = conn.del(&key).await?;
        if removed != 1 {
            return Err(AppError::InvalidOtp);
        }
        let _: () = conn.del(attempts_key(phone)).await?;
        Ok(())
    }
}

fn code_key(phone: &str) -> String {
    format!("{}{}", OTP_PREFIX, phone)
}

fn attempts_key(phone: &str) -> String {
    format!("{}{}", OTP_ATTEMPTS_PREFIX, phone)
}

fn generate_code() -> String {
    let max = 10u32.pow(OTP_DIGITS);
    let value = rand::thread_rng().gen_range(0..max);
    format!("{:0width$}", value, width = OTP_DIGITS as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_logged_sms_hides_the_code() {
        let redacted = redact_codes("Your verification code is 042917. It expires in 5 minutes.");
        assert_eq!(redacted, "Your verification code is ******. It expires in 5 minutes.");
        assert_eq!(redact_codes("123456"), "******");
    }

    #[test]
    fn test_keys_are_per_phone() {
        assert_eq!(code_key("+2250700000000"), "otp:+2250700000000");
        assert_eq!(attempts_key("+2250700000000"), "otp_attempts:+2250700000000");
    }

    #[test]
    fn test_new_rejects_bad_url() {
        assert!(OtpService::new("not a url", 300, Arc::new(LoggingSms)).is_err());
    }
}
