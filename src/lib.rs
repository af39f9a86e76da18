//! This library backs a small TOTP dashboard: it turns the Base32 secret stored on a user
//! record into the current 6-digit code and tells the display how many seconds that code
//! has left. Codes are HMAC-SHA1 over 30 second steps, as in [rfc-6238](https://tools.ietf.org/html/rfc6238),
//! which is what every authenticator app accepts by default.
//!
//! The engine is a pure function of the secret and the time. Callers poll it, usually once a
//! second, with [`Countdown`] or [`Ticker`] doing the bookkeeping; user records live in a
//! [`UserDirectory`].
//!
//! # Examples
//!
//! ```rust
//! use totp_dash::compute_current_token;
//!
//! // "12345678901234567890", the rfc-6238 test key
//! let result = compute_current_token("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ", 59);
//! assert!(result.valid);
//! assert_eq!(result.token, "287082");
//! assert_eq!(result.remaining_seconds, 1);
//! ```
//!
//! Secrets that can't be decoded never panic, they yield an invalid result instead:
//!
//! ```rust
//! use totp_dash::{compute_current_token, ERROR_TOKEN};
//!
//! let result = compute_current_token("not-base32!!", 59);
//! assert!(!result.valid);
//! assert_eq!(result.token, ERROR_TOKEN);
//! assert_eq!(result.remaining_seconds, 0);
//! ```

mod countdown;
mod directory;
mod error;
mod otp;
#[cfg(feature = "otpauth")]
mod otpauth;
mod secret;
#[cfg(feature = "otpauth")]
mod url_error;

pub use countdown::{Clock, Countdown, ManualClock, SystemClock, Tick, Ticker};
pub use directory::{
    backup_file_name, export_json, import_json, search, DirectoryConfig, DirectoryError,
    MemoryDirectory, UserDirectory, UserRecord,
};
pub use error::TokenError;
pub use otp::{compute_current_token, current_token, seconds_remaining, try_compute_token, OtpResult};
#[cfg(feature = "otpauth")]
pub use otpauth::{parse_url, ProvisionedAccount, ProvisioningConfig};
pub use secret::{Secret, SecretParseError};
#[cfg(feature = "otpauth")]
pub use url_error::TotpUrlError;

use constant_time_eq::constant_time_eq;

use core::fmt;

use hmac::Mac;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

type HmacSha1 = hmac::Hmac<sha1::Sha1>;

/// Duration in seconds of a step.
pub const PERIOD: u64 = 30;

/// Number of digits composing a token.
pub const DIGITS: usize = 6;

/// Token reported when none could be derived. Never a valid code, as it isn't numeric.
pub const ERROR_TOKEN: &str = "ERROR";

pub(crate) fn system_time() -> Result<u64, SystemTimeError> {
    let t = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(t)
}

/// Totp holds the decoded key a token is derived from. The algorithm (HMAC-SHA1), the
/// number of digits ([`DIGITS`]) and the step ([`PERIOD`]) are fixed.
///
/// Its [secret](struct.Totp.html#structfield.secret) field is sensitive data, treat it accordingly
#[derive(Debug, Clone)]
pub struct Totp<T = Vec<u8>> {
    /// Non-encoded key, never empty
    pub secret: T,
}

impl<T: AsRef<[u8]>> PartialEq for Totp<T> {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.secret.as_ref(), other.secret.as_ref())
    }
}

impl<T> fmt::Display for Totp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "digits: {}; step: {}; alg: SHA1", DIGITS, PERIOD)
    }
}

impl Totp<Vec<u8>> {
    /// Decode a human-entered Base32 secret and build a Totp from it.
    ///
    /// ```rust
    /// use totp_dash::Totp;
    /// let totp = Totp::from_base32("jbsw-y3dp ehpk-3pxp").unwrap();
    /// assert_eq!(totp.get_secret_base32(), "JBSWY3DPEHPK3PXP");
    /// ```
    pub fn from_base32(secret: &str) -> Result<Totp, TokenError> {
        let bytes = Secret::Encoded(secret.to_string()).to_bytes()?;
        Totp::new(bytes)
    }
}

impl<T: AsRef<[u8]>> Totp<T> {
    /// Will create a new instance of Totp from raw key bytes.
    ///
    /// # Errors
    ///
    /// Will return [`TokenError::EmptyKey`] if `secret` holds no bytes.
    pub fn new(secret: T) -> Result<Totp<T>, TokenError> {
        if secret.as_ref().is_empty() {
            return Err(TokenError::EmptyKey);
        }
        Ok(Totp { secret })
    }

    /// Counter of the step `time` falls in.
    pub fn counter(&self, time: u64) -> u64 {
        time / PERIOD
    }

    /// Will sign the given timestamp
    pub fn sign(&self, time: u64) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha1::new_from_slice(self.secret.as_ref())
            .map_err(|err| TokenError::ComputationError(format!("hmac key rejected: {}", err)))?;
        mac.update(self.counter(time).to_be_bytes().as_ref());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Will generate a token given the provided timestamp in seconds
    pub fn generate(&self, time: u64) -> Result<String, TokenError> {
        let result: &[u8] = &self.sign(time)?;
        let offset = match result.last() {
            Some(last) => (last & 0x0f) as usize,
            None => return Err(TokenError::ComputationError("empty digest".to_string())),
        };
        let window: [u8; 4] = result
            .get(offset..offset + 4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| {
                TokenError::ComputationError(format!("truncation offset {} out of range", offset))
            })?;
        let result = u32::from_be_bytes(window) & 0x7fff_ffff;
        Ok(format!(
            "{1:00$}",
            DIGITS,
            result % 10_u32.pow(DIGITS as u32)
        ))
    }

    /// Returns the timestamp of the first second for the next step
    /// given the provided timestamp in seconds
    pub fn next_step(&self, time: u64) -> u64 {
        (self.counter(time) + 1) * PERIOD
    }

    /// Give the ttl (in seconds) of the token valid at `time`, between 1 and [`PERIOD`]
    pub fn ttl(&self, time: u64) -> u64 {
        PERIOD - (time % PERIOD)
    }

    /// Give the ttl (in seconds) of the current token
    pub fn ttl_current(&self) -> Result<u64, TokenError> {
        let t = system_time()?;
        Ok(self.ttl(t))
    }

    /// Generate a token from the current system time
    pub fn generate_current(&self) -> Result<String, TokenError> {
        let t = system_time()?;
        self.generate(t)
    }

    /// Will return the base32 representation of the secret, which might be useful when users want to manually add the secret to their authenticator
    pub fn get_secret_base32(&self) -> String {
        base32::encode(
            base32::Alphabet::Rfc4648 { padding: false },
            self.secret.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn new_empty_key() {
        let totp = Totp::new(Vec::<u8>::new());
        assert_eq!(totp.unwrap_err(), TokenError::EmptyKey);
    }

    #[test]
    fn from_base32_errors() {
        assert_eq!(
            Totp::from_base32("abc!").unwrap_err(),
            TokenError::InvalidSecretEncoding('!')
        );
        assert_eq!(Totp::from_base32("  ").unwrap_err(), TokenError::EmptyKey);
    }

    #[test]
    fn comparison() {
        let reference = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(reference, Totp::new(RFC_SECRET).unwrap());
        assert_ne!(reference, Totp::new(b"TestSecretSuperSecret".as_ref()).unwrap());
    }

    #[test]
    fn display() {
        let totp = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(totp.to_string(), "digits: 6; step: 30; alg: SHA1");
    }

    #[test]
    fn sign_is_sha1_sized() {
        let totp = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(totp.sign(59).unwrap().len(), 20);
    }

    #[test]
    fn generate_rfc4226_vectors() {
        // rfc-4226 appendix D, one counter per 30 second step
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        let totp = Totp::new(RFC_SECRET).unwrap();
        for (counter, token) in expected.iter().enumerate() {
            assert_eq!(&totp.generate(counter as u64 * PERIOD).unwrap(), token);
        }
    }

    #[test]
    fn generate_rfc6238_vectors() {
        // rfc-6238 appendix B, SHA1 column reduced to 6 digits
        let totp = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(totp.generate(59).unwrap(), "287082");
        assert_eq!(totp.generate(1111111109).unwrap(), "081804");
        assert_eq!(totp.generate(1111111111).unwrap(), "050471");
        assert_eq!(totp.generate(1234567890).unwrap(), "005924");
        assert_eq!(totp.generate(2000000000).unwrap(), "279037");
        assert_eq!(totp.generate(20000000000).unwrap(), "353130");
    }

    #[test]
    fn generate_same_within_step() {
        let totp = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(totp.generate(30).unwrap(), totp.generate(59).unwrap());
        assert_ne!(totp.generate(59).unwrap(), totp.generate(60).unwrap());
    }

    #[test]
    fn next_step() {
        let totp = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(totp.next_step(0), 30);
        assert_eq!(totp.next_step(29), 30);
        assert_eq!(totp.next_step(30), 60);
    }

    #[test]
    fn ttl() {
        let totp = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(totp.ttl(0), 30);
        assert_eq!(totp.ttl(59), 1);
        assert_eq!(totp.ttl(60), 30);
        assert_eq!(totp.ttl(61), 29);
    }

    #[test]
    fn current() {
        let totp = Totp::new(RFC_SECRET).unwrap();
        let token = totp.generate_current().unwrap();
        assert_eq!(token.len(), DIGITS);
        assert!((1..=PERIOD).contains(&totp.ttl_current().unwrap()));
    }

    #[test]
    fn secret_base32() {
        let totp = Totp::new(RFC_SECRET).unwrap();
        assert_eq!(
            totp.get_secret_base32(),
            "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"
        );
    }
}
