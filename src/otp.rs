//! The value a display polls for: the current token of a secret and its countdown.

use log::error;
use serde::{Deserialize, Serialize};

use crate::{system_time, TokenError, Totp, ERROR_TOKEN, PERIOD};

/// Token of a secret at a given second, and how long it stays current.
///
/// Serializes with the field names the dashboard front-end reads:
/// `{"token":"287082","remaining":1,"period":30,"isValid":true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpResult {
    /// 6 digits, zero padded, or [`ERROR_TOKEN`]
    pub token: String,
    /// Seconds until the token rotates, in `1..=period`. Zero when `valid` is false
    #[serde(rename = "remaining")]
    pub remaining_seconds: u64,
    pub period: u64,
    #[serde(rename = "isValid")]
    pub valid: bool,
}

impl OtpResult {
    /// The result reported for a secret no token can be derived from.
    pub fn invalid() -> OtpResult {
        OtpResult {
            token: ERROR_TOKEN.to_string(),
            remaining_seconds: 0,
            period: PERIOD,
            valid: false,
        }
    }
}

/// Seconds left in the step `now` falls in. A step that just started has the full
/// [`PERIOD`] left, so this never returns 0.
pub fn seconds_remaining(now: u64) -> u64 {
    PERIOD - (now % PERIOD)
}

/// Derive the token of `secret` at `now` (seconds since the unix epoch).
///
/// `secret` is normalized first, see [`Secret::normalize`](crate::Secret::normalize).
///
/// # Errors
///
/// - [`TokenError::InvalidSecretEncoding`] for anything that isn't Base32 once normalized
/// - [`TokenError::EmptyKey`] when the secret holds no key bytes
/// - [`TokenError::ComputationError`] if HMAC or truncation fail
pub fn try_compute_token(secret: &str, now: u64) -> Result<OtpResult, TokenError> {
    let totp = Totp::from_base32(secret)?;
    let token = totp.generate(now)?;
    Ok(OtpResult {
        token,
        remaining_seconds: seconds_remaining(now),
        period: PERIOD,
        valid: true,
    })
}

/// Derive the token of `secret` at `now`, folding any failure into [`OtpResult::invalid`].
///
/// This is what a display calls on every tick: it never fails, and an invalid result
/// shows [`ERROR_TOKEN`] with a zeroed countdown until the secret is fixed.
pub fn compute_current_token(secret: &str, now: u64) -> OtpResult {
    match try_compute_token(secret, now) {
        Ok(result) => result,
        Err(err) => {
            error!("token generation failed: {}", err);
            OtpResult::invalid()
        }
    }
}

/// [`compute_current_token`] against the system clock.
pub fn current_token(secret: &str) -> OtpResult {
    match system_time() {
        Ok(now) => compute_current_token(secret, now),
        Err(err) => {
            error!("token generation failed: {}", TokenError::from(err));
            OtpResult::invalid()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn is_six_digits(token: &str) -> bool {
        token.len() == 6 && token.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn known_answer() {
        let result = compute_current_token(RFC_SECRET, 59);
        assert_eq!(
            result,
            OtpResult {
                token: "287082".to_string(),
                remaining_seconds: 1,
                period: 30,
                valid: true,
            }
        );
    }

    #[test]
    fn deterministic() {
        let first = compute_current_token("JBSWY3DPEHPK3PXP", 1_700_000_000);
        for _ in 0..5 {
            assert_eq!(compute_current_token("JBSWY3DPEHPK3PXP", 1_700_000_000), first);
        }
    }

    #[test]
    fn normalization_invariance() {
        let t = 1_700_000_000;
        let canonical = compute_current_token("JBSWY3DPEHPK3PXP", t);
        assert!(canonical.valid);
        assert_eq!(compute_current_token("JBSW-Y3DP EHPK3PXP", t), canonical);
        assert_eq!(compute_current_token("jbswy3dpehpk3pxp", t), canonical);
        assert_eq!(compute_current_token("  jbsw y3dp\tehpk 3pxp  ", t), canonical);
        assert_eq!(compute_current_token("JBSWY3DPEHPK3PXP====", t), canonical);
    }

    #[test]
    fn rotation_boundary() {
        let before = compute_current_token(RFC_SECRET, 59);
        let after = compute_current_token(RFC_SECRET, 60);
        assert_eq!(before.remaining_seconds, 1);
        assert_eq!(after.remaining_seconds, 30);
        // counters 1 and 2
        assert_eq!(before.token, "287082");
        assert_eq!(after.token, "359152");
    }

    #[test]
    fn start_of_step_has_full_period() {
        assert_eq!(seconds_remaining(0), 30);
        assert_eq!(seconds_remaining(30), 30);
        assert_eq!(seconds_remaining(1), 29);
        assert_eq!(seconds_remaining(29), 1);
        assert_eq!(compute_current_token(RFC_SECRET, 0).remaining_seconds, 30);
    }

    #[test]
    fn six_digit_zero_padded() {
        // rfc-6238 vectors whose 6-digit reduction starts with zeros
        assert_eq!(compute_current_token(RFC_SECRET, 1111111109).token, "081804");
        assert_eq!(compute_current_token(RFC_SECRET, 1234567890).token, "005924");
        for t in (0..3000).step_by(30) {
            assert!(is_six_digits(&compute_current_token(RFC_SECRET, t).token));
        }
    }

    #[test]
    fn invalid_secret() {
        let result = compute_current_token("not-base32!!", 59);
        assert!(!result.valid);
        assert_eq!(result.remaining_seconds, 0);
        assert_eq!(result.period, 30);
        assert_eq!(result.token, ERROR_TOKEN);
        assert!(!is_six_digits(&result.token));
    }

    #[test]
    fn empty_secret() {
        assert_eq!(compute_current_token("", 59), OtpResult::invalid());
        assert_eq!(compute_current_token(" - ", 59), OtpResult::invalid());
        assert_eq!(
            try_compute_token("", 59).unwrap_err(),
            TokenError::EmptyKey
        );
    }

    #[test]
    fn typed_errors() {
        assert_eq!(
            try_compute_token("ABC1", 59).unwrap_err(),
            TokenError::InvalidSecretEncoding('1')
        );
        assert!(try_compute_token(RFC_SECRET, 59).is_ok());
    }

    #[test]
    fn countdown_decreases_within_period() {
        let start = 1_700_000_010;
        let mut previous = compute_current_token(RFC_SECRET, start);
        for t in start + 1..start + 20 {
            let current = compute_current_token(RFC_SECRET, t);
            if current.remaining_seconds == PERIOD {
                assert_eq!(previous.remaining_seconds, 1);
            } else {
                assert_eq!(current.remaining_seconds, previous.remaining_seconds - 1);
                assert_eq!(current.token, previous.token);
            }
            previous = current;
        }
    }

    #[test]
    fn current_token_is_valid() {
        let result = current_token(RFC_SECRET);
        assert!(result.valid);
        assert!(is_six_digits(&result.token));
        assert!((1..=PERIOD).contains(&result.remaining_seconds));
    }

    #[test]
    fn serializes_for_dashboard() {
        let json = serde_json::to_string(&compute_current_token(RFC_SECRET, 59)).unwrap();
        assert_eq!(
            json,
            r#"{"token":"287082","remaining":1,"period":30,"isValid":true}"#
        );
        let back: OtpResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.token, "287082");
    }
}
