use crate::SecretParseError;

/// Why a token could not be derived from a secret.
///
/// None of these are fatal: [`compute_current_token`](crate::compute_current_token)
/// turns every one of them into an invalid [`OtpResult`](crate::OtpResult).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TokenError {
    /// The normalized secret holds characters outside the Base32 alphabet.
    InvalidSecretEncoding(char),
    /// The secret decodes to zero key bytes.
    EmptyKey,
    /// HMAC or truncation failed, or the clock could not be read.
    ComputationError(String),
}

impl std::error::Error for TokenError {}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::InvalidSecretEncoding(c) => write!(
                f,
                "Secret is not valid base32, {:?} is not part of the RFC 4648 alphabet",
                c
            ),
            TokenError::EmptyKey => write!(f, "Secret decodes to an empty key"),
            TokenError::ComputationError(reason) => {
                write!(f, "Could not compute token: {}", reason)
            }
        }
    }
}

impl From<SecretParseError> for TokenError {
    fn from(err: SecretParseError) -> Self {
        match err {
            SecretParseError::ParseBase32(c) => TokenError::InvalidSecretEncoding(c),
            SecretParseError::EmptyKey => TokenError::EmptyKey,
        }
    }
}

impl From<std::time::SystemTimeError> for TokenError {
    fn from(err: std::time::SystemTimeError) -> Self {
        TokenError::ComputationError(format!("system clock is before the unix epoch: {}", err))
    }
}
