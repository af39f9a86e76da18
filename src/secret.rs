//! Representation of a shared secret, either "raw" \[u8\] or a Base32 encoded String
//!
//! Encoded secrets are typed in by humans, often copied from an authenticator
//! screen where they are shown in lowercase or in groups of four. [`Secret::normalize`]
//! removes whitespace and hyphens and upper-cases the rest before decoding, so
//! all of these are the same key:
//!
//! ```
//! use totp_dash::Secret;
//!
//! let grouped = Secret::Encoded("jbsw-y3dp ehpk-3pxp".to_string());
//! let canonical = Secret::Encoded("JBSWY3DPEHPK3PXP".to_string());
//! assert_eq!(grouped.to_bytes().unwrap(), canonical.to_bytes().unwrap());
//! ```
//!
//! - Generate a fresh secret for a new user
//! ```
//! # #[cfg(feature = "gen_secret")] {
//! use totp_dash::Secret;
//!
//! let secret = Secret::generate_secret().to_encoded();
//! println!("new secret:\t{}", secret);
//! # }
//! ```

use base32::{self, Alphabet};

use constant_time_eq::constant_time_eq;

/// Different ways secret parsing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParseError {
    /// The normalized text holds a character outside `A-Z2-7`, or `=` anywhere but the tail.
    ParseBase32(char),
    /// The text decoded to zero bytes.
    EmptyKey,
}

impl std::error::Error for SecretParseError {}

impl std::fmt::Display for SecretParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretParseError::ParseBase32(c) => write!(
                f,
                "Could not decode base32 secret: unexpected character {:?}.",
                c
            ),
            SecretParseError::EmptyKey => write!(f, "Base32 secret decodes to an empty key."),
        }
    }
}

/// Shared secret between the directory and the token engine.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub enum Secret {
    /// Non-encoded "raw" secret.
    Raw(Vec<u8>),
    /// Base32 encoded secret, as typed by a human.
    Encoded(String),
}

impl PartialEq for Secret {
    /// Compares the decoded key bytes, so one side can be Raw and the other Encoded.
    /// Secrets that fail to decode only equal each other if their text is identical.
    fn eq(&self, other: &Self) -> bool {
        match (self.to_bytes(), other.to_bytes()) {
            (Ok(a), Ok(b)) => constant_time_eq(&a, &b),
            (Err(_), Err(_)) => match (self, other) {
                (Secret::Encoded(a), Secret::Encoded(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

#[cfg(feature = "gen_secret")]
#[cfg_attr(docsrs, doc(cfg(feature = "gen_secret")))]
impl Default for Secret {
    fn default() -> Self {
        Secret::generate_secret()
    }
}

impl Secret {
    /// Strip whitespace and `-` separators and upper-case what is left.
    pub fn normalize(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// Get the key bytes.
    ///
    /// # Errors
    ///
    /// - [`SecretParseError::ParseBase32`] if the normalized text is not Base32
    /// - [`SecretParseError::EmptyKey`] if there is nothing left to use as a key
    pub fn to_bytes(&self) -> Result<Vec<u8>, SecretParseError> {
        match self {
            Secret::Raw(s) if s.is_empty() => Err(SecretParseError::EmptyKey),
            Secret::Raw(s) => Ok(s.to_vec()),
            Secret::Encoded(s) => decode(&Secret::normalize(s)),
        }
    }

    /// Try to transform a `Secret::Encoded` into a `Secret::Raw`
    pub fn to_raw(&self) -> Result<Self, SecretParseError> {
        match self {
            Secret::Raw(_) => Ok(self.clone()),
            Secret::Encoded(_) => Ok(Secret::Raw(self.to_bytes()?)),
        }
    }

    /// Try to transforms a `Secret::Raw` into a `Secret::Encoded`.
    ///
    /// An already encoded secret comes back in its normalized form.
    pub fn to_encoded(&self) -> Self {
        match self {
            Secret::Raw(s) => {
                Secret::Encoded(base32::encode(Alphabet::Rfc4648 { padding: false }, s))
            }
            Secret::Encoded(s) => Secret::Encoded(Secret::normalize(s)),
        }
    }

    /// Generate a CSPRNG binary value of 160 bits,
    /// the recomended size from [rfc-4226](https://www.rfc-editor.org/rfc/rfc4226#section-4).
    ///
    /// > The length of the shared secret MUST be at least 128 bits.
    /// > This document RECOMMENDs a shared secret length of 160 bits.
    #[cfg(feature = "gen_secret")]
    #[cfg_attr(docsrs, doc(cfg(feature = "gen_secret")))]
    pub fn generate_secret() -> Secret {
        use rand::Rng;

        let mut rng = rand::rng();
        let mut secret: [u8; 20] = Default::default();
        rng.fill(&mut secret[..]);
        Secret::Raw(secret.to_vec())
    }
}

/// Decode normalized Base32 text. Padding is optional, but once a `=` shows up
/// everything after it must be `=` as well.
fn decode(normalized: &str) -> Result<Vec<u8>, SecretParseError> {
    let body = normalized.trim_end_matches('=');
    if let Some(bad) = body
        .chars()
        .find(|c| !matches!(c, 'A'..='Z' | '2'..='7'))
    {
        return Err(SecretParseError::ParseBase32(bad));
    }

    let bytes = base32::decode(Alphabet::Rfc4648 { padding: false }, body)
        .ok_or(SecretParseError::ParseBase32('='))?;
    if bytes.is_empty() {
        return Err(SecretParseError::EmptyKey);
    }
    Ok(bytes)
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Raw(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Secret::Encoded(s) => write!(f, "{}", s),
        }
    }
}
