use url::ParseError;

/// Different ways rendering or reading an `otpauth://` URL failed.
#[derive(Debug, Eq, PartialEq)]
pub enum TotpUrlError {
    Url(ParseError),
    Scheme(String),
    Host(String),
    Secret(String),
    Algorithm(String),
    Digits(String),
    DigitsNumber(usize),
    Step(String),
    StepValue(u64),
    Issuer(String),
    IssuerDecoding(String),
    IssuerMismatch(String, String),
    AccountName(String),
    AccountNameDecoding(String),
}

impl std::error::Error for TotpUrlError {}

impl std::fmt::Display for TotpUrlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TotpUrlError::AccountName(name) => write!(
                f,
                "Account Name can't contain a colon. \"{}\" contains a colon",
                name
            ),
            TotpUrlError::AccountNameDecoding(name) => write!(
                f,
                "Couldn't URL decode \"{}\"",
                name
            ),
            TotpUrlError::Algorithm(algo) => write!(
                f,
                "Algorithm can only be SHA1, not \"{}\"",
                algo
            ),
            TotpUrlError::Digits(digits) => write!(
                f,
                "Could not parse \"{}\" as a number.",
                digits,
            ),
            TotpUrlError::DigitsNumber(digits) => write!(
                f,
                "Tokens are 6 digits long. {} digits is not supported",
                digits,
            ),
            TotpUrlError::Host(host) => write!(
                f,
                "Host should be totp, not \"{}\"",
                host
            ),
            TotpUrlError::Issuer(issuer) => write!(
                f,
                "Issuer can't contain a colon. \"{}\" contains a colon",
                issuer
            ),
            TotpUrlError::IssuerDecoding(issuer) => write!(
                f,
                "Couldn't URL decode \"{}\"",
                issuer
            ),
            TotpUrlError::IssuerMismatch(path_issuer, issuer) => write!(
                f,
                "An issuer \"{}\" could be retrieved from the path, but a different issuer \"{}\" was found in the issuer URL parameter",
                path_issuer,
                issuer,
            ),
            TotpUrlError::Scheme(scheme) => write!(
                f,
                "Scheme should be otpauth, not \"{}\"",
                scheme
            ),
            TotpUrlError::Secret(secret) => write!(
                f,
                "Secret \"{}\" is not a valid base32 string",
                secret,
            ),
            TotpUrlError::Step(step) => write!(
                f,
                "Could not parse \"{}\" as a number.",
                step,
            ),
            TotpUrlError::StepValue(step) => write!(
                f,
                "Tokens rotate every 30 seconds. A period of {} is not supported",
                step,
            ),
            TotpUrlError::Url(e) => write!(
                f,
                "Error parsing URL: {}",
                e
            )
        }
    }
}
