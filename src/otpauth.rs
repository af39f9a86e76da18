//! `otpauth://` URLs, the format authenticator apps scan from QR codes.

use url::{Host, Url};

use crate::{Secret, TotpUrlError, UserRecord, DIGITS, PERIOD};

/// What goes into a provisioning URL besides the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    /// The "SecureAuth" part of "SecureAuth:alice". Must not contain a colon `:`
    pub issuer: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        ProvisioningConfig {
            issuer: "SecureAuth".to_string(),
        }
    }
}

/// Account and secret read back from a provisioning URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    pub issuer: Option<String>,
    pub account_name: String,
    /// Normalized Base32, no padding
    pub secret: String,
}

impl ProvisioningConfig {
    /// Will generate a standard URL used to automatically add the user's secret to an
    /// authenticator. Usually used with qr codes
    ///
    /// Label and issuer will be URL-encoded if needed be
    /// Secret will be base 32'd without padding, as per RFC.
    ///
    /// ```rust
    /// use totp_dash::{ProvisioningConfig, UserRecord};
    ///
    /// let user = UserRecord {
    ///     id: "1".to_string(),
    ///     username: "alice".to_string(),
    ///     secret: "jbsw-y3dp ehpk-3pxp".to_string(),
    ///     is_admin: false,
    ///     created_at: 0,
    /// };
    /// let url = ProvisioningConfig::default().get_url(&user).unwrap();
    /// assert_eq!(url, "otpauth://totp/SecureAuth:alice?issuer=SecureAuth&secret=JBSWY3DPEHPK3PXP&digits=6&algorithm=SHA1");
    /// ```
    ///
    /// # Errors
    ///
    /// Will return an error in case issuer or username contain the character ':', or the
    /// user's secret isn't Base32
    pub fn get_url(&self, user: &UserRecord) -> Result<String, TotpUrlError> {
        if self.issuer.contains(':') {
            return Err(TotpUrlError::Issuer(self.issuer.clone()));
        }
        if user.username.contains(':') {
            return Err(TotpUrlError::AccountName(user.username.clone()));
        }
        let secret = Secret::Encoded(user.secret.clone());
        if secret.to_bytes().is_err() {
            return Err(TotpUrlError::Secret(user.secret.clone()));
        }
        let encoded = secret.to_encoded().to_string();

        let account_name: String = urlencoding::encode(user.username.as_str()).to_string();
        let issuer: String = urlencoding::encode(self.issuer.as_str()).to_string();
        Ok(format!(
            "otpauth://totp/{0}:{1}?issuer={0}&secret={2}&digits={3}&algorithm=SHA1",
            issuer,
            account_name,
            encoded.trim_end_matches('='),
            DIGITS,
        ))
    }
}

/// Read a provisioning URL, typically scanned from another authenticator.
///
/// Only URLs this dashboard can serve are accepted: SHA1, 6 digits, 30 second period.
pub fn parse_url<S: AsRef<str>>(url: S) -> Result<ProvisionedAccount, TotpUrlError> {
    let url = Url::parse(url.as_ref()).map_err(TotpUrlError::Url)?;
    if url.scheme() != "otpauth" {
        return Err(TotpUrlError::Scheme(url.scheme().to_string()));
    }
    match url.host() {
        Some(Host::Domain("totp")) => {}
        Some(host) => return Err(TotpUrlError::Host(host.to_string())),
        None => return Err(TotpUrlError::Host(String::new())),
    }

    let mut issuer: Option<String> = None;
    let mut secret: Option<String> = None;

    let path = url.path().trim_start_matches('/');
    let account_name = match path.split_once(':') {
        Some((path_issuer, account)) => {
            issuer = Some(
                urlencoding::decode(path_issuer)
                    .map_err(|_| TotpUrlError::IssuerDecoding(path_issuer.to_owned()))?
                    .to_string(),
            );
            account.trim_start_matches(':')
        }
        None => path,
    };
    let account_name = urlencoding::decode(account_name)
        .map_err(|_| TotpUrlError::AccountNameDecoding(account_name.to_string()))?
        .to_string();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "algorithm" => {
                if value != "SHA1" {
                    return Err(TotpUrlError::Algorithm(value.to_string()));
                }
            }
            "digits" => {
                let digits = value
                    .parse::<usize>()
                    .map_err(|_| TotpUrlError::Digits(value.to_string()))?;
                if digits != DIGITS {
                    return Err(TotpUrlError::DigitsNumber(digits));
                }
            }
            "period" => {
                let step = value
                    .parse::<u64>()
                    .map_err(|_| TotpUrlError::Step(value.to_string()))?;
                if step != PERIOD {
                    return Err(TotpUrlError::StepValue(step));
                }
            }
            "secret" => {
                let parsed = Secret::Encoded(value.to_string());
                if parsed.to_bytes().is_err() {
                    return Err(TotpUrlError::Secret(value.to_string()));
                }
                secret = Some(parsed.to_encoded().to_string().trim_end_matches('=').to_string());
            }
            "issuer" => {
                let param_issuer = value.to_string();
                if let Some(path_issuer) = &issuer {
                    if path_issuer != &param_issuer {
                        return Err(TotpUrlError::IssuerMismatch(
                            path_issuer.to_string(),
                            param_issuer,
                        ));
                    }
                }
                issuer = Some(param_issuer);
            }
            _ => {}
        }
    }

    let secret = secret.ok_or_else(|| TotpUrlError::Secret("".to_string()))?;
    Ok(ProvisionedAccount {
        issuer,
        account_name,
        secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_current_token;

    fn user(username: &str, secret: &str) -> UserRecord {
        UserRecord {
            id: "1".to_string(),
            username: username.to_string(),
            secret: secret.to_string(),
            is_admin: false,
            created_at: 0,
        }
    }

    #[test]
    fn url_encodes_label() {
        let url = ProvisioningConfig {
            issuer: "Secure Auth".to_string(),
        }
        .get_url(&user("alice@example.com", "GEZDGNBVGY3TQOJQ"))
        .unwrap();
        assert_eq!(url, "otpauth://totp/Secure%20Auth:alice%40example.com?issuer=Secure%20Auth&secret=GEZDGNBVGY3TQOJQ&digits=6&algorithm=SHA1");
    }

    #[test]
    fn url_strips_padding() {
        let url = ProvisioningConfig::default()
            .get_url(&user("bob", "mzxw6==="))
            .unwrap();
        assert!(url.contains("secret=MZXW6&"));
    }

    #[test]
    fn url_rejects_colons() {
        let config = ProvisioningConfig::default();
        assert_eq!(
            config.get_url(&user("al:ice", "GEZDGNBV")).unwrap_err(),
            TotpUrlError::AccountName("al:ice".to_string())
        );
        let config = ProvisioningConfig {
            issuer: "Secure:Auth".to_string(),
        };
        assert!(matches!(
            config.get_url(&user("alice", "GEZDGNBV")),
            Err(TotpUrlError::Issuer(_))
        ));
    }

    #[test]
    fn url_rejects_bad_secret() {
        let config = ProvisioningConfig::default();
        assert_eq!(
            config.get_url(&user("alice", "not-base32!!")).unwrap_err(),
            TotpUrlError::Secret("not-base32!!".to_string())
        );
    }

    #[test]
    fn parse_round_trip() {
        let alice = user("alice@example.com", "gezd-gnbv gy3t-qojq gezd-gnbv gy3t-qojq");
        let url = ProvisioningConfig::default().get_url(&alice).unwrap();
        let account = parse_url(url).unwrap();
        assert_eq!(account.issuer.as_deref(), Some("SecureAuth"));
        assert_eq!(account.account_name, "alice@example.com");
        assert_eq!(account.secret, "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ");
        assert_eq!(
            compute_current_token(&account.secret, 59),
            alice.token_at(59)
        );
    }

    #[test]
    fn parse_without_issuer() {
        let account = parse_url("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(account.issuer, None);
        assert_eq!(account.account_name, "alice");
    }

    #[test]
    fn parse_rejects_unsupported() {
        assert!(matches!(
            parse_url("https://totp/alice?secret=JBSWY3DPEHPK3PXP"),
            Err(TotpUrlError::Scheme(_))
        ));
        assert!(matches!(
            parse_url("otpauth://hotp/alice?secret=JBSWY3DPEHPK3PXP"),
            Err(TotpUrlError::Host(_))
        ));
        assert_eq!(
            parse_url("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&algorithm=SHA256").unwrap_err(),
            TotpUrlError::Algorithm("SHA256".to_string())
        );
        assert_eq!(
            parse_url("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&digits=8").unwrap_err(),
            TotpUrlError::DigitsNumber(8)
        );
        assert_eq!(
            parse_url("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&period=60").unwrap_err(),
            TotpUrlError::StepValue(60)
        );
        assert_eq!(
            parse_url("otpauth://totp/alice?digits=6").unwrap_err(),
            TotpUrlError::Secret("".to_string())
        );
    }

    #[test]
    fn parse_issuer_mismatch() {
        let err = parse_url("otpauth://totp/Github:alice?issuer=Gitlab&secret=JBSWY3DPEHPK3PXP")
            .unwrap_err();
        assert_eq!(
            err,
            TotpUrlError::IssuerMismatch("Github".to_string(), "Gitlab".to_string())
        );
    }
}
