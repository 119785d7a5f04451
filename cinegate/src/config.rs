use std::time::Duration;

use serde::Deserialize;

use crate::{
    error::ConfigError,
    jwa::Algorithm,
    jwt::{Audience, Issuer},
};

const JWKS_PATH: &str = ".well-known/jwks.json";

fn default_fetch_timeout_secs() -> u64 {
    5
}

/// Settings for an [`AuthGateway`][crate::AuthGateway]
///
/// Durations are expressed in whole seconds. Either `auth_domain` or
/// `issuer` must be set; when both are, the explicit issuer wins. The key
/// set URL defaults to the issuer's `.well-known/jwks.json`.
///
/// ```
/// use std::time::Duration;
/// use cinegate::{jwt::Audience, GatewayConfig};
///
/// let config = GatewayConfig::for_domain("example.auth0.com", Audience::from_static("api"))
///     .with_leeway(Duration::from_secs(30));
///
/// assert_eq!(
///     config.jwks_url().unwrap(),
///     "https://example.auth0.com/.well-known/jwks.json",
/// );
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[must_use]
pub struct GatewayConfig {
    #[serde(default)]
    auth_domain: Option<String>,
    #[serde(default)]
    issuer: Option<Issuer>,
    audience: Audience,
    #[serde(default)]
    algorithm: Algorithm,
    #[serde(default)]
    jwks_url: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    fetch_timeout_secs: u64,
    #[serde(default)]
    leeway_secs: u64,
    #[serde(default)]
    refresh_interval_secs: Option<u64>,
    #[serde(default)]
    refresh_cooldown_secs: u64,
}

impl GatewayConfig {
    fn with_audience(audience: Audience) -> Self {
        Self {
            auth_domain: None,
            issuer: None,
            audience,
            algorithm: Algorithm::default(),
            jwks_url: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            leeway_secs: 0,
            refresh_interval_secs: None,
            refresh_cooldown_secs: 0,
        }
    }

    /// Configuration for tokens issued by the tenant at `auth_domain`
    ///
    /// The expected issuer becomes `https://<auth_domain>/`.
    pub fn for_domain(auth_domain: impl Into<String>, audience: Audience) -> Self {
        Self {
            auth_domain: Some(auth_domain.into()),
            ..Self::with_audience(audience)
        }
    }

    /// Configuration for tokens issued by `issuer`
    pub fn for_issuer(issuer: Issuer, audience: Audience) -> Self {
        Self {
            issuer: Some(issuer),
            ..Self::with_audience(audience)
        }
    }

    /// Accepts only tokens signed with `algorithm`
    pub fn with_algorithm(self, algorithm: Algorithm) -> Self {
        Self { algorithm, ..self }
    }

    /// Fetches signing keys from `jwks_url` instead of the issuer's default
    pub fn with_jwks_url(self, jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: Some(jwks_url.into()),
            ..self
        }
    }

    /// Bounds each key set fetch
    pub fn with_fetch_timeout(self, timeout: Duration) -> Self {
        Self {
            fetch_timeout_secs: timeout.as_secs(),
            ..self
        }
    }

    /// Tolerates clock skew when checking `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self {
            leeway_secs: leeway.as_secs(),
            ..self
        }
    }

    /// Refreshes the key set in the background every `interval`
    pub fn with_refresh_interval(self, interval: Duration) -> Self {
        Self {
            refresh_interval_secs: Some(interval.as_secs()),
            ..self
        }
    }

    /// Suppresses key set fetches triggered by unknown key IDs for
    /// `cooldown` after the last fetch
    ///
    /// Defaults to zero, which fetches on every miss: any caller presenting
    /// a token with a made-up key ID then causes a request to the key set
    /// endpoint. A cooldown of a few seconds bounds that traffic, at the cost
    /// of rejecting tokens signed with a newly rotated key until it elapses.
    pub fn with_refresh_cooldown(self, cooldown: Duration) -> Self {
        Self {
            refresh_cooldown_secs: cooldown.as_secs(),
            ..self
        }
    }

    /// Checks that the configuration describes a usable gateway
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.issuer()?;

        if self.audience.as_str().is_empty() {
            return Err(ConfigError::EmptyAudience);
        }

        self.jwks_url()?;

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroFetchTimeout);
        }

        if self.refresh_interval_secs == Some(0) {
            return Err(ConfigError::ZeroRefreshInterval);
        }

        Ok(())
    }

    /// The issuer tokens must name
    pub fn issuer(&self) -> Result<Issuer, ConfigError> {
        if let Some(issuer) = &self.issuer {
            return Ok(issuer.clone());
        }

        let domain = self.auth_domain.as_deref().ok_or(ConfigError::MissingIssuer)?;
        let is_bare_host = !domain.is_empty()
            && !domain.contains(|c: char| c == '/' || c == ':' || c.is_whitespace());
        if !is_bare_host {
            return Err(ConfigError::InvalidAuthDomain(domain.to_owned()));
        }

        Ok(Issuer::new(format!("https://{domain}/")))
    }

    /// The URL signing keys are fetched from
    pub fn jwks_url(&self) -> Result<String, ConfigError> {
        let url = match &self.jwks_url {
            Some(url) => url.clone(),
            None => {
                let issuer = self.issuer()?;
                let separator = if issuer.as_str().ends_with('/') { "" } else { "/" };
                format!("{issuer}{separator}{JWKS_PATH}")
            }
        };

        match reqwest::Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
            Ok(_) => Err(ConfigError::InvalidJwksUrl { url, source: None }),
            Err(error) => Err(ConfigError::InvalidJwksUrl {
                url,
                source: Some(error.into()),
            }),
        }
    }

    /// The audience tokens must include
    #[must_use]
    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    /// The only accepted signing algorithm
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The timeout applied to each key set fetch
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// The clock skew tolerated on `exp` and `nbf`
    #[must_use]
    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }

    /// The background refresh period, if background refresh is enabled
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs.map(Duration::from_secs)
    }

    /// The minimum time between fetches triggered by unknown key IDs
    #[must_use]
    pub fn refresh_cooldown(&self) -> Duration {
        Duration::from_secs(self.refresh_cooldown_secs)
    }
}
