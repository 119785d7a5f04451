use crate::{
    claims::PermissionRef,
    config::GatewayConfig,
    error::{self, AuthFailure, ConfigError},
    jwt::JwtRef,
    permission, ClaimSet, KeySetCache, TokenVerifier,
};

/// The single entry point that decides whether a request may proceed
///
/// The gateway holds no per-request state; clone it freely into request
/// handlers.
#[derive(Clone, Debug)]
#[must_use]
pub struct AuthGateway {
    verifier: TokenVerifier,
}

impl AuthGateway {
    /// Constructs a gateway around a token verifier
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }

    /// Constructs a gateway, and the key set cache behind it, from
    /// configuration
    ///
    /// The key set is fetched lazily and is not refreshed in the background;
    /// see [`KeySetCache::spawn_refresh`].
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let keys = KeySetCache::from_url(config.jwks_url()?, config.fetch_timeout())?
            .with_refresh_cooldown(config.refresh_cooldown());

        let verifier = TokenVerifier::new(keys, config.issuer()?, config.audience().clone())
            .with_algorithm(config.algorithm())
            .with_leeway(config.leeway());

        Ok(Self::new(verifier))
    }

    /// The verifier used for every request
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Verifies the bearer token in `raw_header` without checking any
    /// permission
    ///
    /// `raw_header` is the value of the `Authorization` header, if present.
    pub async fn authenticate(&self, raw_header: Option<&str>) -> Result<ClaimSet, AuthFailure> {
        let result = match extract_bearer(raw_header) {
            Ok(token) => self.verifier.verify(token).await,
            Err(failure) => Err(failure),
        };

        match &result {
            Ok(claims) => tracing::trace!(jwt.sub = ?claims.subject(), "request authenticated"),
            Err(failure) => log_failure(failure),
        }

        result
    }

    /// Verifies the bearer token in `raw_header` and ensures it grants
    /// `required`
    ///
    /// On success the verified claims are returned unchanged.
    pub async fn authorize(
        &self,
        raw_header: Option<&str>,
        required: &PermissionRef,
    ) -> Result<ClaimSet, AuthFailure> {
        let claims = self.authenticate(raw_header).await?;

        if let Err(failure) = permission::check(&claims, required) {
            log_failure(&failure);
            return Err(failure);
        }

        tracing::trace!(%required, "request authorized");
        Ok(claims)
    }
}

fn log_failure(failure: &AuthFailure) {
    tracing::debug!(
        code = %failure.code(),
        http.status_code = failure.status().as_u16(),
        description = failure.description(),
        "request rejected"
    );
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
///
/// The scheme is case-sensitive and must be separated from the token by a
/// single space.
pub fn extract_bearer(raw_header: Option<&str>) -> Result<&JwtRef, AuthFailure> {
    let raw = raw_header.ok_or_else(AuthFailure::header_missing)?;

    let mut parts = raw.split(' ');
    if parts.next() != Some("Bearer") {
        return Err(AuthFailure::invalid_header(error::SCHEME_NOT_BEARER));
    }

    match (parts.next(), parts.next()) {
        (None | Some(""), None) => Err(AuthFailure::invalid_header(error::TOKEN_NOT_FOUND)),
        (Some(token), None) => Ok(JwtRef::from_str(token)),
        (_, Some(_)) => Err(AuthFailure::invalid_header(error::NOT_BEARER_TOKEN)),
    }
}
