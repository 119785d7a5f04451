use std::{fmt, sync::Arc, time::Duration};

use serde_json::{Map, Value};

use crate::{
    claims::ClaimSet,
    clock::{self, Clock},
    error::{self, AuthFailure},
    jwa::Algorithm,
    jwt::{Audience, Issuer, JwtRef},
    KeySetCache,
};

/// Verifies bearer tokens against a trusted key set and the expected
/// issuer and audience
///
/// Checks run in a fixed order and stop at the first failure:
///
/// 1. The token must split into three sections with a decodable header that
///    declares the expected algorithm and a key ID.
/// 2. The key ID must resolve through the [`KeySetCache`].
/// 3. The signature must match the key.
/// 4. The payload must decode to a JSON object whose registered claims have
///    the expected types, must not be expired, must not be used before
///    its `nbf` time, and must name the expected issuer and audience.
#[derive(Clone)]
#[must_use]
pub struct TokenVerifier {
    keys: KeySetCache,
    algorithm: Algorithm,
    issuer: Issuer,
    audience: Audience,
    leeway: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("keys", &self.keys)
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Constructs a verifier accepting `RS256` tokens from `issuer` for
    /// `audience`, with no clock leeway
    pub fn new(keys: KeySetCache, issuer: Issuer, audience: Audience) -> Self {
        Self {
            keys,
            algorithm: Algorithm::RS256,
            issuer,
            audience,
            leeway: Duration::ZERO,
            clock: Arc::new(clock::System),
        }
    }

    /// Accepts tokens signed with `alg` instead
    pub fn with_algorithm(self, alg: Algorithm) -> Self {
        Self {
            algorithm: alg,
            ..self
        }
    }

    /// Tolerates clock skew of up to `leeway` when checking `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Reads the current time from `clock`
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// The key set this verifier resolves keys from
    pub fn key_set(&self) -> &KeySetCache {
        &self.keys
    }

    /// The accepted signing algorithm
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Verifies `token` and returns its claims unchanged
    ///
    /// # Errors
    ///
    /// Returns the [`AuthFailure`] for the first check that does not pass.
    pub async fn verify(&self, token: &JwtRef) -> Result<ClaimSet, AuthFailure> {
        let decomposed = token.decompose().map_err(|err| {
            let error: &dyn std::error::Error = &err;
            tracing::debug!(error, "token could not be decomposed");
            AuthFailure::invalid_header(error::UNPARSEABLE_TOKEN)
        })?;

        let header = decomposed.untrusted_header();
        match header.algorithm() {
            Ok(alg) if alg == self.algorithm => {}
            _ => {
                tracing::debug!(
                    jwt.alg = header.alg_name(),
                    expected = %self.algorithm,
                    "token algorithm not accepted"
                );
                return Err(AuthFailure::invalid_header(error::ALGORITHM_NOT_ACCEPTED));
            }
        }

        let kid = header.kid().ok_or_else(|| {
            tracing::debug!("token header has no key ID");
            AuthFailure::invalid_header(error::KEY_ID_MISSING)
        })?;

        let key = self.keys.resolve(kid, self.algorithm).await?;

        let verified = decomposed.verify(&key, self.algorithm).map_err(|_| {
            tracing::debug!(jwk.kid = %key.key_id(), "token signature mismatch");
            AuthFailure::invalid_signature()
        })?;

        let body = verified.claims::<Map<String, Value>>().map_err(|err| {
            let error: &dyn std::error::Error = &err;
            tracing::debug!(error, "token payload could not be decoded");
            AuthFailure::invalid_header(error::UNPARSEABLE_TOKEN)
        })?;

        let claims = ClaimSet::from_body(body).map_err(|err| {
            let error: &dyn std::error::Error = &err;
            tracing::debug!(error, claim = err.name(), "token claim has an unexpected type");
            AuthFailure::incorrect_claims()
        })?;

        self.validate(&claims)?;

        Ok(claims)
    }

    fn validate(&self, claims: &ClaimSet) -> Result<(), AuthFailure> {
        let now = self.clock.now();
        let leeway = self.leeway.as_secs();

        let exp = claims.expiration().ok_or_else(|| {
            tracing::debug!("token has no expiration");
            AuthFailure::incorrect_claims()
        })?;

        // RFC 7519 4.1.4: not accepted on or after the expiration time.
        if now >= exp.saturating_add(leeway) {
            tracing::debug!(jwt.exp = %exp, %now, "token expired");
            return Err(AuthFailure::token_expired());
        }

        if let Some(nbf) = claims.not_before() {
            if now < nbf.saturating_sub(leeway) {
                tracing::debug!(jwt.nbf = %nbf, %now, "token not yet valid");
                return Err(AuthFailure::incorrect_claims());
            }
        }

        if claims.issuer() != Some(&*self.issuer) {
            tracing::debug!(jwt.iss = ?claims.issuer(), expected = %self.issuer, "issuer mismatch");
            return Err(AuthFailure::incorrect_claims());
        }

        if !claims.audiences().contains(&self.audience) {
            tracing::debug!(expected = %self.audience, "audience mismatch");
            return Err(AuthFailure::incorrect_claims());
        }

        Ok(())
    }
}
