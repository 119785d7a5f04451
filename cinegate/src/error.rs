//! Common errors
//!
//! [`AuthFailure`] is the only error that leaves the gateway. Everything else
//! in this module describes a lower-level failure in token parsing, key
//! handling, or key set discovery; the verifier folds those into an
//! [`AuthFailure`] before returning.

#![allow(missing_copy_implementations)]

use std::{borrow::Cow, error::Error as StdError, fmt};

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Machine-readable failure codes reported to clients
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No `Authorization` header was presented
    AuthorizationHeaderMissing,
    /// The header, the token, or the key it names cannot be used
    InvalidHeader,
    /// The token signature does not match the signing key
    InvalidSignature,
    /// The token is past its expiration
    TokenExpired,
    /// The token claims are not acceptable
    InvalidClaims,
    /// The caller lacks the required permission
    Unauthorized,
}

impl ErrorCode {
    /// The code as it appears on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationHeaderMissing => "authorization_header_missing",
            Self::InvalidHeader => "invalid_header",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::InvalidClaims => "invalid_claims",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) const HEADER_MISSING: &str = "Authorization header is expected.";
pub(crate) const SCHEME_NOT_BEARER: &str = "Authorization header must start with \"Bearer\".";
pub(crate) const TOKEN_NOT_FOUND: &str = "Token not found.";
pub(crate) const NOT_BEARER_TOKEN: &str = "Authorization header must be bearer token.";
pub(crate) const UNPARSEABLE_TOKEN: &str = "Unable to parse authentication token.";
pub(crate) const ALGORITHM_NOT_ACCEPTED: &str = "Token algorithm is not accepted.";
pub(crate) const KEY_ID_MISSING: &str = "Authorization malformed.";
pub(crate) const KEY_SET_UNAVAILABLE: &str = "Unable to fetch the signing key set.";
pub(crate) const KEY_NOT_FOUND: &str = "Unable to find the appropriate key.";
pub(crate) const SIGNATURE_FAILED: &str = "Signature verification failed.";
pub(crate) const TOKEN_EXPIRED: &str = "Token expired.";
pub(crate) const INCORRECT_CLAIMS: &str = "Incorrect claims. Please, check the audience and issuer.";
pub(crate) const PERMISSIONS_MISSING: &str = "Permissions not included in JWT.";
pub(crate) const PERMISSION_NOT_FOUND: &str = "Permission not found.";

/// A request could not be authenticated or authorized
///
/// Serializes to the body clients receive:
///
/// ```json
/// {"code": "token_expired", "description": "Token expired."}
/// ```
///
/// The status is carried alongside for the request boundary to apply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[error("{code} ({status}): {description}")]
#[must_use]
pub struct AuthFailure {
    #[serde(skip)]
    status: StatusCode,
    code: ErrorCode,
    description: Cow<'static, str>,
}

impl AuthFailure {
    /// Constructs a failure from its parts
    pub fn new(
        status: StatusCode,
        code: ErrorCode,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            status,
            code,
            description: description.into(),
        }
    }

    /// The HTTP status to respond with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The machine-readable failure code
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The human-readable description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn header_missing() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::AuthorizationHeaderMissing,
            HEADER_MISSING,
        )
    }

    pub(crate) fn invalid_header(description: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::InvalidHeader, description)
    }

    pub(crate) fn key_set_unavailable() -> Self {
        Self::invalid_header(KEY_SET_UNAVAILABLE)
    }

    pub(crate) fn key_not_found() -> Self {
        Self::invalid_header(KEY_NOT_FOUND)
    }

    pub(crate) fn invalid_signature() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidSignature,
            SIGNATURE_FAILED,
        )
    }

    pub(crate) fn token_expired() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::TokenExpired, TOKEN_EXPIRED)
    }

    pub(crate) fn incorrect_claims() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidClaims,
            INCORRECT_CLAIMS,
        )
    }

    pub(crate) fn permissions_missing() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidClaims,
            PERMISSIONS_MISSING,
        )
    }

    pub(crate) fn permission_not_found() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            ErrorCode::Unauthorized,
            PERMISSION_NOT_FOUND,
        )
    }
}

/// The algorithm name is not one of the supported signing algorithms
#[derive(Debug, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

#[inline]
pub(crate) fn unknown_algorithm(alg: impl Into<String>) -> UnknownAlgorithm {
    UnknownAlgorithm { alg: alg.into() }
}

/// The token cannot be split into header, payload, and signature, or one of
/// those sections cannot be decoded
#[derive(Debug, Error)]
pub enum MalformedJwt {
    /// The token does not have exactly three sections
    #[error("token does not have three sections")]
    Sections,

    /// The header section is malformed
    #[error("malformed token header")]
    Header(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// The payload section is malformed
    #[error("malformed token payload")]
    Payload(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// The signature section is malformed
    #[error("malformed token signature")]
    Signature(#[source] base64::DecodeError),
}

/// A registered claim in the token body does not have the expected type
#[derive(Debug, Error)]
#[error("claim '{name}' has an unexpected type")]
pub struct MistypedClaim {
    name: &'static str,
    #[source]
    source: serde_json::Error,
}

impl MistypedClaim {
    /// The name of the offending claim
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub(crate) fn mistyped_claim(name: &'static str, source: serde_json::Error) -> MistypedClaim {
    MistypedClaim { name, source }
}

/// The signature did not match
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("signature mismatch")]
pub struct SignatureMismatch {
    _p: (),
}

pub(crate) const fn signature_mismatch() -> SignatureMismatch {
    SignatureMismatch { _p: () }
}

/// The key was rejected
#[derive(Debug, Error)]
#[error("key rejected: {reason}")]
pub struct KeyRejected {
    reason: &'static str,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

pub(crate) fn key_rejected(reason: &'static str) -> KeyRejected {
    KeyRejected {
        reason,
        source: None,
    }
}

pub(crate) fn key_rejected_by(
    reason: &'static str,
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> KeyRejected {
    KeyRejected {
        reason,
        source: Some(source.into()),
    }
}

/// An error occurring while fetching the signing key set
#[derive(Debug, Error)]
pub enum KeySetFetchError {
    /// The HTTP client could not be constructed
    #[error("unable to construct key set client")]
    Client(#[source] reqwest::Error),

    /// The request failed or timed out
    #[error("key set request failed")]
    Request(#[source] reqwest::Error),

    /// The endpoint responded with an unexpected status
    #[error("key set endpoint responded with {0}")]
    Status(StatusCode),

    /// The response body is not a key set document
    #[error("malformed key set document")]
    Malformed(#[source] reqwest::Error),
}

/// The gateway configuration is incomplete or inconsistent
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither an auth domain nor an explicit issuer was configured
    #[error("either an auth domain or an issuer must be configured")]
    MissingIssuer,

    /// The auth domain is empty or contains a scheme or path
    #[error("auth domain '{0}' must be a bare host name")]
    InvalidAuthDomain(String),

    /// The audience is empty
    #[error("audience must not be empty")]
    EmptyAudience,

    /// The key set URL cannot be parsed or does not use HTTP(S)
    #[error("key set URL '{url}' is not a valid HTTP(S) URL")]
    InvalidJwksUrl {
        /// The offending URL
        url: String,
        /// Why the URL was rejected
        #[source]
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },

    /// The key set fetch timeout is zero
    #[error("fetch timeout must be greater than zero")]
    ZeroFetchTimeout,

    /// The refresh interval is zero
    #[error("refresh interval must be greater than zero")]
    ZeroRefreshInterval,

    /// The key set client could not be constructed
    #[error(transparent)]
    KeySet(#[from] KeySetFetchError),
}
