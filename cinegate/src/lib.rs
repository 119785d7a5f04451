//! Role-gated authorization for the casting agency API
//!
//! The gateway accepts the raw `Authorization` header of a request, verifies
//! the bearer token it carries against a trusted JSON Web Key Set, validates
//! the token's claims, and checks that the caller was granted the permission
//! a protected operation requires.
//!
//! ```no_run
//! use cinegate::{catalog, jwt::Audience, AuthGateway, GatewayConfig, PermissionRef};
//!
//! # async fn handle(authorization: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::for_domain("example.auth0.com", Audience::from_static("api"));
//! let gateway = AuthGateway::from_config(&config)?;
//!
//! match gateway
//!     .authorize(authorization, PermissionRef::from_str(catalog::GET_MOVIES))
//!     .await
//! {
//!     Ok(claims) => println!("welcome, {:?}", claims.subject()),
//!     Err(failure) => println!("{} {}", failure.status(), serde_json::to_string(&failure)?),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Every failure is an [`AuthFailure`] carrying the HTTP status, a
//! machine-readable [`ErrorCode`], and a human-readable description.
//! Framework integrations turn it into a response at the request boundary.
//!
//! # Feature flags
//!
//! * `rustls-tls` (default) or `default-tls` selects the TLS backend used by
//!   `reqwest` to fetch the key set.
//! * `tokio` (default) enables [`KeySetCache::spawn_refresh`].
//! * `test-util` exposes the [`testing`] fixtures to other crates.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod b64;
mod cache;
pub mod catalog;
pub mod claims;
pub mod clock;
mod config;
pub mod error;
mod gateway;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jwt;
pub mod permission;
mod verifier;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

pub use cache::KeySetCache;
pub use claims::{ClaimSet, Permission, PermissionRef, Permissions};
pub use config::GatewayConfig;
pub use error::{AuthFailure, ConfigError, ErrorCode};
pub use gateway::{extract_bearer, AuthGateway};
pub use jwk::Jwk;
pub use jwks::Jwks;
pub use verifier::TokenVerifier;
