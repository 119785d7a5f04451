//! Axum extractors that make it easy to require a permission at the top of
//! each protected handler
//!
//! # Full Example
//!
//! ```no_run
//! use axum::{
//!     http::StatusCode,
//!     routing::{delete, get},
//!     Router,
//! };
//! use cinegate::{jwt::Audience, AuthGateway, GatewayConfig};
//! use std::net::SocketAddr;
//!
//! mod permission {
//!     cinegate_axum::permission_guards! {
//!         pub permission GetMovies = "get:movies";
//!         pub permission DeleteMovies = "delete:movies";
//!     }
//! }
//!
//! async fn list_movies(guard: permission::GetMovies) -> String {
//!     format!("movies for {:?}", guard.claims().subject())
//! }
//!
//! async fn delete_movie(_: permission::DeleteMovies) -> StatusCode {
//!     StatusCode::NO_CONTENT
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::for_domain("example.auth0.com", Audience::from_static("api"));
//!     let gateway = AuthGateway::from_config(&config)?;
//!
//!     // The guards find the gateway in the router state
//!     let router = Router::new()
//!         .route("/movies", get(list_movies))
//!         .route("/movies/:id", delete(delete_movie))
//!         .with_state(gateway);
//!
//!     let listener = tokio::net::TcpListener::bind(&SocketAddr::new([0, 0, 0, 0].into(), 3000))
//!         .await?;
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! When the router is also wrapped in the token verification layer from
//! `cinegate_tower`, the guards reuse the claims that layer verified instead
//! of verifying the token a second time.

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

use std::{error::Error, fmt};

use axum_core::response::{IntoResponse, Response};
use cinegate::{AuthFailure, PermissionRef};

mod macros;

/// Defines the permission a given endpoint guard requires
pub trait EndpointPermission {
    /// The permission to be enforced when this type is used as an endpoint
    /// guard
    fn required_permission() -> &'static PermissionRef;
}

/// The request was rejected by the authorization gateway
///
/// Responds with the failure's status, a JSON body
/// `{"code": ..., "description": ...}`, and a `www-authenticate` challenge.
#[derive(Debug)]
pub struct AuthRejection(AuthFailure);

impl AuthRejection {
    /// The underlying failure
    pub fn failure(&self) -> &AuthFailure {
        &self.0
    }

    /// Unwraps the underlying failure
    pub fn into_failure(self) -> AuthFailure {
        self.0
    }
}

impl From<AuthFailure> for AuthRejection {
    #[inline]
    fn from(failure: AuthFailure) -> Self {
        Self(failure)
    }
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("request rejected by authorization gateway")
    }
}

impl Error for AuthRejection {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        cinegate_tower::failure_response(&self.0)
    }
}

#[doc(hidden)]
pub mod __private {
    pub use cinegate::{AuthGateway, ClaimSet, PermissionRef};
    use http::request::Parts;

    use crate::AuthRejection;

    pub async fn authorize(
        req: &mut Parts,
        gateway: &AuthGateway,
        required: &PermissionRef,
    ) -> Result<ClaimSet, AuthRejection> {
        if let Some(claims) = req.extensions.get::<ClaimSet>() {
            cinegate::permission::check(claims, required)?;
            return Ok(claims.clone());
        }

        let header = cinegate_tower::authorization_header(&req.headers);
        Ok(gateway.authorize(header, required).await?)
    }
}
