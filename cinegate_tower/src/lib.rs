//! Tower middleware for gating requests with a [`cinegate`] authorization
//! gateway, usable with `tower_http` and `axum`
//!
//! Token verification runs once per request at the router level; each route
//! then declares the permission it requires.
//!
//! ```no_run
//! use axum::{
//!     body::Body,
//!     routing::{delete, get},
//!     Router,
//! };
//! use cinegate::{catalog, jwt::Audience, AuthGateway, GatewayConfig};
//! use cinegate_tower::Authorizer;
//!
//! # async fn list_movies() {}
//! # async fn delete_movie() {}
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::for_domain("example.auth0.com", Audience::from_static("api"));
//! let authorizer = Authorizer::<Body>::new(AuthGateway::from_config(&config)?);
//!
//! let app: Router = Router::new()
//!     .route(
//!         "/movies",
//!         get(list_movies).layer(authorizer.permission_layer(catalog::GET_MOVIES)),
//!     )
//!     .route(
//!         "/movies/:id",
//!         delete(delete_movie).layer(authorizer.permission_layer(catalog::DELETE_MOVIES)),
//!     )
//!     .layer(authorizer.authentication_layer());
//! # Ok(())
//! # }
//! ```
//!
//! Rejected requests are answered with the failure's status, a JSON body of
//! the form `{"code": ..., "description": ...}`, and a `www-authenticate`
//! challenge. See [`failure_response`].

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

mod authorizer;
mod permission;
mod response;
mod token;

pub use authorizer::Authorizer;
pub use permission::RequirePermission;
pub use response::{authorization_header, failure_response};
pub use token::VerifyToken;
