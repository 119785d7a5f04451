use std::{fmt, marker::PhantomData};

use cinegate::{AuthGateway, Permission};
use tower_http::{
    auth::{AsyncRequireAuthorization, AsyncRequireAuthorizationLayer},
    validate_request::ValidateRequestHeaderLayer,
};
use tower_layer::Layer;

use crate::{RequirePermission, VerifyToken};

/// Builder for layers that authenticate bearer tokens and require
/// permissions
///
/// `ResBody` is the response body type of the wrapped services. The
/// authorizer is itself a [`Layer`] equivalent to
/// [`authentication_layer`][Self::authentication_layer].
pub struct Authorizer<ResBody> {
    gateway: AuthGateway,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> Authorizer<ResBody> {
    /// Constructs an authorizer backed by `gateway`
    #[inline]
    pub fn new(gateway: AuthGateway) -> Self {
        Self {
            gateway,
            _ty: PhantomData,
        }
    }

    /// The gateway tokens are verified by
    #[inline]
    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    /// Layer that verifies the bearer token of every request
    ///
    /// The verified [`ClaimSet`][cinegate::ClaimSet] is made available
    /// through [`Request::extensions`][http::Request::extensions].
    pub fn authentication_layer(&self) -> AsyncRequireAuthorizationLayer<VerifyToken<ResBody>> {
        AsyncRequireAuthorizationLayer::new(VerifyToken::new(self.gateway.clone()))
    }

    /// Layer that rejects requests whose verified claims do not grant
    /// `required`
    ///
    /// Must be placed inside the [`authentication_layer`][Self::authentication_layer].
    pub fn permission_layer(
        &self,
        required: impl Into<Permission>,
    ) -> ValidateRequestHeaderLayer<RequirePermission<ResBody>> {
        ValidateRequestHeaderLayer::custom(RequirePermission::new(required.into()))
    }
}

impl<ResBody> Clone for Authorizer<ResBody> {
    fn clone(&self) -> Self {
        Self::new(self.gateway.clone())
    }
}

impl<ResBody> fmt::Debug for Authorizer<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl<S, ResBody> Layer<S> for Authorizer<ResBody> {
    type Service = AsyncRequireAuthorization<S, VerifyToken<ResBody>>;

    fn layer(&self, inner: S) -> Self::Service {
        AsyncRequireAuthorization::new(inner, VerifyToken::new(self.gateway.clone()))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::Extension,
        http::{header, Request, StatusCode},
        routing::{delete, get},
        Router,
    };
    use cinegate::{catalog, testing, ClaimSet};
    use color_eyre::Result;
    use tower::ServiceExt;

    use super::*;

    async fn list_movies(Extension(claims): Extension<ClaimSet>) -> String {
        claims
            .subject()
            .map(|s| s.as_str().to_owned())
            .unwrap_or_default()
    }

    async fn delete_movie() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    fn app() -> Result<Router> {
        let authorizer = Authorizer::<Body>::new(testing::gateway()?);

        Ok(Router::new()
            .route(
                "/movies",
                get(list_movies).layer(authorizer.permission_layer(catalog::GET_MOVIES)),
            )
            .route(
                "/movies/1",
                delete(delete_movie).layer(authorizer.permission_layer(catalog::DELETE_MOVIES)),
            )
            .layer(authorizer))
    }

    fn request(method: &str, uri: &str, authorization: Option<String>) -> Result<Request<Body>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        Ok(builder.body(Body::empty())?)
    }

    fn bearer(permissions: &[&str]) -> Result<Option<String>> {
        Ok(Some(format!("Bearer {:#}", testing::token(permissions)?)))
    }

    async fn json_body(resp: axum::response::Response) -> Result<serde_json::Value> {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn granted_request_reaches_handler() -> Result<()> {
        let resp = app()?
            .oneshot(request("GET", "/movies", bearer(&["get:movies"])?)?)
            .await?;

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await?;
        assert_eq!(&bytes[..], testing::SUBJECT.as_bytes());
        Ok(())
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() -> Result<()> {
        let resp = app()?.oneshot(request("GET", "/movies", None)?).await?;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).map(|v| v.as_bytes()),
            Some(&b"Bearer"[..])
        );
        let body = json_body(resp).await?;
        assert_eq!(body["code"], "authorization_header_missing");
        Ok(())
    }

    #[tokio::test]
    async fn insufficient_permission_is_forbidden() -> Result<()> {
        let resp = app()?
            .oneshot(request("DELETE", "/movies/1", bearer(&["get:movies"])?)?)
            .await?;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = json_body(resp).await?;
        assert_eq!(body["code"], "unauthorized");
        assert_eq!(body["description"], "Permission not found.");
        Ok(())
    }

    #[tokio::test]
    async fn executive_producer_may_delete() -> Result<()> {
        let permissions = catalog::Role::ExecutiveProducer.permissions();
        let resp = app()?
            .oneshot(request("DELETE", "/movies/1", bearer(permissions)?)?)
            .await?;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_token_is_unauthorized() -> Result<()> {
        let resp = app()?
            .oneshot(request("GET", "/movies", Some("Bearer not-a-token".to_owned()))?)
            .await?;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(resp).await?;
        assert_eq!(body["code"], "invalid_header");
        Ok(())
    }
}
