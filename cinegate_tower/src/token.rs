use std::{fmt, future::Future, marker::PhantomData, pin::Pin};

use cinegate::AuthGateway;
use http::{Request, Response};
use tower_http::auth::AsyncAuthorizeRequest;

use crate::response::{authorization_header, failure_response};

/// Authenticates the bearer token of each request
///
/// On success the verified [`ClaimSet`][cinegate::ClaimSet] is added to the
/// request extensions for downstream permission checks and handlers.
pub struct VerifyToken<ResBody> {
    gateway: AuthGateway,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> VerifyToken<ResBody> {
    #[inline]
    pub(crate) fn new(gateway: AuthGateway) -> Self {
        Self {
            gateway,
            _ty: PhantomData,
        }
    }
}

impl<ResBody> Clone for VerifyToken<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new(self.gateway.clone())
    }
}

impl<ResBody> fmt::Debug for VerifyToken<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyToken")
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl<ReqBody, ResBody> AsyncAuthorizeRequest<ReqBody> for VerifyToken<ResBody>
where
    ReqBody: Send + 'static,
    ResBody: From<Vec<u8>> + Send + 'static,
{
    type RequestBody = ReqBody;
    type ResponseBody = ResBody;
    type Future =
        Pin<Box<dyn Future<Output = Result<Request<ReqBody>, Response<ResBody>>> + Send>>;

    fn authorize(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let gateway = self.gateway.clone();

        Box::pin(async move {
            let raw = authorization_header(request.headers()).map(ToOwned::to_owned);

            match gateway.authenticate(raw.as_deref()).await {
                Ok(claims) => {
                    request.extensions_mut().insert(claims);
                    tracing::trace!("token was valid");
                    Ok(request)
                }
                Err(failure) => Err(failure_response(&failure)),
            }
        })
    }
}
