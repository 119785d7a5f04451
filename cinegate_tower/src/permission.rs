use std::{fmt, marker::PhantomData};

use cinegate::{permission, ClaimSet, Permission};
use http::{Request, Response, StatusCode};
use tower_http::validate_request::ValidateRequest;

use crate::response::failure_response;

/// Checks that the verified claims of a request grant a permission
///
/// The [`ClaimSet`] is expected to have already been added to the request
/// extensions by [`VerifyToken`][crate::VerifyToken]. A request without one
/// is answered with `500 Internal Server Error`, as that indicates the
/// layers were assembled incorrectly.
pub struct RequirePermission<ResBody> {
    required: Permission,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> RequirePermission<ResBody> {
    /// Constructs a check for `required`
    #[inline]
    pub fn new(required: Permission) -> Self {
        Self {
            required,
            _ty: PhantomData,
        }
    }

    /// The permission requests must be granted
    #[inline]
    pub fn required(&self) -> &Permission {
        &self.required
    }
}

impl<ResBody> Clone for RequirePermission<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new(self.required.clone())
    }
}

impl<ResBody> fmt::Debug for RequirePermission<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequirePermission")
            .field("required", &self.required)
            .finish()
    }
}

impl<ReqBody, ResBody> ValidateRequest<ReqBody> for RequirePermission<ResBody>
where
    ResBody: From<Vec<u8>>,
{
    type ResponseBody = ResBody;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let Some(claims) = request.extensions().get::<ClaimSet>() else {
            tracing::error!(
                required = %self.required,
                "no verified claims on request; is the token verification layer installed?"
            );
            let mut resp = Response::new(ResBody::from(Vec::new()));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return Err(resp);
        };

        permission::check(claims, &self.required).map_err(|failure| {
            tracing::debug!(
                code = %failure.code(),
                http.status_code = failure.status().as_u16(),
                required = %self.required,
                "request rejected"
            );
            failure_response(&failure)
        })?;

        tracing::trace!(required = %self.required, "permission granted");
        Ok(())
    }
}
