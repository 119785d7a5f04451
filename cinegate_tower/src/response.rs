//! Responses for requests the gateway rejected

use cinegate::{AuthFailure, ErrorCode};
use http::{header, HeaderMap, HeaderValue, Response, StatusCode};

/// Builds the response for a rejected request
///
/// The status is taken verbatim from `failure`, and the body is the JSON
/// object `{"code": ..., "description": ...}`. A `www-authenticate` header
/// describes the failure to the client:
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer error="invalid_token", error_description="Token expired."
/// ```
///
/// A request that carried no credentials at all gets a bare `Bearer`
/// challenge, a `400` gets `invalid_request`, and a `403` gets
/// `insufficient_scope`.
pub fn failure_response<B: From<Vec<u8>>>(failure: &AuthFailure) -> Response<B> {
    let body = serde_json::to_vec(failure).unwrap_or_default();

    let mut resp = Response::new(B::from(body));
    *resp.status_mut() = failure.status();
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp.headers_mut()
        .insert(header::WWW_AUTHENTICATE, challenge(failure));
    resp
}

/// The value of the `Authorization` header, if one was sent
///
/// A value that is not visible ASCII is reported as empty, so it is rejected
/// as not carrying a bearer token.
pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default())
}

fn challenge(failure: &AuthFailure) -> HeaderValue {
    if failure.code() == ErrorCode::AuthorizationHeaderMissing {
        return HeaderValue::from_static("Bearer");
    }

    let error = match failure.status() {
        StatusCode::BAD_REQUEST => "invalid_request",
        StatusCode::FORBIDDEN => "insufficient_scope",
        _ => "invalid_token",
    };

    bearer_error(error, failure.description())
}

fn bearer_error(error: &str, description: &str) -> HeaderValue {
    if description.is_empty() {
        HeaderValue::try_from(format!(r#"Bearer error="{error}""#))
            .expect("error code is a valid header value")
    } else {
        HeaderValue::try_from(format!(
            r#"Bearer error="{error}", error_description="{}""#,
            description.escape_default()
        ))
        .expect("escaped description is a valid header value")
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    fn www_authenticate<B>(resp: &Response<B>) -> &str {
        resp.headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[test]
    fn unauthorized_carries_invalid_token_challenge() -> Result<()> {
        let failure = AuthFailure::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::TokenExpired,
            "Token expired.",
        );
        let resp = failure_response::<Vec<u8>>(&failure);

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            www_authenticate(&resp),
            r#"Bearer error="invalid_token", error_description="Token expired.""#
        );
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(resp.body())?,
            serde_json::json!({"code": "token_expired", "description": "Token expired."})
        );
        Ok(())
    }

    #[test]
    fn missing_header_gets_bare_challenge() {
        let failure = AuthFailure::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::AuthorizationHeaderMissing,
            "Authorization header is expected.",
        );
        let resp = failure_response::<Vec<u8>>(&failure);

        assert_eq!(www_authenticate(&resp), "Bearer");
    }

    #[test]
    fn bad_request_and_forbidden_challenges() {
        let bad_request = AuthFailure::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidClaims,
            "Permissions not included in JWT.",
        );
        let forbidden = AuthFailure::new(
            StatusCode::FORBIDDEN,
            ErrorCode::Unauthorized,
            "Permission not found.",
        );

        let resp = failure_response::<Vec<u8>>(&bad_request);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            www_authenticate(&resp),
            r#"Bearer error="invalid_request", error_description="Permissions not included in JWT.""#
        );

        let resp = failure_response::<Vec<u8>>(&forbidden);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            www_authenticate(&resp),
            r#"Bearer error="insufficient_scope", error_description="Permission not found.""#
        );
    }

    #[test]
    fn unicode_and_non_printing_description_does_not_panic() {
        let failure = AuthFailure::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidHeader,
            "\0\n\ttest™: \"Ĉu oni povas bone ŝanĝi ĉi tiu mesaĝon en respondon?\"",
        );
        let resp = failure_response::<Vec<u8>>(&failure);

        assert_eq!(
            www_authenticate(&resp),
            r#"Bearer error="invalid_token", error_description="\u{0}\n\ttest\u{2122}: \"\u{108}u oni povas bone \u{15d}an\u{11d}i \u{109}i tiu mesa\u{11d}on en respondon?\"""#
        );
    }

    #[test]
    fn empty_description_is_omitted() {
        let failure = AuthFailure::new(StatusCode::FORBIDDEN, ErrorCode::Unauthorized, "");
        let resp = failure_response::<Vec<u8>>(&failure);

        assert_eq!(www_authenticate(&resp), r#"Bearer error="insufficient_scope""#);
    }

    #[test]
    fn reads_authorization_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(authorization_header(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(authorization_header(&headers), Some("Bearer abc"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff").expect("opaque header value"),
        );
        assert_eq!(authorization_header(&headers), Some(""));
    }
}
