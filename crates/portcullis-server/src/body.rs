//! JSON request body decoding.
//!
//! Every failure becomes a client-facing [`GatewayError::Validation`] with a
//! message that says what was wrong with the body.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use portcullis_core::{GatewayError, GatewayResult};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Rejection for bodies over [`MAX_BODY_BYTES`].
pub const BODY_TOO_LARGE_MESSAGE: &str = "Request body must not be larger than 1MB";

/// Why the server gave up collecting a request body.
///
/// The server still dispatches such a request, with an empty body and this
/// value in its extensions, so it is logged and traced like any other. The
/// handler answers it with [`BodyRejection::into_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRejection {
    /// More than [`MAX_BODY_BYTES`] arrived.
    TooLarge,
    /// The connection failed mid-body.
    Unreadable,
    /// The body did not arrive within the read timeout.
    TimedOut,
}

impl BodyRejection {
    /// The client-facing error for this rejection.
    #[must_use]
    pub fn into_error(self) -> GatewayError {
        match self {
            Self::TooLarge => GatewayError::validation(BODY_TOO_LARGE_MESSAGE),
            Self::Unreadable => GatewayError::validation("failed to read request body"),
            Self::TimedOut => GatewayError::validation_with_status(
                "request body read timed out",
                StatusCode::REQUEST_TIMEOUT.as_u16(),
            ),
        }
    }
}

/// Decodes a JSON body into `T`.
///
/// A `Content-Type` header, when present, must name `application/json`.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use http::HeaderMap;
/// use portcullis_server::body::decode_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Login {
///     email: String,
/// }
///
/// let login: Login = decode_json(&HeaderMap::new(), &Bytes::from(r#"{"email":"a@b.c"}"#)).unwrap();
/// assert_eq!(login.email, "a@b.c");
///
/// let err = decode_json::<Login>(&HeaderMap::new(), &Bytes::from("{")).unwrap_err();
/// assert_eq!(portcullis_core::translate(&err).message, "Request contains badly-formed JSON");
/// ```
pub fn decode_json<T: DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> GatewayResult<T> {
    check_content_type(headers)?;

    if body.len() > MAX_BODY_BYTES {
        return Err(GatewayError::validation(BODY_TOO_LARGE_MESSAGE));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::validation("Request body must not be empty"));
    }

    serde_json::from_slice(body).map_err(|e| GatewayError::validation(describe(&e)))
}

fn check_content_type(headers: &HeaderMap) -> GatewayResult<()> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(());
    };

    let media_type = value
        .to_str()
        .ok()
        .and_then(|v| v.split(';').next())
        .map(str::trim);

    match media_type {
        Some(m) if m.eq_ignore_ascii_case("application/json") => Ok(()),
        _ => Err(GatewayError::validation_with_status(
            "Content-Type header is not application/json",
            StatusCode::UNSUPPORTED_MEDIA_TYPE.as_u16(),
        )),
    }
}

fn describe(err: &serde_json::Error) -> String {
    match err.classify() {
        Category::Syntax => format!(
            "Request contains badly-formed JSON (at line {} column {})",
            err.line(),
            err.column()
        ),
        Category::Eof | Category::Io => "Request contains badly-formed JSON".to_string(),
        Category::Data => {
            let message = err.to_string();
            match unknown_field(&message) {
                Some(field) => format!("Request body contains unknown field \"{field}\""),
                None => format!(
                    "Request contains an invalid value (at line {} column {})",
                    err.line(),
                    err.column()
                ),
            }
        }
    }
}

// serde formats these as "unknown field `name`, expected ...".
fn unknown_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("unknown field `")?;
    rest.split('`').next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use portcullis_core::translate;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Payload {
        #[serde(default)]
        name: String,
        #[serde(default)]
        count: u32,
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn decode(body: &str) -> GatewayResult<Payload> {
        decode_json(&json_headers(), &Bytes::from(body.to_string()))
    }

    fn message(result: GatewayResult<Payload>) -> String {
        translate(&result.unwrap_err()).message
    }

    #[test]
    fn test_body_rejection_statuses() {
        let too_large = translate(&BodyRejection::TooLarge.into_error());
        assert_eq!(too_large.status, StatusCode::BAD_REQUEST);
        assert_eq!(too_large.message, BODY_TOO_LARGE_MESSAGE);

        let timed_out = translate(&BodyRejection::TimedOut.into_error());
        assert_eq!(timed_out.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(timed_out.message, "request body read timed out");

        assert_eq!(
            translate(&BodyRejection::Unreadable.into_error()).status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_decodes_valid_body() {
        let payload = decode(r#"{"name": "x", "count": 3}"#).unwrap();
        assert_eq!(payload.name, "x");
        assert_eq!(payload.count, 3);
    }

    #[test]
    fn test_content_type_with_charset_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/JSON; charset=utf-8"),
        );
        let payload: Payload = decode_json(&headers, &Bytes::from_static(b"{}")).unwrap();
        assert_eq!(payload.count, 0);
    }

    #[test]
    fn test_missing_content_type_accepted() {
        let payload: Payload = decode_json(&HeaderMap::new(), &Bytes::from_static(b"{}")).unwrap();
        assert!(payload.name.is_empty());
    }

    #[test]
    fn test_wrong_content_type_is_415() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let err = decode_json::<Payload>(&headers, &Bytes::from_static(b"{}")).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { status: 415, .. }));
        assert_eq!(
            translate(&err).message,
            "Content-Type header is not application/json"
        );
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(message(decode("")), "Request body must not be empty");
        assert_eq!(message(decode("  \n")), "Request body must not be empty");
    }

    #[test]
    fn test_badly_formed_json() {
        let msg = message(decode(r#"{"name" "x"}"#));
        assert!(
            msg.starts_with("Request contains badly-formed JSON (at line 1 column "),
            "{msg}"
        );
        assert_eq!(message(decode(r#"{"name": "#)), "Request contains badly-formed JSON");
    }

    #[test]
    fn test_invalid_value() {
        let msg = message(decode(r#"{"count": "three"}"#));
        assert!(msg.starts_with("Request contains an invalid value"), "{msg}");
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            message(decode(r#"{"nmae": "x"}"#)),
            "Request body contains unknown field \"nmae\""
        );
    }

    #[test]
    fn test_body_too_large() {
        let body = format!(r#"{{"name": "{}"}}"#, "a".repeat(MAX_BODY_BYTES));
        assert_eq!(message(decode(&body)), BODY_TOO_LARGE_MESSAGE);
    }

    #[test]
    fn test_validation_status_is_400() {
        let err = decode("").unwrap_err();
        assert!(matches!(err, GatewayError::Validation { status: 400, .. }));
    }
}
