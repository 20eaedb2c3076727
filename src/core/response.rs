// src/core/response.rs

//! Small helpers for building HTTP responses from bytes on hand.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::SystemTime;

/// Formats a timestamp for the `Last-Modified` header (RFC 7231 fixdate).
pub fn http_date(t: SystemTime) -> String {
    DateTime::<Utc>::from(t)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// A `200 OK` response carrying a fully materialized body.
pub fn file_response(content_type: &'static str, data: Bytes, mod_time: SystemTime) -> Response {
    let mut resp = Response::new(Body::from(data));
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&http_date(mod_time)) {
        resp.headers_mut().insert(header::LAST_MODIFIED, value);
    }
    resp
}

/// A relayed response: an upstream or mirror status with its body, keeping
/// only the content type of the original headers. A content type that is not
/// a valid header value is dropped rather than poisoning the response.
pub fn relay_response(status: StatusCode, content_type: Option<&str>, data: Bytes) -> Response {
    let mut resp = Response::new(Body::from(data));
    *resp.status_mut() = status;
    if let Some(ctype) = content_type {
        if let Ok(value) = HeaderValue::from_str(ctype) {
            resp.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }
    resp
}
