//! Response type shared by handlers, filters and the dispatcher.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

use crate::core::error::{ErrorContext, RouterError, RouterResult};

/// Standard content types
pub mod content_type {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const APPLICATION_JSON: &str = "application/json";
}

/// Response under construction for one request
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Build a plain-text error response
    pub fn error(status: StatusCode, message: &str) -> Self {
        let mut resp = Self::default();
        resp.send_with_type(status, content_type::TEXT_PLAIN, message.to_string());
        resp
    }

    /// Send a plain-text body with a 200 status
    pub fn text(&mut self, body: impl Into<Bytes>) {
        self.send_with_type(StatusCode::OK, content_type::TEXT_PLAIN, body);
    }

    /// Send a body with an explicit status
    pub fn send(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        self.status = status;
        self.body = body.into();
    }

    /// Serialize `data` as the JSON body
    pub fn json<T: Serialize>(&mut self, data: &T) -> RouterResult<()> {
        let body = serde_json::to_vec(data).with_context("JSON serialization failed")?;
        self.send_with_type(StatusCode::OK, content_type::APPLICATION_JSON, body);
        Ok(())
    }

    /// Issue a `302 Found` redirect to `location`
    pub fn redirect(&mut self, location: &str) -> RouterResult<()> {
        let value = HeaderValue::from_str(location).map_err(|e| {
            RouterError::Internal(format!("Invalid redirect location '{location}': {e}"))
        })?;
        self.headers.insert(header::LOCATION, value);
        self.send(StatusCode::FOUND, Bytes::new());
        Ok(())
    }

    /// Redirect target, if this response is a redirect
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    fn send_with_type(&mut self, status: StatusCode, ct: &'static str, body: impl Into<Bytes>) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        self.send(status, body);
    }
}
