//! CORS response headers.

use http::header::{self, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::Deserialize;

/// Fixed CORS headers merged into every response portico emits itself.
///
/// | Field | Header |
/// |---|---|
/// | `origin` | `Access-Control-Allow-Origin` |
/// | `headers` | `Access-Control-Allow-Headers` |
///
/// Static file responses and responses sent through a
/// [`ResponseSink`](crate::ResponseSink) do not get them.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Cors {
    pub origin: Option<String>,
    pub headers: Option<String>,
}

impl Cors {
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<String>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Validates the values once so emission never has to.
    pub(crate) fn compile(&self) -> Result<CorsHeaders, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        if let Some(origin) = &self.origin {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_str(origin)?);
        }
        if let Some(allow) = &self.headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_str(allow)?);
        }
        Ok(CorsHeaders(headers))
    }
}

/// Validated CORS headers, ready to merge.
#[derive(Clone, Debug, Default)]
pub(crate) struct CorsHeaders(HeaderMap);

impl CorsHeaders {
    /// Sets each CORS header on `headers`, overriding values already there.
    pub(crate) fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.0 {
            headers.insert(name.clone(), value.clone());
        }
    }
}
