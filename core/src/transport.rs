//! Single-exchange transport.
//!
//! # Design
//! `Transport` keeps the build/parse split of a host-does-IO client: request
//! normalization (`build_request`) and outcome classification (`classify`)
//! are pure functions over plain data, and the only I/O happens inside the
//! `HttpExecutor` the transport was constructed with. A transport never
//! retries; one `send` is one exchange.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpBody, HttpRequest, HttpResponse, RequestBody, RequestSpec};

const CONTENT_TYPE: &str = "content-type";
const APPLICATION_JSON: &str = "application/json";

/// Boxed failure of an executor that never produced a response.
pub type ExecuteError = Box<dyn std::error::Error + Send + Sync>;

/// Performs one HTTP round-trip.
///
/// Implementations must return every response that arrived, whatever its
/// status; an `Err` means no response was received.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExecuteError>;
}

/// Executes `RequestSpec`s against one base origin.
#[derive(Clone)]
pub struct Transport {
    base_url: String,
    executor: Arc<dyn HttpExecutor>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(base_url: &str, executor: Arc<dyn HttpExecutor>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            executor,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Normalize a `RequestSpec` into the request that goes on the wire.
    ///
    /// Session cookies are the executor's concern and go on every request.
    /// Non-multipart requests get a JSON
    /// content type ahead of caller headers, so an explicit caller header
    /// still wins. Multipart requests never carry a content type: the
    /// executor must supply it together with the boundary.
    pub fn build_request(&self, spec: &RequestSpec) -> Result<HttpRequest, ApiError> {
        let multipart = spec.is_multipart();
        let mut headers: Vec<(String, String)> = Vec::new();
        if !multipart {
            headers.push((CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string()));
        }
        for (name, value) in &spec.headers {
            if multipart && name.eq_ignore_ascii_case(CONTENT_TYPE) {
                debug!(path = %spec.path, "dropping caller content-type on multipart request");
                continue;
            }
            set_header(&mut headers, name, value);
        }

        let body = match &spec.body {
            None => None,
            Some(RequestBody::Json(value)) => Some(HttpBody::Text(
                serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))?,
            )),
            Some(RequestBody::Raw(text)) => Some(HttpBody::Text(text.clone())),
            Some(RequestBody::Multipart(form)) => Some(HttpBody::Multipart(form.clone())),
        };

        Ok(HttpRequest {
            method: spec.method,
            url: format!("{}{}", self.base_url, spec.path),
            headers,
            body,
        })
    }

    /// Perform one exchange and classify its outcome.
    pub async fn send(&self, spec: &RequestSpec) -> Result<Option<Value>, ApiError> {
        let request = self.build_request(spec)?;
        let method = request.method;
        let url = request.url.clone();

        let response = match self.executor.execute(request).await {
            Ok(response) => response,
            Err(source) => {
                warn!(
                    method = method.as_str(),
                    %url,
                    error = %source,
                    "request failed before a response"
                );
                return Err(ApiError::Network {
                    message: format!("network error: {source}"),
                    source: Some(source),
                });
            }
        };

        debug!(method = method.as_str(), %url, status = response.status, "exchange complete");
        classify(response)
    }
}

/// Turn a response into a parsed value, `None` for bodiless success, or an
/// `ApiError::Status` for any non-2xx status.
pub fn classify(response: HttpResponse) -> Result<Option<Value>, ApiError> {
    let status = response.status;

    if !response.is_success() {
        let payload = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| Value::Object(Map::new()));
        let message = error_message(&payload, status);
        return Err(ApiError::Status {
            status,
            message,
            payload,
        });
    }

    let is_json = response
        .header(CONTENT_TYPE)
        .is_some_and(|ct| ct.contains(APPLICATION_JSON));
    if !is_json || response.body.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| ApiError::Decode(format!("HTTP {status}: {e}")))
}

/// `detail`, then `message`, then a generic status line.
fn error_message(payload: &Value, status: u16) -> String {
    ["detail", "message"]
        .iter()
        .find_map(|key| payload.get(key).and_then(field_text))
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Falsy values (null, false, 0, "") do not count as a message.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(slot) => *slot = (name.to_string(), value.to_string()),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FormData, HttpMethod};
    use crate::testing::{json_response, text_response, ScriptedExecutor};
    use serde_json::json;

    fn transport() -> Transport {
        Transport::new("http://127.0.0.1:8000/", Arc::new(ScriptedExecutor::new()))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    // --- build ---

    #[test]
    fn json_body_is_serialized_with_json_content_type() {
        let spec = RequestSpec::post("/users/users/login/")
            .with_body(json!({"email": "a@x.com", "password": "pw"}));
        let req = transport().build_request(&spec).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://127.0.0.1:8000/users/users/login/");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let Some(HttpBody::Text(body)) = req.body else {
            panic!("expected text body");
        };
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["email"], "a@x.com");
    }

    #[test]
    fn raw_body_is_sent_untouched() {
        let spec = RequestSpec::post("/transaction/sales/").with_body(RequestBody::Raw(
            r#"{"already":"encoded"}"#.to_string(),
        ));
        let req = transport().build_request(&spec).unwrap();
        assert_eq!(
            req.body,
            Some(HttpBody::Text(r#"{"already":"encoded"}"#.to_string()))
        );
    }

    #[test]
    fn multipart_never_gets_a_content_type() {
        let form = FormData::new()
            .text("name", "Rice")
            .file("image", "rice.png", Some("image/png"), vec![0x89, 0x50]);
        let spec = RequestSpec::post("/items/items/")
            .with_body(form.clone())
            .with_header("Content-Type", "application/json");
        let req = transport().build_request(&spec).unwrap();
        assert!(req.header("content-type").is_none());
        assert_eq!(req.body, Some(HttpBody::Multipart(form)));
    }

    #[test]
    fn caller_header_overrides_default_content_type() {
        let spec = RequestSpec::post("/x/")
            .with_body(RequestBody::Raw("a=b".to_string()))
            .with_header("Content-Type", "application/x-www-form-urlencoded");
        let req = transport().build_request(&spec).unwrap();
        assert_eq!(req.headers.len(), 1);
        assert_eq!(
            req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    // --- classify ---

    #[test]
    fn error_message_prefers_detail() {
        let err = classify(response(400, r#"{"detail":"Invalid credentials","message":"m"}"#))
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.message(), "Invalid credentials");
        assert_eq!(err.payload().unwrap()["message"], "m");
    }

    #[test]
    fn error_message_falls_back_to_message_field() {
        let err = classify(response(422, r#"{"message":"name is required"}"#)).unwrap_err();
        assert_eq!(err.message(), "name is required");
    }

    #[test]
    fn non_json_error_body_yields_generic_message_and_empty_payload() {
        let err = classify(response(502, "<html>Bad Gateway</html>")).unwrap_err();
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.message(), "HTTP 502");
        assert_eq!(err.payload(), Some(&json!({})));
    }

    #[test]
    fn empty_error_body_still_has_a_message() {
        let err = classify(response(404, "")).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "HTTP 404");
    }

    #[test]
    fn non_string_detail_is_rendered() {
        let err = classify(response(400, r#"{"detail":["bad","worse"]}"#)).unwrap_err();
        assert_eq!(err.message(), r#"["bad","worse"]"#);
    }

    #[test]
    fn falsy_detail_falls_through() {
        let err = classify(response(400, r#"{"detail":0,"message":"Out of stock"}"#)).unwrap_err();
        assert_eq!(err.message(), "Out of stock");
        let err = classify(response(409, r#"{"detail":"","message":false}"#)).unwrap_err();
        assert_eq!(err.message(), "HTTP 409");
    }

    #[test]
    fn non_json_success_is_null() {
        assert_eq!(classify(text_response(204, "")).unwrap(), None);
        assert_eq!(classify(response(200, r#"{"a":1}"#)).unwrap(), None);
    }

    #[test]
    fn json_success_is_parsed() {
        let value = classify(json_response(200, json!({"id": 1}))).unwrap();
        assert_eq!(value, Some(json!({"id": 1})));
    }

    #[test]
    fn malformed_json_success_is_a_decode_error() {
        let mut resp = json_response(200, json!(null));
        resp.body = "{not json".to_string();
        let err = classify(resp).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    // --- send ---

    #[tokio::test]
    async fn executor_failure_becomes_network_error() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push_network_error("connection refused");
        let transport = Transport::new("http://127.0.0.1:8000", executor.clone());

        let err = transport.send(&RequestSpec::get("/users/users/me/")).await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        assert_eq!(err.status_code(), None);
        assert!(err.message().contains("connection refused"));
        assert_eq!(executor.requests().len(), 1);
    }

    #[tokio::test]
    async fn send_performs_exactly_one_exchange() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(json_response(500, json!({"detail": "boom"})));
        let transport = Transport::new("http://127.0.0.1:8000", executor.clone());

        let err = transport.send(&RequestSpec::get("/transaction/cash/")).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(executor.urls(), vec!["http://127.0.0.1:8000/transaction/cash/"]);
    }
}
