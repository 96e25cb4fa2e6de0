//! Request pipeline
//!
//! resolve connection -> build body -> interpose -> dispatch -> classify.
//! A resolution failure aborts before the transport is touched, and a
//! non-success status is terminal for the call.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use dataapi_core::config::Credentials;
use dataapi_core::models::{Action, Connection, ConnectionDefaults, Overrides, RequestEnvelope};
use dataapi_core::resolver;

use crate::transport::{Transport, TransportRequest, TransportResponse};
use crate::{ClientError, RemoteError, Result};

/// Request rewriting hook, registered once at construction
pub type Interpose = Arc<dyn Fn(RequestEnvelope) -> RequestEnvelope + Send + Sync>;

/// Transports that report no status are treated as a server failure
const FALLBACK_STATUS: u16 = 500;

/// Error body after content-type based decoding
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Json(Value),
    Text(String),
}

#[derive(Clone)]
pub(crate) struct Pipeline {
    pub(crate) credentials: Credentials,
    pub(crate) defaults: ConnectionDefaults,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) interpose: Option<Interpose>,
    pub(crate) sniff_plaintext_errors: bool,
}

impl Pipeline {
    pub(crate) async fn execute<P: Serialize + ?Sized>(
        &self,
        action: Action,
        params: &P,
        overrides: Option<&Overrides>,
    ) -> Result<Value> {
        let connection = resolver::resolve(&self.defaults, overrides)?;
        let body = build_body(params, &connection)?;

        let envelope = RequestEnvelope { action, body };
        let body = match &self.interpose {
            Some(interpose) => interpose(envelope).body,
            None => envelope.body,
        };

        let request = build_request(&self.credentials, action, &body)?;
        tracing::debug!(%action, url = %request.url, "Dispatching Data API request");

        let response = self
            .transport
            .post(request)
            .await
            .map_err(ClientError::Transport)?;

        classify(action, &response, self.sniff_plaintext_errors)
    }
}

/// Shallow-merge the verb parameters with the resolved connection.
/// Connection fields are written last.
pub fn build_body<P: Serialize + ?Sized>(params: &P, connection: &Connection) -> Result<Value> {
    let mut body = match serde_json::to_value(params)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(ClientError::Serialization(serde::ser::Error::custom(format!(
                "request parameters must serialize to an object, got {other}"
            ))))
        }
    };
    connection.merge_into(&mut body);
    Ok(Value::Object(body))
}

pub fn build_request(
    credentials: &Credentials,
    action: Action,
    body: &Value,
) -> Result<TransportRequest> {
    Ok(TransportRequest {
        url: format!("{}/action/{}", credentials.api_url, action),
        headers: vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("access-control-request-headers".to_string(), "*".to_string()),
            ("api-key".to_string(), credentials.api_key.clone()),
        ],
        body: serde_json::to_string(body)?,
    })
}

/// Turn a gateway response into the success payload or a normalized error
pub fn classify(action: Action, response: &TransportResponse, sniff: bool) -> Result<Value> {
    let status = match response.status {
        0 => FALLBACK_STATUS,
        status => status,
    };

    if status == 200 || status == 201 {
        tracing::debug!(%action, status, "Data API request succeeded");
        return Ok(response.json()?);
    }

    let err = normalize_error(decode_error_body(response), status, sniff);
    tracing::warn!(
        %action,
        status,
        code = err.code().unwrap_or_default(),
        "Data API request failed"
    );
    Err(err)
}

/// Decode by content-type. A JSON-labelled body that does not parse is kept as text.
pub fn decode_error_body(response: &TransportResponse) -> DecodedBody {
    let is_json = response
        .header("content-type")
        .is_some_and(|ct| ct.contains("application/json"));

    if is_json {
        if let Ok(value) = response.json::<Value>() {
            return DecodedBody::Json(value);
        }
    }
    DecodedBody::Text(response.text())
}

/// Brace heuristic for JSON served as plaintext. A plaintext message that
/// happens to contain `{` is still handled: the parse fails and it stays text.
pub fn looks_like_json(text: &str) -> bool {
    text.contains('{')
}

pub fn normalize_error(decoded: DecodedBody, status: u16, sniff: bool) -> ClientError {
    let text = match decoded {
        DecodedBody::Json(Value::Object(map)) => return service_error(&map, status),
        DecodedBody::Json(Value::String(text)) | DecodedBody::Text(text) => text,
        DecodedBody::Json(other) => return database_error(other.to_string(), status),
    };

    if sniff && looks_like_json(&text) {
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => return service_error(&map, status),
            Ok(Value::String(inner)) => return database_error(inner, status),
            Ok(_) | Err(_) => {}
        }
    }
    database_error(text, status)
}

fn service_error(map: &Map<String, Value>, status: u16) -> ClientError {
    let message = match map.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => Value::Object(map.clone()).to_string(),
    };
    let field = |name: &str| map.get(name).and_then(Value::as_str).map(str::to_string);

    ClientError::Service(RemoteError {
        message,
        code: field("error_code"),
        link: field("link"),
        status,
    })
}

fn database_error(message: String, status: u16) -> ClientError {
    ClientError::Database(RemoteError {
        message,
        code: None,
        link: None,
        status,
    })
}
