// JSON wire codec
// Newline-delimited messages. Requests are decoded into typed methods right
// at the boundary; nothing past this module sees a loosely typed map.

use crate::events::{CanonicalEvent, ExitProgress, ExitRequest};
use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound request line: `{"id", "method", "params"?}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    /// Echoed back unchanged; number or string
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Command channel methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    StartCapture,
    StopCapture,
    IsCapturing,
    CheckPermissions,
    RequestPermissions,
    UpdateScreenSize,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "startCapture" => Some(Method::StartCapture),
            "stopCapture" => Some(Method::StopCapture),
            "isCapturing" => Some(Method::IsCapturing),
            "checkPermissions" => Some(Method::CheckPermissions),
            "requestPermissions" => Some(Method::RequestPermissions),
            "updateScreenSize" => Some(Method::UpdateScreenSize),
            _ => None,
        }
    }
}

/// Error body of a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub retryable: bool,
}

impl From<&TransportError> for WireError {
    fn from(err: &TransportError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            hint: err.hint().map(str::to_string),
            retryable: err.is_retryable(),
        }
    }
}

/// Outbound response line: `{"id", "result"}` or `{"id", "error"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, error: &TransportError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Unsolicited outbound line, keyed by event name
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Notification<'a> {
    Event(&'a CanonicalEvent),
    ExitProgress(&'a ExitProgress),
    ExitRequested(&'a ExitRequest),
}

pub fn decode_request(line: &str) -> Result<Request, TransportError> {
    serde_json::from_str(line).map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

/// Serialize one message as a single line, newline included
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, TransportError> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| TransportError::Encode(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;
