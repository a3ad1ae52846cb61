// Transport between native capture and application code
// Commands go one way as request/response calls; canonical events flow the
// other way through the event hub. The stdio bridge puts both on one pipe.

pub mod bridge;
pub mod hub;
pub mod service;
pub mod wire;

pub use hub::{EventHub, EventSubscription};
pub use service::CaptureServiceHandle;

use crate::capture::CaptureError;
use crate::exit::geometry::{ScreenSize, SharedScreenGeometry};
use crate::permissions::{PermissionManager, PermissionMap};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use wire::{Method, Request, Response};

/// Errors surfaced on the command channel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("Capture service thread disconnected")]
    ServiceDisconnected,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Method not implemented: {0}")]
    NotImplemented(String),
    #[error("Failed to encode message: {0}")]
    Encode(String),
    #[error("Failed to write output: {0}")]
    Output(String),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Capture(e) => e.code(),
            TransportError::ServiceDisconnected => "serviceDisconnected",
            TransportError::InvalidRequest(_) => "invalidRequest",
            TransportError::NotImplemented(_) => "notImplemented",
            TransportError::Encode(_) => "encodeFailed",
            TransportError::Output(_) => "outputFailed",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Capture(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            TransportError::Capture(e) => e.hint(),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ScreenSizeParams {
    width: f64,
    height: f64,
}

/// Command surface over the capture service, permissions and geometry
pub struct Transport {
    service: CaptureServiceHandle,
    permissions: Arc<dyn PermissionManager>,
    geometry: SharedScreenGeometry,
    hub: EventHub,
}

impl Transport {
    pub fn new(
        service: CaptureServiceHandle,
        permissions: Arc<dyn PermissionManager>,
        geometry: SharedScreenGeometry,
        hub: EventHub,
    ) -> Self {
        Self {
            service,
            permissions,
            geometry,
            hub,
        }
    }

    /// Subscribe to the canonical event stream
    pub fn subscribe(&self) -> EventSubscription {
        self.hub.subscribe()
    }

    pub async fn start_capture(&self) -> Result<bool, TransportError> {
        self.service.start().await?;
        Ok(true)
    }

    pub async fn stop_capture(&self) -> Result<bool, TransportError> {
        self.service.stop().await?;
        Ok(true)
    }

    pub async fn is_capturing(&self) -> Result<bool, TransportError> {
        self.service.is_capturing().await
    }

    pub fn check_permissions(&self) -> PermissionMap {
        self.permissions.check_permissions()
    }

    pub fn request_permissions(&self) -> bool {
        self.permissions.request_permissions()
    }

    /// Record the host-reported screen size. Invalid sizes make it unknown.
    pub fn update_screen_size(&self, width: f64, height: f64) -> bool {
        match ScreenSize::new(width, height) {
            Some(size) => {
                self.geometry.set(size);
                true
            }
            None => {
                crate::warn!("Ignoring invalid screen size {}x{}", width, height);
                self.geometry.clear();
                false
            }
        }
    }

    /// Dispatch one decoded request
    pub async fn handle_request(&self, request: &Request) -> Response {
        match self.dispatch(request).await {
            Ok(result) => Response::ok(request.id.clone(), result),
            Err(e) => {
                crate::warn!("{} failed: {}", request.method, e);
                Response::err(request.id.clone(), &e)
            }
        }
    }

    async fn dispatch(&self, request: &Request) -> Result<Value, TransportError> {
        let method = Method::from_name(&request.method)
            .ok_or_else(|| TransportError::NotImplemented(request.method.clone()))?;
        crate::debug!("Handling {:?}", method);

        match method {
            Method::StartCapture => Ok(json!(self.start_capture().await?)),
            Method::StopCapture => Ok(json!(self.stop_capture().await?)),
            Method::IsCapturing => Ok(json!(self.is_capturing().await?)),
            Method::CheckPermissions => Ok(json!(self.check_permissions())),
            Method::RequestPermissions => Ok(json!(self.request_permissions())),
            Method::UpdateScreenSize => {
                let params: ScreenSizeParams = request
                    .params
                    .clone()
                    .ok_or_else(|| {
                        TransportError::InvalidRequest("missing width/height".to_string())
                    })
                    .and_then(|p| {
                        serde_json::from_value(p)
                            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
                    })?;
                Ok(json!(self.update_screen_size(params.width, params.height)))
            }
        }
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
