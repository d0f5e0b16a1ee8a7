//! Request/response control protocol used by the settings UI.
//!
//! Requests are JSON objects keyed by `action`; every response has the shape
//! `{success, data?, error?}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dispatch::DispatchEngine;
use crate::store::SettingsPatch;

/// Actions understood by [`handle_message`].
pub const KNOWN_ACTIONS: &[&str] = &[
    "getSettings",
    "updateSettings",
    "checkConnection",
    "addDownloads",
    "getHistory",
    "clearHistory",
    "getDownloadQueue",
];

/// A decoded control request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlRequest {
    GetSettings,
    UpdateSettings { data: SettingsPatch },
    CheckConnection,
    AddDownloads { urls: Vec<String> },
    GetHistory,
    ClearHistory,
    GetDownloadQueue,
}

/// Reasons a request could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Unknown action")]
    UnknownAction(String),

    #[error("invalid {action} request: {reason}")]
    InvalidPayload { action: String, reason: String },
}

impl ControlRequest {
    /// Decodes a raw request, separating unknown actions from bad payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownAction`] when `action` is missing or not
    /// recognised, [`ControlError::InvalidPayload`] otherwise.
    pub fn parse(raw: &Value) -> Result<Self, ControlError> {
        let action = raw
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !KNOWN_ACTIONS.contains(&action) {
            return Err(ControlError::UnknownAction(action.to_string()));
        }
        Self::deserialize(raw).map_err(|e| ControlError::InvalidPayload {
            action: action.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// Success carrying `data`. Serialization failure becomes an error response.
    #[must_use]
    pub fn with_data<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(error) => Self::failure(error.to_string()),
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Handles one control request against the engine.
pub async fn handle_message(engine: &DispatchEngine, raw: &Value) -> ControlResponse {
    let request = match ControlRequest::parse(raw) {
        Ok(request) => request,
        Err(error) => {
            debug!(error = %error, "rejected control request");
            return ControlResponse::failure(error.to_string());
        }
    };

    match request {
        ControlRequest::GetSettings => ControlResponse::with_data(&engine.store().settings()),
        ControlRequest::UpdateSettings { data } => match engine.store().update(data).await {
            Ok(_) => ControlResponse::ok(),
            Err(error) => ControlResponse::failure(error.to_string()),
        },
        ControlRequest::CheckConnection => ControlResponse::with_data(&engine.check_connection().await),
        ControlRequest::AddDownloads { urls } => {
            ControlResponse::with_data(&engine.add_many(&urls).await)
        }
        ControlRequest::GetHistory => ControlResponse::with_data(&engine.store().history()),
        ControlRequest::ClearHistory => {
            if let Err(error) = engine.store().clear_history().await {
                warn!(error = %error, "failed to persist cleared history");
            }
            engine.emit_history_updated();
            ControlResponse::ok()
        }
        ControlRequest::GetDownloadQueue => ControlResponse::with_data(&engine.pending_snapshot()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_actions() {
        assert_eq!(
            ControlRequest::parse(&json!({"action": "getSettings"})).unwrap(),
            ControlRequest::GetSettings
        );
        assert_eq!(
            ControlRequest::parse(&json!({"action": "addDownloads", "urls": ["http://x/a.zip"]}))
                .unwrap(),
            ControlRequest::AddDownloads {
                urls: vec!["http://x/a.zip".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_update_settings_partial() {
        let request =
            ControlRequest::parse(&json!({"action": "updateSettings", "data": {"skipNext": true}}))
                .unwrap();
        let ControlRequest::UpdateSettings { data } = request else {
            panic!("wrong variant");
        };
        assert_eq!(data.skip_next, Some(true));
        assert_eq!(data.min_size_mb, None);
    }

    #[test]
    fn test_unknown_action() {
        let err = ControlRequest::parse(&json!({"action": "explode"})).unwrap_err();
        assert_eq!(err.to_string(), "Unknown action");
        let err = ControlRequest::parse(&json!({"urls": []})).unwrap_err();
        assert!(matches!(err, ControlError::UnknownAction(_)));
    }

    #[test]
    fn test_invalid_payload() {
        let err = ControlRequest::parse(&json!({"action": "addDownloads", "urls": "x"})).unwrap_err();
        assert!(matches!(err, ControlError::InvalidPayload { .. }));
    }

    #[test]
    fn test_response_shape() {
        assert_eq!(serde_json::to_value(ControlResponse::ok()).unwrap(), json!({"success": true}));
        assert_eq!(
            serde_json::to_value(ControlResponse::failure("Unknown action")).unwrap(),
            json!({"success": false, "error": "Unknown action"})
        );
    }
}
