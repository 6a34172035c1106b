use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpcRequest {
    pub request_id: String,
    pub action: String,
    #[serde(default)]
    pub payload_json: String,
}

impl IpcRequest {
    pub fn new<P: Serialize>(action: Action, payload: &P) -> serde_json::Result<Self> {
        Ok(Self {
            request_id: Uuid::new_v4().to_string(),
            action: action.as_str().to_string(),
            payload_json: serde_json::to_string(payload)?,
        })
    }

    pub fn without_payload(action: Action) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            action: action.as_str().to_string(),
            payload_json: "{}".to_string(),
        }
    }

    pub fn action(&self) -> Action {
        Action::from_name(&self.action)
    }

    /// Decode the payload. An empty payload reads as `{}`.
    pub fn payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        let json = if self.payload_json.trim().is_empty() { "{}" } else { &self.payload_json };
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpcResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub data_json: String,
}

impl IpcResponse {
    /// Successful reply with no data.
    pub fn ok(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            error_message: String::new(),
            data_json: String::new(),
        }
    }

    /// Successful reply carrying `data`, or a failure if it cannot be encoded.
    pub fn with_data<T: Serialize>(request_id: impl Into<String>, data: &T) -> Self {
        let request_id = request_id.into();
        match serde_json::to_string(data) {
            Ok(data_json) => Self { data_json, ..Self::ok(request_id) },
            Err(e) => Self::failure(request_id, format!("Failed to encode response: {}", e)),
        }
    }

    pub fn failure(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            error_message: message.into(),
            data_json: String::new(),
        }
    }

    /// Decode the data. An empty body reads as JSON `null`.
    pub fn data<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        let json = if self.data_json.trim().is_empty() { "null" } else { &self.data_json };
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::PinRequest;

    #[test]
    fn test_request_wire_names_are_camel_case() {
        let request = IpcRequest::new(Action::VerifyPin, &PinRequest { pin: "1234".to_string() }).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("requestId").is_some());
        assert_eq!(json["action"], "VerifyPin");
        assert_eq!(json["payloadJson"], r#"{"pin":"1234"}"#);

        let payload: PinRequest = request.payload().unwrap();
        assert_eq!(payload.pin, "1234");
    }

    #[test]
    fn test_empty_payload_reads_as_object() {
        let mut request = IpcRequest::without_payload(Action::GetRecentSessions);
        request.payload_json.clear();

        let payload: crate::dto::RecentSessionsRequest = request.payload().unwrap();
        assert_eq!(payload.app_id, None);
        assert_eq!(payload.max_count, 20);
    }

    #[test]
    fn test_response_constructors() {
        let ok = IpcResponse::with_data("r1", &vec![1, 2, 3]);
        assert!(ok.success);
        assert_eq!(ok.data::<Vec<i32>>().unwrap(), vec![1, 2, 3]);

        let empty = IpcResponse::ok("r2");
        assert_eq!(empty.data::<Option<i32>>().unwrap(), None);

        let failed = IpcResponse::failure("r3", "Unknown action");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorMessage"], "Unknown action");
    }
}
