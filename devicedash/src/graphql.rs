//! GraphQL documents and the request/response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// `extensions.code` the API uses for a missing or rejected session.
pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";

const DEVICE_FIELDS: &str = "fragment DeviceFields on Device {
  id
  name
  type
  status
  createdAt
  lastSeen
  metadata { key value }
}";

const USER_FIELDS: &str = "fragment UserFields on User {
  id
  email
  name
  role
  createdAt
  lastLogin
  isActive
}";

/// A named operation: the name doubles as the GraphQL `operationName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    /// Top-level response field holding the result.
    pub field: &'static str,
    body: &'static str,
    fragment: &'static str,
}

impl Operation {
    pub fn document(&self) -> String {
        format!("{}\n{}", self.body, self.fragment)
    }
}

pub const GET_ME: Operation = Operation {
    name: "GetMe",
    field: "me",
    body: "query GetMe { me { ...UserFields } }",
    fragment: USER_FIELDS,
};

pub const GET_DEVICE: Operation = Operation {
    name: "GetDevice",
    field: "device",
    body: "query GetDevice($id: ID!) { device(id: $id) { ...DeviceFields } }",
    fragment: DEVICE_FIELDS,
};

pub const GET_DEVICES: Operation = Operation {
    name: "GetDevices",
    field: "devices",
    body: "query GetDevices($page: Int, $pageSize: Int, $type: String, $status: DeviceStatus) {
  devices(page: $page, pageSize: $pageSize, type: $type, status: $status) {
    devices { ...DeviceFields }
    total
    page
    pageSize
  }
}",
    fragment: DEVICE_FIELDS,
};

pub const GET_STATS: Operation = Operation {
    name: "GetStats",
    field: "stats",
    body: "query GetStats { stats { totalDevices onlineDevices offlineDevices errorDevices } }",
    fragment: "",
};

pub const LOGIN: Operation = Operation {
    name: "Login",
    field: "login",
    body: "mutation Login($input: LoginInput!) { login(input: $input) { token user { ...UserFields } } }",
    fragment: USER_FIELDS,
};

pub const REGISTER: Operation = Operation {
    name: "Register",
    field: "register",
    body: "mutation Register($input: RegisterInput!) { register(input: $input) { token user { ...UserFields } } }",
    fragment: USER_FIELDS,
};

pub const CREATE_DEVICE: Operation = Operation {
    name: "CreateDevice",
    field: "createDevice",
    body: "mutation CreateDevice($input: CreateDeviceInput!) { createDevice(input: $input) { ...DeviceFields } }",
    fragment: DEVICE_FIELDS,
};

pub const UPDATE_DEVICE: Operation = Operation {
    name: "UpdateDevice",
    field: "updateDevice",
    body: "mutation UpdateDevice($input: UpdateDeviceInput!) { updateDevice(input: $input) { ...DeviceFields } }",
    fragment: DEVICE_FIELDS,
};

pub const DELETE_DEVICE: Operation = Operation {
    name: "DeleteDevice",
    field: "deleteDevice",
    body: "mutation DeleteDevice($id: ID!) { deleteDevice(id: $id) { success message } }",
    fragment: "",
};

pub const DEVICE_UPDATED: Operation = Operation {
    name: "DeviceUpdated",
    field: "deviceUpdated",
    body: "subscription DeviceUpdated { deviceUpdated { ...DeviceFields } }",
    fragment: DEVICE_FIELDS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    pub query: String,
    pub operation_name: String,
    #[serde(default)]
    pub variables: Value,
}

impl GraphqlRequest {
    pub fn new(op: &Operation, variables: Value) -> Self {
        Self {
            query: op.document(),
            operation_name: op.name.to_string(),
            variables,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ErrorExtensions>,
}

impl GraphqlError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    /// Classify the `errors` array. An unauthenticated code anywhere wins over
    /// other errors; otherwise the first error is surfaced.
    pub fn error(&self) -> Option<ApiError> {
        if let Some(e) = self.errors.iter().find(|e| e.code() == Some(UNAUTHENTICATED)) {
            return Some(ApiError::Unauthenticated(e.message.clone()));
        }
        self.errors.first().map(|e| ApiError::Upstream {
            message: e.message.clone(),
            code: e.code().map(str::to_string),
        })
    }

    /// Take the operation's top-level field out of `data`. A missing field or
    /// `null` comes back as `Value::Null`.
    pub fn take_field(&mut self, field: &str) -> Value {
        self.data
            .as_mut()
            .and_then(|d| d.get_mut(field))
            .map(Value::take)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_operation_name_and_fragment() {
        let req = GraphqlRequest::new(&GET_DEVICE, json!({"id": "x"}));
        assert_eq!(req.operation_name, "GetDevice");
        assert!(req.query.contains("fragment DeviceFields"));
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["operationName"], "GetDevice");
        assert_eq!(wire["variables"]["id"], "x");
    }

    #[test]
    fn unauthenticated_code_is_classified() {
        let resp: GraphqlResponse = serde_json::from_value(json!({
            "data": null,
            "errors": [
                {"message": "boom"},
                {"message": "authentication required", "extensions": {"code": "UNAUTHENTICATED"}}
            ]
        }))
        .unwrap();
        assert_eq!(
            resp.error(),
            Some(ApiError::Unauthenticated("authentication required".into()))
        );
    }

    #[test]
    fn other_errors_pass_through() {
        let resp: GraphqlResponse = serde_json::from_value(json!({
            "errors": [{"message": "failed to get device", "extensions": {"code": "INTERNAL"}}]
        }))
        .unwrap();
        assert_eq!(
            resp.error(),
            Some(ApiError::Upstream {
                message: "failed to get device".into(),
                code: Some("INTERNAL".into())
            })
        );
    }

    #[test]
    fn missing_field_reads_as_null() {
        let mut resp = GraphqlResponse {
            data: Some(json!({"device": null})),
            errors: vec![],
        };
        assert!(resp.error().is_none());
        assert_eq!(resp.take_field("device"), Value::Null);
        assert_eq!(resp.take_field("other"), Value::Null);
    }
}
