//! In-memory `Transport` for unit tests: answers the client's named operations
//! from a small device list and records every request it sees.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::graphql::{ErrorExtensions, GraphqlError, GraphqlRequest, GraphqlResponse, UNAUTHENTICATED};
use crate::transport::Transport;
use crate::types::{
    CreateDeviceInput, Device, DeviceFilter, DeviceStatus, LoginInput, MetadataEntry, Stats,
    UpdateDeviceInput, User,
};

pub(crate) struct FakeTransport {
    devices: Mutex<Vec<Device>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
    fail: Mutex<Option<ApiError>>,
    next_id: AtomicU32,
}

impl FakeTransport {
    pub const TOKEN: &'static str = "test-token";
    pub const EMAIL: &'static str = "ops@example.com";
    pub const PASSWORD: &'static str = "hunter22";

    pub fn seeded() -> Self {
        let dev = |id: &str, name: &str, kind: &str, status, md: &[(&str, &str)]| Device {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            status,
            created_at: 1_700_000_000,
            last_seen: 1_700_000_500,
            metadata: md.iter().map(|(k, v)| MetadataEntry::new(*k, *v)).collect(),
        };
        Self {
            devices: Mutex::new(vec![
                dev("dev-1", "Edge Gateway", "gateway", DeviceStatus::Online, &[("cpu_percent", "12.5")]),
                dev("dev-2", "Door Sensor", "sensor", DeviceStatus::Offline, &[("battery_level", "81")]),
                dev("dev-3", "Thermostat", "thermostat", DeviceStatus::Error, &[]),
            ]),
            requests: Mutex::new(Vec::new()),
            fail: Mutex::new(None),
            next_id: AtomicU32::new(4),
        }
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn fail_next(&self, err: ApiError) {
        *self.fail.lock().unwrap() = Some(err);
    }

    fn user() -> User {
        User {
            id: "user-1".into(),
            email: Self::EMAIL.into(),
            name: "Ops".into(),
            role: "admin".into(),
            created_at: 1_700_000_000,
            last_login: None,
            is_active: true,
        }
    }

    fn answer(&self, req: &GraphqlRequest, authed: bool) -> Result<Value, GraphqlError> {
        let vars = &req.variables;
        let input = || vars.get("input").cloned().unwrap_or(Value::Null);
        let bad = |e: serde_json::Error| GraphqlError {
            message: e.to_string(),
            extensions: None,
        };
        match req.operation_name.as_str() {
            "Login" => {
                let li: LoginInput = serde_json::from_value(input()).map_err(bad)?;
                if li.email == Self::EMAIL && li.password == Self::PASSWORD {
                    Ok(json!({"token": Self::TOKEN, "user": Self::user()}))
                } else {
                    Err(GraphqlError {
                        message: "invalid credentials".into(),
                        extensions: None,
                    })
                }
            }
            "Register" => Ok(json!({"token": Self::TOKEN, "user": Self::user()})),
            _ if !authed => Err(GraphqlError {
                message: "authentication required".into(),
                extensions: Some(ErrorExtensions {
                    code: Some(UNAUTHENTICATED.into()),
                }),
            }),
            "GetMe" => Ok(json!(Self::user())),
            "GetDevice" => {
                let id = vars["id"].as_str().unwrap_or_default();
                let devices = self.devices.lock().unwrap();
                Ok(json!(devices.iter().find(|d| d.id == id)))
            }
            "GetDevices" => {
                let f: DeviceFilter = serde_json::from_value(vars.clone()).map_err(bad)?;
                let devices = self.devices.lock().unwrap();
                let matching: Vec<&Device> = devices
                    .iter()
                    .filter(|d| f.kind.as_ref().map_or(true, |k| &d.kind == k))
                    .filter(|d| f.status.map_or(true, |s| d.status == s))
                    .collect();
                let start = ((f.page.max(1) - 1) * f.page_size) as usize;
                let page: Vec<&Device> = matching
                    .iter()
                    .skip(start)
                    .take(f.page_size as usize)
                    .copied()
                    .collect();
                Ok(json!({
                    "devices": page,
                    "total": matching.len(),
                    "page": f.page,
                    "pageSize": f.page_size,
                }))
            }
            "GetStats" => Ok(json!(Stats::from_devices(&self.devices.lock().unwrap()))),
            "CreateDevice" => {
                let ci: CreateDeviceInput = serde_json::from_value(input()).map_err(bad)?;
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                let d = Device {
                    id: format!("dev-{n}"),
                    name: ci.name,
                    kind: ci.kind,
                    status: DeviceStatus::Unknown,
                    created_at: 1_700_001_000,
                    last_seen: 1_700_001_000,
                    metadata: ci.metadata,
                };
                self.devices.lock().unwrap().push(d.clone());
                Ok(json!(d))
            }
            "UpdateDevice" => {
                let ui: UpdateDeviceInput = serde_json::from_value(input()).map_err(bad)?;
                let mut devices = self.devices.lock().unwrap();
                let d = devices.iter_mut().find(|d| d.id == ui.id).ok_or(GraphqlError {
                    message: format!("device {} not found", ui.id),
                    extensions: None,
                })?;
                if let Some(name) = ui.name {
                    d.name = name;
                }
                if let Some(st) = ui.status {
                    d.status = st;
                }
                if let Some(md) = ui.metadata {
                    d.metadata = md;
                }
                Ok(json!(d))
            }
            "DeleteDevice" => {
                let id = vars["id"].as_str().unwrap_or_default();
                let mut devices = self.devices.lock().unwrap();
                let before = devices.len();
                devices.retain(|d| d.id != id);
                let success = devices.len() < before;
                Ok(json!({"success": success, "message": if success { "deleted" } else { "not found" }}))
            }
            other => Err(GraphqlError {
                message: format!("unknown operation {other}"),
                extensions: None,
            }),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(
        &self,
        req: &GraphqlRequest,
        token: Option<&str>,
    ) -> Result<GraphqlResponse, ApiError> {
        self.requests
            .lock()
            .unwrap()
            .push((req.operation_name.clone(), token.map(str::to_string)));
        if let Some(err) = self.fail.lock().unwrap().take() {
            return Err(err);
        }
        let authed = token == Some(Self::TOKEN);
        let field = match req.operation_name.as_str() {
            "GetMe" => "me",
            "GetDevice" => "device",
            "GetDevices" => "devices",
            "GetStats" => "stats",
            "Login" => "login",
            "Register" => "register",
            "CreateDevice" => "createDevice",
            "UpdateDevice" => "updateDevice",
            "DeleteDevice" => "deleteDevice",
            _ => "unknown",
        };
        Ok(match self.answer(req, authed) {
            Ok(v) => GraphqlResponse {
                data: Some(json!({ field: v })),
                errors: vec![],
            },
            Err(e) => GraphqlResponse {
                data: None,
                errors: vec![e],
            },
        })
    }
}
