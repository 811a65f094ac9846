//! POST /query: answers the dashboard's named operations from the store.
//!
//! Operations are dispatched on `operationName`; the query text is not parsed.
//! Everything except Login and Register needs `Authorization: Bearer <token>`.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use devicedash::graphql::{
    self, ErrorExtensions, GraphqlError, GraphqlRequest, GraphqlResponse, Operation,
    UNAUTHENTICATED,
};
use devicedash::types::{CreateDeviceInput, DeviceStatus, LoginInput, RegisterInput, UpdateDeviceInput};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::state::{now_unix, AppState};
use crate::store::StoreError;

const OPERATIONS: [Operation; 9] = [
    graphql::GET_ME,
    graphql::GET_DEVICE,
    graphql::GET_DEVICES,
    graphql::GET_STATS,
    graphql::LOGIN,
    graphql::REGISTER,
    graphql::CREATE_DEVICE,
    graphql::UPDATE_DEVICE,
    graphql::DELETE_DEVICE,
];

/// Failure of one operation, rendered into the `errors` array.
#[derive(Debug)]
pub enum OpError {
    Unauthenticated,
    BadRequest(String),
    Store(StoreError),
}

impl From<StoreError> for OpError {
    fn from(e: StoreError) -> Self {
        OpError::Store(e)
    }
}

impl OpError {
    fn into_graphql(self) -> GraphqlError {
        let (message, code) = match self {
            OpError::Unauthenticated => ("authentication required".to_string(), UNAUTHENTICATED),
            OpError::BadRequest(m) => (m, "BAD_USER_INPUT"),
            OpError::Store(e @ StoreError::DeviceNotFound(_)) => (e.to_string(), "NOT_FOUND"),
            OpError::Store(e @ (StoreError::BadCredentials | StoreError::Inactive)) => {
                (e.to_string(), "FORBIDDEN")
            }
            OpError::Store(e) => (e.to_string(), "BAD_USER_INPUT"),
        };
        GraphqlError {
            message,
            extensions: Some(ErrorExtensions {
                code: Some(code.to_string()),
            }),
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GraphqlRequest>,
) -> Json<GraphqlResponse> {
    let Some(op) = OPERATIONS.iter().find(|op| op.name == req.operation_name) else {
        warn!(operation = %req.operation_name, "unknown operation");
        return Json(failure(OpError::BadRequest(format!(
            "unknown operation '{}'",
            req.operation_name
        ))));
    };
    debug!(operation = op.name, "graphql request");
    match execute(&state, op, bearer_token(&headers), req.variables).await {
        Ok(value) => {
            let mut data = serde_json::Map::new();
            data.insert(op.field.to_string(), value);
            Json(GraphqlResponse {
                data: Some(Value::Object(data)),
                errors: vec![],
            })
        }
        Err(e) => Json(failure(e)),
    }
}

fn failure(e: OpError) -> GraphqlResponse {
    GraphqlResponse {
        data: None,
        errors: vec![e.into_graphql()],
    }
}

fn var<T: DeserializeOwned>(vars: &Value, name: &str) -> Result<T, OpError> {
    let v = vars.get(name).cloned().unwrap_or(Value::Null);
    serde_json::from_value(v).map_err(|e| OpError::BadRequest(format!("variable '{name}': {e}")))
}

async fn execute(
    state: &AppState,
    op: &Operation,
    token: Option<&str>,
    vars: Value,
) -> Result<Value, OpError> {
    let now = now_unix();

    if *op == graphql::LOGIN {
        let input: LoginInput = var(&vars, "input")?;
        let auth = state.store.write().await.login(&input.email, &input.password, now)?;
        info!(email = %auth.user.email, "login");
        return Ok(json!(auth));
    }
    if *op == graphql::REGISTER {
        let input: RegisterInput = var(&vars, "input")?;
        let auth = state.store.write().await.register(input, now)?;
        info!(email = %auth.user.email, role = %auth.user.role, "registered");
        return Ok(json!(auth));
    }

    let user = {
        let store = state.store.read().await;
        token
            .and_then(|t| store.user_for_token(t))
            .cloned()
            .ok_or(OpError::Unauthenticated)?
    };

    match op.name {
        "GetMe" => Ok(json!(user)),
        "GetDevice" => {
            let id: String = var(&vars, "id")?;
            Ok(json!(state.store.read().await.device(&id)))
        }
        "GetDevices" => {
            let page = vars.get("page").and_then(Value::as_i64).unwrap_or(1);
            let page_size = vars.get("pageSize").and_then(Value::as_i64).unwrap_or(0);
            let kind: Option<String> = var(&vars, "type")?;
            let status: Option<DeviceStatus> = var(&vars, "status")?;
            let conn = state
                .store
                .read()
                .await
                .list(page, page_size, kind.as_deref(), status);
            Ok(json!(conn))
        }
        "GetStats" => Ok(json!(state.store.read().await.stats())),
        "CreateDevice" => {
            let input: CreateDeviceInput = var(&vars, "input")?;
            let device = state.store.write().await.create(input, now)?;
            info!(id = %device.id, by = %user.email, "device created");
            state.publish(device.clone());
            Ok(json!(device))
        }
        "UpdateDevice" => {
            let input: UpdateDeviceInput = var(&vars, "input")?;
            let device = state.store.write().await.update(input, now)?;
            info!(id = %device.id, status = %device.status, "device updated");
            state.publish(device.clone());
            Ok(json!(device))
        }
        "DeleteDevice" => {
            let id: String = var(&vars, "id")?;
            let result = state.store.write().await.delete(&id)?;
            info!(%id, "device deleted");
            Ok(json!(result))
        }
        other => Err(OpError::BadRequest(format!("unsupported operation '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use crate::store::{Store, DEMO_EMAIL, DEMO_PASSWORD};

    fn state() -> AppState {
        AppState::new(Store::seeded(now_unix()))
    }

    async fn call(state: &AppState, op: &Operation, token: Option<&str>, vars: Value) -> GraphqlResponse {
        let mut headers = HeaderMap::new();
        if let Some(t) = token {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {t}")).unwrap(),
            );
        }
        let Json(resp) = graphql_handler(
            State(state.clone()),
            headers,
            Json(GraphqlRequest::new(op, vars)),
        )
        .await;
        resp
    }

    async fn login(state: &AppState) -> String {
        let mut resp = call(
            state,
            &graphql::LOGIN,
            None,
            json!({"input": {"email": DEMO_EMAIL, "password": DEMO_PASSWORD}}),
        )
        .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        resp.take_field("login")["token"].as_str().unwrap().to_string()
    }

    #[test]
    fn bearer_token_needs_the_scheme() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&h), Some("abc"));
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(bearer_token(&h), None);
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&h), None);
    }

    #[tokio::test]
    async fn queries_without_token_are_unauthenticated() {
        let st = state();
        let resp = call(&st, &graphql::GET_STATS, None, json!({})).await;
        assert_eq!(resp.errors[0].code(), Some(UNAUTHENTICATED));
        let resp = call(&st, &graphql::GET_ME, Some("forged"), json!({})).await;
        assert_eq!(resp.errors[0].code(), Some(UNAUTHENTICATED));
    }

    #[tokio::test]
    async fn login_then_list_with_filters() {
        let st = state();
        let token = login(&st).await;
        let mut resp = call(
            &st,
            &graphql::GET_DEVICES,
            Some(token.as_str()),
            json!({"page": 1, "pageSize": 20, "type": "gateway"}),
        )
        .await;
        let conn = resp.take_field("devices");
        assert_eq!(conn["total"], 2);
        assert_eq!(conn["pageSize"], 20);

        let mut resp = call(&st, &graphql::GET_DEVICES, Some(token.as_str()), json!({"status": "ERROR"})).await;
        let conn = resp.take_field("devices");
        assert_eq!(conn["total"], 1);
        assert_eq!(conn["pageSize"], 10);
    }

    #[tokio::test]
    async fn missing_device_is_null_and_bad_login_is_an_error() {
        let st = state();
        let token = login(&st).await;
        let mut resp = call(&st, &graphql::GET_DEVICE, Some(token.as_str()), json!({"id": "nope"})).await;
        assert!(resp.errors.is_empty());
        assert_eq!(resp.take_field("device"), Value::Null);

        let resp = call(
            &st,
            &graphql::LOGIN,
            None,
            json!({"input": {"email": DEMO_EMAIL, "password": "nope"}}),
        )
        .await;
        assert_eq!(resp.errors[0].message, "Invalid email or password");
        assert_ne!(resp.errors[0].code(), Some(UNAUTHENTICATED));
    }

    #[tokio::test]
    async fn mutations_publish_updates() {
        let st = state();
        let mut rx = st.updates.subscribe();
        let token = login(&st).await;
        let resp = call(
            &st,
            &graphql::UPDATE_DEVICE,
            Some(token.as_str()),
            json!({"input": {"id": "dev-1", "status": "MAINTENANCE"}}),
        )
        .await;
        assert!(resp.errors.is_empty());
        let pushed = rx.recv().await.unwrap();
        assert_eq!((pushed.id.as_str(), pushed.status), ("dev-1", DeviceStatus::Maintenance));

        let resp = call(&st, &graphql::DELETE_DEVICE, Some(token.as_str()), json!({"id": "dev-404"})).await;
        assert_eq!(resp.errors[0].message, "device dev-404 not found");
        assert_eq!(resp.errors[0].code(), Some("NOT_FOUND"));
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected() {
        let st = state();
        let Json(resp) = graphql_handler(
            State(st),
            HeaderMap::new(),
            Json(GraphqlRequest {
                query: "{ __typename }".into(),
                operation_name: "Introspect".into(),
                variables: Value::Null,
            }),
        )
        .await;
        assert!(resp.errors[0].message.contains("Introspect"));
    }
}
