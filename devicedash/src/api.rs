//! Typed operations against the device API.
//!
//! `ApiClient` is cheap to clone and shares one transport, one session and one
//! invalidation channel. Reads return whatever the API says; writes validate
//! locally first and invalidate dependent queries once they succeed.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::graphql::{self, GraphqlRequest, Operation};
use crate::query::{QueryHandle, QueryKind};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{
    AuthPayload, CreateDeviceInput, DeleteResult, Device, DeviceConnection, DeviceFilter,
    LoginInput, RegisterInput, Stats, UpdateDeviceInput, User,
};

const INVALIDATION_CAPACITY: usize = 64;

/// Queries a device mutation makes stale.
const DEVICE_DEPENDENTS: [QueryKind; 3] = [QueryKind::Devices, QueryKind::Device, QueryKind::Stats];

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Session,
    invalidations: broadcast::Sender<QueryKind>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Session) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self {
            transport,
            session,
            invalidations,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn invalidations(&self) -> broadcast::Receiver<QueryKind> {
        self.invalidations.subscribe()
    }

    /// Mark query families stale; live handles of those kinds refetch.
    pub fn invalidate(&self, kinds: &[QueryKind]) {
        for kind in kinds {
            debug!(?kind, "invalidate");
            // No receivers just means no view is watching.
            let _ = self.invalidations.send(*kind);
        }
    }

    async fn execute<T: DeserializeOwned>(&self, op: &Operation, variables: Value) -> ApiResult<T> {
        let req = GraphqlRequest::new(op, variables);
        // Sign-in operations never carry a (possibly stale) bearer.
        let token = if is_public(op) { None } else { self.session.token() };
        debug!(op = op.name, authed = token.is_some(), "graphql request");
        let outcome = match self.transport.execute(&req, token.as_deref()).await {
            Ok(mut resp) => match resp.error() {
                Some(err) => Err(err),
                None => Ok(resp.take_field(op.field)),
            },
            Err(err) => Err(err),
        };
        match outcome {
            Ok(field) => Ok(serde_json::from_value(field)?),
            Err(err) => {
                if err.is_unauthenticated() && token.is_some() {
                    warn!(op = op.name, "API reported unauthenticated session");
                    self.session.expire();
                }
                Err(err)
            }
        }
    }

    // ---------- Reads ----------

    pub async fn me(&self) -> ApiResult<Option<User>> {
        self.execute(&graphql::GET_ME, json!({})).await
    }

    /// `None` when the API has no such device. An empty id skips the request.
    pub async fn device(&self, id: &str) -> ApiResult<Option<Device>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.execute(&graphql::GET_DEVICE, json!({ "id": id })).await
    }

    pub async fn devices(&self, filter: &DeviceFilter) -> ApiResult<DeviceConnection> {
        self.execute(&graphql::GET_DEVICES, serde_json::to_value(filter)?)
            .await
    }

    pub async fn stats(&self) -> ApiResult<Stats> {
        self.execute(&graphql::GET_STATS, json!({})).await
    }

    // ---------- Device mutations ----------

    pub async fn create_device(&self, mut input: CreateDeviceInput) -> ApiResult<Device> {
        input.name = input.name.trim().to_string();
        input.kind = input.kind.trim().to_string();
        require(&input.name, "device name")?;
        require(&input.kind, "device type")?;
        // Blank form rows are not metadata
        input.metadata.retain(|m| !m.key.trim().is_empty());

        let device: Device = self
            .execute(&graphql::CREATE_DEVICE, json!({ "input": input }))
            .await?;
        info!(id = %device.id, "device created");
        self.invalidate(&DEVICE_DEPENDENTS);
        Ok(device)
    }

    pub async fn update_device(&self, input: UpdateDeviceInput) -> ApiResult<Device> {
        require(&input.id, "device id")?;
        if let Some(name) = input.name.as_deref() {
            require(name, "device name")?;
        }
        let device: Device = self
            .execute(&graphql::UPDATE_DEVICE, json!({ "input": input }))
            .await?;
        info!(id = %device.id, status = %device.status, "device updated");
        self.invalidate(&DEVICE_DEPENDENTS);
        Ok(device)
    }

    pub async fn delete_device(&self, id: &str) -> ApiResult<DeleteResult> {
        require(id, "device id")?;
        let result: DeleteResult = self
            .execute(&graphql::DELETE_DEVICE, json!({ "id": id }))
            .await?;
        if result.success {
            info!(%id, "device deleted");
            self.invalidate(&DEVICE_DEPENDENTS);
        }
        Ok(result)
    }

    // ---------- Auth ----------

    pub async fn login(&self, input: LoginInput) -> ApiResult<AuthPayload> {
        require(&input.email, "email")?;
        require(&input.password, "password")?;
        let payload: AuthPayload = self
            .execute(&graphql::LOGIN, json!({ "input": input }))
            .await?;
        self.start_session(&payload);
        Ok(payload)
    }

    pub async fn register(&self, input: RegisterInput) -> ApiResult<AuthPayload> {
        require(&input.email, "email")?;
        require(&input.password, "password")?;
        require(&input.name, "name")?;
        let payload: AuthPayload = self
            .execute(&graphql::REGISTER, json!({ "input": input }))
            .await?;
        self.start_session(&payload);
        Ok(payload)
    }

    pub fn logout(&self) {
        self.session.end();
        self.invalidate(&QueryKind::ALL);
    }

    fn start_session(&self, payload: &AuthPayload) {
        self.session.begin(payload.token.clone());
        info!(user = %payload.user.email, "signed in");
        self.invalidate(&[QueryKind::Me]);
    }

    // ---------- Query handles ----------

    pub fn watch_devices(&self, filter: DeviceFilter, poll: Option<Duration>) -> QueryHandle<DeviceConnection> {
        let client = self.clone();
        QueryHandle::spawn(QueryKind::Devices, self.invalidations(), poll, move || {
            let client = client.clone();
            let filter = filter.clone();
            async move { client.devices(&filter).await }
        })
    }

    /// Empty id yields an idle handle: no task, no request, `data=None, loading=false`.
    pub fn watch_device(&self, id: &str, poll: Option<Duration>) -> QueryHandle<Option<Device>> {
        if id.is_empty() {
            return QueryHandle::idle();
        }
        let client = self.clone();
        let id = id.to_string();
        QueryHandle::spawn(QueryKind::Device, self.invalidations(), poll, move || {
            let client = client.clone();
            let id = id.clone();
            async move { client.device(&id).await }
        })
    }

    pub fn watch_stats(&self, poll: Option<Duration>) -> QueryHandle<Stats> {
        let client = self.clone();
        QueryHandle::spawn(QueryKind::Stats, self.invalidations(), poll, move || {
            let client = client.clone();
            async move { client.stats().await }
        })
    }

    pub fn watch_me(&self) -> QueryHandle<Option<User>> {
        let client = self.clone();
        QueryHandle::spawn(QueryKind::Me, self.invalidations(), None, move || {
            let client = client.clone();
            async move { client.me().await }
        })
    }
}

fn is_public(op: &Operation) -> bool {
    *op == graphql::LOGIN || *op == graphql::REGISTER
}

fn require(value: &str, what: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{what} is required")));
    }
    Ok(())
}
