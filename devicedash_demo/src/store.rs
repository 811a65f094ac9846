//! In-memory device and user store behind the demo API.

use std::collections::HashMap;

use devicedash::types::{
    AuthPayload, CreateDeviceInput, DeleteResult, Device, DeviceConnection, DeviceStatus,
    MetadataEntry, RegisterInput, Stats, UpdateDeviceInput, User,
};
use thiserror::Error;
use uuid::Uuid;

pub const DEMO_EMAIL: &str = "demo@devicedash.local";
pub const DEMO_PASSWORD: &str = "demo1234";

const ROLES: [&str; 3] = ["admin", "user", "device"];
const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("user with email {0} already exists")]
    EmailTaken(String),
    #[error("Invalid email or password")]
    BadCredentials,
    #[error("Account is inactive")]
    Inactive,
}

struct Account {
    user: User,
    password: String,
}

/// Devices in insertion order. Accounts are keyed by email and issued tokens resolve to one.
pub struct Store {
    devices: Vec<Device>,
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
}

impl Store {
    pub fn empty() -> Self {
        Self {
            devices: Vec::new(),
            accounts: HashMap::new(),
            tokens: HashMap::new(),
        }
    }

    /// A demo fleet and the demo admin account.
    pub fn seeded(now: i64) -> Self {
        let mut store = Self::empty();
        store.insert_account(
            User {
                id: Uuid::new_v4().to_string(),
                email: DEMO_EMAIL.into(),
                name: "Demo Operator".into(),
                role: "admin".into(),
                created_at: now - 86_400 * 30,
                last_login: None,
                is_active: true,
            },
            DEMO_PASSWORD,
        );

        let fleet: [(&str, &str, DeviceStatus, i64, &[(&str, &str)]); 8] = [
            ("Edge Gateway North", "gateway", DeviceStatus::Online, 4, &[
                ("cpu_percent", "23.5"), ("memory_used_gb", "1.8"), ("disk_used_gb", "12.4"),
                ("network_up_mb", "120.0"), ("network_down_mb", "843.2"), ("process_count", "87"),
                ("location", "Building A"),
            ]),
            ("Edge Gateway South", "gateway", DeviceStatus::Online, 9, &[
                ("cpu_percent", "61.0"), ("memory_used_gb", "3.1"), ("disk_used_gb", "20.9"),
                ("network_up_mb", "88.5"), ("network_down_mb", "410.7"), ("process_count", "102"),
                ("location", "Building B"),
            ]),
            ("Cold Room Sensor", "sensor", DeviceStatus::Online, 30, &[
                ("battery_level", "76"), ("temperature", "3.9"), ("location", "Warehouse"),
            ]),
            ("Door Sensor 12", "sensor", DeviceStatus::Offline, 3_600 * 5, &[
                ("battery_level", "4"), ("location", "Loading Dock"),
            ]),
            ("Lobby Thermostat", "thermostat", DeviceStatus::Online, 55, &[
                ("cpu_percent", "7.2"), ("temperature", "21.5"), ("firmware", "2.4.1"),
            ]),
            ("Boiler Controller", "controller", DeviceStatus::Error, 600, &[
                ("cpu_percent", "97.8"), ("memory_used_gb", "0.9"), ("error", "pressure fault"),
            ]),
            ("Rooftop Camera", "camera", DeviceStatus::Maintenance, 86_400 * 2, &[
                ("disk_used_gb", "214.0"), ("network_up_mb", "5120.0"),
            ]),
            ("Pump Actuator", "actuator", DeviceStatus::Online, 12, &[
                ("cpu_percent", "15.0"), ("memory_used_gb", "0.3"), ("process_count", "14"),
            ]),
        ];
        for (i, (name, kind, status, age, md)) in fleet.into_iter().enumerate() {
            store.devices.push(Device {
                id: format!("dev-{}", i + 1),
                name: name.into(),
                kind: kind.into(),
                status,
                created_at: now - 86_400 * (20 - i as i64),
                last_seen: now - age,
                metadata: md.iter().map(|(k, v)| MetadataEntry::new(*k, *v)).collect(),
            });
        }
        store
    }

    fn insert_account(&mut self, user: User, password: &str) {
        self.accounts.insert(
            user.email.clone(),
            Account {
                user,
                password: password.to_string(),
            },
        );
    }

    // ---------- devices ----------

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    /// Filter by type and status, then page. Page and page size below 1 fall back to 1 and 10.
    pub fn list(
        &self,
        page: i64,
        page_size: i64,
        kind: Option<&str>,
        status: Option<DeviceStatus>,
    ) -> DeviceConnection {
        let page = if page < 1 { 1 } else { page as u32 };
        let page_size = if page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size as u32
        };
        let matching: Vec<&Device> = self
            .devices
            .iter()
            .filter(|d| kind.map_or(true, |k| k.is_empty() || d.kind == k))
            .filter(|d| status.map_or(true, |s| s == DeviceStatus::Unknown || d.status == s))
            .collect();
        let start = ((page - 1) as usize).saturating_mul(page_size as usize);
        DeviceConnection {
            total: matching.len() as u32,
            devices: matching
                .into_iter()
                .skip(start)
                .take(page_size as usize)
                .cloned()
                .collect(),
            page,
            page_size,
        }
    }

    pub fn stats(&self) -> Stats {
        Stats::from_devices(&self.devices)
    }

    pub fn create(&mut self, input: CreateDeviceInput, now: i64) -> Result<Device, StoreError> {
        if input.name.trim().is_empty() {
            return Err(StoreError::Invalid("name is required".into()));
        }
        if input.kind.trim().is_empty() {
            return Err(StoreError::Invalid("type is required".into()));
        }
        let device = Device {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            kind: input.kind.trim().to_string(),
            status: DeviceStatus::Online,
            created_at: now,
            last_seen: now,
            metadata: input.metadata,
        };
        self.devices.push(device.clone());
        Ok(device)
    }

    /// Apply the fields that are set. Blank names and UNKNOWN status leave the old value.
    pub fn update(&mut self, input: UpdateDeviceInput, now: i64) -> Result<Device, StoreError> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.id == input.id)
            .ok_or_else(|| StoreError::DeviceNotFound(input.id.clone()))?;
        if let Some(name) = input.name.filter(|n| !n.trim().is_empty()) {
            device.name = name.trim().to_string();
        }
        if let Some(status) = input.status.filter(|s| *s != DeviceStatus::Unknown) {
            device.status = status;
        }
        if let Some(metadata) = input.metadata {
            device.metadata = metadata;
        }
        device.last_seen = now;
        Ok(device.clone())
    }

    pub fn delete(&mut self, id: &str) -> Result<DeleteResult, StoreError> {
        let idx = self
            .devices
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| StoreError::DeviceNotFound(id.to_string()))?;
        self.devices.remove(idx);
        Ok(DeleteResult {
            success: true,
            message: format!("Device {id} deleted"),
        })
    }

    // ---------- users ----------

    pub fn register(&mut self, input: RegisterInput, now: i64) -> Result<AuthPayload, StoreError> {
        let email = input.email.trim().to_string();
        if email.is_empty() {
            return Err(StoreError::Invalid("email required".into()));
        }
        if input.password.is_empty() {
            return Err(StoreError::Invalid("password required".into()));
        }
        if input.name.trim().is_empty() {
            return Err(StoreError::Invalid("name required".into()));
        }
        let role = match input.role.as_deref().map(str::trim) {
            None | Some("") => "user".to_string(),
            Some(r) if ROLES.contains(&r) => r.to_string(),
            Some(r) => return Err(StoreError::Invalid(format!("invalid role: {r}"))),
        };
        if self.accounts.contains_key(&email) {
            return Err(StoreError::EmailTaken(email));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            name: input.name.trim().to_string(),
            role,
            created_at: now,
            last_login: None,
            is_active: true,
        };
        self.insert_account(user.clone(), &input.password);
        Ok(self.issue_token(user))
    }

    pub fn login(&mut self, email: &str, password: &str, now: i64) -> Result<AuthPayload, StoreError> {
        let account = self
            .accounts
            .get_mut(email.trim())
            .ok_or(StoreError::BadCredentials)?;
        if !account.user.is_active {
            return Err(StoreError::Inactive);
        }
        if account.password != password {
            return Err(StoreError::BadCredentials);
        }
        account.user.last_login = Some(now);
        let user = account.user.clone();
        Ok(self.issue_token(user))
    }

    fn issue_token(&mut self, user: User) -> AuthPayload {
        let token = format!("demo-{}", Uuid::new_v4().simple());
        self.tokens.insert(token.clone(), user.email.clone());
        AuthPayload { token, user }
    }

    pub fn user_for_token(&self, token: &str) -> Option<&User> {
        let email = self.tokens.get(token)?;
        self.accounts.get(email).map(|a| &a.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn seeded_fleet_has_every_status_bucket() {
        let s = Store::seeded(NOW).stats();
        assert_eq!(s.total_devices, 8);
        assert_eq!(s.online_devices, 5);
        assert_eq!(s.offline_devices, 1);
        assert_eq!(s.error_devices, 1);
    }

    #[test]
    fn list_filters_then_pages() {
        let store = Store::seeded(NOW);
        let gateways = store.list(1, 10, Some("gateway"), None);
        assert_eq!(gateways.total, 2);
        assert!(gateways.devices.iter().all(|d| d.kind == "gateway"));

        let p2 = store.list(2, 3, None, None);
        assert_eq!((p2.total, p2.page, p2.page_size), (8, 2, 3));
        assert_eq!(p2.devices[0].id, "dev-4");

        let online = store.list(1, 10, None, Some(DeviceStatus::Online));
        assert_eq!(online.total, 5);
    }

    #[test]
    fn list_defaults_bad_paging() {
        let c = Store::seeded(NOW).list(0, -5, None, None);
        assert_eq!((c.page, c.page_size), (1, 10));
        assert_eq!(c.devices.len(), 8);
    }

    #[test]
    fn create_requires_name_and_type_and_starts_online() {
        let mut store = Store::empty();
        let err = store
            .create(
                CreateDeviceInput {
                    name: " ".into(),
                    kind: "sensor".into(),
                    metadata: vec![],
                },
                NOW,
            )
            .unwrap_err();
        assert_eq!(err, StoreError::Invalid("name is required".into()));

        let d = store
            .create(
                CreateDeviceInput {
                    name: "Boiler".into(),
                    kind: "controller".into(),
                    metadata: vec![MetadataEntry::new("cpu_percent", "3")],
                },
                NOW,
            )
            .unwrap();
        assert_eq!(d.status, DeviceStatus::Online);
        assert_eq!((d.created_at, d.last_seen), (NOW, NOW));
        assert!(store.device(&d.id).is_some());
    }

    #[test]
    fn update_skips_blank_name_and_unknown_status() {
        let mut store = Store::seeded(NOW);
        let d = store
            .update(
                UpdateDeviceInput {
                    id: "dev-1".into(),
                    name: Some("  ".into()),
                    status: Some(DeviceStatus::Unknown),
                    metadata: None,
                },
                NOW + 5,
            )
            .unwrap();
        assert_eq!(d.name, "Edge Gateway North");
        assert_eq!(d.status, DeviceStatus::Online);
        assert_eq!(d.last_seen, NOW + 5);

        let d = store
            .update(
                UpdateDeviceInput {
                    id: "dev-1".into(),
                    status: Some(DeviceStatus::Maintenance),
                    ..Default::default()
                },
                NOW + 6,
            )
            .unwrap();
        assert_eq!(d.status, DeviceStatus::Maintenance);

        let err = store
            .update(
                UpdateDeviceInput {
                    id: "nope".into(),
                    ..Default::default()
                },
                NOW,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "device nope not found");
    }

    #[test]
    fn delete_reports_missing_devices() {
        let mut store = Store::seeded(NOW);
        let r = store.delete("dev-2").unwrap();
        assert!(r.success);
        assert_eq!(r.message, "Device dev-2 deleted");
        assert_eq!(store.delete("dev-2"), Err(StoreError::DeviceNotFound("dev-2".into())));
    }

    #[test]
    fn register_defaults_and_checks_role() {
        let mut store = Store::empty();
        let input = |role: Option<&str>, email: &str| RegisterInput {
            email: email.into(),
            password: "pw".into(),
            name: "Kim".into(),
            role: role.map(str::to_string),
        };
        let auth = store.register(input(None, "kim@example.com"), NOW).unwrap();
        assert_eq!(auth.user.role, "user");
        assert_eq!(store.user_for_token(&auth.token).map(|u| u.id.as_str()), Some(auth.user.id.as_str()));

        assert!(matches!(
            store.register(input(Some("root"), "x@example.com"), NOW),
            Err(StoreError::Invalid(_))
        ));
        assert_eq!(
            store.register(input(None, "kim@example.com"), NOW).unwrap_err(),
            StoreError::EmailTaken("kim@example.com".into())
        );
    }

    #[test]
    fn login_checks_password_and_stamps_last_login() {
        let mut store = Store::seeded(NOW);
        assert_eq!(
            store.login(DEMO_EMAIL, "wrong", NOW).unwrap_err(),
            StoreError::BadCredentials
        );
        let auth = store.login(DEMO_EMAIL, DEMO_PASSWORD, NOW + 1).unwrap();
        assert_eq!(auth.user.last_login, Some(NOW + 1));
        assert!(store.user_for_token(&auth.token).is_some());
        assert!(store.user_for_token("demo-forged").is_none());
    }
}
