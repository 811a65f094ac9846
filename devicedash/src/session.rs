//! Session object: the bearer token and its lifecycle.
//!
//! A `Session` is created at startup (`restore`), handed to the `ApiClient`,
//! and moved through `begin` (login/register), `end` (logout) and `expire`
//! (the API answered UNAUTHENTICATED). The token is persisted through a
//! `TokenStore` so a restart picks the session back up.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::{fs, io};

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// File name the token is stored under.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Token kept in a single file under the config dir.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Self {
        Self::new(crate::profiles::config_dir().join(AUTH_TOKEN_KEY))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        let s = fs::read_to_string(&self.path).ok()?;
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    SignedOut,
    Active {
        token: String,
    },
    /// The API rejected the token; the user has to sign in again.
    Expired,
}

#[derive(Clone)]
pub struct Session {
    state: Arc<watch::Sender<SessionState>>,
    store: Arc<dyn TokenStore>,
}

impl Session {
    /// Start from whatever token the store holds.
    pub fn restore(store: Arc<dyn TokenStore>) -> Self {
        let initial = match store.load() {
            Some(token) => {
                debug!("restored persisted session token");
                SessionState::Active { token }
            }
            None => SessionState::SignedOut,
        };
        let (tx, _rx) = watch::channel(initial);
        Self {
            state: Arc::new(tx),
            store,
        }
    }

    /// In-memory session with no persisted token.
    pub fn ephemeral() -> Self {
        Self::restore(Arc::new(MemoryTokenStore::default()))
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        match &*self.state.borrow() {
            SessionState::Active { token } => Some(token.clone()),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(&*self.state.borrow(), SessionState::Active { .. })
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn begin(&self, token: String) {
        if let Err(e) = self.store.save(&token) {
            warn!("failed to persist session token: {e}");
        }
        info!("session started");
        self.state.send_replace(SessionState::Active { token });
    }

    pub fn end(&self) {
        self.forget();
        info!("session ended");
        self.state.send_replace(SessionState::SignedOut);
    }

    /// Drop an active session after the API reported it unauthenticated.
    pub fn expire(&self) {
        self.forget();
        let was_active = self.is_active();
        if was_active {
            warn!("session expired; token cleared");
            self.state.send_replace(SessionState::Expired);
        }
    }

    fn forget(&self) {
        if let Err(e) = self.store.clear() {
            warn!("failed to clear persisted session token: {e}");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.borrow() {
            SessionState::SignedOut => "signed-out",
            SessionState::Active { .. } => "active",
            SessionState::Expired => "expired",
        };
        f.debug_struct("Session").field("state", &state).finish()
    }
}
