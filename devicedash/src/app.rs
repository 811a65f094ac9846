//! App state and main loop: routing, input handling, query handles per view, and drawing.

use std::{
    collections::BTreeSet,
    io,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::forms::{self, Form, FormAction};
use crate::history::ActivityHistory;
use crate::query::{QueryHandle, QueryKind};
use crate::session::SessionState;
use crate::types::{
    AuthPayload, DeleteResult, Device, DeviceConnection, DeviceFilter, DeviceStatus, Stats,
    UpdateDeviceInput, User,
};
use crate::ui::{
    activity::draw_activity,
    detail::draw_device_detail,
    devices::{draw_device_table, draw_stats_cards, TableView},
    form::draw_form,
    header::{draw_footer, draw_header, HeaderInfo},
};
use crate::ws;

const MSG_CAPACITY: usize = 64;
const ACTIVITY_SAMPLES: usize = 600;
const LIVE_RETRY: Duration = Duration::from_secs(30);
/// Backoff after the server closes the subscription cleanly.
const LIVE_RECONNECT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Devices,
    DeviceDetail(String),
    AddDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

/// Results of background work, delivered to the UI loop.
#[derive(Debug)]
pub enum AppMsg {
    SignedIn(ApiResult<AuthPayload>),
    Created(ApiResult<Device>),
    Updated(ApiResult<Device>),
    Deleted(String, ApiResult<DeleteResult>),
    DeviceUpdate(Box<Device>),
    LiveEnded(ApiResult<()>),
}

pub struct App {
    api: ApiClient,
    config: ClientConfig,
    route: Route,

    // Query handles for the current view; dropping one stops its polling
    me: Option<QueryHandle<Option<User>>>,
    devices: Option<QueryHandle<DeviceConnection>>,
    stats: Option<QueryHandle<Stats>>,
    detail: Option<QueryHandle<Option<Device>>>,

    filter: DeviceFilter,
    // Client-side search over the current page
    search: String,
    searching: bool,
    known_kinds: BTreeSet<String>,
    selected: usize,
    pending_delete: Option<String>,

    auth_mode: AuthMode,
    auth_form: Form,
    device_form: Form,

    activity: ActivityHistory,
    notice: Option<String>,

    tx: mpsc::Sender<AppMsg>,
    rx: mpsc::Receiver<AppMsg>,

    // deviceUpdated subscription
    live_enabled: bool,
    live: Option<JoinHandle<()>>,
    live_retry_at: Option<Instant>,
    live_dirty: bool,

    should_quit: bool,
}

impl App {
    /// Build the app and open the first view. Must run inside a tokio runtime.
    pub fn new(api: ApiClient, config: ClientConfig) -> Self {
        let (tx, rx) = mpsc::channel(MSG_CAPACITY);
        let filter = DeviceFilter {
            page_size: config.page_size,
            ..DeviceFilter::default()
        };
        let mut app = Self {
            api,
            config,
            route: Route::Login,
            me: None,
            devices: None,
            stats: None,
            detail: None,
            filter,
            search: String::new(),
            searching: false,
            known_kinds: BTreeSet::new(),
            selected: 0,
            pending_delete: None,
            auth_mode: AuthMode::Login,
            auth_form: Form::login(),
            device_form: Form::add_device(),
            activity: ActivityHistory::new(ACTIVITY_SAMPLES),
            notice: None,
            tx,
            rx,
            live_enabled: true,
            live: None,
            live_retry_at: None,
            live_dirty: false,
            should_quit: false,
        };
        let first = if app.api.session().is_active() {
            Route::Devices
        } else {
            Route::Login
        };
        app.navigate(first);
        app
    }

    /// Turn the live `deviceUpdated` subscription on or off (on by default).
    pub fn with_live_updates(mut self, on: bool) -> Self {
        self.live_enabled = on;
        self
    }

    /// Pre-fill the sign-in form (demo mode credentials).
    pub fn with_login_hint(mut self, email: &str, password: &str) -> Self {
        self.auth_form.set(forms::EMAIL, email);
        self.auth_form.set(forms::PASSWORD, password);
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn poll(&self) -> Option<Duration> {
        Some(self.config.poll_interval)
    }

    // ---------- Routing ----------

    pub fn navigate(&mut self, route: Route) {
        debug!(?route, "navigate");
        self.pending_delete = None;
        self.detail = None;
        match &route {
            Route::Login => {
                self.devices = None;
                self.stats = None;
                self.me = None;
                self.stop_live();
                self.activity.clear();
                self.search.clear();
                self.searching = false;
                self.known_kinds.clear();
                self.auth_form = match self.auth_mode {
                    AuthMode::Login => Form::login(),
                    AuthMode::Register => Form::register(),
                };
            }
            Route::Devices => {
                self.reload_devices();
                self.stats = Some(self.api.watch_stats(self.poll()));
                self.ensure_me();
            }
            Route::DeviceDetail(id) => {
                self.devices = None;
                self.stats = None;
                self.detail = Some(self.api.watch_device(id, self.poll()));
                self.ensure_me();
            }
            Route::AddDevice => {
                self.devices = None;
                self.stats = None;
                self.device_form = Form::add_device();
                self.ensure_me();
            }
        }
        self.route = route;
    }

    fn ensure_me(&mut self) {
        if self.me.is_none() {
            self.me = Some(self.api.watch_me());
        }
    }

    fn reload_devices(&mut self) {
        self.devices = Some(self.api.watch_devices(self.filter.clone(), self.poll()));
        self.selected = 0;
    }

    fn start_live(&mut self) {
        if !self.live_enabled || self.live.is_some() || self.route == Route::Login {
            return;
        }
        if self.live_retry_at.is_some_and(|t| Instant::now() < t) {
            return;
        }
        let Some(token) = self.api.session().token() else {
            return;
        };
        let url = self.config.subscription_endpoint();
        let tls_ca = self.config.tls_ca.clone();
        let tx = self.tx.clone();
        self.live = Some(tokio::spawn(async move {
            let (dev_tx, mut dev_rx) = mpsc::channel::<Device>(MSG_CAPACITY);
            let fwd = tx.clone();
            let forward = async move {
                while let Some(d) = dev_rx.recv().await {
                    if fwd.send(AppMsg::DeviceUpdate(Box::new(d))).await.is_err() {
                        break;
                    }
                }
            };
            let (res, ()) = tokio::join!(
                ws::run_device_updates(&url, tls_ca.as_deref(), Some(token.as_str()), dev_tx),
                forward
            );
            let _ = tx.send(AppMsg::LiveEnded(res)).await;
        }));
    }

    fn stop_live(&mut self) {
        if let Some(task) = self.live.take() {
            task.abort();
        }
        self.live_retry_at = None;
        self.live_dirty = false;
    }

    // ---------- Per-frame work ----------

    /// Apply finished background work, follow the session, and sample stats.
    pub fn tick(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(msg);
        }

        // A session that ended or expired anywhere sends us back to the login view
        if !self.api.session().is_active() && self.route != Route::Login {
            if self.api.session().state() == SessionState::Expired {
                self.notice = Some("Session expired, please sign in again".into());
            }
            self.navigate(Route::Login);
        }

        self.start_live();
        if self.live_dirty {
            self.live_dirty = false;
            self.api
                .invalidate(&[QueryKind::Devices, QueryKind::Device, QueryKind::Stats]);
        }

        if let Some(st) = self.stats.as_mut().and_then(QueryHandle::poll_update) {
            if let (false, None, Some(s)) = (st.loading, st.error.as_ref(), st.data.as_ref()) {
                self.activity.push(s);
            }
        }

        let rows = self.page_rows();
        if rows == 0 {
            self.selected = 0;
        } else if self.selected >= rows {
            self.selected = rows - 1;
        }
    }

    fn apply(&mut self, msg: AppMsg) {
        match msg {
            AppMsg::SignedIn(Ok(payload)) => {
                self.notice = Some(format!("Signed in as {}", payload.user.email));
                self.auth_form.submitting = false;
                self.navigate(Route::Devices);
            }
            AppMsg::SignedIn(Err(e)) => {
                self.auth_form.submitting = false;
                self.auth_form.error = Some(e.to_string());
            }
            AppMsg::Created(Ok(d)) => {
                self.notice = Some(format!("Created {}", d.name));
                self.navigate(Route::Devices);
            }
            AppMsg::Created(Err(e)) => {
                self.device_form.submitting = false;
                self.device_form.error = Some(e.to_string());
            }
            AppMsg::Updated(Ok(d)) => {
                self.notice = Some(format!("{} is now {}", d.name, d.status.label()));
            }
            AppMsg::Deleted(id, Ok(res)) => {
                if res.success {
                    self.notice = Some(format!("Deleted {id}"));
                    if self.route == Route::DeviceDetail(id) {
                        self.navigate(Route::Devices);
                    }
                } else {
                    self.notice = Some(res.message);
                }
            }
            AppMsg::Updated(Err(e)) | AppMsg::Deleted(_, Err(e)) => {
                self.notice = Some(e.to_string());
            }
            AppMsg::DeviceUpdate(d) => {
                debug!(id = %d.id, status = %d.status, "live update");
                self.live_dirty = true;
            }
            AppMsg::LiveEnded(res) => {
                self.live = None;
                match res {
                    Ok(()) => {
                        info!("device subscription closed");
                        self.live_retry_at = Some(Instant::now() + LIVE_RECONNECT);
                    }
                    Err(e) if e.is_unauthenticated() => self.api.session().expire(),
                    Err(e) => {
                        warn!("device subscription failed: {e}");
                        self.notice = Some(format!("Live updates off ({e}); polling"));
                        self.live_retry_at = Some(Instant::now() + LIVE_RETRY);
                    }
                }
            }
        }
    }

    // ---------- Input ----------

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.route.clone() {
            Route::Login => self.login_key(key),
            Route::Devices => self.devices_key(key),
            Route::DeviceDetail(id) => self.detail_key(key, id),
            Route::AddDevice => self.add_device_key(key),
        }
    }

    fn login_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::F(2) && !self.auth_form.submitting {
            self.auth_mode = match self.auth_mode {
                AuthMode::Login => AuthMode::Register,
                AuthMode::Register => AuthMode::Login,
            };
            let email = self.auth_form.value(forms::EMAIL).to_string();
            self.auth_form = match self.auth_mode {
                AuthMode::Login => Form::login(),
                AuthMode::Register => Form::register(),
            };
            self.auth_form.set(forms::EMAIL, &email);
            return;
        }
        match self.auth_form.handle_key(key) {
            FormAction::Cancel => self.should_quit = true,
            FormAction::Submit => self.submit_auth(),
            FormAction::None => {}
        }
    }

    fn submit_auth(&mut self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        match self.auth_mode {
            AuthMode::Login => match forms::login_input(&self.auth_form) {
                Ok(input) => {
                    self.auth_form.error = None;
                    self.auth_form.submitting = true;
                    tokio::spawn(async move {
                        let _ = tx.send(AppMsg::SignedIn(api.login(input).await)).await;
                    });
                }
                Err(e) => self.auth_form.error = Some(e),
            },
            AuthMode::Register => match forms::register_input(&self.auth_form) {
                Ok(input) => {
                    self.auth_form.error = None;
                    self.auth_form.submitting = true;
                    tokio::spawn(async move {
                        let _ = tx.send(AppMsg::SignedIn(api.register(input).await)).await;
                    });
                }
                Err(e) => self.auth_form.error = Some(e),
            },
        }
    }

    fn devices_key(&mut self, key: KeyEvent) {
        if self.searching {
            self.search_key(key);
            return;
        }
        // Any key other than a second 'd' cancels a pending delete
        let pending = self.pending_delete.take();
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Char('/') => {
                self.searching = true;
                self.selected = 0;
            }
            KeyCode::Esc if !self.search.is_empty() => {
                self.search.clear();
                self.selected = 0;
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < self.page_rows() {
                    self.selected += 1;
                }
            }
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.page_rows().saturating_sub(1),
            KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    self.navigate(Route::DeviceDetail(id));
                }
            }
            KeyCode::Char('n') => self.navigate(Route::AddDevice),
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_id() {
                    self.confirm_delete(pending, id);
                }
            }
            KeyCode::Char('f') => {
                self.filter.status = next_status_filter(self.filter.status);
                self.filter.page = 1;
                self.reload_devices();
            }
            KeyCode::Char('t') => {
                // A type-filtered page only shows one type; remember the others.
                if let Some(conn) = self.devices.as_ref().and_then(|h| h.data()) {
                    self.known_kinds
                        .extend(conn.devices.into_iter().map(|d| d.kind));
                }
                self.filter.kind = next_kind_filter(self.filter.kind.as_deref(), &self.known_kinds);
                self.filter.page = 1;
                self.reload_devices();
            }
            KeyCode::PageDown => {
                let pages = self
                    .devices
                    .as_ref()
                    .and_then(|h| h.data())
                    .map(|c| c.page_count())
                    .unwrap_or(1);
                if self.filter.page < pages {
                    self.filter.page += 1;
                    self.reload_devices();
                }
            }
            KeyCode::PageUp => {
                if self.filter.page > 1 {
                    self.filter.page -= 1;
                    self.reload_devices();
                }
            }
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('L') => self.logout(),
            _ => {}
        }
    }

    fn search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.search.clear();
                self.searching = false;
            }
            KeyCode::Enter => self.searching = false,
            KeyCode::Backspace => {
                self.search.pop();
            }
            KeyCode::Char(c) => self.search.push(c),
            _ => return,
        }
        self.selected = 0;
    }

    fn detail_key(&mut self, key: KeyEvent, id: String) {
        let pending = self.pending_delete.take();
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Esc | KeyCode::Backspace => self.navigate(Route::Devices),
            KeyCode::Char('s') => {
                let current = self
                    .detail
                    .as_ref()
                    .and_then(|h| h.data())
                    .flatten()
                    .map(|d| d.status);
                if let Some(status) = current {
                    let api = self.api.clone();
                    let tx = self.tx.clone();
                    let input = UpdateDeviceInput {
                        id,
                        status: Some(status.next()),
                        ..Default::default()
                    };
                    tokio::spawn(async move {
                        let _ = tx.send(AppMsg::Updated(api.update_device(input).await)).await;
                    });
                }
            }
            KeyCode::Char('d') => self.confirm_delete(pending, id),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('L') => self.logout(),
            _ => {}
        }
    }

    fn add_device_key(&mut self, key: KeyEvent) {
        match self.device_form.handle_key(key) {
            FormAction::Cancel => self.navigate(Route::Devices),
            FormAction::Submit => match forms::create_device_input(&self.device_form) {
                Ok(input) => {
                    self.device_form.error = None;
                    self.device_form.submitting = true;
                    let api = self.api.clone();
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let _ = tx.send(AppMsg::Created(api.create_device(input).await)).await;
                    });
                }
                Err(e) => self.device_form.error = Some(e),
            },
            FormAction::None => {}
        }
    }

    /// First press arms, a second press on the same device sends the delete.
    fn confirm_delete(&mut self, pending: Option<String>, id: String) {
        if pending.as_deref() != Some(id.as_str()) {
            self.notice = Some(format!("Press d again to delete {id}"));
            self.pending_delete = Some(id);
            return;
        }
        self.notice = None;
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let res = api.delete_device(&id).await;
            let _ = tx.send(AppMsg::Deleted(id, res)).await;
        });
    }

    fn refresh(&self) {
        if let Some(h) = &self.devices {
            h.refetch();
        }
        if let Some(h) = &self.stats {
            h.refetch();
        }
        if let Some(h) = &self.detail {
            h.refetch();
        }
        if let Some(h) = &self.me {
            h.refetch();
        }
    }

    fn logout(&mut self) {
        self.api.logout();
        self.notice = Some("Signed out".into());
        self.navigate(Route::Login);
    }

    /// Rows of the current page that pass the search term.
    fn visible_devices(&self) -> Vec<Device> {
        self.devices
            .as_ref()
            .and_then(|h| h.data())
            .map(|c| {
                c.devices
                    .into_iter()
                    .filter(|d| d.matches_search(&self.search))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn page_rows(&self) -> usize {
        self.visible_devices().len()
    }

    fn selected_id(&self) -> Option<String> {
        self.visible_devices()
            .into_iter()
            .nth(self.selected)
            .map(|d| d.id)
    }

    // ---------- Terminal ----------

    pub async fn run(&mut self) -> anyhow::Result<()> {
        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        // Main loop
        let res = self.event_loop(&mut terminal).await;

        // Teardown
        disable_raw_mode()?;
        let backend = terminal.backend_mut();
        execute!(backend, DisableMouseCapture, LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> anyhow::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10))? {
                if let Event::Key(k) = event::read()? {
                    self.handle_key(k);
                }
            }
            if self.should_quit {
                break;
            }

            self.tick();

            // Draw
            terminal.draw(|f| self.draw(f))?;

            // Tick rate
            sleep(Duration::from_millis(100)).await;
        }
        self.stop_live();
        Ok(())
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let area = f.area();

        // Root rows: header, body, footer
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(area);

        let user = self.me.as_ref().and_then(|h| h.data()).flatten();
        draw_header(
            f,
            rows[0],
            &HeaderInfo {
                api_url: self.config.api_url.as_str(),
                user: user.as_ref(),
                live: self.live.is_some(),
                signed_in: self.api.session().is_active(),
            },
        );
        draw_footer(f, rows[2], self.key_hint(), self.notice.as_deref());

        let body = rows[1];
        match &self.route {
            Route::Login => {
                let title = match self.auth_mode {
                    AuthMode::Login => "Sign in",
                    AuthMode::Register => "Create account",
                };
                draw_form(f, body, title, &self.auth_form);
            }
            Route::Devices => {
                let parts = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(4), // stats cards
                        Constraint::Length(5), // activity sparkline
                        Constraint::Min(5),    // device table
                    ])
                    .split(body);
                let stats = self.stats.as_ref().map(|h| h.state());
                draw_stats_cards(
                    f,
                    parts[0],
                    stats.as_ref().and_then(|s| s.data.as_ref()),
                );
                draw_activity(f, parts[1], &self.activity);
                if let Some(h) = self.devices.as_ref() {
                    draw_device_table(
                        f,
                        parts[2],
                        &TableView {
                            state: &h.state(),
                            selected: self.selected,
                            filter: &self.filter,
                            search: &self.search,
                            searching: self.searching,
                            pending_delete: self.pending_delete.as_deref(),
                        },
                    );
                }
            }
            Route::DeviceDetail(_) => {
                if let Some(h) = self.detail.as_ref() {
                    draw_device_detail(f, body, &h.state(), self.pending_delete.is_some());
                }
            }
            Route::AddDevice => draw_form(f, body, "Add device", &self.device_form),
        }
    }

    fn key_hint(&self) -> &'static str {
        match self.route {
            Route::Login => "Tab next field | Enter submit | F2 sign in/register | Esc quit",
            Route::Devices if self.searching => "Type to search name/type | Enter keep | Esc clear",
            Route::Devices => {
                "↑/↓ select | Enter open | / search | f status | t type | n new | d delete | PgUp/PgDn page | r refresh | L logout | q quit"
            }
            Route::DeviceDetail(_) => "Esc back | s cycle status | d delete | r refresh | L logout | q quit",
            Route::AddDevice => "Tab next field | Enter create | Esc cancel",
        }
    }
}

/// `None` (all) → each status in turn → back to `None`.
fn next_status_filter(cur: Option<DeviceStatus>) -> Option<DeviceStatus> {
    match cur {
        None => Some(DeviceStatus::ALL[0]),
        Some(s) => {
            let idx = DeviceStatus::ALL.iter().position(|x| *x == s)?;
            DeviceStatus::ALL.get(idx + 1).copied()
        }
    }
}

/// `None` (all) → each known type in order → back to `None`.
fn next_kind_filter(cur: Option<&str>, kinds: &BTreeSet<String>) -> Option<String> {
    match cur {
        None => kinds.iter().next().cloned(),
        Some(k) => kinds.iter().find(|x| x.as_str() > k).cloned(),
    }
}
