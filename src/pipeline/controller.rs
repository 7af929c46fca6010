use super::display::{DisplayState, FilterSelection, Refresh, Render};
use super::{
    Command, Message, Options, ProfileEdit, UiUpdate, ADD_REFRESH_DELAY,
    MAX_TRACKER_LOOKUPS_PER_REFRESH, SEARCH_DEBOUNCE,
};
use crate::api::{load_details, Connector, TorrentApi};
use crate::core::config::{AppSettings, SettingsStore};
use crate::core::error::{ApiError, SettingsError};
use crate::core::state::{ConnectionState, Session};
use crate::models::profile::ConnectionSettings;
use crate::models::torrent::{AddSource, AddTorrent, BulkAction, StatusFilter, TorrentSnapshot};
use crate::stores::tracker_hosts::{pending_lookups, tracker_hosts, TrackerHostStore};
use crate::utils::open_item::{is_magnet, normalize_open_item};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Upper bound on the best-effort logout during shutdown
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable sender half used by the user interface
#[derive(Clone, Debug)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ControllerHandle {
    /// Queue a command; false once the controller has stopped
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(Message::Command(command)).is_ok()
    }
}

/// Receiving end of the controller's channel
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Inbox {
    pub(crate) async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Sole owner of pipeline state
///
/// User commands and background task results arrive on one channel and are
/// handled one at a time. Network work is spawned and reports back tagged
/// with the generation it was started under; results from an older
/// generation are dropped.
pub struct Controller {
    settings: AppSettings,
    store: SettingsStore,
    connector: Arc<dyn Connector>,
    tx: mpsc::UnboundedSender<Message>,
    updates: mpsc::UnboundedSender<UiUpdate>,
    generation: u64,
    connecting: bool,
    session: Option<Session>,
    idle_trackers: TrackerHostStore,
    tracker_facets: BTreeSet<String>,
    in_flight: HashSet<String>,
    display: DisplayState,
    /// Status filter the cached snapshot list was fetched with
    fetched_with: Option<StatusFilter>,
    pending_items: Vec<String>,
    next_tick: Option<Instant>,
    search_deadline: Option<Instant>,
}

impl Controller {
    pub fn new(
        settings: AppSettings,
        store: SettingsStore,
        connector: Arc<dyn Connector>,
    ) -> (
        Controller,
        ControllerHandle,
        Inbox,
        mpsc::UnboundedReceiver<UiUpdate>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let display = DisplayState::new(FilterSelection::Status(settings.default_status_filter()));

        let controller = Controller {
            settings,
            store,
            connector,
            tx: tx.clone(),
            updates,
            generation: 0,
            connecting: false,
            session: None,
            idle_trackers: TrackerHostStore::new(),
            tracker_facets: BTreeSet::new(),
            in_flight: HashSet::new(),
            display,
            fetched_with: None,
            pending_items: Vec::new(),
            next_tick: None,
            search_deadline: None,
        };

        (controller, ControllerHandle { tx }, Inbox { rx }, updates_rx)
    }

    /// Process messages until shutdown, then log out if still authenticated
    pub async fn run(mut self, mut inbox: Inbox) {
        info!("Pipeline controller started");
        self.emit_filter_choices();

        loop {
            let next_tick = self.next_tick;
            let search_deadline = self.search_deadline;

            tokio::select! {
                message = inbox.recv() => match message {
                    Some(message) => {
                        if self.handle(message) == Flow::Stop {
                            break;
                        }
                    }
                    None => break,
                },
                _ = sleep_opt(next_tick) => self.on_tick(),
                _ = sleep_opt(search_deadline) => self.flush_search(),
            }
        }

        self.shutdown().await;
    }

    pub(crate) fn handle(&mut self, message: Message) -> Flow {
        match message {
            Message::Command(Command::Shutdown) => return Flow::Stop,
            Message::Command(command) => self.on_command(command),
            Message::LoginFinished {
                generation,
                profile,
                connection,
                result,
            } => self.on_login(generation, profile, connection, result),
            Message::FetchFinished {
                generation,
                filter,
                announce,
                result,
            } => self.on_fetch(generation, filter, announce, result),
            Message::LookupsFinished {
                generation,
                attempted,
            } => self.on_lookups(generation, attempted),
            Message::ActionFinished {
                generation,
                result,
                success,
                failure,
                refresh,
            } => self.on_action(generation, result, success, failure, refresh),
            Message::RefreshDue { generation } => {
                if generation == self.generation {
                    self.fetch(false);
                }
            }
            Message::DetailsLoaded { generation, result } => {
                if generation != self.generation {
                    return Flow::Continue;
                }
                match result {
                    Ok(details) => self.emit(UiUpdate::Details(details)),
                    Err(e) if e.is_auth() => self.session_expired(e),
                    Err(e) => self.error(format!("Failed to load details: {}", e)),
                }
            }
            Message::CategoriesLoaded { generation, names } => {
                if generation == self.generation {
                    self.emit(UiUpdate::Categories(names));
                }
            }
        }
        Flow::Continue
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect(connection) => self.connect(connection),
            Command::Disconnect => self.disconnect(),
            Command::SwitchProfile(name) => self.switch_profile(&name),
            Command::EditProfile(edit) => self.edit_profile(edit),
            Command::ListProfiles => self.emit_profiles(),
            Command::Refresh => self.fetch(true),
            Command::Show => {
                let render = self.display.render(self.trackers());
                self.emit(UiUpdate::Render(render));
            }
            Command::SetFilter(value) => self.set_filter(&value),
            Command::ListFilters => self.emit_filter_choices(),
            Command::Search(text) => self.search(&text),
            Command::Select(hashes) => self.display.select(hashes),
            Command::Action(action) => self.run_action(action),
            Command::Delete {
                delete_files,
                confirmed,
            } => self.delete(delete_files, confirmed),
            Command::Add(request) => self.add(request),
            Command::Open(items) => self.open(items),
            Command::Details(hash) => self.details(hash),
            Command::Categories => self.categories(),
            Command::ShowOptions => self.emit(UiUpdate::Options(self.options())),
            Command::SetOptions(options) => self.set_options(options),
            Command::Shutdown => {}
        }
    }

    // Connection lifecycle

    fn connect(&mut self, connection: Option<ConnectionSettings>) {
        if self.connecting {
            debug!("Login already in flight, connect ignored");
            return;
        }
        if self.session.is_some() {
            self.status("Already connected");
            return;
        }

        let connection = connection.unwrap_or_else(|| self.settings.connection.clone());
        let profile = self.settings.active_profile.clone();
        let api = match self.connector.open(&connection) {
            Ok(api) => api,
            Err(e) => {
                warn!(host = %connection.host, error = %e, "Cannot build client");
                self.error(format!("Could not connect: {}", e));
                self.status("Connection failed");
                return;
            }
        };

        info!(profile = %profile, host = %connection.host, "Connecting");
        self.connecting = true;
        self.status("Connecting…");
        self.emit(UiUpdate::Connection {
            state: ConnectionState::Connecting,
            profile: profile.clone(),
        });

        let generation = self.generation;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match api.login().await {
                Ok(()) => Ok(api),
                Err(e) => Err(e),
            };
            let _ = tx.send(Message::LoginFinished {
                generation,
                profile,
                connection,
                result,
            });
        });
    }

    fn on_login(
        &mut self,
        generation: u64,
        profile: String,
        connection: ConnectionSettings,
        result: Result<Arc<dyn TorrentApi>, ApiError>,
    ) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Discarding stale login");
            if let Ok(api) = result {
                spawn_logout(api);
            }
            return;
        }
        self.connecting = false;

        match result {
            Ok(api) => {
                info!(profile = %profile, "Connected");
                self.session = Some(Session::new(api, profile.clone(), generation));
                self.settings.set_active_connection(connection);
                self.persist();
                self.emit(UiUpdate::Connection {
                    state: ConnectionState::Polling,
                    profile,
                });
                self.status("Connected");
                self.schedule_tick();
                self.fetch(true);
                self.process_pending();
            }
            Err(e) => {
                warn!(profile = %profile, error = %e, "Login failed");
                self.error(format!("Could not connect: {}", e));
                self.status("Connection failed");
                self.emit(UiUpdate::Connection {
                    state: ConnectionState::Idle,
                    profile,
                });
            }
        }
    }

    fn disconnect(&mut self) {
        info!(profile = %self.settings.active_profile, "Disconnecting");
        self.reset_session();
        self.status("Disconnected");
        self.emit(UiUpdate::Connection {
            state: ConnectionState::Idle,
            profile: self.settings.active_profile.clone(),
        });
    }

    fn session_expired(&mut self, error: ApiError) {
        warn!(error = %error, "Session expired");
        self.reset_session();
        self.error(error.to_string());
        self.status("Disconnected");
        self.emit(UiUpdate::Connection {
            state: ConnectionState::Idle,
            profile: self.settings.active_profile.clone(),
        });
    }

    /// Drop the session and everything derived from it
    fn reset_session(&mut self) {
        self.generation += 1;
        self.connecting = false;
        self.next_tick = None;
        self.search_deadline = None;

        if let Some(session) = self.session.take() {
            if session.api.is_authenticated() {
                spawn_logout(session.api);
            }
        }

        self.in_flight.clear();
        self.tracker_facets.clear();
        self.fetched_with = None;
        if self.display.filter().is_tracker() {
            let fallback = FilterSelection::Status(self.settings.default_status_filter());
            self.display.set_filter(fallback);
        }
        self.display.clear();
        self.emit_filter_choices();
        self.emit(UiUpdate::Render(Render::empty()));
    }

    fn switch_profile(&mut self, name: &str) {
        if self.settings.profile(name).is_none() {
            self.error(format!("Unknown profile '{}'", name));
            return;
        }
        if name == self.settings.active_profile && (self.session.is_some() || self.connecting) {
            self.status("Already connected");
            return;
        }

        info!(profile = %name, "Switching profile");
        self.reset_session();
        if let Err(e) = self.settings.activate(name) {
            self.error(settings_message(e));
            return;
        }
        self.persist();
        self.emit_profiles();
        self.status(format!("Switching to '{}'…", name));
        self.connect(None);
    }

    fn edit_profile(&mut self, edit: ProfileEdit) {
        let result = match edit {
            ProfileEdit::Save { name, connection } => {
                let name = name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| self.settings.unique_name("Profile"));
                self.settings.upsert_profile(&name, connection);
                Ok(())
            }
            ProfileEdit::Remove(name) => self.settings.remove_profile(&name),
            ProfileEdit::Rename { from, to } => {
                let result = self.settings.rename_profile(&from, &to);
                if result.is_ok() {
                    if let Some(session) = self.session.as_mut() {
                        if session.profile == from {
                            session.profile = to.trim().to_string();
                        }
                    }
                }
                result
            }
            ProfileEdit::Move { name, delta } => {
                self.settings.move_profile(&name, delta).map(|_| ())
            }
        };

        if let Err(e) = result {
            self.error(settings_message(e));
            return;
        }
        self.persist();
        self.emit_profiles();
        self.status("Profiles updated");

        // The connected profile was removed; follow the new active one
        let orphaned = self
            .session
            .as_ref()
            .map(|session| session.profile != self.settings.active_profile)
            .unwrap_or(false);
        if orphaned {
            let next = self.settings.active_profile.clone();
            self.reset_session();
            self.status(format!("Switching to '{}'…", next));
            self.connect(None);
        }
    }

    // Fetch cycle

    fn on_tick(&mut self) {
        self.next_tick = None;
        if self.session.is_some() {
            self.schedule_tick();
            self.fetch(false);
        }
    }

    fn schedule_tick(&mut self) {
        self.next_tick = if self.session.is_some() && self.settings.auto_refresh {
            Some(Instant::now() + self.settings.refresh_interval())
        } else {
            None
        };
    }

    fn fetch(&mut self, announce: bool) {
        let Some(session) = &self.session else {
            if announce {
                self.status("Not connected");
            }
            return;
        };

        let api = session.api.clone();
        let generation = self.generation;
        let filter = self.display.filter().api_filter();
        let tx = self.tx.clone();
        if announce {
            self.status("Refreshing torrents…");
        }

        debug!(filter = %filter, generation, "Fetching torrents");
        tokio::spawn(async move {
            let result = api.list(filter).await;
            let _ = tx.send(Message::FetchFinished {
                generation,
                filter,
                announce,
                result,
            });
        });
    }

    fn on_fetch(
        &mut self,
        generation: u64,
        filter: StatusFilter,
        announce: bool,
        result: Result<Vec<TorrentSnapshot>, ApiError>,
    ) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Discarding stale fetch");
            return;
        }
        if filter != self.display.filter().api_filter() {
            debug!(filter = %filter, "Discarding fetch for a previous filter");
            return;
        }

        match result {
            Ok(snapshots) => {
                debug!(count = snapshots.len(), "Fetched torrents");
                self.display.replace_snapshots(snapshots);
                self.fetched_with = Some(filter);
                self.schedule_lookups();
                self.apply_filters(announce);
            }
            Err(e) if e.is_auth() => self.session_expired(e),
            Err(e) => {
                warn!(error = %e, "Refresh failed");
                self.error(format!("Failed to refresh: {}", e));
            }
        }
    }

    fn schedule_lookups(&mut self) {
        let Some(session) = &self.session else {
            return;
        };

        let pending = pending_lookups(
            self.display.snapshots().iter().map(|snapshot| snapshot.hash.as_str()),
            &session.trackers,
            &self.in_flight,
            MAX_TRACKER_LOOKUPS_PER_REFRESH,
        );
        if pending.is_empty() {
            return;
        }

        debug!(count = pending.len(), "Scheduling tracker lookups");
        self.in_flight.extend(pending.iter().cloned());
        tokio::spawn(lookup_batch(
            session.api.clone(),
            session.trackers.clone(),
            pending,
            self.generation,
            self.tx.clone(),
        ));
    }

    fn on_lookups(&mut self, generation: u64, attempted: Vec<String>) {
        if generation != self.generation {
            return;
        }
        for hash in &attempted {
            self.in_flight.remove(hash);
        }

        let Some(session) = &self.session else {
            return;
        };
        let known = session.trackers.known_hosts();
        let before = self.tracker_facets.len();
        self.tracker_facets.extend(known);
        if self.tracker_facets.len() != before {
            debug!(hosts = self.tracker_facets.len(), "New tracker hosts discovered");
            self.emit_filter_choices();
        }
        // Torrents on an already known host become visible only now
        if self.display.filter().is_tracker() {
            self.apply_filters(false);
        }
    }

    fn apply_filters(&mut self, announce: bool) {
        let trackers = match &self.session {
            Some(session) => session.trackers.as_ref(),
            None => &self.idle_trackers,
        };

        let count = match self.display.refresh(trackers) {
            Refresh::Unchanged { count } => count,
            Refresh::Changed(render) => {
                let count = render.rows.len();
                self.emit(UiUpdate::Render(render));
                count
            }
        };
        if announce {
            self.status(format!("Loaded {} torrents", count));
        }
    }

    // Filters

    fn set_filter(&mut self, value: &str) {
        let selection = FilterSelection::parse(value);
        if let FilterSelection::Tracker(host) = &selection {
            if !self.tracker_facets.contains(host) {
                self.error(format!("Unknown filter '{}'", value.trim()));
                return;
            }
        }

        self.display.set_filter(selection.clone());
        self.emit_filter_choices();
        match selection {
            FilterSelection::Status(status) => {
                self.settings.default_filter = status.as_str().to_string();
                if let Err(e) = self.store.save(&self.settings) {
                    warn!(error = %e, "Failed to save filter");
                    self.error(format!("Failed to save filter: {}", e));
                }
                if self.session.is_some() {
                    self.fetch(true);
                }
            }
            FilterSelection::Tracker(_) => {
                self.apply_filters(true);
                // A status-narrowed list would hide torrents of this tracker
                if self.session.is_some() && self.fetched_with != Some(StatusFilter::All) {
                    self.fetch(true);
                }
            }
        }
    }

    fn search(&mut self, text: &str) {
        self.display.set_search(text);
        self.search_deadline = Some(Instant::now() + SEARCH_DEBOUNCE);
    }

    fn flush_search(&mut self) {
        self.search_deadline = None;
        self.apply_filters(true);
    }

    // Actions

    fn run_action(&mut self, action: BulkAction) {
        if let BulkAction::Delete { delete_files } = action {
            self.delete(delete_files, false);
            return;
        }
        let Some(session) = &self.session else {
            self.error("Connect to a qBittorrent server first");
            return;
        };
        let hashes = self.display.selection().to_vec();
        if hashes.is_empty() {
            self.error("Select a torrent first");
            return;
        }

        let label = action.label();
        self.spawn_action(
            session.api.clone(),
            action,
            hashes,
            Some(format!("Action '{}' submitted", label)),
            format!("Failed to {}", label),
        );
    }

    fn delete(&mut self, delete_files: bool, confirmed: bool) {
        let Some(session) = &self.session else {
            self.error("Connect to a qBittorrent server first");
            return;
        };
        let hashes = self.display.selection().to_vec();
        if hashes.is_empty() {
            self.error("Select a torrent first");
            return;
        }
        if self.settings.confirm_delete && !confirmed {
            self.emit(UiUpdate::ConfirmDelete {
                count: hashes.len(),
                delete_files,
            });
            return;
        }

        self.spawn_action(
            session.api.clone(),
            BulkAction::Delete { delete_files },
            hashes,
            None,
            "Delete failed".to_string(),
        );
    }

    fn spawn_action(
        &self,
        api: Arc<dyn TorrentApi>,
        action: BulkAction,
        hashes: Vec<String>,
        success: Option<String>,
        failure: String,
    ) {
        info!(action = action.label(), count = hashes.len(), "Submitting action");
        let generation = self.generation;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.bulk_action(action, &hashes).await;
            let _ = tx.send(Message::ActionFinished {
                generation,
                result,
                success,
                failure,
                refresh: true,
            });
        });
    }

    fn on_action(
        &mut self,
        generation: u64,
        result: Result<(), ApiError>,
        success: Option<String>,
        failure: String,
        refresh: bool,
    ) {
        if generation != self.generation {
            return;
        }
        match result {
            Ok(()) => {
                if let Some(message) = success {
                    self.status(message);
                }
                if refresh {
                    self.fetch(false);
                }
            }
            Err(e) if e.is_auth() => self.session_expired(e),
            Err(e) => {
                warn!(error = %e, "{}", failure);
                self.error(format!("{}: {}", failure, e));
            }
        }
    }

    fn add(&mut self, request: AddTorrent) {
        let Some(session) = &self.session else {
            self.error("Connect to a qBittorrent server first");
            return;
        };
        let blank = match &request.source {
            AddSource::Url(url) => url.trim().is_empty(),
            AddSource::File(path) => path.as_os_str().is_empty(),
        };
        if blank {
            self.error("Provide a magnet link or torrent file");
            return;
        }

        self.spawn_add(session.api.clone(), request);
    }

    fn spawn_add(&self, api: Arc<dyn TorrentApi>, request: AddTorrent) {
        let generation = self.generation;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match api.add(&request).await {
                Ok(()) => {
                    let _ = tx.send(Message::ActionFinished {
                        generation,
                        result: Ok(()),
                        success: Some("Torrent added".to_string()),
                        failure: String::new(),
                        refresh: false,
                    });
                    tokio::time::sleep(ADD_REFRESH_DELAY).await;
                    let _ = tx.send(Message::RefreshDue { generation });
                }
                Err(e) => {
                    let _ = tx.send(Message::ActionFinished {
                        generation,
                        result: Err(e),
                        success: None,
                        failure: "Failed to add torrent".to_string(),
                        refresh: false,
                    });
                }
            }
        });
    }

    fn open(&mut self, items: Vec<String>) {
        let items: Vec<String> = items
            .iter()
            .filter_map(|item| normalize_open_item(item))
            .collect();
        if items.is_empty() {
            return;
        }

        self.pending_items.extend(items);
        if self.session.is_some() {
            self.process_pending();
        } else {
            self.status("Pending torrents will be added after connecting");
        }
    }

    fn process_pending(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let api = session.api.clone();

        for item in std::mem::take(&mut self.pending_items) {
            if is_magnet(&item) {
                self.spawn_add(api.clone(), AddTorrent::new(AddSource::Url(item)));
                continue;
            }
            let path = PathBuf::from(&item);
            if path.exists() {
                self.spawn_add(api.clone(), AddTorrent::new(AddSource::File(path)));
            } else {
                warn!(item = %item, "Queued torrent file is missing");
                self.error(format!("Cannot open '{}': file not found", item));
            }
        }
    }

    fn details(&mut self, hash: Option<String>) {
        let Some(session) = &self.session else {
            self.error("Connect to a qBittorrent server first");
            return;
        };
        let hash = hash
            .or_else(|| self.display.focused().map(str::to_string))
            .or_else(|| self.display.selection().first().cloned());
        let Some(hash) = hash else {
            self.error("Select a torrent first");
            return;
        };

        let name = self
            .display
            .find(&hash)
            .map(|snapshot| snapshot.name.clone())
            .unwrap_or_else(|| hash.clone());
        let api = session.api.clone();
        let generation = self.generation;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = load_details(api.as_ref(), &hash, &name).await;
            let _ = tx.send(Message::DetailsLoaded { generation, result });
        });
    }

    fn categories(&mut self) {
        let Some(session) = &self.session else {
            self.emit(UiUpdate::Categories(Vec::new()));
            return;
        };

        let api = session.api.clone();
        let generation = self.generation;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let names = match api.categories().await {
                Ok(categories) => categories.into_keys().collect(),
                Err(e) => {
                    warn!(error = %e, "Failed to load categories");
                    Vec::new()
                }
            };
            let _ = tx.send(Message::CategoriesLoaded { generation, names });
        });
    }

    // Settings

    fn options(&self) -> Options {
        Options {
            refresh_seconds: self.settings.refresh_seconds,
            auto_refresh: self.settings.auto_refresh,
            default_filter: self.settings.default_filter.clone(),
            confirm_delete: self.settings.confirm_delete,
        }
    }

    fn set_options(&mut self, options: Options) {
        self.settings.refresh_seconds = options.refresh_seconds;
        self.settings.auto_refresh = options.auto_refresh;
        self.settings.default_filter = StatusFilter::parse_or_default(&options.default_filter)
            .as_str()
            .to_string();
        self.settings.confirm_delete = options.confirm_delete;

        self.persist();
        self.schedule_tick();
        self.status("Options saved");
        self.emit(UiUpdate::Options(self.options()));
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.settings) {
            warn!(path = %self.store.path().display(), error = %e, "Failed to save settings");
            self.error(format!("Failed to save settings: {}", e));
        }
    }

    // Output

    fn trackers(&self) -> &TrackerHostStore {
        match &self.session {
            Some(session) => session.trackers.as_ref(),
            None => &self.idle_trackers,
        }
    }

    fn emit_filter_choices(&self) {
        let mut choices: Vec<String> = StatusFilter::ALL
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();
        choices.extend(self.tracker_facets.iter().cloned());
        self.emit(UiUpdate::FilterChoices {
            choices,
            selected: self.display.filter().to_string(),
        });
    }

    fn emit_profiles(&self) {
        self.emit(UiUpdate::Profiles {
            names: self.settings.profile_names(),
            active: self.settings.active_profile.clone(),
        });
    }

    fn status(&self, message: impl Into<String>) {
        self.emit(UiUpdate::Status(message.into()));
    }

    fn error(&self, message: impl Into<String>) {
        self.emit(UiUpdate::Error(message.into()));
    }

    fn emit(&self, update: UiUpdate) {
        if self.updates.send(update).is_err() {
            debug!("User interface gone, update dropped");
        }
    }

    async fn shutdown(mut self) {
        self.next_tick = None;
        self.generation += 1;

        if let Some(session) = self.session.take() {
            if session.api.is_authenticated() {
                match tokio::time::timeout(LOGOUT_TIMEOUT, session.api.logout()).await {
                    Ok(Ok(())) => info!(profile = %session.profile, "Logged out"),
                    Ok(Err(e)) => warn!(error = %e, "Logout failed"),
                    Err(_) => warn!("Logout timed out"),
                }
            }
        }
        info!("Pipeline controller stopped");
    }
}

/// Look up trackers for a batch of torrents, one request at a time
async fn lookup_batch(
    api: Arc<dyn TorrentApi>,
    store: Arc<TrackerHostStore>,
    hashes: Vec<String>,
    generation: u64,
    tx: mpsc::UnboundedSender<Message>,
) {
    for hash in &hashes {
        match api.trackers(hash).await {
            Ok(entries) => store.record(hash, tracker_hosts(&entries)),
            Err(e) if e.is_transient() || e.is_auth() => {
                debug!(hash = %hash, error = %e, "Tracker lookup will be retried");
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "Tracker lookup failed");
                store.record(hash, BTreeSet::new());
            }
        }
    }
    let _ = tx.send(Message::LookupsFinished {
        generation,
        attempted: hashes,
    });
}

fn spawn_logout(api: Arc<dyn TorrentApi>) {
    tokio::spawn(async move {
        if let Err(e) = api.logout().await {
            debug!(error = %e, "Logout failed");
        }
    });
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn settings_message(error: SettingsError) -> String {
    match error {
        SettingsError::Invalid(message) => message,
        other => other.to_string(),
    }
}
