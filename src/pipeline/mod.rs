pub mod controller;
pub mod display;

use crate::core::error::ApiError;
use crate::core::state::ConnectionState;
use crate::models::profile::ConnectionSettings;
use crate::models::torrent::{AddTorrent, BulkAction, StatusFilter, TorrentDetails, TorrentSnapshot};
use display::Render;
use std::sync::Arc;
use std::time::Duration;

pub use controller::{Controller, ControllerHandle, Inbox};

/// Torrents looked up for tracker hosts per fetch cycle, at most
pub const MAX_TRACKER_LOOKUPS_PER_REFRESH: usize = 40;

/// Quiet period after the last search edit before the list is recomputed
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Delay between a successful add and the follow-up refresh
pub const ADD_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Requests from the user interface
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Connect with the given parameters, or the active profile's
    Connect(Option<ConnectionSettings>),
    Disconnect,
    SwitchProfile(String),
    EditProfile(ProfileEdit),
    ListProfiles,
    Refresh,
    /// Re-emit the current rows without fetching
    Show,
    SetFilter(String),
    ListFilters,
    Search(String),
    Select(Vec<String>),
    Action(BulkAction),
    Delete { delete_files: bool, confirmed: bool },
    Add(AddTorrent),
    Open(Vec<String>),
    /// Details of the given torrent, or of the focused one
    Details(Option<String>),
    Categories,
    ShowOptions,
    SetOptions(Options),
    Shutdown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProfileEdit {
    /// Add a profile or update an existing one; a missing name picks a free one
    Save {
        name: Option<String>,
        connection: ConnectionSettings,
    },
    Remove(String),
    Rename { from: String, to: String },
    Move { name: String, delta: isize },
}

/// User-editable behaviour settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub refresh_seconds: u64,
    pub auto_refresh: bool,
    pub default_filter: String,
    pub confirm_delete: bool,
}

/// Notifications for the user interface
#[derive(Clone, Debug, PartialEq)]
pub enum UiUpdate {
    Status(String),
    Error(String),
    Connection {
        state: ConnectionState,
        profile: String,
    },
    Render(Render),
    FilterChoices {
        choices: Vec<String>,
        selected: String,
    },
    /// Delete needs an explicit yes; answer with a confirmed `Command::Delete`
    ConfirmDelete { count: usize, delete_files: bool },
    Details(TorrentDetails),
    Categories(Vec<String>),
    Profiles { names: Vec<String>, active: String },
    Options(Options),
}

/// Everything the controller consumes: user commands and task results
pub(crate) enum Message {
    Command(Command),
    LoginFinished {
        generation: u64,
        profile: String,
        connection: ConnectionSettings,
        result: Result<Arc<dyn crate::api::TorrentApi>, ApiError>,
    },
    FetchFinished {
        generation: u64,
        filter: StatusFilter,
        announce: bool,
        result: Result<Vec<TorrentSnapshot>, ApiError>,
    },
    LookupsFinished {
        generation: u64,
        attempted: Vec<String>,
    },
    ActionFinished {
        generation: u64,
        result: Result<(), ApiError>,
        success: Option<String>,
        failure: String,
        refresh: bool,
    },
    RefreshDue {
        generation: u64,
    },
    DetailsLoaded {
        generation: u64,
        result: Result<TorrentDetails, ApiError>,
    },
    CategoriesLoaded {
        generation: u64,
        names: Vec<String>,
    },
}
