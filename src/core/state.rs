// Session state owned by the pipeline controller

use crate::api::TorrentApi;
use crate::stores::tracker_hosts::TrackerHostStore;
use std::fmt;
use std::sync::Arc;

/// Where the controller stands with the daemon
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session and no polling
    Idle,
    /// Login in flight; further connect attempts are rejected
    Connecting,
    /// Authenticated; the poll timer runs when auto refresh is on
    Polling,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Polling => "connected",
        };
        f.write_str(label)
    }
}

/// An authenticated connection to one daemon
///
/// Everything tied to the daemon lives here and is dropped together on
/// disconnect or profile switch. Background tasks carry `generation` so
/// their results can be discarded once the session is gone.
#[derive(Clone)]
pub struct Session {
    /// Authenticated API handle
    pub api: Arc<dyn TorrentApi>,

    /// Profile the session was opened for
    pub profile: String,

    /// Generation current when the session was opened
    pub generation: u64,

    /// Tracker hosts discovered for this daemon's torrents
    pub trackers: Arc<TrackerHostStore>,
}

impl Session {
    pub fn new(api: Arc<dyn TorrentApi>, profile: impl Into<String>, generation: u64) -> Self {
        Self {
            api,
            profile: profile.into(),
            generation,
            trackers: Arc::new(TrackerHostStore::new()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("profile", &self.profile)
            .field("generation", &self.generation)
            .field("authenticated", &self.api.is_authenticated())
            .field("tracker_entries", &self.trackers.len())
            .finish()
    }
}
