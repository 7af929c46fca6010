use crate::models::torrent::{StatusFilter, TorrentSnapshot};
use crate::stores::tracker_hosts::TrackerHostStore;
use std::collections::HashMap;
use std::fmt;

/// The filter facet chosen by the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterSelection {
    /// Narrowed by the daemon
    Status(StatusFilter),
    /// Narrowed locally using discovered tracker hosts
    Tracker(String),
}

impl Default for FilterSelection {
    fn default() -> Self {
        FilterSelection::Status(StatusFilter::All)
    }
}

impl FilterSelection {
    /// Status keywords win; anything else names a tracker host
    pub fn parse(value: &str) -> Self {
        match value.parse::<StatusFilter>() {
            Ok(status) => FilterSelection::Status(status),
            Err(_) => FilterSelection::Tracker(value.trim().to_ascii_lowercase()),
        }
    }

    /// Filter sent to `torrents/info`; tracker filtering needs the full list
    pub fn api_filter(&self) -> StatusFilter {
        match self {
            FilterSelection::Status(status) => *status,
            FilterSelection::Tracker(_) => StatusFilter::All,
        }
    }

    pub fn is_tracker(&self) -> bool {
        matches!(self, FilterSelection::Tracker(_))
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSelection::Status(status) => f.write_str(status.as_str()),
            FilterSelection::Tracker(host) => f.write_str(host),
        }
    }
}

/// Selection and focus, remembered by hash across re-renders
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewAnchor {
    pub selected: Vec<String>,
    pub focused: Option<String>,
}

/// A full redraw of the torrent list
#[derive(Clone, Debug, PartialEq)]
pub struct Render {
    pub rows: Vec<TorrentSnapshot>,
    /// Row indices to select after drawing
    pub selected: Vec<usize>,
    /// Row index to focus and scroll into view
    pub focused: Option<usize>,
}

impl Render {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            selected: Vec::new(),
            focused: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Refresh {
    /// Same hashes in the same order as last time; nothing to redraw
    Unchanged { count: usize },
    Changed(Render),
}

/// Latest snapshot plus the filters and view state applied to it
#[derive(Debug, Default)]
pub struct DisplayState {
    snapshots: Vec<TorrentSnapshot>,
    filter: FilterSelection,
    search: String,
    displayed: Vec<String>,
    anchor: ViewAnchor,
}

impl DisplayState {
    pub fn new(filter: FilterSelection) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// The server is authoritative: each fetch replaces the whole list
    pub fn replace_snapshots(&mut self, snapshots: Vec<TorrentSnapshot>) {
        self.snapshots = snapshots;
    }

    pub fn snapshots(&self) -> &[TorrentSnapshot] {
        &self.snapshots
    }

    pub fn filter(&self) -> &FilterSelection {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterSelection) {
        self.filter = filter;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
    }

    /// Hashes of the rows last handed out for rendering, in order
    pub fn displayed(&self) -> &[String] {
        &self.displayed
    }

    pub fn selection(&self) -> &[String] {
        &self.anchor.selected
    }

    pub fn focused(&self) -> Option<&str> {
        self.anchor.focused.as_deref()
    }

    /// Replace the selection; the last selected row takes focus
    pub fn select(&mut self, hashes: Vec<String>) {
        if let Some(last) = hashes.last() {
            self.anchor.focused = Some(last.clone());
        }
        self.anchor.selected = hashes;
    }

    pub fn find(&self, hash: &str) -> Option<&TorrentSnapshot> {
        self.snapshots.iter().find(|snapshot| snapshot.hash == hash)
    }

    /// Snapshot rows passing the tracker and text filters, in server order
    pub fn visible<'a>(&'a self, trackers: &TrackerHostStore) -> Vec<&'a TorrentSnapshot> {
        let term = self.search.trim().to_lowercase();
        self.snapshots
            .iter()
            .filter(|snapshot| match &self.filter {
                FilterSelection::Tracker(host) => trackers.has_host(&snapshot.hash, host),
                FilterSelection::Status(_) => true,
            })
            .filter(|snapshot| term.is_empty() || snapshot.name.to_lowercase().contains(&term))
            .collect()
    }

    /// Current rows with view state, regardless of whether they changed
    pub fn render(&self, trackers: &TrackerHostStore) -> Render {
        let rows: Vec<TorrentSnapshot> = self.visible(trackers).into_iter().cloned().collect();
        self.anchor_rows(rows)
    }

    /// Recompute the visible rows; only a changed hash list needs a redraw
    pub fn refresh(&mut self, trackers: &TrackerHostStore) -> Refresh {
        let rows: Vec<TorrentSnapshot> = self.visible(trackers).into_iter().cloned().collect();
        let hashes: Vec<String> = rows.iter().map(|row| row.hash.clone()).collect();
        if hashes == self.displayed {
            return Refresh::Unchanged { count: rows.len() };
        }

        self.anchor.selected.retain(|hash| hashes.contains(hash));
        if let Some(focused) = &self.anchor.focused {
            if !hashes.contains(focused) {
                self.anchor.focused = None;
            }
        }
        self.displayed = hashes;
        Refresh::Changed(self.anchor_rows(rows))
    }

    fn anchor_rows(&self, rows: Vec<TorrentSnapshot>) -> Render {
        let index: HashMap<&str, usize> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.hash.as_str(), i))
            .collect();
        let selected = self
            .anchor
            .selected
            .iter()
            .filter_map(|hash| index.get(hash.as_str()).copied())
            .collect();
        let focused = self
            .anchor
            .focused
            .as_deref()
            .and_then(|hash| index.get(hash).copied());

        Render {
            rows,
            selected,
            focused,
        }
    }

    /// Forget everything tied to the current session
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.displayed.clear();
        self.anchor = ViewAnchor::default();
    }
}
