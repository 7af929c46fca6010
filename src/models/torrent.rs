use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// One torrent as reported by `torrents/info`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TorrentSnapshot {
    /// Info hash, the stable identifier of a torrent
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_state")]
    pub state: String,
    /// Fraction in `0.0..=1.0`
    #[serde(default)]
    pub progress: f64,
    /// Bytes per second
    #[serde(default, rename = "dlspeed")]
    pub download_rate: i64,
    /// Bytes per second
    #[serde(default, rename = "upspeed")]
    pub upload_rate: i64,
    /// Seconds remaining; negative means unknown
    #[serde(default = "default_eta")]
    pub eta: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub ratio: f64,
    #[serde(default, rename = "num_seeds")]
    pub seeds: i64,
    #[serde(default, rename = "num_leechs")]
    pub peers: i64,
}

fn default_state() -> String {
    "unknown".to_string()
}

fn default_eta() -> i64 {
    -1
}

impl TorrentSnapshot {
    /// Minimal snapshot, mostly useful for tests and placeholders
    pub fn new(hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            name: name.into(),
            state: default_state(),
            progress: 0.0,
            download_rate: 0,
            upload_rate: 0,
            eta: default_eta(),
            category: String::new(),
            ratio: 0.0,
            seeds: 0,
            peers: 0,
        }
    }
}

/// Status filters understood by `torrents/info`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Downloading,
    Seeding,
    Completed,
    Paused,
    Resumed,
    Stalled,
    Errored,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 8] = [
        StatusFilter::All,
        StatusFilter::Downloading,
        StatusFilter::Seeding,
        StatusFilter::Completed,
        StatusFilter::Paused,
        StatusFilter::Resumed,
        StatusFilter::Stalled,
        StatusFilter::Errored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Downloading => "downloading",
            StatusFilter::Seeding => "seeding",
            StatusFilter::Completed => "completed",
            StatusFilter::Paused => "paused",
            StatusFilter::Resumed => "resumed",
            StatusFilter::Stalled => "stalled",
            StatusFilter::Errored => "errored",
        }
    }

    /// Parse a persisted filter name, falling back to `All` for unknown values
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StatusFilter::ALL
            .iter()
            .copied()
            .find(|filter| filter.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown status filter '{}'", wanted))
    }
}

/// Where a new torrent comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddSource {
    /// Magnet link or HTTP(S) URL passed to the daemon as-is
    Url(String),
    /// Local `.torrent` file uploaded by the client
    File(std::path::PathBuf),
}

impl AddSource {
    /// Classify free-form user input as a URL or a local path
    pub fn classify(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("magnet:") || lower.starts_with("http://") || lower.starts_with("https://") {
            Some(AddSource::Url(trimmed.to_string()))
        } else {
            Some(AddSource::File(std::path::PathBuf::from(trimmed)))
        }
    }
}

/// A request for `torrents/add`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddTorrent {
    pub source: AddSource,
    pub category: Option<String>,
    pub save_path: Option<String>,
}

impl AddTorrent {
    pub fn new(source: AddSource) -> Self {
        Self {
            source,
            category: None,
            save_path: None,
        }
    }
}

/// Bulk operations over a set of torrent hashes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAction {
    Pause,
    Resume,
    Recheck,
    IncreasePriority,
    DecreasePriority,
    Delete { delete_files: bool },
}

impl BulkAction {
    pub fn endpoint(&self) -> &'static str {
        match self {
            BulkAction::Pause => "torrents/pause",
            BulkAction::Resume => "torrents/resume",
            BulkAction::Recheck => "torrents/recheck",
            BulkAction::IncreasePriority => "torrents/increasePrio",
            BulkAction::DecreasePriority => "torrents/decreasePrio",
            BulkAction::Delete { .. } => "torrents/delete",
        }
    }

    /// Short name used in status messages
    pub fn label(&self) -> &'static str {
        match self {
            BulkAction::Pause => "pause",
            BulkAction::Resume => "resume",
            BulkAction::Recheck => "recheck",
            BulkAction::IncreasePriority => "increase priority",
            BulkAction::DecreasePriority => "decrease priority",
            BulkAction::Delete { .. } => "delete",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TrackerEntry {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub tier: i64,
    #[serde(default)]
    pub num_peers: i64,
    #[serde(default)]
    pub msg: String,
}

impl TrackerEntry {
    pub fn status_label(&self) -> &'static str {
        match self.status {
            0 => "disabled",
            1 => "not contacted",
            2 => "working",
            3 => "updating",
            4 => "not working",
            _ => "unknown",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TorrentFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Category {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "savePath")]
    pub save_path: String,
}

/// Properties, files and trackers of a single torrent
#[derive(Clone, Debug, PartialEq)]
pub struct TorrentDetails {
    pub hash: String,
    pub name: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub files: Vec<TorrentFile>,
    pub trackers: Vec<TrackerEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_defaults_for_missing_fields() {
        let snapshot: TorrentSnapshot =
            serde_json::from_str(r#"{"hash":"abc","name":"Ubuntu"}"#).unwrap();
        assert_eq!(snapshot.hash, "abc");
        assert_eq!(snapshot.state, "unknown");
        assert_eq!(snapshot.eta, -1);
        assert_eq!(snapshot.seeds, 0);
    }

    #[test]
    fn test_snapshot_field_renames() {
        let snapshot: TorrentSnapshot = serde_json::from_str(
            r#"{"hash":"h","name":"n","state":"uploading","progress":0.5,
                "dlspeed":1024,"upspeed":2048,"eta":60,"category":"linux",
                "ratio":1.25,"num_seeds":7,"num_leechs":3,"extra":true}"#,
        )
        .unwrap();
        assert_eq!(snapshot.download_rate, 1024);
        assert_eq!(snapshot.upload_rate, 2048);
        assert_eq!(snapshot.seeds, 7);
        assert_eq!(snapshot.peers, 3);
        assert_eq!(snapshot.category, "linux");
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!("seeding".parse::<StatusFilter>(), Ok(StatusFilter::Seeding));
        assert_eq!(" Paused ".parse::<StatusFilter>(), Ok(StatusFilter::Paused));
        assert!("tracker.example.com".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::parse_or_default("bogus"), StatusFilter::All);
        assert_eq!(StatusFilter::ALL[0].as_str(), "all");
    }

    #[test]
    fn test_add_source_classification() {
        assert_eq!(
            AddSource::classify("magnet:?xt=urn:btih:abc"),
            Some(AddSource::Url("magnet:?xt=urn:btih:abc".to_string()))
        );
        assert_eq!(
            AddSource::classify("HTTPS://example.com/a.torrent"),
            Some(AddSource::Url("HTTPS://example.com/a.torrent".to_string()))
        );
        assert_eq!(
            AddSource::classify("/tmp/a.torrent"),
            Some(AddSource::File("/tmp/a.torrent".into()))
        );
        assert_eq!(AddSource::classify("   "), None);
    }

    #[test]
    fn test_tracker_status_label() {
        let entry: TrackerEntry =
            serde_json::from_str(r#"{"url":"udp://t.example:80","status":2}"#).unwrap();
        assert_eq!(entry.status_label(), "working");
    }
}
