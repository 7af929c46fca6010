use crate::core::error::SettingsError;
use crate::models::profile::{ConnectionProfile, ConnectionSettings};
use crate::models::torrent::StatusFilter;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_PROFILE: &str = "Default";

/// Polling never runs faster than this, whatever the settings say
pub const MIN_REFRESH_SECONDS: u64 = 3;

/// User preferences plus the ordered list of connection profiles
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    /// Mirror of the active profile's connection, kept for older settings files
    pub connection: ConnectionSettings,
    pub refresh_seconds: u64,
    pub auto_refresh: bool,
    pub default_filter: String,
    pub confirm_delete: bool,
    pub profiles: Vec<ConnectionProfile>,
    pub active_profile: String,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "console"];

impl LoggingConfig {
    /// Replace unknown values with defaults, one field at a time
    fn repaired(self) -> Self {
        let level = if LOG_LEVELS.contains(&self.level.as_str()) {
            self.level
        } else {
            warn!(
                level = %self.level,
                "Invalid log level. Must be one of: trace, debug, info, warn, error"
            );
            default_log_level()
        };
        let format = if LOG_FORMATS.contains(&self.format.as_str()) {
            self.format
        } else {
            warn!(format = %self.format, "Invalid log format. Must be one of: json, console");
            default_log_format()
        };
        Self { level, format }
    }
}

fn default_refresh_seconds() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_filter_name() -> String {
    StatusFilter::All.as_str().to_string()
}

/// On-disk shape of the settings file
#[derive(Debug, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection: Option<ConnectionSettings>,
    #[serde(default = "default_refresh_seconds")]
    refresh_seconds: u64,
    #[serde(default = "default_true")]
    auto_refresh: bool,
    #[serde(default = "default_filter_name")]
    default_filter: String,
    #[serde(default = "default_true")]
    confirm_delete: bool,
    #[serde(default)]
    profiles: ProfileMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_profile: Option<String>,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Profiles serialized as a JSON object whose key order is the user's order
#[derive(Debug, Default)]
struct ProfileMap(Vec<ConnectionProfile>);

impl Serialize for ProfileMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for profile in &self.0 {
            map.serialize_entry(&profile.name, &profile.connection)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProfileMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ProfileMapVisitor;

        impl<'de> Visitor<'de> for ProfileMapVisitor {
            type Value = ProfileMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping profile names to connections")
            }

            fn visit_unit<E: de::Error>(self) -> Result<ProfileMap, E> {
                Ok(ProfileMap::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<ProfileMap, E> {
                Ok(ProfileMap::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ProfileMap, A::Error> {
                let mut profiles: Vec<ConnectionProfile> = Vec::new();
                while let Some((name, raw)) = access.next_entry::<String, serde_json::Value>()? {
                    let parsed = if raw.is_null() {
                        Ok(ConnectionSettings::default())
                    } else {
                        serde_json::from_value::<ConnectionSettings>(raw)
                    };
                    match parsed {
                        Ok(connection) => {
                            profiles.retain(|existing| existing.name != name);
                            profiles.push(ConnectionProfile::new(name, connection));
                        }
                        Err(e) => {
                            warn!(profile = %name, error = %e, "Skipping malformed profile");
                        }
                    }
                }
                Ok(ProfileMap(profiles))
            }
        }

        deserializer.deserialize_any(ProfileMapVisitor)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        let connection = ConnectionSettings::default();
        Self {
            connection: connection.clone(),
            refresh_seconds: default_refresh_seconds(),
            auto_refresh: true,
            default_filter: default_filter_name(),
            confirm_delete: true,
            profiles: vec![ConnectionProfile::new(DEFAULT_PROFILE, connection)],
            active_profile: DEFAULT_PROFILE.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppSettings {
    fn from_document(document: SettingsDocument) -> Self {
        let mut profiles = document.profiles.0;
        let active_profile = if profiles.is_empty() {
            // Older files only carry a single connection
            let legacy = document.connection.unwrap_or_default();
            profiles.push(ConnectionProfile::new(DEFAULT_PROFILE, legacy));
            DEFAULT_PROFILE.to_string()
        } else {
            let wanted = document
                .active_profile
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
            if profiles.iter().any(|profile| profile.name == wanted) {
                wanted
            } else {
                profiles[0].name.clone()
            }
        };

        let connection = profiles
            .iter()
            .find(|profile| profile.name == active_profile)
            .map(|profile| profile.connection.clone())
            .unwrap_or_default();

        Self {
            connection,
            refresh_seconds: document.refresh_seconds,
            auto_refresh: document.auto_refresh,
            default_filter: document.default_filter,
            confirm_delete: document.confirm_delete,
            profiles,
            active_profile,
            logging: document.logging.repaired(),
        }
    }

    fn to_document(&self) -> SettingsDocument {
        SettingsDocument {
            connection: Some(self.connection.clone()),
            refresh_seconds: self.refresh_seconds,
            auto_refresh: self.auto_refresh,
            default_filter: self.default_filter.clone(),
            confirm_delete: self.confirm_delete,
            profiles: ProfileMap(self.profiles.clone()),
            active_profile: Some(self.active_profile.clone()),
            logging: self.logging.clone(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds.max(MIN_REFRESH_SECONDS))
    }

    pub fn default_status_filter(&self) -> StatusFilter {
        StatusFilter::parse_or_default(&self.default_filter)
    }

    pub fn profile(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.iter().map(|profile| profile.name.clone()).collect()
    }

    /// Make `name` the active profile and refresh the connection mirror
    pub fn activate(&mut self, name: &str) -> Result<(), SettingsError> {
        let connection = self
            .profile(name)
            .map(|profile| profile.connection.clone())
            .ok_or_else(|| SettingsError::Invalid(format!("Unknown profile '{}'", name)))?;
        self.active_profile = name.to_string();
        self.connection = connection;
        Ok(())
    }

    /// Store new connection parameters for the active profile
    pub fn set_active_connection(&mut self, connection: ConnectionSettings) {
        let active = self.active_profile.clone();
        self.upsert_profile(&active, connection);
    }

    /// Add a profile or replace the connection of an existing one
    pub fn upsert_profile(&mut self, name: &str, connection: ConnectionSettings) {
        match self.profiles.iter_mut().find(|profile| profile.name == name) {
            Some(profile) => profile.connection = connection.clone(),
            None => self
                .profiles
                .push(ConnectionProfile::new(name, connection.clone())),
        }
        if self.active_profile == name {
            self.connection = connection;
        }
    }

    pub fn remove_profile(&mut self, name: &str) -> Result<(), SettingsError> {
        if self.profile(name).is_none() {
            return Err(SettingsError::Invalid(format!("Unknown profile '{}'", name)));
        }
        if self.profiles.len() <= 1 {
            return Err(SettingsError::Invalid(
                "At least one profile is required".to_string(),
            ));
        }
        self.profiles.retain(|profile| profile.name != name);
        if self.active_profile == name {
            let first = self.profiles[0].name.clone();
            self.activate(&first)?;
        }
        Ok(())
    }

    pub fn rename_profile(&mut self, old: &str, new: &str) -> Result<(), SettingsError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(SettingsError::Invalid("Profile name must not be empty".to_string()));
        }
        if new == old {
            return Ok(());
        }
        if self.profile(new).is_some() {
            return Err(SettingsError::Invalid(
                "A profile with that name already exists".to_string(),
            ));
        }
        let profile = self
            .profiles
            .iter_mut()
            .find(|profile| profile.name == old)
            .ok_or_else(|| SettingsError::Invalid(format!("Unknown profile '{}'", old)))?;
        profile.name = new.to_string();
        if self.active_profile == old {
            self.active_profile = new.to_string();
        }
        Ok(())
    }

    /// Move a profile up (negative delta) or down; returns its new position
    pub fn move_profile(&mut self, name: &str, delta: isize) -> Result<usize, SettingsError> {
        let index = self
            .profiles
            .iter()
            .position(|profile| profile.name == name)
            .ok_or_else(|| SettingsError::Invalid(format!("Unknown profile '{}'", name)))?;
        let last = self.profiles.len() as isize - 1;
        let target = (index as isize + delta).clamp(0, last) as usize;
        if target != index {
            let profile = self.profiles.remove(index);
            self.profiles.insert(target, profile);
        }
        Ok(target)
    }

    /// First free name of the form `base`, `base 2`, `base 3`, ...
    pub fn unique_name(&self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut index = 1;
        while self.profile(&candidate).is_some() {
            index += 1;
            candidate = format!("{} {}", base, index);
        }
        candidate
    }
}

/// Outcome of reading the settings file; loading never fails outright
#[derive(Debug)]
pub enum SettingsLoad {
    Loaded(AppSettings),
    Missing(AppSettings),
    /// Unreadable file; `backup` holds a copy made before anything can overwrite it
    Invalid {
        settings: AppSettings,
        error: SettingsError,
        backup: Option<PathBuf>,
    },
}

impl SettingsLoad {
    pub fn settings(&self) -> &AppSettings {
        match self {
            SettingsLoad::Loaded(settings) | SettingsLoad::Missing(settings) => settings,
            SettingsLoad::Invalid { settings, .. } => settings,
        }
    }

    pub fn into_settings(self) -> AppSettings {
        match self {
            SettingsLoad::Loaded(settings) | SettingsLoad::Missing(settings) => settings,
            SettingsLoad::Invalid { settings, .. } => settings,
        }
    }

    /// True when the user has saved settings before
    pub fn is_configured(&self) -> bool {
        matches!(self, SettingsLoad::Loaded(_))
    }
}

/// JSON settings file at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform config directory, falling back to the working directory
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("qbit-remote").join("settings.json"),
            None => PathBuf::from("qbit-remote.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> SettingsLoad {
        if !self.path.exists() {
            return SettingsLoad::Missing(AppSettings::default());
        }

        match self.read() {
            Ok(settings) => SettingsLoad::Loaded(settings),
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "Falling back to default settings"
                );
                let backup = match self.back_up() {
                    Ok(backup) => Some(backup),
                    Err(e) => {
                        warn!(error = %e, "Could not back up unreadable settings");
                        None
                    }
                };
                SettingsLoad::Invalid {
                    settings: AppSettings::default(),
                    error,
                    backup,
                }
            }
        }
    }

    fn read(&self) -> Result<AppSettings, SettingsError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        let document: SettingsDocument = serde_json::from_str(&content)?;
        Ok(AppSettings::from_document(document))
    }

    /// Where an unreadable settings file is copied to
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".bak");
        self.path.with_file_name(name)
    }

    fn back_up(&self) -> Result<PathBuf, SettingsError> {
        let backup = self.backup_path();
        std::fs::copy(&self.path, &backup).map_err(|source| SettingsError::Io {
            path: backup.clone(),
            source,
        })?;
        Ok(backup)
    }

    pub fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let payload = serde_json::to_string_pretty(&settings.to_document())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        std::fs::write(&self.path, payload).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("settings.json"))
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let outcome = store_in(&dir).load();

        assert!(matches!(outcome, SettingsLoad::Missing(_)));
        assert!(!outcome.is_configured());
        let settings = outcome.into_settings();
        assert_eq!(settings.active_profile, DEFAULT_PROFILE);
        assert_eq!(settings.profiles.len(), 1);
        assert_eq!(settings.refresh_seconds, 5);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();

        let outcome = store.load();
        assert!(matches!(outcome, SettingsLoad::Invalid { .. }));
        assert_eq!(outcome.settings(), &AppSettings::default());
    }

    #[test]
    fn test_unreadable_file_is_backed_up_before_save() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();

        let outcome = store.load();
        let backup = match &outcome {
            SettingsLoad::Invalid { backup, .. } => backup.clone().unwrap(),
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(backup, dir.path().join("settings.json.bak"));

        store.save(&outcome.into_settings()).unwrap();
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "{not json");
    }

    #[test]
    fn test_invalid_logging_keeps_profiles() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"profiles":{"Seedbox":{"host":"http://seedbox:8080"},"Home":{"host":"http://nas:8080"}},
               "active_profile":"Seedbox",
               "logging":{"level":"verbose","format":"json"}}"#,
        )
        .unwrap();

        let outcome = store.load();
        assert!(outcome.is_configured());
        let mut settings = outcome.into_settings();
        assert_eq!(settings.logging.level, "warn");
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.profile_names(), vec!["Seedbox", "Home"]);

        // Saving after a successful connect keeps every profile
        settings.set_active_connection(settings.connection.clone());
        store.save(&settings).unwrap();
        let reloaded = store.load().into_settings();
        assert_eq!(reloaded.profile_names(), vec!["Seedbox", "Home"]);
        assert_eq!(reloaded.active_profile, "Seedbox");
        assert_eq!(reloaded.logging.level, "warn");
    }

    #[test]
    fn test_legacy_connection_becomes_default_profile() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"connection":{"host":"http://nas:8080","username":"me","password":"pw"},
                "refresh_seconds":10}"#,
        )
        .unwrap();

        let outcome = store.load();
        assert!(outcome.is_configured());
        let settings = outcome.into_settings();
        assert_eq!(settings.active_profile, DEFAULT_PROFILE);
        assert_eq!(settings.profiles.len(), 1);
        assert_eq!(settings.profiles[0].connection.host, "http://nas:8080");
        assert_eq!(settings.connection.username, "me");
        assert_eq!(settings.refresh_seconds, 10);
    }

    #[test]
    fn test_profiles_keep_document_order_and_skip_malformed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"profiles":{
                  "Zeta":{"host":"http://z:1"},
                  "Broken":{"timeout":"soon"},
                  "Alpha":{"host":"http://a:1"}
               },
               "active_profile":"Alpha"}"#,
        )
        .unwrap();

        let settings = store.load().into_settings();
        assert_eq!(settings.profile_names(), vec!["Zeta", "Alpha"]);
        assert_eq!(settings.active_profile, "Alpha");
        assert_eq!(settings.connection.host, "http://a:1");
    }

    #[test]
    fn test_unknown_active_profile_falls_back_to_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"profiles":{"Home":{"host":"http://h:1"},"Work":{}},"active_profile":"Gone"}"#,
        )
        .unwrap();

        let settings = store.load().into_settings();
        assert_eq!(settings.active_profile, "Home");
        assert_eq!(settings.connection.host, "http://h:1");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut settings = AppSettings::default();
        settings.upsert_profile(
            "Seedbox",
            ConnectionSettings {
                host: "https://seedbox.example.com".to_string(),
                username: "alice".to_string(),
                password: "secret".to_string(),
                verify_ssl: false,
                timeout: 30,
            },
        );
        settings.activate("Seedbox").unwrap();
        settings.confirm_delete = false;
        settings.default_filter = "seeding".to_string();

        store.save(&settings).expect("save should succeed");
        let loaded = store.load();
        assert!(loaded.is_configured());
        assert_eq!(loaded.into_settings(), settings);
    }

    #[test]
    fn test_save_load_is_idempotent_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"profiles":{"B":{"host":"http://b:1"},"A":{"host":"http://a:1"}},
               "active_profile":"A","auto_refresh":false}"#,
        )
        .unwrap();

        store.save(&store.load().into_settings()).unwrap();
        let first = std::fs::read_to_string(store.path()).unwrap();
        store.save(&store.load().into_settings()).unwrap();
        let second = std::fs::read_to_string(store.path()).unwrap();

        assert_eq!(first, second);
        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["active_profile"], "A");
        assert_eq!(value["connection"]["host"], "http://a:1");
        assert_eq!(value["auto_refresh"], false);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));
        store.save(&AppSettings::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_save_reports_unwritable_path() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the write fail
        let store = SettingsStore::new(dir.path());
        let err = store.save(&AppSettings::default()).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn test_profile_editing() {
        let mut settings = AppSettings::default();
        assert_eq!(settings.unique_name("Profile"), "Profile");
        settings.upsert_profile("Profile", ConnectionSettings::default());
        assert_eq!(settings.unique_name("Profile"), "Profile 2");

        settings.rename_profile("Profile", "Remote").unwrap();
        assert!(settings.rename_profile("Remote", "Default").is_err());
        assert!(settings.rename_profile("Remote", "  ").is_err());

        assert_eq!(settings.move_profile("Remote", -1).unwrap(), 0);
        assert_eq!(settings.profile_names(), vec!["Remote", "Default"]);
        assert_eq!(settings.move_profile("Remote", -5).unwrap(), 0);

        settings.remove_profile("Default").unwrap();
        assert_eq!(settings.active_profile, "Remote");
        assert!(settings.remove_profile("Remote").is_err());
    }

    #[test]
    fn test_refresh_interval_has_floor() {
        let mut settings = AppSettings::default();
        settings.refresh_seconds = 1;
        assert_eq!(settings.refresh_interval(), Duration::from_secs(3));
        settings.refresh_seconds = 10;
        assert_eq!(settings.refresh_interval(), Duration::from_secs(10));
    }
}
