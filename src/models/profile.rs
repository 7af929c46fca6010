use serde::{Deserialize, Serialize};

/// Everything needed to reach and authenticate against one daemon
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_host() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "adminadmin".to_string()
}

fn default_verify_ssl() -> bool {
    true
}

fn default_timeout() -> u64 {
    15
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: default_username(),
            password: default_password(),
            verify_ssl: default_verify_ssl(),
            timeout: default_timeout(),
        }
    }
}

impl ConnectionSettings {
    /// Base URL of the v2 Web API for this host
    pub fn api_base(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.ends_with("/api/v2") {
            host.to_string()
        } else {
            format!("{}/api/v2", host)
        }
    }
}

/// A named set of connection parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub name: String,
    pub connection: ConnectionSettings,
}

impl ConnectionProfile {
    pub fn new(name: impl Into<String>, connection: ConnectionSettings) -> Self {
        Self {
            name: name.into(),
            connection,
        }
    }
}
