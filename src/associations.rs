use crate::core::error::AssociationError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const APP_NAME: &str = "qBittorrent Remote";
pub const DESKTOP_FILE: &str = "qbit-remote.desktop";
pub const MIME_TYPES: &str = "application/x-bittorrent;x-scheme-handler/magnet;";

/// freedesktop entry launching `executable` with the opened file or URL
pub fn desktop_entry(executable: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={}\n\
         Exec={} %u\n\
         MimeType={}\n\
         NoDisplay=false\n\
         Terminal=true\n\
         Categories=Network;FileTransfer;\n",
        APP_NAME,
        quote_exec(&executable.display().to_string()),
        MIME_TYPES,
    )
}

/// Quote an argument for an `Exec=` key when it contains reserved characters
fn quote_exec(arg: &str) -> String {
    const RESERVED: &[char] = &[
        ' ', '\t', '\n', '"', '\'', '\\', '>', '<', '~', '|', '&', ';', '$', '*', '?', '#', '(',
        ')', '`', '=',
    ];
    if !arg.is_empty() && !arg.contains(RESERVED) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for ch in arg.chars() {
        if matches!(ch, '"' | '`' | '$' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Write the desktop entry under `<data_dir>/applications`
pub fn register_in(data_dir: &Path, executable: &Path) -> Result<PathBuf, AssociationError> {
    let applications = data_dir.join("applications");
    fs::create_dir_all(&applications).map_err(|source| AssociationError::Io {
        path: applications.clone(),
        source,
    })?;

    let path = applications.join(DESKTOP_FILE);
    fs::write(&path, desktop_entry(executable)).map_err(|source| AssociationError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), "Desktop entry written");
    Ok(path)
}

/// Remove the desktop entry; returns whether one existed
pub fn unregister_in(data_dir: &Path) -> Result<bool, AssociationError> {
    let path = data_dir.join("applications").join(DESKTOP_FILE);
    if !path.exists() {
        return Ok(false);
    }

    fs::remove_file(&path).map_err(|source| AssociationError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "Desktop entry removed");
    Ok(true)
}

/// Register the running executable as handler for torrents and magnet links
pub fn register() -> Result<String, AssociationError> {
    let data_dir = user_data_dir()?;
    let executable = std::env::current_exe().map_err(|source| AssociationError::Io {
        path: PathBuf::from("current executable"),
        source,
    })?;
    register_in(&data_dir, &executable)?;
    Ok("Registered .torrent and magnet handlers.".to_string())
}

pub fn unregister() -> Result<String, AssociationError> {
    let data_dir = user_data_dir()?;
    if unregister_in(&data_dir)? {
        Ok("Removed registered handlers.".to_string())
    } else {
        Ok("No registered handlers found.".to_string())
    }
}

#[cfg(target_os = "linux")]
fn user_data_dir() -> Result<PathBuf, AssociationError> {
    dirs::data_dir().ok_or(AssociationError::NoDataDir)
}

#[cfg(not(target_os = "linux"))]
fn user_data_dir() -> Result<PathBuf, AssociationError> {
    Err(AssociationError::Unsupported)
}
