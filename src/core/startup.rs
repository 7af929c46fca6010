use crate::api::HttpConnector;
use crate::associations;
use crate::core::config::{AppSettings, SettingsLoad, SettingsStore};
use crate::core::error::AssociationError;
use crate::core::tracing_init::init_tracing;
use crate::pipeline::{Command, Controller};
use crate::shell::Shell;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Grace period for background work once the shell has exited
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(
    name = "qbit-remote",
    version,
    about = "Screen reader friendly remote control for qBittorrent"
)]
pub struct Cli {
    /// Magnet links or .torrent files to add once connected
    #[arg(value_name = "ITEM")]
    pub items: Vec<String>,

    /// Register as handler for .torrent files and magnet links, then exit
    #[arg(long)]
    pub register_associations: bool,

    /// Remove the handler registration, then exit
    #[arg(long)]
    pub unregister_associations: bool,

    /// Settings file to use instead of the one in the config directory
    #[arg(long, env = "QBIT_REMOTE_SETTINGS", value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

/// What the command line asks for
#[derive(Debug, PartialEq, Eq)]
pub enum Mode {
    Register,
    Unregister,
    Conflict,
    Interactive,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        match (self.register_associations, self.unregister_associations) {
            (true, true) => Mode::Conflict,
            (true, false) => Mode::Register,
            (false, true) => Mode::Unregister,
            (false, false) => Mode::Interactive,
        }
    }

    pub fn settings_store(&self) -> SettingsStore {
        match &self.settings {
            Some(path) => SettingsStore::new(path.clone()),
            None => SettingsStore::new(SettingsStore::default_path()),
        }
    }
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    let store = cli.settings_store();
    let loaded = store.load();
    init_tracing(&loaded.settings().logging);

    match cli.mode() {
        Mode::Conflict => {
            println!("Choose either --register-associations or --unregister-associations, not both.");
            return Ok(ExitCode::FAILURE);
        }
        Mode::Register => return Ok(ExitCode::from(report(associations::register()))),
        Mode::Unregister => return Ok(ExitCode::from(report(associations::unregister()))),
        Mode::Interactive => {}
    }

    let configured = loaded.is_configured();
    let settings = match loaded {
        SettingsLoad::Invalid {
            settings,
            error,
            backup,
        } => {
            warn!(path = %store.path().display(), error = %error, "Using default settings");
            println!("Settings could not be read ({}); using defaults.", error);
            if let Some(backup) = backup {
                println!("The unreadable file was copied to {}.", backup.display());
            }
            settings
        }
        other => other.into_settings(),
    };

    info!(
        path = %store.path().display(),
        profile = %settings.active_profile,
        configured,
        "Settings loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let result = runtime.block_on(interactive(settings, store, configured, cli.items));
    // Stdin reads run on a blocking thread that never finishes on its own
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result?;
    Ok(ExitCode::SUCCESS)
}

async fn interactive(
    settings: AppSettings,
    store: SettingsStore,
    configured: bool,
    items: Vec<String>,
) -> Result<()> {
    let (controller, handle, inbox, updates) =
        Controller::new(settings, store, Arc::new(HttpConnector));
    let controller_task = tokio::spawn(controller.run(inbox));

    if !items.is_empty() {
        handle.send(Command::Open(items));
    }
    if configured {
        handle.send(Command::Connect(None));
    } else {
        println!("No saved settings; use 'profile add' or 'connect' to get started.");
    }

    let shell_result = Shell::new(handle.clone()).run(updates).await;

    handle.send(Command::Shutdown);
    controller_task
        .await
        .context("Pipeline controller panicked")?;
    shell_result.context("Failed to read from the terminal")?;
    Ok(())
}

/// Print the outcome of an association change and return the exit status
fn report(result: Result<String, AssociationError>) -> u8 {
    match result {
        Ok(message) => {
            println!("{}", message);
            0
        }
        Err(e) => {
            println!("{}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("qbit-remote").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_items_and_flags() {
        let cli = parse(&["magnet:?xt=urn:btih:abc", "/tmp/a.torrent"]);
        assert_eq!(cli.items.len(), 2);
        assert_eq!(cli.mode(), Mode::Interactive);

        assert_eq!(parse(&["--register-associations"]).mode(), Mode::Register);
        assert_eq!(parse(&["--unregister-associations"]).mode(), Mode::Unregister);
    }

    #[test]
    fn test_both_association_flags_conflict() {
        let cli = parse(&["--register-associations", "--unregister-associations"]);
        assert_eq!(cli.mode(), Mode::Conflict);
    }

    #[test]
    fn test_settings_path_flag() {
        let cli = parse(&["--settings", "/tmp/custom.json"]);
        assert_eq!(cli.settings_store().path(), std::path::Path::new("/tmp/custom.json"));
    }

    #[test]
    fn test_report_exit_codes() {
        assert_eq!(report(Ok("done".to_string())), 0);
        assert_eq!(report(Err(AssociationError::Unsupported)), 1);
    }
}
