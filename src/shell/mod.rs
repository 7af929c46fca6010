pub mod commands;
pub mod view;

use crate::pipeline::{Command, ControllerHandle, UiUpdate};
use commands::{is_yes, parse, Input, ShellContext, HELP};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outcome of one line of input
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Continue(Vec<String>),
    Quit,
}

/// Line-oriented front end: reads commands from stdin, prints updates to stdout
pub struct Shell {
    handle: ControllerHandle,
    context: ShellContext,
    /// Set while a delete confirmation is waiting for an answer
    confirm_delete: Option<bool>,
}

impl Shell {
    pub fn new(handle: ControllerHandle) -> Self {
        Self {
            handle,
            context: ShellContext::default(),
            confirm_delete: None,
        }
    }

    /// Track what later input refers to and return the lines to print
    pub fn absorb(&mut self, update: UiUpdate) -> Vec<String> {
        match &update {
            UiUpdate::Render(render) => self.context.rows = render.rows.clone(),
            UiUpdate::Options(options) => self.context.options = Some(options.clone()),
            UiUpdate::ConfirmDelete { delete_files, .. } => {
                self.confirm_delete = Some(*delete_files)
            }
            _ => {}
        }
        view::describe(&update)
    }

    pub fn input(&mut self, line: &str) -> Step {
        if let Some(delete_files) = self.confirm_delete.take() {
            if !is_yes(line) {
                return Step::Continue(vec!["Delete cancelled".to_string()]);
            }
            return self.send(Command::Delete {
                delete_files,
                confirmed: true,
            });
        }

        match parse(line, &self.context) {
            Ok(Input::Empty) => Step::Continue(Vec::new()),
            Ok(Input::Help) => Step::Continue(HELP.lines().map(str::to_string).collect()),
            Ok(Input::Quit) => Step::Quit,
            Ok(Input::Command(command)) => self.send(command),
            Err(message) => Step::Continue(vec![message]),
        }
    }

    fn send(&self, command: Command) -> Step {
        debug!(command = ?command, "Sending command");
        if self.handle.send(command) {
            Step::Continue(Vec::new())
        } else {
            Step::Quit
        }
    }

    /// Run until `quit`, end of input, Ctrl+C or the controller going away
    pub async fn run(mut self, mut updates: mpsc::UnboundedReceiver<UiUpdate>) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Type 'help' for a list of commands.");
        self.send(Command::ShowOptions);

        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(update) => print_lines(&self.absorb(update)),
                    None => break,
                },
                line = lines.next_line() => match line? {
                    Some(line) => match self.input(&line) {
                        Step::Continue(output) => print_lines(&output),
                        Step::Quit => break,
                    },
                    None => {
                        debug!("End of input");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpConnector;
    use crate::core::config::{AppSettings, SettingsStore};
    use crate::models::torrent::TorrentSnapshot;
    use crate::pipeline::display::Render;
    use crate::pipeline::{Controller, Inbox, Message};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn shell(dir: &TempDir) -> (Shell, Inbox) {
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let (_controller, handle, inbox, _updates) =
            Controller::new(AppSettings::default(), store, Arc::new(HttpConnector));
        (Shell::new(handle), inbox)
    }

    async fn next_command(inbox: &mut Inbox) -> Option<Command> {
        match timeout(Duration::from_millis(50), inbox.recv()).await {
            Ok(Some(Message::Command(command))) => Some(command),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_commands_are_forwarded() {
        let dir = TempDir::new().unwrap();
        let (mut shell, mut inbox) = shell(&dir);

        assert_eq!(shell.input("refresh"), Step::Continue(Vec::new()));
        assert_eq!(next_command(&mut inbox).await, Some(Command::Refresh));

        assert_eq!(shell.input("quit"), Step::Quit);
        assert_eq!(next_command(&mut inbox).await, None);
    }

    #[tokio::test]
    async fn test_parse_errors_are_printed() {
        let dir = TempDir::new().unwrap();
        let (mut shell, mut inbox) = shell(&dir);

        match shell.input("select 1") {
            Step::Continue(lines) => assert_eq!(lines, vec!["No row 1; the list has 0 rows"]),
            Step::Quit => panic!("unexpected quit"),
        }
        assert_eq!(next_command(&mut inbox).await, None);
    }

    #[tokio::test]
    async fn test_rows_from_render_are_selectable() {
        let dir = TempDir::new().unwrap();
        let (mut shell, mut inbox) = shell(&dir);

        let lines = shell.absorb(UiUpdate::Render(Render {
            rows: vec![TorrentSnapshot::new("aaa", "Alpha"), TorrentSnapshot::new("bbb", "Beta")],
            selected: Vec::new(),
            focused: None,
        }));
        assert_eq!(lines[0], "2 torrents shown");

        shell.input("select 2");
        assert_eq!(
            next_command(&mut inbox).await,
            Some(Command::Select(vec!["bbb".to_string()]))
        );
    }

    #[tokio::test]
    async fn test_delete_confirmation() {
        let dir = TempDir::new().unwrap();
        let (mut shell, mut inbox) = shell(&dir);

        let prompt = shell.absorb(UiUpdate::ConfirmDelete {
            count: 2,
            delete_files: true,
        });
        assert!(prompt[0].ends_with("[y/N]"));
        shell.input("yes");
        assert_eq!(
            next_command(&mut inbox).await,
            Some(Command::Delete {
                delete_files: true,
                confirmed: true
            })
        );

        shell.absorb(UiUpdate::ConfirmDelete {
            count: 1,
            delete_files: false,
        });
        assert_eq!(
            shell.input("refresh"),
            Step::Continue(vec!["Delete cancelled".to_string()])
        );
        assert_eq!(next_command(&mut inbox).await, None);
    }

    #[tokio::test]
    async fn test_stopped_controller_quits() {
        let dir = TempDir::new().unwrap();
        let (mut shell, inbox) = shell(&dir);
        drop(inbox);

        assert_eq!(shell.input("refresh"), Step::Quit);
    }
}
