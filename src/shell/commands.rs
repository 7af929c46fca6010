use crate::models::profile::ConnectionSettings;
use crate::models::torrent::{AddSource, AddTorrent, BulkAction, TorrentSnapshot};
use crate::pipeline::{Command, Options, ProfileEdit};
use crate::utils::open_item::normalize_open_item;

pub const HELP: &str = "\
Commands:
  connect [profile]          connect to the active or named profile
  disconnect                 close the session
  profile list               show profiles
  profile use <name>         switch profile
  profile add <name> <host> [username] [password]
  profile remove <name>
  profile rename <old> <new>
  profile up|down <name>     reorder profiles
  refresh                    fetch the torrent list now
  list                       print the current rows
  filter <name>              status filter or tracker host
  filters                    show available filters
  search [text]              filter rows by name; no text clears
  select <n...>|all|none     select rows by number
  pause | resume | recheck   act on the selection
  up | down                  change queue priority of the selection
  delete | delete-data       remove the selection, optionally with data
  add <magnet|url|file> [category=<name>] [path=<dir>]
  categories                 list categories
  details [n]                properties, files and trackers
  options                    show options
  set <option> <value>       refresh, auto-refresh, default-filter, confirm-delete
  help                       this text
  quit                       exit";

/// What a line of input asks for
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Empty,
    Help,
    Quit,
    Command(Command),
}

/// Shell-side view of the latest updates needed to interpret input
#[derive(Debug, Default)]
pub struct ShellContext {
    pub rows: Vec<TorrentSnapshot>,
    pub options: Option<Options>,
}

/// Parse one line of user input
pub fn parse(line: &str, context: &ShellContext) -> Result<Input, String> {
    let words = split_words(line)?;
    let Some((verb, args)) = words.split_first() else {
        return Ok(Input::Empty);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(Input::Help),
        "quit" | "exit" => return Ok(Input::Quit),
        "list" | "ls" => Command::Show,
        "connect" => match args {
            [] => Command::Connect(None),
            [profile] => Command::SwitchProfile(profile.clone()),
            _ => return Err("Usage: connect [profile]".to_string()),
        },
        "disconnect" => Command::Disconnect,
        "profile" | "profiles" => parse_profile(args)?,
        "refresh" => Command::Refresh,
        "filter" => match args {
            [] => Command::ListFilters,
            [name] => Command::SetFilter(name.clone()),
            _ => return Err("Usage: filter <name>".to_string()),
        },
        "filters" => Command::ListFilters,
        "search" => Command::Search(args.join(" ")),
        "select" => Command::Select(parse_selection(args, &context.rows)?),
        "pause" => Command::Action(BulkAction::Pause),
        "resume" => Command::Action(BulkAction::Resume),
        "recheck" => Command::Action(BulkAction::Recheck),
        "up" => Command::Action(BulkAction::IncreasePriority),
        "down" => Command::Action(BulkAction::DecreasePriority),
        "delete" => Command::Delete {
            delete_files: false,
            confirmed: false,
        },
        "delete-data" => Command::Delete {
            delete_files: true,
            confirmed: false,
        },
        "add" => Command::Add(parse_add(args)?),
        "categories" => Command::Categories,
        "details" => match args {
            [] => Command::Details(None),
            [index] => Command::Details(Some(row_hash(index, &context.rows)?)),
            _ => return Err("Usage: details [n]".to_string()),
        },
        "options" => Command::ShowOptions,
        "set" => Command::SetOptions(parse_option(args, context.options.as_ref())?),
        other => return Err(format!("Unknown command '{}'. Type 'help' for a list.", other)),
    };

    Ok(Input::Command(command))
}

/// Whether a reply to a yes/no prompt means yes
pub fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Split on whitespace, keeping double-quoted runs together
fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if quoted {
        return Err("Unterminated quote".to_string());
    }
    if pending {
        words.push(current);
    }
    Ok(words)
}

fn parse_profile(args: &[String]) -> Result<Command, String> {
    let edit = match args {
        [] => return Ok(Command::ListProfiles),
        [verb, rest @ ..] => match (verb.to_ascii_lowercase().as_str(), rest) {
            ("list", []) => return Ok(Command::ListProfiles),
            ("use", [name]) => return Ok(Command::SwitchProfile(name.clone())),
            ("add", [name, host, credentials @ ..]) if credentials.len() <= 2 => {
                let mut connection = ConnectionSettings {
                    host: host.clone(),
                    ..ConnectionSettings::default()
                };
                if let Some(username) = credentials.first() {
                    connection.username = username.clone();
                }
                if let Some(password) = credentials.get(1) {
                    connection.password = password.clone();
                }
                ProfileEdit::Save {
                    name: Some(name.clone()),
                    connection,
                }
            }
            ("remove", [name]) => ProfileEdit::Remove(name.clone()),
            ("rename", [from, to]) => ProfileEdit::Rename {
                from: from.clone(),
                to: to.clone(),
            },
            ("up", [name]) => ProfileEdit::Move {
                name: name.clone(),
                delta: -1,
            },
            ("down", [name]) => ProfileEdit::Move {
                name: name.clone(),
                delta: 1,
            },
            _ => return Err("Usage: profile list|use|add|remove|rename|up|down ...".to_string()),
        },
    };
    Ok(Command::EditProfile(edit))
}

fn parse_selection(args: &[String], rows: &[TorrentSnapshot]) -> Result<Vec<String>, String> {
    match args {
        [] => Err("Usage: select <n...>|all|none".to_string()),
        [word] if word.eq_ignore_ascii_case("all") => {
            Ok(rows.iter().map(|row| row.hash.clone()).collect())
        }
        [word] if word.eq_ignore_ascii_case("none") => Ok(Vec::new()),
        indices => {
            let mut hashes: Vec<String> = Vec::new();
            for index in indices {
                let hash = row_hash(index, rows)?;
                if !hashes.contains(&hash) {
                    hashes.push(hash);
                }
            }
            Ok(hashes)
        }
    }
}

/// Hash of a 1-based row number from the last listing
fn row_hash(index: &str, rows: &[TorrentSnapshot]) -> Result<String, String> {
    let number: usize = index
        .parse()
        .map_err(|_| format!("'{}' is not a row number", index))?;
    number
        .checked_sub(1)
        .and_then(|i| rows.get(i))
        .map(|row| row.hash.clone())
        .ok_or_else(|| format!("No row {}; the list has {} rows", number, rows.len()))
}

fn parse_add(args: &[String]) -> Result<AddTorrent, String> {
    let mut source = None;
    let mut category = None;
    let mut save_path = None;

    for arg in args {
        if let Some(value) = arg.strip_prefix("category=") {
            category = Some(value.to_string()).filter(|value| !value.is_empty());
        } else if let Some(value) = arg.strip_prefix("path=") {
            save_path = Some(value.to_string()).filter(|value| !value.is_empty());
        } else if source.is_none() {
            source = Some(arg.as_str());
        } else {
            return Err(format!("Unexpected argument '{}'", arg));
        }
    }

    let source = source
        .and_then(|raw| match AddSource::classify(raw)? {
            AddSource::File(_) => normalize_open_item(raw).and_then(|path| AddSource::classify(&path)),
            url => Some(url),
        })
        .ok_or_else(|| "Provide a magnet link or torrent file".to_string())?;

    Ok(AddTorrent {
        source,
        category,
        save_path,
    })
}

fn parse_option(args: &[String], current: Option<&Options>) -> Result<Options, String> {
    let Some(current) = current else {
        return Err("Options are not loaded yet; try again".to_string());
    };
    let [name, value] = args else {
        return Err("Usage: set <option> <value>".to_string());
    };

    let mut options = current.clone();
    match name.to_ascii_lowercase().as_str() {
        "refresh" | "refresh-seconds" => {
            options.refresh_seconds = value
                .parse()
                .map_err(|_| format!("'{}' is not a number of seconds", value))?;
        }
        "auto-refresh" => options.auto_refresh = parse_switch(value)?,
        "default-filter" => options.default_filter = value.clone(),
        "confirm-delete" => options.confirm_delete = parse_switch(value)?,
        other => return Err(format!("Unknown option '{}'", other)),
    }
    Ok(options)
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok(true),
        "off" | "no" | "false" | "0" => Ok(false),
        _ => Err(format!("'{}' is not on or off", value)),
    }
}
