use crate::models::torrent::{TorrentDetails, TorrentSnapshot};
use crate::pipeline::display::Render;
use crate::pipeline::{Options, UiUpdate};
use crate::utils::format::{format_eta, format_progress, format_speed};

/// One torrent as a single line, read left to right by screen readers
pub fn format_row(number: usize, row: &TorrentSnapshot, selected: bool) -> String {
    let mut line = format!(
        "{}. {}, {}, {}, down {}, up {}, ETA {}, ratio {:.2}, seeds {}, peers {}",
        number,
        row.name,
        row.state,
        format_progress(row.progress),
        format_speed(row.download_rate),
        format_speed(row.upload_rate),
        format_eta(row.eta),
        row.ratio,
        row.seeds,
        row.peers,
    );
    if !row.category.is_empty() {
        line.push_str(&format!(", category {}", row.category));
    }
    if selected {
        line.push_str(", selected");
    }
    line
}

pub fn render_lines(render: &Render) -> Vec<String> {
    let mut lines = vec![match render.rows.len() {
        0 => "No torrents shown".to_string(),
        1 => "1 torrent shown".to_string(),
        n => format!("{} torrents shown", n),
    }];
    lines.extend(
        render
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| format_row(i + 1, row, render.selected.contains(&i))),
    );
    if let Some(focused) = render.focused.and_then(|i| render.rows.get(i)) {
        lines.push(format!("Focus: {}", focused.name));
    }
    lines
}

pub fn delete_prompt(count: usize, delete_files: bool) -> String {
    let question = if delete_files {
        "Delete the selected torrents and downloaded data?"
    } else {
        "Delete the selected torrents?"
    };
    format!("{} ({} selected) [y/N]", question, count)
}

fn details_lines(details: &TorrentDetails) -> Vec<String> {
    let mut lines = vec![format!("Details for {}", details.name), "Properties:".to_string()];

    let mut properties: Vec<_> = details.properties.iter().collect();
    properties.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in properties {
        let value = match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        lines.push(format!("  {}: {}", key, value));
    }

    lines.push("Files:".to_string());
    for file in &details.files {
        lines.push(format!("  {} ({})", file.name, format_progress(file.progress)));
    }

    lines.push("Trackers:".to_string());
    for tracker in &details.trackers {
        lines.push(format!("  {} - {}", tracker.url, tracker.status_label()));
    }
    lines
}

fn options_lines(options: &Options) -> Vec<String> {
    let switch = |on: bool| if on { "on" } else { "off" };
    vec![
        format!("refresh: {} seconds", options.refresh_seconds),
        format!("auto-refresh: {}", switch(options.auto_refresh)),
        format!("default-filter: {}", options.default_filter),
        format!("confirm-delete: {}", switch(options.confirm_delete)),
    ]
}

/// Printable lines for an update
pub fn describe(update: &UiUpdate) -> Vec<String> {
    match update {
        UiUpdate::Status(message) => vec![message.clone()],
        UiUpdate::Error(message) => vec![format!("Error: {}", message)],
        UiUpdate::Connection { state, profile } => vec![format!("Profile '{}': {}", profile, state)],
        UiUpdate::Render(render) => render_lines(render),
        UiUpdate::FilterChoices { choices, selected } => {
            vec![format!("Filters: {} (current: {})", choices.join(", "), selected)]
        }
        UiUpdate::ConfirmDelete {
            count,
            delete_files,
        } => vec![delete_prompt(*count, *delete_files)],
        UiUpdate::Details(details) => details_lines(details),
        UiUpdate::Categories(names) if names.is_empty() => vec!["No categories".to_string()],
        UiUpdate::Categories(names) => vec![format!("Categories: {}", names.join(", "))],
        UiUpdate::Profiles { names, active } => names
            .iter()
            .map(|name| {
                if name == active {
                    format!("* {} (active)", name)
                } else {
                    format!("  {}", name)
                }
            })
            .collect(),
        UiUpdate::Options(options) => options_lines(options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ConnectionState;
    use crate::models::torrent::{TorrentFile, TrackerEntry};

    fn row() -> TorrentSnapshot {
        let mut row = TorrentSnapshot::new("abc", "Debian");
        row.state = "downloading".to_string();
        row.progress = 0.5;
        row.download_rate = 1536;
        row.eta = 90;
        row.ratio = 0.25;
        row.seeds = 3;
        row.peers = 7;
        row
    }

    #[test]
    fn test_format_row() {
        assert_eq!(
            format_row(1, &row(), false),
            "1. Debian, downloading, 50.0%, down 1.5 KiB/s, up 0 B/s, ETA 1m 30s, ratio 0.25, seeds 3, peers 7"
        );
        assert!(format_row(2, &row(), true).ends_with(", selected"));
    }

    #[test]
    fn test_render_lines() {
        let render = Render {
            rows: vec![row(), TorrentSnapshot::new("def", "Fedora")],
            selected: vec![1],
            focused: Some(1),
        };
        let lines = render_lines(&render);
        assert_eq!(lines[0], "2 torrents shown");
        assert!(lines[2].starts_with("2. Fedora"));
        assert!(lines[2].ends_with(", selected"));
        assert_eq!(lines[3], "Focus: Fedora");

        assert_eq!(render_lines(&Render::empty()), vec!["No torrents shown"]);
    }

    #[test]
    fn test_delete_prompt() {
        assert_eq!(delete_prompt(2, false), "Delete the selected torrents? (2 selected) [y/N]");
        assert!(delete_prompt(1, true).starts_with("Delete the selected torrents and downloaded data?"));
    }

    #[test]
    fn test_describe_details() {
        let mut properties = serde_json::Map::new();
        properties.insert("save_path".to_string(), serde_json::json!("/data"));
        properties.insert("addition_date".to_string(), serde_json::json!(1700000000));
        let details = TorrentDetails {
            hash: "abc".to_string(),
            name: "Debian".to_string(),
            properties,
            files: vec![TorrentFile {
                name: "debian.iso".to_string(),
                size: 10,
                progress: 1.0,
                priority: 1,
            }],
            trackers: vec![TrackerEntry {
                url: "udp://t.example:6969".to_string(),
                status: 2,
                tier: 0,
                num_peers: 4,
                msg: String::new(),
            }],
        };

        let lines = describe(&UiUpdate::Details(details));
        assert_eq!(
            lines,
            vec![
                "Details for Debian",
                "Properties:",
                "  addition_date: 1700000000",
                "  save_path: /data",
                "Files:",
                "  debian.iso (100.0%)",
                "Trackers:",
                "  udp://t.example:6969 - working",
            ]
        );
    }

    #[test]
    fn test_describe_misc() {
        assert_eq!(describe(&UiUpdate::Error("boom".to_string())), vec!["Error: boom"]);
        assert_eq!(
            describe(&UiUpdate::Connection {
                state: ConnectionState::Polling,
                profile: "Default".to_string()
            }),
            vec!["Profile 'Default': connected"]
        );
        assert_eq!(describe(&UiUpdate::Categories(Vec::new())), vec!["No categories"]);
        assert_eq!(
            describe(&UiUpdate::Profiles {
                names: vec!["Home".to_string(), "Box".to_string()],
                active: "Box".to_string()
            }),
            vec!["  Home", "* Box (active)"]
        );
    }
}
