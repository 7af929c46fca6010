use std::path::{Path, PathBuf};
use url::Url;

/// Turn a command line item into a magnet link or an absolute file path
///
/// Returns `None` for blank input. Magnet links pass through untouched;
/// `file://` URLs are decoded; quotes are stripped, `~` is expanded and
/// relative paths are resolved against the working directory.
pub fn normalize_open_item(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with("magnet:?") {
        return Some(text.to_string());
    }
    if text.starts_with("file://") {
        return Some(file_url_path(text).display().to_string());
    }

    let text = text.trim_matches('"');
    if text.is_empty() {
        return None;
    }
    let path = absolute(&expand_home(text));
    Some(path.display().to_string())
}

/// True when the item should be added by URL rather than uploaded
pub fn is_magnet(item: &str) -> bool {
    item.trim_start().to_ascii_lowercase().starts_with("magnet:?")
}

fn file_url_path(text: &str) -> PathBuf {
    if let Ok(url) = Url::parse(text) {
        if let Ok(path) = url.to_file_path() {
            return path;
        }
        // Hosts other than localhost are kept as a leading path segment
        let mut combined = percent_decode(url.path());
        if let Some(host) = url.host_str() {
            combined = format!("/{}{}", host, combined);
        }
        return PathBuf::from(combined);
    }
    PathBuf::from(percent_decode(text.trim_start_matches("file://")))
}

fn percent_decode(encoded: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(encoded.as_bytes())).into_owned()
}

fn expand_home(text: &str) -> PathBuf {
    if text == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = text.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(text)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::fs::canonicalize(path)
        .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(path)))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_items_are_skipped() {
        assert_eq!(normalize_open_item(""), None);
        assert_eq!(normalize_open_item("   "), None);
        assert_eq!(normalize_open_item("\"\""), None);
    }

    #[test]
    fn test_magnet_kept_verbatim() {
        let magnet = "magnet:?xt=urn:btih:abcdef&dn=Some%20Name";
        assert_eq!(normalize_open_item(&format!("  {}  ", magnet)), Some(magnet.to_string()));
        assert!(is_magnet(magnet));
        assert!(is_magnet("MAGNET:?xt=urn:btih:abc"));
        assert!(!is_magnet("/tmp/file.torrent"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url_decoded() {
        assert_eq!(
            normalize_open_item("file:///home/user/My%20File.torrent"),
            Some("/home/user/My File.torrent".to_string())
        );
        assert_eq!(
            normalize_open_item("file://server/share/a%20b.torrent"),
            Some("/server/share/a b.torrent".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_quotes_stripped_from_absolute_path() {
        assert_eq!(
            normalize_open_item("\"/tmp/some file.torrent\""),
            Some("/tmp/some file.torrent".to_string())
        );
    }

    #[test]
    fn test_relative_path_made_absolute() {
        let normalized = normalize_open_item("missing-dir/file.torrent").unwrap();
        assert!(Path::new(&normalized).is_absolute());
        assert!(normalized.ends_with("file.torrent"));
    }

    #[test]
    fn test_home_expanded() {
        if let Some(home) = dirs::home_dir() {
            let normalized = normalize_open_item("~/file.torrent").unwrap();
            assert_eq!(PathBuf::from(normalized), home.join("file.torrent"));
        }
    }

    #[test]
    fn test_percent_decode_keeps_invalid_sequences() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("caf%C3%A9%FF"), "caf\u{e9}\u{fffd}");
    }
}
