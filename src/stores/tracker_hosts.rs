use crate::models::torrent::TrackerEntry;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};
use url::Url;

/// Tracker hostnames discovered per torrent hash
///
/// Entries are only ever added. A torrent whose lookup finished without any
/// usable announce URL is recorded with an empty set so it is not looked up
/// again. Lookup tasks write here directly while the pipeline reads.
pub struct TrackerHostStore {
    hosts: DashMap<String, BTreeSet<String>>,
}

impl TrackerHostStore {
    pub fn new() -> Self {
        Self {
            hosts: DashMap::new(),
        }
    }

    /// Record the lookup result for a torrent, replacing nothing already known
    pub fn record(&self, hash: &str, hosts: BTreeSet<String>) {
        self.hosts
            .entry(hash.to_string())
            .and_modify(|known| known.extend(hosts.iter().cloned()))
            .or_insert(hosts);
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hosts.contains_key(hash)
    }

    pub fn has_host(&self, hash: &str, host: &str) -> bool {
        self.hosts
            .get(hash)
            .map(|known| known.contains(host))
            .unwrap_or(false)
    }

    /// Every host seen so far, sorted
    pub fn known_hosts(&self) -> BTreeSet<String> {
        self.hosts
            .iter()
            .flat_map(|entry| entry.value().iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl Default for TrackerHostStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase hostnames of announce URLs; pseudo-trackers such as DHT are skipped
pub fn tracker_hosts(entries: &[TrackerEntry]) -> BTreeSet<String> {
    entries
        .iter()
        .filter_map(|entry| Url::parse(entry.url.trim()).ok())
        .filter_map(|url| url.host_str().map(|host| host.trim().to_ascii_lowercase()))
        .filter(|host| !host.is_empty())
        .collect()
}

/// Hashes that still need a tracker lookup, in snapshot order, at most `cap`
pub fn pending_lookups<'a, I>(
    hashes: I,
    store: &TrackerHostStore,
    in_flight: &HashSet<String>,
    cap: usize,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    hashes
        .into_iter()
        .filter(|hash| !hash.is_empty())
        .filter(|hash| !store.contains(hash) && !in_flight.contains(*hash))
        .filter(|hash| seen.insert(*hash))
        .take(cap)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> TrackerEntry {
        TrackerEntry {
            url: url.to_string(),
            status: 2,
            tier: 0,
            num_peers: 0,
            msg: String::new(),
        }
    }

    #[test]
    fn test_tracker_hosts_extraction() {
        let hosts = tracker_hosts(&[
            entry("udp://Tracker.Example.com:1337/announce"),
            entry("https://tracker.example.com/announce"),
            entry("http://other.example.org/a?passkey=x"),
            entry("** [DHT] **"),
            entry("** [PeX] **"),
            entry(""),
        ]);

        let expected: BTreeSet<String> = ["other.example.org", "tracker.example.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(hosts, expected);
    }

    #[test]
    fn test_record_and_query() {
        let store = TrackerHostStore::new();
        assert!(store.is_empty());

        store.record("a", BTreeSet::from(["t1.example".to_string()]));
        store.record("b", BTreeSet::new());

        assert!(store.contains("a"));
        assert!(store.contains("b"));
        assert!(store.has_host("a", "t1.example"));
        assert!(!store.has_host("b", "t1.example"));
        assert!(!store.has_host("c", "t1.example"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_entries_only_grow() {
        let store = TrackerHostStore::new();
        store.record("a", BTreeSet::from(["t1.example".to_string()]));
        store.record("a", BTreeSet::from(["t2.example".to_string()]));

        assert!(store.has_host("a", "t1.example"));
        assert!(store.has_host("a", "t2.example"));
        assert_eq!(
            store.known_hosts().into_iter().collect::<Vec<_>>(),
            vec!["t1.example", "t2.example"]
        );
    }

    #[test]
    fn test_pending_lookups_respects_cap_and_known_entries() {
        let store = TrackerHostStore::new();
        store.record("h1", BTreeSet::new());
        let in_flight: HashSet<String> = HashSet::from(["h2".to_string()]);

        let hashes: Vec<String> = (0..100).map(|i| format!("h{}", i)).collect();
        let pending = pending_lookups(hashes.iter().map(String::as_str), &store, &in_flight, 40);

        assert_eq!(pending.len(), 40);
        assert_eq!(pending[0], "h0");
        assert!(!pending.contains(&"h1".to_string()));
        assert!(!pending.contains(&"h2".to_string()));
    }

    #[test]
    fn test_pending_lookups_deduplicates() {
        let store = TrackerHostStore::new();
        let pending = pending_lookups(["x", "x", "", "y"], &store, &HashSet::new(), 10);
        assert_eq!(pending, vec!["x", "y"]);
    }
}
