//! Persisted user settings and reading position.

use alloc::{format, string::String};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::render::Theme;

pub const SETTINGS_KEY: &str = "settings";
pub const POSITION_KEY: &str = "position";

/// Best-effort string key/value persistence.
///
/// Errors are logged by callers and never interrupt reading.
pub trait KeyValueStore {
    type Error: core::fmt::Debug;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), Self::Error>;
}

impl KeyValueStore for alloc::collections::BTreeMap<String, String> {
    type Error = core::convert::Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(alloc::collections::BTreeMap::get(self, key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.insert(String::from(key), String::from(value));
        Ok(())
    }
}

/// User-tunable settings that survive restarts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSettings {
    pub wpm: u16,
    pub chunk_size: u8,
    pub orp_enabled: bool,
    pub theme: Theme,
    pub font_size: u16,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            wpm: 350,
            chunk_size: 1,
            orp_enabled: true,
            theme: Theme::Dark,
            font_size: 48,
        }
    }
}

/// Saved absolute position, tied to the word count of the book it was read in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPosition {
    pub pos: u32,
    pub total_words: u32,
}

impl PersistedPosition {
    /// Position to resume at, or `None` when the book content changed.
    pub fn validated(self, total_words: u32) -> Option<u32> {
        (self.total_words == total_words && self.pos < total_words).then_some(self.pos)
    }
}

/// Namespaced store keys for one book.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreKeys {
    pub settings: String,
    pub position: String,
}

impl StoreKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            settings: format!("{prefix}{SETTINGS_KEY}"),
            position: format!("{prefix}{POSITION_KEY}"),
        }
    }
}

/// Read settings; missing or corrupt data yields `None`.
pub fn load_settings<K: KeyValueStore>(store: &K, key: &str) -> Option<PersistedSettings> {
    let raw = read_key(store, key)?;
    match serde_json::from_str::<PersistedSettings>(&raw) {
        Ok(settings) => Some(settings),
        Err(err) => {
            warn!("settings: discarding corrupt value key={} err={}", key, err);
            None
        }
    }
}

pub fn save_settings<K: KeyValueStore>(
    store: &mut K,
    key: &str,
    settings: &PersistedSettings,
) -> bool {
    match serde_json::to_string(settings) {
        Ok(raw) => write_key(store, key, &raw),
        Err(err) => {
            warn!("settings: encode failed err={}", err);
            false
        }
    }
}

/// Read the saved position and validate it against the current book.
pub fn load_position<K: KeyValueStore>(store: &K, key: &str, total_words: u32) -> Option<u32> {
    let raw = read_key(store, key)?;
    let saved = match serde_json::from_str::<PersistedPosition>(&raw) {
        Ok(saved) => saved,
        Err(err) => {
            warn!("position: discarding corrupt value key={} err={}", key, err);
            return None;
        }
    };

    let resumed = saved.validated(total_words);
    if resumed.is_none() {
        debug!(
            "position: stale saved pos={} saved_total={} current_total={}",
            saved.pos, saved.total_words, total_words
        );
    }
    resumed
}

pub fn save_position<K: KeyValueStore>(
    store: &mut K,
    key: &str,
    position: PersistedPosition,
) -> bool {
    match serde_json::to_string(&position) {
        Ok(raw) => write_key(store, key, &raw),
        Err(err) => {
            warn!("position: encode failed err={}", err);
            false
        }
    }
}

fn read_key<K: KeyValueStore>(store: &K, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(err) => {
            warn!("store: read failed key={} err={:?}", key, err);
            None
        }
    }
}

fn write_key<K: KeyValueStore>(store: &mut K, key: &str, value: &str) -> bool {
    match store.set(key, value) {
        Ok(()) => true,
        Err(err) => {
            warn!("store: write failed key={} err={:?}", key, err);
            false
        }
    }
}

/// Debounces position saves while the position changes every tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionSync {
    last_saved: Option<u32>,
    dirty_since_ms: Option<u64>,
}

impl PositionSync {
    pub fn new(initial: Option<u32>) -> Self {
        Self {
            last_saved: initial,
            dirty_since_ms: None,
        }
    }

    pub fn observe(&mut self, pos: u32, now_ms: u64) {
        if self.last_saved == Some(pos) {
            self.dirty_since_ms = None;
        } else if self.dirty_since_ms.is_none() {
            self.dirty_since_ms = Some(now_ms);
        }
    }

    pub fn debounced_due(&self, now_ms: u64, debounce_ms: u64) -> bool {
        self.dirty_since_ms
            .is_some_and(|since| now_ms.saturating_sub(since) >= debounce_ms)
    }

    pub fn mark_saved(&mut self, pos: u32) {
        self.last_saved = Some(pos);
        self.dirty_since_ms = None;
    }

    pub fn last_saved(&self) -> Option<u32> {
        self.last_saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        type Error = &'static str;

        fn get(&self, _key: &str) -> Result<Option<String>, Self::Error> {
            Err("unavailable")
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), Self::Error> {
            Err("read-only")
        }
    }

    #[test]
    fn settings_round_trip_through_store() {
        let mut store = BTreeMap::new();
        let settings = PersistedSettings {
            wpm: 500,
            chunk_size: 2,
            orp_enabled: false,
            theme: Theme::Light,
            font_size: 32,
        };

        assert!(save_settings(&mut store, "book:settings", &settings));
        assert_eq!(load_settings(&store, "book:settings"), Some(settings));
        assert_eq!(
            store.get("book:settings").map(String::as_str),
            Some(r#"{"wpm":500,"chunkSize":2,"orpEnabled":false,"theme":"light","fontSize":32}"#)
        );
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let mut store = BTreeMap::new();
        store.insert(String::from("s"), String::from(r#"{"wpm":420}"#));
        let loaded = load_settings(&store, "s").unwrap();
        assert_eq!(loaded.wpm, 420);
        assert_eq!(loaded.chunk_size, PersistedSettings::default().chunk_size);
    }

    #[test]
    fn corrupt_or_unreadable_settings_degrade_to_none() {
        let mut store = BTreeMap::new();
        store.insert(String::from("s"), String::from("{not json"));
        assert_eq!(load_settings(&store, "s"), None);
        assert_eq!(load_settings(&store, "missing"), None);
        assert_eq!(load_settings(&BrokenStore, "s"), None);
        assert!(!save_settings(&mut BrokenStore, "s", &PersistedSettings::default()));
    }

    #[test]
    fn position_from_other_edition_is_discarded() {
        let mut store = BTreeMap::new();
        save_position(
            &mut store,
            "p",
            PersistedPosition {
                pos: 700,
                total_words: 1_000,
            },
        );

        assert_eq!(load_position(&store, "p", 1_000), Some(700));
        assert_eq!(load_position(&store, "p", 1_050), None);
    }

    #[test]
    fn position_past_end_is_discarded() {
        let saved = PersistedPosition {
            pos: 10,
            total_words: 10,
        };
        assert_eq!(saved.validated(10), None);
    }

    #[test]
    fn keys_are_namespaced() {
        let keys = StoreKeys::with_prefix("illusions-of-work:");
        assert_eq!(keys.settings, "illusions-of-work:settings");
        assert_eq!(keys.position, "illusions-of-work:position");
    }

    #[test]
    fn position_sync_waits_for_debounce() {
        let mut sync = PositionSync::new(Some(0));
        sync.observe(0, 0);
        assert!(!sync.debounced_due(10_000, 4_000));

        sync.observe(5, 1_000);
        sync.observe(9, 2_000);
        assert!(!sync.debounced_due(4_999, 4_000));
        assert!(sync.debounced_due(5_000, 4_000));

        sync.mark_saved(9);
        assert!(!sync.debounced_due(9_000, 4_000));
        assert_eq!(sync.last_saved(), Some(9));
    }
}
