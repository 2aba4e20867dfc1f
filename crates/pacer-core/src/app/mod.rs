//! Reading session: playback scheduler, navigation and persisted state.

use alloc::{rc::Rc, string::String};

use heapless::Vec as HeaplessVec;
use log::{debug, info};

use crate::{
    book::BookIndex,
    content::{ChapterCache, ChapterDataSource, WordLookup},
    deep_link::{DeepLink, LinkTarget, share_url},
    events::{EventSink, ReaderEvent},
    render::{MAX_CHUNK_WORDS, Progress, Screen, Theme, VisualStyle},
    settings::{
        KeyValueStore, PersistedPosition, PersistedSettings, PositionSync, StoreKeys,
        load_position, load_settings, save_position, save_settings,
    },
    text_policy::{orp_char_index, tick_delay_ms},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickResult {
    NoRender,
    RenderRequested,
    /// Playback is held until the chapter owning `pos` is cached. The host
    /// should run [`ChapterCache::ensure_window`] for `pos` and keep ticking.
    AwaitingChapter { pos: u32, chapter: u16 },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReaderConfig {
    pub min_wpm: u16,
    pub max_wpm: u16,
    pub wpm_step: u16,
    pub max_chunk_size: u8,
    pub min_font_size: u16,
    pub max_font_size: u16,
    /// Words into a chapter after which "previous chapter" restarts the
    /// current one instead.
    pub prev_chapter_restart_words: u32,
    pub progress_interval_ms: u64,
    pub position_save_debounce_ms: u64,
    /// Prepended to store keys so several books can share one store.
    pub store_prefix: String,
    pub share_base_url: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            min_wpm: 100,
            max_wpm: 1_000,
            wpm_step: 25,
            max_chunk_size: MAX_CHUNK_WORDS as u8,
            min_font_size: 16,
            max_font_size: 96,
            prev_chapter_restart_words: 10,
            progress_interval_ms: 60_000,
            position_save_debounce_ms: 4_000,
            store_prefix: String::new(),
            share_base_url: String::new(),
        }
    }
}

/// Snapshot of the values the scheduler works from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlaybackState {
    pub playing: bool,
    pub pos: u32,
    pub wpm: u16,
    pub chunk_size: u8,
    pub orp_enabled: bool,
}

/// Where a restored session starts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StartPosition {
    TitleCard,
    DeepLink(LinkTarget),
    Resumed(u32),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum UiState {
    TitleCard,
    Stopped,
    Playing { next_wake_ms: u64 },
    /// Playing, but the next chunk's chapter is not cached yet.
    Stalled { target: u32 },
}

pub struct ReaderSession<S, K, E>
where
    S: ChapterDataSource,
    K: KeyValueStore,
    E: EventSink,
{
    index: Rc<BookIndex>,
    cache: Rc<ChapterCache<S>>,
    store: K,
    events: E,
    config: ReaderConfig,
    keys: StoreKeys,
    settings: PersistedSettings,
    ui: UiState,
    pos: u32,
    pending_redraw: bool,
    prefetch: Option<u16>,
    position_sync: PositionSync,
    last_progress_ms: Option<u64>,
    playing_since_ms: Option<u64>,
    /// Latest host time seen, used when navigation pauses playback.
    clock_ms: u64,
    reading_ms: u64,
    words_read: u64,
    words_since_drain: u32,
}

include!("view.rs");
include!("runtime.rs");
include!("navigation.rs");

#[cfg(test)]
mod tests;
