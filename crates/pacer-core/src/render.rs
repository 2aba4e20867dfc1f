//! View models handed to the rendering surface.

use heapless::Vec as HeaplessVec;
use serde::{Deserialize, Serialize};

/// Largest chunk the session will display at once.
pub const MAX_CHUNK_WORDS: usize = 5;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VisualStyle {
    pub theme: Theme,
    pub font_size: u16,
}

/// Reading progress shown next to the word.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Progress {
    /// 1-based word within the current chapter.
    pub chapter_word: u32,
    pub chapter_words: u32,
    /// Whole-book completion, 0..=100.
    pub book_pct: u8,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Screen<'a> {
    /// Shown before the reader has ever started.
    TitleCard {
        title: &'a str,
        author: &'a str,
        subtitle: Option<&'a str>,
        style: VisualStyle,
    },
    Reading {
        chunk: HeaplessVec<&'a str, MAX_CHUNK_WORDS>,
        /// Character index of the fixation letter in a single-word chunk.
        orp_index: Option<usize>,
        chapter_label: &'a str,
        part: Option<&'a str>,
        progress: Progress,
        wpm: u16,
        paused: bool,
        style: VisualStyle,
    },
    /// Current word's chapter has not arrived yet.
    Loading {
        chapter_label: &'a str,
        style: VisualStyle,
    },
    Empty {
        title: &'a str,
        style: VisualStyle,
    },
}

impl Progress {
    pub fn book_pct(pos: u32, total_words: u32) -> u8 {
        if total_words <= 1 {
            return 100;
        }
        let pct = (pos as u64 * 100) / (total_words as u64 - 1);
        pct.min(100) as u8
    }
}
