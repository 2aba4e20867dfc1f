//! Book metadata and the derived word-offset table.

use alloc::{string::String, vec::Vec};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    position::{self, LocalPosition},
    text_policy::{chapter_label, slugify},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMeta {
    pub id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_num: Option<u32>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    pub word_count: u32,
}

impl ChapterMeta {
    /// `Chapter N: Title` for numbered chapters, the bare title otherwise.
    pub fn label(&self) -> String {
        chapter_label(self.chapter_num, &self.title)
    }

    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMeta {
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Free-form data version; only carried through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub start_chapter: u16,
    pub total_words: u32,
    pub chapters: Vec<ChapterMeta>,
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("invalid book metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chapter at index {index} declares id {id}")]
    ChapterIdMismatch { index: usize, id: u16 },
    #[error("chapter {id} has no words")]
    EmptyChapter { id: u16 },
    #[error("book declares {declared} words but chapters sum to {counted}")]
    WordCountMismatch { declared: u32, counted: u64 },
    #[error("book has more than {max} chapters", max = u16::MAX)]
    TooManyChapters,
}

/// Validated, immutable book metadata plus its offset table.
#[derive(Clone, Debug)]
pub struct BookIndex {
    meta: BookMeta,
    offsets: Vec<u32>,
    start_chapter: u16,
}

impl BookIndex {
    pub fn new(meta: BookMeta) -> Result<Self, BookError> {
        if meta.chapters.len() > u16::MAX as usize {
            return Err(BookError::TooManyChapters);
        }

        let mut counted = 0u64;
        for (index, chapter) in meta.chapters.iter().enumerate() {
            if chapter.id as usize != index {
                return Err(BookError::ChapterIdMismatch {
                    index,
                    id: chapter.id,
                });
            }
            if chapter.word_count == 0 {
                return Err(BookError::EmptyChapter { id: chapter.id });
            }
            counted += chapter.word_count as u64;
        }

        if counted != meta.total_words as u64 {
            return Err(BookError::WordCountMismatch {
                declared: meta.total_words,
                counted,
            });
        }

        let offsets = position::build_offsets(meta.chapters.iter().map(|c| c.word_count));
        let last_chapter = (meta.chapters.len() as u16).saturating_sub(1);
        let start_chapter = if meta.start_chapter > last_chapter {
            warn!(
                "book: start_chapter={} past last chapter={}; clamping",
                meta.start_chapter, last_chapter
            );
            last_chapter
        } else {
            meta.start_chapter
        };

        debug!(
            "book: indexed title={:?} chapters={} total_words={} start_chapter={}",
            meta.title,
            meta.chapters.len(),
            meta.total_words,
            start_chapter
        );

        Ok(Self {
            meta,
            offsets,
            start_chapter,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, BookError> {
        let meta: BookMeta = serde_json::from_str(json)?;
        Self::new(meta)
    }

    pub fn meta(&self) -> &BookMeta {
        &self.meta
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn total_words(&self) -> u32 {
        self.meta.total_words
    }

    pub fn is_empty(&self) -> bool {
        self.meta.total_words == 0
    }

    /// Last valid global index, `None` for an empty book.
    pub fn last_pos(&self) -> Option<u32> {
        self.meta.total_words.checked_sub(1)
    }

    pub fn chapter_count(&self) -> u16 {
        self.meta.chapters.len() as u16
    }

    pub fn chapter(&self, id: u16) -> Option<&ChapterMeta> {
        self.meta.chapters.get(id as usize)
    }

    pub fn chapters(&self) -> &[ChapterMeta] {
        &self.meta.chapters
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn start_chapter(&self) -> u16 {
        self.start_chapter
    }

    /// Global index of the first word of `id`, clamped to the last chapter.
    pub fn chapter_start(&self, id: u16) -> u32 {
        let last = self.chapter_count().saturating_sub(1);
        self.offsets.get(id.min(last) as usize).copied().unwrap_or(0)
    }

    pub fn chapter_for_pos(&self, pos: i64) -> u16 {
        position::chapter_for_pos(&self.offsets, pos)
    }

    pub fn local_pos(&self, pos: u32) -> LocalPosition {
        position::local_pos(&self.offsets, pos)
    }

    pub fn global_pos(&self, local: LocalPosition) -> u32 {
        position::global_pos(&self.offsets, local)
    }

    /// Clamp an arbitrary signed index into `[0, total_words)`.
    pub fn clamp_pos(&self, pos: i64) -> u32 {
        match self.last_pos() {
            Some(last) => pos.clamp(0, last as i64) as u32,
            None => 0,
        }
    }

    pub fn chapter_by_slug(&self, slug: &str) -> Option<u16> {
        let wanted = slugify(slug);
        if wanted.is_empty() {
            return None;
        }
        self.meta
            .chapters
            .iter()
            .find(|chapter| chapter.slug() == wanted)
            .map(|chapter| chapter.id)
    }

    pub fn chapter_by_number(&self, number: u32) -> Option<u16> {
        self.meta
            .chapters
            .iter()
            .find(|chapter| chapter.chapter_num == Some(number))
            .map(|chapter| chapter.id)
    }
}
