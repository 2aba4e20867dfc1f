use alloc::{
    collections::{BTreeMap, BTreeSet},
    format,
    vec::Vec,
};
use core::cell::RefCell;

use embassy_futures::yield_now;

use super::{ChapterDataSource, PauseKind, Word};
use crate::{book::BookIndex, position::LocalPosition};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemorySourceError {
    MissingChapter(u16),
    InjectedFailure(u16),
}

/// In-memory chapter source.
///
/// Every fetch yields once before completing so that concurrent loads really
/// interleave. Fetches are counted per chapter and individual failures can be
/// injected, which makes it the reference source for cache and session tests.
#[derive(Debug, Default)]
pub struct MemorySource {
    chapters: Vec<Vec<Word>>,
    fetches: RefCell<BTreeMap<u16, u32>>,
    fetch_log: RefCell<Vec<u16>>,
    fail_next: RefCell<BTreeSet<u16>>,
}

impl MemorySource {
    pub fn new(chapters: Vec<Vec<Word>>) -> Self {
        Self {
            chapters,
            ..Self::default()
        }
    }

    /// Placeholder words `c{chapter}w{index}` sized to match `index`.
    pub fn generated(index: &BookIndex) -> Self {
        let chapters = index
            .chapters()
            .iter()
            .map(|chapter| {
                (0..chapter.word_count)
                    .map(|i| Word::new(format!("c{}w{}", chapter.id, i)))
                    .collect()
            })
            .collect();
        Self::new(chapters)
    }

    /// Tag the word at global `pos` of `index` with `pause`.
    pub fn with_pause_at(mut self, index: &BookIndex, pos: u32, pause: PauseKind) -> Self {
        let LocalPosition { chapter, index } = index.local_pos(pos);
        if let Some(word) = self
            .chapters
            .get_mut(chapter as usize)
            .and_then(|words| words.get_mut(index as usize))
        {
            word.pause = Some(pause);
        }
        self
    }

    pub fn word(&self, chapter: u16, index: u32) -> Option<Word> {
        self.chapters
            .get(chapter as usize)
            .and_then(|words| words.get(index as usize))
            .cloned()
    }

    /// Make the next fetch of `chapter` fail once.
    pub fn fail_next(&self, chapter: u16) {
        self.fail_next.borrow_mut().insert(chapter);
    }

    pub fn fetch_count(&self, chapter: u16) -> u32 {
        self.fetches.borrow().get(&chapter).copied().unwrap_or(0)
    }

    /// Chapter ids in the order their fetches started.
    pub fn fetch_log(&self) -> Vec<u16> {
        self.fetch_log.borrow().clone()
    }
}

impl ChapterDataSource for MemorySource {
    type Error = MemorySourceError;

    async fn fetch_chapter(&self, chapter_id: u16) -> Result<Vec<Word>, Self::Error> {
        *self.fetches.borrow_mut().entry(chapter_id).or_insert(0) += 1;
        self.fetch_log.borrow_mut().push(chapter_id);

        yield_now().await;

        if self.fail_next.borrow_mut().remove(&chapter_id) {
            return Err(MemorySourceError::InjectedFailure(chapter_id));
        }

        self.chapters
            .get(chapter_id as usize)
            .cloned()
            .ok_or(MemorySourceError::MissingChapter(chapter_id))
    }
}
