//! Lazily populated chapter cache with in-flight de-duplication.
//!
//! Chapters are fetched on demand from a [`ChapterDataSource`] and kept for
//! the rest of the session. The cache is shared through `Rc` by the session
//! and the host loop; all mutation goes through a `RefCell` that is never held
//! across an await point.

use alloc::{collections::BTreeMap, rc::Rc, vec::Vec};
use core::{
    cell::RefCell,
    future::poll_fn,
    task::{Poll, Waker},
};

use embassy_futures::join::join3;
use heapless::Vec as HeaplessVec;
use log::{debug, warn};

use super::{ChapterDataSource, Word};
use crate::book::BookIndex;

/// Words left in a chapter at which the next chapter is requested early.
pub const PRELOAD_LOOKAHEAD_WORDS: u32 = 100;

/// Result of a synchronous word lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WordLookup {
    Ready(Word),
    /// The owning chapter is not cached yet.
    Pending { chapter: u16 },
    /// Position is past the end of the book.
    OutOfRange,
}

/// Outcome of [`ChapterCache::ensure_window`]: each requested chapter and
/// whether it is cached after its load settled.
pub type WindowReport = HeaplessVec<(u16, bool), 3>;

#[derive(Default)]
struct CacheState {
    chapters: BTreeMap<u16, Vec<Word>>,
    in_flight: BTreeMap<u16, Vec<Waker>>,
    fetches_started: u32,
    fetches_failed: u32,
}

impl CacheState {
    fn is_cached(&self, chapter: u16) -> bool {
        self.chapters.contains_key(&chapter)
    }
}

pub struct ChapterCache<S: ChapterDataSource> {
    source: S,
    index: Rc<BookIndex>,
    state: RefCell<CacheState>,
}

impl<S: ChapterDataSource> ChapterCache<S> {
    pub fn new(source: S, index: Rc<BookIndex>) -> Self {
        Self {
            source,
            index,
            state: RefCell::new(CacheState::default()),
        }
    }

    pub fn index(&self) -> &BookIndex {
        &self.index
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_cached(&self, chapter: u16) -> bool {
        self.state.borrow().is_cached(chapter)
    }

    pub fn is_loading(&self, chapter: u16) -> bool {
        self.state.borrow().in_flight.contains_key(&chapter)
    }

    pub fn fetches_started(&self) -> u32 {
        self.state.borrow().fetches_started
    }

    pub fn fetches_failed(&self) -> u32 {
        self.state.borrow().fetches_failed
    }

    /// Make `chapter` available, fetching it at most once at a time.
    ///
    /// Concurrent callers for the same chapter wait on the load that is
    /// already running. Returns whether the chapter is cached afterwards; a
    /// failed load leaves nothing behind so a later call fetches again.
    pub async fn ensure_loaded(&self, chapter: u16) -> bool {
        let Some(meta) = self.index.chapter(chapter) else {
            return false;
        };
        let expected_words = meta.word_count as usize;

        {
            let mut state = self.state.borrow_mut();
            if state.is_cached(chapter) {
                return true;
            }
            if !state.in_flight.contains_key(&chapter) {
                state.in_flight.insert(chapter, Vec::new());
                state.fetches_started = state.fetches_started.saturating_add(1);
            } else {
                drop(state);
                return self.wait_for(chapter).await;
            }
        }

        debug!("cache: fetch start chapter={}", chapter);
        let guard = InFlightGuard {
            state: &self.state,
            chapter,
        };
        let fetched = self.source.fetch_chapter(chapter).await;

        let loaded = match fetched {
            Ok(words) if words.len() == expected_words => {
                debug!("cache: fetch ok chapter={} words={}", chapter, words.len());
                self.state.borrow_mut().chapters.insert(chapter, words);
                true
            }
            Ok(words) => {
                warn!(
                    "cache: chapter={} has {} words, metadata declares {}; discarding",
                    chapter,
                    words.len(),
                    expected_words
                );
                false
            }
            Err(err) => {
                warn!("cache: fetch failed chapter={} err={:?}", chapter, err);
                false
            }
        };

        if !loaded {
            let mut state = self.state.borrow_mut();
            state.fetches_failed = state.fetches_failed.saturating_add(1);
        }
        drop(guard);
        loaded
    }

    fn wait_for(&self, chapter: u16) -> impl Future<Output = bool> + '_ {
        poll_fn(move |cx| {
            let mut state = self.state.borrow_mut();
            match state.in_flight.get_mut(&chapter) {
                Some(waiters) => {
                    if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
                        waiters.push(cx.waker().clone());
                    }
                    Poll::Pending
                }
                None => Poll::Ready(state.is_cached(chapter)),
            }
        })
    }

    /// Load the chapter owning `pos` plus its neighbours and wait for all of
    /// them to settle, successfully or not.
    pub async fn ensure_window(&self, pos: u32) -> WindowReport {
        let targets = self.window_for(pos);
        let load = |slot: usize| {
            let chapter = targets.get(slot).copied();
            async move {
                match chapter {
                    Some(chapter) => Some((chapter, self.ensure_loaded(chapter).await)),
                    None => None,
                }
            }
        };

        let (a, b, c) = join3(load(0), load(1), load(2)).await;
        let mut report = WindowReport::new();
        for outcome in [a, b, c].into_iter().flatten() {
            let _ = report.push(outcome);
        }
        report
    }

    /// Previous, current and next chapter around `pos`, clipped to the book.
    pub fn window_for(&self, pos: u32) -> HeaplessVec<u16, 3> {
        let mut targets = HeaplessVec::new();
        let count = self.index.chapter_count();
        if count == 0 {
            return targets;
        }

        let current = self.index.chapter_for_pos(pos as i64);
        if current > 0 {
            let _ = targets.push(current - 1);
        }
        let _ = targets.push(current);
        if current + 1 < count {
            let _ = targets.push(current + 1);
        }
        targets
    }

    pub fn get_word(&self, pos: u32) -> WordLookup {
        if pos >= self.index.total_words() {
            return WordLookup::OutOfRange;
        }

        let local = self.index.local_pos(pos);
        let state = self.state.borrow();
        match state.chapters.get(&local.chapter) {
            Some(words) => match words.get(local.index as usize) {
                Some(word) => WordLookup::Ready(word.clone()),
                None => WordLookup::OutOfRange,
            },
            None => WordLookup::Pending {
                chapter: local.chapter,
            },
        }
    }

    /// Run `f` over up to `N` consecutive cached words starting at `pos`.
    ///
    /// Stops at the end of the book or at the first word whose chapter is not
    /// cached, so the slice may be shorter than requested.
    pub fn with_words<const N: usize, R, F>(&self, pos: u32, len: usize, f: F) -> R
    where
        F: FnOnce(&[&Word]) -> R,
    {
        let state = self.state.borrow();
        let mut words: HeaplessVec<&Word, N> = HeaplessVec::new();
        let total = self.index.total_words();

        for offset in 0..len.min(N) as u32 {
            let Some(pos) = pos.checked_add(offset).filter(|p| *p < total) else {
                break;
            };
            let local = self.index.local_pos(pos);
            let Some(word) = state
                .chapters
                .get(&local.chapter)
                .and_then(|chapter| chapter.get(local.index as usize))
            else {
                break;
            };
            let _ = words.push(word);
        }

        f(&words)
    }

    /// Next chapter to request ahead of time when `pos` is near the end of
    /// its chapter and that chapter is neither cached nor loading.
    pub fn preload_candidate(&self, pos: u32) -> Option<u16> {
        let local = self.index.local_pos(pos);
        let chapter = self.index.chapter(local.chapter)?;
        let next = local.chapter.checked_add(1)?;
        if next >= self.index.chapter_count() {
            return None;
        }

        let remaining = chapter.word_count.saturating_sub(local.index);
        if remaining > PRELOAD_LOOKAHEAD_WORDS {
            return None;
        }

        let state = self.state.borrow();
        if state.is_cached(next) || state.in_flight.contains_key(&next) {
            None
        } else {
            Some(next)
        }
    }
}

/// Clears the in-flight marker and wakes waiters when a fetch finishes or its
/// future is dropped mid-load.
struct InFlightGuard<'a> {
    state: &'a RefCell<CacheState>,
    chapter: u16,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let waiters = self
            .state
            .borrow_mut()
            .in_flight
            .remove(&self.chapter)
            .unwrap_or_default();
        for waker in waiters {
            waker.wake();
        }
    }
}
