use log::info;

use super::{CHAPTER_RETRY_BACKOFF_MAX_MS, CHAPTER_RETRY_BACKOFF_MIN_MS};

pub(super) fn chapter_retry_backoff_ms(consecutive_failures: u32) -> u64 {
    // 250, 500, 1000, 2000, 4000, 8000, 8000, ...
    let shift = consecutive_failures.min(5);
    CHAPTER_RETRY_BACKOFF_MIN_MS
        .saturating_mul(1u64 << shift)
        .min(CHAPTER_RETRY_BACKOFF_MAX_MS)
}

/// Spaces out window reloads while playback waits on a chapter.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct ChapterRetryState {
    consecutive_failures: u32,
    next_attempt_ms: u64,
}

impl ChapterRetryState {
    pub(super) fn attempt_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_attempt_ms
    }

    pub(super) fn mark_failed(&mut self, chapter: u16, now_ms: u64) {
        let delay_ms = chapter_retry_backoff_ms(self.consecutive_failures);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.next_attempt_ms = now_ms.saturating_add(delay_ms);
        info!(
            "chapter-load: chapter={} retrying in {}ms (consecutive_failures={})",
            chapter, delay_ms, self.consecutive_failures
        );
    }

    pub(super) fn mark_loaded(&mut self) {
        self.consecutive_failures = 0;
        self.next_attempt_ms = 0;
    }

    pub(super) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
