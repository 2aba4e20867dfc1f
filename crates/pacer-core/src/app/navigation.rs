impl<S, K, E> ReaderSession<S, K, E>
where
    S: ChapterDataSource,
    K: KeyValueStore,
    E: EventSink,
{
    /// Move by `delta` words, clamped to the book. Returns the new position.
    pub async fn skip_words(&mut self, delta: i64) -> u32 {
        let target = self.index.clamp_pos((self.pos as i64).saturating_add(delta));
        debug!("ui-nav: skip delta={} pos={} -> {}", delta, self.pos, target);
        self.jump_to(target).await
    }

    pub async fn go_to_chapter(&mut self, chapter: u16) -> u32 {
        let last = self.index.chapter_count().saturating_sub(1);
        let chapter = chapter.min(last);
        debug!("ui-nav: go to chapter={}", chapter);
        self.jump_to(self.index.chapter_start(chapter)).await
    }

    /// Restart the current chapter, or step back one chapter when already at
    /// its beginning.
    pub async fn prev_chapter(&mut self) -> u32 {
        let local = self.index.local_pos(self.pos);
        let chapter = if local.index > self.config.prev_chapter_restart_words {
            local.chapter
        } else {
            local.chapter.saturating_sub(1)
        };
        debug!(
            "ui-nav: prev chapter from={} local={} -> chapter={}",
            local.chapter, local.index, chapter
        );
        self.jump_to(self.index.chapter_start(chapter)).await
    }

    /// Jump to the next chapter; on the last chapter this only pauses.
    pub async fn next_chapter(&mut self) -> u32 {
        let next = self.current_chapter().saturating_add(1);
        if next >= self.index.chapter_count() {
            debug!("ui-nav: next chapter at last chapter, pausing");
            self.pause(self.clock_ms);
            return self.pos;
        }
        debug!("ui-nav: next chapter -> {}", next);
        self.jump_to(self.index.chapter_start(next)).await
    }

    pub async fn replay_chapter(&mut self) -> u32 {
        let chapter = self.current_chapter();
        debug!("ui-nav: replay chapter={}", chapter);
        self.jump_to(self.index.chapter_start(chapter)).await
    }

    async fn jump_to(&mut self, target: u32) -> u32 {
        if self.is_playing() {
            self.stop_playback(self.clock_ms);
        }
        if self.index.is_empty() {
            return self.pos;
        }

        self.pos = target;
        self.ui = UiState::Stopped;
        self.pending_redraw = true;
        let report = self.cache.ensure_window(target).await;
        debug!("ui-nav: jump pos={} window={:?}", target, report);
        self.save_position_now();
        self.pos
    }
}
