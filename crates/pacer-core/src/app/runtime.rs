impl<S, K, E> ReaderSession<S, K, E>
where
    S: ChapterDataSource,
    K: KeyValueStore,
    E: EventSink,
{
    /// Pick the starting position: deep link, then saved position, else the
    /// title card.
    pub async fn restore(&mut self, link: Option<&DeepLink>) -> StartPosition {
        if self.index.is_empty() {
            debug!("session: restore on empty book");
            return StartPosition::TitleCard;
        }

        let saved = load_position(&self.store, &self.keys.position, self.index.total_words());
        self.position_sync = PositionSync::new(saved);

        let start = match (link.and_then(|link| link.resolve(&self.index)), saved) {
            (Some(target), _) => StartPosition::DeepLink(target),
            (None, Some(pos)) if pos > 0 => StartPosition::Resumed(pos),
            _ => StartPosition::TitleCard,
        };

        match start {
            StartPosition::DeepLink(LinkTarget { pos, .. }) | StartPosition::Resumed(pos) => {
                self.pos = pos;
                self.ui = UiState::Stopped;
                let report = self.cache.ensure_window(pos).await;
                debug!("session: restore pos={} window={:?}", pos, report);
            }
            StartPosition::TitleCard => {
                self.pos = 0;
                self.ui = UiState::TitleCard;
                self.prefetch = Some(self.index.start_chapter());
            }
        }

        info!("session: start={:?}", start);
        self.pending_redraw = true;
        start
    }

    /// Start playback. Returns false when nothing changed.
    pub async fn play(&mut self, now_ms: u64) -> bool {
        self.clock_ms = self.clock_ms.max(now_ms);
        if self.index.is_empty() || self.is_playing() {
            return false;
        }

        if self.ui == UiState::TitleCard {
            let chapter = self.index.start_chapter();
            self.pos = self.index.chapter_start(chapter);
            self.ui = UiState::Stopped;
            let report = self.cache.ensure_window(self.pos).await;
            debug!("session: leave title card pos={} window={:?}", self.pos, report);
            self.events.notify(ReaderEvent::ChapterStart { chapter });
        } else if matches!(self.cache.get_word(self.pos), WordLookup::Pending { .. }) {
            let _ = self.cache.ensure_window(self.pos).await;
        }

        self.ui = UiState::Playing {
            next_wake_ms: now_ms + self.current_delay_ms(),
        };
        self.playing_since_ms = Some(now_ms);
        self.last_progress_ms = Some(now_ms);
        self.prefetch = self.cache.preload_candidate(self.pos);
        self.pending_redraw = true;
        debug!("session: play pos={} wpm={}", self.pos, self.settings.wpm);
        true
    }

    /// Stop playback and save the position. Safe to call in any state.
    pub fn pause(&mut self, now_ms: u64) -> bool {
        self.clock_ms = self.clock_ms.max(now_ms);
        if !self.is_playing() {
            return false;
        }

        self.stop_playback(now_ms);
        self.save_position_now();
        self.pending_redraw = true;
        debug!("session: pause pos={}", self.pos);
        true
    }

    pub async fn toggle_play(&mut self, now_ms: u64) -> bool {
        if self.is_playing() {
            self.pause(now_ms)
        } else {
            self.play(now_ms).await
        }
    }

    /// Advance playback if its wake time has elapsed.
    pub fn tick(&mut self, now_ms: u64) -> TickResult {
        self.clock_ms = self.clock_ms.max(now_ms);

        let result = match self.ui {
            UiState::Playing { next_wake_ms } if now_ms >= next_wake_ms => {
                let step = self.settings.chunk_size.max(1) as u32;
                let target = match self.index.last_pos() {
                    Some(last) => self.pos.saturating_add(step).min(last),
                    None => self.pos,
                };
                self.commit_target(target, now_ms)
            }
            UiState::Stalled { target } => self.commit_target(target, now_ms),
            _ => TickResult::NoRender,
        };

        self.track_progress(now_ms);

        match result {
            TickResult::NoRender if self.pending_redraw => {
                self.pending_redraw = false;
                TickResult::RenderRequested
            }
            TickResult::RenderRequested => {
                self.pending_redraw = false;
                result
            }
            other => other,
        }
    }

    /// Stop playback and report the session totals.
    pub fn end_session(&mut self, now_ms: u64) {
        self.pause(now_ms);
        info!(
            "session: end pos={} words_read={} reading_ms={}",
            self.pos, self.words_read, self.reading_ms
        );
        self.events.notify(ReaderEvent::SessionEnd {
            pos: self.pos,
            words_read: self.words_read,
            reading_ms: self.reading_ms,
        });
    }

    /// Display delay for the chunk at the current position.
    pub fn current_delay_ms(&self) -> u64 {
        let chunk = self.settings.chunk_size.max(1);
        let tail = match self.index.last_pos() {
            Some(last) => self.pos.saturating_add(chunk as u32 - 1).min(last),
            None => self.pos,
        };
        let pause = match self.cache.get_word(tail) {
            WordLookup::Ready(word) => word.pause,
            _ => None,
        };
        tick_delay_ms(self.settings.wpm, chunk, pause)
    }

    fn commit_target(&mut self, target: u32, now_ms: u64) -> TickResult {
        let chapter = match self.cache.get_word(target) {
            WordLookup::Ready(_) => self.index.chapter_for_pos(target as i64),
            WordLookup::Pending { chapter } => {
                if self.ui != (UiState::Stalled { target }) {
                    debug!("session: stalled target={} chapter={}", target, chapter);
                }
                self.ui = UiState::Stalled { target };
                return TickResult::AwaitingChapter {
                    pos: target,
                    chapter,
                };
            }
            WordLookup::OutOfRange => {
                self.stop_playback(now_ms);
                self.save_position_now();
                return TickResult::RenderRequested;
            }
        };

        let from = self.current_chapter();
        let advanced = target.saturating_sub(self.pos);
        self.pos = target;
        self.words_read = self.words_read.saturating_add(advanced as u64);
        self.words_since_drain = self.words_since_drain.saturating_add(advanced);

        if chapter != from {
            debug!("session: chapter {} -> {}", from, chapter);
            self.events.notify(ReaderEvent::ChapterComplete { chapter: from });
            self.events.notify(ReaderEvent::ChapterStart { chapter });
        }

        if self.index.last_pos() == Some(target) {
            info!("session: end of book pos={}", target);
            self.events.notify(ReaderEvent::ChapterComplete { chapter });
            self.stop_playback(now_ms);
            self.save_position_now();
            return TickResult::RenderRequested;
        }

        if let Some(next) = self.cache.preload_candidate(self.pos) {
            self.prefetch = Some(next);
        }
        self.ui = UiState::Playing {
            next_wake_ms: now_ms + self.current_delay_ms(),
        };
        TickResult::RenderRequested
    }

    fn track_progress(&mut self, now_ms: u64) {
        if !self.is_playing() {
            return;
        }

        let due = self
            .last_progress_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.config.progress_interval_ms);
        if due {
            self.last_progress_ms = Some(now_ms);
            self.events.notify(ReaderEvent::Progress {
                pos: self.pos,
                book_pct: Progress::book_pct(self.pos, self.index.total_words()),
                wpm: self.settings.wpm,
            });
        }

        self.position_sync.observe(self.pos, now_ms);
        if self
            .position_sync
            .debounced_due(now_ms, self.config.position_save_debounce_ms)
        {
            self.save_position_now();
        }
    }

    fn stop_playback(&mut self, now_ms: u64) {
        if let Some(since) = self.playing_since_ms.take() {
            self.reading_ms = self.reading_ms.saturating_add(now_ms.saturating_sub(since));
        }
        self.last_progress_ms = None;
        if self.ui != UiState::TitleCard {
            self.ui = UiState::Stopped;
        }
    }

    fn save_position_now(&mut self) {
        if self.index.is_empty() || self.position_sync.last_saved() == Some(self.pos) {
            return;
        }

        let position = PersistedPosition {
            pos: self.pos,
            total_words: self.index.total_words(),
        };
        if save_position(&mut self.store, &self.keys.position, position) {
            self.position_sync.mark_saved(self.pos);
            debug!("position: saved pos={}", self.pos);
        }
    }
}
