impl<S, K, E> ReaderSession<S, K, E>
where
    S: ChapterDataSource,
    K: KeyValueStore,
    E: EventSink,
{
    pub fn new(
        index: Rc<BookIndex>,
        source: S,
        store: K,
        events: E,
        mut config: ReaderConfig,
    ) -> Self {
        if config.max_wpm < config.min_wpm {
            core::mem::swap(&mut config.max_wpm, &mut config.min_wpm);
        }
        if config.max_font_size < config.min_font_size {
            core::mem::swap(&mut config.max_font_size, &mut config.min_font_size);
        }
        config.max_chunk_size = config.max_chunk_size.clamp(1, MAX_CHUNK_WORDS as u8);

        let keys = StoreKeys::with_prefix(&config.store_prefix);
        let stored = load_settings(&store, &keys.settings).unwrap_or_default();
        let cache = Rc::new(ChapterCache::new(source, index.clone()));

        let mut session = Self {
            index,
            cache,
            store,
            events,
            config,
            keys,
            settings: PersistedSettings::default(),
            ui: UiState::TitleCard,
            pos: 0,
            pending_redraw: true,
            prefetch: None,
            position_sync: PositionSync::default(),
            last_progress_ms: None,
            playing_since_ms: None,
            clock_ms: 0,
            reading_ms: 0,
            words_read: 0,
            words_since_drain: 0,
        };
        session.settings = session.sanitized(stored);
        debug!(
            "session: created title={:?} wpm={} chunk={} orp={}",
            session.index.title(),
            session.settings.wpm,
            session.settings.chunk_size,
            session.settings.orp_enabled
        );
        session
    }

    pub fn with_screen<F>(&self, f: F)
    where
        F: FnOnce(Screen<'_>),
    {
        let style = self.style();

        if self.index.is_empty() {
            f(Screen::Empty {
                title: self.index.title(),
                style,
            });
            return;
        }

        if self.ui == UiState::TitleCard {
            let meta = self.index.meta();
            f(Screen::TitleCard {
                title: &meta.title,
                author: &meta.author,
                subtitle: meta.subtitle.as_deref(),
                style,
            });
            return;
        }

        let local = self.index.local_pos(self.pos);
        let chapter = self.index.chapter(local.chapter);
        let chapter_label = chapter.map(|c| c.label()).unwrap_or_default();
        let part = chapter.and_then(|c| c.part.as_deref());
        let progress = Progress {
            chapter_word: local.index.saturating_add(1),
            chapter_words: chapter.map_or(1, |c| c.word_count),
            book_pct: Progress::book_pct(self.pos, self.index.total_words()),
        };

        self.cache.with_words::<MAX_CHUNK_WORDS, _, _>(
            self.pos,
            self.settings.chunk_size as usize,
            |words| {
                if words.is_empty() {
                    f(Screen::Loading {
                        chapter_label: &chapter_label,
                        style,
                    });
                    return;
                }

                let chunk: HeaplessVec<&str, MAX_CHUNK_WORDS> =
                    words.iter().map(|word| word.text.as_str()).collect();
                let orp_index = (self.settings.orp_enabled && chunk.len() == 1)
                    .then(|| orp_char_index(chunk[0]));

                f(Screen::Reading {
                    chunk,
                    orp_index,
                    chapter_label: &chapter_label,
                    part,
                    progress,
                    wpm: self.settings.wpm,
                    paused: !self.is_playing(),
                    style,
                });
            },
        );
    }

    pub fn index(&self) -> &BookIndex {
        &self.index
    }

    /// Shared handle to the chapter cache for host-driven loads.
    pub fn cache(&self) -> Rc<ChapterCache<S>> {
        self.cache.clone()
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn position(&self) -> u32 {
        self.pos
    }

    pub fn current_chapter(&self) -> u16 {
        self.index.chapter_for_pos(self.pos as i64)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.ui, UiState::Playing { .. } | UiState::Stalled { .. })
    }

    pub fn is_title_card(&self) -> bool {
        self.ui == UiState::TitleCard
    }

    /// Stopped on the last word of the book.
    pub fn is_finished(&self) -> bool {
        !self.is_playing() && self.index.last_pos().is_some_and(|last| self.pos >= last)
    }

    /// The single outstanding wake time, if playback is scheduled.
    pub fn next_wake_ms(&self) -> Option<u64> {
        match self.ui {
            UiState::Playing { next_wake_ms } => Some(next_wake_ms),
            _ => None,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            playing: self.is_playing(),
            pos: self.pos,
            wpm: self.settings.wpm,
            chunk_size: self.settings.chunk_size,
            orp_enabled: self.settings.orp_enabled,
        }
    }

    pub fn persisted_settings(&self) -> PersistedSettings {
        self.settings
    }

    pub fn style(&self) -> VisualStyle {
        VisualStyle {
            theme: self.settings.theme,
            font_size: self.settings.font_size,
        }
    }

    /// Chapter the session wants loaded ahead of playback, if any.
    pub fn take_prefetch(&mut self) -> Option<u16> {
        self.prefetch.take()
    }

    pub fn drain_word_updates(&mut self) -> u32 {
        let count = self.words_since_drain;
        self.words_since_drain = 0;
        count
    }

    pub fn words_read(&self) -> u64 {
        self.words_read
    }

    /// Shareable link to the current position.
    pub fn share_link(&mut self) -> String {
        let url = share_url(&self.config.share_base_url, &self.index, self.pos);
        self.events.notify(ReaderEvent::Share {
            chapter: self.current_chapter(),
            pos: self.pos,
        });
        url
    }

    pub fn set_wpm(&mut self, wpm: u16) -> bool {
        let from = self.settings.wpm;
        let changed = self.update_settings(PersistedSettings {
            wpm,
            ..self.settings
        });
        if changed && from != self.settings.wpm {
            info!("settings: wpm {} -> {}", from, self.settings.wpm);
            self.events.notify(ReaderEvent::SpeedChange {
                from,
                to: self.settings.wpm,
            });
        }
        changed
    }

    pub fn adjust_wpm(&mut self, increase: bool) -> bool {
        let next = if increase {
            self.settings.wpm.saturating_add(self.config.wpm_step)
        } else {
            self.settings.wpm.saturating_sub(self.config.wpm_step)
        };
        self.set_wpm(next)
    }

    pub fn set_chunk_size(&mut self, chunk_size: u8) -> bool {
        self.update_settings(PersistedSettings {
            chunk_size,
            ..self.settings
        })
    }

    pub fn set_orp_enabled(&mut self, orp_enabled: bool) -> bool {
        self.update_settings(PersistedSettings {
            orp_enabled,
            ..self.settings
        })
    }

    pub fn toggle_orp(&mut self) -> bool {
        self.set_orp_enabled(!self.settings.orp_enabled)
    }

    pub fn set_theme(&mut self, theme: Theme) -> bool {
        self.update_settings(PersistedSettings {
            theme,
            ..self.settings
        })
    }

    pub fn toggle_theme(&mut self) -> bool {
        self.set_theme(self.settings.theme.toggled())
    }

    pub fn set_font_size(&mut self, font_size: u16) -> bool {
        self.update_settings(PersistedSettings {
            font_size,
            ..self.settings
        })
    }

    fn update_settings(&mut self, requested: PersistedSettings) -> bool {
        let next = self.sanitized(requested);
        if next == self.settings {
            return false;
        }

        self.settings = next;
        save_settings(&mut self.store, &self.keys.settings, &self.settings);
        self.pending_redraw = true;
        true
    }

    fn sanitized(&self, settings: PersistedSettings) -> PersistedSettings {
        PersistedSettings {
            wpm: settings.wpm.clamp(self.config.min_wpm, self.config.max_wpm),
            chunk_size: settings.chunk_size.clamp(1, self.config.max_chunk_size),
            orp_enabled: settings.orp_enabled,
            theme: settings.theme,
            font_size: settings
                .font_size
                .clamp(self.config.min_font_size, self.config.max_font_size),
        }
    }
}
