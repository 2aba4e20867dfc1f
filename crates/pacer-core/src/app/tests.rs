use super::*;
use crate::{
    book::tests::{chapter, meta},
    content::{MemorySource, PauseKind},
    text_policy::orp_char_index,
};
use alloc::{collections::BTreeMap, format, string::ToString, vec, vec::Vec};
use embassy_futures::block_on;

type Store = BTreeMap<String, String>;
type Session = ReaderSession<MemorySource, Store, Vec<ReaderEvent>>;

fn book(counts: &[u32]) -> Rc<BookIndex> {
    book_starting_at(counts, 0)
}

fn book_starting_at(counts: &[u32], start_chapter: u16) -> Rc<BookIndex> {
    let chapters = counts
        .iter()
        .enumerate()
        .map(|(id, count)| chapter(id as u16, &format!("Chapter {id}"), *count))
        .collect();
    let mut meta = meta(chapters);
    meta.start_chapter = start_chapter;
    Rc::new(BookIndex::new(meta).unwrap())
}

fn session(index: Rc<BookIndex>) -> Session {
    let source = MemorySource::generated(&index);
    session_with(index, source, Store::new())
}

fn session_with(index: Rc<BookIndex>, source: MemorySource, store: Store) -> Session {
    ReaderSession::new(index, source, store, Vec::new(), ReaderConfig::default())
}

fn open_at(session: &mut Session, url: &str) -> StartPosition {
    block_on(session.restore(Some(&DeepLink::parse(url))))
}

fn tick_at_wake(session: &mut Session) -> TickResult {
    let wake = session.next_wake_ms().expect("playback scheduled");
    session.tick(wake)
}

fn saved_position(session: &Session) -> Option<PersistedPosition> {
    session
        .store()
        .get("position")
        .and_then(|raw| serde_json::from_str(raw).ok())
}

fn fetched_chapters(session: &Session) -> Vec<u16> {
    let mut log = session.cache().source().fetch_log();
    log.sort_unstable();
    log.dedup();
    log
}

#[test]
fn fresh_session_opens_on_title_card() {
    let mut session = session(book_starting_at(&[20, 30], 1));

    assert_eq!(block_on(session.restore(None)), StartPosition::TitleCard);
    assert!(session.is_title_card());
    assert_eq!(session.take_prefetch(), Some(1));
    assert!(fetched_chapters(&session).is_empty());

    let mut title = None;
    session.with_screen(|screen| {
        if let Screen::TitleCard { title: t, author, .. } = screen {
            title = Some((t.to_string(), author.to_string()));
        }
    });
    assert_eq!(
        title,
        Some(("Illusions of Work".to_string(), "A. Writer".to_string()))
    );
}

#[test]
fn play_from_title_card_jumps_to_start_chapter() {
    let mut session = session(book_starting_at(&[20, 30], 1));
    block_on(session.restore(None));

    assert!(block_on(session.play(0)));
    assert_eq!(session.position(), 20);
    assert!(session.is_playing());
    assert!(session.cache().is_cached(1));
    assert_eq!(
        session.events().as_slice(),
        [ReaderEvent::ChapterStart { chapter: 1 }]
    );

    let wake = session.next_wake_ms();
    assert!(!block_on(session.play(40)));
    assert_eq!(session.next_wake_ms(), wake);
}

#[test]
fn sentence_pause_extends_the_wake_time() {
    let index = book(&[100]);
    let source = MemorySource::generated(&index).with_pause_at(&index, 41, PauseKind::Sentence);
    let mut session = session_with(index, source, Store::new());

    assert!(matches!(
        open_at(&mut session, "?w=41"),
        StartPosition::DeepLink(LinkTarget { pos: 41, .. })
    ));
    assert!(block_on(session.play(0)));
    assert_eq!(session.next_wake_ms(), Some(521));

    assert_eq!(session.tick(0), TickResult::RenderRequested);
    assert_eq!(session.tick(520), TickResult::NoRender);
    assert_eq!(session.position(), 41);

    assert_eq!(session.tick(521), TickResult::RenderRequested);
    assert_eq!(session.position(), 42);
    assert_eq!(session.next_wake_ms(), Some(521 + 171));
}

#[test]
fn pause_keeps_position_and_play_resumes_there() {
    let mut session = session(book(&[50]));
    open_at(&mut session, "?w=10");
    block_on(session.play(0));
    tick_at_wake(&mut session);
    tick_at_wake(&mut session);
    assert_eq!(session.position(), 12);

    assert!(session.pause(500));
    assert!(!session.pause(501));
    assert_eq!(session.next_wake_ms(), None);
    assert_eq!(session.position(), 12);
    assert_eq!(saved_position(&session).map(|p| p.pos), Some(12));

    assert_eq!(session.tick(10_000), TickResult::RenderRequested);
    assert_eq!(session.tick(20_000), TickResult::NoRender);
    assert_eq!(session.position(), 12);

    assert!(block_on(session.toggle_play(20_000)));
    assert!(session.is_playing());
    assert_eq!(session.position(), 12);
}

#[test]
fn chunks_cross_chapters_and_stop_on_last_word() {
    let mut session = session(book(&[3, 4]));
    session.set_chunk_size(3);
    open_at(&mut session, "?w=0");
    block_on(session.play(0));
    assert_eq!(session.next_wake_ms(), Some(514));

    tick_at_wake(&mut session);
    assert_eq!(session.position(), 3);
    assert_eq!(session.current_chapter(), 1);

    assert_eq!(tick_at_wake(&mut session), TickResult::RenderRequested);
    assert_eq!(session.position(), 6);
    assert!(!session.is_playing());
    assert!(session.is_finished());
    assert_eq!(session.next_wake_ms(), None);
    assert_eq!(saved_position(&session).map(|p| p.pos), Some(6));
    assert_eq!(
        session.events().as_slice(),
        [
            ReaderEvent::ChapterComplete { chapter: 0 },
            ReaderEvent::ChapterStart { chapter: 1 },
            ReaderEvent::ChapterComplete { chapter: 1 },
        ]
    );
}

#[test]
fn missing_chapter_stalls_without_moving() {
    let index = book(&[3, 5]);
    let source = MemorySource::generated(&index);
    source.fail_next(1);
    let mut session = session_with(index, source, Store::new());
    open_at(&mut session, "?w=0");
    assert!(!session.cache().is_cached(1));

    block_on(session.play(0));
    tick_at_wake(&mut session);
    let stall_at = session.next_wake_ms().unwrap();
    tick_at_wake(&mut session);
    assert_eq!(session.position(), 2);

    let stall_at = stall_at + 171;
    assert_eq!(
        session.tick(stall_at),
        TickResult::AwaitingChapter { pos: 3, chapter: 1 }
    );
    assert_eq!(session.position(), 2);
    assert!(session.is_playing());
    assert_eq!(session.next_wake_ms(), None);
    assert_eq!(
        session.tick(stall_at + 500),
        TickResult::AwaitingChapter { pos: 3, chapter: 1 }
    );

    let cache = session.cache();
    block_on(cache.ensure_window(3));
    assert_eq!(session.tick(stall_at + 600), TickResult::RenderRequested);
    assert_eq!(session.position(), 3);
    assert_eq!(session.next_wake_ms(), Some(stall_at + 600 + 171));
    assert_eq!(
        session.events().as_slice(),
        [
            ReaderEvent::ChapterComplete { chapter: 0 },
            ReaderEvent::ChapterStart { chapter: 1 },
        ]
    );
}

#[test]
fn pause_while_stalled_stops_cleanly() {
    let index = book(&[2, 5]);
    let source = MemorySource::generated(&index);
    source.fail_next(1);
    let mut session = session_with(index, source, Store::new());
    open_at(&mut session, "?w=1");
    block_on(session.play(0));

    assert!(matches!(
        tick_at_wake(&mut session),
        TickResult::AwaitingChapter { pos: 2, .. }
    ));
    assert!(session.pause(1_000));
    assert!(!session.is_playing());
    assert_eq!(session.position(), 1);
    assert_eq!(session.tick(2_000), TickResult::RenderRequested);
    assert_eq!(session.tick(3_000), TickResult::NoRender);
}

#[test]
fn go_to_chapter_loads_its_window_and_pauses() {
    let mut session = session(book(&[600, 400]));
    block_on(session.restore(None));

    assert_eq!(block_on(session.go_to_chapter(1)), 600);
    assert_eq!(fetched_chapters(&session), [0, 1]);
    assert!(!session.is_playing());
    assert!(!session.is_title_card());
    assert_eq!(saved_position(&session).map(|p| p.pos), Some(600));

    assert_eq!(block_on(session.go_to_chapter(9)), 600);
    assert_eq!(block_on(session.go_to_chapter(0)), 0);
}

#[test]
fn navigation_pauses_playback() {
    let mut session = session(book(&[40, 40]));
    open_at(&mut session, "?w=5");
    block_on(session.play(0));
    assert!(session.is_playing());

    assert_eq!(block_on(session.skip_words(10)), 15);
    assert!(!session.is_playing());
    assert_eq!(session.next_wake_ms(), None);
}

#[test]
fn prev_chapter_restarts_or_steps_back() {
    let mut session = session(book(&[50, 50, 50]));
    open_at(&mut session, "?w=111");

    assert_eq!(block_on(session.prev_chapter()), 100);
    assert_eq!(block_on(session.prev_chapter()), 50);

    block_on(session.skip_words(10));
    assert_eq!(session.position(), 60);
    assert_eq!(block_on(session.prev_chapter()), 0);
    assert_eq!(block_on(session.prev_chapter()), 0);

    block_on(session.skip_words(33));
    assert_eq!(block_on(session.replay_chapter()), 0);
}

#[test]
fn skip_is_clamped_to_the_book() {
    let mut session = session(book(&[50, 50]));
    open_at(&mut session, "?w=20");

    assert_eq!(block_on(session.skip_words(-500)), 0);
    assert_eq!(block_on(session.skip_words(10_000)), 99);
    assert_eq!(block_on(session.skip_words(-9)), 90);
}

#[test]
fn extreme_skips_saturate_at_the_book_edges() {
    let mut session = session(book(&[50, 50]));
    open_at(&mut session, "?w=20");

    assert_eq!(block_on(session.skip_words(i64::MAX)), 99);
    assert_eq!(block_on(session.skip_words(i64::MIN)), 0);
    assert_eq!(block_on(session.skip_words(i64::MAX)), 99);
}

#[test]
fn next_chapter_on_last_chapter_only_pauses() {
    let mut session = session(book(&[5, 5]));
    open_at(&mut session, "?w=2");
    assert_eq!(block_on(session.next_chapter()), 5);

    block_on(session.skip_words(2));
    block_on(session.play(0));
    assert_eq!(block_on(session.next_chapter()), 7);
    assert!(!session.is_playing());
}

#[test]
fn stale_saved_position_is_discarded() {
    let mut store = Store::new();
    store.insert(
        "position".to_string(),
        r#"{"pos":640,"totalWords":1050}"#.to_string(),
    );
    let index = book(&[600, 400]);
    let source = MemorySource::generated(&index);
    let mut session = session_with(index, source, store);

    assert_eq!(block_on(session.restore(None)), StartPosition::TitleCard);
    assert_eq!(session.position(), 0);
}

#[test]
fn saved_position_is_resumed() {
    let mut store = Store::new();
    store.insert(
        "position".to_string(),
        r#"{"pos":640,"totalWords":1000}"#.to_string(),
    );
    let index = book(&[600, 400]);
    let source = MemorySource::generated(&index);
    let mut session = session_with(index, source, store);

    assert_eq!(block_on(session.restore(None)), StartPosition::Resumed(640));
    assert_eq!(session.position(), 640);
    assert!(session.cache().is_cached(0));
    assert!(session.cache().is_cached(1));
}

#[test]
fn deep_link_beats_saved_position() {
    let mut store = Store::new();
    store.insert(
        "position".to_string(),
        r#"{"pos":640,"totalWords":1000}"#.to_string(),
    );
    let index = book(&[600, 400]);
    let source = MemorySource::generated(&index);
    let mut session = session_with(index, source, store);

    let start = open_at(&mut session, "https://example.com/b/#chapter-1");
    assert!(matches!(
        start,
        StartPosition::DeepLink(LinkTarget { pos: 600, .. })
    ));
    assert_eq!(session.position(), 600);
}

#[test]
fn settings_are_clamped_and_persisted() {
    let mut session = session(book(&[10]));

    assert!(session.set_wpm(5_000));
    assert_eq!(session.playback_state().wpm, 1_000);
    assert!(!session.adjust_wpm(true));
    assert!(session.adjust_wpm(false));
    assert_eq!(session.playback_state().wpm, 975);

    assert!(session.set_chunk_size(9));
    assert_eq!(session.playback_state().chunk_size, 5);
    assert!(session.set_font_size(4));
    assert!(session.toggle_theme());
    assert!(session.toggle_orp());
    assert!(!session.set_orp_enabled(false));

    assert_eq!(
        session.events().as_slice(),
        [
            ReaderEvent::SpeedChange { from: 350, to: 1_000 },
            ReaderEvent::SpeedChange { from: 1_000, to: 975 },
        ]
    );

    let store = session.store().clone();
    let index = book(&[10]);
    let source = MemorySource::generated(&index);
    let reopened = session_with(index, source, store);
    assert_eq!(
        reopened.persisted_settings(),
        PersistedSettings {
            wpm: 975,
            chunk_size: 5,
            orp_enabled: false,
            theme: Theme::Light,
            font_size: 16,
        }
    );
}

#[test]
fn corrupt_stored_settings_fall_back_to_defaults() {
    let mut store = Store::new();
    store.insert("settings".to_string(), "{not json".to_string());
    let index = book(&[10]);
    let source = MemorySource::generated(&index);
    let session = session_with(index, source, store);
    assert_eq!(session.persisted_settings(), PersistedSettings::default());
}

#[test]
fn store_keys_use_configured_prefix() {
    let index = book(&[10]);
    let source = MemorySource::generated(&index);
    let config = ReaderConfig {
        store_prefix: "illusions:".to_string(),
        ..ReaderConfig::default()
    };
    let mut session: Session = ReaderSession::new(index, source, Store::new(), Vec::new(), config);
    session.set_wpm(400);
    assert!(session.store().contains_key("illusions:settings"));
}

#[test]
fn progress_is_reported_every_minute_while_playing() {
    let mut session = session(book(&[10_000]));
    session.set_wpm(1_000);
    open_at(&mut session, "?w=0");
    block_on(session.play(0));

    while session.next_wake_ms().is_some_and(|wake| wake <= 130_000) {
        tick_at_wake(&mut session);
    }

    let progress: Vec<_> = session
        .events()
        .iter()
        .filter(|event| matches!(event, ReaderEvent::Progress { .. }))
        .collect();
    assert_eq!(progress.len(), 2);
    assert!(matches!(
        progress[0],
        ReaderEvent::Progress { pos: 1_000, wpm: 1_000, .. }
    ));

    let saved = saved_position(&session).map(|p| p.pos).unwrap();
    assert!(saved > 0 && saved <= session.position());
    assert!(session.is_playing());
}

#[test]
fn next_chapter_is_prefetched_near_chapter_end() {
    let mut session = session(book(&[5, 150, 20, 20]));
    session.set_wpm(1_000);
    open_at(&mut session, "?w=150");
    assert_eq!(fetched_chapters(&session), [0, 1, 2]);

    block_on(session.play(0));
    assert_eq!(session.take_prefetch(), None);

    for _ in 0..4 {
        tick_at_wake(&mut session);
    }
    assert_eq!(session.position(), 154);
    assert_eq!(session.take_prefetch(), None);

    tick_at_wake(&mut session);
    assert_eq!(session.position(), 155);
    assert_eq!(session.take_prefetch(), Some(3));
    assert_eq!(session.take_prefetch(), None);

    let cache = session.cache();
    assert!(block_on(cache.ensure_loaded(3)));
    tick_at_wake(&mut session);
    assert_eq!(session.take_prefetch(), None);
}

#[test]
fn screen_marks_orp_for_single_words_only() {
    let mut session = session(book(&[3, 3]));
    open_at(&mut session, "?w=0");

    let mut seen = None;
    session.with_screen(|screen| {
        if let Screen::Reading {
            chunk,
            orp_index,
            chapter_label,
            progress,
            paused,
            ..
        } = screen
        {
            seen = Some((
                chunk.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
                orp_index,
                chapter_label.to_string(),
                progress.chapter_words,
                paused,
            ));
        }
    });
    assert_eq!(
        seen,
        Some((
            vec!["c0w0".to_string()],
            Some(orp_char_index("c0w0")),
            "Chapter 0".to_string(),
            3,
            true,
        ))
    );

    session.set_chunk_size(4);
    let mut chunk_len = 0;
    let mut orp = Some(0);
    session.with_screen(|screen| {
        if let Screen::Reading { chunk, orp_index, .. } = screen {
            chunk_len = chunk.len();
            orp = orp_index;
        }
    });
    assert_eq!(chunk_len, 4);
    assert_eq!(orp, None);
}

#[test]
fn screen_shows_loading_until_chapter_arrives() {
    let index = book(&[3, 3, 3]);
    let source = MemorySource::generated(&index);
    source.fail_next(2);
    let mut session = session_with(index, source, Store::new());
    block_on(session.restore(None));
    block_on(session.go_to_chapter(2));

    let mut loading = false;
    session.with_screen(|screen| loading = matches!(screen, Screen::Loading { .. }));
    assert!(loading);

    let cache = session.cache();
    block_on(cache.ensure_window(session.position()));
    session.with_screen(|screen| loading = matches!(screen, Screen::Loading { .. }));
    assert!(!loading);
}

#[test]
fn share_link_emits_event() {
    let index = book(&[40, 40]);
    let source = MemorySource::generated(&index);
    let config = ReaderConfig {
        share_base_url: "https://example.com/b/".to_string(),
        ..ReaderConfig::default()
    };
    let mut session: Session = ReaderSession::new(index, source, Store::new(), Vec::new(), config);
    open_at(&mut session, "?w=55");

    assert_eq!(session.share_link(), "https://example.com/b/?w=55#chapter-1");
    assert_eq!(
        session.events().as_slice(),
        [ReaderEvent::Share { chapter: 1, pos: 55 }]
    );
}

#[test]
fn session_end_reports_reading_totals() {
    let mut session = session(book(&[50]));
    open_at(&mut session, "?w=0");
    block_on(session.play(0));
    tick_at_wake(&mut session);
    tick_at_wake(&mut session);
    assert_eq!(session.drain_word_updates(), 2);
    assert_eq!(session.drain_word_updates(), 0);

    session.end_session(1_000);
    assert!(!session.is_playing());
    assert_eq!(
        session.events().last(),
        Some(&ReaderEvent::SessionEnd {
            pos: 2,
            words_read: 2,
            reading_ms: 1_000,
        })
    );
    assert_eq!(saved_position(&session).map(|p| p.pos), Some(2));
}

#[test]
fn empty_book_never_plays() {
    let mut session = session(book(&[]));
    assert_eq!(block_on(session.restore(None)), StartPosition::TitleCard);
    assert!(!block_on(session.play(0)));
    assert_eq!(block_on(session.skip_words(5)), 0);

    let mut empty = false;
    session.with_screen(|screen| empty = matches!(screen, Screen::Empty { .. }));
    assert!(empty);
}
