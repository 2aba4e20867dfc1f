use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Result;
use clap::Parser;
use embassy_executor::Spawner;
use embassy_time::{Instant, Timer};
use log::{error, info, warn};
use pacer_core::{
    app::{ReaderConfig, ReaderSession, StartPosition, TickResult},
    content::ChapterDataSource,
    deep_link::DeepLink,
    text_policy::{DESCRIPTION_MAX_CHARS, description, paragraphs_from_words, preview_compact},
};

use cli::{Cli, Commands, ReadArgs};
use fs_source::{FsChapterSource, load_book};
use retry::ChapterRetryState;
use state_store::JsonFileStore;
use terminal::{LogSink, TerminalRenderer};

#[path = "main/cli.rs"]
mod cli;
#[path = "main/fs_source.rs"]
mod fs_source;
#[path = "main/retry.rs"]
mod retry;
#[path = "main/state_store.rs"]
mod state_store;
#[path = "main/terminal.rs"]
mod terminal;

const STATE_FILE: &str = ".pacer-state.json";
const TITLE_CARD_MS: u64 = 1_500;
const CHAPTER_RETRY_BACKOFF_MIN_MS: u64 = 250;
const CHAPTER_RETRY_BACKOFF_MAX_MS: u64 = 8_000;
const EFFECTIVE_WPM_REPORT_MS: u64 = 5_000;

type Session = ReaderSession<FsChapterSource, JsonFileStore, LogSink>;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli {
        data_dir,
        state,
        command,
    } = Cli::parse();
    let state = state.unwrap_or_else(|| data_dir.join(STATE_FILE));

    let outcome = match command.unwrap_or_else(|| Commands::Read(ReadArgs::default())) {
        Commands::Read(args) => read(&data_dir, state, args).await,
        Commands::Chapters {
            paragraphs,
            compact,
        } => list_chapters(&data_dir, paragraphs, compact).await,
    };

    // The std executor's run loop never returns once this task completes.
    std::process::exit(exit_code(&outcome));
}

fn exit_code(outcome: &Result<()>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(err) => {
            error!("failed to load: {err:#}");
            eprintln!("failed to load: {err:#}");
            1
        }
    }
}

async fn read(data_dir: &Path, state: PathBuf, args: ReadArgs) -> Result<()> {
    let index = Rc::new(load_book(data_dir)?);
    let config = ReaderConfig {
        store_prefix: store_prefix(data_dir),
        share_base_url: args.share_base.clone(),
        ..ReaderConfig::default()
    };
    let mut session: Session = ReaderSession::new(
        index,
        FsChapterSource::new(data_dir),
        JsonFileStore::open(state),
        LogSink::default(),
        config,
    );

    if let Some(wpm) = args.wpm {
        session.set_wpm(wpm);
    }
    if let Some(chunk) = args.chunk {
        session.set_chunk_size(chunk);
    }
    if args.no_orp {
        session.set_orp_enabled(false);
    }

    let link = args.link.as_deref().map(DeepLink::parse);
    let start = session.restore(link.as_ref()).await;
    let playback = session.playback_state();
    info!(
        "Reader started: title={:?} start={:?} wpm={} chunk={} orp={}",
        session.index().title(),
        start,
        playback.wpm,
        playback.chunk_size,
        playback.orp_enabled
    );

    let mut renderer = TerminalRenderer::stdout(std::io::stdout().is_terminal());
    let loop_start = Instant::now();

    prefetch(&mut session).await;
    if start == StartPosition::TitleCard {
        session.with_screen(|screen| renderer.render(screen));
        Timer::after_millis(TITLE_CARD_MS).await;
    }
    session.play(loop_start.elapsed().as_millis()).await;

    let mut retry = ChapterRetryState::default();
    let mut words_shown = 0u64;
    let mut report_words = 0u64;
    let mut report_start_ms = loop_start.elapsed().as_millis();

    loop {
        let now_ms = loop_start.elapsed().as_millis();

        match session.tick(now_ms) {
            TickResult::RenderRequested => session.with_screen(|screen| renderer.render(screen)),
            TickResult::AwaitingChapter { pos, chapter } => {
                if retry.attempt_due(now_ms) {
                    session.with_screen(|screen| renderer.render(screen));
                    let cache = session.cache();
                    let report = cache.ensure_window(pos).await;
                    if report.iter().any(|&(id, loaded)| id == chapter && loaded) {
                        if retry.consecutive_failures() > 0 {
                            info!(
                                "chapter-load: chapter={} recovered after {} failures",
                                chapter,
                                retry.consecutive_failures()
                            );
                        }
                        retry.mark_loaded();
                    } else {
                        retry.mark_failed(chapter, now_ms);
                    }
                }
            }
            TickResult::NoRender => {}
        }

        prefetch(&mut session).await;

        let words = session.drain_word_updates() as u64;
        words_shown = words_shown.saturating_add(words);
        report_words = report_words.saturating_add(words);

        let elapsed_ms = now_ms.saturating_sub(report_start_ms);
        if elapsed_ms >= EFFECTIVE_WPM_REPORT_MS {
            let wpm_x100 = report_words * 6_000_000 / elapsed_ms.max(1);
            info!(
                "effective_wpm={}.{:02} words={} elapsed_ms={}",
                wpm_x100 / 100,
                wpm_x100 % 100,
                report_words,
                elapsed_ms
            );
            report_words = 0;
            report_start_ms = now_ms;
        }

        if args.max_words.is_some_and(|limit| words_shown >= limit) {
            info!("Reader stopping: word limit {} reached", words_shown);
            break;
        }
        if !session.is_playing() {
            break;
        }

        Timer::after_millis(1).await;
    }

    session.end_session(loop_start.elapsed().as_millis());
    session.with_screen(|screen| renderer.render(screen));
    renderer.finish();

    if !args.share_base.is_empty() {
        println!("share: {}", session.share_link());
    }
    info!(
        "Reader finished: pos={} finished={} events={}",
        session.position(),
        session.is_finished(),
        session.events().delivered()
    );
    Ok(())
}

async fn prefetch(session: &mut Session) {
    let Some(chapter) = session.take_prefetch() else {
        return;
    };
    let cache = session.cache();
    if !cache.ensure_loaded(chapter).await {
        warn!("prefetch: chapter={} not loaded, will retry on demand", chapter);
    }
}

async fn list_chapters(data_dir: &Path, paragraphs: usize, compact: bool) -> Result<()> {
    let index = load_book(data_dir)?;
    let source = FsChapterSource::new(data_dir);

    println!("{} by {}", index.title(), index.meta().author);
    for chapter in index.chapters() {
        let summary = match source.fetch_chapter(chapter.id).await {
            Ok(words) => {
                let sampled = paragraphs_from_words(&words, paragraphs.max(1));
                if compact {
                    preview_compact(sampled.first().map(String::as_str).unwrap_or_default())
                } else {
                    description(&sampled, DESCRIPTION_MAX_CHARS)
                }
            }
            Err(err) => {
                warn!("chapters: chapter={} unavailable err={:#}", chapter.id, err);
                String::from("(unavailable)")
            }
        };
        let part = chapter
            .part
            .as_deref()
            .map(|part| format!(" [{part}]"))
            .unwrap_or_default();

        println!("{:>3}  {}{}  #{}", chapter.id, chapter.label(), part, chapter.slug());
        println!("     {summary}");
    }
    Ok(())
}

/// Namespace for this book's keys in a shared state file.
fn store_prefix(data_dir: &Path) -> String {
    data_dir
        .canonicalize()
        .ok()
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()))
        .map(|name| format!("{name}:"))
        .unwrap_or_default()
}
