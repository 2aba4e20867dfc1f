use std::io::{self, Write};

use log::{info, warn};
use pacer_core::{
    events::{EventSink, ReaderEvent},
    render::Screen,
};

const CLEAR_LINE: &str = "\r\x1b[2K";
const ORP_OPEN: &str = "\x1b[1;31m";
const ORP_CLOSE: &str = "\x1b[0m";

/// Single-line terminal surface for the reading screen.
pub(super) struct TerminalRenderer<W: Write> {
    out: W,
    color: bool,
    fault_logged: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub(super) fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            fault_logged: false,
        }
    }

    pub(super) fn render(&mut self, screen: Screen<'_>) {
        let line = self.compose(&screen);
        if let Err(err) = write!(self.out, "{CLEAR_LINE}{line}").and_then(|()| self.out.flush()) {
            if !self.fault_logged {
                warn!("terminal: write failed err={}", err);
                self.fault_logged = true;
            }
        }
    }

    pub(super) fn finish(&mut self) {
        let _ = writeln!(self.out);
    }

    fn compose(&self, screen: &Screen<'_>) -> String {
        match screen {
            Screen::TitleCard {
                title,
                author,
                subtitle,
                ..
            } => match subtitle {
                Some(subtitle) => format!("{title}: {subtitle} by {author}"),
                None => format!("{title} by {author}"),
            },
            Screen::Reading {
                chunk,
                orp_index,
                chapter_label,
                progress,
                wpm,
                paused,
                ..
            } => {
                let words = match (chunk.as_slice(), orp_index) {
                    ([word], Some(index)) => self.mark_orp(word, *index),
                    _ => chunk.join(" "),
                };
                let state = if *paused { " [paused]" } else { "" };
                format!(
                    "{words:<32} | {chapter_label} {}/{} | {}% | {wpm} wpm{state}",
                    progress.chapter_word, progress.chapter_words, progress.book_pct
                )
            }
            Screen::Loading { chapter_label, .. } => format!("loading {chapter_label}..."),
            Screen::Empty { title, .. } => format!("{title} has no words"),
        }
    }

    fn mark_orp(&self, word: &str, index: usize) -> String {
        let mut marked = String::with_capacity(word.len() + 16);
        for (position, c) in word.chars().enumerate() {
            if position != index {
                marked.push(c);
            } else if self.color {
                marked.push_str(ORP_OPEN);
                marked.push(c);
                marked.push_str(ORP_CLOSE);
            } else {
                marked.push('[');
                marked.push(c);
                marked.push(']');
            }
        }
        marked
    }
}

impl TerminalRenderer<io::Stdout> {
    pub(super) fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

/// Reports reading events through the log.
#[derive(Default)]
pub(super) struct LogSink {
    delivered: u64,
}

impl LogSink {
    pub(super) fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl EventSink for LogSink {
    fn notify(&mut self, event: ReaderEvent) {
        self.delivered = self.delivered.saturating_add(1);
        info!("event: name={} data={:?}", event.name(), event);
    }
}
