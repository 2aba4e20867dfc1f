//! Fire-and-forget reading events for analytics collaborators.

use alloc::vec::Vec;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReaderEvent {
    ChapterStart { chapter: u16 },
    ChapterComplete { chapter: u16 },
    /// Periodic heartbeat while playing.
    Progress { pos: u32, book_pct: u8, wpm: u16 },
    SpeedChange { from: u16, to: u16 },
    Share { chapter: u16, pos: u32 },
    SessionEnd {
        pos: u32,
        words_read: u64,
        reading_ms: u64,
    },
}

impl ReaderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChapterStart { .. } => "chapter_start",
            Self::ChapterComplete { .. } => "chapter_complete",
            Self::Progress { .. } => "progress",
            Self::SpeedChange { .. } => "speed_change",
            Self::Share { .. } => "share",
            Self::SessionEnd { .. } => "session_end",
        }
    }
}

/// Receiver of reading events. Must not block or fail.
pub trait EventSink {
    fn notify(&mut self, event: ReaderEvent);
}

impl EventSink for Vec<ReaderEvent> {
    fn notify(&mut self, event: ReaderEvent) {
        self.push(event);
    }
}
