//! Chapter word data and the sources that supply it.

pub mod cache;
pub mod memory;

use alloc::{string::String, vec::Vec};

use serde::{Deserialize, Serialize};

pub use cache::{ChapterCache, WindowReport, WordLookup};
pub use memory::MemorySource;

/// Structural boundary that follows a word and stretches its display time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseKind {
    Comma,
    Sentence,
    Paragraph,
    Heading,
    Separator,
    /// Any tag this build does not know about. Treated as no pause.
    #[serde(other)]
    Unknown,
}

impl PauseKind {
    /// Extra milliseconds added on top of the base word interval.
    pub const fn extra_delay_ms(self) -> u32 {
        match self {
            Self::Comma => 150,
            Self::Sentence => 350,
            Self::Paragraph => 700,
            Self::Heading => 900,
            Self::Separator => 1_200,
            Self::Unknown => 0,
        }
    }
}

/// One annotated token, the unit of presentation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(rename = "w")]
    pub text: String,
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub pause: Option<PauseKind>,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pause: None,
        }
    }

    pub fn with_pause(mut self, pause: PauseKind) -> Self {
        self.pause = Some(pause);
        self
    }

    pub fn pause_ms(&self) -> u32 {
        self.pause.map_or(0, PauseKind::extra_delay_ms)
    }
}

/// Parse a chapter data file (a JSON array of words).
pub fn parse_chapter_json(json: &str) -> Result<Vec<Word>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Asynchronous provider of per-chapter word arrays.
///
/// Implementations are called through a shared reference so that several
/// chapters can be in flight at once on a single-threaded executor.
#[allow(async_fn_in_trait)]
pub trait ChapterDataSource {
    type Error: core::fmt::Debug;

    async fn fetch_chapter(&self, chapter_id: u16) -> Result<Vec<Word>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_json_uses_short_field_names() {
        let words = parse_chapter_json(
            r#"[{"w":"Hello,","p":"comma"},{"w":"world."},{"w":"Next","p":"sentence"}]"#,
        )
        .unwrap();

        assert_eq!(words.len(), 3);
        assert_eq!(words[0], Word::new("Hello,").with_pause(PauseKind::Comma));
        assert_eq!(words[1].pause, None);
        assert_eq!(words[2].pause_ms(), 350);
    }

    #[test]
    fn unknown_or_empty_pause_tags_add_no_delay() {
        let words = parse_chapter_json(r#"[{"w":"a","p":"ellipsis"},{"w":"b","p":""}]"#).unwrap();
        assert_eq!(words[0].pause, Some(PauseKind::Unknown));
        assert_eq!(words[0].pause_ms(), 0);
        assert_eq!(words[1].pause_ms(), 0);
    }

    #[test]
    fn pause_extras_are_ordered_by_boundary_strength() {
        let kinds = [
            PauseKind::Comma,
            PauseKind::Sentence,
            PauseKind::Paragraph,
            PauseKind::Heading,
            PauseKind::Separator,
        ];
        assert!(
            kinds
                .windows(2)
                .all(|pair| pair[0].extra_delay_ms() < pair[1].extra_delay_ms())
        );
    }
}
