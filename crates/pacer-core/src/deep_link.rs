//! Startup targets from URLs, and shareable links back into the book.
//!
//! Supported forms, first match wins:
//! - `?ch=N`: chapter number (matched against `chapterNum`, else 1-based order)
//! - `?w=N`: absolute word index
//! - `#slug`: slugified chapter title

use alloc::{format, string::String, vec::Vec};

use log::debug;

use crate::{book::BookIndex, text_policy::slugify};

/// Share links carry the word offset once this far into a chapter.
pub const SHARE_OFFSET_MIN_WORDS: u32 = 10;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeepLink {
    pub chapter: Option<String>,
    pub word: Option<String>,
    pub fragment: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkSource {
    ChapterNumber,
    WordIndex,
    Fragment,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LinkTarget {
    pub pos: u32,
    pub source: LinkSource,
}

impl DeepLink {
    /// Parse a full URL, a `?query#fragment` tail, or just a fragment.
    pub fn parse(url: &str) -> Self {
        let (before_fragment, fragment) = match url.split_once('#') {
            Some((head, tail)) => (head, Some(tail)),
            None => (url, None),
        };
        let query = before_fragment
            .split_once('?')
            .map(|(_, query)| query)
            .unwrap_or("");

        let mut link = Self {
            fragment: fragment
                .map(percent_decode)
                .filter(|fragment| !fragment.is_empty()),
            ..Self::default()
        };

        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = percent_decode(value);
            match key {
                "ch" if link.chapter.is_none() => link.chapter = Some(value),
                "w" if link.word.is_none() => link.word = Some(value),
                _ => {}
            }
        }

        link
    }

    pub fn is_empty(&self) -> bool {
        self.chapter.is_none() && self.word.is_none() && self.fragment.is_none()
    }

    pub fn resolve(&self, index: &BookIndex) -> Option<LinkTarget> {
        if index.is_empty() {
            return None;
        }

        if let Some(number) = self.chapter.as_deref().and_then(|v| v.trim().parse::<u32>().ok()) {
            let chapter = index.chapter_by_number(number).unwrap_or_else(|| {
                let last = index.chapter_count().saturating_sub(1) as u32;
                number.saturating_sub(1).min(last) as u16
            });
            debug!("deep-link: ch={} -> chapter={}", number, chapter);
            return Some(LinkTarget {
                pos: index.chapter_start(chapter),
                source: LinkSource::ChapterNumber,
            });
        }

        if let Some(word) = self.word.as_deref().and_then(|v| v.trim().parse::<i64>().ok()) {
            let pos = index.clamp_pos(word);
            debug!("deep-link: w={} -> pos={}", word, pos);
            return Some(LinkTarget {
                pos,
                source: LinkSource::WordIndex,
            });
        }

        let fragment = self.fragment.as_deref()?;
        let chapter = index.chapter_by_slug(fragment)?;
        debug!("deep-link: fragment={:?} -> chapter={}", fragment, chapter);
        Some(LinkTarget {
            pos: index.chapter_start(chapter),
            source: LinkSource::Fragment,
        })
    }
}

/// Link to `pos`: the chapter slug, plus the word index once the reader is
/// more than [`SHARE_OFFSET_MIN_WORDS`] into the chapter.
pub fn share_url(base: &str, index: &BookIndex, pos: u32) -> String {
    let base = base.split(['?', '#']).next().unwrap_or(base);
    let local = index.local_pos(pos);
    let slug = index
        .chapter(local.chapter)
        .map(|chapter| slugify(&chapter.title))
        .unwrap_or_default();

    match (local.index > SHARE_OFFSET_MIN_WORDS, slug.is_empty()) {
        (true, false) => format!("{base}?w={pos}#{slug}"),
        (true, true) => format!("{base}?w={pos}"),
        (false, false) => format!("{base}#{slug}"),
        (false, true) => String::from(base),
    }
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                        continue;
                    }
                    _ => out.push(b'%'),
                }
            }
            b'+' => out.push(b' '),
            other => out.push(other),
        }
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| String::from(raw))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
