//! Shared text shaping: ORP anchors, pacing, slugs and compact previews.

use alloc::{format, string::String, vec::Vec};

use crate::content::{PauseKind, Word};

pub const COMPACT_MAX_WORDS: usize = 7;
pub const COMPACT_MAX_CHARS: usize = 34;
pub const DESCRIPTION_MAX_CHARS: usize = 155;

/// Whole milliseconds a chunk of `chunk_size` words is shown at `wpm`,
/// rounded to nearest, before pause extras.
pub fn base_interval_ms(wpm: u16, chunk_size: u8) -> u64 {
    let wpm = wpm.max(1) as u64;
    (60_000 * chunk_size.max(1) as u64 + wpm / 2) / wpm
}

/// Display time for a chunk whose last word carries `pause`.
pub fn tick_delay_ms(wpm: u16, chunk_size: u8, pause: Option<PauseKind>) -> u64 {
    base_interval_ms(wpm, chunk_size) + pause.map_or(0, PauseKind::extra_delay_ms) as u64
}

/// Character index of the optimal recognition point within `word`.
///
/// Leading/trailing punctuation does not count towards the word length.
pub fn orp_char_index(word: &str) -> usize {
    let mut total_chars = 0usize;
    let mut letter_chars = 0usize;

    for c in word.chars() {
        total_chars += 1;
        if is_orp_letter(c) {
            letter_chars += 1;
        }
    }

    if total_chars == 0 {
        return 0;
    }

    if letter_chars == 0 {
        return total_chars.saturating_sub(1) / 2;
    }

    let target_letter = core::cmp::min(orp_letter_index(letter_chars), letter_chars - 1);
    let mut current_letter = 0usize;

    for (current_char, c) in word.chars().enumerate() {
        if is_orp_letter(c) {
            if current_letter == target_letter {
                return current_char;
            }
            current_letter += 1;
        }
    }

    total_chars.saturating_sub(1) / 2
}

pub fn orp_letter_index(letter_count: usize) -> usize {
    match letter_count {
        0 | 1 => 0,
        2..=5 => 1,
        6..=9 => 2,
        10..=13 => 3,
        _ => 4,
    }
}

fn is_orp_letter(c: char) -> bool {
    c.is_alphanumeric()
}

/// URL-safe chapter identifier: lowercase, word characters joined by `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '_' || c == '-' {
            pending_dash = true;
        }
    }

    slug
}

pub fn chapter_label(chapter_num: Option<u32>, title: &str) -> String {
    match chapter_num {
        Some(num) => format!("Chapter {num}: {title}"),
        None => String::from(title),
    }
}

/// Rebuild up to `max_paragraphs` paragraphs from an annotated word array.
///
/// Heading words are dropped; `paragraph` tags close the running paragraph.
pub fn paragraphs_from_words(words: &[Word], max_paragraphs: usize) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for word in words {
        if paragraphs.len() >= max_paragraphs {
            break;
        }

        if word.pause == Some(PauseKind::Heading) {
            flush_paragraph(&mut current, &mut paragraphs);
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word.text);

        if word.pause == Some(PauseKind::Paragraph) {
            flush_paragraph(&mut current, &mut paragraphs);
        }
    }

    if paragraphs.len() < max_paragraphs {
        flush_paragraph(&mut current, &mut paragraphs);
    }
    paragraphs.truncate(max_paragraphs);
    paragraphs
}

fn flush_paragraph(current: &mut String, out: &mut Vec<String>) {
    let text = current.trim();
    if !text.is_empty() {
        out.push(String::from(text));
    }
    current.clear();
}

/// One-line summary of the first paragraph, cut at a word boundary.
pub fn description(paragraphs: &[String], max_chars: usize) -> String {
    let Some(first) = paragraphs.first() else {
        return String::new();
    };

    let collapsed: String = first.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let keep = max_chars.saturating_sub(3);
    let cut: String = collapsed.chars().take(keep).collect();
    let head = match cut.rfind(' ') {
        Some(space) => &cut[..space],
        None => cut.as_str(),
    };
    format!("{head}...")
}

pub fn preview_compact(source: &str) -> String {
    preview_limited(source, COMPACT_MAX_WORDS, COMPACT_MAX_CHARS)
}

pub fn preview_limited(source: &str, max_words: usize, max_chars: usize) -> String {
    let mut out = String::new();
    let mut char_count = 0usize;
    let mut truncated = false;

    for (word_count, word) in source.split_whitespace().enumerate() {
        if word_count >= max_words {
            truncated = true;
            break;
        }

        if word_count > 0 {
            if char_count >= max_chars {
                truncated = true;
                break;
            }
            out.push(' ');
            char_count += 1;
        }

        for ch in word.chars() {
            if char_count >= max_chars {
                truncated = true;
                break;
            }
            out.push(ch);
            char_count += 1;
        }

        if truncated {
            break;
        }
    }

    if truncated && !out.is_empty() {
        out.push_str("...");
    }
    out
}
