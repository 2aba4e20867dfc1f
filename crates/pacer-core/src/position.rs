//! Global word index <-> chapter-local position mapping.

use alloc::vec::Vec;

/// A position expressed relative to its owning chapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LocalPosition {
    pub chapter: u16,
    pub index: u32,
}

/// Prefix sums of chapter word counts: `offsets[i]` is the global index of the
/// first word of chapter `i`.
pub fn build_offsets<I>(word_counts: I) -> Vec<u32>
where
    I: IntoIterator<Item = u32>,
{
    let mut offsets = Vec::new();
    let mut running = 0u32;
    for count in word_counts {
        offsets.push(running);
        running = running.saturating_add(count);
    }
    offsets
}

/// Owning chapter of a global index.
///
/// Returns the highest chapter whose start offset is `<= pos`. Negative input
/// and empty tables resolve to chapter 0.
pub fn chapter_for_pos(offsets: &[u32], pos: i64) -> u16 {
    if pos <= 0 || offsets.is_empty() {
        return 0;
    }

    let pos = pos.min(u32::MAX as i64) as u32;
    let upper = offsets.partition_point(|start| *start <= pos);
    upper.saturating_sub(1).min(u16::MAX as usize) as u16
}

pub fn local_pos(offsets: &[u32], pos: u32) -> LocalPosition {
    let chapter = chapter_for_pos(offsets, pos as i64);
    let start = offsets.get(chapter as usize).copied().unwrap_or(0);
    LocalPosition {
        chapter,
        index: pos.saturating_sub(start),
    }
}

pub fn global_pos(offsets: &[u32], local: LocalPosition) -> u32 {
    offsets
        .get(local.chapter as usize)
        .copied()
        .unwrap_or(0)
        .saturating_add(local.index)
}
