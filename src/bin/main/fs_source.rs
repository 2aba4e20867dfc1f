use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use embassy_futures::yield_now;
use log::debug;
use pacer_core::{
    book::BookIndex,
    content::{ChapterDataSource, Word, parse_chapter_json},
};

pub(super) const META_FILE: &str = "meta.json";

pub(super) fn chapter_file_name(chapter_id: u16) -> String {
    format!("ch{chapter_id:02}.json")
}

pub(super) fn load_book(data_dir: &Path) -> Result<BookIndex> {
    let path = data_dir.join(META_FILE);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let index =
        BookIndex::from_json(&raw).with_context(|| format!("parsing {}", path.display()))?;
    debug!(
        "book: loaded title={:?} chapters={} words={}",
        index.title(),
        index.chapter_count(),
        index.total_words()
    );
    Ok(index)
}

/// Chapter files read from a local data directory.
pub(super) struct FsChapterSource {
    dir: PathBuf,
}

impl FsChapterSource {
    pub(super) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ChapterDataSource for FsChapterSource {
    type Error = anyhow::Error;

    async fn fetch_chapter(&self, chapter_id: u16) -> Result<Vec<Word>, Self::Error> {
        let path = self.dir.join(chapter_file_name(chapter_id));
        // Let sibling loads in the same window start before this one blocks.
        yield_now().await;
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let words =
            parse_chapter_json(&raw).with_context(|| format!("parsing {}", path.display()))?;
        debug!("fs-source: read chapter={} words={}", chapter_id, words.len());
        Ok(words)
    }
}
