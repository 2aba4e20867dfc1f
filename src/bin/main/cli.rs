use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pacer")]
#[command(about = "Read a book one word at a time in the terminal", long_about = None)]
pub(super) struct Cli {
    /// Directory holding meta.json and chNN.json chapter files
    #[arg(short, long, default_value = ".")]
    pub(super) data_dir: PathBuf,

    /// JSON file used to persist settings and reading position
    /// (defaults to <data-dir>/.pacer-state.json)
    #[arg(long)]
    pub(super) state: Option<PathBuf>,

    #[command(subcommand)]
    pub(super) command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub(super) enum Commands {
    /// Play the book from the saved position or a deep link (default)
    Read(ReadArgs),
    /// List chapters with their labels, slugs and opening lines
    Chapters {
        /// Paragraphs to sample for each description
        #[arg(short, long, default_value = "2")]
        paragraphs: usize,
        /// Show a short preview instead of the full description
        #[arg(long)]
        compact: bool,
    },
}

#[derive(Args, Debug, Default)]
pub(super) struct ReadArgs {
    /// Words per minute (clamped to 100..=1000)
    #[arg(short, long)]
    pub(super) wpm: Option<u16>,
    /// Words shown per tick (clamped to 1..=5)
    #[arg(short, long)]
    pub(super) chunk: Option<u8>,
    /// Disable the optimal recognition point marker
    #[arg(long)]
    pub(super) no_orp: bool,
    /// Deep link such as "?ch=2", "?w=1200" or "#chapter-slug"
    #[arg(short, long)]
    pub(super) link: Option<String>,
    /// Stop after this many words
    #[arg(long)]
    pub(super) max_words: Option<u64>,
    /// Base URL used when printing a share link on exit
    #[arg(long, default_value = "")]
    pub(super) share_base: String,
}
