use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use simplelog::{Config, LevelFilter, WriteLogger};

use bookpager::bookmark::{Bookmarks, book_identifier};
use bookpager::content_source::open_source;
use bookpager::settings::{self, Settings};
use bookpager::{Book, ChapterIndex, Density, Page, PositionMapper, ReaderSession, load_chapters};

#[derive(Parser)]
#[command(name = "bookpager")]
#[command(version, about = "Split e-books into pages and reflow them by density", long_about = None)]
#[command(after_help = "EXAMPLES:
    bookpager pages book.epub --density less     Print every page
    bookpager index book.epub                    Show the chapter index
    bookpager reflow book.epub --page 12 --from medium --to more
    bookpager resume book.epub                   Continue where you left off")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level written to bookpager.log
    #[arg(long, global = true, default_value = "debug")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a book and print its pages
    Pages {
        #[arg(value_name = "FILE")]
        file: String,
        /// less, medium or more (defaults to the configured density)
        #[arg(long)]
        density: Option<Density>,
        /// Use the bulk-load page size for the medium density
        #[arg(long)]
        bulk: bool,
        /// Emit pages and chapter index as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the chapter index
    Index {
        #[arg(value_name = "FILE")]
        file: String,
        #[arg(long)]
        density: Option<Density>,
    },
    /// Show where a page lands after a density change
    Reflow {
        #[arg(value_name = "FILE")]
        file: String,
        /// 1-based page number at the old density
        #[arg(long)]
        page: usize,
        #[arg(long)]
        from: Density,
        #[arg(long)]
        to: Density,
    },
    /// Open the bookmarked page and record it again
    Resume {
        #[arg(value_name = "FILE")]
        file: String,
        #[arg(long)]
        density: Option<Density>,
    },
}

#[derive(Serialize)]
struct PagesReport<'a> {
    max_chunk_size: usize,
    pages: &'a [Page],
    chapter_index: &'a ChapterIndex,
}

fn main() -> Result<()> {
    better_panic::install();
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create("bookpager.log")?,
    )?;
    info!("Starting bookpager");

    let mut settings = settings::load_settings(cli.config.as_deref());
    let result = match cli.command {
        Command::Pages {
            file,
            density,
            bulk,
            json,
        } => {
            settings.density = density.unwrap_or(settings.density);
            settings.bulk_load |= bulk;
            print_pages(&file, &settings, json)
        }
        Command::Index { file, density } => {
            settings.density = density.unwrap_or(settings.density);
            print_index(&file, &settings)
        }
        Command::Reflow {
            file,
            page,
            from,
            to,
        } => print_reflow(&file, &settings, page, from, to),
        Command::Resume { file, density } => {
            settings.density = density.unwrap_or(settings.density);
            resume(&file, &settings)
        }
    };

    if let Err(e) = &result {
        error!("Command failed: {e:?}");
    }
    info!("Shutting down bookpager");
    result
}

fn open_book(file: &str, max_chunk_size: usize) -> Result<Book> {
    let mut source = open_source(file)?;
    let chapters = load_chapters(source.as_mut())?;
    Book::build(chapters, max_chunk_size).with_context(|| format!("Failed to paginate {file}"))
}

fn print_pages(file: &str, settings: &Settings, json: bool) -> Result<()> {
    let size = settings.density.initial_chunk_size(settings.bulk_load);
    let book = open_book(file, size)?;

    if json {
        let report = PagesReport {
            max_chunk_size: size,
            pages: book.pages(),
            chapter_index: book.chapter_index(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let total = book.pages().len();
    for (index, page) in book.pages().iter().enumerate() {
        match &page.title {
            Some(title) => println!("--- page {}/{total}: {title} ---", index + 1),
            None => println!("--- page {}/{total} ---", index + 1),
        }
        println!("{}\n", page.display_text());
    }
    Ok(())
}

fn print_index(file: &str, settings: &Settings) -> Result<()> {
    let book = open_book(file, settings.density.max_chunk_size())?;
    let index = book.chapter_index();

    println!(
        "{} pages, {} chapters",
        book.pages().len(),
        index.total_chapters
    );
    for entry in &index.entries {
        let number = entry
            .chapter_number
            .map(|n| format!("{n:>3}"))
            .unwrap_or_else(|| "  -".to_string());
        println!(
            "{number}  {}  (pages {}-{})",
            entry.display_title,
            entry.start_page_index + 1,
            entry.end_page_index + 1
        );
    }
    Ok(())
}

fn print_reflow(
    file: &str,
    settings: &Settings,
    page: usize,
    from: Density,
    to: Density,
) -> Result<()> {
    let book = open_book(file, from.max_chunk_size())?;
    let old_index = page.saturating_sub(1);
    if old_index >= book.pages().len() {
        anyhow::bail!(
            "page {page} is out of range ({} pages at {from})",
            book.pages().len()
        );
    }

    let mapper = PositionMapper::new(settings.snippet);
    let (reflowed, new_index, strategy) = book.rechunk(old_index, to.max_chunk_size(), &mapper)?;
    println!(
        "{from} page {page}/{} -> {to} page {}/{} ({strategy:?})",
        book.pages().len(),
        new_index + 1,
        reflowed.pages().len()
    );
    if let Some(snippet) = book
        .page(old_index)
        .and_then(|p| mapper.page_anchor(p))
    {
        println!("anchor: {snippet}");
    }
    Ok(())
}

fn resume(file: &str, settings: &Settings) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {file}"))?;
    let book_id = book_identifier(&bytes);

    let mut source = open_source(file)?;
    let chapters = load_chapters(source.as_mut())?;
    let mut session = ReaderSession::with_settings(book_id, chapters, settings)?;

    let mut bookmarks = Bookmarks::load_or_ephemeral(settings.bookmarks_path().as_deref());
    match session.restore(&bookmarks) {
        Some(index) => info!("Restored {} at page {index}", session.book_id()),
        None => info!("No bookmark for {}, starting at the beginning", session.book_id()),
    }

    let total = session.pages().len();
    if let Some(page) = session.current_page() {
        let label = session.position_label().unwrap_or_default();
        println!(
            "--- page {}/{total} {label} ---",
            session.current_index() + 1
        );
        println!("{}", page.display_text());
    }
    session.record_position(&mut bookmarks);
    Ok(())
}
