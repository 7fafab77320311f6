//! Folio - book editor core CLI: render spreads, diff pages

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use folio_core::engine::{PlainDiagramEngine, PlainMathEngine};
use folio_core::{
    compute_diff, render_diff_html, Book, Config, DiffLine, DiffLineKind, PageSide, Renderer,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Book editor core: Markdown rendering and page diffing
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a Markdown file, or one page of a book JSON, to HTML
    Render {
        /// Path to a markdown file or a book JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
        /// Spread index when FILE is a book JSON
        #[arg(long, default_value_t = 0)]
        spread: usize,
        /// Page side when FILE is a book JSON
        #[arg(long, value_enum, default_value = "left")]
        page: PageArg,
    },
    /// Show an aligned side-by-side diff of two files
    Diff {
        #[arg(value_name = "LEFT")]
        left: PathBuf,
        #[arg(value_name = "RIGHT")]
        right: PathBuf,
        /// Emit HTML fragments instead of plain text
        #[arg(long)]
        html: bool,
    },
}

/// CLI mirror of [`PageSide`].
#[derive(ValueEnum, Clone, Copy, Debug)]
enum PageArg {
    Left,
    Right,
}

impl From<PageArg> for PageSide {
    fn from(arg: PageArg) -> Self {
        match arg {
            PageArg::Left => PageSide::Left,
            PageArg::Right => PageSide::Right,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = Config::load().context("Failed to load configuration")?;

    match args.command {
        Command::Render {
            file,
            output,
            spread,
            page,
        } => render_command(&config, &file, output.as_deref(), spread, page.into()).await,
        Command::Diff { left, right, html } => diff_command(&left, &right, html),
    }
}

/// Markdown source for the render command: book JSON files yield one page,
/// anything else is read verbatim as Markdown.
fn load_render_source(file: &Path, spread: usize, side: PageSide) -> Result<String> {
    if file.extension().and_then(|ext| ext.to_str()) == Some("json") {
        let book = Book::load(file)?;
        let source = book.page_source(spread, side).with_context(|| {
            format!("Book {} has no spread {}", file.display(), spread)
        })?;
        return Ok(source.to_string());
    }

    fs::read_to_string(file).with_context(|| format!("Failed to read file: {}", file.display()))
}

async fn render_command(
    config: &Config,
    file: &Path,
    output: Option<&Path>,
    spread: usize,
    side: PageSide,
) -> Result<()> {
    let source = load_render_source(file, spread, side)?;

    #[cfg(feature = "highlight")]
    let highlighter = folio_core::highlight::SyntectHighlighter::new();
    #[cfg(not(feature = "highlight"))]
    let highlighter = folio_core::engine::PlainHighlighter;

    let mut renderer = Renderer::new(
        PlainDiagramEngine::default(),
        PlainMathEngine,
        highlighter,
        config.theme,
    );

    let html = renderer
        .render_to_html(&source)
        .await
        .with_context(|| format!("Failed to render: {}", file.display()))?;

    match output {
        Some(path) => fs::write(path, html)
            .with_context(|| format!("Failed to write output: {}", path.display()))?,
        None => println!("{html}"),
    }

    Ok(())
}

fn diff_command(left: &Path, right: &Path, html: bool) -> Result<()> {
    let left_text = fs::read_to_string(left)
        .with_context(|| format!("Failed to read file: {}", left.display()))?;
    let right_text = fs::read_to_string(right)
        .with_context(|| format!("Failed to read file: {}", right.display()))?;

    let diff = compute_diff(&left_text, &right_text);

    if html {
        println!("{}", render_diff_html(&diff.left));
        println!("{}", render_diff_html(&diff.right));
        return Ok(());
    }

    for (l, r) in diff.left.iter().zip(&diff.right) {
        println!("{} | {}", format_row(l), format_row(r));
    }

    Ok(())
}

fn format_row(line: &DiffLine) -> String {
    let symbol = match line.kind {
        DiffLineKind::Added => '+',
        DiffLineKind::Removed => '-',
        _ => ' ',
    };
    let number = if line.kind == DiffLineKind::Placeholder {
        "    ".to_string()
    } else {
        format!("{:>4}", line.line_number)
    };
    format!("{} {}{:<40}", number, symbol, line.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_load_render_source_markdown_file() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile()?;
        file.write_all(b"# Heading\n")?;
        file.flush()?;

        let source = load_render_source(file.path(), 0, PageSide::Left)?;
        assert_eq!(source, "# Heading\n");
        Ok(())
    }

    #[test]
    fn test_load_render_source_book_json_page() -> Result<()> {
        let mut book = Book::new();
        book.spreads[0].left = "# Left page\n".to_string();
        book.spreads[0].right = "# Right page\n".to_string();

        let file = tempfile::Builder::new().suffix(".json").tempfile()?;
        book.save(file.path())?;

        let left = load_render_source(file.path(), 0, PageSide::Left)?;
        let right = load_render_source(file.path(), 0, PageSide::Right)?;
        assert_eq!(left, "# Left page\n");
        assert_eq!(right, "# Right page\n");
        Ok(())
    }

    #[test]
    fn test_load_render_source_missing_spread_errors() -> Result<()> {
        let file = tempfile::Builder::new().suffix(".json").tempfile()?;
        Book::new().save(file.path())?;

        let result = load_render_source(file.path(), 3, PageSide::Left);
        assert!(result.is_err());
        Ok(())
    }
}
