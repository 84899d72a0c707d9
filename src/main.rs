//! libros-cfi - EPUB CFI toolkit
//!
//! Parse, compare and sort CFIs, and resolve CFIs or hrefs inside EPUB files.

use std::cmp::Ordering;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libros_cfi::cfi::{calibre, fake};
use libros_cfi::config::{Config, OutputFormat};
use libros_cfi::{compare, parse, Anchored, Cfi, DocumentTree, EpubArchive};

#[derive(Parser)]
#[command(name = "libros-cfi")]
#[command(version, about = "EPUB CFI toolkit", long_about = None)]
#[command(after_help = "EXAMPLES:
    libros-cfi parse 'epubcfi(/6/4[chap01ref]!/4/2/1:3)'
    libros-cfi compare 'epubcfi(/6/4!/2)' 'epubcfi(/6/6!/2)'
    libros-cfi resolve book.epub 'epubcfi(/6/4!/4/2/1:3)'")]
struct Cli {
    /// Output format (overrides CFI_OUTPUT)
    #[arg(short, long, global = true)]
    output: Option<OutputArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a CFI and print its normalized form
    Parse { cfi: String },
    /// Compare two CFIs in reading order
    Compare { a: String, b: String },
    /// Sort CFIs in reading order
    Sort {
        #[arg(required = true)]
        cfis: Vec<String>,
    },
    /// List the CFI of every section of an EPUB
    Sections { epub: String },
    /// Resolve a CFI or href inside an EPUB
    Resolve { epub: String, target: String },
    /// Chapter-index CFI for a section index
    Fake { index: usize },
    /// Section index of a chapter-index CFI
    Index { cfi: String },
    /// Convert a Calibre bookmark position to a CFI
    CalibrePos { pos: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputArg {
    Text,
    Json,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Text => OutputFormat::Text,
            OutputArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Serialize)]
struct SectionReport {
    index: usize,
    id: String,
    cfi: String,
}

#[derive(Serialize)]
struct ResolveReport {
    index: usize,
    section: String,
    kind: &'static str,
    excerpt: String,
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}

fn ordering_name(ordering: Ordering) -> &'static str {
    match ordering {
        Ordering::Less => "before",
        Ordering::Equal => "equal",
        Ordering::Greater => "after",
    }
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(80) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

async fn resolve(format: OutputFormat, path: &str, target: &str) -> anyhow::Result<()> {
    let archive = EpubArchive::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path))?;
    let book = archive.into_book();

    let located = book
        .go_to(target)
        .await?
        .with_context(|| format!("No section matches {}", target))?;
    let section = book
        .sections()
        .get(located.index)
        .map(|s| s.id().to_string())
        .unwrap_or_default();

    let doc = &located.document;
    let (kind, excerpt) = match located.anchored {
        Anchored::Range(range) => {
            let text = doc.text(range.start.node).map(str::to_string);
            ("range", excerpt(&text.unwrap_or_else(|| doc.text_content(range.start.node))))
        }
        Anchored::Node(node) => ("node", excerpt(&doc.text_content(node))),
        Anchored::SectionStart => ("section", excerpt(&doc.text_content(doc.root()))),
    };

    let report = ResolveReport {
        index: located.index,
        section,
        kind,
        excerpt,
    };
    emit(format, &report, || {
        format!(
            "section {} ({}), {}: {}",
            report.index, report.section, report.kind, report.excerpt
        )
    })
}

async fn sections(format: OutputFormat, path: &str) -> anyhow::Result<()> {
    let archive = EpubArchive::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path))?;
    let book = archive.into_book();

    let reports: Vec<SectionReport> = book
        .sections()
        .iter()
        .enumerate()
        .map(|(index, section)| SectionReport {
            index,
            id: section.id().to_string(),
            cfi: book.resolver().section_cfi(index),
        })
        .collect();
    emit(format, &reports, || {
        reports
            .iter()
            .map(|r| format!("{}\t{}\t{}", r.index, r.id, r.cfi))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let format = cli.output.map(OutputFormat::from).unwrap_or(config.output);

    match cli.command {
        Command::Parse { cfi } => {
            let parsed = parse(&cfi).with_context(|| format!("Invalid CFI {}", cfi))?;
            emit(format, &parsed, || parsed.to_string())
        }
        Command::Compare { a, b } => {
            let ordering = compare(&parse(&a)?, &parse(&b)?);
            emit(format, &(ordering as i8), || ordering_name(ordering).to_string())
        }
        Command::Sort { cfis } => {
            let mut parsed = cfis
                .iter()
                .map(|cfi| parse(cfi).with_context(|| format!("Invalid CFI {}", cfi)))
                .collect::<anyhow::Result<Vec<Cfi>>>()?;
            parsed.sort_by(compare);
            let sorted: Vec<String> = parsed.iter().map(Cfi::to_string).collect();
            emit(format, &sorted, || sorted.join("\n"))
        }
        Command::Sections { epub } => sections(format, &epub).await,
        Command::Resolve { epub, target } => resolve(format, &epub, &target).await,
        Command::Fake { index } => {
            let cfi = fake::from_index(index);
            emit(format, &cfi, || cfi.clone())
        }
        Command::Index { cfi } => {
            let index = fake::index_of(&parse(&cfi)?)
                .with_context(|| format!("{} is not a chapter-index CFI", cfi))?;
            emit(format, &index, || index.to_string())
        }
        Command::CalibrePos { pos } => {
            let cfi = calibre::from_calibre_pos(&pos)?.to_string();
            emit(format, &cfi, || cfi.clone())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    let config_result = Config::from_env();
    let config = config_result.clone().unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = config_result {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
    }

    let cli = Cli::parse();
    tracing::debug!("libros-cfi v{}", env!("CARGO_PKG_VERSION"));
    run(cli, config).await
}
