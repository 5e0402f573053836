//! Readtrace CLI - Command-line interface for Readtrace
//!
//! Commands:
//! - outline: Normalize a document outline into page-bounded sections
//! - detect: Run the section detector for a single text fragment
//! - replay: Feed a recorded session event log through a reading session

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use readtrace::outline::flatten;
use readtrace::text::structure_page;
use readtrace::{
    format_duration, normalize_outline, parse_event_log, replay, AnalyticsConfig, AnalyticsError,
    FileStore, HeadingHint, NamedDestinations, OutlineNode, ReadingSession, SectionDetector,
    SectionIndex, SnapshotStore, TextToken, TrackerSnapshot, READTRACE_VERSION,
};

/// Readtrace - Reading analytics for paginated documents
#[derive(Parser)]
#[command(name = "readtrace")]
#[command(version = READTRACE_VERSION)]
#[command(about = "Section detection and reading analytics for paginated documents", long_about = None)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a document outline into sections
    Outline {
        /// Outline JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Total number of pages in the document
        #[arg(short, long)]
        pages: u32,

        /// Named destinations JSON file ({"name": page})
        #[arg(long)]
        destinations: Option<PathBuf>,

        /// Print the flat section list instead of the nested tree
        #[arg(long)]
        flat: bool,
    },

    /// Detect the section a text fragment belongs to
    Detect {
        /// Total number of pages in the document
        #[arg(short, long)]
        pages: u32,

        /// Outline JSON file; default sections are used without one
        #[arg(long)]
        outline: Option<PathBuf>,

        /// Named destinations JSON file ({"name": page})
        #[arg(long)]
        destinations: Option<PathBuf>,

        /// Page the fragment was observed on
        #[arg(long)]
        page: u32,

        /// Fragment text
        #[arg(short, long)]
        text: String,

        /// Positioned text tokens of the page, as JSON
        #[arg(long)]
        tokens: Option<PathBuf>,

        /// Rendered font size of the fragment
        #[arg(long)]
        font_size: Option<f64>,

        /// Fragment is set in bold
        #[arg(long)]
        bold: bool,
    },

    /// Replay a session event log and print the resulting analytics
    Replay {
        /// Event log, NDJSON or a JSON array (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Total number of pages in the document
        #[arg(short, long)]
        pages: u32,

        /// Outline JSON file; default sections are used without one
        #[arg(long)]
        outline: Option<PathBuf>,

        /// Named destinations JSON file ({"name": page})
        #[arg(long)]
        destinations: Option<PathBuf>,

        /// Document fingerprint used as the persistence key
        #[arg(long, default_value = "document")]
        fingerprint: String,

        /// Snapshot directory to resume from and save to
        #[arg(long)]
        store: Option<PathBuf>,

        /// Configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print an export report instead of the bare snapshot
        #[arg(long)]
        export: bool,

        /// Print a short human-readable summary to stderr
        #[arg(long)]
        summary: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<(), ReadtraceCliError> {
    match cli.command {
        Commands::Outline {
            input,
            pages,
            destinations,
            flat,
        } => cmd_outline(&input, pages, destinations.as_deref(), flat),

        Commands::Detect {
            pages,
            outline,
            destinations,
            page,
            text,
            tokens,
            font_size,
            bold,
        } => {
            let hint = font_size.map(|font_size| HeadingHint { font_size, bold });
            cmd_detect(
                pages,
                outline.as_deref(),
                destinations.as_deref(),
                page,
                &text,
                tokens.as_deref(),
                hint,
            )
        }

        Commands::Replay {
            input,
            output,
            pages,
            outline,
            destinations,
            fingerprint,
            store,
            config,
            export,
            summary,
        } => {
            let index = build_index(pages, outline.as_deref(), destinations.as_deref())?;
            let config = match config {
                Some(path) => AnalyticsConfig::from_json(&fs::read_to_string(path)?)?,
                None => AnalyticsConfig::default(),
            };
            let options = ReplayOptions {
                fingerprint,
                store,
                export,
                summary,
            };
            cmd_replay(&input, &output, index, config, &options)
        }
    }
}

fn cmd_outline(
    input: &Path,
    pages: u32,
    destinations: Option<&Path>,
    flat: bool,
) -> Result<(), ReadtraceCliError> {
    if pages == 0 {
        return Err(ReadtraceCliError::NoPages);
    }
    let outline: Vec<OutlineNode> = serde_json::from_str(&read_input(input)?)?;
    let resolver = load_destinations(destinations)?;
    let tree = normalize_outline(&outline, pages, &resolver);

    let json = if flat {
        serde_json::to_string_pretty(&flatten(&tree))?
    } else {
        serde_json::to_string_pretty(&tree)?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_detect(
    pages: u32,
    outline: Option<&Path>,
    destinations: Option<&Path>,
    page: u32,
    text: &str,
    tokens: Option<&Path>,
    hint: Option<HeadingHint>,
) -> Result<(), ReadtraceCliError> {
    let mut index = build_index(pages, outline, destinations)?;
    let config = AnalyticsConfig::default();

    let page_text = match tokens {
        Some(path) => {
            let tokens: Vec<TextToken> = serde_json::from_str(&fs::read_to_string(path)?)?;
            Some(structure_page(page, &tokens, &config.text))
        }
        None => None,
    };

    let detector = SectionDetector::new(config.detector);
    let candidate = detector.detect(&mut index, page_text.as_ref(), text, page, hint.as_ref());
    println!("{}", serde_json::to_string_pretty(&candidate)?);
    Ok(())
}

struct ReplayOptions {
    fingerprint: String,
    store: Option<PathBuf>,
    export: bool,
    summary: bool,
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    index: SectionIndex,
    config: AnalyticsConfig,
    options: &ReplayOptions,
) -> Result<(), ReadtraceCliError> {
    let events = parse_event_log(&read_input(input)?)?;
    let Some(first) = events.first() else {
        return Err(ReadtraceCliError::NoEvents);
    };
    let start = first.at();

    let mut session = ReadingSession::new(options.fingerprint.as_str(), index, config, start)?;
    if let Some(dir) = &options.store {
        session = session.with_store(SnapshotStore::new(FileStore::new(dir)), start);
    }

    let end = replay(&mut session, &events).unwrap_or(start);
    let content = if options.export {
        session.export(end).to_json_pretty()?
    } else {
        serde_json::to_string_pretty(&session.analytics(end))?
    };
    if options.summary {
        print_summary(&session.analytics(end));
    }
    session.close(end, options.store.is_some());

    write_output(output, &content)?;
    Ok(())
}

fn print_summary(snapshot: &TrackerSnapshot) {
    let s = &snapshot.summary;
    eprintln!("Readtrace Session Summary");
    eprintln!("=========================");
    eprintln!(
        "Session time:   {}",
        format_duration(s.session_time_ms, false)
    );
    eprintln!("Active time:    {}", format_duration(s.active_time_ms, true));
    eprintln!(
        "Pages read:     {}/{} ({:.0}%)",
        s.pages_completed, s.total_pages, s.progress_percentage
    );
    eprintln!("Sections read:  {}", s.sections_completed);
    eprintln!(
        "Navigation:     {} forward, {} backward, {} jumps (linear {:.0}%)",
        s.forward_moves,
        s.backward_moves,
        s.jump_moves,
        s.linear_reading_ratio * 100.0
    );
    eprintln!(
        "Reading speed:  {} wpm ({} words)",
        s.reading_speed_wpm, s.words_read
    );
}

fn build_index(
    pages: u32,
    outline: Option<&Path>,
    destinations: Option<&Path>,
) -> Result<SectionIndex, ReadtraceCliError> {
    if pages == 0 {
        return Err(ReadtraceCliError::NoPages);
    }
    let outline: Vec<OutlineNode> = match outline {
        Some(path) => serde_json::from_str(&read_input(path)?)?,
        None => Vec::new(),
    };
    let resolver = load_destinations(destinations)?;
    Ok(SectionIndex::new(
        normalize_outline(&outline, pages, &resolver),
        pages,
    ))
}

fn load_destinations(path: Option<&Path>) -> Result<NamedDestinations, ReadtraceCliError> {
    match path {
        Some(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => Ok(NamedDestinations::new()),
    }
}

fn read_input(path: &Path) -> Result<String, ReadtraceCliError> {
    if path.to_string_lossy() != "-" {
        return Ok(fs::read_to_string(path)?);
    }
    if atty::is(atty::Stream::Stdin) {
        return Err(ReadtraceCliError::NoInput);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn write_output(path: &Path, content: &str) -> Result<(), ReadtraceCliError> {
    if path.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", content)?;
        stdout.flush()?;
    } else {
        fs::write(path, content)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum ReadtraceCliError {
    Io(io::Error),
    Analytics(AnalyticsError),
    Json(serde_json::Error),
    NoInput,
    NoEvents,
    NoPages,
}

impl From<io::Error> for ReadtraceCliError {
    fn from(e: io::Error) -> Self {
        ReadtraceCliError::Io(e)
    }
}

impl From<AnalyticsError> for ReadtraceCliError {
    fn from(e: AnalyticsError) -> Self {
        ReadtraceCliError::Analytics(e)
    }
}

impl From<serde_json::Error> for ReadtraceCliError {
    fn from(e: serde_json::Error) -> Self {
        ReadtraceCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ReadtraceCliError> for CliError {
    fn from(e: ReadtraceCliError) -> Self {
        match e {
            ReadtraceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ReadtraceCliError::Analytics(AnalyticsError::InvalidEventLog(msg)) => CliError {
                code: "INVALID_EVENT_LOG".to_string(),
                message: msg,
                hint: Some(
                    "Each event needs a \"type\" and an RFC 3339 \"at\", in time order".to_string(),
                ),
            },
            ReadtraceCliError::Analytics(AnalyticsError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Thresholds must lie in [0, 1] and intervals be positive".to_string()),
            },
            ReadtraceCliError::Analytics(e) => CliError {
                code: "ANALYTICS_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            ReadtraceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ReadtraceCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal".to_string(),
                hint: Some("Pipe the input in or pass a file path".to_string()),
            },
            ReadtraceCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure the event log is not empty".to_string()),
            },
            ReadtraceCliError::NoPages => CliError {
                code: "NO_PAGES".to_string(),
                message: "Document must have at least one page".to_string(),
                hint: Some("Pass --pages with the document's page count".to_string()),
            },
        }
    }
}
