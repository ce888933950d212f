use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use hunkwise::app::App;
use hunkwise::config::Config;
use hunkwise::report::{diff_report, stream_report};
use hunkwise::views::render_single_pane;
use hunkwise_core::Uri;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hunkwise", about = "Review proposed edits hunk by hunk")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Ignore leading and trailing whitespace when diffing (overrides config)
    #[arg(short = 'w', long, global = true)]
    ignore_whitespace: bool,

    /// Diff time budget in milliseconds (overrides config)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the hunks and decorations between two files
    Diff {
        original: PathBuf,
        modified: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Feed the modified file through the streaming path a few lines at a time
    Stream {
        original: PathBuf,
        modified: PathBuf,
        /// Lines written per step (overrides config)
        #[arg(long)]
        chunk_lines: Option<usize>,
    },
    /// Accept or reject hunks interactively, then write the result
    Review {
        original: PathBuf,
        modified: PathBuf,
        /// Where `w` writes the reviewed text (defaults to the original file)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Quiet period before re-diffing after an edit (overrides config)
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides to config
    if cli.ignore_whitespace {
        config.diff.ignore_whitespace = true;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.diff.max_computation_time_ms = timeout;
    }

    match cli.command {
        Command::Diff {
            original,
            modified,
            json,
        } => run_diff(&config, &original, &modified, json),
        Command::Stream {
            original,
            modified,
            chunk_lines,
        } => {
            if let Some(lines) = chunk_lines {
                config.review.stream_chunk_lines = lines;
            }
            run_stream(&config, &original, &modified)
        }
        Command::Review {
            original,
            modified,
            output,
            debounce_ms,
        } => {
            if let Some(ms) = debounce_ms {
                config.review.debounce_ms = ms;
            }
            let output = output.unwrap_or_else(|| original.clone());
            run_review(&config, &original, &modified, output)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn file_uri(path: &Path) -> Uri {
    Uri::new(format!("file://{}", path.display()))
}

fn run_diff(config: &Config, original: &Path, modified: &Path, json: bool) -> Result<()> {
    let report = diff_report(
        &file_uri(original),
        &read(original)?,
        &read(modified)?,
        config.diff_options(),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.is_empty() {
        println!("No differences");
        return Ok(());
    }

    println!(
        "{} hunks in lines {}-{}",
        report.hunks.len(),
        report.start_line,
        report.end_line
    );
    for hunk in &report.hunks {
        println!(
            "{} {:?} original {} modified {}",
            hunk.diff_id, hunk.kind, hunk.original_range, hunk.modified_range
        );
        if let Some(decoration) = &hunk.decoration {
            println!(
                "  decorate {}..={} as {}",
                decoration.start_line,
                decoration.end_line,
                decoration.style.class_name()
            );
        }
        for line in hunk.original_code.lines().take(hunk.original_range.len()) {
            println!("  - {line}");
        }
        for line in hunk.modified_code.lines().take(hunk.modified_range.len()) {
            println!("  + {line}");
        }
    }
    Ok(())
}

fn run_stream(config: &Config, original: &Path, modified: &Path) -> Result<()> {
    let report = stream_report(
        &file_uri(original),
        &read(original)?,
        &read(modified)?,
        config.review.stream_chunk_lines,
        config.diff_options(),
    );

    for step in &report.steps {
        println!(
            "{:>5} lines: {} hunks (+{} ~{} -{})",
            step.lines_written,
            step.hunks,
            step.new.len(),
            step.updated.len(),
            step.removed.len()
        );
    }
    println!("stream finished with {} pending hunks", report.pending);
    Ok(())
}

fn run_review(config: &Config, original: &Path, modified: &Path, output: PathBuf) -> Result<()> {
    let mut app = App::new(&read(original)?, &read(modified)?, output, config)?;

    let (cols, rows) = crossterm::terminal::size().context("Failed to get terminal size")?;
    if cols < 40 || rows < 5 {
        anyhow::bail!("Terminal too small ({}x{}). Need at least 40x5.", cols, rows);
    }

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut app);
    ratatui::restore();
    result
}

fn event_loop(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| render_single_pane(frame, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key)?;
                }
            }
        }
        app.tick();
    }
    Ok(())
}
