//! gigtext - gig-text parsing CLI
//!
//! Usage:
//!   gigtext parse "viernes con Juan, 7pm, 5000"   Parse text into an event
//!   gigtext learn <text> -c correction.json       Record a user correction
//!   gigtext status                                Show pipeline state
//!   gigtext clear                                 Wipe all training data

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use directories::ProjectDirs;
use gigtext_core::{EventParser, HistoricalEventSummary, ParsedEventData};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gigtext", about = "Parse gig announcements into structured events", version)]
struct Cli {
    /// Data directory for the model, vocabulary, and training log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse free-form text into a structured event
    Parse {
        /// The gig text ("viernes con Juan en el lobby, 7pm, 5000")
        text: String,
        /// JSON file with past events for context reconciliation
        #[arg(long)]
        history: Option<PathBuf>,
        /// Anchor date for relative dates (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Emit raw JSON instead of the formatted summary
        #[arg(long)]
        json: bool,
    },
    /// Record a correction for a previous prediction
    Learn {
        /// The original text that was parsed
        text: String,
        /// JSON file with the corrected event record
        #[arg(short, long)]
        correction: PathBuf,
        /// JSON file with the original prediction
        #[arg(short, long)]
        prediction: PathBuf,
    },
    /// Show training-log and model status
    Status,
    /// Delete all training data, the vocabulary, and the model weights
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    match cli.command {
        Command::Parse {
            text,
            history,
            today,
            json,
        } => {
            let parser = EventParser::open(&data_dir)?;
            let history = load_history(history)?;
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let data = parser.parse(&text, &history, today);
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_event(&data);
            }
        }
        Command::Learn {
            text,
            correction,
            prediction,
        } => {
            let mut parser = EventParser::open(&data_dir)?;
            let correction: ParsedEventData = read_json(&correction)?;
            let prediction: ParsedEventData = read_json(&prediction)?;
            parser.learn(&text, &correction, &prediction)?;
            let count = parser.store().example_count()?;
            println!("{} {count} examples recorded", "ok:".green().bold());
        }
        Command::Status => {
            let parser = EventParser::open(&data_dir)?;
            let store = parser.store();
            println!("{}", "gigtext status".bold());
            println!("  data dir:      {}", data_dir.display());
            println!("  examples:      {}", store.example_count()?);
            println!("  trained over:  {}", store.trained_through()?);
            println!("  vocabulary:    {} tokens", parser.model().vocab().len());
            println!(
                "  weights:       {}",
                if store.weights_path().exists() {
                    "persisted".green().to_string()
                } else {
                    "untrained".yellow().to_string()
                }
            );
        }
        Command::Clear { yes } => {
            if !yes && !confirm("Delete all training data and the model?")? {
                println!("aborted");
                return Ok(());
            }
            let parser = EventParser::open(&data_dir)?;
            parser.clear_training_data()?;
            println!("{} training data cleared", "ok:".green().bold());
        }
    }
    Ok(())
}

fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    let dirs = ProjectDirs::from("com", "gigtext", "gigtext")
        .context("could not determine a data directory; pass --data-dir")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn load_history(path: Option<PathBuf>) -> Result<Vec<HistoricalEventSummary>> {
    match path {
        Some(path) => read_json(&path),
        None => Ok(Vec::new()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_event(data: &ParsedEventData) {
    if data.error {
        eprintln!(
            "{} {}",
            "error:".red().bold(),
            data.message.as_deref().unwrap_or("unknown failure")
        );
        return;
    }
    let field = |v: &Option<String>| match v {
        Some(v) => v.clone(),
        None => "—".dimmed().to_string(),
    };
    println!("{}", "parsed event".bold());
    println!("  provider:     {}", field(&data.provider));
    println!("  description:  {}", field(&data.description));
    println!("  location:     {}", field(&data.location));
    println!("  date:         {}", field(&data.date));
    println!("  time:         {}", field(&data.time));
    match data.amount_value() {
        Some(v) => println!("  amount:       {v}"),
        None => println!("  amount:       {}", "—".dimmed()),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{self, BufRead, Write};
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
