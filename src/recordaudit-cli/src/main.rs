//! Unfiltered Record CLI.
//!
//! `collect` writes one JSON record per recent bill; `narrate` turns the
//! newest record into an audio brief.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use recordaudit_core::{
    AuditConfig, AuditError, CollectEvent, Collector, HttpSpeechSynthesizer, HttpTransport,
    NarrationConfig, Narrator, OpenAiTextGenerator, ServiceEndpoints, SourceKind, WavMixer,
    load_latest_record,
};
use tracing_subscriber::EnvFilter;

/// Timeout for the hosted generation and speech calls.
const SERVICE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(
    name = "recordaudit",
    version,
    about = "Daily audit of recent congressional bills",
    long_about = "Collects recently-acted-upon bills with their CBO cost estimates and related GAO reports, and narrates the results."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gather recent bills and write one JSON record per bill
    Collect {
        /// Recency window in hours (overrides TARGET_HOURS)
        #[arg(long, value_name = "N")]
        hours: Option<u32>,

        /// Output directory (overrides ARTIFACTS_DIR)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Bill source (overrides BILLS_SOURCE)
        #[arg(long, value_parser = ["api", "manual"])]
        source: Option<String>,
    },
    /// Narrate the newest record as a WAV brief
    Narrate {
        /// Directory holding records (defaults to ARTIFACTS_DIR)
        #[arg(long, value_name = "DIR")]
        records: Option<PathBuf>,

        /// Narration config file (TOML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Intro WAV to put in front of the narration
        #[arg(long, value_name = "FILE")]
        intro: Option<PathBuf>,

        /// Output directory (defaults to the records directory)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Collect { hours, out, source } => collect(hours, out, source).await,
        Command::Narrate {
            records,
            config,
            intro,
            out,
        } => narrate(records, config, intro, out).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn collect(
    hours: Option<u32>,
    out: Option<PathBuf>,
    source: Option<String>,
) -> Result<(), AuditError> {
    let mut config = AuditConfig::from_env()?;
    if let Some(hours) = hours {
        config.target_hours = hours;
    }
    if let Some(out) = out {
        config.artifacts_dir = out;
    }
    if let Some(source) = source {
        config.source = SourceKind::from(source.as_str());
    }

    print_rule();
    println!("{}", "  Unfiltered Record - collection".bright_blue().bold());
    print_rule();
    println!(
        "{} last {} hours, writing to {}",
        "Window:".bold(),
        config.target_hours,
        config.artifacts_dir.display().to_string().bright_white()
    );
    println!();

    let transport = Arc::new(HttpTransport::new(&config.user_agent, config.request_timeout)?);
    let summary = Collector::new(config, transport)
        .with_callback(create_console_callback())
        .run()
        .await;

    println!();
    if summary.found == 0 {
        println!("{}", "  No recent bills found.".yellow());
    } else {
        println!(
            "  {} saved, {} failed, {} found",
            summary.saved.len().to_string().bright_green().bold(),
            summary.failed.to_string().red(),
            summary.found
        );
    }
    print_rule();
    Ok(())
}

async fn narrate(
    records: Option<PathBuf>,
    config_path: Option<PathBuf>,
    intro: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<(), AuditError> {
    let records = match records {
        Some(dir) => dir,
        None => AuditConfig::from_env()?.artifacts_dir,
    };
    let mut config = match config_path {
        Some(path) => NarrationConfig::load(path)?,
        None => NarrationConfig::default(),
    };
    if let Some(intro) = intro {
        config.audio.intro_path = intro;
    }
    let out = out.unwrap_or_else(|| records.clone());

    let endpoints = ServiceEndpoints::from_env();
    if endpoints.openai_key.is_empty() {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
    }

    let record = load_latest_record(&records)?;
    println!(
        "{} {} {}",
        "Narrating".bold(),
        record.bill_number.as_deref().unwrap_or("unknown").bright_cyan(),
        record.title.as_deref().unwrap_or_default().dimmed()
    );

    let generator = OpenAiTextGenerator::new(&endpoints, config.generation.clone(), SERVICE_TIMEOUT)?;
    let synthesizer =
        HttpSpeechSynthesizer::new(&endpoints, config.speech.clone(), SERVICE_TIMEOUT)?;
    let mixer = WavMixer::new(config.audio.gap_seconds);
    let narrator = Narrator::new(config, Box::new(generator), Box::new(synthesizer), Box::new(mixer));

    let narration = narrator.narrate(&record, &out).await?;

    println!();
    for line in textwrap(&narration.script, 66).lines() {
        println!("  {}", line);
    }
    println!();
    println!(
        "{} {}{}",
        "Audio:".bold(),
        narration.audio_path.display().to_string().bright_green(),
        (if narration.stitched { "" } else { " (no intro)" }).dimmed()
    );
    println!(
        "{} {}",
        "Script:".bold(),
        narration.script_path.display().to_string().bright_green()
    );
    Ok(())
}

fn print_rule() {
    println!("{}", "═".repeat(70).bright_blue());
}

/// Create a callback that prints collection events to the console.
fn create_console_callback() -> Box<dyn Fn(CollectEvent) + Send + Sync> {
    Box::new(move |event| match event {
        CollectEvent::BillsFound { count } => {
            println!("{} {}", "Bills found:".bold(), count.to_string().bright_white());
        }
        CollectEvent::BillStart {
            index,
            total,
            bill_number,
        } => {
            println!(
                "{} [{}/{}] {}",
                "▶".bright_cyan(),
                index + 1,
                total,
                bill_number.as_deref().unwrap_or("(no number)").bright_cyan().bold()
            );
        }
        CollectEvent::RecordSaved {
            path,
            score_value,
            gao_reports,
            ..
        } => {
            let score = match score_value {
                Some(value) => format!("${value:.0}"),
                None => "no score".to_string(),
            };
            println!(
                "  {} {} | {} GAO report(s) | {}",
                "saved".green(),
                score.yellow(),
                gao_reports,
                path.display().to_string().dimmed()
            );
        }
        CollectEvent::BillFailed { error, .. } => {
            println!("  {} {}", "failed".red().bold(), error);
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
