//! Terminal front end: maps typed commands onto the tester's triggers.
//!
//! ```text
//! tm-tester --model https://teachablemachine.withgoogle.com/models/<id>/
//! > next
//! > back
//! > report results.html
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tm_tester::config::CatalogSource;
use tm_tester::events::TracingSink;
use tm_tester::{init_tracing, AppError, Tester, TesterConfig, TriggerOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "tm-tester")]
#[command(about = "Scores a Teachable Machine image model against labeled cat/dog test images")]
struct Args {
    /// Model URL or local directory to load at startup
    #[arg(short, long)]
    model: Option<String>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use every image below this directory as the cat catalog
    #[arg(long)]
    cats_dir: Option<PathBuf>,

    /// Use every image below this directory as the dog catalog
    #[arg(long)]
    dogs_dir: Option<PathBuf>,

    /// Try CUDA before falling back to CPU
    #[arg(long)]
    gpu: bool,

    /// Rewrite this HTML report after every page
    #[arg(long)]
    report: Option<PathBuf>,

    /// Run this many pages and exit instead of reading commands
    #[arg(long)]
    pages: Option<usize>,
}

fn build_config(args: &Args) -> Result<TesterConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => TesterConfig::from_file(path)?,
        None => TesterConfig::default(),
    };
    if let Some(dir) = &args.cats_dir {
        config.cats = CatalogSource::Directory { dir: dir.clone() };
    }
    if let Some(dir) = &args.dogs_dir {
        config.dogs = CatalogSource::Directory { dir: dir.clone() };
    }
    if args.gpu {
        config.use_gpu = true;
    }
    config.validate()?;
    Ok(config)
}

async fn write_report(tester: &Tester, path: &Path) -> Result<(), AppError> {
    match tester.render_html().await? {
        Some(html) => {
            tokio::fs::write(path, html).await?;
            info!("Report written to {}", path.display());
        }
        None => warn!("Nothing to report yet"),
    }
    Ok(())
}

async fn show(tester: &Tester, outcome: Result<TriggerOutcome, AppError>, report: Option<&Path>) {
    match outcome {
        Ok(TriggerOutcome::Completed(_)) => {
            print!("{}", tester.render_text().await);
            if let Some(path) = report {
                if let Err(e) = write_report(tester, path).await {
                    error!("Failed to write report: {}", e);
                }
            }
        }
        Ok(TriggerOutcome::Ignored) => println!("Ignored (load a model first, or wait for the current page)"),
        Err(e) => eprintln!("Error: {}", e),
    }
}

const HELP: &str = "commands: load <url|dir>, next (n), back (b), report <file>, status, help, quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let config = build_config(&args)?;
    let tester: Tester = Tester::new(config, Arc::new(TracingSink));
    let report = args.report.as_deref();

    if let Some(location) = &args.model {
        show(&tester, tester.load_model(location).await, report).await;
    }

    if let Some(pages) = args.pages {
        for _ in 1..pages {
            show(&tester, tester.next_page().await, report).await;
        }
        return Ok(());
    }

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => continue,
            "load" => show(&tester, tester.load_model(rest).await, report).await,
            "next" | "n" => show(&tester, tester.next_page().await, report).await,
            "back" | "b" => show(&tester, tester.previous_page().await, report).await,
            "report" if !rest.trim().is_empty() => {
                if let Err(e) = write_report(&tester, Path::new(rest.trim())).await {
                    eprintln!("Error: {}", e);
                }
            }
            "status" => println!("{}", serde_json::to_string_pretty(&tester.status().await)?),
            "quit" | "exit" | "q" => break,
            _ => println!("{}", HELP),
        }
    }

    Ok(())
}
