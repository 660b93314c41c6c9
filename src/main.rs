mod converter;
mod fetcher;
mod parser;
mod store;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use fetcher::{FetchConfig, FetchStats};
use parser::level::Level;

#[derive(Parser)]
#[command(name = "grammar_scraper", about = "Japanese grammar page scraper and JSON converter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch grammar pages by increasing id until a failure streak
    Fetch {
        /// First page id to fetch
        #[arg(long, default_value_t = 1)]
        start_id: u32,
        /// Stop after this many consecutive failures
        #[arg(long, default_value_t = 20)]
        max_fails: u32,
        /// Directory for saved fragments
        #[arg(long, default_value = store::DEFAULT_PAGES_DIR)]
        out_dir: PathBuf,
    },
    /// Convert saved fragments into a single JSON document
    Convert {
        /// Directory of saved fragments
        #[arg(long, default_value = store::DEFAULT_PAGES_DIR)]
        input_dir: PathBuf,
        /// Destination JSON path
        #[arg(long, default_value = store::DEFAULT_OUTPUT_FILE)]
        output: PathBuf,
    },
    /// Fetch + convert in one pipeline
    Run {
        #[arg(long, default_value_t = 1)]
        start_id: u32,
        #[arg(long, default_value_t = 20)]
        max_fails: u32,
        #[arg(long, default_value = store::DEFAULT_PAGES_DIR)]
        pages_dir: PathBuf,
        #[arg(long, default_value = store::DEFAULT_OUTPUT_FILE)]
        output: PathBuf,
    },
    /// Per-level counts of saved fragments
    Stats {
        #[arg(long, default_value = store::DEFAULT_PAGES_DIR)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch {
            start_id,
            max_fails,
            out_dir,
        } => {
            let stats = run_fetch(start_id, max_fails, &out_dir).await?;
            print_fetch_summary(&stats);
            Ok(())
        }
        Commands::Convert { input_dir, output } => {
            let stats = converter::convert(&input_dir, &output)?;
            println!(
                "Converted {} of {} fragments ({} skipped) -> {}",
                stats.converted,
                stats.scanned,
                stats.skipped,
                output.display()
            );
            Ok(())
        }
        Commands::Run {
            start_id,
            max_fails,
            pages_dir,
            output,
        } => {
            let t_fetch = Instant::now();
            let fetched = run_fetch(start_id, max_fails, &pages_dir).await?;
            print_fetch_summary(&fetched);
            println!("Fetch phase took {:.1}s", t_fetch.elapsed().as_secs_f64());

            let t_convert = Instant::now();
            let stats = converter::convert(&pages_dir, &output)?;
            println!(
                "Converted {} of {} fragments ({} skipped) in {:.1}s -> {}",
                stats.converted,
                stats.scanned,
                stats.skipped,
                t_convert.elapsed().as_secs_f64(),
                output.display()
            );
            Ok(())
        }
        Commands::Stats { dir } => {
            let pages = store::list_fragments(&dir)?;
            println!("Fragments: {}", pages.len());
            for level in Level::ALL {
                let n = pages
                    .iter()
                    .filter(|p| Level::from_page_number(p.number) == level)
                    .count();
                println!("  {}: {}", level, n);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_fetch(start_id: u32, max_fails: u32, out_dir: &Path) -> anyhow::Result<FetchStats> {
    let config = FetchConfig::default();
    let client = fetcher::build_client(&config)?;
    let mut rng = StdRng::from_entropy();
    fetcher::run(&client, &config, out_dir, start_id, max_fails, &mut rng).await
}

fn print_fetch_summary(stats: &FetchStats) {
    println!(
        "Fetched {} pages starting from id {} ({} ids attempted)",
        stats.saved, stats.start_id, stats.attempted
    );
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
