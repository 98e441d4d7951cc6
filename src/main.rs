use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aimcat_scrape::answers::AnswerStringJobBuilder;
use aimcat_scrape::fetch::NameFetcherBuilder;
use aimcat_scrape::names::{NameJobBuilder, SeedRange};
use aimcat_scrape::papers::PaperJobBuilder;
use aimcat_scrape::subareas::SubareaJobBuilder;

#[derive(Parser)]
#[command(about = "Batch scrapers for AIMCAT result pages and answer keys")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill in candidate names for a worklist of id-card numbers
    Names {
        #[arg(long, default_value = "aimcat_names.json")]
        out: PathBuf,
        /// Attempt budget per identifier
        #[arg(long, default_value_t = 3)]
        retries: u32,
        /// Initial retry backoff; the wait grows linearly per attempt
        #[arg(long, default_value_t = 500)]
        backoff_ms: u64,
        /// Pause between successive identifiers
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
        /// Hit the site directly instead of going through the CORS proxy
        #[arg(long)]
        direct: bool,
        /// Id-card stem used to seed a fresh worklist when `out` is missing
        #[arg(long)]
        seed_base: Option<String>,
        #[arg(long, default_value_t = 1)]
        seed_start: u32,
        #[arg(long, default_value_t = 999)]
        seed_end: u32,
        /// Zero-padding width of the numeric suffix
        #[arg(long, default_value_t = 3)]
        seed_width: usize,
    },
    /// Pull raw answer strings per test and section
    Answers {
        #[arg(long, default_value = "answer_strings.json")]
        out: PathBuf,
        /// Highest test number, scanned downwards
        #[arg(long, default_value_t = 2625)]
        start: u32,
        #[arg(long, default_value_t = 2601)]
        end: u32,
    },
    /// Mirror paper documents and derive per-section answer keys
    Papers {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 2625)]
        start: u32,
        #[arg(long, default_value_t = 2603)]
        end: u32,
    },
    /// Tag every question of one test with its subarea and difficulty
    Subareas {
        #[arg(long, default_value = "aimcat_data.json")]
        out: PathBuf,
        #[arg(long, default_value_t = 2625)]
        test: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match Cli::parse().command {
        Command::Names {
            out,
            retries,
            backoff_ms,
            delay_ms,
            direct,
            seed_base,
            seed_start,
            seed_end,
            seed_width,
        } => {
            let mut fetcher = NameFetcherBuilder::default();
            fetcher
                .max_attempts(retries)
                .initial_backoff(Duration::from_millis(backoff_ms));
            if direct {
                fetcher.proxy(None);
            }

            let seed = seed_base.map(|base| SeedRange {
                base,
                start: seed_start,
                end: seed_end,
                width: seed_width,
            });
            let job = NameJobBuilder::default()
                .out_file(out)
                .delay(Duration::from_millis(delay_ms))
                .seed(seed)
                .fetcher(fetcher.build()?)
                .build()?;
            job.run().await
        }
        Command::Answers { out, start, end } => {
            let job = AnswerStringJobBuilder::default()
                .out_file(out)
                .start(start)
                .end(end)
                .build()?;
            job.run().await
        }
        Command::Papers { out_dir, start, end } => {
            let job = PaperJobBuilder::default()
                .out_dir(out_dir)
                .start(start)
                .end(end)
                .build()?;
            job.run().await
        }
        Command::Subareas { out, test } => {
            let job = SubareaJobBuilder::default()
                .out_file(out)
                .test_number(test)
                .build()?;
            job.run().await
        }
    }
}
