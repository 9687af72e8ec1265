mod ai;
mod article;
mod config;
mod db;
mod extract;

use std::time::Instant;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::ai::OpenAiClient;
use crate::config::Config;
use crate::db::{Movie, PredictionRow, Supabase, ANALYST_NAME, ANALYST_OUTLET};

#[derive(Parser)]
#[command(
    name = "boxoffice_scraper",
    about = "Box-office forecast scraper: article -> LLM extraction -> Supabase"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the target article and record forecasts for tracked movies
    Run {
        /// Max tracked movies to process this run
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Skip a movie whose extraction or insert fails instead of aborting
        #[arg(long)]
        keep_going: bool,
    },
    /// Fetch the target article and print the extracted paragraph text
    Fetch,
    /// Tracked movies overview table
    Movies,
}

/// What happens when one movie's extraction or insert fails mid-loop. Abort
/// matches the original single-run behavior: earlier inserts stay, remaining
/// movies are never attempted.
#[derive(Clone, Copy)]
enum FailurePolicy {
    Abort,
    Skip,
}

#[derive(Default)]
struct RunCounts {
    saved: usize,
    skipped: usize,
}

/// Apply the failure policy to one movie's outcome. Abort surfaces the error
/// so the caller's `?` ends the loop; Skip logs it and counts the movie as
/// skipped.
fn record_outcome(
    policy: FailurePolicy,
    outcome: anyhow::Result<bool>,
    counts: &mut RunCounts,
    title: &str,
) -> anyhow::Result<()> {
    match outcome {
        Ok(true) => {
            counts.saved += 1;
            Ok(())
        }
        Ok(false) => Ok(()),
        Err(e) => match policy {
            FailurePolicy::Abort => Err(e),
            FailurePolicy::Skip => {
                warn!(error = %e, movie = %title, "movie failed, continuing");
                counts.skipped += 1;
                Ok(())
            }
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let _ = dotenvy::dotenv();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { limit, keep_going } => {
            let policy = if keep_going {
                FailurePolicy::Skip
            } else {
                FailurePolicy::Abort
            };
            run_pipeline(&config, limit, policy).await
        }
        Commands::Fetch => {
            match article::fetch_article(&config.target_url).await {
                Some(text) => {
                    println!("{}", text);
                    println!("\n{} chars", text.chars().count());
                }
                None => println!("No article content."),
            }
            Ok(())
        }
        Commands::Movies => {
            let db = Supabase::new(&config.supabase_url, &config.supabase_key);
            let movies = db.fetch_tracking_movies().await?;
            if movies.is_empty() {
                println!("No tracked movies.");
                return Ok(());
            }

            let today = Local::now().date_naive();
            println!(
                "{:>3} | {:>6} | {:<32} | {:<12} | {:>5} | {:<8}",
                "#", "Id", "Title", "Release", "Days", "Status"
            );
            println!("{}", "-".repeat(82));
            for (i, m) in movies.iter().enumerate() {
                let days = m
                    .days_to_release(today)
                    .map(|d| d.to_string())
                    .unwrap_or_else(|_| "?".into());
                println!(
                    "{:>3} | {:>6} | {:<32} | {:<12} | {:>5} | {:<8}",
                    i + 1,
                    m.id,
                    truncate(&m.title_en, 32),
                    m.release_date,
                    days,
                    m.status
                );
            }
            println!("\n{} tracked movies", movies.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_pipeline(
    config: &Config,
    limit: Option<usize>,
    policy: FailurePolicy,
) -> anyhow::Result<()> {
    println!("🚀 Processing article: {}", config.target_url);

    let db = Supabase::new(&config.supabase_url, &config.supabase_key);

    // Tracked movies first: with none there is nothing to fetch or ask.
    let mut movies = db.fetch_tracking_movies().await?;
    if movies.is_empty() {
        println!("⚠️ No movies with status Tracking; add movies to the database first.");
        return Ok(());
    }
    if let Some(n) = limit {
        movies.truncate(n);
    }

    let analyst_id = db.analyst_id_for_outlet(ANALYST_NAME, ANALYST_OUTLET).await?;

    let Some(content) = article::fetch_article(&config.target_url).await else {
        println!("⚠️ No article content; nothing to process.");
        return Ok(());
    };

    let ai = OpenAiClient::new(&config.openai_api_key, &config.openai_model);
    let today = Local::now().date_naive();
    let mut counts = RunCounts::default();

    for movie in &movies {
        println!("🔍 Analyzing movie: {}", movie.title_en);
        let outcome = process_movie(&db, &ai, analyst_id, &content, movie, today).await;
        record_outcome(policy, outcome, &mut counts, &movie.title_en)?;
    }

    println!(
        "Saved {} forecasts ({} movies, {} skipped).",
        counts.saved,
        movies.len(),
        counts.skipped
    );
    Ok(())
}

/// One movie's iteration: extract, then insert when the article mentions it.
/// Returns whether a record was saved; errors are handled by the caller's
/// failure policy.
async fn process_movie(
    db: &Supabase,
    ai: &OpenAiClient,
    analyst_id: i64,
    content: &str,
    movie: &Movie,
    today: NaiveDate,
) -> anyhow::Result<bool> {
    let forecast = extract::extract_forecast(ai, content, &movie.title_en).await?;
    if !forecast.mentioned() {
        println!("❌ Article does not mention this movie");
        return Ok(false);
    }

    println!(
        "✅ Found forecast: min {} / max {} / avg {} (millions)",
        forecast.min, forecast.max, forecast.avg
    );
    let row = PredictionRow::build(movie, analyst_id, &forecast, today)?;
    db.insert_prediction(&row).await?;
    println!("💾 Saved to Supabase");
    Ok(true)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    // Drives record_outcome the way run_pipeline does: one outcome per movie,
    // `?` on the result. Returns how many outcomes were consumed.
    fn drive(
        policy: FailurePolicy,
        outcomes: Vec<anyhow::Result<bool>>,
        counts: &mut RunCounts,
    ) -> (usize, anyhow::Result<()>) {
        let mut attempted = 0;
        for outcome in outcomes {
            attempted += 1;
            if let Err(e) = record_outcome(policy, outcome, counts, "Some Movie") {
                return (attempted, Err(e));
            }
        }
        (attempted, Ok(()))
    }

    #[test]
    fn abort_stops_at_first_error() {
        let mut counts = RunCounts::default();
        let outcomes = vec![Ok(true), Err(anyhow!("bad forecast JSON")), Ok(true), Ok(false)];
        let (attempted, result) = drive(FailurePolicy::Abort, outcomes, &mut counts);
        assert_eq!(attempted, 2, "later movies must not be attempted");
        assert!(result.unwrap_err().to_string().contains("bad forecast JSON"));
        assert_eq!(counts.saved, 1, "earlier save stays counted");
        assert_eq!(counts.skipped, 0);
    }

    #[test]
    fn skip_continues_past_errors() {
        let mut counts = RunCounts::default();
        let outcomes = vec![
            Ok(true),
            Err(anyhow!("bad forecast JSON")),
            Ok(true),
            Err(anyhow!("insert failed")),
        ];
        let (attempted, result) = drive(FailurePolicy::Skip, outcomes, &mut counts);
        assert_eq!(attempted, 4);
        assert!(result.is_ok());
        assert_eq!(counts.saved, 2);
        assert_eq!(counts.skipped, 2);
    }

    #[test]
    fn not_mentioned_counts_neither_way() {
        let mut counts = RunCounts::default();
        let outcomes = vec![Ok(false), Ok(false)];
        let (attempted, result) = drive(FailurePolicy::Abort, outcomes, &mut counts);
        assert_eq!(attempted, 2);
        assert!(result.is_ok());
        assert_eq!(counts.saved, 0);
        assert_eq!(counts.skipped, 0);
    }
}
