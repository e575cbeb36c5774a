use chrono::Utc;
use clap::Parser;
use nb_cluster::{BlindspotDetector, ClusteringEngine, CoverageAggregator, JaccardScorer};
use nb_core::{BlindspotConfig, ClusterConfig, NewsStore, Result};
use nb_ingest::FeedIngestor;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    'd' => total_seconds += num * 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A bare number means seconds.
        if !current_number.is_empty() {
            match current_number.parse::<u64>() {
                Ok(num) => {
                    total_seconds += num;
                    has_unit = true;
                }
                Err(_) => return Err("Invalid number in duration".to_string()),
            }
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "News clustering and blindspot engine", long_about = None)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, default_value = "sqlite")]
    storage: String,
    /// Database path for the sqlite backend
    #[arg(long, default_value = "news.db")]
    db: PathBuf,
    /// JSON file of sources to load before running
    #[arg(long)]
    sources: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch all source feeds and insert new articles
    Fetch,
    /// Run one clustering pass, or keep running on an interval
    Cluster {
        /// Run periodically with the given interval (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
        /// Recency window in days for articles and candidate stories
        #[arg(long, default_value_t = 7)]
        window_days: u32,
        /// Minimum similarity for an article to join a story
        #[arg(long, default_value_t = 0.3)]
        threshold: f64,
        /// Also fetch feeds before each clustering pass
        #[arg(long)]
        fetch: bool,
    },
    /// List stories whose coverage is dominated by one bias category
    Blindspots {
        #[arg(long, default_value_t = 3)]
        min_articles: u32,
        #[arg(long, default_value_t = 0.7)]
        threshold: f64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Serve the read-only API
    Serve {
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

async fn cluster_once(
    store: &Arc<dyn NewsStore>,
    config: &ClusterConfig,
    fetch: bool,
) -> Result<()> {
    if fetch {
        let ingestor = FeedIngestor::new(store.clone());
        let ingested = ingestor.run(Utc::now()).await?;
        info!(
            "📥 Ingested {} new articles from {} sources",
            ingested.inserted, ingested.sources_checked
        );
    }

    let engine = ClusteringEngine::new(
        store.clone(),
        Arc::new(JaccardScorer::new()),
        config.clone(),
    )?;
    let summary = engine.run(Utc::now()).await?;
    info!(
        "🗞️ Clustered {} articles into {} stories ({} new, {} skipped)",
        summary.assigned + summary.created,
        summary.touched_stories.len(),
        summary.created,
        summary.skipped
    );

    let aggregator = CoverageAggregator::new(store.clone());
    let updated = aggregator.recompute(&summary.touched_stories).await?;
    info!("📊 Coverage updated for {} stories", updated);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store = nb_storage::create_storage(&cli.storage, cli.db.to_str()).await?;
    info!("💾 Storage initialized (using {})", cli.storage);

    if let Some(path) = &cli.sources {
        let added = nb_ingest::load_sources(store.as_ref(), path).await?;
        info!("🗂️ Loaded {} new sources", added);
    }

    match cli.command {
        Commands::Fetch => {
            let ingestor = FeedIngestor::new(store.clone());
            let summary = ingestor.run(Utc::now()).await?;
            println!(
                "Fetched {} sources: {} new articles, {} duplicates",
                summary.sources_checked, summary.inserted, summary.duplicates
            );
        }
        Commands::Cluster {
            interval,
            window_days,
            threshold,
            fetch,
        } => {
            let config = ClusterConfig {
                window_days,
                similarity_threshold: threshold,
            };
            // Invalid parameters must not start a run at all.
            config.validate()?;

            if let Some(interval) = interval {
                info!(
                    "Running in periodic mode every {}s",
                    interval.0.as_secs()
                );
                loop {
                    if let Err(e) = cluster_once(&store, &config, fetch).await {
                        eprintln!("Error during clustering run: {}", e);
                    }
                    info!("Waiting {}s before next run", interval.0.as_secs());
                    tokio::time::sleep(interval.0).await;
                }
            } else {
                cluster_once(&store, &config, fetch).await?;
            }
        }
        Commands::Blindspots {
            min_articles,
            threshold,
            limit,
        } => {
            let config = BlindspotConfig {
                min_total_articles: min_articles,
                dominant_threshold: threshold,
                limit,
            };
            let detector = BlindspotDetector::new(store.clone(), config)?;
            let blindspots = detector.detect().await?;
            if blindspots.is_empty() {
                println!("No blindspots found");
            }
            for spot in blindspots {
                println!(
                    "{:>5.1}% {:<18} [{:>2} articles] {}",
                    spot.dominant_percentage * 100.0,
                    spot.dominant_bias.to_string(),
                    spot.total_articles,
                    spot.headline
                );
            }
        }
        Commands::Serve { port } => {
            let app = nb_web::create_app(nb_web::AppState {
                store: store.clone(),
                blindspot_defaults: BlindspotConfig::default(),
            })
            .await;
            let addr = format!("0.0.0.0:{}", port);
            info!("🌐 Serving read-only API on {}", addr);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_human_durations() {
        assert_eq!(HumanDuration::from_str("90").unwrap().0.as_secs(), 90);
        assert_eq!(HumanDuration::from_str("30m").unwrap().0.as_secs(), 1800);
        assert_eq!(
            HumanDuration::from_str("1h15m30s").unwrap().0.as_secs(),
            4530
        );
        assert!(HumanDuration::from_str("h").is_err());
        assert!(HumanDuration::from_str("5x").is_err());
    }
}
