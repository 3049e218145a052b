use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use mymovies::config;
use mymovies::controller::{Controller, FetchOutcome};
use mymovies::db;
use mymovies::detail::DetailLoader;
use mymovies::model::SortMode;
use mymovies::store::Store;
use mymovies::tmdb::{MovieSource, TmdbClient};
use mymovies::worker::FetchWorker;

#[derive(Debug, Parser)]
#[command(author, version, about = "Browse TMDB movies and keep a list of favourites")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the listing for a sort mode and print it
    Browse {
        /// popularity | top-rated
        #[arg(long, default_value = "popularity", value_parser = parse_sort)]
        sort: SortMode,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show a cached movie with its trailers and reviews
    Show { id: i64 },
    /// Add or remove a movie from the favourites
    Favourite { id: i64 },
    /// List favourites
    Favourites,
    /// Print an example config file
    ExampleConfig,
}

fn parse_sort(s: &str) -> Result<SortMode, String> {
    SortMode::parse_mode(s).ok_or_else(|| format!("unknown sort mode '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::ExampleConfig = args.command {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;
    let store = Store::open(pool).await?;
    let source: Arc<dyn MovieSource> = Arc::new(TmdbClient::from_config(&cfg)?);
    let language = cfg.language();

    match args.command {
        Command::Browse { sort, pages } => browse(store, source, language, sort, pages).await,
        Command::Show { id } => show(store, source, language, id).await,
        Command::Favourite { id } => {
            let now = store.toggle_favourite(id).await?;
            println!("{}", if now { "Added to favourites." } else { "Removed from favourites." });
            Ok(())
        }
        Command::Favourites => {
            let favourites = store.favourites().borrow().clone();
            if favourites.is_empty() {
                println!("No favourites yet.");
            }
            for fav in favourites {
                println!("{:>8}  {:<4}  {}", fav.id(), fav.movie.vote_average, fav.movie.title);
            }
            Ok(())
        }
        Command::ExampleConfig => Ok(()),
    }
}

async fn browse(
    store: Store,
    source: Arc<dyn MovieSource>,
    language: String,
    sort: SortMode,
    pages: u32,
) -> Result<()> {
    if pages == 0 {
        bail!("--pages must be at least 1");
    }
    let controller = Arc::new(Controller::new(store.clone(), source, language));
    let (worker, mut outcomes) = FetchWorker::spawn(controller);

    worker.change_sort(sort).await;
    let mut loaded = 0;
    while let Some(outcome) = outcomes.recv().await {
        match outcome {
            FetchOutcome::Loaded { page, count, .. } => {
                info!(page, count, "page loaded");
                loaded += 1;
            }
            FetchOutcome::EndOfData { page, .. } => {
                info!(page, "no more movies");
                break;
            }
            FetchOutcome::Failed { page, .. } => {
                warn!(page, "no data this round");
                break;
            }
            FetchOutcome::Stale { .. } | FetchOutcome::Skipped => continue,
        }
        if loaded >= pages || !worker.reached_end().await {
            break;
        }
    }
    worker.shutdown().await;

    let movies = store.movies().borrow().clone();
    let favourites = store.favourites().borrow().clone();
    for movie in movies {
        let star = if favourites.iter().any(|f| f.id() == movie.id) { "*" } else { " " };
        println!(
            "{star} {:>8}  {:<4}  {}  ({})",
            movie.id, movie.vote_average, movie.title, movie.release_date
        );
    }
    Ok(())
}

async fn show(store: Store, source: Arc<dyn MovieSource>, language: String, id: i64) -> Result<()> {
    let loader = DetailLoader::new(store, source, language);
    let detail = loader
        .load(id)
        .await?
        .ok_or_else(|| anyhow!("movie {} is not cached; run `browse` first", id))?;

    let movie = &detail.movie;
    println!("{}{}", movie.title, if detail.favourite { "  [favourite]" } else { "" });
    if movie.original_title != movie.title && !movie.original_title.is_empty() {
        println!("Original title: {}", movie.original_title);
    }
    println!("Rating: {} ({} votes)", movie.vote_average, movie.vote_count);
    println!("Released: {}", movie.release_date);
    if let Some(poster) = movie.big_poster_url() {
        println!("Poster: {poster}");
    }
    println!("\n{}\n", movie.overview);

    if !detail.trailers.is_empty() {
        println!("Trailers:");
        for trailer in &detail.trailers {
            match trailer.watch_url() {
                Some(url) => println!("  {}  {}", trailer.name, url),
                None => println!("  {} ({})", trailer.name, trailer.site),
            }
        }
    }
    if !detail.reviews.is_empty() {
        println!("Reviews:");
        for review in &detail.reviews {
            println!("  {}:\n    {}", review.author, review.content.replace('\n', "\n    "));
        }
    }
    Ok(())
}
