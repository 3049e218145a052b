use crate::db::{self, Pool};
use crate::model::{FavouriteMovie, MovieSummary};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, instrument};

/// Local store over the SQLite pool. Every mutation re-reads the affected table
/// and publishes it to subscribers. Mutations hold `write_lock` until their
/// snapshot is published, so subscribers always end on the latest table.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
    write_lock: Arc<Mutex<()>>,
    movies: Arc<watch::Sender<Vec<MovieSummary>>>,
    favourites: Arc<watch::Sender<Vec<FavouriteMovie>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("movies", &self.movies.borrow().len())
            .field("favourites", &self.favourites.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Wrap an already migrated pool and load the current tables.
    pub async fn open(pool: Pool) -> Result<Self> {
        let movies = db::all_movies(&pool).await?;
        let favourites = db::all_favourites(&pool).await?;
        let (movies, _) = watch::channel(movies);
        let (favourites, _) = watch::channel(favourites);
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            movies: Arc::new(movies),
            favourites: Arc::new(favourites),
        })
    }

    /// Cached listing; updates whenever the cache changes.
    pub fn movies(&self) -> watch::Receiver<Vec<MovieSummary>> {
        self.movies.subscribe()
    }

    /// Favourites; updates whenever a favourite is added or removed.
    pub fn favourites(&self) -> watch::Receiver<Vec<FavouriteMovie>> {
        self.favourites.subscribe()
    }

    async fn publish_movies(&self) -> Result<()> {
        let movies = db::all_movies(&self.pool).await?;
        debug!(count = movies.len(), "publishing cached listing");
        self.movies.send_replace(movies);
        Ok(())
    }

    async fn publish_favourites(&self) -> Result<()> {
        let favourites = db::all_favourites(&self.pool).await?;
        debug!(count = favourites.len(), "publishing favourites");
        self.favourites.send_replace(favourites);
        Ok(())
    }

    pub async fn insert_movie(&self, movie: &MovieSummary) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        db::insert_movie(&self.pool, movie).await?;
        self.publish_movies().await
    }

    pub async fn append_movies(&self, movies: &[MovieSummary]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        db::insert_movies(&self.pool, movies).await?;
        self.publish_movies().await
    }

    pub async fn replace_movies(&self, movies: &[MovieSummary]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        db::replace_movies(&self.pool, movies).await?;
        self.publish_movies().await
    }

    pub async fn delete_movie(&self, id: i64) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let deleted = db::delete_movie(&self.pool, id).await?;
        if deleted {
            self.publish_movies().await?;
        }
        Ok(deleted)
    }

    pub async fn delete_all_movies(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        db::delete_all_movies(&self.pool).await?;
        self.publish_movies().await
    }

    pub async fn movie_by_id(&self, id: i64) -> Result<Option<MovieSummary>> {
        db::get_movie_by_id(&self.pool, id).await
    }

    pub async fn favourite_by_id(&self, id: i64) -> Result<Option<FavouriteMovie>> {
        db::get_favourite_by_id(&self.pool, id).await
    }

    pub async fn insert_favourite(&self, favourite: &FavouriteMovie) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        db::insert_favourite(&self.pool, favourite).await?;
        self.publish_favourites().await
    }

    pub async fn delete_favourite(&self, id: i64) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let deleted = db::delete_favourite(&self.pool, id).await?;
        if deleted {
            self.publish_favourites().await?;
        }
        Ok(deleted)
    }

    /// Flip the favourite state of a movie. Returns `true` if it is now a
    /// favourite. The movie must be in the cached listing or already favourited.
    #[instrument(skip(self))]
    pub async fn toggle_favourite(&self, id: i64) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if db::delete_favourite(&self.pool, id).await? {
            self.publish_favourites().await?;
            return Ok(false);
        }
        let movie = db::get_movie_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| anyhow!("movie {} is not in the cached listing", id))?;
        db::insert_favourite(&self.pool, &FavouriteMovie::from_movie(movie)).await?;
        self.publish_favourites().await?;
        Ok(true)
    }
}
