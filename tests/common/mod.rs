#![allow(dead_code)]

use anyhow::{anyhow, Result};
use mymovies::model::{MovieSummary, Review, SortMode, Trailer};
use mymovies::store::Store;
use mymovies::tmdb::MovieSource;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

pub async fn setup_store() -> Store {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Store::open(pool).await.unwrap()
}

pub fn movie(id: i64) -> MovieSummary {
    MovieSummary {
        id,
        title: format!("Movie {id}"),
        original_title: format!("Original {id}"),
        overview: "Overview".into(),
        poster_path: format!("/{id}.jpg"),
        vote_average: 7.0,
        vote_count: 1200,
        release_date: "2020-01-01".into(),
        ..Default::default()
    }
}

pub fn movies(ids: std::ops::Range<i64>) -> Vec<MovieSummary> {
    ids.map(movie).collect()
}

pub fn ids(movies: &[MovieSummary]) -> Vec<i64> {
    movies.iter().map(|m| m.id).collect()
}

/// Fake movie source serving canned pages and recording every call.
#[derive(Default)]
pub struct RecordingSource {
    pages: Mutex<HashMap<(SortMode, u32), Vec<MovieSummary>>>,
    failing: Mutex<HashSet<(SortMode, u32)>>,
    blocked: Mutex<HashSet<(SortMode, u32)>>,
    trailers: Mutex<HashMap<i64, Result<Vec<Trailer>, String>>>,
    reviews: Mutex<HashMap<i64, Vec<Review>>>,
    calls: Mutex<Vec<(SortMode, u32, String)>>,
    pub started: Notify,
    pub release: Notify,
}

impl RecordingSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_page(&self, sort: SortMode, page: u32, movies: Vec<MovieSummary>) {
        self.pages.lock().await.insert((sort, page), movies);
    }

    pub async fn fail_page(&self, sort: SortMode, page: u32) {
        self.failing.lock().await.insert((sort, page));
    }

    pub async fn heal_page(&self, sort: SortMode, page: u32) {
        self.failing.lock().await.remove(&(sort, page));
    }

    /// Fetches of this page wait for `release` after signalling `started`.
    pub async fn block_page(&self, sort: SortMode, page: u32) {
        self.blocked.lock().await.insert((sort, page));
    }

    pub async fn set_trailers(&self, id: i64, trailers: Result<Vec<Trailer>, String>) {
        self.trailers.lock().await.insert(id, trailers);
    }

    pub async fn set_reviews(&self, id: i64, reviews: Vec<Review>) {
        self.reviews.lock().await.insert(id, reviews);
    }

    pub async fn calls(&self) -> Vec<(SortMode, u32, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl MovieSource for RecordingSource {
    async fn fetch_movies(
        &self,
        sort: SortMode,
        page: u32,
        language: &str,
    ) -> Result<Vec<MovieSummary>> {
        self.calls
            .lock()
            .await
            .push((sort, page, language.to_string()));
        let blocked = self.blocked.lock().await.contains(&(sort, page));
        if blocked {
            self.started.notify_one();
            self.release.notified().await;
        }
        if self.failing.lock().await.contains(&(sort, page)) {
            return Err(anyhow!("simulated network failure"));
        }
        Ok(self
            .pages
            .lock()
            .await
            .get(&(sort, page))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_trailers(&self, movie_id: i64, _language: &str) -> Result<Vec<Trailer>> {
        match self.trailers.lock().await.get(&movie_id) {
            Some(Ok(trailers)) => Ok(trailers.clone()),
            Some(Err(msg)) => Err(anyhow!(msg.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_reviews(&self, movie_id: i64, _language: &str) -> Result<Vec<Review>> {
        Ok(self
            .reviews
            .lock()
            .await
            .get(&movie_id)
            .cloned()
            .unwrap_or_default())
    }
}
