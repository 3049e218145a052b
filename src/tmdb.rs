use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::config::{Config, DEFAULT_MIN_VOTE_COUNT, DEFAULT_TMDB_BASE};
use crate::mapper;
use crate::model::{MovieSummary, Review, SortMode, Trailer};

/// Where movie data comes from. The controller and detail loader only talk to
/// this trait so tests can substitute canned responses.
#[async_trait]
pub trait MovieSource: Send + Sync {
    async fn fetch_movies(
        &self,
        sort: SortMode,
        page: u32,
        language: &str,
    ) -> Result<Vec<MovieSummary>>;

    async fn fetch_trailers(&self, movie_id: i64, language: &str) -> Result<Vec<Trailer>>;

    async fn fetch_reviews(&self, movie_id: i64, language: &str) -> Result<Vec<Review>>;
}

#[derive(Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: Url,
    api_key: String,
    min_vote_count: u32,
}

impl fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url)
            .field("min_vote_count", &self.min_vote_count)
            .finish_non_exhaustive()
    }
}

impl TmdbClient {
    pub fn new(api_key: String) -> Result<Self> {
        let base_url = Url::parse(DEFAULT_TMDB_BASE).context("invalid default TMDB URL")?;
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, mut base_url: Url) -> Result<Self> {
        // `Url::join` replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(concat!("mymovies/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            min_vote_count: DEFAULT_MIN_VOTE_COUNT,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(cfg.base_url()).context("invalid tmdb.base_url")?;
        Ok(Self::with_base_url(cfg.tmdb.api_key.clone(), base_url)?
            .with_min_vote_count(cfg.tmdb.min_vote_count))
    }

    pub fn with_min_vote_count(mut self, min_vote_count: u32) -> Self {
        self.min_vote_count = min_vote_count;
        self
    }

    fn endpoint(&self, path: &str, language: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("invalid TMDB path {path}"))?;
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("language", language);
        Ok(url)
    }

    /// `discover/movie` URL for one page of a sort mode.
    pub fn discover_url(&self, sort: SortMode, page: u32, language: &str) -> Result<Url> {
        if page == 0 {
            bail!("page numbers start at 1");
        }
        let mut url = self.endpoint("discover/movie", language)?;
        url.query_pairs_mut()
            .append_pair("sort_by", sort.as_str())
            .append_pair("vote_count.gte", &self.min_vote_count.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    pub fn videos_url(&self, movie_id: i64, language: &str) -> Result<Url> {
        self.endpoint(&format!("movie/{movie_id}/videos"), language)
    }

    pub fn reviews_url(&self, movie_id: i64, language: &str) -> Result<Url> {
        self.endpoint(&format!("movie/{movie_id}/reviews"), language)
    }

    pub fn build_request(&self, url: Url) -> Result<reqwest::Request> {
        self.http
            .get(url)
            .header("Accept", "application/json")
            .build()
            .context("failed to build TMDB request")
    }

    /// Issue a GET and return the raw JSON body.
    pub async fn get_json(&self, url: Url) -> Result<Value> {
        let request = self.build_request(url)?;
        debug!(path = %request.url().path(), "sending tmdb request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach TMDB")?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(anyhow!("TMDB rejected the API key"));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("tmdb error {}: {}", status, body));
        }
        res.json::<Value>().await.context("invalid TMDB response")
    }
}

#[async_trait]
impl MovieSource for TmdbClient {
    async fn fetch_movies(
        &self,
        sort: SortMode,
        page: u32,
        language: &str,
    ) -> Result<Vec<MovieSummary>> {
        let url = self.discover_url(sort, page, language)?;
        let payload = self.get_json(url).await?;
        Ok(mapper::movies_from_json(&payload))
    }

    async fn fetch_trailers(&self, movie_id: i64, language: &str) -> Result<Vec<Trailer>> {
        let url = self.videos_url(movie_id, language)?;
        let payload = self.get_json(url).await?;
        Ok(mapper::trailers_from_json(&payload))
    }

    async fn fetch_reviews(&self, movie_id: i64, language: &str) -> Result<Vec<Review>> {
        let url = self.reviews_url(movie_id, language)?;
        let payload = self.get_json(url).await?;
        Ok(mapper::reviews_from_json(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn discover_url_carries_sort_page_and_language() {
        let client = TmdbClient::new("key".into()).unwrap();
        let url = client.discover_url(SortMode::TopRated, 3, "de").unwrap();
        assert_eq!(url.host_str(), Some("api.themoviedb.org"));
        assert_eq!(url.path(), "/3/discover/movie");
        let q = query(&url);
        assert_eq!(q["api_key"], "key");
        assert_eq!(q["language"], "de");
        assert_eq!(q["sort_by"], "vote_average.desc");
        assert_eq!(q["vote_count.gte"], DEFAULT_MIN_VOTE_COUNT.to_string());
        assert_eq!(q["page"], "3");
    }

    #[test]
    fn page_zero_is_rejected() {
        let client = TmdbClient::new("key".into()).unwrap();
        assert!(client.discover_url(SortMode::Popularity, 0, "en").is_err());
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_prefix() {
        let base = Url::parse("http://localhost:8080/tmdb/3").unwrap();
        let client = TmdbClient::with_base_url("k".into(), base)
            .unwrap()
            .with_min_vote_count(50);
        let url = client.videos_url(550, "en").unwrap();
        assert_eq!(url.path(), "/tmdb/3/movie/550/videos");
        let url = client.discover_url(SortMode::Popularity, 1, "en").unwrap();
        assert_eq!(query(&url)["vote_count.gte"], "50");
        assert_eq!(query(&url)["sort_by"], "popularity.desc");
    }

    #[test]
    fn reviews_url_and_request() {
        let client = TmdbClient::new("key".into()).unwrap();
        let url = client.reviews_url(42, "fr").unwrap();
        assert_eq!(url.path(), "/3/movie/42/reviews");
        let request = client.build_request(url).unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request
                .headers()
                .get("Accept")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }

    #[test]
    fn debug_hides_api_key() {
        let client = TmdbClient::new("secret-key".into()).unwrap();
        assert!(!format!("{client:?}").contains("secret-key"));
    }
}
