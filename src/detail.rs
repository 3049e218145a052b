use crate::model::{MovieSummary, Review, Trailer};
use crate::store::Store;
use crate::tmdb::MovieSource;
use anyhow::Result;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Everything the detail view shows for one movie.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieDetail {
    pub movie: MovieSummary,
    pub favourite: bool,
    pub trailers: Vec<Trailer>,
    pub reviews: Vec<Review>,
}

pub struct DetailLoader {
    store: Store,
    source: Arc<dyn MovieSource>,
    language: String,
}

impl DetailLoader {
    pub fn new(store: Store, source: Arc<dyn MovieSource>, language: impl Into<String>) -> Self {
        Self {
            store,
            source,
            language: language.into(),
        }
    }

    /// Load a movie from the cached listing (or the favourites, once the
    /// listing moved on) together with its trailers and reviews. Returns
    /// `None` if the movie is known to neither table.
    #[instrument(skip(self))]
    pub async fn load(&self, id: i64) -> Result<Option<MovieDetail>> {
        let favourite = self.store.favourite_by_id(id).await?;
        let movie = match self.store.movie_by_id(id).await? {
            Some(movie) => movie,
            None => match &favourite {
                Some(fav) => fav.movie.clone(),
                None => return Ok(None),
            },
        };

        let (trailers, reviews) = tokio::join!(
            self.source.fetch_trailers(id, &self.language),
            self.source.fetch_reviews(id, &self.language),
        );
        let trailers = trailers.unwrap_or_else(|err| {
            warn!(?err, "failed to fetch trailers");
            Vec::new()
        });
        let reviews = reviews.unwrap_or_else(|err| {
            warn!(?err, "failed to fetch reviews");
            Vec::new()
        });

        Ok(Some(MovieDetail {
            movie,
            favourite: favourite.is_some(),
            trailers,
            reviews,
        }))
    }

    /// Flip the favourite mark. Returns the new state.
    pub async fn toggle_favourite(&self, id: i64) -> Result<bool> {
        self.store.toggle_favourite(id).await
    }
}
