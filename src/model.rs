use chrono::{DateTime, Utc};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/";
const SMALL_POSTER_SIZE: &str = "w185";
const BIG_POSTER_SIZE: &str = "w780";
const YOUTUBE_WATCH: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    #[default]
    Popularity,
    TopRated,
}

impl SortMode {
    /// Value of the `sort_by` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Popularity => "popularity.desc",
            SortMode::TopRated => "vote_average.desc",
        }
    }

    pub fn parse_mode(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "popularity" | "popular" | "popularity.desc" => Some(SortMode::Popularity),
            "top-rated" | "top_rated" | "rating" | "vote_average.desc" => Some(SortMode::TopRated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieSummary {
    pub id: i64,
    pub vote_count: i64,
    pub title: String,
    pub original_title: String,
    pub overview: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub vote_average: f64,
    pub release_date: String,
}

impl MovieSummary {
    pub fn small_poster_url(&self) -> Option<String> {
        poster_url(&self.poster_path, SMALL_POSTER_SIZE)
    }

    pub fn big_poster_url(&self) -> Option<String> {
        poster_url(&self.poster_path, BIG_POSTER_SIZE)
    }
}

fn poster_url(path: &str, size: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    Some(format!("{IMAGE_BASE}{size}{path}"))
}

/// A favourited movie. Holds its own copy of the display fields so it outlives
/// the cached listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FavouriteMovie {
    pub movie: MovieSummary,
    pub added_at: DateTime<Utc>,
}

impl FavouriteMovie {
    pub fn from_movie(movie: MovieSummary) -> Self {
        Self {
            movie,
            added_at: Utc::now(),
        }
    }

    pub fn id(&self) -> i64 {
        self.movie.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trailer {
    pub id: String,
    pub name: String,
    pub key: String,
    pub site: String,
}

impl Trailer {
    pub fn watch_url(&self) -> Option<String> {
        if self.key.is_empty() || !(self.site.is_empty() || self.site.eq_ignore_ascii_case("youtube")) {
            return None;
        }
        Some(format!("{YOUTUBE_WATCH}{}", self.key))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Review {
    pub id: String,
    pub author: String,
    pub content: String,
}
