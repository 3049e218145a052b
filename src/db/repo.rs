use crate::model::{FavouriteMovie, MovieSummary};
use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

pub type Pool = SqlitePool;

const MOVIE_COLUMNS: &str = "id, vote_count, title, original_title, overview, poster_path, \
                             backdrop_path, vote_average, release_date";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {normalized}"))?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask sqlx to create the file. In-memory URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{expanded_path}?{query}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn movie_from_row(row: &SqliteRow) -> MovieSummary {
    MovieSummary {
        id: row.get("id"),
        vote_count: row.get("vote_count"),
        title: row.get("title"),
        original_title: row.get("original_title"),
        overview: row.get("overview"),
        poster_path: row.get("poster_path"),
        backdrop_path: row.get("backdrop_path"),
        vote_average: row.get("vote_average"),
        release_date: row.get("release_date"),
    }
}

fn favourite_from_row(row: &SqliteRow) -> Result<FavouriteMovie> {
    Ok(FavouriteMovie {
        movie: movie_from_row(row),
        added_at: row.try_get("added_at").context("invalid favourite timestamp")?,
    })
}

#[instrument(skip_all, fields(id = movie.id))]
pub async fn insert_movie(pool: &Pool, movie: &MovieSummary) -> Result<()> {
    let mut tx = pool.begin().await?;
    insert_movie_tx(&mut tx, movie).await?;
    tx.commit().await?;
    Ok(())
}

/// Append movies to the cached listing in order. Ids already cached are kept
/// where they are.
#[instrument(skip_all, fields(count = movies.len()))]
pub async fn insert_movies(pool: &Pool, movies: &[MovieSummary]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for movie in movies {
        insert_movie_tx(&mut tx, movie).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Delete the whole cached listing and insert `movies` in its place, atomically.
#[instrument(skip_all, fields(count = movies.len()))]
pub async fn replace_movies(pool: &Pool, movies: &[MovieSummary]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM movies").execute(&mut *tx).await?;
    for movie in movies {
        insert_movie_tx(&mut tx, movie).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn insert_movie_tx(tx: &mut Transaction<'_, Sqlite>, movie: &MovieSummary) -> Result<()> {
    sqlx::query(
        "INSERT INTO movies (id, position, vote_count, title, original_title, overview, poster_path, backdrop_path, vote_average, release_date) \
         VALUES (?, (SELECT COALESCE(MAX(position), 0) + 1 FROM movies), ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(movie.id)
    .bind(movie.vote_count)
    .bind(&movie.title)
    .bind(&movie.original_title)
    .bind(&movie.overview)
    .bind(&movie.poster_path)
    .bind(&movie.backdrop_path)
    .bind(movie.vote_average)
    .bind(&movie.release_date)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_movie(pool: &Pool, id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM movies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn delete_all_movies(pool: &Pool) -> Result<u64> {
    let res = sqlx::query("DELETE FROM movies").execute(pool).await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn get_movie_by_id(pool: &Pool, id: i64) -> Result<Option<MovieSummary>> {
    let row = sqlx::query(&format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(movie_from_row))
}

/// Cached listing in the order it was fetched.
#[instrument(skip_all)]
pub async fn all_movies(pool: &Pool) -> Result<Vec<MovieSummary>> {
    let rows = sqlx::query(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movies ORDER BY position ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(movie_from_row).collect())
}

/// Insert or overwrite the favourite for this movie id.
#[instrument(skip_all, fields(id = favourite.id()))]
pub async fn insert_favourite(pool: &Pool, favourite: &FavouriteMovie) -> Result<()> {
    let movie = &favourite.movie;
    sqlx::query(
        "INSERT OR REPLACE INTO favourite_movies (id, vote_count, title, original_title, overview, poster_path, backdrop_path, vote_average, release_date, added_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(movie.id)
    .bind(movie.vote_count)
    .bind(&movie.title)
    .bind(&movie.original_title)
    .bind(&movie.overview)
    .bind(&movie.poster_path)
    .bind(&movie.backdrop_path)
    .bind(movie.vote_average)
    .bind(&movie.release_date)
    .bind(favourite.added_at)
    .execute(pool)
    .await
    .context("failed to persist favourite")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_favourite(pool: &Pool, id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM favourite_movies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn get_favourite_by_id(pool: &Pool, id: i64) -> Result<Option<FavouriteMovie>> {
    let row = sqlx::query(&format!(
        "SELECT {MOVIE_COLUMNS}, added_at FROM favourite_movies WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(favourite_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn all_favourites(pool: &Pool) -> Result<Vec<FavouriteMovie>> {
    let rows = sqlx::query(&format!(
        "SELECT {MOVIE_COLUMNS}, added_at FROM favourite_movies ORDER BY added_at ASC, id ASC"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(favourite_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn movie(id: i64, title: &str) -> MovieSummary {
        MovieSummary {
            id,
            title: title.into(),
            vote_average: 7.5,
            ..Default::default()
        }
    }

    #[test]
    fn prepare_sqlite_url_variants() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://localhost/db"),
            "postgres://localhost/db"
        );
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested/movies.db");
        let url = prepare_sqlite_url(&format!("sqlite://{}", path.display()));
        assert_eq!(url, format!("sqlite://{}?mode=rwc", path.display()));
        assert!(path.parent().unwrap().exists());
        let url = prepare_sqlite_url(&format!("sqlite://{}?mode=ro", path.display()));
        assert!(url.ends_with("?mode=ro"));
    }

    #[tokio::test]
    async fn movies_keep_fetch_order_and_skip_duplicates() {
        let pool = setup_pool().await;
        insert_movies(&pool, &[movie(30, "c"), movie(10, "a")]).await.unwrap();
        insert_movie(&pool, &movie(20, "b")).await.unwrap();
        insert_movie(&pool, &movie(10, "a again")).await.unwrap();

        let ids: Vec<i64> = all_movies(&pool).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
        assert_eq!(get_movie_by_id(&pool, 10).await.unwrap().unwrap().title, "a");
    }

    #[tokio::test]
    async fn replace_and_delete_movies() {
        let pool = setup_pool().await;
        insert_movies(&pool, &[movie(1, "x"), movie(2, "y")]).await.unwrap();
        replace_movies(&pool, &[movie(3, "z")]).await.unwrap();
        let ids: Vec<i64> = all_movies(&pool).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3]);

        assert!(delete_movie(&pool, 3).await.unwrap());
        assert!(!delete_movie(&pool, 3).await.unwrap());
        insert_movies(&pool, &[movie(4, "w"), movie(5, "v")]).await.unwrap();
        assert_eq!(delete_all_movies(&pool).await.unwrap(), 2);
        assert!(get_movie_by_id(&pool, 4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn favourites_upsert_by_id() {
        let pool = setup_pool().await;
        let fav = FavouriteMovie::from_movie(movie(7, "first"));
        insert_favourite(&pool, &fav).await.unwrap();
        insert_favourite(&pool, &FavouriteMovie::from_movie(movie(7, "second")))
            .await
            .unwrap();

        let all = all_favourites(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].movie.title, "second");

        let got = get_favourite_by_id(&pool, 7).await.unwrap().unwrap();
        assert_eq!(got.movie.vote_average, 7.5);
        assert!(delete_favourite(&pool, 7).await.unwrap());
        assert!(get_favourite_by_id(&pool, 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn favourites_survive_listing_reset() {
        let pool = setup_pool().await;
        insert_movie(&pool, &movie(1, "x")).await.unwrap();
        insert_favourite(&pool, &FavouriteMovie::from_movie(movie(1, "x")))
            .await
            .unwrap();
        delete_all_movies(&pool).await.unwrap();
        assert!(get_favourite_by_id(&pool, 1).await.unwrap().is_some());
    }
}
