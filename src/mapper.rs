//! Maps TMDB JSON payloads into typed records.
//!
//! Every mapper works on the whole response object, reads its `results` array
//! and skips entries it cannot use instead of failing the batch. Missing
//! optional fields become empty strings or zero.
use crate::model::{MovieSummary, Review, Trailer};
use serde_json::{Map, Value};
use tracing::debug;

pub fn movies_from_json(payload: &Value) -> Vec<MovieSummary> {
    map_results(payload, "movie", |obj| {
        let id = int_field(obj, "id")?;
        Some(MovieSummary {
            id,
            vote_count: int_field(obj, "vote_count").unwrap_or_default(),
            title: str_field(obj, "title"),
            original_title: str_field(obj, "original_title"),
            overview: str_field(obj, "overview"),
            poster_path: str_field(obj, "poster_path"),
            backdrop_path: str_field(obj, "backdrop_path"),
            vote_average: obj
                .get("vote_average")
                .and_then(Value::as_f64)
                .unwrap_or_default(),
            release_date: str_field(obj, "release_date"),
        })
    })
}

pub fn trailers_from_json(payload: &Value) -> Vec<Trailer> {
    map_results(payload, "trailer", |obj| {
        let key = str_field(obj, "key");
        if key.is_empty() {
            return None;
        }
        Some(Trailer {
            id: id_string(obj),
            name: str_field(obj, "name"),
            key,
            site: str_field(obj, "site"),
        })
    })
}

pub fn reviews_from_json(payload: &Value) -> Vec<Review> {
    map_results(payload, "review", |obj| {
        let content = str_field(obj, "content");
        if content.is_empty() {
            return None;
        }
        Some(Review {
            id: id_string(obj),
            author: str_field(obj, "author"),
            content,
        })
    })
}

fn map_results<T>(
    payload: &Value,
    kind: &'static str,
    map: impl Fn(&Map<String, Value>) -> Option<T>,
) -> Vec<T> {
    let Some(results) = payload.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mapped: Vec<T> = results
        .iter()
        .filter_map(|entry| entry.as_object().and_then(&map))
        .collect();
    if mapped.len() != results.len() {
        debug!(kind, skipped = results.len() - mapped.len(), "skipped malformed entries");
    }
    mapped
}

/// Integer ids may arrive as numbers or numeric strings.
fn int_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn id_string(obj: &Map<String, Value>) -> String {
    match obj.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
