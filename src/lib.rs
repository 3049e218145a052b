//! Movie browser backed by the TMDB API and a local SQLite cache.
//!
//! - `tmdb` fetches pages, trailers and reviews; `mapper` turns JSON into models.
//! - `db` holds the SQL; `store` wraps it with observable lists.
//! - `controller` owns pagination and sort state; `worker` runs fetches in the
//!   background with latest-request-wins semantics.
//! - `detail` assembles the per-movie view and toggles favourites.

pub mod config;
pub mod controller;
pub mod db;
pub mod detail;
pub mod mapper;
pub mod model;
pub mod store;
pub mod tmdb;
pub mod worker;
