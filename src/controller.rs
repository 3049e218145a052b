//! Pagination and sort control for the movie listing.
//!
//! `Pager` is the bare state machine. `Controller` pairs it with a movie source
//! and the local store: it issues tickets, performs the fetch and applies the
//! result to the cached listing.
use crate::model::{MovieSummary, SortMode};
use crate::store::Store;
use crate::tmdb::MovieSource;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Identifies one issued fetch. A ticket whose generation is older than the
/// pager's is stale and its response must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub sort: SortMode,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Results were stored; `replaced` is set when they replaced the listing.
    Loaded {
        sort: SortMode,
        page: u32,
        count: usize,
        replaced: bool,
    },
    /// Empty page: no more data for this sort mode.
    EndOfData { sort: SortMode, page: u32 },
    /// Network or parse failure; nothing changed.
    Failed { sort: SortMode, page: u32 },
    /// A newer request replaced this one before its result was applied.
    Stale { sort: SortMode, page: u32 },
    /// `reached_end` while a fetch was running or after the last page.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerState {
    pub current_page: u32,
    pub sort: SortMode,
    pub loading: bool,
    pub exhausted: bool,
}

#[derive(Debug)]
pub struct Pager {
    current_page: u32,
    sort: SortMode,
    loading: bool,
    exhausted: bool,
    generation: u64,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(SortMode::default())
    }
}

impl Pager {
    pub fn new(sort: SortMode) -> Self {
        Self {
            current_page: 1,
            sort,
            loading: false,
            exhausted: false,
            generation: 0,
        }
    }

    pub fn state(&self) -> PagerState {
        PagerState {
            current_page: self.current_page,
            sort: self.sort,
            loading: self.loading,
            exhausted: self.exhausted,
        }
    }

    /// Switch sort mode and restart from page 1. Always issues a ticket; any
    /// ticket handed out earlier becomes stale.
    pub fn change_sort(&mut self, sort: SortMode) -> FetchTicket {
        self.generation += 1;
        self.sort = sort;
        self.current_page = 1;
        self.exhausted = false;
        self.issue()
    }

    /// Next page for the current sort mode, unless one is already loading or
    /// the last page was empty.
    pub fn reached_end(&mut self) -> Option<FetchTicket> {
        if self.loading || self.exhausted {
            return None;
        }
        Some(self.issue())
    }

    fn issue(&mut self) -> FetchTicket {
        self.loading = true;
        FetchTicket {
            generation: self.generation,
            sort: self.sort,
            page: self.current_page,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && ticket.sort == self.sort
            && ticket.page == self.current_page
    }

    /// Record the result of a fetch. `result_len` is `None` when the fetch
    /// failed.
    pub fn complete(&mut self, ticket: &FetchTicket, result_len: Option<usize>) -> FetchOutcome {
        let (sort, page) = (ticket.sort, ticket.page);
        if !self.is_current(ticket) {
            return FetchOutcome::Stale { sort, page };
        }
        self.loading = false;
        match result_len {
            None => FetchOutcome::Failed { sort, page },
            Some(0) => {
                self.exhausted = true;
                FetchOutcome::EndOfData { sort, page }
            }
            Some(count) => {
                self.current_page += 1;
                FetchOutcome::Loaded {
                    sort,
                    page,
                    count,
                    replaced: page == 1,
                }
            }
        }
    }
}

pub struct Controller {
    pager: Mutex<Pager>,
    store: Store,
    source: Arc<dyn MovieSource>,
    language: String,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(store: Store, source: Arc<dyn MovieSource>, language: impl Into<String>) -> Self {
        Self {
            pager: Mutex::new(Pager::default()),
            store,
            source,
            language: language.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn state(&self) -> PagerState {
        self.pager.lock().await.state()
    }

    pub async fn begin_sort(&self, sort: SortMode) -> FetchTicket {
        let ticket = self.pager.lock().await.change_sort(sort);
        info!(?sort, generation = ticket.generation, "sort mode changed");
        ticket
    }

    pub async fn begin_next_page(&self) -> Option<FetchTicket> {
        self.pager.lock().await.reached_end()
    }

    /// Change sort mode and load its first page.
    pub async fn change_sort(&self, sort: SortMode) -> Result<FetchOutcome> {
        let ticket = self.begin_sort(sort).await;
        self.run(ticket).await
    }

    /// Load the next page if no fetch is running and data remains.
    pub async fn reached_end(&self) -> Result<FetchOutcome> {
        match self.begin_next_page().await {
            Some(ticket) => self.run(ticket).await,
            None => {
                debug!("reached end while loading or exhausted; ignoring");
                Ok(FetchOutcome::Skipped)
            }
        }
    }

    /// Fetch the page a ticket names and apply the result.
    pub async fn run(&self, ticket: FetchTicket) -> Result<FetchOutcome> {
        let result = self
            .source
            .fetch_movies(ticket.sort, ticket.page, &self.language)
            .await;
        self.on_fetch_complete(ticket, result).await
    }

    /// Apply a fetch result to the cached listing. A failed fetch counts as
    /// "no data this round"; only store errors are returned.
    #[instrument(skip_all, fields(sort = ?ticket.sort, page = ticket.page))]
    pub async fn on_fetch_complete(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<MovieSummary>>,
    ) -> Result<FetchOutcome> {
        let mut pager = self.pager.lock().await;
        if !pager.is_current(&ticket) {
            debug!(generation = ticket.generation, "dropping stale response");
            return Ok(pager.complete(&ticket, None));
        }

        let movies = match result {
            Ok(movies) => movies,
            Err(err) => {
                warn!(?err, "movie fetch failed");
                return Ok(pager.complete(&ticket, None));
            }
        };

        if !movies.is_empty() {
            let written = if ticket.page == 1 {
                self.store.replace_movies(&movies).await
            } else {
                self.store.append_movies(&movies).await
            };
            if let Err(err) = written {
                pager.complete(&ticket, None);
                return Err(err);
            }
        }

        let outcome = pager.complete(&ticket, Some(movies.len()));
        info!(?outcome, "fetch applied");
        Ok(outcome)
    }
}
