use crate::controller::{Controller, FetchOutcome, FetchTicket};
use crate::model::SortMode;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

/// Background fetch worker. Requests go through a single slot: a new ticket
/// overwrites one that has not started and cancels one that is in flight.
pub struct FetchWorker {
    controller: Arc<Controller>,
    slot: watch::Sender<Option<FetchTicket>>,
    task: JoinHandle<()>,
}

impl FetchWorker {
    /// Start the worker. Outcomes of every request, including cancelled ones,
    /// arrive on the returned receiver.
    pub fn spawn(controller: Arc<Controller>) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (slot, rx) = watch::channel(None);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(controller.clone(), rx, events_tx));
        (
            Self {
                controller,
                slot,
                task,
            },
            events_rx,
        )
    }

    pub async fn change_sort(&self, sort: SortMode) {
        let ticket = self.controller.begin_sort(sort).await;
        self.slot.send_replace(Some(ticket));
    }

    /// Queue the next page. Returns `false` when the controller refused
    /// (already loading or no more data).
    pub async fn reached_end(&self) -> bool {
        match self.controller.begin_next_page().await {
            Some(ticket) => {
                self.slot.send_replace(Some(ticket));
                true
            }
            None => false,
        }
    }

    /// Stop the worker. A fetch still in flight is cancelled.
    pub async fn shutdown(self) {
        let Self { slot, task, .. } = self;
        drop(slot);
        if let Err(err) = task.await {
            error!(?err, "fetch worker panicked");
        }
    }
}

#[instrument(skip_all)]
async fn run(
    controller: Arc<Controller>,
    mut rx: watch::Receiver<Option<FetchTicket>>,
    events: mpsc::UnboundedSender<FetchOutcome>,
) {
    while rx.changed().await.is_ok() {
        let mut next = *rx.borrow_and_update();
        while let Some(ticket) = next.take() {
            tokio::select! {
                res = controller.run(ticket) => match res {
                    Ok(outcome) => {
                        let _ = events.send(outcome);
                    }
                    Err(err) => {
                        error!(?err, page = ticket.page, "failed to store fetched movies");
                        let _ = events.send(FetchOutcome::Failed {
                            sort: ticket.sort,
                            page: ticket.page,
                        });
                    }
                },
                changed = rx.changed() => {
                    debug!(generation = ticket.generation, page = ticket.page, "in-flight fetch superseded");
                    let _ = events.send(FetchOutcome::Stale {
                        sort: ticket.sort,
                        page: ticket.page,
                    });
                    if changed.is_err() {
                        return;
                    }
                    next = *rx.borrow_and_update();
                }
            }
        }
    }
    debug!("fetch worker stopped");
}
