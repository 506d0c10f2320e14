use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::extract::extract_urls;
use crate::pipeline::{Pipeline, RunOutcome, RunStage};
use crate::platform::{BotIdentity, InboundEvent};

/// Turns inbound messages into concurrent pipeline runs.
///
/// Runs live in a task group owned by the dispatcher; an optional semaphore
/// caps how many of them do work at the same time. Dispatching never waits
/// for a run to finish.
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    identity: BotIdentity,
    limit: Option<Arc<Semaphore>>,
    runs: JoinSet<RunOutcome>,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<Pipeline>, identity: BotIdentity, max_concurrent: Option<usize>) -> Self {
        Self {
            pipeline,
            identity,
            limit: max_concurrent.map(|n| Arc::new(Semaphore::new(n))),
            runs: JoinSet::new(),
        }
    }

    /// Handle one message. Returns the number of runs started for it.
    pub fn dispatch(&mut self, event: InboundEvent) -> usize {
        self.reap();

        // Our own uploads and notices must never trigger another round
        if self.identity.authored(&event) {
            debug!("Ignoring own message {}", event.message_id);
            return 0;
        }

        let urls: Vec<String> = extract_urls(&event.text)
            .into_iter()
            .map(str::to_owned)
            .collect();
        if urls.is_empty() {
            return 0;
        }

        let event = Arc::new(event);
        for url in &urls {
            debug!("Found matching URL {}", url);
            let pipeline = self.pipeline.clone();
            let limit = self.limit.clone();
            let event = event.clone();
            let url = url.clone();

            self.runs.spawn(async move {
                // The semaphore is never closed, so acquiring only waits
                let _permit = match limit {
                    Some(limit) => limit.acquire_owned().await.ok(),
                    None => None,
                };
                pipeline.run(&url, &event).await
            });
        }

        urls.len()
    }

    /// Number of runs started and not yet collected.
    pub fn in_flight(&self) -> usize {
        self.runs.len()
    }

    /// Collect runs that have already finished.
    fn reap(&mut self) {
        while let Some(joined) = self.runs.try_join_next() {
            if let Err(e) = joined {
                error!("Pipeline run panicked: {}", e);
            }
        }
    }

    /// Wait for every in-flight run and return their outcomes.
    pub async fn drain(&mut self) -> Vec<RunOutcome> {
        let mut outcomes = Vec::with_capacity(self.runs.len());
        while let Some(joined) = self.runs.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Pipeline run panicked: {}", e),
            }
        }
        outcomes
    }

    /// Consume `events` one by one until the sender side closes, then let
    /// in-flight runs finish.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }

        if self.in_flight() > 0 {
            info!("Event stream closed, waiting for {} run(s)", self.in_flight());
        }
        let outcomes = self.drain().await;
        let done = outcomes.iter().filter(|o| o.is_done()).count();
        info!(
            "Drained {} run(s): {} done, {} failed",
            outcomes.len(),
            done,
            outcomes.len() - done
        );
        let failed_at: Vec<RunStage> = outcomes
            .iter()
            .filter_map(RunOutcome::error)
            .map(|e| e.stage())
            .collect();
        if !failed_at.is_empty() {
            debug!("Failed runs stopped at: {:?}", failed_at);
        }
    }
}
