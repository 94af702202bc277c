//! Debounced interactive search.
//!
//! Keystrokes arrive faster than searches are worth running. Each [`SearchController`] owns a
//! worker task fed by a channel: the worker collects queries until the debounce window passes
//! with nothing new, runs the latest query once, and answers every caller of that burst with
//! the same result.

use crate::constants::{DEFAULT_DEBOUNCE, DEFAULT_OPTIONS_LIMIT, DEFAULT_SEARCH_LIMIT};
use crate::search::SearchIndex;
use crate::{CdsError, CdsResult};
use fhir::Coding;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A search result in the shape a select box consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    pub data: Coding,
}

impl From<&Coding> for SelectOption {
    fn from(coding: &Coding) -> Self {
        Self {
            label: coding.display_text().to_owned(),
            value: coding.code.clone(),
            data: coding.clone(),
        }
    }
}

/// Search timing and result caps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchSettings {
    pub debounce: Duration,
    /// Cap on debounced search results.
    pub search_limit: usize,
    /// Number of options listed before any typing.
    pub default_options_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            search_limit: DEFAULT_SEARCH_LIMIT,
            default_options_limit: DEFAULT_OPTIONS_LIMIT,
        }
    }
}

/// Run `query` against `index` and adapt the first `limit` matches.
pub fn search_options(index: &SearchIndex, query: &str, limit: usize) -> Vec<SelectOption> {
    index
        .query(query)
        .into_iter()
        .take(limit)
        .map(SelectOption::from)
        .collect()
}

struct PendingQuery {
    text: String,
    reply: oneshot::Sender<Vec<SelectOption>>,
}

/// Debounced search over one index.
///
/// Must be created inside a Tokio runtime. Dropping the controller stops its worker; queries
/// still waiting then resolve to [`CdsError::SearchUnavailable`].
#[derive(Debug)]
pub struct SearchController {
    index: Arc<SearchIndex>,
    settings: SearchSettings,
    queries: mpsc::UnboundedSender<PendingQuery>,
    worker: JoinHandle<()>,
}

impl SearchController {
    pub fn spawn(index: Arc<SearchIndex>, settings: SearchSettings) -> Self {
        let (queries, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(debounce_loop(index.clone(), settings, rx));

        Self {
            index,
            settings,
            queries,
            worker,
        }
    }

    /// Queue `text` for search.
    ///
    /// The query is sent immediately; the returned future resolves once the debounce window
    /// has passed with no newer query, carrying the result of the newest query in the burst.
    pub fn on_query(
        &self,
        text: impl Into<String>,
    ) -> impl Future<Output = CdsResult<Vec<SelectOption>>> + Send + 'static {
        let (reply, response) = oneshot::channel();
        let pending = PendingQuery {
            text: text.into(),
            reply,
        };
        if self.queries.send(pending).is_err() {
            tracing::warn!("search worker has stopped; query dropped");
        }

        async move { response.await.map_err(|_| CdsError::SearchUnavailable) }
    }

    /// The first entries of the vocabulary, shown before any typing. Not debounced.
    pub fn default_options(&self) -> Vec<SelectOption> {
        self.index
            .vocabulary()
            .first(self.settings.default_options_limit)
            .iter()
            .map(SelectOption::from)
            .collect()
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn debounce_loop(
    index: Arc<SearchIndex>,
    settings: SearchSettings,
    mut queries: mpsc::UnboundedReceiver<PendingQuery>,
) {
    while let Some(first) = queries.recv().await {
        let mut latest = first.text;
        let mut waiters = vec![first.reply];

        let timer = tokio::time::sleep(settings.debounce);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                next = queries.recv() => {
                    let Some(next) = next else {
                        tracing::debug!(waiters = waiters.len(), "search controller dropped mid-burst");
                        return;
                    };
                    latest = next.text;
                    waiters.push(next.reply);
                    timer.as_mut().reset(Instant::now() + settings.debounce);
                }
                _ = &mut timer => break,
            }
        }

        let options = search_options(&index, &latest, settings.search_limit);
        tracing::debug!(
            vocabulary = %index.vocabulary().kind(),
            query = %latest,
            coalesced = waiters.len(),
            results = options.len(),
            "ran debounced search"
        );

        for waiter in waiters {
            // A caller that stopped waiting is fine to skip.
            let _ = waiter.send(options.clone());
        }
    }
}
