//! Fuzzy search over a snapshot, plus the debounce timer that gates it.

use std::path::PathBuf;
use std::time::Duration;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tokio::task::JoinHandle;

use crate::event::{Event, EventSender};
use crate::fs::entry::DirectoryEntry;

/// Default quiet period before a query runs.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub score: i64,
}

/// Read-only index over every entry of one snapshot.
///
/// Built once per snapshot, so files inside collapsed folders are found too.
pub struct SearchIndex {
    entries: Vec<DirectoryEntry>,
    matcher: SkimMatcherV2,
}

impl SearchIndex {
    pub fn new(entries: &[DirectoryEntry]) -> Self {
        Self {
            entries: entries.to_vec(),
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    /// Rank the entries whose name fuzzily matches `text`.
    ///
    /// Returns `None` for an empty or blank query. Results are ordered by
    /// score (best first), ties broken by path.
    pub fn query(&self, text: &str) -> Option<Vec<SearchMatch>> {
        let pattern = text.trim();
        if pattern.is_empty() {
            return None;
        }
        let mut matches: Vec<SearchMatch> = self
            .entries
            .iter()
            .filter_map(|entry| {
                self.matcher
                    .fuzzy_match(&entry.name, pattern)
                    .map(|score| SearchMatch {
                        path: entry.path.clone(),
                        name: entry.name.clone(),
                        is_dir: entry.is_dir,
                        score,
                    })
            })
            .collect();
        matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        Some(matches)
    }
}

/// Delays search execution until the input has been quiet for a while.
///
/// Each [`schedule`](Self::schedule) aborts the pending timer, so only the
/// last query of a burst is ever delivered as [`Event::SearchDue`].
pub struct SearchDebouncer {
    quiet: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl SearchDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            generation: 0,
            pending: None,
        }
    }

    /// Arm the timer for `query`, superseding any pending one.
    pub fn schedule(&mut self, query: String, tx: EventSender) -> u64 {
        self.invalidate();
        let generation = self.generation;
        let quiet = self.quiet;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = tx.send(Event::SearchDue { generation, query });
        }));
        generation
    }

    /// Drop the pending timer; an already-delivered event becomes stale.
    pub fn invalidate(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    /// Whether `generation` belongs to the most recent schedule.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
