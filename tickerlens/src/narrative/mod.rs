//! Concurrent narrative fetch.
//!
//! Two narrative sources are queried at the same time on a pool of two
//! workers created for each call. Both results are always awaited, and a failure in either is
//! turned into a placeholder rather than an error. The composed text keeps
//! a fixed order (primary first) regardless of which source finished first.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::gateway::{NarrativeSource, UpstreamError};

/// Size of the narrative worker pool.
pub const NARRATIVE_WORKERS: usize = 2;

/// Placeholder written for a failed source.
pub const UNAVAILABLE: &str = "unavailable";

/// Placeholder written for a source that answered with nothing.
pub const NO_DATA: &str = "no data";

/// Outcome of one source.
#[derive(Debug, Clone, PartialEq)]
pub enum NarrativeOutcome {
    Text(String),
    NoData,
    Unavailable(UpstreamError),
}

/// One source's contribution to the composed context.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativePart {
    pub source: String,
    pub outcome: NarrativeOutcome,
}

impl fmt::Display for NarrativePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            NarrativeOutcome::Text(text) => write!(f, "[{}]\n{}", self.source, text.trim()),
            NarrativeOutcome::NoData => write!(f, "[{}] {}", self.source, NO_DATA),
            NarrativeOutcome::Unavailable(_) => write!(f, "[{}] {}", self.source, UNAVAILABLE),
        }
    }
}

/// Both sources' results, in fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedNarrative {
    pub parts: [NarrativePart; 2],
}

impl ComposedNarrative {
    /// The composed context string: parts separated by a blank line.
    pub fn context(&self) -> String {
        format!("{}\n\n{}", self.parts[0], self.parts[1])
    }

    /// Whether at least one source produced text.
    pub fn has_text(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p.outcome, NarrativeOutcome::Text(_)))
    }
}

/// Fan-out/fan-in over two narrative sources.
pub struct ParallelFetchOrchestrator {
    primary: Arc<dyn NarrativeSource>,
    secondary: Arc<dyn NarrativeSource>,
}

impl ParallelFetchOrchestrator {
    pub fn new(primary: Arc<dyn NarrativeSource>, secondary: Arc<dyn NarrativeSource>) -> Self {
        Self { primary, secondary }
    }

    /// Fetches from both sources concurrently and waits for both.
    ///
    /// Never fails. There is no timeout here beyond what each source
    /// enforces itself. Each call gets its own worker pool, so concurrent
    /// callers never wait on each other's permits.
    pub async fn fetch(&self, subject_name: &str) -> ComposedNarrative {
        let start = Instant::now();
        let workers = Arc::new(Semaphore::new(NARRATIVE_WORKERS));

        let first = Self::spawn_fetch(&workers, Arc::clone(&self.primary), subject_name);
        let second = Self::spawn_fetch(&workers, Arc::clone(&self.secondary), subject_name);

        let (first, second) = future::join(
            Self::join(self.primary.name(), first),
            Self::join(self.secondary.name(), second),
        )
        .await;

        debug!(
            subject = subject_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "narrative fetch complete"
        );

        ComposedNarrative {
            parts: [first, second],
        }
    }

    fn spawn_fetch(
        workers: &Arc<Semaphore>,
        source: Arc<dyn NarrativeSource>,
        subject_name: &str,
    ) -> JoinHandle<Result<Option<String>, UpstreamError>> {
        let workers = Arc::clone(workers);
        let subject_name = subject_name.to_string();
        tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| UpstreamError::unavailable("narrative worker pool closed"))?;
            source.fetch(&subject_name).await
        })
    }

    async fn join(
        name: &str,
        handle: JoinHandle<Result<Option<String>, UpstreamError>>,
    ) -> NarrativePart {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(UpstreamError::Panicked(e.to_string())),
        };

        let outcome = match result {
            Ok(Some(text)) if !text.trim().is_empty() => NarrativeOutcome::Text(text),
            Ok(_) => NarrativeOutcome::NoData,
            Err(e) => {
                warn!(source = name, error = %e, "narrative source failed");
                NarrativeOutcome::Unavailable(e)
            }
        };

        NarrativePart {
            source: name.to_string(),
            outcome,
        }
    }
}
