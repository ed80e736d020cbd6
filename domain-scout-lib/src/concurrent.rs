//! Pacing utilities: polling backoff, chunked dispatch, and throttled
//! sequential processing.
//!
//! Backoff reacts to incompleteness (an upstream job that is not ready yet);
//! throttling is a fixed courtesy delay between requests to an upstream that
//! must not be probed concurrently. Both are plain timed delays.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Ordered schedule of delays for polling an asynchronous upstream job.
///
/// The number of attempts equals the number of delays; attempt `i` waits
/// `delays[i]` before it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
}

impl BackoffPolicy {
    /// Create a policy from an explicit schedule.
    ///
    /// An empty schedule is replaced by a single immediate attempt so that
    /// polling always happens at least once.
    pub fn new(delays: Vec<Duration>) -> Self {
        if delays.is_empty() {
            Self {
                delays: vec![Duration::ZERO],
            }
        } else {
            Self { delays }
        }
    }

    /// `attempts` attempts with no waiting in between (for tests).
    pub fn immediate(attempts: usize) -> Self {
        Self::new(vec![Duration::ZERO; attempts.max(1)])
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Total time spent sleeping if every attempt is used.
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Default for BackoffPolicy {
    /// Short waits first, longer ones once the upstream is clearly busy.
    fn default() -> Self {
        Self::new(vec![
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3),
            Duration::from_secs(5),
        ])
    }
}

/// Split domains into chunks of at most `size` names.
pub fn chunk_domains(domains: &[String], size: usize) -> Vec<Vec<String>> {
    domains
        .chunks(size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Run `f` on every chunk concurrently; results come back in chunk order.
pub async fn dispatch_chunks<T, F, Fut>(chunks: Vec<Vec<String>>, f: F) -> Vec<T>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = T>,
{
    join_all(chunks.into_iter().map(f)).await
}

/// Process `items` strictly in order, sleeping `delay` between consecutive
/// items (never after the last one).
pub async fn throttled_sequential<T, F, Fut>(items: &[String], delay: Duration, mut f: F) -> Vec<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = T>,
{
    let mut results = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        results.push(f(item.clone()).await);

        if index + 1 < items.len() {
            tokio::time::sleep(delay).await;
        }
    }

    results
}
