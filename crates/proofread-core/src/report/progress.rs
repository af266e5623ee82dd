//! Run progress. The runner emits done/total in completion order; the CLI consumes it via a sink.

use std::sync::Arc;

/// One progress update: how many invocations are done out of the planned total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
}

/// Called by the runner each time an experiment invocation completes.
/// Implementations may throttle (e.g. log only every k-th event).
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Sink that logs at most `every` events apart, plus the final one.
pub fn logging_sink(every: usize) -> ProgressSink {
    let every = every.max(1);
    Arc::new(move |ev: ProgressEvent| {
        if ev.done % every == 0 || ev.done == ev.total {
            tracing::info!(done = ev.done, total = ev.total, "evaluation progress");
        }
    })
}
