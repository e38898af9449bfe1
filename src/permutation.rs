// Permutation source for HMAC secret recovery
//
// Generates every string of a given length over [a-zA-Z0-9] by classic
// backtracking (push, recurse, pop). Generation is decoupled from dispatch:
// the generator only emits finished strings on a blocking thread, `Batcher`
// groups them into rounds of ten and `stream` hands each round to the task
// runner. Dictionary candidates go through the same `stream`.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::context::StopSignal;
use crate::runner::TaskRunner;

pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const BATCH_SIZE: usize = 10;
const CHANNEL_CAPACITY: usize = 1024;

/// Emit every string of exactly `length` characters from `ALPHABET`.
///
/// `emit` returning false aborts generation, as does `stop` being raised;
/// the stop signal is checked at every recursion level. Returns true when
/// the full space was enumerated.
///
/// Examples:
/// - length 1 → "a", "b", ..., "9" (62 strings)
/// - length 2 → "aa", "ab", ..., "99" (3844 strings)
pub fn generate<F>(length: usize, stop: &StopSignal, emit: &mut F) -> bool
where
    F: FnMut(&str) -> bool,
{
    let mut current = String::with_capacity(length);
    extend(&mut current, length, stop, emit)
}

fn extend<F>(current: &mut String, length: usize, stop: &StopSignal, emit: &mut F) -> bool
where
    F: FnMut(&str) -> bool,
{
    if stop.is_stopped() {
        return false;
    }
    if current.len() == length {
        return emit(current);
    }
    for &ch in ALPHABET.iter() {
        current.push(ch as char);
        let keep_going = extend(current, length, stop, emit);
        current.pop();
        if !keep_going {
            return false;
        }
    }
    true
}

/// Groups generated candidates into fixed-size dispatch rounds
#[derive(Debug)]
pub struct Batcher {
    size: usize,
    buffer: Vec<String>,
}

impl Batcher {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            buffer: Vec::with_capacity(size),
        }
    }

    /// Buffer a candidate, returning a full batch once `size` is reached
    pub fn push(&mut self, candidate: String) -> Option<Vec<String>> {
        self.buffer.push(candidate);
        if self.buffer.len() >= self.size {
            Some(std::mem::replace(&mut self.buffer, Vec::with_capacity(self.size)))
        } else {
            None
        }
    }

    /// Take whatever is left over
    pub fn flush(&mut self) -> Option<Vec<String>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Test candidates produced on a blocking thread, ten per runner round.
///
/// `produce` gets an `emit` callback and should stop as soon as it returns
/// false; it returns true when it ran to completion.
pub async fn stream<P, F, Fut>(produce: P, runner: &TaskRunner, stop: &StopSignal, test: F) -> bool
where
    P: FnOnce(&mut dyn FnMut(String) -> bool) -> bool + Send + 'static,
    F: Fn(String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let producer = tokio::task::spawn_blocking(move || {
        let mut emit = |candidate: String| tx.blocking_send(candidate).is_ok();
        produce(&mut emit)
    });

    let mut batcher = Batcher::new(BATCH_SIZE);
    let mut found = false;
    while let Some(candidate) = rx.recv().await {
        if let Some(batch) = batcher.push(candidate) {
            if runner.run(test.clone(), batch, stop).await {
                found = true;
                break;
            }
        }
        if stop.is_stopped() {
            break;
        }
    }

    if !found && !stop.is_stopped() {
        if let Some(rest) = batcher.flush() {
            found = runner.run(test.clone(), rest, stop).await;
        }
    }

    // unblocks the producer if we left early
    drop(rx);
    match producer.await {
        Ok(complete) => debug!("[JWT] candidate producer complete: {}", complete),
        Err(e) => warn!("[JWT] candidate producer failed: {}", e),
    }
    found
}

/// Test every permutation of one length
pub async fn search_length<F, Fut>(
    length: usize,
    runner: &TaskRunner,
    stop: &StopSignal,
    test: F,
) -> bool
where
    F: Fn(String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let producer_stop = stop.clone();
    stream(
        move |emit| generate(length, &producer_stop, &mut |candidate| emit(candidate.to_string())),
        runner,
        stop,
        test,
    )
    .await
}

/// Lengths `1..max_length`. The upper bound is exclusive: a maximum of 26
/// tests keys of 1 to 25 characters, and a maximum of 1 tests nothing.
pub async fn search<F, Fut>(max_length: usize, runner: &TaskRunner, stop: &StopSignal, test: F) -> bool
where
    F: Fn(String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    for length in 1..max_length {
        if stop.is_stopped() {
            return false;
        }
        debug!("[JWT] trying secrets of length {}", length);
        if search_length(length, runner, stop, test.clone()).await {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn collect(length: usize) -> Vec<String> {
        let mut out = Vec::new();
        generate(length, &StopSignal::new(), &mut |s| {
            out.push(s.to_string());
            true
        });
        out
    }

    // ============================================
    // Generator Tests
    // ============================================

    #[test]
    fn test_alphabet_is_62_distinct_chars() {
        let set: HashSet<u8> = ALPHABET.iter().copied().collect();
        assert_eq!(set.len(), 62);
    }

    #[test]
    fn test_length_one_yields_alphabet() {
        let all = collect(1);
        assert_eq!(all.len(), 62);
        assert_eq!(all.first().map(String::as_str), Some("a"));
        assert_eq!(all.last().map(String::as_str), Some("9"));
    }

    #[test]
    fn test_length_two_is_complete_and_distinct() {
        let all = collect(2);
        assert_eq!(all.len(), 62 * 62);
        assert!(all.iter().all(|s| s.len() == 2));
        let distinct: HashSet<&String> = all.iter().collect();
        assert_eq!(distinct.len(), 62 * 62);
    }

    #[test]
    fn test_lengths_never_overlap() {
        let mut seen = HashSet::new();
        for length in 1..3 {
            for s in collect(length) {
                assert!(seen.insert(s), "duplicate candidate across lengths");
            }
        }
        assert_eq!(seen.len(), 62 + 62 * 62);
    }

    #[test]
    fn test_emit_false_aborts() {
        let mut count = 0;
        let complete = generate(3, &StopSignal::new(), &mut |_| {
            count += 1;
            count < 5
        });
        assert!(!complete);
        assert_eq!(count, 5);
    }

    #[test]
    fn test_stop_aborts_deep_recursion() {
        let stop = StopSignal::new();
        let mut count = 0;
        let complete = generate(4, &stop.clone(), &mut |_| {
            count += 1;
            if count == 100 {
                stop.stop();
            }
            true
        });
        assert!(!complete);
        assert_eq!(count, 100);
    }

    // ============================================
    // Batcher Tests
    // ============================================

    #[test]
    fn test_batcher_emits_full_batches() {
        let mut batcher = Batcher::new(BATCH_SIZE);
        let mut batches = Vec::new();
        for s in collect(1) {
            if let Some(batch) = batcher.push(s) {
                batches.push(batch);
            }
        }
        assert_eq!(batches.len(), 6);
        assert!(batches.iter().all(|b| b.len() == 10));
        let rest = batcher.flush().unwrap();
        assert_eq!(rest.len(), 2);
        assert!(batcher.flush().is_none());
    }

    // ============================================
    // Search Tests
    // ============================================

    fn runner() -> TaskRunner {
        TaskRunner::new(4, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_search_finds_two_char_secret() {
        let found = search(3, &runner(), &StopSignal::new(), |s: String| async move { s == "Zq" }).await;
        assert!(found);
    }

    #[tokio::test]
    async fn test_search_finds_candidate_in_partial_batch() {
        // "9" is the 62nd candidate, only reached through the final flush
        let found = search(2, &runner(), &StopSignal::new(), |s: String| async move { s == "9" }).await;
        assert!(found);
    }

    #[tokio::test]
    async fn test_max_length_bound_is_exclusive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let found = search(1, &runner(), &StopSignal::new(), move |_: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { true }
        })
        .await;
        assert!(!found);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_tests_every_candidate_when_nothing_matches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let found = search(2, &runner(), &StopSignal::new(), move |_: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;
        assert!(!found);
        assert_eq!(calls.load(Ordering::SeqCst), 62);
    }

    #[tokio::test]
    async fn test_stream_feeds_every_produced_candidate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let found = stream(
            |emit| (0..25).all(|n| emit(format!("word{}", n))),
            &runner(),
            &StopSignal::new(),
            move |_: String| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { false }
            },
        )
        .await;
        assert!(!found);
        assert_eq!(calls.load(Ordering::SeqCst), 25);
    }

    #[tokio::test]
    async fn test_stream_stops_producer_after_success() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let found = stream(
            move |emit| {
                (0u64..).all(|n| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    emit(n.to_string())
                })
            },
            &runner(),
            &StopSignal::new(),
            |s: String| async move { s == "15" },
        )
        .await;
        assert!(found);
        // bounded by the channel, never the whole unbounded sequence
        assert!(produced.load(Ordering::SeqCst) <= 2 * BATCH_SIZE + CHANNEL_CAPACITY + 2);
    }

    #[tokio::test]
    async fn test_search_skips_when_stopped() {
        let stop = StopSignal::new();
        stop.stop();
        let found = search(5, &runner(), &stop, |_: String| async { true }).await;
        assert!(!found);
    }
}
