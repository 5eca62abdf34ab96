//! Retry with backoff, and chunked batch submission with per-item fallback.
//!
//! ## `submit_batch` protocol
//!
//! 1. Split the items into chunks of at most `batch_size`.
//! 2. Submit each chunk through [`retry`].
//! 3. If a chunk of more than one item still fails, resubmit its items one
//!    by one (each through [`retry`]) so a single bad record only fails
//!    itself.
//! 4. Collect successes (paired with their input) and failures.

use std::thread::sleep;
use std::time::Duration;

use rand::Rng;

use replicator_core::{RetryConfig, StoreError};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Exponential backoff with jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. At least 1.
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: config.base_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately; for tests and dry runs.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at
    /// `max_backoff`, plus up to 20% jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let base = self.base_backoff.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(16) as u32;
        let cap = self.max_backoff.as_millis() as u64;
        let backoff = base.saturating_mul(1_u64 << exp).min(cap);
        let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
        Duration::from_millis(backoff.saturating_add(jitter))
    }
}

// ---------------------------------------------------------------------------
// retry
// ---------------------------------------------------------------------------

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// Only errors classified as retryable are retried. The last error is
/// returned unchanged.
pub fn retry<T>(
    what: &str,
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    "{what}: retry attempt {}/{} in {:?} after: {err}",
                    attempt + 1,
                    policy.max_attempts,
                    backoff
                );
                sleep(backoff);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// submit_batch
// ---------------------------------------------------------------------------

/// An input item the store did not accept.
#[derive(Debug)]
pub struct ItemFailure<T> {
    pub item: T,
    pub error: StoreError,
}

/// Per-item outcome of [`submit_batch`].
#[derive(Debug)]
pub struct BatchResult<T, R> {
    /// Inputs paired with what the store returned for them.
    pub succeeded: Vec<(T, R)>,
    pub failures: Vec<ItemFailure<T>>,
}

impl<T, R> Default for BatchResult<T, R> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Submit `items` through `op` in chunks, with retry and per-item fallback.
///
/// `op` must return one result per input, in input order.
pub fn submit_batch<T: Clone, R>(
    what: &str,
    items: Vec<T>,
    batch_size: usize,
    policy: &RetryPolicy,
    mut op: impl FnMut(&[T]) -> Result<Vec<R>, StoreError>,
) -> BatchResult<T, R> {
    let mut result = BatchResult::default();
    if items.is_empty() {
        return result;
    }

    for chunk in items.chunks(batch_size.max(1)) {
        match retry(what, policy, || op(chunk)) {
            Ok(outputs) => pair_outputs(&mut result, chunk, outputs),
            Err(err) if chunk.len() == 1 => {
                tracing::warn!("{what}: item failed: {err}");
                result.failures.push(ItemFailure {
                    item: chunk[0].clone(),
                    error: err,
                });
            }
            Err(err) => {
                tracing::warn!(
                    "{what}: batch of {} failed ({err}); retrying items individually",
                    chunk.len()
                );
                for item in chunk {
                    let single = std::slice::from_ref(item);
                    match retry(what, policy, || op(single)) {
                        Ok(outputs) => pair_outputs(&mut result, single, outputs),
                        Err(err) => {
                            tracing::warn!("{what}: item failed: {err}");
                            result.failures.push(ItemFailure {
                                item: item.clone(),
                                error: err,
                            });
                        }
                    }
                }
            }
        }
    }
    result
}

fn pair_outputs<T: Clone, R>(result: &mut BatchResult<T, R>, inputs: &[T], outputs: Vec<R>) {
    let returned = outputs.len();
    let mut outputs = outputs.into_iter();
    for input in inputs {
        match outputs.next() {
            Some(output) => result.succeeded.push((input.clone(), output)),
            None => result.failures.push(ItemFailure {
                item: input.clone(),
                error: StoreError::rejected(format!(
                    "store returned {returned} results for {} items",
                    inputs.len()
                )),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn transient_errors_are_retried_until_success() {
        let calls = Cell::new(0);
        let out = retry("test", &RetryPolicy::immediate(3), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(StoreError::transient("rate limited"))
            } else {
                Ok(7)
            }
        })
        .expect("eventually succeeds");
        assert_eq!(out, 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let err = retry("test", &RetryPolicy::immediate(5), || -> Result<(), _> {
            calls.set(calls.get() + 1);
            Err(StoreError::rejected("bad payload"))
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn exhausted_attempts_surface_last_error() {
        let calls = Cell::new(0);
        let err = retry("test", &RetryPolicy::immediate(2), || -> Result<(), _> {
            calls.set(calls.get() + 1);
            Err(StoreError::transient("down"))
        })
        .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1_000),
        };
        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(120));
        let third = policy.backoff(3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(480));
        let late = policy.backoff(9);
        assert!(late <= Duration::from_millis(1_200));
    }

    #[test]
    fn bad_item_only_fails_itself() {
        let items: Vec<i32> = (1..=5).collect();
        let result = submit_batch("test", items, 10, &RetryPolicy::immediate(1), |chunk| {
            if chunk.contains(&3) {
                Err(StoreError::rejected("3 is cursed"))
            } else {
                Ok(chunk.iter().map(|n| n * 10).collect())
            }
        });
        let ok: Vec<_> = result.succeeded.iter().map(|(i, o)| (*i, *o)).collect();
        assert_eq!(ok, vec![(1, 10), (2, 20), (4, 40), (5, 50)]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].item, 3);
    }

    #[test]
    fn items_are_chunked_by_batch_size() {
        let sizes = std::cell::RefCell::new(Vec::new());
        let result = submit_batch("test", (0..7).collect::<Vec<_>>(), 3, &RetryPolicy::immediate(1), |chunk| {
            sizes.borrow_mut().push(chunk.len());
            Ok(chunk.to_vec())
        });
        assert_eq!(*sizes.borrow(), vec![3, 3, 1]);
        assert_eq!(result.succeeded.len(), 7);
    }

    #[test]
    fn short_store_response_marks_missing_items_failed() {
        let result = submit_batch("test", vec![1, 2], 10, &RetryPolicy::immediate(1), |chunk| {
            Ok(vec![chunk[0]])
        });
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].item, 2);
    }
}
