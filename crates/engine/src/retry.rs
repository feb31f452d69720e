//! Bounded retry for transient analyzer failures.
//!
//! Some back-ends resolve elements lazily against external tooling that
//! fails transiently; re-trying the same operation usually succeeds. The
//! helper below retries a bounded number of times before giving up with
//! the last error.

/// Default number of attempts for lazy completion operations.
pub const DEFAULT_COMPLETION_ATTEMPTS: usize = 10;

/// Run `operation` up to `attempts` times, returning the first success or
/// the last error.
pub fn with_retries<T, E>(
    attempts: usize,
    mut operation: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let attempts = attempts.max(1);
    let mut last_error = None;
    for _ in 0..attempts {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }
    match last_error {
        Some(e) => Err(e),
        None => unreachable!("at least one attempt always runs"),
    }
}
