use std::future::Future;

use log::warn;

/// Result of a bounded retry: the last value produced and how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempts<T> {
    pub value: T,
    pub attempts: usize,
    pub succeeded: bool,
}

/// Call `operation` until `is_success` accepts its value or `max_attempts` calls were made.
///
/// There is no backoff between attempts. Errors returned by `operation` are not retried and
/// propagate immediately.
pub async fn retry_until<T, E, F, Fut, P>(
    name: &str,
    max_attempts: usize,
    mut operation: F,
    is_success: P,
) -> Result<Attempts<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        let value = operation().await?;
        let succeeded = is_success(&value);
        if succeeded || attempts >= max_attempts {
            return Ok(Attempts {
                value,
                attempts,
                succeeded,
            });
        }
        warn!("Attempt {}/{} of {} was unsuccessful, retrying", attempts, max_attempts, name);
    }
}
