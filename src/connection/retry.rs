//! Bounded exponential backoff.
//!
//! A policy starts at `timeout_us` microseconds and multiplies the delay by
//! `exponent` after each attempt, giving up after `max_retries` retries.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::warn;

/// Boxed future borrowing its caller's state for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Initial delay in microseconds
    pub timeout_us: u64,
    pub exponent: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            timeout_us: 1000,
            exponent: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, timeout_us: u64, exponent: u64) -> Self {
        RetryPolicy {
            max_retries,
            timeout_us,
            exponent,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// The sleep before each retry, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let exponent = self.exponent;
        std::iter::successors(Some(self.timeout_us), move |us| us.checked_mul(exponent))
            .take(self.max_retries as usize)
            .map(Duration::from_micros)
    }

    /// Run `op` until it succeeds, retrying only retryable errors.
    ///
    /// `on_catch` sees every retryable failure before the sleep; returning an
    /// error from it aborts with that error instead of retrying. Once the
    /// retries are used up the last failure is returned.
    pub async fn retry_on_error<T, F, Fut, H>(&self, mut op: F, mut on_catch: H) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        H: FnMut(&Error) -> Result<()>,
    {
        let mut delays = self.delays();
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err),
            };

            on_catch(&err)?;
            match delays.next() {
                Some(delay) => {
                    warn!(error = %err, delay_us = delay.as_micros() as u64, "Retrying");
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            }
        }
    }

    /// Run `op` against `state` until it yields `Some`, sleeping between
    /// attempts. Returns `None` once the retries are used up.
    pub async fn retry_on_false<S, T, F>(&self, state: &mut S, mut op: F) -> Option<T>
    where
        S: ?Sized,
        F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Option<T>>,
    {
        let mut delays = self.delays();
        loop {
            if let Some(value) = op(&mut *state).await {
                return Some(value);
            }
            tokio::time::sleep(delays.next()?).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        assert_eq!(
            delays,
            [
                Duration::from_micros(1000),
                Duration::from_micros(2000),
                Duration::from_micros(4000)
            ]
        );
        assert_eq!(RetryPolicy::none().delays().count(), 0);
    }

    #[tokio::test]
    async fn test_retry_on_error_succeeds_after_failures() {
        let mut calls = 0;
        let result = RetryPolicy::default()
            .retry_on_error(
                || {
                    calls += 1;
                    let attempt = calls;
                    async move {
                        if attempt < 3 {
                            Err(Error::communication("closed"))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |_| Ok(()),
            )
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retry_on_error_exhausts() {
        let mut calls = 0;
        let mut caught = 0;
        let result: Result<()> = RetryPolicy::default()
            .retry_on_error(
                || {
                    calls += 1;
                    async { Err(Error::communication("closed")) }
                },
                |_| {
                    caught += 1;
                    Ok(())
                },
            )
            .await;

        assert!(matches!(result, Err(Error::Communication { .. })));
        // One initial attempt plus three retries
        assert_eq!(calls, 4);
        assert_eq!(caught, 4);
    }

    #[tokio::test]
    async fn test_retry_on_error_skips_non_retryable() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::default()
            .retry_on_error(
                || {
                    calls += 1;
                    async { Err(Error::PushNotification("bad".into())) }
                },
                |_| Ok(()),
            )
            .await;

        assert!(matches!(result, Err(Error::PushNotification(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_on_catch_can_abort() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::default()
            .retry_on_error(
                || {
                    calls += 1;
                    async { Err(Error::communication("closed")) }
                },
                |_| Err(Error::InvalidConfiguration("stop".into())),
            )
            .await;

        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_on_false() {
        let mut attempts = 0u32;
        let result = RetryPolicy::default()
            .retry_on_false(&mut attempts, |attempts| {
                Box::pin(async move {
                    *attempts += 1;
                    (*attempts == 3).then_some("ready")
                })
            })
            .await;

        assert_eq!(result, Some("ready"));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_on_false_gives_up() {
        let mut attempts = 0u32;
        let result: Option<()> = RetryPolicy::new(2, 10, 2)
            .retry_on_false(&mut attempts, |attempts| {
                Box::pin(async move {
                    *attempts += 1;
                    None
                })
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(attempts, 3);
    }
}
