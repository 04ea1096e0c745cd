//! Backoff for read-only ledger queries.
//!
//! `eth_call`, `eth_chainId`, `eth_accounts` and receipt polls are safe to
//! repeat, so a transport failure is retried. Anything the node actually
//! answered, including a JSON-RPC error or a non-2xx status, is final.
//! Writes go through [`EvmLedger`](crate::EvmLedger) without this wrapper.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry schedule: `max_retries` extra attempts, doubling from `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Backoff {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for Backoff {
    /// 200ms, 400ms, 800ms.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `op` until it succeeds or the schedule is exhausted. The last
    /// error is returned as is.
    pub async fn run<T, E, F, Fut>(&self, what: &str, op: F) -> Result<T, E>
    where
        E: Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        for attempt in 0..self.max_retries {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "{what} failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        op().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_schedule_doubles() {
        let b = Backoff::default();
        let delays: Vec<_> = (0..3).map(|n| b.delay(n).as_millis()).collect();
        assert_eq!(delays, vec![200, 400, 800]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_schedule() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result: Result<(), String> = Backoff::default()
            .run("eth_call", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("connection refused".to_string()) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "connection refused");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = Backoff::default()
            .run("eth_chainId", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err("timed out".to_string())
                    } else {
                        Ok(31337)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 31337);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closed_port_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let fast = Backoff {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        };
        let result = fast
            .run("eth_accounts", || {
                calls.fetch_add(1, Ordering::SeqCst);
                client.get("http://127.0.0.1:1/").send()
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
