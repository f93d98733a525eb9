//! Retrying request execution.
//!
//! One logical operation is a closure producing an HTTP request future.  The
//! executor drives it with a bounded attempt budget: transport errors, 5xx
//! responses and validation failures all trigger a capped exponential
//! backoff and another attempt.  A 4xx response is final and goes straight
//! to the validators, which may well accept it (409 on an out-of-stock buy,
//! 404 on a deliberately bad path).

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::validate::{validate, Check};

/// A completed HTTP exchange with the body fully read, so validation is a
/// pure function over it.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl Exchange {
    /// Drain a response into an owned exchange.  A body read error counts as
    /// a transport failure.
    pub async fn read(response: reqwest::Response) -> reqwest::Result<Self> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Retry budget and backoff schedule for one logical request.
///
/// The delay doubles after every retry but never exceeds `max_delay`, so a
/// long 5xx burst cannot stall a worker indefinitely.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

/// Perform one logical request with resilience to transient failure.
///
/// Every predicate in `checks` runs on each completed non-5xx response; a
/// failing conjunction triggers a retry like a transport error would.  On
/// exhausting the attempt budget the last error has already been logged and
/// `None` is returned; nothing propagates out of the executor.
pub async fn execute_with_retry<F, Fut>(
    name: &str,
    policy: &RetryPolicy,
    checks: &[Check],
    request: F,
) -> Option<Exchange>
where
    F: Fn() -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut delay = policy.initial_delay;
    for attempt in 1..=policy.max_attempts {
        let outcome = match request().await {
            Ok(response) => Exchange::read(response).await,
            Err(err) => Err(err),
        };
        match outcome {
            Err(err) => {
                tracing::warn!(op = %name, attempt, max = policy.max_attempts, error = %err, "transport error");
            }
            Ok(exchange) if exchange.is_server_error() => {
                tracing::warn!(op = %name, attempt, status = exchange.status, "server error");
            }
            Ok(exchange) => {
                if checks.is_empty() || validate(&exchange, checks) {
                    return Some(exchange);
                }
                tracing::warn!(op = %name, attempt, status = exchange.status, "validation failed");
            }
        }
        if attempt < policy.max_attempts {
            tracing::debug!(op = %name, delay_ms = delay.as_millis() as u64, "backing off before retry");
            sleep(delay).await;
            delay = policy.next_delay(delay);
        }
    }
    tracing::error!(op = %name, attempts = policy.max_attempts, "giving up after exhausting retries");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        };
        let mut delay = policy.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(delay);
            delay = policy.next_delay(delay);
        }
        assert_eq!(
            seen,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(4),
            ]
        );
    }

    #[test]
    fn server_error_classification() {
        let mut exchange = Exchange {
            status: 500,
            content_type: None,
            body: String::new(),
        };
        assert!(exchange.is_server_error());
        exchange.status = 599;
        assert!(exchange.is_server_error());
        exchange.status = 409;
        assert!(!exchange.is_server_error());
    }
}
