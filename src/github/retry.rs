//! Rate-limit classification and retry policy for GitHub API calls.
//!
//! GitHub signals two kinds of throttling:
//! - primary: `x-ratelimit-remaining: 0`, reset time in `x-ratelimit-reset`
//! - secondary (abuse detection): 403/429 mentioning "secondary rate limit",
//!   usually with a `retry-after` header
//!
//! Primary limits are retried up to three times, secondary limits once.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    Primary,
    Secondary,
}

/// A throttled response and how long the server asked us to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub kind: RateLimitKind,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub primary_retries: u32,
    pub secondary_retries: u32,
    /// Used when the server gives no hint
    pub fallback_delay: Duration,
    /// Upper bound on any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            primary_retries: 3,
            secondary_retries: 1,
            fallback_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(15 * 60),
        }
    }
}

impl RetryPolicy {
    /// Policy with the standard retry counts but no waiting, for tests.
    pub fn immediate() -> Self {
        Self {
            fallback_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn max_retries(&self, kind: RateLimitKind) -> u32 {
        match kind {
            RateLimitKind::Primary => self.primary_retries,
            RateLimitKind::Secondary => self.secondary_retries,
        }
    }

    pub fn clamp(&self, delay: Duration) -> Duration {
        delay.min(self.max_delay)
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Decide whether a response is a rate-limit signal.
///
/// `now_epoch` is the current Unix time, used to turn `x-ratelimit-reset` into a delay.
pub fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    now_epoch: u64,
    fallback: Duration,
) -> Option<RateLimit> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let retry_after = header_u64(headers, "retry-after").map(Duration::from_secs);
    let lower = body.to_lowercase();

    if lower.contains("secondary rate limit") || lower.contains("abuse") {
        return Some(RateLimit {
            kind: RateLimitKind::Secondary,
            delay: retry_after.unwrap_or(fallback),
        });
    }

    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        let delay = retry_after.unwrap_or_else(|| {
            header_u64(headers, "x-ratelimit-reset")
                .map(|reset| Duration::from_secs(reset.saturating_sub(now_epoch)))
                .unwrap_or(fallback)
        });
        return Some(RateLimit {
            kind: RateLimitKind::Primary,
            delay,
        });
    }

    // A bare retry-after on 403/429 is GitHub's secondary limiter without the wording
    retry_after.map(|delay| RateLimit {
        kind: RateLimitKind::Secondary,
        delay,
    })
}
