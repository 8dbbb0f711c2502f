//! Per-dependency circuit breaker for the external game-data services.
//!
//! Every upstream (Census, honu, fisu) is tracked under an alias. After
//! `failure_threshold` consecutive failures the alias is put on cooldown so
//! callers fail fast, or fall through to the next alias in a chain, until
//! the cooldown expires.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

/// Why a dependency was placed on cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownReason {
    /// HTTP 429, back off for a long time.
    RateLimited,
    /// 5xx, timeouts, or an error body.
    ServerError,
}

const RATE_LIMITED_COOLDOWN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct BreakerEntry {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    reason: CooldownReason,
}

/// Shared, lock-based circuit breaker tracking per-alias failures.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    server_error_cooldown: Duration,
    states: RwLock<HashMap<String, BreakerEntry>>,
}

impl CircuitBreaker {
    /// Create a breaker that opens after `failure_threshold` consecutive
    /// failures. A threshold of zero is treated as one.
    pub fn new(failure_threshold: u32, server_error_cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            server_error_cooldown,
            states: RwLock::new(HashMap::new()),
        }
    }

    fn cooldown_for(&self, reason: CooldownReason) -> Duration {
        match reason {
            CooldownReason::RateLimited => RATE_LIMITED_COOLDOWN.max(self.server_error_cooldown),
            CooldownReason::ServerError => self.server_error_cooldown,
        }
    }

    /// Whether `alias` may be called (closed, or cooldown expired).
    pub fn is_available(&self, alias: &str) -> bool {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        Self::entry_available(states.get(alias), Instant::now())
    }

    fn entry_available(entry: Option<&BreakerEntry>, now: Instant) -> bool {
        match entry.and_then(|e| e.open_until) {
            None => true,
            Some(open_until) => now >= open_until,
        }
    }

    /// Record a failure for `alias`. Opens the breaker once the threshold is
    /// reached; a rate limit opens it immediately.
    pub fn record_failure(&self, alias: &str, reason: CooldownReason) {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        let entry = states.entry(alias.to_string()).or_insert(BreakerEntry {
            consecutive_failures: 0,
            open_until: None,
            reason,
        });
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.reason = reason;

        if entry.consecutive_failures >= self.failure_threshold
            || reason == CooldownReason::RateLimited
        {
            let cooldown = self.cooldown_for(reason);
            entry.open_until = Some(Instant::now() + cooldown);
            tracing::warn!(
                "Circuit breaker opened for {} ({:?}, {} consecutive failures) for {:?}",
                alias,
                reason,
                entry.consecutive_failures,
                cooldown
            );
        }
    }

    /// Record a success for `alias`, closing the breaker.
    pub fn record_success(&self, alias: &str) {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states.remove(alias);
    }

    /// Return the first available alias from `aliases`, or `None` if all are on cooldown.
    pub fn first_available<'a>(&self, aliases: &'a [String]) -> Option<&'a str> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        aliases
            .iter()
            .find(|alias| Self::entry_available(states.get(alias.as_str()), now))
            .map(String::as_str)
    }

    /// Return the cooldown reason for an alias, if it is currently open.
    pub fn cooldown_reason(&self, alias: &str) -> Option<CooldownReason> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        let entry = states.get(alias)?;
        match entry.open_until {
            Some(open_until) if Instant::now() < open_until => Some(entry.reason),
            _ => None,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_secs(30))
    }

    #[test]
    fn new_alias_is_available() {
        let cb = breaker(3);
        assert!(cb.is_available("census"));
        assert!(cb.cooldown_reason("census").is_none());
    }

    #[test]
    fn opens_only_at_threshold() {
        let cb = breaker(3);
        cb.record_failure("census", CooldownReason::ServerError);
        cb.record_failure("census", CooldownReason::ServerError);
        assert!(cb.is_available("census"));

        cb.record_failure("census", CooldownReason::ServerError);
        assert!(!cb.is_available("census"));
        assert_eq!(cb.cooldown_reason("census"), Some(CooldownReason::ServerError));
    }

    #[test]
    fn rate_limit_opens_immediately() {
        let cb = breaker(3);
        cb.record_failure("honu", CooldownReason::RateLimited);
        assert!(!cb.is_available("honu"));
        assert_eq!(cb.cooldown_reason("honu"), Some(CooldownReason::RateLimited));
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker(2);
        cb.record_failure("census", CooldownReason::ServerError);
        cb.record_success("census");
        cb.record_failure("census", CooldownReason::ServerError);
        assert!(cb.is_available("census"));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires() {
        let cb = breaker(1);
        cb.record_failure("census", CooldownReason::ServerError);
        assert!(!cb.is_available("census"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cb.is_available("census"));

        // Still past the threshold, so one more failure reopens it
        cb.record_failure("census", CooldownReason::ServerError);
        assert!(!cb.is_available("census"));
    }

    #[test]
    fn first_available_skips_open_aliases() {
        let cb = breaker(1);
        let chain = vec!["honu".to_string(), "fisu".to_string()];

        assert_eq!(cb.first_available(&chain), Some("honu"));

        cb.record_failure("honu", CooldownReason::ServerError);
        assert_eq!(cb.first_available(&chain), Some("fisu"));

        cb.record_failure("fisu", CooldownReason::RateLimited);
        assert_eq!(cb.first_available(&chain), None);
    }

    #[test]
    fn aliases_are_independent() {
        let cb = breaker(1);
        cb.record_failure("census", CooldownReason::ServerError);
        assert!(!cb.is_available("census"));
        assert!(cb.is_available("honu"));
    }
}
