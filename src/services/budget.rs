//! Budget guard
//!
//! Tracks estimated daily spend of metered providers and refuses dispatch once
//! the cap is reached. Days are UTC calendar days.

use crate::services::router::ProviderRegistry;
use crate::utils::error::{GatewayError, GatewayResult};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Source of the current calendar date
pub trait Clock: Send + Sync + fmt::Debug {
    fn today(&self) -> NaiveDate;
}

/// Wall clock, UTC
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Spend accumulator of one metered provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetState {
    pub spend: f64,
    pub last_reset: NaiveDate,
}

#[derive(Debug)]
struct MeteredProvider {
    cap: f64,
    rate_per_million: f64,
    state: Mutex<BudgetState>,
}

impl MeteredProvider {
    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Zero the accumulator when the date has advanced
fn reset_if_new_day(tag: &str, state: &mut BudgetState, today: NaiveDate) {
    if today != state.last_reset {
        info!(
            "Resetting daily budget for '{}' ({} -> {}), previous spend {:.6}",
            tag, state.last_reset, today, state.spend
        );
        state.spend = 0.0;
        state.last_reset = today;
    }
}

/// Budget guard
///
/// One mutex per metered provider; every read-modify-write happens under it.
#[derive(Debug)]
pub struct BudgetGuard {
    clock: Arc<dyn Clock>,
    providers: HashMap<String, MeteredProvider>,
}

impl BudgetGuard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            providers: HashMap::new(),
        }
    }

    /// Build a guard for every provider that has a daily cap
    pub fn from_registry(registry: &ProviderRegistry, clock: Arc<dyn Clock>) -> Self {
        let mut guard = Self::new(clock);
        for endpoint in registry.endpoints() {
            if let (Some(cap), Some(rate)) = (endpoint.daily_budget, endpoint.cost_per_million) {
                guard.register(&endpoint.tag, cap, rate);
            }
        }
        guard
    }

    /// Start metering a provider
    pub fn register(&mut self, tag: &str, cap: f64, rate_per_million: f64) {
        debug!("Metering provider '{}': cap {} at {} per million tokens", tag, cap, rate_per_million);
        self.providers.insert(
            tag.to_string(),
            MeteredProvider {
                cap,
                rate_per_million,
                state: Mutex::new(BudgetState {
                    spend: 0.0,
                    last_reset: self.clock.today(),
                }),
            },
        );
    }

    pub fn is_metered(&self, tag: &str) -> bool {
        self.providers.contains_key(tag)
    }

    /// Reset the accumulator if the calendar date has advanced
    pub fn check_and_reset(&self, tag: &str) {
        if let Some(provider) = self.providers.get(tag) {
            let mut state = provider.lock();
            reset_if_new_day(tag, &mut state, self.clock.today());
        }
    }

    /// Whether current spend is below the cap; unmetered providers are always admitted
    pub fn admit(&self, tag: &str) -> bool {
        match self.providers.get(tag) {
            Some(provider) => provider.lock().spend < provider.cap,
            None => true,
        }
    }

    /// `check_and_reset` followed by `admit`, under a single lock acquisition
    ///
    /// This is the admission path used by request handling.
    pub fn gate(&self, tag: &str) -> GatewayResult<()> {
        let Some(provider) = self.providers.get(tag) else {
            return Ok(());
        };

        let mut state = provider.lock();
        reset_if_new_day(tag, &mut state, self.clock.today());

        if state.spend < provider.cap {
            Ok(())
        } else {
            warn!(
                "Daily budget exhausted for '{}': spend {:.6} >= cap {}",
                tag, state.spend, provider.cap
            );
            Err(GatewayError::RateLimit {
                provider: tag.to_string(),
            })
        }
    }

    /// Add the estimated cost of a completed request, returning the new spend
    pub fn record(&self, tag: &str, prompt_tokens: u64, completion_tokens: u64) -> Option<f64> {
        let provider = self.providers.get(tag)?;
        let cost = cost_of(prompt_tokens, completion_tokens, provider.rate_per_million);

        let mut state = provider.lock();
        reset_if_new_day(tag, &mut state, self.clock.today());
        state.spend += cost;

        debug!("Recorded {:.6} for '{}', daily spend now {:.6}", cost, tag, state.spend);
        Some(state.spend)
    }

    /// Current accumulator of a metered provider
    pub fn snapshot(&self, tag: &str) -> Option<BudgetState> {
        self.providers.get(tag).map(|provider| *provider.lock())
    }
}

/// Estimated cost: (prompt + completion) / 1e6 * rate
pub fn cost_of(prompt_tokens: u64, completion_tokens: u64, rate_per_million: f64) -> f64 {
    (prompt_tokens + completion_tokens) as f64 / 1e6 * rate_per_million
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedClock(Mutex<NaiveDate>);

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            *self.0.lock().unwrap()
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn test_unmetered_provider_always_admitted() {
        let guard = BudgetGuard::new(Arc::new(SystemClock));

        assert!(guard.admit("nvidia"));
        assert!(guard.gate("nvidia").is_ok());
        assert_eq!(guard.record("nvidia", 1000, 1000), None);
    }

    #[test]
    fn test_record_accumulates_exact_cost() {
        let mut guard = BudgetGuard::new(Arc::new(FixedClock(Mutex::new(date(1)))));
        guard.register("groq", 1.0, 0.59);

        let spend = guard.record("groq", 10, 20).unwrap();
        assert_eq!(spend, 30.0 / 1e6 * 0.59);
    }

    #[test]
    fn test_reset_happens_once_per_day() {
        let clock = Arc::new(FixedClock(Mutex::new(date(1))));
        let mut guard = BudgetGuard::new(clock.clone());
        guard.register("groq", 1.0, 1.0);

        guard.record("groq", 500_000, 0);
        guard.check_and_reset("groq");
        assert_eq!(guard.snapshot("groq").unwrap().spend, 0.5);

        *clock.0.lock().unwrap() = date(2);
        guard.check_and_reset("groq");
        let state = guard.snapshot("groq").unwrap();
        assert_eq!(state.spend, 0.0);
        assert_eq!(state.last_reset, date(2));

        guard.record("groq", 100_000, 0);
        guard.check_and_reset("groq");
        guard.check_and_reset("groq");
        assert_eq!(guard.snapshot("groq").unwrap().spend, 0.1);
    }

    #[test]
    fn test_gate_rejects_at_cap() {
        let mut guard = BudgetGuard::new(Arc::new(FixedClock(Mutex::new(date(1)))));
        guard.register("groq", 1.0, 1.0);

        guard.record("groq", 250_000, 250_000);
        assert!(guard.gate("groq").is_ok());

        guard.record("groq", 500_000, 0);
        let error = guard.gate("groq").unwrap_err();
        assert_eq!(error.error_type(), "rate_limit_error");
        assert!(!guard.admit("groq"));
    }
}
