//! Token bucket for a single API category
//!
//! Pure state and arithmetic: every operation takes `now` from the caller,
//! there is no clock access and no I/O. Refill is continuous and lazy,
//! computed from the elapsed time whenever the bucket is touched.

use std::time::Duration;

use tokio::time::Instant;
use wbgate_domain::{BucketLimits, Category};

/// Read-only view of a bucket at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub category: Category,
    pub tokens: f64,
    pub capacity: u32,
    /// Tokens per second.
    pub refill_rate: f64,
    /// Time left until a server-advertised reset, when one is pending.
    pub next_reset_in: Option<Duration>,
}

impl BucketState {
    /// Whole tokens available right now.
    pub fn available(&self) -> u32 {
        self.tokens.floor() as u32
    }
}

/// Token bucket with a server-controlled reset override.
///
/// While a reset is pending, lazy refill is suspended and tokens are held
/// where they are; once the reset instant passes the bucket is full again.
/// Tokens are only ever lowered by an acquisition, a stricter server
/// `remaining`, or a forced backoff.
#[derive(Debug, Clone)]
pub struct Bucket {
    category: Category,
    capacity: u32,
    refill_rate: f64,
    tokens: f64,
    last_refill_at: Instant,
    next_reset_at: Option<Instant>,
}

impl Bucket {
    /// Full bucket sized from the category quota.
    pub fn new(category: Category, limits: BucketLimits, now: Instant) -> Self {
        Self::with_rate(category, limits.burst, limits.refill_per_second(), now)
    }

    /// Full bucket with an explicit capacity and refill rate (tokens/second).
    ///
    /// A zero capacity is raised to one token so the bucket can ever admit.
    pub fn with_rate(category: Category, capacity: u32, refill_rate: f64, now: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            category,
            capacity,
            refill_rate: sanitize_rate(refill_rate),
            tokens: f64::from(capacity),
            last_refill_at: now,
            next_reset_at: None,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn next_reset_at(&self) -> Option<Instant> {
        self.next_reset_at
    }

    /// Bring the token count up to date with `now`.
    pub fn refill(&mut self, now: Instant) {
        if let Some(reset_at) = self.next_reset_at {
            if now < reset_at {
                self.advance_clock(now);
                return;
            }
            self.tokens = f64::from(self.capacity);
            self.next_reset_at = None;
            self.advance_clock(now);
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill_at);
        let accrued = elapsed.as_secs_f64() * self.refill_rate;
        self.tokens = (self.tokens + accrued).min(f64::from(self.capacity));
        self.advance_clock(now);
    }

    /// Tokens available at `now` (after refill).
    pub fn tokens(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    /// Deduct one token if available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long until one token is available.
    pub fn time_until_available(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        if let Some(reset_at) = self.next_reset_at {
            return reset_at.saturating_duration_since(now);
        }
        let missing = 1.0 - self.tokens;
        Duration::try_from_secs_f64(missing / self.refill_rate).unwrap_or(Duration::MAX)
    }

    /// Lower the local estimate to a stricter server-reported `remaining`.
    ///
    /// Never raises the count. Returns `true` when tokens were lowered.
    pub fn clamp_remaining(&mut self, now: Instant, remaining: u32) -> bool {
        self.refill(now);
        let reported = f64::from(remaining);
        if reported < self.tokens {
            self.tokens = reported;
            true
        } else {
            false
        }
    }

    /// Record a server-advertised instant at which the quota is fully
    /// replenished. Past instants are ignored; an already pending reset is
    /// only ever pushed later.
    pub fn defer_until(&mut self, now: Instant, reset_at: Instant) {
        self.refill(now);
        if reset_at <= now {
            return;
        }
        self.next_reset_at = Some(self.next_reset_at.map_or(reset_at, |pending| pending.max(reset_at)));
    }

    /// Empty the bucket and hold it empty for `retry_after`.
    pub fn force_empty(&mut self, now: Instant, retry_after: Duration) {
        self.refill(now);
        self.tokens = 0.0;
        if let Some(reset_at) = now.checked_add(retry_after) {
            self.defer_until(now, reset_at);
        }
    }

    /// Replace the steady-state refill rate (tokens/second).
    pub fn set_refill_rate(&mut self, now: Instant, refill_rate: f64) {
        // accrue at the old rate up to now first
        self.refill(now);
        self.refill_rate = sanitize_rate(refill_rate);
    }

    /// Return to a full bucket and drop any pending reset.
    pub fn reset(&mut self, now: Instant) {
        self.tokens = f64::from(self.capacity);
        self.next_reset_at = None;
        self.last_refill_at = now;
    }

    pub fn state(&mut self, now: Instant) -> BucketState {
        self.refill(now);
        BucketState {
            category: self.category,
            tokens: self.tokens,
            capacity: self.capacity,
            refill_rate: self.refill_rate,
            next_reset_in: self.next_reset_at.map(|at| at.saturating_duration_since(now)),
        }
    }

    fn advance_clock(&mut self, now: Instant) {
        if now > self.last_refill_at {
            self.last_refill_at = now;
        }
    }
}

fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        f64::MIN_POSITIVE
    }
}
