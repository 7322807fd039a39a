//! Per-category rate limiter registry
//!
//! One [`CategoryLimiter`] per category, each with its own lock, so traffic in
//! one category never contends with another. Within a category, waiters are
//! admitted strictly in arrival order through an explicit ticket queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use wbgate_domain::{ApiRequest, ApiResponse, Category, RateLimitConfig, Result, WbError};

use super::bucket::{Bucket, BucketState};
use super::headers::{HeaderThrottleParser, ThrottleHeaderParser};
use crate::ports::Transport;

/// Upper bound used when a deadline would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Proof of admission returned by [`RateLimiterRegistry::acquire`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admitted {
    pub category: Category,
    /// Time spent queued before the token was granted.
    pub waited: Duration,
    /// Whole tokens left after this admission.
    pub remaining: u32,
}

struct LimiterInner {
    bucket: Bucket,
    queue: VecDeque<u64>,
    next_ticket: u64,
}

struct CategoryLimiter {
    inner: Mutex<LimiterInner>,
    notify: Notify,
}

impl CategoryLimiter {
    fn new(bucket: Bucket) -> Self {
        Self {
            inner: Mutex::new(LimiterInner { bucket, queue: VecDeque::new(), next_ticket: 0 }),
            notify: Notify::new(),
        }
    }
}

/// Removes a waiter's ticket when its acquisition ends without a grant
/// (deadline hit or the future dropped) and lets the next waiter move up.
struct TicketGuard<'a> {
    limiter: &'a CategoryLimiter,
    ticket: u64,
    armed: bool,
}

impl TicketGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TicketGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut inner = self.limiter.inner.lock();
            let ticket = self.ticket;
            inner.queue.retain(|queued| *queued != ticket);
        }
        self.limiter.notify.notify_waiters();
    }
}

/// Owns one token bucket per category and governs admission to each.
///
/// Construct one per client and share it behind an `Arc`; independently
/// constructed registries never share quota.
pub struct RateLimiterRegistry {
    limiters: [CategoryLimiter; Category::ALL.len()],
    parser: Arc<dyn ThrottleHeaderParser>,
    default_backoff: Duration,
    max_wait: Duration,
}

impl fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiterRegistry")
            .field("default_backoff", &self.default_backoff)
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}

impl RateLimiterRegistry {
    /// Registry using the standard `x-ratelimit-*` header parser.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_parser(config, Arc::new(HeaderThrottleParser::new()))
    }

    pub fn with_parser(config: &RateLimitConfig, parser: Arc<dyn ThrottleHeaderParser>) -> Self {
        let now = Instant::now();
        let limiters = Category::ALL.map(|category| {
            CategoryLimiter::new(Bucket::new(category, config.limits_for(category), now))
        });
        Self {
            limiters,
            parser,
            default_backoff: config.default_backoff(),
            max_wait: config.max_wait(),
        }
    }

    fn limiter(&self, category: Category) -> &CategoryLimiter {
        // `Category::ALL` is in declaration order, so the discriminant is the index
        &self.limiters[category as usize]
    }

    /// Wait in line for a token of `category`.
    ///
    /// `deadline` of `None` means now plus the configured maximum wait.
    ///
    /// # Errors
    /// `WbError::RateLimitExceeded` when no token could be granted before the
    /// deadline; `retry_after` is the time the bucket still needed.
    pub async fn acquire(&self, category: Category, deadline: Option<Instant>) -> Result<Admitted> {
        let limiter = self.limiter(category);
        let started = Instant::now();
        let deadline = deadline.unwrap_or_else(|| instant_after(started, self.max_wait));

        let ticket = {
            let mut inner = limiter.inner.lock();
            if inner.queue.is_empty() && inner.bucket.try_take(started) {
                let remaining = inner.bucket.state(started).available();
                debug!(category = %category, remaining, "rate limit token granted");
                return Ok(Admitted { category, waited: Duration::ZERO, remaining });
            }
            let ticket = inner.next_ticket;
            inner.next_ticket = inner.next_ticket.wrapping_add(1);
            inner.queue.push_back(ticket);
            debug!(category = %category, queued = inner.queue.len(), "waiting for rate limit token");
            ticket
        };
        let mut guard = TicketGuard { limiter, ticket, armed: true };

        loop {
            let notified = limiter.notify.notified();
            tokio::pin!(notified);

            let wake_at = {
                let mut inner = limiter.inner.lock();
                let now = Instant::now();
                let at_head = inner.queue.front() == Some(&ticket);

                if at_head && inner.bucket.try_take(now) {
                    inner.queue.pop_front();
                    let remaining = inner.bucket.state(now).available();
                    drop(inner);
                    guard.disarm();
                    limiter.notify.notify_waiters();

                    let waited = now.saturating_duration_since(started);
                    debug!(category = %category, waited_ms = waited.as_millis() as u64, remaining, "rate limit token granted");
                    return Ok(Admitted { category, waited, remaining });
                }

                if now >= deadline {
                    let ahead = inner.queue.iter().position(|queued| *queued == ticket).unwrap_or(0);
                    let retry_after = queued_wait(&mut inner.bucket, now, ahead);
                    drop(inner);
                    warn!(
                        category = %category,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "rate limit wait deadline exceeded"
                    );
                    return Err(WbError::RateLimitExceeded { category, retry_after });
                }

                // register interest before releasing the lock so no wakeup is lost
                notified.as_mut().enable();

                if at_head {
                    let wait = inner.bucket.time_until_available(now);
                    now.checked_add(wait).map_or(deadline, |at| at.min(deadline))
                } else {
                    deadline
                }
            };

            tokio::select! {
                () = &mut notified => {}
                () = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    /// Take a token only if one is immediately available and nobody is
    /// already waiting for it.
    pub fn try_acquire(&self, category: Category) -> bool {
        let mut inner = self.limiter(category).inner.lock();
        inner.queue.is_empty() && inner.bucket.try_take(Instant::now())
    }

    /// Converge the local bucket with server-reported quota.
    ///
    /// A stricter `remaining` lowers the local count; a larger one is ignored.
    /// A future `reset_at` becomes the instant the bucket is full again.
    pub fn apply_server_feedback(
        &self,
        category: Category,
        remaining: Option<u32>,
        reset_at: Option<Instant>,
    ) {
        let mut inner = self.limiter(category).inner.lock();
        converge(&mut inner.bucket, Instant::now(), remaining, reset_at);
    }

    /// Feed one response back into the limiter.
    ///
    /// # Errors
    /// On HTTP 429 the bucket is emptied for the advertised retry time (or the
    /// configured default backoff) and `WbError::RateLimitExceeded` is
    /// returned.
    pub fn observe(&self, category: Category, response: &ApiResponse) -> Result<()> {
        if response.is_rate_limited() {
            let retry_after = self
                .parser
                .retry_after(category, &response.headers)
                .unwrap_or(self.default_backoff);
            self.force_backoff(category, retry_after);
            return Err(WbError::RateLimitExceeded { category, retry_after });
        }

        let Some(hint) = self.parser.parse(category, &response.headers) else {
            return Ok(());
        };
        let now = Instant::now();
        let reset_at = hint.reset_after.and_then(|after| now.checked_add(after));
        let mut inner = self.limiter(category).inner.lock();
        if let Some(limit) = hint.limit {
            let capacity = inner.bucket.capacity();
            if limit != capacity {
                debug!(category = %category, server_limit = limit, capacity, "server advertises a different limit");
            }
        }
        converge(&mut inner.bucket, now, hint.remaining, reset_at);
        Ok(())
    }

    /// Empty the bucket and keep it empty for `retry_after`.
    pub fn force_backoff(&self, category: Category, retry_after: Duration) {
        self.limiter(category).inner.lock().bucket.force_empty(Instant::now(), retry_after);
        warn!(
            category = %category,
            retry_after_ms = retry_after.as_millis() as u64,
            "server rejected request with 429, backing off"
        );
    }

    /// Override the steady-state refill rate (tokens/second) for a category.
    pub fn override_refill_rate(&self, category: Category, refill_rate: f64) {
        self.limiter(category).inner.lock().bucket.set_refill_rate(Instant::now(), refill_rate);
        debug!(category = %category, refill_rate, "refill rate overridden");
        self.limiter(category).notify.notify_waiters();
    }

    pub fn state(&self, category: Category) -> BucketState {
        self.limiter(category).inner.lock().bucket.state(Instant::now())
    }

    /// Number of callers currently waiting for a token.
    pub fn queued(&self, category: Category) -> usize {
        self.limiter(category).inner.lock().queue.len()
    }

    /// Refill the bucket to capacity and clear any backoff.
    pub fn reset(&self, category: Category) {
        let limiter = self.limiter(category);
        limiter.inner.lock().bucket.reset(Instant::now());
        limiter.notify.notify_waiters();
    }

    /// Acquire, send and observe as one rate-governed exchange.
    ///
    /// # Errors
    /// Admission timeout, transport failure, or a 429 from the server.
    pub async fn execute<T>(
        &self,
        category: Category,
        transport: &T,
        request: ApiRequest,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse>
    where
        T: Transport + ?Sized,
    {
        self.acquire(category, deadline).await?;
        let response = transport.send(request).await?;
        self.observe(category, &response)?;
        Ok(response)
    }
}

/// Lower the local count to a stricter server `remaining` and record a future
/// reset. Caller holds the category lock.
fn converge(bucket: &mut Bucket, now: Instant, remaining: Option<u32>, reset_at: Option<Instant>) {
    if let Some(remaining) = remaining {
        if bucket.clamp_remaining(now, remaining) {
            debug!(category = %bucket.category(), remaining, "local quota clamped to server value");
        }
    }
    if let Some(reset_at) = reset_at {
        bucket.defer_until(now, reset_at);
    }
}

/// Time until a waiter with `ahead` callers in front of it could be served:
/// the next token plus one refill interval per caller ahead.
fn queued_wait(bucket: &mut Bucket, now: Instant, ahead: usize) -> Duration {
    let next = bucket.time_until_available(now);
    let rate = bucket.refill_rate();
    if ahead == 0 || !rate.is_finite() || rate <= 0.0 {
        return next;
    }
    Duration::try_from_secs_f64(ahead as f64 / rate).map_or(next, |extra| next.saturating_add(extra))
}

fn instant_after(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait).or_else(|| now.checked_add(FAR_FUTURE)).unwrap_or(now)
}
