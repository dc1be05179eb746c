use std::time::Duration;

/// Configuration for exponential backoff retry behavior.
///
/// `max_retries` counts every attempt including the first, so the default of
/// three gives one call and two retries. The delay before attempt `n + 1` is
/// `min(initial_delay * backoff_multiplier^(n - 1), max_delay)`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use toolgate_common::client::RetryConfig;
///
/// // Conservative retry policy
/// let config = RetryConfig {
///     max_retries: 5,
///     initial_delay: Duration::from_millis(500),
///     max_delay: Duration::from_secs(10),
///     backoff_multiplier: 2.0,
///     jitter: false,
/// };
///
/// assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
/// assert_eq!(config.delay_for_attempt(3), Duration::from_millis(2000));
/// assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (caps exponential growth).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (typically 2.0 for doubling).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to retry delays to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Creates a policy with the given attempt bound and delay cap, keeping the
    /// default one second initial delay and doubling.
    #[must_use]
    pub fn new(max_retries: u32, max_delay: Duration) -> Self {
        Self {
            max_retries,
            max_delay,
            ..Self::default()
        }
    }

    /// Returns the un-jittered delay that follows the failed `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exp = i32::try_from(attempt.saturating_sub(1).min(30)).unwrap_or(30);
        let mult = self.backoff_multiplier.powi(exp);
        if !mult.is_finite() || mult <= 0.0 {
            return self.max_delay;
        }

        let scaled = self.initial_delay.as_secs_f64() * mult;
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }
}

/// HTTP client configuration for outbound tool calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Deadline for a single attempt, from send to fully read response.
    pub timeout: Duration,
    /// Retry policy applied around every call.
    pub retry: RetryConfig,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            user_agent: format!("toolgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
