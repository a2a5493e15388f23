//! Per-daemon circuit breakers.
//!
//! `Closed` allows sends. After `failure_threshold` consecutive I/O failures
//! (or a failed explicit probe) the circuit opens and sends are held. Once
//! the cooldown elapses the breaker goes `HalfOpen` and asks for a probe; a
//! successful probe closes it, a failed one reopens it with the cooldown
//! doubled up to `max_cooldown`.

use std::fmt;
use std::time::{Duration, Instant};

use meshgate_core::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub max_cooldown: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(10),
            max_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: HealthConfig,
    state: CircuitState,
    consecutive_failures: u32,
    cooldown: Duration,
    retry_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: HealthConfig) -> Self {
        let cooldown = config.cooldown;
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            cooldown,
            retry_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn allows_send(&self) -> bool {
        self.state == CircuitState::Closed
    }

    /// Cooldown that will apply the next time the circuit opens.
    pub fn current_cooldown(&self) -> Duration {
        self.cooldown
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.retry_at = Some(now + self.cooldown);
    }

    /// A write succeeded. Returns the new state if it changed.
    pub fn record_success(&mut self) -> Option<CircuitState> {
        self.consecutive_failures = 0;
        if self.state == CircuitState::Closed {
            return None;
        }
        self.close();
        Some(CircuitState::Closed)
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.cooldown = self.config.cooldown;
        self.retry_at = None;
    }

    /// An adapter-level I/O call failed. Returns the new state if it changed.
    pub fn record_failure(&mut self, now: Instant) -> Option<CircuitState> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.state == CircuitState::Closed
            && self.consecutive_failures >= self.config.failure_threshold.max(1)
        {
            self.open(now);
            return Some(CircuitState::Open);
        }
        None
    }

    /// Move `Open` to `HalfOpen` once the cooldown has elapsed. Returns `true`
    /// when the caller should issue a probe.
    pub fn poll(&mut self, now: Instant) -> bool {
        match (self.state, self.retry_at) {
            (CircuitState::Open, Some(at)) if now >= at => {
                self.state = CircuitState::HalfOpen;
                self.retry_at = None;
                true
            }
            _ => false,
        }
    }

    /// Outcome of a reachability probe. Returns the new state if it changed.
    pub fn record_probe(&mut self, ok: bool, now: Instant) -> Option<CircuitState> {
        match (self.state, ok) {
            (CircuitState::HalfOpen, true) => {
                self.close();
                Some(CircuitState::Closed)
            }
            (CircuitState::HalfOpen, false) => {
                self.cooldown = (self.cooldown * 2).min(self.config.max_cooldown);
                self.open(now);
                Some(CircuitState::Open)
            }
            (CircuitState::Closed, false) => {
                self.open(now);
                Some(CircuitState::Open)
            }
            _ => None,
        }
    }
}

/// One breaker per underlying daemon.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    crypto: CircuitBreaker,
    radio: CircuitBreaker,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            crypto: CircuitBreaker::new(config.clone()),
            radio: CircuitBreaker::new(config),
        }
    }

    pub fn breaker(&self, network: Network) -> &CircuitBreaker {
        match network {
            Network::CryptoMesh => &self.crypto,
            Network::RadioMesh => &self.radio,
        }
    }

    pub fn breaker_mut(&mut self, network: Network) -> &mut CircuitBreaker {
        match network {
            Network::CryptoMesh => &mut self.crypto,
            Network::RadioMesh => &mut self.radio,
        }
    }

    pub fn state(&self, network: Network) -> CircuitState {
        self.breaker(network).state()
    }

    pub fn allows_send(&self, network: Network) -> bool {
        self.breaker(network).allows_send()
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
