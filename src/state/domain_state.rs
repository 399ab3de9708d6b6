use crate::state::CircuitBreaker;
use std::time::{Duration, Instant};

/// Outcome of the one-time DNS lookup for a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsStatus {
    /// Lookup not attempted yet
    Unknown,

    /// Host resolved to at least one address
    Resolved,

    /// Lookup timed out; probing goes ahead and decides per URL
    Unverified,

    /// Host cannot be resolved; no URL on it is probed
    Failed(String),
}

/// Tracks the state of one host inside the link validator
///
/// This is the state behind a DomainQueue: politeness timing, the DNS
/// pre-filter result, and the circuit breaker.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Lowercase hostname
    pub host: String,

    /// Number of checks that went to the network
    pub request_count: u32,

    /// Timestamp of the last request to this host
    pub last_request_time: Option<Instant>,

    /// Earliest instant the next request may start
    pub next_request_at: Option<Instant>,

    /// DNS pre-filter result
    pub dns: DnsStatus,

    /// Consecutive transport failure tracking
    pub breaker: CircuitBreaker,
}

impl DomainState {
    /// Creates a new DomainState with default values
    pub fn new(host: impl Into<String>, circuit_threshold: u32) -> Self {
        Self {
            host: host.into(),
            request_count: 0,
            last_request_time: None,
            next_request_at: None,
            dns: DnsStatus::Unknown,
            breaker: CircuitBreaker::new(circuit_threshold),
        }
    }

    /// Returns true if no further request will ever be sent to this host
    pub fn is_unreachable(&self) -> bool {
        matches!(self.dns, DnsStatus::Failed(_)) || self.breaker.is_open()
    }

    /// Records that a request was made and schedules the next slot
    ///
    /// `delay` is the politeness gap (jitter included) before the next
    /// request may start.
    pub fn record_request(&mut self, now: Instant, delay: Duration) {
        self.request_count += 1;
        self.last_request_time = Some(now);
        self.next_request_at = Some(now + delay);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        self.next_request_at
            .filter(|next| *next > now)
            .map(|next| next - now)
    }
}
