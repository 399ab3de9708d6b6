//! Per-host circuit breaker
//!
//! Closed while requests keep getting HTTP answers. After `threshold`
//! consecutive transport-level failures (timeouts, refused connections) it
//! opens and stays open for the rest of the run.

/// Breaker position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed { consecutive_failures: u32 },
    Open,
}

/// Consecutive-failure circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    threshold: u32,
}

impl CircuitBreaker {
    /// Creates a closed breaker that opens after `threshold` failures
    pub fn new(threshold: u32) -> Self {
        Self {
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
            threshold: threshold.max(1),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CircuitState::Open)
    }

    /// Records an HTTP-level answer, successful or not
    ///
    /// A definitive error such as 404 proves the host is reachable, so it
    /// resets the count just like a success.
    pub fn record_response(&mut self) {
        if let CircuitState::Closed { .. } = self.state {
            self.state = CircuitState::Closed {
                consecutive_failures: 0,
            };
        }
    }

    /// Records a transport-level failure
    ///
    /// Returns true if this failure opened the circuit.
    pub fn record_transport_failure(&mut self) -> bool {
        match self.state {
            CircuitState::Open => false,
            CircuitState::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.threshold {
                    self.state = CircuitState::Open;
                    true
                } else {
                    self.state = CircuitState::Closed {
                        consecutive_failures: failures,
                    };
                    false
                }
            }
        }
    }
}
