//! State module for tracking crawl and validation progress
//!
//! # Components
//!
//! - `PageState` / `CrawlPhase`: per-URL frontier state and the crawl's global phase
//! - `DomainState`: per-host state behind a validator DomainQueue
//! - `CircuitBreaker`: the consecutive-failure state machine each host owns

mod circuit;
mod domain_state;
mod page_state;

// Re-export main types
pub use circuit::{CircuitBreaker, CircuitState};
pub use domain_state::{DnsStatus, DomainState};
pub use page_state::{CrawlPhase, PageState};
