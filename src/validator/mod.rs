//! Link validator
//!
//! The validator accepts references while pages are still being crawled and
//! emits a [`LinkVerdict`] per canonical target as soon as its check
//! completes.
//!
//! # Components
//!
//! - The dispatcher: a single task owning target dedup, occurrence
//!   bookkeeping and the lane table
//! - Lanes (`lane`): one task per host, one check at a time, politeness
//!   delay, DNS pre-filter and circuit breaker
//! - The probe (`probe`): HEAD, GET fallback, retries and status mapping

mod lane;
mod probe;
mod types;

pub use lane::LaneSummary;
pub use probe::{backoff_delay, check_url, classify_status, CheckResult};
pub use types::{LinkOutcome, LinkVerdict, Occurrence, WarningReason};

use crate::config::{DomainEntry, ValidatorConfig};
use crate::crawler::{Fetcher, Reference, ReferenceKind};
use crate::progress::ProgressObserver;
use crate::url::{canonicalize, is_excluded};
use lane::{run_lane, LaneContext};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Counters collected while validating
#[derive(Debug, Clone, Default)]
pub struct ValidationStats {
    /// Distinct canonical targets submitted
    pub targets: usize,

    /// Targets routed to a lane
    pub dispatched: usize,

    /// Targets that turned out to be crawled pages
    pub skipped_pages: usize,

    /// Targets on excluded hosts
    pub skipped_excluded: usize,

    /// Image references ignored because image checking is off
    pub skipped_images: usize,

    /// HTTP requests sent by all lanes
    pub requests: u32,

    /// Hosts that got a lane
    pub hosts: usize,

    pub dns_failed_hosts: Vec<String>,

    pub open_circuits: Vec<String>,
}

enum Command {
    Submit { reference: Reference, page: Url },
    MarkPage(Url),
    DeferHost(String),
    Finish,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit { reference, page } => write!(f, "Submit({} from {})", reference.target, page),
            Self::MarkPage(url) => write!(f, "MarkPage({})", url),
            Self::DeferHost(host) => write!(f, "DeferHost({})", host),
            Self::Finish => write!(f, "Finish"),
        }
    }
}

/// Sending side of a running validator
///
/// Cheap to clone. Every method is fire-and-forget; once the validator
/// has finished, calls are ignored.
#[derive(Debug, Clone)]
pub struct ValidatorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ValidatorHandle {
    /// Submits one reference found on `page`
    pub fn submit(&self, reference: &Reference, page: &Url) {
        let _ = self.commands.send(Command::Submit {
            reference: reference.clone(),
            page: page.clone(),
        });
    }

    /// Tells the validator that `url` is a crawled page
    ///
    /// References to a known page are never checked over the network.
    pub fn mark_page(&self, url: &Url) {
        let _ = self.commands.send(Command::MarkPage(canonicalize(url)));
    }

    /// Holds back targets on `host` until [`finish`](Self::finish)
    ///
    /// Used for the crawl's own hosts: most of their targets become pages,
    /// and only the ones that never do are checked.
    pub fn defer_host(&self, host: &str) {
        let _ = self.commands.send(Command::DeferHost(host.to_ascii_lowercase()));
    }

    /// Signals that no more input will arrive
    ///
    /// Deferred targets that never became pages are checked, then the
    /// verdict stream closes.
    pub fn finish(&self) {
        let _ = self.commands.send(Command::Finish);
    }
}

/// Builder for a validator task
pub struct LinkValidator {
    fetcher: Fetcher,
    config: ValidatorConfig,
    exclusions: Vec<DomainEntry>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl LinkValidator {
    pub fn new(
        fetcher: Fetcher,
        config: ValidatorConfig,
        exclusions: Vec<DomainEntry>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            fetcher,
            config,
            exclusions,
            observer,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops dispatching when `cancel` fires
    ///
    /// Checks already in flight still produce verdicts; queued and deferred
    /// targets are dropped.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Starts the dispatcher
    ///
    /// Returns the input handle, the verdict stream and a handle resolving
    /// to the final counters once the verdict stream has closed.
    pub fn spawn(
        self,
    ) -> (
        ValidatorHandle,
        mpsc::UnboundedReceiver<LinkVerdict>,
        JoinHandle<ValidationStats>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (verdict_tx, verdict_rx) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher::new(self, verdict_tx);
        let join = tokio::spawn(dispatcher.run(command_rx));

        (
            ValidatorHandle {
                commands: command_tx,
            },
            verdict_rx,
            join,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetState {
    /// Waiting for `finish` because its host is being crawled
    Deferred,
    /// Sent to a lane
    Dispatched,
    /// Verdict emitted
    Done,
    /// Never checked: known page or excluded host
    Skipped,
}

struct Target {
    state: TargetState,
    occurrences: Vec<Occurrence>,
}

struct Dispatcher {
    config: Arc<ValidatorConfig>,
    exclusions: Vec<DomainEntry>,
    observer: Arc<dyn ProgressObserver>,
    verdicts: mpsc::UnboundedSender<LinkVerdict>,

    lane_ctx: LaneContext,
    results_rx: mpsc::UnboundedReceiver<(Url, LinkOutcome)>,
    lanes: HashMap<String, mpsc::UnboundedSender<Url>>,
    lane_tasks: JoinSet<LaneSummary>,

    targets: HashMap<Url, Target>,
    known_pages: HashSet<Url>,
    deferred_hosts: HashSet<String>,

    /// Dispatched targets without a verdict yet
    outstanding: usize,
    finishing: bool,
    cancel: CancellationToken,
    stats: ValidationStats,
}

impl Dispatcher {
    fn new(validator: LinkValidator, verdicts: mpsc::UnboundedSender<LinkVerdict>) -> Self {
        let config = Arc::new(validator.config);
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let lane_ctx = LaneContext {
            fetcher: validator.fetcher,
            config: config.clone(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_checks.max(1))),
            results: results_tx,
            cancel: validator.cancel.clone(),
        };

        Self {
            config,
            exclusions: validator.exclusions,
            observer: validator.observer,
            verdicts,
            lane_ctx,
            results_rx,
            lanes: HashMap::new(),
            lane_tasks: JoinSet::new(),
            targets: HashMap::new(),
            known_pages: HashSet::new(),
            deferred_hosts: HashSet::new(),
            outstanding: 0,
            finishing: false,
            cancel: validator.cancel,
            stats: ValidationStats::default(),
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> ValidationStats {
        loop {
            if self.finishing && self.outstanding == 0 {
                break;
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::info!(
                        "Validation cancelled with {} checks outstanding",
                        self.outstanding
                    );
                    break;
                }
                command = commands.recv(), if !self.finishing => match command {
                    Some(command) => self.handle(command),
                    // Every handle dropped without finish
                    None => self.begin_finish(),
                },
                Some((url, outcome)) = self.results_rx.recv() => self.complete(url, outcome),
                else => break,
            }
        }

        self.shutdown().await
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Submit { reference, page } => self.submit(reference, page),
            Command::MarkPage(url) => self.mark_page(url),
            Command::DeferHost(host) => {
                self.deferred_hosts.insert(host);
            }
            Command::Finish => self.begin_finish(),
        }
    }

    fn submit(&mut self, reference: Reference, page: Url) {
        if reference.kind == ReferenceKind::Image && !self.config.check_images {
            self.stats.skipped_images += 1;
            return;
        }

        let target_url = canonicalize(&reference.target);
        let occurrence = Occurrence {
            page_url: canonicalize(&page),
            text: reference.text,
            kind: reference.kind,
        };

        if let Some(target) = self.targets.get_mut(&target_url) {
            if !target.occurrences.contains(&occurrence) {
                target.occurrences.push(occurrence);
            }
            return;
        }

        self.stats.targets += 1;
        let host = target_url
            .host_str()
            .unwrap_or_default()
            .to_ascii_lowercase();

        let state = if is_excluded(&host, &self.exclusions) {
            self.stats.skipped_excluded += 1;
            TargetState::Skipped
        } else if self.known_pages.contains(&target_url) {
            self.stats.skipped_pages += 1;
            TargetState::Skipped
        } else if self.deferred_hosts.contains(&host) && !self.finishing {
            TargetState::Deferred
        } else {
            self.dispatch(&target_url, host);
            TargetState::Dispatched
        };

        self.targets.insert(
            target_url,
            Target {
                state,
                occurrences: vec![occurrence],
            },
        );
    }

    fn mark_page(&mut self, url: Url) {
        if let Some(target) = self.targets.get_mut(&url) {
            if target.state == TargetState::Deferred {
                target.state = TargetState::Skipped;
                self.stats.skipped_pages += 1;
            }
        }
        self.known_pages.insert(url);
    }

    /// Releases deferred targets; no more commands are read after this
    fn begin_finish(&mut self) {
        if self.finishing {
            return;
        }
        self.finishing = true;

        let mut released: Vec<Url> = self
            .targets
            .iter()
            .filter(|(_, target)| target.state == TargetState::Deferred)
            .map(|(url, _)| url.clone())
            .collect();
        released.sort();

        tracing::debug!("Validator finishing, checking {} deferred targets", released.len());

        for url in released {
            let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
            self.dispatch(&url, host);
            if let Some(target) = self.targets.get_mut(&url) {
                target.state = TargetState::Dispatched;
            }
        }
    }

    fn dispatch(&mut self, url: &Url, host: String) {
        let lane = match self.lanes.get(&host) {
            Some(lane) => lane.clone(),
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.lane_tasks
                    .spawn(run_lane(host.clone(), rx, self.lane_ctx.clone()));
                self.lanes.insert(host, tx.clone());
                tx
            }
        };

        if lane.send(url.clone()).is_ok() {
            self.outstanding += 1;
            self.stats.dispatched += 1;
        }
    }

    fn complete(&mut self, url: Url, outcome: LinkOutcome) {
        self.outstanding = self.outstanding.saturating_sub(1);

        let occurrences = match self.targets.get_mut(&url) {
            Some(target) => {
                target.state = TargetState::Done;
                target.occurrences.clone()
            }
            None => Vec::new(),
        };

        let verdict = LinkVerdict {
            url,
            outcome,
            occurrences,
        };

        self.observer.on_verdict(&verdict);
        if verdict.outcome.is_broken() {
            self.observer.on_broken_link(&verdict);
        }

        let _ = self.verdicts.send(verdict);
    }

    async fn shutdown(mut self) -> ValidationStats {
        // Closing the job channels lets every lane return its summary
        self.lanes.clear();

        while let Some(joined) = self.lane_tasks.join_next().await {
            match joined {
                Ok(summary) => {
                    tracing::debug!(
                        "Lane {} finished: {} URLs checked, {} requests",
                        summary.host,
                        summary.checks,
                        summary.requests
                    );
                    self.stats.hosts += 1;
                    self.stats.requests += summary.requests;
                    if summary.dns_failed {
                        self.stats.dns_failed_hosts.push(summary.host);
                    } else if summary.circuit_open {
                        self.stats.open_circuits.push(summary.host);
                    }
                }
                Err(e) => tracing::error!("Validator lane failed: {}", e),
            }
        }

        // Checks that settled while the lanes were stopping
        while let Ok((url, outcome)) = self.results_rx.try_recv() {
            self.complete(url, outcome);
        }

        self.stats.dns_failed_hosts.sort();
        self.stats.open_circuits.sort();

        tracing::info!(
            "Validation finished: {} targets, {} checked, {} requests across {} hosts",
            self.stats.targets,
            self.stats.dispatched,
            self.stats.requests,
            self.stats.hosts
        );

        self.stats
    }
}
