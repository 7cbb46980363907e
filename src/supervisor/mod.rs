//! The node supervision loop.
//!
//! [`NodeSupervisor`] is the composition root. It repeats one cycle until
//! cancelled:
//!
//! 1. read credentials and resolve peers (fails open to a single-node config)
//! 2. render the template and write `<replica>.nats.conf`
//! 3. launch the server
//! 4. poll liveness and cancellation on the same tick
//!
//! An unplanned exit starts a new cycle after a short restart delay, so every
//! relaunch sees a fresh peer set. A cycle error (unreadable template,
//! unwritable config, failed launch) is logged and retried with exponential
//! backoff; the backoff resets once a cycle reaches monitoring.
//!
//! ## Module Structure
//!
//! - `state`: [`SupervisorPhase`], [`CycleOutcome`], [`SupervisorStats`]
//! - `credentials`: [`CredentialSource`] and environment overrides

mod credentials;
mod state;

pub use credentials::{CredentialSource, StaticCredentials, apply_env_overrides};
pub use state::{CycleOutcome, SupervisorPhase, SupervisorStats};

use crate::constants::{
    DEFAULT_CYCLE_BACKOFF_BASE_MS, DEFAULT_CYCLE_BACKOFF_MAX_MS, DEFAULT_GRACE_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_RESTART_DELAY_MS, DEFAULT_ROUTE_SCHEME,
};
use crate::discovery::{PeerResolver, ResolutionOutcome};
use crate::endpoints::{NodeEndpoints, PeerAddress, ServiceIdentity};
use crate::error::Result;
use crate::logging::{generate_cycle_id, log_cycle_complete, log_server_line};
use crate::process::{LaunchSpec, LogFollower, ProcessState, ProcessSupervisor};
use crate::reliability::Backoff;
use crate::render::{NodePaths, RenderContext, RenderedConfig, Template};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Timing and behavior of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Liveness and cancellation check interval.
    pub poll_interval: Duration,
    /// Time the server gets to stop after SIGTERM.
    pub grace_timeout: Duration,
    /// Pause between an unplanned exit and the next cycle.
    pub restart_delay: Duration,
    /// Delay between failed cycles.
    pub cycle_backoff: Backoff,
    /// Scheme of route URIs.
    pub route_scheme: String,
    /// Mirror the server log into the supervisor log.
    pub follow_log: bool,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            grace_timeout: Duration::from_millis(DEFAULT_GRACE_TIMEOUT_MS),
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
            cycle_backoff: Backoff::from_millis(
                DEFAULT_CYCLE_BACKOFF_BASE_MS,
                DEFAULT_CYCLE_BACKOFF_MAX_MS,
            ),
            route_scheme: DEFAULT_ROUTE_SCHEME.to_string(),
            follow_log: false,
        }
    }
}

/// What this node runs and where its files live.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Identity peers are registered under.
    pub service: ServiceIdentity,
    /// Per-replica file locations.
    pub paths: NodePaths,
    /// This node's endpoints.
    pub endpoints: NodeEndpoints,
    /// Configuration template, re-read every cycle.
    pub template: PathBuf,
    /// How to launch the server.
    pub launch: LaunchSpec,
}

/// Runs discover, render, launch and monitor until cancelled.
pub struct NodeSupervisor {
    node: NodeSpec,
    own_address: PeerAddress,
    resolver: PeerResolver,
    credentials: Arc<dyn CredentialSource>,
    process: ProcessSupervisor,
    settings: SupervisorSettings,
    phase: watch::Sender<SupervisorPhase>,
    stats: watch::Sender<SupervisorStats>,
}

impl std::fmt::Debug for NodeSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSupervisor")
            .field("node", &self.node)
            .field("phase", &*self.phase.borrow())
            .field("stats", &*self.stats.borrow())
            .finish_non_exhaustive()
    }
}

impl NodeSupervisor {
    /// Assemble a supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAddress`] if the node's own cluster address is
    /// not a valid `host:port`.
    pub fn new(
        node: NodeSpec,
        resolver: PeerResolver,
        credentials: Arc<dyn CredentialSource>,
        settings: SupervisorSettings,
    ) -> Result<Self> {
        let own_address = node.endpoints.cluster_address()?;
        let (phase, _) = watch::channel(SupervisorPhase::Bootstrapping);
        let (stats, _) = watch::channel(SupervisorStats::default());
        Ok(Self {
            node,
            own_address,
            resolver,
            credentials,
            process: ProcessSupervisor::new(),
            settings,
            phase,
            stats,
        })
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorPhase> {
        self.phase.subscribe()
    }

    /// Current phase.
    pub fn phase(&self) -> SupervisorPhase {
        *self.phase.borrow()
    }

    /// Snapshot of the counters and the running pid.
    pub fn stats(&self) -> SupervisorStats {
        self.stats.borrow().clone()
    }

    /// Watch counters and the running pid while [`run`](Self::run) holds the
    /// supervisor.
    pub fn subscribe_stats(&self) -> watch::Receiver<SupervisorStats> {
        self.stats.subscribe()
    }

    fn update_stats(&self, update: impl FnOnce(&mut SupervisorStats)) {
        self.stats.send_modify(update);
    }

    fn set_phase(&self, phase: SupervisorPhase) {
        tracing::debug!(phase = %phase, "Phase changed");
        self.phase.send_replace(phase);
    }

    /// Supervise until `cancel` fires, then stop the server.
    ///
    /// Never returns early on error: cycle failures are retried with backoff.
    pub async fn run(&mut self, cancel: CancellationToken) -> SupervisorStats {
        tracing::info!(
            replica = %self.node.paths.replica_id(),
            service = %self.node.service,
            cluster = %self.own_address,
            "Starting supervisor"
        );

        let mut cycle: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        while !cancel.is_cancelled() {
            cycle += 1;
            let pause = match self.run_cycle(cycle, &cancel).await {
                Ok(CycleOutcome::Cancelled) => break,
                Ok(CycleOutcome::UnplannedExit { .. }) => {
                    consecutive_failures = 0;
                    self.settings.restart_delay
                },
                Err(_) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let delay = self.settings.cycle_backoff.delay(consecutive_failures);
                    tracing::info!(
                        cycle,
                        failures = consecutive_failures,
                        backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying after backoff"
                    );
                    delay
                },
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {},
            }
        }

        self.set_phase(SupervisorPhase::ShuttingDown);
        self.process.terminate(self.settings.grace_timeout).await;
        self.update_stats(|s| s.current_pid = None);
        self.set_phase(SupervisorPhase::Stopped);

        let stats = self.stats();
        tracing::info!(
            cycles = stats.cycles_started,
            unplanned_exits = stats.unplanned_exits,
            failed_cycles = stats.failed_cycles,
            "Supervisor stopped"
        );
        stats
    }

    /// Run one full cycle inside a `cycle` span.
    ///
    /// Errors are logged here with the cycle id and counted; the caller only
    /// decides how long to wait before the next cycle.
    pub async fn run_cycle(&mut self, cycle: u64, cancel: &CancellationToken) -> Result<CycleOutcome> {
        let cycle_id = generate_cycle_id();
        let span = crate::cycle_span!(self.node.paths.replica_id(), cycle_id, cycle);
        let started = Instant::now();
        self.update_stats(|s| s.cycles_started += 1);

        let result = self.cycle(cancel).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(outcome) => log_cycle_complete(
                &cycle_id,
                outcome.label(),
                u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            ),
            Err(e) => {
                self.update_stats(|s| s.failed_cycles += 1);
                tracing::error!(error = %e, fatal = e.is_cycle_fatal(), "Cycle failed");
            },
        });
        result
    }

    async fn cycle(&mut self, cancel: &CancellationToken) -> Result<CycleOutcome> {
        self.set_phase(SupervisorPhase::Discovering);
        let credentials = self.credentials.load()?;

        let resolution = tokio::select! {
            () = cancel.cancelled() => return Ok(CycleOutcome::Cancelled),
            r = self.resolver.resolve(&self.node.service, &self.own_address) => r,
        };
        match &resolution.outcome {
            ResolutionOutcome::Resolved { attempt } => tracing::info!(
                peers = resolution.peers.len(),
                malformed = resolution.malformed,
                attempt,
                "Resolved peers"
            ),
            ResolutionOutcome::FailedOpen { .. } => {
                self.update_stats(|s| s.failed_open_discoveries += 1);
            },
        }

        self.set_phase(SupervisorPhase::Rendering);
        let template = Template::load(&self.node.template)?;
        let log_path = self.node.paths.log_file();
        let ctx = RenderContext {
            endpoints: &self.node.endpoints,
            credentials: &credentials,
            peers: &resolution.peers,
            log_path: &log_path,
            route_scheme: &self.settings.route_scheme,
        };
        let rendered = RenderedConfig::render(&template, &ctx, self.node.paths.config_file());
        rendered.write()?;
        tracing::info!(config = %rendered.path.display(), "Rendered configuration");

        self.set_phase(SupervisorPhase::Launching);
        if self.process.poll().is_running() {
            tracing::warn!("Previous server still running, stopping it before relaunch");
            self.process.terminate(self.settings.grace_timeout).await;
        }
        let handle = self.process.start(&self.node.launch)?;
        self.update_stats(|s| s.current_pid = Some(handle.pid));

        self.set_phase(SupervisorPhase::Monitoring);
        let follower = self.spawn_follower(cancel);

        let outcome = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    self.set_phase(SupervisorPhase::ShuttingDown);
                    tracing::info!(pid = handle.pid, "Shutdown requested, stopping server");
                    self.process.terminate(self.settings.grace_timeout).await;
                    break CycleOutcome::Cancelled;
                },
                () = tokio::time::sleep(self.settings.poll_interval) => {
                    if !self.process.is_alive(&handle) {
                        let code = match self.process.state() {
                            ProcessState::Exited { code, .. } => code,
                            _ => None,
                        };
                        self.update_stats(|s| s.unplanned_exits += 1);
                        tracing::warn!(pid = handle.pid, code = ?code, "Server exited unexpectedly, restarting");
                        break CycleOutcome::UnplannedExit { code };
                    }
                },
            }
        };

        self.update_stats(|s| s.current_pid = None);
        if let Some(token) = follower {
            token.cancel();
        }
        Ok(outcome)
    }

    fn spawn_follower(&self, cancel: &CancellationToken) -> Option<CancellationToken> {
        if !self.settings.follow_log {
            return None;
        }
        let token = cancel.child_token();
        let follower = LogFollower::new(self.node.paths.log_file(), self.settings.poll_interval);
        let replica = self.node.paths.replica_id().to_string();
        let follow_token = token.clone();
        tokio::spawn(async move {
            follower
                .follow(follow_token, |line| log_server_line(&replica, line))
                .await;
        });
        Some(token)
    }
}
