//! # Process Supervisor
//!
//! Spawns the worker processes, keeps the [`WorkerRegistry`] current and logs
//! every exit.
//!
//! Each worker slot is watched by its own task:
//!
//! ```text
//! starting ──(port accepts)──▶ ready ──(exit)──▶ dead
//!     │                          │                 │
//!     └────────(exit)────────────┼────────────────▶┘
//!                                └─(shutdown)─▶ draining ─▶ dead
//!
//! dead ──(restart policy, after backoff)──▶ starting
//! ```
//!
//! With [`RestartPolicy::Never`] (the default) a dead worker stays dead and the
//! dispatcher simply stops selecting it.
//!
//! Workers never talk to each other. Each one owns a private repository, so
//! with more than one worker a resource created through one worker is not
//! visible through another.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::lifecycle::registry::{WorkerId, WorkerRegistry, WorkerState};

/// Environment variable carrying a worker's listening port.
pub const WORKER_PORT_ENV: &str = "WORKER_PORT";
/// Environment variable carrying a worker's slot number.
pub const WORKER_ID_ENV: &str = "WORKER_ID";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("worker {id} would listen beyond port 65535 (base port {base_port})")]
    PortOutOfRange { base_port: u16, id: WorkerId },
    #[error("worker monitor task failed: {0}")]
    Monitor(#[from] tokio::task::JoinError),
}

/// Whether, and how fast, a dead worker slot is relaunched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// A dead worker stays dead.
    Never,
    /// Relaunch after `initial`, doubling per consecutive failed launch up to
    /// `max`. The doubling resets once a launch reaches `ready`.
    Backoff {
        initial: Duration,
        max: Duration,
        max_restarts: Option<u32>,
    },
}

impl RestartPolicy {
    /// Delay before the next launch, or `None` when the slot must stay dead.
    ///
    /// `consecutive` counts restarts since the slot was last ready; `total`
    /// counts every restart of the slot.
    pub fn delay(&self, consecutive: u32, total: u32) -> Option<Duration> {
        match *self {
            RestartPolicy::Never => None,
            RestartPolicy::Backoff { initial, max, max_restarts } => {
                if max_restarts.is_some_and(|limit| total >= limit) {
                    return None;
                }
                let factor = 2u32.saturating_pow(consecutive);
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }
}

/// The command that starts one worker process.
///
/// The supervisor adds the slot's port and id through [`WORKER_PORT_ENV`] and
/// [`WORKER_ID_ENV`].
#[derive(Debug, Clone)]
pub struct WorkerLaunch {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerLaunch {
    fn command(&self, id: WorkerId, port: u16) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(WORKER_PORT_ENV, port.to_string())
            .env(WORKER_ID_ENV, id.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches only the supervisor,
        // which then stops the workers itself.
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub worker_count: usize,
    /// Worker `i` listens on `base_port + i`.
    pub base_port: u16,
    pub launch: WorkerLaunch,
    pub restart: RestartPolicy,
    /// How long a launch may take to accept connections before it is killed.
    pub ready_timeout: Duration,
}

/// Default worker count: available parallelism minus the dispatcher's share.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

pub struct Supervisor {
    config: Arc<SupervisorConfig>,
    registry: WorkerRegistry,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, registry: WorkerRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    /// Registers every slot and launches its worker.
    pub fn start(self) -> Result<SupervisorHandle, SupervisorError> {
        let Self { config, registry } = self;

        let mut slots = Vec::with_capacity(config.worker_count);
        for id in 1..=config.worker_count {
            let port = u16::try_from(id)
                .ok()
                .and_then(|offset| config.base_port.checked_add(offset))
                .ok_or(SupervisorError::PortOutOfRange { base_port: config.base_port, id })?;
            slots.push((id, port));
        }

        info!(workers = config.worker_count, restart = ?config.restart, "Starting workers");
        if config.worker_count > 1 {
            warn!(
                workers = config.worker_count,
                "Each worker keeps its own resources; clients must stick to one worker or run a single worker"
            );
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handles = slots
            .into_iter()
            .map(|(id, port)| {
                registry.register(id, port);
                tokio::spawn(supervise_slot(
                    id,
                    port,
                    config.clone(),
                    registry.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        Ok(SupervisorHandle {
            registry,
            shutdown,
            handles,
        })
    }
}

/// Running supervisor. Dropping it without [`SupervisorHandle::shutdown`]
/// still kills the children, since they are spawned with kill-on-drop.
pub struct SupervisorHandle {
    registry: WorkerRegistry,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl SupervisorHandle {
    pub fn registry(&self) -> WorkerRegistry {
        self.registry.clone()
    }

    /// Drains and kills every worker, then waits for the monitor tasks.
    pub async fn shutdown(self) -> Result<(), SupervisorError> {
        info!("Stopping workers...");
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            handle.await?;
        }
        info!("All workers stopped");
        Ok(())
    }
}

enum LaunchOutcome {
    /// The process ended on its own (or failed to start).
    Exited { was_ready: bool },
    /// The supervisor is shutting down.
    Stopped,
}

async fn supervise_slot(
    id: WorkerId,
    port: u16,
    config: Arc<SupervisorConfig>,
    registry: WorkerRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut consecutive = 0u32;
    loop {
        if *shutdown.borrow() {
            registry.transition(id, WorkerState::Dead);
            return;
        }
        registry.transition(id, WorkerState::Starting);

        let outcome = if port_accepts(port).await {
            error!(worker = id, port, "Port already in use; worker not launched");
            registry.set_pid(id, None);
            registry.transition(id, WorkerState::Dead);
            LaunchOutcome::Exited { was_ready: false }
        } else {
            launch(id, port, &config, &registry, &mut shutdown).await
        };

        match outcome {
            LaunchOutcome::Stopped => return,
            LaunchOutcome::Exited { was_ready: true } => consecutive = 0,
            LaunchOutcome::Exited { was_ready: false } => {}
        }

        if *shutdown.borrow() {
            registry.transition(id, WorkerState::Dead);
            return;
        }

        let total = registry.get(id).map(|w| w.restarts).unwrap_or(0);
        let Some(delay) = config.restart.delay(consecutive, total) else {
            info!(worker = id, restarts = total, "Worker will not be restarted");
            return;
        };

        info!(worker = id, delay_ms = delay.as_millis() as u64, "Restarting worker after backoff");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                return;
            }
        }
        consecutive = consecutive.saturating_add(1);
        registry.record_restart(id);
    }
}

async fn launch(
    id: WorkerId,
    port: u16,
    config: &SupervisorConfig,
    registry: &WorkerRegistry,
    shutdown: &mut watch::Receiver<bool>,
) -> LaunchOutcome {
    match config.launch.command(id, port).spawn() {
        Ok(child) => run_child(id, port, child, registry, shutdown, config.ready_timeout).await,
        Err(e) => {
            error!(worker = id, program = %config.launch.program.display(), error = %e, "Failed to spawn worker");
            registry.set_pid(id, None);
            registry.transition(id, WorkerState::Dead);
            LaunchOutcome::Exited { was_ready: false }
        }
    }
}

async fn run_child(
    id: WorkerId,
    port: u16,
    mut child: Child,
    registry: &WorkerRegistry,
    shutdown: &mut watch::Receiver<bool>,
    ready_timeout: Duration,
) -> LaunchOutcome {
    let pid = child.id();
    registry.set_pid(id, pid);
    info!(worker = id, port, pid, "Worker spawned");

    let probe = wait_until_listening(port, ready_timeout);
    tokio::pin!(probe);
    let mut probing = true;
    let mut ready = false;

    loop {
        tokio::select! {
            status = child.wait() => {
                registry.transition(id, WorkerState::Dead);
                match status {
                    Ok(status) => warn!(worker = id, pid, %status, "Worker exited"),
                    Err(e) => error!(worker = id, pid, error = %e, "Failed to wait for worker"),
                }
                return LaunchOutcome::Exited { was_ready: ready };
            }
            listening = &mut probe, if probing => {
                probing = false;
                // Someone else may hold the port; only a child that is still
                // running can be the one answering.
                let alive = matches!(child.try_wait(), Ok(None));
                if listening && alive {
                    ready = true;
                    registry.transition(id, WorkerState::Ready);
                    info!(worker = id, port, pid, "Worker ready");
                } else if !alive {
                    debug!(worker = id, port, pid, "Worker exited while its port was probed");
                } else {
                    warn!(worker = id, port, pid, timeout_ms = ready_timeout.as_millis() as u64, "Worker did not become ready; killing it");
                    if let Err(e) = child.start_kill() {
                        error!(worker = id, pid, error = %e, "Failed to kill worker");
                    }
                }
            }
            _ = shutdown.changed() => {
                registry.transition(id, WorkerState::Draining);
                info!(worker = id, pid, "Stopping worker");
                if let Err(e) = child.kill().await {
                    warn!(worker = id, pid, error = %e, "Failed to kill worker");
                }
                registry.transition(id, WorkerState::Dead);
                return LaunchOutcome::Stopped;
            }
        }
    }
}

async fn port_accepts(port: u16) -> bool {
    TcpStream::connect(SocketAddr::from(([127, 0, 0, 1], port))).await.is_ok()
}

/// Polls the worker's loopback port until it accepts a connection.
async fn wait_until_listening(port: u16, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if port_accepts(port).await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}
