//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it. Worker processes inherit the supervisor's environment, and
//! the HTTP limits are also forwarded explicitly (see [`HttpArgs::to_args`]) so
//! that flags given to the supervisor reach its workers.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::dispatcher::SelectionPolicy;
use crate::http::BodyLimits;
use crate::lifecycle::{default_worker_count, RestartPolicy, SupervisorConfig, WorkerId, WorkerLaunch};

/// CRUD service for tagged, counted resources, served by a pool of worker
/// processes behind one dispatcher.
#[derive(Debug, Parser)]
#[command(name = "resource-cluster", version)]
pub struct Cli {
    /// Public port of the dispatcher (or of the single process in `serve` mode)
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    #[command(flatten)]
    pub http: HttpArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Run mode; without one the process supervises workers behind the dispatcher
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the API from this process alone, without workers
    Serve,
    /// Run one supervised worker (started by the supervisor, not by hand)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

impl Cli {
    /// Address of the public listener.
    pub fn public_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[derive(Debug, Clone, Args)]
pub struct HttpArgs {
    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    pub max_body_bytes: usize,

    /// How long a request body may take to arrive, in milliseconds
    #[arg(long, env = "BODY_TIMEOUT_MS", default_value_t = 10_000)]
    pub body_timeout_ms: u64,
}

impl HttpArgs {
    pub fn limits(&self) -> BodyLimits {
        BodyLimits {
            max_bytes: self.max_body_bytes,
            timeout: Duration::from_millis(self.body_timeout_ms),
        }
    }

    /// The same settings as command-line flags for a worker process.
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            "--max-body-bytes".into(),
            self.max_body_bytes.to_string().into(),
            "--body-timeout-ms".into(),
            self.body_timeout_ms.to_string().into(),
        ]
    }
}

#[derive(Debug, Clone, Args)]
pub struct ClusterArgs {
    /// Number of worker processes [default: available parallelism - 1, at least 1]
    #[arg(long, env = "WORKERS", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// How the dispatcher picks a worker for each request
    #[arg(long, env = "BALANCE", value_enum, default_value_t = SelectionPolicy::RoundRobin)]
    pub balance: SelectionPolicy,

    /// Relaunch workers that exit, with exponential backoff
    #[arg(long, env = "RESTART_WORKERS")]
    pub restart: bool,

    /// First restart delay, in milliseconds
    #[arg(long, env = "RESTART_BACKOFF_MS", default_value_t = 500)]
    pub restart_backoff_ms: u64,

    /// Upper bound for the restart delay, in milliseconds
    #[arg(long, env = "RESTART_BACKOFF_MAX_MS", default_value_t = 30_000)]
    pub restart_backoff_max_ms: u64,

    /// Stop relaunching a worker after this many restarts
    #[arg(long, env = "MAX_RESTARTS")]
    pub max_restarts: Option<u32>,

    /// How long a worker may take to accept connections, in milliseconds
    #[arg(long, env = "READY_TIMEOUT_MS", default_value_t = 10_000)]
    pub ready_timeout_ms: u64,
}

impl ClusterArgs {
    pub fn worker_count(&self) -> usize {
        self.workers.map(usize::from).unwrap_or_else(default_worker_count)
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        if !self.restart {
            return RestartPolicy::Never;
        }
        let initial = Duration::from_millis(self.restart_backoff_ms);
        RestartPolicy::Backoff {
            initial,
            max: Duration::from_millis(self.restart_backoff_max_ms).max(initial),
            max_restarts: self.max_restarts,
        }
    }

    pub fn supervisor_config(&self, base_port: u16, launch: WorkerLaunch) -> SupervisorConfig {
        SupervisorConfig {
            worker_count: self.worker_count(),
            base_port,
            launch,
            restart: self.restart_policy(),
            ready_timeout: Duration::from_millis(self.ready_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WorkerArgs {
    /// Loopback port to listen on
    #[arg(long, env = "WORKER_PORT")]
    pub worker_port: u16,

    /// Slot number assigned by the supervisor
    #[arg(long, env = "WORKER_ID", default_value_t = 0)]
    pub worker_id: WorkerId,
}
