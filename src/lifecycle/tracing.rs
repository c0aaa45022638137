//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the process-wide subscriber. The supervisor, the
//! dispatcher and every worker call it once at startup, so all of them share the
//! same compact format and honour the same `RUST_LOG` filter (defaulting to
//! `info`).
//!
//! ## Usage Examples
//!
//! ```bash
//! # Compact logs (default)
//! cargo run
//!
//! # Show request routing and forwarded statuses
//! RUST_LOG=debug cargo run
//!
//! # Quiet the dispatcher, keep worker detail
//! RUST_LOG=warn,resource_cluster::http=debug cargo run
//! ```
//!
//! ## What Gets Traced
//!
//! - **Worker lifecycle**: spawn, ready, exit status, restarts with their delay
//! - **Repository operations**: `Created`, `Updated`, `Deleted` with entity type and store size
//! - **Dispatch**: the chosen worker at `debug`, upstream failures at `warn`
//!
//! Worker processes run inside a `worker` span carrying `id` and `port`, so a
//! line such as
//!
//! ```text
//! INFO worker{id=2 port=4002}: Created entity_type="Resource" size=1
//! ```
//!
//! tells at a glance which private store the resource went into.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_FILTER: &str = "info";

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false) // entity_type and the worker span say where a line came from
        .compact()
        .init();
}
