//! Cluster file distribution tool - `csync`.
//!
//! `csync` keeps a cluster of machines in sync from one master copy. A
//! declarative configuration describes the nodes, their group memberships
//! and their connection parameters; every operation resolves a selector
//! list (group names, node names or `all`) against that topology and runs
//! one job per resolved node:
//!
//! ```bash
//! # Which nodes does a selector resolve to?
//! csync --config cluster.conf wn login
//!
//! # Run a command everywhere (the master is excluded by default)
//! csync -c 'uptime' --aggregate
//!
//! # Push a path to the rsync-eligible nodes of one group
//! csync --sync /etc/ntp.conf wn
//! ```
//!
//! Topology parsing and resolution live in the `topology` crate; this crate
//! is the dispatch side: bounded parallel fan-out of ssh/rsync jobs with
//! per-node failure isolation, plus output aggregation.

pub mod aggregate;
pub mod dispatch;

use tracing_subscriber::EnvFilter;

/// Initialize logging for the tool.
///
/// `-v` count maps to a level: 0=ERROR, 1=INFO, 2=DEBUG, 3+=TRACE; quiet
/// turns logging off entirely. `RUST_LOG` wins when set. Logs go to stderr
/// so job output on stdout stays pipeable.
pub fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "off"
    } else {
        match verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
