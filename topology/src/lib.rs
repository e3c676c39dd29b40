//! Cluster topology configuration for the csync tools.
//!
//! A configuration is a line-oriented text file declaring nodes, groups and
//! ignore rules. This crate parses it, validates the resulting membership
//! graph in one all-or-nothing step, and resolves selector lists (node names,
//! group names or `all`) into the ordered, deduplicated target set every
//! csync operation runs against.
//!
//! # Configuration format
//!
//! ```text
//! # comments run to end of line, blank lines are skipped
//! master node1.cluster.example
//! group batch wn io
//! node node1 login ipaddress:node1.cluster.example
//! node node[003-010] wn ipaddress:10.1.0.[13]
//! node node11 io rsync:no
//! ignore_node node9
//! ignore_group test
//! ignore *.swp
//! include local.conf
//! num_proc 8
//! ```
//!
//! # Example
//!
//! ```
//! use topology::{resolve, Loader, ResolveOptions};
//!
//! let mut loader = Loader::new();
//! loader
//!     .parse_str(
//!         "demo.conf",
//!         "node node1 login\n\
//!          node node2 wn\n\
//!          node node3 wn\n",
//!     )
//!     .unwrap();
//! let config = loader.finish().unwrap();
//! let targets = resolve(
//!     &config.topology,
//!     &config.ignores,
//!     &["wn".to_string()],
//!     ResolveOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(targets.len(), 2);
//! assert_eq!(targets[0].name, "node2");
//! ```

pub mod error;
pub mod graph;
pub mod ignore;
pub mod options;
pub mod parse;
pub mod range;
pub mod resolve;

pub use error::{ConfigError, RangeError, ResolveError};
pub use graph::{Node, NodeAttrs, Origin, Role, Topology, TopologyBuilder};
pub use ignore::IgnoreSet;
pub use options::{Options, PackageManager};
pub use parse::{Config, Loader};
pub use resolve::{ALL, ResolveOptions, ResolvedTarget, resolve};
