//! Selector resolution: from requested names to the ordered target list.
//!
//! Resolution is a pure read over the finalized topology: every call
//! derives a fresh target list, so a retry after an interrupted run
//! re-resolves to the same set as long as the configuration is unchanged.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::ResolveError;
use crate::graph::{Node, Role, Topology};
use crate::ignore::IgnoreSet;

/// Sentinel selector meaning every declared node.
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Treat an empty result as an error instead of a valid "nothing to do".
    pub require_nonempty: bool,
}

/// One node with its final merged connection parameters, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub name: String,
    /// Connection address; the node name when no `ipaddress:` was given.
    pub address: String,
    /// Display hostname; the address when no `hostname:` was given.
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_id: Option<std::path::PathBuf>,
    /// False for `rsync:no` nodes: still dispatched commands, never files.
    pub rsync: bool,
    pub role: Role,
    pub groups: Vec<String>,
}

/// Compute the ordered, deduplicated target list for a selector set.
///
/// Selectors are group names, node names or [`ALL`]; an empty list means
/// the configuration default, which is `all`. First-seen order across
/// selectors is preserved so display and dispatch order is reproducible.
/// Ignored nodes are dropped, and the master is dropped unless it was
/// individually named as a selector (the master does not sync to itself).
pub fn resolve(
    topology: &Topology,
    ignores: &IgnoreSet,
    selectors: &[String],
    opts: ResolveOptions,
) -> Result<Vec<ResolvedTarget>, ResolveError> {
    let default = [ALL.to_string()];
    let selectors = if selectors.is_empty() {
        &default[..]
    } else {
        selectors
    };

    let mut order: Vec<&Node> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut explicit: HashSet<&str> = HashSet::new();
    for selector in selectors {
        if selector == ALL {
            for node in topology.nodes() {
                if seen.insert(&node.name) {
                    order.push(node);
                }
            }
        } else if let Some(members) = topology.group_members(selector) {
            for member in members {
                if let Some(node) = topology.node(member) {
                    if seen.insert(&node.name) {
                        order.push(node);
                    }
                }
            }
        } else if let Some(node) = topology.node(selector) {
            explicit.insert(&node.name);
            if seen.insert(&node.name) {
                order.push(node);
            }
        } else {
            return Err(ResolveError::UnknownSelector {
                selector: selector.clone(),
            });
        }
    }

    let mut targets = Vec::new();
    for node in order {
        if ignores.is_node_ignored(node) {
            tracing::debug!(node = %node.name, "skipping ignored node");
            continue;
        }
        if node.role == Role::Master && !explicit.contains(node.name.as_str()) {
            tracing::debug!(node = %node.name, "skipping master (not individually selected)");
            continue;
        }
        targets.push(make_target(node));
    }
    if targets.is_empty() && opts.require_nonempty {
        return Err(ResolveError::EmptyResult);
    }
    Ok(targets)
}

fn make_target(node: &Node) -> ResolvedTarget {
    let address = node
        .attrs
        .address
        .clone()
        .unwrap_or_else(|| node.name.clone());
    let hostname = node
        .attrs
        .hostname
        .clone()
        .unwrap_or_else(|| address.clone());
    ResolvedTarget {
        name: node.name.clone(),
        address,
        hostname,
        host_id: node.attrs.host_id.clone(),
        rsync: node.attrs.rsync,
        role: node.role,
        groups: node.groups.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Loader;

    const EXAMPLE: &str = "\
master node1.cluster.example
node node1 login ipaddress:node1.cluster.example
node node2 login
node node[3-8] wn
node node9 wn
node node10 test
node node11 wn test
ignore_node node9
ignore_group test
";

    fn example() -> crate::parse::Config {
        let mut loader = Loader::new();
        loader.parse_str("example.conf", EXAMPLE).unwrap();
        loader.finish().unwrap()
    }

    fn names(targets: &[ResolvedTarget]) -> Vec<&str> {
        targets.iter().map(|t| t.name.as_str()).collect()
    }

    fn run(config: &crate::parse::Config, selectors: &[&str]) -> Vec<ResolvedTarget> {
        let selectors: Vec<String> = selectors.iter().map(|s| s.to_string()).collect();
        resolve(
            &config.topology,
            &config.ignores,
            &selectors,
            ResolveOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn all_excludes_master_and_ignored() {
        let config = example();
        let targets = run(&config, &["all"]);
        assert_eq!(
            names(&targets),
            ["node2", "node3", "node4", "node5", "node6", "node7", "node8"]
        );
        // no duplicates by construction
        let unique: HashSet<_> = targets.iter().map(|t| &t.name).collect();
        assert_eq!(unique.len(), targets.len());
    }

    #[test]
    fn empty_selector_list_means_all() {
        let config = example();
        assert_eq!(names(&run(&config, &[])), names(&run(&config, &["all"])));
    }

    #[test]
    fn selector_union_preserves_first_seen_order() {
        let config = example();
        let targets = run(&config, &["wn", "login"]);
        // wn members first (node9 ignored, node11 in ignored group test),
        // then login (node1 is the master, excluded)
        assert_eq!(
            names(&targets),
            ["node3", "node4", "node5", "node6", "node7", "node8", "node2"]
        );
    }

    #[test]
    fn duplicate_selectors_do_not_duplicate_nodes() {
        let config = example();
        let targets = run(&config, &["wn", "wn", "node3", "all"]);
        let unique: HashSet<_> = targets.iter().map(|t| &t.name).collect();
        assert_eq!(unique.len(), targets.len());
    }

    #[test]
    fn master_is_included_when_individually_named() {
        let config = example();
        let targets = run(&config, &["node1"]);
        assert_eq!(names(&targets), ["node1"]);
        assert_eq!(targets[0].role, Role::Master);
        // naming its group is not enough
        let targets = run(&config, &["login"]);
        assert_eq!(names(&targets), ["node2"]);
    }

    #[test]
    fn connection_attributes_merge_onto_defaults() {
        let config = example();
        let targets = run(&config, &["node1", "node2"]);
        assert_eq!(targets[0].address, "node1.cluster.example");
        assert_eq!(targets[0].hostname, "node1.cluster.example");
        assert_eq!(targets[1].address, "node2");
        assert_eq!(targets[1].hostname, "node2");
    }

    #[test]
    fn rsync_no_is_carried_into_the_target() {
        let mut loader = Loader::new();
        loader
            .parse_str("t.conf", "node n1 wn rsync:no\nnode n2 wn\n")
            .unwrap();
        let config = loader.finish().unwrap();
        let targets = run(&config, &["wn"]);
        assert!(!targets[0].rsync);
        assert!(targets[1].rsync);
    }

    #[test]
    fn unknown_selector_is_an_error() {
        let config = example();
        let err = resolve(
            &config.topology,
            &config.ignores,
            &["nonesuch".to_string()],
            ResolveOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownSelector {
                selector: "nonesuch".to_string()
            }
        );
    }

    #[test]
    fn empty_result_is_silent_unless_opted_in() {
        let config = example();
        let selectors = vec!["test".to_string()]; // whole group ignored
        let targets = resolve(
            &config.topology,
            &config.ignores,
            &selectors,
            ResolveOptions::default(),
        )
        .unwrap();
        assert!(targets.is_empty());
        let err = resolve(
            &config.topology,
            &config.ignores,
            &selectors,
            ResolveOptions {
                require_nonempty: true,
            },
        )
        .unwrap_err();
        assert_eq!(err, ResolveError::EmptyResult);
    }

    #[test]
    fn resolution_is_reproducible() {
        let config = example();
        let first = run(&config, &["wn", "login"]);
        let second = run(&config, &["wn", "login"]);
        assert_eq!(first, second);
    }

    #[test]
    fn targets_serialize_to_json() {
        let config = example();
        let targets = run(&config, &["node2"]);
        let json = serde_json::to_string(&targets).unwrap();
        assert!(json.contains("\"name\":\"node2\""));
        assert!(json.contains("\"role\":\"normal\""));
        // host_id is omitted when unset
        assert!(!json.contains("host_id"));
    }
}
