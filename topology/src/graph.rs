//! Topology accumulation and validation.
//!
//! Declarations accumulate in a [`TopologyBuilder`] in file order; nothing is
//! cross-checked until [`TopologyBuilder::finalize`], so forward references
//! (a group naming a node declared later, a node joining a group defined
//! later) are legal. Finalize validates the whole graph in one step and
//! produces an immutable [`Topology`] that resolver calls only read.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ConfigError;

/// Where a directive came from, for error reporting.
#[derive(Debug, Clone)]
pub struct Origin {
    pub path: PathBuf,
    pub line: usize,
}

impl Origin {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

/// Connection attributes a `node` line may override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttrs {
    /// Address to connect to; defaults to the logical node name.
    pub address: Option<String>,
    /// Display hostname; defaults to the address.
    pub hostname: Option<String>,
    /// Host identity file handed to ssh.
    pub host_id: Option<PathBuf>,
    /// Whether the node takes part in file sync (`rsync:no` opts out).
    pub rsync: bool,
}

impl Default for NodeAttrs {
    fn default() -> Self {
        Self {
            address: None,
            hostname: None,
            host_id: None,
            rsync: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Normal,
    Master,
    Slave,
}

/// A declared target host.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Groups declared on the node line plus, after finalize, every group
    /// that transitively contains the node, in encounter order.
    pub groups: Vec<String>,
    pub attrs: NodeAttrs,
    pub role: Role,
}

#[derive(Debug, Clone)]
struct GroupDef {
    name: String,
    /// Member references from `group` directives: node or group names,
    /// resolved lazily at finalize.
    members: Vec<String>,
}

/// Accumulates node/group/role declarations until [`finalize`] validates
/// them. Node and group names share one namespace.
///
/// [`finalize`]: TopologyBuilder::finalize
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    groups: Vec<GroupDef>,
    group_index: HashMap<String, usize>,
    master: Option<String>,
    slaves: Vec<String>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with its declared groups and attributes. The groups
    /// are registered as a side effect, so a bare node line is enough to
    /// bring a group into existence.
    pub fn declare_node(
        &mut self,
        origin: &Origin,
        name: &str,
        groups: Vec<String>,
        attrs: NodeAttrs,
    ) -> Result<(), ConfigError> {
        if self.node_index.contains_key(name) {
            return Err(ConfigError::DuplicateNode {
                path: origin.path.clone(),
                line: origin.line,
                name: name.to_string(),
            });
        }
        if self.group_index.contains_key(name) {
            return Err(ConfigError::NameConflict {
                path: origin.path.clone(),
                line: origin.line,
                name: name.to_string(),
                existing: "group",
            });
        }
        if groups.is_empty() {
            return Err(ConfigError::MissingGroup {
                path: origin.path.clone(),
                line: origin.line,
                name: name.to_string(),
            });
        }
        for group in &groups {
            self.touch_group(origin, group)?;
        }
        self.node_index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            groups,
            attrs,
            role: Role::Normal,
        });
        Ok(())
    }

    /// Define a group or extend an existing one with more members.
    pub fn declare_group(
        &mut self,
        origin: &Origin,
        name: &str,
        members: Vec<String>,
    ) -> Result<(), ConfigError> {
        self.touch_group(origin, name)?;
        let idx = self.group_index[name];
        self.groups[idx].members.extend(members);
        Ok(())
    }

    /// Declare the sole master node by its connection address (or name).
    pub fn set_master(&mut self, origin: &Origin, addr: &str) -> Result<(), ConfigError> {
        if let Some(existing) = &self.master {
            return Err(ConfigError::DuplicateMaster {
                path: origin.path.clone(),
                line: origin.line,
                existing: existing.clone(),
            });
        }
        self.master = Some(addr.to_string());
        Ok(())
    }

    /// Mark a node as a full-repository-copy slave; resolved at finalize.
    pub fn add_slave(&mut self, name: &str) {
        self.slaves.push(name.to_string());
    }

    fn touch_group(&mut self, origin: &Origin, name: &str) -> Result<(), ConfigError> {
        if self.node_index.contains_key(name) {
            return Err(ConfigError::NameConflict {
                path: origin.path.clone(),
                line: origin.line,
                name: name.to_string(),
                existing: "node",
            });
        }
        if !self.group_index.contains_key(name) {
            self.group_index.insert(name.to_string(), self.groups.len());
            self.groups.push(GroupDef {
                name: name.to_string(),
                members: Vec::new(),
            });
        }
        Ok(())
    }

    /// Validate the accumulated declarations and produce the immutable
    /// topology. All-or-nothing: on any error no topology exists at all.
    pub fn finalize(mut self) -> Result<Topology, ConfigError> {
        self.check_cycles()?;
        let flattened = self.flatten_groups();

        // full group-set per node: declared groups first, then every group
        // that transitively contains the node, in group encounter order
        for (gi, members) in flattened.iter().enumerate() {
            let group = self.groups[gi].name.clone();
            for member in members {
                let node = &mut self.nodes[self.node_index[member]];
                if !node.groups.contains(&group) {
                    node.groups.push(group.clone());
                }
            }
        }

        if let Some(addr) = &self.master {
            let found = self
                .nodes
                .iter()
                .position(|n| n.attrs.address.as_deref() == Some(addr))
                .or_else(|| self.node_index.get(addr).copied());
            match found {
                Some(idx) => self.nodes[idx].role = Role::Master,
                None => {
                    return Err(ConfigError::UnknownMaster { addr: addr.clone() });
                }
            }
        }
        for name in &self.slaves {
            let Some(&idx) = self.node_index.get(name) else {
                return Err(ConfigError::UnknownSlave { name: name.clone() });
            };
            if self.nodes[idx].role == Role::Master {
                return Err(ConfigError::RoleConflict { name: name.clone() });
            }
            self.nodes[idx].role = Role::Slave;
        }

        let groups = self
            .groups
            .iter()
            .zip(flattened)
            .map(|(def, members)| (def.name.clone(), members))
            .collect();
        Ok(Topology {
            nodes: self.nodes,
            node_index: self.node_index,
            group_index: self.group_index,
            groups,
        })
    }

    /// Depth-first cycle check over group membership, with visiting/visited
    /// marks. Members that are neither nodes nor groups fail here too.
    fn check_cycles(&self) -> Result<(), ConfigError> {
        let mut marks = vec![Mark::White; self.groups.len()];
        let mut stack = Vec::new();
        for start in 0..self.groups.len() {
            self.visit(start, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        idx: usize,
        marks: &mut [Mark],
        stack: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        let name = &self.groups[idx].name;
        match marks[idx] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                let start = stack.iter().position(|g| g == name).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].to_vec();
                cycle.push(name.clone());
                return Err(ConfigError::CyclicGroup { cycle });
            }
            Mark::White => {}
        }
        marks[idx] = Mark::Visiting;
        stack.push(name.clone());
        for member in &self.groups[idx].members {
            if let Some(&sub) = self.group_index.get(member) {
                self.visit(sub, marks, stack)?;
            } else if !self.node_index.contains_key(member) {
                return Err(ConfigError::UndefinedMember {
                    group: name.clone(),
                    member: member.clone(),
                });
            }
        }
        stack.pop();
        marks[idx] = Mark::Done;
        Ok(())
    }

    /// Flatten every group to its transitive node list: directive members
    /// expanded depth-first in directive order, then nodes that declared the
    /// group directly, deduplicated on first occurrence.
    fn flatten_groups(&self) -> Vec<Vec<String>> {
        let mut memo: Vec<Option<Vec<String>>> = vec![None; self.groups.len()];
        for gi in 0..self.groups.len() {
            self.flatten(gi, &mut memo);
        }
        memo.into_iter().map(|m| m.unwrap_or_default()).collect()
    }

    fn flatten(&self, gi: usize, memo: &mut [Option<Vec<String>>]) -> Vec<String> {
        if let Some(done) = &memo[gi] {
            return done.clone();
        }
        let mut members = Vec::new();
        let mut push = |name: &str, members: &mut Vec<String>| {
            if !members.iter().any(|m| m == name) {
                members.push(name.to_string());
            }
        };
        for member in &self.groups[gi].members {
            if let Some(&sub) = self.group_index.get(member) {
                for node in self.flatten(sub, memo) {
                    push(&node, &mut members);
                }
            } else {
                push(member, &mut members);
            }
        }
        let group = &self.groups[gi].name;
        for node in &self.nodes {
            if node.groups.contains(group) {
                push(&node.name, &mut members);
            }
        }
        memo[gi] = Some(members.clone());
        members
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Visiting,
    Done,
}

/// The validated, read-only topology produced by one configuration load.
#[derive(Debug)]
pub struct Topology {
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    /// Flattened group membership, in group encounter order.
    groups: Vec<(String, Vec<String>)>,
    group_index: HashMap<String, usize>,
}

impl Topology {
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|&idx| &self.nodes[idx])
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.group_index.contains_key(name)
    }

    /// Transitive member node names of a group, first-seen order.
    pub fn group_members(&self, name: &str) -> Option<&[String]> {
        self.group_index
            .get(name)
            .map(|&idx| self.groups[idx].1.as_slice())
    }

    pub fn master(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.role == Role::Master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Origin {
        Origin::new("test.conf", 1)
    }

    fn node(builder: &mut TopologyBuilder, name: &str, groups: &[&str]) {
        builder
            .declare_node(
                &origin(),
                name,
                groups.iter().map(|g| g.to_string()).collect(),
                NodeAttrs::default(),
            )
            .unwrap();
    }

    fn group(builder: &mut TopologyBuilder, name: &str, members: &[&str]) {
        builder
            .declare_group(
                &origin(),
                name,
                members.iter().map(|m| m.to_string()).collect(),
            )
            .unwrap();
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut builder = TopologyBuilder::new();
        node(&mut builder, "n1", &["wn"]);
        let err = builder
            .declare_node(&origin(), "n1", vec!["wn".to_string()], NodeAttrs::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateNode { name, .. } if name == "n1"));
    }

    #[test]
    fn node_group_name_conflict_both_orders() {
        let mut builder = TopologyBuilder::new();
        node(&mut builder, "n1", &["wn"]);
        let err = builder
            .declare_group(&origin(), "n1", vec!["wn".to_string()])
            .unwrap_err();
        assert!(matches!(err, ConfigError::NameConflict { existing: "node", .. }));

        let mut builder = TopologyBuilder::new();
        group(&mut builder, "wn", &["n1"]);
        let err = builder
            .declare_node(&origin(), "wn", vec!["x".to_string()], NodeAttrs::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::NameConflict { existing: "group", .. }));
    }

    #[test]
    fn node_without_groups_is_rejected() {
        let mut builder = TopologyBuilder::new();
        let err = builder
            .declare_node(&origin(), "n1", vec![], NodeAttrs::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingGroup { .. }));
    }

    #[test]
    fn two_group_cycle_names_both_groups() {
        let mut builder = TopologyBuilder::new();
        group(&mut builder, "a", &["b"]);
        group(&mut builder, "b", &["a"]);
        let err = builder.finalize().unwrap_err();
        match err {
            ConfigError::CyclicGroup { cycle } => {
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("expected CyclicGroup, got {other}"),
        }
    }

    #[test]
    fn self_cycle_is_detected() {
        let mut builder = TopologyBuilder::new();
        group(&mut builder, "a", &["a"]);
        assert!(matches!(
            builder.finalize().unwrap_err(),
            ConfigError::CyclicGroup { .. }
        ));
    }

    #[test]
    fn undefined_member_is_rejected_at_finalize() {
        let mut builder = TopologyBuilder::new();
        group(&mut builder, "a", &["ghost"]);
        let err = builder.finalize().unwrap_err();
        assert!(
            matches!(err, ConfigError::UndefinedMember { group, member }
                if group == "a" && member == "ghost")
        );
    }

    #[test]
    fn forward_references_are_legal() {
        let mut builder = TopologyBuilder::new();
        group(&mut builder, "batch", &["wn", "n9"]);
        node(&mut builder, "n1", &["wn"]);
        node(&mut builder, "n9", &["io"]);
        let topology = builder.finalize().unwrap();
        assert_eq!(topology.group_members("batch").unwrap(), ["n1", "n9"]);
    }

    #[test]
    fn compound_groups_flatten_in_directive_order() {
        let mut builder = TopologyBuilder::new();
        node(&mut builder, "n1", &["wn"]);
        node(&mut builder, "n2", &["wn"]);
        node(&mut builder, "n3", &["io"]);
        group(&mut builder, "cluster", &["io", "wn", "n1"]);
        let topology = builder.finalize().unwrap();
        // io expands first, then wn; n1 is already present
        assert_eq!(
            topology.group_members("cluster").unwrap(),
            ["n3", "n1", "n2"]
        );
        // membership in the compound group reflects back onto the nodes
        assert!(
            topology
                .node("n3")
                .unwrap()
                .groups
                .contains(&"cluster".to_string())
        );
    }

    #[test]
    fn master_is_matched_by_address_then_name() {
        let mut builder = TopologyBuilder::new();
        builder
            .declare_node(
                &origin(),
                "n1",
                vec!["login".to_string()],
                NodeAttrs {
                    address: Some("n1.cluster.example".to_string()),
                    ..NodeAttrs::default()
                },
            )
            .unwrap();
        node(&mut builder, "n2", &["wn"]);
        builder.set_master(&origin(), "n1.cluster.example").unwrap();
        let topology = builder.finalize().unwrap();
        assert_eq!(topology.master().unwrap().name, "n1");
    }

    #[test]
    fn second_master_is_rejected() {
        let mut builder = TopologyBuilder::new();
        builder.set_master(&origin(), "n1").unwrap();
        assert!(matches!(
            builder.set_master(&origin(), "n2").unwrap_err(),
            ConfigError::DuplicateMaster { existing, .. } if existing == "n1"
        ));
    }

    #[test]
    fn unmatched_master_fails_finalize() {
        let mut builder = TopologyBuilder::new();
        node(&mut builder, "n1", &["wn"]);
        builder.set_master(&origin(), "ghost").unwrap();
        assert!(matches!(
            builder.finalize().unwrap_err(),
            ConfigError::UnknownMaster { addr } if addr == "ghost"
        ));
    }

    #[test]
    fn slave_roles_are_applied() {
        let mut builder = TopologyBuilder::new();
        node(&mut builder, "n1", &["wn"]);
        node(&mut builder, "n2", &["wn"]);
        builder.add_slave("n2");
        let topology = builder.finalize().unwrap();
        assert_eq!(topology.node("n1").unwrap().role, Role::Normal);
        assert_eq!(topology.node("n2").unwrap().role, Role::Slave);
    }

    #[test]
    fn master_listed_as_slave_is_rejected() {
        let mut builder = TopologyBuilder::new();
        node(&mut builder, "n1", &["wn"]);
        builder.set_master(&origin(), "n1").unwrap();
        builder.add_slave("n1");
        assert!(matches!(
            builder.finalize().unwrap_err(),
            ConfigError::RoleConflict { name } if name == "n1"
        ));
    }

    #[test]
    fn unknown_slave_fails_finalize() {
        let mut builder = TopologyBuilder::new();
        node(&mut builder, "n1", &["wn"]);
        builder.add_slave("ghost");
        assert!(matches!(
            builder.finalize().unwrap_err(),
            ConfigError::UnknownSlave { name } if name == "ghost"
        ));
    }
}
