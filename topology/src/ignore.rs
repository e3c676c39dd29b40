//! Cumulative ignore rules: node names, group names and path glob patterns.
//!
//! Ignore directives add to one global set for the whole configuration,
//! included files too; a node or group ignored anywhere is ignored
//! everywhere. Path patterns use glob syntax (`*` any characters, `?` a
//! single character) and are matched against repository paths by the
//! dispatch layer.

use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::graph::{Node, Origin};

/// One compiled path pattern, keeping the original string for display and
/// for handing to rsync as an `--exclude` argument.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub original: String,
    matcher: globset::GlobMatcher,
}

impl PathPattern {
    fn compile(pattern: &str) -> Result<Self, globset::Error> {
        let glob = globset::GlobBuilder::new(pattern).build()?;
        Ok(Self {
            original: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    nodes: HashSet<String>,
    groups: HashSet<String>,
    patterns: Vec<PathPattern>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) {
        self.nodes.insert(name.into());
    }

    pub fn add_group(&mut self, name: impl Into<String>) {
        self.groups.insert(name.into());
    }

    pub fn add_pattern(&mut self, origin: &Origin, pattern: &str) -> Result<(), ConfigError> {
        let compiled = PathPattern::compile(pattern).map_err(|e| ConfigError::BadPattern {
            path: origin.path.clone(),
            line: origin.line,
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.patterns.push(compiled);
        Ok(())
    }

    /// A node is ignored when its name is ignored or when ANY of its groups
    /// is ignored, including groups inherited through compound membership.
    pub fn is_node_ignored(&self, node: &Node) -> bool {
        self.nodes.contains(&node.name) || node.groups.iter().any(|g| self.groups.contains(g))
    }

    pub fn is_path_ignored(&self, path: &Path) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }
}
