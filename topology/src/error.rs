use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a configuration load.
///
/// Topology construction is all-or-nothing: the first error wins and no
/// partially built topology is ever exposed to a resolver call. Every
/// variant tied to a directive carries the file and line it came from.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}:{line}: unrecognized directive: {text}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("{}:{line}: {source}", path.display())]
    Range {
        path: PathBuf,
        line: usize,
        #[source]
        source: RangeError,
    },

    #[error("{}:{line}: duplicate node '{name}'", path.display())]
    DuplicateNode {
        path: PathBuf,
        line: usize,
        name: String,
    },

    #[error("{}:{line}: '{name}' is already declared as a {existing}", path.display())]
    NameConflict {
        path: PathBuf,
        line: usize,
        name: String,
        existing: &'static str,
    },

    #[error("{}:{line}: node '{name}' must be in at least one group", path.display())]
    MissingGroup {
        path: PathBuf,
        line: usize,
        name: String,
    },

    #[error("cyclic group definition: {}", cycle.join(" -> "))]
    CyclicGroup { cycle: Vec<String> },

    #[error("group '{group}' references undefined member '{member}'")]
    UndefinedMember { group: String, member: String },

    #[error("{}:{line}: master already declared as '{existing}'", path.display())]
    DuplicateMaster {
        path: PathBuf,
        line: usize,
        existing: String,
    },

    #[error("master '{addr}' does not match any node")]
    UnknownMaster { addr: String },

    #[error("slave '{name}' is not a declared node")]
    UnknownSlave { name: String },

    #[error("node '{name}' cannot be both master and slave")]
    RoleConflict { name: String },

    #[error("{}:{line}: invalid value '{value}' for option '{name}': {reason}", path.display())]
    InvalidOption {
        path: PathBuf,
        line: usize,
        name: String,
        value: String,
        reason: String,
    },

    #[error("{}:{line}: bad ignore pattern '{pattern}': {reason}", path.display())]
    BadPattern {
        path: PathBuf,
        line: usize,
        pattern: String,
        reason: String,
    },

    #[error("{}:{line}: include depth limit exceeded", path.display())]
    IncludeDepth { path: PathBuf, line: usize },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors in a bracketed numeric range token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range expression in '{token}'")]
    Malformed { token: String },

    #[error("inverted range [{low}-{high}] in '{token}'")]
    Inverted { token: String, low: u64, high: u64 },

    #[error("ambiguous zero padding in '{token}'")]
    AmbiguousPadding { token: String },

    #[error("multiple range expressions in '{token}'")]
    MultipleRanges { token: String },
}

/// Per-request resolution errors.
///
/// These never invalidate the loaded topology; the caller may retry with a
/// corrected selector list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown node or group '{selector}'")]
    UnknownSelector { selector: String },

    #[error("no target nodes selected")]
    EmptyResult,
}
