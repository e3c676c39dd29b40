//! Line-oriented configuration parsing.
//!
//! One [`Loader`] threads the whole accumulation state (topology builder,
//! option registry, ignore set) through a file and its `include`s; there is
//! no global state. Directives are applied in file order, with included
//! files interleaved at the point of the `include` directive. Validation
//! that needs the whole picture (cycles, master uniqueness, undefined
//! members) happens once in [`Loader::finish`].

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, RangeError};
use crate::graph::{NodeAttrs, Origin, Topology, TopologyBuilder};
use crate::ignore::IgnoreSet;
use crate::options::Options;
use crate::range::RangePattern;

const MAX_INCLUDE_DEPTH: usize = 16;

/// A fully loaded and validated configuration.
#[derive(Debug)]
pub struct Config {
    pub topology: Topology,
    pub options: Options,
    pub ignores: IgnoreSet,
}

impl Config {
    /// Load and validate a configuration file, following `include`s.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Loader::load(path)
    }
}

/// Accumulates directives across a file and its includes, then validates
/// everything in one finalize step so forward references stay legal.
#[derive(Debug, Default)]
pub struct Loader {
    builder: TopologyBuilder,
    options: Options,
    ignores: IgnoreSet,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut loader = Self::new();
        loader.parse_file(path, 0)?;
        loader.finish()
    }

    /// Parse configuration text that did not come from a file; `origin` is
    /// the name used in error messages. `include` paths are resolved
    /// relative to the current directory.
    pub fn parse_str(&mut self, origin: &str, text: &str) -> Result<(), ConfigError> {
        self.parse_text(Path::new(origin), None, text, 0)
    }

    /// Finalize: cycle detection, role resolution and the rest of the
    /// whole-topology checks. Consumes the loader.
    pub fn finish(self) -> Result<Config, ConfigError> {
        let topology = self.builder.finalize()?;
        Ok(Config {
            topology,
            options: self.options,
            ignores: self.ignores,
        })
    }

    fn parse_file(&mut self, path: &Path, depth: usize) -> Result<(), ConfigError> {
        tracing::debug!(path = %path.display(), "reading configuration");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_text(path, path.parent(), &text, depth)
    }

    fn parse_text(
        &mut self,
        path: &Path,
        base: Option<&Path>,
        text: &str,
        depth: usize,
    ) -> Result<(), ConfigError> {
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let origin = Origin::new(path, idx + 1);
            self.parse_line(&origin, base, line, depth)?;
        }
        Ok(())
    }

    fn parse_line(
        &mut self,
        origin: &Origin,
        base: Option<&Path>,
        line: &str,
        depth: usize,
    ) -> Result<(), ConfigError> {
        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };
        let syntax = || ConfigError::Syntax {
            path: origin.path.clone(),
            line: origin.line,
            text: line.to_string(),
        };
        match keyword {
            "master" => {
                let mut args = rest.split_whitespace();
                let addr = args.next().ok_or_else(syntax)?;
                if args.next().is_some() {
                    return Err(syntax());
                }
                self.builder.set_master(origin, addr)?;
            }
            "slave" => {
                if rest.is_empty() {
                    return Err(syntax());
                }
                for token in rest.split_whitespace() {
                    for name in expand_names(origin, token)? {
                        self.builder.add_slave(&name);
                    }
                }
            }
            "group" => {
                let mut args = rest.split_whitespace();
                let name = args.next().ok_or_else(syntax)?;
                if name.contains('[') || name.contains(']') {
                    return Err(syntax());
                }
                let mut members = Vec::new();
                for token in args {
                    members.extend(expand_names(origin, token)?);
                }
                if members.is_empty() {
                    return Err(syntax());
                }
                self.builder.declare_group(origin, name, members)?;
            }
            "node" => self.parse_node(origin, rest, &syntax)?,
            "ignore_node" => {
                if rest.is_empty() {
                    return Err(syntax());
                }
                for token in rest.split_whitespace() {
                    for name in expand_names(origin, token)? {
                        self.ignores.add_node(name);
                    }
                }
            }
            "ignore_group" => {
                if rest.is_empty() {
                    return Err(syntax());
                }
                for token in rest.split_whitespace() {
                    self.ignores.add_group(token);
                }
            }
            "ignore" => {
                if rest.is_empty() {
                    return Err(syntax());
                }
                for token in rest.split_whitespace() {
                    self.ignores.add_pattern(origin, token)?;
                }
            }
            "include" => {
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(ConfigError::IncludeDepth {
                        path: origin.path.clone(),
                        line: origin.line,
                    });
                }
                let mut args = rest.split_whitespace();
                let name = args.next().ok_or_else(syntax)?;
                if args.next().is_some() {
                    return Err(syntax());
                }
                let target = match base {
                    Some(base) => base.join(name),
                    None => PathBuf::from(name),
                };
                tracing::debug!(from = %origin.path.display(), to = %target.display(), "include");
                self.parse_file(&target, depth + 1)?;
            }
            _ => {
                // scalar option, or an unrecognized directive
                if rest.is_empty() || !self.options.set(origin, keyword, rest)? {
                    return Err(syntax());
                }
            }
        }
        Ok(())
    }

    fn parse_node(
        &mut self,
        origin: &Origin,
        rest: &str,
        syntax: &dyn Fn() -> ConfigError,
    ) -> Result<(), ConfigError> {
        let mut tokens = rest.split_whitespace();
        let name_token = tokens.next().ok_or_else(syntax)?;
        let mut groups = Vec::new();
        let mut attrs = NodeAttrs::default();
        let mut addr_template: Option<String> = None;
        for token in tokens {
            if let Some((key, value)) = token.split_once(':') {
                if value.is_empty() {
                    return Err(syntax());
                }
                match key {
                    "ipaddress" => addr_template = Some(value.to_string()),
                    "hostname" => attrs.hostname = Some(value.to_string()),
                    "hostid" => attrs.host_id = Some(PathBuf::from(value)),
                    "rsync" => {
                        attrs.rsync = match value {
                            "yes" => true,
                            "no" => false,
                            _ => return Err(syntax()),
                        }
                    }
                    _ => return Err(syntax()),
                }
            } else {
                groups.push(token.to_string());
            }
        }
        match range_of(origin, name_token)? {
            None => {
                match addr_template.as_deref().map(|t| range_of(origin, t)).transpose()? {
                    Some(Some(tp)) if tp.is_single() => attrs.address = tp.expand().next(),
                    // a low-high range in the address makes no sense for a
                    // single node
                    Some(Some(_)) => return Err(syntax()),
                    _ => attrs.address = addr_template,
                }
                self.builder.declare_node(origin, name_token, groups, attrs)?;
            }
            Some(pattern) => {
                let names: Vec<String> = pattern.expand().collect();
                let addrs: Option<Vec<String>> = match &addr_template {
                    None => None,
                    Some(template) => match range_of(origin, template)? {
                        Some(tp) if tp.is_single() => Some(tp.expand_from(names.len()).collect()),
                        // a full low-high range or a fixed address cannot
                        // pair with the name expansion
                        Some(_) => {
                            return Err(ConfigError::Range {
                                path: origin.path.clone(),
                                line: origin.line,
                                source: RangeError::Malformed {
                                    token: format!("ipaddress:{template}"),
                                },
                            });
                        }
                        None => return Err(syntax()),
                    },
                };
                for (i, name) in names.iter().enumerate() {
                    let mut attrs = attrs.clone();
                    attrs.address = addrs.as_ref().map(|a| a[i].clone());
                    self.builder
                        .declare_node(origin, name, groups.clone(), attrs)?;
                }
            }
        }
        Ok(())
    }
}

fn range_of(origin: &Origin, token: &str) -> Result<Option<RangePattern>, ConfigError> {
    RangePattern::parse(token).map_err(|source| ConfigError::Range {
        path: origin.path.clone(),
        line: origin.line,
        source,
    })
}

fn expand_names(origin: &Origin, token: &str) -> Result<Vec<String>, ConfigError> {
    Ok(match range_of(origin, token)? {
        Some(pattern) => pattern.expand().collect(),
        None => vec![token.to_string()],
    })
}
