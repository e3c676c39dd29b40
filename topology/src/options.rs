//! Scalar configuration options.
//!
//! Every option has a documented built-in default and is validated when the
//! directive is parsed, so a bad value fails the load instead of surfacing
//! mid-run. Later directives (including ones from `include`d files)
//! override earlier values.

use crate::error::ConfigError;
use crate::graph::Origin;

/// Supported package managers for the `package_manager` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Yum,
    Zypper,
    Pacman,
    Brew,
    BsdPkg,
}

impl std::str::FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apt" | "apt-get" => Ok(Self::Apt),
            "yum" => Ok(Self::Yum),
            "zypper" => Ok(Self::Zypper),
            "pacman" => Ok(Self::Pacman),
            "brew" => Ok(Self::Brew),
            "bsdpkg" | "pkg" => Ok(Self::BsdPkg),
            other => Err(format!("unsupported package manager '{other}'")),
        }
    }
}

/// The option registry: typed values with their built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Command used to reach a node for remote execution. Default: `ssh`.
    pub ssh_cmd: String,
    /// Command used for file sync. Default: `rsync -ar --numeric-ids --delete`.
    pub rsync_cmd: String,
    /// Command used to probe node liveness. Default: `ping -q -c 1 -w 1`.
    pub ping_cmd: String,
    /// Maximum number of simultaneous node jobs. Default: 16.
    pub num_proc: usize,
    /// Package manager used by package operations. Default: unset.
    pub package_manager: Option<PackageManager>,
    /// Colorize terminal output. Default: yes.
    pub colorize: bool,
    /// Display full repository paths instead of shortened ones. Default: no.
    pub full_path: bool,
    /// Keep `.saved` copies of overwritten files. Default: yes.
    pub backup_copies: bool,
    /// Skip dotfiles in the repository. Default: no.
    pub ignore_dotfiles: bool,
    /// Skip dotdirs in the repository. Default: no.
    pub ignore_dotdirs: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ssh_cmd: "ssh".to_string(),
            rsync_cmd: "rsync -ar --numeric-ids --delete".to_string(),
            ping_cmd: "ping -q -c 1 -w 1".to_string(),
            num_proc: 16,
            package_manager: None,
            colorize: true,
            full_path: false,
            backup_copies: true,
            ignore_dotfiles: false,
            ignore_dotdirs: false,
        }
    }
}

impl Options {
    /// Apply one scalar option directive. Returns `Ok(false)` when the name
    /// is not a recognized option, so the parser can report the whole line
    /// as an unrecognized directive.
    pub fn set(&mut self, origin: &Origin, name: &str, value: &str) -> Result<bool, ConfigError> {
        match name {
            "ssh_cmd" => self.ssh_cmd = value.to_string(),
            "rsync_cmd" => self.rsync_cmd = value.to_string(),
            "ping_cmd" => self.ping_cmd = value.to_string(),
            "num_proc" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| invalid(origin, name, value, "not a number"))?;
                if n == 0 {
                    return Err(invalid(origin, name, value, "must be at least 1"));
                }
                self.num_proc = n;
            }
            "package_manager" => {
                let pm = value
                    .parse()
                    .map_err(|reason: String| invalid(origin, name, value, &reason))?;
                self.package_manager = Some(pm);
            }
            "colorize" => self.colorize = parse_bool(origin, name, value)?,
            "full_path" => self.full_path = parse_bool(origin, name, value)?,
            "backup_copies" => self.backup_copies = parse_bool(origin, name, value)?,
            "ignore_dotfiles" => self.ignore_dotfiles = parse_bool(origin, name, value)?,
            "ignore_dotdirs" => self.ignore_dotdirs = parse_bool(origin, name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn parse_bool(origin: &Origin, name: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "yes" | "on" | "true" | "1" => Ok(true),
        "no" | "off" | "false" | "0" => Ok(false),
        _ => Err(invalid(origin, name, value, "expected yes or no")),
    }
}

fn invalid(origin: &Origin, name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidOption {
        path: origin.path.clone(),
        line: origin.line,
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
