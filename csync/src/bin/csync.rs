use anyhow::Result;
use clap::Parser;
use tracing::instrument;

use csync_tools_csync::{aggregate, dispatch, init_tracing};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "csync",
    version,
    about = "Resolve a cluster topology and fan out file sync / remote command jobs",
    long_about = "`csync` parses a declarative node/group configuration and runs every
operation against the resolved target set.

EXAMPLE:
    # Show which nodes a selector list resolves to
    csync --config cluster.conf wn login

    # Run a command on all nodes (the master is excluded by default)
    csync -c 'uptime' --aggregate

    # Push a path to the rsync-eligible nodes of one group
    csync --sync /etc/ntp.conf wn"
)]
struct Args {
    // Configuration
    /// Path to the cluster configuration file
    #[arg(
        long,
        default_value = "csync.conf",
        value_name = "PATH",
        help_heading = "Configuration"
    )]
    config: std::path::PathBuf,

    /// Error out when the selectors resolve to zero nodes
    ///
    /// By default an empty result is a valid "nothing to do" and csync
    /// exits successfully without output.
    #[arg(long, help_heading = "Configuration")]
    require_targets: bool,

    // Actions
    /// Run a command on every resolved node via the configured ssh command
    #[arg(
        short = 'c',
        long = "command",
        value_name = "CMD",
        help_heading = "Actions"
    )]
    command: Option<String>,

    /// Push a file or directory to the same path on every rsync-eligible node
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "command",
        help_heading = "Actions"
    )]
    sync: Option<std::path::PathBuf>,

    /// Print resolved targets as JSON instead of the plain listing
    #[arg(long, help_heading = "Actions")]
    json: bool,

    // Output
    /// Aggregate identical per-node output into one block
    #[arg(short = 'a', long, help_heading = "Output")]
    aggregate: bool,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Output")]
    quiet: bool,

    // Performance
    /// Maximum number of simultaneous node jobs, 0 means the num_proc option
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Performance"
    )]
    max_parallel: usize,

    // ARGUMENTS
    /// Node or group selectors; `all` (the default) selects every node
    #[arg()]
    selectors: Vec<String>,
}

#[instrument(skip(args, config))]
async fn async_main(args: &Args, config: &topology::Config) -> Result<bool> {
    let targets = topology::resolve(
        &config.topology,
        &config.ignores,
        &args.selectors,
        topology::ResolveOptions {
            require_nonempty: args.require_targets,
        },
    )?;
    tracing::info!(count = targets.len(), "resolved targets");
    let max_parallel = if args.max_parallel > 0 {
        args.max_parallel
    } else {
        config.options.num_proc
    };
    if let Some(command) = &args.command {
        let reports =
            dispatch::run_command(&targets, &config.options.ssh_cmd, command, max_parallel).await?;
        print_reports(&reports, args.aggregate);
        Ok(reports.iter().all(|r| r.success))
    } else if let Some(path) = &args.sync {
        let excludes: Vec<String> = config
            .ignores
            .patterns()
            .iter()
            .map(|p| p.original.clone())
            .collect();
        let reports = dispatch::sync_files(
            &targets,
            &config.options.rsync_cmd,
            path,
            &excludes,
            max_parallel,
        )
        .await?;
        print_reports(&reports, args.aggregate);
        Ok(reports.iter().all(|r| r.success))
    } else {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&targets)?);
        } else {
            for target in &targets {
                println!("{}", describe(target));
            }
        }
        Ok(true)
    }
}

fn describe(target: &topology::ResolvedTarget) -> String {
    let mut line = target.name.clone();
    if target.address != target.name {
        line.push_str(&format!(" ({})", target.address));
    }
    match target.role {
        topology::Role::Master => line.push_str(" [master]"),
        topology::Role::Slave => line.push_str(" [slave]"),
        topology::Role::Normal => {}
    }
    if !target.rsync {
        line.push_str(" [no-rsync]");
    }
    line
}

fn print_reports(reports: &[dispatch::JobReport], aggregated: bool) {
    let lines: Vec<String> = reports
        .iter()
        .flat_map(|r| r.lines.iter().cloned())
        .collect();
    if aggregated {
        for line in aggregate::aggregate(&lines) {
            println!("{line}");
        }
    } else {
        for line in lines {
            println!("{line}");
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);
    let config = topology::Config::load(&args.config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let ok = runtime.block_on(async_main(&args, &config))?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
