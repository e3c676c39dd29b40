//! Bounded parallel fan-out of per-node jobs.
//!
//! One job per resolved target, at most `max_parallel` in flight. Jobs for
//! distinct nodes are independent: a failing node is recorded and never
//! cancels or blocks the others. Reports come back in target order, so
//! repeated runs display identically regardless of completion order.

use anyhow::Result;

use topology::ResolvedTarget;

/// Outcome of one per-node job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub node: String,
    /// Captured stdout then stderr, each line prefixed `node: `.
    pub lines: Vec<String>,
    pub success: bool,
}

/// Run `command` on every target through the configured ssh command.
///
/// The argv is the whitespace-split `ssh_cmd` followed by the target
/// hostname and the command string, so tests can substitute `echo`.
pub async fn run_command(
    targets: &[ResolvedTarget],
    ssh_cmd: &str,
    command: &str,
    max_parallel: usize,
) -> Result<Vec<JobReport>> {
    let base = split_cmd(ssh_cmd)?;
    let jobs = targets
        .iter()
        .map(|target| {
            let mut argv = base.clone();
            if let Some(host_id) = &target.host_id {
                argv.push("-i".to_string());
                argv.push(host_id.display().to_string());
            }
            argv.push(target.hostname.clone());
            argv.push(command.to_string());
            (target.name.clone(), argv)
        })
        .collect();
    fan_out(jobs, max_parallel).await
}

/// Push `path` to the same path on every rsync-eligible target.
///
/// Targets declared `rsync:no` are skipped entirely; ignore path patterns
/// are forwarded as `--exclude` arguments.
pub async fn sync_files(
    targets: &[ResolvedTarget],
    rsync_cmd: &str,
    path: &std::path::Path,
    excludes: &[String],
    max_parallel: usize,
) -> Result<Vec<JobReport>> {
    let base = split_cmd(rsync_cmd)?;
    let jobs = targets
        .iter()
        .filter(|target| target.rsync)
        .map(|target| {
            let mut argv = base.clone();
            for pattern in excludes {
                argv.push(format!("--exclude={pattern}"));
            }
            argv.push(path.display().to_string());
            argv.push(format!("{}:{}", target.address, path.display()));
            (target.name.clone(), argv)
        })
        .collect();
    fan_out(jobs, max_parallel).await
}

fn split_cmd(cmd: &str) -> Result<Vec<String>> {
    let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        return Err(anyhow::anyhow!("configured command is empty"));
    }
    Ok(argv)
}

async fn fan_out(jobs: Vec<(String, Vec<String>)>, max_parallel: usize) -> Result<Vec<JobReport>> {
    assert!(max_parallel > 0);
    let mut join_set = tokio::task::JoinSet::new();
    let mut reports: Vec<(usize, JobReport)> = Vec::with_capacity(jobs.len());
    for (idx, (node, argv)) in jobs.into_iter().enumerate() {
        if join_set.len() >= max_parallel {
            let done = join_set
                .join_next()
                .await
                .expect("JoinSet must not be empty here!")?;
            reports.push(done);
        }
        join_set.spawn(async move { (idx, run_job(node, argv).await) });
    }
    while let Some(done) = join_set.join_next().await {
        reports.push(done?);
    }
    // back to target order for stable display
    reports.sort_by_key(|(idx, _)| *idx);
    Ok(reports.into_iter().map(|(_, report)| report).collect())
}

async fn run_job(node: String, argv: Vec<String>) -> JobReport {
    tracing::info!(node = %node, argv = ?argv, "dispatching job");
    let output = tokio::process::Command::new(&argv[0])
        .args(&argv[1..])
        .output()
        .await;
    match output {
        Ok(output) => {
            let mut lines = Vec::new();
            for chunk in [&output.stdout, &output.stderr] {
                for line in String::from_utf8_lossy(chunk).lines() {
                    lines.push(format!("{node}: {line}"));
                }
            }
            if !output.status.success() {
                tracing::error!(node = %node, status = ?output.status, "job failed");
            }
            JobReport {
                node,
                lines,
                success: output.status.success(),
            }
        }
        Err(error) => {
            tracing::error!(node = %node, "failed to spawn job: {:#}", error);
            JobReport {
                lines: vec![format!("{node}: {error}")],
                node,
                success: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology::Role;

    fn target(name: &str, rsync: bool) -> ResolvedTarget {
        ResolvedTarget {
            name: name.to_string(),
            address: format!("{name}.addr"),
            hostname: format!("{name}.host"),
            host_id: None,
            rsync,
            role: Role::Normal,
            groups: vec!["wn".to_string()],
        }
    }

    #[tokio::test]
    async fn run_command_reaches_every_target_in_order() {
        let targets = vec![target("n1", true), target("n2", true), target("n3", true)];
        // `echo` stands in for ssh: it prints the hostname and the command
        let reports = run_command(&targets, "echo", "uptime", 2).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].lines, vec!["n1: n1.host uptime"]);
        assert_eq!(reports[1].lines, vec!["n2: n2.host uptime"]);
        assert_eq!(reports[2].lines, vec!["n3: n3.host uptime"]);
        assert!(reports.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn bound_of_one_still_processes_all_targets() {
        let targets: Vec<_> = (0..5).map(|i| target(&format!("n{i}"), true)).collect();
        let reports = run_command(&targets, "echo", "true", 1).await.unwrap();
        assert_eq!(reports.len(), 5);
    }

    #[tokio::test]
    async fn failing_node_does_not_block_the_others() {
        let targets = vec![target("n1", true), target("n2", true)];
        let reports = run_command(&targets, "false", "ignored", 2).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn unspawnable_command_is_a_per_node_failure() {
        let targets = vec![target("n1", true)];
        let reports = run_command(&targets, "/nonexistent/csync-test-bin", "x", 1)
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].success);
        assert_eq!(reports[0].node, "n1");
    }

    #[tokio::test]
    async fn sync_skips_rsync_no_targets_and_passes_excludes() {
        let targets = vec![target("n1", true), target("n2", false)];
        let reports = sync_files(
            &targets,
            "echo",
            std::path::Path::new("/etc/motd"),
            &["*.swp".to_string()],
            4,
        )
        .await
        .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].node, "n1");
        assert_eq!(
            reports[0].lines,
            vec!["n1: --exclude=*.swp /etc/motd n1.addr:/etc/motd"]
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(split_cmd("   ").is_err());
    }
}
