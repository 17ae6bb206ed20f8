//! Cluster bootstrap and convergence steps run through `cephadm shell`.

use crate::error::{CephlabError, Result};
use crate::exec::{argv, ClusterShell, RemoteExecutor};
use crate::poll::{poll, PollPolicy};
use crate::types::cluster::{self, CephadmDaemon, ClusterStatus};
use tracing::{debug, info, instrument};

/// Read and parse `ceph status`.
pub async fn fetch_status(shell: &ClusterShell) -> Result<ClusterStatus> {
    let output = shell.run(&argv(["ceph", "status", "-f", "json"])).await?;
    ClusterStatus::parse(&output)
}

/// Wait until a manager is available and the monmap holds a monitor.
#[instrument(skip_all)]
pub async fn wait_for_control_plane(
    shell: &ClusterShell,
    policy: &PollPolicy,
) -> Result<ClusterStatus> {
    let status = poll(
        "manager and monitor availability",
        policy,
        || fetch_status(shell),
        ClusterStatus::control_plane_ready,
    )
    .await?;
    info!(mons = status.monmap.num_mons, "Cluster control plane is up");
    Ok(status)
}

/// Ask the orchestrator to turn every available device into an OSD.
pub async fn apply_osds(shell: &ClusterShell) -> Result<()> {
    info!("Adding OSDs, it may take a few minutes");
    shell.run(&argv(["ceph", "orch", "apply", "osd", "--all-available-devices"])).await?;
    Ok(())
}

/// Wait until at least `expected` OSDs are in the osdmap.
#[instrument(skip(shell, policy))]
pub async fn wait_for_osds(
    shell: &ClusterShell,
    expected: u32,
    policy: &PollPolicy,
) -> Result<u32> {
    let status = poll("OSD convergence", policy, || fetch_status(shell), |s| {
        s.osd_count() >= expected
    })
    .await?;
    info!(osds = status.osd_count(), "OSD count reached");
    Ok(status.osd_count())
}

/// Make every pool replicate across OSDs instead of hosts.
///
/// A single-node cluster can never satisfy the default host failure domain. The
/// rule is created only when missing. Returns the patched pools.
#[instrument(skip(shell))]
pub async fn patch_replication_rule(shell: &ClusterShell, rule: &str) -> Result<Vec<String>> {
    let rules = cluster::parse_crush_rules(
        &shell.run(&argv(["ceph", "osd", "crush", "rule", "dump", "-f", "json"])).await?,
    )?;

    if rules.iter().any(|r| r.rule_name == rule) {
        info!("Crush rule already present");
    } else {
        info!("Creating crush rule with OSD failure domain");
        let create =
            argv(["ceph", "osd", "crush", "rule", "create-replicated", rule, "default", "osd"]);
        shell.run(&create).await?;
    }

    let listing = shell.run(&argv(["ceph", "osd", "pool", "ls", "-f", "json"])).await?;
    let pools = cluster::parse_pool_names(&listing)?;
    for pool in &pools {
        info!(pool = %pool, "Setting crush rule");
        shell.run(&argv(["ceph", "osd", "pool", "set", pool.as_str(), "crush_rule", rule])).await?;
    }
    Ok(pools)
}

/// Cluster daemons cephadm already manages on the host.
///
/// Returns an empty list when `which` reports cephadm as not installed. Any
/// other failure to check is a precondition failure.
pub async fn existing_deployments(host: &dyn RemoteExecutor) -> Result<Vec<CephadmDaemon>> {
    let unavailable = |e: CephlabError| {
        CephlabError::precondition(format!("Unable to list existing cephadm deployments: {}", e))
    };
    match host.run(&argv(["which", "cephadm"])).await {
        Ok(_) => {}
        Err(CephlabError::ExecutionFailed { exit_code: 1, .. }) => {
            debug!("cephadm is not installed, no existing deployments");
            return Ok(Vec::new());
        }
        Err(e) => return Err(unavailable(e)),
    }
    let output = host.run(&argv(["sudo", "cephadm", "ls"])).await.map_err(unavailable)?;
    cluster::parse_cephadm_ls(&output).map_err(unavailable)
}
