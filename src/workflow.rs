// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::io::Write;

use log::{info, warn};

use crate::{
    config::Config,
    engine::{AffinityGroup, ApiError, Cluster, ManagementApi, Vm},
};

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("cluster \"{0}\" not found")]
    ClusterNotFound(String),

    #[error("affinity group \"{name}\" not found in cluster \"{cluster}\"")]
    AffinityGroupNotFound { name: String, cluster: String },

    /// A read query failed before any membership change was attempted.
    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: ApiError,
    },
}

/// A VM that could not be added, and the engine's reason.
#[derive(Debug)]
pub struct MemberFailure {
    pub vm: Vm,
    pub error: ApiError,
}

/// The outcome of adding every matched VM to the affinity group.
#[derive(Debug)]
pub struct MembershipReport {
    pub cluster: Cluster,
    pub group: AffinityGroup,
    pub added: Vec<Vm>,
    pub failed: Vec<MemberFailure>,
}

impl MembershipReport {
    fn new(cluster: Cluster, group: AffinityGroup) -> Self {
        MembershipReport {
            cluster,
            group,
            added: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Total number of add requests that were issued.
    pub fn attempted(&self) -> usize {
        self.added.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Add every VM matching `config.vm_search` to the affinity group named `config.affinity_group`
/// in the configured cluster.
///
/// The cluster is resolved first. The affinity groups of that cluster are then written to `out`,
/// one line each, before the named group is selected. No membership change is attempted unless
/// both the cluster and the group exist. Each add is independent: a failed add is recorded in the
/// returned report and the remaining VMs are still attempted.
pub fn run<A, W>(api: &A, config: &Config, out: &mut W) -> Result<MembershipReport, WorkflowError>
where
    A: ManagementApi + ?Sized,
    W: Write,
{
    info!(
        "Adding VMs matching \"{}\" to affinity group \"{}\"",
        config.vm_search, config.affinity_group
    );

    let cluster = resolve_cluster(api, config)?;

    let groups = api
        .list_affinity_groups(&cluster.id)
        .map_err(|source| WorkflowError::Query {
            context: format!("could not list affinity groups of cluster \"{}\"", cluster.name),
            source,
        })?;

    if let Err(e) = print_affinity_groups(out, &groups) {
        warn!("Could not write affinity group listing: {e}");
    }

    let Some(group) = groups
        .into_iter()
        .find(|group| group.name == config.affinity_group)
    else {
        return Err(WorkflowError::AffinityGroupNotFound {
            name: config.affinity_group.clone(),
            cluster: cluster.name,
        });
    };

    let vms = api
        .list_vms(&config.vm_query())
        .map_err(|source| WorkflowError::Query {
            context: format!("could not search for VMs matching \"{}\"", config.vm_search),
            source,
        })?;
    info!("{} VM(s) match \"{}\"", vms.len(), config.vm_search);

    Ok(add_members(api, cluster, group, vms))
}

/// Find the cluster named in the config. The engine search narrows the list, but the name is
/// still compared exactly so that a loose match on the engine side is never used.
fn resolve_cluster<A>(api: &A, config: &Config) -> Result<Cluster, WorkflowError>
where
    A: ManagementApi + ?Sized,
{
    let clusters = api
        .list_clusters(&config.cluster_query())
        .map_err(|source| WorkflowError::Query {
            context: format!("could not list clusters named \"{}\"", config.cluster),
            source,
        })?;

    clusters
        .into_iter()
        .find(|cluster| cluster.name == config.cluster)
        .ok_or_else(|| WorkflowError::ClusterNotFound(config.cluster.clone()))
}

fn add_members<A>(api: &A, cluster: Cluster, group: AffinityGroup, vms: Vec<Vm>) -> MembershipReport
where
    A: ManagementApi + ?Sized,
{
    let report = MembershipReport::new(cluster, group);

    vms.into_iter().fold(report, |mut report, vm| {
        match api.add_affinity_group_vm(&report.cluster.id, &report.group.id, &vm.id) {
            Ok(()) => {
                info!("Added {vm} to affinity group \"{}\"", report.group.name);
                report.added.push(vm);
            }
            Err(error) => {
                warn!(
                    "Could not add {vm} to affinity group \"{}\": {error}",
                    report.group.name
                );
                report.failed.push(MemberFailure { vm, error });
            }
        }
        report
    })
}

pub fn print_affinity_groups<W: Write>(out: &mut W, groups: &[AffinityGroup]) -> std::io::Result<()> {
    for group in groups {
        writeln!(out, "{}", describe_group(group))?;
    }
    Ok(())
}

fn describe_group(group: &AffinityGroup) -> String {
    format!(
        "Affinity_Group: {} Affinity_Group ID: {} Description: {} Comment: {}",
        group.name,
        group.id,
        group.description.as_deref().unwrap_or("<none>"),
        group.comment.as_deref().unwrap_or("<none>"),
    )
}
