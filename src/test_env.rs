// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! An in-memory stand-in for the management engine, used by the unit and integration tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::engine::{AffinityGroup, ApiError, ApiResult, Cluster, ManagementApi, Vm};

/// One call made against a `FakeEngine`, in the order they were made.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListClusters(String),
    ListAffinityGroups(String),
    ListVms(String),
    AddAffinityGroupVm {
        cluster_id: String,
        group_id: String,
        vm_id: String,
    },
    Close,
}

#[derive(Debug, Default)]
struct EngineState {
    clusters: Vec<Cluster>,
    /// Affinity groups, with the id of the cluster they belong to.
    affinity_groups: Vec<(String, AffinityGroup)>,
    vms: Vec<Vm>,
    /// Member VM ids, by affinity group id.
    members: HashMap<String, Vec<String>>,
    /// VM ids whose add requests are refused.
    rejected_vms: HashSet<String>,
    fail_vm_search: bool,
    calls: Vec<Call>,
}

/// A FakeEngine holds a small inventory and records every call made against it.
///
/// Clones share the same state, so a test can hand one clone to the code under test and inspect
/// the calls through another after the first has been consumed.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().clusters.push(Cluster {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_affinity_group(self, cluster_id: &str, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().affinity_groups.push((
            cluster_id.to_string(),
            AffinityGroup {
                id: id.to_string(),
                name: name.to_string(),
                description: Some(format!("{name} placement")),
                comment: None,
            },
        ));
        self
    }

    pub fn with_vm(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().vms.push(Vm {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_member(self, group_id: &str, vm_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .members
            .entry(group_id.to_string())
            .or_default()
            .push(vm_id.to_string());
        self
    }

    /// Refuse any attempt to add the VM `vm_id` to a group, as the engine does when the user
    /// lacks permission on it.
    pub fn reject_vm(self, vm_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .rejected_vms
            .insert(vm_id.to_string());
        self
    }

    /// Make every VM search fail.
    pub fn fail_vm_search(self) -> Self {
        self.state.lock().unwrap().fail_vm_search = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only the add requests, as `(group_id, vm_id)` pairs.
    pub fn add_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::AddAffinityGroupVm {
                    group_id, vm_id, ..
                } => Some((group_id, vm_id)),
                _ => None,
            })
            .collect()
    }

    pub fn members(&self, group_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(group_id)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl ManagementApi for FakeEngine {
    fn list_clusters(&self, search: &str) -> ApiResult<Vec<Cluster>> {
        self.record(Call::ListClusters(search.to_string()));
        let state = self.state.lock().unwrap();
        Ok(state
            .clusters
            .iter()
            .filter(|c| search_matches(search, &c.name))
            .cloned()
            .collect())
    }

    fn list_affinity_groups(&self, cluster_id: &str) -> ApiResult<Vec<AffinityGroup>> {
        self.record(Call::ListAffinityGroups(cluster_id.to_string()));
        let state = self.state.lock().unwrap();
        if !state.clusters.iter().any(|c| c.id == cluster_id) {
            return Err(not_found(&format!("cluster {cluster_id}")));
        }
        Ok(state
            .affinity_groups
            .iter()
            .filter(|(cluster, _)| cluster == cluster_id)
            .map(|(_, group)| group.clone())
            .collect())
    }

    fn list_vms(&self, search: &str) -> ApiResult<Vec<Vm>> {
        self.record(Call::ListVms(search.to_string()));
        let state = self.state.lock().unwrap();
        if state.fail_vm_search {
            return Err(ApiError::Fault {
                status: 500,
                reason: "Internal Server Error".to_string(),
                detail: Some("search backend unavailable".to_string()),
            });
        }
        Ok(state
            .vms
            .iter()
            .filter(|vm| search_matches(search, &vm.name))
            .cloned()
            .collect())
    }

    fn add_affinity_group_vm(
        &self,
        cluster_id: &str,
        group_id: &str,
        vm_id: &str,
    ) -> ApiResult<()> {
        self.record(Call::AddAffinityGroupVm {
            cluster_id: cluster_id.to_string(),
            group_id: group_id.to_string(),
            vm_id: vm_id.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        if !state
            .affinity_groups
            .iter()
            .any(|(cluster, group)| cluster == cluster_id && group.id == group_id)
        {
            return Err(not_found(&format!("affinity group {group_id}")));
        }
        if !state.vms.iter().any(|vm| vm.id == vm_id) {
            return Err(not_found(&format!("vm {vm_id}")));
        }
        if state.rejected_vms.contains(vm_id) {
            return Err(ApiError::Fault {
                status: 403,
                reason: "Operation Failed".to_string(),
                detail: Some("User is not authorized to perform this action.".to_string()),
            });
        }

        let members = state.members.entry(group_id.to_string()).or_default();
        if members.iter().any(|member| member == vm_id) {
            return Err(ApiError::Fault {
                status: 409,
                reason: "Operation Failed".to_string(),
                detail: Some("VM is already a member of the affinity group.".to_string()),
            });
        }
        members.push(vm_id.to_string());
        Ok(())
    }

    fn close(&mut self) -> ApiResult<()> {
        self.record(Call::Close);
        Ok(())
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Fault {
        status: 404,
        reason: "Not Found".to_string(),
        detail: Some(format!("{what} does not exist")),
    }
}

/// Evaluate a `name=<pattern>` search expression against `name`, where `*` in the pattern matches
/// any run of characters. Only the subset of the engine search language this tool produces is
/// supported.
pub fn search_matches(search: &str, name: &str) -> bool {
    let Some(pattern) = search.strip_prefix("name=") else {
        return false;
    };
    glob_match(pattern, name)
}

fn glob_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if parts.len() == 1 {
        return pattern == name;
    }

    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// The inventory used by most tests: a "default" cluster with two affinity groups, two web
/// servers, and a database server, plus a second cluster that should never be touched.
pub fn web_tier_engine() -> FakeEngine {
    FakeEngine::new()
        .with_cluster("c-other", "staging")
        .with_cluster("c-default", "default")
        .with_affinity_group("c-default", "g-db", "db-tier")
        .with_affinity_group("c-default", "g-web", "web-tier")
        .with_affinity_group("c-other", "g-web-staging", "web-tier")
        .with_vm("vm-web1", "webserver01")
        .with_vm("vm-web2", "webserver02")
        .with_vm("vm-db1", "dbserver01")
}
